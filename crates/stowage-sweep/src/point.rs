// Copyright (c) 2025 Felix Kahle.
//
// Permission is hereby granted, free of charge, to any person obtaining
// a copy of this software and associated documentation files (the
// "Software"), to deal in the Software without restriction, including
// without limitation the rights to use, copy, modify, merge, publish,
// distribute, sublicense, and/or sell copies of the Software, and to
// permit persons to whom the Software is furnished to do so, subject to
// the following conditions:
//
// The above copyright notice and this permission notice shall be
// included in all copies or substantial portions of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF ANY KIND,
// EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED TO THE WARRANTIES OF
// MERCHANTABILITY, FITNESS FOR A PARTICULAR PURPOSE AND
// NONINFRINGEMENT. IN NO EVENT SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE
// LIABLE FOR ANY CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR IN CONNECTION
// WITH THE SOFTWARE OR THE USE OR OTHER DEALINGS IN THE SOFTWARE.

use std::collections::{HashSet, VecDeque};
use stowage_model::{index::BufferIndex, problem::Problem, TimeValue, Window};

/// Orders right points before left points at equal times, so that a buffer
/// leaving the schedule at time `t` is processed before one arriving at `t`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum SweepPointKind {
    Right,
    Left,
}

/// A single edge at which a buffer's activity or occupied window changes.
///
/// The outermost two points of each buffer are flagged `endpoint`; they drive
/// partition membership and overlap discovery during the sweep, while the
/// inner points (gap boundaries) only toggle section occupancy.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SweepPoint {
    pub buffer_idx: BufferIndex,
    pub time: TimeValue,
    pub kind: SweepPointKind,
    pub window: Window,
    pub endpoint: bool,
}

impl PartialOrd for SweepPoint {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for SweepPoint {
    /// Orders by time, then direction (right before left), then buffer index.
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.time
            .cmp(&other.time)
            .then(self.kind.cmp(&other.kind))
            .then(self.buffer_idx.cmp(&other.buffer_idx))
    }
}

/// For a given problem, places all start & end times into a list sorted by
/// time value, then point kind, then buffer index.
///
/// For a buffer with gaps there are six *potential* points of interest:
///
/// ```text
///   A        BC       DE        F
///             |-------|
///   |--------||  gap  ||--------|
///             |-------|
/// ```
///
/// Point `A` need not be created when it co-occurs with point `B`, points `C`
/// and `D` only exist when the gap carries a window, and so on. The
/// `left_times` / `right_times` sets guard against emitting the same edge
/// twice.
pub fn create_points(problem: &Problem) -> Vec<SweepPoint> {
    let mut all_points = Vec::with_capacity(problem.buffers.len() * 2);
    for (idx, buffer) in problem.buffers.iter().enumerate() {
        let buffer_idx = BufferIndex::new(idx);
        let lifespan = buffer.lifespan;
        let window = Window::new_unchecked(0, buffer.size);
        let mut points: VecDeque<SweepPoint> = VecDeque::new();
        let mut left_times: HashSet<TimeValue> = HashSet::new();
        let mut right_times: HashSet<TimeValue> = HashSet::new();

        // Insert left & right points for all *windowed* gaps.
        for gap in &buffer.gaps {
            let Some(gap_window) = gap.window else {
                continue;
            };
            points.push_back(SweepPoint {
                buffer_idx,
                time: gap.lifespan.start(),
                kind: SweepPointKind::Left,
                window: gap_window,
                endpoint: false,
            });
            points.push_back(SweepPoint {
                buffer_idx,
                time: gap.lifespan.end(),
                kind: SweepPointKind::Right,
                window: gap_window,
                endpoint: false,
            });
            left_times.insert(gap.lifespan.start());
            right_times.insert(gap.lifespan.end());
        }

        // If needed, insert new points for the buffer's start & end times.
        if points.front().map_or(true, |p| p.time != lifespan.start()) {
            points.push_front(SweepPoint {
                buffer_idx,
                time: lifespan.start(),
                kind: SweepPointKind::Left,
                window,
                endpoint: false,
            });
        }
        if points.back().map_or(true, |p| p.time != lifespan.end()) {
            points.push_back(SweepPoint {
                buffer_idx,
                time: lifespan.end(),
                kind: SweepPointKind::Right,
                window,
                endpoint: false,
            });
        }

        // Mark the outermost points.
        if let Some(front) = points.front_mut() {
            front.endpoint = true;
        }
        if let Some(back) = points.back_mut() {
            back.endpoint = true;
        }
        right_times.insert(lifespan.start());
        left_times.insert(lifespan.end());

        // Insert left & right points for all *bare* gaps.
        for gap in &buffer.gaps {
            if gap.window.is_some() {
                continue;
            }
            if !right_times.contains(&gap.lifespan.start()) {
                points.push_back(SweepPoint {
                    buffer_idx,
                    time: gap.lifespan.start(),
                    kind: SweepPointKind::Right,
                    window,
                    endpoint: false,
                });
                right_times.insert(gap.lifespan.start());
            }
            if !left_times.contains(&gap.lifespan.end()) {
                points.push_back(SweepPoint {
                    buffer_idx,
                    time: gap.lifespan.end(),
                    kind: SweepPointKind::Left,
                    window,
                    endpoint: false,
                });
                left_times.insert(gap.lifespan.end());
            }
            left_times.insert(gap.lifespan.start());
            right_times.insert(gap.lifespan.end());
        }

        // Insert left & right points for any implicitly active stretches
        // around windowed gaps.
        for gap in &buffer.gaps {
            if !right_times.contains(&gap.lifespan.start()) {
                points.push_back(SweepPoint {
                    buffer_idx,
                    time: gap.lifespan.start(),
                    kind: SweepPointKind::Right,
                    window,
                    endpoint: false,
                });
            }
            if !left_times.contains(&gap.lifespan.end()) {
                points.push_back(SweepPoint {
                    buffer_idx,
                    time: gap.lifespan.end(),
                    kind: SweepPointKind::Left,
                    window,
                    endpoint: false,
                });
            }
        }

        all_points.extend(points);
    }
    all_points.sort();
    all_points
}
