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

//! The sweeper proper: one pass over the sorted sweep points maintaining the
//! `actives` (currently occupying a section) and `alive` (currently within a
//! partition) sets.
//!
//! Sections store subsets of buffers that interact with one another at some
//! point in time. As an example, consider four buffers with lifespans
//! `[1, 2)`, `[2, 4)`, `[0, 5)`, and `[5, 9)`:
//!
//! ```text
//!        t=0    t=1    t=2    t=3    t=4    t=5    t=6    t=7    t=8    t=9
//!         |======|======|======|======|======|======|======|======|======|
//!         |XXXXXX|  b0  |XXXXXX|XXXXXX|XXXXXX|XXXXXX|XXXXXX|XXXXXX|XXXXXX|
//!         |------|------|------|------|------|------|------|------|------|
//!         |XXXXXX|XXXXXX|      b1     |XXXXXX|XXXXXX|XXXXXX|XXXXXX|XXXXXX|
//!         |------|------|------|------|------|------|------|------|------|
//!         |                b2                |XXXXXX|XXXXXX|XXXXXX|XXXXXX|
//!         |------|------|------|------|------|------|------|------|------|
//!         |XXXXXX|XXXXXX|XXXXXX|XXXXXX|XXXXXX|             b3            |
//!         |======|======|======|======|======|======|======|======|======|
//!
//!         |     sec0    |     sec1    | sec2 |            sec3           |
//!         |                p0                |             p1            |
//! ```
//!
//! Buffers 0 and 2 interact from t=0 to t=2, forming the first section.
//! Buffer 3 never interacts with the others, so it lands in its own
//! partition; partitions never overlap in time and may be solved
//! independently.

use crate::point::{create_points, SweepPointKind};
use fixedbitset::FixedBitSet;
use std::collections::BTreeSet;
use stowage_core::math::interval::ClosedOpenInterval;
use stowage_model::{index::BufferIndex, problem::Problem, TimeValue, Window};

/// An index into the list of schedule cross sections.
pub type SectionIdx = usize;

/// A count of buffers crossing between adjacent sections.
pub type CutCount = i64;

/// A half-open range of section indices.
pub type SectionRange = ClosedOpenInterval<SectionIdx>;

/// The set of buffers live during one cross section, as a bit set over
/// buffer indices.
pub type Section = FixedBitSet;

/// A range of sections that a buffer continuously occupies, together with
/// the window of offset space it consumes there.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SectionSpan {
    pub section_range: SectionRange,
    pub window: Window,
}

/// A group of buffers that never interacts with any buffer outside the
/// group.
///
/// Partitions are mutually exclusive (any buffer belongs to exactly one) and
/// cover contiguous, non-overlapping section ranges in order; the solver
/// handles them as independent subproblems.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Partition {
    /// The buffers participating in this partition, in discovery order.
    pub buffer_idxs: Vec<BufferIndex>,

    /// A half-open interval specifying which sections this partition spans.
    pub section_range: SectionRange,
}

impl std::fmt::Display for Partition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Partition(sections: [{}, {}), buffers: {})",
            self.section_range.start(),
            self.section_range.end(),
            self.buffer_idxs.len()
        )
    }
}

/// Details regarding a buffer that overlaps another in time: the neighbor's
/// index and the spacing the neighbor must keep when stacked directly above
/// the owner of this record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct Overlap {
    pub buffer_idx: BufferIndex,
    pub effective_size: i64,
}

/// Preprocessed attributes of an individual buffer: the sections it
/// participates in and the buffers it overlaps in time.
///
/// A buffer has one section span per contiguous live stretch; gaps create
/// multiple spans. Being live during a section does not necessarily mean
/// being live for the section's full duration.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct BufferData {
    pub section_spans: Vec<SectionSpan>,
    pub overlaps: BTreeSet<Overlap>,
}

/// The full section decomposition of a problem. Its primary client is the
/// solver, which uses these indices when propagating offset updates during
/// its recursive depth-first search.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SweepResult {
    /// Cross sections of buffers that are active at particular moments in
    /// the schedule.
    pub sections: Vec<Section>,

    /// The list of mutually-exclusive partitions over the problem's buffers.
    pub partitions: Vec<Partition>,

    /// Maps each buffer to its sections and pairwise overlaps.
    pub buffer_data: Vec<BufferData>,
}

impl SweepResult {
    /// Returns a vector of length `sections.len() - 1` where the `i`-th
    /// element is the number of buffers that are active in both section `i`
    /// and section `i + 1`.
    ///
    /// Zero cuts between two sections mean no unassigned buffer straddles
    /// the boundary, which is what permits dynamic temporal decomposition
    /// during search.
    pub fn calculate_cuts(&self) -> Vec<CutCount> {
        let mut cuts = vec![0; self.sections.len().saturating_sub(1)];
        for buffer_data in &self.buffer_data {
            let spans = &buffer_data.section_spans;
            let Some(first) = spans.first() else {
                continue;
            };
            let last = spans.last().expect("spans are non-empty here");
            let mut s_idx = first.section_range.start();
            while s_idx + 1 < last.section_range.end() {
                cuts[s_idx] += 1;
                s_idx += 1;
            }
        }
        cuts
    }
}

/// Sweeps over a problem's sorted points, maintaining the set of active
/// buffers to determine disjoint partitions. For each partition, records the
/// participating buffers, their pairwise overlaps, and the cross sections
/// they touch.
pub fn sweep(problem: &Problem) -> SweepResult {
    let num_buffers = problem.buffers.len();
    let points = create_points(problem);
    let mut result = SweepResult {
        sections: Vec::new(),
        partitions: Vec::new(),
        buffer_data: vec![BufferData::default(); num_buffers],
    };
    let mut actives = FixedBitSet::with_capacity(num_buffers);
    let mut alive = FixedBitSet::with_capacity(num_buffers);
    let mut last_section_time: Option<TimeValue> = None;
    let mut last_section_idx: SectionIdx = 0;
    // A reverse index (from buffers to their current section start) for quick
    // span construction.
    let mut section_start: Vec<SectionIdx> = vec![usize::MAX; num_buffers];

    for point in &points {
        let idx = point.buffer_idx.get();
        if last_section_time.is_none() {
            last_section_time = Some(point.time);
        }
        match point.kind {
            SweepPointKind::Right => {
                // Snapshot a new cross section if time has advanced since the
                // last one was cut.
                if last_section_time.expect("initialized above") < point.time {
                    last_section_time = Some(point.time);
                    result.sections.push(actives.clone());
                }
                actives.set(idx, false);
                if point.endpoint {
                    alive.set(idx, false);
                }
                debug_assert_ne!(
                    section_start[idx],
                    usize::MAX,
                    "right point for buffer {} without a preceding left point",
                    idx
                );
                let section_range =
                    SectionRange::new_unchecked(section_start[idx], result.sections.len());
                result.buffer_data[idx].section_spans.push(SectionSpan {
                    section_range,
                    window: point.window,
                });
                // Once nothing is alive, the span of this partition is known.
                if alive.is_clear() {
                    let partition = result
                        .partitions
                        .last_mut()
                        .expect("a right endpoint closes a previously opened partition");
                    partition.section_range =
                        SectionRange::new_unchecked(last_section_idx, result.sections.len());
                    last_section_idx = result.sections.len();
                }
            }
            SweepPointKind::Left => {
                if alive.is_clear() {
                    result.partitions.push(Partition::default());
                }
                // Record any overlaps, then add this buffer to the actives.
                if point.endpoint {
                    result
                        .partitions
                        .last_mut()
                        .expect("pushed above when alive was empty")
                        .buffer_idxs
                        .push(point.buffer_idx);
                    let buffer = &problem.buffers[idx];
                    for alive_idx in alive.ones() {
                        let alive_buffer = &problem.buffers[alive_idx];
                        if let Some(effective_size) = alive_buffer.effective_size(buffer) {
                            result.buffer_data[alive_idx].overlaps.insert(Overlap {
                                buffer_idx: point.buffer_idx,
                                effective_size,
                            });
                        }
                        if let Some(effective_size) = buffer.effective_size(alive_buffer) {
                            result.buffer_data[idx].overlaps.insert(Overlap {
                                buffer_idx: BufferIndex::new(alive_idx),
                                effective_size,
                            });
                        }
                    }
                }
                actives.set(idx, true);
                if point.endpoint {
                    alive.set(idx, true);
                }
                section_start[idx] = result.sections.len();
            }
        }
    }
    result
}
