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

use crate::{Area, Lifespan, Offset, Window};
use smallvec::SmallVec;
use stowage_core::math::interval::ClosedOpenInterval;

/// A sub-interval within a buffer's lifespan where the buffer is inactive or
/// occupies a reduced window of offset space.
///
/// A gap with no `window` means the buffer is entirely inactive during the
/// gap. A gap with window `[wl, wu)` means that during the gap only bytes
/// `[wl, wu)` of the buffer are live; the rest may be reused by co-resident
/// buffers. Windows must lie within `[0, buffer.size)`. Gaps within a buffer
/// are non-overlapping and ordered by lifespan.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Gap {
    /// The interval where this gap applies.
    pub lifespan: Lifespan,
    /// The space (if any) still consumed within this gap.
    pub window: Option<Window>,
}

/// A memory allocation request with a time interval, a size, and an alignment.
///
/// `offset`, when present, is a hard placement constraint. `hint` is a soft
/// preference; the solver observes it as an upper bound on candidate offsets
/// for this buffer.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Buffer {
    /// A unique identifier for this buffer (used in file I/O).
    pub id: String,
    /// The half-open time interval during which this buffer needs memory.
    pub lifespan: Lifespan,
    /// The amount of memory consumed during the lifespan.
    pub size: i64,
    /// The lowest common denominator of assignable offsets.
    pub alignment: i64,
    /// Slots where this buffer is inactive or shrunk to a window.
    pub gaps: Vec<Gap>,
    /// If present, the fixed position of this buffer.
    pub offset: Option<Offset>,
    /// If present, provides a placement hint to the solver.
    pub hint: Option<Offset>,
}

impl Default for Buffer {
    fn default() -> Self {
        Self {
            id: String::new(),
            lifespan: Lifespan::default(),
            size: 0,
            alignment: 1,
            gaps: Vec::new(),
            offset: None,
            hint: None,
        }
    }
}

/// A maximal stretch of time during which a buffer continuously occupies one
/// window of offset space.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct ActivitySegment {
    lifespan: Lifespan,
    window: Window,
}

/// Orders right events before left events at equal times, so that half-open
/// intervals touching at an endpoint never count as simultaneously active.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
enum EventKind {
    Right,
    Left,
}

impl Buffer {
    /// The product of this buffer's size and lifespan width.
    #[inline]
    pub fn area(&self) -> Area {
        self.size * self.lifespan.len()
    }

    /// Decomposes this buffer into its activity segments: the full window
    /// `[0, size)` outside of gaps, the gap's window during windowed gaps,
    /// and nothing at all during bare gaps.
    fn segments(&self) -> SmallVec<[ActivitySegment; 4]> {
        let full = Window::new_unchecked(0, self.size);
        let mut segments = SmallVec::new();
        let mut cursor = self.lifespan.start();
        for gap in &self.gaps {
            if cursor < gap.lifespan.start() {
                segments.push(ActivitySegment {
                    lifespan: ClosedOpenInterval::new_unchecked(cursor, gap.lifespan.start()),
                    window: full,
                });
            }
            if let Some(window) = gap.window {
                segments.push(ActivitySegment {
                    lifespan: gap.lifespan,
                    window,
                });
            }
            cursor = gap.lifespan.end();
        }
        if cursor < self.lifespan.end() {
            segments.push(ActivitySegment {
                lifespan: ClosedOpenInterval::new_unchecked(cursor, self.lifespan.end()),
                window: full,
            });
        }
        segments
    }

    /// Computes the smallest offset difference `other` must respect when it is
    /// placed directly above this buffer.
    ///
    /// The result might be smaller than `self.size` if the windows of our
    /// gaps are low (or the windows of their gaps are high), enabling tight
    /// "tetris"-style stacking. Returns `None` when the two buffers are never
    /// simultaneously active, in which case they may overlap freely in space.
    ///
    /// Note the asymmetry: `a.effective_size(&b)` answers "how far above `a`
    /// must `b` sit", which differs from `b.effective_size(&a)` whenever the
    /// gap windows are asymmetric.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use stowage_model::buffer::Buffer;
    /// # use stowage_core::math::interval::ClosedOpenInterval;
    ///
    /// let a = Buffer {
    ///     lifespan: ClosedOpenInterval::new(0, 2),
    ///     size: 4,
    ///     ..Default::default()
    /// };
    /// let b = Buffer {
    ///     lifespan: ClosedOpenInterval::new(1, 3),
    ///     size: 5,
    ///     ..Default::default()
    /// };
    /// assert_eq!(a.effective_size(&b), Some(4));
    /// assert_eq!(b.effective_size(&a), Some(5));
    /// ```
    pub fn effective_size(&self, other: &Buffer) -> Option<i64> {
        // Merge both activity profiles into one event list. Owner 0 is self,
        // owner 1 is other; right events sort before left events at equal
        // times so endpoint contact never registers as overlap.
        let mut events: Vec<(i64, EventKind, usize, Window)> = Vec::new();
        for (owner, buffer) in [self, other].into_iter().enumerate() {
            for segment in buffer.segments() {
                events.push((
                    segment.lifespan.start(),
                    EventKind::Left,
                    owner,
                    segment.window,
                ));
                events.push((
                    segment.lifespan.end(),
                    EventKind::Right,
                    owner,
                    segment.window,
                ));
            }
        }
        events.sort_by_key(|&(time, kind, owner, _)| (time, kind, owner));

        let mut open: [Option<Window>; 2] = [None, None];
        let mut effective_size: Option<i64> = None;
        for (_, kind, owner, window) in events {
            match kind {
                EventKind::Right => open[owner] = None,
                EventKind::Left => {
                    open[owner] = Some(window);
                    if let (Some(ours), Some(theirs)) = (open[0], open[1]) {
                        let required = ours.end() - theirs.start();
                        effective_size =
                            Some(effective_size.map_or(required, |prev| prev.max(required)));
                    }
                }
            }
        }
        effective_size
    }
}

impl std::fmt::Display for Buffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Buffer(id: {}, lifespan: {}, size: {})",
            self.id, self.lifespan, self.size
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn iv(lower: i64, upper: i64) -> ClosedOpenInterval<i64> {
        ClosedOpenInterval::new(lower, upper)
    }

    #[test]
    fn test_area() {
        let buffer = Buffer {
            lifespan: iv(2, 7),
            size: 4,
            ..Default::default()
        };
        assert_eq!(buffer.area(), 20);
    }

    #[test]
    fn test_effective_size_with_overlap() {
        let a = Buffer {
            lifespan: iv(0, 2),
            size: 4,
            ..Default::default()
        };
        let b = Buffer {
            lifespan: iv(1, 3),
            size: 5,
            ..Default::default()
        };
        assert_eq!(a.effective_size(&b), Some(4));
        assert_eq!(b.effective_size(&a), Some(5));
    }

    #[test]
    fn test_effective_size_without_overlap() {
        let a = Buffer {
            lifespan: iv(0, 2),
            size: 4,
            ..Default::default()
        };
        let b = Buffer {
            lifespan: iv(3, 5),
            size: 5,
            ..Default::default()
        };
        assert_eq!(a.effective_size(&b), None);
        assert_eq!(b.effective_size(&a), None);
    }

    #[test]
    fn test_effective_size_touching_lifespans() {
        // Half-open: lifespans that share only an endpoint never interact.
        let a = Buffer {
            lifespan: iv(0, 2),
            size: 4,
            ..Default::default()
        };
        let b = Buffer {
            lifespan: iv(2, 4),
            size: 5,
            ..Default::default()
        };
        assert_eq!(a.effective_size(&b), None);
        assert_eq!(b.effective_size(&a), None);
    }

    #[test]
    fn test_effective_size_gaps_with_overlap() {
        let a = Buffer {
            lifespan: iv(0, 10),
            size: 4,
            gaps: vec![
                Gap {
                    lifespan: iv(1, 4),
                    window: None,
                },
                Gap {
                    lifespan: iv(6, 9),
                    window: None,
                },
            ],
            ..Default::default()
        };
        let b = Buffer {
            lifespan: iv(5, 15),
            size: 5,
            gaps: vec![
                Gap {
                    lifespan: iv(6, 9),
                    window: None,
                },
                Gap {
                    lifespan: iv(11, 14),
                    window: None,
                },
            ],
            ..Default::default()
        };
        assert_eq!(a.effective_size(&b), Some(4));
        assert_eq!(b.effective_size(&a), Some(5));
    }

    #[test]
    fn test_effective_size_gaps_cancel_overlap() {
        let a = Buffer {
            lifespan: iv(0, 10),
            size: 4,
            gaps: vec![Gap {
                lifespan: iv(1, 9),
                window: None,
            }],
            ..Default::default()
        };
        let b = Buffer {
            lifespan: iv(5, 15),
            size: 5,
            gaps: vec![Gap {
                lifespan: iv(6, 14),
                window: None,
            }],
            ..Default::default()
        };
        assert_eq!(a.effective_size(&b), None);
        assert_eq!(b.effective_size(&a), None);
    }

    #[test]
    fn test_effective_size_gap_covers_shared_time_first() {
        let a = Buffer {
            lifespan: iv(0, 10),
            size: 4,
            ..Default::default()
        };
        let b = Buffer {
            lifespan: iv(5, 15),
            size: 5,
            gaps: vec![Gap {
                lifespan: iv(5, 10),
                window: None,
            }],
            ..Default::default()
        };
        assert_eq!(a.effective_size(&b), None);
        assert_eq!(b.effective_size(&a), None);
    }

    #[test]
    fn test_effective_size_gap_covers_shared_time_second() {
        let a = Buffer {
            lifespan: iv(0, 10),
            size: 4,
            gaps: vec![Gap {
                lifespan: iv(5, 10),
                window: None,
            }],
            ..Default::default()
        };
        let b = Buffer {
            lifespan: iv(5, 15),
            size: 5,
            ..Default::default()
        };
        assert_eq!(a.effective_size(&b), None);
        assert_eq!(b.effective_size(&a), None);
    }

    #[test]
    fn test_effective_size_tetris() {
        // The two windows interlock, so one unit of spacing suffices even
        // though both buffers have size 2.
        let a = Buffer {
            lifespan: iv(0, 10),
            size: 2,
            gaps: vec![Gap {
                lifespan: iv(0, 5),
                window: Some(iv(0, 1)),
            }],
            ..Default::default()
        };
        let b = Buffer {
            lifespan: iv(0, 10),
            size: 2,
            gaps: vec![Gap {
                lifespan: iv(5, 10),
                window: Some(iv(1, 2)),
            }],
            ..Default::default()
        };
        assert_eq!(a.effective_size(&b), Some(1));
    }

    #[test]
    fn test_effective_size_stairs() {
        let a = Buffer {
            lifespan: iv(0, 15),
            size: 3,
            gaps: vec![
                Gap {
                    lifespan: iv(0, 5),
                    window: Some(iv(0, 1)),
                },
                Gap {
                    lifespan: iv(5, 10),
                    window: Some(iv(0, 2)),
                },
            ],
            ..Default::default()
        };
        let b = Buffer {
            lifespan: iv(0, 15),
            size: 3,
            gaps: vec![
                Gap {
                    lifespan: iv(5, 10),
                    window: Some(iv(1, 3)),
                },
                Gap {
                    lifespan: iv(10, 15),
                    window: Some(iv(2, 3)),
                },
            ],
            ..Default::default()
        };
        assert_eq!(a.effective_size(&b), Some(1));
    }

    #[test]
    fn test_effective_size_symmetry_for_mirrored_inputs() {
        // Two buffers with identical sizes and mirror-image gaps must agree
        // in both directions.
        let a = Buffer {
            lifespan: iv(0, 8),
            size: 4,
            gaps: vec![Gap {
                lifespan: iv(0, 4),
                window: Some(iv(0, 2)),
            }],
            ..Default::default()
        };
        let b = Buffer {
            lifespan: iv(0, 8),
            size: 4,
            gaps: vec![Gap {
                lifespan: iv(4, 8),
                window: Some(iv(0, 2)),
            }],
            ..Default::default()
        };
        assert_eq!(a.effective_size(&b), b.effective_size(&a));
        assert_eq!(a.effective_size(&b), Some(4));
    }

    #[test]
    fn test_default_alignment_is_one() {
        let buffer = Buffer::default();
        assert_eq!(buffer.alignment, 1);
        assert_eq!(buffer.size, 0);
        assert!(buffer.gaps.is_empty());
    }
}
