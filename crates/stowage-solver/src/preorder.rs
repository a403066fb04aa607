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

use crate::params::PreorderingHeuristic;
use std::cmp::Ordering;
use stowage_model::{index::BufferIndex, Area, TimeValue};

/// Data used to establish a static preordering of the buffers within one
/// partition.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct PreorderData {
    /// The total area (space × time) consumed by this buffer.
    pub area: Area,
    /// When does the buffer start?
    pub lower: TimeValue,
    /// The number of pairwise overlaps with other buffers.
    pub overlaps: u64,
    /// The number of sections spanned by this buffer.
    pub sections: i64,
    /// The size of the buffer.
    pub size: i64,
    /// The maximum total sum in any of this buffer's sections.
    pub total: i64,
    /// When does the buffer end?
    pub upper: TimeValue,
    /// The width of this buffer's lifespan.
    pub width: i64,
    /// An index into the problem's list of buffers.
    pub buffer_idx: BufferIndex,
}

/// A total order on `PreorderData` parameterized by a short heuristic string.
///
/// Each letter selects one sort key, compared *descending*, with priority in
/// letter order: `A` area, `C` sections, `L` lower, `O` overlaps, `T` total,
/// `U` upper, `W` width, `Z` size. Letters outside this alphabet are
/// skipped. Ties after all letters break by ascending buffer index, so the
/// order is total and deterministic.
///
/// The comparator is a plain value carrying its heuristic string; comparing
/// is a single pass over the letters.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PreorderingComparator {
    heuristic: PreorderingHeuristic,
}

impl PreorderingComparator {
    /// Creates a comparator for the given heuristic string.
    #[inline]
    pub fn new<H>(heuristic: H) -> Self
    where
        H: Into<PreorderingHeuristic>,
    {
        Self {
            heuristic: heuristic.into(),
        }
    }

    /// Compares two buffers under this heuristic.
    pub fn compare(&self, a: &PreorderData, b: &PreorderData) -> Ordering {
        for letter in self.heuristic.chars() {
            let ordering = match letter {
                'A' => b.area.cmp(&a.area),
                'C' => b.sections.cmp(&a.sections),
                'L' => b.lower.cmp(&a.lower),
                'O' => b.overlaps.cmp(&a.overlaps),
                'T' => b.total.cmp(&a.total),
                'U' => b.upper.cmp(&a.upper),
                'W' => b.width.cmp(&a.width),
                'Z' => b.size.cmp(&a.size),
                _ => Ordering::Equal,
            };
            if ordering != Ordering::Equal {
                return ordering;
            }
        }
        a.buffer_idx.cmp(&b.buffer_idx)
    }
}

impl std::fmt::Display for PreorderingComparator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "preorder heuristic {}", self.heuristic)
    }
}
