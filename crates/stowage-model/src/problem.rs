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

use crate::{buffer::Buffer, Capacity, Offset};

/// An offset assignment for every buffer of a `Problem`.
///
/// `offsets[i]` is the assigned offset of buffer `i` (in input order), and
/// `height` is the maximum of `offsets[i] + buffers[i].size` over all
/// buffers.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Solution {
    pub offsets: Vec<Offset>,
    pub height: Offset,
}

/// An offline allocation problem: a set of buffers to be packed into a
/// contiguous address space of bounded capacity.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Problem {
    pub buffers: Vec<Buffer>,

    /// The total size of the memory address space. No buffer may be assigned
    /// an offset such that `offset + size > capacity`.
    pub capacity: Capacity,
}

/// The error returned by `Problem::strip_solution` when some buffer carries
/// no offset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct MissingOffsetError {
    /// The id of the first buffer found without an offset.
    pub id: String,
}

impl std::fmt::Display for MissingOffsetError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Buffer '{}' found with no offset", self.id)
    }
}

impl std::error::Error for MissingOffsetError {}

impl Problem {
    /// Extracts a solution from the offset value of each buffer, clearing
    /// the offsets in the process.
    ///
    /// Returns an error naming the first buffer that carries no offset.
    pub fn strip_solution(&mut self) -> Result<Solution, MissingOffsetError> {
        let mut solution = Solution::default();
        solution.offsets.reserve(self.buffers.len());
        for buffer in &self.buffers {
            match buffer.offset {
                Some(offset) => {
                    solution.offsets.push(offset);
                    solution.height = solution.height.max(offset + buffer.size);
                }
                None => {
                    return Err(MissingOffsetError {
                        id: buffer.id.clone(),
                    })
                }
            }
        }
        for buffer in &mut self.buffers {
            buffer.offset = None;
        }
        Ok(solution)
    }
}

impl std::fmt::Display for Problem {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "Problem(buffers: {}, capacity: {})",
            self.buffers.len(),
            self.capacity
        )
    }
}
