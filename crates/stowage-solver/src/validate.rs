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

//! The independent reference checker: a deliberately simple O(n²) pass that
//! shares no code with the search, so solver and validator can only agree by
//! both being right.

use stowage_model::{
    problem::{Problem, Solution},
    Offset,
};

/// The verdict of [`validate`], from most to least structural.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[must_use]
pub enum ValidationResult {
    Good,
    /// The solution structure is incorrect, e.g. the wrong number of offsets.
    BadSolution,
    /// A buffer with a fixed offset was assigned somewhere else.
    BadFixed,
    /// An offset is out of bounds: negative, or beyond the capacity.
    BadOffset,
    /// At least one pair of buffers overlaps in both space and time.
    BadOverlap,
    /// At least one buffer is not placed at a multiple of its alignment.
    BadAlignment,
    /// The declared height is not the buffers' maximum offset plus size.
    BadHeight,
}

impl std::fmt::Display for ValidationResult {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ValidationResult::Good => "Good",
            ValidationResult::BadSolution => "BadSolution",
            ValidationResult::BadFixed => "BadFixed",
            ValidationResult::BadOffset => "BadOffset",
            ValidationResult::BadOverlap => "BadOverlap",
            ValidationResult::BadAlignment => "BadAlignment",
            ValidationResult::BadHeight => "BadHeight",
        };
        write!(f, "{}", name)
    }
}

/// Checks a solution against a problem: offset count, fixed offsets, bounds,
/// declared height, alignment, and pairwise overlap via the effective-size
/// oracle in both directions.
pub fn validate(problem: &Problem, solution: &Solution) -> ValidationResult {
    // Check that the number of buffers matches the number of offsets.
    if problem.buffers.len() != solution.offsets.len() {
        return ValidationResult::BadSolution;
    }
    // Check fixed buffers and that offsets lie within the allowable range.
    let mut max_height: Offset = 0;
    for (buffer, &offset) in problem.buffers.iter().zip(&solution.offsets) {
        let height = offset + buffer.size;
        max_height = max_height.max(height);
        if buffer.offset.is_some_and(|fixed| fixed != offset) {
            return ValidationResult::BadFixed;
        }
        if offset < 0 || height > problem.capacity {
            return ValidationResult::BadOffset;
        }
        if height > solution.height {
            return ValidationResult::BadHeight;
        }
        if offset % buffer.alignment != 0 {
            return ValidationResult::BadAlignment;
        }
    }
    if max_height != solution.height {
        return ValidationResult::BadHeight;
    }
    // Check that no two buffers overlap in both space and time, the O(n²)
    // way.
    for i in 0..problem.buffers.len() {
        let buffer_i = &problem.buffers[i];
        let offset_i = solution.offsets[i];
        for j in (i + 1)..problem.buffers.len() {
            let buffer_j = &problem.buffers[j];
            let offset_j = solution.offsets[j];
            let i_clears_j = match buffer_i.effective_size(buffer_j) {
                None => true,
                Some(effective_size) => offset_i + effective_size <= offset_j,
            };
            if i_clears_j {
                continue;
            }
            let j_clears_i = match buffer_j.effective_size(buffer_i) {
                None => true,
                Some(effective_size) => offset_j + effective_size <= offset_i,
            };
            if j_clears_i {
                continue;
            }
            return ValidationResult::BadOverlap;
        }
    }
    ValidationResult::Good
}
