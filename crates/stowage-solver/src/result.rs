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

/// The error surfaced by the solver entry points.
///
/// A node-budget exhaustion state also exists during search, but it is
/// internal to the round robin and never reaches callers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SolveError {
    /// The search completed and proved that no feasible assignment exists
    /// under the given parameters and capacity.
    Infeasible,
    /// The timeout elapsed or the search was cancelled mid-flight; nothing
    /// is known either way.
    DeadlineExceeded,
}

impl std::fmt::Display for SolveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SolveError::Infeasible => write!(f, "no feasible offset assignment exists"),
            SolveError::DeadlineExceeded => {
                write!(f, "search deadline exceeded or cancelled")
            }
        }
    }
}

impl std::error::Error for SolveError {}

/// The status threaded through the recursive search. `Aborted` marks node
/// budget exhaustion and is consumed by the round robin; the other variants
/// map onto the public result.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum SearchStatus {
    Ok,
    NotFound,
    DeadlineExceeded,
    Aborted,
}
