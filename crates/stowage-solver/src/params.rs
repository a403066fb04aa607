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

use std::time::Duration;

/// A composable preordering heuristic: each letter selects one descending
/// sort key (see `preorder::PreorderingComparator`).
pub type PreorderingHeuristic = String;

/// Settings that enable or disable the solver's search and inference
/// techniques (useful for benchmarking them individually). Unless directed
/// otherwise, users should stick with these defaults.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SolverParams {
    /// The amount of time before the solver gives up on its search.
    /// `None` means no limit.
    pub timeout: Option<Duration>,

    /// Requires that partial assignments conform to a "canonical" (i.e.
    /// non-redundant) solution structure.
    pub canonical_only: bool,

    /// Prunes any partial solution in which the lower bound of some section
    /// height eclipses the maximum memory capacity.
    pub section_inference: bool,

    /// Prefers buffers with smaller viable offset values, using the
    /// preordering to break ties.
    pub dynamic_ordering: bool,

    /// Prunes any partial solution that would introduce a gap some
    /// unallocated buffer could easily fill.
    pub check_dominance: bool,

    /// Uses the minimum offsets of unallocated buffers to establish stronger
    /// lower bounds on each section's floor.
    pub unallocated_floor: bool,

    /// Performs an initial sort of each partition by the active heuristic.
    pub static_preordering: bool,

    /// Performs dynamic temporal decomposition during search.
    pub dynamic_decomposition: bool,

    /// Requires that the floor of the entire solution increase
    /// monotonically.
    pub monotonic_floor: bool,

    /// Stops exploring alternate offsets for a buffer with nothing overhead.
    pub hatless_pruning: bool,

    /// Binary-searches the smallest feasible capacity instead of accepting
    /// the first fit within `problem.capacity`.
    pub minimize_capacity: bool,

    /// The static preordering heuristics to attempt. More than one entry
    /// enables the node-budgeted round robin.
    pub preordering_heuristics: Vec<PreorderingHeuristic>,
}

impl Default for SolverParams {
    fn default() -> Self {
        Self {
            timeout: None,
            canonical_only: true,
            section_inference: true,
            dynamic_ordering: true,
            check_dominance: true,
            unallocated_floor: true,
            static_preordering: true,
            dynamic_decomposition: true,
            monotonic_floor: true,
            hatless_pruning: true,
            minimize_capacity: false,
            preordering_heuristics: vec![
                "WAT".to_string(),
                "TAW".to_string(),
                "TWA".to_string(),
            ],
        }
    }
}
