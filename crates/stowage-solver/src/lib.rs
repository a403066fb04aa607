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

//! # Stowage Solver
//!
//! The exact combinatorial search that assigns every buffer a byte offset:
//! a recursive depth-first branch-and-bound over the section decomposition
//! produced by `stowage-sweep`, with several parameter-gated inference and
//! pruning techniques, dynamic temporal decomposition during search, and a
//! node-budgeted round robin over preordering heuristics.
//!
//! ## Modules
//!
//! - `params`: the [`params::SolverParams`] knobs. Unless benchmarking the
//!   individual techniques, stick with the defaults.
//! - `preorder`: the composable descending-key comparator that orders
//!   buffers before and during search.
//! - `search`: the recursive search core (crate-internal).
//! - `solver`: the public [`solver::Solver`] driver, including capacity
//!   minimization and the irreducible-infeasible-subset reducer.
//! - `result`: the [`result::SolveError`] surface.
//! - `validate`: the independent O(n²) reference checker.

pub mod params;
pub mod preorder;
pub mod result;
pub mod solver;
pub mod validate;

mod search;
