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

//! # Stowage Model
//!
//! **The core domain model for the stowage static memory allocator.**
//!
//! This crate defines the data structures describing an offline allocation
//! problem for hardware-accelerated ML workloads: a set of buffers, each with
//! a lifespan, a size, an alignment, and optional gaps during which the
//! buffer is partially or wholly inactive. It serves as the data interchange
//! layer between problem construction (file input, tests) and the solving
//! engine (`stowage-sweep`, `stowage-solver`).
//!
//! ## Architecture
//!
//! * **`index`**: the strongly-typed `BufferIndex` used by the sweeper and
//!   solver to refer to buffers without mixing index spaces.
//! * **`buffer`**: `Buffer` and `Gap`, including the effective-size oracle
//!   that decides how tightly one buffer stacks above another.
//! * **`problem`**: `Problem` (input) and `Solution` (output).
//!
//! ## Coordinate system
//!
//! Time and offset axes are plain `i64` values. All ranges are half-open
//! `[lower, upper)` intervals; two buffers whose lifespans merely touch at an
//! endpoint never interact.

pub mod buffer;
pub mod index;
pub mod problem;

use stowage_core::math::interval::ClosedOpenInterval;

/// An abstract, unitless start or end time of a buffer.
pub type TimeValue = i64;

/// A memory address (e.g. in bytes) assigned to a buffer.
pub type Offset = i64;

/// The maximum memory capacity, defined at the `Problem` level.
pub type Capacity = i64;

/// The unitless product of a buffer's lifespan width and size.
pub type Area = i64;

/// The time interval during which a buffer needs memory.
pub type Lifespan = ClosedOpenInterval<TimeValue>;

/// A sub-range of the offset space occupied by a buffer.
pub type Window = ClosedOpenInterval<Offset>;
