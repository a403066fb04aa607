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

//! The recursive depth-first branch-and-bound core.
//!
//! One `SearchContext` exists per `solve` call. It owns the tentative
//! assignment, the per-buffer minimum offsets, the per-section floors and
//! totals, and the remaining node budget. Every mutation made while
//! exploring a candidate is recorded in a change log local to that recursion
//! frame and replayed in reverse on unwind, so siblings always observe an
//! unmodified view.

use crate::{
    params::SolverParams,
    preorder::{PreorderData, PreorderingComparator},
    result::{SearchStatus, SolveError},
};
use std::{
    collections::HashSet,
    sync::atomic::{AtomicBool, Ordering},
    time::Instant,
};
use stowage_model::{
    index::BufferIndex,
    problem::{Problem, Solution},
    Offset,
};
use stowage_sweep::sweep::{CutCount, Partition, SectionIdx, SectionRange, SweepResult};
use tracing::debug;

/// Incrementally maintained data about one section during search.
#[derive(Clone, Copy, Debug, Default)]
struct SectionData {
    /// The lowest viable offset for any unassigned buffer in this section.
    floor: Offset,
    /// The sum of the still-unassigned window heights in this section.
    total: i64,
}

/// One entry of the dynamic candidate ordering.
#[derive(Clone, Copy, Debug)]
struct OrderData {
    offset: Offset,
    preorder_idx: usize,
}

/// A record of a buffer's minimum offset prior to a change during search.
#[derive(Clone, Copy, Debug)]
struct OffsetChange {
    buffer_idx: BufferIndex,
    min_offset: Offset,
}

/// A record of a section's floor prior to a change during search.
#[derive(Clone, Copy, Debug)]
struct SectionChange {
    section_idx: SectionIdx,
    floor: Offset,
}

/// The state of a single solve invocation over one problem and its sweep.
pub(crate) struct SearchContext<'a> {
    params: &'a SolverParams,
    start_time: Instant,
    problem: &'a Problem,
    sweep_result: &'a SweepResult,
    backtracks: &'a mut i64,
    cancelled: &'a AtomicBool,

    assignment: Vec<Option<Offset>>,
    solution: Solution,
    min_offsets: Vec<Offset>,
    section_data: Vec<SectionData>,
    cuts: Vec<CutCount>,
    nodes_remaining: i64,
}

impl<'a> SearchContext<'a> {
    pub(crate) fn new(
        params: &'a SolverParams,
        start_time: Instant,
        problem: &'a Problem,
        sweep_result: &'a SweepResult,
        backtracks: &'a mut i64,
        cancelled: &'a AtomicBool,
    ) -> Self {
        Self {
            params,
            start_time,
            problem,
            sweep_result,
            backtracks,
            cancelled,
            assignment: Vec::new(),
            solution: Solution::default(),
            min_offsets: Vec::new(),
            section_data: Vec::new(),
            cuts: Vec::new(),
            nodes_remaining: 0,
        }
    }

    /// Runs the search to completion, dispatching to the round robin when
    /// more than one preordering heuristic was configured.
    pub(crate) fn run(mut self) -> Result<Solution, SolveError> {
        if self.problem.buffers.is_empty() {
            return Ok(self.solution);
        }
        self.prepare();

        let params = self.params;
        let sweep_result = self.sweep_result;
        let status = if params.preordering_heuristics.len() > 1 {
            self.round_robin()
        } else {
            self.nodes_remaining = i64::MAX;
            let heuristic = params
                .preordering_heuristics
                .last()
                .map(String::as_str)
                .unwrap_or("WAT");
            let comparator = PreorderingComparator::new(heuristic);
            debug!(%comparator, "solving all partitions");
            let mut status = SearchStatus::Ok;
            for partition in &sweep_result.partitions {
                status = self.sub_solve(partition, &comparator);
                if status != SearchStatus::Ok {
                    break;
                }
            }
            status
        };

        match status {
            SearchStatus::Ok => {
                self.update_solution_height();
                Ok(self.solution)
            }
            SearchStatus::NotFound => Err(SolveError::Infeasible),
            SearchStatus::DeadlineExceeded => Err(SolveError::DeadlineExceeded),
            SearchStatus::Aborted => {
                debug_assert!(false, "node budget exhaustion escaped the round robin");
                Err(SolveError::Infeasible)
            }
        }
    }

    /// Sizes the per-buffer and per-section state, accumulates the initial
    /// section totals, and seeds minimum offsets from fixed placements.
    fn prepare(&mut self) {
        let problem = self.problem;
        let sweep_result = self.sweep_result;
        let num_buffers = problem.buffers.len();
        self.assignment = vec![None; num_buffers];
        self.solution.offsets = vec![0; num_buffers];
        self.min_offsets = vec![0; num_buffers];
        self.section_data = vec![SectionData::default(); sweep_result.sections.len()];
        for (idx, buffer) in problem.buffers.iter().enumerate() {
            for section_span in &sweep_result.buffer_data[idx].section_spans {
                for s_idx in section_span.section_range.iter() {
                    self.section_data[s_idx].total += section_span.window.len();
                }
            }
            if let Some(fixed) = buffer.offset {
                self.min_offsets[idx] = fixed;
            }
        }
        self.cuts = sweep_result.calculate_cuts();
    }

    /// Rotates through the heuristics under a doubling node budget until one
    /// of them completes (or a genuine error surfaces).
    ///
    /// The budget starts conservative in the hope that some heuristic wins
    /// quickly; doubling keeps the scheme complete, since any heuristic that
    /// can solve the problem within a finite number of nodes eventually
    /// receives that many.
    fn round_robin(&mut self) -> SearchStatus {
        let params = self.params;
        let sweep_result = self.sweep_result;
        let mut node_limit = self.problem.buffers.len() as i64;
        loop {
            node_limit *= 2;
            let mut status = SearchStatus::Ok;
            for heuristic in &params.preordering_heuristics {
                let comparator = PreorderingComparator::new(heuristic.as_str());
                self.nodes_remaining = node_limit;
                status = SearchStatus::Ok;
                debug!(%comparator, node_limit, "round robin attempt");
                for partition in &sweep_result.partitions {
                    status = self.sub_solve(partition, &comparator);
                    if status != SearchStatus::Ok {
                        break;
                    }
                }
                match status {
                    SearchStatus::Ok => break,
                    // This heuristic exhausted its node budget; rotate.
                    SearchStatus::Aborted => continue,
                    _ => return status,
                }
            }
            if status == SearchStatus::Ok {
                return SearchStatus::Ok;
            }
        }
    }

    /// Builds the preordering for one partition, then kicks into the
    /// recursive depth-first search.
    fn sub_solve(
        &mut self,
        partition: &Partition,
        comparator: &PreorderingComparator,
    ) -> SearchStatus {
        let problem = self.problem;
        let sweep_result = self.sweep_result;
        let mut preordering: Vec<PreorderData> = Vec::with_capacity(partition.buffer_idxs.len());
        for &buffer_idx in &partition.buffer_idxs {
            let buffer = &problem.buffers[buffer_idx.get()];
            let buffer_data = &sweep_result.buffer_data[buffer_idx.get()];
            let section_spans = &buffer_data.section_spans;
            let mut total = 0;
            for section_span in section_spans {
                for s_idx in section_span.section_range.iter() {
                    total = total.max(self.section_data[s_idx].total);
                }
            }
            let first_span = section_spans.first().expect("buffers span sections");
            let last_span = section_spans.last().expect("buffers span sections");
            let sections =
                (last_span.section_range.end() - first_span.section_range.start()) as i64;
            preordering.push(PreorderData {
                area: buffer.area(),
                lower: buffer.lifespan.start(),
                overlaps: buffer_data.overlaps.len() as u64,
                sections,
                size: buffer.size,
                total,
                upper: buffer.lifespan.end(),
                width: buffer.lifespan.len(),
                buffer_idx,
            });
        }
        if self.params.static_preordering {
            preordering.sort_by(|a, b| comparator.compare(a, b));
        }
        let ordering: Vec<OrderData> = (0..preordering.len())
            .map(|preorder_idx| OrderData {
                offset: 0,
                preorder_idx,
            })
            .collect();
        self.search(partition, comparator, &preordering, &ordering, 0, 0)
    }

    /// Returns `true` when the wallclock deadline has passed or cancellation
    /// was requested from another thread.
    #[inline]
    fn deadline_exceeded(&self) -> bool {
        self.params
            .timeout
            .is_some_and(|timeout| self.start_time.elapsed() > timeout)
            || self.cancelled.load(Ordering::Relaxed)
    }

    /// Refreshes the candidate ordering: drops assigned buffers, pulls each
    /// survivor's current minimum offset, and (when dynamic ordering is on)
    /// sorts by `(offset, preorder_idx)` ascending.
    fn compute_ordering(
        &self,
        preordering: &[PreorderData],
        orig_ordering: &[OrderData],
    ) -> Vec<OrderData> {
        let mut ordering = Vec::with_capacity(orig_ordering.len());
        for entry in orig_ordering {
            let buffer_idx = preordering[entry.preorder_idx].buffer_idx;
            if self.assignment[buffer_idx.get()].is_some() {
                continue;
            }
            ordering.push(OrderData {
                offset: self.min_offsets[buffer_idx.get()],
                preorder_idx: entry.preorder_idx,
            });
        }
        if self.params.dynamic_ordering {
            ordering.sort_by_key(|entry| (entry.offset, entry.preorder_idx));
        }
        ordering
    }

    /// Determines the minimum height any unallocated buffer would attain at
    /// its current minimum offset. No buffer should be placed at this value
    /// or above: the hole left underneath could never be repaid.
    fn calc_min_height(&self, preordering: &[PreorderData], ordering: &[OrderData]) -> Offset {
        let mut min_height = Offset::MAX;
        for entry in ordering {
            let buffer_idx = preordering[entry.preorder_idx].buffer_idx;
            let size = self.problem.buffers[buffer_idx.get()].size;
            min_height = min_height.min(entry.offset + size);
        }
        min_height
    }

    /// The recursive depth-first search for offset assignments within one
    /// partition. `min_offset` and `min_preorder_idx` describe the candidate
    /// chosen one level up; canonical pruning uses them to visit each
    /// placement multiset exactly once.
    fn search(
        &mut self,
        partition: &Partition,
        comparator: &PreorderingComparator,
        preordering: &[PreorderData],
        orig_ordering: &[OrderData],
        min_offset: Offset,
        min_preorder_idx: usize,
    ) -> SearchStatus {
        if self.nodes_remaining <= 0 {
            return SearchStatus::Aborted;
        }
        self.nodes_remaining -= 1;
        if self.deadline_exceeded() {
            return SearchStatus::DeadlineExceeded;
        }

        let ordering = self.compute_ordering(preordering, orig_ordering);
        if ordering.is_empty() {
            // A leaf: store offsets for every buffer of this partition.
            for &buffer_idx in &partition.buffer_idxs {
                self.solution.offsets[buffer_idx.get()] = self.assignment[buffer_idx.get()]
                    .expect("leaf reached with an unassigned buffer");
            }
            return SearchStatus::Ok;
        }
        let min_height = self.calc_min_height(preordering, &ordering);

        let problem = self.problem;
        for entry in &ordering {
            let offset = entry.offset;
            let preorder_idx = entry.preorder_idx;
            let buffer_idx = preordering[preorder_idx].buffer_idx;
            let buffer = &problem.buffers[buffer_idx.get()];
            if self.params.canonical_only {
                // Siblings must be placed in non-decreasing (offset, index)
                // order; any other order revisits the same shape.
                if offset < min_offset
                    || (offset == min_offset && preorder_idx < min_preorder_idx)
                {
                    continue;
                }
            }
            if self.params.check_dominance && offset >= min_height {
                continue;
            }
            if let Some(fixed) = buffer.offset {
                // The fixed offset is the only legal choice; a candidate
                // above it means the minimum offset has risen past it.
                if offset > fixed {
                    continue;
                }
            } else if let Some(hint) = buffer.hint {
                if offset > hint {
                    continue;
                }
            }

            self.assignment[buffer_idx.get()] = Some(offset);
            let mut affected_sections: HashSet<SectionIdx> = HashSet::new();
            let mut fixed_offset_failure = false;
            let offset_changes = self.update_min_offsets(
                buffer_idx,
                &mut affected_sections,
                &mut fixed_offset_failure,
            );
            let section_changes = self.update_section_data(&affected_sections, buffer_idx);

            let mut status = SearchStatus::NotFound;
            if !fixed_offset_failure && self.check(partition, offset) {
                status = if self.params.dynamic_decomposition {
                    self.dynamically_decompose(
                        partition,
                        comparator,
                        preordering,
                        &ordering,
                        offset,
                        preorder_idx,
                        buffer_idx,
                    )
                } else {
                    self.search(
                        partition,
                        comparator,
                        preordering,
                        &ordering,
                        offset,
                        preorder_idx,
                    )
                };
            }

            self.restore_section_data(&section_changes, buffer_idx);
            if let Some(changes) = &offset_changes {
                self.restore_min_offsets(changes);
            }
            self.assignment[buffer_idx.get()] = None;

            // A feasible solution, a deadline, or an exhausted budget all
            // abort the scan.
            if status != SearchStatus::NotFound {
                return status;
            }
            // Nothing sits above this buffer, so any higher placement only
            // wastes space underneath it.
            if offset_changes.is_none() && self.params.hatless_pruning {
                break;
            }
        }
        *self.backtracks += 1;
        SearchStatus::NotFound
    }

    /// Commits the freshly placed buffer into the solution, then looks for
    /// zero-cut section boundaries inside its span. Each one splits the
    /// remaining buffers into sub-partitions that are solved independently.
    #[allow(clippy::too_many_arguments)]
    fn dynamically_decompose(
        &mut self,
        partition: &Partition,
        comparator: &PreorderingComparator,
        preordering: &[PreorderData],
        orig_ordering: &[OrderData],
        min_offset: Offset,
        min_preorder_idx: usize,
        buffer_idx: BufferIndex,
    ) -> SearchStatus {
        self.solution.offsets[buffer_idx.get()] =
            self.assignment[buffer_idx.get()].expect("decomposing an unplaced buffer");
        let sweep_result = self.sweep_result;
        let section_spans = &sweep_result.buffer_data[buffer_idx.get()].section_spans;
        let span_lower = section_spans
            .first()
            .expect("buffers span sections")
            .section_range
            .start();
        let span_upper = section_spans
            .last()
            .expect("buffers span sections")
            .section_range
            .end();

        // Reduce the cuts between sections spanned by this buffer, noting
        // every boundary that drops to zero.
        let mut cutpoints: Vec<SectionIdx> = vec![partition.section_range.start()];
        let mut s_idx = span_lower;
        while s_idx + 1 < span_upper {
            self.cuts[s_idx] -= 1;
            if self.cuts[s_idx] == 0 {
                cutpoints.push(s_idx + 1);
            }
            s_idx += 1;
        }

        let mut status = SearchStatus::Ok;
        if cutpoints.len() == 1 {
            // No new cutpoint; carry on searching the same partition.
            status = self.search(
                partition,
                comparator,
                preordering,
                orig_ordering,
                min_offset,
                min_preorder_idx,
            );
        } else {
            cutpoints.push(partition.section_range.end());
            for c_idx in 1..cutpoints.len() {
                let section_range =
                    SectionRange::new_unchecked(cutpoints[c_idx - 1], cutpoints[c_idx]);
                // Gather the unassigned buffers touching this sub-range.
                let mut buffer_idxs = Vec::new();
                for &other_idx in &partition.buffer_idxs {
                    if self.assignment[other_idx.get()].is_some() {
                        continue;
                    }
                    let other_spans = &sweep_result.buffer_data[other_idx.get()].section_spans;
                    let other_lower = other_spans
                        .first()
                        .expect("buffers span sections")
                        .section_range
                        .start();
                    let other_upper = other_spans
                        .last()
                        .expect("buffers span sections")
                        .section_range
                        .end();
                    if !(other_upper <= section_range.start()
                        || section_range.end() <= other_lower)
                    {
                        buffer_idxs.push(other_idx);
                    }
                }
                if buffer_idxs.is_empty() {
                    continue;
                }
                let sub_partition = Partition {
                    buffer_idxs,
                    section_range,
                };
                status = self.sub_solve(&sub_partition, comparator);
                if status != SearchStatus::Ok {
                    break;
                }
            }
        }

        // Restore all section cuts to their previous values.
        let mut s_idx = span_lower;
        while s_idx + 1 < span_upper {
            self.cuts[s_idx] += 1;
            s_idx += 1;
        }
        status
    }

    /// For each unassigned neighbor overlapping the placed buffer, raises
    /// its minimum offset to clear the placement (rounded up to the
    /// neighbor's alignment). Returns `None` when no unassigned neighbor
    /// exists at all, i.e. the placed buffer is hatless.
    fn update_min_offsets(
        &mut self,
        buffer_idx: BufferIndex,
        affected_sections: &mut HashSet<SectionIdx>,
        fixed_offset_failure: &mut bool,
    ) -> Option<Vec<OffsetChange>> {
        let problem = self.problem;
        let sweep_result = self.sweep_result;
        let mut hatless = true;
        let mut offset_changes = Vec::new();
        let offset = self.assignment[buffer_idx.get()].expect("propagating an unplaced buffer");
        for overlap in &sweep_result.buffer_data[buffer_idx.get()].overlaps {
            let other_idx = overlap.buffer_idx;
            if self.assignment[other_idx.get()].is_some() {
                continue;
            }
            hatless = false;
            let height = offset + overlap.effective_size;
            if self.min_offsets[other_idx.get()] >= height {
                continue;
            }
            offset_changes.push(OffsetChange {
                buffer_idx: other_idx,
                min_offset: self.min_offsets[other_idx.get()],
            });
            self.min_offsets[other_idx.get()] = height;
            let other_buffer = &problem.buffers[other_idx.get()];
            let diff = self.min_offsets[other_idx.get()] % other_buffer.alignment;
            if diff > 0 {
                self.min_offsets[other_idx.get()] += other_buffer.alignment - diff;
            }
            if let Some(fixed) = other_buffer.offset {
                if self.min_offsets[other_idx.get()] > fixed {
                    *fixed_offset_failure = true;
                }
            }
            if !self.params.unallocated_floor {
                continue;
            }
            for section_span in &sweep_result.buffer_data[other_idx.get()].section_spans {
                for s_idx in section_span.section_range.iter() {
                    affected_sections.insert(s_idx);
                }
            }
        }
        if hatless {
            None
        } else {
            Some(offset_changes)
        }
    }

    /// Restores the minimum offsets by replaying the change log in reverse.
    fn restore_min_offsets(&mut self, offset_changes: &[OffsetChange]) {
        for change in offset_changes.iter().rev() {
            self.min_offsets[change.buffer_idx.get()] = change.min_offset;
        }
    }

    /// Raises the floor and lowers the remaining total of every section the
    /// placed buffer occupies, then lifts the floors of affected sections up
    /// to the minimum offset of their unassigned members.
    fn update_section_data(
        &mut self,
        affected_sections: &HashSet<SectionIdx>,
        buffer_idx: BufferIndex,
    ) -> Vec<SectionChange> {
        let sweep_result = self.sweep_result;
        let mut section_changes = Vec::new();
        let offset = self.assignment[buffer_idx.get()].expect("updating for an unplaced buffer");
        for section_span in &sweep_result.buffer_data[buffer_idx.get()].section_spans {
            let window = section_span.window;
            let height = offset + window.end();
            for s_idx in section_span.section_range.iter() {
                section_changes.push(SectionChange {
                    section_idx: s_idx,
                    floor: self.section_data[s_idx].floor,
                });
                self.section_data[s_idx].floor = height;
                self.section_data[s_idx].total -= window.len();
            }
        }
        // The floor of any section cannot be lower than the smallest minimum
        // offset among its unassigned members.
        for &s_idx in affected_sections {
            let mut min_offset = Offset::MAX;
            for other_idx in sweep_result.sections[s_idx].ones() {
                if self.assignment[other_idx].is_none() {
                    min_offset = min_offset.min(self.min_offsets[other_idx]);
                }
            }
            if min_offset != Offset::MAX && self.section_data[s_idx].floor < min_offset {
                section_changes.push(SectionChange {
                    section_idx: s_idx,
                    floor: self.section_data[s_idx].floor,
                });
                self.section_data[s_idx].floor = min_offset;
            }
        }
        section_changes
    }

    /// Restores the section data by replaying the floor change log in
    /// reverse, then reversing the total decrements.
    fn restore_section_data(&mut self, section_changes: &[SectionChange], buffer_idx: BufferIndex) {
        for change in section_changes.iter().rev() {
            self.section_data[change.section_idx].floor = change.floor;
        }
        let sweep_result = self.sweep_result;
        for section_span in &sweep_result.buffer_data[buffer_idx.get()].section_spans {
            for s_idx in section_span.section_range.iter() {
                self.section_data[s_idx].total += section_span.window.len();
            }
        }
    }

    /// Returns `true` if the partial solution passes the per-section
    /// consistency and inference checks for this partition.
    fn check(&self, partition: &Partition, offset: Offset) -> bool {
        for s_idx in partition.section_range.iter() {
            let SectionData { mut floor, total } = self.section_data[s_idx];
            if self.params.monotonic_floor {
                floor = floor.max(offset);
            }
            if self.params.section_inference {
                floor += total;
            }
            if self.problem.capacity < floor {
                return false;
            }
        }
        true
    }

    /// Sweeps the final offsets to compute the solution height.
    fn update_solution_height(&mut self) {
        for (idx, buffer) in self.problem.buffers.iter().enumerate() {
            self.solution.height = self
                .solution
                .height
                .max(self.solution.offsets[idx] + buffer.size);
        }
    }
}
