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

use crate::{params::SolverParams, result::SolveError, search::SearchContext};
use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    time::Instant,
};
use stowage_model::{
    index::BufferIndex,
    problem::{Problem, Solution},
    Capacity,
};
use stowage_sweep::sweep::sweep;
use tracing::debug;

/// The solver driver: runs the sweeper, dispatches into the search core
/// (with a single heuristic or the round robin), and optionally
/// binary-searches the smallest feasible capacity.
///
/// A `Solver` is single-threaded and fully synchronous. The only
/// cross-thread interaction is cancellation: clone the flag via
/// [`Solver::cancel_handle`] and set it from anywhere; the search polls it
/// on every node and winds down with
/// [`SolveError::DeadlineExceeded`].
pub struct Solver {
    params: SolverParams,
    backtracks: i64,
    cancelled: Arc<AtomicBool>,
}

impl Default for Solver {
    fn default() -> Self {
        Self::new()
    }
}

impl Solver {
    /// Creates a solver with the default parameters.
    #[inline]
    pub fn new() -> Self {
        Self::with_params(SolverParams::default())
    }

    /// Creates a solver with the given parameters.
    #[inline]
    pub fn with_params(params: SolverParams) -> Self {
        Self {
            params,
            backtracks: 0,
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Returns the parameters this solver was configured with.
    #[inline]
    pub fn params(&self) -> &SolverParams {
        &self.params
    }

    /// Returns the number of backtracks in the solver's latest invocation.
    #[inline]
    pub fn backtracks(&self) -> i64 {
        self.backtracks
    }

    /// Requests cancellation of a search currently in flight.
    #[inline]
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Relaxed);
    }

    /// Returns a handle that other threads may use to cancel the search.
    #[inline]
    pub fn cancel_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.cancelled)
    }

    /// Solves the given problem: either finds an offset assignment within
    /// `problem.capacity`, or proves that none exists.
    ///
    /// # Examples
    ///
    /// ```rust
    /// # use stowage_core::math::interval::ClosedOpenInterval;
    /// # use stowage_model::{buffer::Buffer, problem::Problem};
    /// # use stowage_solver::solver::Solver;
    ///
    /// let problem = Problem {
    ///     buffers: vec![Buffer {
    ///         lifespan: ClosedOpenInterval::new(0, 2),
    ///         size: 2,
    ///         ..Default::default()
    ///     }],
    ///     capacity: 2,
    /// };
    /// let mut solver = Solver::new();
    /// let solution = solver.solve(&problem).expect("a single buffer fits");
    /// assert_eq!(solution.offsets, vec![0]);
    /// assert_eq!(solution.height, 2);
    /// ```
    pub fn solve(&mut self, problem: &Problem) -> Result<Solution, SolveError> {
        self.backtracks = 0;
        self.cancelled.store(false, Ordering::Relaxed);
        self.solve_with_start_time(problem, Instant::now())
    }

    /// Computes an irreducible infeasible subset of buffers by a linear
    /// deletion filter: for each buffer in turn, tentatively drop it and
    /// re-solve; if the subproblem becomes feasible the buffer is essential
    /// and stays, otherwise it is discarded for good.
    ///
    /// The start time is shared across all inner solves so that the
    /// configured timeout bounds the whole reduction; a deadline hit inside
    /// any solve surfaces as [`SolveError::DeadlineExceeded`].
    ///
    /// The returned subset is irreducible in the sense that removing any of
    /// its members yields a feasible subproblem.
    pub fn compute_irreducible_infeasible_subset(
        &mut self,
        problem: &Problem,
    ) -> Result<Vec<BufferIndex>, SolveError> {
        self.backtracks = 0;
        self.cancelled.store(false, Ordering::Relaxed);
        let start_time = Instant::now();
        let mut include = vec![true; problem.buffers.len()];
        let mut subset = Vec::new();
        for buffer_idx in 0..problem.buffers.len() {
            // Try removing this buffer from the problem.
            include[buffer_idx] = false;
            let subproblem = Problem {
                buffers: problem
                    .buffers
                    .iter()
                    .enumerate()
                    .filter(|(idx, _)| include[*idx])
                    .map(|(_, buffer)| buffer.clone())
                    .collect(),
                capacity: problem.capacity,
            };
            match self.solve_with_start_time(&subproblem, start_time) {
                Ok(_) => {
                    include[buffer_idx] = true;
                    subset.push(BufferIndex::new(buffer_idx));
                }
                Err(SolveError::DeadlineExceeded) => return Err(SolveError::DeadlineExceeded),
                Err(SolveError::Infeasible) => {}
            }
        }
        Ok(subset)
    }

    fn solve_with_start_time(
        &mut self,
        problem: &Problem,
        start_time: Instant,
    ) -> Result<Solution, SolveError> {
        let sweep_result = sweep(problem);
        if !self.params.minimize_capacity {
            return SearchContext::new(
                &self.params,
                start_time,
                problem,
                &sweep_result,
                &mut self.backtracks,
                &self.cancelled,
            )
            .run();
        }

        // Binary-search the minimum viable capacity. The sweep only depends
        // on the time axis, so one decomposition serves every probe.
        let mut scratch = problem.clone();
        let mut best: Result<Solution, SolveError> = Err(SolveError::Infeasible);
        let mut lo: Capacity = 0;
        let mut hi: Capacity = problem.capacity;
        while lo <= hi {
            let mid = lo + (hi - lo) / 2;
            scratch.capacity = mid;
            let attempt = SearchContext::new(
                &self.params,
                start_time,
                &scratch,
                &sweep_result,
                &mut self.backtracks,
                &self.cancelled,
            )
            .run();
            match attempt {
                Ok(solution) => {
                    debug!(capacity = mid, height = solution.height, "probe feasible");
                    hi = solution.height - 1;
                    best = Ok(solution);
                }
                Err(SolveError::Infeasible) => {
                    debug!(capacity = mid, "probe infeasible");
                    lo = mid + 1;
                }
                Err(SolveError::DeadlineExceeded) => return Err(SolveError::DeadlineExceeded),
            }
        }
        best
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::{validate, ValidationResult};
    use std::time::Duration;
    use stowage_core::math::interval::ClosedOpenInterval;
    use stowage_model::buffer::{Buffer, Gap};

    fn iv(lower: i64, upper: i64) -> ClosedOpenInterval<i64> {
        ClosedOpenInterval::new(lower, upper)
    }

    fn plain(lower: i64, upper: i64, size: i64) -> Buffer {
        Buffer {
            lifespan: iv(lower, upper),
            size,
            ..Default::default()
        }
    }

    fn disabled_params() -> SolverParams {
        SolverParams {
            timeout: None,
            canonical_only: false,
            section_inference: false,
            dynamic_ordering: false,
            check_dominance: false,
            unallocated_floor: false,
            static_preordering: false,
            dynamic_decomposition: false,
            monotonic_floor: false,
            hatless_pruning: false,
            minimize_capacity: false,
            preordering_heuristics: vec!["TWA".to_string()],
        }
    }

    /// Every combination of the eight technique switches plus capacity
    /// minimization (hatless pruning stays off, matching the reference
    /// checker's assumptions about exhaustive search).
    fn param_grid() -> Vec<SolverParams> {
        let mut grid = Vec::with_capacity(512);
        for bits in 0..512u32 {
            grid.push(SolverParams {
                timeout: None,
                canonical_only: bits & 1 != 0,
                section_inference: bits & 2 != 0,
                dynamic_ordering: bits & 4 != 0,
                check_dominance: bits & 8 != 0,
                unallocated_floor: bits & 16 != 0,
                static_preordering: bits & 32 != 0,
                dynamic_decomposition: bits & 64 != 0,
                monotonic_floor: bits & 128 != 0,
                hatless_pruning: false,
                minimize_capacity: bits & 256 != 0,
                preordering_heuristics: vec!["TWA".to_string()],
            });
        }
        grid
    }

    fn assert_feasible_under_all_params(problem: &Problem) {
        for params in param_grid() {
            let mut solver = Solver::with_params(params.clone());
            let solution = solver
                .solve(problem)
                .unwrap_or_else(|err| panic!("expected feasible under {:?}: {}", params, err));
            assert_eq!(
                validate(problem, &solution),
                ValidationResult::Good,
                "solver and validator disagree under {:?}",
                params
            );
        }
    }

    fn assert_infeasible_under_all_params(problem: &Problem) {
        for params in param_grid() {
            let mut solver = Solver::with_params(params.clone());
            let result = solver.solve(problem);
            assert_eq!(
                result,
                Err(SolveError::Infeasible),
                "expected infeasible under {:?}",
                params
            );
            assert!(solver.backtracks() > 0);
        }
    }

    #[test]
    fn test_infeasible_buffer_too_big() {
        let problem = Problem {
            buffers: vec![plain(0, 2, 3)],
            capacity: 2,
        };
        assert_infeasible_under_all_params(&problem);
    }

    #[test]
    fn test_infeasible_trivial() {
        let problem = Problem {
            buffers: vec![plain(0, 2, 2), plain(0, 2, 2)],
            capacity: 3,
        };
        assert_infeasible_under_all_params(&problem);
    }

    #[test]
    fn test_infeasible_tricky() {
        let problem = Problem {
            buffers: vec![
                plain(0, 1, 3),
                plain(0, 3, 1),
                plain(4, 5, 3),
                plain(2, 5, 1),
                plain(1, 2, 2),
                plain(3, 4, 2),
                plain(1, 4, 1),
            ],
            capacity: 4,
        };
        assert_infeasible_under_all_params(&problem);
    }

    #[test]
    fn test_empty_problem() {
        let problem = Problem::default();
        for params in param_grid() {
            let mut solver = Solver::with_params(params);
            let solution = solver.solve(&problem).expect("empty problems are feasible");
            assert!(solution.offsets.is_empty());
            assert_eq!(solution.height, 0);
        }
    }

    #[test]
    fn test_single_buffer() {
        let problem = Problem {
            buffers: vec![plain(0, 2, 2)],
            capacity: 2,
        };
        assert_feasible_under_all_params(&problem);

        let mut solver = Solver::new();
        let solution = solver.solve(&problem).expect("fits exactly");
        assert_eq!(solution.offsets, vec![0]);
        assert_eq!(solution.height, 2);
    }

    #[test]
    fn test_two_buffers() {
        let problem = Problem {
            buffers: vec![plain(0, 2, 2), plain(1, 3, 2)],
            capacity: 4,
        };
        assert_feasible_under_all_params(&problem);
    }

    #[test]
    fn test_five_buffers() {
        let problem = Problem {
            buffers: vec![
                plain(1, 2, 1),
                plain(0, 2, 1),
                plain(2, 3, 2),
                plain(1, 3, 1),
                plain(0, 1, 2),
            ],
            capacity: 3,
        };
        assert_feasible_under_all_params(&problem);
    }

    #[test]
    fn test_fixed_buffer_feasible() {
        let mut fixed = plain(2, 3, 2);
        fixed.offset = Some(1);
        let problem = Problem {
            buffers: vec![
                plain(1, 2, 1),
                plain(0, 2, 1),
                fixed,
                plain(1, 3, 1),
                plain(0, 1, 2),
            ],
            capacity: 3,
        };
        for params in param_grid() {
            let mut solver = Solver::with_params(params);
            let solution = solver.solve(&problem).expect("fixed offset is satisfiable");
            assert_eq!(solution.offsets[2], 1);
            assert_eq!(validate(&problem, &solution), ValidationResult::Good);
        }
    }

    #[test]
    fn test_fixed_buffer_infeasible() {
        let mut fixed = plain(1, 2, 1);
        fixed.offset = Some(0);
        let problem = Problem {
            buffers: vec![
                fixed,
                plain(0, 2, 1),
                plain(2, 3, 2),
                plain(1, 3, 1),
                plain(0, 1, 2),
            ],
            capacity: 3,
        };
        assert_infeasible_under_all_params(&problem);
    }

    #[test]
    fn test_two_partitions() {
        let problem = Problem {
            buffers: vec![
                plain(0, 2, 2),
                plain(1, 3, 2),
                plain(3, 5, 2),
                plain(4, 6, 2),
            ],
            capacity: 4,
        };
        assert_feasible_under_all_params(&problem);
    }

    #[test]
    fn test_even_alignment() {
        let mut first = plain(0, 2, 1);
        first.alignment = 2;
        let mut second = plain(0, 2, 1);
        second.alignment = 2;
        let problem = Problem {
            buffers: vec![first, second],
            capacity: 4,
        };
        assert_feasible_under_all_params(&problem);
    }

    #[test]
    fn test_buffers_with_gaps() {
        let problem = Problem {
            buffers: vec![
                Buffer {
                    lifespan: iv(0, 4),
                    size: 2,
                    gaps: vec![Gap {
                        lifespan: iv(1, 3),
                        window: None,
                    }],
                    ..Default::default()
                },
                plain(1, 3, 2),
            ],
            capacity: 2,
        };
        assert_feasible_under_all_params(&problem);
    }

    #[test]
    fn test_tetris() {
        let problem = Problem {
            buffers: vec![
                Buffer {
                    lifespan: iv(0, 10),
                    size: 2,
                    gaps: vec![Gap {
                        lifespan: iv(0, 5),
                        window: Some(iv(0, 1)),
                    }],
                    ..Default::default()
                },
                Buffer {
                    lifespan: iv(0, 10),
                    size: 2,
                    gaps: vec![Gap {
                        lifespan: iv(5, 10),
                        window: Some(iv(1, 2)),
                    }],
                    ..Default::default()
                },
            ],
            capacity: 3,
        };
        assert_feasible_under_all_params(&problem);

        // A naive packer needs four units; interlocked windows fit in three.
        let mut solver = Solver::new();
        let solution = solver.solve(&problem).expect("windows interlock");
        assert_eq!(solution.height, 3);
    }

    #[test]
    fn test_stairs() {
        let staircase = |lifespan: ClosedOpenInterval<i64>, size, gaps: Vec<Gap>| Buffer {
            lifespan,
            size,
            gaps,
            ..Default::default()
        };
        let problem = Problem {
            buffers: vec![
                staircase(
                    iv(0, 108),
                    30,
                    vec![
                        Gap {
                            lifespan: iv(36, 72),
                            window: Some(iv(10, 30)),
                        },
                        Gap {
                            lifespan: iv(72, 108),
                            window: Some(iv(20, 30)),
                        },
                    ],
                ),
                staircase(
                    iv(36, 144),
                    50,
                    vec![
                        Gap {
                            lifespan: iv(36, 72),
                            window: Some(iv(20, 30)),
                        },
                        Gap {
                            lifespan: iv(72, 108),
                            window: Some(iv(10, 40)),
                        },
                    ],
                ),
                staircase(
                    iv(84, 144),
                    42,
                    vec![
                        Gap {
                            lifespan: iv(114, 129),
                            window: Some(iv(0, 28)),
                        },
                        Gap {
                            lifespan: iv(129, 144),
                            window: Some(iv(0, 14)),
                        },
                    ],
                ),
                staircase(
                    iv(84, 129),
                    42,
                    vec![
                        Gap {
                            lifespan: iv(99, 114),
                            window: Some(iv(14, 42)),
                        },
                        Gap {
                            lifespan: iv(114, 129),
                            window: Some(iv(28, 42)),
                        },
                    ],
                ),
                staircase(
                    iv(99, 144),
                    70,
                    vec![
                        Gap {
                            lifespan: iv(99, 114),
                            window: Some(iv(28, 42)),
                        },
                        Gap {
                            lifespan: iv(114, 129),
                            window: Some(iv(14, 56)),
                        },
                    ],
                ),
                staircase(
                    iv(0, 144),
                    30,
                    vec![
                        Gap {
                            lifespan: iv(72, 108),
                            window: Some(iv(0, 20)),
                        },
                        Gap {
                            lifespan: iv(108, 144),
                            window: Some(iv(0, 10)),
                        },
                    ],
                ),
            ],
            capacity: 144,
        };
        assert_feasible_under_all_params(&problem);
    }

    #[test]
    fn test_counts_backtracks_deterministically() {
        let problem = Problem {
            buffers: vec![plain(0, 2, 2), plain(0, 2, 2)],
            capacity: 3,
        };
        let mut solver = Solver::with_params(disabled_params());
        assert_eq!(solver.solve(&problem), Err(SolveError::Infeasible));
        assert_eq!(solver.backtracks(), 3);
        // Solving again resets the counter rather than accumulating.
        assert_eq!(solver.solve(&problem), Err(SolveError::Infeasible));
        assert_eq!(solver.backtracks(), 3);
    }

    #[test]
    fn test_each_technique_never_increases_backtracks() {
        let problem = Problem {
            buffers: vec![
                plain(2, 3, 2),
                plain(0, 1, 2),
                plain(1, 2, 1),
                plain(0, 2, 1),
                plain(1, 3, 1),
            ],
            capacity: 3,
        };

        let mut disabled_solver = Solver::with_params(disabled_params());
        disabled_solver
            .solve(&problem)
            .expect("feasible with everything disabled");
        let baseline = disabled_solver.backtracks();
        assert!(baseline > 0);

        let enablers: Vec<fn(&mut SolverParams)> = vec![
            |p| p.canonical_only = true,
            |p| p.section_inference = true,
            |p| p.dynamic_ordering = true,
            |p| p.check_dominance = true,
            |p| p.static_preordering = true,
            |p| p.dynamic_decomposition = true,
        ];
        for enable in enablers {
            let mut params = disabled_params();
            enable(&mut params);
            let mut solver = Solver::with_params(params.clone());
            solver
                .solve(&problem)
                .unwrap_or_else(|err| panic!("expected feasible under {:?}: {}", params, err));
            assert!(
                solver.backtracks() <= baseline,
                "{:?} increased backtracks: {} > {}",
                params,
                solver.backtracks(),
                baseline
            );
        }
    }

    #[test]
    fn test_round_robin_multiple_heuristics() {
        let problem = Problem {
            buffers: vec![
                plain(1, 2, 1),
                plain(0, 2, 1),
                plain(2, 3, 2),
                plain(1, 3, 1),
                plain(0, 1, 2),
            ],
            capacity: 3,
        };
        let mut solver = Solver::new(); // defaults: WAT, TAW, TWA
        let solution = solver.solve(&problem).expect("feasible");
        assert_eq!(validate(&problem, &solution), ValidationResult::Good);
    }

    #[test]
    fn test_minimize_capacity_finds_tight_height() {
        let problem = Problem {
            buffers: vec![
                plain(1, 2, 1),
                plain(0, 2, 1),
                plain(2, 3, 2),
                plain(1, 3, 1),
                plain(0, 1, 2),
            ],
            capacity: 100,
        };
        let params = SolverParams {
            minimize_capacity: true,
            ..Default::default()
        };
        let mut solver = Solver::with_params(params);
        let solution = solver.solve(&problem).expect("feasible well below 100");
        // Three units are simultaneously live around t=1, so 3 is optimal.
        assert_eq!(solution.height, 3);
        assert_eq!(validate(&problem, &solution), ValidationResult::Good);
    }

    #[test]
    fn test_hint_acts_as_an_upper_bound() {
        let mut hinted = plain(0, 2, 2);
        hinted.hint = Some(1);
        let problem = Problem {
            buffers: vec![plain(0, 2, 2), hinted],
            capacity: 10,
        };
        let mut solver = Solver::new();
        let solution = solver.solve(&problem).expect("feasible");
        // Candidates above the hint are skipped, so the hinted buffer stays
        // at the bottom of the stack.
        assert_eq!(solution.offsets[1], 0);
        assert_eq!(solution.offsets[0], 2);
        assert_eq!(validate(&problem, &solution), ValidationResult::Good);
    }

    #[test]
    fn test_compute_irreducible_infeasible_subset() {
        let problem = Problem {
            buffers: vec![
                plain(0, 2, 2), // Not part of the IIS.
                plain(0, 2, 2), // Not part of the IIS.
                plain(2, 5, 2), // Part of the IIS.
                plain(3, 6, 2), // Part of the IIS.
                plain(4, 7, 2), // Part of the IIS.
            ],
            capacity: 4,
        };
        let mut solver = Solver::new();
        let subset = solver
            .compute_irreducible_infeasible_subset(&problem)
            .expect("no deadline configured");
        let indices: Vec<usize> = subset.iter().map(|idx| idx.get()).collect();
        assert_eq!(indices, vec![2, 3, 4]);

        // The subset alone is infeasible.
        let restricted = Problem {
            buffers: indices
                .iter()
                .map(|&idx| problem.buffers[idx].clone())
                .collect(),
            capacity: problem.capacity,
        };
        assert_eq!(
            Solver::new().solve(&restricted),
            Err(SolveError::Infeasible)
        );

        // Removing any single member restores feasibility.
        for skip in 0..indices.len() {
            let reduced = Problem {
                buffers: indices
                    .iter()
                    .enumerate()
                    .filter(|(pos, _)| *pos != skip)
                    .map(|(_, &idx)| problem.buffers[idx].clone())
                    .collect(),
                capacity: problem.capacity,
            };
            assert!(Solver::new().solve(&reduced).is_ok());
        }
    }

    #[test]
    fn test_zero_timeout_reports_deadline() {
        let problem = Problem {
            buffers: vec![plain(0, 2, 2)],
            capacity: 2,
        };
        let params = SolverParams {
            timeout: Some(Duration::ZERO),
            ..Default::default()
        };
        let mut solver = Solver::with_params(params);
        assert_eq!(solver.solve(&problem), Err(SolveError::DeadlineExceeded));
    }

    #[test]
    fn test_cancellation_from_another_thread() {
        // A pigeonhole instance whose infeasibility proof is astronomically
        // large with every technique disabled, so the solve cannot finish
        // before the cancellation lands.
        let problem = Problem {
            buffers: (0..30).map(|_| plain(0, 2, 1)).collect(),
            capacity: 29,
        };
        let mut solver = Solver::with_params(disabled_params());
        let handle = solver.cancel_handle();
        let canceller = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(50));
            handle.store(true, std::sync::atomic::Ordering::Relaxed);
        });
        assert_eq!(solver.solve(&problem), Err(SolveError::DeadlineExceeded));
        canceller.join().expect("canceller thread panicked");
    }
}
