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

//! Reads an allocation problem from CSV, solves it, and writes the problem
//! back out with an `offset` column. Exits 0 on success and 1 on any parse
//! or solve failure.

use clap::{ArgAction, Parser};
use std::{path::PathBuf, process::ExitCode, time::Duration, time::Instant};
use stowage_io::{from_csv, to_csv};
use stowage_solver::{
    params::SolverParams,
    solver::Solver,
    validate::{validate, ValidationResult},
};

#[derive(Parser, Debug)]
#[command(name = "stowage", about = "An offline static memory allocator.")]
struct Args {
    /// The path to the input CSV file.
    #[arg(long = "input")]
    input: PathBuf,

    /// The path to the output CSV file.
    #[arg(long = "output")]
    output: PathBuf,

    /// The maximum memory capacity.
    #[arg(long = "capacity", default_value_t = 0)]
    capacity: i64,

    /// The time limit enforced for the solver, in seconds.
    #[arg(long = "timeout")]
    timeout: Option<f64>,

    /// Validates the solver's output.
    #[arg(long = "validate", default_value_t = false)]
    validate: bool,

    /// Explores canonical solutions only.
    #[arg(long = "canonical_only", default_value_t = true, action = ArgAction::Set)]
    canonical_only: bool,

    /// Performs advanced section inference.
    #[arg(long = "section_inference", default_value_t = true, action = ArgAction::Set)]
    section_inference: bool,

    /// Dynamically orders buffers during search.
    #[arg(long = "dynamic_ordering", default_value_t = true, action = ArgAction::Set)]
    dynamic_ordering: bool,

    /// Checks for dominated solutions that leave gaps in the allocation.
    #[arg(long = "check_dominance", default_value_t = true, action = ArgAction::Set)]
    check_dominance: bool,

    /// Uses minimum offsets to establish lower bounds on section floors.
    #[arg(long = "unallocated_floor", default_value_t = true, action = ArgAction::Set)]
    unallocated_floor: bool,

    /// Statically preorders buffers.
    #[arg(long = "static_preordering", default_value_t = true, action = ArgAction::Set)]
    static_preordering: bool,

    /// Dynamically decomposes partitions during search.
    #[arg(long = "dynamic_decomposition", default_value_t = true, action = ArgAction::Set)]
    dynamic_decomposition: bool,

    /// Requires the solution floor to increase monotonically.
    #[arg(long = "monotonic_floor", default_value_t = true, action = ArgAction::Set)]
    monotonic_floor: bool,

    /// Prunes alternate offsets for buffers with nothing overhead.
    #[arg(long = "hatless_pruning", default_value_t = true, action = ArgAction::Set)]
    hatless_pruning: bool,

    /// Minimizes the allocated space instead of accepting any fit.
    #[arg(long = "minimize_capacity", default_value_t = false, action = ArgAction::Set)]
    minimize_capacity: bool,

    /// Static preordering heuristics to attempt, comma-joined.
    #[arg(long = "preordering_heuristics", default_value = "WAT,TAW,TWA")]
    preordering_heuristics: String,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt::init();
    let args = Args::parse();

    let params = SolverParams {
        timeout: args.timeout.map(Duration::from_secs_f64),
        canonical_only: args.canonical_only,
        section_inference: args.section_inference,
        dynamic_ordering: args.dynamic_ordering,
        check_dominance: args.check_dominance,
        unallocated_floor: args.unallocated_floor,
        static_preordering: args.static_preordering,
        dynamic_decomposition: args.dynamic_decomposition,
        monotonic_floor: args.monotonic_floor,
        hatless_pruning: args.hatless_pruning,
        minimize_capacity: args.minimize_capacity,
        preordering_heuristics: args
            .preordering_heuristics
            .split(',')
            .filter(|heuristic| !heuristic.is_empty())
            .map(str::to_string)
            .collect(),
    };

    let csv = match std::fs::read_to_string(&args.input) {
        Ok(csv) => csv,
        Err(err) => {
            eprintln!("failed to read {}: {}", args.input.display(), err);
            return ExitCode::FAILURE;
        }
    };
    let mut problem = match from_csv(&csv) {
        Ok(problem) => problem,
        Err(err) => {
            eprintln!("failed to parse {}: {}", args.input.display(), err);
            return ExitCode::FAILURE;
        }
    };
    problem.capacity = args.capacity;

    let mut solver = Solver::with_params(params);
    let start = Instant::now();
    let result = solver.solve(&problem);
    eprintln!("{:.3}", start.elapsed().as_secs_f64());
    let solution = match result {
        Ok(solution) => solution,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::FAILURE;
        }
    };

    if args.validate {
        let verdict = validate(&problem, &solution);
        eprintln!(
            "{}",
            if verdict == ValidationResult::Good {
                "PASS"
            } else {
                "FAIL"
            }
        );
    }

    if let Err(err) = std::fs::write(&args.output, to_csv(&problem, Some(&solution))) {
        eprintln!("failed to write {}: {}", args.output.display(), err);
        return ExitCode::FAILURE;
    }
    ExitCode::SUCCESS
}
