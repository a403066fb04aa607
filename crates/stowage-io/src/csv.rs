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

use rangemap::RangeSet;
use regex::Regex;
use std::collections::HashMap;
use stowage_model::{
    buffer::{Buffer, Gap},
    problem::{Problem, Solution},
    Lifespan, Offset, Window,
};

const ALIGNMENT: &str = "alignment";
const BEGIN: &str = "begin";
const BUFFER: &str = "buffer";
const BUFFER_ID: &str = "buffer_id";
const END: &str = "end";
const GAPS: &str = "gaps";
const HINT: &str = "hint";
const ID: &str = "id";
const LOWER: &str = "lower";
const OFFSET: &str = "offset";
const SIZE: &str = "size";
const START: &str = "start";
const UPPER: &str = "upper";

/// The error type for CSV problem parsing.
///
/// `MissingColumn` is the not-found case of the taxonomy; every other
/// variant reports invalid input, with a message naming the offending field.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CsvReadError {
    /// A required column is absent from the header row.
    MissingColumn(&'static str),
    /// Two header columns resolve to the same canonical name.
    DuplicateColumn,
    /// A data row carries a different number of fields than the header.
    FieldCountMismatch {
        /// One-based data row number.
        row: usize,
    },
    /// A field could not be parsed as an integer.
    InvalidInteger {
        field: &'static str,
        token: String,
    },
    /// A gap specification does not match `L-U` or `L-U@WL:WU`.
    InvalidGap { token: String },
    /// Two gaps of the same buffer overlap in time.
    OverlappingGaps { id: String },
}

impl std::fmt::Display for CsvReadError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CsvReadError::MissingColumn(column) => {
                write!(f, "Required column '{}' is missing", column)
            }
            CsvReadError::DuplicateColumn => write!(f, "Duplicate column names"),
            CsvReadError::FieldCountMismatch { row } => {
                write!(f, "Row {} has the wrong number of fields", row)
            }
            CsvReadError::InvalidInteger { field, token } => {
                write!(f, "Improperly formed {}: '{}'", field, token)
            }
            CsvReadError::InvalidGap { token } => {
                write!(f, "Improperly formed gap: '{}'", token)
            }
            CsvReadError::OverlappingGaps { id } => {
                write!(f, "Buffer '{}' has overlapping gaps", id)
            }
        }
    }
}

impl std::error::Error for CsvReadError {}

fn parse_integer(field: &'static str, token: &str) -> Result<i64, CsvReadError> {
    token.parse::<i64>().map_err(|_| CsvReadError::InvalidInteger {
        field,
        token: token.to_string(),
    })
}

/// Given a CSV with buffers listed in any order, converts it into a
/// `Problem` (without a capacity, which lives outside the file format).
///
/// Header aliases: `buffer` and `buffer_id` map to `id`; `start` and `begin`
/// map to `lower`; `end` maps to `upper` and marks the file as legacy, with
/// inclusive upper bounds that are adjusted by one on read (for gap upper
/// bounds too). Required columns: `id`, `lower`, `upper`, `size`. Optional:
/// `alignment` (default 1), `hint` (negative means absent), `gaps`, and
/// `offset` (stored into each buffer's fixed offset).
///
/// # Examples
///
/// ```rust
/// # use stowage_io::from_csv;
///
/// let problem = from_csv("id,lower,upper,size\na,5,10,15\n").unwrap();
/// assert_eq!(problem.buffers.len(), 1);
/// assert_eq!(problem.buffers[0].size, 15);
/// ```
pub fn from_csv(input: &str) -> Result<Problem, CsvReadError> {
    let gap_pattern =
        Regex::new(r"^(\d+)-(\d+)(?:@(\d+):(\d+))?$").expect("the gap pattern is well formed");
    let mut addend: i64 = 0;
    let mut problem = Problem::default();
    let mut col_map: HashMap<&str, usize> = HashMap::new();
    let mut row = 0;
    for record in input.split('\n') {
        if record.is_empty() {
            break;
        }
        let fields: Vec<&str> = record.split(',').collect();
        if col_map.is_empty() {
            // Read the header row to determine the column layout.
            for (field_idx, &col_name) in fields.iter().enumerate() {
                let canonical = match col_name {
                    BEGIN | START => LOWER,
                    BUFFER | BUFFER_ID => ID,
                    END => {
                        // Values of an `end` column are off-by-one inclusive.
                        addend = 1;
                        UPPER
                    }
                    other => other,
                };
                col_map.insert(canonical, field_idx);
            }
            if col_map.len() != fields.len() {
                return Err(CsvReadError::DuplicateColumn);
            }
            for required in [ID, LOWER, UPPER, SIZE] {
                if !col_map.contains_key(required) {
                    return Err(CsvReadError::MissingColumn(required));
                }
            }
            continue;
        }
        row += 1;
        if fields.len() != col_map.len() {
            return Err(CsvReadError::FieldCountMismatch { row });
        }

        let id = fields[col_map[ID]].to_string();
        let lower = parse_integer(LOWER, fields[col_map[LOWER]])?;
        let upper = parse_integer(UPPER, fields[col_map[UPPER]])?;
        let size = parse_integer(SIZE, fields[col_map[SIZE]])?;
        let mut alignment = 1;
        if let Some(&field_idx) = col_map.get(ALIGNMENT) {
            alignment = parse_integer(ALIGNMENT, fields[field_idx])?;
        }
        let mut hint: Option<Offset> = None;
        if let Some(&field_idx) = col_map.get(HINT) {
            let hint_value = parse_integer(HINT, fields[field_idx])?;
            if hint_value >= 0 {
                hint = Some(hint_value);
            }
        }
        let mut gaps: Vec<Gap> = Vec::new();
        if let Some(&field_idx) = col_map.get(GAPS) {
            let mut occupied: RangeSet<i64> = RangeSet::new();
            for token in fields[field_idx].split(' ').filter(|t| !t.is_empty()) {
                let captures =
                    gap_pattern
                        .captures(token)
                        .ok_or_else(|| CsvReadError::InvalidGap {
                            token: token.to_string(),
                        })?;
                let gap_lower = parse_integer(GAPS, &captures[1])?;
                let gap_upper = parse_integer(GAPS, &captures[2])? + addend;
                let lifespan =
                    Lifespan::try_new(gap_lower, gap_upper).ok_or(CsvReadError::InvalidGap {
                        token: token.to_string(),
                    })?;
                let window = match (captures.get(3), captures.get(4)) {
                    (Some(window_lower), Some(window_upper)) => Some(
                        Window::try_new(
                            parse_integer(GAPS, window_lower.as_str())?,
                            parse_integer(GAPS, window_upper.as_str())?,
                        )
                        .ok_or(CsvReadError::InvalidGap {
                            token: token.to_string(),
                        })?,
                    ),
                    _ => None,
                };
                if gap_lower < gap_upper {
                    if occupied.overlaps(&(gap_lower..gap_upper)) {
                        return Err(CsvReadError::OverlappingGaps { id });
                    }
                    occupied.insert(gap_lower..gap_upper);
                }
                gaps.push(Gap { lifespan, window });
            }
        }
        let mut offset: Option<Offset> = None;
        if let Some(&field_idx) = col_map.get(OFFSET) {
            offset = Some(parse_integer(OFFSET, fields[field_idx])?);
        }
        problem.buffers.push(Buffer {
            id,
            lifespan: Lifespan::try_new(lower, upper + addend).ok_or(
                CsvReadError::InvalidInteger {
                    field: UPPER,
                    token: upper.to_string(),
                },
            )?,
            size,
            alignment,
            gaps,
            offset,
            hint,
        });
    }
    if col_map.is_empty() {
        return Err(CsvReadError::MissingColumn(ID));
    }
    Ok(problem)
}

fn include_alignment(problem: &Problem) -> bool {
    problem.buffers.iter().any(|buffer| buffer.alignment != 1)
}

fn include_hint(problem: &Problem) -> bool {
    problem.buffers.iter().any(|buffer| buffer.hint.is_some())
}

fn include_gaps(problem: &Problem) -> bool {
    problem.buffers.iter().any(|buffer| !buffer.gaps.is_empty())
}

fn to_csv_impl(problem: &Problem, solution: Option<&Solution>, legacy: bool) -> String {
    let include_alignment = include_alignment(problem);
    let include_hint = include_hint(problem);
    let include_gaps = include_gaps(problem);
    let addend: i64 = if legacy { -1 } else { 0 };

    let mut header = vec![
        ID.to_string(),
        (if legacy { START } else { LOWER }).to_string(),
        (if legacy { END } else { UPPER }).to_string(),
        SIZE.to_string(),
    ];
    if include_alignment {
        header.push(ALIGNMENT.to_string());
    }
    if include_hint {
        header.push(HINT.to_string());
    }
    if include_gaps {
        header.push(GAPS.to_string());
    }
    if solution.is_some() {
        header.push(OFFSET.to_string());
    }

    let mut records = vec![header];
    for (buffer_idx, buffer) in problem.buffers.iter().enumerate() {
        let gaps: Vec<String> = buffer
            .gaps
            .iter()
            .map(|gap| {
                let mut spec = format!(
                    "{}-{}",
                    gap.lifespan.start(),
                    gap.lifespan.end() + addend
                );
                if let Some(window) = gap.window {
                    spec.push_str(&format!("@{}:{}", window.start(), window.end()));
                }
                spec
            })
            .collect();
        let mut record = vec![
            buffer.id.clone(),
            buffer.lifespan.start().to_string(),
            (buffer.lifespan.end() + addend).to_string(),
            buffer.size.to_string(),
        ];
        if include_alignment {
            record.push(buffer.alignment.to_string());
        }
        if include_hint {
            record.push(buffer.hint.unwrap_or(-1).to_string());
        }
        if include_gaps {
            record.push(gaps.join(" "));
        }
        if let Some(solution) = solution {
            record.push(solution.offsets[buffer_idx].to_string());
        }
        records.push(record);
    }

    let mut output = String::new();
    for record in records {
        output.push_str(&record.join(","));
        output.push('\n');
    }
    output
}

/// Converts a problem, along with an optional solution, into a CSV like
/// this:
///
/// ```text
/// id,lower,upper,size,alignment
/// 0,10,20,1,1
/// 1,20,40,2,1
/// 2,10,40,3,2
/// ```
///
/// Optional columns appear only when some buffer exercises the feature. If a
/// solution is provided, an additional `offset` column is emitted.
pub fn to_csv(problem: &Problem, solution: Option<&Solution>) -> String {
    to_csv_impl(problem, solution, false)
}

/// Like [`to_csv`], but writes the legacy format with `start`/`end` columns
/// whose `end` values (and gap upper bounds) are inclusive.
pub fn to_legacy_csv(problem: &Problem, solution: Option<&Solution>) -> String {
    to_csv_impl(problem, solution, true)
}
