//! Matrix Market `.mtx` and `.ttx` files
//!
//! ```text
//! %%MatrixMarket matrix coordinate real general
//! % comment
//! 3 3 2
//! 1 1 1.0
//! 3 2 4.0
//! ```
//!
//! `coordinate` files list extents then the record count on the size line;
//! `array` files list extents only and store every value in column-major
//! order. `symmetric` matrices store the lower triangle.

use std::io::{BufRead, Write};

use super::{Parsed, coordinate, field};
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Layout {
    Coordinate,
    Array,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    Real,
    Integer,
    Pattern,
}

#[derive(Debug)]
struct Header {
    layout: Layout,
    field: Field,
    symmetric: bool,
}

fn parse_header(line: &str) -> Result<Header> {
    let parse_error = |reason: String| Error::Parse { line: 1, reason };
    let words: Vec<String> = line.split_whitespace().map(str::to_ascii_lowercase).collect();
    if words.first().map(String::as_str) != Some("%%matrixmarket") || words.len() < 5 {
        return Err(parse_error(format!("not a Matrix Market header: '{line}'")));
    }
    let layout = match words[2].as_str() {
        "coordinate" => Layout::Coordinate,
        "array" => Layout::Array,
        other => return Err(parse_error(format!("unknown layout '{other}'"))),
    };
    let field = match words[3].as_str() {
        "real" | "double" => Field::Real,
        "integer" => Field::Integer,
        "pattern" => Field::Pattern,
        other => return Err(parse_error(format!("unsupported field '{other}'"))),
    };
    let symmetric = match words[4].as_str() {
        "general" => false,
        "symmetric" => true,
        other => return Err(parse_error(format!("unsupported symmetry '{other}'"))),
    };
    if layout == Layout::Array && field == Field::Pattern {
        return Err(parse_error("array files cannot be pattern".into()));
    }
    Ok(Header {
        layout,
        field,
        symmetric,
    })
}

pub(super) fn parse<R: BufRead>(reader: R) -> Result<Parsed> {
    let mut lines = reader
        .lines()
        .enumerate()
        .map(|(n, line)| line.map(|text| (n + 1, text)));

    let (_, first) = lines.next().transpose()?.ok_or_else(|| Error::Parse {
        line: 1,
        reason: "empty file".into(),
    })?;
    let header = parse_header(&first)?;

    let mut records = Vec::new();
    for line in lines {
        let (number, text) = line?;
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed.starts_with('%') {
            continue;
        }
        records.push((number, trimmed.to_string()));
    }
    let mut records = records.into_iter();
    let (size_line, size) = records.next().ok_or_else(|| Error::Parse {
        line: 1,
        reason: "missing size line".into(),
    })?;
    let sizes = size
        .split_whitespace()
        .map(|token| field::<usize>(Some(token), size_line, "size"))
        .collect::<Result<Vec<usize>>>()?;

    let mut parsed = Parsed::default();
    match header.layout {
        Layout::Coordinate => {
            let (nnz, dims) = sizes.split_last().ok_or_else(|| Error::Parse {
                line: size_line,
                reason: "empty size line".into(),
            })?;
            parsed.dims = dims.to_vec();
            // the size line is untrusted; never reserve past the records present
            parsed.entries.reserve((*nnz).min(records.len()));
            let mut read = 0usize;
            for (number, record) in records.take(*nnz) {
                read += 1;
                let mut tokens = record.split_whitespace();
                let mut coords = Vec::with_capacity(parsed.dims.len());
                for &extent in &parsed.dims {
                    let c = coordinate(field(tokens.next(), number, "coordinate")?, number)?;
                    if c as usize >= extent {
                        return Err(Error::Parse {
                            line: number,
                            reason: format!("coordinate {} exceeds extent {extent}", c + 1),
                        });
                    }
                    coords.push(c);
                }
                let value: f64 = match header.field {
                    Field::Pattern => 1.0,
                    Field::Real | Field::Integer => field(tokens.next(), number, "value")?,
                };
                push(&mut parsed, header.symmetric, coords, value);
            }
            if read < *nnz {
                return Err(Error::Parse {
                    line: size_line,
                    reason: format!("expected {nnz} records, found {read}"),
                });
            }
        }
        Layout::Array => {
            parsed.dims = sizes;
            let total: usize = parsed.dims.iter().product();
            let mut seen = 0usize;
            for (number, record) in records {
                for token in record.split_whitespace() {
                    if seen == total {
                        break;
                    }
                    let value: f64 = field(Some(token), number, "value")?;
                    // column-major: first mode varies fastest
                    let mut rest = seen;
                    let coords: Vec<i32> = parsed
                        .dims
                        .iter()
                        .map(|&extent| {
                            let c = rest % extent;
                            rest /= extent;
                            c as i32
                        })
                        .collect();
                    seen += 1;
                    if value != 0.0 {
                        push(&mut parsed, header.symmetric, coords, value);
                    }
                }
            }
            if seen < total {
                return Err(Error::Parse {
                    line: size_line,
                    reason: format!("expected {total} values, found {seen}"),
                });
            }
        }
    }
    Ok(parsed)
}

fn push(parsed: &mut Parsed, symmetric: bool, coords: Vec<i32>, value: f64) {
    if symmetric && coords.len() == 2 && coords[0] != coords[1] {
        parsed.entries.push((vec![coords[1], coords[0]], value));
    }
    parsed.entries.push((coords, value));
}

pub(super) fn emit<W: Write>(
    writer: &mut W,
    object: &str,
    dims: &[usize],
    entries: &[(Vec<i32>, f64)],
) -> Result<()> {
    writeln!(writer, "%%MatrixMarket {object} coordinate real general")?;
    for d in dims {
        write!(writer, "{d} ")?;
    }
    writeln!(writer, "{}", entries.len())?;
    for (coords, value) in entries {
        for c in coords {
            write!(writer, "{} ", c + 1)?;
        }
        writeln!(writer, "{value}")?;
    }
    Ok(())
}
