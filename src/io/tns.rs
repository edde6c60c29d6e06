//! FROSTT `.tns` files
//!
//! ```text
//! # comment
//! 1 1 1.0
//! 2 3 -4.5
//! ```
//!
//! Extents are not stored; they are the largest coordinate seen per mode.

use std::io::{BufRead, Write};

use super::{Parsed, coordinate, field};
use crate::error::{Error, Result};

pub(super) fn parse<R: BufRead>(reader: R) -> Result<Parsed> {
    let mut parsed = Parsed::default();
    for (number, line) in reader.lines().enumerate() {
        let line = line?;
        let number = number + 1;
        let text = line.trim();
        if text.is_empty() || text.starts_with('#') {
            continue;
        }
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let (value, coords) = tokens.split_last().ok_or_else(|| Error::Parse {
            line: number,
            reason: "empty record".into(),
        })?;
        if parsed.dims.is_empty() && parsed.entries.is_empty() {
            parsed.dims = vec![0; coords.len()];
        } else if coords.len() != parsed.dims.len() {
            return Err(Error::Parse {
                line: number,
                reason: format!("expected {} coordinates, got {}", parsed.dims.len(), coords.len()),
            });
        }
        let mut coordinate_of = Vec::with_capacity(coords.len());
        for (mode, token) in coords.iter().enumerate() {
            let c = coordinate(field(Some(*token), number, "coordinate")?, number)?;
            parsed.dims[mode] = parsed.dims[mode].max(c as usize + 1);
            coordinate_of.push(c);
        }
        let value: f64 = field(Some(*value), number, "value")?;
        parsed.entries.push((coordinate_of, value));
    }
    Ok(parsed)
}

pub(super) fn emit<W: Write>(writer: &mut W, entries: &[(Vec<i32>, f64)]) -> Result<()> {
    for (coords, value) in entries {
        for c in coords {
            write!(writer, "{} ", c + 1)?;
        }
        writeln!(writer, "{value}")?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_infers_dims() {
        let text = "# a comment\n1 1 1.5\n\n3 2 -2\n";
        let parsed = parse(text.as_bytes()).unwrap();
        assert_eq!(parsed.dims, vec![3, 2]);
        assert_eq!(parsed.entries, vec![(vec![0, 0], 1.5), (vec![2, 1], -2.0)]);
    }

    #[test]
    fn test_ragged_record_rejected() {
        let err = parse("1 1 1.0\n1 2 3 4.0\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));
    }

    #[test]
    fn test_emit_one_based() {
        let mut out = Vec::new();
        emit(&mut out, &[(vec![0, 2], 1.5), (vec![1, 0], 3.0)]).unwrap();
        assert_eq!(String::from_utf8(out).unwrap(), "1 3 1.5\n2 1 3\n");
    }
}
