//! Reading and writing tensor files
//!
//! Supported formats, picked by file extension:
//!
//! | Extension | Format |
//! |-----------|--------|
//! | `.tns` | FROSTT: one component per line, 1-based coordinates then value |
//! | `.mtx` | Matrix Market, `coordinate` or `array`, `general` or `symmetric` |
//! | `.ttx` | Matrix Market header over tensors of any order |
//! | `.rb` | Rutherford-Boeing, recognised but not implemented |
//!
//! Components are always read as `f64`. Writing accepts any component type.

mod mtx;
mod tns;

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::dtype::DType;
use crate::error::{Error, Result};
use crate::format::Format;
use crate::session::Session;
use crate::tensor::Tensor;

/// Tensor file formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FileType {
    /// FROSTT coordinate list
    Tns,
    /// Matrix Market
    Mtx,
    /// Matrix Market layout for higher-order tensors
    Ttx,
    /// Rutherford-Boeing
    Rb,
}

impl FileType {
    /// Infer the file type from the extension of `path`
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase);
        match extension.as_deref() {
            Some("tns") => Ok(FileType::Tns),
            Some("mtx") => Ok(FileType::Mtx),
            Some("ttx") => Ok(FileType::Ttx),
            Some("rb") => Ok(FileType::Rb),
            _ => Err(Error::invalid_argument(
                "path",
                format!("unknown tensor file extension in {}", path.display()),
            )),
        }
    }
}

/// Components parsed from a file, coordinates 0-based
#[derive(Debug, Default)]
struct Parsed {
    dims: Vec<usize>,
    entries: Vec<(Vec<i32>, f64)>,
}

/// Read a tensor file into a new `f64` tensor named after the file stem
///
/// With `pack` false the components are left staged.
pub fn read(
    session: &mut Session,
    path: impl AsRef<Path>,
    format: Format,
    pack: bool,
) -> Result<Tensor> {
    let path = path.as_ref();
    let file_type = FileType::from_path(path)?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("tensor")
        .to_string();
    let reader = BufReader::new(File::open(path)?);
    log::debug!("reading {} as {file_type:?}", path.display());
    read_from(session, reader, file_type, &name, format, pack)
}

/// Read a tensor of `file_type` from `reader`
pub fn read_from<R: BufRead>(
    session: &mut Session,
    reader: R,
    file_type: FileType,
    name: &str,
    format: Format,
    pack: bool,
) -> Result<Tensor> {
    let parsed = match file_type {
        FileType::Tns => tns::parse(reader)?,
        FileType::Mtx | FileType::Ttx => mtx::parse(reader)?,
        FileType::Rb => {
            return Err(Error::NotImplemented {
                feature: "Rutherford-Boeing files",
            });
        }
    };
    let t = session.tensor_with_dtype(name, DType::F64, &parsed.dims, format)?;
    session.reserve(t, parsed.entries.len())?;
    for (coordinate, value) in &parsed.entries {
        session.insert(t, coordinate, *value)?;
    }
    if pack {
        session.pack(t)?;
    }
    Ok(t)
}

/// Write `t` to `path` in the format given by its extension
pub fn write(session: &mut Session, path: impl AsRef<Path>, t: Tensor) -> Result<()> {
    let path = path.as_ref();
    let file_type = FileType::from_path(path)?;
    let mut writer = BufWriter::new(File::create(path)?);
    write_to(session, &mut writer, file_type, t)?;
    writer.flush()?;
    log::debug!("wrote {} as {file_type:?}", path.display());
    Ok(())
}

/// Write `t` to `writer` as `file_type`
pub fn write_to<W: Write>(
    session: &mut Session,
    writer: &mut W,
    file_type: FileType,
    t: Tensor,
) -> Result<()> {
    let dtype = session.dtype(t)?;
    let dims = session.dims(t)?.to_vec();
    let entries: Vec<(Vec<i32>, f64)> = crate::dispatch_dtype!(dtype, T => {
        session
            .components::<T>(t)?
            .into_iter()
            .map(|(c, v)| (c, crate::dtype::Element::to_f64(v)))
            .collect()
    }, "write");
    match file_type {
        FileType::Tns => tns::emit(writer, &entries),
        FileType::Mtx => mtx::emit(writer, "matrix", &dims, &entries),
        FileType::Ttx => mtx::emit(writer, "tensor", &dims, &entries),
        FileType::Rb => Err(Error::NotImplemented {
            feature: "Rutherford-Boeing files",
        }),
    }
}

/// Parse one whitespace-separated field
fn field<T: std::str::FromStr>(token: Option<&str>, line: usize, what: &str) -> Result<T> {
    let token = token.ok_or_else(|| Error::Parse {
        line,
        reason: format!("missing {what}"),
    })?;
    token.parse().map_err(|_| Error::Parse {
        line,
        reason: format!("invalid {what} '{token}'"),
    })
}

/// Convert a 1-based file coordinate
fn coordinate(one_based: i64, line: usize) -> Result<i32> {
    if one_based < 1 || one_based > i32::MAX as i64 {
        return Err(Error::Parse {
            line,
            reason: format!("coordinate {one_based} out of range"),
        });
    }
    Ok((one_based - 1) as i32)
}
