//! Integration tests for reading and writing tensor files

mod common;

use std::path::PathBuf;

use common::{filled, session};
use tacit::error::Error;
use tacit::format::Format;
use tacit::io::{self, FileType};

fn scratch(name: &str) -> PathBuf {
    std::env::temp_dir().join(format!("tacit-{}-{name}", std::process::id()))
}

#[test]
fn test_tns_file_round_trip() {
    let mut s = session();
    let t = filled(
        &mut s,
        "T",
        &[2, 3, 4],
        Format::sparse(3),
        &[(&[0, 0, 0], 1.0), (&[1, 2, 3], -2.5), (&[1, 0, 2], 0.125)],
    )
    .unwrap();

    let path = scratch("round.tns");
    io::write(&mut s, &path, t).unwrap();
    let back = io::read(&mut s, &path, Format::sparse(3), true).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(s.name(back).unwrap(), format!("tacit-{}-round", std::process::id()));
    assert_eq!(s.dims(back).unwrap(), &[2, 3, 4]);
    assert!(s.equals(t, back).unwrap());
}

#[test]
fn test_mtx_file_round_trip() {
    let mut s = session();
    let m = filled(&mut s, "M", &[3, 2], Format::csc(), &[(&[2, 0], 4.0), (&[0, 1], 1.5)]).unwrap();

    let path = scratch("round.mtx");
    io::write(&mut s, &path, m).unwrap();
    let back = io::read(&mut s, &path, Format::csr(), true).unwrap();
    std::fs::remove_file(&path).unwrap();

    assert_eq!(s.format(back).unwrap(), &Format::csr());
    assert!(s.equals(m, back).unwrap());
}

#[test]
fn test_write_converts_component_type() {
    let mut s = session();
    let t = s.tensor::<i32>("I", &[3], Format::sparse(1)).unwrap();
    s.insert_components(t, [([0], 4), ([2], -1)]).unwrap();
    let mut out = Vec::new();
    io::write_to(&mut s, &mut out, FileType::Tns, t).unwrap();
    assert_eq!(String::from_utf8(out).unwrap(), "1 4\n3 -1\n");
}

#[test]
fn test_read_without_packing_leaves_staged() {
    let mut s = session();
    let text = "%%MatrixMarket matrix coordinate real symmetric\n3 3 2\n1 1 2.0\n3 1 5.0\n";
    let t = io::read_from(&mut s, text.as_bytes(), FileType::Mtx, "S", Format::csr(), false)
        .unwrap();
    assert!(s.needs_pack(t).unwrap());
    assert_eq!(s.staged(t).unwrap(), 3);
    assert_eq!(s.at::<f64>(t, &[0, 2]).unwrap(), 5.0);
    assert_eq!(s.at::<f64>(t, &[2, 0]).unwrap(), 5.0);
}

#[test]
fn test_record_count_beyond_file_is_a_parse_error() {
    let mut s = session();
    let text = "%%MatrixMarket matrix coordinate real general\n3 3 1000000000000000000\n1 1 1.0\n";
    let err = io::read_from(&mut s, text.as_bytes(), FileType::Mtx, "M", Format::csr(), true);
    assert!(matches!(err, Err(Error::Parse { line: 2, .. })));
}

#[test]
fn test_read_errors() {
    let mut s = session();
    let bad = "1 1 x\n".as_bytes();
    let err = io::read_from(&mut s, bad, FileType::Tns, "bad", Format::csr(), true);
    assert!(matches!(err, Err(Error::Parse { line: 1, .. })));

    let vector = "1 1 1\n".as_bytes();
    let err = io::read_from(&mut s, vector, FileType::Tns, "v", Format::sparse(1), true);
    assert!(matches!(err, Err(Error::InvalidArgument { .. })));

    assert!(matches!(
        io::read(&mut s, scratch("missing.tns"), Format::csr(), true),
        Err(Error::Io(_))
    ));
    assert!(matches!(
        io::read(&mut s, scratch("matrix.rb"), Format::csr(), true),
        Err(Error::Io(_)) | Err(Error::NotImplemented { .. })
    ));
}
