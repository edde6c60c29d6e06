//! Integration tests for CSR/CSC bulk interchange

mod common;

use common::session;
use tacit::error::Error;
use tacit::expr::IndexVar;
use tacit::format::Format;

#[test]
fn test_csr_arrays_round_trip() {
    let rowptr = vec![0, 1, 3, 3];
    let colidx = vec![2, 0, 1];
    let vals = vec![1.0f64, 2.0, 3.0];

    let mut s = session();
    let t = s
        .make_csr("A", [3, 3], rowptr.clone(), colidx.clone(), vals.clone())
        .unwrap();
    let arrays = s.csr_arrays::<f64>(t).unwrap();
    assert_eq!(arrays.ptr, rowptr.as_slice());
    assert_eq!(arrays.idx, colidx.as_slice());
    assert_eq!(arrays.vals, vals.as_slice());
}

#[test]
fn test_packed_tensor_exports_csc() {
    let mut s = session();
    let t = s.tensor::<f32>("A", &[2, 3], Format::csc()).unwrap();
    s.insert_components(t, [([1, 2], 4.0f32), ([0, 0], 1.0), ([1, 0], 2.0)]).unwrap();
    let arrays = s.csc_arrays::<f32>(t).unwrap();
    assert_eq!(arrays.ptr, &[0, 2, 2, 3]);
    assert_eq!(arrays.idx, &[0, 1, 1]);
    assert_eq!(arrays.vals, &[1.0, 2.0, 4.0]);
}

#[test]
fn test_export_evaluates_pending_assignment() {
    let mut s = session();
    let b = s.make_csr("B", [2, 2], vec![0, 1, 2], vec![1, 0], vec![2i64, 3]).unwrap();
    let a = s.tensor::<i64>("A", &[2, 2], Format::csr()).unwrap();
    let (i, j) = (IndexVar::new("i"), IndexVar::new("j"));
    s.set_assignment(a, &[&i, &j], b.access([&i, &j]) * b.access([&i, &j])).unwrap();
    let arrays = s.csr_arrays::<i64>(a).unwrap();
    assert_eq!(arrays.ptr, &[0, 1, 2]);
    assert_eq!(arrays.idx, &[1, 0]);
    assert_eq!(arrays.vals, &[4, 9]);
}

#[test]
fn test_user_owned_arrays_are_adopted() {
    let mut colptr = vec![0, 2, 3];
    let mut rowidx = vec![0, 2, 1];
    let mut vals = vec![1u32, 2, 3];
    {
        let mut s = session();
        // SAFETY: the arrays outlive the session and are only read through it.
        let t = unsafe {
            s.make_csc_from_raw_parts(
                "U",
                [3, 2],
                colptr.as_mut_ptr(),
                rowidx.as_mut_ptr(),
                vals.as_mut_ptr(),
            )
        }
        .unwrap();
        assert_eq!(s.at::<u32>(t, &[2, 0]).unwrap(), 2);
        assert_eq!(s.at::<u32>(t, &[1, 1]).unwrap(), 3);
        let arrays = s.csc_arrays::<u32>(t).unwrap();
        assert_eq!(arrays.vals.as_ptr(), vals.as_ptr());
    }
    assert_eq!(vals, vec![1, 2, 3]);
    assert_eq!(colptr, vec![0, 2, 3]);
    assert_eq!(rowidx, vec![0, 2, 1]);
}

#[test]
fn test_validation() {
    let mut s = session();
    assert!(matches!(
        s.make_csr("A", [2, 2], vec![0, 1, 1], vec![5], vec![1.0f64]),
        Err(Error::IndexOutOfBounds { .. })
    ));
    assert!(matches!(
        s.make_csr("A", [2, 2], vec![0, 2, 1], vec![0, 1], vec![1.0f64, 2.0]),
        Err(Error::InvalidArgument { .. })
    ));

    let v = s.tensor::<f64>("v", &[4], Format::dense(1)).unwrap();
    assert!(matches!(s.csr_arrays::<f64>(v), Err(Error::RequiresMatrix { .. })));
    let m = s.tensor::<f64>("m", &[2, 2], Format::sparse(2)).unwrap();
    let err = s.csr_arrays::<f64>(m).unwrap_err();
    assert!(matches!(err, Error::FormatMismatch { .. }));
    assert!(err.to_string().contains("CSR"));
}
