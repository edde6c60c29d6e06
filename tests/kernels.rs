//! Integration tests for assignments evaluated by the native backend

mod common;

use common::{assert_allclose_f64, filled, session, to_dense};
use tacit::error::Error;
use tacit::expr::IndexVar;
use tacit::format::Format;

#[test]
fn test_spmv() {
    let mut s = session();
    let a = filled(
        &mut s,
        "A",
        &[3, 3],
        Format::csr(),
        &[(&[0, 0], 2.0), (&[0, 2], 1.0), (&[1, 1], 3.0), (&[2, 0], 4.0)],
    )
    .unwrap();
    let x = filled(
        &mut s,
        "x",
        &[3],
        Format::dense(1),
        &[(&[0], 1.0), (&[1], 2.0), (&[2], 3.0)],
    )
    .unwrap();
    let y = s.tensor::<f64>("y", &[3], Format::dense(1)).unwrap();
    let (i, j) = (IndexVar::new("i"), IndexVar::new("j"));
    s.set_assignment(y, &[&i], a.access([&i, &j]) * x.access([&j])).unwrap();
    assert_eq!(to_dense(&mut s, y).unwrap(), vec![5.0, 6.0, 4.0]);
}

#[test]
fn test_spgemm_matches_dense_product() {
    let mut s = session();
    let b = filled(
        &mut s,
        "B",
        &[2, 3],
        Format::csr(),
        &[(&[0, 0], 1.0), (&[0, 2], 2.0), (&[1, 1], -1.0)],
    )
    .unwrap();
    let c = filled(
        &mut s,
        "C",
        &[3, 2],
        Format::csc(),
        &[(&[0, 1], 0.5), (&[1, 0], 4.0), (&[2, 0], 1.5), (&[2, 1], 3.0)],
    )
    .unwrap();
    let a = s.tensor::<f64>("A", &[2, 2], Format::csr()).unwrap();
    let (i, j, k) = (IndexVar::new("i"), IndexVar::new("j"), IndexVar::new("k"));
    s.set_assignment(a, &[&i, &j], b.access([&i, &k]) * c.access([&k, &j])).unwrap();
    assert_eq!(
        s.assignment_string(a).unwrap().unwrap(),
        "A(i,j) = B(i,k) * C(k,j)"
    );

    let product = to_dense(&mut s, a).unwrap();
    assert_allclose_f64(&product, &[3.0, 6.5, -4.0, 0.0], 1e-12, 0.0, "B*C");
}

#[test]
fn test_sum_and_difference_take_the_union() {
    let mut s = session();
    let b = filled(&mut s, "b", &[4], Format::sparse(1), &[(&[0], 1.0), (&[2], 2.0)]).unwrap();
    let c = filled(&mut s, "c", &[4], Format::sparse(1), &[(&[2], 5.0), (&[3], 7.0)]).unwrap();
    let sum = s.tensor::<f64>("sum", &[4], Format::sparse(1)).unwrap();
    let diff = s.tensor::<f64>("diff", &[4], Format::sparse(1)).unwrap();
    let i = IndexVar::new("i");
    s.set_assignment(sum, &[&i], b.access([&i]) + c.access([&i])).unwrap();
    s.set_assignment(diff, &[&i], b.access([&i]) - c.access([&i])).unwrap();

    assert_eq!(
        s.components::<f64>(sum).unwrap(),
        vec![(vec![0], 1.0), (vec![2], 7.0), (vec![3], 7.0)]
    );
    assert_eq!(to_dense(&mut s, diff).unwrap(), vec![1.0, 0.0, -3.0, -7.0]);
    assert_eq!(s.get::<f64>(diff, &[1]).unwrap(), None);
}

#[test]
fn test_scalar_reduction() {
    let mut s = session();
    let b = filled(&mut s, "b", &[5], Format::sparse(1), &[(&[1], 2.0), (&[4], 3.0)]).unwrap();
    let c = filled(&mut s, "c", &[5], Format::dense(1), &[(&[1], 10.0), (&[4], 100.0)]).unwrap();
    let dot = s.tensor::<f64>("dot", &[], Format::dense(0)).unwrap();
    let i = IndexVar::new("i");
    s.set_assignment(dot, &[], b.access([&i]) * c.access([&i])).unwrap();
    assert_eq!(s.at::<f64>(dot, &[]).unwrap(), 320.0);
}

#[test]
fn test_integer_components() {
    let mut s = session();
    let b = s.tensor::<i32>("B", &[2, 2], Format::csr()).unwrap();
    s.insert_components(b, [([0, 1], 3), ([1, 0], -2)]).unwrap();
    let a = s.tensor::<i32>("A", &[2, 2], Format::csc()).unwrap();
    let (i, j) = (IndexVar::new("i"), IndexVar::new("j"));
    s.set_assignment(a, &[&i, &j], b.access([&j, &i]) * 2.0).unwrap();
    assert_eq!(s.at::<i32>(a, &[1, 0]).unwrap(), 6);
    assert_eq!(s.at::<i32>(a, &[0, 1]).unwrap(), -4);
}

#[test]
fn test_large_i64_difference_is_exact() {
    let mut s = session();
    let b = s.tensor::<i64>("B", &[1], Format::dense(1)).unwrap();
    let c = s.tensor::<i64>("C", &[1], Format::dense(1)).unwrap();
    s.insert(b, &[0], 9_007_199_254_740_993i64).unwrap();
    s.insert(c, &[0], 1i64).unwrap();
    let a = s.tensor::<i64>("A", &[1], Format::dense(1)).unwrap();
    let i = IndexVar::new("i");
    s.set_assignment(a, &[&i], b.access([&i]) - c.access([&i])).unwrap();
    assert_eq!(s.at::<i64>(a, &[0]).unwrap(), 9_007_199_254_740_992);

    let neg = s.tensor::<i64>("N", &[1], Format::dense(1)).unwrap();
    s.set_assignment(neg, &[&i], -b.access([&i])).unwrap();
    assert_eq!(s.at::<i64>(neg, &[0]).unwrap(), -9_007_199_254_740_993);
}

#[test]
fn test_malformed_assignments() {
    let mut s = session();
    let a = s.tensor::<f64>("A", &[2, 3], Format::csr()).unwrap();
    let b = s.tensor::<f64>("B", &[3, 2], Format::csr()).unwrap();
    let n = s.tensor::<i64>("N", &[2, 3], Format::csr()).unwrap();
    let (i, j) = (IndexVar::new("i"), IndexVar::new("j"));

    assert!(matches!(
        s.set_assignment(a, &[&i, &j], b.access([&i, &j])),
        Err(Error::ShapeMismatch { .. })
    ));
    assert!(matches!(
        s.set_assignment(a, &[&i, &j], n.access([&i, &j])),
        Err(Error::DTypeMismatch { .. })
    ));
    assert!(matches!(
        s.set_assignment(a, &[&i], b.access([&j, &i])),
        Err(Error::ArityMismatch { .. })
    ));
    assert!(matches!(
        s.set_assignment(a, &[&i, &i], b.access([&i, &i])),
        Err(Error::InvalidArgument { .. })
    ));
    assert!(s.assignment(a).unwrap().is_none());
    assert!(s.dependents(b).unwrap().is_empty());
    assert!(!s.needs_compile(a).unwrap());
}
