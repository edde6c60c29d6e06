//! Integration tests for the generated iteration protocol

mod common;

use common::{filled, isolated_session, session};
use tacit::format::Format;
use tacit::session::SessionConfig;

fn collect(iter: impl Iterator<Item = tacit::iter::Component<f64>>) -> Vec<(Vec<i32>, f64)> {
    iter.map(|c| (c.coordinate.to_vec(), c.value)).collect()
}

#[test]
fn test_copy_continues_independently() {
    let mut s = isolated_session(SessionConfig::default().with_iterator_buffer_capacity(2));
    let components: Vec<(Vec<i32>, f64)> = (0..9)
        .map(|k| (vec![k / 3, (k * 2) % 3], f64::from(k)))
        .collect();
    let t = s.tensor::<f64>("T", &[3, 3], Format::sparse(2)).unwrap();
    s.insert_components(t, components.iter().map(|(c, v)| (c.as_slice(), *v))).unwrap();

    let reference = collect(s.iter::<f64>(t).unwrap());
    assert_eq!(reference.len(), 9);

    let mut original = s.iter::<f64>(t).unwrap();
    for _ in 0..3 {
        original.advance();
    }
    let mut copy = original.clone();
    assert!(copy == original);

    copy.advance();
    assert!(copy != original);
    assert_eq!(original.current().map(|c| c.value), Some(reference[3].1));

    let from_original = collect(original.by_ref());
    assert_eq!(from_original, reference[3..]);
    let from_copy = collect(copy);
    assert_eq!(from_copy, reference[4..]);
    assert!(original.is_end());
}

#[test]
fn test_buffer_capacities_agree() {
    let mut s = session();
    let t = s.tensor::<f64>("T", &[50], Format::sparse(1)).unwrap();
    for k in (0..50).step_by(3) {
        s.insert(t, &[k], f64::from(k)).unwrap();
    }
    let expected = collect(s.iter::<f64>(t).unwrap());
    for capacity in [1, 2, 7, 100] {
        let config = SessionConfig::default().with_iterator_buffer_capacity(capacity);
        let mut small = isolated_session(config);
        let u = small.tensor::<f64>("U", &[50], Format::sparse(1)).unwrap();
        small
            .insert_components(u, expected.iter().map(|(c, v)| (c.as_slice(), *v)))
            .unwrap();
        assert_eq!(collect(small.iter::<f64>(u).unwrap()), expected, "capacity {capacity}");
    }
}

#[test]
fn test_dense_iteration_visits_every_position() {
    let mut s = session();
    let t = filled(&mut s, "D", &[2, 2], Format::dense(2), &[(&[1, 0], 5.0)]).unwrap();
    let coordinates: Vec<Vec<i32>> = s
        .iter::<f64>(t)
        .unwrap()
        .map(|c| c.coordinate.to_vec())
        .collect();
    assert_eq!(coordinates, vec![vec![0, 0], vec![0, 1], vec![1, 0], vec![1, 1]]);
}

#[test]
fn test_column_major_coordinates_in_mode_order() {
    let mut s = session();
    let t = filled(&mut s, "C", &[2, 3], Format::csc(), &[(&[1, 0], 1.0), (&[0, 2], 2.0)]).unwrap();
    let records = collect(s.iter::<f64>(t).unwrap());
    assert_eq!(records, vec![(vec![1, 0], 1.0), (vec![0, 2], 2.0)]);
}

#[test]
fn test_empty_tensor_starts_at_end() {
    let mut s = session();
    let t = s.tensor::<f64>("E", &[4, 4], Format::csr()).unwrap();
    let iter = s.iter::<f64>(t).unwrap();
    assert!(iter.is_end());
    assert_eq!(iter.current(), None);
}

#[test]
fn test_iteration_evaluates_first() {
    let mut s = session();
    let b = filled(&mut s, "B", &[3], Format::sparse(1), &[(&[2], 1.5)]).unwrap();
    let a = s.tensor::<f64>("A", &[3], Format::sparse(1)).unwrap();
    let i = tacit::expr::IndexVar::new("i");
    s.set_assignment(a, &[&i], b.access([&i]) + b.access([&i])).unwrap();
    assert_eq!(collect(s.iter::<f64>(a).unwrap()), vec![(vec![2], 3.0)]);
}
