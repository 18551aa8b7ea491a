//! End-to-end mapping scenarios

mod common;

use common::{ antisymmetric, init_tracing, lo, plain, symmetric, up };
use tensor_mapping::{
    mappings::{ self, SignRelation },
    tensor::{ Function, Tensor },
    MappingError,
};

#[test]
fn symmetric_metric_swaps_indices() {
    init_tracing();
    let g_ab = symmetric("g", &[lo(0), lo(1)]);
    let g_ba = symmetric("g", &[lo(1), lo(0)]);
    let m = mappings::get_first(&g_ab, &g_ba).unwrap().unwrap();
    assert!(!m.sign());
    assert_eq!(m.map_index(lo(0)), Some(lo(1)));
    assert_eq!(m.map_index(lo(1)), Some(lo(0)));
    // with free indices pinned, only the symmetry relates the two
    assert!(mappings::tensors_equal(&g_ab, &g_ba).unwrap());
}

#[test]
fn antisymmetric_self_mappings() {
    init_tracing();
    let a = antisymmetric("A", &[lo(0), lo(1)]);
    let all = mappings::find_all_mappings(&a, &a).unwrap();
    assert_eq!(all.len(), 2);
    let swap = all.iter().find(|m| !m.is_identity()).unwrap();
    assert!(swap.sign());
    assert_eq!(swap.map_index(lo(0)), Some(lo(1)));
    let identity = all.iter().find(|m| m.is_identity()).unwrap();
    assert!(!identity.sign());
    assert!(!mappings::is_zero_by_symmetry(&a).unwrap());
}

#[test]
fn symmetric_difference_vanishes() {
    init_tracing();
    let s = Tensor::sum([
        symmetric("S", &[lo(0), lo(1)]),
        -symmetric("S", &[lo(1), lo(0)]),
    ]).unwrap();
    assert!(mappings::is_zero_by_symmetry(&s).unwrap());

    let t = Tensor::sum([
        plain("T", &[lo(0), lo(1)]),
        -plain("T", &[lo(1), lo(0)]),
    ]).unwrap();
    assert!(!mappings::is_zero_by_symmetry(&t).unwrap());
}

#[test]
fn folded_coefficient_carries_sign() {
    init_tracing();
    let g_ab = symmetric("g", &[lo(0), lo(1)]);
    let from = Tensor::product([
        Tensor::from(-2),
        Tensor::ratio(1, 2).unwrap(),
        g_ab.clone(),
    ]).unwrap();
    let m = mappings::get_first(&from, &g_ab).unwrap().unwrap();
    assert!(m.sign());
    assert!(!mappings::positive_mapping_exists(&from, &plain("h", &[lo(0), lo(1)]))
        .unwrap());
}

#[test]
fn negation_round_trip() {
    init_tracing();
    // A_ab V^b
    let x = Tensor::product([
        plain("A", &[lo(0), lo(1)]),
        plain("V", &[up(1)]),
    ]).unwrap();
    assert!(mappings::tensors_equal(&x, &x).unwrap());
    assert_eq!(
        mappings::compare_sign(&x, &(-&x)).unwrap(),
        Some(SignRelation::Opposite),
    );
    assert_eq!(
        mappings::compare_sign(&x, &x).unwrap(),
        Some(SignRelation::Equal),
    );
}

#[test]
fn dummy_renaming() {
    init_tracing();
    // A_a^b B_b^c C_c vs A_a^e B_e^d C_d
    let x = Tensor::product([
        plain("A", &[lo(0), up(1)]),
        plain("B", &[lo(1), up(2)]),
        plain("C", &[lo(2)]),
    ]).unwrap();
    let y = Tensor::product([
        plain("C", &[lo(3)]),
        plain("B", &[lo(4), up(3)]),
        plain("A", &[lo(0), up(4)]),
    ]).unwrap();
    assert!(mappings::tensors_equal(&x, &y).unwrap());
    let m = mappings::get_first(&x, &y).unwrap().unwrap();
    assert_eq!(m.len(), 1);
    assert!(m.is_identity());
}

#[test]
fn metric_indices_can_flip() {
    init_tracing();
    let v_lo = plain("V", &[lo(0)]);
    let v_up = plain("V", &[up(1)]);
    let m = mappings::get_first(&v_lo, &v_up).unwrap().unwrap();
    assert_eq!(m.map_index(lo(0)), Some(up(1)));
    assert_eq!(m.map_index(up(0)), Some(lo(1)));

    let mat = |n, upper| {
        tensor_mapping::Index::new(n, tensor_mapping::IndexType::Matrix1, upper)
    };
    let m_lo = Tensor::simple("M", [mat(0, false)]).unwrap();
    let m_up = Tensor::simple("M", [mat(1, true)]).unwrap();
    assert!(!mappings::mapping_exists(&m_lo, &m_up).unwrap());
}

#[test]
fn sums_of_products() {
    init_tracing();
    // A_a B^a + C, with the dummy renamed and the terms reordered
    let x = Tensor::sum([
        Tensor::product([plain("A", &[lo(0)]), plain("B", &[up(0)])]).unwrap(),
        plain("C", &[]),
    ]).unwrap();
    let y = Tensor::sum([
        plain("C", &[]),
        Tensor::product([plain("B", &[up(7)]), plain("A", &[lo(7)])]).unwrap(),
    ]).unwrap();
    assert!(mappings::tensors_equal(&x, &y).unwrap());
    let z = Tensor::sum([
        Tensor::product([plain("A", &[lo(0)]), plain("B", &[up(0)])]).unwrap(),
        -plain("C", &[]),
    ]).unwrap();
    assert!(!mappings::tensors_equal(&x, &z).unwrap());
}

#[test]
fn functions_and_powers() {
    init_tracing();
    let x = plain("x", &[]);
    let sin = |t: Tensor| Tensor::function(Function::Sin, t).unwrap();
    let cos = |t: Tensor| Tensor::function(Function::Cos, t).unwrap();
    assert_eq!(
        mappings::compare_sign(&sin(x.clone()), &sin(-&x)).unwrap(),
        Some(SignRelation::Opposite),
    );
    assert!(mappings::tensors_equal(&cos(x.clone()), &cos(-&x)).unwrap());
    let sq = |t: Tensor| Tensor::pow(t, Tensor::from(2)).unwrap();
    assert!(mappings::tensors_equal(&sq(x.clone()), &sq(-&x)).unwrap());
    let cube = |t: Tensor| Tensor::pow(t, Tensor::from(3)).unwrap();
    assert_eq!(
        mappings::compare_sign(&cube(x.clone()), &cube(-&x)).unwrap(),
        Some(SignRelation::Opposite),
    );
}

#[test]
fn index_symmetries_are_recovered() {
    init_tracing();
    let f = antisymmetric("F", &[lo(0), lo(1), lo(2)]);
    let found =
        mappings::find_index_symmetries(&f, &[lo(0), lo(1), lo(2)]).unwrap();
    assert_eq!(found.len(), 6);
    assert!(found.iter().all(|p| p.is_antisymmetric() == p.parity()));
}

#[test]
fn errors_are_distinct_from_no_match() {
    let err = MappingError::InconsistentBinding(lo(0));
    assert!(err.to_string().contains("_a"));
    let a = plain("A", &[lo(0)]);
    let b = plain("B", &[lo(0)]);
    assert!(mappings::get_first(&a, &b).unwrap().is_none());
}
