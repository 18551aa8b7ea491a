//! Shared builders for the integration tests.

#![allow(dead_code)]

use std::rc::Rc;
use rand::{ Rng, SeedableRng, rngs::StdRng, seq::SliceRandom };
use tensor_mapping::{
    index::{ Index, IndexType },
    symmetry::SymmetryGroup,
    tensor::Tensor,
};

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_max_level(tracing::Level::TRACE)
        .try_init();
}

pub fn lo(n: u32) -> Index { Index::lower(n, IndexType::LatinLower) }

pub fn up(n: u32) -> Index { Index::upper(n, IndexType::LatinLower) }

pub fn symmetric(name: &str, indices: &[Index]) -> Tensor {
    let sym = Rc::new(SymmetryGroup::symmetric(indices.len()));
    Tensor::simple_with_symmetries(name, indices.iter().copied(), sym).unwrap()
}

pub fn antisymmetric(name: &str, indices: &[Index]) -> Tensor {
    let sym = Rc::new(SymmetryGroup::antisymmetric(indices.len()));
    Tensor::simple_with_symmetries(name, indices.iter().copied(), sym).unwrap()
}

pub fn plain(name: &str, indices: &[Index]) -> Tensor {
    Tensor::simple(name, indices.iter().copied()).unwrap()
}

// tensor of the given name and indices; "S" is symmetric, "F" antisymmetric
fn factor(name: &str, indices: &[Index]) -> Tensor {
    match name {
        "S" => symmetric(name, indices),
        "F" => antisymmetric(name, indices),
        _ => plain(name, indices),
    }
}

/// Random factors of a well-formed product: `n` tensors of rank 1 to
/// `max_rank`, with a random subset of their slots contracted in pairs and the
/// rest left free.
pub fn random_factors(seed: u64, n: usize, max_rank: usize) -> Vec<Tensor> {
    const NAMES: [&str; 4] = ["A", "B", "S", "F"];
    let mut rng = StdRng::seed_from_u64(seed);
    let ranks: Vec<usize> = (0..n).map(|_| rng.gen_range(1..=max_rank)).collect();
    let total: usize = ranks.iter().sum();
    let mut positions: Vec<usize> = (0..total).collect();
    positions.shuffle(&mut rng);
    let pairs = rng.gen_range(0..=total / 2);
    let mut slots: Vec<Index> = vec![lo(0); total];
    for p in 0..pairs {
        slots[positions[2 * p]] = lo(p as u32);
        slots[positions[2 * p + 1]] = up(p as u32);
    }
    for (q, &pos) in positions[2 * pairs..].iter().enumerate() {
        slots[pos] = if rng.gen_bool(0.5) { lo(100 + q as u32) } else { up(100 + q as u32) };
    }
    let mut start = 0;
    ranks.iter()
        .map(|&rank| {
            let name = NAMES[rng.gen_range(0..NAMES.len())];
            let t = factor(name, &slots[start..start + rank]);
            start += rank;
            t
        })
        .collect()
}

/// Shuffle a list of factors with the given seed.
pub fn shuffled(mut factors: Vec<Tensor>, seed: u64) -> Vec<Tensor> {
    let mut rng = StdRng::seed_from_u64(seed);
    factors.shuffle(&mut rng);
    factors
}
