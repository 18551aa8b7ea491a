//! Contraction structure of a product of indexed factors.
//!
//! A [`GraphStructure`] records, for every index slot of every factor, which
//! slot it is contracted with: another slot of some factor, or the product's
//! exterior (the "ether") if the index is free at the product level. Each link
//! is packed into a 64-bit record
//!
//! ```text
//!  63                  32 31          16 15           0
//! +----------------------+--------------+--------------+
//! |    partner factor    | partner slot |  own orbit   |
//! +----------------------+--------------+--------------+
//! ```
//!
//! with the partner factor set to `u32::MAX` for links to the ether.
//!
//! Records refer to concrete factor positions, so they cannot be compared
//! between two different products. Comparison goes through *keys* instead,
//! which replace the partner factor by the id of its run of equal structural
//! hashes, and drop slot positions in favor of orbit ids. Two products can only
//! be mapped onto one another if their factors, put in canonical order, carry
//! pairwise equal hashes and sorted key lists.

use std::ops::{ Deref, Range };
use itertools::Itertools;
use tracing::error;
use crate::{
    buffer::{ MappingError, MappingResult },
    index::Index,
    tensor::Tensor,
};

const ETHER: u32 = u32::MAX;
const ETHER_STRETCH: u64 = 0xffff;

macro_rules! isomorphism {
    (
        $docstring:literal,
        $name:ident ($iso_to:ident),
        derive: { $($derive:ident),* $(,)? } $(,)?
    ) => {
        #[doc = $docstring]
        #[derive($($derive),*)]
        pub struct $name(pub $iso_to);

        impl From<$iso_to> for $name {
            fn from(x: $iso_to) -> Self { Self(x) }
        }

        impl From<$name> for $iso_to {
            fn from(x: $name) -> Self { x.0 }
        }

        impl Deref for $name {
            type Target = $iso_to;

            fn deref(&self) -> &Self::Target { &self.0 }
        }
    }
}

isomorphism!(
    "Sugared `usize` giving the position of a factor in its product's list of indexed factors.",
    FactorId (usize),
    derive: { Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash },
);

/// Decoded link of a single slot.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Wire {
    /// Contracted with slot `slot` of factor `factor`.
    Internal { factor: FactorId, slot: usize },
    /// Free at the product level; `slot` is the index's position among the
    /// product's free indices.
    Ether { slot: usize },
}

impl Wire {
    fn decode(raw: u64) -> Self {
        let factor = (raw >> 32) as u32;
        let slot = ((raw >> 16) & 0xffff) as usize;
        if factor == ETHER {
            Self::Ether { slot }
        } else {
            Self::Internal { factor: FactorId(factor as usize), slot }
        }
    }
}

fn pack(partner_factor: u32, partner_slot: u16, own_orbit: u16) -> u64 {
    (partner_factor as u64) << 32
        | (partner_slot as u64) << 16
        | own_orbit as u64
}

// one occurrence of an index in the upper or lower pool
#[derive(Copy, Clone, Debug)]
struct Incidence {
    index: Index,
    factor: u32,
    slot: u16,
    orbit: u16,
}

/// Contraction structure of a product's indexed factors.
#[derive(Clone, Debug)]
pub struct GraphStructure {
    hashes: Vec<u64>,
    records: Vec<Vec<u64>>,
    ether: Vec<u64>,
    signatures: Vec<Vec<u64>>,
    free_keys: Vec<u64>,
    order: Vec<usize>,
    runs: Vec<Range<usize>>,
    components: Vec<usize>,
    component_sizes: Vec<usize>,
}

impl GraphStructure {
    /// Build the structure for a list of factors sorted by structural hash,
    /// whose product has free indices `free`.
    ///
    /// Fails if some index does not pair up, i.e. the upper and lower
    /// incidence pools do not align after sorting by name.
    pub fn new(factors: &[Tensor], free: &[Index]) -> MappingResult<Self> {
        let hashes: Vec<u64> =
            factors.iter().map(|t| t.structural_hash()).collect();
        let slots: Vec<Vec<(Index, u16)>> =
            factors.iter().map(|t| t.slots()).collect();
        let distinct: Vec<u64> =
            hashes.iter().copied().sorted_unstable().dedup().collect();
        let stretch: Vec<u64> =
            hashes.iter()
            .map(|h| distinct.binary_search(h).unwrap_or(0) as u64)
            .collect();

        let mut upper: Vec<Incidence> = Vec::new();
        let mut lower: Vec<Incidence> = Vec::new();
        let mut push = |inc: Incidence| {
            if inc.index.is_upper() { upper.push(inc); } else { lower.push(inc); }
        };
        for (f, factor_slots) in slots.iter().enumerate() {
            for (s, &(index, orbit)) in factor_slots.iter().enumerate() {
                push(Incidence { index, factor: f as u32, slot: s as u16, orbit });
            }
        }
        for (s, &index) in free.iter().enumerate() {
            push(Incidence {
                index: index.inverted(),
                factor: ETHER,
                slot: s as u16,
                orbit: 0,
            });
        }
        upper.sort_by_key(|inc| inc.index.name_with_type());
        lower.sort_by_key(|inc| inc.index.name_with_type());
        if upper.len() != lower.len() {
            return Err(malformed(format!(
                "{} upper and {} lower incidences", upper.len(), lower.len())));
        }

        let mut records: Vec<Vec<u64>> =
            slots.iter().map(|s| vec![0; s.len()]).collect();
        let mut ether: Vec<u64> = vec![0; free.len()];
        let mut link = |own: &Incidence, partner: &Incidence| {
            let raw = pack(partner.factor, partner.slot, own.orbit);
            if own.factor == ETHER {
                ether[own.slot as usize] = raw;
            } else {
                records[own.factor as usize][own.slot as usize] = raw;
            }
        };
        for (u, l) in upper.iter().zip(lower.iter()) {
            if !u.index.same_name(l.index) {
                return Err(malformed(format!(
                    "unaligned pools at {} and {}", u.index, l.index)));
            }
            if u.factor == ETHER && l.factor == ETHER {
                return Err(malformed(format!(
                    "index {} joins the exterior to itself", u.index)));
            }
            link(l, u);
            link(u, l);
        }

        let key = |own_factor: u32, own: (Index, u16), raw: u64| -> u64 {
            let (index, own_orbit) = own;
            let (partner_stretch, partner_orbit) =
                match Wire::decode(raw) {
                    Wire::Internal { factor, slot } => (
                        stretch[*factor],
                        slots[*factor][slot].1 as u64,
                    ),
                    Wire::Ether { .. } => (ETHER_STRETCH, 0),
                };
            let self_loop = (raw >> 32) as u32 == own_factor;
            let state = index.is_upper() && !index.is_metric();
            partner_stretch << 48
                | partner_orbit << 32
                | (own_orbit as u64) << 16
                | (index.type_code() as u64) << 8
                | (self_loop as u64) << 1
                | state as u64
        };
        let signatures: Vec<Vec<u64>> =
            records.iter().enumerate()
            .map(|(f, rec)| {
                rec.iter().zip(slots[f].iter())
                    .map(|(&raw, &own)| key(f as u32, own, raw))
                    .sorted_unstable()
                    .collect()
            })
            .collect();
        let free_keys: Vec<u64> =
            ether.iter().zip(free.iter())
            .map(|(&raw, &index)| key(ETHER, (index.inverted(), 0), raw))
            .sorted_unstable()
            .collect();

        let order: Vec<usize> =
            (0..factors.len())
            .sorted_by(|&a, &b| {
                (hashes[a], &signatures[a]).cmp(&(hashes[b], &signatures[b]))
            })
            .collect();
        let mut runs: Vec<Range<usize>> = Vec::new();
        let mut start = 0;
        for k in 1..=order.len() {
            let boundary =
                k == order.len()
                || hashes[order[k]] != hashes[order[start]]
                || signatures[order[k]] != signatures[order[start]];
            if boundary {
                runs.push(start..k);
                start = k;
            }
        }

        let (components, component_sizes) = connected_components(&records);
        let graph = Self {
            hashes,
            records,
            ether,
            signatures,
            free_keys,
            order,
            runs,
            components,
            component_sizes,
        };
        graph.check_symmetric()?;
        Ok(graph)
    }

    /// Return the number of factors.
    pub fn len(&self) -> usize { self.records.len() }

    pub fn is_empty(&self) -> bool { self.records.is_empty() }

    /// Return the canonical factor order: factor positions sorted by hash,
    /// then by contraction signature.
    pub fn order(&self) -> &[usize] { &self.order }

    /// Return the maximal runs of factors with equal hashes and contraction
    /// signatures, as ranges over [`order`][Self::order].
    pub fn runs(&self) -> &[Range<usize>] { &self.runs }

    /// Return the sorted comparison keys of a factor's slots.
    pub fn signature(&self, factor: usize) -> Option<&[u64]> {
        self.signatures.get(factor).map(|s| s.as_slice())
    }

    /// Decode the link of slot `slot` of factor `factor`.
    pub fn wire(&self, factor: usize, slot: usize) -> Option<Wire> {
        self.records.get(factor)
            .and_then(|rec| rec.get(slot))
            .map(|&raw| Wire::decode(raw))
    }

    /// Decode the link of the `k`-th free index of the product.
    pub fn ether_wire(&self, k: usize) -> Option<Wire> {
        self.ether.get(k).map(|&raw| Wire::decode(raw))
    }

    /// Return an iterator over the decoded links of a factor's slots.
    ///
    /// The iterator item type is [`Wire`].
    pub fn wires(&self, factor: usize) -> Wires<'_> {
        let records: &[u64] =
            self.records.get(factor).map(|r| r.as_slice()).unwrap_or(&[]);
        Wires { iter: records.iter() }
    }

    /// Return the connected component id of every factor.
    pub fn components(&self) -> &[usize] { &self.components }

    /// Return the number of connected components.
    pub fn component_count(&self) -> usize { self.component_sizes.len() }

    // every internal link must point back at the slot it came from
    fn check_symmetric(&self) -> MappingResult<()> {
        let points_back = |wire: Option<Wire>, want: Wire| wire == Some(want);
        for (f, rec) in self.records.iter().enumerate() {
            for s in 0..rec.len() {
                let here = Wire::Internal { factor: FactorId(f), slot: s };
                let back =
                    match self.wire(f, s) {
                        Some(Wire::Internal { factor, slot }) =>
                            self.wire(*factor, slot),
                        Some(Wire::Ether { slot }) => self.ether_wire(slot),
                        None => None,
                    };
                if !points_back(back, here) {
                    return Err(malformed(format!(
                        "asymmetric link at factor {} slot {}", f, s)));
                }
            }
        }
        Ok(())
    }
}

/// Two structures are equal when their factors, in canonical order, have equal
/// hashes and signatures, their free links have equal keys, and their
/// connected components have equal sizes.
impl PartialEq for GraphStructure {
    fn eq(&self, other: &Self) -> bool {
        self.len() == other.len()
            && self.free_keys == other.free_keys
            && self.component_sizes == other.component_sizes
            && self.order.iter().zip(other.order.iter())
                .all(|(&a, &b)| {
                    self.hashes[a] == other.hashes[b]
                        && self.signatures[a] == other.signatures[b]
                })
    }
}

impl Eq for GraphStructure { }

pub struct Wires<'a> {
    iter: std::slice::Iter<'a, u64>,
}

impl<'a> Iterator for Wires<'a> {
    type Item = Wire;

    fn next(&mut self) -> Option<Self::Item> {
        self.iter.next().map(|&raw| Wire::decode(raw))
    }
}

fn malformed(msg: String) -> MappingError {
    error!(reason = %msg, "malformed contraction structure");
    MappingError::MalformedGraph(msg)
}

// union-find over internal links; returns the component id of every factor
// and the sorted component sizes
fn connected_components(records: &[Vec<u64>]) -> (Vec<usize>, Vec<usize>) {
    fn find(parent: &mut [usize], mut k: usize) -> usize {
        while parent[k] != k {
            parent[k] = parent[parent[k]];
            k = parent[k];
        }
        k
    }

    let n = records.len();
    let mut parent: Vec<usize> = (0..n).collect();
    for (f, rec) in records.iter().enumerate() {
        for &raw in rec.iter() {
            if let Wire::Internal { factor, .. } = Wire::decode(raw) {
                let a = find(&mut parent, f);
                let b = find(&mut parent, *factor);
                if a != b { parent[a.max(b)] = a.min(b); }
            }
        }
    }
    let roots: Vec<usize> = (0..n).map(|k| find(&mut parent, k)).collect();
    let distinct: Vec<usize> =
        roots.iter().copied().sorted_unstable().dedup().collect();
    let components: Vec<usize> =
        roots.iter()
        .map(|r| distinct.binary_search(r).unwrap_or(0))
        .collect();
    let mut sizes = vec![0; distinct.len()];
    components.iter().for_each(|&c| { sizes[c] += 1; });
    sizes.sort_unstable();
    (components, sizes)
}
