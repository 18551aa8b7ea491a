//! Partial index mappings built up during a search.
//!
//! A [`MappingBuffer`] holds one record per index name of the `from` side,
//! naming its image on the `to` side and tracking which of its upper and lower
//! occurrences have been bound so far, together with an accumulated sign. A
//! [`MappingBufferTester`] pins part of the assignment to a previously found
//! mapping and only records fresh bindings for everything else.
//!
//! Both implement [`IndexMappingBuffer`], the interface the providers work
//! through. Binding an index that cannot be bound is an ordinary search failure
//! and is reported as `Ok(false)`; binding the same occurrence of an index twice
//! means two branches of a search were composed incorrectly, and is reported as
//! an [`MappingError`].

use std::rc::Rc;
use rustc_hash::{ FxHashMap as HashMap };
use thiserror::Error;
use tracing::error;
use crate::{
    index::Index,
    mapping::Mapping,
};

#[derive(Debug, Error)]
pub enum MappingError {
    /// Returned when the same occurrence (upper or lower) of an index is bound
    /// twice within one buffer.
    #[error("inconsistent buffer: occurrence {0} bound twice")]
    InconsistentBinding(Index),

    /// Returned when a product's contraction structure is not well formed.
    #[error("malformed contraction structure: {0}")]
    MalformedGraph(String),
}
use MappingError::*;
pub type MappingResult<T> = Result<T, MappingError>;

const BOUND_LOWER: u8 = 0b001;
const BOUND_UPPER: u8 = 0b010;
const DIFF_STATES: u8 = 0b100;
const BOUND_BOTH: u8 = BOUND_LOWER | BOUND_UPPER;

/// Image of a single `from` name.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MappingRecord {
    to_name: u32,
    states: u8,
}

impl MappingRecord {
    fn new(from: Index, to: Index) -> Self {
        let diff = if from.state_differs(to) { DIFF_STATES } else { 0 };
        Self { to_name: to.name_with_type(), states: occurrence(from) | diff }
    }

    /// Return the target name, as a [`name_with_type`][Index::name_with_type]
    /// key.
    pub fn to_name(&self) -> u32 { self.to_name }

    /// Return `true` if the `from` and `to` occurrences have opposite states.
    pub fn states_differ(&self) -> bool { self.states & DIFF_STATES != 0 }

    /// Return `true` if both the upper and lower occurrences are bound.
    pub fn is_contracted(&self) -> bool { self.states & BOUND_BOTH == BOUND_BOTH }

    /// Return the image of a `from` occurrence with the given state.
    pub fn image(&self, upper: bool) -> Index {
        Index::from_name_with_type(self.to_name, upper ^ self.states_differ())
    }

    fn try_bind(&mut self, from: Index, to: Index) -> MappingResult<bool> {
        if self.to_name != to.name_with_type()
            || self.states_differ() != from.state_differs(to)
        {
            return Ok(false);
        }
        let slot = occurrence(from);
        if self.states & slot != 0 {
            error!(%from, %to, "occurrence bound twice");
            return Err(InconsistentBinding(from));
        }
        self.states |= slot;
        Ok(true)
    }
}

fn occurrence(index: Index) -> u8 {
    if index.is_upper() { BOUND_UPPER } else { BOUND_LOWER }
}

// type-level admissibility of binding `from` to `to`
fn admissible(from: Index, to: Index) -> bool {
    from.type_code() == to.type_code()
        && (from.is_metric() || !from.state_differs(to))
}

/// Common interface of the buffers threaded through a search.
pub trait IndexMappingBuffer: Clone + std::fmt::Debug {
    /// Try to bind `from` to `to`.
    ///
    /// Returns `Ok(false)` if the binding conflicts with the index types or
    /// with what is already recorded for `from`'s name, and `Err` if the same
    /// occurrence of `from` has already been bound.
    fn try_map(&mut self, from: Index, to: Index) -> MappingResult<bool>;

    /// XOR the accumulated sign with `sign`.
    fn add_sign(&mut self, sign: bool);

    /// Return the accumulated sign.
    fn sign(&self) -> bool;

    /// Return the image of a `from` occurrence, if its name is bound.
    fn target(&self, from: Index) -> Option<Index>;

    /// Drop every record whose upper and lower occurrences are both bound.
    fn remove_contracted(&mut self);

    /// Drop the records of the given names (as
    /// [`name_with_type`][Index::name_with_type] keys).
    fn remove_contracted_in(&mut self, names: &[u32]);

    /// Take an immutable snapshot of the current assignment.
    fn export(&self) -> Mapping;
}

/// A partial mapping from `from` index names to `to` index names, plus a sign.
#[derive(Clone, Debug, Default)]
pub struct MappingBuffer {
    map: HashMap<u32, MappingRecord>,
    sign: bool,
}

impl MappingBuffer {
    /// Create a new, empty buffer with zero sign.
    pub fn new() -> Self { Self::default() }

    /// Return the number of bound names.
    pub fn len(&self) -> usize { self.map.len() }

    pub fn is_empty(&self) -> bool { self.map.is_empty() }

    /// Return the record for a `from` name, if bound.
    pub fn record(&self, from: Index) -> Option<&MappingRecord> {
        self.map.get(&from.name_with_type())
    }

    fn entries(&self) -> impl Iterator<Item = (Index, Index)> + '_ {
        self.map.iter()
            .map(|(&from, rec)| {
                (Index::from_name_with_type(from, false), rec.image(false))
            })
    }
}

impl IndexMappingBuffer for MappingBuffer {
    fn try_map(&mut self, from: Index, to: Index) -> MappingResult<bool> {
        if !admissible(from, to) { return Ok(false); }
        match self.map.get_mut(&from.name_with_type()) {
            Some(rec) => rec.try_bind(from, to),
            None => {
                self.map.insert(from.name_with_type(), MappingRecord::new(from, to));
                Ok(true)
            },
        }
    }

    fn add_sign(&mut self, sign: bool) { self.sign ^= sign; }

    fn sign(&self) -> bool { self.sign }

    fn target(&self, from: Index) -> Option<Index> {
        self.record(from).map(|rec| rec.image(from.is_upper()))
    }

    fn remove_contracted(&mut self) {
        self.map.retain(|_, rec| !rec.is_contracted());
    }

    fn remove_contracted_in(&mut self, names: &[u32]) {
        names.iter().for_each(|name| { self.map.remove(name); });
    }

    fn export(&self) -> Mapping {
        Mapping::from_pairs(self.entries().collect(), self.sign)
    }
}

/// A buffer whose assignment is pinned on a fixed set of names.
///
/// Names in the fixed set are checked against their pinned images without
/// recording anything; all other names are bound in an inner scratch buffer,
/// which also carries the sign.
#[derive(Clone, Debug)]
pub struct MappingBufferTester {
    fixed: Rc<[(u32, Index)]>,
    inner: MappingBuffer,
}

impl MappingBufferTester {
    /// Pin every pair of a mapping.
    pub fn new(mapping: &Mapping) -> Self {
        let fixed: Vec<(u32, Index)> =
            mapping.iter()
            .map(|(from, to)| {
                // store the image of the lower occurrence
                (from.name_with_type(), to.with_state(to.is_upper() ^ from.is_upper()))
            })
            .collect();
        Self::from_fixed(fixed)
    }

    /// Pin each of the given indices to itself.
    pub fn identity(indices: &[Index]) -> Self {
        let fixed: Vec<(u32, Index)> =
            indices.iter()
            .map(|idx| (idx.name_with_type(), idx.with_state(false)))
            .collect();
        Self::from_fixed(fixed)
    }

    fn from_fixed(mut fixed: Vec<(u32, Index)>) -> Self {
        fixed.sort_unstable_by_key(|(from, _)| *from);
        fixed.dedup_by_key(|(from, _)| *from);
        Self { fixed: fixed.into(), inner: MappingBuffer::new() }
    }

    /// Return the number of pinned names.
    pub fn fixed_len(&self) -> usize { self.fixed.len() }

    /// Clear the scratch buffer and its sign, keeping the pinned names.
    pub fn reset(&mut self) { self.inner = MappingBuffer::new(); }

    fn pinned(&self, from: Index) -> Option<Index> {
        self.fixed
            .binary_search_by_key(&from.name_with_type(), |(f, _)| *f)
            .ok()
            .map(|k| self.fixed[k].1)
    }
}

impl IndexMappingBuffer for MappingBufferTester {
    fn try_map(&mut self, from: Index, to: Index) -> MappingResult<bool> {
        match self.pinned(from) {
            Some(image) => {
                Ok(
                    admissible(from, to)
                    && image.same_name(to)
                    && from.state_differs(to) == image.is_upper()
                )
            },
            None => self.inner.try_map(from, to),
        }
    }

    fn add_sign(&mut self, sign: bool) { self.inner.add_sign(sign); }

    fn sign(&self) -> bool { self.inner.sign() }

    fn target(&self, from: Index) -> Option<Index> {
        match self.pinned(from) {
            Some(image) => Some(image.with_state(image.is_upper() ^ from.is_upper())),
            None => self.inner.target(from),
        }
    }

    fn remove_contracted(&mut self) { self.inner.remove_contracted(); }

    fn remove_contracted_in(&mut self, names: &[u32]) {
        self.inner.remove_contracted_in(names);
    }

    fn export(&self) -> Mapping {
        let pairs: Vec<(Index, Index)> =
            self.fixed.iter()
            .map(|&(from, image)| (Index::from_name_with_type(from, false), image))
            .chain(self.inner.entries())
            .collect();
        Mapping::from_pairs(pairs, self.inner.sign())
    }
}
