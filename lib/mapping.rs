//! Finished index mappings, as handed out by a search.

use std::{
    fmt,
    hash::{ Hash, Hasher },
};
use once_cell::unsync::OnceCell;
use crate::{
    index::Index,
    symmetry::Permutation,
};

/// An immutable index mapping between two expressions, with a sign.
///
/// Stored as two parallel lists sorted by `from` name. Every `from` entry is
/// the lower occurrence of its name, and the state of the matching `to` entry
/// tells whether the mapping flips states: the image of `_a` is `to[k]`, and
/// the image of `^a` is `to[k]` inverted. Fully contracted (dummy) names never
/// appear.
///
/// Mappings are only ever created from a search buffer's
/// [`export`][crate::buffer::IndexMappingBuffer::export].
#[derive(Clone, Debug)]
pub struct Mapping {
    from: Vec<Index>,
    to: Vec<Index>,
    sign: bool,
    from_names: OnceCell<Vec<u32>>,
    to_names: OnceCell<Vec<u32>>,
}

impl Mapping {
    pub(crate) fn from_pairs(mut pairs: Vec<(Index, Index)>, sign: bool) -> Self {
        pairs.sort_unstable_by_key(|(from, _)| from.name_with_type());
        let (from, to): (Vec<Index>, Vec<Index>) = pairs.into_iter().unzip();
        Self {
            from,
            to,
            sign,
            from_names: OnceCell::new(),
            to_names: OnceCell::new(),
        }
    }

    /// Return the `from` indices, all lower, sorted by name.
    pub fn from(&self) -> &[Index] { &self.from }

    /// Return the images of [`from`][Self::from], in the same order.
    pub fn to(&self) -> &[Index] { &self.to }

    /// Return the sign: `true` if the mapped expression picks up a factor of
    /// `-1`.
    pub fn sign(&self) -> bool { self.sign }

    /// Return the number of mapped names.
    pub fn len(&self) -> usize { self.from.len() }

    pub fn is_empty(&self) -> bool { self.from.is_empty() }

    /// Return an iterator over `(from, to)` pairs.
    pub fn iter(&self) -> impl Iterator<Item = (Index, Index)> + '_ {
        self.from.iter().copied().zip(self.to.iter().copied())
    }

    /// Return the sorted `from` names, without states.
    pub fn from_names(&self) -> &[u32] {
        self.from_names.get_or_init(|| {
            self.from.iter().map(|idx| idx.name_with_type()).collect()
        })
    }

    /// Return the sorted `to` names, without states.
    pub fn to_names(&self) -> &[u32] {
        self.to_names.get_or_init(|| {
            let mut names: Vec<u32> =
                self.to.iter().map(|idx| idx.name_with_type()).collect();
            names.sort_unstable();
            names
        })
    }

    /// Return `true` if `index`'s name is mapped.
    pub fn contains_from(&self, index: Index) -> bool {
        self.from_names().binary_search(&index.name_with_type()).is_ok()
    }

    /// Return `true` if `index`'s name is the image of some mapped name.
    pub fn contains_to(&self, index: Index) -> bool {
        self.to_names().binary_search(&index.name_with_type()).is_ok()
    }

    /// Return the image of a single index, if its name is mapped.
    pub fn map_index(&self, index: Index) -> Option<Index> {
        self.from_names()
            .binary_search(&index.name_with_type())
            .ok()
            .map(|k| {
                let to = self.to[k];
                to.with_state(to.is_upper() ^ index.is_upper())
            })
    }

    /// Return `true` if every name is mapped to itself without a change of
    /// state. The sign is not considered.
    pub fn is_identity(&self) -> bool {
        self.iter().all(|(from, to)| from == to)
    }

    /// Return the inverse mapping, with the same sign.
    pub fn inverse(&self) -> Self {
        let pairs: Vec<(Index, Index)> =
            self.iter()
            .map(|(from, to)| (to.with_state(false), from.with_state(to.is_upper())))
            .collect();
        Self::from_pairs(pairs, self.sign)
    }

    /// Express the mapping as a permutation of positions in `indices`.
    ///
    /// The result `p` satisfies `p(k) = j` whenever the mapping sends the name
    /// at position `j` to the name at position `k`, and carries the mapping's
    /// sign as its antisymmetry bit. Returns `None` if the image of some index
    /// in `indices` is not itself in `indices`, state included.
    pub fn to_permutation(&self, indices: &[Index]) -> Option<Permutation> {
        let position = |idx: Index| -> Option<usize> {
            indices.iter().position(|&other| other == idx)
        };
        let mut image: Vec<u32> = vec![0; indices.len()];
        for (j, &idx) in indices.iter().enumerate() {
            let k = self.map_index(idx).and_then(position)?;
            image[k] = j as u32;
        }
        Permutation::new(image, self.sign).ok()
    }
}

impl PartialEq for Mapping {
    fn eq(&self, other: &Self) -> bool {
        self.sign == other.sign && self.from == other.from && self.to == other.to
    }
}

impl Eq for Mapping { }

impl Hash for Mapping {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.from.hash(state);
        self.to.hash(state);
        self.sign.hash(state);
    }
}

impl fmt::Display for Mapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.sign { write!(f, "-")?; }
        write!(f, "{{")?;
        let n = self.len();
        for (k, (from, to)) in self.iter().enumerate() {
            write!(f, "{} -> {}", from, to)?;
            if k < n - 1 { write!(f, ", ")?; }
        }
        write!(f, "}}")
    }
}
