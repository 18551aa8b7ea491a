//! Abstract tensor indices packed into a single 32-bit word.
//!
//! Every index carries three pieces of information:
//! - a *name*, stored in the low 24 bits;
//! - a *type* code, stored in bits 24 to 30, distinguishing e.g. Latin from
//!   Greek or matrix indices;
//! - a *state*, stored in the high bit, which is `1` for upper (contravariant)
//!   indices and `0` for lower (covariant) ones.
//!
//! ```text
//!  31   30      24 23                          0
//! +---+----------+-----------------------------+
//! | s |   type   |            name             |
//! +---+----------+-----------------------------+
//! ```
//!
//! Names are only unique per type, so most bookkeeping is keyed on
//! [`Index::name_with_type`]. All operations here are total bit arithmetic.
//!
//! ```
//! use tensor_mapping::index::{ Index, IndexType };
//!
//! let a = Index::lower(0, IndexType::LatinLower);
//! assert!(!a.is_upper());
//! assert_eq!(a.inverted(), Index::upper(0, IndexType::LatinLower));
//! assert_eq!(a.name_with_type(), a.inverted().name_with_type());
//! println!("{}", a); // _a
//! ```

use std::fmt;

const STATE_MASK: u32 = 0x8000_0000;
const TYPE_MASK: u32 = 0x7f00_0000;
const NAME_MASK: u32 = 0x00ff_ffff;
const TYPE_SHIFT: u32 = 24;

/// Kind of an index.
///
/// The first four types are *metric*: upper and lower occurrences may be
/// exchanged by raising or lowering with a metric tensor, so a mapping is
/// allowed to flip their states. Matrix types are not metric, and their states
/// must always be preserved.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[repr(u8)]
pub enum IndexType {
    LatinLower = 0,
    GreekLower = 1,
    LatinUpper = 2,
    GreekUpper = 3,
    Matrix1 = 4,
    Matrix2 = 5,
    Matrix3 = 6,
    Matrix4 = 7,
}

impl IndexType {
    /// Return the type's code as stored in an [`Index`].
    pub fn code(self) -> u8 { self as u8 }

    /// Convert a stored type code back to an `IndexType`, if it is one.
    pub fn from_code(code: u8) -> Option<Self> {
        match code {
            0 => Some(Self::LatinLower),
            1 => Some(Self::GreekLower),
            2 => Some(Self::LatinUpper),
            3 => Some(Self::GreekUpper),
            4 => Some(Self::Matrix1),
            5 => Some(Self::Matrix2),
            6 => Some(Self::Matrix3),
            7 => Some(Self::Matrix4),
            _ => None,
        }
    }

    /// Return `true` if indices of this type can be raised and lowered.
    pub fn is_metric(self) -> bool { is_metric_code(self.code()) }
}

fn is_metric_code(code: u8) -> bool { code < 4 }

/// A single abstract index.
///
/// Ordering and equality are those of the raw word, so two indices differing
/// only in state compare unequal. Use [`Index::name_with_type`] to compare
/// irrespective of state.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Index(pub u32);

impl From<u32> for Index {
    fn from(raw: u32) -> Self { Self(raw) }
}

impl From<Index> for u32 {
    fn from(index: Index) -> Self { index.0 }
}

impl Index {
    /// Create a new index. Names wider than 24 bits are truncated.
    pub fn new(name: u32, ty: IndexType, upper: bool) -> Self {
        let state = if upper { STATE_MASK } else { 0 };
        Self(
            state
            | ((ty.code() as u32) << TYPE_SHIFT) & TYPE_MASK
            | name & NAME_MASK
        )
    }

    /// Create a new lower index.
    pub fn lower(name: u32, ty: IndexType) -> Self { Self::new(name, ty, false) }

    /// Create a new upper index.
    pub fn upper(name: u32, ty: IndexType) -> Self { Self::new(name, ty, true) }

    /// Return the bare name, without type or state.
    pub fn name(self) -> u32 { self.0 & NAME_MASK }

    /// Return the raw type code.
    pub fn type_code(self) -> u8 { ((self.0 & TYPE_MASK) >> TYPE_SHIFT) as u8 }

    /// Return the type, if the stored code names one.
    pub fn index_type(self) -> Option<IndexType> {
        IndexType::from_code(self.type_code())
    }

    /// Return `true` if the index's type can be raised and lowered.
    pub fn is_metric(self) -> bool { is_metric_code(self.type_code()) }

    /// Return `true` if the index is upper.
    pub fn is_upper(self) -> bool { self.0 & STATE_MASK != 0 }

    /// Return the name together with the type, i.e. the index with its state
    /// bit cleared.
    ///
    /// This is the key under which indices are identified regardless of
    /// state.
    pub fn name_with_type(self) -> u32 { self.0 & !STATE_MASK }

    /// Return the same index with the opposite state.
    pub fn inverted(self) -> Self { Self(self.0 ^ STATE_MASK) }

    /// Return the same index with the given state.
    pub fn with_state(self, upper: bool) -> Self {
        Self::from_name_with_type(self.name_with_type(), upper)
    }

    /// Rebuild an index from a [`name_with_type`][Self::name_with_type] key
    /// and a state.
    pub fn from_name_with_type(name: u32, upper: bool) -> Self {
        let state = if upper { STATE_MASK } else { 0 };
        Self(name & !STATE_MASK | state)
    }

    /// Return `true` if `self` and `other` have equal names and types.
    pub fn same_name(self, other: Self) -> bool {
        self.name_with_type() == other.name_with_type()
    }

    /// Return `true` if `self` and `other` differ in state.
    pub fn state_differs(self, other: Self) -> bool {
        (self.0 ^ other.0) & STATE_MASK != 0
    }
}

impl fmt::Debug for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Index({self})")
    }
}

impl fmt::Display for Index {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = if self.is_upper() { '^' } else { '_' };
        let name = self.name();
        match self.index_type() {
            Some(IndexType::LatinLower) if name < 26 =>
                write!(f, "{}{}", state, (b'a' + name as u8) as char),
            Some(IndexType::LatinUpper) if name < 26 =>
                write!(f, "{}{}", state, (b'A' + name as u8) as char),
            Some(ty) => write!(f, "{}{:?}:{}", state, ty, name),
            None => write!(f, "{}#{}:{}", state, self.type_code(), name),
        }
    }
}

/// Split a list of indices into the ones appearing once (free, in
/// `name_with_type` order) and the names appearing twice (contracted).
///
/// Fails with the offending index if a name appears more than twice, or twice
/// with the same state.
pub(crate) fn split_contractions(indices: &[Index])
    -> Result<(Vec<Index>, Vec<u32>), Index>
{
    let mut sorted: Vec<Index> = indices.to_vec();
    sorted.sort_unstable_by_key(|idx| (idx.name_with_type(), idx.is_upper()));
    let mut free: Vec<Index> = Vec::with_capacity(sorted.len());
    let mut contracted: Vec<u32> = Vec::new();
    let mut k = 0;
    while k < sorted.len() {
        let name = sorted[k].name_with_type();
        let run =
            sorted[k..].iter()
            .take_while(|idx| idx.name_with_type() == name)
            .count();
        match run {
            1 => { free.push(sorted[k]); },
            2 if sorted[k].state_differs(sorted[k + 1]) => {
                contracted.push(name);
            },
            _ => { return Err(sorted[k + 1]); },
        }
        k += run;
    }
    Ok((free, contracted))
}
