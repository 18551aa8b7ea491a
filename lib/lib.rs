//! Symbolic index mapping for abstract tensor expressions.
//!
//! Given two expressions built from tensors with abstract indices, this crate
//! finds the relabelings of indices (together with a sign) that turn one into
//! the other, taking into account
//! - declared index symmetries and antisymmetries of individual tensors;
//! - the commutativity of products and sums;
//! - renaming of contracted (dummy) indices;
//! - raising and lowering of indices of metric types;
//! - algebraic signs hidden in coefficients, odd functions and powers.
//!
//! These mappings underlie equality testing of expressions (up to dummy
//! renaming and symmetries), detection of expressions that differ only by a
//! sign or that vanish by symmetry, and the discovery of a tensor's own index
//! symmetries.
//!
//! Searches are lazy, pull-based pipelines of providers (see [`provider`]) that
//! run on a single thread and whose stack usage is bounded by the depth of the
//! expressions involved. Most users only need the functions in [`mappings`].

pub mod index;
pub mod number;
pub mod symmetry;
pub mod tensor;
pub mod graph;
pub mod buffer;
pub mod mapping;
pub mod provider;
pub mod mappings;

pub use index::{ Index, IndexType };
pub use number::Number;
pub use symmetry::{ Permutation, SymmetryGroup };
pub use tensor::{ Function, Tensor, TensorError, TensorResult };
pub use buffer::{ MappingError, MappingResult };
pub use mapping::Mapping;
pub use mappings::{ MappingOptions, SignRelation };
