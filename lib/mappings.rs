//! Public entry points of the mapping engine.
//!
//! Every function here builds a provider pipeline for a pair of expressions and
//! pulls from it as far as the query requires. Searches are lazy: [`create_port`]
//! returns an iterator that performs the search step by step, and existence
//! queries stop at the first result that settles them.
//!
//! Equality-like queries ([`tensors_equal`], [`compare_sign`],
//! [`is_zero_by_symmetry`]) pin every free index to itself, since relabeling the
//! externally visible indices of an expression changes what it means.
//!
//! ```
//! use std::rc::Rc;
//! use tensor_mapping::index::{ Index, IndexType };
//! use tensor_mapping::mappings;
//! use tensor_mapping::symmetry::SymmetryGroup;
//! use tensor_mapping::tensor::Tensor;
//!
//! let a = Index::lower(0, IndexType::LatinLower);
//! let b = Index::lower(1, IndexType::LatinLower);
//! let sym = Rc::new(SymmetryGroup::symmetric(2));
//! let g_ab = Tensor::simple_with_symmetries("g", [a, b], sym.clone()).unwrap();
//! let g_ba = Tensor::simple_with_symmetries("g", [b, a], sym).unwrap();
//! let m = mappings::get_first(&g_ab, &g_ba).unwrap().unwrap();
//! assert!(!m.sign());
//! assert!(mappings::tensors_equal(&g_ab, &g_ba).unwrap());
//! ```

use std::iter::FusedIterator;
use rustc_hash::{ FxHashSet as HashSet };
use tracing::{ debug, trace };
use crate::{
    buffer::{
        IndexMappingBuffer,
        MappingBuffer,
        MappingBufferTester,
        MappingResult,
    },
    index::Index,
    mapping::Mapping,
    provider::{ self, BoxedProvider, Singleton },
    symmetry::Permutation,
    tensor::{ Kind, Tensor },
};

/// Tuning knobs for a search.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct MappingOptions {
    /// Restrict the permutation search of simple tensors to the group elements
    /// consistent with already bound names. Disabling this gives the same
    /// results, more slowly.
    pub stabilizer_search: bool,
    /// Maximum number of mappings drained by the exhaustive queries.
    pub limit: Option<usize>,
}

impl Default for MappingOptions {
    fn default() -> Self { Self { stabilizer_search: true, limit: None } }
}

/// Outcome of [`compare_sign`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum SignRelation {
    /// The expressions are equal.
    Equal,
    /// The expressions differ only by an overall sign.
    Opposite,
}

// a pipeline rooted in a single seed buffer
struct Pipeline<B> {
    provider: BoxedProvider<B>,
}

impl<B> Pipeline<B>
where B: IndexMappingBuffer + 'static
{
    fn new(seed: B, from: &Tensor, to: &Tensor, opts: MappingOptions)
        -> MappingResult<Self>
    {
        let provider =
            provider::create_provider(Singleton::boxed(seed), from, to, opts)?;
        Ok(Self { provider })
    }

    fn next_buffer(&mut self) -> MappingResult<Option<B>> {
        provider::pull(self.provider.as_mut())
    }

    // pull until a buffer satisfies `pred`
    fn find<F>(&mut self, pred: F) -> MappingResult<bool>
    where F: Fn(&B) -> bool
    {
        while let Some(buffer) = self.next_buffer()? {
            if pred(&buffer) { return Ok(true); }
        }
        Ok(false)
    }
}

/// Lazy sequence of all mappings of one expression onto another.
///
/// The iterator item type is `MappingResult<`[`Mapping`]`>`; after the first
/// error, the port yields nothing more.
pub struct MappingsPort {
    pipeline: Pipeline<MappingBuffer>,
    yielded: usize,
    done: bool,
}

impl Iterator for MappingsPort {
    type Item = MappingResult<Mapping>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done { return None; }
        match self.pipeline.next_buffer() {
            Ok(Some(mut buffer)) => {
                buffer.remove_contracted();
                self.yielded += 1;
                Some(Ok(buffer.export()))
            },
            Ok(None) => {
                self.done = true;
                debug!(yielded = self.yielded, "port exhausted");
                None
            },
            Err(err) => {
                self.done = true;
                Some(Err(err))
            },
        }
    }
}

impl FusedIterator for MappingsPort { }

/// Create a port enumerating all mappings of `from` onto `to`.
pub fn create_port(from: &Tensor, to: &Tensor) -> MappingResult<MappingsPort> {
    create_port_with(from, to, MappingOptions::default())
}

/// Like [`create_port`], with explicit options.
pub fn create_port_with(from: &Tensor, to: &Tensor, opts: MappingOptions)
    -> MappingResult<MappingsPort>
{
    debug!(
        from = from.structural_hash(),
        to = to.structural_hash(),
        kind = ?from.node_kind(),
        "creating port",
    );
    let pipeline = Pipeline::new(MappingBuffer::new(), from, to, opts)?;
    Ok(MappingsPort { pipeline, yielded: 0, done: false })
}

/// Return the first mapping of `from` onto `to`, if there is one.
pub fn get_first(from: &Tensor, to: &Tensor) -> MappingResult<Option<Mapping>> {
    create_port(from, to)?.next().transpose()
}

/// Return `true` if some mapping of `from` onto `to` exists.
pub fn mapping_exists(from: &Tensor, to: &Tensor) -> MappingResult<bool> {
    Pipeline::new(MappingBuffer::new(), from, to, MappingOptions::default())?
        .find(|_| true)
}

/// Return `true` if some mapping of `from` onto `to` with sign zero exists.
pub fn positive_mapping_exists(from: &Tensor, to: &Tensor) -> MappingResult<bool> {
    Pipeline::new(MappingBuffer::new(), from, to, MappingOptions::default())?
        .find(|buffer| !buffer.sign())
}

// pipeline mapping `u` onto `v` with every free index pinned to itself, or
// `None` if the two are already known to differ
fn pinned_pipeline(u: &Tensor, v: &Tensor)
    -> MappingResult<Option<Pipeline<MappingBufferTester>>>
{
    if u.free_indices() != v.free_indices() {
        trace!("free index sets differ");
        return Ok(None);
    }
    if u.structural_hash() != v.structural_hash() {
        trace!(u = u.structural_hash(), v = v.structural_hash(), "hashes differ");
        return Ok(None);
    }
    if let (Kind::Product(p), Kind::Product(q)) = (u.kind(), v.kind()) {
        if p.graph()? != q.graph()? {
            trace!("contraction structures differ");
            return Ok(None);
        }
    }
    let tester = MappingBufferTester::identity(u.free_indices());
    Pipeline::new(tester, u, v, MappingOptions::default()).map(Some)
}

/// Return `true` if `u` and `v` are equal up to renaming of dummy indices and
/// index symmetries.
pub fn tensors_equal(u: &Tensor, v: &Tensor) -> MappingResult<bool> {
    match pinned_pipeline(u, v)? {
        Some(mut pipeline) => pipeline.find(|buffer| !buffer.sign()),
        None => Ok(false),
    }
}

/// Compare `u` and `v` up to an overall sign.
///
/// Returns `Some(Equal)` if `u == v`, `Some(Opposite)` if `u == -v`, and `None`
/// if neither can be shown.
pub fn compare_sign(u: &Tensor, v: &Tensor) -> MappingResult<Option<SignRelation>> {
    let Some(mut pipeline) = pinned_pipeline(u, v)? else { return Ok(None); };
    let mut relation: Option<SignRelation> = None;
    while let Some(buffer) = pipeline.next_buffer()? {
        if !buffer.sign() { return Ok(Some(SignRelation::Equal)); }
        relation = Some(SignRelation::Opposite);
    }
    Ok(relation)
}

/// Return `true` if `t` maps onto itself, free indices fixed, with a sign,
/// i.e. `t == -t`.
pub fn is_zero_by_symmetry(t: &Tensor) -> MappingResult<bool> {
    match pinned_pipeline(t, t)? {
        Some(mut pipeline) => pipeline.find(|buffer| buffer.sign()),
        None => Ok(false),
    }
}

/// Return the set of all mappings of `from` onto `to`.
pub fn find_all_mappings(from: &Tensor, to: &Tensor)
    -> MappingResult<HashSet<Mapping>>
{
    find_all_mappings_with(from, to, MappingOptions::default())
}

/// Like [`find_all_mappings`], with explicit options. At most `opts.limit`
/// mappings are drained from the search.
pub fn find_all_mappings_with(from: &Tensor, to: &Tensor, opts: MappingOptions)
    -> MappingResult<HashSet<Mapping>>
{
    create_port_with(from, to, opts)?
        .take(opts.limit.unwrap_or(usize::MAX))
        .collect()
}

/// Return the permutations of `indices` under which `t` is invariant (up to
/// sign), as found by mapping `t` onto itself.
///
/// `indices` should list the free indices of `t` in slot order; each mapping
/// is converted with [`Mapping::to_permutation`] and mappings that move an
/// index outside of `indices` are skipped. The result is sorted.
pub fn find_index_symmetries(t: &Tensor, indices: &[Index])
    -> MappingResult<Vec<Permutation>>
{
    find_index_symmetries_with(t, indices, MappingOptions::default())
}

/// Like [`find_index_symmetries`], with explicit options.
pub fn find_index_symmetries_with(
    t: &Tensor,
    indices: &[Index],
    opts: MappingOptions,
) -> MappingResult<Vec<Permutation>>
{
    let mut symmetries: Vec<Permutation> =
        find_all_mappings_with(t, t, opts)?
        .into_iter()
        .filter_map(|m| m.to_permutation(indices))
        .collect::<HashSet<Permutation>>()
        .into_iter()
        .collect();
    symmetries.sort();
    Ok(symmetries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use crate::index::IndexType;
    use crate::symmetry::SymmetryGroup;

    fn lo(n: u32) -> Index { Index::lower(n, IndexType::LatinLower) }
    fn up(n: u32) -> Index { Index::upper(n, IndexType::LatinLower) }

    #[test]
    fn port_yields_exported_mappings() {
        let a = Tensor::simple("A", [lo(0), up(0), lo(1)]).unwrap();
        let b = Tensor::simple("A", [lo(2), up(2), lo(3)]).unwrap();
        let all: Vec<Mapping> =
            create_port(&a, &b).unwrap().collect::<MappingResult<_>>().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].from(), &[lo(1)]);
        assert_eq!(all[0].to(), &[lo(3)]);
    }

    #[test]
    fn equality_pins_free_indices() {
        let v_a = Tensor::simple("V", [lo(0)]).unwrap();
        let v_b = Tensor::simple("V", [lo(1)]).unwrap();
        assert!(mapping_exists(&v_a, &v_b).unwrap());
        assert!(!tensors_equal(&v_a, &v_b).unwrap());
        assert!(tensors_equal(&v_a, &v_a).unwrap());
    }

    #[test]
    fn sign_comparisons() {
        let sym = Rc::new(SymmetryGroup::antisymmetric(2));
        let f_ab = Tensor::simple_with_symmetries("F", [lo(0), lo(1)], sym.clone())
            .unwrap();
        let f_ba = Tensor::simple_with_symmetries("F", [lo(1), lo(0)], sym).unwrap();
        assert_eq!(compare_sign(&f_ab, &f_ba).unwrap(), Some(SignRelation::Opposite));
        assert_eq!(compare_sign(&f_ab, &f_ab).unwrap(), Some(SignRelation::Equal));
        // the odd transposition cancels the explicit sign
        assert!(positive_mapping_exists(&f_ab, &(-&f_ab)).unwrap());
        let g = Tensor::simple("G", [lo(0), lo(1)]).unwrap();
        assert_eq!(compare_sign(&f_ab, &g).unwrap(), None);
    }

    #[test]
    fn symmetries_of_a_symmetric_tensor() {
        let sym = Rc::new(SymmetryGroup::symmetric(3));
        let idx = [lo(0), lo(1), lo(2)];
        let t = Tensor::simple_with_symmetries("T", idx, sym.clone()).unwrap();
        let found = find_index_symmetries(&t, &idx).unwrap();
        assert_eq!(found.as_slice(), sym.elements());
        let limited = find_all_mappings_with(
            &t, &t, MappingOptions { limit: Some(2), ..Default::default() },
        ).unwrap();
        assert_eq!(limited.len(), 2);
    }
}
