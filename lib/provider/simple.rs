//! Providers for simple tensors and tensor fields.

use std::rc::Rc;
use tracing::trace;
use crate::{
    buffer::{ IndexMappingBuffer, MappingResult },
    index::Index,
    mappings::MappingOptions,
    symmetry::{ Permutation, PermutationCursor, SymmetryGroup },
    tensor::{ SimpleTensor, TensorField },
};
use super::{
    BoxedProvider,
    Empty,
    MappingProvider,
    PassThrough,
    create_provider,
    pull,
    signs_between,
};

/// Maps the slots of one simple tensor onto those of another.
///
/// For every buffer pulled from upstream, each element `p` of the tensor's
/// symmetry group is tried in turn, binding `from[p(k)]` to `to[k]` for every
/// slot `k`; successful bindings pick up `p`'s antisymmetry bit as sign. With
/// the trivial group this is just the positional binding.
///
/// If some of the tensor's names are already bound in the incoming buffer,
/// only the group elements consistent with those bindings are enumerated.
pub struct SimpleTensorProvider<B> {
    upstream: BoxedProvider<B>,
    from: Rc<[Index]>,
    to: Rc<[Index]>,
    group: Rc<SymmetryGroup>,
    stabilizer_search: bool,
    current: Option<B>,
    cursor: Option<PermutationCursor>,
}

impl<B> SimpleTensorProvider<B>
where B: IndexMappingBuffer
{
    pub fn new(
        upstream: BoxedProvider<B>,
        from: &SimpleTensor,
        to: &SimpleTensor,
        opts: MappingOptions,
    ) -> Self
    {
        Self {
            upstream,
            from: from.indices().into(),
            to: to.indices().into(),
            group: from.symmetries().clone(),
            stabilizer_search: opts.stabilizer_search,
            current: None,
            cursor: None,
        }
    }

    // elements compatible with everything already bound in `buffer`; `None` if
    // some bound name has no possible image among the `to` slots
    fn cursor_for(&self, buffer: &B) -> Option<PermutationCursor> {
        if !self.stabilizer_search { return Some(self.group.cursor()); }
        let mut fixed: Vec<(u32, u32)> = Vec::new();
        for (j, &idx) in self.from.iter().enumerate() {
            if let Some(image) = buffer.target(idx) {
                let k = self.to.iter().position(|&t| t == image)?;
                fixed.push((k as u32, j as u32));
            }
        }
        if fixed.is_empty() {
            Some(self.group.cursor())
        } else {
            Some(self.group.cursor_fixing(&fixed))
        }
    }
}

fn bind<B>(buffer: &mut B, from: &[Index], to: &[Index], p: &Permutation)
    -> MappingResult<bool>
where B: IndexMappingBuffer
{
    for (k, &t) in to.iter().enumerate() {
        if !buffer.try_map(from[p.apply(k) as usize], t)? { return Ok(false); }
    }
    Ok(true)
}

impl<B> MappingProvider<B> for SimpleTensorProvider<B>
where B: IndexMappingBuffer
{
    fn tick(&mut self) -> MappingResult<bool> {
        self.current = pull(self.upstream.as_mut())?;
        self.cursor =
            self.current.as_ref().and_then(|buffer| self.cursor_for(buffer));
        Ok(self.current.is_some())
    }

    fn take(&mut self) -> MappingResult<Option<B>> {
        let (Some(current), Some(cursor))
            = (self.current.as_ref(), self.cursor.as_mut())
            else { return Ok(None); };
        for p in cursor {
            let mut buffer = current.clone();
            if bind(&mut buffer, &self.from, &self.to, &p)? {
                buffer.add_sign(p.is_antisymmetric());
                return Ok(Some(buffer));
            }
        }
        Ok(None)
    }
}

/// Build the provider mapping simple tensor `from` onto `to`.
pub fn simple_provider<B>(
    upstream: BoxedProvider<B>,
    from: &SimpleTensor,
    to: &SimpleTensor,
    opts: MappingOptions,
) -> MappingResult<BoxedProvider<B>>
where B: IndexMappingBuffer + 'static
{
    if from.name() != to.name()
        || from.indices().len() != to.indices().len()
        || from.symmetries() != to.symmetries()
    {
        trace!(from = from.name(), to = to.name(), "simple tensor mismatch");
        return Ok(Box::new(Empty));
    }
    if from.indices().is_empty() {
        return Ok(Box::new(PassThrough::new(upstream, false)));
    }
    Ok(Box::new(SimpleTensorProvider::new(upstream, from, to, opts)))
}

/// Build the provider mapping tensor field `from` onto `to`.
///
/// Arguments whose indices do not propagate only need to admit a mapping of
/// sign zero on their own. The head and the propagating arguments are chained
/// into one pipeline, in argument order.
pub fn field_provider<B>(
    upstream: BoxedProvider<B>,
    from: &TensorField,
    to: &TensorField,
    opts: MappingOptions,
) -> MappingResult<BoxedProvider<B>>
where B: IndexMappingBuffer + 'static
{
    if from.args().len() != to.args().len()
        || from.propagation() != to.propagation()
    {
        trace!(field = from.head().name(), "field arity mismatch");
        return Ok(Box::new(Empty));
    }
    let args = from.args().iter().zip(to.args().iter()).enumerate();
    for (k, (f, t)) in args.clone() {
        if !from.propagates(k) && !signs_between(f, t, opts)?.plus {
            trace!(field = from.head().name(), arg = k, "argument has no mapping");
            return Ok(Box::new(Empty));
        }
    }
    let mut provider = simple_provider(upstream, from.head(), to.head(), opts)?;
    for (k, (f, t)) in args {
        if from.propagates(k) {
            provider = create_provider(provider, f, t, opts)?;
        }
    }
    Ok(provider)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::MappingBuffer;
    use crate::index::IndexType;
    use crate::provider::Singleton;
    use crate::tensor::{ Kind, Tensor };

    fn lo(n: u32) -> Index { Index::lower(n, IndexType::LatinLower) }
    fn up(n: u32) -> Index { Index::upper(n, IndexType::LatinLower) }

    fn as_simple(t: &Tensor) -> &SimpleTensor {
        match t.kind() {
            Kind::Simple(s) => s,
            _ => panic!("expected a simple tensor"),
        }
    }

    fn run(from: &Tensor, to: &Tensor, seed: MappingBuffer, stabilizer: bool)
        -> Vec<MappingBuffer>
    {
        let opts = MappingOptions { stabilizer_search: stabilizer, limit: None };
        let mut p = simple_provider(
            Singleton::boxed(seed), as_simple(from), as_simple(to), opts,
        ).unwrap();
        let mut out = Vec::new();
        while let Some(b) = pull(p.as_mut()).unwrap() { out.push(b); }
        out
    }

    #[test]
    fn antisymmetric_self_mappings() {
        let sym = Rc::new(SymmetryGroup::antisymmetric(2));
        let a = Tensor::simple_with_symmetries("A", [lo(0), lo(1)], sym).unwrap();
        let out = run(&a, &a, MappingBuffer::new(), true);
        let signs: Vec<bool> = out.iter().map(|b| b.sign()).collect();
        assert_eq!(signs, vec![false, true]);
        assert_eq!(out[1].target(lo(0)), Some(lo(1)));
    }

    #[test]
    fn stabilizer_restricts_search() {
        let sym = Rc::new(SymmetryGroup::symmetric(3));
        let t = Tensor::simple_with_symmetries(
            "T", [lo(0), lo(1), lo(2)], sym).unwrap();
        let mut seed = MappingBuffer::new();
        seed.try_map(up(0), up(2)).unwrap();
        let fast = run(&t, &t, seed.clone(), true);
        let slow = run(&t, &t, seed, false);
        assert_eq!(fast.len(), 2);
        assert_eq!(
            fast.iter().map(|b| b.export()).collect::<Vec<_>>(),
            slow.iter().map(|b| b.export()).collect::<Vec<_>>(),
        );
    }

    #[test]
    fn names_must_agree() {
        let a = Tensor::simple("A", [lo(0)]).unwrap();
        let b = Tensor::simple("B", [lo(0)]).unwrap();
        assert!(run(&a, &b, MappingBuffer::new(), true).is_empty());
    }

    #[test]
    fn fields_check_arguments() {
        let triv = |n| Rc::new(SymmetryGroup::trivial(n));
        let x = Tensor::simple("x", []).unwrap();
        let y = Tensor::simple("y", []).unwrap();
        let v = Tensor::simple("v", [up(3)]).unwrap();
        let f_x = Tensor::field(
            "f", [lo(0)], triv(1), vec![x.clone(), v.clone()], vec![false, true],
        ).unwrap();
        let f_y = Tensor::field(
            "f", [lo(0)], triv(1), vec![y, v], vec![false, true],
        ).unwrap();
        let opts = MappingOptions::default();
        let (Kind::Field(a), Kind::Field(b)) = (f_x.kind(), f_x.kind())
            else { panic!("expected fields") };
        let mut p = field_provider(
            Singleton::boxed(MappingBuffer::new()), a, b, opts).unwrap();
        let found = pull(p.as_mut()).unwrap().unwrap();
        assert_eq!(found.export().len(), 2);
        // differing non-propagating arguments
        assert_ne!(f_x.structural_hash(), f_y.structural_hash());
    }
}
