//! Provider for sums.

use std::ops::Range;
use itertools::Itertools;
use tracing::trace;
use crate::{
    buffer::{ IndexMappingBuffer, MappingBufferTester, MappingResult },
    mappings::MappingOptions,
    tensor::Tensor,
};
use super::{
    BoxedProvider,
    Empty,
    MappingProvider,
    Singleton,
    create_provider,
    pull,
};

/// Maps the terms of one sum onto those of another.
///
/// Terms are matched by structural hash. One term from the shortest run of
/// equal hashes (the *main* term) is mapped onto each candidate of its run in
/// turn, and every resulting buffer is kept only if the remaining terms can be
/// paired off under it: each remaining `from` term needs a distinct `to` term
/// of equal hash admitting a mapping that agrees with the buffer on every name
/// it has bound and carries the same relative sign as the main term.
pub struct SumProvider<B> {
    upstream: BoxedProvider<B>,
    from: Vec<Tensor>,
    to: Vec<Tensor>,
    main: usize,
    candidates: Range<usize>,
    opts: MappingOptions,
    seed: Option<B>,
    next: usize,
    inner: Option<(usize, BoxedProvider<B>)>,
}

impl<B> SumProvider<B>
where B: IndexMappingBuffer + 'static
{
    /// Build the provider mapping the terms `from` onto `to`, or one that
    /// yields nothing if their hashes disagree.
    pub fn create(
        upstream: BoxedProvider<B>,
        from: &[Tensor],
        to: &[Tensor],
        opts: MappingOptions,
    ) -> MappingResult<BoxedProvider<B>>
    {
        let hashes_agree =
            from.len() == to.len()
            && from.iter().zip(to.iter())
                .all(|(f, t)| f.structural_hash() == t.structural_hash());
        if !hashes_agree {
            trace!(from = from.len(), to = to.len(), "term mismatch");
            return Ok(Box::new(Empty));
        }
        let mut runs: Vec<Range<usize>> = Vec::new();
        let mut start = 0;
        for (_, run) in from.iter().group_by(|t| t.structural_hash()).into_iter() {
            let len = run.count();
            runs.push(start..start + len);
            start += len;
        }
        let Some(candidates) = runs.into_iter().min_by_key(|run| run.len())
            else { return Ok(Box::new(Empty)); };
        Ok(Box::new(Self {
            upstream,
            from: from.to_vec(),
            to: to.to_vec(),
            main: candidates.start,
            candidates: candidates.clone(),
            opts,
            seed: None,
            next: candidates.start,
            inner: None,
        }))
    }

    // pair off every term but the main one, with `main_to` already taken
    fn rest_matches(&self, buffer: &B, main_to: usize, sign: bool)
        -> MappingResult<bool>
    {
        let mut tester = MappingBufferTester::new(&buffer.export());
        let mut used = vec![false; self.to.len()];
        used[main_to] = true;
        for (i, f) in self.from.iter().enumerate() {
            if i == self.main { continue; }
            let mut matched = false;
            for (j, t) in self.to.iter().enumerate() {
                if used[j] || t.structural_hash() != f.structural_hash() {
                    continue;
                }
                tester.reset();
                if term_matches(tester.clone(), f, t, sign, self.opts)? {
                    used[j] = true;
                    matched = true;
                    break;
                }
            }
            if !matched { return Ok(false); }
        }
        Ok(true)
    }
}

fn term_matches(
    tester: MappingBufferTester,
    from: &Tensor,
    to: &Tensor,
    sign: bool,
    opts: MappingOptions,
) -> MappingResult<bool>
{
    let mut pipeline = create_provider(Singleton::boxed(tester), from, to, opts)?;
    while let Some(buffer) = pull(pipeline.as_mut())? {
        if buffer.sign() == sign { return Ok(true); }
    }
    Ok(false)
}

impl<B> MappingProvider<B> for SumProvider<B>
where B: IndexMappingBuffer + 'static
{
    fn tick(&mut self) -> MappingResult<bool> {
        self.seed = pull(self.upstream.as_mut())?;
        self.next = self.candidates.start;
        self.inner = None;
        Ok(self.seed.is_some())
    }

    fn take(&mut self) -> MappingResult<Option<B>> {
        loop {
            let Some(seed) = self.seed.as_ref() else { return Ok(None); };
            let seed_sign = seed.sign();
            if self.inner.is_none() {
                if self.next >= self.candidates.end {
                    self.seed = None;
                    return Ok(None);
                }
                let provider = create_provider(
                    Singleton::boxed(seed.clone()),
                    &self.from[self.main],
                    &self.to[self.next],
                    self.opts,
                )?;
                self.inner = Some((self.next, provider));
                self.next += 1;
            }
            let Some((main_to, provider)) = self.inner.as_mut()
                else { continue; };
            let main_to = *main_to;
            match pull(provider.as_mut())? {
                None => { self.inner = None; },
                Some(mut buffer) => {
                    buffer.remove_contracted_in(self.from[self.main].dummies());
                    let sign = buffer.sign() ^ seed_sign;
                    if self.rest_matches(&buffer, main_to, sign)? {
                        return Ok(Some(buffer));
                    }
                },
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::rc::Rc;
    use crate::buffer::MappingBuffer;
    use crate::index::{ Index, IndexType };
    use crate::symmetry::SymmetryGroup;
    use crate::tensor::Kind;

    fn lo(n: u32) -> Index { Index::lower(n, IndexType::LatinLower) }

    fn run<B>(from: &Tensor, to: &Tensor, seed: B) -> Vec<B>
    where B: IndexMappingBuffer + 'static
    {
        let (Kind::Sum(f), Kind::Sum(t)) = (from.kind(), to.kind())
            else { panic!("expected sums") };
        let mut p = SumProvider::create(
            Singleton::boxed(seed), f, t, MappingOptions::default()).unwrap();
        let mut out = Vec::new();
        while let Some(b) = pull(p.as_mut()).unwrap() { out.push(b); }
        out
    }

    #[test]
    fn reordered_terms() {
        let a = Tensor::simple("A", [lo(0)]).unwrap();
        let b = Tensor::simple("B", [lo(0)]).unwrap();
        let from = Tensor::sum([a.clone(), b.clone()]).unwrap();
        let to = Tensor::sum([b, a]).unwrap();
        let out = run(&from, &to, MappingBuffer::new());
        assert_eq!(out.len(), 1);
        assert!(!out[0].sign());
    }

    #[test]
    fn terms_must_agree_on_shared_indices() {
        // A_a B_b + A_b B_a onto itself: both candidates for the main term
        // are consistent with the rest
        let ab = Tensor::product([
            Tensor::simple("A", [lo(0)]).unwrap(),
            Tensor::simple("B", [lo(1)]).unwrap(),
        ]).unwrap();
        let ba = Tensor::product([
            Tensor::simple("A", [lo(1)]).unwrap(),
            Tensor::simple("B", [lo(0)]).unwrap(),
        ]).unwrap();
        let s = Tensor::sum([ab.clone(), ba.clone()]).unwrap();
        let out = run(&s, &s, MappingBuffer::new());
        assert_eq!(out.len(), 2);
        // a sum with a different second term has no mapping
        let aa = Tensor::product([
            Tensor::simple("A", [lo(1)]).unwrap(),
            Tensor::simple("B", [lo(0)]).unwrap(),
            Tensor::from(2),
        ]).unwrap();
        let t = Tensor::sum([ab, aa]).unwrap();
        assert!(run(&s, &t, MappingBuffer::new()).is_empty());
    }

    #[test]
    fn antisymmetric_combination_maps_with_sign() {
        // S_ab - S_ba with S symmetric, pinned on its free indices
        let sym = Rc::new(SymmetryGroup::symmetric(2));
        let s_ab = Tensor::simple_with_symmetries("S", [lo(0), lo(1)], sym.clone())
            .unwrap();
        let s_ba = Tensor::simple_with_symmetries("S", [lo(1), lo(0)], sym).unwrap();
        let d = Tensor::sum([s_ab, -s_ba]).unwrap();
        let tester = MappingBufferTester::identity(d.free_indices());
        let signs: Vec<bool> =
            run(&d, &d, tester).iter().map(|b| b.sign()).collect();
        assert!(signs.contains(&false));
        assert!(signs.contains(&true));
    }
}
