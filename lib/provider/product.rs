//! Provider for products.
//!
//! Factors of the `from` product are assigned to factors of the `to` product
//! run by run: first the indexless factors with a unique hash, then runs of
//! indexless factors sharing a hash, then the runs of indexed factors that
//! agree in both hash and contraction signature, shortest first. Within a run
//! every bijection is a candidate, so the search backtracks over the whole
//! flattened sequence of `from` factors using an explicit stack of frames, one
//! per factor already assigned.

use itertools::Itertools;
use tracing::trace;
use crate::{
    buffer::{ IndexMappingBuffer, MappingResult },
    mappings::MappingOptions,
    tensor::{ Product, Tensor },
};
use super::{
    BoxedProvider,
    Empty,
    MappingProvider,
    Singleton,
    create_provider,
    pull,
    signs_between,
};

// one `from` factor and the range of `targets` it may be assigned to
#[derive(Clone, Debug)]
struct Step {
    from: Tensor,
    start: usize,
    end: usize,
}

struct Frame<B> {
    seed: B,
    candidate: usize,
    provider: BoxedProvider<B>,
}

pub struct ProductProvider<B> {
    upstream: BoxedProvider<B>,
    sign: bool,
    dummies: Vec<u32>,
    steps: Vec<Step>,
    targets: Vec<Tensor>,
    used: Vec<bool>,
    opts: MappingOptions,
    seed: Option<B>,
    frames: Vec<Frame<B>>,
}

impl<B> ProductProvider<B>
where B: IndexMappingBuffer + 'static
{
    /// Build the provider mapping product `from` onto `to`, or one that yields
    /// nothing if the two are structurally incompatible.
    ///
    /// `dummies` are the names contracted inside `from`, which are dropped from
    /// every yielded buffer.
    pub fn create(
        upstream: BoxedProvider<B>,
        from: &Product,
        to: &Product,
        dummies: &[u32],
        opts: MappingOptions,
    ) -> MappingResult<BoxedProvider<B>>
    {
        if from.indexless().len() != to.indexless().len()
            || from.data().len() != to.data().len()
        {
            trace!(from = from.len(), to = to.len(), "factor count mismatch");
            return Ok(Box::new(Empty));
        }
        let sign =
            if from.coefficient() == to.coefficient() {
                false
            } else if from.coefficient().is_negation_of(to.coefficient()) {
                true
            } else {
                trace!(
                    from = %from.coefficient(),
                    to = %to.coefficient(),
                    "coefficient mismatch",
                );
                return Ok(Box::new(Empty));
            };
        if !same_hashes(from.indexless(), to.indexless())
            || !same_hashes(from.data(), to.data())
        {
            trace!("factor hash mismatch");
            return Ok(Box::new(Empty));
        }
        let (from_graph, to_graph) = (from.graph()?, to.graph()?);
        if from_graph != to_graph {
            trace!("contraction structure mismatch");
            return Ok(Box::new(Empty));
        }

        // (from factors, to factors) per run, in search order
        let mut singles: Vec<(Vec<Tensor>, Vec<Tensor>)> = Vec::new();
        let mut scalar_runs: Vec<(Vec<Tensor>, Vec<Tensor>)> = Vec::new();
        let groups =
            from.indexless().iter().zip(to.indexless().iter())
            .group_by(|(f, _)| f.structural_hash());
        for (_, group) in groups.into_iter() {
            let (f, t): (Vec<Tensor>, Vec<Tensor>) =
                group.map(|(f, t)| (f.clone(), t.clone())).unzip();
            if !every_factor_has_partner(&f, &t, opts)? {
                trace!(run = f.len(), "indexless run has no partner");
                return Ok(Box::new(Empty));
            }
            if f.len() == 1 { singles.push((f, t)); } else { scalar_runs.push((f, t)); }
        }
        let mut data_runs: Vec<(Vec<Tensor>, Vec<Tensor>)> =
            from_graph.runs().iter()
            .map(|run| {
                let f: Vec<Tensor> =
                    from_graph.order()[run.clone()].iter()
                    .map(|&k| from.data()[k].clone())
                    .collect();
                let t: Vec<Tensor> =
                    to_graph.order()[run.clone()].iter()
                    .map(|&k| to.data()[k].clone())
                    .collect();
                (f, t)
            })
            .collect();
        data_runs.sort_by_key(|(f, _)| f.len());

        let mut steps: Vec<Step> = Vec::new();
        let mut targets: Vec<Tensor> = Vec::new();
        for (f, t) in singles.into_iter().chain(scalar_runs).chain(data_runs) {
            let start = targets.len();
            let end = start + t.len();
            steps.extend(f.into_iter().map(|from| Step { from, start, end }));
            targets.extend(t);
        }
        let used = vec![false; targets.len()];
        Ok(Box::new(Self {
            upstream,
            sign,
            dummies: dummies.to_vec(),
            steps,
            targets,
            used,
            opts,
            seed: None,
            frames: Vec::new(),
        }))
    }

    // assign step `depth` to the first unused target at or after `from_target`
    fn open(&mut self, depth: usize, seed: B, from_target: usize)
        -> MappingResult<bool>
    {
        let step = &self.steps[depth];
        let Some(candidate)
            = (from_target.max(step.start)..step.end).find(|&k| !self.used[k])
            else { return Ok(false); };
        let provider = create_provider(
            Singleton::boxed(seed.clone()),
            &step.from,
            &self.targets[candidate],
            self.opts,
        )?;
        self.used[candidate] = true;
        self.frames.push(Frame { seed, candidate, provider });
        Ok(true)
    }

    // release the top frame's target and move it on to the next candidate
    fn advance(&mut self) -> MappingResult<()> {
        if let Some(frame) = self.frames.pop() {
            self.used[frame.candidate] = false;
            self.open(self.frames.len(), frame.seed, frame.candidate + 1)?;
        }
        Ok(())
    }

    fn finish(&self, mut buffer: B) -> B {
        buffer.remove_contracted_in(&self.dummies);
        buffer
    }
}

impl<B> MappingProvider<B> for ProductProvider<B>
where B: IndexMappingBuffer + 'static
{
    fn tick(&mut self) -> MappingResult<bool> {
        self.frames.clear();
        self.used.iter_mut().for_each(|u| { *u = false; });
        self.seed =
            pull(self.upstream.as_mut())?
            .map(|mut buffer| { buffer.add_sign(self.sign); buffer });
        Ok(self.seed.is_some())
    }

    fn take(&mut self) -> MappingResult<Option<B>> {
        if let Some(seed) = self.seed.take() {
            if self.steps.is_empty() { return Ok(Some(self.finish(seed))); }
            self.open(0, seed, 0)?;
        }
        while let Some(top) = self.frames.last_mut() {
            match pull(top.provider.as_mut())? {
                Some(buffer) if self.frames.len() == self.steps.len() => {
                    return Ok(Some(self.finish(buffer)));
                },
                Some(buffer) => {
                    let depth = self.frames.len();
                    self.open(depth, buffer, 0)?;
                },
                None => { self.advance()?; },
            }
        }
        Ok(None)
    }
}

fn same_hashes(from: &[Tensor], to: &[Tensor]) -> bool {
    from.iter().zip(to.iter())
        .all(|(f, t)| f.structural_hash() == t.structural_hash())
}

// cheap rejection for runs of indexless factors: every `from` factor must map
// onto at least one `to` factor of its run, on its own
fn every_factor_has_partner(
    from: &[Tensor],
    to: &[Tensor],
    opts: MappingOptions,
) -> MappingResult<bool>
{
    for f in from.iter() {
        let mut found = false;
        for t in to.iter() {
            if !signs_between(f, t, opts)?.is_empty() {
                found = true;
                break;
            }
        }
        if !found { return Ok(false); }
    }
    Ok(true)
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
    fn up(n: u32) -> Index { Index::upper(n, IndexType::LatinLower) }

    fn run(from: &Tensor, to: &Tensor) -> Vec<MappingBuffer> {
        let (Kind::Product(f), Kind::Product(t)) = (from.kind(), to.kind())
            else { panic!("expected products") };
        let mut p = ProductProvider::create(
            Singleton::boxed(MappingBuffer::new()),
            f,
            t,
            from.dummies(),
            MappingOptions::default(),
        ).unwrap();
        let mut out = Vec::new();
        while let Some(b) = pull(p.as_mut()).unwrap() { out.push(b); }
        out
    }

    #[test]
    fn reordered_factors() {
        // A_a B_b vs B_d A_c
        let from = Tensor::product([
            Tensor::simple("A", [lo(0)]).unwrap(),
            Tensor::simple("B", [lo(1)]).unwrap(),
        ]).unwrap();
        let to = Tensor::product([
            Tensor::simple("B", [lo(3)]).unwrap(),
            Tensor::simple("A", [lo(2)]).unwrap(),
        ]).unwrap();
        let out = run(&from, &to);
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].target(lo(0)), Some(lo(2)));
        assert_eq!(out[0].target(lo(1)), Some(lo(3)));
    }

    #[test]
    fn interchangeable_factors() {
        // V_a V_b onto itself: identity and swap
        let from = Tensor::product([
            Tensor::simple("V", [lo(0)]).unwrap(),
            Tensor::simple("V", [lo(1)]).unwrap(),
        ]).unwrap();
        let out = run(&from, &from);
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|b| !b.sign()));
    }

    #[test]
    fn dummies_are_stripped() {
        // g_ab V^b, contracted over b
        let sym = Rc::new(SymmetryGroup::symmetric(2));
        let from = Tensor::product([
            Tensor::simple_with_symmetries("g", [lo(0), lo(1)], sym.clone()).unwrap(),
            Tensor::simple("V", [up(1)]).unwrap(),
        ]).unwrap();
        let to = Tensor::product([
            Tensor::simple_with_symmetries("g", [lo(5), lo(2)], sym).unwrap(),
            Tensor::simple("V", [up(5)]).unwrap(),
        ]).unwrap();
        let out = run(&from, &to);
        assert_eq!(out.len(), 1);
        let m = out[0].export();
        assert_eq!(m.from(), &[lo(0)]);
        assert_eq!(m.to(), &[lo(2)]);
    }

    #[test]
    fn negated_coefficient() {
        let a = Tensor::simple("A", [lo(0)]).unwrap();
        let b = Tensor::simple("B", [lo(1)]).unwrap();
        let from = Tensor::product([Tensor::from(2), a.clone(), b.clone()]).unwrap();
        let to = Tensor::product([Tensor::from(-2), a.clone(), b.clone()]).unwrap();
        let out = run(&from, &to);
        assert_eq!(out.len(), 1);
        assert!(out[0].sign());
        let other = Tensor::product([Tensor::from(3), a, b]).unwrap();
        assert!(run(&from, &other).is_empty());
    }

    #[test]
    fn wiring_must_agree() {
        // A_ab B^b vs A_ba B^b (A without symmetry)
        let from = Tensor::product([
            Tensor::simple("A", [lo(0), lo(1)]).unwrap(),
            Tensor::simple("B", [up(1)]).unwrap(),
        ]).unwrap();
        let to = Tensor::product([
            Tensor::simple("A", [lo(1), lo(0)]).unwrap(),
            Tensor::simple("B", [up(1)]).unwrap(),
        ]).unwrap();
        assert!(run(&from, &to).is_empty());
    }

    #[test]
    fn mixed_factors() {
        let x = Tensor::simple("x", []).unwrap();
        let s_lo = Tensor::simple("S", [lo(4)]).unwrap();
        let s_up = Tensor::simple("S", [up(4)]).unwrap();
        let v = Tensor::simple("V", [lo(0)]).unwrap();
        let from = Tensor::product(
            [x.clone(), s_lo.clone(), s_up.clone(), v.clone()]).unwrap();
        let to = Tensor::product([v, s_up, x, s_lo]).unwrap();
        let out = run(&from, &to);
        // S_e and S^e may also trade places, flipping the states of e
        assert_eq!(out.len(), 2);
        assert!(out.iter().all(|b| b.export().len() == 1));
    }
}
