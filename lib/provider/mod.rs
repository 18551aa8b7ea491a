//! Pull-based pipelines of partial mappings.
//!
//! A search is a chain of [`MappingProvider`]s, each refining the buffers it
//! pulls from the provider before it. The protocol has two halves:
//! - [`tick`][MappingProvider::tick] pulls one buffer from upstream into the
//!   provider's current register and resets any enumeration state, returning
//!   `false` when upstream is exhausted;
//! - [`take`][MappingProvider::take] returns the next refinement of the current
//!   register, or `None` once there are no more, at which point the caller
//!   should `tick` again.
//!
//! Calling `take` before the first `tick` returns `None` without side effects.
//!
//! Providers are plain state machines holding their own upstream, so the depth
//! of the call stack during a search is bounded by the depth of the expression
//! tree, never by the number of factors or terms in it. Every chain is rooted
//! in a [`Singleton`] that yields the seed buffer once.

use tracing::trace;
use crate::{
    buffer::{ IndexMappingBuffer, MappingBuffer, MappingResult },
    mappings::MappingOptions,
    tensor::{ Kind, Tensor },
};

pub mod simple;
pub mod product;
pub mod sum;
pub mod scalar;

/// A stage of a mapping search.
pub trait MappingProvider<B> {
    /// Pull a new buffer from upstream, returning `false` if there are no more.
    fn tick(&mut self) -> MappingResult<bool>;

    /// Return the next refinement of the current buffer, if any.
    fn take(&mut self) -> MappingResult<Option<B>>;
}

/// Boxed provider, as built by [`create_provider`].
pub type BoxedProvider<B> = Box<dyn MappingProvider<B>>;

/// Return the next buffer from `upstream`, ticking it as needed.
pub fn pull<B>(upstream: &mut dyn MappingProvider<B>) -> MappingResult<Option<B>> {
    loop {
        if let Some(buffer) = upstream.take()? { return Ok(Some(buffer)); }
        if !upstream.tick()? { return Ok(None); }
    }
}

/// Root of a pipeline: yields a single seed buffer.
#[derive(Clone, Debug)]
pub struct Singleton<B> {
    seed: Option<B>,
    current: Option<B>,
}

impl<B> Singleton<B> {
    pub fn new(seed: B) -> Self { Self { seed: Some(seed), current: None } }

    /// Box a new singleton for use as an upstream.
    pub fn boxed(seed: B) -> BoxedProvider<B>
    where B: 'static
    {
        Box::new(Self::new(seed))
    }
}

impl<B> MappingProvider<B> for Singleton<B> {
    fn tick(&mut self) -> MappingResult<bool> {
        self.current = self.seed.take();
        Ok(self.current.is_some())
    }

    fn take(&mut self) -> MappingResult<Option<B>> { Ok(self.current.take()) }
}

/// A provider that never yields anything.
#[derive(Copy, Clone, Debug, Default)]
pub struct Empty;

impl<B> MappingProvider<B> for Empty {
    fn tick(&mut self) -> MappingResult<bool> { Ok(false) }

    fn take(&mut self) -> MappingResult<Option<B>> { Ok(None) }
}

/// Yields every upstream buffer once, with a fixed sign added.
pub struct PassThrough<B> {
    upstream: BoxedProvider<B>,
    sign: bool,
    current: Option<B>,
}

impl<B> PassThrough<B> {
    pub fn new(upstream: BoxedProvider<B>, sign: bool) -> Self {
        Self { upstream, sign, current: None }
    }
}

impl<B> MappingProvider<B> for PassThrough<B>
where B: IndexMappingBuffer
{
    fn tick(&mut self) -> MappingResult<bool> {
        self.current = pull(self.upstream.as_mut())?;
        Ok(self.current.is_some())
    }

    fn take(&mut self) -> MappingResult<Option<B>> {
        Ok(
            self.current.take()
                .map(|mut buffer| { buffer.add_sign(self.sign); buffer })
        )
    }
}

/// Yields every upstream buffer twice, first unchanged and then with its sign
/// flipped.
pub struct PlusMinus<B> {
    upstream: BoxedProvider<B>,
    plus: Option<B>,
    minus: Option<B>,
}

impl<B> PlusMinus<B> {
    pub fn new(upstream: BoxedProvider<B>) -> Self {
        Self { upstream, plus: None, minus: None }
    }
}

impl<B> MappingProvider<B> for PlusMinus<B>
where B: IndexMappingBuffer
{
    fn tick(&mut self) -> MappingResult<bool> {
        self.plus = pull(self.upstream.as_mut())?;
        self.minus =
            self.plus.as_ref()
            .map(|buffer| {
                let mut flipped = buffer.clone();
                flipped.add_sign(true);
                flipped
            });
        Ok(self.plus.is_some())
    }

    fn take(&mut self) -> MappingResult<Option<B>> {
        Ok(self.plus.take().or_else(|| self.minus.take()))
    }
}

/// Set of signs a sub-search can produce.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Signs {
    pub plus: bool,
    pub minus: bool,
}

impl Signs {
    pub fn none() -> Self { Self::default() }

    pub fn is_empty(&self) -> bool { !self.plus && !self.minus }

    /// Wrap `upstream` in the provider that adds every sign in `self`.
    pub fn provider<B>(self, upstream: BoxedProvider<B>) -> BoxedProvider<B>
    where B: IndexMappingBuffer + 'static
    {
        match (self.plus, self.minus) {
            (true, true) => Box::new(PlusMinus::new(upstream)),
            (true, false) => Box::new(PassThrough::new(upstream, false)),
            (false, true) => Box::new(PassThrough::new(upstream, true)),
            (false, false) => Box::new(Empty),
        }
    }
}

/// Build the provider refining each buffer yielded by `upstream` with all
/// mappings of `from` onto `to`.
///
/// Structurally incompatible expressions give a provider that yields nothing;
/// errors are reserved for broken invariants.
pub fn create_provider<B>(
    upstream: BoxedProvider<B>,
    from: &Tensor,
    to: &Tensor,
    opts: MappingOptions,
) -> MappingResult<BoxedProvider<B>>
where B: IndexMappingBuffer + 'static
{
    if from.structural_hash() != to.structural_hash() {
        trace!(
            from = from.structural_hash(),
            to = to.structural_hash(),
            "structural hash mismatch",
        );
        return Ok(Box::new(Empty));
    }
    if from.free_indices().len() != to.free_indices().len() {
        trace!(
            from = from.free_indices().len(),
            to = to.free_indices().len(),
            "free index count mismatch",
        );
        return Ok(Box::new(Empty));
    }
    match (from.kind(), to.kind()) {
        (Kind::Simple(f), Kind::Simple(t)) => {
            simple::simple_provider(upstream, f, t, opts)
        },
        (Kind::Field(f), Kind::Field(t)) => {
            simple::field_provider(upstream, f, t, opts)
        },
        (Kind::Product(f), Kind::Product(t)) => {
            product::ProductProvider::create(upstream, f, t, from.dummies(), opts)
        },
        (Kind::Sum(f), Kind::Sum(t)) => {
            sum::SumProvider::create(upstream, f, t, opts)
        },
        (Kind::Power(fb, fe), Kind::Power(tb, te)) => {
            Ok(scalar::power_signs(fb, fe, tb, te, opts)?.provider(upstream))
        },
        (Kind::Function(ff, fa), Kind::Function(tf, ta)) if ff == tf => {
            Ok(scalar::function_signs(ff.class(), fa, ta, opts)?.provider(upstream))
        },
        (Kind::Number(f), Kind::Number(t)) => {
            Ok(scalar::number_signs(f, t).provider(upstream))
        },
        (Kind::Product(f), _) => {
            match f.negated_factor() {
                Some(inner) => {
                    let inner = create_provider(upstream, inner, to, opts)?;
                    Ok(Box::new(PassThrough::new(inner, true)))
                },
                None => Ok(Box::new(Empty)),
            }
        },
        (_, Kind::Product(t)) => {
            match t.negated_factor() {
                Some(inner) => {
                    let inner = create_provider(upstream, from, inner, opts)?;
                    Ok(Box::new(PassThrough::new(inner, true)))
                },
                None => Ok(Box::new(Empty)),
            }
        },
        _ => {
            trace!(
                from = ?from.node_kind(),
                to = ?to.node_kind(),
                "node kind mismatch",
            );
            Ok(Box::new(Empty))
        },
    }
}

/// Return whether any mapping, and any mapping of sign zero, of `from` onto
/// `to` exists, searching from a fresh buffer.
pub(crate) fn signs_between(from: &Tensor, to: &Tensor, opts: MappingOptions)
    -> MappingResult<Signs>
{
    let mut pipeline =
        create_provider(Singleton::boxed(MappingBuffer::new()), from, to, opts)?;
    let mut signs = Signs::none();
    while let Some(buffer) = pull(pipeline.as_mut())? {
        if buffer.sign() { signs.minus = true; } else { signs.plus = true; }
        if signs.plus && signs.minus { break; }
    }
    Ok(signs)
}
