//! Minimal symbolic expression trees over abstract indices.
//!
//! A [`Tensor`] is a cheaply clonable handle to an immutable node, which is one
//! of the closed set of kinds in [`Kind`]: simple tensors (a name with an
//! ordered list of indices and a [`SymmetryGroup`] acting on its slots), tensor
//! fields (a simple head applied to arguments), products, sums, powers,
//! elementary functions, and numeric constants.
//!
//! Every node caches, at construction,
//! - a *structural hash*, which ignores index names, numeric coefficients of
//!   products and the overall sign of numbers, and serves as a cheap necessary
//!   condition for two expressions to be mapped onto one another;
//! - its *free* indices, those appearing exactly once, sorted by name;
//! - its *dummies*, the names of all indices contracted somewhere inside it.
//!
//! Builders validate the index invariants: within a simple tensor, a field or a
//! product, every name appears at most twice, and twice only as an upper/lower
//! pair; all terms of a sum share the same free indices; power and function
//! arguments are scalars; and dummies hidden inside one factor or term never
//! collide with names used elsewhere in the same product or sum.
//!
//! ```
//! use std::rc::Rc;
//! use tensor_mapping::index::{ Index, IndexType };
//! use tensor_mapping::symmetry::SymmetryGroup;
//! use tensor_mapping::tensor::Tensor;
//!
//! let a = Index::lower(0, IndexType::LatinLower);
//! let b = Index::lower(1, IndexType::LatinLower);
//! let sym = Rc::new(SymmetryGroup::symmetric(2));
//! let g_ab = Tensor::simple_with_symmetries("g", [a, b], sym.clone()).unwrap();
//! let g_ba = Tensor::simple_with_symmetries("g", [b, a], sym).unwrap();
//! assert_eq!(g_ab.structural_hash(), g_ba.structural_hash());
//! assert_eq!(g_ab.free_indices(), &[a, b]);
//! ```

use std::{
    hash::{ Hash, Hasher },
    ops::Neg,
    rc::Rc,
};
use once_cell::unsync::OnceCell;
use rustc_hash::{ FxHashSet as HashSet, FxHasher };
use thiserror::Error;
use crate::{
    buffer::MappingResult,
    graph::GraphStructure,
    index::{ self, Index },
    number::Number,
    symmetry::{ SymmetryError, SymmetryGroup },
};

#[derive(Debug, Error)]
pub enum TensorError {
    /// Returned when an index name appears more than twice, or twice with the
    /// same state.
    #[error("error in tensor creation: repeated index {0}")]
    DuplicateIndex(Index),

    /// Returned when a symmetry group acts on a different number of slots than
    /// there are indices.
    #[error("error in tensor creation: symmetry of degree {found} for {expected} indices")]
    SymmetryDegree { expected: usize, found: usize },

    /// Returned when a symmetry moves a slot onto one holding an index of a
    /// different type (or a different state, for non-metric types).
    #[error("error in tensor creation: symmetry moves slot {0} across index structures")]
    SymmetryStructure(usize),

    /// Returned when the terms of a sum have different free indices.
    #[error("error in sum creation: terms have different free indices")]
    SumIndices,

    /// Returned when a power or function is given an argument with free
    /// indices.
    #[error("error in tensor creation: argument has free indices")]
    NonScalarArgument,

    /// Returned when an internal dummy of one part of an expression reuses a
    /// name visible in another part.
    #[error("error in tensor creation: dummy index {0} clashes with another index")]
    DummyClash(Index),

    /// Returned when the number of propagation flags of a field does not match
    /// its number of arguments.
    #[error("error in field creation: {args} arguments but {flags} propagation flags")]
    FieldArity { args: usize, flags: usize },

    /// Returned when a numeric ratio is given a zero denominator.
    #[error("error in number creation: zero denominator")]
    ZeroDenominator,

    /// Returned by anything involving the construction of a symmetry group.
    #[error("symmetry error: {0}")]
    SymmetryError(#[from] SymmetryError),
}
use TensorError::*;
pub type TensorResult<T> = Result<T, TensorError>;

/// Elementary functions of one scalar argument.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum Function {
    Sin,
    Cos,
    Tan,
    Cot,
    ArcSin,
    ArcCos,
    ArcTan,
    ArcCot,
    Log,
    Exp,
}

/// Behavior of a [`Function`] under negation of its argument.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum FunctionClass {
    /// *f*(-*x*) = -*f*(*x*)
    Odd,
    /// *f*(-*x*) = *f*(*x*)
    Even,
    /// No relation between *f*(-*x*) and *f*(*x*).
    Log,
}

impl Function {
    pub fn class(self) -> FunctionClass {
        match self {
            Self::Sin | Self::Tan | Self::Cot
            | Self::ArcSin | Self::ArcTan | Self::ArcCot => FunctionClass::Odd,
            Self::Cos | Self::ArcCos => FunctionClass::Even,
            Self::Log | Self::Exp => FunctionClass::Log,
        }
    }
}

/// Discriminant of a node, without its contents.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Simple,
    Field,
    Product,
    Sum,
    Power,
    Function(FunctionClass),
    Number,
}

/// A named tensor with an ordered list of indices.
#[derive(Clone, Debug)]
pub struct SimpleTensor {
    name: Rc<str>,
    indices: Vec<Index>,
    symmetries: Rc<SymmetryGroup>,
}

impl SimpleTensor {
    pub fn name(&self) -> &str { &self.name }

    /// Return the indices in slot order.
    pub fn indices(&self) -> &[Index] { &self.indices }

    pub fn symmetries(&self) -> &Rc<SymmetryGroup> { &self.symmetries }

    fn content_hash(&self) -> u64 {
        let mut hasher = FxHasher::default();
        "simple".hash(&mut hasher);
        self.name.hash(&mut hasher);
        self.indices.len().hash(&mut hasher);
        self.indices.iter()
            .for_each(|idx| { idx.type_code().hash(&mut hasher); });
        hasher.finish()
    }

    fn slots(&self) -> impl Iterator<Item = (Index, u16)> + '_ {
        self.indices.iter().copied()
            .zip(self.symmetries.orbits().iter().copied())
    }
}

/// A simple tensor head applied to a list of arguments.
///
/// Each argument is flagged by whether its free indices propagate to the
/// field's own index list. Non-propagating arguments are compared on their own
/// when mapping fields; propagating ones are mapped together with the head.
#[derive(Clone, Debug)]
pub struct TensorField {
    head: SimpleTensor,
    args: Vec<Tensor>,
    propagate: Vec<bool>,
}

impl TensorField {
    pub fn head(&self) -> &SimpleTensor { &self.head }

    pub fn args(&self) -> &[Tensor] { &self.args }

    pub fn propagates(&self, k: usize) -> bool {
        self.propagate.get(k).copied().unwrap_or(false)
    }

    pub fn propagation(&self) -> &[bool] { &self.propagate }
}

/// A product of factors times a numeric coefficient.
///
/// Factors without free indices are kept apart from the rest, and both groups
/// are sorted by structural hash.
#[derive(Debug)]
pub struct Product {
    coefficient: Number,
    indexless: Vec<Tensor>,
    data: Vec<Tensor>,
    free: Vec<Index>,
    graph: OnceCell<GraphStructure>,
}

impl Product {
    pub fn coefficient(&self) -> &Number { &self.coefficient }

    /// Return the factors without free indices.
    pub fn indexless(&self) -> &[Tensor] { &self.indexless }

    /// Return the factors with free indices.
    pub fn data(&self) -> &[Tensor] { &self.data }

    /// Return the total number of non-numeric factors.
    pub fn len(&self) -> usize { self.indexless.len() + self.data.len() }

    pub fn is_empty(&self) -> bool { self.len() == 0 }

    /// Return the contraction structure of the indexed factors, building it on
    /// first access.
    pub fn graph(&self) -> MappingResult<&GraphStructure> {
        self.graph.get_or_try_init(|| GraphStructure::new(&self.data, &self.free))
    }

    // the single factor of `-x`, if `self` is one
    pub(crate) fn negated_factor(&self) -> Option<&Tensor> {
        if self.coefficient.is_minus_one() && self.len() == 1 {
            self.indexless.first().or(self.data.first())
        } else {
            None
        }
    }
}

/// Contents of a node.
#[derive(Debug)]
pub enum Kind {
    Simple(SimpleTensor),
    Field(TensorField),
    Product(Product),
    Sum(Vec<Tensor>),
    Power(Tensor, Tensor),
    Function(Function, Tensor),
    Number(Number),
}

#[derive(Debug)]
struct Node {
    kind: Kind,
    hash: u64,
    free: Vec<Index>,
    dummies: Vec<u32>,
}

/// Handle to an immutable expression node.
#[derive(Clone, Debug)]
pub struct Tensor(Rc<Node>);

impl Tensor {
    fn from_node(kind: Kind, hash: u64, free: Vec<Index>, dummies: Vec<u32>)
        -> Self
    {
        Self(Rc::new(Node { kind, hash, free, dummies }))
    }

    /// Create a new simple tensor with no index symmetries.
    pub fn simple<I>(name: &str, indices: I) -> TensorResult<Self>
    where I: IntoIterator<Item = Index>
    {
        let indices: Vec<Index> = indices.into_iter().collect();
        let symmetries = Rc::new(SymmetryGroup::trivial(indices.len()));
        Self::simple_with_symmetries(name, indices, symmetries)
    }

    /// Create a new simple tensor whose slots obey a given symmetry group.
    ///
    /// Fails if an index is repeated illegally, or if the group does not act
    /// on exactly the tensor's slots or moves a slot onto one of a different
    /// index structure.
    pub fn simple_with_symmetries<I>(
        name: &str,
        indices: I,
        symmetries: Rc<SymmetryGroup>,
    ) -> TensorResult<Self>
    where I: IntoIterator<Item = Index>
    {
        let head = make_simple(name, indices.into_iter().collect(), symmetries)?;
        let (free, dummies)
            = index::split_contractions(&head.indices).map_err(DuplicateIndex)?;
        let hash = head.content_hash();
        Ok(Self::from_node(Kind::Simple(head), hash, free, dummies))
    }

    /// Create a new tensor field.
    ///
    /// `propagate[k]` tells whether the free indices of `args[k]` become
    /// indices of the field itself.
    pub fn field<I>(
        name: &str,
        indices: I,
        symmetries: Rc<SymmetryGroup>,
        args: Vec<Tensor>,
        propagate: Vec<bool>,
    ) -> TensorResult<Self>
    where I: IntoIterator<Item = Index>
    {
        if args.len() != propagate.len() {
            return Err(FieldArity { args: args.len(), flags: propagate.len() });
        }
        let head = make_simple(name, indices.into_iter().collect(), symmetries)?;
        let slots: Vec<Index> =
            head.indices.iter().copied()
            .chain(
                args.iter().zip(propagate.iter())
                .filter(|(_, p)| **p)
                .flat_map(|(arg, _)| arg.free_indices().iter().copied())
            )
            .collect();
        let (free, contracted)
            = index::split_contractions(&slots).map_err(DuplicateIndex)?;
        let visible: HashSet<u32> =
            slots.iter().map(|idx| idx.name_with_type()).collect();
        let hidden = merge_hidden(
            &visible,
            args.iter().zip(propagate.iter())
                .filter(|(_, p)| **p)
                .map(|(arg, _)| arg),
        )?;
        let dummies = sorted_union(contracted, hidden);

        let mut hasher = FxHasher::default();
        "field".hash(&mut hasher);
        head.content_hash().hash(&mut hasher);
        args.iter()
            .for_each(|arg| { arg.structural_hash().hash(&mut hasher); });
        propagate.hash(&mut hasher);
        let hash = hasher.finish();

        let field = TensorField { head, args, propagate };
        Ok(Self::from_node(Kind::Field(field), hash, free, dummies))
    }

    /// Create a numeric constant.
    pub fn number(n: Number) -> Self {
        let mut hasher = FxHasher::default();
        n.hash(&mut hasher);
        let hash = hasher.finish();
        Self::from_node(Kind::Number(n), hash, Vec::new(), Vec::new())
    }

    /// Create the real constant `numer / denom`.
    pub fn ratio(numer: i64, denom: i64) -> TensorResult<Self> {
        Number::ratio(numer, denom).map(Self::number).ok_or(ZeroDenominator)
    }

    /// Create the product of a list of factors.
    ///
    /// Nested products are flattened and numeric factors are multiplied into
    /// the coefficient. A product with zero coefficient is zero, and a product
    /// of a single factor with unit coefficient is that factor.
    pub fn product<I>(factors: I) -> TensorResult<Self>
    where I: IntoIterator<Item = Tensor>
    {
        let mut coefficient = Number::integer(1);
        let mut parts: Vec<Tensor> = Vec::new();
        for factor in factors.into_iter() {
            match factor.kind() {
                Kind::Number(n) => { coefficient = coefficient * n.clone(); },
                Kind::Product(p) => {
                    coefficient = coefficient * p.coefficient.clone();
                    parts.extend(p.indexless.iter().cloned());
                    parts.extend(p.data.iter().cloned());
                },
                _ => { parts.push(factor); },
            }
        }
        if coefficient.is_zero() || parts.is_empty() {
            return Ok(Self::number(coefficient));
        }
        if coefficient.is_one() && parts.len() == 1 {
            if let Some(only) = parts.pop() { return Ok(only); }
        }

        let (mut indexless, mut data): (Vec<Tensor>, Vec<Tensor>)
            = parts.into_iter().partition(|t| t.is_indexless());
        let slots: Vec<Index> =
            data.iter()
            .flat_map(|t| t.slots().into_iter().map(|(idx, _)| idx))
            .collect();
        let (free, contracted)
            = index::split_contractions(&slots).map_err(DuplicateIndex)?;
        let visible: HashSet<u32> =
            slots.iter().map(|idx| idx.name_with_type()).collect();
        let hidden = merge_hidden(
            &visible,
            indexless.iter().chain(data.iter()),
        )?;
        let dummies = sorted_union(contracted, hidden);

        indexless.sort_by_key(|t| t.structural_hash());
        data.sort_by_key(|t| t.structural_hash());
        let hash = product_hash(&indexless, &data);
        let product = Product {
            coefficient,
            indexless,
            data,
            free: free.clone(),
            graph: OnceCell::new(),
        };
        Ok(Self::from_node(Kind::Product(product), hash, free, dummies))
    }

    /// Create the sum of a list of terms.
    ///
    /// Nested sums are flattened and numeric terms are added together (and
    /// dropped if they total zero). A sum of no terms is zero, and a sum of a
    /// single term is that term.
    pub fn sum<I>(terms: I) -> TensorResult<Self>
    where I: IntoIterator<Item = Tensor>
    {
        let mut constant = Number::integer(0);
        let mut parts: Vec<Tensor> = Vec::new();
        for term in terms.into_iter() {
            match term.kind() {
                Kind::Number(n) => { constant = constant + n.clone(); },
                Kind::Sum(inner) => {
                    for t in inner.iter() {
                        match t.kind() {
                            Kind::Number(n) => {
                                constant = constant + n.clone();
                            },
                            _ => { parts.push(t.clone()); },
                        }
                    }
                },
                _ => { parts.push(term); },
            }
        }
        if !constant.is_zero() { parts.push(Self::number(constant)); }
        if parts.len() < 2 {
            return Ok(parts.pop().unwrap_or_else(|| Self::from(0)));
        }

        let free: Vec<Index> = parts[0].free_indices().to_vec();
        if parts.iter().any(|t| t.free_indices() != free.as_slice()) {
            return Err(SumIndices);
        }
        let visible: HashSet<u32> =
            free.iter().map(|idx| idx.name_with_type()).collect();
        let mut dummies: Vec<u32> = Vec::new();
        for t in parts.iter() {
            // terms may reuse each other's dummies, but not the free names
            if let Some(&clash) =
                t.dummies().iter().find(|d| visible.contains(d))
            {
                return Err(DummyClash(Index::from_name_with_type(clash, false)));
            }
            dummies.extend(t.dummies().iter().copied());
        }
        dummies.sort_unstable();
        dummies.dedup();

        parts.sort_by_key(|t| t.structural_hash());
        let mut hasher = FxHasher::default();
        "sum".hash(&mut hasher);
        parts.iter()
            .for_each(|t| { t.structural_hash().hash(&mut hasher); });
        let hash = hasher.finish();
        Ok(Self::from_node(Kind::Sum(parts), hash, free, dummies))
    }

    /// Create `base` raised to `exponent`. Both must be scalars.
    pub fn pow(base: Tensor, exponent: Tensor) -> TensorResult<Self> {
        if !base.is_indexless() || !exponent.is_indexless() {
            return Err(NonScalarArgument);
        }
        let mut hasher = FxHasher::default();
        "pow".hash(&mut hasher);
        base.structural_hash().hash(&mut hasher);
        exponent.structural_hash().hash(&mut hasher);
        let hash = hasher.finish();
        Ok(Self::from_node(
            Kind::Power(base, exponent), hash, Vec::new(), Vec::new()))
    }

    /// Apply an elementary function to a scalar argument.
    pub fn function(function: Function, arg: Tensor) -> TensorResult<Self> {
        if !arg.is_indexless() { return Err(NonScalarArgument); }
        let mut hasher = FxHasher::default();
        "function".hash(&mut hasher);
        function.hash(&mut hasher);
        arg.structural_hash().hash(&mut hasher);
        let hash = hasher.finish();
        Ok(Self::from_node(
            Kind::Function(function, arg), hash, Vec::new(), Vec::new()))
    }

    /// Return `-self`.
    ///
    /// Products have their coefficient negated, numbers are negated directly,
    /// and everything else is wrapped in a product with coefficient `-1`.
    pub fn negate(&self) -> Self {
        match self.kind() {
            Kind::Number(n) => Self::number(-n.clone()),
            Kind::Product(p) => {
                if let Some(inner) = p.negated_factor() { return inner.clone(); }
                let coefficient = -p.coefficient.clone();
                let product = Product {
                    coefficient,
                    indexless: p.indexless.clone(),
                    data: p.data.clone(),
                    free: p.free.clone(),
                    graph: OnceCell::new(),
                };
                Self::from_node(
                    Kind::Product(product),
                    self.0.hash,
                    self.0.free.clone(),
                    self.0.dummies.clone(),
                )
            },
            _ => {
                let (indexless, data) =
                    if self.is_indexless() {
                        (vec![self.clone()], Vec::new())
                    } else {
                        (Vec::new(), vec![self.clone()])
                    };
                let hash = product_hash(&indexless, &data);
                let product = Product {
                    coefficient: Number::integer(-1),
                    indexless,
                    data,
                    free: self.0.free.clone(),
                    graph: OnceCell::new(),
                };
                Self::from_node(
                    Kind::Product(product),
                    hash,
                    self.0.free.clone(),
                    self.0.dummies.clone(),
                )
            },
        }
    }

    /// Return the node's contents.
    pub fn kind(&self) -> &Kind { &self.0.kind }

    /// Return the node's discriminant.
    pub fn node_kind(&self) -> NodeKind {
        match self.kind() {
            Kind::Simple(_) => NodeKind::Simple,
            Kind::Field(_) => NodeKind::Field,
            Kind::Product(_) => NodeKind::Product,
            Kind::Sum(_) => NodeKind::Sum,
            Kind::Power(..) => NodeKind::Power,
            Kind::Function(f, _) => NodeKind::Function(f.class()),
            Kind::Number(_) => NodeKind::Number,
        }
    }

    /// Return the cached structural hash.
    ///
    /// Two expressions that can be mapped onto one another always have equal
    /// hashes; the converse does not hold.
    pub fn structural_hash(&self) -> u64 { self.0.hash }

    /// Return the free indices, sorted by name.
    pub fn free_indices(&self) -> &[Index] { &self.0.free }

    /// Return the sorted names of all indices contracted inside `self`.
    pub fn dummies(&self) -> &[u32] { &self.0.dummies }

    /// Return `true` if `self` has no free indices.
    pub fn is_indexless(&self) -> bool { self.0.free.is_empty() }

    /// Return `true` if `self` and `other` are the same node.
    pub fn ptr_eq(&self, other: &Self) -> bool { Rc::ptr_eq(&self.0, &other.0) }

    /// Return the indices `self` exposes to a product it is a factor of,
    /// together with the orbit id of each slot.
    ///
    /// Slots of simple tensors (and field heads) are positional, with orbit ids
    /// from the symmetry group. Free indices of any other node have no
    /// meaningful position, so they all share one orbit.
    pub(crate) fn slots(&self) -> Vec<(Index, u16)> {
        match self.kind() {
            Kind::Simple(s) => s.slots().collect(),
            Kind::Field(f) => {
                let mut slots: Vec<(Index, u16)> = f.head.slots().collect();
                let base: u16 =
                    f.head.symmetries.orbits().iter()
                    .max()
                    .map(|m| m + 1)
                    .unwrap_or(0);
                f.args.iter().zip(f.propagate.iter())
                    .filter(|(_, p)| **p)
                    .enumerate()
                    .for_each(|(k, (arg, _))| {
                        slots.extend(
                            arg.free_indices().iter()
                            .map(|&idx| (idx, base + k as u16))
                        );
                    });
                slots
            },
            _ => self.0.free.iter().map(|&idx| (idx, 0)).collect(),
        }
    }
}

impl Neg for Tensor {
    type Output = Tensor;

    fn neg(self) -> Self::Output { self.negate() }
}

impl Neg for &Tensor {
    type Output = Tensor;

    fn neg(self) -> Self::Output { self.negate() }
}

impl From<Number> for Tensor {
    fn from(n: Number) -> Self { Self::number(n) }
}

impl From<i64> for Tensor {
    fn from(n: i64) -> Self { Self::number(Number::integer(n)) }
}

fn make_simple(
    name: &str,
    indices: Vec<Index>,
    symmetries: Rc<SymmetryGroup>,
) -> TensorResult<SimpleTensor> {
    if symmetries.degree() != indices.len() {
        return Err(SymmetryDegree {
            expected: indices.len(),
            found: symmetries.degree(),
        });
    }
    for g in symmetries.generators().iter() {
        for (k, &p) in g.image().iter().enumerate() {
            let here = indices[k];
            let there = indices[p as usize];
            let compatible =
                here.type_code() == there.type_code()
                && (here.is_metric() || !here.state_differs(there));
            if !compatible { return Err(SymmetryStructure(k)); }
        }
    }
    Ok(SimpleTensor { name: name.into(), indices, symmetries })
}

// a lone factor carries its own hash, so that `-x` and `x` collide
fn product_hash(indexless: &[Tensor], data: &[Tensor]) -> u64 {
    if indexless.len() + data.len() == 1 {
        return indexless.first().or(data.first())
            .map(|t| t.structural_hash())
            .unwrap_or(0);
    }
    let mut hashes: Vec<u64> =
        indexless.iter().chain(data.iter())
        .map(|t| t.structural_hash())
        .collect();
    hashes.sort_unstable();
    let mut hasher = FxHasher::default();
    "product".hash(&mut hasher);
    hashes.hash(&mut hasher);
    hasher.finish()
}

// collect the dummies hidden inside each part (i.e. not among the part's own
// slot names), failing if two parts hide the same name or a hidden name is
// visible at the enclosing level
fn merge_hidden<'a, I>(visible: &HashSet<u32>, parts: I)
    -> TensorResult<Vec<u32>>
where I: IntoIterator<Item = &'a Tensor>
{
    let mut hidden: HashSet<u32> = HashSet::default();
    for part in parts.into_iter() {
        // contractions between a part's own slots are visible
        let own: HashSet<u32> =
            part.slots().into_iter()
            .map(|(idx, _)| idx.name_with_type())
            .collect();
        for &d in part.dummies().iter().filter(|d| !own.contains(d)) {
            if visible.contains(&d) || !hidden.insert(d) {
                return Err(DummyClash(Index::from_name_with_type(d, false)));
            }
        }
    }
    let mut hidden: Vec<u32> = hidden.into_iter().collect();
    hidden.sort_unstable();
    Ok(hidden)
}

fn sorted_union(mut a: Vec<u32>, b: Vec<u32>) -> Vec<u32> {
    a.extend(b);
    a.sort_unstable();
    a.dedup();
    a
}
