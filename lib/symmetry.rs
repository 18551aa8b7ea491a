//! Permutational symmetries of a tensor's index slots.
//!
//! A [`Permutation`] `p` of degree *n*, together with its antisymmetry bit `s`,
//! declares that a tensor with slots `0, ..., n - 1` satisfies
//!
//! <blockquote>
//!   <i>T</i><sub><i>i</i>(0) ... <i>i</i>(<i>n</i>-1)</sub>
//!   = (-1)<sup><i>s</i></sup>
//!   <i>T</i><sub><i>i</i>(<i>p</i>(0)) ... <i>i</i>(<i>p</i>(<i>n</i>-1))</sub>
//! </blockquote>
//!
//! A [`SymmetryGroup`] is the closure of a set of such generators under
//! composition. Groups here are small (they act on the slots of a single
//! tensor), so all elements are computed up front and kept in lexicographic
//! order of their images, with the identity first. Enumeration happens through
//! [`PermutationCursor`]s, which are plain resumable positions into that list
//! and can be cloned freely.

use std::rc::Rc;
use itertools::Itertools;
use rustc_hash::{ FxHashMap as HashMap };
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SymmetryError {
    /// Returned when a permutation's image array is not a bijection of
    /// `0 .. n`.
    #[error("error in permutation creation: image is not a bijection")]
    NotAPermutation,

    /// Returned when generators of different degrees are combined.
    #[error("error in group creation: expected degree {expected}, found {found}")]
    DegreeMismatch { expected: usize, found: usize },

    /// Returned when the closure of a set of generators contains the same
    /// permutation with both signs, i.e. the tensor would be identically zero.
    #[error("error in group creation: inconsistent generators, {0:?} occurs with both signs")]
    InconsistentSign(Vec<u32>),
}
use SymmetryError::*;
pub type SymmetryResult<T> = Result<T, SymmetryError>;

/// A permutation of index slots with an attached antisymmetry bit.
///
/// Images are reference-counted, so cloning is cheap.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Permutation {
    image: Rc<[u32]>,
    antisymmetric: bool,
}

impl Permutation {
    /// Create a new permutation from its image array.
    ///
    /// Fails if `image` is not a bijection of `0 .. image.len()`.
    pub fn new<I>(image: I, antisymmetric: bool) -> SymmetryResult<Self>
    where I: IntoIterator<Item = u32>
    {
        let image: Vec<u32> = image.into_iter().collect();
        let mut seen = vec![false; image.len()];
        for &k in image.iter() {
            match seen.get_mut(k as usize) {
                Some(s) if !*s => { *s = true; },
                _ => { return Err(NotAPermutation); },
            }
        }
        Ok(Self { image: image.into(), antisymmetric })
    }

    /// Return the identity permutation on `n` points.
    pub fn identity(n: usize) -> Self {
        Self { image: (0..n as u32).collect(), antisymmetric: false }
    }

    /// Return the transposition of points `i` and `j` on `n` points.
    ///
    /// Fails if either point is out of range.
    pub fn transposition(n: usize, i: usize, j: usize, antisymmetric: bool)
        -> SymmetryResult<Self>
    {
        if i >= n || j >= n { return Err(NotAPermutation); }
        let mut image: Vec<u32> = (0..n as u32).collect();
        image.swap(i, j);
        Ok(Self { image: image.into(), antisymmetric })
    }

    /// Return the number of points acted upon.
    pub fn degree(&self) -> usize { self.image.len() }

    /// Return the image array.
    pub fn image(&self) -> &[u32] { &self.image }

    /// Return the image of a single point.
    pub fn apply(&self, point: usize) -> u32 { self.image[point] }

    /// Return `true` if the permutation introduces a factor of `-1`.
    pub fn is_antisymmetric(&self) -> bool { self.antisymmetric }

    /// Return `true` if `self` moves no point. The antisymmetry bit is
    /// ignored.
    pub fn is_identity(&self) -> bool {
        self.image.iter().enumerate().all(|(k, &p)| k as u32 == p)
    }

    /// Return `true` if `self` is an odd permutation.
    pub fn parity(&self) -> bool {
        let n = self.degree();
        let mut visited = vec![false; n];
        let mut transpositions: usize = 0;
        for start in 0..n {
            if visited[start] { continue; }
            let mut len: usize = 0;
            let mut k = start;
            while !visited[k] {
                visited[k] = true;
                k = self.image[k] as usize;
                len += 1;
            }
            transpositions += len - 1;
        }
        transpositions % 2 == 1
    }

    /// Return the composition `x ↦ self(other(x))`, with antisymmetry bits
    /// combined.
    pub fn compose(&self, other: &Self) -> Self {
        let image: Rc<[u32]> =
            other.image.iter()
            .map(|&k| self.image[k as usize])
            .collect();
        Self { image, antisymmetric: self.antisymmetric ^ other.antisymmetric }
    }

    /// Return the inverse permutation.
    pub fn inverse(&self) -> Self {
        let mut image = vec![0_u32; self.degree()];
        self.image.iter().enumerate()
            .for_each(|(k, &p)| { image[p as usize] = k as u32; });
        Self { image: image.into(), antisymmetric: self.antisymmetric }
    }
}

/// A group of slot permutations.
#[derive(Clone, Debug)]
pub struct SymmetryGroup {
    degree: usize,
    generators: Vec<Permutation>,
    elements: Rc<[Permutation]>,
    orbits: Vec<u16>,
}

impl SymmetryGroup {
    /// Create the trivial group on `n` points.
    pub fn trivial(n: usize) -> Self {
        Self {
            degree: n,
            generators: Vec::new(),
            elements: vec![Permutation::identity(n)].into(),
            orbits: (0..n as u16).collect(),
        }
    }

    /// Create the group of all permutations of `n` points, each with zero
    /// antisymmetry bit.
    pub fn symmetric(n: usize) -> Self {
        let generators: Vec<Permutation> =
            (1..n)
            .map(|k| {
                let mut image: Vec<u32> = (0..n as u32).collect();
                image.swap(k - 1, k);
                Permutation { image: image.into(), antisymmetric: false }
            })
            .collect();
        let elements: Rc<[Permutation]> =
            (0..n as u32).permutations(n)
            .map(|image| Permutation { image: image.into(), antisymmetric: false })
            .collect();
        let orbits = vec![0; n];
        Self { degree: n, generators, elements, orbits }
    }

    /// Create the group of all permutations of `n` points, with antisymmetry
    /// bits equal to their parities.
    pub fn antisymmetric(n: usize) -> Self {
        let generators: Vec<Permutation> =
            (1..n)
            .map(|k| {
                let mut image: Vec<u32> = (0..n as u32).collect();
                image.swap(k - 1, k);
                Permutation { image: image.into(), antisymmetric: true }
            })
            .collect();
        let elements: Rc<[Permutation]> =
            (0..n as u32).permutations(n)
            .map(|image| {
                let mut p =
                    Permutation { image: image.into(), antisymmetric: false };
                p.antisymmetric = p.parity();
                p
            })
            .collect();
        let orbits = vec![0; n];
        Self { degree: n, generators, elements, orbits }
    }

    /// Create the group generated by a set of permutations on `n` points.
    ///
    /// Fails if any generator has degree other than `n`, or if the group
    /// contains some permutation with both antisymmetry bits.
    pub fn from_generators<I>(n: usize, generators: I) -> SymmetryResult<Self>
    where I: IntoIterator<Item = Permutation>
    {
        let generators: Vec<Permutation> =
            generators.into_iter()
            .filter(|g| !(g.is_identity() && !g.is_antisymmetric()))
            .collect();
        if let Some(g) = generators.iter().find(|g| g.degree() != n) {
            return Err(DegreeMismatch { expected: n, found: g.degree() });
        }
        let elements = closure(n, &generators)?;
        let orbits = orbits(n, &generators);
        Ok(Self { degree: n, generators, elements: elements.into(), orbits })
    }

    /// Return the number of points acted upon.
    pub fn degree(&self) -> usize { self.degree }

    /// Return the generators the group was built from.
    pub fn generators(&self) -> &[Permutation] { &self.generators }

    /// Return all elements in lexicographic order of their images.
    pub fn elements(&self) -> &[Permutation] { &self.elements }

    /// Return the number of elements.
    pub fn order(&self) -> usize { self.elements.len() }

    /// Return `true` if the group contains only the identity.
    pub fn is_trivial(&self) -> bool { self.elements.len() == 1 }

    /// Return the orbit id of every point.
    ///
    /// Points that can be carried into one another by some element share an
    /// id; ids are assigned in order of each orbit's smallest point, starting
    /// from zero.
    pub fn orbits(&self) -> &[u16] { &self.orbits }

    /// Return a cursor over all elements, starting with the identity.
    pub fn cursor(&self) -> PermutationCursor {
        PermutationCursor {
            elements: self.elements.clone(),
            pos: 0,
            fixed: Vec::new(),
        }
    }

    /// Return a cursor over only those elements `p` with `p(k) == j` for every
    /// pair `(k, j)` in `fixed`.
    ///
    /// The cursor filters the full element list as it goes, so its cost is
    /// linear in the order of the group no matter how few elements survive.
    /// Groups are held fully expanded; [`symmetric`][Self::symmetric] and
    /// [`antisymmetric`][Self::antisymmetric] groups of degree `n` hold `n!`
    /// elements.
    pub fn cursor_fixing(&self, fixed: &[(u32, u32)]) -> PermutationCursor {
        PermutationCursor {
            elements: self.elements.clone(),
            pos: 0,
            fixed: fixed.to_vec(),
        }
    }
}

impl PartialEq for SymmetryGroup {
    fn eq(&self, other: &Self) -> bool {
        self.degree == other.degree && self.elements == other.elements
    }
}

impl Eq for SymmetryGroup { }

// breadth-first closure of the generators, starting from the identity
fn closure(n: usize, generators: &[Permutation])
    -> SymmetryResult<Vec<Permutation>>
{
    let identity = Permutation::identity(n);
    let mut seen: HashMap<Rc<[u32]>, bool> = HashMap::default();
    seen.insert(identity.image.clone(), false);
    let mut frontier: Vec<Permutation> = vec![identity];
    while !frontier.is_empty() {
        let mut next: Vec<Permutation> = Vec::new();
        for p in frontier.iter() {
            for g in generators.iter() {
                let q = g.compose(p);
                match seen.get(&q.image) {
                    Some(&sign) if sign != q.antisymmetric => {
                        return Err(InconsistentSign(q.image.to_vec()));
                    },
                    Some(_) => { },
                    None => {
                        seen.insert(q.image.clone(), q.antisymmetric);
                        next.push(q);
                    },
                }
            }
        }
        frontier = next;
    }
    let elements: Vec<Permutation> =
        seen.into_iter()
        .map(|(image, antisymmetric)| Permutation { image, antisymmetric })
        .sorted()
        .collect();
    Ok(elements)
}

fn orbits(n: usize, generators: &[Permutation]) -> Vec<u16> {
    fn find(parent: &mut [usize], mut k: usize) -> usize {
        while parent[k] != k {
            parent[k] = parent[parent[k]];
            k = parent[k];
        }
        k
    }

    let mut parent: Vec<usize> = (0..n).collect();
    for g in generators.iter() {
        for (k, &p) in g.image().iter().enumerate() {
            let a = find(&mut parent, k);
            let b = find(&mut parent, p as usize);
            if a != b { parent[a.max(b)] = a.min(b); }
        }
    }
    let mut ids: HashMap<usize, u16> = HashMap::default();
    (0..n)
        .map(|k| {
            let root = find(&mut parent, k);
            let next = ids.len() as u16;
            *ids.entry(root).or_insert(next)
        })
        .collect()
}

/// Resumable position in the element list of a [`SymmetryGroup`].
///
/// A cursor is an external iterator: restarting an enumeration means asking
/// the group for a fresh cursor, and resuming means calling `next` on an
/// existing one. Cursors are never shared between two search branches; clone
/// one instead.
#[derive(Clone, Debug)]
pub struct PermutationCursor {
    elements: Rc<[Permutation]>,
    pos: usize,
    fixed: Vec<(u32, u32)>,
}

impl PermutationCursor {
    fn admits(&self, p: &Permutation) -> bool {
        self.fixed.iter().all(|&(k, j)| p.image[k as usize] == j)
    }
}

impl Iterator for PermutationCursor {
    type Item = Permutation;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(p) = self.elements.get(self.pos) {
            self.pos += 1;
            if self.admits(p) { return Some(p.clone()); }
        }
        None
    }
}

impl std::iter::FusedIterator for PermutationCursor { }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permutation_validation() {
        assert!(Permutation::new([0, 0], false).is_err());
        assert!(Permutation::new([0, 2], false).is_err());
        assert!(Permutation::new([1, 0], false).is_ok());
        assert!(Permutation::transposition(2, 0, 2, false).is_err());
    }

    #[test]
    fn compose_and_invert() {
        let p = Permutation::new([1, 2, 0], true).unwrap();
        let q = p.inverse();
        let id = p.compose(&q);
        assert!(id.is_identity());
        assert!(!id.is_antisymmetric());
        assert!(!p.parity());
        assert!(Permutation::transposition(3, 0, 1, false).unwrap().parity());
    }

    #[test]
    fn antisymmetric_pair() {
        let g = SymmetryGroup::antisymmetric(2);
        assert_eq!(g.order(), 2);
        assert!(g.elements()[0].is_identity());
        assert!(g.elements()[1].is_antisymmetric());
        assert_eq!(g.orbits(), &[0, 0]);
    }

    #[test]
    fn closure_matches_builtin() {
        let gens = [
            Permutation::transposition(3, 0, 1, true).unwrap(),
            Permutation::transposition(3, 1, 2, true).unwrap(),
        ];
        let g = SymmetryGroup::from_generators(3, gens).unwrap();
        assert_eq!(g, SymmetryGroup::antisymmetric(3));
        assert_eq!(g.order(), 6);
        let odd = g.elements().iter().filter(|p| p.is_antisymmetric()).count();
        assert_eq!(odd, 3);
    }

    #[test]
    fn inconsistent_generators() {
        let gens = [
            Permutation::transposition(2, 0, 1, true).unwrap(),
            Permutation::transposition(2, 0, 1, false).unwrap(),
        ];
        assert!(matches!(
            SymmetryGroup::from_generators(2, gens),
            Err(InconsistentSign(_))
        ));
    }

    #[test]
    fn partial_orbits() {
        // Riemann-like pair symmetry on slots (0 1) only
        let gens = [Permutation::transposition(4, 0, 1, true).unwrap()];
        let g = SymmetryGroup::from_generators(4, gens).unwrap();
        assert_eq!(g.orbits(), &[0, 0, 1, 2]);
        assert_eq!(g.order(), 2);
    }

    #[test]
    fn cursor_fixing() {
        let g = SymmetryGroup::symmetric(3);
        let all: Vec<Permutation> = g.cursor().collect();
        assert_eq!(all.len(), 6);
        assert!(all.windows(2).all(|w| w[0] < w[1]));
        let fixed: Vec<Permutation> = g.cursor_fixing(&[(0, 2)]).collect();
        assert_eq!(fixed.len(), 2);
        assert!(fixed.iter().all(|p| p.apply(0) == 2));
        let none: Vec<Permutation> =
            g.cursor_fixing(&[(0, 1), (1, 1)]).collect();
        assert!(none.is_empty());
    }

    #[test]
    fn stabilizer_of_expanded_group() {
        // all 5! elements are held; fixing two points leaves 3! of them
        let g = SymmetryGroup::symmetric(5);
        assert_eq!(g.order(), 120);
        let fixed: Vec<Permutation> = g.cursor_fixing(&[(0, 4), (3, 0)]).collect();
        assert_eq!(fixed.len(), 6);
        assert!(fixed.iter().all(|p| p.apply(0) == 4 && p.apply(3) == 0));
    }

    #[test]
    fn cursor_resumes() {
        let g = SymmetryGroup::symmetric(3);
        let mut cursor = g.cursor();
        let first = cursor.next().unwrap();
        assert!(first.is_identity());
        let mut branch = cursor.clone();
        assert_eq!(cursor.next(), branch.next());
    }
}
