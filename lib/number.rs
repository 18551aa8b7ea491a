//! Exact numeric constants appearing as leaves and product coefficients.
//!
//! The mapping engine only ever asks numbers whether they are equal, negations
//! of one another, zero, or even/odd integers, so a complex number with exact
//! rational parts is all that is needed here.

use std::{
    fmt,
    hash::{ Hash, Hasher },
    ops::{ Add, Mul, Neg },
};
use num_complex::Complex;
use num_rational::Rational64;
use num_traits::{ One, Signed, Zero };

/// A complex number with rational real and imaginary parts.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Number(pub Complex<Rational64>);

impl Number {
    /// Create a new number from its real and imaginary parts.
    pub fn new(re: Rational64, im: Rational64) -> Self {
        Self(Complex::new(re, im))
    }

    /// Create a real integer.
    pub fn integer(n: i64) -> Self {
        Self::new(Rational64::from_integer(n), Rational64::zero())
    }

    /// Create a real fraction `numer / denom`, returning `None` if `denom` is
    /// zero.
    pub fn ratio(numer: i64, denom: i64) -> Option<Self> {
        (denom != 0)
            .then(|| Self::new(Rational64::new(numer, denom), Rational64::zero()))
    }

    /// Return the imaginary unit.
    pub fn i() -> Self {
        Self::new(Rational64::zero(), Rational64::one())
    }

    /// Return the real part.
    pub fn re(&self) -> &Rational64 { &self.0.re }

    /// Return the imaginary part.
    pub fn im(&self) -> &Rational64 { &self.0.im }

    pub fn is_zero(&self) -> bool { self.0.is_zero() }

    pub fn is_one(&self) -> bool { self.0.is_one() }

    pub fn is_minus_one(&self) -> bool { (-self.clone()).is_one() }

    /// Return `true` if `self` is equal to `-other`.
    pub fn is_negation_of(&self, other: &Self) -> bool {
        self.0 == -other.0.clone()
    }

    /// Return `true` if `self` is a real integer.
    pub fn is_integer(&self) -> bool {
        self.0.im.is_zero() && self.0.re.is_integer()
    }

    /// If `self` is a real integer, return `Some(true)` if it is odd and
    /// `Some(false)` if it is even.
    pub fn parity(&self) -> Option<bool> {
        self.is_integer().then(|| self.0.re.to_integer() % 2 != 0)
    }

    // pick one representative of {x, -x} so that hashing ignores sign
    fn sign_canonical(&self) -> Complex<Rational64> {
        let neg = -self.0.clone();
        let key = |z: &Complex<Rational64>| (z.re.clone(), z.im.clone());
        if key(&self.0) >= key(&neg) { self.0.clone() } else { neg }
    }
}

/// Hashing is insensitive to sign, so that `x` and `-x` collide; this is
/// consistent with `Eq` since equal numbers hash equally.
impl Hash for Number {
    fn hash<H: Hasher>(&self, state: &mut H) {
        let canon = self.sign_canonical();
        canon.re.hash(state);
        canon.im.hash(state);
    }
}

impl From<i64> for Number {
    fn from(n: i64) -> Self { Self::integer(n) }
}

impl From<Rational64> for Number {
    fn from(re: Rational64) -> Self { Self::new(re, Rational64::zero()) }
}

impl Neg for Number {
    type Output = Self;

    fn neg(self) -> Self::Output { Self(-self.0) }
}

impl Add for Number {
    type Output = Self;

    fn add(self, rhs: Self) -> Self::Output { Self(self.0 + rhs.0) }
}

impl Mul for Number {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output { Self(self.0 * rhs.0) }
}

impl fmt::Display for Number {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let Complex { re, im } = &self.0;
        if im.is_zero() {
            write!(f, "{}", re)
        } else if re.is_zero() {
            write!(f, "{}*I", im)
        } else if im.is_negative() {
            write!(f, "{}-{}*I", re, im.abs())
        } else {
            write!(f, "{}+{}*I", re, im)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rustc_hash::FxHasher;

    fn hash_of(n: &Number) -> u64 {
        let mut hasher = FxHasher::default();
        n.hash(&mut hasher);
        hasher.finish()
    }

    #[test]
    fn negation_and_parity() {
        let m2 = Number::integer(-2);
        let half = Number::ratio(1, 2).unwrap();
        let prod = m2 * half;
        assert!(prod.is_minus_one());
        assert!(prod.is_negation_of(&Number::integer(1)));
        assert_eq!(Number::integer(3).parity(), Some(true));
        assert_eq!(Number::integer(-4).parity(), Some(false));
        assert_eq!(Number::ratio(3, 2).unwrap().parity(), None);
        assert_eq!(Number::i().parity(), None);
        assert!(Number::ratio(1, 0).is_none());
    }

    #[test]
    fn zero_is_its_own_negation() {
        let z = Number::integer(0);
        assert!(z.is_zero());
        assert!(z.is_negation_of(&z));
    }

    #[test]
    fn hash_ignores_sign() {
        let a = Number::new(Rational64::new(1, 3), Rational64::new(-2, 1));
        assert_eq!(hash_of(&a), hash_of(&(-a.clone())));
        assert_ne!(hash_of(&a), hash_of(&Number::integer(7)));
    }

    #[test]
    fn display() {
        assert_eq!(Number::integer(-3).to_string(), "-3");
        assert_eq!(Number::i().to_string(), "1*I");
        let z = Number::new(Rational64::new(1, 2), Rational64::from_integer(-1));
        assert_eq!(z.to_string(), "1/2-1*I");
    }
}
