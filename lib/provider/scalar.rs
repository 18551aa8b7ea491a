//! Sign decisions for powers, elementary functions and numbers.
//!
//! None of these nodes carry free indices, so their sub-expressions are
//! compared on their own, starting from fresh buffers. What they contribute to
//! the enclosing search is only the set of signs under which the two nodes
//! agree, which the caller turns into a [`Signs::provider`].

use tracing::trace;
use crate::{
    buffer::MappingResult,
    mappings::MappingOptions,
    number::Number,
    tensor::{ FunctionClass, Kind, Tensor },
};
use super::{ Signs, signs_between };

/// Signs under which `fb^fe` maps onto `tb^te`.
///
/// The exponents must map with sign zero. A base mapping with sign one then
/// survives only if the exponent is an integer literal, cancelling for even
/// exponents and carrying through for odd ones.
pub fn power_signs(
    from_base: &Tensor,
    from_exp: &Tensor,
    to_base: &Tensor,
    to_exp: &Tensor,
    opts: MappingOptions,
) -> MappingResult<Signs>
{
    if !signs_between(from_exp, to_exp, opts)?.plus {
        trace!("exponents have no positive mapping");
        return Ok(Signs::none());
    }
    let base = signs_between(from_base, to_base, opts)?;
    let mut signs = Signs { plus: base.plus, minus: false };
    if base.minus {
        match exponent_parity(from_exp) {
            Some(true) => { signs.minus = true; },
            Some(false) => { signs.plus = true; },
            None => {
                trace!("negated base under a non-integer exponent");
            },
        }
    }
    Ok(signs)
}

fn exponent_parity(exp: &Tensor) -> Option<bool> {
    match exp.kind() {
        Kind::Number(n) => n.parity(),
        _ => None,
    }
}

/// Signs under which `f(from)` maps onto `f(to)` for a function of the given
/// class.
pub fn function_signs(
    class: FunctionClass,
    from: &Tensor,
    to: &Tensor,
    opts: MappingOptions,
) -> MappingResult<Signs>
{
    let arg = signs_between(from, to, opts)?;
    let signs =
        match class {
            FunctionClass::Odd => arg,
            FunctionClass::Even => {
                Signs { plus: !arg.is_empty(), minus: false }
            },
            FunctionClass::Log => Signs { plus: arg.plus, minus: false },
        };
    Ok(signs)
}

/// Signs under which one numeric constant maps onto another.
pub fn number_signs(from: &Number, to: &Number) -> Signs {
    Signs { plus: from == to, minus: from.is_negation_of(to) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tensor::Function;

    fn x() -> Tensor { Tensor::simple("x", []).unwrap() }

    #[test]
    fn numbers() {
        let two = Number::integer(2);
        assert_eq!(number_signs(&two, &two), Signs { plus: true, minus: false });
        assert_eq!(
            number_signs(&two, &Number::integer(-2)),
            Signs { plus: false, minus: true },
        );
        let zero = Number::integer(0);
        assert_eq!(number_signs(&zero, &zero), Signs { plus: true, minus: true });
        assert!(number_signs(&two, &Number::integer(3)).is_empty());
    }

    #[test]
    fn powers_of_negated_bases() {
        let opts = MappingOptions::default();
        let nx = -x();
        let sq = power_signs(&x(), &Tensor::from(2), &nx, &Tensor::from(2), opts)
            .unwrap();
        assert_eq!(sq, Signs { plus: true, minus: false });
        let cube = power_signs(&x(), &Tensor::from(3), &nx, &Tensor::from(3), opts)
            .unwrap();
        assert_eq!(cube, Signs { plus: false, minus: true });
        let half = Tensor::ratio(1, 2).unwrap();
        assert!(power_signs(&x(), &half, &nx, &half, opts).unwrap().is_empty());
        // exponents related by a sign are rejected outright
        assert!(
            power_signs(&x(), &Tensor::from(3), &x(), &Tensor::from(-3), opts)
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn function_classes() {
        let opts = MappingOptions::default();
        let nx = -x();
        let odd = function_signs(Function::Sin.class(), &x(), &nx, opts).unwrap();
        assert_eq!(odd, Signs { plus: false, minus: true });
        let even = function_signs(Function::Cos.class(), &x(), &nx, opts).unwrap();
        assert_eq!(even, Signs { plus: true, minus: false });
        assert!(function_signs(Function::Log.class(), &x(), &nx, opts)
            .unwrap()
            .is_empty());
        let zero = Tensor::from(0);
        assert_eq!(
            function_signs(Function::Tan.class(), &zero, &zero, opts).unwrap(),
            Signs { plus: true, minus: true },
        );
    }
}
