//! Cross-type numeric comparison (§4.A: "all four numeric variants are
//! mutually comparable by mathematical value (cross-type compare without
//! precision loss)").
//!
//! `Integral`/`Floating`/`Integer`/`Decimal` are different representations
//! of the same numeric family; comparing across them widens both operands
//! to `BigDecimal`, the only representation in the family that can hold an
//! `f64`, an `i64`, and a `BigInt` without losing precision for integral
//! inputs. `Floating` values still carry `f64`'s native imprecision, but
//! that imprecision is inherent to the input, not introduced by the
//! comparison.

use std::cmp::Ordering;
use std::str::FromStr;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;

use crate::value::Value;

/// Widen a numeric [`Value`] to a [`BigDecimal`]. Panics if `value` is not
/// one of the four numeric variants; callers gate on `Datatype::Number`
/// first.
pub fn to_big_decimal(value: &Value) -> BigDecimal {
    match value {
        Value::Integral(i) => BigDecimal::from(*i),
        Value::Floating(f) => {
            BigDecimal::from_str(&format!("{f:e}")).unwrap_or_else(|_| BigDecimal::from(0))
        }
        Value::Integer(i) => BigDecimal::from(i.clone()),
        Value::Decimal(d) => d.clone(),
        _ => panic!("to_big_decimal called on a non-numeric value"),
    }
}

/// Compare two numeric values by mathematical value, agreeing with
/// `<=`/`>=` regardless of which of the four representations each side
/// uses (§8 "Comparator ... for numbers, agrees with mathematical `<=`
/// across variants").
pub fn compare_numeric(a: &Value, b: &Value) -> Ordering {
    // Fast path: same representation, compare directly and exactly.
    match (a, b) {
        (Value::Integral(a), Value::Integral(b)) => return a.cmp(b),
        (Value::Integer(a), Value::Integer(b)) => return a.cmp(b),
        (Value::Decimal(a), Value::Decimal(b)) => return a.cmp(b),
        _ => {}
    }
    to_big_decimal(a).cmp(&to_big_decimal(b))
}

/// Promote a `BigInt` to a `BigDecimal` losslessly.
pub fn bigint_to_decimal(i: &BigInt) -> BigDecimal {
    BigDecimal::from(i.clone())
}
