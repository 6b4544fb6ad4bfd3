//! Total ordering within comparable families (§4.A).
//!
//! Two values are comparable iff they belong to the same family: booleans,
//! the unified numeric family, strings (code-point order), URIs (lexical
//! order), and each temporal variant with itself. Arrays are never
//! comparable. Comparing across families raises
//! [`CompareError::Incompatible`].

use std::cmp::Ordering;

use crate::error::CompareError;
use crate::value::{Datatype, Value, number};

/// Compare `a` and `b`, raising if they are not mutually comparable.
pub fn compare(a: &Value, b: &Value) -> Result<Ordering, CompareError> {
    use Value::*;
    match (a, b) {
        (Array(_), _) | (_, Array(_)) => Err(CompareError::Incomparable("arrays")),
        (Object(_), _) | (_, Object(_)) => Err(CompareError::Incomparable("objects")),
        (Table(_), _) | (_, Table(_)) => Err(CompareError::Incomparable("tables")),
        (Tuple(_), _) | (_, Tuple(_)) => Err(CompareError::Incomparable("tuples")),

        (Bit(x), Bit(y)) => Ok(x.cmp(y)),
        (String(x), String(y)) => Ok(x.cmp(y)),
        (Uri(x), Uri(y)) => Ok(x.0.cmp(&y.0)),
        (Year(x), Year(y)) => Ok(x.cmp(y)),
        (YearMonth(x), YearMonth(y)) => Ok(x.cmp(y)),
        (LocalDate(x), LocalDate(y)) => Ok(x.cmp(y)),
        (LocalTime(x), LocalTime(y)) => Ok(x.cmp(y)),
        (OffsetTime(x), OffsetTime(y)) => Ok(x.cmp(y)),
        (LocalDateTime(x), LocalDateTime(y)) => Ok(x.cmp(y)),
        (OffsetDateTime(x), OffsetDateTime(y)) => Ok(x.cmp(y)),
        (ZonedDateTime(x), ZonedDateTime(y)) => Ok(x.cmp(y)),
        (Instant(x), Instant(y)) => Ok(x.cmp(y)),
        (Period(x), Period(y)) => Ok(x.cmp(y)),
        (Duration(x), Duration(y)) => Ok(x.cmp(y)),

        (x, y) if is_numeric(x) && is_numeric(y) => Ok(number::compare_numeric(x, y)),

        (x, y) => Err(CompareError::Incompatible {
            left: x.datatype(),
            right: y.datatype(),
        }),
    }
}

fn is_numeric(v: &Value) -> bool {
    matches!(v.datatype(), Datatype::Number)
}

/// Three-way helper used by Criterion range checks: is `value` within
/// `[min, max]` per the given inclusivity flags? Non-comparable inputs
/// propagate the `CompareError` (§4.E "non-comparable value => violation").
pub fn in_range(
    value: &Value,
    min: Option<(&Value, bool)>,
    max: Option<(&Value, bool)>,
) -> Result<bool, CompareError> {
    if let Some((min_v, inclusive)) = min {
        let ord = compare(value, min_v)?;
        let ok = if inclusive { ord != Ordering::Less } else { ord == Ordering::Greater };
        if !ok {
            return Ok(false);
        }
    }
    if let Some((max_v, inclusive)) = max {
        let ord = compare(value, max_v)?;
        let ok = if inclusive { ord != Ordering::Greater } else { ord == Ordering::Less };
        if !ok {
            return Ok(false);
        }
    }
    Ok(true)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn booleans_order_false_before_true() {
        assert_eq!(compare(&Value::Bit(false), &Value::Bit(true)).unwrap(), Ordering::Less);
    }

    #[test]
    fn arrays_are_never_comparable() {
        let a = Value::array([Value::int(1)]);
        let b = Value::array([Value::int(1)]);
        assert!(compare(&a, &b).is_err());
    }

    #[test]
    fn different_families_are_incompatible() {
        assert!(compare(&Value::int(1), &Value::string("x")).is_err());
    }

    #[test]
    fn temporal_variants_do_not_cross_compare() {
        // Year and LocalDate are different Rust types, so this is a
        // compile-time guarantee; exercised here via the Value wrapper to
        // confirm the mismatch surfaces as Incompatible rather than a panic.
        let year = Value::Year(crate::value::Year(2024));
        let date = Value::LocalDate(crate::value::LocalDate::parse("2024-01-01").unwrap());
        assert!(compare(&year, &date).is_err());
    }

    #[test]
    fn comparator_is_total_order_within_a_family() {
        let values = [Value::int(1), Value::int(2), Value::int(3)];
        for w in values.windows(2) {
            assert_eq!(compare(&w[0], &w[1]).unwrap(), Ordering::Less);
            assert_eq!(compare(&w[1], &w[0]).unwrap(), Ordering::Greater);
        }
        assert_eq!(compare(&values[0], &values[0]).unwrap(), Ordering::Equal);
    }
}
