//! `Shape::merge`: intersection of two shapes (§4.B).
//!
//! Unique-value facets (`id`, `type`, explicit `clazz`, `datatype`,
//! `pattern`) must agree or be absent on one side; range/length/count
//! facets tighten to whichever bound is stricter; set-valued facets
//! (`in`, `hasValue`, `languageIn`, `clazzes`, `constraints`) union;
//! `virtual`/`uniqueLang` OR; `properties` union by name, with same-name
//! collisions recursively composed via `extend` (the second operand is
//! treated as the authoritative side for that nested pair, per §4.B).

use std::cmp::Ordering;

use crate::error::ShapeError;
use crate::value::compare;

use super::{Clazz, Pattern, Property, RangeBound, Shape};

#[tracing::instrument(skip(x, y))]
pub(super) fn merge(x: Shape, y: Shape) -> Result<Shape, ShapeError> {
    let mut out = Shape::new();
    out.is_virtual = x.is_virtual || y.is_virtual;
    out.unique_lang = x.unique_lang || y.unique_lang;

    out.id_field = unify("id", x.id_field, y.id_field)?;
    out.type_field = unify("type", x.type_field, y.type_field)?;
    out.datatype = unify_copy("datatype", x.datatype, y.datatype)?;

    out.clazz = unify_class(x.clazz, y.clazz)?;
    out.clazzes = union_classes(x.clazzes, y.clazzes);

    out.min_inclusive = tighten_min(x.min_inclusive, y.min_inclusive)?;
    out.max_inclusive = tighten_max(x.max_inclusive, y.max_inclusive)?;
    out.min_exclusive = tighten_min(x.min_exclusive, y.min_exclusive)?;
    out.max_exclusive = tighten_max(x.max_exclusive, y.max_exclusive)?;
    check_merged_range_consistency(
        out.min_inclusive.as_ref(),
        out.max_inclusive.as_ref(),
        out.min_exclusive.as_ref(),
        out.max_exclusive.as_ref(),
    )?;

    out.min_length = tighten_count_min(x.min_length, y.min_length);
    out.max_length = tighten_count_max(x.max_length, y.max_length);
    out.min_count = tighten_count_min(x.min_count, y.min_count);
    out.max_count = tighten_count_max(x.max_count, y.max_count);

    out.pattern = unify_pattern(x.pattern, y.pattern)?;
    out.in_values = union_values(x.in_values, y.in_values);
    out.has_value = union_values(x.has_value, y.has_value);
    out.language_in = union_strings(x.language_in, y.language_in);

    out.constraints = x.constraints;
    for c in y.constraints {
        if !out.constraints.contains(&c) {
            out.constraints.push(c);
        }
    }

    out.properties = union_properties(x.properties, y.properties)?;

    Ok(out)
}

pub(super) fn unify<T: PartialEq + std::fmt::Debug>(
    facet: &'static str,
    a: Option<T>,
    b: Option<T>,
) -> Result<Option<T>, ShapeError> {
    match (a, b) {
        (Some(a), Some(b)) if a != b => {
            tracing::debug!(facet, left = ?a, right = ?b, "facet conflict during merge");
            Err(ShapeError::ClassConflict {
                op: facet,
                left: format!("{a:?}"),
                right: format!("{b:?}"),
            })
        }
        (Some(a), _) => Ok(Some(a)),
        (None, b) => Ok(b),
    }
}

pub(super) fn unify_copy<T: PartialEq + Copy + std::fmt::Debug>(
    facet: &'static str,
    a: Option<T>,
    b: Option<T>,
) -> Result<Option<T>, ShapeError> {
    unify(facet, a, b)
}

pub(super) fn unify_class(a: Option<Clazz>, b: Option<Clazz>) -> Result<Option<Clazz>, ShapeError> {
    match (a, b) {
        (Some(a), Some(b)) if !a.coincides_with(&b) => {
            tracing::debug!(left = %a.name, right = %b.name, "class conflict during merge");
            Err(ShapeError::ClassConflict {
                op: "clazz",
                left: a.name,
                right: b.name,
            })
        }
        (Some(a), _) => Ok(Some(a)),
        (None, b) => Ok(b),
    }
}

pub(super) fn union_classes(a: Vec<Clazz>, b: Vec<Clazz>) -> Vec<Clazz> {
    let mut out = a;
    for c in b {
        if !out.iter().any(|existing| existing.coincides_with(&c)) {
            out.push(c);
        }
    }
    out
}

pub(super) fn unify_pattern(a: Option<Pattern>, b: Option<Pattern>) -> Result<Option<Pattern>, ShapeError> {
    match (a, b) {
        (Some(a), Some(b)) if a.source != b.source => Err(ShapeError::ClassConflict {
            op: "pattern",
            left: a.source,
            right: b.source,
        }),
        (Some(a), _) => Ok(Some(a)),
        (None, b) => Ok(b),
    }
}

pub(super) fn tighten_min(a: Option<RangeBound>, b: Option<RangeBound>) -> Result<Option<RangeBound>, ShapeError> {
    tighten(a, b, Ordering::Greater)
}

pub(super) fn tighten_max(a: Option<RangeBound>, b: Option<RangeBound>) -> Result<Option<RangeBound>, ShapeError> {
    tighten(a, b, Ordering::Less)
}

/// Picks the stricter of two bounds: the one ordered `keep` relative to the
/// other (`Greater` for mins, `Less` for maxes). Ties keep the exclusive
/// side, since exclusive is always at least as strict as inclusive at the
/// same value.
fn tighten(
    a: Option<RangeBound>,
    b: Option<RangeBound>,
    keep: Ordering,
) -> Result<Option<RangeBound>, ShapeError> {
    match (a, b) {
        (None, None) => Ok(None),
        (Some(a), None) => Ok(Some(a)),
        (None, Some(b)) => Ok(Some(b)),
        (Some(a), Some(b)) => {
            let ord = compare::compare(&a.value, &b.value).map_err(|_| ShapeError::IncompatibleDatatypes {
                op: "merge range",
                left: a.value.datatype(),
                right: b.value.datatype(),
            })?;
            if ord == keep {
                Ok(Some(a))
            } else if ord == keep.reverse() {
                Ok(Some(b))
            } else {
                // Equal bound value: prefer the stricter (exclusive) side.
                Ok(Some(if !a.inclusive { a } else { b }))
            }
        }
    }
}

/// Cross-checks the tightened min/max bounds against one another: tighten
/// only ever compares a min against a min or a max against a max, so a
/// conflicting pair (e.g. `x`'s `minInclusive` above `y`'s `maxInclusive`)
/// survives both `tighten` calls undetected unless checked here.
fn check_merged_range_consistency(
    min_inclusive: Option<&RangeBound>,
    max_inclusive: Option<&RangeBound>,
    min_exclusive: Option<&RangeBound>,
    max_exclusive: Option<&RangeBound>,
) -> Result<(), ShapeError> {
    for min in [min_inclusive, min_exclusive].into_iter().flatten() {
        for max in [max_inclusive, max_exclusive].into_iter().flatten() {
            let Ok(ord) = compare::compare(&min.value, &max.value) else {
                continue;
            };
            let consistent = match ord {
                Ordering::Less => true,
                Ordering::Equal => min.inclusive && max.inclusive,
                Ordering::Greater => false,
            };
            if !consistent {
                tracing::debug!(min = ?min.value, max = ?max.value, "range inconsistent after merge");
                return Err(ShapeError::RangeInconsistent {
                    op: "merge range",
                    min: format!("{:?}", min.value),
                    max: format!("{:?}", max.value),
                });
            }
        }
    }
    Ok(())
}

pub(super) fn tighten_count_min(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.max(b)),
        (a, b) => a.or(b),
    }
}

pub(super) fn tighten_count_max(a: Option<u64>, b: Option<u64>) -> Option<u64> {
    match (a, b) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

pub(super) fn union_values(
    a: Option<Vec<crate::value::Value>>,
    b: Option<Vec<crate::value::Value>>,
) -> Option<Vec<crate::value::Value>> {
    match (a, b) {
        (None, None) => None,
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (Some(mut a), Some(b)) => {
            for v in b {
                if !a.contains(&v) {
                    a.push(v);
                }
            }
            Some(a)
        }
    }
}

pub(super) fn union_strings(a: Option<Vec<String>>, b: Option<Vec<String>>) -> Option<Vec<String>> {
    use itertools::Itertools;
    match (a, b) {
        (None, None) => None,
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (Some(a), Some(b)) => Some(a.into_iter().chain(b).unique().collect()),
    }
}

fn union_properties(
    a: indexmap::IndexMap<String, Property>,
    b: indexmap::IndexMap<String, Property>,
) -> Result<indexmap::IndexMap<String, Property>, ShapeError> {
    let mut out = a;
    for (name, prop) in b {
        match out.shift_remove(&name) {
            Some(existing) => {
                let composed = compose_colliding(existing, prop)?;
                out.insert(name, composed);
            }
            None => {
                out.insert(name, prop);
            }
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Clazz;
    use crate::value::{Datatype, Value};

    #[test]
    fn unify_conflict_on_datatype_raises() {
        let x = Shape::new().datatype_is(Datatype::String).unwrap();
        let y = Shape::new().datatype_is(Datatype::Number).unwrap();
        assert!(x.merge(y).is_err());
    }

    #[test]
    fn unify_class_conflict_on_non_coinciding_classes_raises() {
        let x = Shape::new().class(Clazz::new("Employee")).unwrap();
        let y = Shape::new().class(Clazz::new("Contractor")).unwrap();
        assert!(x.merge(y).is_err());
    }

    #[test]
    fn merge_tightens_max_inclusive_to_the_stricter_bound() {
        let x = Shape::new().max_inclusive(Value::int(100)).unwrap();
        let y = Shape::new().max_inclusive(Value::int(10)).unwrap();
        let merged = x.merge(y).unwrap();
        assert_eq!(merged.max_inclusive.unwrap().value, Value::int(10));
    }

    #[test]
    fn merge_tightens_min_count_to_the_larger_bound() {
        let x = Shape::new().min_count(1).unwrap();
        let y = Shape::new().min_count(3).unwrap();
        let merged = x.merge(y).unwrap();
        assert_eq!(merged.min_count_limit(), Some(3));
    }

    #[test]
    fn merge_unions_in_values_without_duplicates() {
        let x = Shape::new().in_values(vec![Value::int(1), Value::int(2)]).unwrap();
        let y = Shape::new().in_values(vec![Value::int(2), Value::int(3)]).unwrap();
        let merged = x.merge(y).unwrap();
        assert_eq!(
            merged.in_values.unwrap(),
            vec![Value::int(1), Value::int(2), Value::int(3)]
        );
    }

    #[test]
    fn merge_unions_language_in_without_duplicates() {
        let x = Shape::new().language_in(vec!["en".to_string(), "fr".to_string()]).unwrap();
        let y = Shape::new().language_in(vec!["fr".to_string(), "de".to_string()]).unwrap();
        let merged = x.merge(y).unwrap();
        assert_eq!(merged.language_in.unwrap(), vec!["en", "fr", "de"]);
    }

    #[test]
    fn merge_rejects_a_range_inconsistent_after_tightening() {
        let x = Shape::new().min_inclusive(Value::int(10)).unwrap();
        let y = Shape::new().max_inclusive(Value::int(1)).unwrap();
        assert!(matches!(x.merge(y), Err(ShapeError::RangeInconsistent { .. })));
    }

    proptest::proptest! {
        /// `tighten` picks the stricter of two bounds by comparator order;
        /// swapping the operands can't change which value wins (§8 "merge
        /// is commutative modulo conflict" — there is no conflict case for
        /// a pure tighten, only for the unique-value facets).
        #[test]
        fn tighten_min_is_commutative(a in -1000i64..1000, b in -1000i64..1000) {
            let bound = |n: i64| RangeBound { value: Value::int(n), inclusive: true };
            let forward = tighten_min(Some(bound(a)), Some(bound(b))).unwrap();
            let backward = tighten_min(Some(bound(b)), Some(bound(a))).unwrap();
            proptest::prop_assert_eq!(forward.map(|r| r.value), backward.map(|r| r.value));
        }

        #[test]
        fn tighten_max_is_commutative(a in -1000i64..1000, b in -1000i64..1000) {
            let bound = |n: i64| RangeBound { value: Value::int(n), inclusive: true };
            let forward = tighten_max(Some(bound(a)), Some(bound(b))).unwrap();
            let backward = tighten_max(Some(bound(b)), Some(bound(a))).unwrap();
            proptest::prop_assert_eq!(forward.map(|r| r.value), backward.map(|r| r.value));
        }

        /// Merging two non-conflicting, range-only shapes is commutative:
        /// neither side declares a unique-value facet the other disagrees
        /// with, so only the (commutative) tighten operators are exercised.
        #[test]
        fn merge_of_range_only_shapes_is_commutative(
            min_a in -1000i64..1000, max_a in -1000i64..1000,
            min_b in -1000i64..1000, max_b in -1000i64..1000,
        ) {
            let shape = |min: i64, max: i64| {
                let mut s = Shape::new();
                if min <= max {
                    s = s.min_inclusive(Value::int(min)).unwrap().max_inclusive(Value::int(max)).unwrap();
                }
                s
            };
            let x = shape(min_a, max_a);
            let y = shape(min_b, max_b);
            let forward = x.clone().merge(y.clone());
            let backward = y.merge(x);
            proptest::prop_assert_eq!(forward.ok(), backward.ok());
        }
    }
}

fn compose_colliding(existing: Property, incoming: Property) -> Result<Property, ShapeError> {
    let forward = unify("property.forward", existing.forward.clone(), incoming.forward.clone())?;
    let reverse = unify("property.reverse", existing.reverse.clone(), incoming.reverse.clone())?;
    let existing_shape = existing.shape.get().clone();
    let incoming_shape = incoming.shape.get().clone();
    Ok(Property {
        name: existing.name,
        forward,
        reverse,
        embedded: existing.embedded || incoming.embedded,
        shape: crate::value::LazyShape::new(move || {
            existing_shape
                .clone()
                .extend(incoming_shape.clone())
                .expect("nested property shapes composed during a prior successful merge")
        }),
    })
}
