//! `Shape::extend`: inheritance composition (§4.B).
//!
//! Behaves like [`super::merge::merge`] for every facet except explicit
//! `clazz` and `properties`: the subtype (`y`) wins outright on its
//! explicit class rather than requiring agreement, and on a colliding
//! property name `y`'s metadata (forward/reverse/embedded) is
//! authoritative while only the nested shape recurses through `extend`.
//! Composition is not commutative: `x.extend(y) != y.extend(x)` in
//! general.

use crate::error::ShapeError;

use super::merge;
use super::{Property, Shape};

#[tracing::instrument(skip(x, y))]
pub(super) fn extend(x: Shape, y: Shape) -> Result<Shape, ShapeError> {
    let mut out = Shape::new();
    out.is_virtual = x.is_virtual || y.is_virtual;
    out.unique_lang = x.unique_lang || y.unique_lang;

    out.id_field = merge::unify("id", x.id_field, y.id_field)?;
    out.type_field = merge::unify("type", x.type_field, y.type_field)?;
    out.datatype = merge::unify_copy("datatype", x.datatype, y.datatype)?;

    // The subtype's explicit class wins outright; no agreement required.
    out.clazz = y.clazz.or(x.clazz);
    out.clazzes = merge::union_classes(x.clazzes, y.clazzes);

    out.min_inclusive = merge::tighten_min(x.min_inclusive, y.min_inclusive)?;
    out.max_inclusive = merge::tighten_max(x.max_inclusive, y.max_inclusive)?;
    out.min_exclusive = merge::tighten_min(x.min_exclusive, y.min_exclusive)?;
    out.max_exclusive = merge::tighten_max(x.max_exclusive, y.max_exclusive)?;

    out.min_length = merge::tighten_count_min(x.min_length, y.min_length);
    out.max_length = merge::tighten_count_max(x.max_length, y.max_length);
    out.min_count = merge::tighten_count_min(x.min_count, y.min_count);
    out.max_count = merge::tighten_count_max(x.max_count, y.max_count);

    out.pattern = merge::unify_pattern(x.pattern, y.pattern)?;
    out.in_values = merge::union_values(x.in_values, y.in_values);
    out.has_value = merge::union_values(x.has_value, y.has_value);
    out.language_in = merge::union_strings(x.language_in, y.language_in);

    out.constraints = x.constraints;
    for c in y.constraints {
        if !out.constraints.contains(&c) {
            out.constraints.push(c);
        }
    }

    out.properties = union_properties_subtype_wins(x.properties, y.properties);

    Ok(out)
}

fn union_properties_subtype_wins(
    x: indexmap::IndexMap<String, Property>,
    y: indexmap::IndexMap<String, Property>,
) -> indexmap::IndexMap<String, Property> {
    let mut out = x;
    for (name, sub_prop) in y {
        match out.shift_remove(&name) {
            Some(base_prop) => out.insert(name, compose_subtype_authoritative(base_prop, sub_prop)),
            None => out.insert(name, sub_prop),
        };
    }
    out
}

/// `y`'s forward/reverse/embedded are authoritative; only the nested
/// shape is composed, via `extend` again so deeper overrides keep
/// flowing from base to subtype.
fn compose_subtype_authoritative(base: Property, sub: Property) -> Property {
    let base_shape = base.shape.get().clone();
    let sub_shape = sub.shape.get().clone();
    Property {
        name: sub.name,
        forward: sub.forward,
        reverse: sub.reverse,
        embedded: sub.embedded,
        shape: crate::value::LazyShape::new(move || {
            base_shape
                .clone()
                .extend(sub_shape.clone())
                .expect("nested property shapes composed during a prior successful extend")
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::Clazz;
    use crate::value::Value;

    #[test]
    fn subtype_explicit_class_wins_without_conflict() {
        let base = Shape::new().class(Clazz::new("Agent")).unwrap();
        let sub = Shape::new().class(Clazz::new("Employee")).unwrap();
        let composed = base.extend(sub).unwrap();
        assert_eq!(composed.clazz().unwrap().name, "Employee");
    }

    #[test]
    fn extend_tightens_ranges_like_merge() {
        let base = Shape::new().max_inclusive(Value::int(100)).unwrap();
        let sub = Shape::new().max_inclusive(Value::int(10)).unwrap();
        let composed = base.extend(sub).unwrap();
        assert_eq!(composed.max_inclusive.unwrap().value, Value::int(10));
    }

    #[test]
    fn extend_is_not_commutative_on_class() {
        let base = Shape::new().class(Clazz::new("Agent")).unwrap();
        let sub = Shape::new().class(Clazz::new("Employee")).unwrap();
        let forward = base.clone().extend(sub.clone()).unwrap();
        let backward = sub.extend(base).unwrap();
        assert_ne!(forward.clazz().unwrap().name, backward.clazz().unwrap().name);
    }
}
