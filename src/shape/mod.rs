//! The constraint algebra (spec §3, §4.B).
//!
//! `Shape` is a named record of all-optional constraint facets combining
//! SHACL-style facets, class hierarchy, datatype witnessing, and named
//! typed properties. Builders return a new `Shape` with one facet set and
//! validate invariants as they go (§3 "Invariants"); `merge`/`extend`
//! (module [`merge`]/[`extend`]) compose two shapes.

mod extend;
mod merge;

use std::sync::Arc;

use indexmap::{IndexMap, IndexSet};
use regex::Regex;

use crate::error::ConstructionError;
use crate::value::{Datatype, LazyShape, Uri, Value, guard_reserved_name};

/// A value-predicate constraint (§3 `constraints`): maps a `Value` to
/// `Nil` (pass) or any other value (a violation description, per §4.E
/// "`constraints`: run each; Nil = pass; any other return = violation
/// containing the returned value"). Equality/hashing treat constraints by
/// closure identity (§9 design note), never by structural comparison of
/// whatever the closure happens to close over.
#[derive(Clone)]
pub struct Constraint {
    name: &'static str,
    func: Arc<dyn Fn(&Value) -> Value + Send + Sync>,
}

impl Constraint {
    pub fn new(name: &'static str, func: impl Fn(&Value) -> Value + Send + Sync + 'static) -> Self {
        Constraint {
            name,
            func: Arc::new(func),
        }
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn check(&self, value: &Value) -> Value {
        (self.func)(value)
    }
}

impl PartialEq for Constraint {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.func, &other.func)
    }
}

impl std::fmt::Debug for Constraint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Constraint").field("name", &self.name).finish()
    }
}

/// An explicit or implicit class reference (§3 `clazz`/`clazzes`). Two
/// classes conflict/coincide if they share a name *or* a URI (§3
/// Invariants).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clazz {
    pub name: String,
    pub uri: Option<Uri>,
}

impl Clazz {
    pub fn new(name: impl Into<String>) -> Self {
        Clazz { name: name.into(), uri: None }
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(Uri::new(uri));
        self
    }

    pub fn coincides_with(&self, other: &Clazz) -> bool {
        self.name == other.name || (self.uri.is_some() && self.uri == other.uri)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub(crate) struct RangeBound {
    pub value: Value,
    pub inclusive: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct Pattern {
    pub source: String,
    pub regex: Regex,
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.source == other.source
    }
}

/// A named typed property of a [`Shape`] (§3 `Property`). At least one of
/// `forward`/`reverse` must be set.
#[derive(Debug, Clone)]
pub struct Property {
    pub name: String,
    pub forward: Option<Uri>,
    pub reverse: Option<Uri>,
    pub embedded: bool,
    pub shape: LazyShape,
}

impl Property {
    pub fn new(name: impl Into<String>, shape: Shape) -> PropertyBuilder {
        PropertyBuilder {
            name: name.into(),
            forward: None,
            reverse: None,
            embedded: false,
            shape: LazyShape::of(shape),
        }
    }

    pub fn lazy(name: impl Into<String>, init: impl Fn() -> Shape + Send + Sync + 'static) -> PropertyBuilder {
        PropertyBuilder {
            name: name.into(),
            forward: None,
            reverse: None,
            embedded: false,
            shape: LazyShape::new(init),
        }
    }
}

impl PartialEq for Property {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.forward == other.forward
            && self.reverse == other.reverse
            && self.embedded == other.embedded
            && self.shape == other.shape
    }
}

/// Builder for [`Property`], finished with [`PropertyBuilder::build`].
pub struct PropertyBuilder {
    name: String,
    forward: Option<Uri>,
    reverse: Option<Uri>,
    embedded: bool,
    shape: LazyShape,
}

impl PropertyBuilder {
    pub fn forward(mut self, iri: impl Into<String>) -> Self {
        self.forward = Some(Uri::new(iri));
        self
    }

    pub fn reverse(mut self, iri: impl Into<String>) -> Self {
        self.reverse = Some(Uri::new(iri));
        self
    }

    pub fn embedded(mut self, embedded: bool) -> Self {
        self.embedded = embedded;
        self
    }

    pub fn build(self) -> Result<Property, ConstructionError> {
        guard_reserved_name(&self.name)?;
        if self.forward.is_none() && self.reverse.is_none() {
            return Err(ConstructionError::PropertyWithoutIri(self.name));
        }
        Ok(Property {
            name: self.name,
            forward: self.forward,
            reverse: self.reverse,
            embedded: self.embedded,
            shape: self.shape,
        })
    }
}

/// A constraint record combining SHACL-style facets, class hierarchy,
/// datatype witnessing, and named typed properties (§3).
#[derive(Debug, Clone, Default)]
pub struct Shape {
    pub(crate) is_virtual: bool,
    pub(crate) id_field: Option<String>,
    pub(crate) type_field: Option<String>,
    pub(crate) datatype: Option<Datatype>,
    pub(crate) clazz: Option<Clazz>,
    pub(crate) clazzes: Vec<Clazz>,
    pub(crate) min_inclusive: Option<RangeBound>,
    pub(crate) max_inclusive: Option<RangeBound>,
    pub(crate) min_exclusive: Option<RangeBound>,
    pub(crate) max_exclusive: Option<RangeBound>,
    pub(crate) min_length: Option<u64>,
    pub(crate) max_length: Option<u64>,
    pub(crate) pattern: Option<Pattern>,
    pub(crate) in_values: Option<Vec<Value>>,
    pub(crate) language_in: Option<Vec<String>>,
    pub(crate) unique_lang: bool,
    pub(crate) min_count: Option<u64>,
    pub(crate) max_count: Option<u64>,
    pub(crate) has_value: Option<Vec<Value>>,
    pub(crate) constraints: Vec<Constraint>,
    pub(crate) properties: IndexMap<String, Property>,
}

impl PartialEq for Shape {
    fn eq(&self, other: &Self) -> bool {
        self.is_virtual == other.is_virtual
            && self.id_field == other.id_field
            && self.type_field == other.type_field
            && self.datatype == other.datatype
            && self.clazz == other.clazz
            && self.clazzes == other.clazzes
            && self.min_inclusive == other.min_inclusive
            && self.max_inclusive == other.max_inclusive
            && self.min_exclusive == other.min_exclusive
            && self.max_exclusive == other.max_exclusive
            && self.min_length == other.min_length
            && self.max_length == other.max_length
            && self.pattern == other.pattern
            && self.in_values == other.in_values
            && self.language_in == other.language_in
            && self.unique_lang == other.unique_lang
            && self.min_count == other.min_count
            && self.max_count == other.max_count
            && self.has_value == other.has_value
            && self.constraints == other.constraints
            && self.properties == other.properties
    }
}

fn ensure_object_datatype(shape: &mut Shape, facet: &'static str) -> Result<(), ConstructionError> {
    force_datatype(shape, Datatype::Object, facet)
}

fn ensure_text_datatype(shape: &mut Shape, facet: &'static str) -> Result<(), ConstructionError> {
    force_datatype(shape, Datatype::Text, facet)
}

fn force_datatype(shape: &mut Shape, required: Datatype, facet: &'static str) -> Result<(), ConstructionError> {
    match shape.datatype {
        None => {
            shape.datatype = Some(required);
            Ok(())
        }
        Some(existing) if existing == required => Ok(()),
        Some(existing) => Err(ConstructionError::DatatypeConflict {
            facet,
            required,
            actual: existing,
        }),
    }
}

fn no_arrays(values: &[Value], facet: &'static str) -> Result<(), ConstructionError> {
    if values.iter().any(|v| matches!(v, Value::Array(_))) {
        Err(ConstructionError::ArrayNotAllowed { facet })
    } else {
        Ok(())
    }
}

impl Shape {
    pub fn new() -> Self {
        Shape::default()
    }

    pub fn is_virtual(&self) -> bool {
        self.is_virtual
    }

    pub fn datatype(&self) -> Option<Datatype> {
        self.datatype
    }

    pub fn clazz(&self) -> Option<&Clazz> {
        self.clazz.as_ref()
    }

    pub fn clazzes(&self) -> &[Clazz] {
        &self.clazzes
    }

    pub fn properties(&self) -> impl Iterator<Item = &Property> {
        self.properties.values()
    }

    pub fn property(&self, name: &str) -> Option<&Property> {
        self.properties.get(name)
    }

    pub fn min_count_limit(&self) -> Option<u64> {
        self.min_count
    }

    pub fn max_count_limit(&self) -> Option<u64> {
        self.max_count
    }

    pub fn virtual_flag(mut self, flag: bool) -> Self {
        self.is_virtual = flag;
        self
    }

    pub fn id(mut self, field: impl Into<String>) -> Result<Self, ConstructionError> {
        ensure_object_datatype(&mut self, "id")?;
        self.id_field = Some(field.into());
        Ok(self)
    }

    pub fn type_(mut self, field: impl Into<String>) -> Result<Self, ConstructionError> {
        ensure_object_datatype(&mut self, "type")?;
        self.type_field = Some(field.into());
        Ok(self)
    }

    pub fn datatype_is(mut self, datatype: Datatype) -> Result<Self, ConstructionError> {
        force_datatype(&mut self, datatype, "datatype")?;
        Ok(self)
    }

    pub fn class(mut self, clazz: Clazz) -> Result<Self, ConstructionError> {
        ensure_object_datatype(&mut self, "clazz")?;
        self.clazz = Some(clazz);
        Ok(self)
    }

    pub fn implicit_class(mut self, clazz: Clazz) -> Result<Self, ConstructionError> {
        ensure_object_datatype(&mut self, "clazzes")?;
        if !self.clazzes.iter().any(|c| c.coincides_with(&clazz)) {
            self.clazzes.push(clazz);
        }
        Ok(self)
    }

    pub fn min_inclusive(mut self, value: Value) -> Result<Self, ConstructionError> {
        check_range_consistency(&value, true, true, self.max_inclusive.as_ref(), self.max_exclusive.as_ref())?;
        self.min_inclusive = Some(RangeBound { value, inclusive: true });
        Ok(self)
    }

    pub fn max_inclusive(mut self, value: Value) -> Result<Self, ConstructionError> {
        check_range_consistency(&value, true, false, self.min_inclusive.as_ref(), self.min_exclusive.as_ref())?;
        self.max_inclusive = Some(RangeBound { value, inclusive: true });
        Ok(self)
    }

    pub fn min_exclusive(mut self, value: Value) -> Result<Self, ConstructionError> {
        check_range_consistency(&value, false, true, self.max_inclusive.as_ref(), self.max_exclusive.as_ref())?;
        self.min_exclusive = Some(RangeBound { value, inclusive: false });
        Ok(self)
    }

    pub fn max_exclusive(mut self, value: Value) -> Result<Self, ConstructionError> {
        check_range_consistency(&value, false, false, self.min_inclusive.as_ref(), self.min_exclusive.as_ref())?;
        self.max_exclusive = Some(RangeBound { value, inclusive: false });
        Ok(self)
    }

    pub fn min_length(mut self, n: u64) -> Result<Self, ConstructionError> {
        if let Some(max) = self.max_length {
            if n > max {
                return Err(ConstructionError::LengthInconsistent { min: n, max });
            }
        }
        self.min_length = Some(n);
        Ok(self)
    }

    pub fn max_length(mut self, n: u64) -> Result<Self, ConstructionError> {
        if let Some(min) = self.min_length {
            if min > n {
                return Err(ConstructionError::LengthInconsistent { min, max: n });
            }
        }
        self.max_length = Some(n);
        Ok(self)
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Result<Self, ConstructionError> {
        ensure_text_datatype(&mut self, "pattern")?;
        let source = pattern.into();
        let regex = Regex::new(&source).map_err(|source_err| ConstructionError::MalformedPattern {
            pattern: source.clone(),
            source: source_err,
        })?;
        self.pattern = Some(Pattern { source, regex });
        Ok(self)
    }

    pub fn in_values(mut self, values: Vec<Value>) -> Result<Self, ConstructionError> {
        no_arrays(&values, "in")?;
        self.in_values = Some(values);
        Ok(self)
    }

    pub fn language_in(mut self, langs: Vec<String>) -> Result<Self, ConstructionError> {
        ensure_text_datatype(&mut self, "languageIn")?;
        self.language_in = Some(langs);
        Ok(self)
    }

    pub fn unique_lang(mut self, flag: bool) -> Self {
        self.unique_lang = flag;
        self
    }

    pub fn min_count(mut self, n: u64) -> Result<Self, ConstructionError> {
        if let Some(max) = self.max_count {
            if n > max {
                return Err(ConstructionError::CountInconsistent { min: n, max });
            }
        }
        self.min_count = Some(n);
        Ok(self)
    }

    pub fn max_count(mut self, n: u64) -> Result<Self, ConstructionError> {
        if let Some(min) = self.min_count {
            if min > n {
                return Err(ConstructionError::CountInconsistent { min, max: n });
            }
        }
        self.max_count = Some(n);
        Ok(self)
    }

    pub fn has_value(mut self, values: Vec<Value>) -> Result<Self, ConstructionError> {
        no_arrays(&values, "hasValue")?;
        self.has_value = Some(values);
        Ok(self)
    }

    pub fn constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    pub fn property(mut self, property: Property) -> Result<Self, ConstructionError> {
        ensure_object_datatype(&mut self, "properties")?;
        if self.properties.contains_key(&property.name)
            || self.properties.values().any(|p| {
                (property.forward.is_some() && p.forward == property.forward)
                    || (property.reverse.is_some() && p.reverse == property.reverse)
            })
        {
            return Err(ConstructionError::DuplicateProperty(property.name));
        }
        self.properties.insert(property.name.clone(), property);
        Ok(self)
    }

    /// `merge(x, y)`: intersection of constraints (§4.B).
    pub fn merge(self, other: Shape) -> Result<Shape, crate::error::ShapeError> {
        merge::merge(self, other)
    }

    /// `extend(x, y)`: inheritance — `y` (the subtype) wins on explicit
    /// class and property authority (§4.B).
    pub fn extend(self, other: Shape) -> Result<Shape, crate::error::ShapeError> {
        extend::extend(self, other)
    }
}

/// Checks `value` (being set as a min or max bound, per `is_min`) against
/// whatever opposing bound(s) are already set, raising
/// [`ConstructionError::RangeInconsistent`] if min would exceed max — an
/// equal boundary is only consistent when both sides are inclusive.
/// Bounds from incomparable value families are left for the comparator to
/// reject elsewhere; this check only fires when a comparison is decisive.
fn check_range_consistency(
    value: &Value,
    value_inclusive: bool,
    is_min: bool,
    other_inclusive: Option<&RangeBound>,
    other_exclusive: Option<&RangeBound>,
) -> Result<(), ConstructionError> {
    for other in [other_inclusive, other_exclusive].into_iter().flatten() {
        let (min, min_inclusive, max, max_inclusive) = if is_min {
            (value, value_inclusive, &other.value, other.inclusive)
        } else {
            (&other.value, other.inclusive, value, value_inclusive)
        };
        let Ok(ordering) = crate::value::compare::compare(min, max) else {
            continue;
        };
        let consistent = match ordering {
            std::cmp::Ordering::Less => true,
            std::cmp::Ordering::Equal => min_inclusive && max_inclusive,
            std::cmp::Ordering::Greater => false,
        };
        if !consistent {
            return Err(ConstructionError::RangeInconsistent {
                min: format!("{min:?}"),
                max: format!("{max:?}"),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn min_inclusive_over_max_inclusive_builds() {
        let shape = Shape::new().min_inclusive(Value::int(1)).unwrap();
        assert_eq!(shape.min_inclusive.as_ref().unwrap().value, Value::int(1));
    }

    #[test]
    fn min_inclusive_above_max_inclusive_raises() {
        let shape = Shape::new().max_inclusive(Value::int(1)).unwrap();
        assert!(shape.min_inclusive(Value::int(10)).is_err());
    }

    #[test]
    fn equal_inclusive_bounds_build_a_singleton_range() {
        let shape = Shape::new().min_inclusive(Value::int(5)).unwrap();
        assert!(shape.max_inclusive(Value::int(5)).is_ok());
    }

    #[test]
    fn equal_bound_with_an_exclusive_side_raises() {
        let shape = Shape::new().min_inclusive(Value::int(5)).unwrap();
        assert!(shape.max_exclusive(Value::int(5)).is_err());
    }

    #[test]
    fn pattern_forces_text_datatype() {
        let shape = Shape::new().pattern("^[a-z]+$").unwrap();
        assert_eq!(shape.datatype(), Some(Datatype::Text));
    }

    #[test]
    fn class_forces_object_datatype() {
        let shape = Shape::new().class(Clazz::new("Employee")).unwrap();
        assert_eq!(shape.datatype(), Some(Datatype::Object));
    }

    #[test]
    fn conflicting_datatype_facets_raise() {
        let shape = Shape::new().pattern("^a$").unwrap();
        assert!(shape.class(Clazz::new("Employee")).is_err());
    }

    #[test]
    fn min_length_over_max_length_raises() {
        let shape = Shape::new().max_length(3).unwrap();
        assert!(shape.min_length(5).is_err());
    }

    #[test]
    fn in_values_reject_arrays() {
        let result = Shape::new().in_values(vec![Value::array([Value::int(1)])]);
        assert!(result.is_err());
    }

    #[test]
    fn property_requires_forward_or_reverse() {
        let prop = Property::new("name", Shape::new()).build();
        assert!(prop.is_err());
    }

    #[test]
    fn duplicate_property_name_rejected() {
        let p1 = Property::new("name", Shape::new()).forward("ex:name").build().unwrap();
        let p2 = Property::new("name", Shape::new()).forward("ex:other").build().unwrap();
        let shape = Shape::new().property(p1).unwrap();
        assert!(shape.property(p2).is_err());
    }

    #[test]
    fn reserved_property_name_rejected() {
        let err = Property::new("@id", Shape::new()).forward("ex:id").build();
        assert!(err.is_err());
    }
}
