//! Given a [`Shape`] and a [`Value`], emits a set of violation records
//! (§4.E). Unlike every other operation in the core, the validator
//! *accumulates* instead of short-circuiting (§7): it returns every
//! violation it finds rather than raising on the first one.

use crate::shape::Shape;
use crate::value::{Object, Value, WILDCARD_LOCALE, compare};

/// One constraint violation, naming the field path and facet at fault.
#[derive(Debug, Clone, PartialEq)]
pub struct Violation {
    /// Property-name path from the validated root to the offending field.
    pub path: Vec<String>,
    /// The facet that failed (`"datatype"`, `"minCount"`, …).
    pub facet: &'static str,
    pub message: String,
    /// The offending value, when one applies (absent for e.g. `minCount`).
    pub value: Option<Value>,
}

impl Violation {
    fn new(path: &[String], facet: &'static str, message: impl Into<String>) -> Self {
        Violation {
            path: path.to_vec(),
            facet,
            message: message.into(),
            value: None,
        }
    }

    fn with_value(mut self, value: Value) -> Self {
        self.value = Some(value);
        self
    }
}

/// Validates a [`Value`] against a [`Shape`]. The *delta* mode (§4.E)
/// suppresses `minCount` violations on fields absent from their owning
/// object, so a partial update can be validated without re-asserting
/// every required field.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    delta: bool,
}

impl Validator {
    pub fn new() -> Self {
        Validator { delta: false }
    }

    pub fn delta(mut self, flag: bool) -> Self {
        self.delta = flag;
        self
    }

    #[tracing::instrument(skip(self, shape, value), fields(clazz = ?shape.clazz().map(|c| c.name.as_str()), delta = self.delta))]
    pub fn validate(&self, shape: &Shape, value: &Value) -> Vec<Violation> {
        let mut out = Vec::new();
        let mut path = Vec::new();
        self.validate_against(shape, value, true, &mut path, &mut out);
        for violation in &out {
            tracing::trace!(facet = violation.facet, path = ?violation.path, "constraint violation");
        }
        out
    }

    fn validate_against(
        &self,
        shape: &Shape,
        value: &Value,
        field_present: bool,
        path: &mut Vec<String>,
        out: &mut Vec<Violation>,
    ) {
        self.validate_shallow(shape, value, field_present, path, out);
        if let Value::Object(obj) = value {
            check_unknown_fields(shape, obj, path, out);
            for prop in shape.properties() {
                let present = obj.contains(&prop.name);
                let field_value = value.get(&prop.name);
                path.push(prop.name.clone());
                let prop_shape = prop.shape.get();
                if prop.embedded {
                    self.validate_against(prop_shape, &field_value, present, path, out);
                } else {
                    self.validate_shallow(prop_shape, &field_value, present, path, out);
                }
                path.pop();
            }
        }
    }

    /// Facet checks that do not recurse into an object's own properties:
    /// cardinality (whole-value), then the per-element and whole-value
    /// facets.
    fn validate_shallow(
        &self,
        shape: &Shape,
        value: &Value,
        field_present: bool,
        path: &mut Vec<String>,
        out: &mut Vec<Violation>,
    ) {
        check_cardinality(shape, value, field_present, self.delta, path, out);
        for element in elements(value) {
            check_datatype(shape, element, path, out);
            check_clazz(shape, element, path, out);
            check_range_length_pattern(shape, element, path, out);
            check_language_in(shape, element, path, out);
            check_in(shape, element, path, out);
            check_constraints(shape, element, path, out);
        }
        check_has_value(shape, value, path, out);
        check_unique_lang(shape, value, path, out);
    }
}

/// A scalar value is a single element, `Nil` has none, and an array is
/// its non-nil elements (§4.E "Nil is never a violation").
fn elements(value: &Value) -> Vec<&Value> {
    match value {
        Value::Nil => Vec::new(),
        Value::Array(items) => items.iter().filter(|v| !v.is_nil()).collect(),
        other => vec![other],
    }
}

fn check_cardinality(
    shape: &Shape,
    value: &Value,
    field_present: bool,
    delta: bool,
    path: &[String],
    out: &mut Vec<Violation>,
) {
    let cardinality = value.cardinality() as u64;
    if let Some(min) = shape.min_count_limit() {
        let suppressed_by_delta = delta && !field_present;
        if !suppressed_by_delta && cardinality < min {
            out.push(Violation::new(
                path,
                "minCount",
                format!("expected at least {min} value(s), found {cardinality}"),
            ));
        }
    }
    if let Some(max) = shape.max_count_limit() {
        if cardinality > max {
            out.push(Violation::new(
                path,
                "maxCount",
                format!("expected at most {max} value(s), found {cardinality}"),
            ));
        }
    }
}

fn check_datatype(shape: &Shape, value: &Value, path: &[String], out: &mut Vec<Violation>) {
    if let Some(expected) = shape.datatype() {
        if value.datatype() != expected {
            out.push(
                Violation::new(
                    path,
                    "datatype",
                    format!("expected {expected:?}, found {:?}", value.datatype()),
                )
                .with_value(value.clone()),
            );
        }
    }
}

fn check_clazz(shape: &Shape, value: &Value, path: &[String], out: &mut Vec<Violation>) {
    let required: Vec<&crate::shape::Clazz> = shape.clazz().into_iter().chain(shape.clazzes()).collect();
    if required.is_empty() {
        return;
    }
    let carried = match value {
        Value::Object(obj) => obj.shape(),
        _ => None,
    };
    let carried_classes: Vec<&crate::shape::Clazz> = match carried {
        Some(s) => s.clazz().into_iter().chain(s.clazzes()).collect(),
        None => Vec::new(),
    };
    for req in required {
        if !carried_classes.iter().any(|c| c.coincides_with(req)) {
            out.push(Violation::new(
                path,
                "clazz",
                format!("missing required class '{}'", req.name),
            ));
        }
    }
}

fn check_range_length_pattern(shape: &Shape, value: &Value, path: &[String], out: &mut Vec<Violation>) {
    let has_range = shape.min_inclusive.is_some()
        || shape.max_inclusive.is_some()
        || shape.min_exclusive.is_some()
        || shape.max_exclusive.is_some();
    if has_range {
        let min = shape
            .min_inclusive
            .as_ref()
            .map(|b| (&b.value, true))
            .or(shape.min_exclusive.as_ref().map(|b| (&b.value, false)));
        let max = shape
            .max_inclusive
            .as_ref()
            .map(|b| (&b.value, true))
            .or(shape.max_exclusive.as_ref().map(|b| (&b.value, false)));
        match compare::in_range(value, min, max) {
            Ok(true) => {}
            Ok(false) => out.push(
                Violation::new(path, "range", "value falls outside the declared range").with_value(value.clone()),
            ),
            Err(_) => out.push(
                Violation::new(path, "range", "value is not comparable to the declared range bounds")
                    .with_value(value.clone()),
            ),
        }
    }

    if shape.min_length.is_some() || shape.max_length.is_some() || shape.pattern.is_some() {
        match text_contents(value) {
            Some(text) => {
                let len = text.chars().count() as u64;
                if let Some(min) = shape.min_length {
                    if len < min {
                        out.push(Violation::new(path, "minLength", format!("length {len} is below minimum {min}")));
                    }
                }
                if let Some(max) = shape.max_length {
                    if len > max {
                        out.push(Violation::new(path, "maxLength", format!("length {len} exceeds maximum {max}")));
                    }
                }
                if let Some(pattern) = &shape.pattern {
                    if !pattern.regex.is_match(text) {
                        out.push(Violation::new(
                            path,
                            "pattern",
                            format!("value does not match pattern '{}'", pattern.source),
                        ));
                    }
                }
            }
            None => out.push(Violation::new(
                path,
                "pattern",
                "length/pattern facets require a string-like value",
            )),
        }
    }
}

fn text_contents(value: &Value) -> Option<&str> {
    match value {
        Value::String(s) => Some(s.as_str()),
        Value::Text(t) => Some(t.value.as_str()),
        _ => None,
    }
}

fn check_language_in(shape: &Shape, value: &Value, path: &[String], out: &mut Vec<Violation>) {
    let Some(allowed) = &shape.language_in else {
        return;
    };
    match value {
        Value::Text(t) => {
            if !allowed.iter().any(|l| l == &t.locale || l == WILDCARD_LOCALE) {
                out.push(Violation::new(path, "languageIn", format!("locale '{}' is not permitted", t.locale)));
            }
        }
        _ => out.push(Violation::new(path, "languageIn", "languageIn applies only to Text values")),
    }
}

fn check_unique_lang(shape: &Shape, value: &Value, path: &[String], out: &mut Vec<Violation>) {
    if !shape.unique_lang {
        return;
    }
    let Value::Array(items) = value else {
        return;
    };
    let mut seen = std::collections::HashSet::new();
    for item in items {
        if let Value::Text(t) = item {
            if !seen.insert(t.locale.clone()) {
                out.push(Violation::new(path, "uniqueLang", format!("locale '{}' appears more than once", t.locale)));
            }
        }
    }
}

fn check_in(shape: &Shape, value: &Value, path: &[String], out: &mut Vec<Violation>) {
    let Some(allowed) = &shape.in_values else {
        return;
    };
    if !allowed.contains(value) {
        out.push(
            Violation::new(path, "in", "value is not one of the enumerated permitted values")
                .with_value(value.clone()),
        );
    }
}

fn check_has_value(shape: &Shape, value: &Value, path: &[String], out: &mut Vec<Violation>) {
    let Some(required) = &shape.has_value else {
        return;
    };
    let present: Vec<&Value> = elements(value);
    for req in required {
        if !present.iter().any(|v| *v == req) {
            out.push(
                Violation::new(path, "hasValue", "a required value is missing from the value list")
                    .with_value(req.clone()),
            );
        }
    }
}

fn check_constraints(shape: &Shape, value: &Value, path: &[String], out: &mut Vec<Violation>) {
    for constraint in &shape.constraints {
        let result = constraint.check(value);
        if !result.is_nil() {
            out.push(
                Violation::new(path, "constraints", format!("constraint '{}' failed", constraint.name()))
                    .with_value(result),
            );
        }
    }
}

fn check_unknown_fields(shape: &Shape, obj: &Object, path: &mut Vec<String>, out: &mut Vec<Violation>) {
    for (name, field_value) in obj.properties() {
        if shape.property(name).is_none() && !matches!(field_value, Value::Query(_) | Value::Specs(_)) {
            path.push(name.to_string());
            out.push(Violation::new(path, "unknownField", format!("field '{name}' is not declared by the shape")));
            path.pop();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{Clazz, Constraint, Property};
    use crate::value::Datatype;

    fn employee_shape() -> Shape {
        let code = Property::new(
            "code",
            Shape::new()
                .datatype_is(Datatype::String)
                .unwrap()
                .min_count(1)
                .unwrap()
                .max_count(1)
                .unwrap(),
        )
        .forward("ex:code")
        .build()
        .unwrap();
        Shape::new().class(Clazz::new("Employee")).unwrap().property(code).unwrap()
    }

    fn obj_with(shape: Shape, fields: Vec<(&str, Value)>) -> Value {
        let mut obj = Object::new();
        obj.set_shape(shape);
        for (k, v) in fields {
            obj.set(k, v);
        }
        Value::Object(obj)
    }

    #[test]
    fn missing_required_field_is_a_violation() {
        let shape = employee_shape();
        let value = obj_with(shape.clone(), vec![]);
        let violations = Validator::new().validate(&shape, &value);
        assert!(violations.iter().any(|v| v.facet == "minCount" && v.path == vec!["code".to_string()]));
    }

    #[test]
    fn delta_mode_suppresses_missing_field_violation() {
        let shape = employee_shape();
        let value = obj_with(shape.clone(), vec![]);
        let violations = Validator::new().delta(true).validate(&shape, &value);
        assert!(!violations.iter().any(|v| v.facet == "minCount"));
    }

    #[test]
    fn wrong_datatype_is_a_violation() {
        let shape = employee_shape();
        let value = obj_with(shape.clone(), vec![("code", Value::int(1))]);
        let violations = Validator::new().validate(&shape, &value);
        assert!(violations.iter().any(|v| v.facet == "datatype"));
    }

    #[test]
    fn unknown_field_is_a_violation() {
        let shape = employee_shape();
        let value = obj_with(shape.clone(), vec![("code", Value::string("E1")), ("mystery", Value::int(1))]);
        let violations = Validator::new().validate(&shape, &value);
        assert!(violations.iter().any(|v| v.facet == "unknownField"));
    }

    #[test]
    fn valid_record_has_no_violations() {
        let shape = employee_shape();
        let value = obj_with(shape.clone(), vec![("code", Value::string("E1"))]);
        let violations = Validator::new().validate(&shape, &value);
        assert!(violations.is_empty(), "{violations:?}");
    }

    #[test]
    fn constraint_violation_carries_returned_value() {
        let inner = Shape::new()
            .datatype_is(Datatype::Number)
            .unwrap()
            .constraint(Constraint::new("positive", |v| match v {
                Value::Integral(i) if *i < 0 => Value::string("must be non-negative"),
                _ => Value::Nil,
            }));
        let value = Value::int(-1);
        let violations = Validator::new().validate(&inner, &value);
        assert_eq!(violations.len(), 1);
        assert_eq!(violations[0].value, Some(Value::string("must be non-negative")));
    }

    #[test]
    fn embedded_property_is_validated_in_place() {
        let manager = Property::new("manager", employee_shape())
            .forward("ex:manager")
            .embedded(true)
            .build()
            .unwrap();
        let shape = Shape::new().class(Clazz::new("Employee")).unwrap().property(manager).unwrap();
        let bad_manager = obj_with(employee_shape(), vec![]);
        let value = obj_with(shape.clone(), vec![("manager", bad_manager)]);
        let violations = Validator::new().validate(&shape, &value);
        assert!(violations.iter().any(|v| v.facet == "minCount"
            && v.path == vec!["manager".to_string(), "code".to_string()]));
    }

    #[test]
    fn non_embedded_reference_is_not_descended_into() {
        let manager = Property::new("manager", employee_shape()).forward("ex:manager").build().unwrap();
        let shape = Shape::new().class(Clazz::new("Employee")).unwrap().property(manager).unwrap();
        let bad_manager = obj_with(employee_shape(), vec![]);
        let value = obj_with(shape.clone(), vec![("manager", bad_manager)]);
        let violations = Validator::new().validate(&shape, &value);
        assert!(!violations.iter().any(|v| v.path == vec!["manager".to_string(), "code".to_string()]));
    }
}
