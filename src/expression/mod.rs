//! Path + transform pipelines applied to a [`Shape`] (§4.C).
//!
//! An `Expression` is parsed from `t1:t2:…:step1.step2…`: zero or more
//! `ALPHA+":"` transform prefixes followed by a dotted, backslash-escaped
//! path. `apply(shape)` walks the path by property name, then folds the
//! transform pipeline over the resulting shape in **reverse** order — the
//! rightmost transform (nearest the path) runs first.

use crate::error::{ParseError, ShapeError};
use crate::shape::Shape;
use crate::value::{Datatype, guard_reserved_name};

/// A single pipeline stage (§4.C transform table).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Transform {
    Count,
    Min,
    Max,
    Sum,
    Avg,
    Abs,
    Round,
    Year,
}

impl Transform {
    fn from_name(name: &str) -> Option<Self> {
        match name.to_ascii_uppercase().as_str() {
            "COUNT" => Some(Transform::Count),
            "MIN" => Some(Transform::Min),
            "MAX" => Some(Transform::Max),
            "SUM" => Some(Transform::Sum),
            "AVG" => Some(Transform::Avg),
            "ABS" => Some(Transform::Abs),
            "ROUND" => Some(Transform::Round),
            "YEAR" => Some(Transform::Year),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Transform::Count => "COUNT",
            Transform::Min => "MIN",
            Transform::Max => "MAX",
            Transform::Sum => "SUM",
            Transform::Avg => "AVG",
            Transform::Abs => "ABS",
            Transform::Round => "ROUND",
            Transform::Year => "YEAR",
        }
    }

    /// §4.C: `isAggregate` is true iff any transform in the pipeline is
    /// aggregate.
    pub fn is_aggregate(&self) -> bool {
        matches!(self, Transform::Count | Transform::Min | Transform::Max | Transform::Sum | Transform::Avg)
    }

    /// Maps an input shape `S` to the transform's output shape, per the
    /// §4.C transform table.
    fn apply_to_shape(&self, input: &Shape) -> Shape {
        let same_datatype = || {
            let mut out = Shape::new();
            if let Some(dt) = input.datatype() {
                out = out.datatype_is(dt).expect("fresh shape never conflicts on datatype");
            }
            out
        };
        match self {
            Transform::Count => Shape::new()
                .datatype_is(Datatype::Number)
                .expect("fresh shape never conflicts on datatype")
                .min_count(1)
                .expect("1 <= unset max_count")
                .max_count(1)
                .expect("1 <= 1"),
            Transform::Min | Transform::Max | Transform::Sum => same_datatype()
                .max_count(1)
                .expect("unset min_count <= 1"),
            Transform::Avg => Shape::new()
                .datatype_is(Datatype::Number)
                .expect("fresh shape never conflicts on datatype")
                .max_count(1)
                .expect("unset min_count <= 1"),
            Transform::Abs => same_datatype().max_count(1).expect("unset min_count <= 1"),
            Transform::Round => Shape::new()
                .datatype_is(Datatype::Number)
                .expect("fresh shape never conflicts on datatype")
                .max_count(1)
                .expect("unset min_count <= 1"),
            Transform::Year => Shape::new()
                .datatype_is(Datatype::Number)
                .expect("fresh shape never conflicts on datatype")
                .max_count(1)
                .expect("unset min_count <= 1"),
        }
    }
}

impl std::fmt::Display for Transform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A parsed path + transform pipeline (§4.C).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct Expression {
    transforms: Vec<Transform>,
    path: Vec<String>,
}

impl Expression {
    pub fn new() -> Self {
        Expression::default()
    }

    /// Append a transform to the pipeline (outer-most stage, applied last).
    pub fn pipe(mut self, transform: Transform) -> Self {
        self.transforms.push(transform);
        self
    }

    /// Append a path step.
    pub fn path(mut self, step: impl Into<String>) -> Result<Self, crate::error::ConstructionError> {
        let step = step.into();
        guard_reserved_name(&step)?;
        self.path.push(step);
        Ok(self)
    }

    pub fn transforms(&self) -> &[Transform] {
        &self.transforms
    }

    pub fn path_steps(&self) -> &[String] {
        &self.path
    }

    pub fn is_aggregate(&self) -> bool {
        self.transforms.iter().any(Transform::is_aggregate)
    }

    pub fn is_computed(&self) -> bool {
        !self.transforms.is_empty()
    }

    /// Parse `t1:t2:…:step1.step2…` (§4.C, §6 "Expression grammar").
    pub fn parse(expr: &str) -> Result<Expression, ParseError> {
        let mut rest = expr;
        let mut transforms = Vec::new();
        while let Some((name, remainder)) = split_transform_prefix(rest) {
            let transform = Transform::from_name(&name).ok_or_else(|| ParseError::UnknownTransform(name.clone()))?;
            transforms.push(transform);
            rest = remainder;
        }
        if rest.is_empty() {
            return Err(ParseError::Expression {
                expression: expr.to_string(),
                reason: "missing path".to_string(),
            });
        }
        let path = parse_path(rest, expr)?;
        Ok(Expression { transforms, path })
    }

    /// Walk the path against `shape`, then fold the pipeline over the
    /// resulting shape in reverse order (§4.C).
    pub fn apply(&self, shape: &Shape) -> Result<Shape, ShapeError> {
        let mut current = shape.clone();
        for step in &self.path {
            let property = current
                .property(step)
                .ok_or_else(|| ShapeError::UnknownProperty(step.clone()))?;
            current = property.shape.get().clone();
        }
        for transform in self.transforms.iter().rev() {
            current = transform.apply_to_shape(&current);
        }
        Ok(current)
    }
}

impl std::fmt::Display for Expression {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for t in &self.transforms {
            write!(f, "{t}:")?;
        }
        write!(f, "{}", self.path.join("."))
    }
}

/// If `s` starts with `ALPHA+` followed by an unescaped `:`, split it off
/// and return `(name, remainder)`.
fn split_transform_prefix(s: &str) -> Option<(String, &str)> {
    let mut chars = s.char_indices().peekable();
    let mut end = None;
    while let Some((i, c)) = chars.next() {
        if c == '\\' {
            chars.next();
            return None; // an escape this early means this isn't a bare transform name
        }
        if c == ':' {
            end = Some(i);
            break;
        }
        if !c.is_ascii_alphabetic() {
            return None;
        }
    }
    let end = end?;
    if end == 0 {
        return None;
    }
    Some((s[..end].to_string(), &s[end + 1..]))
}

fn parse_path(path: &str, original: &str) -> Result<Vec<String>, ParseError> {
    let mut steps = Vec::new();
    let mut buf = String::new();
    let mut chars = path.chars();
    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars.next().ok_or_else(|| ParseError::Expression {
                    expression: original.to_string(),
                    reason: "trailing escape character".to_string(),
                })?;
                buf.push(escaped);
            }
            '.' => {
                steps.push(take_step(&mut buf, original)?);
            }
            _ => buf.push(c),
        }
    }
    steps.push(take_step(&mut buf, original)?);
    Ok(steps)
}

fn take_step(buf: &mut String, original: &str) -> Result<String, ParseError> {
    if buf.is_empty() {
        return Err(ParseError::Expression {
            expression: original.to_string(),
            reason: "empty path step".to_string(),
        });
    }
    if buf.starts_with('@') {
        return Err(ParseError::Expression {
            expression: original.to_string(),
            reason: format!("reserved step '{buf}' cannot be selected"),
        });
    }
    Ok(std::mem::take(buf))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{Clazz, Property};

    fn employee_shape() -> Shape {
        let birthdate = Property::new("birthdate", Shape::new().datatype_is(Datatype::Temporal).unwrap())
            .forward("ex:birthdate")
            .build()
            .unwrap();
        Shape::new()
            .class(Clazz::new("Employee"))
            .unwrap()
            .property(birthdate)
            .unwrap()
    }

    #[test]
    fn parses_bare_path() {
        let expr = Expression::parse("birthdate").unwrap();
        assert_eq!(expr.path_steps(), &["birthdate".to_string()]);
        assert!(expr.transforms().is_empty());
        assert!(!expr.is_computed());
    }

    #[test]
    fn parses_single_transform_and_path() {
        let expr = Expression::parse("YEAR:birthdate").unwrap();
        assert_eq!(expr.transforms(), &[Transform::Year]);
        assert_eq!(expr.path_steps(), &["birthdate".to_string()]);
        assert!(expr.is_computed());
        assert!(!expr.is_aggregate());
    }

    #[test]
    fn parses_multiple_transforms() {
        let expr = Expression::parse("COUNT:YEAR:birthdate").unwrap();
        assert_eq!(expr.transforms(), &[Transform::Count, Transform::Year]);
        assert!(expr.is_aggregate());
    }

    #[test]
    fn unknown_transform_is_an_error() {
        assert!(matches!(
            Expression::parse("NOPE:birthdate"),
            Err(ParseError::UnknownTransform(_))
        ));
    }

    #[test]
    fn dotted_multi_step_path_parses() {
        let expr = Expression::parse("a.b.c").unwrap();
        assert_eq!(expr.path_steps(), &["a".to_string(), "b".to_string(), "c".to_string()]);
    }

    #[test]
    fn apply_walks_property_then_folds_transforms_in_reverse() {
        let expr = Expression::new().pipe(Transform::Year).path("birthdate").unwrap();
        let result = expr.apply(&employee_shape()).unwrap();
        assert_eq!(result.datatype(), Some(Datatype::Number));
    }

    #[test]
    fn apply_fails_on_unknown_property() {
        let expr = Expression::new().path("nonexistent").unwrap();
        assert!(expr.apply(&employee_shape()).is_err());
    }

    #[test]
    fn reserved_step_rejected_by_builder_and_parser() {
        assert!(Expression::new().path("@id").is_err());
        assert!(Expression::parse("@id").is_err());
    }

    #[test]
    fn count_transform_output_is_required_single_integer() {
        let s = Transform::Count.apply_to_shape(&Shape::new());
        assert_eq!(s.min_count_limit(), Some(1));
        assert_eq!(s.max_count_limit(), Some(1));
    }

    #[test]
    fn display_roundtrips_canonical_form() {
        let expr = Expression::new().pipe(Transform::Year).path("birthdate").unwrap();
        assert_eq!(expr.to_string(), "YEAR:birthdate");
    }
}
