//! Filter/sort predicates and the query/tabular-projection containers that
//! carry them (§4.D): `Criterion`, `Query`, `Specs`, `Probe`.

use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::error::{CompareError, ConstructionError, ShapeError};
use crate::expression::Expression;
use crate::shape::Shape;
use crate::value::{Value, compare};

/// A filter/sort predicate attached to one [`Expression`] within a
/// [`Query`] (§3, §4.D). Fluent construction; an empty criterion (every
/// facet unset) is filtered out of `Query` construction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Criterion {
    lt: Option<Value>,
    le: Option<Value>,
    gt: Option<Value>,
    ge: Option<Value>,
    like: Option<String>,
    any: Option<Vec<Value>>,
    focus: Vec<Value>,
    order: Option<i64>,
}

impl Criterion {
    pub fn new() -> Self {
        Criterion::default()
    }

    pub fn lt(mut self, value: Value) -> Self {
        self.lt = Some(value);
        self
    }

    pub fn le(mut self, value: Value) -> Self {
        self.le = Some(value);
        self
    }

    pub fn gt(mut self, value: Value) -> Self {
        self.gt = Some(value);
        self
    }

    pub fn ge(mut self, value: Value) -> Self {
        self.ge = Some(value);
        self
    }

    pub fn like(mut self, pattern: impl Into<String>) -> Self {
        self.like = Some(pattern.into());
        self
    }

    /// Set of required alternatives. An empty set is an existence test; a
    /// set containing `Nil` is a non-existence alternative (§3).
    pub fn any(mut self, values: Vec<Value>) -> Self {
        self.any = Some(values);
        self
    }

    pub fn focus(mut self, values: Vec<Value>) -> Self {
        self.focus.extend(values);
        self
    }

    pub fn order(mut self, priority: i64) -> Self {
        self.order = Some(priority);
        self
    }

    pub fn lt_bound(&self) -> Option<&Value> {
        self.lt.as_ref()
    }

    pub fn le_bound(&self) -> Option<&Value> {
        self.le.as_ref()
    }

    pub fn gt_bound(&self) -> Option<&Value> {
        self.gt.as_ref()
    }

    pub fn ge_bound(&self) -> Option<&Value> {
        self.ge.as_ref()
    }

    pub fn like_pattern(&self) -> Option<&str> {
        self.like.as_deref()
    }

    pub fn any_set(&self) -> Option<&[Value]> {
        self.any.as_deref()
    }

    pub fn focus_values(&self) -> &[Value] {
        &self.focus
    }

    pub fn order_priority(&self) -> Option<i64> {
        self.order
    }

    pub fn is_empty(&self) -> bool {
        self.lt.is_none()
            && self.le.is_none()
            && self.gt.is_none()
            && self.ge.is_none()
            && self.like.is_none()
            && self.any.is_none()
            && self.focus.is_empty()
            && self.order.is_none()
    }

    /// Intersect two criteria on the same expression (§4.D): range facets
    /// tighten, `any` sets intersect when both are non-empty (the more
    /// specific side wins when only one is an existence test), `focus`
    /// concatenates, `like` and `order` are last-write-wins.
    pub fn merge(self, other: Criterion) -> Result<Criterion, CompareError> {
        Ok(Criterion {
            lt: tighten(self.lt, other.lt, true)?,
            le: tighten(self.le, other.le, true)?,
            gt: tighten(self.gt, other.gt, false)?,
            ge: tighten(self.ge, other.ge, false)?,
            like: other.like.or(self.like),
            any: merge_any(self.any, other.any),
            focus: {
                let mut f = self.focus;
                f.extend(other.focus);
                f
            },
            order: other.order.or(self.order),
        })
    }
}

/// Picks the tighter of two optional upper/lower bounds. `keep_lesser`
/// selects the minimum (used for `lt`/`le`); otherwise the maximum.
fn tighten(a: Option<Value>, b: Option<Value>, keep_lesser: bool) -> Result<Option<Value>, CompareError> {
    match (a, b) {
        (None, None) => Ok(None),
        (Some(a), None) => Ok(Some(a)),
        (None, Some(b)) => Ok(Some(b)),
        (Some(a), Some(b)) => {
            let ord = compare::compare(&a, &b)?;
            let a_wins = if keep_lesser {
                ord != std::cmp::Ordering::Greater
            } else {
                ord != std::cmp::Ordering::Less
            };
            Ok(Some(if a_wins { a } else { b }))
        }
    }
}

fn merge_any(a: Option<Vec<Value>>, b: Option<Vec<Value>>) -> Option<Vec<Value>> {
    match (a, b) {
        (None, None) => None,
        (Some(a), None) => Some(a),
        (None, Some(b)) => Some(b),
        (Some(a), Some(b)) if !a.is_empty() && !b.is_empty() => {
            Some(a.into_iter().filter(|v| b.contains(v)).collect())
        }
        (Some(a), Some(b)) => Some(if a.is_empty() { b } else { a }),
    }
}

/// A named column of a [`Specs`] tabular projection (§3, §4.D).
#[derive(Debug, Clone, PartialEq)]
pub struct Probe {
    pub name: String,
    pub expression: Expression,
    pub model: Value,
}

impl Probe {
    pub fn new(name: impl Into<String>, expression: Expression, model: Value) -> Self {
        Probe {
            name: name.into(),
            expression,
            model,
        }
    }
}

/// A tabular-projection spec: a [`Shape`] and an ordered list of uniquely
/// named [`Probe`]s (§3, §4.D), embeddable as `Value::Specs`.
#[derive(Debug, Clone, PartialEq)]
pub struct Specs {
    shape: Shape,
    probes: Vec<Probe>,
}

impl Specs {
    pub fn new(shape: Shape, probes: Vec<Probe>) -> Result<Specs, ConstructionError> {
        let mut seen = std::collections::HashSet::new();
        for probe in &probes {
            if !seen.insert(probe.name.clone()) {
                return Err(ConstructionError::DuplicateProbe(probe.name.clone()));
            }
        }
        Ok(Specs { shape, probes })
    }

    pub fn shape(&self) -> &Shape {
        &self.shape
    }

    pub fn probes(&self) -> &[Probe] {
        &self.probes
    }
}

/// A model value, an ordered map of [`Expression`] → [`Criterion`], and
/// pagination (§3, §4.D), embeddable as `Value::Query`.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    model: Value,
    criteria: IndexMap<Expression, Criterion>,
    offset: i64,
    limit: i64,
}

impl Query {
    pub fn new(model: Value) -> Self {
        Query {
            model,
            criteria: IndexMap::new(),
            offset: 0,
            limit: 0,
        }
    }

    pub fn model(&self) -> &Value {
        &self.model
    }

    pub fn criteria(&self) -> impl Iterator<Item = (&Expression, &Criterion)> {
        self.criteria.iter()
    }

    pub fn offset(&self) -> i64 {
        self.offset
    }

    pub fn limit(&self) -> i64 {
        self.limit
    }

    pub fn with_offset(mut self, offset: i64) -> Result<Self, ConstructionError> {
        if offset < 0 {
            return Err(ConstructionError::NegativeOffset(offset));
        }
        self.offset = offset;
        Ok(self)
    }

    pub fn with_limit(mut self, limit: i64) -> Result<Self, ConstructionError> {
        if limit < 0 {
            return Err(ConstructionError::NegativeLimit(limit));
        }
        self.limit = limit;
        Ok(self)
    }

    fn effective_shape(&self) -> Option<&Shape> {
        match &self.model {
            Value::Object(o) => o.shape(),
            Value::Specs(s) => Some(s.shape()),
            _ => None,
        }
    }

    /// Add a criterion for `expr`, validating that `expr` resolves against
    /// the model's effective shape (when one is attached). Empty criteria
    /// are dropped; a duplicate expression is rejected, keeping the first
    /// occurrence (§4.D, §8 "order-preserving and duplicate-rejecting").
    pub fn where_(mut self, expr: Expression, criterion: Criterion) -> Result<Self, ShapeError> {
        if criterion.is_empty() {
            return Ok(self);
        }
        if let Some(shape) = self.effective_shape() {
            expr.apply(shape)?;
        }
        if let Entry::Vacant(slot) = self.criteria.entry(expr) {
            slot.insert(criterion);
        }
        Ok(self)
    }

    pub(crate) fn from_parts(model: Value, criteria: IndexMap<Expression, Criterion>, offset: i64, limit: i64) -> Self {
        Query { model, criteria, offset, limit }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expression::Transform;
    use crate::shape::{Clazz, Property};

    fn employee_shape() -> Shape {
        let label = Property::new("label", Shape::new().datatype_is(crate::value::Datatype::Text).unwrap())
            .forward("ex:label")
            .build()
            .unwrap();
        Shape::new().class(Clazz::new("Employee")).unwrap().property(label).unwrap()
    }

    fn employee(shape: Shape) -> Value {
        let mut obj = crate::value::Object::new();
        obj.set_shape(shape);
        Value::Object(obj)
    }

    #[test]
    fn criterion_merge_tightens_bounds() {
        let a = Criterion::new().lt(Value::int(10));
        let b = Criterion::new().lt(Value::int(5));
        let merged = a.merge(b).unwrap();
        assert_eq!(merged.lt_bound(), Some(&Value::int(5)));
    }

    #[test]
    fn criterion_merge_intersects_non_empty_any_sets() {
        let a = Criterion::new().any(vec![Value::int(1), Value::int(2)]);
        let b = Criterion::new().any(vec![Value::int(2), Value::int(3)]);
        let merged = a.merge(b).unwrap();
        assert_eq!(merged.any_set(), Some(&[Value::int(2)][..]));
    }

    #[test]
    fn criterion_merge_concatenates_focus() {
        let a = Criterion::new().focus(vec![Value::int(1)]);
        let b = Criterion::new().focus(vec![Value::int(2)]);
        let merged = a.merge(b).unwrap();
        assert_eq!(merged.focus_values(), &[Value::int(1), Value::int(2)]);
    }

    #[test]
    fn query_rejects_negative_offset_and_limit() {
        let q = Query::new(Value::Nil);
        assert!(q.clone().with_offset(-1).is_err());
        assert!(q.with_limit(-1).is_err());
    }

    #[test]
    fn query_where_is_duplicate_rejecting_and_order_preserving() {
        let model = employee(employee_shape());
        let label = Expression::new().path("label").unwrap();
        let q = Query::new(model)
            .where_(label.clone(), Criterion::new().order(1))
            .unwrap()
            .where_(label.clone(), Criterion::new().order(99))
            .unwrap();
        let (_, criterion) = q.criteria().next().unwrap();
        assert_eq!(criterion.order_priority(), Some(1));
        assert_eq!(q.criteria().count(), 1);
    }

    #[test]
    fn query_where_rejects_unknown_expression_path() {
        let model = employee(employee_shape());
        let bogus = Expression::new().path("nonexistent").unwrap();
        assert!(Query::new(model).where_(bogus, Criterion::new().order(1)).is_err());
    }

    #[test]
    fn query_over_specs_model_validates_against_the_embedded_shape() {
        let specs = Specs::new(employee_shape(), Vec::new()).unwrap();
        let model = Value::Specs(Box::new(specs));
        let bogus = Expression::new().path("nonexistent").unwrap();
        assert!(Query::new(model).where_(bogus, Criterion::new().order(1)).is_err());
    }

    #[test]
    fn empty_criterion_is_dropped_from_query() {
        let model = employee(employee_shape());
        let label = Expression::new().path("label").unwrap();
        let q = Query::new(model).where_(label, Criterion::new()).unwrap();
        assert_eq!(q.criteria().count(), 0);
    }

    #[test]
    fn specs_rejects_duplicate_probe_names() {
        let shape = employee_shape();
        let expr = Expression::new().pipe(Transform::Count).path("label").unwrap();
        let probes = vec![
            Probe::new("n", expr.clone(), Value::Nil),
            Probe::new("n", expr, Value::Nil),
        ];
        assert!(Specs::new(shape, probes).is_err());
    }
}
