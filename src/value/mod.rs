//! The universal [`Value`] model (spec §3, §4.A).
//!
//! `Value` is a tagged sum over scalars, temporal types, language-tagged
//! text, typed data, arrays, and objects, plus the tabular-projection and
//! query-embedding payloads (`Table`/`Tuple`, `Query`, `Specs`) that let a
//! `Value` carry a normalised request end-to-end. Every variant is
//! immutable; all "mutation" is by functional replacement (`with_field`,
//! `with_index`, …).

pub mod codec;
pub mod compare;
pub mod number;
pub mod selector;
pub mod temporal;

use std::sync::Arc;

use bigdecimal::BigDecimal;
use indexmap::IndexMap;
use num_bigint::BigInt;

use crate::error::ConstructionError;
use crate::query::{Query, Specs};
use crate::shape::Shape;

pub use temporal::{
    Duration, Instant, LocalDate, LocalDateTime, LocalTime, OffsetDateTime, OffsetTime, Period,
    Year, YearMonth, ZonedDateTime,
};

/// Reserved field name for a resource's identity.
pub const FIELD_ID: &str = "@id";
/// Reserved field name for a resource's type.
pub const FIELD_TYPE: &str = "@type";
/// Reserved field name for the shape attached to an object.
pub const FIELD_SHAPE: &str = "@shape";

/// The distinguished wildcard locale, matching any locale tag (§3, §4.F).
pub const WILDCARD_LOCALE: &str = "*";

/// A datatype witness: identifies the *family* a [`Value`] belongs to,
/// independent of its concrete contents. Used by `Shape::datatype`, the
/// comparator, and the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Datatype {
    Nil,
    Bit,
    /// Covers `Integral`, `Floating`, `Integer`, and `Decimal` (§3).
    Number,
    String,
    Uri,
    /// Covers all nine temporal variants (§3).
    Temporal,
    /// Covers `Period` and `Duration` (§3).
    TemporalAmount,
    Text,
    Data,
    Array,
    Object,
    Table,
    Tuple,
    Query,
    Specs,
}

/// An absolute or base-relative URI (§3). Stored as its lexical string
/// form; resolution/relativisation against a base happens in
/// [`codec`], using the `url` crate when the string parses as absolute.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Uri(pub String);

impl Uri {
    pub fn new(s: impl Into<String>) -> Self {
        Uri(s.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Resolve this URI against `base`, producing an absolute URI when
    /// possible. Falls back to the lexical string unchanged if neither the
    /// URI nor the base is a parseable absolute URL (e.g. an opaque CURIE).
    pub fn resolve(&self, base: &str) -> Uri {
        if let Ok(parsed) = url::Url::parse(&self.0) {
            return Uri(parsed.to_string());
        }
        if let Ok(base_url) = url::Url::parse(base) {
            if let Ok(joined) = base_url.join(&self.0) {
                return Uri(joined.to_string());
            }
        }
        self.clone()
    }

    /// Relativise against `base`, stripping the prefix when the URI starts
    /// with it; otherwise the absolute form is kept.
    pub fn relativize(&self, base: &str) -> Uri {
        if let Some(rest) = self.0.strip_prefix(base) {
            Uri(rest.to_string())
        } else {
            self.clone()
        }
    }
}

impl std::fmt::Display for Uri {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A locale-tagged string (§3). `locale` uses canonical IETF BCP-47 form;
/// [`WILDCARD_LOCALE`] matches any locale.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Text {
    pub locale: String,
    pub value: String,
}

impl Text {
    pub fn new(locale: impl Into<String>, value: impl Into<String>) -> Self {
        Text {
            locale: locale.into(),
            value: value.into(),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        self.locale == WILDCARD_LOCALE
    }
}

/// An opaque typed literal: a datatype URI paired with its lexical string
/// (§3). Used for datatypes the core has no dedicated variant for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Data {
    pub datatype: Uri,
    pub lexical: String,
}

impl Data {
    pub fn new(datatype: impl Into<String>, lexical: impl Into<String>) -> Self {
        Data {
            datatype: Uri::new(datatype),
            lexical: lexical.into(),
        }
    }
}

/// An ordered mapping from field name to [`Value`] with unique keys (§3).
/// `@id`, `@type`, and `@shape` are reserved field names carrying metadata;
/// they live in the same ordered map as regular properties so field order
/// is preserved uniformly, but are never iterated as payload properties by
/// [`Object::properties`].
#[derive(Debug, Clone, Default)]
pub struct Object {
    fields: IndexMap<String, Value>,
}

impl Object {
    pub fn new() -> Self {
        Object {
            fields: IndexMap::new(),
        }
    }

    pub fn is_reserved(name: &str) -> bool {
        name.starts_with('@')
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.insert(name.into(), value);
        self
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.fields.insert(name.into(), value);
    }

    pub fn remove(&mut self, name: &str) -> Option<Value> {
        self.fields.shift_remove(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.fields.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate all fields (including reserved ones) in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// Iterate only non-reserved (payload) fields, in insertion order.
    pub fn properties(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.iter().filter(|(name, _)| !Self::is_reserved(name))
    }

    pub fn id(&self) -> Option<&Uri> {
        match self.get(FIELD_ID) {
            Some(Value::Uri(u)) => Some(u),
            _ => None,
        }
    }

    pub fn type_name(&self) -> Option<&str> {
        match self.get(FIELD_TYPE) {
            Some(Value::String(s)) => Some(s.as_str()),
            _ => None,
        }
    }

    pub fn shape(&self) -> Option<&Shape> {
        match self.get(FIELD_SHAPE) {
            Some(Value::Shape(s)) => Some(s),
            _ => None,
        }
    }

    pub fn set_id(&mut self, uri: Uri) {
        self.set(FIELD_ID, Value::Uri(uri));
    }

    pub fn set_shape(&mut self, shape: Shape) {
        self.set(FIELD_SHAPE, Value::Shape(Box::new(shape)));
    }
}

impl PartialEq for Object {
    /// Field order is irrelevant for Object equality (§4.A): two objects
    /// are equal iff they carry the same keys mapping to equal values.
    fn eq(&self, other: &Self) -> bool {
        self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .all(|(k, v)| other.fields.get(k).is_some_and(|ov| ov == v))
    }
}

/// One field of a [`Tuple`] result row (§3).
#[derive(Debug, Clone, PartialEq)]
pub struct TupleField {
    pub name: String,
    pub value: Value,
}

/// An ordered list of (name, Value) fields with unique names per tuple,
/// the result row of a tabular projection (§3, §4.D).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Tuple {
    fields: Vec<TupleField>,
}

impl Tuple {
    pub fn new() -> Self {
        Tuple { fields: Vec::new() }
    }

    pub fn with(mut self, name: impl Into<String>, value: Value) -> Self {
        self.fields.push(TupleField {
            name: name.into(),
            value,
        });
        self
    }

    /// Returns the first field matching `name` (§4.D `Tuple.value`).
    pub fn value(&self, name: &str) -> Option<&Value> {
        self.fields.iter().find(|f| f.name == name).map(|f| &f.value)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|f| (f.name.as_str(), &f.value))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

/// An ordered list of [`Tuple`]s: the result of a tabular projection (§3).
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    rows: Vec<Tuple>,
}

impl Table {
    pub fn new() -> Self {
        Table { rows: Vec::new() }
    }

    pub fn with_row(mut self, row: Tuple) -> Self {
        self.rows.push(row);
        self
    }

    pub fn rows(&self) -> &[Tuple] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// The universal tagged value (§3).
#[derive(Debug, Clone)]
pub enum Value {
    Nil,
    Bit(bool),
    Integral(i64),
    Floating(f64),
    Integer(BigInt),
    Decimal(BigDecimal),
    String(String),
    Uri(Uri),
    Year(Year),
    YearMonth(YearMonth),
    LocalDate(LocalDate),
    LocalTime(LocalTime),
    OffsetTime(OffsetTime),
    LocalDateTime(LocalDateTime),
    OffsetDateTime(OffsetDateTime),
    ZonedDateTime(ZonedDateTime),
    Instant(Instant),
    Period(Period),
    Duration(Duration),
    Text(Text),
    Data(Data),
    Array(Vec<Value>),
    Object(Object),
    Table(Table),
    Tuple(Tuple),
    /// An embedded query, the sole contents of an object-shaped value
    /// (§3). Carried as its own variant rather than nested inside
    /// `Object` so `populate`/`expand` can dispatch on it directly.
    Query(Box<Query>),
    /// An embedded tabular-projection spec (§3), same rationale as `Query`.
    Specs(Box<Specs>),
    /// Metadata payload of the reserved `@shape` object field (§3). Never
    /// appears anywhere but under `Object`'s `@shape` key.
    Shape(Box<Shape>),
}

impl Default for Value {
    fn default() -> Self {
        Value::Nil
    }
}

impl Value {
    pub fn nil() -> Self {
        Value::Nil
    }

    pub fn bit(b: bool) -> Self {
        Value::Bit(b)
    }

    pub fn int(i: i64) -> Self {
        Value::Integral(i)
    }

    pub fn float(f: f64) -> Self {
        Value::Floating(f)
    }

    pub fn string(s: impl Into<String>) -> Self {
        Value::String(s.into())
    }

    pub fn uri(s: impl Into<String>) -> Self {
        Value::Uri(Uri::new(s))
    }

    pub fn array(values: impl IntoIterator<Item = Value>) -> Self {
        Value::Array(values.into_iter().collect())
    }

    pub fn object() -> Object {
        Object::new()
    }

    pub fn is_nil(&self) -> bool {
        matches!(self, Value::Nil)
    }

    /// The datatype family this value belongs to (§3, §4.A).
    pub fn datatype(&self) -> Datatype {
        match self {
            Value::Nil => Datatype::Nil,
            Value::Bit(_) => Datatype::Bit,
            Value::Integral(_) | Value::Floating(_) | Value::Integer(_) | Value::Decimal(_) => {
                Datatype::Number
            }
            Value::String(_) => Datatype::String,
            Value::Uri(_) => Datatype::Uri,
            Value::Year(_)
            | Value::YearMonth(_)
            | Value::LocalDate(_)
            | Value::LocalTime(_)
            | Value::OffsetTime(_)
            | Value::LocalDateTime(_)
            | Value::OffsetDateTime(_)
            | Value::ZonedDateTime(_)
            | Value::Instant(_) => Datatype::Temporal,
            Value::Period(_) | Value::Duration(_) => Datatype::TemporalAmount,
            Value::Text(_) => Datatype::Text,
            Value::Data(_) => Datatype::Data,
            Value::Array(_) => Datatype::Array,
            Value::Object(_) => Datatype::Object,
            Value::Table(_) => Datatype::Table,
            Value::Tuple(_) => Datatype::Tuple,
            Value::Query(_) => Datatype::Query,
            Value::Specs(_) => Datatype::Specs,
            // Only ever nested under Object's @shape field; surfaces as
            // Object to every facet that isn't specifically looking for it.
            Value::Shape(_) => Datatype::Object,
        }
    }

    /// Access API: field lookup on an `Object`, `Nil` otherwise (§4.A).
    pub fn get(&self, name: &str) -> Value {
        match self {
            Value::Object(obj) => obj.get(name).cloned().unwrap_or(Value::Nil),
            _ => Value::Nil,
        }
    }

    /// Access API: positional lookup on an `Array`, `Nil` otherwise (§4.A).
    pub fn index(&self, i: usize) -> Value {
        match self {
            Value::Array(items) => items.get(i).cloned().unwrap_or(Value::Nil),
            _ => Value::Nil,
        }
    }

    /// Path-based selection using the selector grammar (§4.A).
    pub fn select(&self, selector: &str) -> Result<Value, crate::error::ParseError> {
        selector::select(self, selector)
    }

    pub fn as_object(&self) -> Option<&Object> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }

    /// Multi-cardinality of this field value (§4.E `minCount`/`maxCount`):
    /// a scalar counts as 1, an array as its length, Nil as 0.
    pub fn cardinality(&self) -> usize {
        match self {
            Value::Nil => 0,
            Value::Array(items) => items.len(),
            _ => 1,
        }
    }

    /// `Value::merge(x, y)` (§4.A): y wins on scalars, objects union by
    /// key with y winning, arrays concatenate, and the `@shape` reserved
    /// field merges the two shapes instead of y overriding x outright.
    pub fn merge(self, other: Value) -> Result<Value, crate::error::ShapeError> {
        match (self, other) {
            (Value::Array(mut a), Value::Array(b)) => {
                a.extend(b);
                Ok(Value::Array(a))
            }
            (Value::Object(a), Value::Object(b)) => Ok(Value::Object(merge_objects(a, b)?)),
            (_, y) => Ok(y),
        }
    }
}

fn merge_objects(mut a: Object, b: Object) -> Result<Object, crate::error::ShapeError> {
    for (name, value) in b.iter() {
        if name == FIELD_SHAPE {
            let merged = match (a.shape().cloned(), value) {
                (Some(existing), Value::Shape(incoming)) => existing.merge((**incoming).clone())?,
                (None, Value::Shape(incoming)) => (**incoming).clone(),
                _ => continue,
            };
            a.set_shape(merged);
            continue;
        }
        a.set(name.to_string(), value.clone());
    }
    Ok(a)
}

/// Thread-safe, lazily-evaluated [`Shape`] reference used by recursive
/// [`crate::shape::Property`] definitions (§5, §9). The closure is
/// evaluated at most once; subsequent reads return the memoised shape,
/// preserving identity across repeated dereferences of the same thunk.
#[derive(Clone)]
pub struct LazyShape {
    init: Arc<dyn Fn() -> Shape + Send + Sync>,
    cell: Arc<std::sync::OnceLock<Shape>>,
}

impl LazyShape {
    pub fn new(init: impl Fn() -> Shape + Send + Sync + 'static) -> Self {
        LazyShape {
            init: Arc::new(init),
            cell: Arc::new(std::sync::OnceLock::new()),
        }
    }

    pub fn of(shape: Shape) -> Self {
        LazyShape::new(move || shape.clone())
    }

    pub fn get(&self) -> &Shape {
        self.cell.get_or_init(|| (self.init)())
    }
}

impl std::fmt::Debug for LazyShape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LazyShape")
            .field("evaluated", &self.cell.get().is_some())
            .finish()
    }
}

impl PartialEq for LazyShape {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.cell, &other.cell) || self.get() == other.get()
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        use Value::*;
        match (self, other) {
            (Nil, Nil) => true,
            (Bit(a), Bit(b)) => a == b,
            (Integral(a), Integral(b)) => a == b,
            (Floating(a), Floating(b)) => a == b,
            (Integer(a), Integer(b)) => a == b,
            (Decimal(a), Decimal(b)) => a == b,
            (String(a), String(b)) => a == b,
            (Uri(a), Uri(b)) => a == b,
            (Year(a), Year(b)) => a == b,
            (YearMonth(a), YearMonth(b)) => a == b,
            (LocalDate(a), LocalDate(b)) => a == b,
            (LocalTime(a), LocalTime(b)) => a == b,
            (OffsetTime(a), OffsetTime(b)) => a == b,
            (LocalDateTime(a), LocalDateTime(b)) => a == b,
            (OffsetDateTime(a), OffsetDateTime(b)) => a == b,
            (ZonedDateTime(a), ZonedDateTime(b)) => a == b,
            (Instant(a), Instant(b)) => a == b,
            (Period(a), Period(b)) => a == b,
            (Duration(a), Duration(b)) => a == b,
            (Text(a), Text(b)) => a == b,
            (Data(a), Data(b)) => a == b,
            (Array(a), Array(b)) => a == b,
            (Object(a), Object(b)) => a == b,
            (Table(a), Table(b)) => a == b,
            (Tuple(a), Tuple(b)) => a == b,
            (Query(a), Query(b)) => a == b,
            (Specs(a), Specs(b)) => a == b,
            (Shape(a), Shape(b)) => a == b,
            _ => false,
        }
    }
}

/// Reject a property/field name starting with `@` unless it is one of the
/// three reserved names (§6 "Property names beginning with @ are rejected
/// by the shape/expression builders").
pub fn guard_reserved_name(name: &str) -> Result<(), ConstructionError> {
    if Object::is_reserved(name) && !matches!(name, FIELD_ID | FIELD_TYPE | FIELD_SHAPE) {
        return Err(ConstructionError::ReservedName(name.to_string()));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_equality_ignores_field_order() {
        let a = Object::new().with("x", Value::int(1)).with("y", Value::int(2));
        let b = Object::new().with("y", Value::int(2)).with("x", Value::int(1));
        assert_eq!(Value::Object(a), Value::Object(b));
    }

    #[test]
    fn array_equality_respects_order() {
        let a = Value::array([Value::int(1), Value::int(2)]);
        let b = Value::array([Value::int(2), Value::int(1)]);
        assert_ne!(a, b);
    }

    #[test]
    fn merge_object_union_prefers_y() {
        let x = Value::Object(Object::new().with("a", Value::int(1)));
        let y = Value::Object(Object::new().with("a", Value::int(2)).with("b", Value::int(3)));
        let merged = x.merge(y).unwrap();
        assert_eq!(merged.get("a"), Value::int(2));
        assert_eq!(merged.get("b"), Value::int(3));
    }

    #[test]
    fn merge_array_concatenates() {
        let x = Value::array([Value::int(1)]);
        let y = Value::array([Value::int(2)]);
        assert_eq!(x.merge(y).unwrap(), Value::array([Value::int(1), Value::int(2)]));
    }

    #[test]
    fn value_merge_of_empty_objects_is_identity() {
        let x = Value::Object(Object::new());
        let y = Value::Object(Object::new().with("a", Value::int(1)));
        assert_eq!(
            x.merge(y.clone()).unwrap(),
            y,
            "merge(object(), object(x)) = object(x)"
        );
    }

    #[test]
    fn cardinality_matches_spec_rules() {
        assert_eq!(Value::Nil.cardinality(), 0);
        assert_eq!(Value::int(1).cardinality(), 1);
        assert_eq!(Value::array([Value::int(1), Value::int(2)]).cardinality(), 2);
    }

    #[test]
    fn lazy_shape_memoises_single_evaluation() {
        use std::sync::atomic::{AtomicUsize, Ordering};
        let calls = std::sync::Arc::new(AtomicUsize::new(0));
        let calls2 = calls.clone();
        let lazy = LazyShape::new(move || {
            calls2.fetch_add(1, Ordering::SeqCst);
            Shape::new()
        });
        let _ = lazy.get();
        let _ = lazy.get();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
