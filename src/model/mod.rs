//! The two model-transformation operators (§4.F): `expand` fills
//! shape-inferred defaults on a model value, `populate` overlays a
//! user-supplied value onto a model value under type-aware rules.

use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::config::EngineConfig;
use crate::error::{CompareError, ShapeError};
use crate::expression::Expression;
use crate::query::{Criterion, Query};
use crate::shape::Shape;
use crate::value::{Data, Datatype, Object, Text, Uri, Value};

/// Fill in shape-inferred defaults on a model value (§4.F).
///
/// Arrays are expanded element-wise; embedded query models are expanded in
/// place. Objects get a fresh `@shape`/`@id` when either is missing, then
/// every declared property missing from the object is seeded with its
/// shape's default model value.
pub fn expand(value: &Value, config: &EngineConfig) -> Value {
    match value {
        Value::Array(items) => Value::array(items.iter().map(|v| expand(v, config))),
        Value::Object(obj) => Value::Object(expand_object(obj, config)),
        Value::Query(q) => Value::Query(Box::new(Query::from_parts(
            expand(q.model(), config),
            owned_criteria(q),
            q.offset(),
            q.limit(),
        ))),
        other => other.clone(),
    }
}

fn expand_object(obj: &Object, config: &EngineConfig) -> Object {
    let mut out = obj.clone();
    if out.shape().is_none() {
        out.set_shape(Shape::new());
    }
    if out.id().is_none() {
        out.set_id(fresh_id(config));
    }
    let shape = out.shape().expect("shape just ensured present").clone();
    for prop in shape.properties() {
        let prop_shape = prop.shape.get();
        let repeatable = is_repeatable(prop_shape);
        match out.get(&prop.name).cloned() {
            None => {
                let default = default_model_value(prop_shape, repeatable, config);
                if !default.is_nil() {
                    out.set(prop.name.clone(), default);
                }
            }
            Some(Value::Array(items))
                if items.is_empty() && prop_shape.datatype() == Some(Datatype::Text) =>
            {
                out.set(
                    prop.name.clone(),
                    Value::array([wildcard_text(config)]),
                );
            }
            Some(existing) => out.set(prop.name.clone(), expand(&existing, config)),
        }
    }
    let nil_fields: Vec<String> = out
        .iter()
        .filter(|(_, v)| v.is_nil())
        .map(|(name, _)| name.to_string())
        .collect();
    for name in nil_fields {
        out.remove(&name);
    }
    out
}

/// A property with no upper bound, or an upper bound greater than one, is
/// multi-valued (§4.F "multiple-cardinality ⇒ array-wrapped").
fn is_repeatable(shape: &Shape) -> bool {
    shape.max_count_limit().map_or(true, |max| max > 1)
}

fn wildcard_text(config: &EngineConfig) -> Value {
    Value::Text(Text::new(config.wildcard_locale.clone(), String::new()))
}

fn fresh_id(config: &EngineConfig) -> Uri {
    Uri::new(format!("{}{}", config.base_uri, uuid::Uuid::new_v4()))
}

/// The property's default model value (§4.F): object datatype yields a
/// fresh object carrying the property's nested shape and a fresh `@id`;
/// Text yields the wildcard marker; anything else has no canonical
/// "empty" witness and is left absent (`Nil`, dropped by the caller).
fn default_model_value(prop_shape: &Shape, repeatable: bool, config: &EngineConfig) -> Value {
    let single = match prop_shape.datatype() {
        Some(Datatype::Object) => {
            let mut inner = Object::new();
            inner.set_shape(prop_shape.clone());
            inner.set_id(fresh_id(config));
            Value::Object(inner)
        }
        Some(Datatype::Text) => wildcard_text(config),
        _ => Value::Nil,
    };
    if single.is_nil() {
        return Value::Nil;
    }
    if repeatable { Value::array([single]) } else { single }
}

/// Overlay `y` onto `x` under the type-aware rules of §4.F. `Specs` values
/// in `x` are carriers of projection intent and are never overridden;
/// `Nil` on the `y` side is treated as populate's identity (matches the
/// array-padding rule and keeps `populate(x, Nil) = x` true everywhere,
/// not just inside array padding).
pub fn populate(x: Value, y: Value, config: &EngineConfig) -> Result<Value, ShapeError> {
    if matches!(x, Value::Specs(_)) {
        return Ok(x);
    }
    if y.is_nil() {
        return Ok(x);
    }
    match x {
        Value::Query(qx) => populate_from_query(*qx, y, config),
        Value::Object(ox) => match y {
            Value::Object(oy) => Ok(Value::Object(populate_objects(&ox, &oy, config)?)),
            Value::Query(qy) => wrap_query(Value::Object(ox), *qy, config),
            other => Ok(other),
        },
        Value::Array(xs) => match y {
            Value::Array(ys) => Ok(Value::Array(populate_array_pairwise(xs, ys, config)?)),
            Value::Query(qy) => wrap_query(Value::Array(xs), *qy, config),
            other => match xs.into_iter().next() {
                Some(first) => populate(first, other, config),
                None => Ok(other),
            },
        },
        _ => Ok(y),
    }
}

/// Object×Query / Array×Query (§4.F "wrap"): the new model is `populate(x,
/// y.model)` (or `populate(first of x, y.model)` for an array), the rest of
/// `y`'s query metadata passes through unchanged.
fn wrap_query(x: Value, qy: Query, config: &EngineConfig) -> Result<Value, ShapeError> {
    let base = match x {
        Value::Array(items) => items.into_iter().next().unwrap_or(Value::Nil),
        other => other,
    };
    let model = populate(base, qy.model().clone(), config)?;
    Ok(wrap_as_query(model, owned_criteria(&qy), qy.offset(), qy.limit()))
}

fn wrap_as_query(model: Value, criteria: IndexMap<Expression, Criterion>, offset: i64, limit: i64) -> Value {
    Value::Query(Box::new(Query::from_parts(model, criteria, offset, limit)))
}

fn owned_criteria(q: &Query) -> IndexMap<Expression, Criterion> {
    q.criteria().map(|(e, c)| (e.clone(), c.clone())).collect()
}

/// Query row (§4.F): dispatches on `y`'s type. A Literal `y` drops the
/// query wrapper entirely (`populate(x.model, y)`); Object/Array `y` keep
/// `qx`'s criteria/offset/limit and only populate the model; Query×Query
/// merges models (via `Value::merge`, not `populate`) and criteria
/// pointwise, keeps `qx`'s offset, and takes the smaller of two non-zero
/// limits (0 means unlimited).
fn populate_from_query(qx: Query, y: Value, config: &EngineConfig) -> Result<Value, ShapeError> {
    match y {
        Value::Object(_) => {
            let model = populate(qx.model().clone(), y, config)?;
            Ok(wrap_as_query(model, owned_criteria(&qx), qx.offset(), qx.limit()))
        }
        Value::Array(items) => {
            let first = items.into_iter().next().unwrap_or(Value::Nil);
            let model = populate(qx.model().clone(), first, config)?;
            Ok(wrap_as_query(model, owned_criteria(&qx), qx.offset(), qx.limit()))
        }
        Value::Query(qy) => {
            let model = qx.model().clone().merge(qy.model().clone())?;
            let criteria = merge_criteria(owned_criteria(&qx), owned_criteria(&qy))?;
            let limit = min_nonzero(qx.limit(), qy.limit());
            Ok(wrap_as_query(model, criteria, qx.offset(), limit))
        }
        literal => populate(qx.model().clone(), literal, config),
    }
}

fn min_nonzero(a: i64, b: i64) -> i64 {
    match (a, b) {
        (0, 0) => 0,
        (0, n) | (n, 0) => n,
        (a, b) => a.min(b),
    }
}

fn merge_criteria(
    x: IndexMap<Expression, Criterion>,
    y: IndexMap<Expression, Criterion>,
) -> Result<IndexMap<Expression, Criterion>, ShapeError> {
    let mut merged = x;
    for (expr, y_crit) in y {
        match merged.entry(expr) {
            Entry::Occupied(mut slot) => {
                let combined = std::mem::take(slot.get_mut())
                    .merge(y_crit)
                    .map_err(compare_err_to_shape_err)?;
                *slot.get_mut() = combined;
            }
            Entry::Vacant(slot) => {
                slot.insert(y_crit);
            }
        }
    }
    Ok(merged)
}

fn compare_err_to_shape_err(err: CompareError) -> ShapeError {
    match err {
        CompareError::Incomparable(_) => ShapeError::IncompatibleDatatypes {
            op: "populate criteria merge",
            left: Datatype::Array,
            right: Datatype::Array,
        },
        CompareError::Incompatible { left, right } => {
            ShapeError::IncompatibleDatatypes { op: "populate criteria merge", left, right }
        }
    }
}

/// Object×Object (§4.F): result keys are exactly `x`'s keys. A key present
/// in both is recursively populated; a key `y` lacks falls back to the
/// property's shape-derived default (re-synthesised the same way `expand`
/// would) when one exists, else `x`'s original value is kept untouched.
/// Reserved fields follow `Value::merge`'s rule: `@id`/`@type` — `y` wins;
/// `@shape` — the two shapes merge.
fn populate_objects(x: &Object, y: &Object, config: &EngineConfig) -> Result<Object, ShapeError> {
    let mut out = Object::new();
    for reserved in [crate::value::FIELD_ID, crate::value::FIELD_TYPE] {
        match (x.get(reserved), y.get(reserved)) {
            (_, Some(yv)) => out.set(reserved, yv.clone()),
            (Some(xv), None) => out.set(reserved, xv.clone()),
            (None, None) => {}
        }
    }
    match (x.shape().cloned(), y.shape().cloned()) {
        (Some(xs), Some(ys)) => out.set_shape(xs.merge(ys)?),
        (Some(xs), None) => out.set_shape(xs),
        (None, Some(ys)) => out.set_shape(ys),
        (None, None) => {}
    }
    let shape = out.shape().cloned();
    for (name, xv) in x.properties() {
        let value = match y.get(name) {
            Some(yv) => populate(xv.clone(), yv.clone(), config)?,
            None => {
                let default = shape.as_ref().and_then(|s| s.property(name)).map(|prop| {
                    default_model_value(prop.shape.get(), is_repeatable(prop.shape.get()), config)
                });
                match default {
                    Some(default) if !default.is_nil() => default,
                    _ => xv.clone(),
                }
            }
        };
        out.set(name.to_string(), value);
    }
    Ok(out)
}

/// Array×Array (§4.F): pairwise populate, positionally; the shorter side
/// is padded with `Nil`, which `populate` treats as identity. `Text`/`Data`
/// arrays instead match by key (locale / datatype URI) per §4.F's special
/// rule.
fn populate_array_pairwise(
    xs: Vec<Value>,
    ys: Vec<Value>,
    config: &EngineConfig,
) -> Result<Vec<Value>, ShapeError> {
    if is_all(&xs, is_text) && is_all(&ys, is_text) {
        return Ok(populate_text_array(&xs, &ys));
    }
    if is_all(&xs, is_data) && is_all(&ys, is_data) {
        return Ok(populate_data_array(&xs, &ys));
    }
    let len = xs.len().max(ys.len());
    let mut out = Vec::with_capacity(len);
    for i in 0..len {
        let xv = xs.get(i).cloned().unwrap_or(Value::Nil);
        let yv = ys.get(i).cloned().unwrap_or(Value::Nil);
        out.push(populate(xv, yv, config)?);
    }
    Ok(out)
}

fn is_text(v: &Value) -> bool {
    matches!(v, Value::Text(_))
}

fn is_data(v: &Value) -> bool {
    matches!(v, Value::Data(_))
}

fn is_all(items: &[Value], pred: impl Fn(&Value) -> bool) -> bool {
    !items.is_empty() && items.iter().all(pred)
}

/// Key-matched `Text` populate (§4.F): `x`'s concrete locales are
/// overridden by the matching `y` locale, falling back to `y`'s wildcard
/// entry when no exact match exists; `y` locales not covered by any
/// concrete `x` entry are broadcast against `x`'s wildcard template, if it
/// has one, introducing a new entry keyed on `y`'s locale.
fn populate_text_array(xs: &[Value], ys: &[Value]) -> Vec<Value> {
    let text = |v: &Value| if let Value::Text(t) = v { Some(t) } else { None };
    let y_wildcard = ys.iter().find_map(|v| text(v).filter(|t| t.is_wildcard()));
    let x_wildcard = xs.iter().find_map(|v| text(v).filter(|t| t.is_wildcard()));
    let mut out = Vec::new();
    let mut covered = std::collections::HashSet::new();
    for xv in xs {
        let Some(tx) = text(xv) else {
            out.push(xv.clone());
            continue;
        };
        if tx.is_wildcard() {
            continue;
        }
        let matched = ys.iter().find_map(|yv| text(yv).filter(|t| t.locale == tx.locale)).or(y_wildcard);
        match matched {
            Some(ty) => {
                covered.insert(tx.locale.clone());
                out.push(Value::Text(Text::new(tx.locale.clone(), ty.value.clone())));
            }
            None => out.push(xv.clone()),
        }
    }
    if x_wildcard.is_some() {
        for ty in ys.iter().filter_map(text) {
            if !ty.is_wildcard() && !covered.contains(&ty.locale) {
                out.push(Value::Text(Text::new(ty.locale.clone(), ty.value.clone())));
            }
        }
    }
    out
}

/// Key-matched `Data` populate (§4.F), keyed on the datatype URI instead
/// of a locale; a `Data` entry whose datatype URI is the wildcard locale
/// string acts as the wildcard key, mirroring `Text`'s rule.
fn populate_data_array(xs: &[Value], ys: &[Value]) -> Vec<Value> {
    let data = |v: &Value| if let Value::Data(d) = v { Some(d) } else { None };
    let is_wildcard_key = |d: &Data| d.datatype.as_str() == crate::value::WILDCARD_LOCALE;
    let y_wildcard = ys.iter().find_map(|v| data(v).filter(|d| is_wildcard_key(d)));
    let x_wildcard = xs.iter().find_map(|v| data(v).filter(|d| is_wildcard_key(d)));
    let mut out = Vec::new();
    let mut covered = std::collections::HashSet::new();
    for xv in xs {
        let Some(dx) = data(xv) else {
            out.push(xv.clone());
            continue;
        };
        if is_wildcard_key(dx) {
            continue;
        }
        let matched = ys
            .iter()
            .find_map(|yv| data(yv).filter(|d| d.datatype == dx.datatype))
            .or(y_wildcard);
        match matched {
            Some(dy) => {
                covered.insert(dx.datatype.clone());
                out.push(Value::Data(Data { datatype: dx.datatype.clone(), lexical: dy.lexical.clone() }));
            }
            None => out.push(xv.clone()),
        }
    }
    if x_wildcard.is_some() {
        for dy in ys.iter().filter_map(data) {
            if !is_wildcard_key(dy) && !covered.contains(&dy.datatype) {
                out.push(Value::Data(Data { datatype: dy.datatype.clone(), lexical: dy.lexical.clone() }));
            }
        }
    }
    out
}
