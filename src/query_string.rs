//! Parses an `&`-separated query string into a [`Query`] against a model's
//! shape (§4.H, §6 "Query string grammar").

use indexmap::IndexMap;
use percent_encoding::percent_decode_str;

use crate::config::EngineConfig;
use crate::error::ParseError;
use crate::expression::Expression;
use crate::query::{Criterion, Query};
use crate::value::{Datatype, Value, codec};

/// Parse `query` against `model`'s effective shape, producing a [`Query`]
/// with one merged `Criterion` per distinct path and offset/limit taken
/// from `@=`/`#=` pairs.
#[tracing::instrument(skip(query, model, config))]
pub fn parse(query: &str, model: Value, config: &EngineConfig) -> Result<Query, ParseError> {
    let shape = match &model {
        Value::Object(o) => o.shape().cloned(),
        Value::Specs(s) => Some(s.shape().clone()),
        _ => None,
    };
    let mut criteria: IndexMap<Expression, Criterion> = IndexMap::new();
    let mut offset: i64 = 0;
    let mut limit: i64 = 0;

    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let (label, raw_value) = split_pair(pair);
        let decoded_value = raw_value.map(decode_url);
        let value = decoded_value.as_deref();
        match label {
            "@" => offset = parse_int(pair, value)?,
            "#" => limit = parse_int(pair, value)?,
            _ if label.starts_with(['@', '#']) => {
                tracing::debug!(pair, "rejected reserved-label query-string pair");
                return Err(ParseError::ReservedLabel(label.to_string()));
            }
            _ if label.starts_with('~') => {
                let expr = Expression::parse(&label[1..])?;
                merge_fragment(&mut criteria, expr, Criterion::new().like(value.unwrap_or_default()), pair)?;
            }
            _ if label.starts_with('^') => {
                let expr = Expression::parse(&label[1..])?;
                let priority = parse_order(value);
                merge_fragment(&mut criteria, expr, Criterion::new().order(priority), pair)?;
            }
            _ if label.ends_with('<') => {
                let Some(v) = value else {
                    tracing::debug!(pair, "rejected bare '<' query-string pair");
                    return Err(ParseError::QueryString {
                        pair: pair.to_string(),
                        reason: "'<' requires a value; bare 'path<' is reserved".to_string(),
                    });
                };
                let expr = Expression::parse(&label[..label.len() - 1])?;
                let bound = decode_for(&expr, v, &shape, config)?;
                merge_fragment(&mut criteria, expr, Criterion::new().le(bound), pair)?;
            }
            _ if label.ends_with('>') => {
                let Some(v) = value else {
                    tracing::debug!(pair, "rejected bare '>' query-string pair");
                    return Err(ParseError::QueryString {
                        pair: pair.to_string(),
                        reason: "'>' requires a value; bare 'path>' is reserved".to_string(),
                    });
                };
                let expr = Expression::parse(&label[..label.len() - 1])?;
                let bound = decode_for(&expr, v, &shape, config)?;
                merge_fragment(&mut criteria, expr, Criterion::new().ge(bound), pair)?;
            }
            path => {
                let expr = Expression::parse(path)?;
                let fragment = match value {
                    None | Some("*") => Criterion::new().any(Vec::new()),
                    Some("") => Criterion::new().any(vec![Value::Nil]),
                    Some(v) => {
                        let decoded = decode_for(&expr, v, &shape, config)?;
                        Criterion::new().any(vec![decoded])
                    }
                };
                merge_fragment(&mut criteria, expr, fragment, pair)?;
            }
        }
    }

    let mut built = Query::new(model)
        .with_offset(offset)
        .map_err(|e| ParseError::QueryString { pair: query.to_string(), reason: e.to_string() })?
        .with_limit(limit)
        .map_err(|e| ParseError::QueryString { pair: query.to_string(), reason: e.to_string() })?;
    for (expr, criterion) in criteria {
        built = built
            .where_(expr, criterion)
            .map_err(|e| ParseError::QueryString { pair: query.to_string(), reason: e.to_string() })?;
    }
    Ok(built)
}

fn merge_fragment(
    criteria: &mut IndexMap<Expression, Criterion>,
    expr: Expression,
    fragment: Criterion,
    pair: &str,
) -> Result<(), ParseError> {
    match criteria.entry(expr) {
        indexmap::map::Entry::Occupied(mut slot) => {
            let merged = std::mem::take(slot.get_mut())
                .merge(fragment)
                .map_err(|e| ParseError::QueryString { pair: pair.to_string(), reason: e.to_string() })?;
            *slot.get_mut() = merged;
        }
        indexmap::map::Entry::Vacant(slot) => {
            slot.insert(fragment);
        }
    }
    Ok(())
}

/// URL-decode a value substring (§6: "values are URL-decoded and then
/// passed through the expression's target datatype's decoder").
fn decode_url(value: &str) -> String {
    percent_decode_str(value).decode_utf8_lossy().into_owned()
}

/// Splits `pair` into `(label, value)` on the first unescaped `=`.
fn split_pair(pair: &str) -> (&str, Option<&str>) {
    let mut escaped = false;
    for (i, c) in pair.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            '=' => return (&pair[..i], Some(&pair[i + 1..])),
            _ => {}
        }
    }
    (pair, None)
}

fn parse_int(pair: &str, value: Option<&str>) -> Result<i64, ParseError> {
    let v = value.ok_or_else(|| ParseError::QueryString {
        pair: pair.to_string(),
        reason: "missing integer value".to_string(),
    })?;
    v.parse::<i64>().map_err(|_| ParseError::QueryString {
        pair: pair.to_string(),
        reason: format!("'{v}' is not a valid integer"),
    })
}

/// `increasing`/absent/empty = `+1`; `decreasing` = `-1`; otherwise the
/// literal is a signed integer priority (§4.H).
fn parse_order(value: Option<&str>) -> i64 {
    match value {
        None | Some("") | Some("increasing") => 1,
        Some("decreasing") => -1,
        Some(v) => v.parse::<i64>().unwrap_or(1),
    }
}

fn decode_for(
    expr: &Expression,
    literal: &str,
    shape: &Option<crate::shape::Shape>,
    config: &EngineConfig,
) -> Result<Value, ParseError> {
    let datatype = match shape {
        Some(shape) => expr
            .apply(shape)
            .map_err(|e| ParseError::Expression { expression: expr.to_string(), reason: e.to_string() })?
            .datatype()
            .unwrap_or(Datatype::String),
        None => Datatype::String,
    };
    codec::decode(literal, datatype, &config.base_uri)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shape::{Clazz, Property};
    use crate::value::Object;

    fn config() -> EngineConfig {
        EngineConfig::default()
    }

    fn employee_model() -> Value {
        let age = Property::new("age", crate::shape::Shape::new().datatype_is(Datatype::Number).unwrap())
            .forward("ex:age")
            .build()
            .unwrap();
        let name = Property::new("name", crate::shape::Shape::new().datatype_is(Datatype::String).unwrap())
            .forward("ex:name")
            .build()
            .unwrap();
        let shape = crate::shape::Shape::new()
            .class(Clazz::new("Employee"))
            .unwrap()
            .property(age)
            .unwrap()
            .property(name)
            .unwrap();
        let mut obj = Object::new();
        obj.set_shape(shape);
        Value::Object(obj)
    }

    #[test]
    fn any_set_pair_decodes_target_datatype() {
        let q = parse("age=42", employee_model(), &config()).unwrap();
        let (_, criterion) = q.criteria().next().unwrap();
        assert_eq!(criterion.any_set(), Some(&[Value::Integral(42)][..]));
    }

    #[test]
    fn wildcard_value_is_existence_test() {
        let q = parse("age=*", employee_model(), &config()).unwrap();
        let (_, criterion) = q.criteria().next().unwrap();
        assert_eq!(criterion.any_set(), Some(&[][..]));
    }

    #[test]
    fn empty_value_is_nil_member() {
        let q = parse("age=", employee_model(), &config()).unwrap();
        let (_, criterion) = q.criteria().next().unwrap();
        assert_eq!(criterion.any_set(), Some(&[Value::Nil][..]));
    }

    #[test]
    fn range_pairs_merge_into_one_criterion() {
        let q = parse("age>=18&age<=65", employee_model(), &config()).unwrap();
        assert_eq!(q.criteria().count(), 1);
        let (_, criterion) = q.criteria().next().unwrap();
        assert_eq!(criterion.ge_bound(), Some(&Value::Integral(18)));
        assert_eq!(criterion.le_bound(), Some(&Value::Integral(65)));
    }

    #[test]
    fn bare_range_label_without_value_is_reserved_error() {
        assert!(parse("age<", employee_model(), &config()).is_err());
    }

    #[test]
    fn like_and_order_and_pagination() {
        let q = parse("~name=Jo&^name=decreasing&@=5&#=10", employee_model(), &config()).unwrap();
        assert_eq!(q.offset(), 5);
        assert_eq!(q.limit(), 10);
        let (_, criterion) = q.criteria().next().unwrap();
        assert_eq!(criterion.like_pattern(), Some("Jo"));
        assert_eq!(criterion.order_priority(), Some(-1));
    }

    #[test]
    fn reserved_at_prefixed_label_is_rejected() {
        assert!(matches!(
            parse("@foo=1", employee_model(), &config()),
            Err(ParseError::ReservedLabel(_))
        ));
    }
}
