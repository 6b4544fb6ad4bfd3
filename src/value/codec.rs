//! Per-datatype `encode`/`decode` between [`Value`] and its canonical
//! string form (§4.A, §6). URI encoding/decoding relativises against a
//! caller-supplied base; every other datatype's canonical form is
//! base-independent.

use std::str::FromStr;

use bigdecimal::BigDecimal;
use num_bigint::BigInt;

use crate::error::ParseError;
use crate::value::{Data, Datatype, Text, Uri, Value, WILDCARD_LOCALE, temporal};

/// Render `value` in its canonical string form (§6 "Value codec").
pub fn encode(value: &Value, base: &str) -> String {
    match value {
        Value::Nil => "null".to_string(),
        Value::Bit(b) => b.to_string(),
        Value::Integral(i) => i.to_string(),
        Value::Integer(i) => i.to_string(),
        Value::Decimal(d) => {
            let s = d.to_string();
            if s.contains('.') { s } else { format!("{s}.0") }
        }
        Value::Floating(f) => encode_float(*f),
        Value::String(s) => s.clone(),
        Value::Uri(u) => u.relativize(base).0,
        Value::Year(y) => y.to_string(),
        Value::YearMonth(ym) => ym.to_string(),
        Value::LocalDate(d) => d.to_string(),
        Value::LocalTime(t) => t.to_string(),
        Value::OffsetTime(t) => t.to_string(),
        Value::LocalDateTime(t) => t.to_string(),
        Value::OffsetDateTime(t) => t.to_string(),
        Value::ZonedDateTime(t) => t.to_string(),
        Value::Instant(t) => t.to_string(),
        Value::Period(p) => p.to_string(),
        Value::Duration(d) => d.to_string(),
        Value::Text(t) => {
            if t.locale.is_empty() || t.locale.eq_ignore_ascii_case("root") {
                t.value.clone()
            } else {
                format!("{}@{}", t.value, t.locale)
            }
        }
        Value::Data(d) => format!("{}^^{}", d.lexical, Uri(d.datatype.0.clone()).relativize(base)),
        Value::Array(_) | Value::Table(_) | Value::Tuple(_) | Value::Query(_) | Value::Specs(_) => {
            String::new()
        }
        Value::Object(obj) => {
            if obj.is_empty() {
                "''".to_string()
            } else if let (Some(id), 1) = (obj.id(), obj.len()) {
                id.relativize(base).0
            } else {
                String::new()
            }
        }
        Value::Shape(_) => String::new(),
    }
}

fn encode_float(f: f64) -> String {
    format!("{f:e}")
}

/// Parse `literal` as `datatype`, raising [`ParseError::MalformedLiteral`]
/// naming the datatype and offending literal on failure (§4.H).
pub fn decode(literal: &str, datatype: Datatype, base: &str) -> Result<Value, ParseError> {
    let err = || ParseError::MalformedLiteral {
        literal: literal.to_string(),
        datatype,
    };
    match datatype {
        Datatype::Nil => Ok(Value::Nil),
        Datatype::Bit => match literal {
            "true" => Ok(Value::Bit(true)),
            "false" => Ok(Value::Bit(false)),
            _ => Err(err()),
        },
        Datatype::Number => decode_number(literal).ok_or_else(err),
        Datatype::String => Ok(Value::String(literal.to_string())),
        Datatype::Uri => Ok(Value::Uri(Uri::new(literal).resolve(base))),
        Datatype::Temporal => decode_temporal(literal).ok_or_else(err),
        Datatype::TemporalAmount => decode_temporal_amount(literal).ok_or_else(err),
        Datatype::Text => Ok(decode_text(literal)),
        Datatype::Data => decode_data(literal, base).ok_or_else(err),
        Datatype::Array | Datatype::Object | Datatype::Table | Datatype::Tuple
        | Datatype::Query | Datatype::Specs => Err(err()),
    }
}

fn decode_number(literal: &str) -> Option<Value> {
    if let Ok(i) = literal.parse::<i64>() {
        return Some(Value::Integral(i));
    }
    if let Ok(i) = BigInt::from_str(literal) {
        return Some(Value::Integer(i));
    }
    if literal.contains(['e', 'E']) && !literal.contains('.') {
        return literal.parse::<f64>().ok().map(Value::Floating);
    }
    if let Ok(d) = BigDecimal::from_str(literal) {
        return Some(Value::Decimal(d));
    }
    literal.parse::<f64>().ok().map(Value::Floating)
}

/// Attempts each of the nine temporal formats in order from most to least
/// specific, so e.g. a bare year is not mistaken for a year-month.
fn decode_temporal(literal: &str) -> Option<Value> {
    if literal.ends_with('Z') {
        if let Ok(v) = temporal::Instant::parse(literal) {
            return Some(Value::Instant(v));
        }
    }
    if literal.contains('[') {
        if let Ok(v) = temporal::ZonedDateTime::parse(literal) {
            return Some(Value::ZonedDateTime(v));
        }
    }
    if literal.contains('T') {
        if let Ok(v) = temporal::OffsetDateTime::parse(literal) {
            return Some(Value::OffsetDateTime(v));
        }
        if let Ok(v) = temporal::LocalDateTime::parse(literal) {
            return Some(Value::LocalDateTime(v));
        }
    }
    if literal.matches('-').count() == 2 && !literal.contains(':') {
        if let Ok(v) = temporal::LocalDate::parse(literal) {
            return Some(Value::LocalDate(v));
        }
    }
    if literal.contains(':') {
        if let Ok(v) = temporal::OffsetTime::parse(literal) {
            return Some(Value::OffsetTime(v));
        }
        if let Ok(v) = temporal::LocalTime::parse(literal) {
            return Some(Value::LocalTime(v));
        }
    }
    if literal.matches('-').count() == 1 {
        if let Ok(v) = temporal::YearMonth::parse(literal) {
            return Some(Value::YearMonth(v));
        }
    }
    if let Ok(v) = temporal::Year::parse(literal) {
        return Some(Value::Year(v));
    }
    None
}

fn decode_temporal_amount(literal: &str) -> Option<Value> {
    if literal.starts_with("PT") {
        temporal::Duration::parse(literal).ok().map(Value::Duration)
    } else if literal.starts_with('P') {
        temporal::Period::parse(literal).ok().map(Value::Period)
    } else {
        None
    }
}

fn decode_text(literal: &str) -> Value {
    match literal.rsplit_once('@') {
        Some((value, locale)) if !locale.is_empty() => Value::Text(Text::new(locale, value)),
        _ => Value::Text(Text::new("", literal)),
    }
}

fn decode_data(literal: &str, base: &str) -> Option<Value> {
    let (lexical, datatype) = literal.split_once("^^")?;
    Some(Value::Data(Data::new(
        Uri::new(datatype).resolve(base).0,
        lexical,
    )))
}

/// Render the wildcard locale as configured rather than the hard-coded
/// `*`, for diagnostics/UI surfaces that render a different wildcard glyph.
pub fn render_locale(locale: &str, wildcard: &str) -> String {
    if locale == WILDCARD_LOCALE { wildcard.to_string() } else { locale.to_string() }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bit_roundtrip() {
        assert_eq!(encode(&Value::Bit(true), ""), "true");
        assert_eq!(decode("true", Datatype::Bit, "").unwrap(), Value::Bit(true));
    }

    #[test]
    fn nil_roundtrip() {
        assert_eq!(encode(&Value::Nil, ""), "null");
        assert_eq!(decode("null", Datatype::Nil, "").unwrap(), Value::Nil);
    }

    #[test]
    fn decimal_always_has_a_dot() {
        let encoded = encode(&Value::Decimal(BigDecimal::from_str("10").unwrap()), "");
        assert!(encoded.contains('.'));
    }

    #[test]
    fn text_with_root_locale_renders_bare() {
        let t = Value::Text(Text::new("", "hello"));
        assert_eq!(encode(&t, ""), "hello");
    }

    #[test]
    fn text_with_locale_renders_tagged() {
        let t = Value::Text(Text::new("en", "hello"));
        assert_eq!(encode(&t, ""), "hello@en");
        assert_eq!(decode("hello@en", Datatype::Text, "").unwrap(), t);
    }

    #[test]
    fn data_roundtrip() {
        let d = Value::Data(Data::new("https://example.org/int", "42"));
        let encoded = encode(&d, "");
        assert_eq!(encoded, "42^^https://example.org/int");
        assert_eq!(decode(&encoded, Datatype::Data, "").unwrap(), d);
    }

    #[test]
    fn empty_object_encodes_as_empty_quotes() {
        assert_eq!(encode(&Value::Object(crate::value::Object::new()), ""), "''");
    }

    #[test]
    fn id_only_object_encodes_as_relativised_id() {
        let mut obj = crate::value::Object::new();
        obj.set_id(Uri::new("https://example.org/e/1"));
        assert_eq!(encode(&Value::Object(obj), ""), "https://example.org/e/1");
    }

    #[test]
    fn local_date_decodes_from_temporal_family() {
        let v = decode("2024-03-17", Datatype::Temporal, "").unwrap();
        assert_eq!(v, Value::LocalDate(temporal::LocalDate::parse("2024-03-17").unwrap()));
    }

    #[test]
    fn instant_requires_trailing_z() {
        let v = decode("2024-03-17T13:00:00Z", Datatype::Temporal, "").unwrap();
        assert_eq!(v, Value::Instant(temporal::Instant::parse("2024-03-17T13:00:00Z").unwrap()));
    }

    #[test]
    fn encode_then_decode_is_identity_for_integral() {
        let v = Value::Integral(42);
        let encoded = encode(&v, "");
        assert_eq!(decode(&encoded, Datatype::Number, "").unwrap(), v);
    }
}
