//! Selector grammar: `$`, `.name` / `['name']`, `[index]`, `*` (§4.A).
//!
//! Grounded on `estuary-flow/crates/json`'s `Pointer`/`Token` tokenizer
//! (`src/ptr.rs`), adapted from slash-separated JSON-pointer tokens to the
//! dotted, optionally-bracketed grammar the spec describes, with
//! backslash-escaping of `.`, `:`, and `\` in step names.

use crate::error::ParseError;
use crate::value::Value;

/// One parsed step of a selector.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Step {
    Root,
    Field(String),
    Index(usize),
    Wildcard,
}

fn err(selector: &str, reason: impl Into<String>) -> ParseError {
    ParseError::Selector {
        selector: selector.to_string(),
        reason: reason.into(),
    }
}

/// Select the value(s) addressed by `selector` within `root`.
pub fn select(root: &Value, selector: &str) -> Result<Value, ParseError> {
    let steps = parse(selector)?;
    apply_steps(root, &steps, selector)
}

/// Walk `steps` against `value`. A `Wildcard` step maps the *remaining*
/// steps over each element rather than resolving in place, so a wildcard
/// at any depth — not just trailing — fans out correctly (§4.A).
fn apply_steps(value: &Value, steps: &[Step], selector: &str) -> Result<Value, ParseError> {
    let Some((step, rest)) = steps.split_first() else {
        return Ok(value.clone());
    };
    if let Step::Wildcard = step {
        let elements: Vec<&Value> = match value {
            Value::Object(obj) => obj.properties().map(|(_, v)| v).collect(),
            Value::Array(items) => items.iter().collect(),
            Value::Nil => return Ok(Value::Nil),
            _ => return Err(err(selector, "'*' requires an Object or Array")),
        };
        let mapped = elements
            .into_iter()
            .map(|el| apply_steps(el, rest, selector))
            .collect::<Result<Vec<_>, _>>()?;
        return Ok(Value::array(mapped));
    }
    let next = apply_step(value, step, selector)?;
    apply_steps(&next, rest, selector)
}

fn parse(selector: &str) -> Result<Vec<Step>, ParseError> {
    let mut steps = Vec::new();
    let mut rest = selector;

    if let Some(stripped) = rest.strip_prefix('$') {
        steps.push(Step::Root);
        rest = stripped;
        rest = rest.strip_prefix('.').unwrap_or(rest);
    }

    let mut chars = rest.chars().peekable();
    let mut buf = String::new();
    let mut flush = |buf: &mut String, steps: &mut Vec<Step>| -> Result<(), ParseError> {
        if buf.is_empty() {
            return Ok(());
        }
        steps.push(token(buf, selector)?);
        buf.clear();
        Ok(())
    };

    while let Some(c) = chars.next() {
        match c {
            '\\' => {
                let escaped = chars
                    .next()
                    .ok_or_else(|| err(selector, "trailing escape character"))?;
                buf.push(escaped);
            }
            '.' => {
                flush(&mut buf, &mut steps)?;
            }
            '[' => {
                flush(&mut buf, &mut steps)?;
                let mut inner = String::new();
                let mut closed = false;
                for c2 in chars.by_ref() {
                    if c2 == ']' {
                        closed = true;
                        break;
                    }
                    inner.push(c2);
                }
                if !closed {
                    return Err(err(selector, "unterminated '['"));
                }
                steps.push(bracket_token(&inner, selector)?);
            }
            ']' => return Err(err(selector, "unmatched ']'")),
            _ => buf.push(c),
        }
    }
    flush(&mut buf, &mut steps)?;

    if steps.is_empty() {
        return Err(err(selector, "empty selector"));
    }
    Ok(steps)
}

fn token(raw: &str, selector: &str) -> Result<Step, ParseError> {
    if raw == "*" {
        return Ok(Step::Wildcard);
    }
    if raw.starts_with('@') {
        return Err(err(selector, format!("reserved field '{raw}' cannot be selected")));
    }
    Ok(Step::Field(raw.to_string()))
}

fn bracket_token(raw: &str, selector: &str) -> Result<Step, ParseError> {
    if raw == "*" {
        return Ok(Step::Wildcard);
    }
    if let Some(quoted) = raw
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .or_else(|| raw.strip_prefix('"').and_then(|s| s.strip_suffix('"')))
    {
        return token(quoted, selector);
    }
    raw.parse::<usize>()
        .map(Step::Index)
        .map_err(|_| err(selector, format!("invalid index '{raw}'")))
}

/// Resolves a non-`Wildcard` step in place; `Wildcard` is handled by
/// `apply_steps` itself since it needs the remaining step slice.
fn apply_step(value: &Value, step: &Step, _selector: &str) -> Result<Value, ParseError> {
    match step {
        Step::Root => Ok(value.clone()),
        Step::Field(name) => Ok(value.get(name)),
        Step::Index(i) => Ok(value.index(*i)),
        Step::Wildcard => unreachable!("Wildcard is special-cased in apply_steps"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::Object;

    fn sample() -> Value {
        Value::Object(
            Object::new()
                .with("name", Value::string("ada"))
                .with(
                    "tags",
                    Value::array([Value::string("x"), Value::string("y")]),
                ),
        )
    }

    #[test]
    fn dotted_field_selects_by_name() {
        assert_eq!(select(&sample(), "name").unwrap(), Value::string("ada"));
        assert_eq!(select(&sample(), "$.name").unwrap(), Value::string("ada"));
    }

    #[test]
    fn bracket_index_selects_array_element() {
        assert_eq!(select(&sample(), "tags[0]").unwrap(), Value::string("x"));
    }

    #[test]
    fn quoted_bracket_field_selects_by_name() {
        assert_eq!(select(&sample(), "['name']").unwrap(), Value::string("ada"));
    }

    #[test]
    fn bare_wildcard_selects_all_elements() {
        let all = select(&sample(), "*").unwrap();
        assert_eq!(all.as_array().unwrap().len(), 2);
    }

    #[test]
    fn wildcard_maps_remaining_selector_over_elements() {
        let mut a = Object::new();
        a.set("name", Value::string("a"));
        let mut b = Object::new();
        b.set("name", Value::string("b"));
        let root = Value::Object(
            Object::new().with("items", Value::array([Value::Object(a), Value::Object(b)])),
        );
        let names = select(&root, "items.*.name").unwrap();
        assert_eq!(
            names,
            Value::array([Value::string("a"), Value::string("b")])
        );
    }

    #[test]
    fn wildcard_over_non_matching_step_yields_nil_per_element() {
        let mut a = Object::new();
        a.set("name", Value::string("a"));
        let b = Object::new();
        let root = Value::Object(
            Object::new().with("items", Value::array([Value::Object(a), Value::Object(b)])),
        );
        let names = select(&root, "items.*.name").unwrap();
        assert_eq!(
            names,
            Value::array([Value::string("a"), Value::Nil])
        );
    }

    #[test]
    fn missing_field_yields_nil() {
        assert_eq!(select(&sample(), "missing").unwrap(), Value::Nil);
    }

    #[test]
    fn malformed_selector_is_an_error() {
        assert!(select(&sample(), "tags[").is_err());
        assert!(select(&sample(), "tags]").is_err());
    }

    #[test]
    fn escaped_dot_is_kept_literal_in_a_step_name() {
        let mut obj = Object::new();
        obj.set("a.b", Value::int(1));
        let root = Value::Object(obj);
        assert_eq!(select(&root, "a\\.b").unwrap(), Value::int(1));
    }

    #[test]
    fn reserved_step_is_rejected() {
        assert!(select(&sample(), "@id").is_err());
    }
}
