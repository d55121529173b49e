//! Evaluation of document filters against JSON documents.

use serde_json::Value;

use super::{Document, StoreError, StoreResult};

/// Resolves a dot-separated path inside a document.
pub fn lookup_path<'a>(document: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;
    for segment in segments {
        current = current.as_object()?.get(segment)?;
    }
    Some(current)
}

/// Returns true if `document` satisfies `filter`.
///
/// Supported forms: `$and`, `$or`, `{field: value}` and the field operators
/// `$eq`, `$ne`, `$in`, `$nin`. Equality against an array field matches when
/// any element is equal, and a `null` target also matches a missing field.
///
/// # Errors
///
/// Returns `StoreError::InvalidFilter` for anything else.
pub fn matches(document: &Document, filter: &Value) -> StoreResult<bool> {
    let Value::Object(clauses) = filter else {
        return Err(StoreError::InvalidFilter(format!(
            "expected an object, got {filter}"
        )));
    };

    for (key, condition) in clauses {
        let matched = match key.as_str() {
            "$and" => {
                let mut all = true;
                for child in as_clause_list(key, condition)? {
                    if !matches(document, child)? {
                        all = false;
                        break;
                    }
                }
                all
            }
            "$or" => {
                let mut any = false;
                for child in as_clause_list(key, condition)? {
                    if matches(document, child)? {
                        any = true;
                        break;
                    }
                }
                any
            }
            op if op.starts_with('$') => {
                return Err(StoreError::InvalidFilter(format!(
                    "unsupported top-level operator '{op}'"
                )))
            }
            field => field_matches(lookup_path(document, field), condition)?,
        };

        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn as_clause_list<'a>(op: &str, value: &'a Value) -> StoreResult<&'a [Value]> {
    match value {
        Value::Array(children) if !children.is_empty() => Ok(children),
        _ => Err(StoreError::InvalidFilter(format!(
            "'{op}' expects a non-empty array"
        ))),
    }
}

fn field_matches(actual: Option<&Value>, condition: &Value) -> StoreResult<bool> {
    let operators = match condition {
        Value::Object(map) if !map.is_empty() && map.keys().all(|k| k.starts_with('$')) => map,
        _ => return Ok(equals(actual, condition)),
    };

    for (op, operand) in operators {
        let matched = match op.as_str() {
            "$eq" => equals(actual, operand),
            "$ne" => !equals(actual, operand),
            "$in" => in_list(actual, op, operand)?,
            "$nin" => !in_list(actual, op, operand)?,
            other => {
                return Err(StoreError::InvalidFilter(format!(
                    "unsupported field operator '{other}'"
                )))
            }
        };
        if !matched {
            return Ok(false);
        }
    }
    Ok(true)
}

fn in_list(actual: Option<&Value>, op: &str, operand: &Value) -> StoreResult<bool> {
    let Value::Array(candidates) = operand else {
        return Err(StoreError::InvalidFilter(format!("'{op}' expects an array")));
    };
    Ok(candidates.iter().any(|candidate| equals(actual, candidate)))
}

fn equals(actual: Option<&Value>, target: &Value) -> bool {
    match actual {
        None => target.is_null(),
        Some(Value::Array(items)) if !target.is_array() => {
            items.iter().any(|item| scalar_equals(item, target))
        }
        Some(value) => scalar_equals(value, target),
    }
}

fn scalar_equals(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => x.as_f64() == y.as_f64(),
        _ => a == b,
    }
}
