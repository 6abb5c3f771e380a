//! Expression evaluation against a single document.
//!
//! Missing fields evaluate to `null`. A comparison with `null` on either side
//! is false, and `NOT null` is false too, so filters never match documents
//! that lack the fields they test. Use `IS NULL` to find those.

use super::ast::{BinaryOp, Expr, Function};
use super::parser::negate_number;
use crate::document::{type_name, Document};
use crate::error::{Error, Result};
use serde_json::{Map, Value};
use std::cmp::Ordering;

/// Evaluate an expression. `doc` is `None` where no document is in scope,
/// e.g. the values of an `INSERT`.
pub fn evaluate(expr: &Expr, doc: Option<&Document>, params: &Map<String, Value>) -> Result<Value> {
    match expr {
        Expr::Literal(value) => Ok(value.clone()),
        Expr::Param(name) => params
            .get(name)
            .cloned()
            .ok_or_else(|| Error::MissingParameter(name.clone())),
        Expr::Path(path) => Ok(doc.map(|d| d.get_path(path)).unwrap_or(Value::Null)),
        Expr::Object(entries) => {
            let mut object = Map::new();
            for (key, value) in entries {
                object.insert(key.clone(), evaluate(value, doc, params)?);
            }
            Ok(Value::Object(object))
        }
        Expr::Array(items) => items
            .iter()
            .map(|item| evaluate(item, doc, params))
            .collect::<Result<Vec<_>>>()
            .map(Value::Array),
        Expr::Not(inner) => match evaluate(inner, doc, params)? {
            Value::Bool(b) => Ok(Value::Bool(!b)),
            Value::Null => Ok(Value::Bool(false)),
            other => Err(Error::Type(format!(
                "NOT expects a boolean, got {}",
                type_name(&other)
            ))),
        },
        Expr::Negate(inner) => match evaluate(inner, doc, params)? {
            Value::Number(n) => negate_number(&n)
                .ok_or_else(|| Error::Type("numeric overflow in negation".into())),
            Value::Null => Ok(Value::Null),
            other => Err(Error::Type(format!(
                "cannot negate {}",
                type_name(&other)
            ))),
        },
        Expr::IsNull { expr, negated } => {
            let is_null = evaluate(expr, doc, params)?.is_null();
            Ok(Value::Bool(is_null != *negated))
        }
        Expr::Binary { op, left, right } => binary(*op, left, right, doc, params),
        Expr::Call { function, args } => {
            let args = args
                .iter()
                .map(|arg| evaluate(arg, doc, params))
                .collect::<Result<Vec<_>>>()?;
            call(*function, &args)
        }
    }
}

/// True only when the filter evaluates to boolean `true`.
pub fn matches(filter: &Expr, doc: &Document, params: &Map<String, Value>) -> Result<bool> {
    Ok(evaluate(filter, Some(doc), params)? == Value::Bool(true))
}

fn binary(
    op: BinaryOp,
    left: &Expr,
    right: &Expr,
    doc: Option<&Document>,
    params: &Map<String, Value>,
) -> Result<Value> {
    match op {
        BinaryOp::And => {
            if !truthy(&evaluate(left, doc, params)?, "AND")? {
                return Ok(Value::Bool(false));
            }
            Ok(Value::Bool(truthy(&evaluate(right, doc, params)?, "AND")?))
        }
        BinaryOp::Or => {
            if truthy(&evaluate(left, doc, params)?, "OR")? {
                return Ok(Value::Bool(true));
            }
            Ok(Value::Bool(truthy(&evaluate(right, doc, params)?, "OR")?))
        }
        _ => {
            let left = evaluate(left, doc, params)?;
            let right = evaluate(right, doc, params)?;
            Ok(Value::Bool(compare(op, &left, &right)))
        }
    }
}

fn truthy(value: &Value, operator: &str) -> Result<bool> {
    match value {
        Value::Bool(b) => Ok(*b),
        Value::Null => Ok(false),
        other => Err(Error::Type(format!(
            "{} expects booleans, got {}",
            operator,
            type_name(other)
        ))),
    }
}

fn compare(op: BinaryOp, left: &Value, right: &Value) -> bool {
    if left.is_null() || right.is_null() {
        return false;
    }
    match op {
        BinaryOp::Eq => values_equal(left, right),
        BinaryOp::NotEq => !values_equal(left, right),
        _ => {
            let ordering = match (left, right) {
                (Value::Number(a), Value::Number(b)) => as_f64(a).partial_cmp(&as_f64(b)),
                (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
                (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
                _ => None,
            };
            match ordering {
                Some(ordering) => match op {
                    BinaryOp::Lt => ordering == Ordering::Less,
                    BinaryOp::Le => ordering != Ordering::Greater,
                    BinaryOp::Gt => ordering == Ordering::Greater,
                    BinaryOp::Ge => ordering != Ordering::Less,
                    _ => false,
                },
                None => false,
            }
        }
    }
}

/// Equality where `1` and `1.0` are the same number.
pub fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => as_f64(a) == as_f64(b),
        (Value::Array(a), Value::Array(b)) => {
            a.len() == b.len() && a.iter().zip(b).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(a), Value::Object(b)) => {
            a.len() == b.len()
                && a.iter()
                    .all(|(k, v)| b.get(k).is_some_and(|other| values_equal(v, other)))
        }
        _ => left == right,
    }
}

/// Total order used by `ORDER BY`:
/// null < booleans < numbers < strings < arrays < objects.
pub fn compare_values(left: &Value, right: &Value) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Null => 0,
            Value::Bool(_) => 1,
            Value::Number(_) => 2,
            Value::String(_) => 3,
            Value::Array(_) => 4,
            Value::Object(_) => 5,
        }
    }

    match (left, right) {
        (Value::Bool(a), Value::Bool(b)) => a.cmp(b),
        (Value::Number(a), Value::Number(b)) => as_f64(a).total_cmp(&as_f64(b)),
        (Value::String(a), Value::String(b)) => a.cmp(b),
        (Value::Array(a), Value::Array(b)) => a
            .iter()
            .zip(b)
            .map(|(x, y)| compare_values(x, y))
            .find(|o| *o != Ordering::Equal)
            .unwrap_or_else(|| a.len().cmp(&b.len())),
        (Value::Object(a), Value::Object(b)) => a.len().cmp(&b.len()),
        _ => rank(left).cmp(&rank(right)),
    }
}

fn as_f64(n: &serde_json::Number) -> f64 {
    n.as_f64().unwrap_or(f64::NAN)
}

fn call(function: Function, args: &[Value]) -> Result<Value> {
    if args.iter().any(Value::is_null) {
        return Ok(Value::Null);
    }

    match (function, args) {
        (Function::Contains, [Value::String(haystack), Value::String(needle)]) => {
            Ok(Value::Bool(haystack.contains(needle.as_str())))
        }
        (Function::Contains, [Value::Array(items), needle]) => {
            Ok(Value::Bool(items.iter().any(|item| values_equal(item, needle))))
        }
        (Function::StartsWith, [Value::String(s), Value::String(prefix)]) => {
            Ok(Value::Bool(s.starts_with(prefix.as_str())))
        }
        (Function::EndsWith, [Value::String(s), Value::String(suffix)]) => {
            Ok(Value::Bool(s.ends_with(suffix.as_str())))
        }
        (Function::Lower, [Value::String(s)]) => Ok(Value::String(s.to_lowercase())),
        (Function::Upper, [Value::String(s)]) => Ok(Value::String(s.to_uppercase())),
        (Function::Length, [Value::String(s)]) => Ok(Value::from(s.chars().count())),
        (Function::Length, [Value::Array(items)]) => Ok(Value::from(items.len())),
        (Function::Length, [Value::Object(map)]) => Ok(Value::from(map.len())),
        _ => Err(Error::InvalidArguments(format!(
            "{}() does not accept ({})",
            function.name(),
            args.iter().map(type_name).collect::<Vec<_>>().join(", ")
        ))),
    }
}
