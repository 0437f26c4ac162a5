//! Evaluator for the expression sublanguage.
//!
//! Evaluation is total and bounded: every expression accepted by the parser
//! evaluates in a number of steps linear in its size, and a hard operation
//! ceiling (`MAX_OPS`) stands in for the 10ms CPU budget from the spec
//! without depending on wall-clock timing in tests.

use std::collections::HashMap;

use serde_json::Value;

use super::ast::{BinaryOp, Expr, PathSegment, UnaryOp};
use super::error::ExprError;

/// Upper bound on evaluation steps for a single `eval` call.
const MAX_OPS: usize = 10_000;

/// The variables an expression may reference: `inputs`, `vars`, `globals`,
/// and `node[<id>].outputs`.
#[derive(Debug, Clone)]
pub struct Scope<'a> {
    pub inputs: &'a Value,
    pub vars: &'a HashMap<String, Value>,
    pub globals: &'a Value,
    pub node_outputs: &'a HashMap<String, Value>,
}

struct Budget {
    remaining: usize,
}

impl Budget {
    fn tick(&mut self) -> Result<(), ExprError> {
        if self.remaining == 0 {
            return Err(ExprError::BudgetExceeded(MAX_OPS));
        }
        self.remaining -= 1;
        Ok(())
    }
}

/// Evaluate `expr` against `scope`, returning a JSON scalar/array/object.
pub fn eval(expr: &Expr, scope: &Scope) -> Result<Value, ExprError> {
    let mut budget = Budget { remaining: MAX_OPS };
    eval_inner(expr, scope, &mut budget)
}

fn eval_inner(expr: &Expr, scope: &Scope, budget: &mut Budget) -> Result<Value, ExprError> {
    budget.tick()?;
    match expr {
        Expr::Null => Ok(Value::Null),
        Expr::Bool(b) => Ok(Value::Bool(*b)),
        Expr::Number(n) => Ok(serde_json::json!(*n)),
        Expr::Str(s) => Ok(Value::String(s.clone())),
        Expr::Path(segments) => resolve_path(segments, scope),
        Expr::Unary(op, inner) => {
            let v = eval_inner(inner, scope, budget)?;
            match op {
                UnaryOp::Not => Ok(Value::Bool(!truthy(&v))),
                UnaryOp::Neg => {
                    let n = as_number(&v)?;
                    Ok(serde_json::json!(-n))
                }
            }
        }
        Expr::Len(inner) => {
            let v = eval_inner(inner, scope, budget)?;
            let len = match &v {
                Value::String(s) => s.chars().count(),
                Value::Array(a) => a.len(),
                Value::Object(o) => o.len(),
                Value::Null => 0,
                other => {
                    return Err(ExprError::Type(format!(
                        "len() is not defined for {other:?}"
                    )))
                }
            };
            Ok(serde_json::json!(len as f64))
        }
        Expr::IsNull(inner) => {
            let v = eval_inner(inner, scope, budget)?;
            Ok(Value::Bool(v.is_null()))
        }
        Expr::Binary(op, lhs, rhs) => eval_binary(*op, lhs, rhs, scope, budget),
    }
}

fn eval_binary(
    op: BinaryOp,
    lhs: &Expr,
    rhs: &Expr,
    scope: &Scope,
    budget: &mut Budget,
) -> Result<Value, ExprError> {
    // Short-circuit boolean connectives.
    match op {
        BinaryOp::And => {
            let l = eval_inner(lhs, scope, budget)?;
            if !truthy(&l) {
                return Ok(Value::Bool(false));
            }
            let r = eval_inner(rhs, scope, budget)?;
            return Ok(Value::Bool(truthy(&r)));
        }
        BinaryOp::Or => {
            let l = eval_inner(lhs, scope, budget)?;
            if truthy(&l) {
                return Ok(Value::Bool(true));
            }
            let r = eval_inner(rhs, scope, budget)?;
            return Ok(Value::Bool(truthy(&r)));
        }
        _ => {}
    }

    let l = eval_inner(lhs, scope, budget)?;
    let r = eval_inner(rhs, scope, budget)?;

    match op {
        BinaryOp::Add => Ok(serde_json::json!(as_number(&l)? + as_number(&r)?)),
        BinaryOp::Sub => Ok(serde_json::json!(as_number(&l)? - as_number(&r)?)),
        BinaryOp::Mul => Ok(serde_json::json!(as_number(&l)? * as_number(&r)?)),
        BinaryOp::Div => {
            let divisor = as_number(&r)?;
            if divisor == 0.0 {
                return Err(ExprError::Type("division by zero".into()));
            }
            Ok(serde_json::json!(as_number(&l)? / divisor))
        }
        BinaryOp::Eq => Ok(Value::Bool(values_equal(&l, &r))),
        BinaryOp::Ne => Ok(Value::Bool(!values_equal(&l, &r))),
        BinaryOp::Lt => Ok(Value::Bool(compare(&l, &r)? == std::cmp::Ordering::Less)),
        BinaryOp::Le => Ok(Value::Bool(compare(&l, &r)? != std::cmp::Ordering::Greater)),
        BinaryOp::Gt => Ok(Value::Bool(compare(&l, &r)? == std::cmp::Ordering::Greater)),
        BinaryOp::Ge => Ok(Value::Bool(compare(&l, &r)? != std::cmp::Ordering::Less)),
        BinaryOp::And | BinaryOp::Or => unreachable!("handled above"),
    }
}

fn resolve_path(segments: &[PathSegment], scope: &Scope) -> Result<Value, ExprError> {
    let (head, rest) = segments.split_first().expect("path has at least one segment");
    let head_name = match head {
        PathSegment::Field(name) => name.as_str(),
        PathSegment::Index(name) => name.as_str(),
    };

    let mut current = match head_name {
        "inputs" => scope.inputs.clone(),
        "globals" => scope.globals.clone(),
        "vars" => {
            let Some((first, rest2)) = rest.split_first() else {
                return Ok(Value::Object(
                    scope.vars.iter().map(|(k, v)| (k.clone(), v.clone())).collect(),
                ));
            };
            let key = segment_key(first);
            let v = scope
                .vars
                .get(key)
                .cloned()
                .ok_or_else(|| ExprError::UnresolvedRef(format!("vars.{key}")))?;
            return walk(v, rest2);
        }
        "node" => {
            let Some((first, rest2)) = rest.split_first() else {
                return Err(ExprError::UnresolvedRef("node[<id>] requires an id".into()));
            };
            let id = segment_key(first);
            let v = scope
                .node_outputs
                .get(id)
                .cloned()
                .ok_or_else(|| ExprError::UnresolvedRef(format!("node[{id}]")))?;
            // Node values are stored as raw outputs; wrap so `.outputs.field`
            // reads naturally off the path, matching the spec's scope grammar.
            return walk(serde_json::json!({ "outputs": v }), rest2);
        }
        other => return Err(ExprError::UnresolvedRef(other.to_string())),
    };

    for seg in rest {
        current = walk(current, std::slice::from_ref(seg))?;
    }
    Ok(current)
}

fn segment_key(seg: &PathSegment) -> &str {
    match seg {
        PathSegment::Field(s) | PathSegment::Index(s) => s,
    }
}

fn walk(mut current: Value, segments: &[PathSegment]) -> Result<Value, ExprError> {
    for seg in segments {
        let key = segment_key(seg);
        current = match current {
            Value::Object(ref mut map) => map
                .remove(key)
                .ok_or_else(|| ExprError::UnresolvedRef(key.to_string()))?,
            Value::Null => return Err(ExprError::UnresolvedRef(key.to_string())),
            other => {
                return Err(ExprError::Type(format!(
                    "cannot index {other:?} with field '{key}'"
                )))
            }
        };
    }
    Ok(current)
}

fn truthy(v: &Value) -> bool {
    match v {
        Value::Bool(b) => *b,
        Value::Null => false,
        Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

fn as_number(v: &Value) -> Result<f64, ExprError> {
    v.as_f64()
        .ok_or_else(|| ExprError::Type(format!("expected number, found {v:?}")))
}

/// String equality is case-sensitive; numeric equality compares as f64.
fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::String(x), Value::String(y)) => x == y,
        (Value::Number(_), Value::Number(_)) => a.as_f64() == b.as_f64(),
        _ => a == b,
    }
}

fn compare(a: &Value, b: &Value) -> Result<std::cmp::Ordering, ExprError> {
    match (a, b) {
        (Value::String(x), Value::String(y)) => Ok(x.cmp(y)),
        _ => {
            let x = as_number(a)?;
            let y = as_number(b)?;
            x.partial_cmp(&y)
                .ok_or_else(|| ExprError::Type("NaN is not orderable".into()))
        }
    }
}
