//! A safe, total, side-effect-free expression sublanguage.
//!
//! Used by the validator (to check conditions parse and reference only legal
//! scope paths) and the executor (to evaluate gateway branches, join
//! conditions, and loop conditions). Deliberately not a scripting runtime:
//! no function definitions, no assignment, no unbounded loops — see the
//! design notes in the spec for why.

mod ast;
mod error;
mod eval;
mod parser;
mod token;

pub use ast::{BinaryOp, Expr, PathSegment, UnaryOp};
pub use error::ExprError;
pub use eval::Scope;
pub use parser::parse;

/// Parse and evaluate `src` in one call.
pub fn eval_str(src: &str, scope: &Scope) -> Result<serde_json::Value, ExprError> {
    let expr = parse(src)?;
    eval::eval(&expr, scope)
}

/// Evaluate a pre-parsed expression.
pub fn eval(expr: &Expr, scope: &Scope) -> Result<serde_json::Value, ExprError> {
    eval::eval(expr, scope)
}

/// Evaluate an expression and coerce the result to a boolean via the
/// sublanguage's truthiness rules (used for gateway/loop conditions).
pub fn eval_bool(expr: &Expr, scope: &Scope) -> Result<bool, ExprError> {
    let v = eval(expr, scope)?;
    Ok(match v {
        serde_json::Value::Bool(b) => b,
        serde_json::Value::Null => false,
        serde_json::Value::Number(n) => n.as_f64().map(|f| f != 0.0).unwrap_or(false),
        serde_json::Value::String(s) => !s.is_empty(),
        serde_json::Value::Array(a) => !a.is_empty(),
        serde_json::Value::Object(o) => !o.is_empty(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;

    fn scope<'a>(
        inputs: &'a serde_json::Value,
        vars: &'a HashMap<String, serde_json::Value>,
        globals: &'a serde_json::Value,
        node_outputs: &'a HashMap<String, serde_json::Value>,
    ) -> Scope<'a> {
        Scope { inputs, vars, globals, node_outputs }
    }

    #[test]
    fn literals_and_arithmetic() {
        let inputs = json!({});
        let vars = HashMap::new();
        let globals = json!({});
        let node_outputs = HashMap::new();
        let s = scope(&inputs, &vars, &globals, &node_outputs);

        assert_eq!(eval_str("1 + 2 * 3", &s).unwrap(), json!(7.0));
        assert_eq!(eval_str("(1 + 2) * 3", &s).unwrap(), json!(9.0));
        assert_eq!(eval_str("-5 + 2", &s).unwrap(), json!(-3.0));
    }

    #[test]
    fn comparisons_and_booleans() {
        let inputs = json!({ "amount": 120 });
        let vars = HashMap::new();
        let globals = json!({});
        let node_outputs = HashMap::new();
        let s = scope(&inputs, &vars, &globals, &node_outputs);

        assert_eq!(eval_bool(&parse("inputs.amount > 100").unwrap(), &s).unwrap(), true);
        assert_eq!(eval_bool(&parse("inputs.amount > 100 && inputs.amount < 200").unwrap(), &s).unwrap(), true);
        assert_eq!(eval_bool(&parse("!(inputs.amount < 100)").unwrap(), &s).unwrap(), true);
    }

    #[test]
    fn string_equality_is_case_sensitive() {
        let inputs = json!({ "status": "OK" });
        let vars = HashMap::new();
        let globals = json!({});
        let node_outputs = HashMap::new();
        let s = scope(&inputs, &vars, &globals, &node_outputs);

        assert_eq!(eval_bool(&parse("inputs.status == \"OK\"").unwrap(), &s).unwrap(), true);
        assert_eq!(eval_bool(&parse("inputs.status == \"ok\"").unwrap(), &s).unwrap(), false);
    }

    #[test]
    fn node_outputs_path() {
        let inputs = json!({});
        let vars = HashMap::new();
        let globals = json!({});
        let mut node_outputs = HashMap::new();
        node_outputs.insert("step1".to_string(), json!({ "id": "abc123" }));
        let s = scope(&inputs, &vars, &globals, &node_outputs);

        assert_eq!(
            eval_str("node[step1].outputs.id", &s).unwrap(),
            json!("abc123")
        );
    }

    #[test]
    fn len_and_is_null() {
        let inputs = json!({ "items": [1, 2, 3], "missing": null });
        let vars = HashMap::new();
        let globals = json!({});
        let node_outputs = HashMap::new();
        let s = scope(&inputs, &vars, &globals, &node_outputs);

        assert_eq!(eval_str("len(inputs.items)", &s).unwrap(), json!(3.0));
        assert_eq!(eval_bool(&parse("is_null(inputs.missing)").unwrap(), &s).unwrap(), true);
    }

    #[test]
    fn unresolved_reference_errors() {
        let inputs = json!({});
        let vars = HashMap::new();
        let globals = json!({});
        let node_outputs = HashMap::new();
        let s = scope(&inputs, &vars, &globals, &node_outputs);

        assert!(matches!(
            eval_str("inputs.missing.field", &s),
            Err(ExprError::UnresolvedRef(_))
        ));
    }

    #[test]
    fn parse_error_on_malformed_expression() {
        assert!(matches!(parse("inputs. =="), Err(ExprError::Parse { .. })));
    }

    #[test]
    fn vars_whole_map_access() {
        let inputs = json!({});
        let mut vars = HashMap::new();
        vars.insert("count".to_string(), json!(5.0));
        let globals = json!({});
        let node_outputs = HashMap::new();
        let s = scope(&inputs, &vars, &globals, &node_outputs);

        assert_eq!(eval_str("vars.count", &s).unwrap(), json!(5.0));
    }
}
