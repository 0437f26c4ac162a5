//! Renders an `input_template` against the current run context, resolving
//! `{{ expr }}` placeholders through the shared expression sublanguage.

use nodes::expr::{self, Scope};
use serde_json::Value;

use crate::error::EngineError;
use crate::models::RunContext;

/// Render every `{{ ... }}` placeholder in `template` against `ctx`.
///
/// A value that is *exactly* one placeholder (after trimming whitespace)
/// keeps the evaluated value's JSON type; placeholders embedded in a larger
/// string are stringified and substituted in place.
pub fn render(template: &Value, ctx: &RunContext, globals: &Value) -> Result<Value, EngineError> {
    match template {
        Value::String(s) => render_string(s, ctx, globals),
        Value::Array(items) => Ok(Value::Array(
            items
                .iter()
                .map(|v| render(v, ctx, globals))
                .collect::<Result<Vec<_>, _>>()?,
        )),
        Value::Object(map) => {
            let mut out = serde_json::Map::with_capacity(map.len());
            for (k, v) in map {
                out.insert(k.clone(), render(v, ctx, globals)?);
            }
            Ok(Value::Object(out))
        }
        other => Ok(other.clone()),
    }
}

fn render_string(s: &str, ctx: &RunContext, globals: &Value) -> Result<Value, EngineError> {
    let trimmed = s.trim();
    if let Some(inner) = whole_placeholder(trimmed) {
        return eval_placeholder(inner, ctx, globals);
    }

    if !s.contains("{{") {
        return Ok(Value::String(s.to_string()));
    }

    let mut out = String::with_capacity(s.len());
    let mut rest = s;
    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let Some(end) = after.find("}}") else {
            out.push_str(&rest[start..]);
            rest = "";
            break;
        };
        let expr_src = after[..end].trim();
        let value = eval_placeholder(expr_src, ctx, globals)?;
        out.push_str(&scalar_to_string(&value));
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(Value::String(out))
}

fn whole_placeholder(trimmed: &str) -> Option<&str> {
    trimmed
        .strip_prefix("{{")
        .and_then(|s| s.strip_suffix("}}"))
        .map(str::trim)
}

fn eval_placeholder(expr_src: &str, ctx: &RunContext, globals: &Value) -> Result<Value, EngineError> {
    let scope = Scope {
        inputs: &ctx.inputs,
        vars: &ctx.vars,
        globals,
        node_outputs: &ctx.artifacts,
    };
    expr::eval_str(expr_src, &scope).map_err(|e| EngineError::ExpressionFailed {
        node_id: "<template>".into(),
        message: e.to_string(),
    })
}

fn scalar_to_string(v: &Value) -> String {
    match v {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn whole_placeholder_preserves_type() {
        let mut ctx = RunContext::new(json!({}));
        ctx.vars.insert("amount".into(), json!(42.0));
        let rendered = render(&json!("{{ vars.amount }}"), &ctx, &json!({})).unwrap();
        assert_eq!(rendered, json!(42.0));
    }

    #[test]
    fn embedded_placeholder_stringifies() {
        let mut ctx = RunContext::new(json!({}));
        ctx.vars.insert("name".into(), json!("Ada"));
        let rendered = render(&json!("hello {{ vars.name }}!"), &ctx, &json!({})).unwrap();
        assert_eq!(rendered, json!("hello Ada!"));
    }

    #[test]
    fn object_template_renders_recursively() {
        let mut ctx = RunContext::new(json!({}));
        ctx.vars.insert("id".into(), json!("abc"));
        let rendered = render(&json!({ "ref": "{{ vars.id }}", "count": 3 }), &ctx, &json!({})).unwrap();
        assert_eq!(rendered, json!({ "ref": "abc", "count": 3 }));
    }
}
