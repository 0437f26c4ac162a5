use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::Value;

use engine::models::Dag;
use validator::{validate_dag, validate_executable, validate_template, ExecutableWorkflow, TemplateDoc, ValidationContext, ValidationReport};

use super::AppState;

/// `POST /validate/:stage` where `stage ∈ {template, executable, dag}`; the
/// body is the corresponding document shape. Mirrors the CLI's `validate`
/// subcommand so authoring tools can check a document before submitting it.
pub async fn validate(
    Path(stage): Path<String>,
    State(state): State<AppState>,
    Json(body): Json<Value>,
) -> Result<Json<ValidationReport>, StatusCode> {
    let report = match stage.as_str() {
        "template" => {
            let doc: TemplateDoc = serde_json::from_value(body).map_err(|_| StatusCode::BAD_REQUEST)?;
            validate_template(&doc)
        }
        "executable" => {
            let doc: ExecutableWorkflow = serde_json::from_value(body).map_err(|_| StatusCode::BAD_REQUEST)?;
            validate_executable(&doc, state.catalog.as_ref(), &ValidationContext::default())
        }
        "dag" => {
            let dag: Dag = serde_json::from_value(body).map_err(|_| StatusCode::BAD_REQUEST)?;
            validate_dag(&dag)
        }
        _ => return Err(StatusCode::NOT_FOUND),
    };

    Ok(Json(report))
}
