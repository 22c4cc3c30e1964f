use axum::{extract::rejection::JsonRejection, extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::api::{json_body, AppState};
use crate::db::{Row, SqlParam};
use crate::error::{AppError, Result};

#[derive(Debug, Deserialize)]
pub struct ProcedureRequest {
    pub name: Option<String>,
    #[serde(default)]
    pub params: Vec<SqlParam>,
}

#[derive(Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProcedureResponse {
    pub procedure: String,
    pub rows: Vec<Row>,
    pub row_count: usize,
}

/// Runs a stored procedure and returns its first result set.
/// Database failures propagate and become a 500.
async fn call_procedure(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ProcedureRequest>, JsonRejection>,
) -> Result<Json<ProcedureResponse>> {
    let request = json_body(payload)?;

    if !state.config.execute_sql {
        return Err(AppError::Forbidden(
            "Database execution is disabled. Set EXECUTE_SQL=true to enable it.".to_string(),
        ));
    }

    let name = request
        .name
        .filter(|name| !name.trim().is_empty())
        .ok_or_else(|| AppError::Validation("Please enter a procedure name.".to_string()))?;

    let rows = state
        .executor
        .call_procedure(&name, request.params)
        .await?;

    tracing::info!(procedure = %name, row_count = rows.len(), "Procedure called");

    Ok(Json(ProcedureResponse {
        procedure: name,
        row_count: rows.len(),
        rows,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/procedure", post(call_procedure))
}
