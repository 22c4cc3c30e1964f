use axum::{extract::rejection::JsonRejection, extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::api::{json_body, require_question, AppState};
use crate::db::{QueryOutcome, Row};
use crate::error::Result;
use crate::services::llm::{parse_json_answer, CompletionRequest, FAST_MODEL, SMART_MODEL};
use crate::services::prompts;
use crate::services::router::QueryType;

#[derive(Debug, Deserialize)]
pub struct ChatRequest {
    pub question: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ChatResponse {
    pub question: String,
    pub query_type: QueryType,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sql: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explanation: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub query_result: Option<Vec<Row>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub row_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ChatResponse {
    fn new(question: String, query_type: QueryType) -> Self {
        Self {
            question,
            query_type,
            answer: String::new(),
            sql: None,
            explanation: None,
            query_result: None,
            row_count: None,
            error: None,
        }
    }
}

#[derive(Debug, Default, Deserialize)]
struct SqlAnswer {
    sql: Option<String>,
    explanation: Option<String>,
}

/// Classifies the question and answers it with data, documentation or small talk
async fn chat(
    State(state): State<AppState>,
    payload: std::result::Result<Json<ChatRequest>, JsonRejection>,
) -> Result<Json<ChatResponse>> {
    let request = json_body(payload)?;
    let question = require_question(request.question)?;

    let classification = state.router.classify(&question).await?;
    let mut response = ChatResponse::new(question, classification.query_type);

    match classification.query_type {
        QueryType::Sql => answer_with_data(&state, &mut response).await?,
        QueryType::Rag => {
            let request = CompletionRequest::new(SMART_MODEL, prompts::rag_prompt(), &response.question)
                .temperature(0.3);
            let answer = state.llm.complete(request).await?;
            response.answer = non_empty_or(answer, "Could not generate an answer.");
        }
        QueryType::Chat => {
            let request = CompletionRequest::new(FAST_MODEL, prompts::CHAT_PROMPT, &response.question)
                .temperature(0.7);
            let answer = state.llm.complete(request).await?;
            response.answer = non_empty_or(answer, "Hello!");
        }
    }

    Ok(Json(response))
}

/// Text-to-SQL, optionally followed by execution and interpretation.
async fn answer_with_data(state: &AppState, response: &mut ChatResponse) -> Result<()> {
    let request = CompletionRequest::new(SMART_MODEL, prompts::sql_prompt(), &response.question)
        .temperature(0.0)
        .json();
    let generated: SqlAnswer = parse_json_answer(&state.llm.complete(request).await?);

    let sql = generated.sql.filter(|sql| !sql.trim().is_empty());
    let explanation = generated.explanation.unwrap_or_default();
    response.sql = sql.clone();
    response.explanation = Some(explanation.clone());

    let Some(sql) = sql else {
        response.answer = format!(
            "⚠️ **No SQL could be generated**\n\n{}\n\nTry rephrasing the question with the data you are looking for.",
            explanation
        );
        return Ok(());
    };

    if !state.config.execute_sql {
        response.answer = format!(
            "📊 **SQL generated**\n\n{}\n\n```sql\n{}\n```\n\n> ℹ️ Set `EXECUTE_SQL=true` to run the query against the database.",
            explanation, sql
        );
        return Ok(());
    }

    match state.executor.execute_query(&sql, Vec::new()).await {
        QueryOutcome::Success { rows } => {
            let row_count = rows.len();
            tracing::info!(row_count, "Generated SQL executed");

            let result_json =
                serde_json::to_string_pretty(&rows).map_err(anyhow::Error::from)?;
            let request = CompletionRequest::new(
                SMART_MODEL,
                prompts::INTERPRET_PROMPT,
                format!(
                    "Question: {}\n\nSQL: {}\n\nResult ({} rows):\n{}",
                    response.question, sql, row_count, result_json
                ),
            )
            .temperature(0.3);
            let interpretation = state.llm.complete(request).await?;

            response.answer = format!(
                "📊 **Query result**\n\n{}\n\n---\n*Executed SQL:*\n```sql\n{}\n```",
                interpretation, sql
            );
            response.row_count = Some(row_count);
            response.query_result = Some(rows);
        }
        QueryOutcome::Failure { error } => {
            response.answer = format!(
                "⚠️ **Query failed**\n\n{}\n\n*Generated SQL:*\n```sql\n{}\n```",
                error, sql
            );
            response.error = Some(error);
        }
    }

    Ok(())
}

fn non_empty_or(text: String, fallback: &str) -> String {
    if text.trim().is_empty() {
        fallback.to_string()
    } else {
        text
    }
}

pub fn router() -> Router<AppState> {
    Router::new().route("/chat", post(chat))
}
