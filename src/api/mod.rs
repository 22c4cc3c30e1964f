// API module - HTTP endpoints

use axum::{extract::rejection::JsonRejection, Json, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::db::Executor;
use crate::error::AppError;
use crate::services::{llm::ChatModel, naver_news::NewsSearch, router::QuestionRouter};

pub mod chat;
pub mod health;
pub mod news;
pub mod procedures;

/// Shared handler state. Everything external sits behind a trait object so
/// handlers can be driven by stubs.
#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub executor: Executor,
    pub llm: Arc<dyn ChatModel>,
    pub router: QuestionRouter,
    pub news: Arc<dyn NewsSearch>,
}

impl AppState {
    pub fn new(
        config: Config,
        executor: Executor,
        llm: Arc<dyn ChatModel>,
        news: Arc<dyn NewsSearch>,
    ) -> Self {
        Self {
            config,
            executor,
            router: QuestionRouter::new(llm.clone()),
            llm,
            news,
        }
    }
}

/// All routes with request tracing.
pub fn router(state: AppState) -> Router {
    Router::new()
        .merge(health::router())
        .merge(chat::router())
        .merge(news::router())
        .merge(procedures::router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

const MISSING_QUESTION: &str = "Please enter a question.";

/// Unwraps a JSON body, turning a malformed body into a 400.
fn json_body<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, AppError> {
    payload
        .map(|Json(body)| body)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

/// A present, non-blank question.
fn require_question(question: Option<String>) -> Result<String, AppError> {
    question
        .filter(|q| !q.trim().is_empty())
        .ok_or_else(|| AppError::Validation(MISSING_QUESTION.to_string()))
}
