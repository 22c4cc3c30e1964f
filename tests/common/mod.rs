#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tower::ServiceExt;

use farmchat::api::{self, AppState};
use farmchat::config::Config;
use farmchat::db::{ConnectionSource, DbError, Executor, QueryRequest, RetryPolicy, Row};
use farmchat::services::llm::{ChatModel, CompletionRequest, LlmError};
use farmchat::services::naver_news::{NewsError, NewsPage, NewsSearch, NewsSort};

/// Answers completions from a queue and records every request.
pub struct StubModel {
    answers: Mutex<VecDeque<String>>,
    pub requests: Mutex<Vec<CompletionRequest>>,
}

impl StubModel {
    pub fn new(answers: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.iter().map(|a| a.to_string()).collect()),
            requests: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> CompletionRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl ChatModel for StubModel {
    async fn complete(&self, request: CompletionRequest) -> Result<String, LlmError> {
        self.requests.lock().unwrap().push(request);
        Ok(self.answers.lock().unwrap().pop_front().unwrap_or_default())
    }
}

/// Returns one scripted news result and counts searches.
pub struct StubNews {
    result: Mutex<Option<Result<NewsPage, NewsError>>>,
    pub queries: Mutex<Vec<String>>,
    pub sorts: Mutex<Vec<NewsSort>>,
}

impl StubNews {
    pub fn new(result: Result<NewsPage, NewsError>) -> Arc<Self> {
        Arc::new(Self {
            result: Mutex::new(Some(result)),
            queries: Mutex::new(Vec::new()),
            sorts: Mutex::new(Vec::new()),
        })
    }

    pub fn calls(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl NewsSearch for StubNews {
    async fn search(
        &self,
        query: &str,
        _count: u32,
        sort: NewsSort,
    ) -> Result<NewsPage, NewsError> {
        self.queries.lock().unwrap().push(query.to_string());
        self.sorts.lock().unwrap().push(sort);
        self.result
            .lock()
            .unwrap()
            .take()
            .unwrap_or(Err(NewsError::MissingCredentials))
    }
}

/// Database stand-in with scripted attempt results.
pub struct StubDatabase {
    script: Mutex<VecDeque<Result<Vec<Row>, DbError>>>,
    pub requests: Mutex<Vec<QueryRequest>>,
    pub resets: Mutex<usize>,
}

impl StubDatabase {
    pub fn new(script: Vec<Result<Vec<Row>, DbError>>) -> Arc<Self> {
        Arc::new(Self {
            script: Mutex::new(script.into()),
            requests: Mutex::new(Vec::new()),
            resets: Mutex::new(0),
        })
    }

    pub fn calls(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl ConnectionSource for StubDatabase {
    async fn run(&self, request: &QueryRequest) -> Result<Vec<Row>, DbError> {
        self.requests.lock().unwrap().push(request.clone());
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    fn reset(&self) {
        *self.resets.lock().unwrap() += 1;
    }
}

pub fn test_config(execute_sql: bool) -> Config {
    let settings = config::Config::builder()
        .set_override("openai_api_key", "sk-test")
        .unwrap()
        .set_override("execute_sql", if execute_sql { "true" } else { "false" })
        .unwrap()
        .build()
        .unwrap();
    Config::from_settings(&settings).unwrap()
}

pub fn app(
    execute_sql: bool,
    model: Arc<StubModel>,
    news: Arc<StubNews>,
    db: Arc<StubDatabase>,
) -> Router {
    let executor = Executor::with_policy(
        db,
        RetryPolicy {
            max_retries: 2,
            backoff: Duration::ZERO,
        },
    );
    api::router(AppState::new(test_config(execute_sql), executor, model, news))
}

pub fn row(value: Value) -> Row {
    value.as_object().unwrap().clone()
}

pub async fn post_json(app: Router, uri: &str, body: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(uri)
                .header("content-type", "application/json")
                .body(Body::from(body.to_string()))
                .unwrap(),
        )
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

pub async fn get_json(app: Router, uri: &str) -> (StatusCode, Value) {
    let response = app
        .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}
