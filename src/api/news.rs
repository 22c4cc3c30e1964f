use axum::{extract::rejection::JsonRejection, extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};

use crate::api::{json_body, require_question, AppState};
use crate::error::Result;
use crate::services::llm::{parse_json_answer, CompletionRequest, FAST_MODEL, SMART_MODEL};
use crate::services::naver_news::{NewsItem, NewsSort};
use crate::services::prompts;

/// Articles fetched per search.
const SEARCH_SIZE: u32 = 10;
/// Articles returned to the client.
const RETURNED_ITEMS: usize = 5;

#[derive(Debug, Deserialize)]
pub struct NewsRequest {
    pub question: Option<String>,
    /// `"summary"` for a short digest; anything else answers the question.
    pub mode: Option<String>,
    /// `"date"` (default) or `"sim"` for relevance.
    #[serde(default)]
    pub sort: NewsSort,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewsResponse {
    pub question: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_query: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub keywords: Option<Vec<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub news_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_found: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub news: Option<Vec<NewsItem>>,
    pub answer: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct KeywordAnswer {
    keywords: Option<Vec<String>>,
    search_query: Option<String>,
}

/// Searches news for the question and has the model answer or summarize
async fn news(
    State(state): State<AppState>,
    payload: std::result::Result<Json<NewsRequest>, JsonRejection>,
) -> Result<Json<NewsResponse>> {
    let request = json_body(payload)?;
    let question = require_question(request.question)?;
    let summary_mode = request.mode.as_deref() == Some("summary");

    let keyword_request = CompletionRequest::new(FAST_MODEL, prompts::KEYWORD_EXTRACT_PROMPT, &question)
        .temperature(0.0)
        .json();
    let extracted: KeywordAnswer = parse_json_answer(&state.llm.complete(keyword_request).await?);
    let search_query = extracted
        .search_query
        .filter(|q| !q.trim().is_empty())
        .unwrap_or_else(|| question.clone());

    tracing::info!(search_query = %search_query, summary_mode, sort = ?request.sort, "Searching news");

    let page = match state.news.search(&search_query, SEARCH_SIZE, request.sort).await {
        Ok(page) => page,
        Err(e) => {
            tracing::warn!(error = %e, "News search failed");
            let error = e.to_string();
            return Ok(Json(NewsResponse {
                question,
                answer: format!("⚠️ An error occurred while searching news: {}", error),
                error: Some(error),
                ..Default::default()
            }));
        }
    };

    if page.items.is_empty() {
        return Ok(Json(NewsResponse {
            question,
            answer: format!(
                "🔍 No news found for \"{}\". Try other keywords.",
                search_query
            ),
            search_query: Some(search_query),
            news_count: Some(0),
            ..Default::default()
        }));
    }

    let news_context = page
        .items
        .iter()
        .enumerate()
        .map(|(idx, item)| {
            format!(
                "[{}] {}\nPublished: {}\nContent: {}\nLink: {}",
                idx + 1,
                item.title,
                item.pub_date,
                item.description,
                item.link
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n");

    let system = if summary_mode {
        prompts::SUMMARY_PROMPT
    } else {
        prompts::NEWS_ANALYSIS_PROMPT
    };
    let analysis_request = CompletionRequest::new(
        SMART_MODEL,
        system,
        format!(
            "Question: {}\n\nArticles found ({}):\n\n{}",
            question,
            page.items.len(),
            news_context
        ),
    )
    .temperature(0.3);
    let analysis = state.llm.complete(analysis_request).await?;

    let news_count = page.items.len();
    let answer = format!(
        "📰 **News analysis for \"{}\"**\n\n{}\n\n---\n*Analyzed {} articles.*",
        search_query, analysis, news_count
    );

    Ok(Json(NewsResponse {
        question,
        search_query: Some(search_query),
        keywords: extracted.keywords,
        news_count: Some(news_count),
        total_found: Some(page.total),
        news: Some(page.items.into_iter().take(RETURNED_ITEMS).collect()),
        answer,
        error: None,
    }))
}

pub fn router() -> Router<AppState> {
    Router::new().route("/news", post(news))
}
