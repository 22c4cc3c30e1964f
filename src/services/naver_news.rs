use async_trait::async_trait;
use chrono::{DateTime, Datelike, Timelike};
use regex::Regex;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, Secret};
use serde::{Deserialize, Serialize};
use std::sync::LazyLock;
use thiserror::Error;

static HTML_TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"<[^>]*>").expect("valid regex"));

#[derive(Error, Debug)]
pub enum NewsError {
    #[error("Naver API credentials are not configured. Set NAVER_CLIENT_ID and NAVER_CLIENT_SECRET.")]
    MissingCredentials,

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    ApiError { status: StatusCode, message: String },

    #[error("Failed to parse news response: {0}")]
    ParseError(String),
}

/// A cleaned news article.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub title: String,
    pub originallink: String,
    pub link: String,
    pub description: String,
    pub pub_date: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct NewsPage {
    pub items: Vec<NewsItem>,
    /// Total hits reported by the search service, not just this page.
    pub total: u64,
}

/// Result ordering, spelled the way the search API spells it.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
pub enum NewsSort {
    /// By relevance
    #[serde(rename = "sim")]
    Similarity,
    /// Newest first
    #[default]
    #[serde(rename = "date")]
    Date,
}

impl NewsSort {
    fn as_param(&self) -> &'static str {
        match self {
            NewsSort::Similarity => "sim",
            NewsSort::Date => "date",
        }
    }
}

#[async_trait]
pub trait NewsSearch: Send + Sync {
    async fn search(
        &self,
        query: &str,
        count: u32,
        sort: NewsSort,
    ) -> Result<NewsPage, NewsError>;
}

pub struct NaverNewsClient {
    client: Client,
    base_url: String,
    credentials: Option<(String, Secret<String>)>,
}

impl NaverNewsClient {
    pub fn new(
        base_url: &str,
        client_id: Option<String>,
        client_secret: Option<Secret<String>>,
    ) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            credentials: client_id.zip(client_secret),
        }
    }
}

#[derive(Debug, Deserialize)]
struct NaverResponse {
    #[serde(default)]
    total: u64,
    #[serde(default)]
    items: Vec<NaverItem>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct NaverItem {
    title: String,
    #[serde(default)]
    originallink: String,
    #[serde(default)]
    link: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    pub_date: String,
}

impl From<NaverItem> for NewsItem {
    fn from(item: NaverItem) -> Self {
        Self {
            title: clean_html(&item.title),
            originallink: item.originallink,
            link: item.link,
            description: clean_html(&item.description),
            pub_date: format_pub_date(&item.pub_date),
        }
    }
}

#[async_trait]
impl NewsSearch for NaverNewsClient {
    #[tracing::instrument(skip(self))]
    async fn search(
        &self,
        query: &str,
        count: u32,
        sort: NewsSort,
    ) -> Result<NewsPage, NewsError> {
        let (client_id, client_secret) = self
            .credentials
            .as_ref()
            .ok_or(NewsError::MissingCredentials)?;

        let url = format!("{}/v1/search/news.json", self.base_url);
        let display = count.to_string();

        let response = self
            .client
            .get(&url)
            .query(&[
                ("query", query),
                ("display", display.as_str()),
                ("sort", sort.as_param()),
            ])
            .header("X-Naver-Client-Id", client_id)
            .header("X-Naver-Client-Secret", client_secret.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            tracing::error!(status = %status, error = %error_text, "Naver news search failed");
            return Err(NewsError::ApiError {
                status,
                message: error_text,
            });
        }

        let body: NaverResponse = response
            .json()
            .await
            .map_err(|e| NewsError::ParseError(e.to_string()))?;

        let items: Vec<NewsItem> = body.items.into_iter().map(NewsItem::from).collect();
        tracing::debug!(count = items.len(), total = body.total, "News search completed");

        Ok(NewsPage {
            items,
            total: body.total,
        })
    }
}

/// Strips HTML tags and decodes entities.
pub fn clean_html(text: &str) -> String {
    let stripped = HTML_TAG.replace_all(text, "");
    html_escape::decode_html_entities(&stripped).into_owned()
}

/// Renders an RFC 2822 date as a Korean long date-time, e.g.
/// `2024년 1월 15일 오후 03:30`. Unparsable input is returned as is.
pub fn format_pub_date(raw: &str) -> String {
    let Ok(date) = DateTime::parse_from_rfc2822(raw.trim()) else {
        return raw.to_string();
    };

    let (is_pm, hour) = date.hour12();
    format!(
        "{}년 {}월 {}일 {} {:02}:{:02}",
        date.year(),
        date.month(),
        date.day(),
        if is_pm { "오후" } else { "오전" },
        hour,
        date.minute()
    )
}
