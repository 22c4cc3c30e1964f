use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::services::llm::{parse_json_answer, ChatModel, CompletionRequest, LlmError, FAST_MODEL};
use crate::services::prompts;

/// How a question is answered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryType {
    /// Translate to SQL and look the data up.
    Sql,
    /// Answer from the system documentation.
    Rag,
    /// Small talk. Also the fallback for anything unclassifiable.
    #[default]
    Chat,
}

impl QueryType {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueryType::Sql => "sql",
            QueryType::Rag => "rag",
            QueryType::Chat => "chat",
        }
    }

    fn from_label(label: &str) -> Option<Self> {
        match label.trim().to_ascii_lowercase().as_str() {
            "sql" => Some(QueryType::Sql),
            "rag" => Some(QueryType::Rag),
            "chat" => Some(QueryType::Chat),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub query_type: QueryType,
    pub reason: String,
}

#[derive(Debug, Default, Deserialize)]
struct RouterAnswer {
    #[serde(rename = "type")]
    label: Option<String>,
    reason: Option<String>,
}

/// Routes free-text questions to one of the [`QueryType`] labels.
#[derive(Clone)]
pub struct QuestionRouter {
    model: Arc<dyn ChatModel>,
}

impl QuestionRouter {
    pub fn new(model: Arc<dyn ChatModel>) -> Self {
        Self { model }
    }

    pub async fn classify(&self, question: &str) -> Result<Classification, LlmError> {
        let request = CompletionRequest::new(FAST_MODEL, prompts::ROUTER_PROMPT, question)
            .temperature(0.0)
            .json();

        let content = self.model.complete(request).await?;
        let classification = interpret(&content);

        tracing::info!(
            query_type = classification.query_type.as_str(),
            reason = %classification.reason,
            "Question classified"
        );

        Ok(classification)
    }
}

/// Reads the classifier output; anything malformed or unknown is `Chat`.
fn interpret(content: &str) -> Classification {
    let answer: RouterAnswer = parse_json_answer(content);
    let query_type = answer
        .label
        .as_deref()
        .and_then(QueryType::from_label)
        .unwrap_or_default();

    Classification {
        query_type,
        reason: answer.reason.unwrap_or_default(),
    }
}
