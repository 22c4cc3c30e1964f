// Services module - LLM, question routing and news search

pub mod llm;
pub mod naver_news;
pub mod prompts;
pub mod router;
