//! HTTP text-completion client.
//!
//! The narrative collaborator is consumed as a black-box text-completion
//! endpoint. Requests are retried through the shared retry policy.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};

use crate::config::CompletionConfig;
use crate::error::{Error, Result};
use crate::retry::RetryPolicy;

use super::{NarrativeRequest, TextGenerator};

const DEFAULT_MODEL: &str = "claude-sonnet-4-20250514";
const MAX_TOKENS: usize = 1024;

#[derive(Debug, Serialize)]
struct CompletionRequest {
    model: String,
    max_tokens: usize,
    messages: Vec<Message>,
}

#[derive(Debug, Serialize)]
struct Message {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    text: String,
}

/// Completion client with retry logic.
pub struct CompletionClient {
    client: Client,
    config: CompletionConfig,
    model: String,
    retry: RetryPolicy,
}

impl CompletionClient {
    pub fn new(config: CompletionConfig, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {e}")))?;
        Ok(Self {
            client,
            config,
            model: DEFAULT_MODEL.to_string(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn complete(&self, prompt: &str) -> Result<String> {
        let request = CompletionRequest {
            model: self.model.clone(),
            max_tokens: MAX_TOKENS,
            messages: vec![Message {
                role: "user".to_string(),
                content: prompt.to_string(),
            }],
        };

        self.retry
            .run("text completion", || self.make_request(&request))
            .await
    }

    async fn make_request(&self, request: &CompletionRequest) -> Result<String> {
        let response = self
            .client
            .post(self.config.api_url.clone())
            .header("x-api-key", &self.config.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => {
                let body: CompletionResponse = response
                    .json()
                    .await
                    .map_err(|e| Error::External(format!("failed to parse response: {e}")))?;
                Ok(body
                    .content
                    .first()
                    .map(|c| c.text.clone())
                    .unwrap_or_default())
            }
            StatusCode::TOO_MANY_REQUESTS => {
                Err(Error::External("rate limit exceeded".to_string()))
            }
            StatusCode::UNAUTHORIZED => {
                Err(Error::Config("invalid completion API key".to_string()))
            }
            status => {
                let text = response.text().await.unwrap_or_default();
                Err(Error::HttpStatus(format!("completion API {status}: {text}")))
            }
        }
    }
}

#[async_trait]
impl TextGenerator for CompletionClient {
    async fn narrate(&self, request: NarrativeRequest<'_>) -> Result<String> {
        self.complete(&build_prompt(&request)).await
    }
}

fn build_prompt(request: &NarrativeRequest<'_>) -> String {
    let mut prompt = format!(
        "Write a concise professional narrative paragraph for the \"{}\" \
         section of an IT infrastructure assessment report.\n\nFacts: {}\n",
        request.title, request.overview
    );
    if !request.items.is_empty() {
        prompt.push_str("\nRelevant entries:\n");
        for item in request.items {
            prompt.push_str(&format!("- {item}\n"));
        }
    }
    prompt.push_str("\nRespond with prose only, no headings or lists.");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_includes_title_facts_and_items() {
        let items = vec!["web01".to_string(), "db01".to_string()];
        let prompt = build_prompt(&NarrativeRequest {
            title: "Hardware Inventory Breakdown",
            overview: "2 hardware assets were inventoried",
            items: &items,
        });
        assert!(prompt.contains("Hardware Inventory Breakdown"));
        assert!(prompt.contains("2 hardware assets"));
        assert!(prompt.contains("- web01"));
        assert!(prompt.contains("- db01"));
    }

    #[test]
    fn prompt_omits_entry_block_when_no_items() {
        let prompt = build_prompt(&NarrativeRequest {
            title: "Next Steps",
            overview: "nothing flagged",
            items: &[],
        });
        assert!(!prompt.contains("Relevant entries"));
    }
}
