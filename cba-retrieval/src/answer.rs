//! Question answering over a hosted chat model
//!
//! Sends the question as-is under a fixed system prompt. Retrieval results
//! are not added to the prompt.

use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};

use crate::config::AnswerConfig;
use crate::embedding::{auth_headers, classify_status, classify_transport};
use crate::error::{Result, RetrievalError, ServiceFailure};

pub const SYSTEM_PROMPT: &str =
    "You help communities understand and draft Community Benefits Agreements (CBAs).";

/// Blocking client for OpenAI-compatible `/chat/completions` endpoints
pub struct AnswerClient {
    client: Client,
    endpoint: String,
    model: String,
}

impl AnswerClient {
    pub fn new(config: &AnswerConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .ok_or_else(|| RetrievalError::config("missing OPENAI_API_KEY"))?;

        let client = Client::builder()
            .timeout(config.timeout)
            .default_headers(auth_headers(api_key)?)
            .build()
            .map_err(|e| RetrievalError::config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/chat/completions",
                config.base_url.trim_end_matches('/')
            ),
            model: config.model.clone(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Ask a single question and return the model's reply text
    pub fn ask(&self, question: &str) -> Result<String> {
        if question.trim().is_empty() {
            return Err(RetrievalError::EmptyQuery);
        }

        let body = ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: question,
                },
            ],
        };

        log::debug!("Asking {} ({} chars)", self.model, question.len());
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&body)
            .send()
            .map_err(|e| RetrievalError::completion(classify_transport(&e), e.to_string()))?;

        let status = resp.status();
        let text = resp
            .text()
            .map_err(|e| RetrievalError::completion(classify_transport(&e), e.to_string()))?;
        if !status.is_success() {
            return Err(RetrievalError::completion(
                classify_status(status),
                format!("{}: {}", status, text),
            ));
        }

        parse_reply(&text)
    }
}

fn parse_reply(body: &str) -> Result<String> {
    let parsed: ChatResponse = serde_json::from_str(body).map_err(|e| {
        RetrievalError::completion(
            ServiceFailure::Malformed,
            format!("failed to parse completion response: {}", e),
        )
    })?;

    parsed
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .ok_or_else(|| {
            RetrievalError::completion(ServiceFailure::Malformed, "response held no message")
        })
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: AssistantMessage,
}

#[derive(Debug, Deserialize)]
struct AssistantMessage {
    content: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubServer;
    use std::time::Duration;

    fn config(base_url: &str) -> AnswerConfig {
        AnswerConfig {
            api_key: Some("sk-test".to_string()),
            base_url: base_url.to_string(),
            timeout: Duration::from_secs(2),
            ..AnswerConfig::default()
        }
    }

    #[test]
    fn test_parse_reply_takes_first_choice() {
        let body = r#"{"choices":[{"message":{"role":"assistant","content":"A CBA is a contract."}},{"message":{"content":"other"}}]}"#;
        assert_eq!(parse_reply(body).unwrap(), "A CBA is a contract.");
    }

    #[test]
    fn test_parse_reply_without_choices() {
        let err = parse_reply(r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::Completion {
                kind: ServiceFailure::Malformed,
                ..
            }
        ));
    }

    #[test]
    fn test_request_carries_fixed_system_prompt() {
        let body = ChatRequest {
            model: "gpt-4.1-mini",
            messages: [
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: "What is a CBA?",
                },
            ],
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["messages"][0]["content"], SYSTEM_PROMPT);
        assert_eq!(json["messages"][1]["content"], "What is a CBA?");
    }

    #[test]
    fn test_missing_api_key() {
        let cfg = AnswerConfig::default();
        assert!(matches!(
            AnswerClient::new(&cfg),
            Err(RetrievalError::Config(_))
        ));
    }

    #[test]
    fn test_empty_question() {
        let client = AnswerClient::new(&config("http://127.0.0.1:1/v1")).unwrap();
        assert!(matches!(client.ask("  "), Err(RetrievalError::EmptyQuery)));
    }

    #[test]
    fn test_unreachable_provider() {
        let client = AnswerClient::new(&config("http://127.0.0.1:1/v1")).unwrap();
        let err = client.ask("What is a CBA?").unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::Completion {
                kind: ServiceFailure::Unreachable,
                ..
            }
        ));
    }

    #[test]
    fn test_ask_returns_reply_text() {
        let server = StubServer::start(vec![(
            200,
            r#"{"choices":[{"message":{"role":"assistant","content":"A CBA is a contract."}}]}"#,
        )]);
        let client = AnswerClient::new(&config(&server.base_url)).unwrap();

        assert_eq!(client.ask("What is a CBA?").unwrap(), "A CBA is a contract.");
        let body: serde_json::Value = serde_json::from_str(&server.bodies()[0]).unwrap();
        assert_eq!(body["model"], "gpt-4.1-mini");
        assert_eq!(body["messages"][0]["content"], SYSTEM_PROMPT);
        assert_eq!(body["messages"][1]["content"], "What is a CBA?");
    }

    #[test]
    fn test_error_status_is_classified() {
        let server = StubServer::start(vec![(401, r#"{"error":"bad key"}"#)]);
        let client = AnswerClient::new(&config(&server.base_url)).unwrap();
        let err = client.ask("What is a CBA?").unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::Completion {
                kind: ServiceFailure::Rejected,
                ..
            }
        ));

        let server = StubServer::start(vec![(502, "bad gateway")]);
        let client = AnswerClient::new(&config(&server.base_url)).unwrap();
        let err = client.ask("What is a CBA?").unwrap_err();
        assert!(matches!(
            err,
            RetrievalError::Completion {
                kind: ServiceFailure::Upstream,
                ..
            }
        ));
        assert_eq!(server.hits(), 1);
    }
}
