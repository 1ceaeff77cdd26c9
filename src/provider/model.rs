// src/provider/model.rs — Conversational completion client
//
// Plain (non-streaming) chat completions, used for meeting summaries and
// post-meeting replies in the chat channel.

use async_trait::async_trait;

use crate::infra::config::ModelConfig;
use crate::infra::errors::ParleyError;
use crate::provider::{ChatModel, ModelMessage, ModelRole};

const SERVICE: &str = "model";

pub struct CompletionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
}

impl CompletionClient {
    pub fn new(config: &ModelConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
        }
    }
}

#[async_trait]
impl ChatModel for CompletionClient {
    async fn complete(
        &self,
        system: &str,
        messages: &[ModelMessage],
    ) -> Result<String, ParleyError> {
        let mut msgs = vec![serde_json::json!({
            "role": "system",
            "content": system,
        })];
        for m in messages {
            let role = match m.role {
                ModelRole::User => "user",
                ModelRole::Assistant => "assistant",
            };
            msgs.push(serde_json::json!({
                "role": role,
                "content": m.content,
            }));
        }

        let response = self
            .client
            .post(format!("{}/chat/completions", self.base_url))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .json(&serde_json::json!({
                "model": self.model,
                "messages": msgs,
            }))
            .send()
            .await
            .map_err(|e| ParleyError::upstream(SERVICE, e))?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(ParleyError::Upstream {
                service: SERVICE,
                message: format!("HTTP {status}: {error_body}"),
            });
        }

        let resp: serde_json::Value = response
            .json()
            .await
            .map_err(|e| ParleyError::upstream(SERVICE, e))?;

        let content = resp["choices"][0]["message"]["content"]
            .as_str()
            .unwrap_or_default()
            .to_string();
        Ok(content)
    }
}
