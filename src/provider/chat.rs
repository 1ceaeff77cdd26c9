// src/provider/chat.rs — Chat-provider HTTP client
//
// Each completed meeting has a chat channel keyed by the meeting id; the
// agent answers follow-up questions there.

use async_trait::async_trait;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};

use crate::infra::config::ChatConfig;
use crate::infra::errors::ParleyError;
use crate::provider::{ChannelMessage, ChatProvider, ProviderUser};

const SERVICE: &str = "chat-provider";

#[derive(Debug, Serialize)]
struct TokenClaims {
    user_id: String,
    iat: i64,
    exp: i64,
}

pub struct ChatApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
}

impl ChatApiClient {
    pub fn new(config: &ChatConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
        }
    }

    fn server_token(&self) -> Result<String, ParleyError> {
        let now = chrono::Utc::now().timestamp();
        let claims = TokenClaims {
            user_id: "server".into(),
            iat: now - 60,
            exp: now + 3600,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.api_secret.as_bytes()),
        )
        .map_err(|e| ParleyError::upstream(SERVICE, e))
    }

    async fn request(
        &self,
        builder: reqwest::RequestBuilder,
        path: &str,
    ) -> Result<serde_json::Value, ParleyError> {
        let resp = builder
            .header("authorization", self.server_token()?)
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| ParleyError::upstream(SERVICE, e))?;

        let status = resp.status();
        if !status.is_success() {
            let detail = resp.text().await.unwrap_or_default();
            return Err(ParleyError::Upstream {
                service: SERVICE,
                message: format!("{path} returned HTTP {status}: {detail}"),
            });
        }
        resp.json()
            .await
            .map_err(|e| ParleyError::upstream(SERVICE, e))
    }
}

#[async_trait]
impl ChatProvider for ChatApiClient {
    async fn upsert_user(&self, user: &ProviderUser) -> Result<(), ParleyError> {
        let mut users = serde_json::Map::new();
        users.insert(
            user.id.clone(),
            serde_json::to_value(user).map_err(|e| ParleyError::upstream(SERVICE, e))?,
        );
        let path = "/api/v2/users";
        let builder = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&serde_json::json!({ "users": users }));
        self.request(builder, path).await?;
        Ok(())
    }

    async fn recent_messages(
        &self,
        channel_id: &str,
        limit: usize,
    ) -> Result<Vec<ChannelMessage>, ParleyError> {
        #[derive(Deserialize)]
        struct MessagesResponse {
            #[serde(default)]
            messages: Vec<ChannelMessage>,
        }

        let path = format!("/api/v2/channels/messaging/{channel_id}/messages");
        let builder = self
            .client
            .get(format!("{}{}", self.base_url, path))
            .query(&[("limit", limit.to_string())]);
        let raw = self.request(builder, &path).await?;
        let parsed: MessagesResponse =
            serde_json::from_value(raw).map_err(|e| ParleyError::upstream(SERVICE, e))?;

        // Provider returns newest first; callers want chronological order.
        let mut messages = parsed.messages;
        messages.reverse();
        Ok(messages)
    }

    async fn send_message(
        &self,
        channel_id: &str,
        author_id: &str,
        text: &str,
    ) -> Result<(), ParleyError> {
        let path = format!("/api/v2/channels/messaging/{channel_id}/message");
        let builder = self
            .client
            .post(format!("{}{}", self.base_url, path))
            .json(&serde_json::json!({
                "message": {
                    "user_id": author_id,
                    "text": text,
                }
            }));
        self.request(builder, &path).await?;
        Ok(())
    }

    fn user_token(&self, user_id: &str, ttl_seconds: i64) -> Result<String, ParleyError> {
        let now = chrono::Utc::now().timestamp();
        let claims = TokenClaims {
            user_id: user_id.to_string(),
            iat: now - 60,
            exp: now + ttl_seconds,
        };
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(self.api_secret.as_bytes()),
        )
        .map_err(|e| ParleyError::upstream(SERVICE, e))
    }
}
