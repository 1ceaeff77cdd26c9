// src/provider/video.rs — Call-provider HTTP client
//
// Server-side client for the video/call service: identities, call objects,
// membership, webhook signature checks, and the provider's bridge endpoint
// that joins a real-time AI session to a call's audio.

use async_trait::async_trait;
use hmac::{Hmac, Mac};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::infra::config::{CallProviderConfig, RealtimeConfig};
use crate::infra::errors::ParleyError;
use crate::provider::{CallProvider, ProviderUser, RealtimeSession, SessionConfig};

type HmacSha256 = Hmac<Sha256>;

const SERVICE: &str = "call-provider";

#[derive(Debug, Serialize)]
struct TokenClaims {
    user_id: String,
    iat: i64,
    exp: i64,
}

pub struct VideoApiClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    api_secret: String,
    realtime_api_key: String,
}

impl VideoApiClient {
    pub fn new(config: &CallProviderConfig, realtime: &RealtimeConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            api_secret: config.api_secret.clone(),
            realtime_api_key: realtime.api_key.clone(),
        }
    }

    /// Server-to-server auth token, signed with the provider secret.
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

    /// Make an authenticated POST request to the provider API.
    async fn api_post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, ParleyError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .post(&url)
            .header("authorization", self.server_token()?)
            .query(&[("api_key", self.api_key.as_str())])
            .json(body)
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

    async fn api_delete(&self, path: &str) -> Result<(), ParleyError> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .client
            .delete(&url)
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
        Ok(())
    }
}

#[async_trait]
impl CallProvider for VideoApiClient {
    async fn upsert_user(&self, user: &ProviderUser) -> Result<(), ParleyError> {
        let mut users = serde_json::Map::new();
        users.insert(
            user.id.clone(),
            serde_json::to_value(user).map_err(|e| ParleyError::upstream(SERVICE, e))?,
        );
        self.api_post("/api/v2/users", &serde_json::json!({ "users": users }))
            .await?;
        Ok(())
    }

    async fn create_call(
        &self,
        call_id: &str,
        created_by: &str,
        meeting_name: &str,
    ) -> Result<(), ParleyError> {
        self.api_post(
            &format!("/api/v2/video/call/default/{call_id}"),
            &serde_json::json!({
                "data": {
                    "created_by_id": created_by,
                    "custom": {
                        "meeting_id": call_id,
                        "meeting_name": meeting_name,
                    },
                    "settings_override": {
                        "transcription": {
                            "language": "en",
                            "mode": "auto-on",
                            "closed_caption_mode": "auto-on",
                        },
                        "recording": {
                            "mode": "auto-on",
                            "quality": "1080p",
                        },
                    },
                }
            }),
        )
        .await?;
        Ok(())
    }

    async fn end_call(&self, call_id: &str) -> Result<(), ParleyError> {
        self.api_post(
            &format!("/api/v2/video/call/default/{call_id}/mark_ended"),
            &serde_json::json!({}),
        )
        .await?;
        Ok(())
    }

    async fn remove_member(&self, call_id: &str, user_id: &str) -> Result<(), ParleyError> {
        self.api_post(
            &format!("/api/v2/video/call/default/{call_id}/members"),
            &serde_json::json!({ "remove_members": [user_id] }),
        )
        .await?;
        Ok(())
    }

    async fn connect_realtime_agent(
        &self,
        call_id: &str,
        agent_user_id: &str,
    ) -> Result<Box<dyn RealtimeSession>, ParleyError> {
        if self.realtime_api_key.is_empty() {
            return Err(ParleyError::Upstream {
                service: "realtime-ai",
                message: "realtime API key not configured".into(),
            });
        }

        #[derive(Deserialize)]
        struct BridgeResponse {
            session_id: String,
        }

        let resp = self
            .api_post(
                &format!("/api/v2/video/call/default/{call_id}/agents"),
                &serde_json::json!({
                    "agent_user_id": agent_user_id,
                    "provider": "openai-realtime",
                    "api_key": self.realtime_api_key,
                }),
            )
            .await?;
        let bridge: BridgeResponse =
            serde_json::from_value(resp).map_err(|e| ParleyError::upstream(SERVICE, e))?;

        Ok(Box::new(BridgedRealtimeSession {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            api_key: self.api_key.clone(),
            auth_token: self.server_token()?,
            call_id: call_id.to_string(),
            session_id: bridge.session_id,
        }))
    }

    fn verify_webhook(&self, body: &[u8], signature: &str) -> bool {
        let Ok(mut mac) = HmacSha256::new_from_slice(self.api_secret.as_bytes()) else {
            return false;
        };
        mac.update(body);
        let expected = hex::encode(mac.finalize().into_bytes());
        constant_time_eq(expected.as_bytes(), signature.as_bytes())
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

/// Live handle to a provider-bridged real-time AI session.
struct BridgedRealtimeSession {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    auth_token: String,
    call_id: String,
    session_id: String,
}

impl BridgedRealtimeSession {
    fn session_path(&self) -> String {
        format!(
            "{}/api/v2/video/call/default/{}/agents/{}",
            self.base_url, self.call_id, self.session_id
        )
    }
}

#[async_trait]
impl RealtimeSession for BridgedRealtimeSession {
    async fn configure(&self, config: &SessionConfig) -> Result<(), ParleyError> {
        let resp = self
            .client
            .post(format!("{}/session", self.session_path()))
            .header("authorization", &self.auth_token)
            .query(&[("api_key", self.api_key.as_str())])
            .json(&serde_json::json!({
                "instructions": config.instructions,
                "voice": config.voice,
                "turn_detection": {
                    "type": "server_vad",
                    "threshold": config.vad_threshold,
                    "prefix_padding_ms": config.vad_prefix_padding_ms,
                    "silence_duration_ms": config.vad_silence_duration_ms,
                },
            }))
            .send()
            .await
            .map_err(|e| ParleyError::upstream("realtime-ai", e))?;

        if !resp.status().is_success() {
            return Err(ParleyError::Upstream {
                service: "realtime-ai",
                message: format!("session update returned HTTP {}", resp.status()),
            });
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), ParleyError> {
        let resp = self
            .client
            .delete(self.session_path())
            .header("authorization", &self.auth_token)
            .query(&[("api_key", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| ParleyError::upstream("realtime-ai", e))?;

        if !resp.status().is_success() {
            return Err(ParleyError::Upstream {
                service: "realtime-ai",
                message: format!("session close returned HTTP {}", resp.status()),
            });
        }
        Ok(())
    }
}

/// Constant-time byte comparison to prevent timing attacks on signatures.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut diff = 0u8;
    for (x, y) in a.iter().zip(b.iter()) {
        diff |= x ^ y;
    }
    diff == 0
}

/// Compute the hex HMAC-SHA256 signature for a payload. Shared with tests so
/// they can sign synthetic webhook bodies.
pub fn sign_payload(secret: &str, body: &[u8]) -> String {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .expect("HMAC accepts any key length");
    mac.update(body);
    hex::encode(mac.finalize().into_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signature_round_trip() {
        let config = CallProviderConfig {
            base_url: "https://video.example.com".into(),
            api_key: "key".into(),
            api_secret: "shhh".into(),
        };
        let client = VideoApiClient::new(&config, &RealtimeConfig::default());

        let body = br#"{"type":"call.session_started"}"#;
        let sig = sign_payload("shhh", body);
        assert!(client.verify_webhook(body, &sig));
        assert!(!client.verify_webhook(body, "deadbeef"));
        assert!(!client.verify_webhook(b"tampered", &sig));
    }

    #[test]
    fn test_user_token_is_jwt_shaped() {
        let config = CallProviderConfig {
            base_url: "https://video.example.com".into(),
            api_key: "key".into(),
            api_secret: "shhh".into(),
        };
        let client = VideoApiClient::new(&config, &RealtimeConfig::default());
        let token = client.user_token("user-1", 3600).unwrap();
        assert_eq!(token.split('.').count(), 3);
    }
}
