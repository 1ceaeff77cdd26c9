// src/provider/billing.rs — Subscription provider client
//
// A customer with an active subscription is premium. A missing customer (or
// no configured endpoint at all) means a free account, never an error —
// billing lookups must not take meetings down.

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::infra::config::BillingConfig;
use crate::infra::errors::ParleyError;
use crate::provider::SubscriptionProvider;

const SERVICE: &str = "billing";

pub struct SubscriptionClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl SubscriptionClient {
    pub fn new(config: &BillingConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
        }
    }
}

#[async_trait]
impl SubscriptionProvider for SubscriptionClient {
    async fn is_premium(&self, user_id: &str) -> Result<bool, ParleyError> {
        if self.base_url.is_empty() {
            return Ok(false);
        }

        #[derive(Deserialize)]
        struct CustomerState {
            #[serde(default)]
            active_subscriptions: Vec<serde_json::Value>,
        }

        let resp = self
            .client
            .get(format!(
                "{}/v1/customers/external/{user_id}/state",
                self.base_url
            ))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| ParleyError::upstream(SERVICE, e))?;

        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            debug!("billing customer {user_id} not found, treating as free");
            return Ok(false);
        }

        let status = resp.status();
        if !status.is_success() {
            return Err(ParleyError::Upstream {
                service: SERVICE,
                message: format!("customer state returned HTTP {status}"),
            });
        }

        let state: CustomerState = resp
            .json()
            .await
            .map_err(|e| ParleyError::upstream(SERVICE, e))?;
        Ok(!state.active_subscriptions.is_empty())
    }
}
