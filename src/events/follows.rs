use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use tracing::debug;

use crate::config::ApiConfig;
use crate::error::{BotError, Result};
use crate::events::{FollowSource, Follower};

#[derive(Debug, Deserialize)]
struct UsersResponse {
    users: Vec<UserRecord>,
}

#[derive(Debug, Deserialize)]
struct UserRecord {
    #[serde(rename = "_id")]
    id: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct FollowsResponse {
    follows: Vec<FollowRecord>,
}

#[derive(Debug, Deserialize)]
struct FollowRecord {
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    user: FollowUser,
}

#[derive(Debug, Deserialize)]
struct FollowUser {
    display_name: String,
}

/// Twitch API client for a channel's follows.
pub struct TwitchFollows {
    client: reqwest::Client,
    base_url: String,
    client_id: String,
    accept: String,
    channel: String,
    channel_id: Option<String>,
    page_size: u32,
}

impl TwitchFollows {
    pub fn new(api: &ApiConfig, channel: &str, page_size: u32) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(api.timeout_secs))
            .build()
            .map_err(|e| BotError::Config(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: api.url.clone(),
            client_id: api.client_id.clone(),
            accept: api.accept.clone(),
            channel: channel.to_string(),
            channel_id: api.channel_id.clone(),
            page_size,
        })
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        debug!("Outgoing request: GET {} {:?}", url, query);

        let response = self
            .client
            .get(url)
            .header("Accept", &self.accept)
            .header("Client-ID", &self.client_id)
            .query(query)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let error_body = response.text().await.unwrap_or_default();
            return Err(BotError::Poll(format!(
                "Twitch API error ({}) for {}: {}",
                status, url, error_body
            )));
        }

        response
            .json()
            .await
            .map_err(|e| BotError::Poll(format!("failed to parse response from {}: {}", url, e)))
    }

    /// Look up the numeric channel id once and keep it.
    async fn channel_id(&mut self) -> Result<String> {
        if let Some(id) = &self.channel_id {
            return Ok(id.clone());
        }

        let url = format!("{}users", self.base_url);
        let body: UsersResponse = self
            .get_json(&url, &[("login", self.channel.clone())])
            .await?;
        let id = match body.users.into_iter().next().map(|u| u.id) {
            Some(serde_json::Value::String(id)) => id,
            Some(serde_json::Value::Number(id)) => id.to_string(),
            _ => {
                return Err(BotError::Poll(format!(
                    "no user id returned for channel '{}'",
                    self.channel
                )))
            }
        };

        debug!("Resolved channel '{}' to id {}", self.channel, id);
        self.channel_id = Some(id.clone());
        Ok(id)
    }
}

#[async_trait]
impl FollowSource for TwitchFollows {
    async fn latest_follows(&mut self) -> Result<Vec<Follower>> {
        let id = self.channel_id().await?;
        let url = format!("{}channels/{}/follows", self.base_url, id);
        let body: FollowsResponse = self
            .get_json(
                &url,
                &[
                    ("limit", self.page_size.to_string()),
                    ("direction", "desc".to_string()),
                ],
            )
            .await?;

        Ok(body
            .follows
            .into_iter()
            .map(|f| Follower {
                name: f.user.display_name,
                followed_at: f.created_at,
            })
            .collect())
    }
}
