//! Supabase REST API client using service_role key

use reqwest::{Client, RequestBuilder, Response};
use serde::{de::DeserializeOwned, Serialize};

use crate::config::SupabaseConfig;

/// Supabase client for server-side database operations
/// Uses service_role key which bypasses RLS - handle with care!
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    service_role_key: String,
}

impl SupabaseClient {
    pub fn new(config: &SupabaseConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.url.trim_end_matches('/').to_string(),
            service_role_key: config.service_role_key.clone(),
        }
    }

    /// PostgREST URL for a table, with an optional query string
    fn rest_url(&self, table: &str, query: Option<&str>) -> String {
        match query {
            Some(q) if !q.is_empty() => format!("{}/rest/v1/{}?{}", self.base_url, table, q),
            _ => format!("{}/rest/v1/{}", self.base_url, table),
        }
    }

    fn authed(&self, request: RequestBuilder) -> RequestBuilder {
        request
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
            .header("Content-Type", "application/json")
    }

    /// Send and turn non-2xx statuses into [`StoreError::Api`]
    async fn send(request: RequestBuilder) -> Result<Response, StoreError> {
        let response = request.send().await.map_err(StoreError::Request)?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Select rows
    pub async fn get<T: DeserializeOwned>(&self, table: &str, query: &str) -> Result<Vec<T>, StoreError> {
        let request = self.authed(self.client.get(self.rest_url(table, Some(query))));
        Self::send(request)
            .await?
            .json()
            .await
            .map_err(StoreError::Parse)
    }

    /// Insert one row and read it back
    pub async fn insert<T: Serialize, R: DeserializeOwned>(
        &self,
        table: &str,
        data: &T,
    ) -> Result<R, StoreError> {
        let request = self
            .authed(self.client.post(self.rest_url(table, None)))
            .header("Prefer", "return=representation")
            .json(data);

        // PostgREST returns an array, get first element
        let rows: Vec<R> = Self::send(request)
            .await?
            .json()
            .await
            .map_err(StoreError::Parse)?;
        rows.into_iter().next().ok_or(StoreError::NoRowReturned)
    }

    /// Patch every row matching `query`
    pub async fn update<T: Serialize>(&self, table: &str, query: &str, data: &T) -> Result<(), StoreError> {
        let request = self
            .authed(self.client.patch(self.rest_url(table, Some(query))))
            .header("Prefer", "return=minimal")
            .json(data);
        Self::send(request).await.map(|_| ())
    }
}

/// Persistence errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    #[error("API error (status {status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse response: {0}")]
    Parse(reqwest::Error),

    #[error("No row returned from insert")]
    NoRowReturned,

    #[error("Invalid record: {0}")]
    Invalid(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rest_urls_trim_trailing_slash() {
        let client = SupabaseClient::new(&SupabaseConfig {
            url: "https://demo.supabase.co/".into(),
            service_role_key: "key".into(),
        });
        assert_eq!(
            client.rest_url("leaderboard", Some("mode=eq.solo")),
            "https://demo.supabase.co/rest/v1/leaderboard?mode=eq.solo"
        );
        assert_eq!(
            client.rest_url("leaderboard", None),
            "https://demo.supabase.co/rest/v1/leaderboard"
        );
    }
}
