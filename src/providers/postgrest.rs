use crate::core::table::{Record, TableSource};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, error, instrument};

/// Reads whole tables through a PostgREST endpoint, such as the REST API of
/// a Supabase project.
pub struct PostgrestTableSource {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl PostgrestTableSource {
    pub fn new(base_url: &str, api_key: &str, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent("fxclose/0.1")
            .timeout(timeout)
            .build()?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client,
        })
    }
}

#[async_trait]
impl TableSource for PostgrestTableSource {
    #[instrument(name = "PostgrestFetch", skip(self))]
    async fn fetch_all(&self, table: &str) -> Result<Vec<Record>> {
        let url = format!("{}/rest/v1/{}?select=*", self.base_url, table);
        debug!("Requesting table from {}", url);

        let response = self
            .client
            .get(&url)
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| anyhow!("Request error: {} for table: {}", e, table))?;

        if !response.status().is_success() {
            return Err(anyhow!(
                "HTTP error: {} for table: {}",
                response.status(),
                table
            ));
        }

        let response_text = response
            .text()
            .await
            .with_context(|| format!("Failed to get response text for table: {table}"))?;

        match serde_json::from_str::<Vec<Record>>(&response_text) {
            Ok(rows) => {
                debug!(rows = rows.len(), "Fetched table");
                Ok(rows)
            }
            Err(e) => {
                error!(
                    error = ?e,
                    response = %response_text,
                    "Failed to parse table response"
                );
                Err(e).with_context(|| format!("Failed to parse rows of table: {table}"))
            }
        }
    }
}
