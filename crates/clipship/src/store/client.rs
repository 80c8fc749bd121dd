//! HTTP client for the record store API.

use std::time::Duration;

use log::{debug, warn};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::config::StoreConfig;

use super::error::{Result, StoreError};
use super::record::RawRecord;

/// Default connect timeout for HTTP requests (10 seconds).
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Default request timeout for HTTP requests (30 seconds).
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Required prefix of a well-formed record identity.
const RECORD_ID_PREFIX: &str = "rec";

/// A short-lived tenant bearer token.
#[derive(Debug, Clone)]
pub struct Token(String);

impl Token {
    fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

#[derive(Debug, Deserialize)]
struct TokenExchangeResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    tenant_access_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListResponse {
    code: i64,
    #[serde(default)]
    msg: String,
    #[serde(default)]
    data: Option<ListPage>,
}

#[derive(Debug, Default, Deserialize)]
struct ListPage {
    #[serde(default)]
    items: Vec<RawRecord>,
    #[serde(default)]
    has_more: bool,
    #[serde(default)]
    page_token: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UpdateResponse {
    code: i64,
    #[serde(default)]
    msg: String,
}

/// Client for one bitable table.
///
/// Stateless apart from the reqwest connection pool; the tenant token is
/// held by the caller so one token can span a whole dispatch cycle.
pub struct TableClient {
    http: Client,
    config: StoreConfig,
}

impl TableClient {
    pub fn new(config: StoreConfig) -> Result<Self> {
        let http = Client::builder()
            .connect_timeout(DEFAULT_CONNECT_TIMEOUT)
            .timeout(DEFAULT_REQUEST_TIMEOUT)
            .build()
            .map_err(|e| StoreError::Auth(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    fn token_url(&self) -> String {
        format!(
            "{}/open-apis/auth/v3/tenant_access_token/internal/",
            self.config.base_url
        )
    }

    fn records_url(&self) -> String {
        format!(
            "{}/open-apis/bitable/v1/apps/{}/tables/{}/records",
            self.config.base_url, self.config.app_token, self.config.table_id
        )
    }

    /// Exchanges the application identity for a tenant token.
    pub async fn authenticate(&self) -> Result<Token> {
        let payload = json!({
            "app_id": self.config.app_id,
            "app_secret": self.config.app_secret,
        });

        let response = self
            .http
            .post(self.token_url())
            .json(&payload)
            .send()
            .await
            .map_err(|e| StoreError::Auth(format!("token request failed: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(StoreError::Auth(format!(
                "token request failed ({}): {}",
                status, body
            )));
        }

        let exchange: TokenExchangeResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Auth(format!("malformed token response: {}", e)))?;

        if exchange.code != 0 {
            return Err(StoreError::Auth(format!(
                "token exchange rejected (code {}): {}",
                exchange.code, exchange.msg
            )));
        }

        match exchange.tenant_access_token {
            Some(token) if !token.is_empty() => Ok(Token(token)),
            _ => Err(StoreError::Auth("token exchange returned no token".to_string())),
        }
    }

    /// Lists every record in the table, following cursor pagination until
    /// the store reports no further pages.
    pub async fn list_all(&self, token: &Token) -> Result<Vec<RawRecord>> {
        let mut items = Vec::new();
        let mut page_token: Option<String> = None;

        loop {
            let mut request = self
                .http
                .get(self.records_url())
                .header(reqwest::header::AUTHORIZATION, token.bearer())
                .query(&[("page_size", self.config.page_size.to_string())]);

            if let Some(view_id) = &self.config.view_id {
                request = request.query(&[("view_id", view_id)]);
            }
            if let Some(cursor) = &page_token {
                request = request.query(&[("page_token", cursor)]);
            }

            let response = request
                .send()
                .await
                .map_err(|e| StoreError::Fetch(format!("page request failed: {}", e)))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(StoreError::Fetch(format!(
                    "page request failed ({}): {}",
                    status, body
                )));
            }

            let page: ListResponse = response
                .json()
                .await
                .map_err(|e| StoreError::Fetch(format!("malformed page response: {}", e)))?;

            if page.code != 0 {
                return Err(StoreError::Fetch(format!(
                    "listing rejected (code {}): {}",
                    page.code, page.msg
                )));
            }

            let data = page.data.unwrap_or_default();
            items.extend(data.items);

            match (data.has_more, data.page_token) {
                (true, Some(cursor)) => page_token = Some(cursor),
                _ => break,
            }
        }

        debug!("Listed {} records from table", items.len());
        Ok(items)
    }

    /// Writes `fields` to one record, addressed by its store identity.
    ///
    /// Returns `Ok(false)` on business-level rejection (stale identity,
    /// deleted record, malformed id) so the caller can fall back to rescue
    /// relocation; `Err` is reserved for transport failures.
    pub async fn update_by_identity(
        &self,
        token: &Token,
        identity: &str,
        fields: &Map<String, Value>,
    ) -> Result<bool> {
        let Some(identity) = clean_identity(identity) else {
            warn!("Refusing write-back: record identity '{}' is malformed", identity);
            return Ok(false);
        };

        let payload = json!({
            "records": [{ "record_id": &identity, "fields": fields }],
        });

        let response = self
            .http
            .post(format!("{}/batch_update", self.records_url()))
            .header(reqwest::header::AUTHORIZATION, token.bearer())
            .json(&payload)
            .send()
            .await?;

        // The business code in the body is authoritative, not the HTTP
        // status: a stale identity typically comes back as a 2xx with a
        // non-zero code, and some deployments answer 404 with a body.
        let body: UpdateResponse = response
            .json()
            .await
            .map_err(|e| StoreError::Decode(format!("malformed update response: {}", e)))?;

        if body.code != 0 {
            warn!(
                "Write-back rejected for record '{}' (code {}): {}",
                identity, body.code, body.msg
            );
            return Ok(false);
        }

        Ok(true)
    }
}

/// Strips a record identity down to its alphanumeric characters and checks
/// the well-known prefix. Identities that fail this never reach the network.
fn clean_identity(raw: &str) -> Option<String> {
    let cleaned: String = raw.trim().chars().filter(|c| c.is_alphanumeric()).collect();
    if cleaned.starts_with(RECORD_ID_PREFIX) && cleaned.len() > RECORD_ID_PREFIX.len() {
        Some(cleaned)
    } else {
        None
    }
}
