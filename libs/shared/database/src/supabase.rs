use anyhow::{anyhow, Context, Result};
use reqwest::{
    header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE},
    Client, Method,
};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, error};

use shared_config::AppConfig;

/// REST client for the managed document store and its auth service.
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert(
            "apikey",
            HeaderValue::from_str(&self.anon_key).context("Invalid API key header")?,
        );
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = auth_token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .context("Invalid bearer token header")?,
            );
        }

        Ok(headers)
    }

    pub async fn request<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        self.request_with_headers(method, path, auth_token, body, None)
            .await
    }

    pub async fn request_with_headers<T>(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url).headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await?;
            error!("API error ({}): {}", status, error_text);

            return Err(match status.as_u16() {
                401 | 403 => anyhow!("Authentication error: {}", error_text),
                404 => anyhow!("Resource not found: {}", error_text),
                409 => anyhow!("Conflict: {}", error_text),
                _ => anyhow!("API error ({}): {}", status, error_text),
            });
        }

        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// `GET /rest/v1/{table}?{query}` decoded into rows.
    pub async fn select<T>(&self, table: &str, query: &str, auth_token: &str) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let path = if query.is_empty() {
            format!("/rest/v1/{}", table)
        } else {
            format!("/rest/v1/{}?{}", table, query)
        };

        let rows: Vec<Value> = self
            .request(Method::GET, &path, Some(auth_token), None)
            .await?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(Into::into))
            .collect()
    }

    pub async fn select_one<T>(&self, table: &str, query: &str, auth_token: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned,
    {
        let rows = self.select(table, query, auth_token).await?;
        Ok(rows.into_iter().next())
    }

    /// Inserts one document and returns the stored representation.
    pub async fn insert<T>(&self, table: &str, document: Value, auth_token: &str) -> Result<T>
    where
        T: DeserializeOwned,
    {
        let path = format!("/rest/v1/{}", table);
        let rows: Vec<Value> = self
            .request_with_headers(
                Method::POST,
                &path,
                Some(auth_token),
                Some(document),
                Some(representation_headers()),
            )
            .await?;

        let row = rows
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("Insert into {} returned no rows", table))?;

        Ok(serde_json::from_value(row)?)
    }

    /// Patches every document matching `filter` and returns the updated rows.
    /// An empty result means nothing matched the filter.
    pub async fn update<T>(
        &self,
        table: &str,
        filter: &str,
        changes: Value,
        auth_token: &str,
    ) -> Result<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let path = format!("/rest/v1/{}?{}", table, filter);
        let rows: Vec<Value> = self
            .request_with_headers(
                Method::PATCH,
                &path,
                Some(auth_token),
                Some(changes),
                Some(representation_headers()),
            )
            .await?;

        rows.into_iter()
            .map(|row| serde_json::from_value(row).map_err(Into::into))
            .collect()
    }

    /// Merges `data` into the auth user's `user_metadata`; tokens issued
    /// afterwards carry it.
    pub async fn update_user_metadata(&self, data: Value, auth_token: &str) -> Result<Value> {
        self.request::<Value>(
            Method::PUT,
            "/auth/v1/user",
            Some(auth_token),
            Some(json!({ "data": data })),
        )
        .await
    }

    pub fn get_base_url(&self) -> &str {
        &self.base_url
    }
}

fn representation_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert("Prefer", HeaderValue::from_static("return=representation"));
    headers
}
