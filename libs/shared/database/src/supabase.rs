use anyhow::{Result, anyhow, Context};
use reqwest::{
    Body,
    Client,
    header::{HeaderMap, HeaderName, HeaderValue, CONTENT_TYPE, AUTHORIZATION},
    Method,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, error};

use shared_config::AppConfig;

/// Thin client over the Supabase REST (PostgREST) and Storage APIs.
///
/// Server-side calls authenticate with the service-role key unless a caller
/// token is passed explicitly.
#[derive(Clone)]
pub struct SupabaseClient {
    client: Client,
    base_url: String,
    anon_key: String,
    service_key: String,
}

impl SupabaseClient {
    pub fn new(config: &AppConfig) -> Self {
        Self {
            client: Client::new(),
            base_url: config.supabase_url.trim_end_matches('/').to_string(),
            anon_key: config.supabase_anon_key.clone(),
            service_key: config.supabase_service_role_key.clone(),
        }
    }

    fn get_headers(&self, auth_token: Option<&str>) -> Result<HeaderMap> {
        let mut headers = HeaderMap::new();

        headers.insert("apikey", HeaderValue::from_str(&self.anon_key)
            .context("anon key is not a valid header value")?);
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        let token = auth_token.unwrap_or(&self.service_key);
        if !token.is_empty() {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .context("auth token is not a valid header value")?,
            );
        }

        Ok(headers)
    }

    async fn send(
        &self,
        method: Method,
        path: &str,
        auth_token: Option<&str>,
        body: Option<Value>,
        extra_headers: Option<HeaderMap>,
    ) -> Result<reqwest::Response> {
        let url = format!("{}{}", self.base_url, path);
        debug!("Making {} request to {}", method, url);

        let mut headers = self.get_headers(auth_token)?;
        if let Some(extra) = extra_headers {
            headers.extend(extra);
        }

        let mut req = self.client.request(method, &url)
            .headers(headers);

        if let Some(body_data) = body {
            req = req.json(&body_data);
        }

        let response = req.send().await?;
        Self::check_status(response).await
    }

    async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let error_text = response.text().await.unwrap_or_default();
        error!("API error ({}): {}", status, error_text);

        Err(match status.as_u16() {
            401 | 403 => anyhow!("Authentication error: {}", error_text),
            404 => anyhow!("Resource not found: {}", error_text),
            409 => anyhow!("Conflict: {}", error_text),
            _ => anyhow!("API error ({}): {}", status, error_text),
        })
    }

    pub async fn request<T>(&self, method: Method, path: &str,
                            auth_token: Option<&str>, body: Option<Value>)
                            -> Result<T>
    where T: DeserializeOwned {
        self.request_with_headers(method, path, auth_token, body, None).await
    }

    pub async fn request_with_headers<T>(&self, method: Method, path: &str,
                                         auth_token: Option<&str>, body: Option<Value>,
                                         headers: Option<HeaderMap>)
                                         -> Result<T>
    where T: DeserializeOwned {
        let response = self.send(method, path, auth_token, body, headers).await?;
        let data = response.json::<T>().await?;
        Ok(data)
    }

    /// Issues a request whose response body is irrelevant (e.g. DELETE).
    pub async fn execute(&self, method: Method, path: &str, body: Option<Value>) -> Result<()> {
        self.send(method, path, None, body, None).await?;
        Ok(())
    }

    /// `Prefer: return=representation`, so writes echo the stored rows.
    pub fn representation_headers() -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_static("prefer"),
            HeaderValue::from_static("return=representation"),
        );
        headers
    }

    /// Uploads an object into a Storage bucket and returns its public URL.
    pub async fn upload_object(
        &self,
        bucket: &str,
        object_path: &str,
        content_type: &str,
        body: Body,
    ) -> Result<String> {
        let url = format!("{}/storage/v1/object/{}/{}", self.base_url, bucket, object_path);
        debug!("Uploading object to {}", url);

        let mut headers = self.get_headers(None)?;
        headers.insert(CONTENT_TYPE, HeaderValue::from_str(content_type)
            .context("content type is not a valid header value")?);
        headers.insert(HeaderName::from_static("x-upsert"), HeaderValue::from_static("false"));

        let response = self.client.post(&url)
            .headers(headers)
            .body(body)
            .send()
            .await?;
        Self::check_status(response).await?;

        Ok(self.get_public_url(bucket, object_path))
    }

    pub fn get_public_url(&self, bucket: &str, object_path: &str) -> String {
        format!("{}/storage/v1/object/public/{}/{}", self.base_url, bucket, object_path)
    }
}
