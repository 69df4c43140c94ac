//! Recorded HTTP client
//!
//! Every request returns the decoded-ready body together with a `CommandRecord`
//! (command = URL, raw data = body) so fetchers never build provenance by hand.
//! Headers from configuration are injected into every request. POST bodies are
//! recorded as parameters: each field of a JSON object becomes one parameter.

use std::str::FromStr;

use gs_common::CommandRecord;
use gs_config::HttpConfig;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::link_header::Links;
use crate::{ConnectorError, ConnectorResult};

/// A successful response and its provenance record.
#[derive(Debug, Clone)]
pub struct RecordedResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: String,
    pub record: CommandRecord,
}

impl RecordedResponse {
    pub fn json<T: DeserializeOwned>(&self) -> ConnectorResult<T> {
        Ok(serde_json::from_str(&self.body)?)
    }

    pub fn links(&self) -> Links {
        Links::from_headers(&self.headers)
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

#[derive(Debug, Clone)]
pub struct RecordedHttpClient {
    client: Client,
}

impl RecordedHttpClient {
    pub fn new(config: &HttpConfig) -> ConnectorResult<Self> {
        let headers = header_map(config.headers.iter())?;

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(config.user_agent.as_str())
            .default_headers(headers)
            .build()?;

        info!(
            timeout_ms = config.timeout_ms,
            injected_headers = config.headers.len(),
            "RecordedHttpClient initialized"
        );

        Ok(Self { client })
    }

    /// Wrap a preconfigured client, e.g. one that attaches OAuth tokens.
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }

    pub async fn get(&self, url: &str) -> ConnectorResult<RecordedResponse> {
        self.get_with_headers(url, HeaderMap::new()).await
    }

    /// GET with per-request headers on top of the injected ones. The extra
    /// headers are recorded as parameters of the command.
    pub async fn get_with_headers(
        &self,
        url: &str,
        extra: HeaderMap,
    ) -> ConnectorResult<RecordedResponse> {
        let mut record = CommandRecord::new(url);
        for (name, value) in &extra {
            if let Ok(value) = value.to_str() {
                record = record.with_parameter(name.as_str(), value);
            }
        }

        debug!(url = %url, "GET");
        self.send(self.client.get(url).headers(extra), url, record).await
    }

    /// POST a JSON body. Any status of 400 or above is an error.
    pub async fn post_json<B>(&self, url: &str, body: &B) -> ConnectorResult<RecordedResponse>
    where
        B: Serialize + ?Sized,
    {
        let value = serde_json::to_value(body)?;
        let record = match &value {
            Value::Object(fields) => fields
                .iter()
                .fold(CommandRecord::new(url), |record, (name, field)| {
                    record.with_parameter(name.as_str(), field.clone())
                }),
            other => CommandRecord::new(url).with_parameter("body", other.clone()),
        };

        debug!(url = %url, "POST");
        self.send(self.client.post(url).json(&value), url, record).await
    }

    /// Run a GraphQL query and decode the response body.
    ///
    /// Only a 200 response is accepted. `query` and `variables` are recorded
    /// as parameters.
    pub async fn graphql<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &str,
        variables: Value,
    ) -> ConnectorResult<(T, RecordedResponse)> {
        let body = serde_json::json!({ "query": query, "variables": variables });
        let response = self.post_json(url, &body).await?;
        if response.status != StatusCode::OK.as_u16() {
            warn!(url = %url, status = response.status, "GraphQL request not answered with 200");
            return Err(ConnectorError::Http {
                status: response.status,
                body: response.body,
            });
        }
        let value = response.json()?;
        Ok((value, response))
    }

    async fn send(
        &self,
        request: RequestBuilder,
        url: &str,
        record: CommandRecord,
    ) -> ConnectorResult<RecordedResponse> {
        let response = request.send().await?;

        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.text().await?;

        if status >= 400 {
            warn!(url = %url, status, "Request rejected by source");
            return Err(ConnectorError::Http { status, body });
        }

        let record = record.with_raw_data(body.as_str());
        Ok(RecordedResponse {
            status,
            headers,
            body,
            record,
        })
    }

    /// GET and decode a JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
    ) -> ConnectorResult<(T, RecordedResponse)> {
        let response = self.get(url).await?;
        let value = response.json()?;
        Ok((value, response))
    }
}

pub(crate) fn header_map<'a, I>(headers: I) -> ConnectorResult<HeaderMap>
where
    I: IntoIterator<Item = (&'a String, &'a String)>,
{
    let mut map = HeaderMap::new();
    for (name, value) in headers {
        let name = HeaderName::from_str(name)
            .map_err(|e| ConnectorError::Config(format!("header name '{}': {}", name, e)))?;
        let value = HeaderValue::from_str(value)
            .map_err(|e| ConnectorError::Config(format!("header '{}' value: {}", name, e)))?;
        map.append(name, value);
    }
    Ok(map)
}
