use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;

use crate::common::{debug, ErrorKind};
use crate::sink::{to_lines, Point, Sink};
use crate::Result;

// InfluxDB connection configuration.
#[derive(Deserialize, Default, Clone)]
pub struct Config {
    // Base url of the InfluxDB v2 api.
    url: Option<String>,
    // Api token. Sent as `Authorization: Token <token>`.
    token: Option<String>,
    // Organization name or id.
    org: Option<String>,
    // Destination bucket.
    bucket: Option<String>,
    // Measurement name for battery points.
    measurement: Option<String>,
    // Request timeout.
    timeout_milliseconds: Option<u64>,
}

impl Config {
    const DEFAULT_URL: &'static str = "http://localhost:8086";
    const DEFAULT_BUCKET: &'static str = "batteries";
    const DEFAULT_MEASUREMENT: &'static str = "ut1300";
    const DEFAULT_TIMEOUT_MILLISECONDS: u64 = 5000;

    pub fn set_url(&mut self, val: &mut Option<String>) {
        if let Some(val) = val.take() {
            self.url = Some(val)
        }
    }
    pub fn set_token(&mut self, val: &mut Option<String>) {
        if let Some(val) = val.take() {
            self.token = Some(val)
        }
    }
    pub fn set_org(&mut self, val: &mut Option<String>) {
        if let Some(val) = val.take() {
            self.org = Some(val)
        }
    }
    pub fn set_bucket(&mut self, val: &mut Option<String>) {
        if let Some(val) = val.take() {
            self.bucket = Some(val)
        }
    }
    pub fn set_measurement(&mut self, val: &mut Option<String>) {
        if let Some(val) = val.take() {
            self.measurement = Some(val)
        }
    }
    pub fn set_timeout_milliseconds(&mut self, val: Option<u64>) {
        if let Some(val) = val {
            self.timeout_milliseconds = Some(std::cmp::max(val, 100));
        }
    }
    pub(crate) fn override_merge(&mut self, other: &mut Config) {
        self.set_url(&mut other.url);
        self.set_token(&mut other.token);
        self.set_org(&mut other.org);
        self.set_bucket(&mut other.bucket);
        self.set_measurement(&mut other.measurement);
        self.set_timeout_milliseconds(other.timeout_milliseconds);
    }

    fn url(&self) -> &str {
        self.url.as_deref().unwrap_or(Config::DEFAULT_URL)
    }

    fn bucket(&self) -> &str {
        self.bucket.as_deref().unwrap_or(Config::DEFAULT_BUCKET)
    }

    pub fn measurement(&self) -> &str {
        self.measurement
            .as_deref()
            .unwrap_or(Config::DEFAULT_MEASUREMENT)
    }

    fn timeout(&self) -> Duration {
        Duration::from_millis(
            self.timeout_milliseconds
                .unwrap_or(Config::DEFAULT_TIMEOUT_MILLISECONDS),
        )
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_struct("Config")
            .field("url", &self.url)
            .field("token", &self.token.as_ref().map(|_| "********"))
            .field("org", &self.org)
            .field("bucket", &self.bucket)
            .field("measurement", &self.measurement)
            .field("timeout_milliseconds", &self.timeout_milliseconds)
            .finish()
    }
}

/// Writes points to the InfluxDB v2 write api.
pub struct InfluxDb {
    client: reqwest::Client,
    write_url: String,
    token: Option<String>,
    org: Option<String>,
    bucket: String,
}

impl InfluxDb {
    pub fn new(config: &Config) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .build()?;

        Ok(Self {
            client,
            write_url: format!("{}/api/v2/write", config.url().trim_end_matches('/')),
            token: config.token.clone(),
            org: config.org.clone(),
            bucket: config.bucket().to_owned(),
        })
    }
}

#[async_trait]
impl Sink for InfluxDb {
    async fn write(&self, points: &[Point]) -> Result<()> {
        let body = to_lines(points);
        if body.is_empty() {
            return Ok(());
        }

        let mut query = vec![("bucket", self.bucket.as_str()), ("precision", "ns")];
        if let Some(org) = self.org.as_deref() {
            query.push(("org", org));
        }

        let mut request = self
            .client
            .post(&self.write_url)
            .query(&query)
            .header(CONTENT_TYPE, "text/plain; charset=utf-8")
            .body(body);
        if let Some(token) = self.token.as_deref() {
            request = request.header(AUTHORIZATION, format!("Token {}", token));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ErrorKind::InfluxWrite {
                status: status.as_u16(),
                body,
            }
            .into());
        }

        debug!(points = points.len(), bucket = %self.bucket, "Wrote points");
        Ok(())
    }
}
