//! HTTP client for the isyd daemon.

use anyhow::{Context, Result};
use isy_common::InvocationResult;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

/// Payload returned by `GET /health`.
#[derive(Debug, Deserialize)]
pub struct HealthReport {
    pub status: String,
    pub service: String,
    pub version: String,
    pub uptime_seconds: u64,
}

/// Client for the isyd HTTP API.
pub struct IsydClient {
    http: reqwest::Client,
    base_url: String,
}

impl IsydClient {
    /// An orchestration round trip can take several model turns, so the
    /// command timeout is generous. Health checks get a short one.
    pub fn new(server: &str) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(120))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            http,
            base_url: server.trim_end_matches('/').to_string(),
        })
    }

    /// Check that the daemon is up and answering.
    pub async fn health(&self) -> Result<HealthReport> {
        let url = format!("{}/health", self.base_url);
        let resp = self
            .http
            .get(&url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
            .map_err(|e| unreachable_hint(&self.base_url, e))?;

        let resp = resp
            .error_for_status()
            .context("Server trả về trạng thái lỗi")?;

        resp.json::<HealthReport>()
            .await
            .context("Không đọc được phản hồi health từ server")
    }

    /// Send one tutor command and wait for the full invocation result.
    pub async fn command(&self, prompt: &str) -> Result<InvocationResult> {
        let url = format!("{}/tutor-command", self.base_url);
        let resp = self
            .http
            .post(&url)
            .json(&json!({ "prompt": prompt }))
            .send()
            .await
            .map_err(|e| unreachable_hint(&self.base_url, e))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            anyhow::bail!("Lỗi API: {} - {}", status.as_u16(), body);
        }

        resp.json::<InvocationResult>()
            .await
            .context("Không đọc được phản hồi lệnh từ server")
    }
}

/// Wrap a transport error with a hint the tutor can act on.
fn unreachable_hint(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    let hint = if error.is_timeout() {
        "Yêu cầu hết thời gian chờ. Vui lòng thử lại.".to_string()
    } else {
        format!(
            "Không thể kết nối đến server tại {}. Vui lòng kiểm tra lại isyd.",
            base_url
        )
    };
    anyhow::Error::new(error).context(hint)
}
