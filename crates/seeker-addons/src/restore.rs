//! Client for an external face-restoration service.
//!
//! The service contract is a JSON POST of
//! `{image: <base64>, fidelity: 0..1, task: "face_restoration"}`
//! answered by `{image: <base64>}`. Anything else (non-2xx, schema
//! mismatch, transport failure) is treated as the service being
//! unavailable; one retry, no more.

use crate::error::{AddonError, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use seeker_core::FaceRestoreConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

#[derive(Serialize)]
struct RestoreRequest {
    image: String,
    fidelity: f32,
    task: &'static str,
}

#[derive(Deserialize)]
struct RestoreResponse {
    image: String,
}

/// Client for the optional restoration endpoint.
pub struct FaceRestoreClient {
    url: String,
    timeout: Duration,
    client: reqwest::Client,
}

impl FaceRestoreClient {
    /// Build the client when an endpoint is configured.
    #[must_use]
    pub fn from_config(config: &FaceRestoreConfig) -> Option<Self> {
        let url = config.url.as_deref()?.trim().to_string();
        if url.is_empty() {
            return None;
        }

        Some(Self {
            url,
            timeout: Duration::from_secs(config.timeout_secs),
            client: reqwest::Client::new(),
        })
    }

    /// Restore a face image; `fidelity` is clamped to 0..1.
    ///
    /// # Errors
    /// Returns [`AddonError::Unavailable`] for any failure mode.
    pub async fn restore(&self, image: &[u8], fidelity: f32) -> Result<Vec<u8>> {
        let request = RestoreRequest {
            image: BASE64.encode(image),
            fidelity: fidelity.clamp(0.0, 1.0),
            task: "face_restoration",
        };

        // At most one retry on a failed attempt.
        for attempt in 0..2 {
            match self.attempt(&request).await {
                Ok(bytes) => return Ok(bytes),
                Err(e) => {
                    debug!(attempt, error = %e, "face restoration attempt failed");
                }
            }
        }

        Err(AddonError::Unavailable)
    }

    async fn attempt(&self, request: &RestoreRequest) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(&self.url)
            .timeout(self.timeout)
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(AddonError::BadStatus(response.status().as_u16()));
        }

        let payload: RestoreResponse = response
            .json()
            .await
            .map_err(|_| AddonError::Unavailable)?;

        BASE64
            .decode(payload.image.as_bytes())
            .map_err(|_| AddonError::Unavailable)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use httptest::{matchers::*, responders::*, Expectation, Server};

    fn client_for(server: &Server) -> FaceRestoreClient {
        let config = FaceRestoreConfig {
            url: Some(format!("http://{}/restore", server.addr())),
            timeout_secs: 5,
        };
        FaceRestoreClient::from_config(&config).expect("configured client")
    }

    #[test]
    fn test_unconfigured_is_none() {
        assert!(FaceRestoreClient::from_config(&FaceRestoreConfig::default()).is_none());
        assert!(FaceRestoreClient::from_config(&FaceRestoreConfig {
            url: Some("  ".to_string()),
            timeout_secs: 5,
        })
        .is_none());
    }

    #[tokio::test]
    async fn test_successful_restore_roundtrip() {
        let server = Server::run();
        let restored = BASE64.encode(b"restored-bytes");
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/restore"),
                request::body(json_decoded(eq(serde_json::json!({
                    "image": BASE64.encode(b"input"),
                    "fidelity": 0.5,
                    "task": "face_restoration",
                })))),
            ])
            .respond_with(
                status_code(200).body(format!("{{\"image\": \"{restored}\"}}")),
            ),
        );

        let client = client_for(&server);
        let out = client.restore(b"input", 0.5).await.expect("restore");
        assert_eq!(out, b"restored-bytes");
    }

    #[tokio::test]
    async fn test_non_2xx_is_unavailable_after_one_retry() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/restore"))
                .times(2)
                .respond_with(status_code(500)),
        );

        let client = client_for(&server);
        let err = client.restore(b"input", 0.5).await.unwrap_err();
        assert!(matches!(err, AddonError::Unavailable));
    }

    #[tokio::test]
    async fn test_schema_mismatch_is_unavailable() {
        let server = Server::run();
        server.expect(
            Expectation::matching(request::method_path("POST", "/restore"))
                .times(2)
                .respond_with(status_code(200).body(r#"{"unexpected": true}"#)),
        );

        let client = client_for(&server);
        let err = client.restore(b"input", 0.5).await.unwrap_err();
        assert!(matches!(err, AddonError::Unavailable));
    }

    #[tokio::test]
    async fn test_fidelity_clamped() {
        let server = Server::run();
        let restored = BASE64.encode(b"ok");
        server.expect(
            Expectation::matching(all_of![
                request::method_path("POST", "/restore"),
                request::body(json_decoded(eq(serde_json::json!({
                    "image": BASE64.encode(b"input"),
                    "fidelity": 1.0,
                    "task": "face_restoration",
                })))),
            ])
            .respond_with(
                status_code(200).body(format!("{{\"image\": \"{restored}\"}}")),
            ),
        );

        let client = client_for(&server);
        client.restore(b"input", 7.0).await.expect("restore");
    }
}
