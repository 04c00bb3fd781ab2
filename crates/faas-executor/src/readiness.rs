//! Readiness Prober: a bounded retry loop that decides when a freshly
//! started container is actually serving, as distinct from the Instance
//! Manager's URL-availability wait (a container-runtime property vs. a
//! function property — see §4.4).

use std::time::Duration;

use faas_common::{FaasError, Result};
use tokio::time::sleep;
use tracing::{debug, instrument};

const DEFAULT_STEP: Duration = Duration::from_secs(2);
const DEFAULT_CEILING: Duration = Duration::from_secs(30);

pub struct ReadinessProber {
    client: reqwest::Client,
    step: Duration,
    ceiling: Duration,
}

impl Default for ReadinessProber {
    fn default() -> Self {
        Self::new(DEFAULT_STEP, DEFAULT_CEILING)
    }
}

impl ReadinessProber {
    pub fn new(step: Duration, ceiling: Duration) -> Self {
        Self {
            client: reqwest::Client::new(),
            step,
            ceiling,
        }
    }

    /// Polls `GET {base_url}/health` until it returns 200, retrying on any
    /// transport error or non-200 status every `step` up to `ceiling`.
    #[instrument(skip(self))]
    pub async fn wait_ready(&self, base_url: &str) -> Result<()> {
        let health_url = format!("{base_url}/health");
        let deadline = tokio::time::Instant::now() + self.ceiling;

        loop {
            match self.client.get(&health_url).send().await {
                Ok(resp) if resp.status().is_success() => return Ok(()),
                Ok(resp) => debug!(status = %resp.status(), "health check not ready"),
                Err(e) => debug!(error = %e, "health check transport error"),
            }

            if tokio::time::Instant::now() >= deadline {
                return Err(FaasError::Docker(format!(
                    "{base_url} did not become ready within {:?}",
                    self.ceiling
                )));
            }
            sleep(self.step).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn succeeds_once_health_returns_200() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/health")
            .with_status(200)
            .create_async()
            .await;

        let prober = ReadinessProber::new(Duration::from_millis(50), Duration::from_secs(2));
        prober.wait_ready(&server.url()).await.unwrap();
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn non_200_status_is_treated_as_not_ready() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/health")
            .with_status(503)
            .expect_at_least(2)
            .create_async()
            .await;

        let prober = ReadinessProber::new(Duration::from_millis(20), Duration::from_millis(100));
        let err = prober.wait_ready(&server.url()).await.unwrap_err();
        assert!(matches!(err, FaasError::Docker(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn exhausts_ceiling_and_fails() {
        let server = mockito::Server::new_async().await;
        // No mock registered: every request 404s, never 200.
        let prober = ReadinessProber::new(Duration::from_millis(20), Duration::from_millis(80));
        let err = prober.wait_ready(&server.url()).await.unwrap_err();
        assert!(matches!(err, FaasError::Docker(_)));
    }
}
