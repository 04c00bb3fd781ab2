//! Instance Manager: maps `function id -> running container with a known
//! external URL`, reconciling desired state (at least one running container)
//! against the daemon's observed state.
//!
//! See the state machine in the specification's §4.8: `absent -> starting ->
//! running-unpublished -> running-published -> ready`, with the reaper and
//! any create/start failure able to send it back to `absent`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use faas_common::{FaasError, FunctionConfig, Result};
use tokio::time::sleep;
use tracing::{info, instrument};

use crate::runtime::{ContainerRuntimePort, CreateParams, FUNCTION_ID_LABEL};

const URL_RESOLUTION_CEILING: Duration = Duration::from_secs(5);
const URL_RESOLUTION_STEP: Duration = Duration::from_secs(2);

/// Selects the launch command and expected binary basename for an image
/// family. Only `golang` and `jdk` images are supported by the core.
fn launch_params_for_image(image: &str) -> Result<(Vec<String>, &'static str, &'static str)> {
    if image.contains("golang") {
        Ok((vec!["/bootstrap".to_string()], "bootstrap", "/bootstrap"))
    } else if image.contains("jdk") {
        Ok((
            vec![
                "/bin/sh".to_string(),
                "-c".to_string(),
                "java -jar /bootstrap.jar".to_string(),
            ],
            "bootstrap.jar",
            "/bootstrap.jar",
        ))
    } else {
        Err(FaasError::Validation(format!(
            "unsupported image family: {image}"
        )))
    }
}

pub struct InstanceManager {
    runtime: Arc<dyn ContainerRuntimePort>,
    artifact_root: String,
    url_resolution_ceiling: Duration,
}

impl InstanceManager {
    pub fn new(runtime: Arc<dyn ContainerRuntimePort>, artifact_root: String) -> Self {
        Self {
            runtime,
            artifact_root,
            url_resolution_ceiling: URL_RESOLUTION_CEILING,
        }
    }

    /// Overrides the default 5 s URL-resolution wall-clock ceiling with the
    /// deployment-configured `url_resolution_timeout` (§6).
    pub fn with_url_resolution_timeout(mut self, ceiling: Duration) -> Self {
        self.url_resolution_ceiling = ceiling;
        self
    }

    /// Resolution procedure from §4.3: returns a container id such that the
    /// function is running.
    #[instrument(skip(self, config), fields(external_id))]
    pub async fn ensure_container(
        &self,
        external_id: &str,
        config: &FunctionConfig,
    ) -> Result<String> {
        let containers = self.runtime.list_all().await?;
        let existing = containers
            .into_iter()
            .find(|c| c.labels.get(FUNCTION_ID_LABEL).map(String::as_str) == Some(external_id));

        if let Some(container) = existing {
            use crate::runtime::ContainerState;
            if container.state == ContainerState::Running {
                info!(container_id = %container.id, "warm hit");
                return Ok(container.id);
            }

            info!(container_id = %container.id, "cold hit, starting");
            self.runtime.start(&container.id).await?;
            return Ok(container.id);
        }

        info!("no container found, creating one");
        self.create_and_start(external_id, config).await
    }

    async fn create_and_start(&self, external_id: &str, config: &FunctionConfig) -> Result<String> {
        let (cmd, basename, bind_target) = launch_params_for_image(&config.image)?;
        let port = config
            .port
            .ok_or_else(|| FaasError::Validation("REST function requires a port".to_string()))?;

        let bind_source = format!("{}/{}/{}", self.artifact_root, external_id, basename);
        let exposed_port = format!("{port}/tcp");

        let mut labels = HashMap::new();
        labels.insert(FUNCTION_ID_LABEL.to_string(), external_id.to_string());

        let id = self
            .runtime
            .create(CreateParams {
                image: &config.image,
                cmd,
                labels,
                exposed_port,
                bind_source: &bind_source,
                bind_target,
                env_vars: &config.env_vars,
            })
            .await?;

        self.runtime.start(&id).await?;
        Ok(id)
    }

    /// Single-attempt URL resolution (§4.3, "URL resolution — distinct
    /// operation"). Fails with `Docker` if the daemon has not yet published
    /// the configured port.
    pub async fn resolve_url(&self, container_id: &str, config: &FunctionConfig) -> Result<String> {
        let port = config
            .port
            .ok_or_else(|| FaasError::Validation("REST function requires a port".to_string()))?;
        let key = format!("{port}/tcp");

        let ports = self.runtime.inspect_ports(container_id).await?;
        let bindings = ports.get(&key).filter(|b| !b.is_empty());

        match bindings.and_then(|b| b.first()) {
            Some(binding) if !binding.host_port.is_empty() => {
                Ok(format!("http://localhost:{}", binding.host_port))
            }
            _ => Err(FaasError::Docker(format!(
                "port {key} not yet bound for container {container_id}"
            ))),
        }
    }

    /// Retries [`Self::resolve_url`] every [`URL_RESOLUTION_STEP`] up to
    /// [`URL_RESOLUTION_CEILING`], because the daemon publishes port
    /// bindings asynchronously after `start`.
    pub async fn resolve_url_with_retry(
        &self,
        container_id: &str,
        config: &FunctionConfig,
    ) -> Result<String> {
        let deadline = tokio::time::Instant::now() + self.url_resolution_ceiling;
        loop {
            match self.resolve_url(container_id, config).await {
                Ok(url) => return Ok(url),
                Err(e) => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(e);
                    }
                    sleep(URL_RESOLUTION_STEP).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::{ContainerInstance, ContainerState, HostBinding, PortMap};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockRuntime {
        containers: Mutex<Vec<ContainerInstance>>,
        create_calls: AtomicUsize,
        start_calls: AtomicUsize,
        ports: Mutex<PortMap>,
    }

    #[async_trait]
    impl ContainerRuntimePort for MockRuntime {
        async fn list_all(&self) -> Result<Vec<ContainerInstance>> {
            Ok(self.containers.lock().unwrap().clone())
        }

        async fn list_by_label(&self, key: &str, value: &str) -> Result<Vec<ContainerInstance>> {
            Ok(self
                .containers
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.labels.get(key).map(String::as_str) == Some(value))
                .cloned()
                .collect())
        }

        async fn create(&self, params: CreateParams<'_>) -> Result<String> {
            self.create_calls.fetch_add(1, Ordering::SeqCst);
            let id = format!("container-{}", self.create_calls.load(Ordering::SeqCst));
            self.containers.lock().unwrap().push(ContainerInstance {
                id: id.clone(),
                state: ContainerState::Created,
                labels: params.labels,
            });
            Ok(id)
        }

        async fn start(&self, id: &str) -> Result<()> {
            self.start_calls.fetch_add(1, Ordering::SeqCst);
            let mut containers = self.containers.lock().unwrap();
            if let Some(c) = containers.iter_mut().find(|c| c.id == id) {
                c.state = ContainerState::Running;
            }
            Ok(())
        }

        async fn stop(&self, id: &str, _timeout: Option<Duration>) -> Result<()> {
            let mut containers = self.containers.lock().unwrap();
            if let Some(c) = containers.iter_mut().find(|c| c.id == id) {
                c.state = ContainerState::Exited;
            }
            Ok(())
        }

        async fn inspect_ports(&self, _id: &str) -> Result<PortMap> {
            Ok(self.ports.lock().unwrap().clone())
        }
    }

    fn rest_config() -> FunctionConfig {
        FunctionConfig {
            trigger: faas_common::Trigger::Http,
            func_type: faas_common::FunctionType::Rest,
            image: "golang:1.22".to_string(),
            port: Some(6969),
            env_vars: Default::default(),
        }
    }

    #[tokio::test]
    async fn cold_start_creates_and_starts() {
        let runtime = Arc::new(MockRuntime::default());
        let manager = InstanceManager::new(runtime.clone(), "/artifacts".to_string());

        let id = manager.ensure_container("abc", &rest_config()).await.unwrap();
        assert_eq!(id, "container-1");
        assert_eq!(runtime.create_calls.load(Ordering::SeqCst), 1);
        assert_eq!(runtime.start_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn warm_reuse_does_not_create() {
        let runtime = Arc::new(MockRuntime::default());
        let manager = InstanceManager::new(runtime.clone(), "/artifacts".to_string());

        let first = manager.ensure_container("abc", &rest_config()).await.unwrap();
        let second = manager.ensure_container("abc", &rest_config()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(runtime.create_calls.load(Ordering::SeqCst), 1);
        // One start from the cold start, none extra on warm reuse.
        assert_eq!(runtime.start_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn cold_hit_starts_without_create() {
        let runtime = Arc::new(MockRuntime::default());
        {
            let mut labels = HashMap::new();
            labels.insert(FUNCTION_ID_LABEL.to_string(), "abc".to_string());
            runtime.containers.lock().unwrap().push(ContainerInstance {
                id: "existing".to_string(),
                state: ContainerState::Exited,
                labels,
            });
        }
        let manager = InstanceManager::new(runtime.clone(), "/artifacts".to_string());

        let id = manager.ensure_container("abc", &rest_config()).await.unwrap();
        assert_eq!(id, "existing");
        assert_eq!(runtime.create_calls.load(Ordering::SeqCst), 0);
        assert_eq!(runtime.start_calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unsupported_image_family_fails_validation() {
        let runtime = Arc::new(MockRuntime::default());
        let manager = InstanceManager::new(runtime, "/artifacts".to_string());

        let mut config = rest_config();
        config.image = "alpine:latest".to_string();

        let err = manager.ensure_container("abc", &config).await.unwrap_err();
        assert!(matches!(err, FaasError::Validation(_)));
    }

    #[tokio::test]
    async fn resolve_url_fails_until_port_published() {
        let runtime = Arc::new(MockRuntime::default());
        let manager = InstanceManager::new(runtime.clone(), "/artifacts".to_string());
        let config = rest_config();

        let err = manager.resolve_url("container-1", &config).await.unwrap_err();
        assert!(matches!(err, FaasError::Docker(_)));

        runtime.ports.lock().unwrap().insert(
            "6969/tcp".to_string(),
            vec![HostBinding {
                host_ip: "0.0.0.0".to_string(),
                host_port: "32768".to_string(),
            }],
        );

        let url = manager.resolve_url("container-1", &config).await.unwrap();
        assert_eq!(url, "http://localhost:32768");
    }

    #[tokio::test]
    async fn resolve_url_with_retry_respects_overridden_ceiling() {
        let runtime = Arc::new(MockRuntime::default());
        let manager = InstanceManager::new(runtime, "/artifacts".to_string())
            .with_url_resolution_timeout(Duration::from_millis(50));
        let config = rest_config();

        let start = tokio::time::Instant::now();
        let err = manager
            .resolve_url_with_retry("container-1", &config)
            .await
            .unwrap_err();
        assert!(matches!(err, FaasError::Docker(_)));
        // The default ceiling (5s) would need 3 retry steps (~6s) to give
        // up; the overridden 50ms ceiling gives up after a single step
        // (~2s), well under the default's timeline.
        assert!(start.elapsed() < Duration::from_secs(4));
    }
}
