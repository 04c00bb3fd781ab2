//! Container Runtime Port: the minimal capability set the core consumes
//! from the host container daemon, plus the `bollard`-backed implementation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use bollard::container::{
    Config as BollardConfig, CreateContainerOptions, ListContainersOptions,
    StopContainerOptions,
};
use bollard::models::{HostConfig, PortBinding as BollardPortBinding};
use bollard::Docker;
use faas_common::{FaasError, Result};
use tracing::{info, instrument, warn};

pub const FUNCTION_ID_LABEL: &str = "function_id";

/// Runtime-observed lifecycle of a container. Only `Running` is directly
/// usable by the Instance Manager.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerState {
    Created,
    Running,
    Exited,
    Other,
}

impl From<&str> for ContainerState {
    fn from(s: &str) -> Self {
        match s {
            "created" => ContainerState::Created,
            "running" => ContainerState::Running,
            "exited" => ContainerState::Exited,
            _ => ContainerState::Other,
        }
    }
}

/// A single published host binding for one container port.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostBinding {
    pub host_ip: String,
    pub host_port: String,
}

/// Projection over the container runtime's view of one container.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContainerInstance {
    pub id: String,
    pub state: ContainerState,
    pub labels: HashMap<String, String>,
}

/// Parameters for launching a new container for a function.
pub struct CreateParams<'a> {
    pub image: &'a str,
    pub cmd: Vec<String>,
    pub labels: HashMap<String, String>,
    /// `{container_port}/tcp`
    pub exposed_port: String,
    /// host path to bind read-only into the container, mapped to `bind_target`
    pub bind_source: &'a str,
    pub bind_target: &'a str,
    pub env_vars: &'a HashMap<String, String>,
}

/// Resolved port bindings for one container, keyed by `{port}/tcp`.
pub type PortMap = HashMap<String, Vec<HostBinding>>;

/// Abstraction over the host container daemon consumed by the core.
///
/// No operation here is required to be transactional; all failures surface
/// as [`FaasError::Docker`].
#[async_trait]
pub trait ContainerRuntimePort: Send + Sync {
    async fn list_all(&self) -> Result<Vec<ContainerInstance>>;
    async fn list_by_label(&self, key: &str, value: &str) -> Result<Vec<ContainerInstance>>;
    async fn create(&self, params: CreateParams<'_>) -> Result<String>;
    async fn start(&self, id: &str) -> Result<()>;
    async fn stop(&self, id: &str, timeout: Option<Duration>) -> Result<()>;
    async fn inspect_ports(&self, id: &str) -> Result<PortMap>;
}

/// `bollard`-backed implementation talking to the local Docker daemon.
pub struct DockerRuntime {
    docker: Docker,
}

impl DockerRuntime {
    pub fn new(docker: Docker) -> Self {
        Self { docker }
    }

    pub fn connect_local() -> Result<Self> {
        let docker = Docker::connect_with_local_defaults()
            .map_err(|e| FaasError::Docker(format!("failed to connect to docker daemon: {e}")))?;
        Ok(Self::new(docker))
    }
}

#[async_trait]
impl ContainerRuntimePort for DockerRuntime {
    #[instrument(skip(self))]
    async fn list_all(&self) -> Result<Vec<ContainerInstance>> {
        let summaries = self
            .docker
            .list_containers(Some(ListContainersOptions::<String> {
                all: true,
                ..Default::default()
            }))
            .await
            .map_err(|e| FaasError::Docker(format!("list_containers failed: {e}")))?;

        Ok(summaries
            .into_iter()
            .map(|c| ContainerInstance {
                id: c.id.unwrap_or_default(),
                state: c.state.as_deref().unwrap_or("").into(),
                labels: c.labels.unwrap_or_default(),
            })
            .collect())
    }

    async fn list_by_label(&self, key: &str, value: &str) -> Result<Vec<ContainerInstance>> {
        let mut filters = HashMap::new();
        filters.insert("label".to_string(), vec![format!("{key}={value}")]);

        let summaries = self
            .docker
            .list_containers(Some(ListContainersOptions {
                all: true,
                filters,
                ..Default::default()
            }))
            .await
            .map_err(|e| FaasError::Docker(format!("list_containers failed: {e}")))?;

        Ok(summaries
            .into_iter()
            .map(|c| ContainerInstance {
                id: c.id.unwrap_or_default(),
                state: c.state.as_deref().unwrap_or("").into(),
                labels: c.labels.unwrap_or_default(),
            })
            .collect())
    }

    #[instrument(skip(self, params), fields(image = %params.image))]
    async fn create(&self, params: CreateParams<'_>) -> Result<String> {
        let port_key = params.exposed_port.clone();

        let mut exposed_ports = HashMap::new();
        exposed_ports.insert(port_key.clone(), HashMap::new());

        let mut port_bindings = HashMap::new();
        port_bindings.insert(
            port_key,
            Some(vec![BollardPortBinding {
                host_ip: Some("0.0.0.0".to_string()),
                host_port: None,
            }]),
        );

        let env: Vec<String> = params
            .env_vars
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();

        let config = BollardConfig {
            image: Some(params.image.to_string()),
            cmd: Some(params.cmd),
            labels: Some(params.labels),
            exposed_ports: Some(exposed_ports),
            env: Some(env),
            host_config: Some(HostConfig {
                binds: Some(vec![format!(
                    "{}:{}:ro",
                    params.bind_source, params.bind_target
                )]),
                port_bindings: Some(port_bindings),
                ..Default::default()
            }),
            ..Default::default()
        };

        let response = self
            .docker
            .create_container(None::<CreateContainerOptions<String>>, config)
            .await
            .map_err(|e| FaasError::Docker(format!("create_container failed: {e}")))?;

        info!(container_id = %response.id, "created container");
        Ok(response.id)
    }

    async fn start(&self, id: &str) -> Result<()> {
        self.docker
            .start_container::<String>(id, None)
            .await
            .map_err(|e| FaasError::Docker(format!("start_container({id}) failed: {e}")))
    }

    async fn stop(&self, id: &str, timeout: Option<Duration>) -> Result<()> {
        let options = timeout.map(|t| StopContainerOptions {
            t: t.as_secs() as i64,
        });

        match self.docker.stop_container(id, options).await {
            Ok(()) => Ok(()),
            Err(e) => {
                warn!(container_id = %id, error = %e, "stop_container failed");
                Err(FaasError::Docker(format!("stop_container({id}) failed: {e}")))
            }
        }
    }

    async fn inspect_ports(&self, id: &str) -> Result<PortMap> {
        let details = self
            .docker
            .inspect_container(id, None)
            .await
            .map_err(|e| FaasError::Docker(format!("inspect_container({id}) failed: {e}")))?;

        let ports = details
            .network_settings
            .and_then(|ns| ns.ports)
            .unwrap_or_default();

        let mut out = PortMap::new();
        for (port, bindings) in ports {
            let bindings = bindings
                .unwrap_or_default()
                .into_iter()
                .map(|b| HostBinding {
                    host_ip: b.host_ip.unwrap_or_default(),
                    host_port: b.host_port.unwrap_or_default(),
                })
                .collect();
            out.insert(port, bindings);
        }
        Ok(out)
    }
}
