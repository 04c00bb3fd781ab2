//! Idle Reaper: periodic sweep that stops containers for functions that
//! have gone idle beyond `idle_threshold` (§4.7).

use std::sync::Arc;
use std::time::Duration;

use faas_executor::runtime::{ContainerRuntimePort, FUNCTION_ID_LABEL};
use tracing::{info, instrument, warn};

use crate::activity::ActivityTracker;
use crate::metadata::MetadataPort;

pub struct IdleReaper {
    metadata: Arc<dyn MetadataPort>,
    tracker: Arc<ActivityTracker>,
    runtime: Arc<dyn ContainerRuntimePort>,
    idle_threshold: Duration,
    sweep_interval: Duration,
}

impl IdleReaper {
    pub fn new(
        metadata: Arc<dyn MetadataPort>,
        tracker: Arc<ActivityTracker>,
        runtime: Arc<dyn ContainerRuntimePort>,
        idle_threshold: Duration,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            metadata,
            tracker,
            runtime,
            idle_threshold,
            sweep_interval,
        }
    }

    /// Spawns the background sweep task. The returned handle is detached;
    /// dropping it does not stop the sweep (the caller owns process
    /// lifetime, not the reaper's).
    pub fn spawn(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        let mut interval = tokio::time::interval(self.sweep_interval);
        tokio::spawn(async move {
            loop {
                interval.tick().await;
                self.sweep().await;
            }
        })
    }

    #[instrument(skip(self))]
    pub async fn sweep(&self) {
        let snapshot = self.tracker.snapshot();
        let active = match self.metadata.list_active().await {
            Ok(ids) => ids,
            Err(e) => {
                warn!(error = %e, "idle reaper: failed to list active functions, skipping tick");
                return;
            }
        };

        for id in active {
            let Some(stats) = snapshot.get(&id) else {
                continue;
            };
            if stats.request_count == 0 {
                continue;
            }
            if stats.last_request.elapsed() <= self.idle_threshold {
                continue;
            }

            self.reap_one(&id).await;
        }
    }

    async fn reap_one(&self, external_id: &str) {
        let containers = match self
            .runtime
            .list_by_label(FUNCTION_ID_LABEL, external_id)
            .await
        {
            Ok(c) => c,
            Err(e) => {
                warn!(function_id = %external_id, error = %e, "idle reaper: list_by_label failed");
                return;
            }
        };

        for container in containers {
            match self.runtime.stop(&container.id, None).await {
                Ok(()) => info!(function_id = %external_id, container_id = %container.id, "reaped idle container"),
                Err(e) => warn!(function_id = %external_id, container_id = %container.id, error = %e, "idle reaper: stop failed"),
            }
        }

        self.tracker.reset(external_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::InMemoryMetadataStore;
    use async_trait::async_trait;
    use faas_common::{FunctionConfig, FunctionRecord, FunctionState, FunctionType, Result as FaasResult, Trigger};
    use faas_executor::runtime::{ContainerInstance, ContainerState, CreateParams, PortMap};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    #[derive(Default)]
    struct MockRuntime {
        containers: Mutex<Vec<ContainerInstance>>,
        stop_calls: AtomicUsize,
    }

    #[async_trait]
    impl ContainerRuntimePort for MockRuntime {
        async fn list_all(&self) -> FaasResult<Vec<ContainerInstance>> {
            Ok(self.containers.lock().unwrap().clone())
        }

        async fn list_by_label(&self, key: &str, value: &str) -> FaasResult<Vec<ContainerInstance>> {
            Ok(self
                .containers
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.labels.get(key).map(String::as_str) == Some(value))
                .cloned()
                .collect())
        }

        async fn create(&self, _params: CreateParams<'_>) -> FaasResult<String> {
            unreachable!("reaper never creates containers")
        }

        async fn start(&self, _id: &str) -> FaasResult<()> {
            unreachable!("reaper never starts containers")
        }

        async fn stop(&self, id: &str, _timeout: Option<Duration>) -> FaasResult<()> {
            self.stop_calls.fetch_add(1, Ordering::SeqCst);
            let mut containers = self.containers.lock().unwrap();
            if let Some(c) = containers.iter_mut().find(|c| c.id == id) {
                c.state = ContainerState::Exited;
            }
            Ok(())
        }

        async fn inspect_ports(&self, _id: &str) -> FaasResult<PortMap> {
            Ok(PortMap::new())
        }
    }

    fn active_record(id: &str) -> FunctionRecord {
        FunctionRecord {
            external_id: id.to_string(),
            state: FunctionState::Active,
            config: FunctionConfig {
                trigger: Trigger::Http,
                func_type: FunctionType::Rest,
                image: "golang:1.22".to_string(),
                port: Some(6969),
                env_vars: Default::default(),
            },
        }
    }

    #[tokio::test]
    async fn reaps_function_idle_past_threshold() {
        let metadata = Arc::new(InMemoryMetadataStore::new());
        metadata.insert(active_record("abc"));

        let tracker = Arc::new(ActivityTracker::new());
        tracker.increment("abc");

        let runtime = Arc::new(MockRuntime::default());
        let mut labels = HashMap::new();
        labels.insert(FUNCTION_ID_LABEL.to_string(), "abc".to_string());
        runtime.containers.lock().unwrap().push(ContainerInstance {
            id: "c1".to_string(),
            state: ContainerState::Running,
            labels,
        });

        let reaper = IdleReaper::new(
            metadata,
            tracker.clone(),
            runtime.clone(),
            Duration::from_millis(5),
            Duration::from_secs(60),
        );

        tokio::time::sleep(Duration::from_millis(10)).await;
        reaper.sweep().await;

        assert_eq!(runtime.stop_calls.load(Ordering::SeqCst), 1);
        assert_eq!(tracker.snapshot()["abc"].request_count, 0);
    }

    #[tokio::test]
    async fn skips_function_with_zero_count() {
        let metadata = Arc::new(InMemoryMetadataStore::new());
        metadata.insert(active_record("abc"));

        let tracker = Arc::new(ActivityTracker::new());
        let runtime = Arc::new(MockRuntime::default());

        let reaper = IdleReaper::new(
            metadata,
            tracker,
            runtime.clone(),
            Duration::from_millis(1),
            Duration::from_secs(60),
        );

        tokio::time::sleep(Duration::from_millis(5)).await;
        reaper.sweep().await;

        assert_eq!(runtime.stop_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn skips_function_not_yet_idle() {
        let metadata = Arc::new(InMemoryMetadataStore::new());
        metadata.insert(active_record("abc"));

        let tracker = Arc::new(ActivityTracker::new());
        tracker.increment("abc");
        let runtime = Arc::new(MockRuntime::default());

        let reaper = IdleReaper::new(
            metadata,
            tracker,
            runtime.clone(),
            Duration::from_secs(3600),
            Duration::from_secs(60),
        );

        reaper.sweep().await;
        assert_eq!(runtime.stop_calls.load(Ordering::SeqCst), 0);
    }
}
