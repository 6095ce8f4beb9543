//! In-memory registry for local development and tests.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use janus_core::{BoxFuture, Context};
use tokio::sync::watch;

use crate::error::{RegistryError, RegistryResult};
use crate::instance::ServiceInstance;
use crate::registry::{Discovery, Registrar, Watcher};

/// A process-local registry.
///
/// Cheap to clone; clones share state. Every service name owns a watch
/// channel holding its current instance list.
///
/// ```
/// use janus_registry::{Discovery, MemoryRegistry, Registrar, ServiceInstance};
///
/// # tokio_test::block_on(async {
/// let registry = MemoryRegistry::new();
/// let instance = ServiceInstance::new("greeter-1", "helloworld").with_endpoint("grpc://127.0.0.1:9000");
///
/// registry.register(&instance).await?;
/// assert_eq!(registry.get_service("helloworld")?, vec![instance]);
/// # Ok::<_, janus_registry::RegistryError>(())
/// # });
/// ```
#[derive(Clone, Default)]
pub struct MemoryRegistry {
    services: Arc<DashMap<String, watch::Sender<Vec<ServiceInstance>>>>,
}

impl MemoryRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn sender(&self, name: &str) -> watch::Sender<Vec<ServiceInstance>> {
        self.services
            .entry(name.to_string())
            .or_insert_with(|| watch::channel(Vec::new()).0)
            .clone()
    }
}

impl fmt::Debug for MemoryRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryRegistry")
            .field("services", &self.services.len())
            .finish()
    }
}

impl Registrar for MemoryRegistry {
    fn register<'a>(&'a self, instance: &'a ServiceInstance) -> BoxFuture<'a, RegistryResult<()>> {
        Box::pin(async move {
            instance.validate()?;
            self.sender(&instance.name).send_modify(|instances| {
                match instances.iter_mut().find(|existing| existing.id == instance.id) {
                    Some(existing) => *existing = instance.clone(),
                    None => instances.push(instance.clone()),
                }
            });
            tracing::debug!(service = %instance.name, id = %instance.id, "service instance registered");
            Ok(())
        })
    }

    fn deregister<'a>(&'a self, instance: &'a ServiceInstance) -> BoxFuture<'a, RegistryResult<()>> {
        Box::pin(async move {
            let not_registered = || RegistryError::NotRegistered {
                name: instance.name.clone(),
                id: instance.id.clone(),
            };
            let sender = self
                .services
                .get(&instance.name)
                .map(|entry| entry.clone())
                .ok_or_else(not_registered)?;

            let removed = sender.send_if_modified(|instances| {
                let before = instances.len();
                instances.retain(|existing| existing.id != instance.id);
                instances.len() != before
            });
            if !removed {
                return Err(not_registered());
            }
            tracing::debug!(service = %instance.name, id = %instance.id, "service instance deregistered");
            Ok(())
        })
    }
}

impl Discovery for MemoryRegistry {
    fn get_service(&self, name: &str) -> RegistryResult<Vec<ServiceInstance>> {
        Ok(self
            .services
            .get(name)
            .map(|entry| entry.borrow().clone())
            .unwrap_or_default())
    }

    fn list_services(&self) -> RegistryResult<Vec<ServiceInstance>> {
        let mut all: Vec<ServiceInstance> = self
            .services
            .iter()
            .flat_map(|entry| entry.borrow().clone())
            .collect();
        all.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.id.cmp(&b.id)));
        Ok(all)
    }

    fn watch(&self, name: &str) -> RegistryResult<Box<dyn Watcher>> {
        Ok(Box::new(MemoryWatcher {
            receiver: self.sender(name).subscribe(),
            first: true,
            stopped: false,
        }))
    }
}

struct MemoryWatcher {
    receiver: watch::Receiver<Vec<ServiceInstance>>,
    first: bool,
    stopped: bool,
}

impl Watcher for MemoryWatcher {
    fn next<'a>(&'a mut self, ctx: &'a Context) -> BoxFuture<'a, RegistryResult<Vec<ServiceInstance>>> {
        Box::pin(async move {
            if self.stopped {
                return Err(RegistryError::WatcherStopped);
            }
            if std::mem::take(&mut self.first) {
                let current = self.receiver.borrow_and_update().clone();
                if !current.is_empty() {
                    return Ok(current);
                }
            }
            ctx.run_until_done(self.receiver.changed())
                .await
                .map_err(RegistryError::Done)?
                .map_err(|_| RegistryError::Closed)?;
            Ok(self.receiver.borrow_and_update().clone())
        })
    }

    fn stop(&mut self) {
        self.stopped = true;
    }
}
