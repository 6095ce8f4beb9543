//! Per-service middleware registration.
//!
//! Each service implementation may carry its own chain, applied inside the
//! server's global chain. The registry is assembled with a builder before
//! serving and is immutable afterwards.
//!
//! ```
//! use janus_core::ServiceKey;
//! use janus_middleware::{Chain, Logging};
//! use janus_server::ServiceRegistry;
//!
//! struct Greeter;
//!
//! let registry = ServiceRegistry::builder()
//!     .service::<Greeter>(Chain::new().with(Logging::server()))
//!     .build();
//!
//! assert!(registry.chain_for(&ServiceKey::of::<Greeter>()).is_some());
//! ```

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use janus_core::{BoxHandler, ServiceKey};
use janus_middleware::Chain;

/// Immutable map from service identity to its chain.
#[derive(Clone, Default)]
pub struct ServiceRegistry {
    services: Arc<HashMap<ServiceKey, Chain>>,
}

impl ServiceRegistry {
    /// Starts building a registry.
    #[must_use]
    pub fn builder() -> ServiceRegistryBuilder {
        ServiceRegistryBuilder::default()
    }

    /// Returns the chain registered for `service`.
    #[must_use]
    pub fn chain_for(&self, service: &ServiceKey) -> Option<&Chain> {
        self.services.get(service)
    }

    /// Wraps `handler` in the chain of `service`, if one is registered.
    #[must_use]
    pub fn apply(&self, service: &ServiceKey, handler: BoxHandler) -> BoxHandler {
        match self.chain_for(service) {
            Some(chain) => chain.then(handler),
            None => handler,
        }
    }

    /// Returns the number of registered services.
    #[must_use]
    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Returns `true` if no service has a chain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

impl fmt::Debug for ServiceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.services.iter().map(|(k, v)| (k.name(), v.names())))
            .finish()
    }
}

/// Builder for [`ServiceRegistry`].
#[derive(Default)]
pub struct ServiceRegistryBuilder {
    services: HashMap<ServiceKey, Chain>,
}

impl ServiceRegistryBuilder {
    /// Registers a chain for the service implemented by `S`.
    pub fn service<S: ?Sized + 'static>(self, chain: Chain) -> Self {
        self.with_key(ServiceKey::of::<S>(), chain)
    }

    /// Registers a chain for a service key.
    ///
    /// Registering the same service again replaces its chain.
    pub fn with_key(mut self, key: ServiceKey, chain: Chain) -> Self {
        if self.services.insert(key, chain).is_some() {
            tracing::warn!(service = key.name(), "service middleware replaced");
        }
        self
    }

    /// Freezes the registry.
    #[must_use]
    pub fn build(self) -> ServiceRegistry {
        ServiceRegistry {
            services: Arc::new(self.services),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use janus_core::{BoxError, Context, Handler, Payload};
    use janus_middleware::FnMiddleware;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Greeter;
    struct Billing;

    fn counting(counter: Arc<AtomicUsize>) -> Chain {
        Chain::new().with(FnMiddleware::new("count", move |ctx, req, next| {
            let counter = Arc::clone(&counter);
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                next.run(ctx, req).await
            }
        }))
    }

    #[tokio::test]
    async fn test_apply_runs_only_own_chain() {
        let greeter_calls = Arc::new(AtomicUsize::new(0));
        let billing_calls = Arc::new(AtomicUsize::new(0));

        let registry = ServiceRegistry::builder()
            .service::<Greeter>(counting(Arc::clone(&greeter_calls)))
            .service::<Billing>(counting(Arc::clone(&billing_calls)))
            .build();
        assert_eq!(registry.len(), 2);

        let terminal: BoxHandler =
            Arc::new(|_ctx: Context, req: Payload| async move { Ok::<_, BoxError>(req) });
        let handler = registry.apply(&ServiceKey::of::<Greeter>(), terminal);
        handler.call(Context::new(), Payload::new(())).await.unwrap();

        assert_eq!(greeter_calls.load(Ordering::SeqCst), 1);
        assert_eq!(billing_calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_unregistered_service_is_passthrough() {
        let registry = ServiceRegistry::builder().build();
        assert!(registry.is_empty());

        let terminal: BoxHandler =
            Arc::new(|_ctx: Context, req: Payload| async move { Ok::<_, BoxError>(req) });
        let applied = registry.apply(&ServiceKey::of::<Greeter>(), Arc::clone(&terminal));
        assert!(Arc::ptr_eq(&applied, &terminal));
    }

    #[test]
    fn test_reregistration_replaces() {
        let registry = ServiceRegistry::builder()
            .service::<Greeter>(Chain::new())
            .service::<Greeter>(counting(Arc::new(AtomicUsize::new(0))))
            .build();
        assert_eq!(registry.len(), 1);
        let chain = registry.chain_for(&ServiceKey::of::<Greeter>()).unwrap();
        assert_eq!(chain.names(), vec!["count"]);
    }
}
