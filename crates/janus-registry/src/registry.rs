//! Registration and discovery contracts.

use janus_core::{BoxFuture, Context};

use crate::error::RegistryResult;
use crate::instance::ServiceInstance;

/// Announces instances to a registry.
pub trait Registrar: Send + Sync {
    /// Registers `instance`, replacing any instance with the same id.
    fn register<'a>(&'a self, instance: &'a ServiceInstance) -> BoxFuture<'a, RegistryResult<()>>;

    /// Removes `instance`.
    fn deregister<'a>(&'a self, instance: &'a ServiceInstance) -> BoxFuture<'a, RegistryResult<()>>;
}

/// Looks up instances.
pub trait Discovery: Send + Sync {
    /// Returns the instances registered under `name`.
    fn get_service(&self, name: &str) -> RegistryResult<Vec<ServiceInstance>>;

    /// Returns every registered instance.
    fn list_services(&self) -> RegistryResult<Vec<ServiceInstance>>;

    /// Starts watching the instances of `name`.
    fn watch(&self, name: &str) -> RegistryResult<Box<dyn Watcher>>;
}

/// A stream of instance lists for one service.
pub trait Watcher: Send {
    /// Waits for the next instance list.
    ///
    /// The first call returns at once when instances already exist.
    /// Later calls wait for a change, giving up with
    /// [`RegistryError::Done`](crate::RegistryError::Done) once `ctx` is
    /// cancelled or past its deadline.
    fn next<'a>(&'a mut self, ctx: &'a Context) -> BoxFuture<'a, RegistryResult<Vec<ServiceInstance>>>;

    /// Stops the watcher. Later calls to [`next`](Watcher::next) fail.
    fn stop(&mut self);
}
