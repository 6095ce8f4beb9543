//! Service registration and discovery for Janus.
//!
//! The [`Registrar`], [`Discovery`] and [`Watcher`] traits describe what a
//! registry backend provides. [`MemoryRegistry`] implements all three in
//! process.

#![doc(html_root_url = "https://docs.rs/janus-registry/0.1.0")]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod error;
mod instance;
mod memory;
mod registry;

pub use error::{RegistryError, RegistryResult};
pub use instance::ServiceInstance;
pub use memory::MemoryRegistry;
pub use registry::{Discovery, Registrar, Watcher};
