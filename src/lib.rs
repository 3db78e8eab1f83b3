//! Service liveness registry library.

pub mod config;
pub mod lifecycle;
pub mod machine;
pub mod observability;
pub mod registry;
pub mod transport;

pub use config::schema::RegistryConfig;
pub use lifecycle::Shutdown;
pub use machine::StateMachine;
pub use registry::RegistryManager;
