pub mod cloud;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod jobs;
pub mod logging;
pub mod retention;

pub use config::{ConfigError, GcpCredentialsConfig, MaintenanceConfig};
pub use coordinator::{run, CleanupCoordinator, Collaborators, PhaseResult, RunReport};
pub use retention::{Cutoff, RetentionPolicy};
