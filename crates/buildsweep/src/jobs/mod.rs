pub mod model;
pub mod prune;
pub mod queue;
pub mod repo;

pub use model::{JobRecord, JobTypeKey, NewJob};
pub use prune::{JobRetentionPruner, PruneReport};
pub use queue::JobQueue;
pub use repo::JobsRepo;
