pub mod batch;
pub mod cli;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod invoker;
pub mod output;
pub mod review;
pub mod scope;

pub use batch::{Batch, BatchRequest, BatchState, ManifestStore, Proposal, Task, TaskKind, TaskStatus};
pub use config::OverseerConfig;
pub use coordinator::{BatchOutcome, Coordinator};
pub use error::{InvokeError, OverseerError, Result};
pub use invoker::{ParsedArtifact, WorkerBackend, WorkerInvoker};
pub use review::{ChangeCategory, ChangeClassifier, DecisionRecord};
pub use scope::ScopeLockSet;
