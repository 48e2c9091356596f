pub mod aggregate;
pub mod classify;
pub mod conflict;

pub use aggregate::{DecisionRecord, aggregate};
pub use classify::{ChangeCategory, ChangeClassifier};
pub use conflict::detect_conflicts;
