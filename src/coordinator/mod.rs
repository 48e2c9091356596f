pub mod engine;

pub use engine::{BatchOutcome, Coordinator};
