//! Job orchestration for coachml.
//!
//! - [`Orchestrator`]: allocates jobs and wires dependency chains.
//! - [`StatusResolver`]: maps native queue state to the domain lifecycle and
//!   normalizes stored results and errors.
//! - [`Worker`]: claims jobs, enforces the dependency barrier, and executes
//!   task logic.

pub mod orchestrator;
pub mod resolver;
pub mod worker;

pub use orchestrator::{ChainStep, Orchestrator};
pub use resolver::StatusResolver;
pub use worker::{Worker, WorkerConfig};
