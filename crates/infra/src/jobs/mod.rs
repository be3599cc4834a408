//! Job lifecycle infrastructure.
//!
//! ## Components
//!
//! - `JobStore`: persistence (in-memory or Postgres) with atomic claim and
//!   conditional update primitives
//! - `JobStateMachine`: legal transitions and idempotent creation
//! - `QueueClaimer`: FIFO claim of the next queued job

pub mod postgres;
pub mod queue;
pub mod state_machine;
pub mod store;

pub use postgres::PostgresJobStore;
pub use queue::QueueClaimer;
pub use state_machine::{Admission, JobError, JobStateMachine};
pub use store::{InMemoryJobStore, JobStore, QueueStats};
