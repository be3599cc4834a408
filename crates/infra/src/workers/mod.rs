//! Background workers.

pub mod poll_worker;

pub use poll_worker::{PollWorker, Sleeper, TokioSleeper, WorkerHandle, WorkerMode, WorkerStats};
