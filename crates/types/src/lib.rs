//! Shared domain types for the blocks conductor and its workers.
//!
//! These are plain data types with no I/O: the entities described in the
//! data model (`Block`, `Transaction`, `Consumer`, `Lock`), the `Job`
//! variant the conductor hands out, the `WorkerType` role tag, and a small
//! set of field-validation helpers shared by the store and the conductor.

mod block;
mod consumer;
mod job;
mod lock;
mod transaction;
mod validation;
mod worker_type;

pub use block::Block;
pub use consumer::Consumer;
pub use job::Job;
pub use lock::Lock;
pub use transaction::Transaction;
pub use validation::{is_256bit_hash, is_address, validate_conditions};
pub use worker_type::WorkerType;
