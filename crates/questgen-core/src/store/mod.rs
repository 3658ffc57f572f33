//! Result store and retention.

mod result_store;
mod retention;

pub use result_store::{AttemptTicket, ResultStore, StateCounts};
pub use retention::RetentionPolicy;
