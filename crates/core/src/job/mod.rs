//! Job ledger: the durable record of every admitted job.

mod sqlite_store;
mod store;
mod types;

pub use sqlite_store::SqliteJobStore;
pub use store::{
    clamp_list_limit, JobError, JobStore, NewJob, DEFAULT_LIST_LIMIT, MAX_LIST_LIMIT,
};
pub use types::{Job, JobKind, JobStatus};
