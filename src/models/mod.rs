pub mod contact;
pub mod job;
pub mod loaders;

pub use contact::{
    CacheNamespace, ContactCandidates, ContactResult, ProfileLinks, ScrapeMode, ScrapeStatus,
    ValidatedContacts,
};
pub use job::{BatchInput, Job, JobId, JobStatus, JobStatusView, RowOutcome, SubmitReceipt};
pub use loaders::{load_csv_file, parse_table, BatchTable};
