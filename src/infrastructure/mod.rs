//! 基础设施层
//!
//! 持有外部资源（HTTP 客户端、键值存储、任务存储、文件存储），只暴露能力，
//! 不包含任何抽取或调度逻辑。

pub mod artifact_store;
pub mod job_store;
pub mod kv_store;
pub mod page_fetcher;

pub use artifact_store::{ArtifactStore, LocalArtifactStore, MemoryArtifactStore};
pub use job_store::{JobStore, MemoryJobStore};
pub use kv_store::{KvStore, MemoryKvStore};
pub use page_fetcher::{HttpFetcher, PageFetcher};
