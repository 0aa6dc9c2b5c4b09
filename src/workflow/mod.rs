pub mod scrape_ctx;
pub mod scrape_flow;

pub use scrape_ctx::{ScrapeCtx, ScrapeRequest};
pub use scrape_flow::ScrapeFlow;
