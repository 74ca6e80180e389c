pub mod fetcher;
pub mod record;
pub mod store;

pub use fetcher::BuildFetcher;
pub use record::{BuildRecord, BuildStatus};
pub use store::BuildStore;
