pub mod filter;
pub mod formatter;
pub mod normalizer;
pub mod retry;
pub mod storage;

pub use filter::PoolFilter;
pub use formatter::{split_message, MessageFormatter, MessageStyle};
pub use normalizer::PoolNormalizer;
pub use retry::RetryPolicy;
pub use storage::{SeenPoolStore, SnapshotStore, StoreError};
