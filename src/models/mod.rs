pub mod pool;
pub mod ticker;

pub use pool::{PoolRecord, TokenRef};
pub use ticker::AlphaTicker;
