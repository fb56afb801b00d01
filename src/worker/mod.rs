mod context;
mod error;
pub mod message;
mod pool;

pub use error::{PoolError, PoolResult};
pub use message::{ContextEvent, ContextId, ContextReply, ContextRequest, Ticket};
pub use pool::{ContextPool, PendingTask, PoolOptions, PoolStats};
