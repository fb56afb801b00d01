mod limiter;
mod processor;

pub use limiter::{PreparationLimiter, PreparationPermit};
pub use processor::BatchProcessor;
