#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PoolError {
    #[error("Worker initialization failed: {0}")]
    Init(String),

    #[error("Worker pool has been terminated")]
    Terminated,

    #[error("Execution context {0} is no longer running")]
    ContextLost(usize),
}

pub type PoolResult<T> = Result<T, PoolError>;

impl From<std::io::Error> for PoolError {
    fn from(err: std::io::Error) -> Self {
        PoolError::Init(format!("Failed to spawn execution context: {}", err))
    }
}
