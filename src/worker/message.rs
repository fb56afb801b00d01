//! Messages exchanged between the pool and its execution contexts.
//!
//! Buffers travel inside these messages by move, so at any time exactly one
//! side owns a given image buffer.

use crate::core::{Task, TaskResult};

/// Identifies one submission to the pool.
///
/// Item ids repeat across retries, so completions are routed by ticket.
pub type Ticket = u64;

/// Position of an execution context inside its pool.
pub type ContextId = usize;

/// Pool → context.
#[derive(Debug)]
pub enum ContextRequest {
    /// One-time setup; answered with `Ready` or `InitError`.
    Init { base_url: String },
    Compress { ticket: Ticket, task: Task },
}

/// Context → pool.
#[derive(Debug)]
pub enum ContextReply {
    Ready,
    InitError { message: String },
    Result { ticket: Ticket, result: TaskResult },
}

/// A reply tagged with the context that sent it.
#[derive(Debug)]
pub struct ContextEvent {
    pub context: ContextId,
    pub reply: ContextReply,
}
