//! Execution contexts: one OS thread per context, one codec per thread.
//!
//! A context shares nothing with the coordinator or its siblings. It receives
//! [`ContextRequest`]s over its own channel and answers on the pool's event
//! channel. Codec panics, including one while the codec is created, are caught
//! and reported as ordinary failures.

use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread;

use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, warn};

use crate::core::{Task, TaskPayload, TaskResult};
use crate::processing::{Codec, CodecFactory};
use super::message::{ContextEvent, ContextId, ContextReply, ContextRequest};

/// Pool-side handle of a running context.
pub(crate) struct ContextHandle {
    pub(crate) id: ContextId,
    requests: Sender<ContextRequest>,
}

impl ContextHandle {
    /// Spawns the context thread. The thread ends once this handle is dropped
    /// and its current request, if any, has finished.
    pub(crate) fn spawn(
        id: ContextId,
        codecs: Arc<dyn CodecFactory>,
        events: UnboundedSender<ContextEvent>,
    ) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        thread::Builder::new()
            .name(format!("compress-context-{}", id))
            .spawn(move || run_context(id, codecs, rx, events))?;
        Ok(Self { id, requests: tx })
    }

    /// Hands a request to the context. Gives the request back if the thread is gone.
    pub(crate) fn send(&self, request: ContextRequest) -> Result<(), ContextRequest> {
        self.requests.send(request).map_err(|e| e.0)
    }
}

fn run_context(
    id: ContextId,
    codecs: Arc<dyn CodecFactory>,
    requests: Receiver<ContextRequest>,
    events: UnboundedSender<ContextEvent>,
) {
    debug!("Execution context {} started", id);
    let mut codec: Option<Box<dyn Codec>> = None;

    while let Ok(request) = requests.recv() {
        let reply = match request {
            ContextRequest::Init { base_url } => match catch_unwind(AssertUnwindSafe(|| codecs.create(&base_url))) {
                Ok(Ok(created)) => {
                    codec = Some(created);
                    ContextReply::Ready
                }
                Ok(Err(e)) => ContextReply::InitError { message: e.to_string() },
                Err(_) => {
                    warn!("Context {} panicked while creating its codec", id);
                    ContextReply::InitError { message: "Codec factory panicked".to_string() }
                }
            },
            ContextRequest::Compress { ticket, task } => {
                let result = match codec.as_deref_mut() {
                    Some(codec) => compress(id, codec, task),
                    None => TaskResult::error(
                        task.id,
                        task.payload.bytes.len() as u64,
                        "Execution context received work before initialization",
                    ),
                };
                ContextReply::Result { ticket, result }
            }
        };

        let failed_init = matches!(reply, ContextReply::InitError { .. });
        if events.send(ContextEvent { context: id, reply }).is_err() {
            // pool is gone; nobody is left to answer
            break;
        }
        if failed_init {
            break;
        }
    }

    debug!("Execution context {} stopped", id);
}

fn compress(id: ContextId, codec: &mut dyn Codec, task: Task) -> TaskResult {
    let Task { id: item_id, payload } = task;
    let TaskPayload { bytes, file_name, format, settings } = payload;
    let original_size = bytes.len() as u64;

    let outcome = catch_unwind(AssertUnwindSafe(move || {
        let bitmap = codec.decode(&bytes, format)?;
        // the encoded input is no longer needed once we hold the bitmap
        drop(bytes);
        codec.encode(&bitmap, settings.output_format, settings.quality)
    }));

    match outcome {
        Ok(Ok(compressed)) => {
            debug!(
                "Context {} compressed {}: {} -> {} bytes",
                id, file_name, original_size, compressed.len()
            );
            TaskResult::success(item_id, original_size, compressed)
        }
        Ok(Err(e)) => {
            warn!("Context {} failed on {}: {}", id, file_name, e);
            TaskResult::error(item_id, original_size, e.to_string())
        }
        Err(_) => {
            warn!("Context {} panicked while compressing {}", id, file_name);
            TaskResult::error(item_id, original_size, "Codec panicked while processing image")
        }
    }
}
