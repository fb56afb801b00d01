use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use parking_lot::Mutex;
use serde::Serialize;
use tokio::sync::mpsc::{self, UnboundedReceiver};
use tokio::sync::{OnceCell, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::core::{Task, TaskResult, DEFAULT_INIT_TIMEOUT_SECS};
use crate::processing::CodecFactory;
use super::context::ContextHandle;
use super::error::{PoolError, PoolResult};
use super::message::{ContextEvent, ContextId, ContextReply, ContextRequest, Ticket};

#[derive(Debug, Clone)]
pub struct PoolOptions {
    /// Passed verbatim to every context in its `Init` request
    pub base_url: String,
    /// Upper bound on the whole init handshake
    pub init_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            init_timeout: Duration::from_secs(DEFAULT_INIT_TIMEOUT_SECS),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub size: usize,
    pub idle: usize,
    pub queued: usize,
    pub in_flight: usize,
    /// In-flight tasks whose caller stopped waiting
    pub abandoned: usize,
    pub peak_in_flight: usize,
}

struct Queued {
    ticket: Ticket,
    task: Task,
    reply: oneshot::Sender<TaskResult>,
}

struct InFlight {
    context: ContextId,
    /// `None` once the ticket is abandoned; the late result is dropped.
    reply: Option<oneshot::Sender<TaskResult>>,
}

#[derive(Default)]
struct PoolState {
    contexts: Vec<ContextHandle>,
    available: VecDeque<ContextId>,
    queue: VecDeque<Queued>,
    in_flight: HashMap<Ticket, InFlight>,
    next_ticket: Ticket,
    peak_in_flight: usize,
    /// Contexts whose thread stopped taking requests
    lost: usize,
    terminated: bool,
}

impl PoolState {
    /// Pairs idle contexts with queued tasks, oldest first on both sides.
    fn dispatch(&mut self) {
        while !self.available.is_empty() {
            let Some(Queued { ticket, task, reply }) = self.queue.pop_front() else {
                break;
            };
            let Some(context) = self.available.pop_front() else {
                break;
            };
            let Some(handle) = self.contexts.get(context) else {
                error!("Context {} is not part of this pool", context);
                continue;
            };

            match handle.send(ContextRequest::Compress { ticket, task }) {
                Ok(()) => {
                    debug!("Dispatched ticket {} to context {}", ticket, context);
                    self.in_flight.insert(ticket, InFlight { context, reply: Some(reply) });
                    self.peak_in_flight = self.peak_in_flight.max(self.in_flight.len());
                }
                Err(request) => {
                    // The thread is gone; the context is not put back.
                    error!("Context {} stopped accepting work", context);
                    self.lost += 1;
                    if let ContextRequest::Compress { task, .. } = request {
                        let original_size = task.payload.bytes.len() as u64;
                        let message = PoolError::ContextLost(context).to_string();
                        let _ = reply.send(TaskResult::error(task.id, original_size, message));
                    }
                    if self.lost >= self.contexts.len() {
                        self.shut_down_after_losses();
                        break;
                    }
                }
            }
        }
    }

    /// Marks the pool unusable once no context is left. Waiting callers
    /// resolve with `Terminated` as their senders are dropped.
    fn shut_down_after_losses(&mut self) {
        error!(
            "All {} execution contexts are gone; failing {} queued tasks",
            self.contexts.len(),
            self.queue.len()
        );
        self.terminated = true;
        self.available.clear();
        self.queue.clear();
        self.in_flight.clear();
    }

    /// Books a completion and returns whoever is still waiting for it.
    fn complete(&mut self, context: ContextId, ticket: Ticket) -> Option<oneshot::Sender<TaskResult>> {
        let Some(entry) = self.in_flight.remove(&ticket) else {
            warn!("Dropping orphan result for ticket {} from context {}", ticket, context);
            return None;
        };
        if entry.context != context {
            warn!(
                "Ticket {} was dispatched to context {} but answered by {}",
                ticket, entry.context, context
            );
        }

        self.available.push_back(context);
        self.dispatch();
        entry.reply
    }
}

/// Resolves once with the result of one submitted task.
///
/// Resolves with [`PoolError::Terminated`] if the pool shuts down or the
/// ticket is abandoned before a result arrives.
#[derive(Debug)]
pub struct PendingTask {
    ticket: Ticket,
    result: oneshot::Receiver<TaskResult>,
}

impl PendingTask {
    pub fn ticket(&self) -> Ticket {
        self.ticket
    }
}

impl Future for PendingTask {
    type Output = PoolResult<TaskResult>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.result)
            .poll(cx)
            .map(|r| r.map_err(|_| PoolError::Terminated))
    }
}

/// Fixed-size pool of isolated execution contexts.
///
/// Tasks are dispatched to idle contexts in submission order; extra tasks
/// wait in a FIFO queue. Results are routed back by ticket, so completion
/// order does not matter.
pub struct ContextPool {
    size: usize,
    options: PoolOptions,
    codecs: Arc<dyn CodecFactory>,
    state: Arc<Mutex<PoolState>>,
    init: OnceCell<()>,
    router: Mutex<Option<JoinHandle<()>>>,
}

impl ContextPool {
    pub fn new(size: usize, codecs: Arc<dyn CodecFactory>, options: PoolOptions) -> Self {
        Self {
            size: size.max(1),
            options,
            codecs,
            state: Arc::new(Mutex::new(PoolState::default())),
            init: OnceCell::new(),
            router: Mutex::new(None),
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn is_terminated(&self) -> bool {
        self.state.lock().terminated
    }

    pub fn is_initialized(&self) -> bool {
        self.init.initialized() && !self.is_terminated()
    }

    /// Starts every context and waits for all of them to report ready.
    ///
    /// Concurrent callers share a single attempt. A failed attempt leaves
    /// nothing running and may be retried.
    pub async fn initialize(&self) -> PoolResult<()> {
        if self.is_terminated() {
            return Err(PoolError::Terminated);
        }
        self.init.get_or_try_init(|| self.start()).await?;
        Ok(())
    }

    async fn start(&self) -> PoolResult<()> {
        info!("Starting {} execution contexts", self.size);
        let (events_tx, mut events) = mpsc::unbounded_channel();

        // Dropping `contexts` on any early return stops every thread started so far.
        let mut contexts = Vec::with_capacity(self.size);
        for id in 0..self.size {
            contexts.push(ContextHandle::spawn(id, Arc::clone(&self.codecs), events_tx.clone())?);
        }
        drop(events_tx);

        for context in &contexts {
            let init = ContextRequest::Init { base_url: self.options.base_url.clone() };
            if context.send(init).is_err() {
                return Err(PoolError::Init(format!("Context {} exited before init", context.id)));
            }
        }

        let handshake = async {
            let mut ready = 0;
            while ready < self.size {
                match events.recv().await {
                    Some(ContextEvent { reply: ContextReply::Ready, context }) => {
                        debug!("Context {} ready", context);
                        ready += 1;
                    }
                    Some(ContextEvent { reply: ContextReply::InitError { message }, context }) => {
                        return Err(PoolError::Init(format!("Context {}: {}", context, message)));
                    }
                    Some(ContextEvent { context, .. }) => {
                        warn!("Unexpected reply from context {} during init", context);
                    }
                    None => {
                        return Err(PoolError::Init("Execution contexts exited during init".to_string()));
                    }
                }
            }
            Ok(())
        };

        match tokio::time::timeout(self.options.init_timeout, handshake).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                warn!("Pool initialization failed, rolling back: {}", e);
                return Err(e);
            }
            Err(_) => {
                warn!("Pool initialization timed out after {:?}", self.options.init_timeout);
                return Err(PoolError::Init(format!(
                    "Timed out after {}s waiting for execution contexts",
                    self.options.init_timeout.as_secs_f32()
                )));
            }
        }

        {
            let mut state = self.state.lock();
            if state.terminated {
                return Err(PoolError::Terminated);
            }
            state.available = (0..self.size).collect();
            state.contexts = contexts;
            // Anything submitted while we were starting goes out now.
            state.dispatch();
        }

        let router = tokio::spawn(route_results(Arc::clone(&self.state), events));
        *self.router.lock() = Some(router);

        info!("Context pool ready with {} contexts", self.size);
        Ok(())
    }

    /// Hands a task to the pool. The task, bytes included, now belongs to the pool.
    pub fn submit(&self, task: Task) -> PendingTask {
        let (reply, result) = oneshot::channel();
        let mut state = self.state.lock();

        let ticket = state.next_ticket;
        state.next_ticket += 1;

        if state.terminated {
            debug!("Rejecting ticket {}: pool terminated", ticket);
            drop(reply);
        } else {
            debug!("Queued ticket {} for item {}", ticket, task.id);
            state.queue.push_back(Queued { ticket, task, reply });
            state.dispatch();
        }

        PendingTask { ticket, result }
    }

    /// Stops waiting for a ticket.
    ///
    /// A queued task is dropped. An in-flight task keeps its context until it
    /// finishes; its result is then discarded and the context reused.
    pub fn abandon(&self, ticket: Ticket) {
        let mut state = self.state.lock();

        if let Some(pos) = state.queue.iter().position(|q| q.ticket == ticket) {
            state.queue.remove(pos);
            debug!("Abandoned queued ticket {}", ticket);
        } else if let Some(entry) = state.in_flight.get_mut(&ticket) {
            entry.reply = None;
            debug!("Abandoned in-flight ticket {} on context {}", ticket, entry.context);
        }
    }

    /// Shuts every context down. Pending callers resolve with `Terminated`.
    pub fn terminate(&self) {
        let (contexts, queue, in_flight) = {
            let mut state = self.state.lock();
            if state.terminated {
                return;
            }
            state.terminated = true;
            state.available.clear();
            (
                std::mem::take(&mut state.contexts),
                std::mem::take(&mut state.queue),
                std::mem::take(&mut state.in_flight),
            )
        };

        if let Some(router) = self.router.lock().take() {
            router.abort();
        }

        info!(
            "Terminating context pool: {} contexts, {} queued, {} in flight",
            contexts.len(),
            queue.len(),
            in_flight.len()
        );
        // Closing the request channels lets each thread exit after its current task.
        drop(contexts);
        drop(queue);
        drop(in_flight);
    }

    pub fn stats(&self) -> PoolStats {
        let state = self.state.lock();
        PoolStats {
            size: self.size,
            idle: state.available.len(),
            queued: state.queue.len(),
            in_flight: state.in_flight.len(),
            abandoned: state.in_flight.values().filter(|e| e.reply.is_none()).count(),
            peak_in_flight: state.peak_in_flight,
        }
    }
}

impl Drop for ContextPool {
    fn drop(&mut self) {
        self.terminate();
    }
}

async fn route_results(state: Arc<Mutex<PoolState>>, mut events: UnboundedReceiver<ContextEvent>) {
    while let Some(ContextEvent { context, reply }) = events.recv().await {
        let (ticket, result) = match reply {
            ContextReply::Result { ticket, result } => (ticket, result),
            other => {
                warn!("Ignoring {:?} from context {} after init", other, context);
                continue;
            }
        };

        // Bookkeeping first, so the next task is already out when the caller wakes.
        let waiter = {
            let mut state = state.lock();
            if state.terminated {
                return;
            }
            state.complete(context, ticket)
        };

        match waiter {
            Some(waiter) => {
                if waiter.send(result).is_err() {
                    debug!("Caller for ticket {} went away", ticket);
                }
            }
            None => debug!("Discarded late result for ticket {}", ticket),
        }
    }
    debug!("Result router stopped");
}
