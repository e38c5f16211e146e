//! Download host - deduplicates object requests and runs them on a pool
//!
//! This is the entry point for object downloads:
//! - At most one in-flight request per object id (the pending table)
//! - Workers run on a bounded pool, one at a time by default
//! - Worker progress and completion are fanned out as [`HostEvent`]s to
//!   every subscriber. Delivery is unbounded, so a slow subscriber never
//!   misses a `Done`.

use crate::pool::WorkerPool;
use crate::services::Services;
use crate::worker::{ObjectWorker, WorkerEvent};
use kbfetch_types::{HostEvent, ObjectKind, ObjectRequest, Settings, Submission};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

type PendingTable = Arc<Mutex<HashMap<String, ObjectRequest>>>;

/// Host event fan-out; senders whose receiver is gone are pruned on publish
#[derive(Clone, Default)]
struct Subscribers(Arc<Mutex<Vec<mpsc::UnboundedSender<HostEvent>>>>);

impl Subscribers {
    fn add(&self) -> mpsc::UnboundedReceiver<HostEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.0.lock().push(tx);
        rx
    }

    fn publish(&self, event: HostEvent) {
        self.0.lock().retain(|tx| tx.send(event.clone()).is_ok());
    }
}

/// Host that owns the pending table and the worker pool
pub struct DownloadHost {
    /// Requests currently queued or running, keyed by object id
    pending: PendingTable,
    services: Services,
    pool: WorkerPool,
    subscribers: Subscribers,
    shutdown: CancellationToken,
    fetch_timeout: Option<Duration>,
}

impl DownloadHost {
    /// Create a host with its own pool sized by `settings.max_concurrent_downloads`
    pub fn new(services: Services, settings: &Settings) -> Self {
        let pool = WorkerPool::new("object-download", settings.max_concurrent_downloads);
        Self::with_pool(services, pool, settings)
    }

    /// Create a host that runs its workers on an existing pool
    pub fn with_pool(services: Services, pool: WorkerPool, settings: &Settings) -> Self {
        Self {
            pending: Arc::new(Mutex::new(HashMap::new())),
            services,
            pool,
            subscribers: Subscribers::default(),
            shutdown: CancellationToken::new(),
            fetch_timeout: settings.fetch_timeout_secs.map(Duration::from_secs),
        }
    }

    /// Subscribe to host events. The receiver sees every event published
    /// after this call, in order per object; dropping it unsubscribes.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<HostEvent> {
        self.subscribers.add()
    }

    /// The pool workers run on; hand it to a file fetch to share the throttle
    pub fn pool(&self) -> &WorkerPool {
        &self.pool
    }

    /// Fetch an object's raw data
    pub fn request_data(&self, request: ObjectRequest) -> Submission {
        self.submit(request, ObjectKind::GenericData)
    }

    /// Fetch a document's info and body
    pub fn request_document(&self, request: ObjectRequest) -> Submission {
        self.submit(request, ObjectKind::Document)
    }

    /// Whether a request for `object_id` is queued or running
    pub fn is_pending(&self, object_id: &str) -> bool {
        self.pending.lock().contains_key(object_id)
    }

    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Cancel every queued and running worker. Each still reports `Done`.
    /// Requests submitted afterwards fail immediately.
    pub fn shutdown(&self) {
        info!("Shutting down download host ({} pending)", self.pending_count());
        self.shutdown.cancel();
    }

    /// Record the request and hand a worker to the pool, unless the object
    /// is already in flight.
    ///
    /// # Panics
    ///
    /// Panics if `request.object_id` is empty, and when called outside a
    /// tokio runtime.
    pub fn submit(&self, mut request: ObjectRequest, kind: ObjectKind) -> Submission {
        assert!(!request.object_id.is_empty(), "object id must not be empty");
        request.kind = kind;

        {
            let mut pending = self.pending.lock();
            if pending.contains_key(&request.object_id) {
                debug!("Object already in the pool: {}", request.label());
                return Submission::AlreadyPending;
            }
            pending.insert(request.object_id.clone(), request.clone());
        }

        info!("Queued {:?} download of {}", kind, request.label());

        let (worker_tx, worker_rx) = mpsc::unbounded_channel();
        let object_id = request.object_id.clone();
        let worker = ObjectWorker::new(request, kind, self.services.clone(), worker_tx)
            .with_cancellation(self.shutdown.child_token())
            .with_timeout(self.fetch_timeout);

        tokio::spawn(relay_worker_events(
            object_id,
            worker_rx,
            Arc::clone(&self.pending),
            self.subscribers.clone(),
        ));
        self.pool.spawn(worker.run());

        Submission::Queued
    }
}

/// Forward one worker's events to host subscribers and settle the pending
/// entry when it finishes.
async fn relay_worker_events(
    object_id: String,
    mut worker_rx: mpsc::UnboundedReceiver<WorkerEvent>,
    pending: PendingTable,
    subscribers: Subscribers,
) {
    while let Some(event) = worker_rx.recv().await {
        match event {
            WorkerEvent::Progress {
                object_id,
                total,
                loaded,
            } => {
                subscribers.publish(HostEvent::Progress {
                    object_id,
                    total,
                    loaded,
                });
            }
            WorkerEvent::Done {
                object_id,
                success,
                payload,
            } => {
                finish(&pending, &subscribers, &object_id, success, payload);
                return;
            }
        }
    }

    // Worker went away without reporting (panicked inside a collaborator)
    error!("Worker for {} stopped without reporting completion", object_id);
    finish(&pending, &subscribers, &object_id, false, None);
}

fn finish(
    pending: &PendingTable,
    subscribers: &Subscribers,
    object_id: &str,
    success: bool,
    payload: Option<Vec<u8>>,
) {
    let Some(mut request) = pending.lock().remove(object_id) else {
        error!("Completed object {} was not in the pending table", object_id);
        return;
    };

    if let Some(payload) = payload {
        request.payload = payload;
    }

    debug!("Finished {} (success: {})", request.label(), success);
    subscribers.publish(HostEvent::Done { request, success });
}
