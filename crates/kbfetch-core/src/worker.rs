//! Object worker - fetches one object and writes it to the local store
//!
//! A worker is created by the host for exactly one request, runs once on
//! the pool, streams progress while the remote client reports it and
//! finishes with a single `Done` event whatever happened.

use crate::error::FetchError;
use crate::services::{Services, Session};
use kbfetch_types::{DocumentParts, ObjectKind, ObjectRequest};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Events a worker reports back to whoever created it
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorkerEvent {
    Progress {
        object_id: String,
        total: u64,
        loaded: u64,
    },
    Done {
        object_id: String,
        success: bool,
        /// Fetched bytes for `GenericData`
        payload: Option<Vec<u8>>,
    },
}

/// Lifecycle of a worker
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Created,
    Running,
    Succeeded,
    Failed,
}

/// One-shot fetch-and-persist task for a single object
pub struct ObjectWorker {
    request: ObjectRequest,
    kind: ObjectKind,
    services: Services,
    events: mpsc::UnboundedSender<WorkerEvent>,
    cancel: CancellationToken,
    timeout: Option<Duration>,
    state: WorkerState,
}

impl ObjectWorker {
    /// Create a new worker
    pub fn new(
        request: ObjectRequest,
        kind: ObjectKind,
        services: Services,
        events: mpsc::UnboundedSender<WorkerEvent>,
    ) -> Self {
        Self {
            request,
            kind,
            services,
            events,
            cancel: CancellationToken::new(),
            timeout: None,
            state: WorkerState::Created,
        }
    }

    /// Stop the run early when `cancel` fires
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Bound the whole run
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Run the worker to completion. Emits exactly one `Done` event and
    /// returns the terminal state.
    pub async fn run(mut self) -> WorkerState {
        self.state = WorkerState::Running;
        let object_id = self.request.object_id.clone();
        debug!("Worker started for {} ({:?})", self.request.label(), self.kind);

        let cancel = self.cancel.clone();
        let result = tokio::select! {
            _ = cancel.cancelled() => Err(FetchError::Cancelled),
            result = self.execute_with_timeout() => result,
        };

        let (success, payload) = match result {
            Ok(payload) => {
                self.state = WorkerState::Succeeded;
                info!("Downloaded {} ({})", self.request.label(), object_id);
                (true, payload)
            }
            Err(e) => {
                self.state = WorkerState::Failed;
                warn!(kind = e.kind(), "Download of {} failed: {}", self.request.label(), e);
                (false, None)
            }
        };

        let _ = self.events.send(WorkerEvent::Done {
            object_id,
            success,
            payload,
        });

        self.state
    }

    async fn execute_with_timeout(&self) -> Result<Option<Vec<u8>>, FetchError> {
        match self.timeout {
            Some(limit) => tokio::time::timeout(limit, self.execute())
                .await
                .map_err(|_| FetchError::Timeout)?,
            None => self.execute().await,
        }
    }

    async fn execute(&self) -> Result<Option<Vec<u8>>, FetchError> {
        let session = self.open_session().await?;
        match self.kind {
            ObjectKind::GenericData => self.fetch_data(&session).await.map(Some),
            ObjectKind::Document => self.fetch_document(&session).await.map(|_| None),
        }
    }

    /// Token first; without one no network call is made
    async fn open_session(&self) -> Result<Session, FetchError> {
        let token = self.services.tokens.current_token();
        if token.is_empty() {
            return Err(FetchError::AuthUnavailable);
        }

        let kb_id = self.request.kb_id.clone();
        let server_url = self
            .services
            .endpoints
            .resolve(&token, &kb_id)
            .await
            .map_err(|source| FetchError::EndpointUnresolved {
                kb_id: kb_id.clone(),
                source,
            })?;
        if server_url.is_empty() {
            return Err(FetchError::EndpointUnresolved {
                kb_id,
                source: anyhow::anyhow!("resolver returned an empty url"),
            });
        }

        Ok(Session {
            token,
            kb_id,
            server_url,
        })
    }

    async fn fetch_data(&self, session: &Session) -> Result<Vec<u8>, FetchError> {
        let object_id = &self.request.object_id;
        let type_string = self.request.object_type.type_string();
        let progress = |total: u64, loaded: u64| self.report_progress(total, loaded);

        let data = self
            .services
            .remote
            .fetch_data(session, object_id, type_string, &progress)
            .await
            .map_err(|source| FetchError::RemoteFetchFailed {
                object_id: object_id.clone(),
                source,
            })?;

        self.services
            .store
            .update_object_data(&session.kb_id, object_id, type_string, &data)
            .await
            .map_err(|source| FetchError::LocalPersistFailed {
                object_id: object_id.clone(),
                source,
            })?;

        Ok(data)
    }

    async fn fetch_document(&self, session: &Session) -> Result<(), FetchError> {
        let object_id = &self.request.object_id;
        let store = &self.services.store;

        let mut record = store
            .load_document(&session.kb_id, object_id)
            .await
            .map_err(|source| FetchError::LocalPersistFailed {
                object_id: object_id.clone(),
                source,
            })?
            .ok_or_else(|| FetchError::DocumentNotFound(object_id.clone()))?;

        let progress = |total: u64, loaded: u64| self.report_progress(total, loaded);
        // `record` is dropped untouched on error, so a half-filled record
        // never reaches the store.
        self.services
            .remote
            .fetch_document_parts(session, object_id, DocumentParts::INFO_AND_DATA, &mut record, &progress)
            .await
            .map_err(|source| FetchError::RemoteFetchFailed {
                object_id: object_id.clone(),
                source,
            })?;

        store
            .update_document(&session.kb_id, &record)
            .await
            .map_err(|source| FetchError::LocalPersistFailed {
                object_id: object_id.clone(),
                source,
            })
    }

    fn report_progress(&self, total: u64, loaded: u64) {
        let _ = self.events.send(WorkerEvent::Progress {
            object_id: self.request.object_id.clone(),
            total,
            loaded,
        });
    }
}
