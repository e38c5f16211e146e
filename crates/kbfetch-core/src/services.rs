//! Collaborator contracts consumed by the download workers
//!
//! Token retrieval, endpoint lookup, the wire protocol and the local store
//! all live outside this crate. Workers only see these traits.

use async_trait::async_trait;
use kbfetch_types::{DocumentParts, DocumentRecord};
use std::sync::Arc;

/// Source of the current session token
pub trait TokenProvider: Send + Sync {
    /// Current token; empty means not signed in
    fn current_token(&self) -> String;
}

/// Maps a knowledge base to the server that holds its objects
#[async_trait]
pub trait EndpointResolver: Send + Sync {
    async fn resolve(&self, token: &str, kb_id: &str) -> anyhow::Result<String>;
}

/// Everything a remote call needs to authenticate and route
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub token: String,
    pub kb_id: String,
    pub server_url: String,
}

/// Wire protocol for object bytes and document parts
#[async_trait]
pub trait RemoteObjectClient: Send + Sync {
    async fn fetch_data(
        &self,
        session: &Session,
        object_id: &str,
        type_string: &str,
        progress: &(dyn Fn(u64, u64) + Send + Sync),
    ) -> anyhow::Result<Vec<u8>>;

    /// `progress` receives `(total, loaded)` byte counts as they arrive.
    ///
    /// Fill `record` with the requested parts. On error the caller discards
    /// the record, so partial writes into it are never persisted.
    async fn fetch_document_parts(
        &self,
        session: &Session,
        object_id: &str,
        parts: DocumentParts,
        record: &mut DocumentRecord,
        progress: &(dyn Fn(u64, u64) + Send + Sync),
    ) -> anyhow::Result<()>;
}

/// Persistent store for object bytes and documents
#[async_trait]
pub trait LocalStore: Send + Sync {
    async fn update_object_data(
        &self,
        kb_id: &str,
        object_id: &str,
        type_string: &str,
        data: &[u8],
    ) -> anyhow::Result<()>;

    async fn load_document(&self, kb_id: &str, object_id: &str) -> anyhow::Result<Option<DocumentRecord>>;

    async fn update_document(&self, kb_id: &str, record: &DocumentRecord) -> anyhow::Result<()>;
}

/// Collaborators handed to every worker
#[derive(Clone)]
pub struct Services {
    pub tokens: Arc<dyn TokenProvider>,
    pub endpoints: Arc<dyn EndpointResolver>,
    pub remote: Arc<dyn RemoteObjectClient>,
    pub store: Arc<dyn LocalStore>,
}

impl Services {
    pub fn new(
        tokens: Arc<dyn TokenProvider>,
        endpoints: Arc<dyn EndpointResolver>,
        remote: Arc<dyn RemoteObjectClient>,
        store: Arc<dyn LocalStore>,
    ) -> Self {
        Self {
            tokens,
            endpoints,
            remote,
            store,
        }
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}
