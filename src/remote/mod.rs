//! The one remote document every view reads and the admin editor overwrites.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use parking_lot::Mutex;
use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, ETAG, IF_MATCH};
use reqwest::StatusCode;

use crate::config::RemoteOptions;
use crate::store::StatusEntry;

mod codec;
mod error;
pub mod worker;

pub use codec::{decode_document, encode_document, DecodedDocument};
pub use error::{FetchFailure, SaveFailure};
pub use worker::{BlobWorker, Completion, Job, Ticket};

/// Raw bytes of the document plus whatever version tag the store handed out.
#[derive(Debug, Clone)]
pub struct FetchedBlob {
    pub body: Vec<u8>,
    pub etag: Option<String>,
}

/// GET/PUT of a single fixed key. Implementations never retry.
pub trait BlobStore: Send + Sync {
    fn get(&self) -> Result<FetchedBlob, FetchFailure>;

    /// Replaces the whole object. `if_match` is a version precondition; a
    /// store that sees it violated answers `SaveFailure::Conflict`.
    fn put(&self, body: Vec<u8>, if_match: Option<&str>) -> Result<Option<String>, SaveFailure>;
}

pub struct HttpBlobStore {
    client: Client,
    url: String,
}

impl HttpBlobStore {
    /// No request timeout: a hung GET or PUT stays pending.
    pub fn new(url: impl Into<String>) -> Result<Self, reqwest::Error> {
        Self::with_timeout(url, None)
    }

    pub fn with_timeout(
        url: impl Into<String>,
        timeout: Option<Duration>,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder()
            .user_agent(concat!("statusboard/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl BlobStore for HttpBlobStore {
    fn get(&self) -> Result<FetchedBlob, FetchFailure> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .map_err(|err| FetchFailure::Transport(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchFailure::Status(status.as_u16()));
        }
        let etag = header_string(response.headers().get(ETAG));
        let body = response
            .bytes()
            .map_err(|err| FetchFailure::Transport(err.to_string()))?;
        Ok(FetchedBlob {
            body: body.to_vec(),
            etag,
        })
    }

    fn put(&self, body: Vec<u8>, if_match: Option<&str>) -> Result<Option<String>, SaveFailure> {
        let mut request = self
            .client
            .put(&self.url)
            .header(CONTENT_TYPE, "application/json")
            .body(body);
        if let Some(etag) = if_match {
            request = request.header(IF_MATCH, etag);
        }
        let response = request
            .send()
            .map_err(|err| SaveFailure::Transport(err.to_string()))?;
        let status = response.status();
        if status == StatusCode::PRECONDITION_FAILED {
            return Err(SaveFailure::Conflict);
        }
        if !status.is_success() {
            return Err(SaveFailure::Status(status.as_u16()));
        }
        Ok(header_string(response.headers().get(ETAG)))
    }
}

fn header_string(value: Option<&reqwest::header::HeaderValue>) -> Option<String> {
    value
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned)
}

/// In-process object with the same overwrite and precondition semantics as
/// the HTTP store. `None` contents behave like a missing key (404).
#[derive(Debug, Default)]
pub struct MemoryBlobStore {
    object: Mutex<MemoryObject>,
}

#[derive(Debug, Default)]
struct MemoryObject {
    body: Option<Vec<u8>>,
    version: u64,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_body(body: impl Into<Vec<u8>>) -> Self {
        Self {
            object: Mutex::new(MemoryObject {
                body: Some(body.into()),
                version: 1,
            }),
        }
    }

    pub fn body(&self) -> Option<Vec<u8>> {
        self.object.lock().body.clone()
    }

    /// Overwrites the object out of band, as another session would.
    pub fn replace(&self, body: impl Into<Vec<u8>>) {
        let mut object = self.object.lock();
        object.body = Some(body.into());
        object.version += 1;
    }

    fn etag(version: u64) -> String {
        format!("\"v{version}\"")
    }
}

impl BlobStore for MemoryBlobStore {
    fn get(&self) -> Result<FetchedBlob, FetchFailure> {
        let object = self.object.lock();
        match &object.body {
            Some(body) => Ok(FetchedBlob {
                body: body.clone(),
                etag: Some(Self::etag(object.version)),
            }),
            None => Err(FetchFailure::Status(404)),
        }
    }

    fn put(&self, body: Vec<u8>, if_match: Option<&str>) -> Result<Option<String>, SaveFailure> {
        let mut object = self.object.lock();
        if let Some(expected) = if_match {
            if object.body.is_none() || expected != Self::etag(object.version) {
                return Err(SaveFailure::Conflict);
            }
        }
        object.body = Some(body);
        object.version += 1;
        Ok(Some(Self::etag(object.version)))
    }
}

#[derive(Debug, Clone, Default)]
pub struct LoadedStatuses {
    pub entries: Vec<StatusEntry>,
    pub skipped: usize,
    pub etag: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveReceipt {
    pub saved: usize,
    pub etag: Option<String>,
}

/// Loads and overwrites the status collection as one JSON document.
#[derive(Clone)]
pub struct RemoteBlobClient {
    store: Arc<dyn BlobStore>,
    conditional_writes: bool,
}

impl RemoteBlobClient {
    pub fn new(store: Arc<dyn BlobStore>, conditional_writes: bool) -> Self {
        Self {
            store,
            conditional_writes,
        }
    }

    pub fn from_options(options: &RemoteOptions) -> anyhow::Result<Self> {
        let store = HttpBlobStore::new(options.document_url.clone())
            .context("building HTTP client for the status document")?;
        Ok(Self::new(Arc::new(store), options.conditional_writes))
    }

    pub fn conditional_writes(&self) -> bool {
        self.conditional_writes
    }

    pub fn load(&self) -> Result<LoadedStatuses, FetchFailure> {
        let blob = self.store.get()?;
        let decoded = decode_document(&blob.body)?;
        tracing::debug!(
            entries = decoded.entries.len(),
            skipped = decoded.skipped,
            "loaded status document"
        );
        Ok(LoadedStatuses {
            entries: decoded.entries,
            skipped: decoded.skipped,
            etag: blob.etag,
        })
    }

    /// Overwrites the remote document with `entries`. `etag` is only sent
    /// when conditional writes are enabled.
    pub fn save(
        &self,
        entries: &[StatusEntry],
        etag: Option<&str>,
    ) -> Result<SaveReceipt, SaveFailure> {
        let body = encode_document(entries)?;
        let precondition = if self.conditional_writes { etag } else { None };
        let etag = self.store.put(body, precondition)?;
        tracing::debug!(saved = entries.len(), "overwrote status document");
        Ok(SaveReceipt {
            saved: entries.len(),
            etag,
        })
    }
}
