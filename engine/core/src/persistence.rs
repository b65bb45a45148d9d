//! Persisted Engine Fields
//!
//! Only one engine field survives a restart: the click-through flag. It is
//! stored as a single key-value entry; everything else in the snapshot resets
//! to defaults on process start.
//!
//! The [`KeyValueStore`] trait is the seam. [`JsonFileStore`] keeps a small
//! JSON object on disk under the XDG data directory and saves it from a
//! background task; [`MemoryStore`] backs tests and headless runs.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::{Map, Value};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};

/// Key under which the click-through flag is stored
pub const CLICK_THROUGH_KEY: &str = "isClickThrough";

/// Errors from the persistence layer
#[derive(Debug, Error)]
pub enum PersistenceError {
    /// Reading or writing the state file failed
    #[error("state file I/O failed at {path}: {source}")]
    Io {
        /// File that was accessed
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },

    /// The state file is not a JSON object
    #[error("state file at {path} is not valid JSON: {source}")]
    Corrupt {
        /// File that was parsed
        path: PathBuf,
        /// Underlying error
        source: serde_json::Error,
    },

    /// The background writer is gone; nothing more will be saved
    #[error("state file writer for {path} has stopped")]
    WriterClosed {
        /// File the writer was saving to
        path: PathBuf,
    },
}

/// Minimal key-value persistence
///
/// `set` is called from the dispatch path and must not block. Durable
/// stores queue the write and report failures from [`flush`](Self::flush).
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Read a value
    fn get(&self, key: &str) -> Option<Value>;

    /// Write a value
    ///
    /// # Errors
    ///
    /// Returns an error if the value could not be queued or stored.
    fn set(&self, key: &str, value: Value) -> Result<(), PersistenceError>;

    /// Read a boolean, `None` if missing or not a boolean
    fn get_bool(&self, key: &str) -> Option<bool> {
        self.get(key).and_then(|v| v.as_bool())
    }

    /// Wait until every earlier `set` has reached storage
    ///
    /// # Errors
    ///
    /// Returns the first write failure since the previous flush.
    async fn flush(&self) -> Result<(), PersistenceError> {
        Ok(())
    }
}

/// In-memory store; nothing survives the process
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, Value>>,
}

impl MemoryStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a store pre-seeded with one entry
    #[must_use]
    pub fn with_entry(key: &str, value: Value) -> Self {
        let store = Self::new();
        store.values.lock().insert(key.to_string(), value);
        store
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<(), PersistenceError> {
        self.values.lock().insert(key.to_string(), value);
        Ok(())
    }
}

#[derive(Debug)]
enum WriteRequest {
    Save(String),
    Flush(oneshot::Sender<Result<(), PersistenceError>>),
}

/// JSON-object file store
///
/// Reads are served from memory. Every `set` serializes the whole object and
/// hands it to a writer task, which saves snapshots in order with
/// `tokio::fs`.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    values: Mutex<Map<String, Value>>,
    writer: mpsc::UnboundedSender<WriteRequest>,
}

impl JsonFileStore {
    /// Open (or lazily create) the store at `path` and start its writer
    ///
    /// A missing file starts empty. Must run inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn open(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        let values = match tokio::fs::read_to_string(&path).await {
            Ok(content) if content.trim().is_empty() => Map::new(),
            Ok(content) => {
                serde_json::from_str(&content).map_err(|source| PersistenceError::Corrupt {
                    path: path.clone(),
                    source,
                })?
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "State file not found, starting empty");
                Map::new()
            }
            Err(source) => return Err(PersistenceError::Io { path, source }),
        };

        let (writer, requests) = mpsc::unbounded_channel();
        tokio::spawn(run_writer(path.clone(), requests));

        Ok(Self {
            path,
            values: Mutex::new(values),
            writer,
        })
    }

    /// Path of the backing file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn writer_closed(&self) -> PersistenceError {
        PersistenceError::WriterClosed {
            path: self.path.clone(),
        }
    }
}

#[async_trait]
impl KeyValueStore for JsonFileStore {
    fn get(&self, key: &str) -> Option<Value> {
        self.values.lock().get(key).cloned()
    }

    fn set(&self, key: &str, value: Value) -> Result<(), PersistenceError> {
        // Queued under the lock so snapshots reach the writer in order.
        let mut values = self.values.lock();
        values.insert(key.to_string(), value);
        let json =
            serde_json::to_string_pretty(&*values).map_err(|source| PersistenceError::Corrupt {
                path: self.path.clone(),
                source,
            })?;
        self.writer
            .send(WriteRequest::Save(json))
            .map_err(|_| self.writer_closed())
    }

    async fn flush(&self) -> Result<(), PersistenceError> {
        let (done, result) = oneshot::channel();
        self.writer
            .send(WriteRequest::Flush(done))
            .map_err(|_| self.writer_closed())?;
        result.await.map_err(|_| self.writer_closed())?
    }
}

/// Save queued snapshots until the store is dropped
async fn run_writer(path: PathBuf, mut requests: mpsc::UnboundedReceiver<WriteRequest>) {
    let mut failure = None;

    while let Some(request) = requests.recv().await {
        match request {
            WriteRequest::Save(json) => {
                if let Err(e) = write_file(&path, json).await {
                    tracing::warn!(error = %e, "Failed to save state file");
                    failure.get_or_insert(e);
                }
            }
            WriteRequest::Flush(done) => {
                let _ = done.send(failure.take().map_or(Ok(()), Err));
            }
        }
    }

    tracing::debug!(path = %path.display(), "State file writer stopped");
}

async fn write_file(path: &Path, json: String) -> Result<(), PersistenceError> {
    let io_err = |source| PersistenceError::Io {
        path: path.to_path_buf(),
        source,
    };

    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
    }
    tokio::fs::write(path, json).await.map_err(io_err)
}

/// Default state file location
///
/// Returns `$XDG_DATA_HOME/ethereal/engine-state.json` (typically
/// `~/.local/share/ethereal/engine-state.json`).
#[must_use]
pub fn default_state_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("ethereal").join("engine-state.json"))
}
