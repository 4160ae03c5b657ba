//! Single-flight, never-evicting async cache.
//!
//! ```text
//!   read(key) ──▶ entry?
//!                  ├── Resolved(v)       → Ok(v.clone())
//!                  ├── Rejected(e)       → Err(e.clone())
//!                  ├── Pending(waiters)  → push oneshot, await it
//!                  └── none              → insert Pending([me]), spawn loader, await
//!
//!   loader settles ──▶ entry = Resolved | Rejected, every waiter gets a clone
//! ```
//!
//! The loader runs in its own task, so a reader that gives up does not cancel
//! the fetch for everyone else, and a loader that panics settles as
//! `Abandoned`.  There is no timeout: a loader that never settles keeps its
//! readers suspended.  Entries live for the life of the cache; a rejected key
//! stays rejected.

use std::collections::HashMap;
use std::fmt::Debug;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use futures_util::future::BoxFuture;
use thiserror::Error;
use tokio::sync::oneshot;
use tracing::{debug, warn};

/// Why a key could not be loaded.  Cloned out to every reader of the key.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {message}")]
    Network { url: String, message: String },
    #[error("{url} answered HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("could not parse {url}: {message}")]
    Parse { url: String, message: String },
    /// The loader task died before settling the entry.
    #[error("load of {key} was abandoned")]
    Abandoned { key: String },
}

pub type Loader<K, V> = Arc<dyn Fn(K) -> BoxFuture<'static, Result<V, FetchError>> + Send + Sync>;

type Waiter<V> = oneshot::Sender<Result<V, FetchError>>;

enum EntryState<V> {
    Pending(Vec<Waiter<V>>),
    Resolved(V),
    Rejected(FetchError),
}

/// Observable state of one key, without triggering a load.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryStatus<V> {
    Pending,
    Resolved(V),
    Rejected(FetchError),
}

struct Inner<K, V> {
    entries: Mutex<HashMap<K, EntryState<V>>>,
    loader: Loader<K, V>,
}

pub struct ResourceCache<K, V> {
    inner: Arc<Inner<K, V>>,
}

impl<K, V> Clone for ResourceCache<K, V> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<K, V> ResourceCache<K, V>
where
    K: Eq + Hash + Clone + Debug + Send + Sync + 'static,
    V: Clone + Send + 'static,
{
    pub fn new(loader: Loader<K, V>) -> Self {
        Self {
            inner: Arc::new(Inner {
                entries: Mutex::new(HashMap::new()),
                loader,
            }),
        }
    }

    /// Build from a plain async closure.
    pub fn from_fn<Fut, L>(loader: L) -> Self
    where
        L: Fn(K) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<V, FetchError>> + Send + 'static,
    {
        Self::new(Arc::new(
            move |key| -> BoxFuture<'static, Result<V, FetchError>> { Box::pin(loader(key)) },
        ))
    }

    /// Value for `key`, loading it on first use.  Must be called from within a tokio runtime.
    pub async fn read(&self, key: &K) -> Result<V, FetchError> {
        let rx = {
            let mut entries = self.entries();
            match entries.get_mut(key) {
                Some(EntryState::Resolved(value)) => return Ok(value.clone()),
                Some(EntryState::Rejected(err)) => return Err(err.clone()),
                Some(EntryState::Pending(waiters)) => {
                    debug!("cache: joining in-flight load of {:?}", key);
                    let (tx, rx) = oneshot::channel();
                    waiters.push(tx);
                    rx
                }
                None => {
                    debug!("cache: first read of {:?}, loading", key);
                    let (tx, rx) = oneshot::channel();
                    entries.insert(key.clone(), EntryState::Pending(vec![tx]));
                    self.spawn_load(key.clone());
                    rx
                }
            }
        };

        rx.await.unwrap_or_else(|_| {
            Err(FetchError::Abandoned {
                key: format!("{:?}", key),
            })
        })
    }

    /// Current state of `key`.  `None` when it was never read.
    pub fn peek(&self, key: &K) -> Option<EntryStatus<V>> {
        self.entries().get(key).map(|state| match state {
            EntryState::Pending(_) => EntryStatus::Pending,
            EntryState::Resolved(v) => EntryStatus::Resolved(v.clone()),
            EntryState::Rejected(e) => EntryStatus::Rejected(e.clone()),
        })
    }

    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Run the loader in its own task and settle from a supervisor, so a
    /// loader that panics or is aborted still settles as `Abandoned`.
    fn spawn_load(&self, key: K) {
        let inner = Arc::clone(&self.inner);
        let loader = Arc::clone(&inner.loader);
        let load_key = key.clone();
        let load = tokio::spawn(async move { loader(load_key).await });
        tokio::spawn(async move {
            let result = match load.await {
                Ok(result) => result,
                Err(e) => {
                    warn!("cache: loader for {:?} died: {}", key, e);
                    Err(FetchError::Abandoned {
                        key: format!("{:?}", key),
                    })
                }
            };
            settle(&inner, key, result);
        });
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<K, EntryState<V>>> {
        lock(&self.inner)
    }
}

fn lock<K, V>(inner: &Inner<K, V>) -> MutexGuard<'_, HashMap<K, EntryState<V>>> {
    // A panic while holding the lock cannot leave a half-written entry behind
    inner.entries.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn settle<K, V>(inner: &Inner<K, V>, key: K, result: Result<V, FetchError>)
where
    K: Eq + Hash + Debug,
    V: Clone,
{
    let mut entries = lock(inner);
    let settled = match &result {
        Ok(value) => EntryState::Resolved(value.clone()),
        Err(err) => {
            warn!("cache: load of {:?} rejected: {}", key, err);
            EntryState::Rejected(err.clone())
        }
    };
    let previous = entries.insert(key, settled);
    drop(entries);

    if let Some(EntryState::Pending(waiters)) = previous {
        debug!("cache: settling {} waiter(s)", waiters.len());
        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
    }
}
