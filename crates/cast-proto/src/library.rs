//! Saved podcast list.
//!
//! The list is stored as one JSON string under a named key of a plain
//! get/set string store, so the player never depends on the medium.

use std::collections::HashMap;
use std::path::PathBuf;

use anyhow::Context;
use tracing::warn;

use crate::protocol::Podcast;

/// Key the podcast list is saved under.
pub const LIBRARY_KEY: &str = "podcasts";

/// Where an unreadable list is copied before the first write replaces it.
pub const LIBRARY_BACKUP_KEY: &str = "podcasts.unreadable";

pub trait KeyValueStore: Send {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>>;
    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()>;
}

impl<S: KeyValueStore + ?Sized> KeyValueStore for Box<S> {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        (**self).get(key)
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        (**self).set(key, value)
    }
}

/// In-process store, mostly for tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: HashMap<String, String>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// One `<key>.json` file per key inside `dir`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> anyhow::Result<Option<String>> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(std::fs::read_to_string(path)?))
    }

    fn set(&mut self, key: &str, value: &str) -> anyhow::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        std::fs::write(self.path_for(key), value)?;
        Ok(())
    }
}

pub struct PodcastLibrary<S: KeyValueStore> {
    store: S,
}

impl<S: KeyValueStore> PodcastLibrary<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Saved podcasts in insertion order.  A corrupt entry reads as empty.
    pub fn load(&self) -> anyhow::Result<Vec<Podcast>> {
        let Some(raw) = self.store.get(LIBRARY_KEY)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Vec<Podcast>>(&raw) {
            Ok(list) => Ok(list),
            Err(e) => {
                warn!("library: ignoring unreadable podcast list: {}", e);
                Ok(Vec::new())
            }
        }
    }

    pub fn save(&mut self, podcasts: &[Podcast]) -> anyhow::Result<()> {
        let json = serde_json::to_string_pretty(podcasts)?;
        self.store.set(LIBRARY_KEY, &json)
    }

    /// Current list for a read-modify-write.  Unreadable data is copied to
    /// [`LIBRARY_BACKUP_KEY`] first; if that copy fails nothing gets written.
    fn load_for_update(&mut self) -> anyhow::Result<Vec<Podcast>> {
        let Some(raw) = self.store.get(LIBRARY_KEY)? else {
            return Ok(Vec::new());
        };
        match serde_json::from_str::<Vec<Podcast>>(&raw) {
            Ok(list) => Ok(list),
            Err(e) => {
                warn!(
                    "library: podcast list unreadable ({}), keeping a copy under '{}'",
                    e, LIBRARY_BACKUP_KEY
                );
                self.store
                    .set(LIBRARY_BACKUP_KEY, &raw)
                    .context("backing up unreadable podcast list")?;
                Ok(Vec::new())
            }
        }
    }

    /// Insert or replace (matched on feed URL), keeping its position.
    pub fn upsert(&mut self, podcast: Podcast) -> anyhow::Result<Vec<Podcast>> {
        let mut list = self.load_for_update()?;
        match list.iter_mut().find(|p| p.feed_url == podcast.feed_url) {
            Some(existing) => *existing = podcast,
            None => list.push(podcast),
        }
        self.save(&list)?;
        Ok(list)
    }

    pub fn remove(&mut self, feed_url: &str) -> anyhow::Result<Vec<Podcast>> {
        let mut list = self.load_for_update()?;
        list.retain(|p| p.feed_url != feed_url);
        self.save(&list)?;
        Ok(list)
    }
}
