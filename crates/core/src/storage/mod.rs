//! Player-scoped key-value persistence

mod db;

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use tracing::debug;

use crate::error::Result;
use crate::puzzles::PuzzleSet;

pub use db::Database;

const PUZZLES_KEY: &str = "puzzles";

/// String values grouped by namespace.
pub trait KeyValueStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>>;
    fn set(&self, namespace: &str, key: &str, value: &str) -> Result<()>;
}

/// Store kept in process memory.
///
/// Every write is a single insert, so a writer that panicked cannot leave the
/// map half-updated and a poisoned lock is simply taken over.
#[derive(Debug, Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<(String, String), String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, namespace: &str, key: &str) -> Result<Option<String>> {
        let values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        Ok(values.get(&(namespace.to_string(), key.to_string())).cloned())
    }

    fn set(&self, namespace: &str, key: &str, value: &str) -> Result<()> {
        let mut values = self.values.lock().unwrap_or_else(PoisonError::into_inner);
        values.insert((namespace.to_string(), key.to_string()), value.to_string());
        Ok(())
    }
}

/// Namespace for data belonging to `player`
pub fn player_namespace(player: &str) -> String {
    format!("player:{}", player.to_lowercase())
}

/// Loads a player's puzzles. A player with nothing stored gets an empty set.
pub fn load_puzzles<S: KeyValueStore + ?Sized>(store: &S, player: &str) -> Result<PuzzleSet> {
    match store.get(&player_namespace(player), PUZZLES_KEY)? {
        Some(blob) => {
            let set: PuzzleSet = serde_json::from_str(&blob)?;
            debug!(player, puzzles = set.len(), "loaded puzzles");
            Ok(set)
        }
        None => Ok(PuzzleSet::new()),
    }
}

pub fn save_puzzles<S: KeyValueStore + ?Sized>(store: &S, player: &str, puzzles: &PuzzleSet) -> Result<()> {
    let blob = serde_json::to_string(puzzles)?;
    store.set(&player_namespace(player), PUZZLES_KEY, &blob)?;
    debug!(player, puzzles = puzzles.len(), "saved puzzles");
    Ok(())
}
