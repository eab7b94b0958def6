use std::fmt;
use std::str::FromStr;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::StoreError;
use crate::storage::KeyValueStore;

/// Key under which the whole task list is persisted.
pub const STORAGE_KEY: &str = "todo-ai-tasks";

/// Longest task text the input surfaces accept.
pub const MAX_TASK_TEXT_CHARS: usize = 200;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub text: String,
    pub done: bool,
    /// Epoch milliseconds
    pub created_at: i64,
}

impl Task {
    fn new(text: &str) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            text: text.to_string(),
            done: false,
            created_at: chrono::Utc::now().timestamp_millis(),
        }
    }

    /// Structural check applied to persisted entries.
    fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        Some(Self {
            id: obj.get("id")?.as_str()?.to_string(),
            text: obj.get("text")?.as_str()?.to_string(),
            done: obj.get("done")?.as_bool()?,
            created_at: obj.get("createdAt")?.as_f64()? as i64,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterMode {
    #[default]
    All,
    Active,
    Done,
}

impl FilterMode {
    pub fn matches(self, task: &Task) -> bool {
        match self {
            FilterMode::All => true,
            FilterMode::Active => !task.done,
            FilterMode::Done => task.done,
        }
    }
}

impl FromStr for FilterMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(FilterMode::All),
            "active" => Ok(FilterMode::Active),
            "done" => Ok(FilterMode::Done),
            other => Err(format!("unknown filter '{}', expected all, active or done", other)),
        }
    }
}

impl fmt::Display for FilterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterMode::All => write!(f, "all"),
            FilterMode::Active => write!(f, "active"),
            FilterMode::Done => write!(f, "done"),
        }
    }
}

/// Authoritative task list mirrored to a key-value store on every mutation.
pub struct TaskStore<S: KeyValueStore> {
    tasks: Vec<Task>,
    storage: S,
}

impl<S: KeyValueStore> TaskStore<S> {
    /// Open the store, reading whatever was persisted before.
    pub fn load(storage: S) -> Self {
        let tasks = Self::read_tasks(&storage);
        Self { tasks, storage }
    }

    fn read_tasks(storage: &S) -> Vec<Task> {
        let bytes = match storage.get(STORAGE_KEY) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => return Vec::new(),
            Err(e) => {
                warn!("Failed to read stored tasks, starting empty: {}", e);
                return Vec::new();
            }
        };

        let entries: Vec<Value> = match serde_json::from_slice(&bytes) {
            Ok(entries) => entries,
            Err(e) => {
                warn!("Stored tasks are not a JSON array, starting empty: {}", e);
                return Vec::new();
            }
        };

        let total = entries.len();
        let tasks: Vec<Task> = entries.iter().filter_map(Task::from_value).collect();
        if tasks.len() < total {
            debug!("Dropped {} malformed stored task(s)", total - tasks.len());
        }
        tasks
    }

    /// Serialize the full list and overwrite the stored blob.
    pub fn persist(&self) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(&self.tasks)?;
        self.storage.set(STORAGE_KEY, &bytes)
    }

    /// Prepend a new task. Blank text is ignored.
    pub fn add(&mut self, text: &str) -> Result<Option<Task>, StoreError> {
        let Some(task) = self.insert(text) else {
            return Ok(None);
        };
        self.persist()?;
        Ok(Some(task))
    }

    /// Add several tasks in order, persisting once. Returns how many were added.
    pub fn add_many<I, T>(&mut self, texts: I) -> Result<usize, StoreError>
    where
        I: IntoIterator<Item = T>,
        T: AsRef<str>,
    {
        let mut added = 0;
        for text in texts {
            if self.insert(text.as_ref()).is_some() {
                added += 1;
            }
        }
        if added > 0 {
            self.persist()?;
        }
        Ok(added)
    }

    fn insert(&mut self, text: &str) -> Option<Task> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        let task = Task::new(text);
        self.tasks.insert(0, task.clone());
        Some(task)
    }

    /// Flip the completion flag. Returns false when no task has that id.
    pub fn toggle(&mut self, id: &str) -> Result<bool, StoreError> {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            return Ok(false);
        };
        task.done = !task.done;
        self.persist()?;
        Ok(true)
    }

    pub fn remove(&mut self, id: &str) -> Result<bool, StoreError> {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        if self.tasks.len() == before {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    /// Drop every completed task. Returns how many were removed.
    pub fn clear_completed(&mut self) -> Result<usize, StoreError> {
        let before = self.tasks.len();
        self.tasks.retain(|t| !t.done);
        let removed = before - self.tasks.len();
        self.persist()?;
        Ok(removed)
    }

    pub fn filter(&self, mode: FilterMode) -> impl Iterator<Item = &Task> + '_ {
        self.tasks.iter().filter(move |t| mode.matches(t))
    }

    /// (total, active, done)
    pub fn counts(&self) -> (usize, usize, usize) {
        let done = self.tasks.iter().filter(|t| t.done).count();
        (self.tasks.len(), self.tasks.len() - done, done)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn texts<'a>(it: impl Iterator<Item = &'a Task>) -> Vec<&'a str> {
        it.map(|t| t.text.as_str()).collect()
    }

    #[test]
    fn test_add_prepends_and_persists() {
        let mut store = TaskStore::load(MemoryStore::new());
        store.add("first").unwrap();
        let second = store.add("  second  ").unwrap().unwrap();

        assert_eq!(second.text, "second");
        assert!(!second.done);
        assert_eq!(texts(store.filter(FilterMode::All)), vec!["second", "first"]);

        let reopened = TaskStore::load(store.storage);
        assert_eq!(texts(reopened.filter(FilterMode::All)), vec!["second", "first"]);
    }

    #[test]
    fn test_add_blank_is_noop() {
        let storage = MemoryStore::new();
        let mut store = TaskStore::load(storage);
        assert!(store.add("   ").unwrap().is_none());
        assert!(store.tasks().is_empty());
        assert!(store.storage.get(STORAGE_KEY).unwrap().is_none());
    }

    #[test]
    fn test_ids_are_unique() {
        let mut store = TaskStore::load(MemoryStore::new());
        let a = store.add("a").unwrap().unwrap();
        let b = store.add("a").unwrap().unwrap();
        assert_ne!(a.id, b.id);
    }

    #[test]
    fn test_toggle_then_filter() {
        let mut store = TaskStore::load(MemoryStore::new());
        let buy = store.add("buy groceries").unwrap().unwrap();
        store.add("book flights").unwrap();

        assert!(store.toggle(&buy.id).unwrap());

        assert_eq!(texts(store.filter(FilterMode::Active)), vec!["book flights"]);
        assert_eq!(texts(store.filter(FilterMode::Done)), vec!["buy groceries"]);
        assert_eq!(store.counts(), (2, 1, 1));

        assert_eq!(store.clear_completed().unwrap(), 1);
        assert_eq!(texts(store.filter(FilterMode::All)), vec!["book flights"]);
    }

    #[test]
    fn test_toggle_and_remove_unknown_id() {
        let mut store = TaskStore::load(MemoryStore::new());
        store.add("a").unwrap();
        assert!(!store.toggle("missing").unwrap());
        assert!(!store.remove("missing").unwrap());
        assert_eq!(store.tasks().len(), 1);
        assert!(!store.tasks()[0].done);
    }

    #[test]
    fn test_remove() {
        let mut store = TaskStore::load(MemoryStore::new());
        let a = store.add("a").unwrap().unwrap();
        store.add("b").unwrap();
        assert!(store.remove(&a.id).unwrap());
        assert_eq!(texts(store.filter(FilterMode::All)), vec!["b"]);
    }

    #[test]
    fn test_add_many_skips_blank() {
        let mut store = TaskStore::load(MemoryStore::new());
        let added = store.add_many(["买菜", " ", "预订机票"]).unwrap();
        assert_eq!(added, 2);
        assert_eq!(texts(store.filter(FilterMode::All)), vec!["预订机票", "买菜"]);
    }

    #[test]
    fn test_load_drops_malformed_entries() {
        let storage = MemoryStore::new();
        let blob = r#"[
            {"id": "1", "text": "ok", "done": false, "createdAt": 1700000000000},
            {"id": 2, "text": "numeric id", "done": false, "createdAt": 1},
            {"id": "3", "text": "string done", "done": "yes", "createdAt": 1},
            {"id": "4", "text": "no timestamp", "done": true},
            "not an object",
            {"id": "5", "text": "also ok", "done": true, "createdAt": 1.5e12}
        ]"#;
        storage.set(STORAGE_KEY, blob.as_bytes()).unwrap();

        let store = TaskStore::load(storage);
        let ids: Vec<&str> = store.tasks().iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["1", "5"]);
        assert_eq!(store.tasks()[1].created_at, 1_500_000_000_000);
    }

    #[test]
    fn test_load_garbage_degrades_to_empty() {
        let storage = MemoryStore::new();
        storage.set(STORAGE_KEY, b"{not json").unwrap();
        assert!(TaskStore::load(storage).tasks().is_empty());

        let storage = MemoryStore::new();
        storage.set(STORAGE_KEY, br#"{"tasks": []}"#).unwrap();
        assert!(TaskStore::load(storage).tasks().is_empty());
    }

    #[test]
    fn test_persisted_shape_uses_camel_case() {
        let mut store = TaskStore::load(MemoryStore::new());
        store.add("a").unwrap();
        let bytes = store.storage.get(STORAGE_KEY).unwrap().unwrap();
        let value: Value = serde_json::from_slice(&bytes).unwrap();
        assert!(value[0]["createdAt"].is_i64());
        assert_eq!(value[0]["done"], Value::Bool(false));
    }

    #[test]
    fn test_filter_mode_parse() {
        assert_eq!("Active".parse::<FilterMode>().unwrap(), FilterMode::Active);
        assert_eq!("done".parse::<FilterMode>().unwrap(), FilterMode::Done);
        assert!("later".parse::<FilterMode>().is_err());
    }
}
