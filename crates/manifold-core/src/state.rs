//! # Application State
//!
//! Type-erased, string-keyed storage for application-wide resources
//! (database pools, API clients, ...) shared with handlers via cheap
//! clones.

use std::any::Any;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Thread-safe application state container
///
/// # Example
///
/// ```
/// use manifold_core::AppState;
///
/// let state = AppState::new();
/// state.set("answer", 42_i32);
/// assert_eq!(state.get::<i32>("answer"), Some(42));
/// ```
#[derive(Clone, Default)]
pub struct AppState {
    data: Arc<RwLock<HashMap<String, Box<dyn Any + Send + Sync>>>>,
}

impl AppState {
    /// Create a new empty state container
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Store a value with a string key
    ///
    /// Overwrites any existing value with the same key.
    pub fn set<T: Send + Sync + 'static>(&self, key: impl Into<String>, value: T) {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        data.insert(key.into(), Box::new(value));
    }

    /// Get a cloned value by key
    ///
    /// Returns `None` if the key doesn't exist or the type doesn't match.
    #[must_use]
    pub fn get<T: Clone + Send + Sync + 'static>(&self, key: &str) -> Option<T> {
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        data.get(key)
            .and_then(|boxed| boxed.downcast_ref::<T>())
            .cloned()
    }

    /// Check if a key exists
    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        data.contains_key(key)
    }

    /// Remove a value by key; returns whether it was present
    pub fn remove(&self, key: &str) -> bool {
        let mut data = self.data.write().unwrap_or_else(|e| e.into_inner());
        data.remove(key).is_some()
    }

    /// Number of stored items
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.read().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Check if state is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let data = self.data.read().unwrap_or_else(|e| e.into_inner());
        f.debug_struct("AppState")
            .field("keys", &data.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_get() {
        let state = AppState::new();
        state.set("count", 42i32);
        state.set("name", "test".to_string());

        assert_eq!(state.get::<i32>("count"), Some(42));
        assert_eq!(state.get::<String>("name"), Some("test".to_string()));
    }

    #[test]
    fn test_type_mismatch() {
        let state = AppState::new();
        state.set("count", 42i32);
        assert_eq!(state.get::<String>("count"), None);
    }

    #[test]
    fn test_overwrite_and_remove() {
        let state = AppState::new();
        state.set("value", 1i32);
        state.set("value", 2i32);
        assert_eq!(state.get::<i32>("value"), Some(2));

        assert!(state.remove("value"));
        assert!(!state.contains("value"));
    }

    #[test]
    fn test_thread_safe() {
        use std::thread;

        let state = AppState::new();
        let state_clone = state.clone();

        let handle = thread::spawn(move || {
            state_clone.set("thread", 123i32);
        });

        handle.join().unwrap();
        assert_eq!(state.get::<i32>("thread"), Some(123));
    }
}
