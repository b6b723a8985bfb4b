use std::time::Duration;

use crate::formats::PageIndex;

/// How long the "Saved!" confirmation stays visible.
pub const SAVED_FEEDBACK: Duration = Duration::from_secs(2);

pub const DEFAULT_PROMPT: &str = "Reflection";

/// Device-local storage key for one page's reflection.
pub fn reflection_key(book_id: &str, page_index: PageIndex) -> String {
    format!("reflection_{book_id}_{page_index}")
}

/// Where a reader's saved reflections come from when the form is rendered.
pub trait ReflectionStore {
    fn load(&self, key: &str) -> Option<String>;
}

/// Reflections kept in the reader's browser. The server never sees them, so
/// every form renders empty and the viewer script fills it in on load.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrowserStorage;

impl ReflectionStore for BrowserStorage {
    fn load(&self, _key: &str) -> Option<String> {
        None
    }
}

#[cfg(test)]
#[derive(Debug, Clone, Default)]
pub struct MemoryReflectionStore {
    entries: std::collections::HashMap<String, String>,
}

#[cfg(test)]
impl MemoryReflectionStore {
    pub fn with(key: &str, text: &str) -> Self {
        let mut store = Self::default();
        store.entries.insert(key.to_string(), text.to_string());
        store
    }
}

#[cfg(test)]
impl ReflectionStore for MemoryReflectionStore {
    fn load(&self, key: &str) -> Option<String> {
        self.entries.get(key).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_combines_book_and_page() {
        assert_eq!(reflection_key("grade3_lesson1", 4), "reflection_grade3_lesson1_4");
    }

    #[test]
    fn browser_storage_has_nothing_server_side() {
        assert_eq!(BrowserStorage.load("reflection_b_1"), None);
        let store = MemoryReflectionStore::with("reflection_b_1", "Halves");
        assert_eq!(store.load("reflection_b_1").as_deref(), Some("Halves"));
        assert_eq!(store.load("reflection_b_2"), None);
    }
}
