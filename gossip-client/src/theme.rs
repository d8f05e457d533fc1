//! Persisted chat theme preference.

use gossip_core::Theme;
use std::sync::Arc;
use tracing::debug;

use crate::error::ClientError;
use crate::notify::{Notifier, Topic};
use crate::storage::{KeyValueStore, THEME_KEY};

/// Reads and writes the chosen theme.
pub struct ThemeStore {
    storage: Arc<dyn KeyValueStore>,
    notifier: Notifier,
}

impl ThemeStore {
    /// Create a store over `storage`.
    pub fn new(storage: Arc<dyn KeyValueStore>, notifier: Notifier) -> Self {
        Self { storage, notifier }
    }

    /// Current theme; unknown or missing values give the default.
    pub async fn current(&self) -> Result<Theme, ClientError> {
        let stored = self.storage.get(THEME_KEY).await?;
        let theme = Theme::resolve(stored.as_deref());
        if stored.as_deref().is_some_and(|id| id != theme.id()) {
            debug!(stored = ?stored, "unknown stored theme, using default");
        }
        Ok(theme)
    }

    /// Persist `theme`.
    pub async fn set(&self, theme: Theme) -> Result<(), ClientError> {
        self.storage.set(THEME_KEY, theme.id()).await?;
        self.notifier.changed(Topic::Theme);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[tokio::test]
    async fn default_is_coffee() {
        let store = ThemeStore::new(Arc::new(MemoryStore::new()), Notifier::default());
        assert_eq!(store.current().await.unwrap(), Theme::Coffee);
    }

    #[tokio::test]
    async fn set_round_trips_through_storage() {
        let storage = Arc::new(MemoryStore::new());
        let store = ThemeStore::new(storage.clone(), Notifier::default());

        store.set(Theme::Dracula).await.unwrap();

        assert_eq!(
            storage.get(THEME_KEY).await.unwrap().as_deref(),
            Some("dracula")
        );
        assert_eq!(store.current().await.unwrap(), Theme::Dracula);
    }

    #[tokio::test]
    async fn unknown_stored_theme_falls_back() {
        let storage = Arc::new(MemoryStore::new());
        storage.set(THEME_KEY, "neon").await.unwrap();
        let store = ThemeStore::new(storage, Notifier::default());

        assert_eq!(store.current().await.unwrap(), Theme::Coffee);
    }
}
