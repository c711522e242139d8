use crate::Error;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

/// Key-value storage that works for in-memory, file and SQLite backends.
///
/// Uses `async_trait` with `?Send` bound: the whole state layer runs on one
/// logical thread, so implementations are free to hold non-`Send` handles.
#[async_trait::async_trait(?Send)]
pub trait KeyValueStore {
    /// Read the value stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<String>, Error>;

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: &str) -> Result<(), Error>;

    /// Remove a key. Returns true if it existed.
    async fn remove(&self, key: &str) -> Result<bool, Error>;

    /// Remove every key in the store, including ones this crate never wrote.
    async fn clear(&self) -> Result<(), Error>;

    /// List all keys currently stored, sorted.
    async fn keys(&self) -> Result<Vec<String>, Error>;
}

#[async_trait::async_trait(?Send)]
impl<S: KeyValueStore + ?Sized> KeyValueStore for Rc<S> {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        (**self).get(key).await
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        (**self).set(key, value).await
    }

    async fn remove(&self, key: &str) -> Result<bool, Error> {
        (**self).remove(key).await
    }

    async fn clear(&self) -> Result<(), Error> {
        (**self).clear().await
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        (**self).keys().await
    }
}

/// Reject keys that could not be stored safely as a file name or table key.
pub fn validate_key(key: &str) -> Result<(), Error> {
    if key.is_empty() {
        return Err(Error::Validation("key cannot be empty".into()));
    }
    if key.starts_with('.') {
        return Err(Error::Validation(format!("key cannot start with '.': {}", key)));
    }
    if let Some(c) = key
        .chars()
        .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.')))
    {
        return Err(Error::Validation(format!(
            "key {:?} contains unsupported character {:?}",
            key, c
        )));
    }
    Ok(())
}

/// Volatile store kept entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RefCell<BTreeMap<String, String>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store pre-populated with entries.
    pub fn with_entries<I, K, V>(entries: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            entries: RefCell::new(
                entries
                    .into_iter()
                    .map(|(k, v)| (k.into(), v.into()))
                    .collect(),
            ),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

#[async_trait::async_trait(?Send)]
impl KeyValueStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>, Error> {
        Ok(self.entries.borrow().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> Result<(), Error> {
        validate_key(key)?;
        self.entries
            .borrow_mut()
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<bool, Error> {
        Ok(self.entries.borrow_mut().remove(key).is_some())
    }

    async fn clear(&self) -> Result<(), Error> {
        self.entries.borrow_mut().clear();
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, Error> {
        Ok(self.entries.borrow().keys().cloned().collect())
    }
}
