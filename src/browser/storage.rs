//! `localStorage` backend.

use wasm_bindgen::JsValue;

use crate::store::{KeyValueStorage, StorageError};

pub struct LocalStorage {
    storage: web_sys::Storage,
}

impl LocalStorage {
    /// # Errors
    ///
    /// [`StorageError::Unavailable`] without a window or when the browser
    /// denies access (privacy mode, sandboxed frame).
    pub fn open() -> Result<Self, StorageError> {
        let storage = web_sys::window()
            .and_then(|w| w.local_storage().ok().flatten())
            .ok_or(StorageError::Unavailable)?;
        Ok(Self { storage })
    }
}

fn backend_error(op: &'static str, key: &str, err: &JsValue) -> StorageError {
    StorageError::Backend { op, key: key.to_owned(), reason: format!("{err:?}") }
}

impl KeyValueStorage for LocalStorage {
    fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        self.storage.get_item(key).map_err(|e| backend_error("get", key, &e))
    }

    fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.storage.set_item(key, value).map_err(|e| backend_error("set", key, &e))
    }

    fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.storage.remove_item(key).map_err(|e| backend_error("remove", key, &e))
    }
}
