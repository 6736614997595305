//! Browser `localStorage` persistence. Only call these from client-side effects.

use thiserror::Error;
use web_sys::Storage;

use crate::models::sessions::SessionStore;

pub const SESSIONS_KEY: &str = "greenbot.sessions";
pub const DARK_MODE_KEY: &str = "greenbot.dark_mode";

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("local storage is not available")]
    Unavailable,
    #[error("failed to serialize sessions: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write local storage: {0}")]
    Write(String),
}

fn local_storage() -> Option<Storage> {
    web_sys::window()?.local_storage().ok().flatten()
}

fn read(key: &str) -> Option<String> {
    local_storage()?.get_item(key).ok().flatten()
}

fn write(key: &str, value: &str) -> Result<(), StorageError> {
    local_storage()
        .ok_or(StorageError::Unavailable)?
        .set_item(key, value)
        .map_err(|e| StorageError::Write(format!("{e:?}")))
}

pub fn load_sessions() -> SessionStore {
    read(SESSIONS_KEY)
        .map(|raw| SessionStore::from_json(&raw))
        .unwrap_or_default()
}

pub fn save_sessions(store: &SessionStore) -> Result<(), StorageError> {
    write(SESSIONS_KEY, &store.to_json()?)
}

pub fn load_dark_mode() -> Option<bool> {
    read(DARK_MODE_KEY)?.parse().ok()
}

pub fn save_dark_mode(is_dark: bool) -> Result<(), StorageError> {
    write(DARK_MODE_KEY, &is_dark.to_string())
}
