//! Key/value settings store. Store settings live under one JSON document.

use super::common::{ensure_connection_ready, from_json, to_json, RepoResult};
use crate::model::now_ms;
use crate::model::settings::StoreSettings;
use rusqlite::{params, Connection, OptionalExtension};

const STORE_SETTINGS_KEY: &str = "store";

/// Repository interface for store settings.
pub trait SettingsRepository {
    /// Stored settings, `None` before the first save.
    fn load_store_settings(&self) -> RepoResult<Option<StoreSettings>>;
    fn save_store_settings(&self, settings: &StoreSettings) -> RepoResult<()>;
}

/// SQLite-backed settings repository.
pub struct SqliteSettingsRepository<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteSettingsRepository<'conn> {
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn, &["settings"])?;
        Ok(Self { conn })
    }
}

impl SettingsRepository for SqliteSettingsRepository<'_> {
    fn load_store_settings(&self) -> RepoResult<Option<StoreSettings>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value_json FROM settings WHERE key = ?1;",
                [STORE_SETTINGS_KEY],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|raw| from_json(&raw, "settings.value_json"))
            .transpose()
    }

    fn save_store_settings(&self, settings: &StoreSettings) -> RepoResult<()> {
        settings.validate()?;
        self.conn.execute(
            "INSERT INTO settings (key, value_json, updated_at)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                value_json = excluded.value_json,
                updated_at = excluded.updated_at;",
            params![
                STORE_SETTINGS_KEY,
                to_json(settings, "settings.value_json")?,
                now_ms(),
            ],
        )?;
        Ok(())
    }
}
