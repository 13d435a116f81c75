use std::path::Path;

use anyhow::{Context, Result};
use chrono::Utc;
use rusqlite::{Connection, OptionalExtension, params};
use uuid::Uuid;

use crate::models::{
    AppSettings, MileageEntry, MileageUnit, NewMileageEntry, ThemeMode, UpdateAppSettings,
    UpdateMileageEntry, calculate_mileage,
};

/// Fixed key for the settings singleton row.
const SETTINGS_ID: &str = "app-settings";

/// Durable on-device store. Every successful write has hit SQLite before the
/// call returns, so callers may reflect the change immediately.
pub struct Database {
    conn: Connection,
}

impl Database {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("Failed to open database: {}", path.display()))?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        let db = Database { conn };
        db.migrate()?;
        Ok(db)
    }

    fn migrate(&self) -> Result<()> {
        let version: i64 = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;

        if version < 1 {
            self.conn.execute_batch(
                "CREATE TABLE IF NOT EXISTS entries (
                    id TEXT PRIMARY KEY,
                    date TEXT NOT NULL,
                    miles REAL NOT NULL,
                    liters REAL NOT NULL,
                    price_pence REAL NOT NULL,
                    mileage_km_per_l REAL NOT NULL,
                    mileage_mpg REAL NOT NULL,
                    image TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_entries_date ON entries(date);
                CREATE INDEX IF NOT EXISTS idx_entries_created_at ON entries(created_at);

                CREATE TABLE IF NOT EXISTS settings (
                    id TEXT PRIMARY KEY,
                    mileage_unit TEXT NOT NULL,
                    theme TEXT NOT NULL
                );

                PRAGMA user_version = 1;",
            )?;
        }

        Ok(())
    }

    // --- Row mapping helpers ---

    fn entry_from_row(row: &rusqlite::Row) -> rusqlite::Result<MileageEntry> {
        Ok(MileageEntry {
            id: row.get(0)?,
            date: row.get(1)?,
            miles: row.get(2)?,
            liters: row.get(3)?,
            price_pence: row.get(4)?,
            mileage_km_per_l: row.get(5)?,
            mileage_mpg: row.get(6)?,
            image: row.get(7)?,
            created_at: row.get(8)?,
            updated_at: row.get(9)?,
        })
    }

    // --- Entries ---

    /// Assigns id and timestamps, derives the efficiency columns, persists,
    /// and returns the stored record.
    pub fn insert_entry(&self, entry: &NewMileageEntry) -> Result<MileageEntry> {
        let now = Utc::now().to_rfc3339();
        let id = Uuid::new_v4().to_string();
        let mileage = calculate_mileage(entry.miles, entry.liters);
        self.conn.execute(
            "INSERT INTO entries (id, date, miles, liters, price_pence, mileage_km_per_l, mileage_mpg, image, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                id,
                entry.date,
                entry.miles,
                entry.liters,
                entry.price_pence,
                mileage.km_per_l,
                mileage.mpg,
                entry.image,
                now,
                now,
            ],
        )?;
        self.get_entry_by_id(&id)?
            .context("Entry not found after insert")
    }

    /// Full record set, newest fill-up first.
    pub fn get_all_entries(&self) -> Result<Vec<MileageEntry>> {
        let mut stmt = self
            .conn
            .prepare("SELECT * FROM entries ORDER BY date DESC, created_at DESC")?;
        let entries = stmt
            .query_map([], Self::entry_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    pub fn get_entry_by_id(&self, id: &str) -> Result<Option<MileageEntry>> {
        let entry = self
            .conn
            .query_row(
                "SELECT * FROM entries WHERE id = ?1",
                params![id],
                Self::entry_from_row,
            )
            .optional()?;
        Ok(entry)
    }

    /// Merge the patch over the stored record, re-derive efficiency, bump
    /// `updated_at`, persist. Unknown id is a silent no-op (`Ok(None)`).
    pub fn update_entry(
        &self,
        id: &str,
        update: &UpdateMileageEntry,
    ) -> Result<Option<MileageEntry>> {
        let Some(existing) = self.get_entry_by_id(id)? else {
            return Ok(None);
        };

        let date = update.date.clone().unwrap_or(existing.date);
        let miles = update.miles.unwrap_or(existing.miles);
        let liters = update.liters.unwrap_or(existing.liters);
        let price_pence = update.price_pence.unwrap_or(existing.price_pence);
        let image = match &update.image {
            Some(image) => image.clone(),
            None => existing.image,
        };
        let mileage = calculate_mileage(miles, liters);
        let now = Utc::now().to_rfc3339();

        self.conn.execute(
            "UPDATE entries SET date = ?1, miles = ?2, liters = ?3, price_pence = ?4,
             mileage_km_per_l = ?5, mileage_mpg = ?6, image = ?7, updated_at = ?8
             WHERE id = ?9",
            params![
                date,
                miles,
                liters,
                price_pence,
                mileage.km_per_l,
                mileage.mpg,
                image,
                now,
                id,
            ],
        )?;
        self.get_entry_by_id(id)
    }

    /// Idempotent; returns whether a row was actually removed.
    pub fn delete_entry(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn
            .execute("DELETE FROM entries WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    /// Verbatim upsert preserving id and timestamps; used when adopting
    /// records that already exist on the other side of a sync.
    pub fn put_entry(&self, entry: &MileageEntry) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO entries (id, date, miles, liters, price_pence, mileage_km_per_l, mileage_mpg, image, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                entry.id,
                entry.date,
                entry.miles,
                entry.liters,
                entry.price_pence,
                entry.mileage_km_per_l,
                entry.mileage_mpg,
                entry.image,
                entry.created_at,
                entry.updated_at,
            ],
        )?;
        Ok(())
    }

    /// Atomic clear-and-bulk-load of the full record set. Either the whole
    /// replacement lands or none of it does.
    pub fn replace_all_entries(&self, entries: &[MileageEntry]) -> Result<()> {
        let tx = self.conn.unchecked_transaction()?;
        tx.execute("DELETE FROM entries", [])?;
        for entry in entries {
            tx.execute(
                "INSERT INTO entries (id, date, miles, liters, price_pence, mileage_km_per_l, mileage_mpg, image, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    entry.id,
                    entry.date,
                    entry.miles,
                    entry.liters,
                    entry.price_pence,
                    entry.mileage_km_per_l,
                    entry.mileage_mpg,
                    entry.image,
                    entry.created_at,
                    entry.updated_at,
                ],
            )?;
        }
        tx.commit()?;
        Ok(())
    }

    pub fn count_entries(&self) -> Result<i64> {
        let count = self
            .conn
            .query_row("SELECT COUNT(*) FROM entries", [], |row| row.get(0))?;
        Ok(count)
    }

    // --- Settings ---

    /// Returns defaults when the singleton row has never been written.
    pub fn get_settings(&self) -> Result<AppSettings> {
        let stored: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT mileage_unit, theme FROM settings WHERE id = ?1",
                params![SETTINGS_ID],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;
        match stored {
            Some((unit, theme)) => Ok(AppSettings {
                mileage_unit: unit_from_str(&unit)?,
                theme: theme_from_str(&theme)?,
            }),
            None => Ok(AppSettings::default()),
        }
    }

    /// Merge the patch over the current settings and persist in place.
    pub fn put_settings(&self, update: &UpdateAppSettings) -> Result<AppSettings> {
        let current = self.get_settings()?;
        let merged = AppSettings {
            mileage_unit: update.mileage_unit.unwrap_or(current.mileage_unit),
            theme: update.theme.unwrap_or(current.theme),
        };
        self.conn.execute(
            "INSERT OR REPLACE INTO settings (id, mileage_unit, theme) VALUES (?1, ?2, ?3)",
            params![
                SETTINGS_ID,
                unit_to_str(merged.mileage_unit),
                theme_to_str(merged.theme),
            ],
        )?;
        Ok(merged)
    }
}

fn unit_to_str(unit: MileageUnit) -> &'static str {
    match unit {
        MileageUnit::KmPerL => "km/l",
        MileageUnit::Mpg => "mpg",
    }
}

fn unit_from_str(value: &str) -> Result<MileageUnit> {
    match value {
        "km/l" => Ok(MileageUnit::KmPerL),
        "mpg" => Ok(MileageUnit::Mpg),
        other => anyhow::bail!("Unknown mileage unit '{other}'"),
    }
}

fn theme_to_str(theme: ThemeMode) -> &'static str {
    match theme {
        ThemeMode::Light => "light",
        ThemeMode::Dark => "dark",
    }
}

fn theme_from_str(value: &str) -> Result<ThemeMode> {
    match value {
        "light" => Ok(ThemeMode::Light),
        "dark" => Ok(ThemeMode::Dark),
        other => anyhow::bail!("Unknown theme '{other}'"),
    }
}
