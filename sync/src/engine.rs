//! The reconciliation algorithm: merge-by-id with union of presence. Records
//! present on only one side are propagated to the other; records present on
//! both sides are left alone, so the local copy wins for the pass with no
//! timestamp comparison. Per-record failures are logged and never abort the
//! remaining work.

use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use anyhow::{Context, Result};

use fuelog_core::db::Database;
use fuelog_core::models::MileageEntry;

use crate::remote::{RemoteEntry, RemoteStore};

pub(crate) fn lock(db: &Mutex<Database>) -> MutexGuard<'_, Database> {
    db.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One full two-way pass. Requires a reachable remote: a failure of the
/// initial fetch aborts with `Err` (the caller decides what to serve).
/// Returns the merged local set, re-read only after every write settled.
pub async fn reconcile(
    db: &Mutex<Database>,
    remote: &dyn RemoteStore,
    user_id: &str,
) -> Result<Vec<MileageEntry>> {
    let remote_rows = remote
        .fetch_all()
        .await
        .context("Failed to fetch remote entries")?;
    let local = lock(db).get_all_entries()?;

    let remote_ids: HashSet<&str> = remote_rows.iter().map(|row| row.id.as_str()).collect();
    let local_ids: HashSet<&str> = local.iter().map(|entry| entry.id.as_str()).collect();

    // local-only records go up, one insert per id
    for entry in local
        .iter()
        .filter(|entry| !remote_ids.contains(entry.id.as_str()))
    {
        if let Err(err) = remote.insert(entry, user_id).await {
            log::warn!("failed to push entry {} to remote: {err:#}", entry.id);
        }
    }

    // remote-only records come down
    let pulled: Vec<MileageEntry> = remote_rows
        .into_iter()
        .filter(|row| !local_ids.contains(row.id.as_str()))
        .map(RemoteEntry::into_entry)
        .collect();
    for entry in &pulled {
        if let Err(err) = lock(db).put_entry(entry) {
            log::warn!("failed to store remote entry {} locally: {err:#}", entry.id);
        }
    }

    lock(db).get_all_entries()
}

/// The explicit-refresh path: remote is authoritative when reachable. On a
/// successful fetch the whole local set is replaced; on failure the existing
/// local set is served unchanged and no error escapes.
pub async fn refresh_from_remote(
    db: &Mutex<Database>,
    remote: &dyn RemoteStore,
) -> Result<Vec<MileageEntry>> {
    match remote.fetch_all().await {
        Ok(rows) => {
            let entries: Vec<MileageEntry> =
                rows.into_iter().map(RemoteEntry::into_entry).collect();
            let db = lock(db);
            db.replace_all_entries(&entries)?;
            db.get_all_entries()
        }
        Err(err) => {
            log::warn!("remote fetch failed, serving local entries: {err:#}");
            lock(db).get_all_entries()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{MockRemote, init_test_logging, remote_row, sample_new_entry};

    fn db_with(dates: &[&str]) -> Mutex<Database> {
        let db = Database::open_in_memory().unwrap();
        for date in dates {
            db.insert_entry(&sample_new_entry(date)).unwrap();
        }
        Mutex::new(db)
    }

    #[tokio::test]
    async fn test_reconcile_unions_presence() {
        // Local = {A, B}, Remote = {B, C}
        let db = Mutex::new(Database::open_in_memory().unwrap());
        let a = lock(&db).insert_entry(&sample_new_entry("2024-01-01")).unwrap();
        let b = lock(&db).insert_entry(&sample_new_entry("2024-02-01")).unwrap();

        // remote B carries different figures so overlap handling is observable
        let mut remote_b = remote_row(&b.id, "2024-02-01", "user-1");
        remote_b.miles = 999.0;
        let remote_c = remote_row("c-remote", "2024-03-01", "user-1");
        let remote = MockRemote::with_rows(vec![remote_b.clone(), remote_c.clone()]);

        let merged = reconcile(&db, &remote, "user-1").await.unwrap();

        let mut ids: Vec<&str> = merged.iter().map(|e| e.id.as_str()).collect();
        ids.sort_unstable();
        let mut expected = vec![a.id.as_str(), b.id.as_str(), "c-remote"];
        expected.sort_unstable();
        assert_eq!(ids, expected);

        // B's local copy is untouched (no timestamp comparison on overlap)
        let local_b = lock(&db).get_entry_by_id(&b.id).unwrap().unwrap();
        assert_eq!(local_b, b);

        // remote gained exactly A, and its B was not rewritten
        let rows = remote.rows_snapshot();
        assert_eq!(rows.len(), 3);
        let pushed_a = rows.iter().find(|r| r.id == a.id).unwrap();
        assert_eq!(pushed_a.user_id, "user-1");
        assert_eq!(pushed_a.miles, a.miles);
        assert_eq!(rows.iter().find(|r| r.id == b.id).unwrap().miles, 999.0);
        assert_eq!(remote.update_count(), 0);
    }

    #[tokio::test]
    async fn test_reconcile_is_idempotent() {
        let db = db_with(&["2024-01-01"]);
        let remote = MockRemote::new();

        reconcile(&db, &remote, "user-1").await.unwrap();
        reconcile(&db, &remote, "user-1").await.unwrap();

        // the presence check keeps the second pass from re-pushing
        assert_eq!(remote.insert_count(), 1);
        assert_eq!(remote.rows_snapshot().len(), 1);
        assert_eq!(lock(&db).count_entries().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_reconcile_push_failures_are_per_record() {
        init_test_logging();
        let db = Mutex::new(Database::open_in_memory().unwrap());
        let good = lock(&db).insert_entry(&sample_new_entry("2024-01-01")).unwrap();
        let bad = lock(&db).insert_entry(&sample_new_entry("2024-02-01")).unwrap();

        let remote = MockRemote::new();
        remote.reject_insert_of(&bad.id);

        let merged = reconcile(&db, &remote, "user-1").await.unwrap();

        // the failing record neither aborted the pass nor vanished locally
        assert_eq!(merged.len(), 2);
        let rows = remote.rows_snapshot();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].id, good.id);
    }

    #[tokio::test]
    async fn test_reconcile_errors_when_remote_unreachable() {
        let db = db_with(&["2024-01-01"]);
        let remote = MockRemote::new();
        remote.set_failing(true);

        assert!(reconcile(&db, &remote, "user-1").await.is_err());
        // nothing was lost locally
        assert_eq!(lock(&db).count_entries().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_refresh_replaces_local_set() {
        // Local = {A}, Remote = {B} → Local = {B}
        let db = db_with(&["2024-01-01"]);
        let remote = MockRemote::with_rows(vec![remote_row("b-remote", "2024-02-01", "user-1")]);

        let entries = refresh_from_remote(&db, &remote).await.unwrap();

        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].id, "b-remote");
        let local = lock(&db).get_all_entries().unwrap();
        assert_eq!(local.len(), 1);
        assert_eq!(local[0].id, "b-remote");
    }

    #[tokio::test]
    async fn test_refresh_falls_back_to_local_on_failure() {
        init_test_logging();
        let db = db_with(&["2024-01-01"]);
        let before = lock(&db).get_all_entries().unwrap();

        let remote = MockRemote::new();
        remote.set_failing(true);

        let entries = refresh_from_remote(&db, &remote).await.unwrap();
        assert_eq!(entries, before);
    }
}
