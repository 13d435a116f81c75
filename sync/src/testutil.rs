//! In-memory stand-ins for the cloud backend, shared by the engine and
//! context tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use anyhow::{Result, bail};
use async_trait::async_trait;

use fuelog_core::models::{MileageEntry, NewMileageEntry, calculate_mileage};

use crate::remote::{RemoteEntry, RemoteStore};

/// Route `log` output through the test harness for the failure-path tests.
pub(crate) fn init_test_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

pub(crate) fn sample_new_entry(date: &str) -> NewMileageEntry {
    NewMileageEntry {
        date: date.to_string(),
        miles: 300.0,
        liters: 40.0,
        price_pence: 145.9,
        image: None,
    }
}

pub(crate) fn remote_row(id: &str, date: &str, user_id: &str) -> RemoteEntry {
    let mileage = calculate_mileage(250.0, 35.0);
    RemoteEntry {
        id: id.to_string(),
        user_id: user_id.to_string(),
        date: date.to_string(),
        miles: 250.0,
        liters: 35.0,
        price_per_liter: 139.9,
        mileage_km_per_l: mileage.km_per_l,
        mileage_mpg: mileage.mpg,
        image: None,
        created_at: format!("{date}T08:00:00+00:00"),
        updated_at: format!("{date}T08:00:00+00:00"),
    }
}

/// `RemoteStore` backed by a map, with switchable failure modes.
#[derive(Default)]
pub(crate) struct MockRemote {
    rows: Mutex<HashMap<String, RemoteEntry>>,
    failing: AtomicBool,
    rejected_inserts: Mutex<HashSet<String>>,
    inserts: AtomicUsize,
    updates: AtomicUsize,
    deletes: AtomicUsize,
}

impl MockRemote {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<RemoteEntry>) -> Self {
        let mock = Self::new();
        {
            let mut guard = mock.rows.lock().unwrap();
            for row in rows {
                guard.insert(row.id.clone(), row);
            }
        }
        mock
    }

    /// Make every call fail with a transport error.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Make inserts of one specific id fail while everything else works.
    pub fn reject_insert_of(&self, id: &str) {
        self.rejected_inserts.lock().unwrap().insert(id.to_string());
    }

    /// Rows sorted newest date first, matching the wire contract.
    pub fn rows_snapshot(&self) -> Vec<RemoteEntry> {
        let mut rows: Vec<RemoteEntry> = self.rows.lock().unwrap().values().cloned().collect();
        rows.sort_by(|a, b| b.date.cmp(&a.date));
        rows
    }

    pub fn contains(&self, id: &str) -> bool {
        self.rows.lock().unwrap().contains_key(id)
    }

    pub fn insert_count(&self) -> usize {
        self.inserts.load(Ordering::SeqCst)
    }

    pub fn update_count(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub fn delete_count(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }

    fn check_reachable(&self) -> Result<()> {
        if self.failing.load(Ordering::SeqCst) {
            bail!("network unreachable");
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteStore for MockRemote {
    async fn fetch_all(&self) -> Result<Vec<RemoteEntry>> {
        self.check_reachable()?;
        Ok(self.rows_snapshot())
    }

    async fn insert(&self, entry: &MileageEntry, user_id: &str) -> Result<RemoteEntry> {
        self.check_reachable()?;
        if self.rejected_inserts.lock().unwrap().contains(&entry.id) {
            bail!("insert rejected for {}", entry.id);
        }
        let mut rows = self.rows.lock().unwrap();
        if rows.contains_key(&entry.id) {
            bail!("duplicate key value violates unique constraint");
        }
        self.inserts.fetch_add(1, Ordering::SeqCst);
        let row = RemoteEntry::from_entry(entry, user_id);
        rows.insert(row.id.clone(), row.clone());
        Ok(row)
    }

    async fn update(&self, entry: &MileageEntry) -> Result<RemoteEntry> {
        self.check_reachable()?;
        let mut rows = self.rows.lock().unwrap();
        let user_id = match rows.get(&entry.id) {
            Some(existing) => existing.user_id.clone(),
            None => bail!("no remote row matched id '{}'", entry.id),
        };
        self.updates.fetch_add(1, Ordering::SeqCst);
        let row = RemoteEntry::from_entry(entry, &user_id);
        rows.insert(row.id.clone(), row.clone());
        Ok(row)
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.check_reachable()?;
        self.deletes.fetch_add(1, Ordering::SeqCst);
        self.rows.lock().unwrap().remove(id);
        Ok(())
    }
}
