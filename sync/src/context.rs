//! The reactive record context: owns the in-memory working set the UI renders,
//! mediates every mutation through the local store first, and propagates
//! best-effort to the remote store. Subscribers observe working-set and flag
//! changes over a watch channel.
//!
//! Every operation is local-first: the durable local write completes and the
//! new working set is published before the network leg runs, so the remote
//! call can never delay or fail the user-visible update. Cloud failures are
//! logged and left for the next reconciliation pass to repair.

use std::sync::{Arc, Mutex, PoisonError};

use anyhow::Result;
use tokio::sync::watch;

use fuelog_core::db::Database;
use fuelog_core::models::{
    AppSettings, MileageEntry, NewMileageEntry, UpdateAppSettings, UpdateMileageEntry,
    validate_new_entry, validate_update_entry,
};

use crate::auth::{AuthProvider, Principal};
use crate::connectivity::ConnectivityMonitor;
use crate::engine::{self, lock};
use crate::remote::RemoteStore;

/// Flags the UI derives its chrome from.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SyncStatus {
    pub online: bool,
    pub syncing: bool,
    pub loading: bool,
    pub error: Option<String>,
}

/// What subscribers receive: the ordered record set plus the status flags.
#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    pub entries: Vec<MileageEntry>,
    pub status: SyncStatus,
}

pub struct EntryContext {
    db: Mutex<Database>,
    remote: Arc<dyn RemoteStore>,
    connectivity: ConnectivityMonitor,
    principal: Mutex<Option<Principal>>,
    state: watch::Sender<WorkingSet>,
}

impl EntryContext {
    #[must_use]
    pub fn new(
        db: Database,
        remote: Arc<dyn RemoteStore>,
        connectivity: ConnectivityMonitor,
    ) -> Self {
        let initial = WorkingSet {
            entries: Vec::new(),
            status: SyncStatus {
                online: connectivity.is_online(),
                loading: true,
                ..SyncStatus::default()
            },
        };
        let (state, _) = watch::channel(initial);
        Self {
            db: Mutex::new(db),
            remote,
            connectivity,
            principal: Mutex::new(None),
            state,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<WorkingSet> {
        self.state.subscribe()
    }

    #[must_use]
    pub fn entries(&self) -> Vec<MileageEntry> {
        self.state.borrow().entries.clone()
    }

    #[must_use]
    pub fn status(&self) -> SyncStatus {
        self.state.borrow().status.clone()
    }

    #[must_use]
    pub fn monitor(&self) -> &ConnectivityMonitor {
        &self.connectivity
    }

    /// Initial load: populate the working set from the local store, then run
    /// a reconciliation pass when online and authenticated.
    pub async fn start(&self) {
        self.load_local();
        self.reconcile().await;
    }

    fn load_local(&self) {
        self.state.send_modify(|ws| {
            ws.status.loading = true;
            ws.status.error = None;
        });
        match lock(&self.db).get_all_entries() {
            Ok(entries) => self.state.send_modify(|ws| {
                ws.entries = entries;
                ws.status.loading = false;
            }),
            Err(err) => {
                log::error!("failed to load entries: {err:#}");
                self.state.send_modify(|ws| {
                    ws.status.loading = false;
                    ws.status.error = Some("Failed to load entries".to_string());
                });
            }
        }
    }

    /// The authenticated user id, present only when a sync leg should run.
    fn sync_target(&self) -> Option<String> {
        if !self.connectivity.is_online() {
            return None;
        }
        self.principal
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .as_ref()
            .map(|p| p.id.clone())
    }

    fn publish_entries(&self, entries: Vec<MileageEntry>) {
        self.state.send_modify(|ws| ws.entries = entries);
    }

    // --- Mutations (local-first, optimistic publish, best-effort remote) ---

    pub async fn add(&self, input: &NewMileageEntry) -> Result<MileageEntry> {
        validate_new_entry(input)?;
        let (entry, entries) = {
            let db = lock(&self.db);
            let entry = db.insert_entry(input)?;
            let entries = db.get_all_entries()?;
            (entry, entries)
        };
        self.publish_entries(entries);

        if let Some(user_id) = self.sync_target() {
            if let Err(err) = self.remote.insert(&entry, &user_id).await {
                log::warn!("failed to push new entry {} to remote: {err:#}", entry.id);
            }
        }
        Ok(entry)
    }

    /// Unknown id is a silent no-op: nothing is published and no remote call
    /// is made.
    pub async fn update(
        &self,
        id: &str,
        update: &UpdateMileageEntry,
    ) -> Result<Option<MileageEntry>> {
        validate_update_entry(update)?;
        let (entry, entries) = {
            let db = lock(&self.db);
            let Some(entry) = db.update_entry(id, update)? else {
                return Ok(None);
            };
            let entries = db.get_all_entries()?;
            (entry, entries)
        };
        self.publish_entries(entries);

        if self.sync_target().is_some() {
            if let Err(err) = self.remote.update(&entry).await {
                log::warn!("failed to push update of entry {id} to remote: {err:#}");
            }
        }
        Ok(Some(entry))
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        let entries = {
            let db = lock(&self.db);
            db.delete_entry(id)?;
            db.get_all_entries()?
        };
        self.publish_entries(entries);

        if self.sync_target().is_some() {
            if let Err(err) = self.remote.delete(id).await {
                log::warn!("failed to push delete of entry {id} to remote: {err:#}");
            }
        }
        Ok(())
    }

    /// Explicit refresh: when online and authenticated the remote set is
    /// authoritative and replaces the local one wholesale; otherwise (or when
    /// the fetch fails) the local set is served unchanged. Only a local read
    /// failure surfaces, via the error flag.
    pub async fn refresh(&self) {
        self.state.send_modify(|ws| {
            ws.status.loading = true;
            ws.status.error = None;
        });

        let result = if self.sync_target().is_some() {
            engine::refresh_from_remote(&self.db, self.remote.as_ref()).await
        } else {
            lock(&self.db).get_all_entries()
        };

        match result {
            Ok(entries) => self.state.send_modify(|ws| {
                ws.entries = entries;
                ws.status.loading = false;
            }),
            Err(err) => {
                log::error!("failed to load entries: {err:#}");
                self.state.send_modify(|ws| {
                    ws.status.loading = false;
                    ws.status.error = Some("Failed to load entries".to_string());
                });
            }
        }
    }

    /// One two-way merge pass. No-op unless online and authenticated. The
    /// syncing flag is advisory: overlapping passes are not excluded, the
    /// last published working set wins.
    pub async fn reconcile(&self) {
        let Some(user_id) = self.sync_target() else {
            return;
        };
        self.state.send_modify(|ws| ws.status.syncing = true);

        match engine::reconcile(&self.db, self.remote.as_ref(), &user_id).await {
            Ok(entries) => self.state.send_modify(|ws| {
                ws.entries = entries;
                ws.status.syncing = false;
            }),
            Err(err) => {
                log::warn!("reconciliation pass aborted: {err:#}");
                self.state.send_modify(|ws| ws.status.syncing = false);
            }
        }
    }

    // --- Triggers ---

    /// Record a host-reported connectivity change. The offline→online
    /// transition kicks off a reconciliation pass when a principal is set.
    pub async fn set_online(&self, online: bool) {
        self.connectivity.set_online(online);
        let mut came_online = false;
        self.state.send_if_modified(|ws| {
            if ws.status.online == online {
                return false;
            }
            ws.status.online = online;
            came_online = online;
            true
        });
        if came_online {
            self.reconcile().await;
        }
    }

    /// Record an identity change. A newly present principal triggers a
    /// reconciliation pass (which itself requires being online); sign-out
    /// simply returns reads to the local store.
    pub async fn set_principal(&self, principal: Option<Principal>) {
        let changed = {
            let mut guard = self
                .principal
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let changed = *guard != principal;
            *guard = principal;
            changed
        };
        if changed {
            self.reconcile().await;
        }
    }

    /// Re-read the principal from the host auth provider.
    pub async fn refresh_principal(&self, provider: &dyn AuthProvider) {
        self.set_principal(provider.current_principal()).await;
    }

    /// Feed connectivity transitions from a monitor subscription into this
    /// context. Runs until the sending side goes away.
    pub async fn drive(&self, mut connectivity: watch::Receiver<bool>) {
        while connectivity.changed().await.is_ok() {
            let online = *connectivity.borrow_and_update();
            self.set_online(online).await;
        }
    }

    // --- Settings (singleton, local-only) ---

    pub fn settings(&self) -> Result<AppSettings> {
        lock(&self.db).get_settings()
    }

    pub fn update_settings(&self, update: &UpdateAppSettings) -> Result<AppSettings> {
        lock(&self.db).put_settings(update)
    }
}
