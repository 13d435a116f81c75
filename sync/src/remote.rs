//! Client for the authoritative cloud store: a Supabase-style REST table,
//! rows scoped to the authenticated user by server-side policy. The field
//! mapping between the local model and the wire shape lives here and is
//! exhaustive in both directions; `user_id` exists only remotely and is
//! supplied by the caller.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};

use fuelog_core::models::MileageEntry;

const TABLE_PATH: &str = "rest/v1/mileage_entries";

/// Wire representation of one row in `mileage_entries`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteEntry {
    pub id: String,
    pub user_id: String,
    pub date: String,
    pub miles: f64,
    pub liters: f64,
    pub price_per_liter: f64,
    pub mileage_km_per_l: f64,
    pub mileage_mpg: f64,
    pub image: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl RemoteEntry {
    #[must_use]
    pub fn from_entry(entry: &MileageEntry, user_id: &str) -> Self {
        Self {
            id: entry.id.clone(),
            user_id: user_id.to_string(),
            date: entry.date.clone(),
            miles: entry.miles,
            liters: entry.liters,
            price_per_liter: entry.price_pence,
            mileage_km_per_l: entry.mileage_km_per_l,
            mileage_mpg: entry.mileage_mpg,
            image: entry.image.clone(),
            created_at: entry.created_at.clone(),
            updated_at: entry.updated_at.clone(),
        }
    }

    /// Inverse of [`RemoteEntry::from_entry`]; drops `user_id`, which has no
    /// local counterpart.
    #[must_use]
    pub fn into_entry(self) -> MileageEntry {
        MileageEntry {
            id: self.id,
            date: self.date,
            miles: self.miles,
            liters: self.liters,
            price_pence: self.price_per_liter,
            mileage_km_per_l: self.mileage_km_per_l,
            mileage_mpg: self.mileage_mpg,
            image: self.image,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Mutable columns sent on update. Identity and `created_at` never change;
/// `user_id` is enforced server-side.
#[derive(Debug, Serialize)]
struct RemoteEntryPatch<'a> {
    date: &'a str,
    miles: f64,
    liters: f64,
    price_per_liter: f64,
    mileage_km_per_l: f64,
    mileage_mpg: f64,
    image: Option<&'a str>,
    updated_at: String,
}

impl<'a> RemoteEntryPatch<'a> {
    fn from_entry(entry: &'a MileageEntry) -> Self {
        Self {
            date: &entry.date,
            miles: entry.miles,
            liters: entry.liters,
            price_per_liter: entry.price_pence,
            mileage_km_per_l: entry.mileage_km_per_l,
            mileage_mpg: entry.mileage_mpg,
            image: entry.image.as_deref(),
            updated_at: Utc::now().to_rfc3339(),
        }
    }
}

/// Seam between the sync engine and the cloud backend. Every operation is a
/// network call and may fail with a transport or authorization error.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Full remote record set for the authenticated user, newest date first.
    async fn fetch_all(&self) -> Result<Vec<RemoteEntry>>;
    async fn insert(&self, entry: &MileageEntry, user_id: &str) -> Result<RemoteEntry>;
    async fn update(&self, entry: &MileageEntry) -> Result<RemoteEntry>;
    async fn delete(&self, id: &str) -> Result<()>;
}

/// `RemoteStore` over the Supabase REST API.
pub struct SupabaseClient {
    http: reqwest::Client,
    base_url: String,
    anon_key: String,
    access_token: std::sync::RwLock<Option<String>>,
}

impl SupabaseClient {
    #[must_use]
    pub fn new(base_url: &str, anon_key: &str) -> Self {
        let http = reqwest::Client::builder()
            .user_agent(format!(
                "fuelog-sync/{} (mileage tracker)",
                env!("CARGO_PKG_VERSION")
            ))
            .timeout(std::time::Duration::from_secs(10))
            .connect_timeout(std::time::Duration::from_secs(5))
            .build()
            .expect("Failed to build HTTP client");
        Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            anon_key: anon_key.to_string(),
            access_token: std::sync::RwLock::new(None),
        }
    }

    /// Install (or clear) the signed-in user's access token. Requests fall
    /// back to the anon key when no token is set.
    pub fn set_access_token(&self, token: Option<String>) {
        let mut guard = self
            .access_token
            .write()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        *guard = token;
    }

    fn bearer(&self) -> String {
        let guard = self
            .access_token
            .read()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        guard.clone().unwrap_or_else(|| self.anon_key.clone())
    }

    fn table_url(&self) -> String {
        format!("{}/{TABLE_PATH}", self.base_url)
    }
}

#[async_trait]
impl RemoteStore for SupabaseClient {
    async fn fetch_all(&self) -> Result<Vec<RemoteEntry>> {
        let resp = self
            .http
            .get(self.table_url())
            .query(&[("select", "*"), ("order", "date.desc")])
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer())
            .send()
            .await
            .context("Failed to reach sync backend")?
            .error_for_status()
            .context("Sync backend rejected entry list request")?;

        let rows: Vec<RemoteEntry> = resp
            .json()
            .await
            .context("Failed to parse remote entry list")?;
        Ok(rows)
    }

    async fn insert(&self, entry: &MileageEntry, user_id: &str) -> Result<RemoteEntry> {
        let row = RemoteEntry::from_entry(entry, user_id);
        let resp = self
            .http
            .post(self.table_url())
            .header("apikey", &self.anon_key)
            .header("Prefer", "return=representation")
            .bearer_auth(self.bearer())
            .json(&[row])
            .send()
            .await
            .context("Failed to reach sync backend")?
            .error_for_status()
            .context("Sync backend rejected entry insert")?;

        let mut rows: Vec<RemoteEntry> = resp
            .json()
            .await
            .context("Failed to parse inserted remote entry")?;
        rows.pop()
            .ok_or_else(|| anyhow::anyhow!("Sync backend returned no row for insert"))
    }

    async fn update(&self, entry: &MileageEntry) -> Result<RemoteEntry> {
        let resp = self
            .http
            .patch(self.table_url())
            .query(&[("id", format!("eq.{}", entry.id))])
            .header("apikey", &self.anon_key)
            .header("Prefer", "return=representation")
            .bearer_auth(self.bearer())
            .json(&RemoteEntryPatch::from_entry(entry))
            .send()
            .await
            .context("Failed to reach sync backend")?
            .error_for_status()
            .context("Sync backend rejected entry update")?;

        let mut rows: Vec<RemoteEntry> = resp
            .json()
            .await
            .context("Failed to parse updated remote entry")?;
        rows.pop()
            .ok_or_else(|| anyhow::anyhow!("No remote row matched id '{}'", entry.id))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        self.http
            .delete(self.table_url())
            .query(&[("id", format!("eq.{id}"))])
            .header("apikey", &self.anon_key)
            .bearer_auth(self.bearer())
            .send()
            .await
            .context("Failed to reach sync backend")?
            .error_for_status()
            .context("Sync backend rejected entry delete")?;
        Ok(())
    }
}
