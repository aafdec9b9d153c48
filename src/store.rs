//! Aggregate store — weekly material totals per contributor.
//!
//! One in-memory table is authoritative.  Every mutation flushes the full
//! state through the injected [`StatePersister`] before the call returns,
//! so a crash between flushes loses at most the in-flight request.  When a
//! flush fails, the in-memory mutation is rolled back so memory and disk
//! never diverge.
//!
//! The durable layout matches what the deployed tracker has always
//! written:
//!
//! ```json
//! { "users": { "<discordId>": { "thisWeek": 0.0, "previousWeek": 0.0 } } }
//! ```

use std::cmp::Ordering;
use std::fmt;
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use serde::de::{MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use tokio::sync::Mutex;

use crate::errors::Result;

/// Fallback for `top()` when the requested count is missing or non-positive.
pub const DEFAULT_TOP_N: usize = 10;

/// Totals carry 4 fractional digits; rounding after every update bounds
/// floating-point drift across an unbounded event stream.
const AMOUNT_SCALE: f64 = 10_000.0;

fn round4(v: f64) -> f64 {
    (v * AMOUNT_SCALE).round() / AMOUNT_SCALE
}

// ─────────────────────────────────────────────────────────
// Data model
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContributorAccount {
    pub this_week: f64,
    pub previous_week: f64,
}

/// Identity → account mapping that remembers insertion order, which is the
/// tie-break for `top()`.  Identities are opaque strings (17–20 decimal
/// digits upstream) and must never be parsed as numbers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserTable(Vec<(String, ContributorAccount)>);

impl UserTable {
    pub fn get(&self, id: &str) -> Option<&ContributorAccount> {
        self.0.iter().find(|(k, _)| k == id).map(|(_, v)| v)
    }

    /// Look up an account, creating it at 0/0 on first sight.
    fn get_or_insert(&mut self, id: &str) -> &mut ContributorAccount {
        if let Some(idx) = self.0.iter().position(|(k, _)| k == id) {
            return &mut self.0[idx].1;
        }
        self.0.push((id.to_string(), ContributorAccount::default()));
        let last = self.0.len() - 1;
        &mut self.0[last].1
    }

    fn remove(&mut self, id: &str) {
        self.0.retain(|(k, _)| k != id);
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ContributorAccount)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn iter_mut(&mut self) -> impl Iterator<Item = (&str, &mut ContributorAccount)> {
        self.0.iter_mut().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

// Serialized as a JSON object; deserialization keeps the file's key order
// so insertion order survives a restart.
impl Serialize for UserTable {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (id, account) in &self.0 {
            map.serialize_entry(id, account)?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for UserTable {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        struct TableVisitor;

        impl<'de> Visitor<'de> for TableVisitor {
            type Value = UserTable;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a map of contributor id to account")
            }

            fn visit_map<A: MapAccess<'de>>(
                self,
                mut access: A,
            ) -> std::result::Result<Self::Value, A::Error> {
                let mut entries = Vec::with_capacity(access.size_hint().unwrap_or(0));
                while let Some((id, account)) =
                    access.next_entry::<String, ContributorAccount>()?
                {
                    entries.push((id, account));
                }
                Ok(UserTable(entries))
            }
        }

        deserializer.deserialize_map(TableVisitor)
    }
}

#[derive(Debug, Deserialize)]
struct PersistedState {
    users: UserTable,
}

#[derive(Serialize)]
struct PersistedStateRef<'a> {
    users: &'a UserTable,
}

// ─────────────────────────────────────────────────────────
// Persistence port
// ─────────────────────────────────────────────────────────

/// Durable-storage seam.  The store only ever reads the whole state once
/// and overwrites it wholesale, so a backend is just these two calls.
pub trait StatePersister: Send + Sync {
    /// Read the persisted table; `Ok(None)` when no state exists yet.
    fn load(&self) -> Result<Option<UserTable>>;
    /// Replace the persisted table with `users` in one atomic step.
    fn save(&self, users: &UserTable) -> Result<()>;
}

/// Whole-file JSON persistence with an atomic replace: the new state is
/// written to a sibling temp file and renamed over the old one, so a
/// failed flush leaves the previous durable state intact.
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn tmp_path(&self) -> PathBuf {
        let mut os = self.path.clone().into_os_string();
        os.push(".tmp");
        PathBuf::from(os)
    }
}

impl StatePersister for JsonFileStore {
    fn load(&self) -> Result<Option<UserTable>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = fs::read_to_string(&self.path)?;
        let state: PersistedState = serde_json::from_str(&raw)?;
        Ok(Some(state.users))
    }

    fn save(&self, users: &UserTable) -> Result<()> {
        let json = serde_json::to_string_pretty(&PersistedStateRef { users })?;
        let tmp = self.tmp_path();
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}

// ─────────────────────────────────────────────────────────
// Aggregate store
// ─────────────────────────────────────────────────────────

/// The serialization point for all state: a single mutex guards the table,
/// so same-identity additions cannot race on their read-modify-write and a
/// rollover excludes concurrent additions for its full duration.  Flushes
/// are file I/O and run on the blocking pool; the mutex stays held across
/// them so the flush-before-return discipline survives.
pub struct AggregateStore {
    persister: Arc<dyn StatePersister>,
    users: Mutex<UserTable>,
}

impl AggregateStore {
    /// Read durable state through the persister.  Missing state
    /// initializes an empty table and persists it immediately.
    pub fn open(persister: Arc<dyn StatePersister>) -> Result<Self> {
        let users = match persister.load()? {
            Some(users) => users,
            None => {
                let empty = UserTable::default();
                persister.save(&empty)?;
                empty
            }
        };
        Ok(Self {
            persister,
            users: Mutex::new(users),
        })
    }

    /// Flush a full-state snapshot through the persister on the blocking
    /// pool, keeping synchronous file I/O off the async worker threads.
    async fn flush(&self, users: &UserTable) -> Result<()> {
        let persister = Arc::clone(&self.persister);
        let snapshot = users.clone();
        tokio::task::spawn_blocking(move || persister.save(&snapshot))
            .await
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?
    }

    /// Add `amount` to a contributor's current week, creating the account
    /// on first sight, and flush.  Returns the updated totals.  On flush
    /// failure the mutation is rolled back and the error surfaced — the
    /// caller must not believe a lost write succeeded.
    pub async fn add_donation(&self, id: &str, amount: f64) -> Result<ContributorAccount> {
        let mut users = self.users.lock().await;
        let before = users.get(id).copied();
        let updated = {
            let account = users.get_or_insert(id);
            account.this_week = round4(account.this_week + amount);
            *account
        };
        if let Err(e) = self.flush(&users).await {
            match before {
                Some(prev) => *users.get_or_insert(id) = prev,
                None => users.remove(id),
            }
            return Err(e);
        }
        Ok(updated)
    }

    /// Current and previous totals for an identity; 0/0 when unknown,
    /// never an error.
    pub async fn totals(&self, id: &str) -> ContributorAccount {
        self.users.lock().await.get(id).copied().unwrap_or_default()
    }

    /// The `n` accounts with the highest current-week total, descending.
    /// Ties keep insertion order (the sort is stable).  A missing or
    /// non-positive `n` falls back to [`DEFAULT_TOP_N`].
    pub async fn top(&self, n: Option<i64>) -> Vec<(String, ContributorAccount)> {
        let n = match n {
            Some(v) if v > 0 => v as usize,
            _ => DEFAULT_TOP_N,
        };
        let users = self.users.lock().await;
        let mut rows: Vec<_> = users.iter().map(|(id, a)| (id.to_string(), *a)).collect();
        rows.sort_by(|a, b| {
            b.1.this_week
                .partial_cmp(&a.1.this_week)
                .unwrap_or(Ordering::Equal)
        });
        rows.truncate(n);
        rows
    }

    /// Weekly rollover: for every account, archive the current week as
    /// previous and zero the counter, then flush once.  The rolled table
    /// only replaces the in-memory one after the flush succeeds, so a
    /// failed rollover leaves state fully unchanged and can be retried.
    /// Returns the pre-rollover snapshot for the completion summary.
    pub async fn rollover(&self) -> Result<UserTable> {
        let mut users = self.users.lock().await;
        let snapshot = users.clone();
        let mut rolled = users.clone();
        for (_, account) in rolled.iter_mut() {
            account.previous_week = account.this_week;
            account.this_week = 0.0;
        }
        self.flush(&rolled).await?;
        *users = rolled;
        Ok(snapshot)
    }
}

// ─────────────────────────────────────────────────────────
// Unit tests
// ─────────────────────────────────────────────────────────
