//! Persistent translation bank keyed by normalized source text.
//! Key: trim + lowercase. Pairs where the translation equals the
//! original are never stored. The whole map is snapshotted to disk
//! through KeyValueStorage on every mutation.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::now_millis;
use crate::storage::KeyValueStorage;

const STORAGE_KEY: &str = "translations";

/// Entries older than this are dropped by the startup maintenance pass.
pub const DEFAULT_MAX_AGE: Duration = Duration::from_secs(30 * 24 * 3600);

/// A cached translation record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BankEntry {
    pub original: String,
    pub translated: String,
    /// Milliseconds since the Unix epoch.
    pub timestamp: u64,
    /// Id of the endpoint that produced the translation.
    pub source: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BankStats {
    pub total_entries: usize,
    pub oldest_entry: Option<u64>,
    pub newest_entry: Option<u64>,
}

pub struct TranslationBank {
    storage: KeyValueStorage,
    entries: Mutex<HashMap<String, BankEntry>>,
}

impl TranslationBank {
    /// Open the bank over the given storage, reading the persisted
    /// snapshot. A malformed snapshot degrades to an empty bank.
    pub fn open(storage: KeyValueStorage) -> Self {
        let entries = match storage.get_item(STORAGE_KEY) {
            Some(json) => match serde_json::from_str(&json) {
                Ok(entries) => entries,
                Err(e) => {
                    warn!(error = %e, "translation bank snapshot unreadable, starting empty");
                    HashMap::new()
                }
            },
            None => HashMap::new(),
        };
        Self {
            storage,
            entries: Mutex::new(entries),
        }
    }

    /// Cache key: trimmed, lowercased source text.
    fn normalize(text: &str) -> String {
        text.trim().to_lowercase()
    }

    /// Look up a cached translation. Empty input yields None.
    pub fn get(&self, text: &str) -> Option<BankEntry> {
        if text.is_empty() {
            return None;
        }
        self.entries.lock().get(&Self::normalize(text)).cloned()
    }

    /// Store a successful translation. No-op when either side is empty
    /// or the text came back unchanged.
    pub fn set(&self, original: &str, translated: &str, source: &str) {
        if original.is_empty() || translated.is_empty() || original == translated {
            return;
        }
        let mut entries = self.entries.lock();
        entries.insert(
            Self::normalize(original),
            BankEntry {
                original: original.to_string(),
                translated: translated.to_string(),
                timestamp: now_millis(),
                source: source.to_string(),
            },
        );
        self.save(&entries);
    }

    pub fn stats(&self) -> BankStats {
        let entries = self.entries.lock();
        BankStats {
            total_entries: entries.len(),
            oldest_entry: entries.values().map(|e| e.timestamp).min(),
            newest_entry: entries.values().map(|e| e.timestamp).max(),
        }
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Drop entries older than `max_age` relative to `now` (ms since
    /// epoch). Persists only when something was actually removed.
    pub fn clear_old_entries(&self, max_age: Duration, now: u64) {
        let cutoff = now.saturating_sub(max_age.as_millis() as u64);
        let mut entries = self.entries.lock();
        let before = entries.len();
        entries.retain(|_, e| e.timestamp >= cutoff);
        let after = entries.len();
        if before != after {
            self.save(&entries);
            info!(before, after, "translation bank cleaned");
        }
    }

    /// Export the whole bank as pretty-printed JSON.
    pub fn export(&self) -> String {
        let entries = self.entries.lock();
        serde_json::to_string_pretty(&*entries).unwrap_or_else(|_| "{}".into())
    }

    /// Merge-import a previously exported snapshot. Imported entries win
    /// on key collision. Returns false and leaves the bank unchanged on
    /// malformed input.
    pub fn import(&self, json: &str) -> bool {
        let imported: HashMap<String, BankEntry> = match serde_json::from_str(json) {
            Ok(imported) => imported,
            Err(e) => {
                warn!(error = %e, "translation bank import rejected");
                return false;
            }
        };
        let mut entries = self.entries.lock();
        entries.extend(imported);
        self.save(&entries);
        true
    }

    /// Persist the current snapshot. Failure is logged and swallowed;
    /// the in-memory bank stays authoritative for this process.
    fn save(&self, entries: &HashMap<String, BankEntry>) {
        let json = match serde_json::to_string(entries) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "translation bank serialize failed");
                return;
            }
        };
        match self.storage.set_item(STORAGE_KEY, json) {
            Ok(()) => debug!(entries = entries.len(), "translation bank saved"),
            Err(e) => warn!(error = %e, "translation bank save failed"),
        }
    }

    /// Run the age-based cleanup once, shortly after startup. The delay
    /// keeps cache maintenance off the startup path.
    pub fn start_maintenance(bank: Arc<Self>, delay: Duration) {
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            bank.clear_old_entries(DEFAULT_MAX_AGE, now_millis());
        });
    }
}
