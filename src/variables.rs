//! Variable panel model: rows over the game's variable store and name
//! table, with instant application of cached name translations and
//! chunked translation of the rest.

use std::sync::Arc;

use parking_lot::Mutex;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::endpoints::EndpointKind;
use crate::translate::{TranslationBank, Translator};

/// Read/write access to the game's variable values.
pub trait VariableStore: Send + Sync {
    fn count(&self) -> usize;
    fn value(&self, id: usize) -> Value;
    fn set_value(&self, id: usize, value: Value);
}

/// Ordered variable names from the game data. Index 0 is reserved by
/// the engine and never shown.
pub trait NameTable: Send + Sync {
    fn names(&self) -> Vec<String>;
}

/// One table row. `name` is the untranslated source name; `display_name`
/// is what the table shows and may carry a translation.
#[derive(Debug, Clone)]
pub struct VariableRow {
    pub id: usize,
    pub name: String,
    pub display_name: String,
    pub value: Value,
}

pub struct VariablePanel {
    rows: Arc<Mutex<Vec<VariableRow>>>,
}

impl VariablePanel {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Build rows from the name table and current store values,
    /// skipping the reserved index 0.
    pub fn load(&self, store: &dyn VariableStore, names: &dyn NameTable) {
        let names = names.names();
        if store.count() != names.len() {
            debug!(
                store = store.count(),
                names = names.len(),
                "variable count differs from name table"
            );
        }
        let rows: Vec<VariableRow> = names
            .into_iter()
            .enumerate()
            .skip(1)
            .map(|(id, name)| VariableRow {
                id,
                display_name: name.clone(),
                name,
                value: store.value(id),
            })
            .collect();
        info!(rows = rows.len(), "variable panel loaded");
        *self.rows.lock() = rows;
    }

    /// Snapshot of the current rows.
    pub fn rows(&self) -> Vec<VariableRow> {
        self.rows.lock().clone()
    }

    /// Re-read every row's value from the store.
    pub fn refresh_values(&self, store: &dyn VariableStore) {
        let mut rows = self.rows.lock();
        for row in rows.iter_mut() {
            row.value = store.value(row.id);
        }
    }

    /// Write a value through to the store, then read it back so the row
    /// reflects whatever the engine actually kept.
    pub fn write_value(&self, store: &dyn VariableStore, id: usize, value: Value) {
        store.set_value(id, value);
        let mut rows = self.rows.lock();
        if let Some(row) = rows.iter_mut().find(|r| r.id == id) {
            row.value = store.value(id);
        } else {
            warn!(id, "write_value for unknown row");
        }
    }

    /// Restore every display name to the untranslated source name.
    pub fn reset_display_names(&self) {
        let mut rows = self.rows.lock();
        for row in rows.iter_mut() {
            row.display_name = row.name.clone();
        }
    }

    /// Apply bank hits to display names immediately and return the ids
    /// of rows that still need a translation. Rows with blank names are
    /// neither updated nor returned.
    pub fn apply_cached_translations(&self, bank: &TranslationBank) -> Vec<usize> {
        let mut rows = self.rows.lock();
        let mut uncached = Vec::new();
        let mut cache_hits = 0usize;

        for row in rows.iter_mut() {
            if row.name.trim().is_empty() {
                continue;
            }
            match bank.get(&row.name) {
                Some(entry) => {
                    row.display_name = entry.translated;
                    cache_hits += 1;
                }
                None => uncached.push(row.id),
            }
        }

        debug!(cache_hits, uncached = uncached.len(), "cached translations applied");
        uncached
    }

    /// Translate every row whose name is not yet in the bank, in chunks
    /// of the configured size. Cached names are applied first.
    pub async fn translate_names(&self, translator: &Arc<Translator>) {
        let uncached = self.apply_cached_translations(translator.bank());
        if uncached.is_empty() {
            info!("all variable names served from the bank");
            return;
        }
        info!(uncached = uncached.len(), "translating uncached variable names");

        let chunk_size = translator
            .settings()
            .bulk_translate_chunk_size()
            .max(1);

        for chunk_ids in uncached.chunks(chunk_size) {
            self.translate_chunk(translator, chunk_ids).await;
        }
    }

    async fn translate_chunk(&self, translator: &Arc<Translator>, ids: &[usize]) {
        let names: Vec<(usize, String)> = {
            let rows = self.rows.lock();
            ids.iter()
                .filter_map(|id| {
                    rows.iter()
                        .find(|r| r.id == *id)
                        .map(|r| (r.id, r.name.clone()))
                })
                .collect()
        };

        match translator.endpoint().kind {
            EndpointKind::AutoDetect { .. } => {
                self.translate_chunk_instantly(translator, names).await;
            }
            EndpointKind::Template { .. } => {
                let texts: Vec<String> = names.iter().map(|(_, n)| n.clone()).collect();
                let translated = translator.translate_bulk(&texts).await;
                let mut rows = self.rows.lock();
                for ((id, name), translated) in names.iter().zip(translated) {
                    if translated.is_empty() || translated == *name {
                        continue;
                    }
                    if let Some(row) = rows.iter_mut().find(|r| r.id == *id) {
                        row.display_name = translated;
                    }
                }
            }
        }
    }

    /// Per-item concurrent translation with staggered starts; each row
    /// updates the moment its own request completes. Results land by the
    /// carried row id, never by completion order. Spawned items run to
    /// completion even if the caller abandons the panel mid-flight, and
    /// still populate the bank.
    async fn translate_chunk_instantly(
        &self,
        translator: &Arc<Translator>,
        names: Vec<(usize, String)>,
    ) {
        let stagger = translator.backoff().stagger;
        let mut handles = Vec::with_capacity(names.len());

        for (idx, (id, name)) in names.into_iter().enumerate() {
            if name.trim().is_empty() {
                continue;
            }
            let translator = Arc::clone(translator);
            let rows = Arc::clone(&self.rows);
            handles.push(tokio::spawn(async move {
                // One more bank check before going out on the wire.
                if let Some(entry) = translator.bank().get(&name) {
                    if let Some(row) = rows.lock().iter_mut().find(|r| r.id == id) {
                        row.display_name = entry.translated;
                    }
                    return;
                }

                if idx > 0 {
                    tokio::time::sleep(stagger * idx as u32).await;
                }

                let translated = translator.translate_one(&name).await;
                if translated != name && !translated.is_empty() {
                    if let Some(row) = rows.lock().iter_mut().find(|r| r.id == id) {
                        row.display_name = translated;
                        debug!(id, "display name updated");
                    }
                }
            }));
        }

        for result in futures_util::future::join_all(handles).await {
            if let Err(e) = result {
                warn!(error = %e, "instant update task failed");
            }
        }
    }
}

impl Default for VariablePanel {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex as PlMutex;

    struct FakeStore {
        values: PlMutex<Vec<Value>>,
    }

    impl FakeStore {
        fn new(count: usize) -> Self {
            Self {
                values: PlMutex::new(vec![Value::from(0); count]),
            }
        }
    }

    impl VariableStore for FakeStore {
        fn count(&self) -> usize {
            self.values.lock().len()
        }
        fn value(&self, id: usize) -> Value {
            self.values.lock().get(id).cloned().unwrap_or(Value::Null)
        }
        fn set_value(&self, id: usize, value: Value) {
            let mut values = self.values.lock();
            if let Some(slot) = values.get_mut(id) {
                *slot = value;
            }
        }
    }

    struct FakeNames(Vec<String>);

    impl NameTable for FakeNames {
        fn names(&self) -> Vec<String> {
            self.0.clone()
        }
    }

    fn fake_names() -> FakeNames {
        FakeNames(
            ["<reserved>", "Gold", "Steps", ""]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }

    #[test]
    fn load_skips_reserved_index() {
        let panel = VariablePanel::new();
        panel.load(&FakeStore::new(4), &fake_names());

        let rows = panel.rows();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0].id, 1);
        assert_eq!(rows[0].name, "Gold");
        assert_eq!(rows[0].display_name, "Gold");
    }

    #[test]
    fn write_value_reads_back_from_store() {
        let panel = VariablePanel::new();
        let store = FakeStore::new(4);
        panel.load(&store, &fake_names());

        panel.write_value(&store, 2, Value::from(777));
        assert_eq!(store.value(2), Value::from(777));
        let rows = panel.rows();
        assert_eq!(rows.iter().find(|r| r.id == 2).unwrap().value, Value::from(777));
    }

    #[test]
    fn cached_names_apply_instantly_and_blanks_are_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let bank = TranslationBank::open(crate::storage::KeyValueStorage::open(
            dir.path().join("bank.json"),
        ));
        bank.set("Gold", "Gett", "lingva");

        let panel = VariablePanel::new();
        panel.load(&FakeStore::new(4), &fake_names());

        let uncached = panel.apply_cached_translations(&bank);
        // "Steps" misses the bank; the blank name is skipped entirely.
        assert_eq!(uncached, vec![2]);

        let rows = panel.rows();
        assert_eq!(rows.iter().find(|r| r.id == 1).unwrap().display_name, "Gett");
        assert_eq!(rows.iter().find(|r| r.id == 2).unwrap().display_name, "Steps");
    }

    #[test]
    fn reset_restores_source_names() {
        let dir = tempfile::tempdir().unwrap();
        let bank = TranslationBank::open(crate::storage::KeyValueStorage::open(
            dir.path().join("bank.json"),
        ));
        bank.set("Gold", "Gett", "lingva");

        let panel = VariablePanel::new();
        panel.load(&FakeStore::new(4), &fake_names());
        panel.apply_cached_translations(&bank);
        panel.reset_display_names();

        let rows = panel.rows();
        assert!(rows.iter().all(|r| r.display_name == r.name));
    }
}
