//! Persisted user configuration for the translation pipeline.
//! Loaded once at startup; every setter mutates in-memory state and
//! immediately rewrites the whole document.

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::endpoints::{CustomEndpoint, Endpoint, EndpointRegistry, DEFAULT_ENDPOINT_ID};
use crate::storage::KeyValueStorage;

const STORAGE_KEY: &str = "data";

/// Accepted range for the bulk translate chunk size.
pub const CHUNK_SIZE_RANGE: std::ops::RangeInclusive<i64> = 1..=2000;

#[derive(Debug)]
pub enum SettingsError {
    /// Out-of-range chunk size; surfaced for user correction rather than
    /// silently clamped.
    InvalidChunkSize { value: i64 },
}

impl std::fmt::Display for SettingsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SettingsError::InvalidChunkSize { value } => write!(
                f,
                "chunk size {value} out of range {}..={}",
                CHUNK_SIZE_RANGE.start(),
                CHUNK_SIZE_RANGE.end()
            ),
        }
    }
}

/// Which name categories translation applies to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Targets {
    pub items: bool,
    pub variables: bool,
    pub switches: bool,
    pub maps: bool,
}

impl Default for Targets {
    fn default() -> Self {
        Self {
            items: false,
            variables: true,
            switches: true,
            maps: true,
        }
    }
}

/// The persisted settings document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct SettingsData {
    pub enabled: bool,
    pub end_point_selection: String,
    pub custom_end_point_data: CustomEndpoint,
    pub targets: Targets,
    pub bulk_translate_chunk_size: usize,
}

impl Default for SettingsData {
    fn default() -> Self {
        Self {
            enabled: false,
            end_point_selection: DEFAULT_ENDPOINT_ID.into(),
            custom_end_point_data: CustomEndpoint::default(),
            targets: Targets::default(),
            bulk_translate_chunk_size: 10,
        }
    }
}

pub struct TranslateSettings {
    storage: KeyValueStorage,
    data: RwLock<SettingsData>,
}

impl TranslateSettings {
    /// Load the settings document, defaulting when absent or unreadable.
    pub fn open(storage: KeyValueStorage) -> Self {
        let data = match storage.get_item(STORAGE_KEY) {
            Some(json) => match serde_json::from_str(&json) {
                Ok(data) => data,
                Err(e) => {
                    warn!(error = %e, "settings document unreadable, using defaults");
                    SettingsData::default()
                }
            },
            None => SettingsData::default(),
        };
        Self {
            storage,
            data: RwLock::new(data),
        }
    }

    /// Rewrite the whole document. Failure is logged and swallowed; the
    /// in-memory state stays authoritative for this process.
    fn save(&self, data: &SettingsData) {
        let json = match serde_json::to_string(data) {
            Ok(json) => json,
            Err(e) => {
                warn!(error = %e, "settings serialize failed");
                return;
            }
        };
        if let Err(e) = self.storage.set_item(STORAGE_KEY, json) {
            warn!(error = %e, "settings save failed");
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.data.read().enabled
    }

    pub fn set_enabled(&self, flag: bool) {
        let mut data = self.data.write();
        data.enabled = flag;
        self.save(&data);
    }

    pub fn end_point_selection(&self) -> String {
        self.data.read().end_point_selection.clone()
    }

    pub fn set_end_point_selection(&self, endpoint_id: &str) {
        let mut data = self.data.write();
        data.end_point_selection = endpoint_id.to_string();
        self.save(&data);
    }

    pub fn custom_end_point(&self) -> CustomEndpoint {
        self.data.read().custom_end_point_data.clone()
    }

    pub fn set_custom_end_point_method(&self, method: &str) {
        let mut data = self.data.write();
        data.custom_end_point_data.method = method.to_string();
        self.save(&data);
    }

    pub fn set_custom_end_point_url_pattern(&self, url_pattern: &str) {
        let mut data = self.data.write();
        data.custom_end_point_data.url_pattern = url_pattern.to_string();
        self.save(&data);
    }

    pub fn set_custom_end_point_body(&self, body: &str) {
        let mut data = self.data.write();
        data.custom_end_point_data.body = body.to_string();
        self.save(&data);
    }

    /// Resolve the current selection to a concrete endpoint.
    pub fn endpoint_data(&self, registry: &EndpointRegistry) -> Endpoint {
        let data = self.data.read();
        registry.resolve(&data.end_point_selection, &data.custom_end_point_data)
    }

    pub fn bulk_translate_chunk_size(&self) -> usize {
        self.data.read().bulk_translate_chunk_size
    }

    /// Set the bulk chunk size. Out-of-range values are rejected, not
    /// clamped; the safety clamp lives in the translate path.
    pub fn set_bulk_translate_chunk_size(&self, chunk_size: i64) -> Result<(), SettingsError> {
        if !CHUNK_SIZE_RANGE.contains(&chunk_size) {
            return Err(SettingsError::InvalidChunkSize { value: chunk_size });
        }
        let mut data = self.data.write();
        data.bulk_translate_chunk_size = chunk_size as usize;
        self.save(&data);
        Ok(())
    }

    pub fn targets(&self) -> Targets {
        self.data.read().targets
    }

    pub fn set_targets(&self, targets: Targets) {
        let mut data = self.data.write();
        data.targets = targets;
        self.save(&data);
    }

    pub fn is_item_translate_enabled(&self) -> bool {
        let data = self.data.read();
        data.enabled && data.targets.items
    }

    pub fn is_variable_translate_enabled(&self) -> bool {
        let data = self.data.read();
        data.enabled && data.targets.variables
    }

    pub fn is_switch_translate_enabled(&self) -> bool {
        let data = self.data.read();
        data.enabled && data.targets.switches
    }

    pub fn is_map_translate_enabled(&self) -> bool {
        let data = self.data.read();
        data.enabled && data.targets.maps
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_settings(dir: &tempfile::TempDir) -> TranslateSettings {
        TranslateSettings::open(KeyValueStorage::open(dir.path().join("translate.json")))
    }

    #[test]
    fn defaults_when_absent() {
        let dir = tempfile::tempdir().unwrap();
        let settings = open_settings(&dir);

        assert!(!settings.is_enabled());
        assert_eq!(settings.end_point_selection(), "lingva");
        assert_eq!(settings.bulk_translate_chunk_size(), 10);
        let targets = settings.targets();
        assert!(!targets.items);
        assert!(targets.variables && targets.switches && targets.maps);
    }

    #[test]
    fn setters_persist_immediately() {
        let dir = tempfile::tempdir().unwrap();
        {
            let settings = open_settings(&dir);
            settings.set_enabled(true);
            settings.set_end_point_selection("ezTransWeb");
            settings.set_bulk_translate_chunk_size(25).unwrap();
            settings.set_custom_end_point_method("post");
        }

        let reopened = open_settings(&dir);
        assert!(reopened.is_enabled());
        assert_eq!(reopened.end_point_selection(), "ezTransWeb");
        assert_eq!(reopened.bulk_translate_chunk_size(), 25);
        assert_eq!(reopened.custom_end_point().method, "post");
    }

    #[test]
    fn invalid_chunk_size_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let settings = open_settings(&dir);

        assert!(settings.set_bulk_translate_chunk_size(0).is_err());
        assert!(settings.set_bulk_translate_chunk_size(2001).is_err());
        assert_eq!(settings.bulk_translate_chunk_size(), 10);
    }

    #[test]
    fn reads_legacy_document_format() {
        let json = r#"{
            "enabled": true,
            "endPointSelection": "custom",
            "customEndPointData": {
                "method": "post",
                "urlPattern": "http://localhost:8000",
                "body": "${TEXT}"
            },
            "targets": { "items": true, "variables": false, "switches": true, "maps": true },
            "bulkTranslateChunkSize": 100
        }"#;
        let data: SettingsData = serde_json::from_str(json).unwrap();
        assert!(data.enabled);
        assert_eq!(data.end_point_selection, "custom");
        assert_eq!(data.custom_end_point_data.body, "${TEXT}");
        assert!(!data.targets.variables);
        assert_eq!(data.bulk_translate_chunk_size, 100);
    }

    #[test]
    fn category_gates_require_master_flag() {
        let dir = tempfile::tempdir().unwrap();
        let settings = open_settings(&dir);

        assert!(!settings.is_variable_translate_enabled());
        settings.set_enabled(true);
        assert!(settings.is_variable_translate_enabled());
        assert!(!settings.is_item_translate_enabled());
    }
}
