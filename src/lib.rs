//! rmvar: RPG Maker variable inspector backend with cached name
//! translation. Wires storage, settings, translation bank, endpoint
//! registry and translator into one explicitly constructed context.

pub mod endpoints;
pub mod settings;
pub mod storage;
pub mod translate;
pub mod variables;

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use endpoints::EndpointRegistry;
use settings::TranslateSettings;
use storage::KeyValueStorage;
use translate::{BackoffPolicy, TranslationBank, Translator};
use variables::VariablePanel;

/// File names inside the settings directory.
const SETTINGS_FILE: &str = "translate.json";
const BANK_FILE: &str = "translation-bank.json";

/// Delay before the startup bank maintenance pass, keeping cache
/// upkeep off the startup path.
const MAINTENANCE_DELAY: Duration = Duration::from_secs(1);

/// Process-scoped application context. Every component is constructed
/// here and shared via `Arc`; there are no module-level globals.
pub struct AppContext {
    pub settings: Arc<TranslateSettings>,
    pub bank: Arc<TranslationBank>,
    pub registry: Arc<EndpointRegistry>,
    pub translator: Arc<Translator>,
    pub variable_panel: Arc<VariablePanel>,
}

impl AppContext {
    /// Build the context over a settings directory and schedule the
    /// startup bank maintenance. Call from within a Tokio runtime.
    pub fn bootstrap(settings_dir: &Path) -> Self {
        let settings = Arc::new(TranslateSettings::open(KeyValueStorage::open(
            settings_dir.join(SETTINGS_FILE),
        )));
        let bank = Arc::new(TranslationBank::open(KeyValueStorage::open(
            settings_dir.join(BANK_FILE),
        )));
        let registry = Arc::new(EndpointRegistry::builtin());
        let translator = Arc::new(Translator::new(
            Arc::clone(&settings),
            Arc::clone(&bank),
            Arc::clone(&registry),
            BackoffPolicy::default(),
        ));

        TranslationBank::start_maintenance(Arc::clone(&bank), MAINTENANCE_DELAY);

        info!(dir = %settings_dir.display(), "application context ready");

        Self {
            settings,
            bank,
            registry,
            translator,
            variable_panel: Arc::new(VariablePanel::new()),
        }
    }
}

/// Initialize tracing for the host process.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rmvar=debug".parse().unwrap()),
        )
        .with_target(true)
        .init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn bootstrap_wires_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = AppContext::bootstrap(dir.path());

        assert!(!ctx.settings.is_enabled());
        assert_eq!(ctx.settings.end_point_selection(), "lingva");
        assert!(ctx.bank.is_empty());
        assert_eq!(ctx.translator.endpoint().id, "lingva");
    }
}
