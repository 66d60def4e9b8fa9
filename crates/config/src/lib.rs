use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow, bail};
use core_types::{DEFAULT_TEMPERATURE, ProviderConfig, ProviderId, UiLanguage};
use retrieval::RetrievalConfig;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Checked when the configured variable is unset.
pub const FALLBACK_API_KEY_ENV: &str = "API_KEY";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GenerationConfig {
    #[serde(default = "default_temperature")]
    pub temperature: f32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            temperature: default_temperature(),
        }
    }
}

const fn default_temperature() -> f32 {
    DEFAULT_TEMPERATURE
}

const fn default_provider() -> ProviderId {
    ProviderId::Gemini
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub schema_version: u32,
    pub language: UiLanguage,
    #[serde(default = "default_provider")]
    pub active_provider: ProviderId,
    #[serde(default)]
    pub providers: Vec<ProviderConfig>,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            language: UiLanguage::EnUs,
            active_provider: default_provider(),
            providers: default_providers(),
            generation: GenerationConfig::default(),
            retrieval: RetrievalConfig::default(),
        }
    }
}

fn default_providers() -> Vec<ProviderConfig> {
    vec![
        ProviderConfig {
            id: ProviderId::Gemini,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            api_key_env: "GEMINI_API_KEY".to_string(),
            default_model: "gemini-3-flash-preview".to_string(),
            extra_headers: Vec::new(),
            enabled: true,
        },
        ProviderConfig {
            id: ProviderId::OpenAi,
            base_url: "https://api.openai.com/v1".to_string(),
            api_key_env: "OPENAI_API_KEY".to_string(),
            default_model: "gpt-4.1-mini".to_string(),
            extra_headers: Vec::new(),
            enabled: true,
        },
    ]
}

impl AppConfig {
    pub fn provider(&self, id: ProviderId) -> Result<&ProviderConfig> {
        let provider = self
            .providers
            .iter()
            .find(|provider| provider.id == id)
            .ok_or_else(|| anyhow!("provider {id:?} is not configured"))?;
        if !provider.enabled {
            bail!("provider {id:?} is disabled");
        }
        Ok(provider)
    }

    pub fn active_provider(&self) -> Result<&ProviderConfig> {
        self.provider(self.active_provider)
    }
}

/// Reads the provider key from its configured variable, then [`FALLBACK_API_KEY_ENV`].
pub fn resolve_api_key(provider: &ProviderConfig) -> Result<String> {
    resolve_api_key_with(provider, |name| env::var(name).ok())
}

/// Same as [`resolve_api_key`] with an explicit variable lookup.
pub fn resolve_api_key_with<L>(provider: &ProviderConfig, lookup: L) -> Result<String>
where
    L: Fn(&str) -> Option<String>,
{
    let read = |name: &str| {
        lookup(name)
            .map(|value| value.trim().to_string())
            .filter(|value| !value.is_empty())
    };
    if let Some(key) = read(&provider.api_key_env) {
        return Ok(key);
    }
    if let Some(key) = read(FALLBACK_API_KEY_ENV) {
        debug!(
            configured = %provider.api_key_env,
            "using fallback api key variable"
        );
        return Ok(key);
    }
    bail!(
        "no API key found; set {} or {}",
        provider.api_key_env,
        FALLBACK_API_KEY_ENV
    )
}

pub struct ConfigStore {
    path: PathBuf,
}

impl ConfigStore {
    pub fn from_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            path: dir.into().join("config.json"),
        }
    }

    pub fn from_default_location() -> Result<Self> {
        let mut dir = dirs::config_dir().context("failed to resolve config_dir")?;
        dir.push("docmind");
        Ok(Self::from_dir(dir))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn load_or_init(&self) -> Result<AppConfig> {
        if !self.path.exists() {
            let config = AppConfig::default();
            self.save(&config)?;
            return Ok(config);
        }

        let raw = fs::read_to_string(&self.path)
            .with_context(|| format!("failed to read {}", self.path.display()))?;
        let mut config: AppConfig =
            serde_json::from_str(&raw).context("failed to parse app config json")?;
        self.migrate(&mut config);
        self.save(&config)?;
        Ok(config)
    }

    pub fn save(&self, config: &AppConfig) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }

        let text = serde_json::to_string_pretty(config).context("failed to serialize config")?;
        fs::write(&self.path, text)
            .with_context(|| format!("failed to write {}", self.path.display()))?;
        Ok(())
    }

    fn migrate(&self, config: &mut AppConfig) {
        if config.schema_version >= CURRENT_SCHEMA_VERSION {
            return;
        }

        warn!(
            from = config.schema_version,
            to = CURRENT_SCHEMA_VERSION,
            "migrating app config schema"
        );

        // v1 had no retrieval or generation sections; serde defaults filled them.
        if config.providers.is_empty() {
            config.providers = default_providers();
        }
        config.schema_version = CURRENT_SCHEMA_VERSION;
    }
}
