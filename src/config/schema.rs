use anyhow::{Context, Result};
use directories::UserDirs;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
#[cfg(unix)]
use tokio::fs::File;
use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

const SUPPORTED_CHECKPOINT_BACKENDS: &[&str] = &["sqlite", "memory"];

// ── Top-level config ──────────────────────────────────────────────

/// Top-level routebot configuration, loaded from `config.toml`.
///
/// Resolution order: `ROUTEBOT_CONFIG_DIR` env (also set by `--config-dir`) → `~/.routebot/config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct Config {
    /// Workspace directory - computed from home, not serialized
    #[serde(skip)]
    pub workspace_dir: PathBuf,
    /// Path to config.toml - computed from home, not serialized
    #[serde(skip)]
    pub config_path: PathBuf,
    /// API key for the selected provider. Overridden by `ROUTEBOT_API_KEY` or `API_KEY` env vars.
    pub api_key: Option<String>,
    /// Base URL override for provider API (e.g. a local OpenAI-compatible gateway)
    pub api_url: Option<String>,
    /// Default provider ID or alias (`"gemini"`, `"openai"`, `"openrouter"`, `"custom:<url>"`). Default: `"gemini"`.
    pub default_provider: Option<String>,
    /// Default model routed through the selected provider. Default: `"gemini-2.0-flash"`.
    pub default_model: Option<String>,
    /// Default model temperature (0.0–2.0). Default: `0.7`.
    pub default_temperature: f64,

    /// Agent tool-loop settings (`[agent]`).
    #[serde(default)]
    pub agent: AgentConfig,

    /// Checkpoint store configuration (`[checkpoint]`).
    #[serde(default)]
    pub checkpoint: CheckpointConfig,

    /// Interactive conversation settings (`[conversation]`).
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Tool settings (`[tools]`).
    #[serde(default)]
    pub tools: ToolsConfig,
}

/// Agent orchestration configuration (`[agent]` section).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct AgentConfig {
    /// Maximum tool-call loop turns per query. Default: `10`.
    /// Setting to `0` falls back to the safe default of `10`.
    #[serde(default = "default_agent_max_tool_iterations")]
    pub max_tool_iterations: usize,
    /// Tool output longer than this many characters is truncated. Default: `20000`.
    #[serde(default = "default_agent_max_tool_output_chars")]
    pub max_tool_output_chars: usize,
}

fn default_agent_max_tool_iterations() -> usize {
    10
}

fn default_agent_max_tool_output_chars() -> usize {
    20_000
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_tool_iterations: default_agent_max_tool_iterations(),
            max_tool_output_chars: default_agent_max_tool_output_chars(),
        }
    }
}

/// Checkpoint store configuration (`[checkpoint]` section).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct CheckpointConfig {
    /// `"sqlite"` (durable) or `"memory"` (lost on exit). Default: `"sqlite"`.
    #[serde(default = "default_checkpoint_backend")]
    pub backend: String,
    /// Database file for the sqlite backend. Default: `<workspace>/checkpoints.db`.
    #[serde(default)]
    pub path: Option<PathBuf>,
}

fn default_checkpoint_backend() -> String {
    "sqlite".into()
}

impl Default for CheckpointConfig {
    fn default() -> Self {
        Self {
            backend: default_checkpoint_backend(),
            path: None,
        }
    }
}

/// Interactive conversation configuration (`[conversation]` section).
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ConversationConfig {
    /// Thread used when `--thread` is not given. Default: `"1"`.
    #[serde(default = "default_thread_id")]
    pub default_thread_id: String,
}

fn default_thread_id() -> String {
    "1".into()
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            default_thread_id: default_thread_id(),
        }
    }
}

/// Tool configuration (`[tools]` section).
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ToolsConfig {
    /// JSON product catalog used by `compare_products`. Default: `<workspace>/product_data.json`.
    #[serde(default)]
    pub product_catalog_path: Option<PathBuf>,
}

impl ToolsConfig {
    pub fn catalog_path(&self, workspace_dir: &Path) -> PathBuf {
        self.product_catalog_path
            .clone()
            .unwrap_or_else(|| workspace_dir.join("product_data.json"))
    }
}

// ── Config impl ──────────────────────────────────────────────────

impl Default for Config {
    fn default() -> Self {
        let home =
            UserDirs::new().map_or_else(|| PathBuf::from("."), |u| u.home_dir().to_path_buf());
        let routebot_dir = home.join(".routebot");

        Self {
            workspace_dir: routebot_dir.join("workspace"),
            config_path: routebot_dir.join("config.toml"),
            api_key: None,
            api_url: None,
            default_provider: Some("gemini".to_string()),
            default_model: Some("gemini-2.0-flash".to_string()),
            default_temperature: 0.7,
            agent: AgentConfig::default(),
            checkpoint: CheckpointConfig::default(),
            conversation: ConversationConfig::default(),
            tools: ToolsConfig::default(),
        }
    }
}

fn default_config_dir() -> Result<PathBuf> {
    let home = UserDirs::new()
        .map(|u| u.home_dir().to_path_buf())
        .context("Could not find home directory")?;
    Ok(home.join(".routebot"))
}

/// `ROUTEBOT_CONFIG_DIR` when set, else `~/.routebot`.
fn resolve_config_dir() -> Result<PathBuf> {
    if let Ok(custom_config_dir) = std::env::var("ROUTEBOT_CONFIG_DIR") {
        let custom_config_dir = custom_config_dir.trim();
        if !custom_config_dir.is_empty() {
            return Ok(PathBuf::from(custom_config_dir));
        }
    }
    default_config_dir()
}

impl Config {
    pub async fn load_or_init() -> Result<Self> {
        let routebot_dir = resolve_config_dir()?;
        Self::load_or_init_in(&routebot_dir).await
    }

    /// Load `<dir>/config.toml`, writing defaults there first if it does not exist.
    pub async fn load_or_init_in(routebot_dir: &Path) -> Result<Self> {
        let config_path = routebot_dir.join("config.toml");
        let workspace_dir = routebot_dir.join("workspace");

        fs::create_dir_all(routebot_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                routebot_dir.display()
            )
        })?;

        let initialized = !config_path.exists();
        let mut config = if initialized {
            let mut config = Config::default();
            config.config_path = config_path.clone();
            config.workspace_dir = workspace_dir;
            config.save().await?;

            // Restrict permissions on newly created config file (may contain API keys)
            #[cfg(unix)]
            {
                use std::{fs::Permissions, os::unix::fs::PermissionsExt};
                let _ = fs::set_permissions(&config_path, Permissions::from_mode(0o600)).await;
            }
            config
        } else {
            // Warn if config file is world-readable (may contain API keys)
            #[cfg(unix)]
            {
                use std::os::unix::fs::PermissionsExt;
                if let Ok(meta) = fs::metadata(&config_path).await {
                    if meta.permissions().mode() & 0o004 != 0 {
                        tracing::warn!(
                            "Config file {:?} is world-readable (mode {:o}). \
                             Consider restricting with: chmod 600 {:?}",
                            config_path,
                            meta.permissions().mode() & 0o777,
                            config_path,
                        );
                    }
                }
            }

            let contents = fs::read_to_string(&config_path)
                .await
                .context("Failed to read config file")?;
            let mut config: Config =
                toml::from_str(&contents).context("Failed to parse config file")?;
            // Set computed paths that are skipped during serialization
            config.config_path = config_path.clone();
            config.workspace_dir = workspace_dir;
            config
        };

        config.apply_env_overrides();
        config.validate()?;
        fs::create_dir_all(&config.workspace_dir)
            .await
            .context("Failed to create workspace directory")?;

        tracing::info!(
            path = %config.config_path.display(),
            workspace = %config.workspace_dir.display(),
            initialized,
            "Config loaded"
        );
        Ok(config)
    }

    /// Validate configuration values that would cause runtime failures.
    ///
    /// Called after TOML deserialization and env-override application to catch
    /// obviously invalid values early instead of failing at arbitrary runtime points.
    pub fn validate(&self) -> Result<()> {
        if !(0.0..=2.0).contains(&self.default_temperature) {
            anyhow::bail!(
                "default_temperature must be between 0.0 and 2.0 (got {})",
                self.default_temperature
            );
        }

        if self.conversation.default_thread_id.trim().is_empty() {
            anyhow::bail!("conversation.default_thread_id must not be empty");
        }

        let backend = self.checkpoint.backend.trim().to_ascii_lowercase();
        if !SUPPORTED_CHECKPOINT_BACKENDS.contains(&backend.as_str()) {
            anyhow::bail!(
                "checkpoint.backend '{}' is not supported (expected one of: {})",
                self.checkpoint.backend,
                SUPPORTED_CHECKPOINT_BACKENDS.join(", ")
            );
        }

        Ok(())
    }

    /// Apply environment variable overrides to config
    pub fn apply_env_overrides(&mut self) {
        // API Key: ROUTEBOT_API_KEY or API_KEY (generic)
        if let Ok(key) = std::env::var("ROUTEBOT_API_KEY").or_else(|_| std::env::var("API_KEY")) {
            if !key.is_empty() {
                self.api_key = Some(key);
            }
        }

        if let Ok(provider) = std::env::var("ROUTEBOT_PROVIDER") {
            if !provider.is_empty() {
                self.default_provider = Some(provider);
            }
        }

        if let Ok(model) = std::env::var("ROUTEBOT_MODEL") {
            if !model.is_empty() {
                self.default_model = Some(model);
            }
        }

        // Out-of-range values are ignored rather than failing validation.
        if let Ok(temp_str) = std::env::var("ROUTEBOT_TEMPERATURE") {
            if let Ok(temp) = temp_str.parse::<f64>() {
                if (0.0..=2.0).contains(&temp) {
                    self.default_temperature = temp;
                }
            }
        }

        if let Ok(workspace) = std::env::var("ROUTEBOT_WORKSPACE") {
            if !workspace.is_empty() {
                self.workspace_dir = PathBuf::from(workspace);
            }
        }

        if let Ok(backend) = std::env::var("ROUTEBOT_CHECKPOINT_BACKEND") {
            if !backend.is_empty() {
                self.checkpoint.backend = backend;
            }
        }

        if let Ok(thread_id) = std::env::var("ROUTEBOT_THREAD_ID") {
            if !thread_id.trim().is_empty() {
                self.conversation.default_thread_id = thread_id.trim().to_string();
            }
        }
    }

    pub fn provider_name(&self) -> &str {
        self.default_provider.as_deref().unwrap_or("gemini")
    }

    pub fn model_name(&self) -> &str {
        self.default_model.as_deref().unwrap_or("gemini-2.0-flash")
    }

    pub async fn save(&self) -> Result<()> {
        let toml_str = toml::to_string_pretty(self).context("Failed to serialize config")?;

        let parent_dir = self
            .config_path
            .parent()
            .context("Config path must have a parent directory")?;

        fs::create_dir_all(parent_dir).await.with_context(|| {
            format!(
                "Failed to create config directory: {}",
                parent_dir.display()
            )
        })?;

        let file_name = self
            .config_path
            .file_name()
            .and_then(|v| v.to_str())
            .unwrap_or("config.toml");
        let temp_path = parent_dir.join(format!(".{file_name}.tmp-{}", uuid::Uuid::new_v4()));
        let backup_path = parent_dir.join(format!("{file_name}.bak"));

        let mut temp_file = OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&temp_path)
            .await
            .with_context(|| {
                format!(
                    "Failed to create temporary config file: {}",
                    temp_path.display()
                )
            })?;
        temp_file
            .write_all(toml_str.as_bytes())
            .await
            .context("Failed to write temporary config contents")?;
        temp_file
            .sync_all()
            .await
            .context("Failed to fsync temporary config file")?;
        drop(temp_file);

        let had_existing_config = self.config_path.exists();
        if had_existing_config {
            fs::copy(&self.config_path, &backup_path)
                .await
                .with_context(|| {
                    format!(
                        "Failed to create config backup before atomic replace: {}",
                        backup_path.display()
                    )
                })?;
        }

        if let Err(e) = fs::rename(&temp_path, &self.config_path).await {
            let _ = fs::remove_file(&temp_path).await;
            if had_existing_config && backup_path.exists() {
                fs::copy(&backup_path, &self.config_path)
                    .await
                    .context("Failed to restore config backup")?;
            }
            anyhow::bail!("Failed to atomically replace config file: {e}");
        }

        sync_directory(parent_dir).await?;

        if had_existing_config {
            let _ = fs::remove_file(&backup_path).await;
        }

        Ok(())
    }
}

async fn sync_directory(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        let dir = File::open(path)
            .await
            .with_context(|| format!("Failed to open directory for fsync: {}", path.display()))?;
        dir.sync_all()
            .await
            .with_context(|| format!("Failed to fsync directory metadata: {}", path.display()))?;
        Ok(())
    }

    #[cfg(not(unix))]
    {
        let _ = path;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use tokio::sync::{Mutex, MutexGuard};

    // ── Defaults ─────────────────────────────────────────────

    #[test]
    fn config_default_has_sane_values() {
        let c = Config::default();
        assert_eq!(c.default_provider.as_deref(), Some("gemini"));
        assert_eq!(c.default_model.as_deref(), Some("gemini-2.0-flash"));
        assert!((c.default_temperature - 0.7).abs() < f64::EPSILON);
        assert!(c.api_key.is_none());
        assert_eq!(c.agent.max_tool_iterations, 10);
        assert_eq!(c.agent.max_tool_output_chars, 20_000);
        assert_eq!(c.checkpoint.backend, "sqlite");
        assert_eq!(c.conversation.default_thread_id, "1");
        assert!(c.workspace_dir.to_string_lossy().contains("workspace"));
        assert!(c.config_path.to_string_lossy().contains("config.toml"));
        c.validate().unwrap();
    }

    #[test]
    fn config_schema_export_contains_expected_contract_shape() {
        let schema = schemars::schema_for!(Config);
        let schema_json = serde_json::to_value(&schema).expect("schema should serialize to json");

        assert_eq!(
            schema_json
                .get("$schema")
                .and_then(serde_json::Value::as_str),
            Some("https://json-schema.org/draft/2020-12/schema")
        );

        let properties = schema_json
            .get("properties")
            .and_then(serde_json::Value::as_object)
            .expect("schema should expose top-level properties");

        assert!(properties.contains_key("default_provider"));
        assert!(properties.contains_key("checkpoint"));
        assert!(properties.contains_key("conversation"));
        assert!(!properties.contains_key("workspace_dir"));
        assert!(!properties.contains_key("config_path"));
    }

    // ── Serde ────────────────────────────────────────────────

    #[test]
    fn config_minimal_toml_uses_defaults() {
        let minimal = "default_temperature = 0.7\n";
        let parsed: Config = toml::from_str(minimal).unwrap();
        assert!(parsed.api_key.is_none());
        assert!(parsed.default_provider.is_none());
        assert_eq!(parsed.provider_name(), "gemini");
        assert_eq!(parsed.model_name(), "gemini-2.0-flash");
        assert_eq!(parsed.agent.max_tool_iterations, 10);
        assert_eq!(parsed.checkpoint.backend, "sqlite");
        assert!(parsed.checkpoint.path.is_none());
        assert_eq!(parsed.conversation.default_thread_id, "1");
    }

    #[test]
    fn config_sections_deserialize() {
        let raw = r#"
default_provider = "openai"
default_model = "gpt-4o-mini"
default_temperature = 0.2

[agent]
max_tool_iterations = 4
max_tool_output_chars = 500

[checkpoint]
backend = "memory"

[conversation]
default_thread_id = "study"

[tools]
product_catalog_path = "/srv/catalog.json"
"#;
        let parsed: Config = toml::from_str(raw).unwrap();
        assert_eq!(parsed.provider_name(), "openai");
        assert_eq!(parsed.agent.max_tool_iterations, 4);
        assert_eq!(parsed.agent.max_tool_output_chars, 500);
        assert_eq!(parsed.checkpoint.backend, "memory");
        assert_eq!(parsed.conversation.default_thread_id, "study");
        assert_eq!(
            parsed.tools.catalog_path(Path::new("/ws")),
            PathBuf::from("/srv/catalog.json")
        );
    }

    #[test]
    fn catalog_path_defaults_into_workspace() {
        assert_eq!(
            ToolsConfig::default().catalog_path(Path::new("/ws")),
            PathBuf::from("/ws/product_data.json")
        );
    }

    // ── Validation ───────────────────────────────────────────

    #[test]
    fn validate_rejects_out_of_range_temperature() {
        let mut c = Config::default();
        c.default_temperature = 2.5;
        assert!(c.validate().unwrap_err().to_string().contains("temperature"));
    }

    #[test]
    fn validate_rejects_blank_thread_id() {
        let mut c = Config::default();
        c.conversation.default_thread_id = "  ".into();
        assert!(c.validate().is_err());
    }

    #[test]
    fn validate_rejects_unknown_backend() {
        let mut c = Config::default();
        c.checkpoint.backend = "mongodb".into();
        let err = c.validate().unwrap_err().to_string();
        assert!(err.contains("mongodb"));
        c.checkpoint.backend = "Memory".into();
        c.validate().unwrap();
    }

    // ── Persistence ──────────────────────────────────────────

    #[tokio::test]
    async fn sync_directory_handles_existing_directory() {
        let tmp = TempDir::new().unwrap();
        sync_directory(tmp.path()).await.unwrap();
    }

    #[tokio::test]
    async fn config_save_and_reload() {
        let tmp = TempDir::new().unwrap();
        let config_path = tmp.path().join("config.toml");
        let mut config = Config::default();
        config.config_path = config_path.clone();
        config.workspace_dir = tmp.path().join("workspace");
        config.default_model = Some("test-model".into());
        config.default_temperature = 0.9;

        config.save().await.unwrap();
        assert!(config_path.exists());
        // Second save goes through the backup path and cleans it up.
        config.save().await.unwrap();
        assert!(!tmp.path().join("config.toml.bak").exists());

        let contents = tokio::fs::read_to_string(&config_path).await.unwrap();
        let loaded: Config = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.default_model.as_deref(), Some("test-model"));
        assert!((loaded.default_temperature - 0.9).abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn load_or_init_in_writes_defaults_then_reads_them_back() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let tmp = TempDir::new().unwrap();

        let first = Config::load_or_init_in(tmp.path()).await.unwrap();
        assert!(tmp.path().join("config.toml").exists());
        assert!(first.workspace_dir.exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(tmp.path().join("config.toml"))
                .unwrap()
                .permissions()
                .mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        let second = Config::load_or_init_in(tmp.path()).await.unwrap();
        assert_eq!(second.default_provider, first.default_provider);
        assert_eq!(second.config_path, tmp.path().join("config.toml"));
    }

    #[tokio::test]
    async fn load_or_init_in_rejects_invalid_file() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let tmp = TempDir::new().unwrap();
        std::fs::write(
            tmp.path().join("config.toml"),
            "default_temperature = 0.7\n[checkpoint]\nbackend = \"redis\"\n",
        )
        .unwrap();
        assert!(Config::load_or_init_in(tmp.path()).await.is_err());
    }

    #[tokio::test]
    async fn load_or_init_in_applies_and_validates_env_overrides() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let tmp = TempDir::new().unwrap();

        std::env::set_var("ROUTEBOT_MODEL", "env-model");
        let config = Config::load_or_init_in(tmp.path()).await.unwrap();
        assert_eq!(config.model_name(), "env-model");
        // Overrides are not written back to disk.
        let on_disk = std::fs::read_to_string(tmp.path().join("config.toml")).unwrap();
        assert!(!on_disk.contains("env-model"));

        std::env::set_var("ROUTEBOT_CHECKPOINT_BACKEND", "redis");
        let err = Config::load_or_init_in(tmp.path()).await.unwrap_err();
        assert!(err.to_string().contains("checkpoint.backend"));
        clear_env_test_vars();
    }

    // ── Env override helpers ─────────────────────────────────

    async fn env_override_lock() -> MutexGuard<'static, ()> {
        static ENV_OVERRIDE_TEST_LOCK: Mutex<()> = Mutex::const_new(());
        ENV_OVERRIDE_TEST_LOCK.lock().await
    }

    fn clear_env_test_vars() {
        for key in [
            "ROUTEBOT_API_KEY",
            "API_KEY",
            "ROUTEBOT_PROVIDER",
            "ROUTEBOT_MODEL",
            "ROUTEBOT_TEMPERATURE",
            "ROUTEBOT_WORKSPACE",
            "ROUTEBOT_CHECKPOINT_BACKEND",
            "ROUTEBOT_THREAD_ID",
        ] {
            std::env::remove_var(key);
        }
    }

    // ── Env override tests ───────────────────────────────────

    #[tokio::test]
    async fn env_override_api_key() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let mut config = Config::default();

        std::env::set_var("ROUTEBOT_API_KEY", "test-env-key");
        config.apply_env_overrides();
        assert_eq!(config.api_key.as_deref(), Some("test-env-key"));

        clear_env_test_vars();
    }

    #[tokio::test]
    async fn env_override_api_key_fallback() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let mut config = Config::default();

        std::env::set_var("API_KEY", "fallback-key");
        config.apply_env_overrides();
        assert_eq!(config.api_key.as_deref(), Some("fallback-key"));

        clear_env_test_vars();
    }

    #[tokio::test]
    async fn env_override_provider_model_and_thread() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let mut config = Config::default();

        std::env::set_var("ROUTEBOT_PROVIDER", "openrouter");
        std::env::set_var("ROUTEBOT_MODEL", "some/model");
        std::env::set_var("ROUTEBOT_THREAD_ID", " study ");
        std::env::set_var("ROUTEBOT_CHECKPOINT_BACKEND", "memory");
        config.apply_env_overrides();
        assert_eq!(config.provider_name(), "openrouter");
        assert_eq!(config.model_name(), "some/model");
        assert_eq!(config.conversation.default_thread_id, "study");
        assert_eq!(config.checkpoint.backend, "memory");

        clear_env_test_vars();
    }

    #[tokio::test]
    async fn env_override_temperature_ignores_out_of_range() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let mut config = Config::default();

        std::env::set_var("ROUTEBOT_TEMPERATURE", "0.3");
        config.apply_env_overrides();
        assert!((config.default_temperature - 0.3).abs() < f64::EPSILON);

        std::env::set_var("ROUTEBOT_TEMPERATURE", "5.0");
        config.apply_env_overrides();
        assert!((config.default_temperature - 0.3).abs() < f64::EPSILON);

        clear_env_test_vars();
    }

    #[tokio::test]
    async fn env_override_workspace() {
        let _env_guard = env_override_lock().await;
        clear_env_test_vars();
        let mut config = Config::default();

        std::env::set_var("ROUTEBOT_WORKSPACE", "/tmp/routebot-ws");
        config.apply_env_overrides();
        assert_eq!(config.workspace_dir, PathBuf::from("/tmp/routebot-ws"));

        clear_env_test_vars();
    }
}
