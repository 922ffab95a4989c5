//! Service configuration.
//!
//! Loads from an optional `config.yml`; `${VAR}` placeholders and plain
//! environment variables take precedence, hard defaults apply when both
//! are absent. Every feature toggle degrades gracefully, so a missing
//! config file is a fully valid state.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

pub const DEFAULT_PORT: u16 = 8080;
pub const DEFAULT_QDRANT_URL: &str = "http://localhost:6333";
pub const DEFAULT_GRAPH_INDEX_DIR: &str = "graphrag_export";
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 20;
pub const DEFAULT_LLM_MODEL: &str = "gpt-4o-mini";

/// YAML config structures
#[derive(Debug, Default, Deserialize)]
struct YamlConfig {
    server: Option<ServerSection>,
    vector_store: Option<VectorStoreSection>,
    embeddings: Option<EmbeddingsSection>,
    language_model: Option<LanguageModelSection>,
    graphrag: Option<GraphRagSection>,
    ask: Option<AskSection>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerSection {
    port: Option<String>,
    request_timeout_secs: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct VectorStoreSection {
    enabled: Option<String>,
    url: Option<String>,
    allow_destructive_reindex: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct EmbeddingsSection {
    provider: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct LanguageModelSection {
    enabled: Option<String>,
    model: Option<String>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

#[derive(Debug, Default, Deserialize)]
struct GraphRagSection {
    index_dir: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct AskSection {
    persist: Option<String>,
}

/// Main configuration struct
#[derive(Debug, Clone)]
pub struct Config {
    pub port: u16,
    pub use_vector_store: bool,
    pub qdrant_url: String,
    pub allow_destructive_reindex: bool,
    pub embedding_provider: String,
    pub use_language_model: bool,
    pub llm_model: String,
    pub llm_temperature: f32,
    pub llm_max_tokens: u32,
    pub persist_ask: bool,
    pub graph_index_dir: PathBuf,
    pub request_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

impl Config {
    /// Load configuration from config.yml or fall back to environment
    /// variables and defaults. Environment values take precedence over
    /// config.yml values.
    pub fn new() -> Self {
        Self::load_dotenv();
        let yaml = Self::read_yaml("config.yml")
            .or_else(|| Self::read_yaml("../config.yml"))
            .unwrap_or_default();
        Self::from_yaml(yaml)
    }

    /// Load configuration from a specific file; missing or malformed
    /// files fall back to environment/defaults.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Self {
        Self::load_dotenv();
        let yaml = Self::read_yaml(path).unwrap_or_default();
        Self::from_yaml(yaml)
    }

    fn read_yaml<P: AsRef<Path>>(path: P) -> Option<YamlConfig> {
        let content = fs::read_to_string(path.as_ref()).ok()?;
        serde_yaml::from_str(&content).ok()
    }

    /// Load .env file into environment variables using dotenvy
    fn load_dotenv() {
        if dotenvy::dotenv().is_err() {
            let _ = dotenvy::from_filename("../.env");
        }
    }

    fn from_yaml(yaml: YamlConfig) -> Self {
        let server = yaml.server.unwrap_or_default();
        let vector = yaml.vector_store.unwrap_or_default();
        let embeddings = yaml.embeddings.unwrap_or_default();
        let llm = yaml.language_model.unwrap_or_default();
        let graphrag = yaml.graphrag.unwrap_or_default();
        let ask = yaml.ask.unwrap_or_default();

        let timeout_secs = resolve_env_u64(
            server.request_timeout_secs,
            "REQUEST_TIMEOUT_SECS",
            DEFAULT_REQUEST_TIMEOUT_SECS,
        );

        Self {
            port: resolve_env_u64(server.port, "PORT", DEFAULT_PORT as u64) as u16,
            use_vector_store: resolve_env_bool(vector.enabled, "USE_VECTOR_STORE", false),
            qdrant_url: resolve_env_string(vector.url, "QDRANT_URL", DEFAULT_QDRANT_URL),
            allow_destructive_reindex: resolve_env_bool(
                vector.allow_destructive_reindex,
                "ALLOW_DESTRUCTIVE_REINDEX",
                false,
            ),
            embedding_provider: resolve_env_string(
                embeddings.provider,
                "EMBEDDING_PROVIDER",
                "local",
            ),
            use_language_model: resolve_env_bool(llm.enabled, "USE_LANGUAGE_MODEL", false),
            llm_model: llm.model.unwrap_or_else(|| DEFAULT_LLM_MODEL.to_string()),
            llm_temperature: llm.temperature.unwrap_or(0.8),
            llm_max_tokens: llm.max_tokens.unwrap_or(300),
            persist_ask: resolve_env_bool(ask.persist, "PERSIST_ASK", false),
            graph_index_dir: PathBuf::from(resolve_env_string(
                graphrag.index_dir,
                "GRAPH_INDEX_DIR",
                DEFAULT_GRAPH_INDEX_DIR,
            )),
            request_timeout: Duration::from_secs(timeout_secs),
        }
    }
}

/// Resolve a string value: a `${VAR}` placeholder reads that variable,
/// the explicit env key overrides a literal, defaults apply last.
fn resolve_env_string(value: Option<String>, env_key: &str, default: &str) -> String {
    if let Some(ref v) = value {
        if let Some(var_name) = placeholder_name(v) {
            if let Ok(env_val) = std::env::var(var_name) {
                return env_val;
            }
        }
    }
    if let Ok(env_val) = std::env::var(env_key) {
        if !env_val.is_empty() {
            return env_val;
        }
    }
    match value {
        Some(v) if placeholder_name(&v).is_none() && !v.is_empty() => v,
        _ => default.to_string(),
    }
}

fn resolve_env_bool(value: Option<String>, env_key: &str, default: bool) -> bool {
    let resolved = resolve_env_string(value, env_key, if default { "true" } else { "false" });
    resolved.trim().eq_ignore_ascii_case("true")
}

fn resolve_env_u64(value: Option<String>, env_key: &str, default: u64) -> u64 {
    resolve_env_string(value, env_key, "")
        .trim()
        .parse()
        .unwrap_or(default)
}

fn placeholder_name(value: &str) -> Option<&str> {
    if value.starts_with("${") && value.ends_with('}') {
        Some(&value[2..value.len() - 1])
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EnvGuard {
        key: &'static str,
        original: Option<String>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: &str) -> Self {
            let original = std::env::var(key).ok();
            std::env::set_var(key, value);
            Self { key, original }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            if let Some(value) = &self.original {
                std::env::set_var(self.key, value);
            } else {
                std::env::remove_var(self.key);
            }
        }
    }

    #[test]
    fn defaults_apply_without_file_or_env() {
        let config = Config::from_yaml(YamlConfig::default());

        assert_eq!(config.port, DEFAULT_PORT);
        assert!(!config.use_vector_store);
        assert!(!config.use_language_model);
        assert!(!config.persist_ask);
        assert!(!config.allow_destructive_reindex);
        assert_eq!(config.embedding_provider, "local");
        assert_eq!(config.qdrant_url, DEFAULT_QDRANT_URL);
        assert_eq!(config.graph_index_dir, PathBuf::from(DEFAULT_GRAPH_INDEX_DIR));
        assert_eq!(config.request_timeout, Duration::from_secs(20));
    }

    #[test]
    fn env_overrides_defaults() {
        let _guard = EnvGuard::set("HOOKGEN_TEST_DIR_A", "custom_export");

        let resolved =
            resolve_env_string(None, "HOOKGEN_TEST_DIR_A", DEFAULT_GRAPH_INDEX_DIR);
        assert_eq!(resolved, "custom_export");
    }

    #[test]
    fn placeholder_resolves_named_variable() {
        let _guard = EnvGuard::set("HOOKGEN_TEST_PLACEHOLDER", "from-env");

        let resolved = resolve_env_string(
            Some("${HOOKGEN_TEST_PLACEHOLDER}".to_string()),
            "UNSET_FALLBACK_KEY_12345",
            "default",
        );
        assert_eq!(resolved, "from-env");
    }

    #[test]
    fn unresolvable_placeholder_falls_back_to_default() {
        let resolved = resolve_env_string(
            Some("${HOOKGEN_TEST_MISSING_VAR_98765}".to_string()),
            "HOOKGEN_TEST_ALSO_MISSING_98765",
            "default",
        );
        assert_eq!(resolved, "default");
    }

    #[test]
    fn literal_yaml_value_wins_over_default() {
        let resolved = resolve_env_string(
            Some("http://qdrant.internal:6333".to_string()),
            "HOOKGEN_TEST_UNSET_KEY_4242",
            DEFAULT_QDRANT_URL,
        );
        assert_eq!(resolved, "http://qdrant.internal:6333");
    }

    #[test]
    fn bool_parsing_accepts_true_only() {
        assert!(resolve_env_bool(
            Some("true".to_string()),
            "HOOKGEN_TEST_UNSET_BOOL",
            false
        ));
        assert!(resolve_env_bool(
            Some("TRUE".to_string()),
            "HOOKGEN_TEST_UNSET_BOOL",
            false
        ));
        assert!(!resolve_env_bool(
            Some("yes".to_string()),
            "HOOKGEN_TEST_UNSET_BOOL",
            false
        ));
        assert!(!resolve_env_bool(None, "HOOKGEN_TEST_UNSET_BOOL", false));
    }

    #[test]
    fn numeric_parsing_falls_back_on_garbage() {
        assert_eq!(
            resolve_env_u64(Some("not-a-number".to_string()), "HOOKGEN_TEST_UNSET_NUM", 20),
            20
        );
        assert_eq!(
            resolve_env_u64(Some("9090".to_string()), "HOOKGEN_TEST_UNSET_NUM", 20),
            9090
        );
    }

    #[test]
    fn yaml_file_populates_config() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(
            &path,
            r#"
server:
  port: "9191"
vector_store:
  enabled: "true"
  url: "http://qdrant.test:6333"
language_model:
  enabled: "true"
  model: "gpt-4o"
  temperature: 0.5
  max_tokens: 200
graphrag:
  index_dir: "export_dir"
ask:
  persist: "true"
"#,
        )
        .unwrap();

        let config = Config::load_from_file(&path);
        assert_eq!(config.port, 9191);
        assert!(config.use_vector_store);
        assert_eq!(config.qdrant_url, "http://qdrant.test:6333");
        assert!(config.use_language_model);
        assert_eq!(config.llm_model, "gpt-4o");
        assert_eq!(config.llm_temperature, 0.5);
        assert_eq!(config.llm_max_tokens, 200);
        assert!(config.persist_ask);
        assert_eq!(config.graph_index_dir, PathBuf::from("export_dir"));
    }

    #[test]
    fn malformed_yaml_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yml");
        std::fs::write(&path, "{{{{not yaml").unwrap();

        let config = Config::load_from_file(&path);
        assert_eq!(config.port, DEFAULT_PORT);
    }
}
