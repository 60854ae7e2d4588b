//! Configuration management
//!
//! All settings are read from the environment; there is no configuration
//! file. Invalid values log a warning and fall back to the documented
//! default instead of failing startup.

use std::{env, path::PathBuf, time::Duration};

use tracing::warn;

/// Main configuration
#[derive(Debug, Clone, Default)]
pub struct Config {
    /// Server configuration
    pub server: ServerConfig,
    /// Session handling configuration
    pub session: SessionConfig,
    /// LLM provider configuration
    pub provider: ProviderConfig,
    /// Response polling configuration
    pub poll: PollConfig,
    /// Chat orchestration configuration
    pub chat: ChatConfig,
    /// Think-tool client configuration
    pub think: ThinkConfig,
    /// LangSmith tracing configuration
    pub langsmith: LangSmithConfig,
}

impl Config {
    /// Load configuration from the environment
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_or_default("PORT", env_var("PORT"), 8000),
                files_base_dir: env::var("MCP_FILES_BASE_DIR")
                    .map_or_else(|_| PathBuf::from("/app"), PathBuf::from),
            },
            session: SessionConfig {
                require_session: bool_flag(env_var("MCP_REQUIRE_SESSION").as_deref(), true),
            },
            provider: ProviderConfig {
                api_key: env::var("OPENAI_API_KEY").ok().filter(|v| !v.is_empty()),
                base_url: env::var("OPENAI_BASE_URL")
                    .unwrap_or_else(|_| "https://api.openai.com/v1".to_string()),
            },
            poll: PollConfig {
                delay: Duration::from_secs(parse_or_default("POLL_DELAY", env_var("POLL_DELAY"), 2)),
                max_polls: parse_or_default("MAX_POLLS", env_var("MAX_POLLS"), 30),
                max_concurrency: parse_or_default(
                    "RESPONSES_POLL_MAX_CONCURRENCY",
                    env_var("RESPONSES_POLL_MAX_CONCURRENCY"),
                    8,
                )
                .max(1),
            },
            chat: ChatConfig {
                max_turns: parse_or_default("MAX_TURNS", env_var("MAX_TURNS"), 15).max(1),
            },
            think: ThinkConfig {
                enabled: bool_flag(env_var("THINK_TOOL_ENABLED").as_deref(), false),
                url: env::var("THINK_TOOL_URL")
                    .ok()
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty()),
                timeout: Duration::from_millis(parse_or_default(
                    "THINK_TOOL_TIMEOUT_MS",
                    env_var("THINK_TOOL_TIMEOUT_MS"),
                    2000,
                )),
                retry_limit: parse_or_default(
                    "THINK_TOOL_RETRY_LIMIT",
                    env_var("THINK_TOOL_RETRY_LIMIT"),
                    0,
                ),
            },
            langsmith: LangSmithConfig {
                enabled: bool_flag(env_var("LANGSMITH_TRACING").as_deref(), false),
                project: env::var("LANGSMITH_PROJECT")
                    .ok()
                    .map(|v| v.trim().to_string())
                    .filter(|v| !v.is_empty()),
                api_key: env::var("LANGSMITH_API_KEY").ok().filter(|v| !v.is_empty()),
                endpoint: env::var("LANGSMITH_ENDPOINT")
                    .unwrap_or_else(|_| "https://api.smith.langchain.com".to_string()),
            },
        }
    }
}

/// Server configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Base directory the `read_file` tool is sandboxed to
    pub files_base_dir: PathBuf,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8000,
            files_base_dir: PathBuf::from("/app"),
        }
    }
}

/// Session handling configuration
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Reject `tools/call` without a known session id (strict mode)
    pub require_session: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            require_session: true,
        }
    }
}

/// LLM provider configuration
#[derive(Debug, Clone, Default)]
pub struct ProviderConfig {
    /// API key; the provider adapter fails lazily when missing
    pub api_key: Option<String>,
    /// Base URL of the Responses-compatible API
    pub base_url: String,
}

/// Response polling configuration
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between poll retrievals
    pub delay: Duration,
    /// Maximum retrievals per response id
    pub max_polls: u32,
    /// Process-wide cap on simultaneous retrievals
    pub max_concurrency: usize,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            delay: Duration::from_secs(2),
            max_polls: 30,
            max_concurrency: 8,
        }
    }
}

/// Chat orchestration configuration
#[derive(Debug, Clone)]
pub struct ChatConfig {
    /// Maximum provider turns per chat invocation
    pub max_turns: u32,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self { max_turns: 15 }
    }
}

/// Think-tool client configuration
#[derive(Debug, Clone)]
pub struct ThinkConfig {
    /// Whether the think tool is enabled
    pub enabled: bool,
    /// URL of the upstream think MCP server
    pub url: Option<String>,
    /// Per-call timeout
    pub timeout: Duration,
    /// Transport retry attempts beyond the first
    pub retry_limit: u32,
}

impl Default for ThinkConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: None,
            timeout: Duration::from_millis(2000),
            retry_limit: 0,
        }
    }
}

/// LangSmith tracing configuration
#[derive(Debug, Clone)]
pub struct LangSmithConfig {
    /// Trace every chat invocation regardless of request metadata
    pub enabled: bool,
    /// Default project name
    pub project: Option<String>,
    /// API key for the tracing backend
    pub api_key: Option<String>,
    /// Tracing backend endpoint
    pub endpoint: String,
}

impl Default for LangSmithConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            project: None,
            api_key: None,
            endpoint: "https://api.smith.langchain.com".to_string(),
        }
    }
}

fn env_var(name: &str) -> Option<String> {
    env::var(name).ok()
}

/// Interpret common truthy spellings; anything else is false.
fn bool_flag(value: Option<&str>, default: bool) -> bool {
    match value {
        Some(v) => matches!(
            v.trim().to_ascii_lowercase().as_str(),
            "1" | "true" | "yes" | "y" | "on"
        ),
        None => default,
    }
}

/// Parse a numeric env value, warning and falling back on garbage.
fn parse_or_default<T>(name: &str, value: Option<String>, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    match value {
        Some(raw) => match raw.trim().parse() {
            Ok(v) => v,
            Err(_) => {
                warn!(var = name, value = %raw, "Invalid numeric value, using default");
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── bool_flag ─────────────────────────────────────────────────────

    #[test]
    fn bool_flag_accepts_truthy_spellings() {
        for v in ["1", "true", "yes", "y", "on", "TRUE", " On "] {
            assert!(bool_flag(Some(v), false), "{v} should be truthy");
        }
    }

    #[test]
    fn bool_flag_rejects_other_values() {
        for v in ["0", "false", "no", "off", "", "maybe"] {
            assert!(!bool_flag(Some(v), true), "{v} should be falsy");
        }
    }

    #[test]
    fn bool_flag_uses_default_when_unset() {
        assert!(bool_flag(None, true));
        assert!(!bool_flag(None, false));
    }

    // ── parse_or_default ──────────────────────────────────────────────

    #[test]
    fn parse_or_default_parses_valid_numbers() {
        assert_eq!(parse_or_default("X", Some("42".to_string()), 7u32), 42);
        assert_eq!(parse_or_default("X", Some(" 42 ".to_string()), 7u32), 42);
    }

    #[test]
    fn parse_or_default_falls_back_on_garbage() {
        assert_eq!(parse_or_default("X", Some("abc".to_string()), 7u32), 7);
        assert_eq!(parse_or_default("X", None, 7u32), 7);
    }

    // ── defaults ──────────────────────────────────────────────────────

    #[test]
    fn default_config_matches_documented_values() {
        let config = Config::default();
        assert_eq!(config.chat.max_turns, 15);
        assert_eq!(config.poll.max_concurrency, 8);
        assert_eq!(config.poll.max_polls, 30);
        assert_eq!(config.poll.delay, Duration::from_secs(2));
        assert!(config.session.require_session);
        assert!(!config.think.enabled);
        assert!(!config.langsmith.enabled);
    }
}
