use std::path::PathBuf;

pub const DEFAULT_BASE_URL: &str = "https://cloud.189.cn";
const DEFAULT_ACCOUNTS_FILE: &str = "accounts.toml";
const DEFAULT_TOKEN_DIR: &str = ".token";
const DEFAULT_LOG_FILE: &str = ".logs/checkin.log";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

pub struct Config {
    /// Number of sign-in calls issued per account (`EXEC_THRESHOLD`).
    pub exec_threshold: usize,
    pub verbose: bool,
    pub accounts_file: PathBuf,
    pub token_dir: PathBuf,
    pub log_file: PathBuf,
    pub base_url: String,
    pub timeout_secs: u64,
    pub push: PushConfig,
}

/// Credentials for the push channels; every channel is optional.
#[derive(Default, Clone)]
pub struct PushConfig {
    pub serverchan_sendkey: Option<String>,
    pub telegram_bot_token: Option<String>,
    pub telegram_chat_id: Option<String>,
    pub wecom_bot_key: Option<String>,
    pub pushplus_token: Option<String>,
}

// Custom Debug masks secrets so the struct is safe to log.
impl std::fmt::Debug for PushConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PushConfig")
            .field("serverchan_sendkey", &redact(self.serverchan_sendkey.as_ref()))
            .field("telegram_bot_token", &redact(self.telegram_bot_token.as_ref()))
            .field("telegram_chat_id", &self.telegram_chat_id)
            .field("wecom_bot_key", &redact(self.wecom_bot_key.as_ref()))
            .field("pushplus_token", &redact(self.pushplus_token.as_ref()))
            .finish()
    }
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("exec_threshold", &self.exec_threshold)
            .field("verbose", &self.verbose)
            .field("accounts_file", &self.accounts_file)
            .field("token_dir", &self.token_dir)
            .field("log_file", &self.log_file)
            .field("base_url", &self.base_url)
            .field("timeout_secs", &self.timeout_secs)
            .field("push", &self.push)
            .finish()
    }
}

fn redact(secret: Option<&String>) -> Option<&'static str> {
    secret.map(|_| "<redacted>")
}

/// Read an env var, treating empty or whitespace-only values as unset.
fn var(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn path_var(name: &str, default: &str) -> PathBuf {
    var(name).map_or_else(|| PathBuf::from(default), PathBuf::from)
}

impl Config {
    pub fn from_env() -> Self {
        let exec_threshold = var("EXEC_THRESHOLD").map_or(1, |s| match s.parse::<usize>() {
            Ok(0) | Err(_) => {
                tracing::warn!("EXEC_THRESHOLD {s:?} is not a positive integer, defaulting to 1");
                1
            }
            Ok(n) => n,
        });
        let timeout_secs = var("CLOUD189_TIMEOUT_SECS").map_or(DEFAULT_TIMEOUT_SECS, |s| {
            s.parse::<u64>().unwrap_or_else(|_| {
                tracing::warn!(
                    "CLOUD189_TIMEOUT_SECS {s:?} is not a number, defaulting to {DEFAULT_TIMEOUT_SECS}"
                );
                DEFAULT_TIMEOUT_SECS
            })
        });
        Self {
            exec_threshold,
            verbose: var("CLOUD189_VERBOSE").is_some_and(|v| v == "1"),
            accounts_file: path_var("CLOUD189_ACCOUNTS", DEFAULT_ACCOUNTS_FILE),
            token_dir: path_var("CLOUD189_TOKEN_DIR", DEFAULT_TOKEN_DIR),
            log_file: path_var("CLOUD189_LOG_FILE", DEFAULT_LOG_FILE),
            base_url: var("CLOUD189_BASE_URL")
                .map_or_else(|| DEFAULT_BASE_URL.to_string(), |u| u.trim_end_matches('/').to_string()),
            timeout_secs,
            push: PushConfig::from_env(),
        }
    }
}

impl PushConfig {
    pub fn from_env() -> Self {
        Self {
            serverchan_sendkey: var("SENDKEY"),
            telegram_bot_token: var("TELEGRAM_BOT_TOKEN"),
            telegram_chat_id: var("TELEGRAM_CHAT_ID"),
            wecom_bot_key: var("WECOM_BOT_KEY"),
            pushplus_token: var("PUSHPLUS_TOKEN"),
        }
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;
    use serial_test::serial;

    const VARS: &[&str] = &[
        "EXEC_THRESHOLD",
        "CLOUD189_VERBOSE",
        "CLOUD189_ACCOUNTS",
        "CLOUD189_TOKEN_DIR",
        "CLOUD189_LOG_FILE",
        "CLOUD189_BASE_URL",
        "CLOUD189_TIMEOUT_SECS",
        "SENDKEY",
        "TELEGRAM_BOT_TOKEN",
        "TELEGRAM_CHAT_ID",
        "WECOM_BOT_KEY",
        "PUSHPLUS_TOKEN",
    ];

    fn clear_env() {
        for name in VARS {
            // SAFETY: tests touching the environment are #[serial]
            unsafe { std::env::remove_var(name) };
        }
    }

    #[test]
    #[serial]
    fn defaults_when_env_is_empty() {
        clear_env();
        let cfg = Config::from_env();
        assert_eq!(cfg.exec_threshold, 1);
        assert!(!cfg.verbose);
        assert_eq!(cfg.accounts_file, PathBuf::from("accounts.toml"));
        assert_eq!(cfg.token_dir, PathBuf::from(".token"));
        assert_eq!(cfg.base_url, DEFAULT_BASE_URL);
        assert_eq!(cfg.timeout_secs, 30);
        assert!(cfg.push.serverchan_sendkey.is_none());
    }

    #[test]
    #[serial]
    fn reads_threshold_and_verbosity() {
        clear_env();
        // SAFETY: serialized by #[serial]
        unsafe {
            std::env::set_var("EXEC_THRESHOLD", "5");
            std::env::set_var("CLOUD189_VERBOSE", "1");
        }
        let cfg = Config::from_env();
        clear_env();
        assert_eq!(cfg.exec_threshold, 5);
        assert!(cfg.verbose);
    }

    #[test]
    #[serial]
    fn invalid_threshold_falls_back_to_one() {
        clear_env();
        // SAFETY: serialized by #[serial]
        unsafe { std::env::set_var("EXEC_THRESHOLD", "zero") };
        assert_eq!(Config::from_env().exec_threshold, 1);
        // SAFETY: serialized by #[serial]
        unsafe { std::env::set_var("EXEC_THRESHOLD", "0") };
        assert_eq!(Config::from_env().exec_threshold, 1);
        clear_env();
    }

    #[test]
    #[serial]
    fn base_url_trailing_slash_is_trimmed() {
        clear_env();
        // SAFETY: serialized by #[serial]
        unsafe { std::env::set_var("CLOUD189_BASE_URL", "http://127.0.0.1:9000/") };
        let cfg = Config::from_env();
        clear_env();
        assert_eq!(cfg.base_url, "http://127.0.0.1:9000");
    }

    #[test]
    #[serial]
    fn blank_push_values_are_unset() {
        clear_env();
        // SAFETY: serialized by #[serial]
        unsafe { std::env::set_var("SENDKEY", "   ") };
        let cfg = Config::from_env();
        clear_env();
        assert!(cfg.push.serverchan_sendkey.is_none());
    }

    #[test]
    fn debug_masks_secrets() {
        let push = PushConfig {
            serverchan_sendkey: Some("SCT-secret".to_string()),
            telegram_bot_token: Some("123:bot-secret".to_string()),
            telegram_chat_id: Some("42".to_string()),
            wecom_bot_key: None,
            pushplus_token: Some("pp-secret".to_string()),
        };
        let debug = format!("{push:?}");
        assert!(!debug.contains("SCT-secret"));
        assert!(!debug.contains("bot-secret"));
        assert!(!debug.contains("pp-secret"));
        assert!(debug.contains("<redacted>"));
        assert!(debug.contains("42"));
    }
}
