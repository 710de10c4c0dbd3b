use std::fmt;
use std::fs;
use std::path::Path;

use serde::Deserialize;

/// One configured Cloud189 account.
#[derive(Clone, Default, Deserialize)]
pub struct Account {
    #[serde(alias = "userName")]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub cookie: Option<String>,
}

// Manual Debug impl to redact the password and cookie
impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("username", &mask(&self.username, 3, 7))
            .field(
                "password",
                &(!self.password.is_empty()).then_some("<redacted>"),
            )
            .field("cookie", &self.cookie.as_deref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Account {
    /// The injected cookie, if one is configured and non-blank.
    pub fn cookie(&self) -> Option<&str> {
        self.cookie.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }

    /// An account runs only with both a username and a password. A cookie
    /// picks the session strategy but never stands in for the password.
    pub fn has_credentials(&self) -> bool {
        !self.username.trim().is_empty() && !self.password.is_empty()
    }

    /// Username with the middle digits hidden, for log lines and digests.
    pub fn label(&self) -> String {
        mask(&self.username, 3, 7)
    }
}

#[derive(Deserialize)]
struct AccountFile {
    #[serde(default)]
    accounts: Vec<Account>,
}

/// Load the account list from a `.toml` (`[[accounts]]` tables) or `.json`
/// (a bare array or `{"accounts": [...]}`) file.
///
/// # Errors
///
/// Returns an error if the file cannot be read or parsed.
pub fn load(path: &Path) -> anyhow::Result<Vec<Account>> {
    let content = fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("could not read account file {}: {e}", path.display()))?;
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        parse_json(&content)
    } else {
        let file: AccountFile = toml::from_str(&content)
            .map_err(|e| anyhow::anyhow!("invalid account file {}: {e}", path.display()))?;
        Ok(file.accounts)
    }
}

fn parse_json(content: &str) -> anyhow::Result<Vec<Account>> {
    if let Ok(list) = serde_json::from_str::<Vec<Account>>(content) {
        return Ok(list);
    }
    let file: AccountFile = serde_json::from_str(content)
        .map_err(|e| anyhow::anyhow!("invalid account JSON: {e}"))?;
    Ok(file.accounts)
}

/// Replace the characters in `start..end` (by char index) with `*`.
///
/// Strings shorter than `end` have everything from `start` masked.
pub fn mask(s: &str, start: usize, end: usize) -> String {
    s.chars()
        .enumerate()
        .map(|(i, c)| if i >= start && i < end { '*' } else { c })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn account(username: &str, password: &str, cookie: Option<&str>) -> Account {
        Account {
            username: username.to_string(),
            password: password.to_string(),
            cookie: cookie.map(str::to_string),
        }
    }

    #[test]
    fn mask_hides_middle_digits() {
        assert_eq!(mask("13812345678", 3, 7), "138****5678");
    }

    #[test]
    fn mask_short_string() {
        assert_eq!(mask("abcd", 3, 7), "abc*");
        assert_eq!(mask("", 3, 7), "");
    }

    #[test]
    fn credentials_require_username_and_password() {
        assert!(account("u", "p", None).has_credentials());
        assert!(account("u", "p", Some("SSON=1")).has_credentials());
        assert!(!account("u", "", Some("SSON=1")).has_credentials());
        assert!(!account("u", "", None).has_credentials());
        assert!(!account("u", "", Some("   ")).has_credentials());
        assert!(!account("", "p", Some("SSON=1")).has_credentials());
    }

    #[test]
    fn debug_redacts_secrets() {
        let debug = format!("{:?}", account("13812345678", "hunter2", Some("SSON=abc")));
        assert!(!debug.contains("hunter2"));
        assert!(!debug.contains("SSON=abc"));
        assert!(!debug.contains("13812345678"));
        assert!(debug.contains("138****5678"));
    }

    #[test]
    fn loads_toml_accounts() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.toml");
        fs::write(
            &path,
            r#"
[[accounts]]
username = "13800000000"
password = "pw"

[[accounts]]
username = "13900000000"
cookie = "COOKIE_LOGIN_USER=abc"
"#,
        )
        .unwrap();
        let accounts = load(&path).unwrap();
        assert_eq!(accounts.len(), 2);
        assert_eq!(accounts[0].password, "pw");
        assert!(accounts[0].cookie().is_none());
        assert_eq!(accounts[1].cookie(), Some("COOKIE_LOGIN_USER=abc"));
    }

    #[test]
    fn loads_json_array_with_camel_case_username() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("accounts.json");
        fs::write(&path, r#"[{"userName": "a", "password": "b"}]"#).unwrap();
        let accounts = load(&path).unwrap();
        assert_eq!(accounts[0].username, "a");
    }

    #[test]
    fn loads_json_object_form() {
        let accounts = parse_json(r#"{"accounts": [{"username": "a", "cookie": "c=1"}]}"#).unwrap();
        assert_eq!(accounts[0].cookie(), Some("c=1"));
    }

    #[test]
    fn missing_file_is_an_error() {
        let err = load(Path::new("/nonexistent/accounts.toml")).unwrap_err();
        assert!(err.to_string().contains("could not read account file"));
    }
}
