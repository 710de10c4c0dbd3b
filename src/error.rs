//! Typed failures for remote calls and the single classification step that
//! turns any `anyhow::Error` into something the runner can branch on.

use std::fmt;

/// Maximum number of response-body characters kept for log output.
pub const BODY_PREVIEW_CHARS: usize = 200;

/// Marker the web API puts in bodies when the session (cookie) is no longer valid.
const INVALID_SESSION_MARKER: &str = "InvalidSession";

/// Structured failure of a Cloud189 call, carried inside `anyhow::Error` so
/// callers can branch with `downcast_ref` instead of matching message text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckinError {
    /// Non-2xx reply that is not an authentication problem.
    Http { status: u16, body: String },
    /// 401, or a reply whose body reports an invalid session.
    InvalidSession { status: u16, body: String },
    /// A login was requested while running on an injected cookie.
    CookieExpired,
    /// Connection reset or request timeout.
    Connectivity(String),
}

impl fmt::Display for CheckinError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Http { status, body } => write!(f, "server returned HTTP {status}: {body}"),
            Self::InvalidSession { status, body } => {
                write!(f, "session rejected (HTTP {status}): {body}")
            }
            Self::CookieExpired => write!(
                f,
                "login requested in cookie mode: the injected cookie has expired, capture a fresh one"
            ),
            Self::Connectivity(msg) => write!(f, "network failure: {msg}"),
        }
    }
}

impl std::error::Error for CheckinError {}

/// What kind of failure an error represents, computed once by [`classify`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorKind {
    /// The server refused the session or cookie.
    InvalidSession { status: u16, body: String },
    /// The server answered with some other failure status.
    Http { status: u16, body: String },
    /// The cookie-mode login guard fired.
    CookieExpired,
    /// The network itself failed; callers re-raise this one.
    Connectivity,
    /// Anything else (decode failures, I/O, programmer errors).
    Unexpected,
}

impl ErrorKind {
    pub const fn is_connectivity(&self) -> bool {
        matches!(self, Self::Connectivity)
    }
}

/// Classify an error by walking its chain for a [`CheckinError`] or a
/// `reqwest::Error` with a network cause.
pub fn classify(err: &anyhow::Error) -> ErrorKind {
    for cause in err.chain() {
        if let Some(e) = cause.downcast_ref::<CheckinError>() {
            return match e {
                CheckinError::Http { status, body } => ErrorKind::Http {
                    status: *status,
                    body: body.clone(),
                },
                CheckinError::InvalidSession { status, body } => ErrorKind::InvalidSession {
                    status: *status,
                    body: body.clone(),
                },
                CheckinError::CookieExpired => ErrorKind::CookieExpired,
                CheckinError::Connectivity(_) => ErrorKind::Connectivity,
            };
        }
        if let Some(e) = cause.downcast_ref::<reqwest::Error>()
            && is_network_failure(e)
        {
            return ErrorKind::Connectivity;
        }
        if let Some(e) = cause.downcast_ref::<std::io::Error>()
            && is_reset(e.kind())
        {
            return ErrorKind::Connectivity;
        }
    }
    ErrorKind::Unexpected
}

fn is_network_failure(err: &reqwest::Error) -> bool {
    if err.is_timeout() {
        return true;
    }
    let mut source = std::error::Error::source(err);
    while let Some(cause) = source {
        if let Some(io) = cause.downcast_ref::<std::io::Error>()
            && is_reset(io.kind())
        {
            return true;
        }
        source = cause.source();
    }
    false
}

const fn is_reset(kind: std::io::ErrorKind) -> bool {
    matches!(
        kind,
        std::io::ErrorKind::ConnectionReset
            | std::io::ErrorKind::ConnectionAborted
            | std::io::ErrorKind::TimedOut
    )
}

/// Build the typed error for a failed reply: 401 or an `InvalidSession`
/// body becomes [`CheckinError::InvalidSession`], everything else `Http`.
pub fn from_reply(status: u16, body: &str) -> CheckinError {
    let invalid = status == 401 || body_reports_invalid_session(body);
    let body = preview(body);
    if invalid {
        CheckinError::InvalidSession { status, body }
    } else {
        CheckinError::Http { status, body }
    }
}

/// Returns `true` if a 2xx body still reports an invalid session.
pub fn body_reports_invalid_session(body: &str) -> bool {
    body.contains(INVALID_SESSION_MARKER)
}

/// Truncate to [`BODY_PREVIEW_CHARS`] characters and strip control characters.
pub fn preview(text: &str) -> String {
    let mut out: String = text
        .chars()
        .filter(|c| !c.is_control())
        .take(BODY_PREVIEW_CHARS)
        .collect();
    if text.chars().filter(|c| !c.is_control()).count() > BODY_PREVIEW_CHARS {
        out.push_str("...");
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn unauthorized_reply_is_invalid_session() {
        let err = from_reply(401, "nope");
        assert!(matches!(err, CheckinError::InvalidSession { status: 401, .. }));
    }

    #[test]
    fn invalid_session_body_is_classified_regardless_of_status() {
        let err = from_reply(400, r#"{"errorCode":"InvalidSessionKey"}"#);
        assert!(matches!(err, CheckinError::InvalidSession { status: 400, .. }));
    }

    #[test]
    fn other_status_is_plain_http() {
        let err = from_reply(500, "boom");
        assert_eq!(
            err,
            CheckinError::Http {
                status: 500,
                body: "boom".to_string()
            }
        );
    }

    #[test]
    fn classify_sees_through_context() {
        let err = anyhow::Error::new(from_reply(401, "x")).context("fetching quota");
        assert!(matches!(
            classify(&err),
            ErrorKind::InvalidSession { status: 401, .. }
        ));
    }

    #[test]
    fn classify_reset_io_error_as_connectivity() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = anyhow::Error::new(io);
        assert!(classify(&err).is_connectivity());
    }

    #[test]
    fn refused_connection_is_not_connectivity() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionRefused, "refused");
        let err = anyhow::Error::new(io);
        assert_eq!(classify(&err), ErrorKind::Unexpected);
    }

    #[test]
    fn classify_plain_error_as_unexpected() {
        let err = anyhow::anyhow!("decode failure");
        assert_eq!(classify(&err), ErrorKind::Unexpected);
    }

    #[test]
    fn classify_cookie_guard() {
        let err = anyhow::Error::new(CheckinError::CookieExpired);
        assert_eq!(classify(&err), ErrorKind::CookieExpired);
    }

    #[test]
    fn preview_truncates_and_strips_control_chars() {
        let long = "x".repeat(300);
        let out = preview(&long);
        assert_eq!(out.len(), BODY_PREVIEW_CHARS + 3);
        assert_eq!(preview("a\x00b\nc"), "abc");
    }
}
