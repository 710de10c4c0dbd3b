//! In-process log capture for the end-of-run digest.
//!
//! [`RecordingLayer`] sits in the tracing registry next to the stderr and
//! file layers and appends every event it sees to a shared [`Recorder`].
//! Events emitted inside an `account` span carry that span's `user` field.

pub mod digest;

use std::fmt::{self, Write as _};
use std::fs;
use std::path::Path;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::field::{Field, Visit};
use tracing::span::{Attributes, Id};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer};
use tracing_subscriber::registry::LookupSpan;

/// Digest section an event is filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Section {
    Result,
    Capacity,
    Error,
    Log,
}

impl Section {
    /// Explicit `section = "..."` field wins; otherwise warnings and errors
    /// go to [`Section::Error`] and the rest to [`Section::Log`].
    fn resolve(tag: Option<&str>, level: Level) -> Self {
        match tag {
            Some("result") => Self::Result,
            Some("capacity") => Self::Capacity,
            Some("error") => Self::Error,
            _ if level <= Level::WARN => Self::Error,
            _ => Self::Log,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub user: Option<String>,
    pub level: Level,
    pub section: Section,
    pub message: String,
}

/// Append-only, shared event buffer.
#[derive(Debug, Clone, Default)]
pub struct Recorder {
    events: Arc<Mutex<Vec<RecordedEvent>>>,
}

impl Recorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, event: RecordedEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
    }

    /// Copy of everything recorded so far, in emission order.
    pub fn replay(&self) -> Vec<RecordedEvent> {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn erase(&self) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    pub fn layer(&self) -> RecordingLayer {
        RecordingLayer {
            recorder: self.clone(),
        }
    }
}

/// Span extension holding the masked account label.
struct AccountLabel(String);

pub struct RecordingLayer {
    recorder: Recorder,
}

impl<S> Layer<S> for RecordingLayer
where
    S: Subscriber + for<'a> LookupSpan<'a>,
{
    fn on_new_span(&self, attrs: &Attributes<'_>, id: &Id, ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        attrs.record(&mut visitor);
        if let (Some(user), Some(span)) = (visitor.user, ctx.span(id)) {
            span.extensions_mut().insert(AccountLabel(user));
        }
    }

    fn on_event(&self, event: &Event<'_>, ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);
        let user = visitor.user.clone().or_else(|| {
            ctx.event_scope(event).and_then(|scope| {
                scope
                    .filter_map(|span| span.extensions().get::<AccountLabel>().map(|l| l.0.clone()))
                    .next()
            })
        });
        let level = *event.metadata().level();
        self.recorder.push(RecordedEvent {
            user,
            level,
            section: Section::resolve(visitor.section.as_deref(), level),
            message: visitor.finish(),
        });
    }
}

/// Collects the message, the routing fields and any other fields as `key=value`.
#[derive(Default)]
struct FieldVisitor {
    message: String,
    extra: String,
    user: Option<String>,
    section: Option<String>,
}

impl FieldVisitor {
    fn finish(self) -> String {
        if self.extra.is_empty() {
            self.message
        } else if self.message.is_empty() {
            self.extra
        } else {
            format!("{} {}", self.message, self.extra)
        }
    }

    fn push_extra(&mut self, name: &str, value: &dyn fmt::Display) {
        if !self.extra.is_empty() {
            self.extra.push(' ');
        }
        let _ = write!(self.extra, "{name}={value}");
    }
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "user" => self.user = Some(value.to_string()),
            "section" => self.section = Some(value.to_string()),
            name => self.push_extra(name, &value),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{value:?}"),
            "user" => self.user = Some(format!("{value:?}")),
            "section" => self.section = Some(format!("{value:?}")),
            name => self.push_extra(name, &format_args!("{value:?}")),
        }
    }
}

/// Open (append) the on-disk log mirror, creating parent directories.
///
/// # Errors
///
/// Returns an error if the directory or file cannot be created.
pub fn open_log_file(path: &Path) -> anyhow::Result<fs::File> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent)?;
    }
    fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|e| anyhow::anyhow!("could not open log file {}: {e}", path.display()))
}

/// Remove the on-disk log mirror. A missing file is not an error.
pub fn clean_log_file(path: &Path) {
    match fs::remove_file(path) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => eprintln!("[cloud189-checkin] could not remove {}: {e}", path.display()),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use tracing_subscriber::layer::SubscriberExt;

    fn capture(f: impl FnOnce()) -> Vec<RecordedEvent> {
        let recorder = Recorder::new();
        let subscriber = tracing_subscriber::registry().with(recorder.layer());
        tracing::subscriber::with_default(subscriber, f);
        recorder.replay()
    }

    #[test]
    fn records_message_level_and_section() {
        let events = capture(|| {
            tracing::info!(section = "result", "sign-in: 1/1 rewarded, bonus 50M");
            tracing::warn!("quota fetch failed");
            tracing::info!("plain line");
        });
        assert_eq!(events.len(), 3);
        assert_eq!(events[0].section, Section::Result);
        assert_eq!(events[0].message, "sign-in: 1/1 rewarded, bonus 50M");
        assert_eq!(events[1].section, Section::Error);
        assert_eq!(events[1].level, Level::WARN);
        assert_eq!(events[2].section, Section::Log);
    }

    #[test]
    fn events_inside_account_span_carry_user() {
        let events = capture(|| {
            let span = tracing::info_span!("account", user = "138****0000");
            let _entered = span.enter();
            tracing::info!("inside");
        });
        assert_eq!(events[0].user.as_deref(), Some("138****0000"));
    }

    #[test]
    fn events_outside_span_have_no_user() {
        let events = capture(|| tracing::info!("outside"));
        assert!(events[0].user.is_none());
    }

    #[test]
    fn extra_fields_are_kept() {
        let events = capture(|| tracing::info!(elapsed = 3, "done"));
        assert_eq!(events[0].message, "done elapsed=3");
    }

    #[test]
    fn erase_clears_buffer() {
        let recorder = Recorder::new();
        recorder.push(RecordedEvent {
            user: None,
            level: Level::INFO,
            section: Section::Log,
            message: "x".to_string(),
        });
        assert_eq!(recorder.replay().len(), 1);
        recorder.erase();
        assert!(recorder.replay().is_empty());
    }

    #[test]
    fn log_file_is_created_and_cleaned() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("run.log");
        open_log_file(&path).unwrap();
        assert!(path.exists());
        clean_log_file(&path);
        assert!(!path.exists());
        clean_log_file(&path);
    }
}
