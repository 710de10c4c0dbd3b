use super::{RecordedEvent, Section};

/// Progress messages that mean nothing once the run is over.
pub const MSG_STARTING: &str = "starting check-in";
pub const MSG_FETCHING_QUOTA: &str = "fetching user size info";

const NOISE_MESSAGES: &[&str] = &[MSG_STARTING, MSG_FETCHING_QUOTA];

/// Markdown hard line break; most push channels render it as a newline.
const LINE_BREAK: &str = "  \n";

const EMPTY_DIGEST: &str = "no log output";

/// Blank lines, pure separator lines and designated progress messages.
pub fn is_noise(message: &str) -> bool {
    let trimmed = message.trim();
    trimmed.is_empty()
        || trimmed.chars().all(|c| matches!(c, '=' | '-' | '_' | '*' | '~' | '.' | ' '))
        || NOISE_MESSAGES.contains(&trimmed)
}

const fn heading(section: Section) -> &'static str {
    match section {
        Section::Result => "✅ Sign-in",
        Section::Capacity => "📦 Capacity",
        Section::Error => "❌ Errors",
        Section::Log => "📝 Log",
    }
}

fn render(event: &RecordedEvent) -> String {
    match &event.user {
        Some(user) => format!("[{user}] {}", event.message),
        None => event.message.clone(),
    }
}

/// Compose the push body: noise dropped, remaining lines grouped by section
/// in emission order, empty sections omitted.
pub fn compose(events: &[RecordedEvent]) -> String {
    let sections = [
        Section::Result,
        Section::Capacity,
        Section::Error,
        Section::Log,
    ];
    let mut lines = Vec::new();
    for section in sections {
        let body: Vec<String> = events
            .iter()
            .filter(|e| e.section == section && !is_noise(&e.message))
            .map(render)
            .collect();
        if body.is_empty() {
            continue;
        }
        lines.push(heading(section).to_string());
        lines.extend(body);
    }
    if lines.is_empty() {
        return EMPTY_DIGEST.to_string();
    }
    lines.join(LINE_BREAK)
}
