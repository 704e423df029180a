//! Output formatting helpers.

use anyhow::Result;
use colored::Colorize;
use serde::Serialize;

use billdesk_session::SessionStatus;

/// Print a success message.
pub fn success(msg: &str) {
    println!("{} {}", "✓".green(), msg);
}

/// Print an error message.
pub fn error(msg: &str) {
    eprintln!("{} {}", "✗".red(), msg);
}

/// Print a labeled field.
pub fn field(label: &str, value: &str) {
    println!("{}: {}", label.dimmed(), value);
}

/// Print one hop of a redirect chain.
pub fn redirect(target: &str) {
    println!("{} {}", "→".yellow(), target);
}

/// Print a session status, colored by outcome.
pub fn status(status: SessionStatus) {
    let text = status.as_str();
    let colored = match status {
        SessionStatus::Authenticated => text.green(),
        SessionStatus::Error => text.red(),
        SessionStatus::Initializing | SessionStatus::Authenticating => text.yellow(),
        SessionStatus::Unauthenticated => text.normal(),
    };
    field("Status", &colored.to_string());
}

/// Print a value as compact JSON.
pub fn json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string(value)?;
    println!("{}", json);
    Ok(())
}

/// Print a value as pretty-printed JSON.
pub fn json_pretty<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{}", json);
    Ok(())
}
