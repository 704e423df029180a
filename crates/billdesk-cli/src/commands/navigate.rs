//! Navigate command implementation.

use anyhow::{Context, Result};
use clap::Args;
use serde_json::json;

use billdesk_session::{NavigationState, Navigator, RouteTable, SessionContainer};

use crate::output;

#[derive(Args, Debug)]
pub struct NavigateArgs {
    /// Page to open, e.g. /invoices?status=overdue
    pub path: String,

    /// Print the result as one JSON object
    #[arg(long)]
    pub json: bool,
}

pub async fn run(session: &SessionContainer, args: NavigateArgs) -> Result<()> {
    // Restore the stored session the way the app does on startup.
    session.check_session_validity().await;

    let navigator = Navigator::new(session.clone(), RouteTable::billing_default());
    let nav = navigator
        .navigate(&args.path)
        .with_context(|| format!("Failed to navigate to {}", args.path))?;

    let state = match nav.state {
        NavigationState::Rendered => "rendered",
        NavigationState::Loading => "loading",
    };

    if args.json {
        return output::json(&json!({
            "location": nav.location.full_path(),
            "state": state,
            "redirects": nav.redirects,
        }));
    }

    for target in &nav.redirects {
        output::redirect(target);
    }
    output::field("Location", &nav.location.full_path());
    output::field("State", state);

    Ok(())
}
