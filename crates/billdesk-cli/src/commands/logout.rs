//! Logout command implementation.

use std::time::Duration;

use anyhow::Result;
use clap::Args;
use colored::Colorize;

use billdesk_session::SessionContainer;

use crate::output;

/// How long to wait for the server-side logout before exiting.
const SERVER_LOGOUT_GRACE: Duration = Duration::from_secs(5);

#[derive(Args, Debug)]
pub struct LogoutArgs {}

pub async fn run(session: &SessionContainer, _args: LogoutArgs) -> Result<()> {
    let had_session = session.store().get_user().is_some();

    if let Some(task) = session.logout() {
        if tokio::time::timeout(SERVER_LOGOUT_GRACE, task).await.is_err() {
            tracing::debug!("Server logout still pending at exit");
        }
    }

    if had_session {
        output::success("Logged out");
    } else {
        eprintln!("{}", "No active session.".dimmed());
    }

    Ok(())
}
