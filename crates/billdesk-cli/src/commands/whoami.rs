//! Whoami command implementation.

use anyhow::{Context, Result};
use clap::Args;

use billdesk_session::SessionContainer;

use crate::output;

#[derive(Args, Debug)]
pub struct WhoamiArgs {
    /// Print the stored user as JSON
    #[arg(long)]
    pub json: bool,
}

pub fn run(session: &SessionContainer, args: WhoamiArgs) -> Result<()> {
    let user = session
        .store()
        .get_user()
        .context("No active session. Run 'billdesk login' first.")?;

    if args.json {
        return output::json_pretty(&user);
    }

    output::field("User", &user.email);
    output::field("ID", &user.id);
    if !user.name.is_empty() {
        output::field("Name", &user.name);
    }
    if let Some(role) = &user.role {
        output::field("Role", role);
    }
    if let Some(destination) = session.intended_destination() {
        output::field("Return to", &destination);
    }

    Ok(())
}
