//! Check command implementation.

use anyhow::{Result, bail};
use clap::Args;

use billdesk_session::SessionContainer;

use crate::output;

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// Print the resulting session state as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run(session: &SessionContainer, args: CheckArgs) -> Result<()> {
    let valid = session.check_session_validity().await;
    let state = session.state();

    if args.json {
        output::json_pretty(&state)?;
    } else {
        output::status(state.status());
        if let Some(user) = state.user() {
            output::field("User", &user.email);
        }
        if let Some(error) = state.error() {
            output::error(error);
        }
    }

    if !valid {
        bail!("No valid session. Run 'billdesk login' first.");
    }
    Ok(())
}
