//! Login command implementation.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use billdesk_core::Credentials;
use billdesk_session::SessionContainer;

use crate::output;

#[derive(Args, Debug)]
pub struct LoginArgs {
    /// Account email
    #[arg(long)]
    pub email: String,

    /// Account password
    #[arg(long, env = "BILLDESK_PASSWORD", hide_env_values = true)]
    pub password: String,
}

pub async fn run(session: &SessionContainer, args: LoginArgs) -> Result<()> {
    let credentials = Credentials::new(&args.email, &args.password);

    eprintln!("{}", "Logging in...".dimmed());

    session
        .login(credentials)
        .await
        .context("Failed to login")?;

    output::success("Logged in successfully");
    println!();
    if let Some(user) = session.state().user() {
        output::field("User", &user.email);
        if !user.name.is_empty() {
            output::field("Name", &user.name);
        }
    }

    Ok(())
}
