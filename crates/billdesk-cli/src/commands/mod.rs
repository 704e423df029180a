//! Subcommand implementations.

pub mod check;
pub mod login;
pub mod logout;
pub mod navigate;
pub mod request;
pub mod whoami;

use anyhow::Result;

use crate::cli::{Cli, Commands};
use crate::context;

pub async fn handle(cli: Cli) -> Result<()> {
    let session = context::session(&cli.global)?;

    match cli.command {
        Commands::Login(args) => login::run(&session, args).await,
        Commands::Logout(args) => logout::run(&session, args).await,
        Commands::Whoami(args) => whoami::run(&session, args),
        Commands::Check(args) => check::run(&session, args).await,
        Commands::Request(args) => request::run(&session, args).await,
        Commands::Navigate(args) => navigate::run(&session, args).await,
    }
}
