//! CLI argument definitions.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::commands::{check, login, logout, navigate, request, whoami};

/// Command-line client for the billdesk billing API.
#[derive(Parser, Debug)]
#[command(name = "billdesk")]
#[command(author, version = env!("BILLDESK_VERSION"), about, long_about = None)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Options shared by every subcommand.
#[derive(Args, Debug, Clone)]
pub struct GlobalArgs {
    /// Base URL of the billing API
    #[arg(
        long,
        env = "BILLDESK_API_URL",
        default_value = "http://localhost:8080/api",
        global = true
    )]
    pub api_url: String,

    /// Service key sent as x-api-key
    #[arg(long, env = "BILLDESK_API_KEY", hide_env_values = true, global = true)]
    pub api_key: Option<String>,

    /// Session file (defaults to the platform data directory)
    #[arg(long, env = "BILLDESK_SESSION_FILE", global = true)]
    pub session_file: Option<PathBuf>,

    /// Per-request timeout in seconds
    #[arg(long, default_value_t = 10, global = true)]
    pub timeout: u64,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Output logs as JSON
    #[arg(long, global = true)]
    pub json_logs: bool,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign in and store the session
    Login(login::LoginArgs),

    /// Sign out and clear the stored session
    Logout(logout::LogoutArgs),

    /// Display the stored user
    Whoami(whoami::WhoamiArgs),

    /// Validate the stored session against the API
    Check(check::CheckArgs),

    /// Send an authenticated request
    Request(request::RequestArgs),

    /// Resolve a page through the route guards
    Navigate(navigate::NavigateArgs),
}
