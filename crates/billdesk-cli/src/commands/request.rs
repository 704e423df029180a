//! Request command implementation.

use anyhow::{Context, Result, bail};
use clap::Args;
use colored::Colorize;

use billdesk_http::{Method, RequestOptions};
use billdesk_session::SessionContainer;

use crate::output;

#[derive(Args, Debug)]
pub struct RequestArgs {
    /// HTTP method
    pub method: String,

    /// Path relative to the API URL, e.g. /invoices
    pub path: String,

    /// JSON request body
    #[arg(long)]
    pub data: Option<String>,

    /// Extra header as NAME:VALUE, may be repeated
    #[arg(short = 'H', long = "header", value_name = "NAME:VALUE")]
    pub headers: Vec<String>,

    /// Do not retry network failures or server errors
    #[arg(long)]
    pub no_retry: bool,

    /// Print the response body as received
    #[arg(long)]
    pub raw: bool,
}

pub async fn run(session: &SessionContainer, args: RequestArgs) -> Result<()> {
    let method = Method::from_bytes(args.method.to_uppercase().as_bytes())
        .with_context(|| format!("Invalid HTTP method: {}", args.method))?;

    let body = args
        .data
        .as_deref()
        .map(serde_json::from_str::<serde_json::Value>)
        .transpose()
        .context("Invalid JSON in --data")?;

    let mut options = RequestOptions::new();
    if args.no_retry {
        options = options.skip_retry();
    }
    for raw in &args.headers {
        let (name, value) = parse_header(raw)?;
        options = options.with_header(name, value);
    }

    let response = session
        .client()
        .request(method.clone(), &args.path, body, options)
        .await
        .with_context(|| format!("{} {} failed", method, args.path))?;

    eprintln!("{}", response.status().to_string().dimmed());

    if response.body().is_empty() {
        return Ok(());
    }
    match response.json::<serde_json::Value>() {
        Ok(value) if !args.raw => output::json_pretty(&value),
        _ => {
            println!("{}", String::from_utf8_lossy(response.body()));
            Ok(())
        }
    }
}

fn parse_header(raw: &str) -> Result<(&str, &str)> {
    match raw.split_once(':') {
        Some((name, value)) if !name.trim().is_empty() => Ok((name.trim(), value.trim())),
        _ => bail!("Invalid header '{}', expected NAME:VALUE", raw),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_pairs() {
        assert_eq!(parse_header("X-Request-Id: 42").unwrap(), ("X-Request-Id", "42"));
        assert_eq!(parse_header("Accept:application/json").unwrap(), ("Accept", "application/json"));
        assert!(parse_header("no-separator").is_err());
        assert!(parse_header(": empty-name").is_err());
    }
}
