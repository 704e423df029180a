//! billdesk-http - Resilient HTTP client for the billing API.
//!
//! [`ResilientClient`] attaches credentials to every call, retries transient
//! failures once, and recovers from expired access tokens with a
//! single-flight refresh: concurrent requests that hit a 401 while a refresh
//! is running are queued and replayed in order once new tokens arrive.

mod client;
mod config;
pub mod endpoints;
mod refresh;
mod request;

pub use client::ResilientClient;
pub use config::ClientConfig;
pub use request::{ApiResponse, RequestOptions};

pub use reqwest::{Method, StatusCode};
