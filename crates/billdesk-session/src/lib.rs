//! billdesk-session - Session state and route access control.
//!
//! [`SessionContainer`] owns the reactive session state: who is signed in,
//! whether the session is still being restored, and where the user was
//! heading before being sent to the login page. The guards in [`guard`]
//! turn that state into render/redirect/loading decisions, and
//! [`Navigator`] follows those decisions across the application's routes.
//!
//! # Example
//!
//! ```no_run
//! use billdesk_core::{ApiUrl, Credentials, SessionStore};
//! use billdesk_http::{ClientConfig, ResilientClient};
//! use billdesk_session::{Navigator, RouteTable, SessionConfig, SessionContainer};
//!
//! # async fn example() -> Result<(), billdesk_core::Error> {
//! let store = SessionStore::in_memory();
//! let config = ClientConfig::new(ApiUrl::new("https://billing.example.com/api")?);
//! let client = ResilientClient::new(config, store.clone())?;
//! let session = SessionContainer::new(client, store, SessionConfig::default());
//!
//! session.check_session_validity().await;
//! let navigator = Navigator::new(session.clone(), RouteTable::billing_default());
//!
//! // Not signed in yet: bounced to /login, "/clients" remembered.
//! let nav = navigator.navigate("/clients")?;
//! assert_eq!(nav.location.path, "/login");
//!
//! session.login(Credentials::new("ada@example.com", "hunter2")).await?;
//! let nav = navigator.navigate("/login")?;
//! assert_eq!(nav.location.path, "/clients");
//! # Ok(())
//! # }
//! ```

mod container;
pub mod guard;
mod location;
mod routes;
mod state;

pub use container::{SessionConfig, SessionContainer};
pub use guard::{
    DestinationEffect, GuardDecision, GuardOutcome, PrivateGuard, PublicGuard, PublicPaths,
};
pub use location::Location;
pub use routes::{Navigation, NavigationState, Navigator, Route, RouteAccess, RouteTable};
pub use state::{SessionState, SessionStatus};
