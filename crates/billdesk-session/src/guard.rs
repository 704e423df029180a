//! Route access guards.
//!
//! Guards are pure functions of the session state. [`PublicGuard::decide`]
//! and [`PrivateGuard::decide`] return a [`GuardDecision`]: what to show,
//! plus an optional change to the stored intended destination. The
//! `evaluate` variants read the state from a [`SessionContainer`] and apply
//! that change. Performing the navigation is left to the caller.

use tracing::debug;

use crate::container::SessionContainer;
use crate::location::{Location, normalized_path};
use crate::state::SessionState;

/// Landing page for signed-in users.
pub const DEFAULT_AUTHENTICATED_REDIRECT: &str = "/dashboard";

/// Where anonymous users are sent.
pub const DEFAULT_LOGIN_REDIRECT: &str = "/login";

/// What the view should do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardOutcome<C> {
    /// Show the protected content.
    Render(C),
    /// Navigate to this location instead.
    Redirect(String),
    /// The session is still being restored.
    Loading,
}

/// A change to the stored intended destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DestinationEffect {
    Capture(String),
    Clear,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuardDecision<C> {
    pub outcome: GuardOutcome<C>,
    pub effect: Option<DestinationEffect>,
}

impl<C> GuardDecision<C> {
    fn new(outcome: GuardOutcome<C>) -> Self {
        Self {
            outcome,
            effect: None,
        }
    }

    fn with_effect(mut self, effect: DestinationEffect) -> Self {
        self.effect = Some(effect);
        self
    }

    /// Apply the effect to `session` and return the outcome.
    pub fn apply(self, session: &SessionContainer) -> GuardOutcome<C> {
        match self.effect {
            Some(DestinationEffect::Capture(path)) => {
                debug!(%path, "Capturing intended destination");
                session.set_intended_destination(&path);
            }
            Some(DestinationEffect::Clear) => session.clear_intended_destination(),
            None => {}
        }
        self.outcome
    }
}

// ============================================================================
// Public paths
// ============================================================================

/// Locations that are never worth returning to after login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicPaths {
    paths: Vec<String>,
}

impl Default for PublicPaths {
    fn default() -> Self {
        Self::new("/", "/login", "/signup")
    }
}

impl PublicPaths {
    pub fn new(home: &str, login: &str, signup: &str) -> Self {
        Self {
            paths: [home, login, signup]
                .into_iter()
                .map(|p| normalized_path(p).to_string())
                .collect(),
        }
    }

    /// Treat `alias` as another name for the home page.
    pub fn with_home_alias(mut self, alias: &str) -> Self {
        self.paths.push(normalized_path(alias).to_string());
        self
    }

    /// Whether `destination` points at a public page. Only the path is
    /// compared, so `/login?next=x` and `/login/` both match `/login`.
    pub fn contains(&self, destination: &str) -> bool {
        let path = normalized_path(destination);
        self.paths.iter().any(|p| p == path)
    }
}

// ============================================================================
// Public guard
// ============================================================================

/// Guard for pages meant for anonymous visitors, such as login or signup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicGuard {
    /// Send signed-in users elsewhere.
    pub redirect_if_authenticated: bool,
    /// Fallback target for signed-in users without a usable destination.
    pub redirect_to: String,
    pub public_paths: PublicPaths,
}

impl Default for PublicGuard {
    fn default() -> Self {
        Self {
            redirect_if_authenticated: true,
            redirect_to: DEFAULT_AUTHENTICATED_REDIRECT.to_string(),
            public_paths: PublicPaths::default(),
        }
    }
}

impl PublicGuard {
    pub fn new(redirect_to: impl Into<String>) -> Self {
        Self {
            redirect_to: redirect_to.into(),
            ..Self::default()
        }
    }

    /// Render for everyone, signed in or not.
    pub fn open() -> Self {
        Self {
            redirect_if_authenticated: false,
            ..Self::default()
        }
    }

    pub fn with_public_paths(mut self, public_paths: PublicPaths) -> Self {
        self.public_paths = public_paths;
        self
    }

    pub fn decide<C>(&self, state: &SessionState, content: C) -> GuardDecision<C> {
        if state.is_initializing() {
            return GuardDecision::new(GuardOutcome::Loading);
        }
        if !(self.redirect_if_authenticated && state.is_authenticated()) {
            return GuardDecision::new(GuardOutcome::Render(content));
        }

        match state.intended_destination() {
            Some(destination) if !self.public_paths.contains(destination) => {
                GuardDecision::new(GuardOutcome::Redirect(destination.to_string()))
                    .with_effect(DestinationEffect::Clear)
            }
            Some(_) => GuardDecision::new(GuardOutcome::Redirect(self.redirect_to.clone()))
                .with_effect(DestinationEffect::Clear),
            None => GuardDecision::new(GuardOutcome::Redirect(self.redirect_to.clone())),
        }
    }

    pub fn evaluate<C>(&self, session: &SessionContainer, content: C) -> GuardOutcome<C> {
        self.decide(&session.state(), content).apply(session)
    }
}

// ============================================================================
// Private guard
// ============================================================================

/// Guard for pages that require a signed-in user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrivateGuard {
    pub redirect_to: String,
}

impl Default for PrivateGuard {
    fn default() -> Self {
        Self {
            redirect_to: DEFAULT_LOGIN_REDIRECT.to_string(),
        }
    }
}

impl PrivateGuard {
    pub fn new(redirect_to: impl Into<String>) -> Self {
        Self {
            redirect_to: redirect_to.into(),
        }
    }

    /// Decide for a visit to `location`.
    ///
    /// Anonymous visitors are redirected and `location` is captured so the
    /// public guard can send them back after login. The capture is skipped
    /// when the same location is already stored.
    pub fn decide<C>(
        &self,
        state: &SessionState,
        location: &Location,
        content: C,
    ) -> GuardDecision<C> {
        if state.is_initializing() {
            return GuardDecision::new(GuardOutcome::Loading);
        }
        if state.is_authenticated() {
            return GuardDecision::new(GuardOutcome::Render(content));
        }

        let current = location.full_path();
        let decision = GuardDecision::new(GuardOutcome::Redirect(self.redirect_to.clone()));
        if state.intended_destination() == Some(current.as_str()) {
            decision
        } else {
            decision.with_effect(DestinationEffect::Capture(current))
        }
    }

    pub fn evaluate<C>(
        &self,
        session: &SessionContainer,
        location: &Location,
        content: C,
    ) -> GuardOutcome<C> {
        self.decide(&session.state(), location, content)
            .apply(session)
    }
}
