//! Route table and navigation.

use tracing::{debug, instrument};

use billdesk_core::Error;
use billdesk_core::error::InvalidInputError;

use crate::container::SessionContainer;
use crate::guard::{GuardOutcome, PrivateGuard, PublicGuard};
use crate::location::{Location, normalized_path};

/// Redirects followed by one navigation before giving up.
pub const MAX_REDIRECTS: usize = 8;

/// How a route is protected.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RouteAccess {
    Public(PublicGuard),
    Private(PrivateGuard),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    /// Path prefix, matched on segment boundaries.
    pub prefix: String,
    pub access: RouteAccess,
}

impl Route {
    pub fn public(prefix: impl Into<String>, guard: PublicGuard) -> Self {
        Self {
            prefix: prefix.into(),
            access: RouteAccess::Public(guard),
        }
    }

    pub fn private(prefix: impl Into<String>, guard: PrivateGuard) -> Self {
        Self {
            prefix: prefix.into(),
            access: RouteAccess::Private(guard),
        }
    }

    fn matches(&self, path: &str) -> bool {
        let prefix = normalized_path(&self.prefix);
        if prefix == "/" {
            return path == "/";
        }
        path == prefix
            || path
                .strip_prefix(prefix)
                .is_some_and(|rest| rest.starts_with('/'))
    }
}

/// Guarded routes of the application.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteTable {
    routes: Vec<Route>,
}

impl RouteTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// The billing application's routes: home, login and signup are public,
    /// the dashboard and the client, product and invoice screens require a
    /// signed-in user.
    pub fn billing_default() -> Self {
        let mut table = Self::new()
            .route(Route::public("/", PublicGuard::open()))
            .route(Route::public("/login", PublicGuard::default()))
            .route(Route::public("/signup", PublicGuard::default()));
        for prefix in ["/dashboard", "/clients", "/products", "/invoices"] {
            table = table.route(Route::private(prefix, PrivateGuard::default()));
        }
        table
    }

    pub fn route(mut self, route: Route) -> Self {
        self.routes.push(route);
        self
    }

    pub fn routes(&self) -> &[Route] {
        &self.routes
    }

    /// The most specific route covering `path`.
    pub fn resolve(&self, path: &str) -> Option<&Route> {
        let path = normalized_path(path);
        self.routes
            .iter()
            .filter(|route| route.matches(path))
            .max_by_key(|route| route.prefix.len())
    }
}

/// Final state of a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavigationState {
    /// The page is shown.
    Rendered,
    /// The session is still being restored; the page waits.
    Loading,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Navigation {
    /// Where navigation ended.
    pub location: Location,
    pub state: NavigationState,
    /// Every redirect target followed on the way, in order.
    pub redirects: Vec<String>,
}

/// Follows guard decisions from a requested location to a final one.
#[derive(Debug, Clone)]
pub struct Navigator {
    session: SessionContainer,
    table: RouteTable,
}

impl Navigator {
    pub fn new(session: SessionContainer, table: RouteTable) -> Self {
        Self { session, table }
    }

    pub fn session(&self) -> &SessionContainer {
        &self.session
    }

    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Navigate to `target`, applying each guard's destination effect and
    /// following redirects. Unrouted locations render unguarded.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for a malformed location or when more
    /// than [`MAX_REDIRECTS`] redirects are chained.
    #[instrument(skip(self))]
    pub fn navigate(&self, target: &str) -> Result<Navigation, Error> {
        let mut location = Location::parse(target)?;
        let mut redirects = Vec::new();

        loop {
            let outcome = match self.table.resolve(&location.path).map(|r| &r.access) {
                Some(RouteAccess::Public(guard)) => guard.evaluate(&self.session, ()),
                Some(RouteAccess::Private(guard)) => {
                    guard.evaluate(&self.session, &location, ())
                }
                None => GuardOutcome::Render(()),
            };

            let next = match outcome {
                GuardOutcome::Render(()) => {
                    return Ok(Navigation {
                        location,
                        state: NavigationState::Rendered,
                        redirects,
                    });
                }
                GuardOutcome::Loading => {
                    return Ok(Navigation {
                        location,
                        state: NavigationState::Loading,
                        redirects,
                    });
                }
                GuardOutcome::Redirect(next) => next,
            };

            if redirects.len() == MAX_REDIRECTS {
                return Err(InvalidInputError::Other {
                    message: format!("too many redirects navigating to {}", target),
                }
                .into());
            }
            debug!(from = %location, to = %next, "Redirect");
            location = Location::parse(&next)?;
            redirects.push(next);
        }
    }
}
