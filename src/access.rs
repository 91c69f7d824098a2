//! Route access decisions.
//!
//! DESIGN
//! ======
//! `decide` is a pure function of the session snapshot and the route's
//! requirement. Guards call it on every render and every session change, so
//! it does no I/O and carries no state.
//!
//! While the session is not loaded, role-gated routes answer with the
//! `Pending` target instead of a hard redirect: the first account snapshot
//! may still grant access, and redirecting early would flash the sign-in
//! page at a user who is about to be let in.
//!
//! A blocked session outranks everything else, including one whose user was
//! already signed out after the block: it always lands on the blocked page.

#[cfg(test)]
#[path = "access_test.rs"]
mod access_test;

use std::fmt;
use std::str::FromStr;

use crate::session::{Role, Session};

/// Role a guarded route demands.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum RequiredRole {
    User,
    Admin,
}

impl RequiredRole {
    #[must_use]
    pub fn role(self) -> Role {
        match self {
            Self::User => Role::User,
            Self::Admin => Role::Admin,
        }
    }
}

impl fmt::Display for RequiredRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.role().as_str())
    }
}

/// Returned when a route asks for a role that cannot gate a route.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("role `{0}` cannot be required by a route (expected `user` or `admin`)")]
pub struct InvalidRequiredRole(pub String);

impl FromStr for RequiredRole {
    type Err = InvalidRequiredRole;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            other => Err(InvalidRequiredRole(other.to_owned())),
        }
    }
}

/// Access requirement attached to a route at table construction time.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RouteRequirement {
    #[default]
    None,
    Role(RequiredRole),
}

/// Where a denied navigation should go.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RedirectTarget {
    /// Auth or the first account snapshot is still outstanding; show a
    /// transitional state and do not navigate.
    Pending,
    SignIn,
    Home,
    AccountBlocked,
}

impl RedirectTarget {
    /// Concrete path for this target, `None` for `Pending`.
    #[must_use]
    pub fn path(self, destinations: &Destinations) -> Option<&str> {
        match self {
            Self::Pending => None,
            Self::SignIn => Some(&destinations.sign_in),
            Self::Home => Some(&destinations.home),
            Self::AccountBlocked => Some(&destinations.account_blocked),
        }
    }
}

/// Outcome of an access check.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Decision {
    Allow,
    DenyRedirect(RedirectTarget),
}

impl Decision {
    #[must_use]
    pub fn is_allowed(self) -> bool {
        matches!(self, Self::Allow)
    }
}

/// Redirect paths used by guards and the monitor.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Destinations {
    pub sign_in: String,
    pub home: String,
    pub account_blocked: String,
}

impl Default for Destinations {
    fn default() -> Self {
        Self { sign_in: "/signin".into(), home: "/".into(), account_blocked: "/account-blocked".into() }
    }
}

/// Decide whether `session` may see a route with `requirement`.
#[must_use]
pub fn decide(session: &Session, requirement: RouteRequirement) -> Decision {
    let RouteRequirement::Role(required) = requirement else {
        return Decision::Allow;
    };

    if session.blocked {
        return Decision::DenyRedirect(RedirectTarget::AccountBlocked);
    }
    if !session.loaded {
        let signed_out = session.auth_resolved && session.user_id.is_none();
        return Decision::DenyRedirect(if signed_out { RedirectTarget::SignIn } else { RedirectTarget::Pending });
    }
    if session.role == required.role() {
        return Decision::Allow;
    }
    if session.user_id.is_none() {
        Decision::DenyRedirect(RedirectTarget::SignIn)
    } else {
        Decision::DenyRedirect(RedirectTarget::Home)
    }
}
