//! Per-route access guard.
//!
//! SYSTEM CONTEXT
//! ==============
//! Every role-gated route is wrapped in a guard. The guard reads the shared
//! session, asks [`decide`] for a verdict, and either lets the content
//! through, shows a transitional view while the session is still loading, or
//! navigates to the redirect destination. [`RouteGuard::watch`] keeps doing
//! that on every session change, so a block or sign-out that lands while the
//! page is open moves the user off it.

#[cfg(test)]
#[path = "guard_test.rs"]
mod guard_test;

use std::sync::Arc;

use tracing::debug;

use crate::access::{Decision, Destinations, RouteRequirement, decide};
use crate::providers::Navigator;
use crate::session::{Session, SessionReader};

/// What a guarded route shows for the current session.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardView {
    Content,
    /// Session still loading; render a placeholder, do not navigate.
    Pending,
    /// Access denied; navigation to this path has been issued.
    Redirected(String),
}

pub struct RouteGuard {
    requirement: RouteRequirement,
    session: SessionReader,
    navigator: Arc<dyn Navigator>,
    destinations: Destinations,
}

impl RouteGuard {
    #[must_use]
    pub fn new(
        requirement: RouteRequirement,
        session: SessionReader,
        navigator: Arc<dyn Navigator>,
        destinations: Destinations,
    ) -> Self {
        Self { requirement, session, navigator, destinations }
    }

    #[must_use]
    pub fn requirement(&self) -> RouteRequirement {
        self.requirement
    }

    /// View for `session` without side effects.
    #[must_use]
    pub fn view_for(&self, session: &Session) -> GuardView {
        match decide(session, self.requirement) {
            Decision::Allow => GuardView::Content,
            Decision::DenyRedirect(target) => match target.path(&self.destinations) {
                Some(path) => GuardView::Redirected(path.to_owned()),
                None => GuardView::Pending,
            },
        }
    }

    /// Evaluate against the current session, navigating on denial.
    pub fn evaluate(&mut self) -> GuardView {
        let session = self.session.snapshot();
        let view = self.view_for(&session);
        if let GuardView::Redirected(path) = &view {
            debug!(requirement = ?self.requirement, %path, "guard redirect");
            self.navigator.navigate_to(path);
        }
        view
    }

    /// Re-evaluate on every session change, reporting each distinct view to
    /// `on_view`. Ends after a redirect or once the session store is gone,
    /// returning the last view.
    pub async fn watch(mut self, mut on_view: impl FnMut(&GuardView)) -> GuardView {
        let mut last = self.evaluate();
        on_view(&last);
        loop {
            if matches!(last, GuardView::Redirected(_)) || !self.session.changed().await {
                return last;
            }
            let view = self.evaluate();
            if view != last {
                on_view(&view);
                last = view;
            }
        }
    }
}
