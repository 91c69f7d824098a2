//! Application bootstrap.
//!
//! SYSTEM CONTEXT
//! ==============
//! `App::builder` gathers the collaborators, the route table, and any
//! one-time service initializers. `start` runs the initializers, starts the
//! auth session monitor once, and hands back a [`RunningApp`] that renders
//! paths through the route table and its guards.
//!
//! ERROR HANDLING
//! ==============
//! A failing initializer is logged and startup continues; the monitor and
//! the routes do not depend on what initializers set up. Route table errors
//! surface earlier, from `RouteTableBuilder::build`.

#[cfg(test)]
#[path = "app_test.rs"]
mod app_test;

use std::sync::Arc;

use tracing::{info, warn};

use crate::access::{Destinations, RouteRequirement};
use crate::config::MonitorConfig;
use crate::providers::{Collaborators, Navigator};
use crate::routes::guard::{GuardView, RouteGuard};
use crate::routes::table::RouteTable;
use crate::services::monitor::{AuthSessionMonitor, MonitorHandle, MonitorPhase};
use crate::session::{SessionReader, SessionStore};

pub type InitError = Box<dyn std::error::Error + Send + Sync>;

/// One-time startup work, such as warming a product catalog.
#[async_trait::async_trait]
pub trait Initializer: Send + Sync {
    fn name(&self) -> &str;

    /// # Errors
    ///
    /// Any failure; startup logs it and continues.
    async fn initialize(&self) -> Result<(), InitError>;
}

/// Result of rendering a path.
#[derive(Debug, PartialEq, Eq)]
pub enum Rendered<'a, C> {
    Page(&'a C),
    /// Guarded route whose session is still loading.
    Pending,
    /// Access denied; navigation to this path was issued.
    Redirected(String),
    /// No route matched. Carries the fallback component when one is declared.
    NotFound(Option<&'a C>),
}

pub struct App;

impl App {
    #[must_use]
    pub fn builder<C>(collaborators: Collaborators, routes: RouteTable<C>) -> AppBuilder<C> {
        AppBuilder { config: MonitorConfig::default(), collaborators, routes, initializers: Vec::new() }
    }
}

pub struct AppBuilder<C> {
    config: MonitorConfig,
    collaborators: Collaborators,
    routes: RouteTable<C>,
    initializers: Vec<Arc<dyn Initializer>>,
}

impl<C> AppBuilder<C> {
    #[must_use]
    pub fn config(mut self, config: MonitorConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn initializer(mut self, initializer: Arc<dyn Initializer>) -> Self {
        self.initializers.push(initializer);
        self
    }

    /// Run initializers in registration order, then start the monitor.
    ///
    /// Must be called from within a tokio runtime.
    pub async fn start(self) -> RunningApp<C> {
        for initializer in &self.initializers {
            match initializer.initialize().await {
                Ok(()) => info!(initializer = initializer.name(), "initializer finished"),
                Err(e) => warn!(initializer = initializer.name(), error = %e, "initializer failed; continuing startup"),
            }
        }

        let destinations = self.config.destinations.clone();
        let navigator = Arc::clone(&self.collaborators.navigator);
        let store = SessionStore::new();
        let session = store.reader();
        let monitor = AuthSessionMonitor::new(self.config, self.collaborators, store).start();
        info!(initializers = self.initializers.len(), "app started");

        RunningApp { routes: self.routes, session, navigator, destinations, monitor }
    }
}

pub struct RunningApp<C> {
    routes: RouteTable<C>,
    session: SessionReader,
    navigator: Arc<dyn Navigator>,
    destinations: Destinations,
    monitor: MonitorHandle,
}

impl<C> RunningApp<C> {
    /// Resolve `path` and run its guard once against the current session.
    #[must_use]
    pub fn render(&self, path: &str) -> Rendered<'_, C> {
        let Some(matched) = self.routes.resolve(path) else {
            return Rendered::NotFound(None);
        };
        if matched.fallback {
            return Rendered::NotFound(Some(matched.component));
        }
        match self.guard_for(matched.requirement).evaluate() {
            GuardView::Content => Rendered::Page(matched.component),
            GuardView::Pending => Rendered::Pending,
            GuardView::Redirected(to) => Rendered::Redirected(to),
        }
    }

    /// Long-lived guard for the route matching `path`.
    #[must_use]
    pub fn guard(&self, path: &str) -> Option<RouteGuard> {
        self.routes.resolve(path).map(|matched| self.guard_for(matched.requirement))
    }

    fn guard_for(&self, requirement: RouteRequirement) -> RouteGuard {
        RouteGuard::new(requirement, self.session.clone(), Arc::clone(&self.navigator), self.destinations.clone())
    }

    #[must_use]
    pub fn session(&self) -> SessionReader {
        self.session.clone()
    }

    #[must_use]
    pub fn routes(&self) -> &RouteTable<C> {
        &self.routes
    }

    #[must_use]
    pub fn phase(&self) -> MonitorPhase {
        self.monitor.phase()
    }

    /// Wait for the monitor to drain its queue. `false` once it has stopped.
    pub async fn settled(&self) -> bool {
        self.monitor.settled().await
    }

    /// Stop the monitor, closing the account watch and the auth listener.
    pub async fn shutdown(self) {
        self.monitor.shutdown().await;
        info!("app stopped");
    }
}
