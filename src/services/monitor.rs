//! Auth session monitor: keeps the session in step with the auth provider
//! and the user's account record.
//!
//! DESIGN
//! ======
//! Auth callbacks and account-watch callbacks only push a `MonitorEvent`
//! onto one unbounded channel. A single task drains it and runs each event to
//! completion before taking the next, so two events for the same user never
//! interleave and the state machine below is the only writer of the session.
//!
//! ```text
//! LoggedOut --user present--> LoggedIn(watch open)
//! LoggedIn  --user absent---> LoggedOut            (watch closed)
//! LoggedIn  --blocked-------> SigningOut --sign-out ok--> LoggedOut
//! ```
//!
//! After a block the session stays `blocked` past the sign-out, until the
//! next sign-in, so open guards keep pointing at the blocked page.
//!
//! The session only becomes `loaded` once the first account snapshot has
//! been applied, so guards cannot let a user onto a role-gated route before
//! the block check has run.
//!
//! ERROR HANDLING
//! ==============
//! Watch failures are logged and leave the session as it was; a user whose
//! first snapshot never arrived stays pending. A failed sign-out after a
//! block is retried a bounded number of times and then surfaced through the
//! notifier, while the session keeps `blocked = true`.

#[cfg(test)]
#[path = "monitor_test.rs"]
mod monitor_test;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::config::{MissingAccountPolicy, MonitorConfig};
use crate::providers::{AccountRecord, AuthChange, Collaborators, DocumentSnapshot, Unsubscribe};
use crate::services::subscription::{Delivery, DeliverySink, SessionSubscription};
use crate::session::{Role, Session, SessionStore, UserId};

const SIGN_OUT_FAILED_NOTICE: &str =
    "We could not finish signing you out. Please close this window and contact support.";

#[derive(Debug)]
enum MonitorEvent {
    Auth(AuthChange),
    Snapshot(Delivery),
    Settle(oneshot::Sender<u64>),
    Shutdown,
}

#[derive(Debug)]
enum MonitorState {
    LoggedOut,
    LoggedIn { user_id: UserId, subscription: Option<SessionSubscription> },
    SigningOut { user_id: UserId },
}

/// Externally visible state of the monitor.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum MonitorPhase {
    #[default]
    LoggedOut,
    /// `watching` is false when the account watch could not be registered.
    LoggedIn { user_id: UserId, watching: bool },
    SigningOut { user_id: UserId },
    Stopped,
}

/// What an account snapshot means for the session.
enum AccountStatus {
    Active { role: Option<Role> },
    Blocked,
    Unreadable,
}

pub struct AuthSessionMonitor {
    config: MonitorConfig,
    collaborators: Collaborators,
    session: SessionStore,
    state: MonitorState,
    next_generation: u64,
    processed: u64,
    tx: mpsc::UnboundedSender<MonitorEvent>,
    rx: mpsc::UnboundedReceiver<MonitorEvent>,
    auth_listener: Option<Unsubscribe>,
    phase: watch::Sender<MonitorPhase>,
}

impl AuthSessionMonitor {
    #[must_use]
    pub fn new(config: MonitorConfig, collaborators: Collaborators, session: SessionStore) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let (phase, _) = watch::channel(MonitorPhase::LoggedOut);
        Self {
            config,
            collaborators,
            session,
            state: MonitorState::LoggedOut,
            next_generation: 0,
            processed: 0,
            tx,
            rx,
            auth_listener: None,
            phase,
        }
    }

    /// Register the auth listener and spawn the event loop.
    ///
    /// Must be called from within a tokio runtime.
    #[must_use]
    pub fn start(mut self) -> MonitorHandle {
        let tx = self.tx.clone();
        let listener = self.collaborators.auth.on_auth_state_changed(Box::new(move |change| {
            let _ = tx.send(MonitorEvent::Auth(change));
        }));
        self.auth_listener = Some(listener);

        let handle_tx = self.tx.clone();
        let phase = self.phase.subscribe();
        let task = tokio::spawn(self.run());
        MonitorHandle { tx: handle_tx, phase, task: Some(task) }
    }

    async fn run(mut self) {
        info!("auth session monitor started");
        while let Some(event) = self.rx.recv().await {
            match event {
                MonitorEvent::Auth(change) => self.on_auth_change(change).await,
                MonitorEvent::Snapshot(delivery) => self.on_delivery(delivery).await,
                MonitorEvent::Settle(reply) => {
                    let _ = reply.send(self.processed);
                    continue;
                }
                MonitorEvent::Shutdown => break,
            }
            self.processed += 1;
        }
        self.teardown();
        info!("auth session monitor stopped");
    }

    // =========================================================================
    // AUTH EVENTS
    // =========================================================================

    async fn on_auth_change(&mut self, change: AuthChange) {
        match change {
            AuthChange::UserPresent(user_id) => self.on_user_present(user_id).await,
            AuthChange::UserAbsent => self.on_user_absent(),
        }
    }

    async fn on_user_present(&mut self, user_id: UserId) {
        match &self.state {
            MonitorState::LoggedIn { user_id: current, .. } if *current == user_id => {
                debug!(user_id = %user_id, "auth refresh for current user");
                return;
            }
            MonitorState::SigningOut { user_id: current } if *current == user_id => {
                info!(user_id = %user_id, "blocked user still signed in; retrying sign-out");
                self.finish_sign_out(user_id).await;
                return;
            }
            _ => {}
        }

        if let MonitorState::LoggedIn { user_id: previous, .. } = &self.state {
            info!(previous = %previous, user_id = %user_id, "user switched; closing previous account watch");
        }
        self.close_current();
        self.log_in(user_id).await;
    }

    fn on_user_absent(&mut self) {
        let evicted = match &self.state {
            MonitorState::LoggedIn { user_id, .. } => {
                info!(user_id = %user_id, "user signed out");
                false
            }
            MonitorState::SigningOut { user_id } => {
                info!(user_id = %user_id, "blocked user signed out");
                true
            }
            MonitorState::LoggedOut => {
                debug!("auth reports no user");
                self.session.snapshot().blocked
            }
        };
        self.close_current();
        self.set_state(MonitorState::LoggedOut);
        self.session.replace(if evicted { Session::evicted() } else { Session::signed_out() });
    }

    async fn log_in(&mut self, user_id: UserId) {
        self.next_generation += 1;
        let generation = self.next_generation;
        self.session.replace(Session::pending(user_id.clone()));
        info!(user_id = %user_id, generation, "user signed in; watching account record");

        let opened = SessionSubscription::open(
            self.collaborators.accounts.as_ref(),
            &self.config.account_collection,
            user_id.clone(),
            generation,
            self.delivery_sink(),
        )
        .await;

        let subscription = match opened {
            Ok(subscription) => Some(subscription),
            Err(e) => {
                error!(user_id = %user_id, error = %e, "account watch registration failed; session stays pending");
                None
            }
        };
        self.set_state(MonitorState::LoggedIn { user_id, subscription });
    }

    // =========================================================================
    // ACCOUNT SNAPSHOTS
    // =========================================================================

    async fn on_delivery(&mut self, delivery: Delivery) {
        let MonitorState::LoggedIn { user_id, subscription: Some(subscription) } = &self.state else {
            debug!(generation = delivery.generation, "discarding delivery without an open watch");
            return;
        };
        if !subscription.accepts(delivery.generation) {
            debug!(
                generation = delivery.generation,
                current = subscription.generation(),
                "discarding delivery from closed watch"
            );
            return;
        }
        let user_id = user_id.clone();

        let snapshot = match delivery.result {
            Ok(snapshot) => snapshot,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "account watch delivery failed; keeping last known session");
                return;
            }
        };

        match self.classify(&user_id, &snapshot) {
            AccountStatus::Blocked => self.enforce_block(user_id).await,
            AccountStatus::Active { role } => {
                self.session.update(|s| {
                    if let Some(role) = role {
                        s.role = role;
                    }
                    s.blocked = false;
                    s.loaded = true;
                });
                debug!(user_id = %user_id, role = %self.session.snapshot().role, "account snapshot applied");
            }
            AccountStatus::Unreadable => {}
        }
    }

    fn classify(&self, user_id: &UserId, snapshot: &DocumentSnapshot) -> AccountStatus {
        if !snapshot.exists {
            return match self.config.missing_account {
                MissingAccountPolicy::Allow => {
                    warn!(user_id = %user_id, "account record missing; treating as not blocked");
                    AccountStatus::Active { role: None }
                }
                MissingAccountPolicy::Block => {
                    warn!(user_id = %user_id, "account record missing; treating as blocked");
                    AccountStatus::Blocked
                }
            };
        }

        let record = match AccountRecord::from_data(&snapshot.data) {
            Ok(record) => record,
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "ignoring unreadable account record");
                return AccountStatus::Unreadable;
            }
        };
        if record.is_blocked {
            return AccountStatus::Blocked;
        }

        let role = record.role.as_deref().and_then(|raw| match raw.parse::<Role>() {
            Ok(role) => Some(role),
            Err(e) => {
                warn!(user_id = %user_id, error = %e, "keeping current role");
                None
            }
        });
        AccountStatus::Active { role }
    }

    // =========================================================================
    // BLOCK ENFORCEMENT
    // =========================================================================

    /// Evict a blocked user. The notice, the session flag, and the redirect
    /// all happen before the first suspension point, so no reader sees the
    /// blocked session before the notice was raised.
    async fn enforce_block(&mut self, user_id: UserId) {
        self.close_current();
        self.set_state(MonitorState::SigningOut { user_id: user_id.clone() });
        warn!(user_id = %user_id, "account blocked; signing out");

        self.collaborators.notifier.notify_error(&self.config.suspension_notice(), self.config.notice_duration);
        self.session.update(|s| {
            s.blocked = true;
            s.loaded = true;
        });
        self.collaborators.navigator.navigate_to(&self.config.destinations.account_blocked);

        self.finish_sign_out(user_id).await;
    }

    async fn finish_sign_out(&mut self, user_id: UserId) {
        let attempts = self.config.sign_out_attempts.max(1);
        for attempt in 1..=attempts {
            match self.collaborators.auth.sign_out().await {
                Ok(()) => {
                    info!(user_id = %user_id, attempt, "blocked user signed out");
                    self.set_state(MonitorState::LoggedOut);
                    self.session.replace(Session::evicted());
                    return;
                }
                Err(e) => {
                    warn!(user_id = %user_id, attempt, attempts, error = %e, "sign-out after block failed");
                    if attempt < attempts {
                        backoff(self.config.sign_out_retry_delay).await;
                    }
                }
            }
        }

        error!(user_id = %user_id, attempts, "sign-out after block did not succeed; session stays blocked");
        self.collaborators.notifier.notify_error(SIGN_OUT_FAILED_NOTICE, self.config.notice_duration);
    }

    // =========================================================================
    // PLUMBING
    // =========================================================================

    fn delivery_sink(&self) -> DeliverySink {
        let tx = self.tx.clone();
        Arc::new(move |delivery| {
            let _ = tx.send(MonitorEvent::Snapshot(delivery));
        })
    }

    fn close_current(&mut self) {
        if let MonitorState::LoggedIn { subscription: Some(subscription), .. } = &mut self.state {
            subscription.close();
        }
    }

    fn set_state(&mut self, state: MonitorState) {
        let phase = match &state {
            MonitorState::LoggedOut => MonitorPhase::LoggedOut,
            MonitorState::LoggedIn { user_id, subscription } => {
                MonitorPhase::LoggedIn { user_id: user_id.clone(), watching: subscription.is_some() }
            }
            MonitorState::SigningOut { user_id } => MonitorPhase::SigningOut { user_id: user_id.clone() },
        };
        self.state = state;
        self.phase.send_replace(phase);
    }

    fn teardown(&mut self) {
        self.close_current();
        if let Some(unsubscribe) = self.auth_listener.take() {
            unsubscribe();
        }
        self.phase.send_replace(MonitorPhase::Stopped);
    }
}

async fn backoff(delay: Duration) {
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

// =============================================================================
// HANDLE
// =============================================================================

/// Control handle for a running monitor. Dropping it stops the monitor.
pub struct MonitorHandle {
    tx: mpsc::UnboundedSender<MonitorEvent>,
    phase: watch::Receiver<MonitorPhase>,
    task: Option<JoinHandle<()>>,
}

impl MonitorHandle {
    #[must_use]
    pub fn phase(&self) -> MonitorPhase {
        self.phase.borrow().clone()
    }

    /// Wait until every queued event, and every event those events caused,
    /// has been handled. Returns `false` if the monitor has stopped.
    pub async fn settled(&self) -> bool {
        let Some(mut last) = self.round_trip().await else {
            return false;
        };
        loop {
            let Some(now) = self.round_trip().await else {
                return false;
            };
            if now == last {
                return true;
            }
            last = now;
        }
    }

    async fn round_trip(&self) -> Option<u64> {
        let (reply, done) = oneshot::channel();
        self.tx.send(MonitorEvent::Settle(reply)).ok()?;
        done.await.ok()
    }

    /// Stop the monitor: close the account watch and the auth listener.
    pub async fn shutdown(mut self) {
        let _ = self.tx.send(MonitorEvent::Shutdown);
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!(error = %e, "auth session monitor task failed");
            }
        }
    }
}

impl Drop for MonitorHandle {
    fn drop(&mut self) {
        if self.task.take().is_some() {
            let _ = self.tx.send(MonitorEvent::Shutdown);
        }
    }
}
