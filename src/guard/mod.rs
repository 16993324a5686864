//! Route guard: keeps the navigation location consistent with auth state.
//!
//! DESIGN
//! ======
//! `decide` is a pure function of (session present, loading, location).
//! `RouteGuard` adds the "act once per input change" memo, and
//! `spawn_route_guard` re-runs it whenever the session store or the
//! navigator publishes a new value. Redirects always replace the current
//! history entry so "back" never returns to a state the guard rejected.

pub mod navigator;
pub mod route;


use std::sync::Arc;

use tokio::task::JoinHandle;

use crate::session::{SessionHandle, SessionState};
pub use navigator::{MemoryNavigator, Navigator};
pub use route::{Region, RouteLocation, RouteTable};

/// Outcome of one guard evaluation.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GuardAction {
    None,
    /// Replace the current history entry with this location.
    Redirect(RouteLocation),
}

/// Decide what the guard should do for the given inputs.
///
/// First match wins:
///
/// | session | region        | action             |
/// |---------|---------------|--------------------|
/// | absent  | not auth      | redirect auth entry|
/// | present | auth          | redirect app entry |
/// | present | other         | redirect app entry |
/// | present | app           | none               |
/// | absent  | auth          | none               |
#[must_use]
pub fn decide(table: &RouteTable, has_session: bool, loading: bool, location: &RouteLocation) -> GuardAction {
    if loading {
        return GuardAction::None;
    }
    match (has_session, table.classify(location)) {
        (false, Region::App | Region::Other) => GuardAction::Redirect(table.auth_entry.clone()),
        (true, Region::Auth | Region::Other) => GuardAction::Redirect(table.app_entry.clone()),
        (true, Region::App) | (false, Region::Auth) => GuardAction::None,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
struct GuardInputs {
    has_session: bool,
    loading: bool,
    location: RouteLocation,
}

/// Stateful wrapper around `decide` that never acts twice on identical inputs.
#[derive(Debug, Default)]
pub struct RouteGuard {
    table: RouteTable,
    last: Option<GuardInputs>,
}

impl RouteGuard {
    #[must_use]
    pub fn new(table: RouteTable) -> Self {
        Self { table, last: None }
    }

    #[must_use]
    pub fn table(&self) -> &RouteTable {
        &self.table
    }

    /// Evaluate against the current session state and location.
    pub fn evaluate(&mut self, state: &SessionState, location: &RouteLocation) -> GuardAction {
        let inputs = GuardInputs { has_session: state.is_authenticated(), loading: state.loading, location: location.clone() };
        if self.last.as_ref() == Some(&inputs) {
            return GuardAction::None;
        }
        let action = decide(&self.table, inputs.has_session, inputs.loading, &inputs.location);
        self.last = Some(inputs);
        action
    }
}

/// Run the guard as a background effect until the store or navigator goes away.
pub fn spawn_route_guard(session: SessionHandle, navigator: Arc<dyn Navigator>, table: RouteTable) -> JoinHandle<()> {
    let mut session_rx = session.watch();
    let mut route_rx = navigator.subscribe();
    let mut guard = RouteGuard::new(table);

    tokio::spawn(async move {
        loop {
            let state = session_rx.borrow_and_update().clone();
            let location = route_rx.borrow_and_update().clone();

            if let GuardAction::Redirect(target) = guard.evaluate(&state, &location) {
                tracing::info!(from = %location, to = %target, authenticated = state.is_authenticated(), "route guard redirect");
                navigator.replace(&target);
            }

            tokio::select! {
                changed = session_rx.changed() => {
                    if changed.is_err() {
                        tracing::debug!("session store closed; route guard stopping");
                        break;
                    }
                }
                changed = route_rx.changed() => {
                    if changed.is_err() {
                        tracing::debug!("navigator closed; route guard stopping");
                        break;
                    }
                }
            }
        }
    })
}
