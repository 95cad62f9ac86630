//! Page routing and the read-only context each page is rendered from.
//!
//! The dashboard owns at most one [`GovernanceSession`], created when the
//! wallet connects and kept for the life of the process. Navigating between
//! routes never touches it, so a proposal started on one page keeps going
//! and is visible from every other page.

use std::sync::Arc;

use thiserror::Error;

use crate::chain::{ChainClient, Wallet};
use crate::governance::{
    GovernanceSession, ProposalStatus, SessionError, SessionSettings, SessionSnapshot,
};
use crate::utils::format_age;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RouteError {
    #[error("no page at `{0}`")]
    NotFound(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Route {
    Home,
    Governance,
    DigitalTwin,
    BuildingControl,
}

impl Route {
    pub const ALL: [Route; 4] = [
        Route::Home,
        Route::Governance,
        Route::DigitalTwin,
        Route::BuildingControl,
    ];

    pub fn from_path(path: &str) -> Result<Route, RouteError> {
        let trimmed = path.trim();
        let normalized = match trimmed.trim_end_matches('/') {
            "" => "/",
            other => other,
        };

        Self::ALL
            .into_iter()
            .find(|route| route.path() == normalized)
            .ok_or_else(|| RouteError::NotFound(trimmed.to_string()))
    }

    pub fn path(&self) -> &'static str {
        match self {
            Route::Home => "/",
            Route::Governance => "/governance",
            Route::DigitalTwin => "/digitaltwin",
            Route::BuildingControl => "/buildingcontrol",
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Route::Home => "Home",
            Route::Governance => "Governance",
            Route::DigitalTwin => "Digital Twin",
            Route::BuildingControl => "Building Control",
        }
    }

    /// Building control is a standalone panel and gets no session state.
    pub fn uses_session(&self) -> bool {
        !matches!(self, Route::BuildingControl)
    }
}

/// What a page receives: a snapshot to render and the session to act through.
pub struct PageContext<'a> {
    route: Route,
    session: Option<&'a GovernanceSession>,
    snapshot: Option<SessionSnapshot>,
    explorer_url: &'a str,
}

impl<'a> PageContext<'a> {
    fn new(route: Route, session: Option<&'a GovernanceSession>, explorer_url: &'a str) -> Self {
        let session = session.filter(|_| route.uses_session());
        Self {
            route,
            session,
            snapshot: session.map(GovernanceSession::snapshot),
            explorer_url,
        }
    }

    pub fn route(&self) -> Route {
        self.route
    }

    pub fn snapshot(&self) -> Option<&SessionSnapshot> {
        self.snapshot.as_ref()
    }

    /// Session actions (`draft_proposal`, `submit_draft`, `refresh_*`, `request_funds`).
    pub fn session(&self) -> Option<&'a GovernanceSession> {
        self.session
    }

    /// Explorer link for the live or last confirmed transaction.
    pub fn transaction_link(&self) -> Option<String> {
        let snapshot = self.snapshot.as_ref()?;
        snapshot.status.tx_handle().map(|tx| tx.explorer_url(self.explorer_url))
    }

    /// Plain-text rendering used by the terminal front-end.
    pub fn summary(&self, balance_unit: &str) -> Vec<String> {
        let mut lines = vec![format!("{} ({})", self.route.title(), self.route.path())];

        let Some(snapshot) = &self.snapshot else {
            if self.route.uses_session() {
                lines.push("Wallet not connected".to_string());
            }
            return lines;
        };

        lines.push(format!("Account: {} (chain {})", snapshot.account, snapshot.chain_id));

        let value = match snapshot.value.value() {
            Some(value) => {
                format!("{} (refreshed {})", value, format_age(snapshot.value.refreshed_at()))
            }
            None => "not loaded".to_string(),
        };
        lines.push(format!("Stored value: {}{}", value, stale_marker(snapshot.value.last_error())));

        let balance = match snapshot.balance.value() {
            Some(balance) => format!("{} {}", balance.amount, balance_unit),
            None => "not loaded".to_string(),
        };
        lines.push(format!("Balance: {}{}", balance, stale_marker(snapshot.balance.last_error())));

        if let Some(members) = snapshot.members.value() {
            lines.push(format!("Members: {}", members.len()));
        }

        lines.push(format!("Proposal: {}", snapshot.status));
        if let Some(draft) = &snapshot.draft {
            lines.push(format!("Draft: {} `{}`", draft.kind, draft.description));
        }
        let link = self.transaction_link();
        if let (ProposalStatus::Pending(_), Some(link)) = (&snapshot.status, link) {
            lines.push(format!("Track: {}", link));
        }

        lines
    }
}

fn stale_marker(last_error: Option<&str>) -> String {
    match last_error {
        Some(reason) => format!(" [last refresh failed: {}]", reason),
        None => String::new(),
    }
}

/// Process-wide holder of the wallet session and the current route.
pub struct Dashboard {
    session: Option<Arc<GovernanceSession>>,
    current: Route,
    explorer_url: String,
}

impl Dashboard {
    pub fn new(explorer_url: impl Into<String>) -> Self {
        Self {
            session: None,
            current: Route::Home,
            explorer_url: explorer_url.into(),
        }
    }

    /// Connect the wallet and install the resulting session. Reconnecting
    /// replaces the previous session.
    pub async fn connect(
        &mut self,
        wallet: Arc<dyn Wallet>,
        chain: Arc<dyn ChainClient>,
        settings: SessionSettings,
    ) -> Result<Arc<GovernanceSession>, SessionError> {
        let session = Arc::new(GovernanceSession::connect(wallet, chain, settings).await?);
        self.session = Some(session.clone());
        Ok(session)
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    pub fn session(&self) -> Option<&Arc<GovernanceSession>> {
        self.session.as_ref()
    }

    pub fn current_route(&self) -> Route {
        self.current
    }

    pub fn navigate(&mut self, path: &str) -> Result<PageContext<'_>, RouteError> {
        self.current = Route::from_path(path)?;
        Ok(self.page())
    }

    pub fn page(&self) -> PageContext<'_> {
        PageContext::new(self.current, self.session.as_deref(), &self.explorer_url)
    }
}
