//! # Auth Retry State Machine
//!
//! Bounded recovery from expired credentials. When a call raises an
//! authorization failure, the orchestrator refreshes the credential once and
//! re-runs the whole iteration; a second authorization failure abandons the
//! work for this cycle.
//!
//! ## State Machine
//!
//! ```text
//! FirstAttempt --AuthExpired--> Refreshed --AuthExpired--> (abandoned)
//! ```

/// Where the current iteration stands in the refresh-once policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthAttempt {
    /// Running on the stored access token
    FirstAttempt,
    /// Running on a token obtained by the single permitted refresh
    Refreshed,
}

impl AuthAttempt {
    /// Transition on an authorization failure.
    ///
    /// # Returns
    /// - `Some(Refreshed)` from `FirstAttempt`: refresh and retry once
    /// - `None` from `Refreshed`: the refreshed token was rejected too;
    ///   abandon for this cycle
    pub fn on_auth_failure(self) -> Option<Self> {
        match self {
            AuthAttempt::FirstAttempt => Some(AuthAttempt::Refreshed),
            AuthAttempt::Refreshed => None,
        }
    }
}

impl std::fmt::Display for AuthAttempt {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AuthAttempt::FirstAttempt => write!(f, "first attempt"),
            AuthAttempt::Refreshed => write!(f, "refreshed"),
        }
    }
}
