//! Session lifecycle state machine
//!
//! Pure transition function with no I/O. The runner feeds it events (from
//! the transport or from completed actions) and performs the returned
//! action. Unknown state/event pairs keep the current state and request
//! nothing, so stray late events are harmless.

/// How a deliberate disconnect should resolve once the wire confirms it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// All work done, session succeeded.
    Success,
    /// Terminal failure, no retry.
    Failure,
    /// Reconnect and retry authentication.
    RetryAuth,
}

/// Lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Connecting,
    Authenticating,
    /// Logged on; tracking which of the two work phases has finished.
    LoggedOn { licenses_done: bool, web_done: bool },
    /// Disconnect requested, waiting for the wire to confirm.
    Disconnecting { disposition: Disposition },
    Done,
    Failed,
}

/// Inputs to the transition function.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Start,
    Connected,
    Disconnected { user_initiated: bool },
    AuthSucceeded,
    AuthRateLimited,
    AuthTimedOut,
    AuthDenied,
    LoggedOn { ok: bool },
    LoggedOff { rate_limited: bool },
    LicenseList,
    AccountFlags,
    LicensesProcessed,
    LicensesFailed,
    WebReady,
    WebFailed,
    RetriesExhausted,
}

/// Side effects requested by a transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionAction {
    /// Wait out the connection gate, then open the connection.
    Connect,
    /// Run the credentials + two-factor handshake.
    BeginAuth,
    /// Resume the logon with the stored refresh token.
    ResumeSession,
    /// Authenticate the web tier with the logon tokens.
    EstablishWebSession,
    /// Walk the license list and collect package metadata.
    ProcessLicenses,
    /// Retrieve the API key over the established web session.
    FetchWebCredentials,
    /// Ask the wire to close.
    Disconnect,
    /// Arm the cross-run penalty, then ask the wire to close.
    PenalizeAndDisconnect,
    /// Transient drop: reconnect if budget remains.
    Reconnect,
    /// Freeze the result as a success.
    Complete,
    /// Freeze the result as a failure.
    Abort,
    None,
}

/// Advance the lifecycle by one event.
pub fn handle_event(state: SessionState, event: SessionEvent) -> (SessionState, SessionAction) {
    use Disposition::*;
    use SessionAction as A;
    use SessionEvent as E;
    use SessionState as S;

    match (state, event) {
        // A rate-limited logoff is terminal from any active state.
        (
            S::Connecting | S::Authenticating | S::LoggedOn { .. },
            E::LoggedOff { rate_limited: true },
        ) => (
            S::Disconnecting { disposition: Failure },
            A::PenalizeAndDisconnect,
        ),

        (S::Idle, E::Start) => (S::Connecting, A::Connect),

        (S::Connecting, E::Connected) => (S::Authenticating, A::BeginAuth),

        (S::Authenticating, E::AuthSucceeded) => (S::Authenticating, A::ResumeSession),
        (S::Authenticating, E::AuthRateLimited) => (
            S::Disconnecting { disposition: Failure },
            A::PenalizeAndDisconnect,
        ),
        (S::Authenticating, E::AuthTimedOut) => (
            S::Disconnecting { disposition: RetryAuth },
            A::Disconnect,
        ),
        (S::Authenticating, E::AuthDenied) => {
            (S::Disconnecting { disposition: Failure }, A::Disconnect)
        }
        // The web session must exist before license processing can
        // resolve app names through it.
        (S::Authenticating, E::LoggedOn { ok: true }) => (
            S::LoggedOn { licenses_done: false, web_done: false },
            A::EstablishWebSession,
        ),
        (S::Authenticating, E::LoggedOn { ok: false }) => {
            (S::Disconnecting { disposition: Failure }, A::Disconnect)
        }

        // License processing starts only once logged on, and only once.
        (s @ S::LoggedOn { licenses_done: false, .. }, E::LicenseList) => {
            (s, A::ProcessLicenses)
        }
        (s @ S::LoggedOn { .. }, E::AccountFlags) => (s, A::None),

        (S::LoggedOn { web_done, .. }, E::LicensesProcessed) => {
            let next = S::LoggedOn { licenses_done: true, web_done };
            if web_done {
                (S::Disconnecting { disposition: Success }, A::Disconnect)
            } else {
                (next, A::FetchWebCredentials)
            }
        }
        (S::LoggedOn { .. }, E::LicensesFailed) => {
            (S::Disconnecting { disposition: Failure }, A::Disconnect)
        }

        (S::LoggedOn { licenses_done, .. }, E::WebReady) => {
            if licenses_done {
                (S::Disconnecting { disposition: Success }, A::Disconnect)
            } else {
                (S::LoggedOn { licenses_done, web_done: true }, A::None)
            }
        }
        (S::LoggedOn { .. }, E::WebFailed) => {
            (S::Disconnecting { disposition: Failure }, A::Disconnect)
        }

        (S::LoggedOn { .. }, E::LoggedOff { rate_limited: false }) => {
            (S::Disconnecting { disposition: Failure }, A::Disconnect)
        }

        // Wire confirmed our own disconnect request.
        (S::Disconnecting { disposition: Success }, E::Disconnected { .. }) => {
            (S::Done, A::Complete)
        }
        (S::Disconnecting { disposition: Failure }, E::Disconnected { .. }) => {
            (S::Failed, A::Abort)
        }
        (S::Disconnecting { disposition: RetryAuth }, E::Disconnected { .. }) => {
            (S::Connecting, A::Reconnect)
        }

        // Unrequested drop while active: transient unless user initiated.
        (
            S::Connecting | S::Authenticating | S::LoggedOn { .. },
            E::Disconnected { user_initiated: false },
        ) => (S::Connecting, A::Reconnect),
        (
            S::Connecting | S::Authenticating | S::LoggedOn { .. },
            E::Disconnected { user_initiated: true },
        ) => (S::Failed, A::Abort),

        (_, E::RetriesExhausted) => (S::Failed, A::Abort),

        (s, _) => (s, A::None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Disposition::*;
    use SessionAction as A;
    use SessionEvent as E;
    use SessionState as S;

    #[test]
    fn start_requests_connect() {
        let (state, action) = handle_event(S::Idle, E::Start);
        assert!(matches!(state, S::Connecting));
        assert!(matches!(action, A::Connect));
    }

    #[test]
    fn connected_begins_auth() {
        let (state, action) = handle_event(S::Connecting, E::Connected);
        assert!(matches!(state, S::Authenticating));
        assert!(matches!(action, A::BeginAuth));
    }

    #[test]
    fn auth_success_resumes_session() {
        let (state, action) = handle_event(S::Authenticating, E::AuthSucceeded);
        assert!(matches!(state, S::Authenticating));
        assert!(matches!(action, A::ResumeSession));
    }

    #[test]
    fn logon_establishes_the_web_session() {
        let (state, action) = handle_event(S::Authenticating, E::LoggedOn { ok: true });
        assert!(matches!(
            state,
            S::LoggedOn { licenses_done: false, web_done: false }
        ));
        assert!(matches!(action, A::EstablishWebSession));
    }

    #[test]
    fn happy_path_reaches_done() {
        let mut state = S::Idle;
        let script = [
            E::Start,
            E::Connected,
            E::AuthSucceeded,
            E::LoggedOn { ok: true },
            E::LicenseList,
            E::AccountFlags,
            E::LicensesProcessed,
            E::WebReady,
            E::Disconnected { user_initiated: true },
        ];
        let mut last = A::None;
        for event in script {
            let (next, action) = handle_event(state, event);
            state = next;
            last = action;
        }
        assert!(matches!(state, S::Done));
        assert!(matches!(last, A::Complete));
    }

    #[test]
    fn auth_rate_limit_penalizes() {
        let (state, action) = handle_event(S::Authenticating, E::AuthRateLimited);
        assert!(matches!(state, S::Disconnecting { disposition: Failure }));
        assert!(matches!(action, A::PenalizeAndDisconnect));
        let (state, action) = handle_event(state, E::Disconnected { user_initiated: true });
        assert!(matches!(state, S::Failed));
        assert!(matches!(action, A::Abort));
    }

    #[test]
    fn rate_limited_logoff_is_terminal_from_any_active_state() {
        for state in [
            S::Authenticating,
            S::LoggedOn { licenses_done: true, web_done: false },
        ] {
            let (next, action) = handle_event(state, E::LoggedOff { rate_limited: true });
            assert!(matches!(next, S::Disconnecting { disposition: Failure }));
            assert!(matches!(action, A::PenalizeAndDisconnect));
        }
    }

    #[test]
    fn rate_limited_logoff_does_not_resurrect_settled_states() {
        for state in [
            S::Done,
            S::Failed,
            S::Disconnecting { disposition: Success },
        ] {
            let (next, action) = handle_event(state, E::LoggedOff { rate_limited: true });
            assert_eq!(next, state);
            assert!(matches!(action, A::None));
        }
    }

    #[test]
    fn auth_timeout_retries_after_disconnect() {
        let (state, action) = handle_event(S::Authenticating, E::AuthTimedOut);
        assert!(matches!(state, S::Disconnecting { disposition: RetryAuth }));
        assert!(matches!(action, A::Disconnect));
        let (state, action) = handle_event(state, E::Disconnected { user_initiated: true });
        assert!(matches!(state, S::Connecting));
        assert!(matches!(action, A::Reconnect));
    }

    #[test]
    fn web_ready_before_licenses_waits_for_processing() {
        let state = S::LoggedOn { licenses_done: false, web_done: false };
        let (state, action) = handle_event(state, E::WebReady);
        assert!(matches!(state, S::LoggedOn { licenses_done: false, web_done: true }));
        assert!(matches!(action, A::None));
        let (state, action) = handle_event(state, E::LicensesProcessed);
        assert!(matches!(state, S::Disconnecting { disposition: Success }));
        assert!(matches!(action, A::Disconnect));
    }

    #[test]
    fn transient_drop_reconnects() {
        let state = S::LoggedOn { licenses_done: false, web_done: false };
        let (state, action) = handle_event(state, E::Disconnected { user_initiated: false });
        assert!(matches!(state, S::Connecting));
        assert!(matches!(action, A::Reconnect));
    }

    #[test]
    fn user_initiated_drop_mid_session_fails() {
        let state = S::LoggedOn { licenses_done: true, web_done: false };
        let (state, action) = handle_event(state, E::Disconnected { user_initiated: true });
        assert!(matches!(state, S::Failed));
        assert!(matches!(action, A::Abort));
    }

    #[test]
    fn exhausted_retries_abort() {
        let (state, action) = handle_event(S::Connecting, E::RetriesExhausted);
        assert!(matches!(state, S::Failed));
        assert!(matches!(action, A::Abort));
    }

    #[test]
    fn late_events_in_terminal_states_are_ignored() {
        let (state, action) = handle_event(S::Done, E::Connected);
        assert!(matches!(state, S::Done));
        assert!(matches!(action, A::None));
        let (state, action) = handle_event(S::Failed, E::WebReady);
        assert!(matches!(state, S::Failed));
        assert!(matches!(action, A::None));
    }

    #[test]
    fn license_list_triggers_processing_once() {
        let state = S::LoggedOn { licenses_done: false, web_done: false };
        let (_, action) = handle_event(state, E::LicenseList);
        assert!(matches!(action, A::ProcessLicenses));

        let state = S::LoggedOn { licenses_done: true, web_done: false };
        let (_, action) = handle_event(state, E::LicenseList);
        assert!(matches!(action, A::None));
    }
}
