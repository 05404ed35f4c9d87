//! Session lifecycle notifications.
//!
//! Front ends subscribe through `ApiClient::subscribe` to learn when they
//! must send the user back to the login screen.

/// Why the session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogoutReason {
    /// The user logged out.
    UserRequested,
    /// The refresh token was missing or rejected.
    SessionExpired,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthEvent {
    LoggedIn { user_id: String },
    TokenRefreshed,
    LoggedOut(LogoutReason),
}
