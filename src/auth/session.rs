use std::time::Duration;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use validator::Validate;

use crate::schemas::user::UserProfile;

pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(5 * 60);

/// Credentials of the signed-in student. Passed explicitly to the API client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct AuthSession {
    #[validate(length(min = 1, message = "token must not be empty"))]
    pub token: String,
    #[serde(default)]
    pub user: Option<UserProfile>,
    #[serde(default)]
    pub remember_me: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub last_activity: OffsetDateTime,
}

impl AuthSession {
    pub fn new(token: impl Into<String>, remember_me: bool, now: OffsetDateTime) -> Self {
        Self { token: token.into(), user: None, remember_me, last_activity: now }
    }

    pub fn with_user(mut self, user: UserProfile) -> Self {
        self.user = Some(user);
        self
    }

    pub fn touch(&mut self, now: OffsetDateTime) {
        if now > self.last_activity {
            self.last_activity = now;
        }
    }

    /// Idle sessions expire unless the user asked to be remembered.
    pub fn is_expired(&self, now: OffsetDateTime, idle_timeout: Duration) -> bool {
        if self.remember_me {
            return false;
        }

        let idle = now - self.last_activity;
        idle.whole_milliseconds() > idle_timeout.as_millis() as i128
    }

    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.token)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn session_expires_after_idle_timeout() {
        let start = datetime!(2025-03-01 09:00:00 UTC);
        let session = AuthSession::new("tok", false, start);

        assert!(!session.is_expired(start + time::Duration::minutes(5), DEFAULT_IDLE_TIMEOUT));
        assert!(session.is_expired(start + time::Duration::seconds(301), DEFAULT_IDLE_TIMEOUT));
    }

    #[test]
    fn remembered_session_never_expires() {
        let start = datetime!(2025-03-01 09:00:00 UTC);
        let session = AuthSession::new("tok", true, start);

        assert!(!session.is_expired(start + time::Duration::days(30), DEFAULT_IDLE_TIMEOUT));
    }

    #[test]
    fn touch_moves_activity_forward_only() {
        let start = datetime!(2025-03-01 09:00:00 UTC);
        let mut session = AuthSession::new("tok", false, start);

        session.touch(start + time::Duration::minutes(4));
        assert!(!session.is_expired(start + time::Duration::minutes(8), DEFAULT_IDLE_TIMEOUT));

        session.touch(start);
        assert_eq!(session.last_activity, start + time::Duration::minutes(4));
    }

    #[test]
    fn empty_token_is_invalid() {
        let session = AuthSession::new("", false, datetime!(2025-03-01 09:00:00 UTC));
        assert!(session.validate().is_err());
        assert_eq!(AuthSession::new("abc", false, session.last_activity).bearer(), "Bearer abc");
    }
}
