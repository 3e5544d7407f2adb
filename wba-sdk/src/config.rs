//! The operational knobs the SDK layer's business logic needs: nonce/
//! timestamp skew, token and session lifetimes. `wba-runtime` loads the
//! full `RuntimeConfig` (host, port, paths, exempt routes) and passes
//! this subset down into the handler registry and middleware.

use chrono::Duration;

#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Maximum allowed clock skew between a signed `timestamp` and the
    /// server's clock. Default 5 minutes.
    pub nonce_expire_minutes: i64,
    /// Bearer token lifetime in seconds. Default 1 hour.
    pub token_expire_time_secs: i64,
    /// Session TTL in hours. Default 24 hours.
    pub session_expire_hours: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        AuthConfig {
            nonce_expire_minutes: 5,
            token_expire_time_secs: 3600,
            session_expire_hours: 24,
        }
    }
}

impl AuthConfig {
    pub fn nonce_window(&self) -> Duration {
        Duration::minutes(self.nonce_expire_minutes)
    }

    pub fn token_ttl(&self) -> Duration {
        Duration::seconds(self.token_expire_time_secs)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::hours(self.session_expire_hours)
    }
}
