use std::time::Duration;

/// Accepted values for `HISTORY_RETENTION_DAYS`.
pub const RETENTION_DAYS_RANGE: std::ops::RangeInclusive<i64> = 1..=36_500;

/// Watch API configuration, loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Port the HTTP server binds to.
    pub port: u16,
    /// Period of the full trend recompute.
    pub trend_interval: Duration,
    /// Period of the episode-release notification sweep.
    pub notification_interval: Duration,
    /// Period of the stale-data cleanup.
    pub cleanup_interval: Duration,
    /// Watch-history entries older than this many days are pruned.
    pub history_retention_days: i64,
    /// Reject comments, likes and typing from connections that never joined the room.
    pub require_room_membership: bool,
    /// Leave every room a connection joined when it drops.
    pub leave_on_disconnect: bool,
    /// Deliver notifications only to the owner's connections instead of everyone.
    pub targeted_notifications: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            port: 3000,
            trend_interval: Duration::from_secs(5 * 60),
            notification_interval: Duration::from_secs(10 * 60),
            cleanup_interval: Duration::from_secs(60 * 60),
            history_retention_days: 30,
            require_room_membership: false,
            leave_on_disconnect: true,
            targeted_notifications: false,
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// Every variable is optional; unset or unparsable values fall back to
    /// [`Config::default`].
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            port: parsed_var("PORT").unwrap_or(defaults.port),
            trend_interval: secs_var("TREND_INTERVAL_SECS").unwrap_or(defaults.trend_interval),
            notification_interval: secs_var("NOTIFICATION_INTERVAL_SECS")
                .unwrap_or(defaults.notification_interval),
            cleanup_interval: secs_var("CLEANUP_INTERVAL_SECS")
                .unwrap_or(defaults.cleanup_interval),
            history_retention_days: parsed_var("HISTORY_RETENTION_DAYS")
                .filter(|days| RETENTION_DAYS_RANGE.contains(days))
                .unwrap_or(defaults.history_retention_days),
            require_room_membership: parsed_var("REQUIRE_ROOM_MEMBERSHIP")
                .unwrap_or(defaults.require_room_membership),
            leave_on_disconnect: parsed_var("LEAVE_ON_DISCONNECT")
                .unwrap_or(defaults.leave_on_disconnect),
            targeted_notifications: parsed_var("TARGETED_NOTIFICATIONS")
                .unwrap_or(defaults.targeted_notifications),
        }
    }
}

fn parsed_var<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.trim().parse().ok())
}

fn secs_var(name: &str) -> Option<Duration> {
    parsed_var::<u64>(name)
        .filter(|secs| *secs > 0)
        .map(Duration::from_secs)
}
