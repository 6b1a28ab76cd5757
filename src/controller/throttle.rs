use chrono::{DateTime, Duration, Utc};

/// Minimum spacing between vehicle commands.
///
/// Owned by the decision engine; not persisted, so a restart allows the
/// first command immediately.
#[derive(Debug, Clone)]
pub struct CommandThrottle {
    min_interval: Duration,
    last_command_time: Option<DateTime<Utc>>,
}

impl CommandThrottle {
    pub fn new(min_interval: Duration) -> Self {
        Self {
            min_interval,
            last_command_time: None,
        }
    }

    pub fn from_secs(secs: u64) -> Self {
        let secs = i64::try_from(secs).unwrap_or(i64::MAX).min(i64::MAX / 1000);
        Self::new(Duration::seconds(secs))
    }

    /// Forced commands always pass.
    pub fn allow(&self, now: DateTime<Utc>, force: bool) -> bool {
        if force {
            return true;
        }
        match self.last_command_time {
            None => true,
            Some(last) => now - last >= self.min_interval,
        }
    }

    /// Called after every attempted send, whatever its outcome.
    pub fn record(&mut self, now: DateTime<Utc>) {
        self.last_command_time = Some(now);
    }

    pub fn last_command_time(&self) -> Option<DateTime<Utc>> {
        self.last_command_time
    }

    pub fn secs_since_last_command(&self, now: DateTime<Utc>) -> Option<i64> {
        self.last_command_time.map(|last| (now - last).num_seconds())
    }
}

impl Default for CommandThrottle {
    fn default() -> Self {
        Self::from_secs(120)
    }
}
