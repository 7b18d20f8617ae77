use chrono::{DateTime, Duration, Timelike, Utc};
use std::sync::Mutex;

const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M%S";

type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Issues `<yyyyMMddHHmmss>_<label>` ids whose timestamps strictly increase
/// across calls, even when several calls land in the same wall-clock second.
pub struct IdGenerator {
    clock: Clock,
    last_issued: Mutex<Option<DateTime<Utc>>>,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::with_clock(Utc::now)
    }

    pub fn with_clock<F>(clock: F) -> Self
    where
        F: Fn() -> DateTime<Utc> + Send + Sync + 'static,
    {
        Self {
            clock: Box::new(clock),
            last_issued: Mutex::new(None),
        }
    }

    pub fn generate(&self, label: &str) -> String {
        let now = (self.clock)();
        let now = now.with_nanosecond(0).unwrap_or(now);

        let mut last = self
            .last_issued
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        let timestamp = match *last {
            Some(previous) if now <= previous => previous + Duration::seconds(1),
            _ => now,
        };
        *last = Some(timestamp);

        format!("{}_{}", timestamp.format(TIMESTAMP_FORMAT), label)
    }
}

impl Default for IdGenerator {
    fn default() -> Self {
        Self::new()
    }
}
