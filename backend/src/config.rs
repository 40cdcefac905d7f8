use std::str::FromStr;
use std::time::Duration;

#[derive(Clone, Debug)]
pub struct AppConfig {
    /// Database connection string.
    pub database_url: String,

    // =========================
    // Scheduling configuration
    // =========================
    /// Number of workers shared by every periodic job in the process.
    ///
    /// More running counters than workers does not fail new starts;
    /// ticks queue for a free worker and jitter grows.
    pub pool_workers: usize,

    /// Time between two ticks of one counter (one counter unit per period).
    pub tick_period: Duration,

    /// Reschedule counters left `RUNNING` in the store by a previous process.
    ///
    /// Without this, such tasks would never tick again.
    pub resume_on_startup: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://tasks_dev.db?mode=rwc".to_string(),
            pool_workers: 4,
            tick_period: Duration::from_secs(1),
            resume_on_startup: true,
        }
    }
}

impl AppConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from an arbitrary key lookup; unset keys keep defaults.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let database_url = lookup("DATABASE_URL").unwrap_or(defaults.database_url);

        let pool_workers = parse_or("TASKS_POOL_WORKERS", &lookup, defaults.pool_workers).max(1);

        let tick_period_ms = parse_or(
            "TASKS_TICK_PERIOD_MS",
            &lookup,
            defaults.tick_period.as_millis() as u64,
        );

        let resume_on_startup =
            parse_or("TASKS_RESUME_ON_STARTUP", &lookup, defaults.resume_on_startup);

        Self {
            database_url,
            pool_workers,
            tick_period: Duration::from_millis(tick_period_ms.max(1)),
            resume_on_startup,
        }
    }
}

fn parse_or<T>(key: &str, lookup: &impl Fn(&str) -> Option<String>, default: T) -> T
where
    T: FromStr + Copy + std::fmt::Debug,
{
    match lookup(key) {
        None => default,
        Some(raw) => match raw.trim().parse::<T>() {
            Ok(v) => v,
            Err(_) => {
                tracing::warn!(key, value = %raw, ?default, "unparseable config value; using default");
                default
            }
        },
    }
}
