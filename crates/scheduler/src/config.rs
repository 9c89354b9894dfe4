use anyhow::{Context, Result};
use chrono_tz::Tz;
use clap::{Parser, ValueEnum};

/// Which events an edit or delete of a recurring event reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum CascadeScope {
    /// Every event of the user with the same recurrence and custom pattern.
    #[default]
    Pattern,
    /// Only events that share the target's series id.
    Series,
}

#[derive(Debug, Clone, Parser)]
#[command(name = "scheduler")]
#[command(about = "Event scheduling backend: events, recurrence cascades and collision checks")]
pub struct AppConfig {
    /// Postgres connection string.
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: String,

    /// Connect to Postgres over TLS using the bundled web PKI roots.
    #[arg(long, env = "DATABASE_TLS", default_value_t = false)]
    pub database_tls: bool,

    /// Maximum number of pooled database connections.
    #[arg(long, env = "DATABASE_POOL_SIZE", default_value_t = 10)]
    pub database_pool_size: usize,

    /// Port the HTTP server listens on.
    #[arg(short, long, env = "PORT", default_value_t = 3000)]
    pub port: u16,

    /// IANA time zone used to turn dates and times of day into instants.
    #[arg(long, env = "SCHEDULER_TIMEZONE", default_value = "UTC")]
    pub timezone: String,

    /// Cascade scope for edits and deletes of recurring events.
    #[arg(long, env = "CASCADE_SCOPE", value_enum, default_value_t = CascadeScope::Pattern)]
    pub cascade_scope: CascadeScope,

    /// Request header carrying the caller's email, set by the auth proxy.
    #[arg(long, env = "IDENTITY_HEADER", default_value = "x-user-email")]
    pub identity_header: String,

    /// Comma-separated list of allowed CORS origins. Permissive when unset.
    #[arg(long, env = "CORS_ALLOWED_ORIGINS")]
    pub cors_allowed_origins: Option<String>,
}

impl AppConfig {
    pub fn time_zone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow::anyhow!(e))
            .with_context(|| format!("SCHEDULER_TIMEZONE '{}' is not a valid zone", self.timezone))
    }
}
