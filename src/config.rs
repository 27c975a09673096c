use anyhow::Context;

use crate::capacity::validate_default_capacity;

pub const DEFAULT_MAX_CONNECTIONS: u32 = 5;
pub const FALLBACK_COACH_CAPACITY: f64 = 20.0;

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub max_connections: u32,
    /// Used when the `settings` table has no default capacity stored yet.
    pub fallback_capacity: f64,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let database_url = lookup("DATABASE_URL")
            .context("DATABASE_URL must be set to a production Postgres instance")?;

        let max_connections = match lookup("PG_MAX_CONNECTIONS") {
            Some(raw) => raw
                .parse()
                .with_context(|| format!("PG_MAX_CONNECTIONS is not a number: {raw}"))?,
            None => DEFAULT_MAX_CONNECTIONS,
        };

        let fallback_capacity = match lookup("DEFAULT_COACH_CAPACITY") {
            Some(raw) => {
                let units: f64 = raw
                    .parse()
                    .with_context(|| format!("DEFAULT_COACH_CAPACITY is not a number: {raw}"))?;
                validate_default_capacity(units)?
            }
            None => FALLBACK_COACH_CAPACITY,
        };

        Ok(Self {
            database_url,
            max_connections,
            fallback_capacity,
        })
    }
}
