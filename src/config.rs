use std::env;

/// Fallback signing secret for local runs. Production refuses to start without
/// `SESSION_SECRET`.
const LOCAL_SESSION_SECRET: &str = "local-session-secret-change-me";

/// AppConfig
///
/// Application configuration, read once at startup and immutable afterwards.
/// Pulled into handlers through `FromRef`.
#[derive(Clone, Debug)]
pub struct AppConfig {
    // Runtime environment marker. Production turns on the Secure cookie flag.
    pub env: Env,
    // Postgres connection string. `None` selects the in-memory repository (local only).
    pub db_url: Option<String>,
    pub port: u16,
    // Key that signs the session cookie.
    pub session_secret: String,
    pub db_max_connections: u32,
    // bcrypt work factor for new password hashes.
    pub bcrypt_cost: u32,
}

/// Env
///
/// Deployment context: `local` for development, `production` behind HTTPS.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Env {
    Local,
    Production,
}

impl Default for AppConfig {
    /// Non-panicking configuration for tests: local, in-memory, cheap hashing.
    fn default() -> Self {
        Self {
            env: Env::Local,
            db_url: None,
            port: 3000,
            session_secret: LOCAL_SESSION_SECRET.to_string(),
            db_max_connections: 5,
            bcrypt_cost: 4,
        }
    }
}

impl AppConfig {
    pub fn is_production(&self) -> bool {
        self.env == Env::Production
    }

    /// load
    ///
    /// Reads the configuration from the environment.
    ///
    /// # Panics
    /// Panics in production when `DATABASE_URL` or `SESSION_SECRET` is missing, so the
    /// process never serves with an incomplete or insecure configuration.
    pub fn load() -> Self {
        let env = match env::var("APP_ENV").as_deref() {
            Ok("production") => Env::Production,
            _ => Env::Local,
        };

        let db_url = match env {
            Env::Production => Some(
                env::var("DATABASE_URL").expect("FATAL: DATABASE_URL must be set in production."),
            ),
            Env::Local => env::var("DATABASE_URL").ok().filter(|url| !url.is_empty()),
        };

        let session_secret = match env {
            Env::Production => {
                env::var("SESSION_SECRET").expect("FATAL: SESSION_SECRET must be set in production.")
            }
            Env::Local => {
                env::var("SESSION_SECRET").unwrap_or_else(|_| LOCAL_SESSION_SECRET.to_string())
            }
        };

        Self {
            env,
            db_url,
            port: parse_or("PORT", 3000),
            session_secret,
            db_max_connections: parse_or("DATABASE_MAX_CONNECTIONS", 5),
            bcrypt_cost: parse_or("BCRYPT_COST", bcrypt::DEFAULT_COST),
        }
    }
}

fn parse_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    match env::var(key) {
        Ok(raw) => raw.parse().unwrap_or_else(|_| {
            tracing::warn!("ignoring unparsable {}={:?}", key, raw);
            default
        }),
        Err(_) => default,
    }
}
