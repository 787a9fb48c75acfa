use serde::Deserialize;

/// Default SMTP port (STARTTLS).
const DEFAULT_SMTP_PORT: u16 = 587;

/// Default sender used when `EMAIL_FROM` is not set.
const DEFAULT_EMAIL_FROM: &str = "ConferNet <noreply@confernet.local>";

/// Global application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// PostgreSQL connection string
    pub database_url: String,

    /// Maximum number of PostgreSQL connections in the pool (default: 20)
    pub db_max_connections: u32,

    /// Port the HTTP API binds to (default: 5003)
    pub api_port: u16,

    /// SMTP relay host. When unset, outgoing mail is only logged.
    pub smtp_host: Option<String>,

    /// SMTP relay port (default: 587)
    pub smtp_port: u16,

    /// Optional SMTP username
    pub smtp_user: Option<String>,

    /// Optional SMTP password
    pub smtp_password: Option<String>,

    /// RFC 5322 "From" address for notification mail
    pub email_from: String,
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")
                .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?,
            db_max_connections: std::env::var("DB_MAX_CONNECTIONS")
                .unwrap_or_else(|_| "20".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("DB_MAX_CONNECTIONS must be a valid u32"))?,
            api_port: std::env::var("API_PORT")
                .unwrap_or_else(|_| "5003".to_string())
                .parse()
                .map_err(|_| anyhow::anyhow!("API_PORT must be a valid u16"))?,
            smtp_host: std::env::var("SMTP_HOST").ok().filter(|h| !h.is_empty()),
            smtp_port: match std::env::var("SMTP_PORT") {
                Ok(port) => port
                    .parse()
                    .map_err(|_| anyhow::anyhow!("SMTP_PORT must be a valid u16"))?,
                Err(_) => DEFAULT_SMTP_PORT,
            },
            smtp_user: std::env::var("SMTP_USER").ok(),
            smtp_password: std::env::var("SMTP_PASSWORD").ok(),
            email_from: std::env::var("EMAIL_FROM")
                .unwrap_or_else(|_| DEFAULT_EMAIL_FROM.to_string()),
        })
    }
}
