//! Command line and environment configuration.

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug, Clone)]
#[command(name = "jobhunter-server")]
#[command(about = "Job Hunter storefront and extension licensing API")]
pub struct ServerConfig {
    /// Port to listen on
    #[arg(short, long, env = "PORT", default_value = "5000")]
    pub port: u16,

    /// Address to bind
    #[arg(long, env = "HOST", default_value = "0.0.0.0")]
    pub host: String,

    /// SQLite database file
    #[arg(long = "database", env = "DATABASE_PATH", default_value = "jobhunter.db")]
    pub database: PathBuf,

    /// Public URL of the site, used in emails and redirects
    #[arg(long, env = "BASE_URL", default_value = "http://localhost:5000")]
    pub base_url: String,

    /// Allowed CORS origin; any origin when unset
    #[arg(long, env = "CORS_ORIGIN")]
    pub cors_origin: Option<String>,

    /// Take client addresses from the hop a reverse proxy appends to
    /// X-Forwarded-For
    #[arg(long, env = "TRUST_PROXY")]
    pub trust_proxy: bool,

    // ── Payments ─────────────────────────────────────────────────
    #[arg(long, env = "STRIPE_SECRET_KEY", hide_env_values = true)]
    pub stripe_secret_key: Option<String>,

    #[arg(long, env = "STRIPE_WEBHOOK_SECRET", hide_env_values = true)]
    pub stripe_webhook_secret: Option<String>,

    #[arg(long, env = "STRIPE_API_URL")]
    pub stripe_api_url: Option<String>,

    #[arg(long, env = "PAYPAL_CLIENT_ID")]
    pub paypal_client_id: Option<String>,

    #[arg(long, env = "PAYPAL_CLIENT_SECRET", hide_env_values = true)]
    pub paypal_client_secret: Option<String>,

    /// PayPal API base URL (sandbox when unset)
    #[arg(long, env = "PAYPAL_API_URL")]
    pub paypal_api_url: Option<String>,

    // ── Chat, mail, captcha ──────────────────────────────────────
    /// Fallback OpenAI key when none is stored in settings
    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    pub openai_api_key: Option<String>,

    #[arg(long, env = "OPENAI_API_URL")]
    pub openai_api_url: Option<String>,

    #[arg(long, env = "MAIL_API_KEY", hide_env_values = true)]
    pub mail_api_key: Option<String>,

    #[arg(long, env = "MAIL_FROM")]
    pub mail_from: Option<String>,

    #[arg(long, env = "MAIL_API_URL")]
    pub mail_api_url: Option<String>,

    #[arg(long, env = "RECAPTCHA_SECRET_KEY", hide_env_values = true)]
    pub recaptcha_secret_key: Option<String>,

    #[arg(long, env = "RECAPTCHA_API_URL")]
    pub recaptcha_api_url: Option<String>,

    // ── Social sign-in ───────────────────────────────────────────
    #[arg(long, env = "GOOGLE_CLIENT_ID")]
    pub google_client_id: Option<String>,

    #[arg(long, env = "GOOGLE_CLIENT_SECRET", hide_env_values = true)]
    pub google_client_secret: Option<String>,

    #[arg(long, env = "GITHUB_CLIENT_ID")]
    pub github_client_id: Option<String>,

    #[arg(long, env = "GITHUB_CLIENT_SECRET", hide_env_values = true)]
    pub github_client_secret: Option<String>,

    #[arg(long, env = "FACEBOOK_APP_ID")]
    pub facebook_app_id: Option<String>,

    #[arg(long, env = "FACEBOOK_APP_SECRET", hide_env_values = true)]
    pub facebook_app_secret: Option<String>,

    // ── Licensing and admin ──────────────────────────────────────
    /// Hex encoded 32 byte Ed25519 seed for license certificates
    #[arg(long, env = "LICENSE_SIGNING_KEY", hide_env_values = true)]
    pub license_signing_key: Option<String>,

    /// Creates this admin on startup when no admin exists
    #[arg(long, env = "ADMIN_USERNAME")]
    pub admin_username: Option<String>,

    #[arg(long, env = "ADMIN_EMAIL")]
    pub admin_email: Option<String>,

    #[arg(long, env = "ADMIN_PASSWORD", hide_env_values = true)]
    pub admin_password: Option<String>,

    /// Enable verbose debug logging
    #[arg(short, long)]
    pub verbose: bool,
}

/// Treats empty strings like missing values.
pub(crate) fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl ServerConfig {
    /// Configuration with every optional integration disabled.
    #[must_use]
    pub fn minimal(base_url: &str) -> Self {
        Self {
            port: 0,
            host: "127.0.0.1".to_string(),
            database: PathBuf::from(":memory:"),
            base_url: base_url.to_string(),
            cors_origin: None,
            trust_proxy: false,
            stripe_secret_key: None,
            stripe_webhook_secret: None,
            stripe_api_url: None,
            paypal_client_id: None,
            paypal_client_secret: None,
            paypal_api_url: None,
            openai_api_key: None,
            openai_api_url: None,
            mail_api_key: None,
            mail_from: None,
            mail_api_url: None,
            recaptcha_secret_key: None,
            recaptcha_api_url: None,
            google_client_id: None,
            google_client_secret: None,
            github_client_id: None,
            github_client_secret: None,
            facebook_app_id: None,
            facebook_app_secret: None,
            license_signing_key: None,
            admin_username: None,
            admin_email: None,
            admin_password: None,
            verbose: false,
        }
    }

    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_documentation() {
        let config = ServerConfig::try_parse_from(["jobhunter-server"]).unwrap();
        assert_eq!(config.port, 5000);
        assert_eq!(config.database, PathBuf::from("jobhunter.db"));
        assert!(!config.verbose);
        assert!(!config.trust_proxy);
    }

    #[test]
    fn flags_override_defaults() {
        let config = ServerConfig::try_parse_from([
            "jobhunter-server",
            "--port",
            "8080",
            "--database",
            "/tmp/shop.db",
            "--trust-proxy",
            "-v",
        ])
        .unwrap();
        assert_eq!(config.bind_address(), format!("{}:8080", config.host));
        assert_eq!(config.database, PathBuf::from("/tmp/shop.db"));
        assert!(config.verbose);
        assert!(config.trust_proxy);
    }

    #[test]
    fn blank_values_count_as_unset() {
        assert_eq!(non_empty(&Some("  ".to_string())), None);
        assert_eq!(non_empty(&Some(" sk_test ".to_string())), Some("sk_test"));
        assert_eq!(non_empty(&None), None);
    }
}
