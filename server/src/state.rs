//! Everything the handlers share.

use crate::auth::OAuthStates;
use crate::captcha::CaptchaStore;
use crate::config::{ServerConfig, non_empty};
use crate::rate_limit::RateLimits;
use chrono::Utc;
use ed25519_dalek::VerifyingKey;
use jobhunter_commerce::{
    AccountService, AffiliateService, AnalyticsService, CatalogService, CheckoutService,
    CommerceConfig, CommerceError, ContentService, InvoiceService, LicensingService,
    TicketService,
};
use jobhunter_integrations::{
    CheckoutProvider, HttpMailer, HttpMailerConfig, IntegrationError, LogMailer, Mailer,
    OAuthConfig, OAuthProvider, PayPalClient, PayPalConfig, RecaptchaConfig, RecaptchaVerifier,
    StripeClient, StripeConfig,
};
use jobhunter_license::{LicenseCertificate, LicenseError};
use jobhunter_store::{Store, StoreError};
use jobhunter_types::SocialProvider;
use std::collections::HashMap;
use std::sync::Arc;
use thiserror::Error;
use tracing::{info, warn};

pub type SharedState = Arc<AppState>;

/// Failures while assembling the application at startup.
#[derive(Debug, Error)]
pub enum StartupError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    License(#[from] LicenseError),

    #[error(transparent)]
    Commerce(#[from] CommerceError),

    #[error(transparent)]
    Integration(#[from] IntegrationError),
}

/// Chat credentials from the environment, used when the settings table
/// has none.
#[derive(Debug, Clone, Default)]
pub struct ChatDefaults {
    pub api_key: Option<String>,
    pub api_base_url: Option<String>,
}

pub struct AppState {
    pub store: Store,
    pub config: CommerceConfig,
    pub catalog: CatalogService,
    pub checkout: CheckoutService,
    pub affiliate: AffiliateService,
    pub invoices: InvoiceService,
    pub licensing: LicensingService,
    pub tickets: TicketService,
    pub accounts: AccountService,
    pub analytics: AnalyticsService,
    pub content: ContentService,
    pub paypal: Option<PayPalClient>,
    pub stripe_webhook_secret: Option<String>,
    pub recaptcha: Option<RecaptchaVerifier>,
    pub oauth: HashMap<SocialProvider, OAuthProvider>,
    pub chat: ChatDefaults,
    pub verifying_key: Option<VerifyingKey>,
    pub captcha: CaptchaStore,
    pub oauth_states: OAuthStates,
    pub limits: RateLimits,
    /// Client addresses come from the proxy's forwarded hop.
    pub trust_proxy: bool,
    /// Allowed browser origin; any origin when unset.
    pub cors_origin: Option<String>,
}

fn mailer(config: &ServerConfig) -> Result<Arc<dyn Mailer>, StartupError> {
    match non_empty(&config.mail_api_key) {
        Some(key) => {
            let mut mail = HttpMailerConfig {
                api_key: key.to_string(),
                ..HttpMailerConfig::default()
            };
            if let Some(from) = non_empty(&config.mail_from) {
                mail.from_address = from.to_string();
            }
            if let Some(url) = non_empty(&config.mail_api_url) {
                mail.api_base_url = url.to_string();
            }
            Ok(Arc::new(HttpMailer::new(mail)?))
        }
        None => {
            warn!("MAIL_API_KEY not set, emails will only be logged");
            Ok(Arc::new(LogMailer))
        }
    }
}

fn stripe(config: &ServerConfig) -> Result<Option<Arc<dyn CheckoutProvider>>, StartupError> {
    let Some(key) = non_empty(&config.stripe_secret_key) else {
        warn!("STRIPE_SECRET_KEY not set, card checkout disabled");
        return Ok(None);
    };
    let mut stripe = StripeConfig {
        secret_key: key.to_string(),
        webhook_secret: non_empty(&config.stripe_webhook_secret).map(str::to_string),
        ..StripeConfig::default()
    };
    if let Some(url) = non_empty(&config.stripe_api_url) {
        stripe.api_base_url = url.to_string();
    }
    Ok(Some(Arc::new(StripeClient::new(stripe)?)))
}

fn paypal(config: &ServerConfig) -> Result<Option<PayPalClient>, StartupError> {
    let (Some(id), Some(secret)) = (
        non_empty(&config.paypal_client_id),
        non_empty(&config.paypal_client_secret),
    ) else {
        warn!("PayPal credentials not set, PayPal checkout disabled");
        return Ok(None);
    };
    let mut paypal = PayPalConfig {
        client_id: id.to_string(),
        client_secret: secret.to_string(),
        ..PayPalConfig::default()
    };
    if let Some(url) = non_empty(&config.paypal_api_url) {
        paypal.api_base_url = url.to_string();
    }
    Ok(Some(PayPalClient::new(paypal)?))
}

fn recaptcha(config: &ServerConfig) -> Result<Option<RecaptchaVerifier>, StartupError> {
    let Some(secret) = non_empty(&config.recaptcha_secret_key) else {
        return Ok(None);
    };
    let mut recaptcha = RecaptchaConfig {
        secret_key: secret.to_string(),
        ..RecaptchaConfig::default()
    };
    if let Some(url) = non_empty(&config.recaptcha_api_url) {
        recaptcha.api_base_url = url.to_string();
    }
    Ok(Some(RecaptchaVerifier::new(recaptcha)?))
}

fn oauth_providers(
    config: &ServerConfig,
    commerce: &CommerceConfig,
) -> Result<HashMap<SocialProvider, OAuthProvider>, StartupError> {
    let credentials = [
        (
            SocialProvider::Google,
            &config.google_client_id,
            &config.google_client_secret,
        ),
        (
            SocialProvider::GitHub,
            &config.github_client_id,
            &config.github_client_secret,
        ),
        (
            SocialProvider::Facebook,
            &config.facebook_app_id,
            &config.facebook_app_secret,
        ),
    ];
    let mut providers = HashMap::new();
    for (provider, id, secret) in credentials {
        let (Some(id), Some(secret)) = (non_empty(id), non_empty(secret)) else {
            continue;
        };
        let redirect = commerce.url(&format!("/api/auth/{provider}/callback"));
        let client = OAuthProvider::new(
            provider,
            OAuthConfig::for_provider(provider, id, secret, &redirect),
        )?;
        providers.insert(provider, client);
    }
    info!(count = providers.len(), "social sign-in providers configured");
    Ok(providers)
}

impl AppState {
    /// Builds the services over `store`. Integrations without credentials
    /// are left disabled.
    pub fn new(config: &ServerConfig, store: Store) -> Result<Self, StartupError> {
        let now = Utc::now();
        let commerce = CommerceConfig {
            base_url: config.base_url.trim_end_matches('/').to_string(),
            ..CommerceConfig::default()
        };
        let mailer = mailer(config)?;

        let signing_key = match non_empty(&config.license_signing_key) {
            Some(hex) => Some(Arc::new(LicenseCertificate::signing_key_from_hex(hex)?)),
            None => {
                warn!("LICENSE_SIGNING_KEY not set, activations will not carry certificates");
                None
            }
        };
        let verifying_key = signing_key.as_deref().map(|key| key.verifying_key());

        let accounts = AccountService::new(store.clone());
        if let (Some(username), Some(email), Some(password)) = (
            non_empty(&config.admin_username),
            non_empty(&config.admin_email),
            non_empty(&config.admin_password),
        ) {
            accounts.bootstrap_admin(username, email, password, now)?;
        }
        store.seed_dashboard_features(now)?;
        let purged = store.purge_expired_sessions(now)?;
        if purged > 0 {
            info!(purged, "removed expired sessions");
        }

        let affiliate = AffiliateService::new(store.clone(), commerce.clone(), Arc::clone(&mailer));
        Ok(Self {
            catalog: CatalogService::new(store.clone()),
            checkout: CheckoutService::new(
                store.clone(),
                commerce.clone(),
                Arc::clone(&mailer),
                stripe(config)?,
            ),
            invoices: InvoiceService::new(store.clone(), commerce.clone()),
            licensing: LicensingService::new(store.clone(), signing_key),
            tickets: TicketService::new(store.clone()),
            analytics: AnalyticsService::new(store.clone(), affiliate.clone()),
            content: ContentService::new(store.clone()),
            affiliate,
            accounts,
            paypal: paypal(config)?,
            stripe_webhook_secret: non_empty(&config.stripe_webhook_secret).map(str::to_string),
            recaptcha: recaptcha(config)?,
            oauth: oauth_providers(config, &commerce)?,
            chat: ChatDefaults {
                api_key: non_empty(&config.openai_api_key).map(str::to_string),
                api_base_url: non_empty(&config.openai_api_url).map(str::to_string),
            },
            verifying_key,
            captcha: CaptchaStore::new(),
            oauth_states: OAuthStates::default(),
            limits: RateLimits::default(),
            trust_proxy: config.trust_proxy,
            cors_origin: non_empty(&config.cors_origin).map(str::to_string),
            config: commerce,
            store,
        })
    }
}
