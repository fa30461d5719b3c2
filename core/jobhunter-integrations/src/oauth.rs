//! OAuth 2.0 social sign-in for Google, GitHub and Facebook.
//!
//! The flow is the plain authorization-code grant: redirect the browser to
//! [`OAuthProvider::authorize_url`], exchange the returned code for an
//! access token, then read the user's profile with it.

use crate::error::{IntegrationError, IntegrationResult};
use crate::{ensure_success, http_client};
use jobhunter_types::SocialProvider;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::debug;

/// Client registration and endpoints for one provider.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuthConfig {
    pub client_id: String,
    pub client_secret: String,
    pub redirect_uri: String,
    pub authorize_endpoint: String,
    pub token_endpoint: String,
    pub profile_endpoint: String,
    pub scope: String,
}

impl OAuthConfig {
    pub fn google(client_id: &str, client_secret: &str, redirect_uri: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            authorize_endpoint: "https://accounts.google.com/o/oauth2/v2/auth".to_string(),
            token_endpoint: "https://oauth2.googleapis.com/token".to_string(),
            profile_endpoint: "https://www.googleapis.com/oauth2/v2/userinfo".to_string(),
            scope: "profile email".to_string(),
        }
    }

    pub fn github(client_id: &str, client_secret: &str, redirect_uri: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            authorize_endpoint: "https://github.com/login/oauth/authorize".to_string(),
            token_endpoint: "https://github.com/login/oauth/access_token".to_string(),
            profile_endpoint: "https://api.github.com/user".to_string(),
            scope: "user:email".to_string(),
        }
    }

    pub fn facebook(client_id: &str, client_secret: &str, redirect_uri: &str) -> Self {
        Self {
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            redirect_uri: redirect_uri.to_string(),
            authorize_endpoint: "https://www.facebook.com/v18.0/dialog/oauth".to_string(),
            token_endpoint: "https://graph.facebook.com/v18.0/oauth/access_token".to_string(),
            profile_endpoint: "https://graph.facebook.com/me".to_string(),
            scope: "email".to_string(),
        }
    }

    /// Default endpoints for `provider`.
    pub fn for_provider(
        provider: SocialProvider,
        client_id: &str,
        client_secret: &str,
        redirect_uri: &str,
    ) -> Self {
        match provider {
            SocialProvider::Google => Self::google(client_id, client_secret, redirect_uri),
            SocialProvider::GitHub => Self::github(client_id, client_secret, redirect_uri),
            SocialProvider::Facebook => Self::facebook(client_id, client_secret, redirect_uri),
        }
    }
}

/// The identity a provider vouches for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SocialProfile {
    pub provider: SocialProvider,
    pub provider_id: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub avatar: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GoogleUser {
    id: String,
    email: Option<String>,
    name: Option<String>,
    picture: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubUser {
    id: u64,
    login: String,
    name: Option<String>,
    email: Option<String>,
    avatar_url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GitHubEmail {
    email: String,
    primary: bool,
    verified: bool,
}

#[derive(Debug, Deserialize)]
struct FacebookUser {
    id: String,
    name: Option<String>,
    email: Option<String>,
    picture: Option<FacebookPicture>,
}

#[derive(Debug, Deserialize)]
struct FacebookPicture {
    data: FacebookPictureData,
}

#[derive(Debug, Deserialize)]
struct FacebookPictureData {
    url: Option<String>,
}

/// One configured social sign-in provider.
pub struct OAuthProvider {
    provider: SocialProvider,
    config: OAuthConfig,
    client: Client,
}

impl OAuthProvider {
    pub fn new(provider: SocialProvider, config: OAuthConfig) -> IntegrationResult<Self> {
        if config.client_id.is_empty() || config.client_secret.is_empty() {
            return Err(IntegrationError::Config(format!(
                "{provider} OAuth client id and secret are required"
            )));
        }
        Ok(Self {
            provider,
            config,
            client: http_client(Duration::from_secs(15))?,
        })
    }

    #[must_use]
    pub fn provider(&self) -> SocialProvider {
        self.provider
    }

    /// URL to send the browser to. `state` comes back on the callback.
    #[must_use]
    pub fn authorize_url(&self, state: &str) -> String {
        let mut url = format!(
            "{}?client_id={}&redirect_uri={}&response_type=code&scope={}&state={}",
            self.config.authorize_endpoint,
            urlencoding::encode(&self.config.client_id),
            urlencoding::encode(&self.config.redirect_uri),
            urlencoding::encode(&self.config.scope),
            urlencoding::encode(state),
        );
        if self.provider == SocialProvider::Google {
            url.push_str("&access_type=online&prompt=select_account");
        }
        url
    }

    /// Exchanges an authorization code for an access token.
    pub async fn exchange_code(&self, code: &str) -> IntegrationResult<String> {
        let params = [
            ("client_id", self.config.client_id.as_str()),
            ("client_secret", self.config.client_secret.as_str()),
            ("redirect_uri", self.config.redirect_uri.as_str()),
            ("code", code),
            ("grant_type", "authorization_code"),
        ];
        let request = match self.provider {
            SocialProvider::Facebook => self.client.get(&self.config.token_endpoint).query(&params),
            _ => self.client.post(&self.config.token_endpoint).form(&params),
        };
        let response = request
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| IntegrationError::network("token exchange failed", e))?;
        let response = ensure_success(self.service(), response).await?;
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| IntegrationError::decode("failed to parse token response", e))?;

        // GitHub reports a bad code as 200 with an error field.
        if let Some(error) = token.error {
            return Err(IntegrationError::Api {
                service: self.service(),
                status: 400,
                body: token.error_description.unwrap_or(error),
            });
        }
        debug!(provider = %self.provider, "exchanged OAuth code");
        token.access_token.ok_or_else(|| {
            IntegrationError::UnexpectedResponse("token response without access_token".to_string())
        })
    }

    /// Reads the signed-in user's profile.
    pub async fn fetch_profile(&self, access_token: &str) -> IntegrationResult<SocialProfile> {
        match self.provider {
            SocialProvider::Google => {
                let user: GoogleUser = self.get_json(&self.config.profile_endpoint, access_token).await?;
                Ok(SocialProfile {
                    provider: self.provider,
                    provider_id: user.id,
                    email: user.email,
                    name: user.name,
                    avatar: user.picture,
                })
            }
            SocialProvider::GitHub => {
                let user: GitHubUser = self.get_json(&self.config.profile_endpoint, access_token).await?;
                let email = match user.email {
                    Some(email) => Some(email),
                    None => self.github_primary_email(access_token).await?,
                };
                Ok(SocialProfile {
                    provider: self.provider,
                    provider_id: user.id.to_string(),
                    email,
                    name: user.name.or(Some(user.login)),
                    avatar: user.avatar_url,
                })
            }
            SocialProvider::Facebook => {
                let url = format!(
                    "{}?fields=id,name,email,picture.type(large)",
                    self.config.profile_endpoint
                );
                let user: FacebookUser = self.get_json(&url, access_token).await?;
                Ok(SocialProfile {
                    provider: self.provider,
                    provider_id: user.id,
                    email: user.email,
                    name: user.name,
                    avatar: user.picture.and_then(|p| p.data.url),
                })
            }
        }
    }

    /// GitHub hides private addresses from `/user`; ask `/user/emails`.
    async fn github_primary_email(&self, access_token: &str) -> IntegrationResult<Option<String>> {
        let url = format!("{}/emails", self.config.profile_endpoint);
        let emails: Vec<GitHubEmail> = self.get_json(&url, access_token).await?;
        Ok(emails
            .into_iter()
            .filter(|e| e.verified)
            .max_by_key(|e| e.primary)
            .map(|e| e.email))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        url: &str,
        access_token: &str,
    ) -> IntegrationResult<T> {
        let response = self
            .client
            .get(url)
            .bearer_auth(access_token)
            .header(reqwest::header::USER_AGENT, "ocus-job-hunter")
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| IntegrationError::network("profile request failed", e))?;
        let response = ensure_success(self.service(), response).await?;
        response
            .json()
            .await
            .map_err(|e| IntegrationError::decode("failed to parse profile", e))
    }

    fn service(&self) -> &'static str {
        self.provider.as_str()
    }
}
