//! Identity provider client (password sign-in and token refresh over the
//! provider's REST endpoints) and the session it produces.

use chrono::{DateTime, Duration, Utc};
use reqwest::Client as HttpClient;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};
use url::Url;

use crate::error::{AuthError, AuthResult};
use crate::models::AuthUser;

pub mod store;

pub use store::SessionStore;

/// Tokens this close to expiry are refreshed before use.
pub const REFRESH_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub user: AuthUser,
    pub id_token: String,
    pub refresh_token: String,
    pub expires_at: DateTime<Utc>,
}

impl Session {
    pub fn needs_refresh(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now <= Duration::seconds(REFRESH_MARGIN_SECS)
    }
}

#[derive(Clone)]
pub struct IdentityClient {
    http: HttpClient,
    auth_url: Url,
    token_url: Url,
    api_key: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PasswordSignIn<'a> {
    email: &'a str,
    password: &'a str,
    return_secure_token: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct SignInResponse {
    local_id: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    display_name: Option<String>,
    #[serde(default)]
    photo_url: Option<String>,
    id_token: String,
    refresh_token: String,
    expires_in: String,
}

#[derive(Deserialize)]
struct RefreshResponse {
    id_token: String,
    refresh_token: String,
    expires_in: String,
    #[serde(default)]
    user_id: Option<String>,
}

#[derive(Deserialize)]
struct ProviderErrorBody {
    error: ProviderError,
}

#[derive(Deserialize)]
struct ProviderError {
    message: String,
}

impl IdentityClient {
    pub fn new(http: HttpClient, auth_url: Url, token_url: Url, api_key: Option<String>) -> Self {
        Self { http, auth_url, token_url, api_key }
    }

    fn key(&self) -> AuthResult<&str> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or(AuthError::MissingApiKey)
    }

    fn endpoint(&self, method: &str) -> String {
        format!("{}/{}", self.auth_url.as_str().trim_end_matches('/'), method)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> AuthResult<Session> {
        let key = self.key()?;
        let body = PasswordSignIn { email, password, return_secure_token: true };
        let resp = self
            .http
            .post(self.endpoint("accounts:signInWithPassword"))
            .query(&[("key", key)])
            .json(&body)
            .send()
            .await?;

        let text = decode_or_provider_error(resp).await?;
        let data: SignInResponse = serde_json::from_str(&text)?;
        info!(uid = %data.local_id, "signed in");

        Ok(Session {
            user: AuthUser {
                uid: data.local_id,
                display_name: data.display_name.filter(|s| !s.is_empty()),
                email: data.email,
                photo_url: data.photo_url.filter(|s| !s.is_empty()),
            },
            id_token: data.id_token,
            refresh_token: data.refresh_token,
            expires_at: expiry(&data.expires_in),
        })
    }

    /// Exchanges the refresh token for a new id token, keeping the user profile.
    pub async fn refresh(&self, session: &Session) -> AuthResult<Session> {
        let key = self.key()?;
        let resp = self
            .http
            .post(self.token_url.clone())
            .query(&[("key", key)])
            .form(&[
                ("grant_type", "refresh_token"),
                ("refresh_token", session.refresh_token.as_str()),
            ])
            .send()
            .await?;

        let text = decode_or_provider_error(resp).await?;
        let data: RefreshResponse = serde_json::from_str(&text)?;
        if let Some(uid) = data.user_id.as_deref() {
            if uid != session.user.uid {
                warn!(expected = %session.user.uid, got = %uid, "refresh returned another user");
            }
        }
        debug!(uid = %session.user.uid, "token refreshed");

        Ok(Session {
            user: session.user.clone(),
            id_token: data.id_token,
            refresh_token: data.refresh_token,
            expires_at: expiry(&data.expires_in),
        })
    }
}

async fn decode_or_provider_error(resp: reqwest::Response) -> AuthResult<String> {
    let status = resp.status();
    let text = resp.text().await?;
    if status.is_success() {
        return Ok(text);
    }
    let code = serde_json::from_str::<ProviderErrorBody>(&text)
        .map(|b| b.error.message)
        .unwrap_or_else(|_| format!("identity provider returned {status}"));
    warn!(%status, %code, "identity provider rejected request");
    Err(AuthError::Provider(code))
}

fn expiry(expires_in: &str) -> DateTime<Utc> {
    let secs = expires_in.trim().parse::<i64>().unwrap_or(3600);
    Utc::now() + Duration::seconds(secs)
}
