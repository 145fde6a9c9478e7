use reqwest::StatusCode;
use thiserror::Error;

pub type ApiResult<T> = Result<T, ApiError>;

/// Failures talking to the DevBills backend.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("server returned {status}: {message}")]
    Server { status: StatusCode, message: String },

    #[error("not signed in")]
    Unauthenticated,

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("invalid url: {0}")]
    Url(#[from] url::ParseError),
}

impl ApiError {
    pub fn status(&self) -> Option<StatusCode> {
        match self {
            Self::Server { status, .. } => Some(*status),
            _ => None,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthenticated)
            || self.status() == Some(StatusCode::UNAUTHORIZED)
    }
}

pub type AuthResult<T> = Result<T, AuthError>;

/// Failures talking to the identity provider or the local session store.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("{}", describe_provider_code(.0))]
    Provider(String),

    #[error("identity provider API key is not configured")]
    MissingApiKey,

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("session store: {0}")]
    Store(#[from] std::io::Error),
}

/// Readable text for the provider's error codes; unknown codes are shown as-is.
fn describe_provider_code(code: &str) -> String {
    // Codes may carry a suffix, e.g. "WEAK_PASSWORD : Password should be ..."
    let head = code.split(':').next().unwrap_or(code).trim();
    match head {
        "EMAIL_NOT_FOUND" | "INVALID_PASSWORD" | "INVALID_LOGIN_CREDENTIALS" => {
            "Invalid email or password".to_string()
        }
        "USER_DISABLED" => "This account has been disabled".to_string(),
        "TOO_MANY_ATTEMPTS_TRY_LATER" => "Too many attempts, try again later".to_string(),
        "TOKEN_EXPIRED" | "INVALID_REFRESH_TOKEN" | "USER_NOT_FOUND" => {
            "Session expired, sign in again".to_string()
        }
        "INVALID_EMAIL" => "Invalid email address".to_string(),
        _ => code.to_string(),
    }
}
