//! OAuth2 credentials for the Drive API, stored as JSON on disk.

use crate::config::AppConfig;
use crate::drive::http::transport_error;
use crate::error::{ApiError, Error};
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use reqwest::blocking::Client;
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::fs;
use std::io::{self, ErrorKind, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub const DRIVE_SCOPE: &str = "https://www.googleapis.com/auth/drive";

/// Access tokens this close to expiry are refreshed before use.
const EXPIRY_MARGIN_SECS: i64 = 60;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Credentials {
    pub client_id: String,
    pub client_secret: String,
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_expiry: Option<DateTime<Utc>>,
    pub token_uri: String,
}

impl Credentials {
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        match self.token_expiry {
            Some(expiry) => expiry - ChronoDuration::seconds(EXPIRY_MARGIN_SECS) > now,
            None => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    refresh_token: Option<String>,
}

/// Credential file on disk.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stored credentials, or `None` when absent or unreadable.
    pub fn load(&self) -> Result<Option<Credentials>, Error> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&contents) {
            Ok(credentials) => Ok(Some(credentials)),
            Err(e) => {
                warn!(
                    "Ignoring unreadable credential file {}: {}",
                    self.path.display(),
                    e
                );
                Ok(None)
            }
        }
    }

    pub fn save(&self, credentials: &Credentials) -> Result<(), Error> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let mut staged = self.path.clone().into_os_string();
        staged.push(".tmp");
        let staged = PathBuf::from(staged);
        fs::write(&staged, serde_json::to_string_pretty(credentials)?)?;
        fs::rename(&staged, &self.path)?;
        debug!("Saved credentials to {}", self.path.display());
        Ok(())
    }
}

/// Produce a usable access token, refreshing or re-authorising as needed.
pub fn authorize(config: &AppConfig, store: &CredentialStore) -> Result<Credentials, Error> {
    let http = token_client()?;
    let now = Utc::now();

    if let Some(stored) = store.load()? {
        if stored.is_fresh(now) {
            return Ok(stored);
        }
        if stored.refresh_token.is_some() {
            return refresh_credentials(&http, store, stored, now);
        }
    }

    let credentials = run_consent_flow(config, &http, now)?;
    store.save(&credentials)?;
    println!("credential file saved at\n\t{}", store.path().display());
    Ok(credentials)
}

fn token_client() -> Result<Client, Error> {
    Client::builder()
        .build()
        .map_err(|e| Error::from(transport_error(e)))
}

/// Trade the refresh token for a new access token and store the result.
///
/// A refresh token the endpoint rejects is dropped from the store, so the
/// next authorisation goes through the consent flow again.
fn refresh_credentials(
    http: &Client,
    store: &CredentialStore,
    stored: Credentials,
    now: DateTime<Utc>,
) -> Result<Credentials, Error> {
    let Some(refresh_token) = stored.refresh_token.clone() else {
        return Err(Error::Authentication(
            "access token expired and no refresh token is stored".to_string(),
        ));
    };
    debug!("Refreshing access token");
    let result = request_token(
        http,
        &stored.token_uri,
        &[
            ("grant_type", "refresh_token"),
            ("refresh_token", refresh_token.as_str()),
            ("client_id", stored.client_id.as_str()),
            ("client_secret", stored.client_secret.as_str()),
        ],
    );
    match result {
        Ok(resp) => {
            let refreshed = apply_token(stored, resp, now);
            store.save(&refreshed)?;
            Ok(refreshed)
        }
        Err(err @ Error::Authentication(_)) => {
            warn!("Refresh token rejected, authorisation will be requested again");
            let revoked = Credentials {
                access_token: String::new(),
                refresh_token: None,
                token_expiry: None,
                ..stored
            };
            store.save(&revoked)?;
            Err(err)
        }
        Err(err) => Err(err),
    }
}

/// Bearer tokens for API requests.
pub trait TokenSource {
    /// Token to send with the next request.
    fn access_token(&self) -> Result<String, Error>;

    /// Replace a token the server rejected.
    fn refresh(&self) -> Result<String, Error>;
}

/// A fixed token that cannot be renewed.
pub struct StaticToken(pub String);

impl TokenSource for StaticToken {
    fn access_token(&self) -> Result<String, Error> {
        Ok(self.0.clone())
    }

    fn refresh(&self) -> Result<String, Error> {
        Err(Error::Authentication(
            "access token rejected and cannot be refreshed".to_string(),
        ))
    }
}

/// Stored credentials that renew themselves through the token endpoint,
/// writing every new token back to the credential file.
pub struct RefreshingToken {
    store: CredentialStore,
    http: Client,
    current: RefCell<Credentials>,
}

impl RefreshingToken {
    pub fn new(credentials: Credentials, store: CredentialStore) -> Result<Self, Error> {
        Ok(Self {
            store,
            http: token_client()?,
            current: RefCell::new(credentials),
        })
    }

    /// Authorise against `store` and keep the credentials for later renewals.
    pub fn authorize(config: &AppConfig, store: CredentialStore) -> Result<Self, Error> {
        let credentials = authorize(config, &store)?;
        Self::new(credentials, store)
    }
}

impl TokenSource for RefreshingToken {
    fn access_token(&self) -> Result<String, Error> {
        let expiring = {
            let current = self.current.borrow();
            current.token_expiry.is_some() && !current.is_fresh(Utc::now())
        };
        if expiring {
            return self.refresh();
        }
        Ok(self.current.borrow().access_token.clone())
    }

    fn refresh(&self) -> Result<String, Error> {
        let stored = self.current.borrow().clone();
        let refreshed = refresh_credentials(&self.http, &self.store, stored, Utc::now())?;
        let token = refreshed.access_token.clone();
        *self.current.borrow_mut() = refreshed;
        Ok(token)
    }
}

fn run_consent_flow(
    config: &AppConfig,
    http: &Client,
    now: DateTime<Utc>,
) -> Result<Credentials, Error> {
    if config.client_id.is_empty() {
        return Err(Error::Credentials(
            "no stored credentials and no client_id configured (set GDTC_CLIENT_ID)".to_string(),
        ));
    }
    let url = consent_url(config)?;
    println!("Go to the following link in your browser:\n\n    {}\n", url);
    print!("Enter verification code: ");
    io::stdout().flush()?;
    let mut code = String::new();
    io::stdin().read_line(&mut code)?;
    let code = code.trim();
    if code.is_empty() {
        return Err(Error::Credentials("no verification code entered".to_string()));
    }

    info!("Exchanging authorisation code");
    let resp = request_token(
        http,
        &config.token_uri,
        &[
            ("grant_type", "authorization_code"),
            ("code", code),
            ("client_id", config.client_id.as_str()),
            ("client_secret", config.client_secret.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
        ],
    )?;
    let blank = Credentials {
        client_id: config.client_id.clone(),
        client_secret: config.client_secret.clone(),
        access_token: String::new(),
        refresh_token: None,
        token_expiry: None,
        token_uri: config.token_uri.clone(),
    };
    Ok(apply_token(blank, resp, now))
}

pub fn consent_url(config: &AppConfig) -> Result<Url, Error> {
    Url::parse_with_params(
        &config.auth_uri,
        &[
            ("client_id", config.client_id.as_str()),
            ("redirect_uri", config.redirect_uri.as_str()),
            ("scope", DRIVE_SCOPE),
            ("response_type", "code"),
            ("access_type", "offline"),
            ("prompt", "consent"),
        ],
    )
    .map_err(|e| Error::Credentials(format!("invalid auth_uri '{}': {}", config.auth_uri, e)))
}

fn request_token(
    http: &Client,
    token_uri: &str,
    form: &[(&str, &str)],
) -> Result<TokenResponse, Error> {
    let resp = http
        .post(token_uri)
        .form(form)
        .send()
        .map_err(|e| Error::from(transport_error(e)))?;
    let status = resp.status();
    if status.is_success() {
        return resp
            .json::<TokenResponse>()
            .map_err(|e| Error::Decode(format!("token response: {}", e)));
    }
    let body = resp.text().unwrap_or_default();
    if status.as_u16() == 400 || status.as_u16() == 401 {
        // invalid_grant and friends: the refresh token is no longer accepted.
        return Err(Error::Authentication(format!(
            "token endpoint rejected request: {}",
            body.trim()
        )));
    }
    Err(Error::from(ApiError::Status {
        status: status.as_u16(),
        message: body,
    }))
}

fn apply_token(
    mut credentials: Credentials,
    resp: TokenResponse,
    now: DateTime<Utc>,
) -> Credentials {
    credentials.access_token = resp.access_token;
    credentials.token_expiry = resp
        .expires_in
        .map(|secs| now + ChronoDuration::seconds(secs));
    if resp.refresh_token.is_some() {
        credentials.refresh_token = resp.refresh_token;
    }
    credentials
}
