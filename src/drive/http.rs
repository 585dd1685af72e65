use super::{ChangePage, ChangesQuery, ChildPage, DriveApi, FileMeta, CHANGE_FIELDS};
use crate::credentials::TokenSource;
use crate::cursor::Cursor;
use crate::error::{ApiError, Error};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_BASE_URL: &str = "https://www.googleapis.com/drive/v3";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Drive v3 REST client authenticated with a bearer token.
///
/// A request answered with 401 is sent once more with a renewed token before
/// the failure is reported as an authentication error.
pub struct HttpDrive {
    base_url: String,
    tokens: Box<dyn TokenSource>,
    http: Client,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StartPageTokenResponse {
    start_page_token: Cursor,
}

impl HttpDrive {
    pub fn new(base_url: &str, tokens: impl TokenSource + 'static) -> Result<Self, ApiError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(transport_error)?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            tokens: Box::new(tokens),
            http,
        })
    }

    fn get<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, ApiError> {
        let url = format!("{}{path}", self.base_url);
        debug!("GET {} {:?}", url, query);
        let resp = self.send(|token| self.http.get(&url).bearer_auth(token).query(query))?;
        resp.json::<T>()
            .map_err(|e| ApiError::Decode(format!("{}: {}", path, e)))
    }

    fn send<F>(&self, request: F) -> Result<Response, ApiError>
    where
        F: Fn(&str) -> RequestBuilder,
    {
        let token = self.tokens.access_token().map_err(token_error)?;
        let resp = request(&token).send().map_err(transport_error)?;
        if resp.status() != StatusCode::UNAUTHORIZED {
            return check_status(resp);
        }
        debug!("Access token rejected, renewing");
        let token = self.tokens.refresh().map_err(token_error)?;
        let resp = request(&token).send().map_err(transport_error)?;
        check_status(resp)
    }
}

impl DriveApi for HttpDrive {
    fn start_page_token(&self) -> Result<Cursor, ApiError> {
        let resp: StartPageTokenResponse = self.get("/changes/startPageToken", &[])?;
        Ok(resp.start_page_token)
    }

    fn list_changes(&self, query: &ChangesQuery) -> Result<ChangePage, ApiError> {
        self.get(
            "/changes",
            &[
                ("pageToken", query.start.to_string()),
                ("includeRemoved", "false".to_string()),
                ("pageSize", query.page_size.to_string()),
                ("restrictToMyDrive", query.restrict_to_my_drive.to_string()),
                ("fields", CHANGE_FIELDS.to_string()),
            ],
        )
    }

    fn get_file(&self, file_id: &str) -> Result<FileMeta, ApiError> {
        self.get(
            &format!("/files/{}", file_id),
            &[("fields", "name,parents".to_string())],
        )
    }

    fn list_trashed_children(
        &self,
        parent_id: &str,
        page_token: Option<&str>,
        page_size: u32,
    ) -> Result<ChildPage, ApiError> {
        let mut query = vec![
            ("q", format!("'{}' in parents and trashed=true", parent_id)),
            ("fields", "files(id,name),nextPageToken".to_string()),
            ("pageSize", page_size.to_string()),
        ];
        if let Some(token) = page_token {
            query.push(("pageToken", token.to_string()));
        }
        self.get("/files", &query)
    }

    fn delete_file(&self, file_id: &str) -> Result<(), ApiError> {
        let url = format!("{}/files/{}", self.base_url, file_id);
        debug!("DELETE {}", url);
        self.send(|token| self.http.delete(&url).bearer_auth(token))
            .map(|_| ())
    }
}

fn check_status(resp: Response) -> Result<Response, ApiError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let text = resp.text().unwrap_or_default();
    Err(classify_status(status, &text))
}

/// Map a failed HTTP status onto the retry taxonomy.
pub(crate) fn classify_status(status: StatusCode, body: &str) -> ApiError {
    let message = error_message(body);
    match status {
        StatusCode::INTERNAL_SERVER_ERROR => ApiError::Transient {
            status: status.as_u16(),
            message,
        },
        StatusCode::UNAUTHORIZED => ApiError::Auth(message),
        _ => ApiError::Status {
            status: status.as_u16(),
            message,
        },
    }
}

// Google wraps failures as {"error": {"code": .., "message": ..}}.
fn error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| body.trim().to_string())
}

fn token_error(err: Error) -> ApiError {
    match err {
        Error::Authentication(message) => ApiError::Auth(message),
        Error::Connectivity(message) => ApiError::Connectivity(message),
        Error::Remote { status, message } => ApiError::Status { status, message },
        other => ApiError::Auth(other.to_string()),
    }
}

pub(crate) fn transport_error(err: reqwest::Error) -> ApiError {
    if err.is_decode() {
        ApiError::Decode(err.to_string())
    } else {
        ApiError::Connectivity(err.to_string())
    }
}
