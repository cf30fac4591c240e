//! Command implementations and the shared HTTP plumbing.
//!
//! Every command prints the server's JSON by default and a formatted view
//! with `--human`.

pub mod analytics;
pub mod balance;
pub mod ban;
pub mod purchase;
pub mod topup;

use anyhow::Result;
use chrono::{DateTime, Local, Utc};
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Failures talking to the server.
#[derive(Debug, Error)]
pub enum CliError {
    /// The server answered with an error body.
    #[error("{code} ({status}): {message}")]
    Api {
        status: StatusCode,
        code: String,
        message: String,
    },

    /// The server answered with a non-JSON error.
    #[error("server returned {status}: {body}")]
    UnexpectedResponse { status: StatusCode, body: String },

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("invalid token: {0}")]
    InvalidToken(String),
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: ErrorDetails,
}

#[derive(Debug, Deserialize)]
struct ErrorDetails {
    code: String,
    message: String,
}

/// Types that have a formatted terminal view.
pub trait HumanReadable {
    fn print_human(&self);
}

/// Client that sends `Authorization: Bearer <token>` on every request.
pub fn build_client(token: Option<&str>) -> Result<Client, CliError> {
    let mut headers = HeaderMap::new();
    if let Some(token) = token {
        let value = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|e| CliError::InvalidToken(e.to_string()))?;
        headers.insert(AUTHORIZATION, value);
    }
    Ok(Client::builder().default_headers(headers).build()?)
}

/// Send the request and decode a JSON body, turning error bodies into
/// [`CliError::Api`].
pub async fn make_request<T: DeserializeOwned>(request: RequestBuilder) -> Result<T, CliError> {
    let response = request.send().await?;
    let status = response.status();
    if status.is_success() {
        return Ok(response.json().await?);
    }

    let body = response.text().await?;
    Err(api_error(status, &body))
}

fn api_error(status: StatusCode, body: &str) -> CliError {
    match serde_json::from_str::<ErrorBody>(body) {
        Ok(parsed) => CliError::Api {
            status,
            code: parsed.error.code,
            message: parsed.error.message,
        },
        Err(_) => CliError::UnexpectedResponse {
            status,
            body: body.to_string(),
        },
    }
}

/// Print as JSON, or the human view if requested.
pub fn output<T: Serialize + HumanReadable>(value: &T, human: bool) -> Result<()> {
    if human {
        value.print_human();
    } else {
        println!("{}", serde_json::to_string_pretty(value)?);
    }
    Ok(())
}

pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

/// Coins with a sign, e.g. `+100` or `-30`.
pub fn format_amount(amount: i64) -> String {
    if amount > 0 {
        format!("+{amount}")
    } else {
        amount.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_parses_error_body() {
        let body = r#"{"error":{"code":"INSUFFICIENT_FUNDS","message":"insufficient funds: required 50, available 20"}}"#;
        match api_error(StatusCode::PAYMENT_REQUIRED, body) {
            CliError::Api { status, code, .. } => {
                assert_eq!(status, StatusCode::PAYMENT_REQUIRED);
                assert_eq!(code, "INSUFFICIENT_FUNDS");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_api_error_keeps_plain_bodies() {
        let error = api_error(StatusCode::BAD_GATEWAY, "upstream down");
        assert!(matches!(error, CliError::UnexpectedResponse { .. }));
    }

    #[test]
    fn test_format_amount() {
        assert_eq!(format_amount(100), "+100");
        assert_eq!(format_amount(-30), "-30");
        assert_eq!(format_amount(0), "0");
    }
}
