/*
 * flow.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of Scadenziario, a mailbox date-extraction exporter.
 *
 * Scadenziario is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * Scadenziario is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with Scadenziario.  If not, see <http://www.gnu.org/licenses/>.
 */

//! OAuth2 device-code grant for a terminal tool.
//!
//! 1. POST the device authorization endpoint → user code + verification URI.
//! 2. The shell shows both; the user signs in from any browser.
//! 3. Poll the token endpoint at the server-given interval until tokens
//!    arrive or the code expires.
//!
//! Token refresh is also provided here. HTTP calls use the in-tree client;
//! JSON responses are parsed with the in-tree push parser.

use std::time::{Duration, Instant};

use crate::error::AuthError;
use crate::http::{parse_https_url, HttpConnection, HttpResponse, Request};
use crate::json::{self, JsonContentHandler, JsonNumber};
use crate::oauth::provider::OAuthProvider;

/// Fallback polling interval when the server omits one.
const DEFAULT_POLL_INTERVAL_SECS: u64 = 5;
/// Fallback device-code lifetime when the server omits one.
const DEFAULT_CODE_LIFETIME_SECS: u64 = 900;

/// Tokens returned from the token endpoint (grant or refresh).
#[derive(Debug, Clone)]
pub struct OAuthTokens {
    pub access_token: String,
    pub refresh_token: Option<String>,
    /// Seconds until the access token expires.
    pub expires_in: Option<u64>,
}

/// A pending device authorization: what to show the user and how to poll.
#[derive(Debug, Clone)]
pub struct DeviceCodeGrant {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    /// Seconds between token polls.
    pub interval_secs: u64,
    /// Seconds until the device code expires.
    pub expires_in_secs: u64,
    /// Ready-made instruction sentence from the server, when present.
    pub message: Option<String>,
}

/// Start the device-code grant: obtain the codes the user needs to sign in.
pub async fn request_device_code(
    provider: &dyn OAuthProvider,
) -> Result<DeviceCodeGrant, AuthError> {
    let body = format!(
        "client_id={}&scope={}",
        percent_encode(provider.client_id()),
        percent_encode(&provider.scopes().join(" ")),
    );
    let response = post_form(provider.device_authorization_url(), &body).await?;

    let mut handler = DeviceCodeHandler::default();
    parse_auth_json(&response, &mut handler)?;
    if !response.is_success() {
        return Err(AuthError::Rejected(handler.error_text()));
    }
    Ok(DeviceCodeGrant {
        device_code: handler
            .device_code
            .ok_or_else(|| AuthError::Rejected("missing device_code in response".to_string()))?,
        user_code: handler
            .user_code
            .ok_or_else(|| AuthError::Rejected("missing user_code in response".to_string()))?,
        verification_uri: handler
            .verification_uri
            .unwrap_or_else(|| "https://microsoft.com/devicelogin".to_string()),
        interval_secs: handler.interval.unwrap_or(DEFAULT_POLL_INTERVAL_SECS),
        expires_in_secs: handler.expires_in.unwrap_or(DEFAULT_CODE_LIFETIME_SECS),
        message: handler.message,
    })
}

/// Poll the token endpoint until the user completes sign-in. Blocks (async)
/// for up to the device code's lifetime.
pub async fn poll_for_tokens(
    provider: &dyn OAuthProvider,
    grant: &DeviceCodeGrant,
) -> Result<OAuthTokens, AuthError> {
    let deadline = Instant::now() + Duration::from_secs(grant.expires_in_secs);
    let mut interval = grant.interval_secs.max(1);
    let body = format!(
        "grant_type={}&device_code={}&client_id={}",
        percent_encode("urn:ietf:params:oauth:grant-type:device_code"),
        percent_encode(&grant.device_code),
        percent_encode(provider.client_id()),
    );

    loop {
        tokio::time::sleep(Duration::from_secs(interval)).await;
        if Instant::now() >= deadline {
            return Err(AuthError::Rejected(
                "device code expired before sign-in completed".to_string(),
            ));
        }

        let response = post_form(provider.token_url(), &body).await?;
        let mut handler = TokenResponseHandler::default();
        parse_auth_json(&response, &mut handler)?;

        if let Some(access_token) = handler.access_token {
            return Ok(OAuthTokens {
                access_token,
                refresh_token: handler.refresh_token,
                expires_in: handler.expires_in,
            });
        }
        match handler.error.as_deref() {
            Some("authorization_pending") => {}
            Some("slow_down") => {
                // RFC 8628 §3.5: add 5 seconds.
                interval += 5;
                tracing::debug!(interval, "server asked to slow polling");
            }
            Some(other) => {
                return Err(AuthError::Rejected(
                    handler
                        .error_description
                        .unwrap_or_else(|| other.to_string()),
                ))
            }
            None => {
                return Err(AuthError::Rejected(format!(
                    "unexpected token response ({})",
                    response.status
                )))
            }
        }
    }
}

/// Refresh an access token using a refresh token.
pub async fn refresh_access_token(
    provider: &dyn OAuthProvider,
    refresh_token: &str,
) -> Result<OAuthTokens, AuthError> {
    let body = format!(
        "grant_type=refresh_token&refresh_token={}&client_id={}&scope={}",
        percent_encode(refresh_token),
        percent_encode(provider.client_id()),
        percent_encode(&provider.scopes().join(" ")),
    );
    let response = post_form(provider.token_url(), &body).await?;
    let mut handler = TokenResponseHandler::default();
    parse_auth_json(&response, &mut handler)?;

    match handler.access_token {
        Some(access_token) => Ok(OAuthTokens {
            access_token,
            refresh_token: handler.refresh_token,
            expires_in: handler.expires_in,
        }),
        None => Err(AuthError::Rejected(
            handler
                .error_description
                .or(handler.error)
                .unwrap_or_else(|| format!("token refresh failed ({})", response.status)),
        )),
    }
}

// ── HTTP helpers ──────────────────────────────────────────────────────

/// POST a form body to an authorization-server endpoint. One connection per
/// call; these endpoints are hit a handful of times per run.
async fn post_form(url: &str, form_body: &str) -> Result<HttpResponse, AuthError> {
    let (host, port, path) =
        parse_https_url(url).map_err(|e| AuthError::Transport(e.to_string()))?;
    let mut conn = HttpConnection::open(&host, port)
        .await
        .map_err(|e| AuthError::Transport(format!("connect to {}: {}", host, e)))?;
    let request = Request::post(path)
        .header("Content-Type", "application/x-www-form-urlencoded")
        .header("Accept", "application/json")
        .body(form_body.as_bytes().to_vec());
    conn.send(&request)
        .await
        .map_err(|e| AuthError::Transport(e.to_string()))
}

/// Parse an authorization-server JSON body (also present on 4xx).
fn parse_auth_json<H: JsonContentHandler>(
    response: &HttpResponse,
    handler: &mut H,
) -> Result<(), AuthError> {
    json::parse(&response.body, handler).map_err(|e| {
        AuthError::Transport(format!(
            "malformed authorization response ({}): {}",
            response.status, e
        ))
    })
}

/// Percent-encode a string for use in form bodies.
fn percent_encode(s: &str) -> String {
    percent_encoding::utf8_percent_encode(s, percent_encoding::NON_ALPHANUMERIC).to_string()
}

// ── JSON handlers ─────────────────────────────────────────────────────

/// Push handler for device authorization responses.
#[derive(Default)]
struct DeviceCodeHandler {
    current_key: Option<String>,
    device_code: Option<String>,
    user_code: Option<String>,
    verification_uri: Option<String>,
    interval: Option<u64>,
    expires_in: Option<u64>,
    message: Option<String>,
    error: Option<String>,
    error_description: Option<String>,
}

impl DeviceCodeHandler {
    fn error_text(&self) -> String {
        self.error_description
            .clone()
            .or_else(|| self.error.clone())
            .unwrap_or_else(|| "device authorization failed".to_string())
    }
}

impl JsonContentHandler for DeviceCodeHandler {
    fn start_object(&mut self) {}
    fn end_object(&mut self) {}
    fn start_array(&mut self) {
        self.current_key = None;
    }
    fn end_array(&mut self) {}

    fn key(&mut self, key: &str) {
        self.current_key = Some(key.to_string());
    }

    fn string_value(&mut self, value: &str) {
        match self.current_key.as_deref() {
            Some("device_code") => self.device_code = Some(value.to_string()),
            Some("user_code") => self.user_code = Some(value.to_string()),
            Some("verification_uri") => self.verification_uri = Some(value.to_string()),
            Some("message") => self.message = Some(value.to_string()),
            Some("error") => self.error = Some(value.to_string()),
            Some("error_description") => self.error_description = Some(value.to_string()),
            _ => {}
        }
        self.current_key = None;
    }

    fn number_value(&mut self, number: JsonNumber) {
        match self.current_key.as_deref() {
            Some("interval") => self.interval = number.as_i64().map(|n| n.max(0) as u64),
            Some("expires_in") => self.expires_in = number.as_i64().map(|n| n.max(0) as u64),
            _ => {}
        }
        self.current_key = None;
    }

    fn boolean_value(&mut self, _value: bool) {
        self.current_key = None;
    }

    fn null_value(&mut self) {
        self.current_key = None;
    }
}

/// Push handler for token endpoint responses, success or error.
#[derive(Default)]
struct TokenResponseHandler {
    current_key: Option<String>,
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<u64>,
    error: Option<String>,
    error_description: Option<String>,
}

impl JsonContentHandler for TokenResponseHandler {
    fn start_object(&mut self) {}
    fn end_object(&mut self) {}
    fn start_array(&mut self) {
        self.current_key = None;
    }
    fn end_array(&mut self) {}

    fn key(&mut self, key: &str) {
        self.current_key = Some(key.to_string());
    }

    fn string_value(&mut self, value: &str) {
        match self.current_key.as_deref() {
            Some("access_token") => self.access_token = Some(value.to_string()),
            Some("refresh_token") => self.refresh_token = Some(value.to_string()),
            Some("error") => self.error = Some(value.to_string()),
            Some("error_description") => self.error_description = Some(value.to_string()),
            _ => {}
        }
        self.current_key = None;
    }

    fn number_value(&mut self, number: JsonNumber) {
        if self.current_key.as_deref() == Some("expires_in") {
            self.expires_in = number.as_i64().map(|n| n.max(0) as u64);
        }
        self.current_key = None;
    }

    fn boolean_value(&mut self, _value: bool) {
        self.current_key = None;
    }

    fn null_value(&mut self) {
        self.current_key = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_device_code_response_parsed() {
        let body = br#"{
            "device_code": "DEV123",
            "user_code": "ABC-DEF",
            "verification_uri": "https://microsoft.com/devicelogin",
            "expires_in": 900,
            "interval": 5,
            "message": "To sign in, use a web browser..."
        }"#;
        let mut handler = DeviceCodeHandler::default();
        json::parse(body, &mut handler).unwrap();
        assert_eq!(handler.device_code.as_deref(), Some("DEV123"));
        assert_eq!(handler.user_code.as_deref(), Some("ABC-DEF"));
        assert_eq!(handler.interval, Some(5));
        assert_eq!(handler.expires_in, Some(900));
    }

    #[test]
    fn test_token_response_parsed() {
        let body =
            br#"{"access_token":"AT","token_type":"Bearer","expires_in":3599,"refresh_token":"RT"}"#;
        let mut handler = TokenResponseHandler::default();
        json::parse(body, &mut handler).unwrap();
        assert_eq!(handler.access_token.as_deref(), Some("AT"));
        assert_eq!(handler.refresh_token.as_deref(), Some("RT"));
        assert_eq!(handler.expires_in, Some(3599));
    }

    #[test]
    fn test_pending_error_parsed() {
        let body = br#"{"error":"authorization_pending","error_description":"AADSTS70016: user has not yet signed in"}"#;
        let mut handler = TokenResponseHandler::default();
        json::parse(body, &mut handler).unwrap();
        assert_eq!(handler.error.as_deref(), Some("authorization_pending"));
        assert!(handler.access_token.is_none());
    }

    #[test]
    fn test_form_encoding() {
        assert_eq!(
            percent_encode("https://graph.microsoft.com/Mail.Read offline_access"),
            "https%3A%2F%2Fgraph%2Emicrosoft%2Ecom%2FMail%2ERead%20offline%5Faccess"
        );
    }
}
