//! Google Calendar event creation with a generated Meet link.
//!
//! OAuth installed-app flow: the access token is cached in a local file;
//! an expired token refreshes via the token endpoint, and a missing cache
//! triggers the interactive consent flow (consent URL printed, loopback
//! listener captures the redirect).

use chrono::Utc;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

use careloop_core::config::CalendarConfig;
use careloop_core::error::{CareloopError, Result};

const SCOPE: &str = "https://www.googleapis.com/auth/calendar.events";
const EVENTS_URL: &str = "https://www.googleapis.com/calendar/v3/calendars/primary/events";
const REDIRECT_ADDR: &str = "127.0.0.1:8000";
const REDIRECT_URI: &str = "http://localhost:8000/";

/// Contents of the downloaded OAuth client secrets file.
#[derive(Debug, Deserialize)]
struct ClientSecrets {
    installed: OAuthApp,
}

#[derive(Debug, Clone, Deserialize)]
struct OAuthApp {
    client_id: String,
    client_secret: String,
    auth_uri: String,
    token_uri: String,
}

/// Token cache written next to the binary, pymongo-era `token.json` style.
#[derive(Debug, Serialize, Deserialize)]
struct CachedToken {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_at: Option<i64>,
}

impl CachedToken {
    fn is_fresh(&self) -> bool {
        match self.expires_at {
            Some(at) => Utc::now().timestamp() + 60 < at,
            None => false,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
}

/// Client for the calendar collaborator.
pub struct CalendarClient {
    config: CalendarConfig,
    client: reqwest::Client,
}

impl CalendarClient {
    pub fn new(config: CalendarConfig) -> Self {
        Self {
            config,
            client: reqwest::Client::new(),
        }
    }

    /// Insert a one-hour consultation event and return its Meet join URL.
    /// `start`/`end` are local ISO datetimes interpreted in the configured
    /// timezone.
    pub async fn create_meet_event(
        &self,
        summary: &str,
        description: &str,
        start: &str,
        end: &str,
    ) -> Result<String> {
        let token = self.access_token().await?;
        let body = event_body(summary, description, start, end, &self.config.timezone);

        let response = self
            .client
            .post(EVENTS_URL)
            .query(&[("conferenceDataVersion", "1")])
            .bearer_auth(token)
            .json(&body)
            .send()
            .await
            .map_err(|e| CareloopError::Calendar(format!("event insert: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CareloopError::Calendar(format!(
                "event insert failed ({status}): {text}"
            )));
        }

        let event: serde_json::Value = response
            .json()
            .await
            .map_err(|e| CareloopError::Calendar(format!("invalid event response: {e}")))?;
        event["hangoutLink"]
            .as_str()
            .map(String::from)
            .ok_or_else(|| CareloopError::Calendar("no meet link in event response".into()))
    }

    async fn access_token(&self) -> Result<String> {
        if let Some(cached) = self.load_cached() {
            if cached.is_fresh() {
                return Ok(cached.access_token);
            }
            if let Some(refresh) = cached.refresh_token.clone() {
                let app = self.load_secrets()?;
                let refreshed = self.refresh(&app, &refresh).await?;
                let token = CachedToken {
                    access_token: refreshed.access_token.clone(),
                    // Google omits the refresh token on refresh responses.
                    refresh_token: refreshed.refresh_token.or(Some(refresh)),
                    expires_at: expiry(refreshed.expires_in),
                };
                self.store_cached(&token)?;
                return Ok(token.access_token);
            }
        }

        let app = self.load_secrets()?;
        let token = self.interactive_flow(&app).await?;
        self.store_cached(&token)?;
        Ok(token.access_token)
    }

    fn load_secrets(&self) -> Result<OAuthApp> {
        let raw = std::fs::read_to_string(&self.config.credentials_path).map_err(|e| {
            CareloopError::Config(format!(
                "cannot read {}: {e}",
                self.config.credentials_path
            ))
        })?;
        let secrets: ClientSecrets = serde_json::from_str(&raw)
            .map_err(|e| CareloopError::Config(format!("invalid client secrets: {e}")))?;
        Ok(secrets.installed)
    }

    fn load_cached(&self) -> Option<CachedToken> {
        let raw = std::fs::read_to_string(&self.config.token_path).ok()?;
        serde_json::from_str(&raw).ok()
    }

    fn store_cached(&self, token: &CachedToken) -> Result<()> {
        let raw = serde_json::to_string_pretty(token)
            .map_err(|e| CareloopError::Config(format!("encode token cache: {e}")))?;
        std::fs::write(&self.config.token_path, raw)?;
        Ok(())
    }

    async fn refresh(&self, app: &OAuthApp, refresh_token: &str) -> Result<TokenResponse> {
        let params = [
            ("client_id", app.client_id.as_str()),
            ("client_secret", app.client_secret.as_str()),
            ("refresh_token", refresh_token),
            ("grant_type", "refresh_token"),
        ];
        let response = self
            .client
            .post(&app.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| CareloopError::Calendar(format!("token refresh: {e}")))?;
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CareloopError::Calendar(format!(
                "token refresh rejected: {text}"
            )));
        }
        response
            .json()
            .await
            .map_err(|e| CareloopError::Calendar(format!("invalid token response: {e}")))
    }

    /// First-time consent: print the authorization URL, wait for the
    /// browser redirect on the loopback port, exchange the code.
    async fn interactive_flow(&self, app: &OAuthApp) -> Result<CachedToken> {
        let listener = tokio::net::TcpListener::bind(REDIRECT_ADDR).await?;
        let url = consent_url(app)?;
        tracing::info!("Authorize calendar access in your browser:\n{url}");

        let (mut socket, _) = listener.accept().await?;
        let mut raw = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = socket.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            raw.extend_from_slice(&buf[..n]);
            if raw.windows(4).any(|w| w == b"\r\n\r\n") {
                break;
            }
        }
        let request = String::from_utf8_lossy(&raw);
        let code = authorization_code(&request)
            .ok_or_else(|| CareloopError::Calendar("no authorization code in redirect".into()))?;

        socket
            .write_all(
                b"HTTP/1.1 200 OK\r\nContent-Type: text/plain\r\n\r\n\
                  Authorization received. You may close this window.\n",
            )
            .await?;

        let params = [
            ("client_id", app.client_id.as_str()),
            ("client_secret", app.client_secret.as_str()),
            ("code", code.as_str()),
            ("redirect_uri", REDIRECT_URI),
            ("grant_type", "authorization_code"),
        ];
        let response = self
            .client
            .post(&app.token_uri)
            .form(&params)
            .send()
            .await
            .map_err(|e| CareloopError::Calendar(format!("code exchange: {e}")))?;
        if !response.status().is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CareloopError::Calendar(format!(
                "code exchange rejected: {text}"
            )));
        }
        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| CareloopError::Calendar(format!("invalid token response: {e}")))?;
        Ok(CachedToken {
            access_token: token.access_token,
            refresh_token: token.refresh_token,
            expires_at: expiry(token.expires_in),
        })
    }
}

fn expiry(expires_in: Option<i64>) -> Option<i64> {
    expires_in.map(|secs| Utc::now().timestamp() + secs)
}

fn consent_url(app: &OAuthApp) -> Result<String> {
    let mut url = reqwest::Url::parse(&app.auth_uri)
        .map_err(|e| CareloopError::Config(format!("invalid auth_uri: {e}")))?;
    url.query_pairs_mut()
        .append_pair("client_id", &app.client_id)
        .append_pair("redirect_uri", REDIRECT_URI)
        .append_pair("response_type", "code")
        .append_pair("scope", SCOPE)
        .append_pair("access_type", "offline")
        .append_pair("prompt", "consent");
    Ok(url.to_string())
}

/// Pull `code` out of the redirect request line (`GET /?code=… HTTP/1.1`).
fn authorization_code(request: &str) -> Option<String> {
    let path = request.split_whitespace().nth(1)?;
    let url = reqwest::Url::parse(&format!("http://localhost{path}")).ok()?;
    url.query_pairs()
        .find(|(key, _)| key == "code")
        .map(|(_, value)| value.into_owned())
}

fn event_body(
    summary: &str,
    description: &str,
    start: &str,
    end: &str,
    timezone: &str,
) -> serde_json::Value {
    serde_json::json!({
        "summary": summary,
        "description": description,
        "start": { "dateTime": start, "timeZone": timezone },
        "end": { "dateTime": end, "timeZone": timezone },
        "conferenceData": {
            "createRequest": {
                "requestId": format!("meet-{}", Uuid::new_v4()),
                "conferenceSolutionKey": { "type": "hangoutsMeet" },
            },
        },
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn app() -> OAuthApp {
        OAuthApp {
            client_id: "client-123".into(),
            client_secret: "secret".into(),
            auth_uri: "https://accounts.google.com/o/oauth2/auth".into(),
            token_uri: "https://oauth2.googleapis.com/token".into(),
        }
    }

    #[test]
    fn test_consent_url_carries_scope_and_redirect() {
        let url = consent_url(&app()).unwrap();
        assert!(url.starts_with("https://accounts.google.com/o/oauth2/auth?"));
        assert!(url.contains("client_id=client-123"));
        assert!(url.contains("response_type=code"));
        assert!(url.contains("calendar.events"));
        assert!(url.contains("access_type=offline"));
    }

    #[test]
    fn test_authorization_code_extraction() {
        let request = "GET /?code=4%2FabcDEF&scope=calendar HTTP/1.1\r\nHost: localhost\r\n\r\n";
        assert_eq!(authorization_code(request).as_deref(), Some("4/abcDEF"));
        assert_eq!(authorization_code("GET / HTTP/1.1\r\n\r\n"), None);
    }

    #[test]
    fn test_event_body_requests_meet_link() {
        let body = event_body(
            "Consultation with Asha",
            "Health Consultation via Google Meet",
            "2026-09-01T10:00:00",
            "2026-09-01T11:00:00",
            "Asia/Kolkata",
        );
        assert_eq!(body["summary"], "Consultation with Asha");
        assert_eq!(body["start"]["dateTime"], "2026-09-01T10:00:00");
        assert_eq!(body["start"]["timeZone"], "Asia/Kolkata");
        assert_eq!(
            body["conferenceData"]["createRequest"]["conferenceSolutionKey"]["type"],
            "hangoutsMeet"
        );
        let request_id = body["conferenceData"]["createRequest"]["requestId"]
            .as_str()
            .unwrap();
        assert!(request_id.starts_with("meet-"));
    }

    #[test]
    fn test_stale_token_is_not_fresh() {
        let stale = CachedToken {
            access_token: "tok".into(),
            refresh_token: None,
            expires_at: Some(Utc::now().timestamp() - 10),
        };
        assert!(!stale.is_fresh());
        let fresh = CachedToken {
            access_token: "tok".into(),
            refresh_token: None,
            expires_at: Some(Utc::now().timestamp() + 3600),
        };
        assert!(fresh.is_fresh());
    }
}
