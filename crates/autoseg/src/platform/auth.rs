use std::fmt::{Debug, Formatter};

use serde::Deserialize;

use crate::common::error::AutosegError;
use crate::common::utils::str::non_blank;
use crate::platform::config::MANAGEMENT_SCOPE;
use crate::workflow::session::Credential;

/// Environment variables that can hold a ready-to-use access token, in order of priority.
pub const ACCESS_TOKEN_ENV_VARS: [&str; 2] = ["AUTOSEG_ACCESS_TOKEN", "AZURE_ACCESS_TOKEN"];

pub const TENANT_ID_ENV: &str = "AZURE_TENANT_ID";
pub const CLIENT_ID_ENV: &str = "AZURE_CLIENT_ID";
pub const CLIENT_SECRET_ENV: &str = "AZURE_CLIENT_SECRET";

/// Where the credential comes from.
pub enum CredentialSource {
    AccessToken(String),
    /// Service principal, exchanged for a token with the OAuth2 client credentials flow.
    ClientSecret {
        tenant_id: String,
        client_id: String,
        client_secret: String,
    },
}

impl Debug for CredentialSource {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            CredentialSource::AccessToken(_) => f.write_str("AccessToken(<redacted>)"),
            CredentialSource::ClientSecret {
                tenant_id,
                client_id,
                ..
            } => f
                .debug_struct("ClientSecret")
                .field("tenant_id", tenant_id)
                .field("client_id", client_id)
                .finish_non_exhaustive(),
        }
    }
}

impl CredentialSource {
    /// Resolves the credential source from the process environment.
    pub fn from_env() -> crate::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F: Fn(&str) -> Option<String>>(lookup: F) -> crate::Result<Self> {
        let get = |key: &str| {
            lookup(key).and_then(|value| non_blank(&value).map(|v| v.to_string()))
        };

        if let Some(token) = ACCESS_TOKEN_ENV_VARS.iter().find_map(|key| get(key)) {
            return Ok(CredentialSource::AccessToken(token));
        }

        match (get(TENANT_ID_ENV), get(CLIENT_ID_ENV), get(CLIENT_SECRET_ENV)) {
            (Some(tenant_id), Some(client_id), Some(client_secret)) => {
                Ok(CredentialSource::ClientSecret {
                    tenant_id,
                    client_id,
                    client_secret,
                })
            }
            (None, None, None) => Err(AutosegError::AuthenticationError(format!(
                "No credentials found. Set {} or {TENANT_ID_ENV}, {CLIENT_ID_ENV} and {CLIENT_SECRET_ENV}",
                ACCESS_TOKEN_ENV_VARS[0]
            ))),
            _ => Err(AutosegError::AuthenticationError(format!(
                "Incomplete service principal credentials. {TENANT_ID_ENV}, {CLIENT_ID_ENV} and {CLIENT_SECRET_ENV} have to be set together"
            ))),
        }
    }
}

#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Deserialize, Default)]
struct TokenErrorResponse {
    #[serde(default)]
    error: String,
    #[serde(default)]
    error_description: String,
}

pub fn token_url(authority_host: &str, tenant_id: &str) -> String {
    format!(
        "{}/{tenant_id}/oauth2/v2.0/token",
        authority_host.trim_end_matches('/')
    )
}

/// Turns a credential source into a bearer token credential.
pub async fn acquire_credential(
    client: &reqwest::Client,
    authority_host: &str,
    source: CredentialSource,
) -> crate::Result<Credential> {
    let (tenant_id, client_id, client_secret) = match source {
        CredentialSource::AccessToken(token) => {
            log::debug!("Using access token from the environment");
            return Ok(Credential::from_token(token));
        }
        CredentialSource::ClientSecret {
            tenant_id,
            client_id,
            client_secret,
        } => (tenant_id, client_id, client_secret),
    };

    let url = token_url(authority_host, &tenant_id);
    log::debug!("Requesting access token for client {client_id} from {url}");
    let response = client
        .post(&url)
        .form(&[
            ("grant_type", "client_credentials"),
            ("client_id", client_id.as_str()),
            ("client_secret", client_secret.as_str()),
            ("scope", MANAGEMENT_SCOPE),
        ])
        .send()
        .await
        .map_err(|e| {
            AutosegError::ServiceUnavailableError(format!("Token request failed: {e}"))
        })?;

    let status = response.status();
    let body = response.text().await.map_err(|e| {
        AutosegError::ServiceUnavailableError(format!("Cannot read token response: {e}"))
    })?;
    parse_token_response(status, &body)
}

fn parse_token_response(status: reqwest::StatusCode, body: &str) -> crate::Result<Credential> {
    if status.is_server_error() || status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        return Err(AutosegError::ServiceUnavailableError(format!(
            "Token endpoint returned {status}"
        )));
    }
    if !status.is_success() {
        let error: TokenErrorResponse = serde_json::from_str(body).unwrap_or_default();
        return Err(AutosegError::AuthenticationError(format!(
            "Token request rejected ({status}): {} {}",
            error.error, error.error_description
        )));
    }
    let response: TokenResponse = serde_json::from_str(body).map_err(|e| {
        AutosegError::AuthenticationError(format!("Invalid token response: {e}"))
    })?;
    Ok(Credential::from_token(response.access_token))
}
