use std::time::Duration;

/// Resource manager endpoint of the public cloud.
pub const DEFAULT_ENDPOINT: &str = "https://management.azure.com";

/// API version used for workspace, compute, data and job requests.
pub const DEFAULT_API_VERSION: &str = "2024-04-01";

/// OAuth2 authority used when a token has to be requested with a client secret.
pub const DEFAULT_AUTHORITY_HOST: &str = "https://login.microsoftonline.com";

/// Scope of the tokens accepted by the resource manager.
pub const MANAGEMENT_SCOPE: &str = "https://management.azure.com/.default";

/// Timeout of a single HTTP request.
pub fn get_http_timeout() -> Duration {
    get_duration_from_env("AUTOSEG_HTTP_TIMEOUT_SECS").unwrap_or_else(|| Duration::from_secs(60))
}

/// OAuth2 authority host, can be changed for sovereign clouds.
pub fn get_authority_host() -> String {
    std::env::var("AZURE_AUTHORITY_HOST")
        .ok()
        .filter(|value| !value.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_AUTHORITY_HOST.to_string())
}

fn get_duration_from_env(key: &str) -> Option<Duration> {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse::<u64>().ok())
        .map(Duration::from_secs)
}
