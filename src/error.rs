use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReviewError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Graph API error: {0}")]
    GraphApiError(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    #[error("No access token. Set REVIEWCTL_ACCESS_TOKEN or cache a token for tenant '{0}'")]
    TokenNotFound(String),

    #[error("Cached token for tenant '{0}' has expired")]
    TokenExpired(String),

    #[error("Tenant '{0}' not found")]
    TenantNotFound(String),

    #[error("Query for {kind} failed: {reason}")]
    QueryFailure { kind: String, reason: String },

    #[error("Mail to {recipient} failed: {reason}")]
    SendFailure { recipient: String, reason: String },

    #[error("Audit write failed: {0}")]
    AuditWriteFailure(String),

    #[error("Record '{subject_id}' expired {days_ago} day(s) ago")]
    AlreadyExpired { subject_id: String, days_ago: i64 },

    #[error("Identity provider unavailable: every query failed, no notifications sent")]
    IdentityUnavailable,

    #[error("Cannot move decision from {from} to {to}")]
    InvalidTransition { from: String, to: String },
}

pub type Result<T> = std::result::Result<T, ReviewError>;

// Shorter alias used by command handlers
pub use ReviewError as Error;

/// Parse Graph API error response and provide helpful context
pub fn enhance_graph_error(error_response: &str) -> String {
    if let Ok(error_json) = serde_json::from_str::<serde_json::Value>(error_response) {
        if let Some(error_obj) = error_json.get("error") {
            let code = error_obj
                .get("code")
                .and_then(|c| c.as_str())
                .unwrap_or("Unknown");
            let message = error_obj
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("No message");

            let hint = match code {
                "Unauthorized" | "InvalidAuthenticationToken" => {
                    "\nHint: the access token may have expired. Refresh REVIEWCTL_ACCESS_TOKEN or the token cache."
                }
                "Forbidden" | "Authorization_RequestDenied" | "InsufficientPrivileges" => {
                    "\nHint: check that the app registration holds RoleManagement.Read.Directory, AccessReview.Read.All, AuditLog.Read.All and Mail.Send with admin consent."
                }
                "ErrorAccessDenied" => {
                    "\nHint: the sender mailbox may not be allowed for this application (check the application access policy)."
                }
                "BadRequest" => {
                    if message.contains("signInActivity") {
                        "\nHint: signInActivity requires an Entra ID P1 licence and AuditLog.Read.All."
                    } else {
                        "\nHint: the request format may be incorrect. Check the $filter and $expand parameters."
                    }
                }
                "NotFound" | "Request_ResourceNotFound" => {
                    "\nHint: the requested resource doesn't exist. Check group, site and list IDs."
                }
                "TooManyRequests" => "\nHint: API rate limit exceeded. Wait a moment and try again.",
                _ => "",
            };

            return format!("{}: {}{}", code, message, hint);
        }
    }

    error_response.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enhance_graph_error_adds_hint() {
        let body = r#"{"error":{"code":"InvalidAuthenticationToken","message":"Access token has expired."}}"#;
        let enhanced = enhance_graph_error(body);
        assert!(enhanced.starts_with("InvalidAuthenticationToken: Access token has expired."));
        assert!(enhanced.contains("Hint"));
    }

    #[test]
    fn test_enhance_graph_error_sign_in_activity() {
        let body = r#"{"error":{"code":"BadRequest","message":"Cannot select signInActivity"}}"#;
        assert!(enhance_graph_error(body).contains("Entra ID P1"));
    }

    #[test]
    fn test_enhance_graph_error_passthrough() {
        assert_eq!(enhance_graph_error("plain failure"), "plain failure");
    }
}
