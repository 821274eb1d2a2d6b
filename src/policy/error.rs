use thiserror::Error;

/// A policy check failure, carrying the stable `error_code` and HTTP status
/// the gateway surfaces to the client (spec §4.3, §7).
#[derive(Debug, Clone, Error)]
pub enum PolicyError {
    /// No API key was supplied anywhere the gateway looks (body, header).
    #[error("API key is required")]
    MissingApiKey,

    /// Key is present but fails the length check (10–200 chars).
    #[error("API key format is invalid")]
    InvalidApiKeyFormat,

    /// Key contains a disallowed metacharacter.
    #[error("API key contains invalid characters")]
    InvalidApiKeyChars,

    /// Key syntax is valid but no tenant resolves it.
    #[error("API key not found")]
    ApiKeyNotFound,

    /// Key resolves but is administratively disabled.
    #[error("API key is inactive")]
    ApiKeyInactive,

    /// Key's owning tenant is not active.
    #[error("tenant account is inactive")]
    UserAccountInactive,

    /// Text matched a banned substring for this tenant.
    #[error("content contains banned keyword: {keyword}")]
    BannedKeyword {
        /// The matched keyword, verbatim.
        keyword: String,
    },

    /// Text exceeds the 10,000-character limit.
    #[error("text content too long, maximum 10000 characters allowed")]
    TextTooLong,

    /// Text blocked by the deterministic repetition heuristic.
    #[error("content blocked: {reason}")]
    ExternalApiBlocked {
        /// Human-readable reason, surfaced to the client.
        reason: String,
    },
}

impl PolicyError {
    /// The stable, SCREAMING_SNAKE identifier from spec §7.
    pub fn error_code(&self) -> &'static str {
        match self {
            PolicyError::MissingApiKey => "MISSING_API_KEY",
            PolicyError::InvalidApiKeyFormat => "INVALID_API_KEY_FORMAT",
            PolicyError::InvalidApiKeyChars => "INVALID_API_KEY_CHARS",
            PolicyError::ApiKeyNotFound => "API_KEY_NOT_FOUND",
            PolicyError::ApiKeyInactive => "API_KEY_INACTIVE",
            PolicyError::UserAccountInactive => "USER_ACCOUNT_INACTIVE",
            PolicyError::BannedKeyword { .. } => "BANNED_KEYWORD",
            PolicyError::TextTooLong => "TEXT_TOO_LONG",
            PolicyError::ExternalApiBlocked { .. } => "EXTERNAL_API_BLOCKED",
        }
    }

    /// The HTTP status this error maps to (spec §4.3 "Error→HTTP mapping").
    pub fn http_status(&self) -> u16 {
        match self {
            PolicyError::ApiKeyNotFound
            | PolicyError::ApiKeyInactive
            | PolicyError::UserAccountInactive => 401,
            _ => 400,
        }
    }
}
