/// JWT access and refresh tokens
///
/// Tokens are HS256-signed and carry the user ID plus a snapshot of the
/// username and role names at issue time. The snapshot is informational: the
/// API resolves the user's current roles and permissions from the directory
/// on every request, so a token never grants more than the user holds now.
///
/// # Token Types
///
/// - **Access**: authenticates API calls (default 24 hours)
/// - **Refresh**: only accepted by `POST /refresh` (30 days)
///
/// # Example
///
/// ```
/// use taskflow_shared::auth::jwt::{create_token, validate_access_token, Claims, TokenType};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let user_id = Uuid::new_v4();
/// let claims = Claims::new(user_id, "alice", vec!["DIRECTOR".into()], TokenType::Access);
/// let token = create_token(&claims, "a-signing-secret-of-32-bytes-or-more")?;
///
/// let validated = validate_access_token(&token, "a-signing-secret-of-32-bytes-or-more")?;
/// assert_eq!(validated.sub, user_id);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::User;

/// Issuer claim on every token
pub const ISSUER: &str = "taskflow";

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    CreateError(String),

    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    #[error("Token has expired")]
    Expired,

    /// Valid signature but the wrong kind of token for this use
    #[error("Expected {expected} token")]
    WrongType { expected: TokenType },
}

/// Token kind, carried in the `token_type` claim
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn default_expiration(&self) -> Duration {
        match self {
            TokenType::Access => Duration::hours(24),
            TokenType::Refresh => Duration::days(30),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

impl std::fmt::Display for TokenType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// JWT claims
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject: the user ID
    pub sub: Uuid,

    /// Always [`ISSUER`]
    pub iss: String,

    pub iat: i64,

    pub exp: i64,

    pub nbf: i64,

    /// Username at issue time
    pub username: String,

    /// Role names at issue time; informational only
    #[serde(default)]
    pub roles: Vec<String>,

    pub token_type: TokenType,
}

impl Claims {
    /// Claims with the token type's default lifetime
    pub fn new(
        user_id: Uuid,
        username: impl Into<String>,
        roles: Vec<String>,
        token_type: TokenType,
    ) -> Self {
        Self::with_expiration(user_id, username, roles, token_type, token_type.default_expiration())
    }

    /// Claims expiring `expires_in` from now; a negative duration yields an
    /// already-expired token
    pub fn with_expiration(
        user_id: Uuid,
        username: impl Into<String>,
        roles: Vec<String>,
        token_type: TokenType,
        expires_in: Duration,
    ) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
            username: username.into(),
            roles,
            token_type,
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// Signs claims with HS256
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| JwtError::CreateError(e.to_string()))
}

/// Verifies signature, issuer, `exp` and `nbf`
///
/// # Errors
///
/// [`JwtError::Expired`] for an expired token, [`JwtError::ValidationError`]
/// for anything else that fails.
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            _ => JwtError::ValidationError(e.to_string()),
        })
}

fn validate_typed(token: &str, secret: &str, expected: TokenType) -> Result<Claims, JwtError> {
    let claims = validate_token(token, secret)?;
    if claims.token_type != expected {
        return Err(JwtError::WrongType { expected });
    }
    Ok(claims)
}

/// [`validate_token`] that also requires an access token
pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_typed(token, secret, TokenType::Access)
}

/// [`validate_token`] that also requires a refresh token
pub fn validate_refresh_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    validate_typed(token, secret, TokenType::Refresh)
}

/// Mints tokens for directory users with a fixed secret and access lifetime
#[derive(Clone)]
pub struct TokenIssuer {
    secret: String,
    access_ttl: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("access_ttl", &self.access_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenIssuer {
    pub fn new(secret: impl Into<String>, access_ttl: Duration) -> Self {
        Self {
            secret: secret.into(),
            access_ttl,
        }
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }

    pub fn issue_access(&self, user: &User) -> Result<String, JwtError> {
        let claims = Claims::with_expiration(
            user.id,
            &user.username,
            user.roles.clone(),
            TokenType::Access,
            self.access_ttl,
        );
        create_token(&claims, &self.secret)
    }

    pub fn issue_refresh(&self, user: &User) -> Result<String, JwtError> {
        let claims = Claims::new(user.id, &user.username, user.roles.clone(), TokenType::Refresh);
        create_token(&claims, &self.secret)
    }

    pub fn validate_access(&self, token: &str) -> Result<Claims, JwtError> {
        validate_access_token(token, &self.secret)
    }

    pub fn validate_refresh(&self, token: &str) -> Result<Claims, JwtError> {
        validate_refresh_token(token, &self.secret)
    }
}
