/// Password hashing and password policy
///
/// Stored credentials are Argon2id PHC strings (64 MB memory, 3 passes,
/// 4 lanes, 32-byte output). Verification reads the parameters back out of
/// the stored hash, so hashes written with older parameters keep verifying.
///
/// New passwords, whether set on user creation or on update, go through
/// [`check_new_password`]: the confirmation must match and the password must
/// pass [`validate_password_strength`].
///
/// # Example
///
/// ```
/// use taskflow_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Tr0ub4dor&3")?;
/// assert!(verify_password("Tr0ub4dor&3", &hash)?);
/// assert!(!verify_password("tr0ub4dor&3", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, ParamsBuilder, Version,
};

const MEMORY_COST_KIB: u32 = 65536;
const TIME_COST: u32 = 3;
const PARALLELISM: u32 = 4;
const OUTPUT_LEN: usize = 32;

/// Minimum password length in characters
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// Password hashing and policy errors
#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashError(String),

    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    /// The stored hash is not a parseable PHC string
    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),

    /// Fails the strength policy; the message names the missing rule
    #[error("{0}")]
    Weak(String),

    #[error("Password and confirmation do not match")]
    Mismatch,
}

/// Hashes a password with Argon2id and a fresh random salt
///
/// Output looks like `$argon2id$v=19$m=65536,t=3,p=4$<salt>$<hash>`.
///
/// # Errors
///
/// Returns [`PasswordError::HashError`] if the hasher rejects its input.
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let params = ParamsBuilder::new()
        .m_cost(MEMORY_COST_KIB)
        .t_cost(TIME_COST)
        .p_cost(PARALLELISM)
        .output_len(OUTPUT_LEN)
        .build()
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    let hash = Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(e.to_string()))?;

    Ok(hash.to_string())
}

/// Checks a password against a stored hash in constant time
///
/// `Ok(false)` means the password is wrong; `Err` means the hash itself is
/// unusable.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|e| PasswordError::InvalidHash(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(e.to_string())),
    }
}

/// Password policy: at least 8 characters with an uppercase letter, a
/// lowercase letter, a digit, and a symbol
///
/// ```
/// use taskflow_shared::auth::password::validate_password_strength;
///
/// assert!(validate_password_strength("MyP@ssw0rd!").is_ok());
/// assert!(validate_password_strength("Password123").is_err());
/// ```
pub fn validate_password_strength(password: &str) -> Result<(), PasswordError> {
    let weak = |rule: &str| Err(PasswordError::Weak(format!("Password must {}", rule)));

    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return weak("be at least 8 characters long");
    }
    if !password.chars().any(char::is_uppercase) {
        return weak("contain at least one uppercase letter");
    }
    if !password.chars().any(char::is_lowercase) {
        return weak("contain at least one lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return weak("contain at least one digit");
    }
    if !password.chars().any(|c| !c.is_alphanumeric()) {
        return weak("contain at least one special character");
    }

    Ok(())
}

/// Validates a password chosen through the user form
///
/// A missing confirmation is accepted; a present one must match exactly.
pub fn check_new_password(password: &str, confirm: Option<&str>) -> Result<(), PasswordError> {
    if let Some(confirm) = confirm {
        if confirm != password {
            return Err(PasswordError::Mismatch);
        }
    }
    validate_password_strength(password)
}
