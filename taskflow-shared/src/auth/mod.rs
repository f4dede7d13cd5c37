/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id hashing and the password policy
/// - [`jwt`]: HS256 access/refresh tokens
/// - [`context`]: the authenticated principal and bearer-header parsing
/// - [`authorization`]: OR-semantics permission checks and ownership checks
///
/// # Example
///
/// ```
/// use taskflow_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("C0rrect-Horse")?;
/// assert!(verify_password("C0rrect-Horse", &hash)?);
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod context;
pub mod jwt;
pub mod password;
