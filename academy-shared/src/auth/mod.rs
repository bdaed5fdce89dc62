/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing, strength rules, generated passwords
/// - [`jwt`]: HS256 access and refresh tokens
/// - [`middleware`]: Bearer token authentication that loads the current user
/// - [`policy`]: Role based checks for users, academies and guardian links
///
/// # Example
///
/// ```no_run
/// use academy_shared::auth::password::{hash_password, verify_password};
/// use academy_shared::auth::jwt::issue_token_pair;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Corner!Kick9")?;
/// assert!(verify_password("Corner!Kick9", &hash)?);
///
/// let tokens = issue_token_pair(Uuid::new_v4(), "a-signing-secret-of-at-least-32-bytes")?;
/// println!("{}", tokens.access_token);
/// # Ok(())
/// # }
/// ```

pub mod jwt;
pub mod middleware;
pub mod password;
pub mod policy;
