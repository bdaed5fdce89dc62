/// Database models for the academy system
///
/// # Models
///
/// - `user`: Accounts, roles and role predicates
/// - `academy`: Academies (tenants) that accounts belong to
/// - `player_guardian`: Player to parent links and their status workflow
///
/// # Example
///
/// ```no_run
/// use academy_shared::models::academy::{Academy, AcademyStatus, CreateAcademy};
/// use academy_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
///
/// let academy = Academy::create(&pool, CreateAcademy {
///     name: "North FC Academy".to_string(),
///     email: "info@northfc.test".to_string(),
///     subdomain: "north-fc".to_string(),
///     status: AcademyStatus::Active,
///     address: None,
///     phone: None,
/// }).await?;
/// # Ok(())
/// # }
/// ```

pub mod academy;
pub mod player_guardian;
pub mod user;
