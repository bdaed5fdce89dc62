/// Database tests for pools, migrations, accounts and academies
///
/// Requires PostgreSQL via DATABASE_URL; every test returns early without it.

mod common;

use academy_shared::db::migrations::get_migration_status;
use academy_shared::db::pool::{get_pool_stats, health_check};
use academy_shared::models::academy::{Academy, AcademyStatus};
use academy_shared::models::user::{User, UserFilter, UserRole};
use academy_shared::services::academy::{AcademyChanges, AcademyService, NewAcademy, SUBDOMAIN_TAKEN};
use academy_shared::services::user_management::{
    AccountChanges, NewAccount, UserManagementService, ACADEMY_NOT_FOUND, EMAIL_TAKEN,
};
use academy_shared::services::ServiceError;
use common::{create_academy, create_user, test_pool, unique, unique_email};
use uuid::Uuid;

#[tokio::test]
async fn test_pool_is_healthy() {
    let Some(pool) = test_pool().await else { return };

    health_check(&pool).await.expect("health check");

    let stats = get_pool_stats(&pool);
    assert!(stats.total_connections >= 1);
}

#[tokio::test]
async fn test_migrations_are_applied() {
    let Some(pool) = test_pool().await else { return };

    let status = get_migration_status(&pool).await.unwrap();

    assert!(status.is_up_to_date);
    assert_eq!(status.latest_version, Some(20250101000000));
}

fn new_account(role: UserRole, academy_id: Option<Uuid>) -> NewAccount {
    NewAccount {
        email: unique_email(role.as_str()),
        password: "Str0ng!Pass".to_string(),
        role,
        first_name: Some("Robin".to_string()),
        last_name: Some("Hale".to_string()),
        phone: None,
        academy_id,
    }
}

#[tokio::test]
async fn test_create_account_hashes_password_and_lowercases_email() {
    let Some(pool) = test_pool().await else { return };
    let academy = create_academy(&pool).await;
    let service = UserManagementService::new(pool.clone());

    let mut account = new_account(UserRole::Coach, Some(academy.id));
    let email = account.email.clone();
    account.email = format!("  {}  ", email.to_uppercase());

    let user = service.try_create(account).await.unwrap();

    assert_eq!(user.email, email);
    assert_ne!(user.password_hash, "Str0ng!Pass");
    assert!(user.password_hash.starts_with("$argon2id$"));
    assert_eq!(User::find_by_email(&pool, &email).await.unwrap().unwrap().id, user.id);
}

#[tokio::test]
async fn test_duplicate_email_is_reported() {
    let Some(pool) = test_pool().await else { return };
    let academy = create_academy(&pool).await;
    let service = UserManagementService::new(pool.clone());

    let account = new_account(UserRole::Staff, Some(academy.id));
    service.try_create(account.clone()).await.unwrap();

    let response = service.create(account).await;

    assert!(!response.success);
    assert_eq!(response.errors, vec![EMAIL_TAKEN.to_string()]);
}

#[tokio::test]
async fn test_unknown_academy_is_reported() {
    let Some(pool) = test_pool().await else { return };
    let service = UserManagementService::new(pool.clone());

    let err = service
        .try_create(new_account(UserRole::Player, Some(Uuid::new_v4())))
        .await
        .unwrap_err();

    match err {
        ServiceError::Invalid(errors) => assert_eq!(errors, vec![ACADEMY_NOT_FOUND.to_string()]),
        other => panic!("unexpected error: {other}"),
    }
}

#[tokio::test]
async fn test_update_account_changes_role_and_password() {
    let Some(pool) = test_pool().await else { return };
    let academy = create_academy(&pool).await;
    let service = UserManagementService::new(pool.clone());
    let user = service
        .try_create(new_account(UserRole::Staff, Some(academy.id)))
        .await
        .unwrap();

    let updated = service
        .try_update(
            &user,
            AccountChanges {
                role: Some(UserRole::Coach),
                password: Some("An0ther!Pass".to_string()),
                phone: Some(Some("555-0100".to_string())),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.role, UserRole::Coach);
    assert_eq!(updated.phone.as_deref(), Some("555-0100"));
    assert_ne!(updated.password_hash, user.password_hash);
    assert!(updated.updated_at >= user.updated_at);
}

#[tokio::test]
async fn test_delete_missing_account_is_not_found() {
    let Some(pool) = test_pool().await else { return };
    let service = UserManagementService::new(pool.clone());

    assert!(matches!(service.delete(Uuid::new_v4()).await, Err(ServiceError::NotFound)));
}

#[tokio::test]
async fn test_bootstrap_super_admin_runs_once() {
    let Some(pool) = test_pool().await else { return };
    let service = UserManagementService::new(pool.clone());
    let email = unique_email("root");

    let created = service.bootstrap_super_admin(&email, "B00tstrap!Pass").await.unwrap();
    let admin = created.expect("admin created");
    assert_eq!(admin.role, UserRole::SuperAdmin);
    assert!(admin.academy_id.is_none());

    let again = service.bootstrap_super_admin(&email, "B00tstrap!Pass").await.unwrap();
    assert!(again.is_none());
}

#[tokio::test]
async fn test_list_orders_by_rank_and_filters() {
    let Some(pool) = test_pool().await else { return };
    let academy = create_academy(&pool).await;
    create_user(&pool, UserRole::Player, Some(academy.id)).await;
    create_user(&pool, UserRole::AcademyOwner, Some(academy.id)).await;
    create_user(&pool, UserRole::Coach, Some(academy.id)).await;

    let filter = UserFilter {
        academy_id: Some(academy.id),
        role: None,
    };
    let users = User::list(&pool, filter, 10, 0).await.unwrap();
    let roles: Vec<UserRole> = users.iter().map(|u| u.role).collect();

    assert_eq!(roles, vec![UserRole::AcademyOwner, UserRole::Coach, UserRole::Player]);
    assert_eq!(User::count(&pool, filter).await.unwrap(), 3);

    let coaches = UserFilter {
        academy_id: Some(academy.id),
        role: Some(UserRole::Coach),
    };
    assert_eq!(User::list(&pool, coaches, 10, 0).await.unwrap().len(), 1);
}

fn new_academy(subdomain: &str) -> NewAcademy {
    NewAcademy {
        name: "Riverside Academy".to_string(),
        email: format!("{}@academy.test", subdomain),
        subdomain: subdomain.to_string(),
        status: AcademyStatus::Active,
        address: None,
        phone: None,
    }
}

#[tokio::test]
async fn test_create_academy_normalizes_subdomain() {
    let Some(pool) = test_pool().await else { return };
    let service = AcademyService::new(pool.clone());
    let subdomain = unique("river");

    let academy = service
        .try_create(new_academy(&subdomain.to_uppercase()))
        .await
        .unwrap();

    assert_eq!(academy.subdomain, subdomain);
    assert!(academy.is_active());
    let found = Academy::find_by_subdomain(&pool, &subdomain).await.unwrap().unwrap();
    assert_eq!(found.id, academy.id);
}

#[tokio::test]
async fn test_duplicate_subdomain_is_reported() {
    let Some(pool) = test_pool().await else { return };
    let service = AcademyService::new(pool.clone());
    let subdomain = unique("dup");
    service.try_create(new_academy(&subdomain)).await.unwrap();

    let mut second = new_academy(&subdomain);
    second.email = unique_email("other");
    let response = service.create(second).await;

    assert!(!response.success);
    assert_eq!(response.errors, vec![SUBDOMAIN_TAKEN.to_string()]);
}

#[tokio::test]
async fn test_update_academy_status() {
    let Some(pool) = test_pool().await else { return };
    let academy = create_academy(&pool).await;
    let service = AcademyService::new(pool.clone());

    let suspended = service
        .try_update(
            &academy,
            AcademyChanges {
                status: Some(AcademyStatus::Suspended),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    assert_eq!(suspended.status, AcademyStatus::Suspended);
    assert!(!suspended.is_active());
}

#[tokio::test]
async fn test_deleting_academy_detaches_members() {
    let Some(pool) = test_pool().await else { return };
    let academy = create_academy(&pool).await;
    let coach = create_user(&pool, UserRole::Coach, Some(academy.id)).await;

    AcademyService::new(pool.clone()).delete(academy.id).await.unwrap();

    assert!(Academy::find_by_id(&pool, academy.id).await.unwrap().is_none());
    let coach = User::find_by_id(&pool, coach.id).await.unwrap().unwrap();
    assert!(coach.academy_id.is_none());
}
