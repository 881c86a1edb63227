//! Integration tests for the PostgreSQL unit of work
//!
//! These tests need a reachable PostgreSQL server (see `DATABASE_URL`) and are
//! ignored by default. Run them with `cargo test -- --ignored`.

use common::{
    PgUnitOfWork, UnitOfWork, UnitOfWorkError, UnitOfWorkExt,
    database::{DatabaseConfig, health_check, init_pool},
};
use serial_test::serial;
use sqlx::{PgPool, Row};

async fn setup() -> Result<PgPool, Box<dyn std::error::Error>> {
    let db_config = DatabaseConfig::from_env()?;
    let pool = init_pool(&db_config).await?;
    assert!(health_check(&pool).await?, "Database health check failed");

    sqlx::query("CREATE TABLE IF NOT EXISTS uow_probe (value INT NOT NULL)")
        .execute(&pool)
        .await?;
    sqlx::query("TRUNCATE uow_probe").execute(&pool).await?;
    Ok(pool)
}

async fn count(pool: &PgPool) -> Result<i64, sqlx::Error> {
    let row = sqlx::query("SELECT COUNT(*) AS total FROM uow_probe")
        .fetch_one(pool)
        .await?;
    Ok(row.get("total"))
}

async fn insert(uow: &PgUnitOfWork, value: i32) -> Result<(), common::RepositoryError> {
    let mut session = uow.session().await?;
    sqlx::query("INSERT INTO uow_probe (value) VALUES ($1)")
        .bind(value)
        .execute(session.connection())
        .await?;
    Ok(())
}

#[tokio::test]
#[serial]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_run_commits_all_writes() -> Result<(), Box<dyn std::error::Error>> {
    let pool = setup().await?;
    let uow = PgUnitOfWork::new(pool.clone());

    uow.run(async {
        insert(&uow, 1).await?;
        insert(&uow, 2).await?;
        Ok::<_, common::RepositoryError>(())
    })
    .await?;

    assert_eq!(count(&pool).await?, 2);
    assert!(!uow.is_active().await);
    Ok(())
}

#[tokio::test]
#[serial]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_run_rolls_back_every_write() -> Result<(), Box<dyn std::error::Error>> {
    let pool = setup().await?;
    let uow = PgUnitOfWork::new(pool.clone());

    let result = uow
        .run(async {
            insert(&uow, 1).await?;
            insert(&uow, 2).await?;
            insert(&uow, 3).await?;
            Err::<(), _>(common::RepositoryError::from(
                common::NotFoundError::new("x", "Probe"),
            ))
        })
        .await;

    assert!(result.is_err());
    assert_eq!(count(&pool).await?, 0);
    assert!(!uow.is_active().await);
    Ok(())
}

#[tokio::test]
#[serial]
#[ignore = "requires a running PostgreSQL (DATABASE_URL)"]
async fn test_explicit_lifecycle() -> Result<(), Box<dyn std::error::Error>> {
    let pool = setup().await?;
    let uow = PgUnitOfWork::new(pool.clone());

    assert!(matches!(uow.commit().await, Err(UnitOfWorkError::NotStarted)));

    uow.start().await?;
    assert!(matches!(uow.start().await, Err(UnitOfWorkError::AlreadyStarted)));
    insert(&uow, 1).await?;
    uow.rollback().await?;
    assert_eq!(count(&pool).await?, 0);

    uow.start().await?;
    insert(&uow, 1).await?;
    uow.commit().await?;
    assert_eq!(count(&pool).await?, 1);

    insert(&uow, 2).await?;
    assert_eq!(count(&pool).await?, 2, "writes outside a transaction autocommit");
    Ok(())
}
