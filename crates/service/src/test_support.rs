#![cfg(test)]
use tokio::sync::OnceCell;
use sea_orm::DatabaseConnection;
use migration::MigratorTrait;
use models::db::connect_with_config;

// Ensure migrations run only once across the entire test process
static MIGRATED: OnceCell<Result<(), String>> = OnceCell::const_new();

fn test_db_config() -> configs::DatabaseConfig {
    let mut cfg = configs::DatabaseConfig::default();
    cfg.normalize_from_env();
    cfg.min_connections = 1;
    cfg.acquire_timeout_secs = 10;
    cfg
}

pub async fn get_db() -> Result<DatabaseConnection, anyhow::Error> {
    let migrated = MIGRATED
        .get_or_init(|| async {
            let db = connect_with_config(&test_db_config()).await.map_err(|e| e.to_string())?;
            migration::Migrator::up(&db, None).await.map_err(|e| e.to_string())
        })
        .await;
    if let Err(e) = migrated {
        anyhow::bail!("migration failed: {e}");
    }

    // fresh connection for the current test's runtime
    let db = connect_with_config(&test_db_config()).await?;
    Ok(db)
}
