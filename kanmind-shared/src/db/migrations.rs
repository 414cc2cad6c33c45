/// Schema migrations
///
/// Migrations live in `kanmind-shared/migrations/` and are embedded into the
/// binary with `sqlx::migrate!`, so a deployed API can bring an empty
/// database up to date on startup.
///
/// ```text
/// 20250101000001_create_users.sql
/// 20250101000002_create_boards.sql
/// 20250101000003_create_tasks.sql
/// 20250101000004_create_comments.sql
/// ```

use sqlx::{migrate::Migrator, postgres::PgPool};
use tracing::{info, warn};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Applies all pending migrations
///
/// # Errors
///
/// Fails when a migration does not apply or an applied migration was edited
/// after the fact.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    info!(
        available = MIGRATOR.iter().count(),
        "Running database migrations"
    );

    match MIGRATOR.run(pool).await {
        Ok(()) => {
            info!("Database migrations completed");
            Ok(())
        }
        Err(e) => {
            warn!(error = %e, "Migration failed");
            Err(e)
        }
    }
}

/// Versions of the embedded migrations, in apply order
pub fn embedded_versions() -> Vec<i64> {
    MIGRATOR.iter().map(|m| m.version).collect()
}
