//! One-shot rewrite of legacy plaintext secrets into the canonical hash form.

use serde::Serialize;

use warden_auth::{AuthError, UserDirectory, hash_password, is_legacy_secret};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MigrationReport {
    pub scanned: usize,
    pub migrated: usize,
    pub failed: usize,
}

/// Hash every stored secret that lacks the `hash.salt` separator.
///
/// A failure on one record is logged and counted; the rest still migrate.
pub async fn migrate_legacy_secrets(
    directory: &dyn UserDirectory,
) -> Result<MigrationReport, AuthError> {
    let users = directory.list_users().await?;
    let mut report = MigrationReport {
        scanned: users.len(),
        ..MigrationReport::default()
    };

    for mut user in users {
        if !is_legacy_secret(&user.secret) {
            continue;
        }

        let user_id = user.id;
        let result = match hash_password(&user.secret) {
            Ok(hashed) => {
                user.secret = hashed;
                directory.update_user(user).await.map_err(AuthError::from)
            }
            Err(e) => Err(e),
        };

        match result {
            Ok(_) => report.migrated += 1,
            Err(e) => {
                report.failed += 1;
                tracing::warn!(user_id = %user_id, error = %e, "legacy secret migration failed");
            }
        }
    }

    tracing::info!(
        scanned = report.scanned,
        migrated = report.migrated,
        failed = report.failed,
        "legacy secret migration finished"
    );
    Ok(report)
}
