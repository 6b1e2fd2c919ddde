//! Per-user backup preferences stored in `backup_settings`.

use chrono::{DateTime, SecondsFormat, Utc};
use keepsake_core::config::{BackupDefaults, BackupInterval};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::catalog::BackupCatalog;
use crate::error::{BackupError, Result};
use crate::user::UserId;

/// What a user can change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BackupSettings {
    pub auto_backup_enabled: bool,
    pub interval: BackupInterval,
}

impl From<BackupDefaults> for BackupSettings {
    fn from(defaults: BackupDefaults) -> Self {
        Self {
            auto_backup_enabled: defaults.auto_backup_enabled,
            interval: defaults.interval,
        }
    }
}

/// Settings plus facts about the latest completed backup.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsView {
    pub auto_backup_enabled: bool,
    pub interval: BackupInterval,
    pub last_backup_date: Option<DateTime<Utc>>,
    pub backup_size_bytes: u64,
}

/// Stored settings, or `None` if the user never saved any.
pub fn load(conn: &Connection, user: &UserId) -> Result<Option<BackupSettings>> {
    let stored = conn
        .query_row(
            "SELECT auto_backup_enabled, backup_interval FROM backup_settings WHERE user_id = ?1",
            [user.as_str()],
            |row| Ok((row.get::<_, bool>(0)?, row.get::<_, String>(1)?)),
        )
        .optional()?;

    stored
        .map(|(auto_backup_enabled, interval)| {
            let interval = interval
                .parse::<BackupInterval>()
                .map_err(|e| BackupError::Database(e.to_string()))?;
            Ok(BackupSettings {
                auto_backup_enabled,
                interval,
            })
        })
        .transpose()
}

/// Insert or replace the user's settings.
pub fn save(conn: &Connection, user: &UserId, settings: &BackupSettings) -> Result<()> {
    conn.execute(
        "INSERT INTO backup_settings (user_id, auto_backup_enabled, backup_interval, updated_at) \
         VALUES (?1, ?2, ?3, ?4) \
         ON CONFLICT (user_id) DO UPDATE SET \
             auto_backup_enabled = excluded.auto_backup_enabled, \
             backup_interval = excluded.backup_interval, \
             updated_at = excluded.updated_at",
        params![
            user.as_str(),
            settings.auto_backup_enabled,
            settings.interval.as_str(),
            Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
        ],
    )?;
    info!(
        "Saved backup settings for {}: auto={}, interval={}",
        user, settings.auto_backup_enabled, settings.interval
    );
    Ok(())
}

/// The settings page: stored values (or defaults) and the latest backup.
pub fn view(
    conn: &Connection,
    catalog: &BackupCatalog,
    user: &UserId,
    defaults: BackupDefaults,
) -> Result<SettingsView> {
    let settings = load(conn, user)?.unwrap_or_else(|| defaults.into());
    let latest = catalog.latest_completed(conn, user)?;

    Ok(SettingsView {
        auto_backup_enabled: settings.auto_backup_enabled,
        interval: settings.interval,
        last_backup_date: latest.as_ref().map(|e| e.created_at),
        backup_size_bytes: latest.map(|e| e.size_bytes).unwrap_or(0),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::ArtifactHandle;
    use crate::schema;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        schema::ensure_catalog(&conn).unwrap();
        conn
    }

    fn user() -> UserId {
        UserId::new("u1").unwrap()
    }

    #[test]
    fn test_view_uses_defaults_when_unset() {
        let conn = conn();
        let view = view(&conn, &BackupCatalog::new(), &user(), BackupDefaults::default()).unwrap();

        assert!(!view.auto_backup_enabled);
        assert_eq!(view.interval, BackupInterval::Weekly);
        assert!(view.last_backup_date.is_none());
        assert_eq!(view.backup_size_bytes, 0);
    }

    #[test]
    fn test_save_then_load_overwrites() {
        let conn = conn();
        let daily = BackupSettings {
            auto_backup_enabled: true,
            interval: BackupInterval::Daily,
        };
        save(&conn, &user(), &daily).unwrap();
        assert_eq!(load(&conn, &user()).unwrap(), Some(daily));

        let monthly = BackupSettings {
            auto_backup_enabled: false,
            interval: BackupInterval::Monthly,
        };
        save(&conn, &user(), &monthly).unwrap();
        assert_eq!(load(&conn, &user()).unwrap(), Some(monthly));
        assert_eq!(load(&conn, &UserId::new("u2").unwrap()).unwrap(), None);
    }

    #[test]
    fn test_view_reports_latest_backup() {
        let conn = conn();
        let catalog = BackupCatalog::new();
        let handle = ArtifactHandle::parse("u1/backup-u1-a.tar.gz").unwrap();
        let created = Utc::now();
        catalog
            .record_completed(&conn, &user(), &handle, 4096, created)
            .unwrap();
        catalog.record_failed(&conn, &user(), "later failure").unwrap();

        let view = view(&conn, &catalog, &user(), BackupDefaults::default()).unwrap();
        assert_eq!(view.backup_size_bytes, 4096);
        assert_eq!(
            view.last_backup_date.map(|d| d.timestamp_millis()),
            Some(created.timestamp_millis())
        );
    }

    #[test]
    fn test_settings_json_shape() {
        let json = serde_json::to_value(BackupSettings {
            auto_backup_enabled: true,
            interval: BackupInterval::Weekly,
        })
        .unwrap();
        assert_eq!(json["autoBackupEnabled"], true);
        assert_eq!(json["interval"], "weekly");
    }
}
