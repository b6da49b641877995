//! Seating-settings service — the singleton configuration row.
//!
//! DESIGN
//! ======
//! Settings live in a single Postgres row created lazily on first read.
//! Updates validate mode/strategy names and check every zone in the priority
//! list actually exists, so the allocator never consults a ghost zone.

use sqlx::PgPool;
use uuid::Uuid;

#[cfg(test)]
#[path = "settings_test.rs"]
mod tests;

/// Accepted allocation modes.
pub const ALLOCATION_MODES: [&str; 2] = ["auto", "manual"];

/// Accepted allocation strategies.
pub const ALLOCATION_STRATEGIES: [&str; 3] = ["balanced", "priority", "rotation"];

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("invalid settings: {0}")]
    Validation(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for SettingsError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "E_VALIDATION",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

/// The seating settings row.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SeatingSettings {
    pub buffer_before_min: i32,
    pub buffer_after_min: i32,
    pub allocation_mode: String,
    pub allocation_strategy: String,
    pub zone_priority: Vec<Uuid>,
    pub emergency_enabled: bool,
    pub emergency_min_occupancy_pct: i32,
    pub version: i32,
}

impl Default for SeatingSettings {
    fn default() -> Self {
        Self {
            buffer_before_min: 0,
            buffer_after_min: 15,
            allocation_mode: "auto".into(),
            allocation_strategy: "balanced".into(),
            zone_priority: Vec::new(),
            emergency_enabled: false,
            emergency_min_occupancy_pct: 85,
            version: 1,
        }
    }
}

/// Sparse update for the settings row.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct SettingsPatch {
    pub buffer_before_min: Option<i32>,
    pub buffer_after_min: Option<i32>,
    pub allocation_mode: Option<String>,
    pub allocation_strategy: Option<String>,
    pub zone_priority: Option<Vec<Uuid>>,
    pub emergency_enabled: Option<bool>,
    pub emergency_min_occupancy_pct: Option<i32>,
}

type SettingsTuple = (i32, i32, String, String, Vec<Uuid>, bool, i32, i32);

fn row_to_settings(row: SettingsTuple) -> SeatingSettings {
    let (
        buffer_before_min,
        buffer_after_min,
        allocation_mode,
        allocation_strategy,
        zone_priority,
        emergency_enabled,
        emergency_min_occupancy_pct,
        version,
    ) = row;
    SeatingSettings {
        buffer_before_min,
        buffer_after_min,
        allocation_mode,
        allocation_strategy,
        zone_priority,
        emergency_enabled,
        emergency_min_occupancy_pct,
        version,
    }
}

pub(crate) fn validate_patch(settings: &SeatingSettings) -> Result<(), SettingsError> {
    if !ALLOCATION_MODES.contains(&settings.allocation_mode.as_str()) {
        return Err(SettingsError::Validation(format!(
            "unknown allocation mode '{}'",
            settings.allocation_mode
        )));
    }
    if !ALLOCATION_STRATEGIES.contains(&settings.allocation_strategy.as_str()) {
        return Err(SettingsError::Validation(format!(
            "unknown allocation strategy '{}'",
            settings.allocation_strategy
        )));
    }
    if settings.buffer_before_min < 0 || settings.buffer_after_min < 0 {
        return Err(SettingsError::Validation("buffers must be non-negative".into()));
    }
    if !(0..=100).contains(&settings.emergency_min_occupancy_pct) {
        return Err(SettingsError::Validation("emergency occupancy must be 0-100%".into()));
    }
    Ok(())
}

/// Read the settings row, inserting defaults on first access.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn get_settings(pool: &PgPool) -> Result<SeatingSettings, SettingsError> {
    let row = sqlx::query_as::<_, SettingsTuple>(
        "SELECT buffer_before_min, buffer_after_min, allocation_mode, allocation_strategy,
                zone_priority, emergency_enabled, emergency_min_occupancy_pct, version
         FROM seating_settings WHERE id = true",
    )
    .fetch_optional(pool)
    .await?;

    if let Some(row) = row {
        return Ok(row_to_settings(row));
    }

    sqlx::query("INSERT INTO seating_settings (id) VALUES (true) ON CONFLICT (id) DO NOTHING")
        .execute(pool)
        .await?;
    Ok(SeatingSettings::default())
}

/// Apply a sparse patch and bump the version.
///
/// # Errors
///
/// Returns `Validation` for unknown modes/strategies, out-of-range values,
/// or priority entries that don't name an existing zone.
pub async fn update_settings(pool: &PgPool, patch: SettingsPatch) -> Result<SeatingSettings, SettingsError> {
    let mut settings = get_settings(pool).await?;

    if let Some(buffer_before_min) = patch.buffer_before_min {
        settings.buffer_before_min = buffer_before_min;
    }
    if let Some(buffer_after_min) = patch.buffer_after_min {
        settings.buffer_after_min = buffer_after_min;
    }
    if let Some(allocation_mode) = patch.allocation_mode {
        settings.allocation_mode = allocation_mode;
    }
    if let Some(allocation_strategy) = patch.allocation_strategy {
        settings.allocation_strategy = allocation_strategy;
    }
    if let Some(zone_priority) = patch.zone_priority {
        settings.zone_priority = zone_priority;
    }
    if let Some(emergency_enabled) = patch.emergency_enabled {
        settings.emergency_enabled = emergency_enabled;
    }
    if let Some(emergency_min_occupancy_pct) = patch.emergency_min_occupancy_pct {
        settings.emergency_min_occupancy_pct = emergency_min_occupancy_pct;
    }
    validate_patch(&settings)?;

    if !settings.zone_priority.is_empty() {
        let known: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM zones WHERE id = ANY($1)")
            .bind(&settings.zone_priority)
            .fetch_one(pool)
            .await?;
        let expected = i64::try_from(settings.zone_priority.len()).unwrap_or(i64::MAX);
        if known != expected {
            return Err(SettingsError::Validation(
                "zone priority list references an unknown zone".into(),
            ));
        }
    }

    settings.version += 1;
    sqlx::query(
        "INSERT INTO seating_settings (id, buffer_before_min, buffer_after_min, allocation_mode,
                                       allocation_strategy, zone_priority, emergency_enabled,
                                       emergency_min_occupancy_pct, version, updated_at)
         VALUES (true, $1, $2, $3, $4, $5, $6, $7, $8, now())
         ON CONFLICT (id) DO UPDATE SET
             buffer_before_min = EXCLUDED.buffer_before_min,
             buffer_after_min = EXCLUDED.buffer_after_min,
             allocation_mode = EXCLUDED.allocation_mode,
             allocation_strategy = EXCLUDED.allocation_strategy,
             zone_priority = EXCLUDED.zone_priority,
             emergency_enabled = EXCLUDED.emergency_enabled,
             emergency_min_occupancy_pct = EXCLUDED.emergency_min_occupancy_pct,
             version = EXCLUDED.version,
             updated_at = now()",
    )
    .bind(settings.buffer_before_min)
    .bind(settings.buffer_after_min)
    .bind(&settings.allocation_mode)
    .bind(&settings.allocation_strategy)
    .bind(&settings.zone_priority)
    .bind(settings.emergency_enabled)
    .bind(settings.emergency_min_occupancy_pct)
    .bind(settings.version)
    .execute(pool)
    .await?;

    Ok(settings)
}
