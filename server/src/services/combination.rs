//! Table-combination service — sets of tables seated together as one unit.
//!
//! DESIGN
//! ======
//! A combination joins 2–3 tables on the same floorplan. Validation happens
//! here rather than in the routes so WS and REST callers agree: distinct
//! table ids, a shared floorplan, and sane cover bounds.

use sqlx::PgPool;
use uuid::Uuid;

#[cfg(test)]
#[path = "combination_test.rs"]
mod tests;

/// Combinations join at least two and at most three tables.
pub const MIN_COMBINATION_TABLES: usize = 2;
pub const MAX_COMBINATION_TABLES: usize = 3;

#[derive(Debug, thiserror::Error)]
pub enum CombinationError {
    #[error("combination not found: {0}")]
    NotFound(Uuid),
    #[error("invalid combination: {0}")]
    Validation(String),
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

impl crate::frame::ErrorCode for CombinationError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotFound(_) => "E_COMBINATION_NOT_FOUND",
            Self::Validation(_) => "E_VALIDATION",
            Self::Database(_) => "E_DATABASE",
        }
    }
}

/// Row returned from combination queries.
#[derive(Debug, Clone, serde::Serialize)]
pub struct CombinationRow {
    pub id: Uuid,
    pub name: String,
    pub floorplan_id: Uuid,
    pub table_ids: Vec<Uuid>,
    pub min_covers: i32,
    pub max_covers: i32,
    pub is_active: bool,
    pub version: i32,
}

/// Fields accepted when creating a combination.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct NewCombination {
    pub name: String,
    pub floorplan_id: Uuid,
    pub table_ids: Vec<Uuid>,
    pub min_covers: i32,
    pub max_covers: i32,
}

/// Sparse update for a combination.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct CombinationPatch {
    pub name: Option<String>,
    pub table_ids: Option<Vec<Uuid>>,
    pub min_covers: Option<i32>,
    pub max_covers: Option<i32>,
    pub is_active: Option<bool>,
}

type CombinationTuple = (Uuid, String, Uuid, Vec<Uuid>, i32, i32, bool, i32);

fn row_to_combination(row: CombinationTuple) -> CombinationRow {
    let (id, name, floorplan_id, table_ids, min_covers, max_covers, is_active, version) = row;
    CombinationRow { id, name, floorplan_id, table_ids, min_covers, max_covers, is_active, version }
}

fn validate_shape(table_ids: &[Uuid], min_covers: i32, max_covers: i32) -> Result<(), CombinationError> {
    if table_ids.len() < MIN_COMBINATION_TABLES || table_ids.len() > MAX_COMBINATION_TABLES {
        return Err(CombinationError::Validation(format!(
            "combinations join {MIN_COMBINATION_TABLES}-{MAX_COMBINATION_TABLES} tables, got {}",
            table_ids.len()
        )));
    }
    let mut sorted = table_ids.to_vec();
    sorted.sort();
    sorted.dedup();
    if sorted.len() != table_ids.len() {
        return Err(CombinationError::Validation("combination tables must be distinct".into()));
    }
    if min_covers < 1 || max_covers < min_covers {
        return Err(CombinationError::Validation(format!(
            "cover bounds {min_covers}..{max_covers} must satisfy 1 <= min <= max"
        )));
    }
    Ok(())
}

/// Check every table exists and sits on the given floorplan.
async fn validate_membership(pool: &PgPool, floorplan_id: Uuid, table_ids: &[Uuid]) -> Result<(), CombinationError> {
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM tables WHERE floorplan_id = $1 AND id = ANY($2)",
    )
    .bind(floorplan_id)
    .bind(table_ids)
    .fetch_one(pool)
    .await?;

    let expected = i64::try_from(table_ids.len()).unwrap_or(i64::MAX);
    if count != expected {
        return Err(CombinationError::Validation(
            "every combined table must exist on the combination's floorplan".into(),
        ));
    }
    Ok(())
}

/// Create a new combination.
///
/// # Errors
///
/// Returns `Validation` for bad shapes or membership, otherwise database errors.
pub async fn create_combination(pool: &PgPool, new: NewCombination) -> Result<CombinationRow, CombinationError> {
    validate_shape(&new.table_ids, new.min_covers, new.max_covers)?;
    validate_membership(pool, new.floorplan_id, &new.table_ids).await?;

    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO combinations (id, name, floorplan_id, table_ids, min_covers, max_covers)
         VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(id)
    .bind(&new.name)
    .bind(new.floorplan_id)
    .bind(&new.table_ids)
    .bind(new.min_covers)
    .bind(new.max_covers)
    .execute(pool)
    .await?;

    Ok(CombinationRow {
        id,
        name: new.name,
        floorplan_id: new.floorplan_id,
        table_ids: new.table_ids,
        min_covers: new.min_covers,
        max_covers: new.max_covers,
        is_active: true,
        version: 1,
    })
}

/// List combinations, optionally restricted to one floorplan.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn list_combinations(pool: &PgPool, floorplan_id: Option<Uuid>) -> Result<Vec<CombinationRow>, CombinationError> {
    let rows = match floorplan_id {
        Some(plan_id) => {
            sqlx::query_as::<_, CombinationTuple>(
                "SELECT id, name, floorplan_id, table_ids, min_covers, max_covers, is_active, version
                 FROM combinations WHERE floorplan_id = $1 ORDER BY created_at ASC",
            )
            .bind(plan_id)
            .fetch_all(pool)
            .await?
        }
        None => {
            sqlx::query_as::<_, CombinationTuple>(
                "SELECT id, name, floorplan_id, table_ids, min_covers, max_covers, is_active, version
                 FROM combinations ORDER BY created_at ASC",
            )
            .fetch_all(pool)
            .await?
        }
    };

    Ok(rows.into_iter().map(row_to_combination).collect())
}

/// Fetch one combination.
///
/// # Errors
///
/// Returns a database error if the query fails.
pub async fn get_combination(pool: &PgPool, id: Uuid) -> Result<Option<CombinationRow>, CombinationError> {
    let row = sqlx::query_as::<_, CombinationTuple>(
        "SELECT id, name, floorplan_id, table_ids, min_covers, max_covers, is_active, version
         FROM combinations WHERE id = $1",
    )
    .bind(id)
    .fetch_optional(pool)
    .await?;

    Ok(row.map(row_to_combination))
}

/// Apply a sparse patch and bump the version.
///
/// # Errors
///
/// Returns `NotFound` for unknown combinations and `Validation` for bad shapes.
pub async fn update_combination(pool: &PgPool, id: Uuid, patch: CombinationPatch) -> Result<CombinationRow, CombinationError> {
    let mut combination = get_combination(pool, id)
        .await?
        .ok_or(CombinationError::NotFound(id))?;

    if let Some(name) = patch.name {
        combination.name = name;
    }
    if let Some(table_ids) = patch.table_ids {
        combination.table_ids = table_ids;
    }
    if let Some(min_covers) = patch.min_covers {
        combination.min_covers = min_covers;
    }
    if let Some(max_covers) = patch.max_covers {
        combination.max_covers = max_covers;
    }
    if let Some(is_active) = patch.is_active {
        combination.is_active = is_active;
    }

    validate_shape(&combination.table_ids, combination.min_covers, combination.max_covers)?;
    validate_membership(pool, combination.floorplan_id, &combination.table_ids).await?;
    combination.version += 1;

    sqlx::query(
        "UPDATE combinations
         SET name = $2, table_ids = $3, min_covers = $4, max_covers = $5, is_active = $6,
             version = $7, updated_at = now()
         WHERE id = $1",
    )
    .bind(id)
    .bind(&combination.name)
    .bind(&combination.table_ids)
    .bind(combination.min_covers)
    .bind(combination.max_covers)
    .bind(combination.is_active)
    .bind(combination.version)
    .execute(pool)
    .await?;

    Ok(combination)
}

/// Delete a combination.
///
/// # Errors
///
/// Returns `NotFound` if nothing was deleted.
pub async fn delete_combination(pool: &PgPool, id: Uuid) -> Result<(), CombinationError> {
    let result = sqlx::query("DELETE FROM combinations WHERE id = $1")
        .bind(id)
        .execute(pool)
        .await?;

    if result.rows_affected() == 0 {
        return Err(CombinationError::NotFound(id));
    }
    Ok(())
}
