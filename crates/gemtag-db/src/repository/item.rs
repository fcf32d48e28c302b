//! # Tagged Item Repository
//!
//! Database operations for tagged inventory items.
//!
//! Items own a serial within `(category_code, year)`. The UNIQUE index on
//! those three columns is the last line of defence against a serial being
//! issued twice; deleting an item turns its serial into a gap.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite, SqlitePool};
use tracing::debug;

use super::to_u32;
use crate::error::{DbError, DbResult};
use gemtag_core::TaggedItem;

/// Row shape of the `tagged_items` table.
#[derive(Debug, sqlx::FromRow)]
struct TaggedItemRow {
    id: String,
    brand: String,
    category_code: String,
    location_code: String,
    year: i32,
    serial: i64,
    barcode: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<TaggedItemRow> for TaggedItem {
    type Error = DbError;

    fn try_from(row: TaggedItemRow) -> DbResult<Self> {
        Ok(TaggedItem {
            serial: to_u32("tagged_items.serial", row.serial)?,
            id: row.id,
            brand: row.brand,
            category_code: row.category_code,
            location_code: row.location_code,
            year: row.year,
            barcode: row.barcode,
            created_at: row.created_at,
        })
    }
}

/// Inserts one item.
///
/// A serial already owned by a live item surfaces as
/// [`DbError::UniqueViolation`] naming the serial.
pub(crate) async fn insert<'e, E>(executor: E, item: &TaggedItem) -> DbResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r#"
        INSERT INTO tagged_items (
            id, brand, category_code, location_code,
            year, serial, barcode, created_at
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
        "#,
    )
    .bind(&item.id)
    .bind(&item.brand)
    .bind(&item.category_code)
    .bind(&item.location_code)
    .bind(item.year)
    .bind(i64::from(item.serial))
    .bind(&item.barcode)
    .bind(item.created_at)
    .execute(executor)
    .await
    .map_err(|e| match DbError::from(e) {
        DbError::UniqueViolation { .. } => DbError::duplicate(
            "serial",
            format!("{}/{}/{}", item.category_code, item.year, item.serial),
        ),
        other => other,
    })?;

    debug!(id = %item.id, barcode = %item.barcode, "Tagged item inserted");
    Ok(())
}

/// Serials of all live items in one category/year stream, ascending.
pub(crate) async fn serials_in<'e, E>(
    executor: E,
    category_code: &str,
    year: i32,
) -> DbResult<Vec<u32>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let serials: Vec<i64> = sqlx::query_scalar(
        r#"
        SELECT serial
        FROM tagged_items
        WHERE category_code = ?1 AND year = ?2
        ORDER BY serial
        "#,
    )
    .bind(category_code)
    .bind(year)
    .fetch_all(executor)
    .await?;

    serials
        .into_iter()
        .map(|s| to_u32("tagged_items.serial", s))
        .collect()
}

const SELECT_ITEM: &str = r#"
    SELECT
        id, brand, category_code, location_code,
        year, serial, barcode, created_at
    FROM tagged_items
"#;

/// Repository for tagged item operations.
///
/// ## Usage
/// ```rust,ignore
/// let items = db.items();
/// let ring = items.get_by_barcode("MG-RNG-WH1-25-000003").await?;
/// items.delete(&ring.unwrap().id).await?; // serial 3 becomes a gap
/// ```
#[derive(Debug, Clone)]
pub struct TaggedItemRepository {
    pool: SqlitePool,
}

impl TaggedItemRepository {
    /// Creates a new TaggedItemRepository.
    pub fn new(pool: SqlitePool) -> Self {
        TaggedItemRepository { pool }
    }

    /// Inserts an item outside of any reservation.
    ///
    /// Batch saves should go through [`crate::SerialAllocator::commit_batch`],
    /// which also clears the holds.
    pub async fn insert(&self, item: &TaggedItem) -> DbResult<()> {
        insert(&self.pool, item).await
    }

    /// Gets an item by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<TaggedItem>> {
        let row = sqlx::query_as::<_, TaggedItemRow>(&format!("{SELECT_ITEM} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(TaggedItem::try_from).transpose()
    }

    /// Gets an item by its printed barcode value.
    pub async fn get_by_barcode(&self, barcode: &str) -> DbResult<Option<TaggedItem>> {
        let row =
            sqlx::query_as::<_, TaggedItemRow>(&format!("{SELECT_ITEM} WHERE barcode = ?1"))
                .bind(barcode)
                .fetch_optional(&self.pool)
                .await?;

        row.map(TaggedItem::try_from).transpose()
    }

    /// Lists the items of one category/year stream ordered by serial.
    pub async fn list_for_category_year(
        &self,
        category_code: &str,
        year: i32,
    ) -> DbResult<Vec<TaggedItem>> {
        let rows = sqlx::query_as::<_, TaggedItemRow>(&format!(
            "{SELECT_ITEM} WHERE category_code = ?1 AND year = ?2 ORDER BY serial"
        ))
        .bind(category_code)
        .bind(year)
        .fetch_all(&self.pool)
        .await?;

        debug!(
            category_code = %category_code,
            year,
            count = rows.len(),
            "Listed tagged items"
        );
        rows.into_iter().map(TaggedItem::try_from).collect()
    }

    /// Serials of the live items in one category/year stream, ascending.
    pub async fn serials_for_category_year(
        &self,
        category_code: &str,
        year: i32,
    ) -> DbResult<Vec<u32>> {
        serials_in(&self.pool, category_code, year).await
    }

    /// Deletes an item, freeing its serial for gap reuse.
    pub async fn delete(&self, id: &str) -> DbResult<()> {
        debug!(id = %id, "Deleting tagged item");

        let result = sqlx::query("DELETE FROM tagged_items WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        if result.rows_affected() == 0 {
            return Err(DbError::not_found("TaggedItem", id));
        }

        Ok(())
    }

    /// Counts live items, optionally within one category/year stream.
    pub async fn count(&self, stream: Option<(&str, i32)>) -> DbResult<u32> {
        let count: i64 = match stream {
            Some((category_code, year)) => {
                sqlx::query_scalar(
                    "SELECT COUNT(*) FROM tagged_items WHERE category_code = ?1 AND year = ?2",
                )
                .bind(category_code)
                .bind(year)
                .fetch_one(&self.pool)
                .await?
            }
            None => {
                sqlx::query_scalar("SELECT COUNT(*) FROM tagged_items")
                    .fetch_one(&self.pool)
                    .await?
            }
        };

        to_u32("count", count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pool::{Database, DbConfig};
    use gemtag_core::NewTaggedItem;

    fn ring(serial: u32) -> TaggedItem {
        NewTaggedItem {
            brand: "MG".to_string(),
            category_code: "RNG".to_string(),
            location_code: "WH1".to_string(),
            year: 2025,
            serial,
        }
        .into_item(6, Utc::now())
        .unwrap()
    }

    #[tokio::test]
    async fn test_insert_and_lookup() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.items();

        let item = ring(7);
        repo.insert(&item).await.unwrap();

        let by_id = repo.get_by_id(&item.id).await.unwrap().unwrap();
        assert_eq!(by_id, item);

        let by_barcode = repo
            .get_by_barcode("MG-RNG-WH1-25-000007")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_barcode.id, item.id);

        assert!(repo.get_by_id("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_serial_rejected() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.items();

        repo.insert(&ring(3)).await.unwrap();
        let err = repo.insert(&ring(3)).await.unwrap_err();

        match err {
            DbError::UniqueViolation { field, value } => {
                assert_eq!(field, "serial");
                assert_eq!(value, "RNG/2025/3");
            }
            other => panic!("expected UniqueViolation, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_serials_scoped_to_category_and_year() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.items();

        for serial in [4, 1, 2] {
            repo.insert(&ring(serial)).await.unwrap();
        }
        let mut bangle = ring(9);
        bangle.category_code = "BNG".to_string();
        repo.insert(&bangle).await.unwrap();

        assert_eq!(
            repo.serials_for_category_year("RNG", 2025).await.unwrap(),
            vec![1, 2, 4]
        );
        assert!(repo
            .serials_for_category_year("RNG", 2024)
            .await
            .unwrap()
            .is_empty());
        assert_eq!(repo.count(Some(("RNG", 2025))).await.unwrap(), 3);
        assert_eq!(repo.count(None).await.unwrap(), 4);
    }

    #[tokio::test]
    async fn test_delete_frees_serial() {
        let db = Database::new(DbConfig::in_memory()).await.unwrap();
        let repo = db.items();

        let item = ring(5);
        repo.insert(&item).await.unwrap();
        repo.delete(&item.id).await.unwrap();

        assert!(matches!(
            repo.delete(&item.id).await,
            Err(DbError::NotFound { .. })
        ));
        // Serial 5 can be owned again.
        repo.insert(&ring(5)).await.unwrap();
        assert_eq!(
            repo.list_for_category_year("RNG", 2025).await.unwrap().len(),
            1
        );
    }
}
