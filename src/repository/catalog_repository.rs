use async_trait::async_trait;
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{Accommodation, Destination, TourPackage},
    error::Result,
    repository::{parse_money, parse_opt_money, parse_opt_uuid, parse_uuid, CatalogRepository},
};

#[derive(FromRow)]
struct AccommodationRow {
    id: String,
    host_id: String,
    destination_id: Option<String>,
    title: String,
    price: String,
    is_approved: i32,
}

#[derive(FromRow)]
struct TourPackageRow {
    id: String,
    guide_id: String,
    main_destination_id: Option<String>,
    name: String,
    price_per_day: String,
    solo_price: Option<String>,
    additional_fee_per_head: String,
    is_active: i32,
}

const PACKAGE_COLUMNS: &str = r#"
    id, guide_id, main_destination_id, name, price_per_day,
    solo_price, additional_fee_per_head, is_active
"#;

pub struct SqliteCatalogRepository {
    pool: SqlitePool,
}

impl SqliteCatalogRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn row_to_package(row: TourPackageRow) -> Result<TourPackage> {
        Ok(TourPackage {
            id: parse_uuid(&row.id)?,
            guide_id: parse_uuid(&row.guide_id)?,
            main_destination_id: parse_opt_uuid(row.main_destination_id)?,
            name: row.name,
            price_per_day: parse_money(&row.price_per_day)?,
            solo_price: parse_opt_money(row.solo_price)?,
            additional_fee_per_head: parse_money(&row.additional_fee_per_head)?,
            is_active: row.is_active != 0,
        })
    }
}

#[async_trait]
impl CatalogRepository for SqliteCatalogRepository {
    async fn find_destination(&self, id: Uuid) -> Result<Option<Destination>> {
        let row: Option<(String, String)> =
            sqlx::query_as("SELECT id, name FROM destinations WHERE id = ?")
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(id, name)| {
            Ok(Destination {
                id: parse_uuid(&id)?,
                name,
            })
        })
        .transpose()
    }

    async fn find_accommodation(&self, id: Uuid) -> Result<Option<Accommodation>> {
        let row = sqlx::query_as::<_, AccommodationRow>(
            "SELECT id, host_id, destination_id, title, price, is_approved FROM accommodations WHERE id = ?",
        )
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| {
            Ok(Accommodation {
                id: parse_uuid(&r.id)?,
                host_id: parse_uuid(&r.host_id)?,
                destination_id: parse_opt_uuid(r.destination_id)?,
                title: r.title,
                price: parse_money(&r.price)?,
                is_approved: r.is_approved != 0,
            })
        })
        .transpose()
    }

    async fn find_tour_package(&self, id: Uuid) -> Result<Option<TourPackage>> {
        let row = sqlx::query_as::<_, TourPackageRow>(&format!(
            "SELECT {} FROM tour_packages WHERE id = ?",
            PACKAGE_COLUMNS
        ))
        .bind(id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_package).transpose()
    }

    async fn find_package_for(&self, guide_id: Uuid, destination_id: Uuid) -> Result<Option<TourPackage>> {
        let row = sqlx::query_as::<_, TourPackageRow>(&format!(
            r#"
            SELECT {} FROM tour_packages
            WHERE guide_id = ? AND main_destination_id = ? AND is_active = 1
            ORDER BY created_at DESC
            LIMIT 1
            "#,
            PACKAGE_COLUMNS
        ))
        .bind(guide_id.to_string())
        .bind(destination_id.to_string())
        .fetch_optional(&self.pool)
        .await?;

        row.map(Self::row_to_package).transpose()
    }
}
