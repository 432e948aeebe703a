//! Report model and report store queries.

use serde::{Deserialize, Deserializer, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Report {
    pub id: String,
    /// Id of the user who created the report; the only user allowed to edit it
    pub owner: String,
    pub title: String,
    pub phone: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    /// JSON array of photo URLs
    pub photos: String,
    pub created_at: String,
    pub updated_at: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReportResponse {
    #[serde(rename = "_id")]
    pub id: String,
    pub owner: String,
    pub title: String,
    pub phone: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    pub photos: Vec<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl From<Report> for ReportResponse {
    fn from(report: Report) -> Self {
        let photos = report.photo_urls();
        Self {
            id: report.id,
            owner: report.owner,
            title: report.title,
            phone: report.phone,
            date: report.date,
            time: report.time,
            address: report.address,
            description: report.description,
            photos,
            created_at: report.created_at,
            updated_at: report.updated_at,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateReportRequest {
    #[serde(default)]
    pub title: String,
    pub phone: Option<String>,
    pub date: Option<String>,
    pub time: Option<String>,
    pub address: Option<String>,
    pub description: Option<String>,
    #[serde(default, rename = "addedPhotos")]
    pub added_photos: Vec<String>,
}

/// Fields of a report update.
///
/// The outer `Option` is `None` when the field is absent and leaves the stored
/// value untouched. `Some(None)` is an explicit `null` and clears it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ReportChanges {
    #[serde(default, deserialize_with = "submitted")]
    pub title: Option<Option<String>>,
    #[serde(default, deserialize_with = "submitted")]
    pub phone: Option<Option<String>>,
    #[serde(default, deserialize_with = "submitted")]
    pub date: Option<Option<String>>,
    #[serde(default, deserialize_with = "submitted")]
    pub time: Option<Option<String>>,
    #[serde(default, deserialize_with = "submitted")]
    pub address: Option<Option<String>>,
    #[serde(default, deserialize_with = "submitted")]
    pub description: Option<Option<String>>,
    /// Replaces the photo list; `null` empties it
    #[serde(default, rename = "addedPhotos", deserialize_with = "submitted")]
    pub added_photos: Option<Option<Vec<String>>>,
}

/// Marks a field as submitted, keeping an explicit `null` as `Some(None)`
fn submitted<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

#[derive(Debug, Clone, Deserialize)]
pub struct UpdateReportRequest {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub changes: ReportChanges,
}

impl Report {
    /// Parse the stored photo list
    pub fn photo_urls(&self) -> Vec<String> {
        serde_json::from_str(&self.photos).unwrap_or_default()
    }

    pub async fn create(
        pool: &SqlitePool,
        owner: &str,
        req: &CreateReportRequest,
    ) -> Result<Report, sqlx::Error> {
        let id = uuid::Uuid::new_v4().to_string();
        let photos = encode_photos(&req.added_photos);

        sqlx::query(
            r#"
            INSERT INTO reports (id, owner, title, phone, date, time, address, description, photos)
            VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(owner)
        .bind(&req.title)
        .bind(&req.phone)
        .bind(&req.date)
        .bind(&req.time)
        .bind(&req.address)
        .bind(&req.description)
        .bind(&photos)
        .execute(pool)
        .await?;

        sqlx::query_as("SELECT * FROM reports WHERE id = ?")
            .bind(&id)
            .fetch_one(pool)
            .await
    }

    pub async fn list(pool: &SqlitePool) -> Result<Vec<Report>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM reports ORDER BY created_at ASC, rowid ASC")
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: &str) -> Result<Option<Report>, sqlx::Error> {
        sqlx::query_as("SELECT * FROM reports WHERE id = ?")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Apply the submitted fields and return the stored report.
    ///
    /// Ownership is checked by the caller.
    pub async fn update(
        pool: &SqlitePool,
        id: &str,
        changes: &ReportChanges,
    ) -> Result<Report, sqlx::Error> {
        let mut query =
            QueryBuilder::<Sqlite>::new("UPDATE reports SET updated_at = datetime('now')");

        let text_columns = [
            ("title", &changes.title),
            ("phone", &changes.phone),
            ("date", &changes.date),
            ("time", &changes.time),
            ("address", &changes.address),
            ("description", &changes.description),
        ];
        for (column, value) in text_columns {
            if let Some(value) = value {
                query.push(", ").push(column).push(" = ").push_bind(value);
            }
        }
        if let Some(photos) = &changes.added_photos {
            let encoded = encode_photos(photos.as_deref().unwrap_or_default());
            query.push(", photos = ").push_bind(encoded);
        }

        query.push(" WHERE id = ").push_bind(id);
        query.build().execute(pool).await?;

        sqlx::query_as("SELECT * FROM reports WHERE id = ?")
            .bind(id)
            .fetch_one(pool)
            .await
    }
}

fn encode_photos(photos: &[String]) -> String {
    serde_json::to_string(photos).unwrap_or_else(|_| "[]".to_string())
}
