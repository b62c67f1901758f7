use sqlx::Row;

use tradehub_core::domain::notification::{Notification, NotificationKind};
use tradehub_core::domain::party::UserId;

use super::{decode_datetime, decode_opt_datetime, NotificationRepository, RepositoryError};
use crate::DbPool;

pub struct SqlNotificationRepository {
    pool: DbPool,
}

impl SqlNotificationRepository {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn unread_count(&self, user_id: &UserId) -> Result<i64, RepositoryError> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM notification WHERE user_id = ? AND read_at IS NULL",
        )
        .bind(&user_id.0)
        .fetch_one(&self.pool)
        .await?;
        Ok(count)
    }
}

fn row_to_notification(row: &sqlx::sqlite::SqliteRow) -> Result<Notification, RepositoryError> {
    let id: String = row.try_get("id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let user_id: String =
        row.try_get("user_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let kind_str: String =
        row.try_get("kind").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let title: String =
        row.try_get("title").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let body: String = row.try_get("body").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let reference_id: Option<String> =
        row.try_get("reference_id").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let read_at: Option<String> =
        row.try_get("read_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;
    let created_at_str: String =
        row.try_get("created_at").map_err(|e| RepositoryError::Decode(e.to_string()))?;

    let kind = NotificationKind::parse(&kind_str)
        .ok_or_else(|| RepositoryError::Decode(format!("unknown notification kind `{kind_str}`")))?;

    Ok(Notification {
        id,
        user_id: UserId(user_id),
        kind,
        title,
        body,
        reference_id,
        read_at: decode_opt_datetime(read_at)?,
        created_at: decode_datetime(&created_at_str)?,
    })
}

#[async_trait::async_trait]
impl NotificationRepository for SqlNotificationRepository {
    async fn create(&self, notification: Notification) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO notification (id, user_id, kind, title, body, reference_id,
                                       read_at, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&notification.id)
        .bind(&notification.user_id.0)
        .bind(notification.kind.as_str())
        .bind(&notification.title)
        .bind(&notification.body)
        .bind(&notification.reference_id)
        .bind(notification.read_at.map(|dt| dt.to_rfc3339()))
        .bind(notification.created_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn list_for_user(
        &self,
        user_id: &UserId,
        limit: u32,
    ) -> Result<Vec<Notification>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT id, user_id, kind, title, body, reference_id, read_at, created_at
             FROM notification
             WHERE user_id = ?
             ORDER BY read_at IS NOT NULL, created_at DESC
             LIMIT ?",
        )
        .bind(&user_id.0)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.iter().map(row_to_notification).collect()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use tradehub_core::domain::notification::{Notification, NotificationKind};
    use tradehub_core::domain::party::{KybStatus, Role, User, UserId};

    use super::SqlNotificationRepository;
    use crate::repositories::{NotificationRepository, SqlUserRepository, UserRepository};
    use crate::{connect_with_settings, migrations};

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        SqlUserRepository::new(pool.clone())
            .save(User {
                id: UserId("supplier-1".to_string()),
                email: "supplier@example.com".to_string(),
                name: "Supplier".to_string(),
                role: Role::Supplier,
                kyb_status: KybStatus::Completed,
                created_at: Utc::now(),
            })
            .await
            .expect("seed user");

        pool
    }

    #[tokio::test]
    async fn create_and_list_unread_first() {
        let pool = setup().await;
        let repo = SqlNotificationRepository::new(pool);
        let user = UserId("supplier-1".to_string());

        let mut seen = Notification::new(
            user.clone(),
            NotificationKind::QuotationRejected,
            "Quotation rejected",
            "Buyer rejected QUO-9",
            Some("QUO-9".to_string()),
        );
        seen.read_at = Some(Utc::now());
        repo.create(seen).await.expect("create read");

        repo.create(Notification::new(
            user.clone(),
            NotificationKind::QuotationAccepted,
            "Quotation accepted",
            "Buyer accepted QUO-1",
            Some("QUO-1".to_string()),
        ))
        .await
        .expect("create unread");

        let listed = repo.list_for_user(&user, 10).await.expect("list");
        assert_eq!(listed.len(), 2);
        assert!(listed[0].read_at.is_none(), "unread notifications sort first");
        assert_eq!(listed[0].kind, NotificationKind::QuotationAccepted);

        assert_eq!(repo.unread_count(&user).await.expect("count"), 1);
    }
}
