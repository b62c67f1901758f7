//! Best-effort notification fan-out. A failed insert is logged and dropped;
//! it never rolls back or delays the state transition that produced it.

use tracing::error;

use tradehub_core::domain::notification::Notification;
use tradehub_core::domain::party::UserId;
use tradehub_db::repositories::{NotificationRepository, SqlNotificationRepository, SqlUserRepository};
use tradehub_db::DbPool;

pub(crate) async fn send(pool: &DbPool, notification: Notification) {
    let repo = SqlNotificationRepository::new(pool.clone());
    let user_id = notification.user_id.0.clone();
    let kind = notification.kind.as_str();
    if let Err(err) = repo.create(notification).await {
        error!(
            event_name = "notification.write_failed",
            user_id = %user_id,
            kind = %kind,
            error = %err,
            "failed to write notification"
        );
    }
}

/// All admin user ids, or an empty list when the lookup fails (logged).
pub(crate) async fn admin_ids(pool: &DbPool) -> Vec<UserId> {
    match SqlUserRepository::new(pool.clone()).list_admins().await {
        Ok(admins) => admins.into_iter().map(|admin| admin.id).collect(),
        Err(err) => {
            error!(
                event_name = "notification.admin_lookup_failed",
                error = %err,
                "failed to list admins for notification fan-out"
            );
            Vec::new()
        }
    }
}
