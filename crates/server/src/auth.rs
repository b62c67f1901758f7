//! Bearer-session authentication. Every handler resolves the caller first;
//! role and ownership checks happen per-action afterwards.

use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
use chrono::{DateTime, Utc};
use sqlx::Row;

use tradehub_core::authz::Actor;
use tradehub_core::domain::party::{KybStatus, Role, UserId};
use tradehub_db::DbPool;

use crate::envelope::{api_error, db_error, ApiError};

#[derive(Clone, Debug)]
pub struct AuthUser {
    pub id: UserId,
    pub name: String,
    pub role: Role,
    pub kyb_status: KybStatus,
}

impl AuthUser {
    pub fn actor(&self) -> Actor {
        Actor { id: self.id.clone(), role: self.role }
    }

    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

pub async fn authenticate(pool: &DbPool, headers: &HeaderMap) -> Result<AuthUser, ApiError> {
    let token = bearer_token(headers).ok_or_else(|| {
        api_error(StatusCode::UNAUTHORIZED, "missing bearer session token")
    })?;

    let row = sqlx::query(
        "SELECT u.id, u.name, u.role, u.kyb_status, s.expires_at
         FROM session s
         JOIN app_user u ON u.id = s.user_id
         WHERE s.token = ?",
    )
    .bind(token)
    .fetch_optional(pool)
    .await
    .map_err(db_error)?;

    let row = row.ok_or_else(|| {
        api_error(StatusCode::UNAUTHORIZED, "invalid or unknown session token")
    })?;

    let expires_at_str: String = row
        .try_get("expires_at")
        .map_err(|e| db_error(sqlx::Error::ColumnDecode { index: "expires_at".to_string(), source: Box::new(e) }))?;
    let expired = DateTime::parse_from_rfc3339(&expires_at_str)
        .map(|dt| dt.with_timezone(&Utc) <= Utc::now())
        .unwrap_or(true);
    if expired {
        return Err(api_error(StatusCode::UNAUTHORIZED, "session expired"));
    }

    let id: String = row.try_get("id").unwrap_or_default();
    let name: String = row.try_get("name").unwrap_or_default();
    let role_str: String = row.try_get("role").unwrap_or_default();
    let kyb_str: String = row.try_get("kyb_status").unwrap_or_default();

    let role = Role::parse(&role_str).ok_or_else(|| {
        api_error(StatusCode::UNAUTHORIZED, format!("session user has unknown role `{role_str}`"))
    })?;
    let kyb_status = KybStatus::parse(&kyb_str).unwrap_or(KybStatus::Pending);

    Ok(AuthUser { id: UserId(id), name, role, kyb_status })
}

#[cfg(test)]
mod tests {
    use axum::http::{header::AUTHORIZATION, HeaderMap, StatusCode};
    use chrono::{Duration, Utc};

    use tradehub_core::domain::party::{KybStatus, Role, User, UserId};
    use tradehub_db::repositories::{SqlUserRepository, UserRepository};
    use tradehub_db::{connect_with_settings, migrations};

    use super::authenticate;

    async fn setup() -> sqlx::SqlitePool {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");

        let users = SqlUserRepository::new(pool.clone());
        users
            .save(User {
                id: UserId("buyer-1".to_string()),
                email: "buyer@example.com".to_string(),
                name: "Buyer".to_string(),
                role: Role::Buyer,
                kyb_status: KybStatus::Completed,
                created_at: Utc::now(),
            })
            .await
            .expect("seed user");
        users
            .create_session("tok-live", &UserId("buyer-1".to_string()), Utc::now() + Duration::hours(1))
            .await
            .expect("live session");
        users
            .create_session(
                "tok-expired",
                &UserId("buyer-1".to_string()),
                Utc::now() - Duration::hours(1),
            )
            .await
            .expect("expired session");

        pool
    }

    fn headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, format!("Bearer {token}").parse().expect("header"));
        headers
    }

    #[tokio::test]
    async fn valid_token_resolves_role_and_kyb() {
        let pool = setup().await;
        let user = authenticate(&pool, &headers("tok-live")).await.expect("authenticated");
        assert_eq!(user.id.0, "buyer-1");
        assert_eq!(user.role, Role::Buyer);
        assert!(user.kyb_status.is_completed());
        assert!(!user.is_admin());
    }

    #[tokio::test]
    async fn missing_header_is_unauthorized() {
        let pool = setup().await;
        let (status, _) =
            authenticate(&pool, &HeaderMap::new()).await.expect_err("must reject");
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn unknown_token_is_unauthorized() {
        let pool = setup().await;
        let (status, body) =
            authenticate(&pool, &headers("tok-nope")).await.expect_err("must reject");
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.0.error.contains("invalid"));
    }

    #[tokio::test]
    async fn expired_token_is_unauthorized_with_distinct_message() {
        let pool = setup().await;
        let (status, body) =
            authenticate(&pool, &headers("tok-expired")).await.expect_err("must reject");
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(body.0.error.contains("expired"));
    }
}
