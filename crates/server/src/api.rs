use axum::routing::get;
use axum::Router;

use tradehub_db::DbPool;

use crate::settlement::SettlementClient;
use crate::{quotations, transactions};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: DbPool,
    pub settlement: SettlementClient,
    pub demo_fallback: bool,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route(
            "/api/quotations/{id}",
            get(quotations::get_quotation).patch(quotations::patch_quotation),
        )
        .route(
            "/api/transactions/{id}",
            get(transactions::get_transaction).patch(transactions::patch_transaction),
        )
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use axum::body::Body;
    use axum::http::{header::AUTHORIZATION, Request, StatusCode};
    use tower::util::ServiceExt;

    use tradehub_db::{connect_with_settings, migrations, DemoDataset};

    use super::{router, AppState};
    use crate::settlement::SettlementClient;

    async fn app() -> axum::Router {
        let pool = connect_with_settings("sqlite::memory:", 1, 30).await.expect("connect");
        migrations::run_pending(&pool).await.expect("migrations");
        DemoDataset::load(&pool).await.expect("seed");

        router(AppState {
            db_pool: pool,
            settlement: SettlementClient::disabled(),
            demo_fallback: false,
        })
    }

    #[tokio::test]
    async fn unauthenticated_requests_are_rejected() {
        let response = app()
            .await
            .oneshot(
                Request::builder()
                    .uri("/api/quotations/QUO-DEMO-0001")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn authenticated_get_returns_quotation() {
        let response = app()
            .await
            .oneshot(
                Request::builder()
                    .uri("/api/quotations/QUO-DEMO-0001")
                    .header(AUTHORIZATION, "Bearer demo-buyer-token")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn authenticated_get_returns_transaction() {
        let response = app()
            .await
            .oneshot(
                Request::builder()
                    .uri("/api/transactions/TXN-DEMO-0001")
                    .header(AUTHORIZATION, "Bearer demo-admin-token")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
    }
}
