use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use super::{plans::PLANS, repo, Subscription, SubscriptionPlan};
use crate::{auth::AuthUser, error::ApiError, state::AppState};

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/plans", get(list_plans))
        .route("/me/subscription", get(my_subscription))
}

pub async fn list_plans() -> Json<&'static [SubscriptionPlan]> {
    Json(&PLANS[..])
}

#[instrument(skip(state))]
pub async fn my_subscription(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Subscription>, ApiError> {
    repo::find_by_user(&state.db, user_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Subscription not found"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::build_app;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use http_body_util::BodyExt;
    use tower::ServiceExt;

    #[tokio::test]
    async fn plans_are_public() {
        let app = build_app(AppState::fake());
        let res = app
            .oneshot(Request::get("/api/v1/plans").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::OK);
        let bytes = res.into_body().collect().await.unwrap().to_bytes();
        let plans: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        let ids: Vec<&str> = plans
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["id"].as_str().unwrap())
            .collect();
        assert_eq!(ids, ["free", "basic", "premium"]);
        assert_eq!(plans[1]["price"], 99_000);
    }
}
