use axum::{
    extract::State,
    routing::{delete, get, patch, post},
    Json, Router,
};
use tracing::instrument;

use crate::{
    error::ApiResult,
    state::AppState,
    users::{
        dto::{DeletedResponse, EmailQuery, UserCreate, UserRead, UserUpdate},
        extractors::{ApiJson, ApiPath, ApiQuery},
        services::{self, UpdatePolicy},
    },
};

pub fn read_routes() -> Router<AppState> {
    Router::new()
        .route("/users/:user_id", get(read_user))
        .route("/user/", get(read_user_by_email))
}

pub fn write_routes() -> Router<AppState> {
    Router::new()
        .route("/users/", post(create_user))
        .route("/users/:user_id", patch(update_user))
        .route("/delete/:user_id", delete(delete_user))
}

// Each handler holds one pooled connection for the whole request; dropping it
// hands it back to the pool on every return path.

#[instrument(skip(state, payload))]
pub async fn create_user(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<UserCreate>,
) -> ApiResult<Json<UserRead>> {
    let mut conn = state.db.acquire().await?;
    let user = services::create_user(&mut conn, &payload).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn read_user(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i64>,
) -> ApiResult<Json<UserRead>> {
    let mut conn = state.db.acquire().await?;
    let user = services::get_user(&mut conn, user_id).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn read_user_by_email(
    State(state): State<AppState>,
    ApiQuery(q): ApiQuery<EmailQuery>,
) -> ApiResult<Json<UserRead>> {
    let mut conn = state.db.acquire().await?;
    let user = services::get_user_by_email(&mut conn, &q.email).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state, payload))]
pub async fn update_user(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i64>,
    ApiJson(payload): ApiJson<UserUpdate>,
) -> ApiResult<Json<UserRead>> {
    let policy = UpdatePolicy::from_flag(state.config.strict_update_validation);
    let mut conn = state.db.acquire().await?;
    let user = services::update_user(&mut conn, user_id, payload, policy).await?;
    Ok(Json(user.into()))
}

#[instrument(skip(state))]
pub async fn delete_user(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<i64>,
) -> ApiResult<Json<DeletedResponse>> {
    let mut conn = state.db.acquire().await?;
    services::delete_user(&mut conn, user_id).await?;
    Ok(Json(DeletedResponse {
        message: "User has been deleted".into(),
    }))
}

#[cfg(test)]
mod tests {
    use axum::{
        body::{to_bytes, Body},
        http::{Request, StatusCode},
        Router,
    };
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use crate::{app::build_app, state::AppState};

    async fn app(strict: bool) -> Router {
        build_app(AppState::for_tests(strict).await)
    }

    async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
        let builder = Request::builder().method(method).uri(uri);
        let req = match body {
            Some(b) => builder
                .header("content-type", "application/json")
                .body(Body::from(b.to_string()))
                .unwrap(),
            None => builder.body(Body::empty()).unwrap(),
        };
        dispatch(app, req).await
    }

    async fn dispatch(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
        let res = app.clone().oneshot(req).await.unwrap();
        let status = res.status();
        let bytes = to_bytes(res.into_body(), usize::MAX).await.unwrap();
        let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, json)
    }

    fn ann() -> Value {
        json!({"name": "Ann", "email": "ann@x.com", "age": 30, "sex": "Female"})
    }

    #[tokio::test]
    async fn full_lifecycle() {
        let app = app(false).await;

        let (status, created) = send(&app, "POST", "/users/", Some(ann())).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(created["id"], 1);
        assert!(created["updated_at"].is_null());

        let (status, fetched) = send(&app, "GET", "/users/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched, created);

        let (status, patched) =
            send(&app, "PATCH", "/users/1", Some(json!({"name": "Anne"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(patched["name"], "Anne");
        assert_eq!(patched["email"], "ann@x.com");
        assert_eq!(patched["age"], 30);
        assert_eq!(patched["sex"], "Female");
        assert_eq!(patched["created_at"], created["created_at"]);
        assert!(patched["updated_at"].is_string());

        let (status, body) = send(&app, "DELETE", "/delete/1", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!({"message": "User has been deleted"}));

        let (status, body) = send(&app, "GET", "/users/1", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "User not found");
    }

    #[tokio::test]
    async fn create_rejections() {
        let app = app(false).await;
        send(&app, "POST", "/users/", Some(ann())).await;

        let (status, body) = send(
            &app,
            "POST",
            "/users/",
            Some(json!({"name": "Other Ann", "email": "ann@x.com", "age": 5, "sex": "Male"})),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Email already in use");

        let (status, body) = send(
            &app,
            "POST",
            "/users/",
            Some(json!({"name": "Sam", "email": "sam@x.com", "age": 40, "sex": "Other"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["detail"], "Please choose Female or Male for sex");

        let (status, body) = send(
            &app,
            "POST",
            "/users/",
            Some(json!({"name": "Sam", "email": "nodomain", "age": 40, "sex": "Male"})),
        )
        .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["detail"], "Please enter a valid email address");
    }

    #[tokio::test]
    async fn lookup_by_email_is_exact() {
        let app = app(false).await;
        send(&app, "POST", "/users/", Some(ann())).await;

        let (status, body) = send(&app, "GET", "/user/?email=ann%40x.com", None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["name"], "Ann");

        let (status, _) = send(&app, "GET", "/user/?email=ANN%40x.com", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn patch_email_conflict_and_missing_user() {
        let app = app(false).await;
        send(&app, "POST", "/users/", Some(ann())).await;
        send(
            &app,
            "POST",
            "/users/",
            Some(json!({"name": "Bob", "email": "bob@x.com", "age": 41, "sex": "Male"})),
        )
        .await;

        let (status, body) =
            send(&app, "PATCH", "/users/2", Some(json!({"email": "ann@x.com"}))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Email already registered");

        let (status, _) =
            send(&app, "PATCH", "/users/2", Some(json!({"email": "bob@x.com"}))).await;
        assert_eq!(status, StatusCode::OK);

        let (status, _) = send(&app, "PATCH", "/users/99", Some(json!({"name": "x"}))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn strict_policy_rejects_unknown_sex_on_patch() {
        let app = app(true).await;
        send(&app, "POST", "/users/", Some(ann())).await;

        let (status, body) =
            send(&app, "PATCH", "/users/1", Some(json!({"sex": "Other"}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["detail"], "Please enter Female or Male");

        let (status, body) = send(&app, "PATCH", "/users/1", Some(json!({"sex": "Male"}))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sex"], "Male");
    }

    #[tokio::test]
    async fn non_integer_age_is_rejected_by_the_body_parser() {
        let app = app(false).await;
        send(&app, "POST", "/users/", Some(ann())).await;

        let (status, _) = send(&app, "PATCH", "/users/1", Some(json!({"age": "old"}))).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }

    #[tokio::test]
    async fn deleting_unknown_user_is_not_found() {
        let app = app(false).await;
        let (status, body) = send(&app, "DELETE", "/delete/7", None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["detail"], "User not found");
    }

    #[tokio::test]
    async fn malformed_json_is_422_with_detail() {
        let app = app(false).await;
        let req = Request::builder()
            .method("POST")
            .uri("/users/")
            .header("content-type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let (status, body) = dispatch(&app, req).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn missing_content_type_is_422_with_detail() {
        let app = app(false).await;
        let req = Request::builder()
            .method("POST")
            .uri("/users/")
            .body(Body::from(ann().to_string()))
            .unwrap();

        let (status, body) = dispatch(&app, req).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn missing_field_is_422_with_detail() {
        let app = app(false).await;
        let partial = json!({"name": "Ann", "email": "ann@x.com"});
        let (status, body) = send(&app, "POST", "/users/", Some(partial)).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].is_string());
    }

    #[tokio::test]
    async fn bad_query_and_path_are_422_with_detail() {
        let app = app(false).await;

        let (status, body) = send(&app, "GET", "/user/", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].is_string());

        let (status, body) = send(&app, "GET", "/users/abc", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].is_string());

        let (status, body) = send(&app, "DELETE", "/delete/abc", None).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert!(body["detail"].is_string());
    }
}
