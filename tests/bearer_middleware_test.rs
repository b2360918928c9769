use async_trait::async_trait;
use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use axum::routing::get;
use axum::{Extension, Router};
use chrono::Duration;
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tower::ServiceExt;
use webapi_server::auth::jwt::issue_token;
use webapi_server::db::User;
use webapi_server::{
    handlers, Access, AppSettings, AppState, DbError, Principal, RouteTable, TokenAuthenticator,
    UserDirectory,
};

const SECRET: &[u8] = b"test-secret-key-that-is-long-enough";

/// Directory that counts lookups so tests can see whether the gate called it
#[derive(Default)]
struct CountingDirectory {
    users: Mutex<HashSet<i64>>,
    lookups: AtomicUsize,
}

#[async_trait]
impl UserDirectory for CountingDirectory {
    async fn get_by_id(&self, id: i64) -> Result<Option<User>, DbError> {
        self.lookups.fetch_add(1, Ordering::SeqCst);
        let exists = self.users.lock().unwrap().contains(&id);
        Ok(exists.then(|| User {
            id,
            first_name: "Test".to_string(),
            last_name: "User".to_string(),
            username: format!("user{}", id),
            password_hash: String::new(),
        }))
    }
}

async fn whoami(Extension(principal): Extension<Principal>) -> String {
    principal.user_id.to_string()
}

fn create_test_app(directory: Arc<CountingDirectory>) -> Router {
    let authenticator = Arc::new(TokenAuthenticator::new(
        &AppSettings::with_secret(SECRET),
        directory,
    ));

    RouteTable::new(AppState { authenticator })
        .route("/", get(handlers::index), Access::Public)
        .route("/me", get(whoami), Access::Bearer)
        .build()
}

fn directory_with(ids: &[i64]) -> Arc<CountingDirectory> {
    let directory = CountingDirectory::default();
    directory.users.lock().unwrap().extend(ids.iter().copied());
    Arc::new(directory)
}

async fn call(app: Router, authorization: Option<&str>) -> (StatusCode, Option<String>, String) {
    let mut request = Request::builder().uri("/me");
    if let Some(value) = authorization {
        request = request.header(header::AUTHORIZATION, value);
    }

    let response = app
        .oneshot(request.body(Body::empty()).unwrap())
        .await
        .unwrap();

    let status = response.status();
    let challenge = response
        .headers()
        .get(header::WWW_AUTHENTICATE)
        .map(|v| v.to_str().unwrap().to_string());
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, challenge, String::from_utf8(body.to_vec()).unwrap())
}

#[tokio::test]
async fn test_public_route_needs_no_token() {
    let directory = directory_with(&[]);
    let app = create_test_app(directory.clone());

    let response = app
        .oneshot(Request::builder().uri("/").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(directory.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_missing_header_rejected_without_directory_lookup() {
    let directory = directory_with(&[1]);
    let app = create_test_app(directory.clone());

    let (status, challenge, _) = call(app, None).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(challenge.as_deref(), Some("Bearer"));
    assert_eq!(directory.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_non_bearer_scheme_rejected() {
    let directory = directory_with(&[1]);
    let app = create_test_app(directory.clone());

    let (status, _, _) = call(app, Some("Basic dXNlcjpwYXNz")).await;

    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(directory.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_valid_token_reaches_handler_with_principal() {
    let directory = directory_with(&[42]);
    let app = create_test_app(directory.clone());
    let token = issue_token(&AppSettings::with_secret(SECRET), 42, Duration::hours(1)).unwrap();

    let (status, _, body) = call(app, Some(&format!("Bearer {}", token))).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "42");
    assert_eq!(directory.lookups.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_rejections_are_indistinguishable() {
    let directory = directory_with(&[1]);
    let app = create_test_app(directory.clone());

    let forged = AppSettings::with_secret(b"some-other-signing-key-entirely".to_vec());
    let bad_signature = issue_token(&forged, 1, Duration::hours(1)).unwrap();
    let unknown_user = issue_token(&AppSettings::with_secret(SECRET), 999, Duration::hours(1)).unwrap();
    let expired = issue_token(&AppSettings::with_secret(SECRET), 1, Duration::hours(-2)).unwrap();

    let a = call(app.clone(), Some(&format!("Bearer {}", bad_signature))).await;
    let b = call(app.clone(), Some(&format!("Bearer {}", unknown_user))).await;
    let c = call(app.clone(), Some(&format!("Bearer {}", expired))).await;
    let d = call(app, Some("Bearer not-a-jwt")).await;

    assert_eq!(a.0, StatusCode::UNAUTHORIZED);
    assert_eq!(a, b);
    assert_eq!(a, c);
    assert_eq!(a, d);
}

#[tokio::test]
async fn test_deleted_user_rejected_on_next_request() {
    let directory = directory_with(&[7]);
    let app = create_test_app(directory.clone());
    let token = issue_token(&AppSettings::with_secret(SECRET), 7, Duration::hours(1)).unwrap();
    let authorization = format!("Bearer {}", token);

    let (status, _, _) = call(app.clone(), Some(&authorization)).await;
    assert_eq!(status, StatusCode::OK);

    directory.users.lock().unwrap().remove(&7);

    let (status, _, _) = call(app, Some(&authorization)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_preflight_to_protected_route_skips_auth_gate() {
    let directory = directory_with(&[]);
    let app = create_test_app(directory.clone());

    let response = app
        .oneshot(
            Request::builder()
                .method(Method::OPTIONS)
                .uri("/me")
                .header(header::ORIGIN, "https://client.example")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "authorization")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(directory.lookups.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn test_unauthorized_response_carries_cors_headers() {
    let directory = directory_with(&[]);
    let app = create_test_app(directory);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/me")
                .header(header::ORIGIN, "https://client.example")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .unwrap(),
        "*"
    );
}
