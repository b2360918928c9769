//! Greeting endpoints. `/` and `/Home` are aliases of one operation.

pub const GREETING: &str = "Hello, World!";

/// Greeting at the site root
#[utoipa::path(
    get,
    path = "/",
    tag = "Home",
    responses((status = 200, description = "Greeting", body = String, content_type = "text/plain"))
)]
pub async fn index() -> &'static str {
    GREETING
}

/// Greeting at the controller-style path
#[utoipa::path(
    get,
    path = "/Home",
    tag = "Home",
    responses((status = 200, description = "Greeting", body = String, content_type = "text/plain"))
)]
pub async fn home() -> &'static str {
    GREETING
}
