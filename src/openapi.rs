use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;

/// Where the OpenAPI document is served
pub const OPENAPI_PATH: &str = "/swagger/v1/swagger.json";

/// Where the interactive documentation is served
pub const SWAGGER_UI_PATH: &str = "/swagger";

#[derive(OpenApi)]
#[openapi(
    info(title = "WebApi", version = "v1"),
    paths(handlers::index, handlers::home),
    modifiers(&BearerSecurity),
    tags((name = "Home", description = "Greeting"))
)]
pub struct ApiDoc;

/// Declares the JWT bearer scheme accepted by protected routes
struct BearerSecurity;

impl Modify for BearerSecurity {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "Bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

/// Swagger UI plus the JSON document it renders
pub fn swagger_ui() -> SwaggerUi {
    SwaggerUi::new(SWAGGER_UI_PATH).url(OPENAPI_PATH, ApiDoc::openapi())
}
