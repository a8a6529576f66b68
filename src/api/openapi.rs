//! OpenAPI specification definition.
//!
//! Aggregates all route handlers and schemas for OpenAPI documentation generation.

use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    paths(
        // Flow results packages
        crate::routes::packages::list_packages,
        crate::routes::packages::create_package,
        crate::routes::packages::get_package,
        // Flow results responses
        crate::routes::responses::list_responses,
        crate::routes::responses::create_responses,
        // OpenAPI
        crate::routes::openapi::serve_openapi_json,
    ),
    modifiers(&VersionAddon),
    tags(
        (name = "Flow Results", description = "Flow packages and their responses"),
        (name = "OpenAPI", description = "OpenAPI specification"),
    ),
    info(
        title = "Flow Results API",
        description = "REST API for publishing flow results packages and collecting typed responses",
        version = "1.0.0",
        license(
            name = "MIT",
            url = "https://opensource.org/licenses/MIT"
        )
    ),
    servers(
        (url = "http://localhost:8081/api/v1", description = "Local development server")
    )
)]
pub struct ApiDoc;

struct VersionAddon;

impl Modify for VersionAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        // Keep the documented version in step with Cargo.toml
        openapi.info.version = env!("CARGO_PKG_VERSION").to_string();
    }
}
