#![forbid(unsafe_code)]

use poem::Route;
use poem_openapi::OpenApiService;

use crate::routes::health::HealthApi;
use crate::routes::hello::HelloApi;
use crate::routes::home::HomeApi;
use crate::routes::version::VersionApi;

pub mod health;
pub mod hello;
pub mod home;
pub mod version;

// ---------------------------------------------------------------------------
// make_app:
// ---------------------------------------------------------------------------
/** Assemble every endpoint into the application's route table.  The base url
 * only appears in the generated OpenAPI document.
 */
pub fn make_app(title: &str, base_url: &str) -> Route {
    let endpoints = (HomeApi, HelloApi, HealthApi, VersionApi);
    let api_service =
        OpenApiService::new(endpoints, title, env!("CARGO_PKG_VERSION")).server(base_url);

    // Allow the generated openapi specs to be retrieved from the server.
    let spec = api_service.spec_endpoint();
    let spec_yaml = api_service.spec_endpoint_yaml();
    let ui = api_service.swagger_ui();

    Route::new()
        .nest("/docs", ui)
        .at("/spec", spec)
        .at("/spec_yaml", spec_yaml)
        .nest("/", api_service)
}
