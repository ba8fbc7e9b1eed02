#![forbid(unsafe_code)]

use poem_openapi::{OpenApi, payload::PlainText};
use log::trace;

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
pub struct HealthApi;

#[OpenApi]
impl HealthApi {
    /// Liveness probe for load balancers and deployment pipelines.
    #[oai(path = "/health", method = "get")]
    async fn health(&self) -> PlainText<String> {
        trace!("health check");
        PlainText("OK".to_string())
    }
}
