#![forbid(unsafe_code)]

use poem_openapi::{OpenApi, payload::PlainText};

const WELCOME_MSG: &str = "Welcome to CI/CD Demo Application!";

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
pub struct HomeApi;

#[OpenApi]
impl HomeApi {
    /// Landing page greeting.
    #[oai(path = "/", method = "get")]
    async fn home(&self) -> PlainText<String> {
        PlainText(WELCOME_MSG.to_string())
    }
}
