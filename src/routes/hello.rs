#![forbid(unsafe_code)]

use poem::Request;
use poem_openapi::{OpenApi, payload::PlainText, param::Path};

use crate::utils::demo_utils::{self, RequestDebug};

// ***************************************************************************
//                          Request/Response Definitions
// ***************************************************************************
pub struct HelloApi;

struct ReqHello
{
    name: String,
}

// Implement the debug record trait for logging.
impl RequestDebug for ReqHello {
    fn get_request_info(&self) -> String {
        format!("  Request path:\n    name: {}", self.name)
    }
}

// ***************************************************************************
//                             OpenAPI Endpoint
// ***************************************************************************
#[OpenApi]
impl HelloApi {
    /// Greet the caller by the name given in the path.
    #[oai(path = "/hello/:name", method = "get")]
    async fn hello(&self, http_req: &Request, name: Path<String>) -> PlainText<String> {
        let req = ReqHello {name: name.0};
        demo_utils::debug_request(http_req, &req);
        PlainText(req.greeting())
    }
}

// ***************************************************************************
//                          Request/Response Methods
// ***************************************************************************
impl ReqHello {
    fn greeting(&self) -> String {
        format!("Hello, {}!", self.name)
    }
}

// ***************************************************************************
//                                  Tests
// ***************************************************************************
#[cfg(test)]
mod tests {
    use super::ReqHello;

    #[test]
    fn greeting_uses_name_verbatim() {
        let req = ReqHello {name: "Ferris the Crab".to_string()};
        assert_eq!(req.greeting(), "Hello, Ferris the Crab!");
    }

    #[test]
    fn request_info_names_the_parameter() {
        use crate::utils::demo_utils::RequestDebug;
        let req = ReqHello {name: "World".to_string()};
        assert!(req.get_request_info().contains("name: World"));
    }
}
