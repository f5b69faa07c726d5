mod http;
mod routes;

pub use http::{add_http_route, serve_http};
pub use routes::router;
