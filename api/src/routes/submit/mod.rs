pub mod submit_request;
pub mod submit_route;
