pub mod fetch_repo;
pub mod health_route;
pub mod index;
pub mod submit;
pub mod view_repo;
