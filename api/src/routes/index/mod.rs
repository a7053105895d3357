pub mod index_route;
