pub mod fetch_repo_route;
