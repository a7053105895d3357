pub mod view_repo_route;
