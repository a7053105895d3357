//! HTTP surface of the self-deploy service.

mod core;
mod error_handler;
mod middleware_layer;
mod routes;

use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use tokio::signal;
use tower_http::{services::ServeDir, trace::TraceLayer};
use tracing::{error, info};

pub use crate::core::app_state::{AppConfig, AppState, ConfigError};
pub use crate::error_handler::AppError;

use crate::middleware_layer::raw_file_guard::raw_file_guard;

use crate::routes::{
    fetch_repo::fetch_repo_route::fetch_repo_route,
    health_route::health_route,
    index::index_route::index_route,
    submit::submit_route::{api_submit_route, submit_route},
    view_repo::view_repo_route::view_repo_route,
};

/// Builds the router over shared state; raw files are served from the clone
/// behind [`raw_file_guard`].
pub fn build_router(state: Arc<AppState>) -> Router {
    let raw_files: Router = Router::new()
        .fallback_service(ServeDir::new(&state.config.clone_dir))
        .layer(middleware::from_fn_with_state(state.clone(), raw_file_guard));

    Router::new()
        .route("/", get(index_route))
        .route("/submit", post(submit_route))
        .route("/api/submit", post(api_submit_route))
        .route("/fetch_repo", get(fetch_repo_route))
        .route("/view_repo", get(view_repo_route))
        .route("/health", get(health_route))
        .nest_service("/cloned_repo", raw_files)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Reads configuration, binds `API_HOST:PORT` and serves until Ctrl+C.
pub async fn start() -> Result<(), AppError> {
    let config = AppConfig::from_env()?;
    let addr = config.listen_addr();
    info!(
        mode = ?config.publish_mode,
        grammar = ?config.grammar,
        clone_dir = %config.clone_dir.display(),
        "starting self-deploy"
    );

    let app = build_router(AppState::from_config(config)?);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(AppError::Bind)?;
    info!(%addr, "listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(AppError::Server)?;

    info!("server stopped");
    Ok(())
}

/// Resolves on Ctrl+C; never resolves if the handler cannot be installed.
async fn shutdown_signal() {
    match signal::ctrl_c().await {
        Ok(()) => info!("shutdown signal received"),
        Err(e) => {
            error!(error = %e, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{fs, path::Path};

    use ai_llm_service::{CompletionClient, CompletionError};
    use async_trait::async_trait;
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use git_change_engine::{LocalCommitPublisher, ReplyGrammar, SubmissionPipeline};
    use project_code_store::{CommitAuthor, ConcatOptions, commit_all};
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct FixedReply(Result<String, CompletionError>);

    #[async_trait]
    impl CompletionClient for FixedReply {
        async fn complete(&self, _prompt: &str) -> Result<String, CompletionError> {
            self.0.clone()
        }
    }

    fn state_with(
        clone_dir: &Path,
        repo_url: Option<&str>,
        reply: Result<String, CompletionError>,
    ) -> Arc<AppState> {
        let dir = clone_dir.to_string_lossy().into_owned();
        let url = repo_url.map(str::to_string);
        let config = AppConfig::from_lookup(move |k: &str| match k {
            "CLONE_DIR" => Some(dir.clone()),
            "PUBLISH_MODE" => Some("local".into()),
            "REPO_URL" => url.clone(),
            _ => None,
        })
        .unwrap();

        let completion = Arc::new(FixedReply(reply));
        let publisher = Arc::new(LocalCommitPublisher::new(
            clone_dir,
            config.commit_message.clone(),
            CommitAuthor::default(),
        ));
        let pipeline = SubmissionPipeline::new(
            completion,
            publisher,
            clone_dir,
            ConcatOptions::default(),
            ReplyGrammar::Auto,
        );
        AppState::new(config, pipeline)
    }

    fn git_repo_with(files: &[(&str, &str)]) -> TempDir {
        let tmp = TempDir::new().unwrap();
        git2::Repository::init(tmp.path()).unwrap();
        for (path, content) in files {
            let abs = tmp.path().join(path);
            fs::create_dir_all(abs.parent().unwrap()).unwrap();
            fs::write(abs, content).unwrap();
        }
        commit_all(tmp.path(), "init", &CommitAuthor::default()).unwrap();
        tmp
    }

    async fn body_text(resp: axum::response::Response) -> String {
        let bytes = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn get(app: Router, uri: &str) -> axum::response::Response {
        app.oneshot(Request::get(uri).body(Body::empty()).unwrap())
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn index_serves_the_form() {
        let tmp = TempDir::new().unwrap();
        let app = build_router(state_with(tmp.path(), None, Ok(String::new())));
        let resp = get(app, "/").await;
        assert_eq!(resp.status(), StatusCode::OK);
        let html = body_text(resp).await;
        assert!(html.contains("<form action=\"/submit\" method=\"post\">"));
        assert!(html.contains("name=\"prompt\""));
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let tmp = TempDir::new().unwrap();
        let app = build_router(state_with(tmp.path(), None, Ok(String::new())));
        let resp = get(app, "/health").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, r#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn form_submission_writes_and_redirects_home() {
        let repo = git_repo_with(&[("README.md", "# demo\n")]);
        let app = build_router(state_with(
            repo.path(),
            None,
            Ok("```a.txt\nhello\n```".into()),
        ));

        let resp = app
            .oneshot(
                Request::post("/submit")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("prompt=add+a+file"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[header::LOCATION], "/");
        assert_eq!(fs::read_to_string(repo.path().join("a.txt")).unwrap(), "hello");
    }

    #[tokio::test]
    async fn form_submission_redirects_even_when_completion_fails() {
        let repo = git_repo_with(&[("README.md", "# demo\n")]);
        let app = build_router(state_with(
            repo.path(),
            None,
            Err(CompletionError::Transport("down".into())),
        ));

        let resp = app
            .oneshot(
                Request::post("/submit")
                    .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
                    .body(Body::from("prompt=anything"))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            project_code_store::list_files(repo.path(), ConcatOptions::default()).unwrap(),
            vec!["README.md"]
        );
    }

    #[tokio::test]
    async fn json_submission_returns_report() {
        let repo = git_repo_with(&[("README.md", "# demo\n")]);
        let app = build_router(state_with(
            repo.path(),
            None,
            Ok("```a.txt\nA\n```\n```b.txt\nB\n```".into()),
        ));

        let resp = app
            .oneshot(
                Request::post("/api/submit")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"prompt":"two files"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::OK);
        let v: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(v["success"], true);
        assert_eq!(v["mode"], "local");
        assert_eq!(v["data"]["outcome"], "applied");
        assert_eq!(v["data"]["files"][0]["path"], "a.txt");
        assert_eq!(v["data"]["files"][1]["status"], "written");
        assert!(v["data"]["commit"].is_string());
    }

    #[tokio::test]
    async fn json_submission_rejects_blank_prompt() {
        let repo = git_repo_with(&[]);
        let app = build_router(state_with(repo.path(), None, Ok(String::new())));

        let resp = app
            .oneshot(
                Request::post("/api/submit")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"prompt":"   "}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
        let v: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(v["success"], false);
        assert_eq!(v["error"]["code"], "INVALID_PROMPT");
        assert_eq!(v["error"]["details"][0]["path"], "prompt");
        assert!(v.get("mode").is_none());
    }

    #[tokio::test]
    async fn json_submission_without_clone_is_conflict() {
        let tmp = TempDir::new().unwrap();
        let app = build_router(state_with(&tmp.path().join("absent"), None, Ok(String::new())));

        let resp = app
            .oneshot(
                Request::post("/api/submit")
                    .header(header::CONTENT_TYPE, "application/json")
                    .body(Body::from(r#"{"prompt":"go"}"#))
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::CONFLICT);
        let v: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(v["error"], "REPO_NOT_CLONED");
    }

    #[tokio::test]
    async fn view_repo_before_clone_is_plain_text() {
        let tmp = TempDir::new().unwrap();
        let app = build_router(state_with(&tmp.path().join("absent"), None, Ok(String::new())));
        let resp = get(app, "/view_repo").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "Repository not cloned yet.");
    }

    #[tokio::test]
    async fn view_repo_lists_and_optionally_shows_content() {
        let repo = git_repo_with(&[("src/lib.rs", "pub fn x() {}\n"), ("a.txt", "<a>")]);
        let state = state_with(repo.path(), None, Ok(String::new()));

        let html = body_text(get(build_router(state.clone()), "/view_repo").await).await;
        assert!(html.contains("<a href=\"/cloned_repo/a.txt\">a.txt</a>"));
        assert!(html.contains("<a href=\"/cloned_repo/src/lib.rs\">src/lib.rs</a>"));
        assert!(!html.contains("<pre>"));

        let html = body_text(get(build_router(state), "/view_repo?show_content=true").await).await;
        assert!(html.contains("```a.txt\n&lt;a&gt;\n```"));
    }

    #[tokio::test]
    async fn raw_files_are_served_from_the_clone() {
        let repo = git_repo_with(&[("src/lib.rs", "pub fn x() {}\n")]);
        let state = state_with(repo.path(), None, Ok(String::new()));

        let resp = get(build_router(state.clone()), "/cloned_repo/src/lib.rs").await;
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(body_text(resp).await, "pub fn x() {}\n");

        let resp = get(build_router(state), "/cloned_repo/missing.rs").await;
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn git_metadata_and_dot_files_are_not_served() {
        let repo = git_repo_with(&[("src/lib.rs", "pub fn x() {}\n"), (".env", "TOKEN=1\n")]);
        let state = state_with(repo.path(), None, Ok(String::new()));

        for uri in [
            "/cloned_repo/.git/HEAD",
            "/cloned_repo/.git/config",
            "/cloned_repo/%2Egit/HEAD",
            "/cloned_repo/src/../.git/HEAD",
            "/cloned_repo/.env",
        ] {
            let resp = get(build_router(state.clone()), uri).await;
            assert_eq!(resp.status(), StatusCode::NOT_FOUND, "{uri}");
        }

        let resp = get(build_router(state), "/cloned_repo/src/lib.rs").await;
        assert_eq!(resp.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn view_repo_waits_for_a_running_refetch() {
        let repo = git_repo_with(&[("a.txt", "a\n")]);
        let state = state_with(repo.path(), None, Ok(String::new()));

        let writer = state.workspace.write().await;
        let app = build_router(state.clone());
        let listing = tokio::spawn(async move { get(app, "/view_repo").await });
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!listing.is_finished());

        drop(writer);
        let resp = listing.await.unwrap();
        assert_eq!(resp.status(), StatusCode::OK);
        assert!(body_text(resp).await.contains("a.txt"));
    }

    #[tokio::test]
    async fn fetch_repo_reclones_and_redirects() {
        let upstream = git_repo_with(&[("README.md", "# upstream\n")]);
        let work = TempDir::new().unwrap();
        let clone_dir = work.path().join("cloned_repo");
        let url = upstream.path().to_string_lossy().into_owned();
        let app = build_router(state_with(&clone_dir, Some(&url), Ok(String::new())));

        let resp = get(app, "/fetch_repo").await;

        assert_eq!(resp.status(), StatusCode::SEE_OTHER);
        assert_eq!(resp.headers()[header::LOCATION], "/view_repo");
        assert_eq!(
            fs::read_to_string(clone_dir.join("README.md")).unwrap(),
            "# upstream\n"
        );
    }

    #[tokio::test]
    async fn fetch_repo_without_url_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let app = build_router(state_with(tmp.path(), None, Ok(String::new())));
        let resp = get(app, "/fetch_repo").await;
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
        let v: serde_json::Value = serde_json::from_str(&body_text(resp).await).unwrap();
        assert_eq!(v["error"], "MISSING_ENV");
    }
}
