use std::{fmt::Write as _, path::Path, sync::Arc};

use axum::{
    extract::{Query, State},
    http::{StatusCode, header},
    response::{Html, IntoResponse, Response},
};
use project_code_store::{ConcatError, ConcatOptions, concatenate, list_files};
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::{
    core::app_state::AppState,
    error_handler::{AppError, AppResult},
};

pub const NOT_CLONED: &str = "Repository not cloned yet.";

#[derive(Debug, Default, Deserialize)]
pub struct ViewRepoQuery {
    /// Append the concatenated source document below the listing.
    #[serde(default)]
    pub show_content: bool,
}

/// Lists the clone's files, optionally with the concatenated content.
#[instrument(name = "view_repo_route", skip_all, fields(show_content = q.show_content))]
pub async fn view_repo_route(
    State(state): State<Arc<AppState>>,
    Query(q): Query<ViewRepoQuery>,
) -> AppResult<Response> {
    let _guard = state.workspace.read().await;
    let root = state.config.clone_dir.clone();
    if !root.is_dir() {
        return Ok((
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            NOT_CLONED,
        )
            .into_response());
    }

    let opts = state.config.concat;
    let show = q.show_content;
    let (files, content) = tokio::task::spawn_blocking(move || load_listing(&root, opts, show))
        .await
        .map_err(|e| AppError::Http {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "JOIN_ERROR",
            message: e.to_string(),
        })?
        .map_err(|e| AppError::Http {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            code: "LISTING_FAILED",
            message: e.to_string(),
        })?;

    debug!(files = files.len(), "repository listed");
    Ok(Html(render_listing(&files, content.as_deref(), opts)).into_response())
}

fn load_listing(
    root: &Path,
    opts: ConcatOptions,
    show_content: bool,
) -> Result<(Vec<String>, Option<String>), ConcatError> {
    let files = list_files(root, opts)?;
    let content = if show_content {
        Some(concatenate(root, opts)?)
    } else {
        None
    };
    Ok((files, content))
}

fn render_listing(files: &[String], content: Option<&str>, opts: ConcatOptions) -> String {
    let mut html = String::from(
        "<!doctype html>\n<html lang=\"en\">\n<head><meta charset=\"utf-8\"><title>Repository</title></head>\n<body>\n",
    );
    let _ = writeln!(
        html,
        "<h1>Repository files ({})</h1>\n<p><a href=\"/\">Home</a> | <a href=\"/fetch_repo\">Re-fetch</a> | <a href=\"/view_repo?show_content=true\">Show content</a></p>",
        files.len()
    );
    if opts.include_hidden {
        html.push_str("<p>Hidden files are included.</p>\n");
    }

    html.push_str("<ul>\n");
    for path in files {
        let _ = writeln!(
            html,
            "<li><a href=\"/cloned_repo/{}\">{}</a></li>",
            encode_path(path),
            escape_html(path)
        );
    }
    html.push_str("</ul>\n");

    if let Some(content) = content {
        let _ = writeln!(html, "<h2>Content</h2>\n<pre>{}</pre>", escape_html(content));
    }
    html.push_str("</body>\n</html>\n");
    html
}

fn encode_path(path: &str) -> String {
    path.split('/')
        .map(|seg| urlencoding::encode(seg).into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn escape_html(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            c => out.push(c),
        }
    }
    out
}
