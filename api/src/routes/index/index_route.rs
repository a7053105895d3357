use axum::response::Html;

const INDEX_HTML: &str = include_str!("../../../templates/index.html");

/// Static change-request form.
pub async fn index_route() -> Html<&'static str> {
    Html(INDEX_HTML)
}
