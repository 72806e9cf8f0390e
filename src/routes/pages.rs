use crate::AppState;
use axum::{
    Router,
    extract::Query,
    response::Html,
    routing::get,
};
use serde::Deserialize;

/// Page Router Module
///
/// Minimal server-rendered stubs for the views the route gate protects.
/// These exist so the middleware has a real downstream: an allowed request
/// reaches a 200 here, a denied one never does. Presentation is out of
/// scope; each page is a placeholder shell.
pub fn page_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/login", get(login))
        .route("/dashboard", get(dashboard))
        .route("/plans", get(plans))
        .route("/settings", get(settings))
        .route("/promote", get(promote))
        .route("/admin", get(admin))
}

async fn home() -> Html<&'static str> {
    Html("<h1>planforge</h1><p>Collaborative AI-assisted business plans.</p>")
}

async fn login() -> Html<&'static str> {
    Html("<h1>Sign in</h1>")
}

#[derive(Deserialize)]
struct DashboardQuery {
    unauthorized: Option<bool>,
}

/// The dashboard is the destination of both the home redirect and the
/// unauthorized redirect; it is responsible for rendering the access-denied
/// message when the reason flag is present (the redirect itself is silent).
async fn dashboard(Query(query): Query<DashboardQuery>) -> Html<String> {
    let mut body = String::from("<h1>Dashboard</h1>");
    if query.unauthorized.unwrap_or(false) {
        body.push_str("<p class=\"notice\">You are not authorized to view that page.</p>");
    }
    Html(body)
}

async fn plans() -> Html<&'static str> {
    Html("<h1>Your plans</h1>")
}

async fn settings() -> Html<&'static str> {
    Html("<h1>Settings</h1>")
}

async fn promote() -> Html<&'static str> {
    Html("<h1>Role management</h1>")
}

async fn admin() -> Html<&'static str> {
    Html("<h1>Admin dashboard</h1>")
}
