use std::convert::Infallible;
use std::future::Future;
use std::pin::Pin;

use anyhow::{Context, Result};
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use hyper::{Method, Request, Response, StatusCode};
use tracing::{debug, error};

use crate::AppState;
use crate::handlers::http::{attendance, dashboard, members, utils::*};
use crate::handlers::sse;

// ---------------------------------------------------------------------------
// Handler type alias
// ---------------------------------------------------------------------------
//
// Every route is open: the dashboard API sits behind whatever the deployment
// puts in front of it and performs no authentication of its own.

type RouteHandler = Box<
    dyn Fn(
            Request<hyper::body::Incoming>,
            AppState,
        )
            -> Pin<Box<dyn Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send>>
        + Send
        + Sync,
>;

// ---------------------------------------------------------------------------
// Route
// ---------------------------------------------------------------------------

struct Route {
    method: Method,
    path: String,
    handler: RouteHandler,
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

pub struct Router {
    routes: Vec<Route>,
}

impl std::fmt::Debug for Router {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Router")
            .field("routes_count", &self.routes.len())
            .finish()
    }
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    fn add<F, Fut>(mut self, method: Method, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.routes.push(Route {
            method,
            path: path.to_string(),
            handler: Box::new(move |req, state| Box::pin(handler(req, state))),
        });
        self
    }

    pub fn get<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.add(Method::GET, path, handler)
    }

    pub fn post<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.add(Method::POST, path, handler)
    }

    pub fn put<F, Fut>(self, path: &str, handler: F) -> Self
    where
        F: Fn(Request<hyper::body::Incoming>, AppState) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Response<BoxBody<Bytes, Infallible>>>> + Send + 'static,
    {
        self.add(Method::PUT, path, handler)
    }

    // ── Dispatch ──────────────────────────────────────────────────────────────

    pub async fn route(
        &self,
        req: Request<hyper::body::Incoming>,
        state: AppState,
    ) -> Result<Response<BoxBody<Bytes, Infallible>>> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        if let Some(route) = self
            .routes
            .iter()
            .find(|r| r.method == method && Self::path_matches(&r.path, &path))
        {
            return (route.handler)(req, state).await;
        }

        debug!("No route for {} {}", method, path);
        json_response::deliver_error_json("NOT_FOUND", "Endpoint not found", StatusCode::NOT_FOUND)
            .context("Failed to deliver 404 response")
    }

    /// Route a request and turn any handler failure into a 500 envelope, so
    /// the connection always gets an answer.
    pub async fn handle(
        &self,
        req: Request<hyper::body::Incoming>,
        state: AppState,
    ) -> Result<Response<BoxBody<Bytes, Infallible>>, Infallible> {
        let method = req.method().clone();
        let path = req.uri().path().to_string();

        match self.route(req, state).await {
            Ok(response) => Ok(response),
            Err(e) => {
                error!("{} {} failed: {:#}", method, path, e);
                Ok(internal_error())
            }
        }
    }

    // ── Path matching ─────────────────────────────────────────────────────────

    /// Exact match on the path; any query string is ignored.
    pub fn path_matches(route_path: &str, request_path: &str) -> bool {
        let clean = request_path.split('?').next().unwrap_or(request_path);
        route_path == clean
    }
}

// ---------------------------------------------------------------------------
// Helper
// ---------------------------------------------------------------------------

fn internal_error() -> Response<BoxBody<Bytes, Infallible>> {
    json_response::deliver_error_json(
        "INTERNAL_ERROR",
        "Internal server error",
        StatusCode::INTERNAL_SERVER_ERROR,
    )
    .unwrap_or_else(|_| {
        let mut response = Response::new(full("Internal server error"));
        *response.status_mut() = StatusCode::INTERNAL_SERVER_ERROR;
        response
    })
}

// ---------------------------------------------------------------------------
// Dashboard API router
// ---------------------------------------------------------------------------

pub fn build_router() -> Router {
    Router::new()
        .get("/health", |_req, state| async move {
            deliver_success_json(
                &serde_json::json!({
                    "health": "ok",
                    "connectedClients": state.registry.len(),
                }),
                StatusCode::OK,
            )
        })
        // ── Realtime ─────────────────────────────────────────────────────────
        .get("/api/sse", |req, state| async move {
            sse::handle_sse_subscribe(req, state)
                .await
                .context("SSE subscribe failed")
        })
        .post("/api/sse", |req, state| async move {
            sse::handle_sse_trigger(req, state)
                .await
                .context("SSE trigger failed")
        })
        // ── Members ──────────────────────────────────────────────────────────
        .get("/api/members", |req, state| async move {
            members::handle_list_members(req, state)
                .await
                .context("List members failed")
        })
        .post("/api/members", |req, state| async move {
            members::handle_create_member(req, state)
                .await
                .context("Create member failed")
        })
        .put("/api/members", |req, state| async move {
            members::handle_update_member(req, state)
                .await
                .context("Update member failed")
        })
        // ── Attendance ───────────────────────────────────────────────────────
        .get("/api/attendance", |req, state| async move {
            attendance::handle_list_attendance(req, state)
                .await
                .context("List attendance failed")
        })
        .post("/api/attendance", |req, state| async move {
            attendance::handle_checkin(req, state)
                .await
                .context("Check-in failed")
        })
        .put("/api/attendance", |req, state| async move {
            attendance::handle_checkout(req, state)
                .await
                .context("Check-out failed")
        })
        // ── Dashboard ────────────────────────────────────────────────────────
        .get("/api/dashboard", |req, state| async move {
            dashboard::handle_dashboard(req, state)
                .await
                .context("Dashboard stats failed")
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
