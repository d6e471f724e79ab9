//! Route-level rate-limit middleware and the window sets each route uses.
use std::net::SocketAddr;

use axum::extract::{ConnectInfo, MatchedPath, State};
use axum::http::Request;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::AppResult;
use crate::ratelimit::{client_identity, RateLimiter, Window};

pub const ROOT_WINDOWS: &[Window] = &[
    Window::per_seconds(2, 5),
    Window::per_seconds(4, 20),
];
pub const GENERATE_WINDOWS: &[Window] = &[
    Window::per_seconds(2, 5),
    Window::per_seconds(10, 60),
];
pub const LISTING_WINDOWS: &[Window] = &[Window::per_seconds(1000, 20)];

/// Limiter plus the windows one route is held to.
#[derive(Clone)]
pub struct RoutePolicy {
    limiter: RateLimiter,
    windows: &'static [Window],
}

impl RoutePolicy {
    pub fn new(limiter: RateLimiter, windows: &'static [Window]) -> Self {
        RoutePolicy { limiter, windows }
    }
}

pub async fn enforce_rate_limit<B>(
    State(policy): State<RoutePolicy>,
    req: Request<B>,
    next: Next<B>,
) -> AppResult<Response> {
    let peer = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    // Buckets follow the route template, not the concrete URL
    let route = req
        .extensions()
        .get::<MatchedPath>()
        .map(MatchedPath::as_str)
        .unwrap_or_else(|| req.uri().path());
    let identity = client_identity(req.headers(), peer, route);
    policy.limiter.check(&identity, policy.windows).await?;
    Ok(next.run(req).await)
}
