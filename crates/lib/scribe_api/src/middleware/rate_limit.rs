//! Fixed-window rate limiting for the AI endpoints, keyed by user.

use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use dashmap::DashMap;
use tracing::debug;
use uuid::Uuid;

use super::auth::AuthenticatedUser;
use crate::AppState;
use crate::error::AppError;

const WINDOW: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    count: u32,
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RateLimitResult {
    Allowed,
    /// Seconds until the current window closes.
    Limited { retry_after: u64 },
}

/// Per-user request counter over one-minute windows.
#[derive(Debug, Clone)]
pub struct RateLimiter {
    limit: u32,
    window: Duration,
    windows: Arc<DashMap<Uuid, Window>>,
}

impl RateLimiter {
    pub fn per_minute(limit: u32) -> Self {
        Self::new(limit, WINDOW)
    }

    pub fn new(limit: u32, window: Duration) -> Self {
        Self {
            limit,
            window,
            windows: Arc::new(DashMap::new()),
        }
    }

    /// Count one request for `user` and decide whether it may proceed.
    pub fn check(&self, user: Uuid) -> RateLimitResult {
        self.check_at(user, Instant::now())
    }

    fn check_at(&self, user: Uuid, now: Instant) -> RateLimitResult {
        let mut entry = self.windows.entry(user).or_insert(Window {
            started: now,
            count: 0,
        });
        let elapsed = now.saturating_duration_since(entry.started);
        if elapsed >= self.window {
            *entry = Window {
                started: now,
                count: 0,
            };
        }
        if entry.count >= self.limit {
            let left = self.window.saturating_sub(now.saturating_duration_since(entry.started));
            return RateLimitResult::Limited {
                retry_after: left.as_secs().max(1),
            };
        }
        entry.count += 1;
        RateLimitResult::Allowed
    }

    /// Drop windows that have closed.
    pub fn cleanup(&self) {
        let window = self.window;
        self.windows.retain(|_, w| w.started.elapsed() < window);
    }

    pub fn tracked_users(&self) -> usize {
        self.windows.len()
    }
}

/// Axum middleware for routes behind `require_auth`.
pub async fn limit_ai(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let user = request
        .extensions()
        .get::<AuthenticatedUser>()
        .map(|u| u.0.sub)
        .ok_or_else(|| AppError::Unauthorized("Authentication required".into()))?;
    if let RateLimitResult::Limited { retry_after } = state.ai_limiter.check(user) {
        debug!(%user, retry_after, "ai request rate limited");
        return Err(AppError::RateLimited { retry_after });
    }
    Ok(next.run(request).await)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allows_up_to_limit_then_blocks() {
        let limiter = RateLimiter::per_minute(2);
        let user = Uuid::now_v7();
        assert_eq!(limiter.check(user), RateLimitResult::Allowed);
        assert_eq!(limiter.check(user), RateLimitResult::Allowed);
        assert!(matches!(limiter.check(user), RateLimitResult::Limited { retry_after } if retry_after >= 1));
        // Other users have their own window.
        assert_eq!(limiter.check(Uuid::now_v7()), RateLimitResult::Allowed);
    }

    #[test]
    fn window_resets_after_it_closes() {
        let limiter = RateLimiter::new(1, Duration::from_secs(10));
        let user = Uuid::now_v7();
        let start = Instant::now();
        assert_eq!(limiter.check_at(user, start), RateLimitResult::Allowed);
        assert!(matches!(
            limiter.check_at(user, start + Duration::from_secs(3)),
            RateLimitResult::Limited { retry_after: 7 }
        ));
        assert_eq!(
            limiter.check_at(user, start + Duration::from_secs(10)),
            RateLimitResult::Allowed
        );
    }

    #[test]
    fn zero_limit_blocks_everything() {
        let limiter = RateLimiter::per_minute(0);
        assert!(matches!(limiter.check(Uuid::now_v7()), RateLimitResult::Limited { .. }));
        assert_eq!(limiter.tracked_users(), 1);
    }
}
