//! Keeps the access token fresh while the user sits on a protected screen.
//!
//! The refresher is driven by route changes. On a protected route with a
//! token it refreshes immediately and then on a fixed interval. After
//! `max_failures` consecutive failures it cancels itself and stays stopped
//! until the next activation.

use crate::error::ApiError;
use actix::prelude::*;
use colored::Color;
use common::constants::{MAX_CONSECUTIVE_REFRESH_FAILURES, PUBLIC_ROUTES, TOKEN_REFRESH_INTERVAL};
use common::logger::Logger;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

pub type RefreshFuture = Pin<Box<dyn Future<Output = Result<(), ApiError>> + Send>>;

/// Something that can exchange the refresh token for a new access token.
pub trait RefreshToken: Send + Sync + 'static {
    fn refresh(&self) -> RefreshFuture;
}

pub fn is_public_route(path: &str) -> bool {
    let path = path.split(['?', '#']).next().unwrap_or(path);
    let trimmed = path.trim_end_matches('/');
    let normalized = if trimmed.is_empty() { "/" } else { trimmed };
    PUBLIC_ROUTES.contains(&normalized)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    Idle,
    Active,
    Stopped,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshStatus {
    pub state: RefreshState,
    pub attempts: u32,
    pub successes: u32,
    pub consecutive_failures: u32,
}

#[derive(Message)]
#[rtype(result = "()")]
pub struct RouteChanged {
    pub path: String,
    pub has_token: bool,
}

#[derive(Message)]
#[rtype(result = "RefreshStatus")]
pub struct GetRefreshStatus;

pub struct TokenRefresher {
    refresher: Arc<dyn RefreshToken>,
    interval: Duration,
    max_failures: u32,
    state: RefreshState,
    timer: Option<SpawnHandle>,
    in_flight: bool,
    /// Activation arrived while a refresh was running; refresh again once it settles.
    queued: bool,
    attempts: u32,
    successes: u32,
    consecutive_failures: u32,
    logger: Logger,
}

impl TokenRefresher {
    pub fn new(refresher: Arc<dyn RefreshToken>) -> Self {
        Self::with_schedule(refresher, TOKEN_REFRESH_INTERVAL, MAX_CONSECUTIVE_REFRESH_FAILURES)
    }

    pub fn with_schedule(refresher: Arc<dyn RefreshToken>, interval: Duration, max_failures: u32) -> Self {
        Self {
            refresher,
            interval,
            max_failures: max_failures.max(1),
            state: RefreshState::Idle,
            timer: None,
            in_flight: false,
            queued: false,
            attempts: 0,
            successes: 0,
            consecutive_failures: 0,
            logger: Logger::new("Token Refresher", Color::Magenta),
        }
    }

    fn activate(&mut self, ctx: &mut Context<Self>) {
        if self.timer.is_some() {
            return;
        }
        self.logger.info(format!(
            "Token refresh active every {}s",
            self.interval.as_secs_f32()
        ));
        self.state = RefreshState::Active;
        self.consecutive_failures = 0;
        if self.in_flight {
            self.queued = true;
        } else {
            self.refresh(ctx);
        }
        self.timer = Some(ctx.run_interval(self.interval, |act, ctx| act.refresh(ctx)));
    }

    fn cancel_timer(&mut self, ctx: &mut Context<Self>) {
        if let Some(handle) = self.timer.take() {
            ctx.cancel_future(handle);
        }
    }

    fn deactivate(&mut self, ctx: &mut Context<Self>) {
        if self.state == RefreshState::Active {
            self.logger.info("Token refresh paused");
        }
        self.cancel_timer(ctx);
        self.queued = false;
        self.state = RefreshState::Idle;
    }

    fn stop(&mut self, ctx: &mut Context<Self>) {
        self.cancel_timer(ctx);
        self.queued = false;
        self.state = RefreshState::Stopped;
        self.logger.error(format!(
            "Token refresh stopped after {} consecutive failures",
            self.consecutive_failures
        ));
    }

    fn refresh(&mut self, ctx: &mut Context<Self>) {
        if self.in_flight {
            self.logger.debug("Refresh already in progress, skipping");
            return;
        }
        self.in_flight = true;
        self.attempts += 1;

        ctx.spawn(self.refresher.refresh().into_actor(self).map(
            |result, act, ctx| {
                act.in_flight = false;
                match result {
                    Ok(()) => {
                        act.successes += 1;
                        act.consecutive_failures = 0;
                        act.logger.debug("Access token refreshed");
                    }
                    Err(e) => {
                        act.consecutive_failures += 1;
                        act.logger.warn(format!(
                            "Token refresh failed ({}/{}): {e}",
                            act.consecutive_failures, act.max_failures
                        ));
                        if act.state == RefreshState::Active
                            && act.consecutive_failures >= act.max_failures
                        {
                            act.stop(ctx);
                        }
                    }
                }
                if act.queued && act.state == RefreshState::Active {
                    act.queued = false;
                    act.refresh(ctx);
                }
            },
        ));
    }
}

impl Actor for TokenRefresher {
    type Context = Context<Self>;
}

impl Handler<RouteChanged> for TokenRefresher {
    type Result = ();

    fn handle(&mut self, msg: RouteChanged, ctx: &mut Self::Context) {
        if msg.has_token && !is_public_route(&msg.path) {
            self.activate(ctx);
        } else {
            self.deactivate(ctx);
        }
    }
}

impl Handler<GetRefreshStatus> for TokenRefresher {
    type Result = MessageResult<GetRefreshStatus>;

    fn handle(&mut self, _msg: GetRefreshStatus, _ctx: &mut Self::Context) -> Self::Result {
        MessageResult(RefreshStatus {
            state: self.state,
            attempts: self.attempts,
            successes: self.successes,
            consecutive_failures: self.consecutive_failures,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ntest::timeout;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Plays back scripted outcomes, then succeeds.
    struct Scripted {
        outcomes: Mutex<VecDeque<bool>>,
        delay: Duration,
    }

    impl Scripted {
        fn new(outcomes: &[bool]) -> Arc<Self> {
            Self::slow(outcomes, Duration::ZERO)
        }

        fn slow(outcomes: &[bool], delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.iter().copied().collect()),
                delay,
            })
        }
    }

    impl RefreshToken for Scripted {
        fn refresh(&self) -> RefreshFuture {
            let ok = self.outcomes.lock().unwrap().pop_front().unwrap_or(true);
            let delay = self.delay;
            Box::pin(async move {
                tokio::time::sleep(delay).await;
                if ok {
                    Ok(())
                } else {
                    Err(ApiError::Server {
                        status: 401,
                        message: "Invalid or expired refresh token".into(),
                    })
                }
            })
        }
    }

    fn start(refresher: Arc<Scripted>, interval_ms: u64) -> Addr<TokenRefresher> {
        TokenRefresher::with_schedule(refresher, Duration::from_millis(interval_ms), 3).start()
    }

    async fn route(addr: &Addr<TokenRefresher>, path: &str, has_token: bool) {
        addr.send(RouteChanged {
            path: path.into(),
            has_token,
        })
        .await
        .unwrap();
    }

    async fn sleep_ms(ms: u64) {
        actix_rt::time::sleep(Duration::from_millis(ms)).await;
    }

    #[test]
    fn public_routes_are_recognised() {
        assert!(is_public_route("/"));
        assert!(is_public_route("/login"));
        assert!(is_public_route("/register/"));
        assert!(is_public_route("/login?next=/dashboard"));
        assert!(!is_public_route("/dashboard/customer"));
        assert!(!is_public_route("/bookings"));
    }

    #[actix_rt::test]
    async fn stays_idle_on_public_routes_or_without_a_token() {
        let addr = start(Scripted::new(&[]), 20);
        route(&addr, "/login", true).await;
        route(&addr, "/dashboard/customer", false).await;
        sleep_ms(80).await;

        let status = addr.send(GetRefreshStatus).await.unwrap();
        assert_eq!(status.state, RefreshState::Idle);
        assert_eq!(status.attempts, 0);
    }

    #[actix_rt::test]
    #[timeout(5000)]
    async fn refreshes_immediately_and_then_periodically() {
        let addr = start(Scripted::new(&[]), 40);
        route(&addr, "/dashboard/customer", true).await;
        sleep_ms(10).await;
        assert_eq!(addr.send(GetRefreshStatus).await.unwrap().attempts, 1);

        sleep_ms(150).await;
        let status = addr.send(GetRefreshStatus).await.unwrap();
        assert_eq!(status.state, RefreshState::Active);
        assert!(status.attempts >= 3, "{status:?}");
        // The latest tick may still be in flight.
        assert!(status.successes + 1 >= status.attempts, "{status:?}");
        assert!(status.successes <= status.attempts);
    }

    #[actix_rt::test]
    #[timeout(5000)]
    async fn stops_after_three_consecutive_failures() {
        let addr = start(Scripted::new(&[false, false, false]), 20);
        route(&addr, "/dashboard/provider", true).await;
        sleep_ms(200).await;

        let status = addr.send(GetRefreshStatus).await.unwrap();
        assert_eq!(status.state, RefreshState::Stopped);
        assert_eq!(status.attempts, 3);
        assert_eq!(status.consecutive_failures, 3);

        sleep_ms(80).await;
        assert_eq!(addr.send(GetRefreshStatus).await.unwrap().attempts, 3);
    }

    #[actix_rt::test]
    #[timeout(5000)]
    async fn a_success_resets_the_failure_count() {
        let addr = start(Scripted::new(&[false, false, true, false, false]), 20);
        route(&addr, "/dashboard/customer", true).await;
        sleep_ms(250).await;

        let status = addr.send(GetRefreshStatus).await.unwrap();
        assert_eq!(status.state, RefreshState::Active);
        assert!(status.attempts > 5, "{status:?}");
        assert_eq!(status.consecutive_failures, 0);
    }

    #[actix_rt::test]
    #[timeout(5000)]
    async fn leaving_for_a_public_route_pauses_refresh() {
        let addr = start(Scripted::new(&[]), 20);
        route(&addr, "/dashboard/customer", true).await;
        sleep_ms(50).await;
        route(&addr, "/login", false).await;
        let paused = addr.send(GetRefreshStatus).await.unwrap();
        assert_eq!(paused.state, RefreshState::Idle);

        sleep_ms(80).await;
        let later = addr.send(GetRefreshStatus).await.unwrap();
        assert!(later.attempts <= paused.attempts + 1);
    }

    #[actix_rt::test]
    #[timeout(5000)]
    async fn stopped_refresher_restarts_on_next_activation() {
        let addr = start(Scripted::new(&[false, false, false]), 20);
        route(&addr, "/dashboard/customer", true).await;
        sleep_ms(200).await;
        assert_eq!(
            addr.send(GetRefreshStatus).await.unwrap().state,
            RefreshState::Stopped
        );

        route(&addr, "/dashboard/customer", true).await;
        sleep_ms(30).await;
        let status = addr.send(GetRefreshStatus).await.unwrap();
        assert_eq!(status.state, RefreshState::Active);
        assert!(status.successes >= 1);
    }

    #[actix_rt::test]
    #[timeout(5000)]
    async fn overlapping_ticks_are_skipped() {
        let addr = start(Scripted::slow(&[], Duration::from_millis(200)), 30);
        route(&addr, "/dashboard/customer", true).await;
        sleep_ms(150).await;

        let status = addr.send(GetRefreshStatus).await.unwrap();
        assert_eq!(status.attempts, 1);
        assert_eq!(status.successes, 0);
    }

    #[actix_rt::test]
    #[timeout(5000)]
    async fn reactivation_during_a_refresh_refreshes_again_once_it_settles() {
        let addr = TokenRefresher::with_schedule(
            Scripted::slow(&[], Duration::from_millis(100)),
            Duration::from_secs(60),
            3,
        )
        .start();
        route(&addr, "/dashboard/customer", true).await;
        sleep_ms(20).await;
        route(&addr, "/login", true).await;
        route(&addr, "/dashboard/customer", true).await;
        assert_eq!(addr.send(GetRefreshStatus).await.unwrap().attempts, 1);

        sleep_ms(350).await;
        let status = addr.send(GetRefreshStatus).await.unwrap();
        assert_eq!(status.state, RefreshState::Active);
        assert_eq!(status.attempts, 2);
        assert_eq!(status.successes, 2);
    }

    #[actix_rt::test]
    #[timeout(5000)]
    async fn leaving_during_a_refresh_does_not_queue_another() {
        let addr = TokenRefresher::with_schedule(
            Scripted::slow(&[], Duration::from_millis(100)),
            Duration::from_secs(60),
            3,
        )
        .start();
        route(&addr, "/dashboard/customer", true).await;
        sleep_ms(20).await;
        route(&addr, "/dashboard/customer", false).await;

        sleep_ms(250).await;
        let status = addr.send(GetRefreshStatus).await.unwrap();
        assert_eq!(status.state, RefreshState::Idle);
        assert_eq!(status.attempts, 1);
    }
}
