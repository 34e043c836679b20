//! Client-side session: token persistence, cookie mirror, silent refresh.
//!
//! # Layout
//!
//! - [`storage`] - where the token pair is kept (`access_token`, `refresh_token`)
//! - [`cookies`] - the `token`/`role` cookies the route guard reads
//! - [`scheduler`] - clocks and one-shot timers, injectable for tests
//! - [`manager`] - [`TokenManager`], the lifecycle owner
//! - [`store`] - [`AuthStore`], login/logout state on top of the manager
//!
//! One manager is built per session and shared by handle; nothing here is
//! global.

pub mod cookies;
pub mod manager;
pub mod scheduler;
pub mod storage;
pub mod store;

pub use cookies::{
    COOKIE_MAX_AGE_SECS, CookieJarMirror, CookieSink, ROLE_COOKIE, TOKEN_COOKIE, expired_cookie,
    role_cookie, token_cookie,
};
pub use manager::{TokenManager, TokenPair, refresh_delay_ms};
pub use scheduler::{
    Clock, ManualClock, ManualScheduler, Scheduler, SystemClock, TimerHandle, TokioScheduler,
};
pub use storage::{FileStorage, MemoryStorage, StorageError, TokenStorage};
pub use store::{AuthError, AuthStore, SessionState, SessionUser};
