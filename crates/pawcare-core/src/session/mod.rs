//! Authenticated session lifecycle.
//!
//! [`SessionTokenManager`] is the single owner and writer of the
//! [`Credential`]. It is created when the app starts (or at login), shared by
//! `Arc` with whatever makes authenticated calls, and cleared at logout.
//! Refreshes go through a per-manager [`SingleFlight`], so concurrent callers
//! never rotate the refresh token twice.

mod credential;
mod manager;
mod single_flight;

pub use credential::{Credential, RefreshedToken};
pub use manager::{
    SessionTokenManager, DEFAULT_ACCESS_TOKEN_TTL_SECS, DEFAULT_REFRESH_THRESHOLD_SECS,
};
pub use single_flight::{Abandoned, SingleFlight};
