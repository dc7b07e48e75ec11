//! Backend calls made on behalf of the signed-in user.
//!
//! - [`Transport`]: port for invoking a named backend operation
//! - [`HttpTransport`]: reqwest adapter posting JSON to `{base_url}/{operation}`
//! - [`AuthenticatedCallDispatcher`]: token attach, single retry, XP side effects
//! - [`LevelUpListener`]: sink for level crossings

mod dispatcher;
mod listener;
mod transport;

#[cfg(test)]
mod dispatcher_tests;

pub use dispatcher::{
    AuthenticatedCallDispatcher, CallResponse, LOGIN_OPERATION, LOGOUT_OPERATION,
    REFRESH_OPERATION, XP_GAINED_FIELD,
};
pub use listener::{ChannelLevelUpListener, LevelUpListener, NoopLevelUpListener};
pub use transport::{classify_body, unwrap_envelope, HttpTransport, Transport, INVALID_TOKEN_CODE};
