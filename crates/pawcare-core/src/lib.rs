//! # PawCare Core Library
//!
//! Client-side core of the PawCare pet-care app: everything the app does
//! between the UI and the backend, usable on its own from the CLI.
//!
//! ## Architecture
//!
//! - **Session**: single-writer token manager with coalesced refreshes
//! - **Dispatch**: authenticated backend calls with one retry on token
//!   rejection and XP side effects
//! - **Recurrence**: reminder schedules encoded as RRULE-style descriptors
//! - **Progression**: XP curve, levels and level-up detection
//! - **Storage**: TOML configuration, OS keyring secrets and a JSON key-value
//!   store for cached data
//!
//! ## Key Components
//!
//! - [`SessionTokenManager`]: owns the access/refresh token pair
//! - [`AuthenticatedCallDispatcher`]: makes backend calls on the user's behalf
//! - [`RecurrenceRuleBuilder`]: turns a [`ReminderSchedule`] into a [`RecurrenceDescriptor`]
//! - [`LevelCurve`]: maps cumulative XP to levels
//! - [`Config`]: application configuration management

pub mod dispatch;
pub mod error;
pub mod logging;
pub mod progression;
pub mod recurrence;
pub mod session;
pub mod storage;

pub use dispatch::{
    AuthenticatedCallDispatcher, CallResponse, ChannelLevelUpListener, HttpTransport,
    LevelUpListener, NoopLevelUpListener, Transport,
};
pub use error::{
    ConfigError, CoreError, DispatchError, SessionError, StoreError, TransportError,
    ValidationError,
};
pub use progression::{
    apply_xp_delta, level_from_xp, ExperienceState, LevelCurve, LevelProgress, LevelUp,
    XpApplication,
};
pub use recurrence::{
    Frequency, Interval, RecurrenceDescriptor, RecurrenceRuleBuilder, ReminderSchedule, RuleParts,
};
pub use session::{Credential, RefreshedToken, SessionTokenManager};
pub use storage::{
    Config, JsonFileStore, KeyValueStore, KeyringSecretStore, SecretStore, UserProfile,
};
