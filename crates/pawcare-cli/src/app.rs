//! Wiring shared by the commands that talk to the backend.

use std::error::Error;
use std::sync::Arc;

use pawcare_core::{
    AuthenticatedCallDispatcher, Config, DispatchError, HttpTransport, JsonFileStore,
    KeyringSecretStore, LevelUp, SessionTokenManager,
};

pub type CliResult<T = ()> = Result<T, Box<dyn Error>>;

/// Config plus a dispatcher backed by the OS keyring and the local store.
pub struct App {
    pub config: Config,
    pub dispatcher: AuthenticatedCallDispatcher,
}

impl App {
    pub fn open() -> CliResult<Self> {
        let config = Config::load()?;
        let session = SessionTokenManager::new(Arc::new(KeyringSecretStore::default()))
            .with_threshold(config.session.refresh_threshold())
            .with_default_ttl(config.session.access_token_ttl());
        let transport = HttpTransport::from_config(&config.backend)?;
        let profiles = JsonFileStore::open_default()?;

        let dispatcher = AuthenticatedCallDispatcher::new(
            Arc::new(session),
            Arc::new(transport),
            Arc::new(profiles),
        )
        .with_curve(config.progression.curve()?)
        .with_level_up_listener(Arc::new(|e: LevelUp| {
            eprintln!("level up! {} -> {}", e.old_level, e.new_level)
        }));

        Ok(Self { config, dispatcher })
    }

    /// Resume the stored session. A missing or dead session is not an
    /// error here; callers check `is_authenticated` when it matters.
    pub async fn resume(&self) -> CliResult {
        match self.dispatcher.restore().await {
            Ok(()) | Err(DispatchError::SessionExpired) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Each command invocation runs on its own single-threaded runtime.
pub fn block_on<F: std::future::Future>(future: F) -> CliResult<F::Output> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}
