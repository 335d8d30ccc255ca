use crate::config::StorageConfig;
use crate::engine::Engine;
use slog::Drain;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::{Mutex, OnceCell};
use uploadkit_core::storage::{Error, ErrorKind, Result, Uploader};

// One cell per configuration. The map lock is only held to find or add a cell; building
// happens in the cell, so a slow build only holds up requests for the same configuration.
#[derive(Default)]
struct State {
    engines: HashMap<StorageConfig, Arc<OnceCell<Arc<Engine>>>>,
    shut_down: bool,
}

fn shut_down_error() -> Error {
    Error::new(ErrorKind::Connectivity, "the storage registry was shut down")
}

/// Hands out storage back-ends by configuration.
///
/// Back-ends are built on first use and shared afterwards: asking twice for the same
/// configuration returns the same instance, also when both requests race. Building one
/// back-end does not hold up requests for the others. [`Registry::shutdown`]
/// closes every instance that was handed out.
///
/// ```no_run
/// use uploadkit::{Registry, StorageConfig};
/// use uploadkit::storage::Uploader;
///
/// # async fn run() -> uploadkit::storage::Result<()> {
/// let registry = Registry::new(StorageConfig::new("local").with_setting("UPLOAD_DIR", "/srv/uploads"));
/// let uploader = registry.active().await?;
/// uploader.upload("hello.txt", &b"hello"[..]).await?;
/// registry.shutdown().await?;
/// # Ok(())
/// # }
/// ```
pub struct Registry {
    active: StorageConfig,
    state: Mutex<State>,
    logger: slog::Logger,
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry").field("active", &self.active).finish()
    }
}

impl Registry {
    /// Creates a registry whose [`active`](Registry::active) back-end is described by `active`.
    /// Nothing is built until a back-end is asked for.
    pub fn new(active: StorageConfig) -> Self {
        Registry {
            active,
            state: Mutex::new(State::default()),
            logger: slog::Logger::root(slog_stdlog::StdLog {}.fuse(), slog::o!()),
        }
    }

    /// Sets the structured logger. `None` restores the default, which forwards to the `log`
    /// crate.
    pub fn logger<L: Into<Option<slog::Logger>>>(mut self, logger: L) -> Self {
        self.logger = logger.into().unwrap_or_else(|| slog::Logger::root(slog_stdlog::StdLog {}.fuse(), slog::o!()));
        self
    }

    /// The configuration served by [`Registry::active`].
    pub fn active_config(&self) -> &StorageConfig {
        &self.active
    }

    /// Returns the back-end for `config`, building it when this is the first request for it.
    /// Requests for other configurations are not held up while a back-end is being built.
    pub async fn uploader(&self, config: &StorageConfig) -> Result<Arc<Engine>> {
        let cell = {
            let mut state = self.state.lock().await;
            if state.shut_down {
                return Err(shut_down_error());
            }
            state.engines.entry(config.clone()).or_default().clone()
        };
        if let Some(engine) = cell.get() {
            return Ok(engine.clone());
        }

        let engine = cell.get_or_try_init(|| self.build(config)).await?.clone();
        // A build that finished after shutdown would otherwise never be closed.
        if self.state.lock().await.shut_down {
            if let Err(e) = engine.close().await {
                slog::warn!(self.logger, "Failed to close storage back-end"; "engine" => &config.engine, "error" => %e);
            }
            return Err(shut_down_error());
        }
        Ok(engine)
    }

    async fn build(&self, config: &StorageConfig) -> Result<Arc<Engine>> {
        match Engine::from_config(config).await {
            Ok(engine) => {
                slog::info!(self.logger, "Storage back-end ready"; "engine" => engine.engine_name());
                Ok(Arc::new(engine))
            }
            Err(e) => {
                slog::error!(self.logger, "Could not build storage back-end"; "engine" => &config.engine, "error" => %e);
                Err(e)
            }
        }
    }

    /// The back-end of the configured storage engine.
    pub async fn active(&self) -> Result<Arc<Engine>> {
        self.uploader(&self.active).await
    }

    /// Like [`Registry::active`], but serves the local back-end, with the same settings, when no
    /// engine is configured at all.
    pub async fn active_or_local(&self) -> Result<Arc<Engine>> {
        if !self.active.is_unset() {
            return self.active().await;
        }
        let local = StorageConfig {
            engine: uploadkit_sbe_fs::ENGINE_NAME.to_string(),
            settings: self.active.settings.clone(),
        };
        self.uploader(&local).await
    }

    /// Closes every back-end handed out so far. All of them are closed even when some fail;
    /// the first failure is returned. Calling this again does nothing.
    pub async fn shutdown(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        if state.shut_down {
            return Ok(());
        }
        state.shut_down = true;

        let mut first_error = None;
        let built: Vec<_> = state.engines.drain().filter_map(|(config, cell)| Some((config, cell.get()?.clone()))).collect();
        drop(state);
        for (config, engine) in built {
            match engine.close().await {
                Ok(()) => slog::debug!(self.logger, "Closed storage back-end"; "engine" => &config.engine),
                Err(e) => {
                    slog::warn!(self.logger, "Failed to close storage back-end"; "engine" => &config.engine, "error" => %e);
                    first_error.get_or_insert(e);
                }
            }
        }
        slog::info!(self.logger, "Storage registry shut down");
        first_error.map_or(Ok(()), Err)
    }
}
