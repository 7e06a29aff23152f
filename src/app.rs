use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::runtime::Runtime;
use tracing::{debug, info};

use crate::cli::OutputMode;
use crate::config::{Config, Engine};
use crate::error::Result;
use crate::expansion::SynonymExpander;
use crate::search::{
    OpenSearchBackend, OrchestratorOptions, SearchBackend, SearchOrchestrator, SqliteFtsBackend,
};

/// Everything a command needs: configuration, the orchestrator and a runtime
/// to drive it.
pub struct AppContext {
    pub project_root: PathBuf,
    pub config: Config,
    pub orchestrator: Arc<SearchOrchestrator>,
    pub output_mode: OutputMode,
    pub verbosity: u8,
    sqlite: Option<Arc<SqliteFtsBackend>>,
    runtime: Runtime,
}

impl AppContext {
    pub fn from_cli(cli: &crate::cli::Cli) -> Result<Self> {
        let project_root = std::env::current_dir()?;
        let config = Config::load(cli.config.as_deref(), &project_root)?;
        let mut ctx = Self::build(config, cli.output_mode())?;
        ctx.project_root = project_root;
        ctx.verbosity = cli.verbose;
        Ok(ctx)
    }

    /// Wire the expander, backends and orchestrator for `config`.
    pub fn build(config: Config, output_mode: OutputMode) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("tsearch-worker")
            .build()?;

        let expander = Arc::new(SynonymExpander::from_path(&config.dictionary.path)?);

        let needs_sqlite =
            config.search.engine == Engine::Sqlite || config.search.fallback_to_sqlite;
        let sqlite = if needs_sqlite {
            Some(Arc::new(SqliteFtsBackend::open(&config.sqlite)?))
        } else {
            None
        };

        let active: Arc<dyn SearchBackend> = match (config.search.engine, &sqlite) {
            (Engine::Sqlite, Some(sqlite)) => Arc::clone(sqlite) as Arc<dyn SearchBackend>,
            (Engine::Sqlite, None) => Arc::new(SqliteFtsBackend::open(&config.sqlite)?),
            (Engine::OpenSearch, _) => Arc::new(OpenSearchBackend::new(&config.opensearch)?),
        };

        let mut orchestrator =
            SearchOrchestrator::new(expander, active, OrchestratorOptions::from(&config.search));
        if config.search.engine != Engine::Sqlite && config.search.fallback_to_sqlite {
            if let Some(sqlite) = &sqlite {
                debug!("SQLite fallback enabled");
                orchestrator = orchestrator.with_fallback(Arc::clone(sqlite) as Arc<dyn SearchBackend>);
            }
        }

        info!(
            engine = %config.search.engine,
            dictionary = %config.dictionary.path.display(),
            "Search engine initialised"
        );

        Ok(Self {
            project_root: PathBuf::from("."),
            config,
            orchestrator: Arc::new(orchestrator),
            output_mode,
            verbosity: 0,
            sqlite,
            runtime,
        })
    }

    pub const fn robot_mode(&self) -> bool {
        matches!(self.output_mode, OutputMode::Robot)
    }

    /// The embedded index, opened on first use when it is not the active engine.
    pub fn sqlite(&self) -> Result<Arc<SqliteFtsBackend>> {
        match &self.sqlite {
            Some(sqlite) => Ok(Arc::clone(sqlite)),
            None => Ok(Arc::new(SqliteFtsBackend::open(&self.config.sqlite)?)),
        }
    }

    /// Drive an async operation to completion on the app runtime.
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }
}
