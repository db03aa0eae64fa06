//! Application state wiring the infra implementations into core services.

use std::path::PathBuf;
use std::sync::Arc;

use companion_core::chat::{DiagnosticBus, PipelineSettings, StreamingReplyPipeline};
use companion_core::completion::BoxCompletionService;
use companion_infra::config::load_config;
use companion_infra::credentials::api_key_from_env;
use companion_infra::filesystem::ensure_data_dir;
use companion_infra::llm::build_completion_service;
use companion_infra::sqlite::character::SqliteCharacterRepository;
use companion_infra::sqlite::history::SqliteHistoryStore;
use companion_infra::sqlite::pool::{DatabasePool, database_url};
use companion_types::config::CompanionConfig;

pub type ConcretePipeline = StreamingReplyPipeline<SqliteHistoryStore>;

/// Shared application state for every command.
#[derive(Clone)]
pub struct AppState {
    pub data_dir: PathBuf,
    pub config: CompanionConfig,
    pub history: Arc<SqliteHistoryStore>,
    pub characters: SqliteCharacterRepository,
    pub completion: Arc<BoxCompletionService>,
    pub has_credential: bool,
    pub diagnostics: DiagnosticBus,
}

impl AppState {
    /// Load config, open the database, and build the completion service.
    pub async fn init(data_dir: PathBuf) -> anyhow::Result<Self> {
        ensure_data_dir(&data_dir).await?;

        let config = load_config(&data_dir).await;
        let db_pool = DatabasePool::new(&database_url(&data_dir)).await?;

        let api_key = api_key_from_env(&config.provider.api_key_env);
        let has_credential = api_key.is_some();
        let completion = build_completion_service(&config.provider, api_key);

        Ok(Self {
            history: Arc::new(SqliteHistoryStore::new(db_pool.clone())),
            characters: SqliteCharacterRepository::new(db_pool),
            completion: Arc::new(completion),
            has_credential,
            diagnostics: DiagnosticBus::default(),
            data_dir,
            config,
        })
    }

    pub fn pipeline(&self) -> ConcretePipeline {
        StreamingReplyPipeline::new(
            self.history.clone(),
            self.completion.clone(),
            PipelineSettings::from_config(&self.config),
            self.diagnostics.clone(),
        )
    }
}
