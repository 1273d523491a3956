//! Wiring: turn an [`AppConfig`] into a ready reasoning loop.

use genbi_agent::{ReasoningLoop, prompt};
use genbi_config::AppConfig;
use genbi_core::artifact::ArtifactStore;
use genbi_core::event::EventBus;
use genbi_memory::{InMemoryArtifactStore, SessionStore};
use genbi_providers::OpenAiCompatProvider;
use genbi_tools::{
    ChartRenderer, CommandChartRenderer, Dialect, ModelHandle, SqlDatabase, Toolkit,
};
use std::sync::Arc;
use tracing::{info, warn};

pub struct Runtime {
    pub agent: ReasoningLoop,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub sessions: SessionStore,
    pub config: AppConfig,
}

/// Resolve the system prompt: an override wins, then a template file, then
/// the built-in template. `dialect` fills the `{dialect}` placeholder.
pub fn system_prompt(
    config: &AppConfig,
    dialect: &str,
) -> Result<String, Box<dyn std::error::Error>> {
    if let Some(prompt) = &config.prompt.system_prompt_override {
        return Ok(prompt.clone());
    }
    let template = match &config.prompt.template_path {
        Some(path) => std::fs::read_to_string(path)
            .map_err(|e| format!("Failed to read prompt template {}: {e}", path.display()))?,
        None => prompt::DEFAULT_TEMPLATE.to_string(),
    };
    Ok(prompt::render(
        &template,
        dialect,
        config.database.top_k,
        &config.prompt.suffix,
    ))
}

/// The dialect named in the prompt: the configured override, else the
/// dialect of the connected database.
pub fn prompt_dialect(config: &AppConfig, connected: Dialect) -> String {
    config
        .database
        .dialect
        .clone()
        .unwrap_or_else(|| connected.name().to_string())
}

pub async fn build(config: AppConfig) -> Result<Runtime, Box<dyn std::error::Error>> {
    // Check for the API key early so the error is clear
    let Some(api_key) = config.api_key.clone() else {
        eprintln!();
        eprintln!("  ERROR: No API key configured!");
        eprintln!();
        eprintln!("  Set one of these environment variables:");
        eprintln!("    GENBI_API_KEY   = 'sk-...'");
        eprintln!("    OPENAI_API_KEY  = 'sk-...'");
        eprintln!();
        eprintln!("  Or add it to your config file:");
        eprintln!("    {}", AppConfig::config_dir().join("config.toml").display());
        eprintln!();
        return Err("No API key found. See above for setup instructions.".into());
    };

    let provider = Arc::new(OpenAiCompatProvider::new("openai", &config.api_url, api_key)?);
    let db = Arc::new(
        SqlDatabase::connect(&config.database.url)
            .await
            .map_err(|e| format!("Failed to connect to database: {e}"))?,
    );
    let dialect = prompt_dialect(&config, db.dialect());

    let mut store = InMemoryArtifactStore::with_capacity(config.artifacts.max_entries);
    if let Some(ttl) = config.artifacts.ttl() {
        store = store.with_ttl(ttl);
    }
    let artifacts: Arc<dyn ArtifactStore> = Arc::new(store);

    let renderer = CommandChartRenderer::from_argv(&config.charts.renderer_command)
        .map(|r| Arc::new(r) as Arc<dyn ChartRenderer>);
    if renderer.is_none() {
        warn!("No chart renderer configured; visualize_table is disabled");
    }

    let tools = genbi_tools::analytics_registry(Toolkit {
        db,
        model: ModelHandle::new(provider.clone(), &config.default_model),
        renderer,
        artifacts: artifacts.clone(),
    });
    info!(tools = tools.len(), model = %config.default_model, "Tools ready");

    let mut sessions = SessionStore::new();
    if let Some(idle) = config.sessions.idle_timeout() {
        sessions = sessions.with_idle_timeout(idle);
    }

    let mut agent = ReasoningLoop::new(
        provider,
        &config.default_model,
        config.default_temperature,
        Arc::new(tools),
        Arc::new(EventBus::default()),
    )
    .with_system_prompt(system_prompt(&config, &dialect)?)
    .with_max_tokens(config.default_max_tokens)
    .with_max_iterations(config.agent.max_iterations)
    .with_sessions(sessions.clone());
    if let Some(timeout) = config.agent.turn_timeout() {
        agent = agent.with_turn_timeout(timeout);
    }

    Ok(Runtime {
        agent,
        artifacts,
        sessions,
        config,
    })
}
