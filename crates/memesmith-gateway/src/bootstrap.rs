use std::sync::Arc;
use std::time::Duration;

use memesmith_agents::{FixedIdeaGenerator, IdeaGenerator, LlmIdeaGenerator, OpenAiProvider};
use memesmith_channels::DeliverySink;
use memesmith_common::{Error, Result};
use memesmith_config::AppConfig;
use memesmith_db::{ActivityLog, SqliteActivityLog};
use memesmith_media::{
    FixedTemplateSearch, HttpImageSource, MemeFont, OverlayRenderer, PassthroughFaceSwap,
    TavilySearch, TemplateCache, TemplateFetcher, TemplateSearch,
};
use tracing::{info, warn};

use crate::dispatcher::{DispatchSettings, TriggerDispatcher};
use crate::history::HistoryBuffer;
use crate::metrics::Metrics;

/// Fully wired pipeline, ready to receive chat events.
pub struct Runtime {
    pub dispatcher: Arc<TriggerDispatcher>,
    pub metrics: Arc<Metrics>,
    pub history: Arc<HistoryBuffer>,
}

/// Wire every pipeline component from configuration.
///
/// `sink` is the outbound side of the chat transport; the caller keeps the
/// inbound side and hands the returned dispatcher to it as event handler.
pub fn build_runtime(config: &AppConfig, sink: Arc<dyn DeliverySink>) -> Result<Runtime> {
    config.validate()?;

    let metrics = Arc::new(Metrics::new());
    let history = Arc::new(HistoryBuffer::new(config.history.size));

    let ideas = build_idea_generator(config)?;
    let templates = Arc::new(TemplateFetcher::new(
        build_template_search(config)?,
        build_cache(config),
    ));
    info!("template search provider: {}", templates.provider_id());

    let font = Arc::new(MemeFont::load_or_builtin(config.media.font_path.as_deref()));
    let source = Arc::new(HttpImageSource::new(
        config.media.max_download_bytes,
        Duration::from_secs(config.media.download_timeout_secs),
    ));
    let mut renderer = OverlayRenderer::new(font, source);
    if config.face_swap.enabled {
        info!("face swap stage enabled (passthrough)");
        renderer = renderer.with_face_swap(Arc::new(PassthroughFaceSwap));
    }

    let mut dispatcher = TriggerDispatcher::new(
        Arc::clone(&history),
        ideas,
        templates,
        Arc::new(renderer),
        sink,
        DispatchSettings::from_config(config),
    )
    .with_metrics(Arc::clone(&metrics));

    if let Some(activity) = build_activity_log(config)? {
        dispatcher = dispatcher.with_activity_log(activity);
    }

    Ok(Runtime {
        dispatcher: Arc::new(dispatcher),
        metrics,
        history,
    })
}

fn build_idea_generator(config: &AppConfig) -> Result<Arc<dyn IdeaGenerator>> {
    let llm = &config.llm;
    if llm.mock {
        warn!("llm.mock is enabled, every trigger gets the same fixed idea");
        return Ok(Arc::new(FixedIdeaGenerator::default()));
    }

    let api_key = llm
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| Error::Config("llm.api_key is not set".into()))?;

    let mut provider = OpenAiProvider::new(api_key, Some(llm.base_url.clone()))
        .with_provider_id("openrouter")
        .with_timeout(Duration::from_secs(llm.timeout_secs));
    if let Some(referer) = &llm.referer {
        provider = provider.with_header("HTTP-Referer", referer.as_str());
    }
    if let Some(title) = &llm.title {
        provider = provider.with_header("X-Title", title.as_str());
    }

    info!("idea generator: {} via {}", llm.model, llm.base_url);
    let mut generator = LlmIdeaGenerator::new(Arc::new(provider), llm.model.clone());
    if let Some(temperature) = llm.temperature {
        generator = generator.with_temperature(temperature);
    }
    Ok(Arc::new(generator))
}

fn build_template_search(config: &AppConfig) -> Result<Arc<dyn TemplateSearch>> {
    let search = &config.search;
    if search.mock {
        warn!("search.mock is enabled, every meme uses the placeholder template");
        return Ok(Arc::new(FixedTemplateSearch::default()));
    }

    let api_key = search
        .api_key
        .clone()
        .filter(|k| !k.trim().is_empty())
        .ok_or_else(|| Error::Config("search.api_key is not set".into()))?;

    Ok(Arc::new(TavilySearch::new(
        api_key,
        Some(search.base_url.clone()),
        Duration::from_secs(search.timeout_secs),
    )))
}

fn build_cache(config: &AppConfig) -> Option<TemplateCache> {
    if !config.cache.enabled {
        return None;
    }
    info!(
        "template cache at {} (ttl {}s)",
        config.cache.dir.display(),
        config.cache.ttl_secs
    );
    Some(TemplateCache::new(
        config.cache.dir.clone(),
        Duration::from_secs(config.cache.ttl_secs),
    ))
}

fn build_activity_log(config: &AppConfig) -> Result<Option<Arc<dyn ActivityLog>>> {
    let Some(path) = &config.database.path else {
        return Ok(None);
    };
    let log = SqliteActivityLog::open(path)?;
    info!("activity log at {}", path.display());
    Ok(Some(Arc::new(log)))
}
