//! CLI command implementations

use crate::output::{self, OutputFormat, SourceRow};
use anyhow::Context;
use indicatif::{ProgressBar, ProgressStyle};
use reel_core::{
    loader::{HttpMediaLoader, MediaLoader, SimulatedMedia},
    prefetch::{Fetcher, HttpFetcher, NoopFetcher},
    resolver::StreamingDelivery,
    storage::SeenSet,
    DeviceProfile, FileStore, MediaTier, Phase, SourceResolver, StoriesConfig,
    StoriesController, StorySession, StreamingSupport,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const HTTP_TIMEOUT: Duration = Duration::from_secs(10);

/// Read the configuration file, or fall back to the demo collection
pub fn load_config(path: Option<&Path>) -> anyhow::Result<StoriesConfig> {
    match path {
        Some(path) => StoriesConfig::from_file(path)
            .with_context(|| format!("loading configuration from {}", path.display())),
        None => {
            let config = StoriesConfig::default();
            config.validate()?;
            Ok(config)
        }
    }
}

/// List the sources chosen for every item
pub fn inspect(
    config: &StoriesConfig,
    tier: &str,
    native: bool,
    library: bool,
    format: &str,
) -> anyhow::Result<()> {
    let tier: MediaTier = tier.parse().map_err(anyhow::Error::msg)?;
    let resolver = SourceResolver::new(StreamingSupport { native, library }, &config.streaming);

    let mut rows = Vec::new();
    for (s, story) in config.stories.stories().iter().enumerate() {
        for (i, item) in story.items.iter().enumerate() {
            let plan = resolver.streaming_plan(item, tier);
            let streaming = match &plan.streaming {
                Some(source) => {
                    let via = match source.delivery {
                        StreamingDelivery::Native => "native",
                        StreamingDelivery::Library => "library",
                    };
                    format!("{} ({via})", source.url)
                }
                None => "-".to_string(),
            };
            rows.push(SourceRow {
                story: s,
                item: i,
                label: story.label.clone(),
                kind: item.kind.to_string(),
                source: plan.initial_url().to_string(),
                streaming,
                preview: resolver.preview_source(item, tier).to_string(),
            });
        }
    }

    println!(
        "{} stories, {} items, tier {}",
        config.stories.len(),
        rows.len(),
        output::highlight(&tier.to_string())
    );
    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
        OutputFormat::Table => println!("{}", output::table(&rows)),
        OutputFormat::Text => {
            for row in &rows {
                println!("  {}:{} {} {}", row.story, row.item, row.kind, row.source);
            }
        }
    }
    Ok(())
}

/// Options for [`play`]
pub struct PlayOptions {
    pub story: usize,
    pub store: PathBuf,
    pub latency_ms: u64,
    pub video_seconds: f64,
    pub fail: Vec<String>,
    pub http: bool,
}

/// Play from a story until the overlay closes
pub async fn play(config: StoriesConfig, options: PlayOptions) -> anyhow::Result<()> {
    let store = FileStore::open(&options.store)?;
    let total_items: usize = config.stories.stories().iter().map(|s| s.items.len()).sum();

    let (loader, fetcher): (Arc<dyn MediaLoader>, Arc<dyn Fetcher>) = if options.http {
        (
            Arc::new(HttpMediaLoader::new(HTTP_TIMEOUT)?),
            Arc::new(HttpFetcher::new(HTTP_TIMEOUT)?),
        )
    } else {
        let media = options.fail.iter().fold(
            SimulatedMedia::new(Duration::from_millis(options.latency_ms))
                .with_video_duration(options.video_seconds),
            |media, url| media.failing(url.clone()),
        );
        (Arc::new(media), Arc::new(NoopFetcher))
    };

    let controller = StoriesController::new(
        config,
        DeviceProfile::desktop(),
        StreamingSupport::default(),
        store,
        chrono::Utc::now(),
    )?;
    let session = StorySession::start(controller, loader, fetcher);
    info!(session_id = %session.id(), story = options.story, "Playing");

    let bar = ProgressBar::new(total_items as u64);
    bar.set_style(ProgressStyle::with_template(
        "{spinner} [{elapsed_precise}] [{bar:30}] {pos}/{len} {msg}",
    )?);

    let mut states = session.subscribe_state();
    session.open(options.story, 0).await?;

    let mut last = None;
    loop {
        let state = states.borrow_and_update().clone();
        if state.phase == Phase::Closed {
            break;
        }
        let position = (state.story, state.item);
        if last != Some(position) {
            if last.is_some() {
                bar.inc(1);
            }
            last = Some(position);
        }
        bar.set_message(format!("story {} item {} {}", state.story, state.item, state.phase));
        if states.changed().await.is_err() {
            break;
        }
    }
    bar.finish_with_message("closed");

    let seen: Vec<usize> = session.with(|c, _| Ok(c.seen_stories())).await?;
    println!("{} {:?}", output::success("Seen stories:"), seen);
    Ok(())
}

pub fn seen_list(store: &Path, format: &str) -> anyhow::Result<()> {
    let seen = SeenSet::load(FileStore::open(store)?);
    let indices: Vec<usize> = seen.indices().collect();
    match OutputFormat::from(format) {
        OutputFormat::Json => println!("{}", serde_json::to_string(&indices)?),
        _ if indices.is_empty() => println!("No stories seen yet"),
        _ => println!("Seen stories: {indices:?}"),
    }
    Ok(())
}

pub fn seen_clear(store: &Path) -> anyhow::Result<()> {
    let mut seen = SeenSet::load(FileStore::open(store)?);
    let count = seen.len();
    seen.clear();
    println!("{} forgot {count} stories", output::success("Cleared:"));
    Ok(())
}

pub fn share(config: StoriesConfig, format: &str) -> anyhow::Result<()> {
    let controller = StoriesController::new(
        config,
        DeviceProfile::desktop(),
        StreamingSupport::default(),
        reel_core::MemoryStore::new(),
        chrono::Utc::now(),
    )?;
    let payload = controller.share_payload();
    let link = controller.whatsapp_link()?;

    match OutputFormat::from(format) {
        OutputFormat::Json => println!(
            "{}",
            serde_json::to_string_pretty(&serde_json::json!({
                "payload": payload,
                "whatsapp": link.as_str(),
            }))?
        ),
        _ => {
            println!("Title:    {}", payload.title);
            println!("Text:     {}", payload.text);
            println!("URL:      {}", payload.url);
            println!("WhatsApp: {}", output::highlight(link.as_str()));
        }
    }
    Ok(())
}
