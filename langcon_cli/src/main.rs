use anyhow::Context;
use clap::Parser;
use langcon_client::{logging, ClientConfig, Collaborators, Session};
use langcon_host::{ConfigStore, HostState, HttpReleaseFeed, LocalBackend, DEFAULT_MANIFEST_URL};
use langcon_protocol::Language;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[command(name = "langcon_cli", about = "Edit Langcon settings without the UI")]
struct Args {
    /// Directory holding config.json (defaults to the local data dir).
    #[arg(long, value_name = "PATH")]
    data_dir: Option<PathBuf>,

    /// Process name to add to the auto-switch list. Repeatable.
    #[arg(long, value_name = "NAME")]
    add: Vec<String>,

    /// Process name to remove from the auto-switch list. Repeatable.
    #[arg(long, value_name = "NAME")]
    remove: Vec<String>,

    /// en, ko, ja or zh. Anything else falls back to en.
    #[arg(long)]
    language: Option<String>,

    #[arg(long, value_name = "SECONDS")]
    detect_interval: Option<f32>,

    #[arg(long, value_name = "DISTANCE")]
    mouse_sensitivity: Option<u32>,

    /// Release manifest to compare against (or LANGCON_RELEASE_URL).
    #[arg(long)]
    release_url: Option<String>,

    #[arg(long, default_value_t = false)]
    no_update_check: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    logging::init();
    let args = Args::parse();

    let mut config = ClientConfig::from_env();
    if args.no_update_check {
        config.check_for_updates = false;
    }
    let settle_step = config.autosave_delay.max(Duration::from_millis(10));

    let dir = match args.data_dir.clone() {
        Some(dir) => dir,
        None => ConfigStore::default_dir()?,
    };
    let store = ConfigStore::open(&dir)
        .with_context(|| format!("failed to open {}", dir.display()))?;
    let state = HostState::load(store)?;

    let release_url = args
        .release_url
        .clone()
        .or_else(|| std::env::var("LANGCON_RELEASE_URL").ok())
        .unwrap_or_else(|| DEFAULT_MANIFEST_URL.to_string());
    let feed = HttpReleaseFeed::new(&release_url)?;

    let backend = Arc::new(LocalBackend::new(state).with_release_feed(Arc::new(feed)));
    let session = Session::start(
        config,
        backend.clone(),
        backend.as_ref(),
        Collaborators::default(),
    )
    .await?;

    let result = apply(&session, &args).await;

    while session.autosave_pending() {
        tokio::time::sleep(settle_step).await;
    }
    let version = if args.no_update_check {
        session.version_state()
    } else {
        session.version_settled().await
    };

    let report = serde_json::json!({
        "saved": session.saved(),
        "draft": session.draft(),
        "hasUnsavedChanges": session.has_unsaved_changes(),
        "version": version,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);

    session.shutdown().await;
    result
}

async fn apply(session: &Session, args: &Args) -> anyhow::Result<()> {
    for name in &args.add {
        session
            .add_selected_process(name.trim())
            .await
            .with_context(|| format!("add {name}"))?;
    }
    for name in &args.remove {
        session
            .remove_selected_process(name.trim())
            .await
            .with_context(|| format!("remove {name}"))?;
    }
    if let Some(raw) = args.language.as_deref() {
        let language = Language::sanitize(raw);
        if language.as_str() != raw.trim().to_ascii_lowercase() {
            tracing::warn!(requested = raw, using = %language, "unsupported language");
        }
        session.set_language(language).await?;
    }
    if let Some(seconds) = args.detect_interval {
        session.set_detect_interval(seconds).await?;
    }
    if let Some(distance) = args.mouse_sensitivity {
        session.set_mouse_sensitivity(distance).await?;
    }
    Ok(())
}
