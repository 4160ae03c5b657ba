use std::sync::Arc;

use anyhow::Context;
use cast_player::core::PlayerCore;
use cast_player::feed;
use cast_player::http::{self, HttpState};
use cast_player::mpv::MpvFactory;
use cast_proto::config::Config;
use cast_proto::library::{FileStore, KeyValueStore, PodcastLibrary};
use cast_proto::protocol::Command;
use tokio::sync::Mutex;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let data_dir = cast_proto::platform::data_dir();
    std::fs::create_dir_all(&data_dir)?;

    let log_path = data_dir.join("castplay.log");
    let log_file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    // RUST_LOG wins; otherwise keep HTTP client internals quiet
    let log_filter = std::env::var("RUST_LOG")
        .unwrap_or_else(|_| "info,cast_player=debug,hyper_util=warn,reqwest=warn".to_string());
    tracing_subscriber::fmt()
        .with_writer(log_file)
        .with_env_filter(log_filter.as_str())
        .with_ansi(false)
        .init();

    eprintln!("castplay log: {}", log_path.display());
    tracing::info!("castplay starting…");

    // ── Load config ──────────────────────────────────────────────────────────
    let config = Config::load().unwrap_or_else(|e| {
        tracing::warn!("config unreadable, using defaults: {:#}", e);
        Config::default()
    });

    // ── mpv + PlayerCore ─────────────────────────────────────────────────────
    let factory = MpvFactory::connect(&config.mpv, config.player.volume())
        .await
        .context("starting mpv")?;
    let (core, player) = PlayerCore::new(factory, &config.player);
    let core_task = tokio::spawn(core.run());

    if let Some(url) = std::env::args().nth(1) {
        player.send(Command::Open { url: Some(url) })?;
    }

    // ── HTTP server ──────────────────────────────────────────────────────────
    if config.http.enabled {
        let client = feed::http_client();
        let store: Box<dyn KeyValueStore> = Box::new(FileStore::new(config.library.dir.clone()));
        let state = HttpState {
            player: player.clone(),
            podcasts: feed::podcast_cache(client.clone()),
            artwork: feed::artwork_cache(client),
            library: Arc::new(Mutex::new(PodcastLibrary::new(store))),
        };
        http::start_server(config.http.bind_address.clone(), config.http.port, state);
    } else {
        tracing::info!("HTTP API disabled in config");
    }

    tokio::signal::ctrl_c().await?;
    tracing::info!("castplay: interrupted, shutting down");
    player.shutdown();
    core_task.await?;

    Ok(())
}
