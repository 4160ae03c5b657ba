/// PlayerCore: single-owner event loop for all playback state.
///
/// Every input (commands from the HTTP API, stamped resource events, poll
/// ticks) arrives as a `PlayerEvent` on one channel and is handled to
/// completion before the next.  The core owns the `PlaybackStateStore`
/// exclusively; no other task touches it.
///
/// After each event the core republishes a `PlayerSnapshot` on a `watch`
/// channel, but only when something actually changed.
use std::sync::Arc;

use cast_proto::config::PlayerConfig;
use cast_proto::protocol::{Command, PlayerSnapshot};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info};

use crate::engine::{EngineEvent, EventSink, MediaFactory};
use crate::poll::{Epoch, TickSink};
use crate::store::PlaybackStateStore;

// ── PlayerEvent ───────────────────────────────────────────────────────────────

/// All inputs into the PlayerCore loop.
#[derive(Debug)]
pub enum PlayerEvent {
    /// A command from the HTTP API or any other front end.
    Command(Command),
    /// A resource event, stamped with its attach generation.
    Media(EngineEvent),
    /// A position-sampling tick.
    PollTick(Epoch),
    Shutdown,
}

// ── handle ────────────────────────────────────────────────────────────────────

/// Cloneable front-end side of the core.
#[derive(Clone)]
pub struct PlayerHandle {
    tx: mpsc::UnboundedSender<PlayerEvent>,
    snapshot: watch::Receiver<PlayerSnapshot>,
}

impl PlayerHandle {
    pub fn send(&self, cmd: Command) -> anyhow::Result<()> {
        self.tx
            .send(PlayerEvent::Command(cmd))
            .map_err(|_| anyhow::anyhow!("player core has stopped"))
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> PlayerSnapshot {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<PlayerSnapshot> {
        self.snapshot.clone()
    }

    pub fn shutdown(&self) {
        let _ = self.tx.send(PlayerEvent::Shutdown);
    }
}

// ── PlayerCore ────────────────────────────────────────────────────────────────

pub struct PlayerCore<F: MediaFactory> {
    store: PlaybackStateStore<F>,
    rx: mpsc::UnboundedReceiver<PlayerEvent>,
    snapshot_tx: watch::Sender<PlayerSnapshot>,
}

impl<F: MediaFactory> PlayerCore<F> {
    pub fn new(factory: F, config: &PlayerConfig) -> (Self, PlayerHandle) {
        let (tx, rx) = mpsc::unbounded_channel();

        let media_tx = tx.clone();
        let event_sink: EventSink = Arc::new(move |evt| {
            let _ = media_tx.send(PlayerEvent::Media(evt));
        });
        let tick_tx = tx.clone();
        let tick_sink: TickSink = Arc::new(move |epoch| {
            let _ = tick_tx.send(PlayerEvent::PollTick(epoch));
        });

        let store = PlaybackStateStore::new(
            factory,
            event_sink,
            tick_sink,
            config.poll_interval(),
            config.volume(),
        );
        let (snapshot_tx, snapshot_rx) = watch::channel(store.snapshot());

        let core = Self {
            store,
            rx,
            snapshot_tx,
        };
        let handle = PlayerHandle {
            tx,
            snapshot: snapshot_rx,
        };
        (core, handle)
    }

    /// Run until a `Shutdown` event arrives.  The active resource is released on the way out.
    pub async fn run(mut self) {
        info!("core: starting event loop");

        while let Some(event) = self.rx.recv().await {
            match event {
                PlayerEvent::Shutdown => {
                    info!("core: shutdown requested");
                    break;
                }
                PlayerEvent::Command(cmd) => {
                    info!("core: command {:?}", cmd);
                    self.handle_command(cmd);
                }
                PlayerEvent::Media(evt) => {
                    debug!("core: {} (generation {})", evt.kind.name(), evt.generation);
                    self.store.handle_media_event(evt);
                }
                PlayerEvent::PollTick(epoch) => self.store.handle_poll_tick(epoch),
            }
            self.publish();
        }

        self.store.shutdown();
        self.publish();
        info!("core: stopped");
    }

    fn handle_command(&mut self, cmd: Command) {
        match cmd {
            Command::Open { url } => self.store.open(url.as_deref()),
            Command::SetPlayIntent { playing } => self.store.set_play_intent(playing),
            Command::Seek { seconds } => self.store.seek(seconds),
            Command::Volume { value } => self.store.set_volume(value),
        }
    }

    fn publish(&self) {
        let next = self.store.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == next {
                return false;
            }
            *current = next;
            true
        });
    }
}
