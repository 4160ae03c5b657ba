//! Playback state: canonical status, play intent, and their reconciliation.
//!
//! The store is the only writer of [`PlaybackStatus`].  Every operation is
//! synchronous; the core feeds it user commands, stamped resource events and
//! poll ticks one at a time.
//!
//! Intent is reconciled against readiness whenever the `(can_play, intent)`
//! pair changes:
//!
//! ```text
//!   can_play  intent   command
//!   false     *        none (wait for canplay)
//!   true      true     play()
//!   true      false    pause()
//! ```

use std::time::Duration;

use cast_proto::protocol::{PlaybackStatus, PlayerSnapshot, Span};
use tracing::{debug, info};

use crate::buffered;
use crate::engine::{EngineEvent, EventSink, MediaEngineBinding, MediaEventKind, MediaFactory, MediaResource};
use crate::poll::{Epoch, PollLoop, TickSink};

const VOLUME_EPSILON: f32 = 1e-3;

pub struct PlaybackStateStore<F: MediaFactory> {
    engine: MediaEngineBinding<F>,
    poll: PollLoop,
    status: PlaybackStatus,
    play_intent: bool,
    /// Last volume the caller asked for; seeds every new attach.
    volume: f32,
    /// `(can_play, play_intent)` as of the last reconciliation.
    reconciled: (bool, bool),
}

impl<F: MediaFactory> PlaybackStateStore<F> {
    pub fn new(
        factory: F,
        event_sink: EventSink,
        tick_sink: TickSink,
        poll_interval: Duration,
        initial_volume: f32,
    ) -> Self {
        let volume = initial_volume.clamp(0.0, 1.0);
        Self {
            engine: MediaEngineBinding::new(factory, event_sink),
            poll: PollLoop::new(poll_interval, tick_sink),
            status: PlaybackStatus::detached(volume),
            play_intent: false,
            volume,
            reconciled: (false, false),
        }
    }

    pub fn current_status(&self) -> &PlaybackStatus {
        &self.status
    }

    pub fn play_intent(&self) -> bool {
        self.play_intent
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn url(&self) -> Option<&str> {
        self.engine.url()
    }

    pub fn engine(&self) -> &MediaEngineBinding<F> {
        &self.engine
    }

    pub fn is_polling(&self) -> bool {
        self.poll.is_running()
    }

    pub fn spans(&self) -> Vec<Span> {
        buffered::spans(&self.status.buffered, self.status.duration)
    }

    pub fn snapshot(&self) -> PlayerSnapshot {
        PlayerSnapshot {
            url: self.url().map(str::to_string),
            play_intent: self.play_intent,
            status: self.status.clone(),
            spans: self.spans(),
        }
    }

    // ── caller operations ────────────────────────────────────────────────────

    /// Switch media.  The old resource is fully torn down before the new one
    /// is constructed, and the status starts over from defaults.
    pub fn open(&mut self, url: Option<&str>) {
        self.poll.stop();
        self.engine.detach();
        self.status = PlaybackStatus::detached(self.volume);

        match self.engine.attach(url, self.volume) {
            Some(generation) => info!("store: opened generation {}", generation),
            None => info!("store: no active media, controls disabled"),
        }
        self.reconcile();
    }

    pub fn set_play_intent(&mut self, playing: bool) {
        if self.play_intent == playing {
            return;
        }
        self.play_intent = playing;
        debug!("store: play intent → {}", playing);
        self.reconcile();
    }

    /// Forwarded only once the resource can play; otherwise dropped, never queued.
    pub fn seek(&mut self, secs: f64) {
        if !self.status.can_play {
            debug!("store: seek to {:.1}s dropped, resource not ready", secs);
            return;
        }
        let target = self.status.clamp_time(secs);
        if let Some(resource) = self.engine.resource_mut() {
            resource.seek(target);
        }
    }

    /// Always forwarded, ready or not, and remembered for the next attach.
    pub fn set_volume(&mut self, volume: f32) {
        if volume.is_nan() {
            debug!("store: ignoring NaN volume");
            return;
        }
        let volume = volume.clamp(0.0, 1.0);
        self.volume = volume;
        match self.engine.resource_mut() {
            Some(resource) => resource.set_volume(volume),
            None => self.status.volume = volume,
        }
    }

    // ── engine-driven updates ────────────────────────────────────────────────

    pub fn handle_media_event(&mut self, event: EngineEvent) {
        if !self.engine.is_current(event.generation) {
            debug!(
                "store: dropping stale {} from generation {} (live: {:?})",
                event.kind.name(),
                event.generation,
                self.engine.generation()
            );
            return;
        }

        let was_ready = self.status.can_play;
        self.engine.apply_event(&mut self.status, event.kind);

        if event.kind == MediaEventKind::CanPlay && !was_ready {
            info!("store: resource ready");
            self.push_remembered_volume();
        }

        self.reconcile();
        self.sync_poll();
    }

    pub fn handle_poll_tick(&mut self, epoch: Epoch) {
        if !self.poll.accepts(epoch) {
            return;
        }
        if let Some(resource) = self.engine.resource() {
            self.status.current_time = self.status.clamp_time(resource.current_time());
        }
    }

    /// Release the resource and stop sampling.
    pub fn shutdown(&mut self) {
        self.poll.stop();
        self.engine.detach();
        self.status = PlaybackStatus::detached(self.volume);
        self.reconciled = (false, self.play_intent);
    }

    // ── internals ────────────────────────────────────────────────────────────

    fn reconcile(&mut self) {
        let pair = (self.status.can_play, self.play_intent);
        if pair == self.reconciled {
            return;
        }
        self.reconciled = pair;

        let Some(resource) = self.engine.resource_mut() else {
            return;
        };
        match pair {
            (false, _) => {}
            (true, true) => {
                debug!("store: intent play, resource ready → play()");
                resource.play();
            }
            (true, false) => {
                debug!("store: intent pause, resource ready → pause()");
                resource.pause();
            }
        }
    }

    fn push_remembered_volume(&mut self) {
        let volume = self.volume;
        if let Some(resource) = self.engine.resource_mut() {
            if (resource.volume() - volume).abs() > VOLUME_EPSILON {
                resource.set_volume(volume);
            }
        }
    }

    fn sync_poll(&mut self) {
        let should_poll = self.status.playing && self.engine.generation().is_some();
        if should_poll {
            self.poll.start();
        } else {
            self.poll.stop();
        }
    }
}
