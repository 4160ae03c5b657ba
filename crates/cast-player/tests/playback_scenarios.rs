//! End-to-end playback behaviour through the public store API.

mod common;

use std::sync::{Arc, Mutex};
use std::time::Duration;

use cast_player::engine::{EngineEvent, MediaEventKind};
use cast_player::poll::TickSink;
use cast_player::store::PlaybackStateStore;
use cast_proto::protocol::{BufferedSegment, Span, SpanKind};
use common::scripted::{queue_sink, Cmd, Script, ScriptedFactory};
use proptest::prelude::*;

struct Player {
    store: PlaybackStateStore<ScriptedFactory>,
    script: Script,
    queue: Arc<Mutex<Vec<EngineEvent>>>,
}

impl Player {
    fn new() -> Self {
        let factory = ScriptedFactory::default();
        let script = factory.script.clone();
        let (sink, queue) = queue_sink();
        let ticks: TickSink = Arc::new(|_| {});
        let store = PlaybackStateStore::new(factory, sink, ticks, Duration::from_millis(500), 1.0);
        Self { store, script, queue }
    }

    fn fire(&mut self, idx: usize, kind: MediaEventKind) {
        self.script.fire(idx, kind);
        self.deliver();
    }

    fn deliver(&mut self) {
        let events: Vec<_> = self.queue.lock().unwrap().drain(..).collect();
        for evt in events {
            self.store.handle_media_event(evt);
        }
    }
}

#[tokio::test]
async fn buffered_progress_renders_seek_bar_spans() {
    let mut p = Player::new();
    p.store.open(Some("https://cdn.example/ep.mp3"));
    {
        let media = p.script.media(0);
        let mut media = media.lock().unwrap();
        media.duration = Some(20.0);
        media.buffered = vec![BufferedSegment::new(0.0, 5.0), BufferedSegment::new(8.0, 10.0)];
    }
    p.fire(0, MediaEventKind::Progress);

    assert_eq!(
        p.store.spans(),
        vec![Span::buffered(5.0), Span::gap(3.0), Span::buffered(2.0), Span::gap(10.0)]
    );
    let snapshot = p.store.snapshot();
    assert_eq!(snapshot.spans.iter().map(|s| s.length).sum::<f64>(), 20.0);
    assert_eq!(snapshot.spans[0].kind, SpanKind::Buffered);
}

#[tokio::test]
async fn play_intent_waits_for_readiness() {
    let mut p = Player::new();
    p.store.open(Some("a"));
    p.store.set_play_intent(true);
    p.fire(0, MediaEventKind::Progress);
    assert_eq!(p.script.count(&Cmd::Play), 0);

    p.fire(0, MediaEventKind::CanPlay);
    assert_eq!(p.script.count(&Cmd::Play), 1);

    p.fire(0, MediaEventKind::Playing);
    p.fire(0, MediaEventKind::CanPlayThrough);
    assert_eq!(p.script.count(&Cmd::Play), 1);
    assert!(p.store.current_status().playing);
}

#[tokio::test]
async fn events_from_a_replaced_resource_are_ignored() {
    let mut p = Player::new();
    p.store.open(Some("a"));
    p.script.media(0).lock().unwrap().duration = Some(600.0);
    p.script.fire(0, MediaEventKind::CanPlay);
    p.script.fire(0, MediaEventKind::Progress);

    p.store.open(Some("b"));
    // "a" has no listeners left, nothing new can be queued by it
    p.script.fire(0, MediaEventKind::Playing);
    p.deliver();

    let status = p.store.current_status();
    assert!(!status.can_play);
    assert_eq!(status.duration, None);
    assert_eq!(
        p.script.cmds(),
        vec![
            Cmd::Load("a".to_string()),
            Cmd::Volume(1.0),
            Cmd::Pause,
            Cmd::Release,
            Cmd::Load("b".to_string()),
            Cmd::Volume(1.0),
        ]
    );
}

#[tokio::test]
async fn volume_set_before_ready_survives_to_playback() {
    let mut p = Player::new();
    p.store.open(Some("a"));
    p.store.set_volume(0.25);
    p.script.media(0).lock().unwrap().volume = 1.0;

    p.fire(0, MediaEventKind::CanPlay);
    p.fire(0, MediaEventKind::VolumeChange);
    assert_eq!(p.store.current_status().volume, 0.25);
    assert_eq!(p.script.media(0).lock().unwrap().volume, 0.25);
}

const EVENT_KINDS: [MediaEventKind; 7] = [
    MediaEventKind::Progress,
    MediaEventKind::Seeked,
    MediaEventKind::Seeking,
    MediaEventKind::Playing,
    MediaEventKind::Pause,
    MediaEventKind::VolumeChange,
    MediaEventKind::CanPlay,
];

/// What the resource reports before one event fires.
#[derive(Debug, Clone)]
struct Report {
    kind: usize,
    paused: bool,
    buffered: Vec<BufferedSegment>,
    duration: Option<f64>,
}

fn report() -> impl Strategy<Value = Report> {
    (
        0..EVENT_KINDS.len(),
        any::<bool>(),
        prop::collection::vec(0.01f64..50.0, 0..16),
        prop::option::of(0.0f64..50.0),
    )
        .prop_map(|(kind, paused, steps, tail)| {
            let mut t = 0.0;
            let points: Vec<f64> = steps
                .into_iter()
                .map(|step| {
                    t += step;
                    t
                })
                .collect();
            let buffered: Vec<_> = points
                .chunks_exact(2)
                .map(|p| BufferedSegment::new(p[0], p[1]))
                .collect();
            let end = buffered.last().map_or(0.0, |s| s.end);
            Report {
                kind,
                paused,
                buffered,
                duration: tail.map(|tail| end + tail),
            }
        })
}

proptest! {
    #[test]
    fn status_stays_renderable_across_event_sequences(reports in prop::collection::vec(report(), 1..24)) {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_time()
            .build()
            .unwrap();
        let _guard = rt.enter();

        let mut p = Player::new();
        p.store.open(Some("https://cdn.example/ep.mp3"));
        for report in reports {
            {
                let media = p.script.media(0);
                let mut media = media.lock().unwrap();
                media.paused = report.paused;
                media.buffered = report.buffered.clone();
                media.duration = report.duration;
            }
            p.fire(0, EVENT_KINDS[report.kind]);

            let status = p.store.current_status().clone();
            for pair in status.buffered.windows(2) {
                prop_assert!(pair[0].end < pair[1].start);
            }
            prop_assert!(status.buffered.iter().all(|s| s.start < s.end));

            let spans = p.store.spans();
            for pair in spans.windows(2) {
                prop_assert_ne!(pair[0].kind, pair[1].kind);
            }
            if let Some(duration) = status.duration {
                let total: f64 = spans.iter().map(|s| s.length).sum();
                prop_assert!((total - duration).abs() <= 1e-6 * duration.max(1.0));
                prop_assert!(status.current_time >= 0.0 && status.current_time <= duration);
            }
        }
    }
}
