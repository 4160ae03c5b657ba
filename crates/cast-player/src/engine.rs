//! Binding between the player and one external playback resource.
//!
//! ```text
//!   Binding::Detached ── attach(url) ──▶ Binding::Attached(Attachment { generation, resource, listeners })
//!          ▲                                        │
//!          └──────────── detach() / drop ───────────┘   remove listeners → pause → release
//! ```
//!
//! Every listener registered at attach stamps its events with the attach
//! generation.  The store only applies events whose generation matches the
//! live attachment, so anything a torn-down resource still emits is dropped.

use std::sync::Arc;

use cast_proto::protocol::{BufferedSegment, PlaybackStatus};
use tracing::{debug, info, warn};

/// The nine resource events the binding subscribes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MediaEventKind {
    Pause,
    Play,
    Playing,
    Progress,
    Seeked,
    Seeking,
    VolumeChange,
    CanPlay,
    CanPlayThrough,
}

impl MediaEventKind {
    pub const ALL: [MediaEventKind; 9] = [
        MediaEventKind::Pause,
        MediaEventKind::Play,
        MediaEventKind::Playing,
        MediaEventKind::Progress,
        MediaEventKind::Seeked,
        MediaEventKind::Seeking,
        MediaEventKind::VolumeChange,
        MediaEventKind::CanPlay,
        MediaEventKind::CanPlayThrough,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            MediaEventKind::Pause => "pause",
            MediaEventKind::Play => "play",
            MediaEventKind::Playing => "playing",
            MediaEventKind::Progress => "progress",
            MediaEventKind::Seeked => "seeked",
            MediaEventKind::Seeking => "seeking",
            MediaEventKind::VolumeChange => "volumechange",
            MediaEventKind::CanPlay => "canplay",
            MediaEventKind::CanPlayThrough => "canplaythrough",
        }
    }
}

/// Attach-cycle number.  Strictly increasing for the life of a binding.
pub type Generation = u64;

pub type ListenerId = u64;

/// Callback a resource invokes when one of its events fires.
pub type Listener = Box<dyn Fn(MediaEventKind) + Send + Sync>;

/// A resource event tagged with the attach cycle it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineEvent {
    pub generation: Generation,
    pub kind: MediaEventKind,
}

/// Where stamped events go.  The core forwards them into its event channel.
pub type EventSink = Arc<dyn Fn(EngineEvent) + Send + Sync>;

/// The native playback object bound to one URL.
pub trait MediaResource: Send {
    fn play(&mut self);
    fn pause(&mut self);
    fn seek(&mut self, secs: f64);
    fn set_volume(&mut self, volume: f32);

    fn duration(&self) -> Option<f64>;
    fn paused(&self) -> bool;
    fn current_time(&self) -> f64;
    fn volume(&self) -> f32;
    /// Ascending, non-overlapping.
    fn buffered(&self) -> Vec<BufferedSegment>;

    fn add_listener(&mut self, kind: MediaEventKind, listener: Listener) -> ListenerId;
    fn remove_listener(&mut self, id: ListenerId);

    /// Drop every native handle.  The resource is unusable afterwards.
    fn release(&mut self);
}

pub trait MediaFactory: Send {
    type Resource: MediaResource;

    fn construct(&mut self, url: &str) -> anyhow::Result<Self::Resource>;
}

// ── scoped subscription ───────────────────────────────────────────────────────

/// A live resource together with the listeners registered on it.
///
/// Teardown runs exactly once, either through [`Attachment::teardown`] or on drop.
pub struct Attachment<R: MediaResource> {
    url: String,
    generation: Generation,
    resource: R,
    listeners: Vec<ListenerId>,
    torn_down: bool,
}

impl<R: MediaResource> Attachment<R> {
    fn subscribe(url: String, generation: Generation, mut resource: R, sink: &EventSink) -> Self {
        let mut listeners = Vec::with_capacity(MediaEventKind::ALL.len());
        for kind in MediaEventKind::ALL {
            let sink = Arc::clone(sink);
            let id = resource.add_listener(
                kind,
                Box::new(move |kind| sink(EngineEvent { generation, kind })),
            );
            listeners.push(id);
        }
        Self {
            url,
            generation,
            resource,
            listeners,
            torn_down: false,
        }
    }

    pub fn generation(&self) -> Generation {
        self.generation
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn resource(&self) -> &R {
        &self.resource
    }

    pub fn resource_mut(&mut self) -> &mut R {
        &mut self.resource
    }

    pub fn teardown(&mut self) {
        if self.torn_down {
            return;
        }
        self.torn_down = true;
        for id in self.listeners.drain(..) {
            self.resource.remove_listener(id);
        }
        self.resource.pause();
        self.resource.release();
        debug!(
            "engine: released generation {} ({})",
            self.generation, self.url
        );
    }
}

impl<R: MediaResource> Drop for Attachment<R> {
    fn drop(&mut self) {
        self.teardown();
    }
}

pub enum Binding<R: MediaResource> {
    Detached,
    Attached(Attachment<R>),
}

// ── binding ───────────────────────────────────────────────────────────────────

pub struct MediaEngineBinding<F: MediaFactory> {
    factory: F,
    state: Binding<F::Resource>,
    next_generation: Generation,
    sink: EventSink,
}

impl<F: MediaFactory> MediaEngineBinding<F> {
    pub fn new(factory: F, sink: EventSink) -> Self {
        Self {
            factory,
            state: Binding::Detached,
            next_generation: 1,
            sink,
        }
    }

    /// Tear down whatever is attached, then bind `url`.
    ///
    /// An empty or missing URL, or a resource that cannot be constructed,
    /// leaves the binding detached.  Neither is an error for the caller:
    /// controls simply stay disabled.
    pub fn attach(&mut self, url: Option<&str>, volume: f32) -> Option<Generation> {
        self.detach();

        let url = url.map(str::trim).filter(|u| !u.is_empty())?;

        let mut resource = match self.factory.construct(url) {
            Ok(r) => r,
            Err(e) => {
                warn!("engine: cannot construct resource for '{}': {:#}", url, e);
                return None;
            }
        };
        resource.set_volume(volume);

        let generation = self.next_generation;
        self.next_generation += 1;

        let attachment = Attachment::subscribe(url.to_string(), generation, resource, &self.sink);
        info!("engine: attached generation {} → {}", generation, url);
        self.state = Binding::Attached(attachment);
        Some(generation)
    }

    /// Release the current resource.  Returns the generation that was live, if any.
    pub fn detach(&mut self) -> Option<Generation> {
        match std::mem::replace(&mut self.state, Binding::Detached) {
            Binding::Detached => None,
            Binding::Attached(mut attachment) => {
                attachment.teardown();
                info!(
                    "engine: detached generation {} ({})",
                    attachment.generation(),
                    attachment.url()
                );
                Some(attachment.generation())
            }
        }
    }

    pub fn is_current(&self, generation: Generation) -> bool {
        self.generation() == Some(generation)
    }

    pub fn generation(&self) -> Option<Generation> {
        match &self.state {
            Binding::Attached(a) => Some(a.generation()),
            Binding::Detached => None,
        }
    }

    pub fn url(&self) -> Option<&str> {
        match &self.state {
            Binding::Attached(a) => Some(a.url()),
            Binding::Detached => None,
        }
    }

    pub fn resource(&self) -> Option<&F::Resource> {
        match &self.state {
            Binding::Attached(a) => Some(a.resource()),
            Binding::Detached => None,
        }
    }

    pub fn resource_mut(&mut self) -> Option<&mut F::Resource> {
        match &mut self.state {
            Binding::Attached(a) => Some(a.resource_mut()),
            Binding::Detached => None,
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// Fold one event into `status`, reading the live resource.
    ///
    /// `volumechange` touches only the volume and `canplay` only the readiness
    /// flag; every other event recomputes the playback fields.  Returns false
    /// when nothing is attached.
    pub fn apply_event(&self, status: &mut PlaybackStatus, kind: MediaEventKind) -> bool {
        let Some(resource) = self.resource() else {
            return false;
        };
        match kind {
            MediaEventKind::VolumeChange => {
                status.volume = resource.volume().clamp(0.0, 1.0);
            }
            MediaEventKind::CanPlay => {
                status.can_play = true;
            }
            _ => recompute(status, resource),
        }
        true
    }
}

fn recompute<R: MediaResource>(status: &mut PlaybackStatus, resource: &R) {
    status.playing = !resource.paused();
    status.duration = resource.duration().filter(|d| d.is_finite() && *d >= 0.0);
    status.buffered = resource.buffered();
    status.current_time = status.clamp_time(resource.current_time());
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scriptable in-memory resource for tests.

    use super::*;
    use std::collections::HashMap;
    use std::sync::Mutex;

    #[derive(Debug, Clone, PartialEq)]
    pub enum Call {
        Construct(String),
        Play,
        Pause,
        Seek(f64),
        SetVolume(f32),
        Release,
    }

    #[derive(Default)]
    pub struct FakeState {
        pub paused: bool,
        pub duration: Option<f64>,
        pub current_time: f64,
        pub volume: f32,
        pub buffered: Vec<BufferedSegment>,
        pub released: bool,
        listeners: HashMap<ListenerId, (MediaEventKind, Arc<dyn Fn(MediaEventKind) + Send + Sync>)>,
        next_listener: ListenerId,
    }

    /// Shared view of everything the fake factory built.
    #[derive(Clone, Default)]
    pub struct FakeLog {
        pub calls: Arc<Mutex<Vec<Call>>>,
        pub resources: Arc<Mutex<Vec<Arc<Mutex<FakeState>>>>>,
    }

    impl FakeLog {
        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn count(&self, call: &Call) -> usize {
            self.calls().iter().filter(|c| *c == call).count()
        }

        pub fn clear(&self) {
            self.calls.lock().unwrap().clear();
        }

        pub fn resource(&self, idx: usize) -> Arc<Mutex<FakeState>> {
            Arc::clone(&self.resources.lock().unwrap()[idx])
        }

        /// Fire `kind` on resource `idx`, invoking whatever listeners are still registered.
        pub fn emit(&self, idx: usize, kind: MediaEventKind) {
            let resource = self.resource(idx);
            let listeners: Vec<_> = {
                let state = resource.lock().unwrap();
                let matching = state
                    .listeners
                    .values()
                    .filter(|(k, _)| *k == kind)
                    .map(|(_, l)| Arc::clone(l))
                    .collect();
                matching
            };
            for listener in listeners {
                listener(kind);
            }
        }

        pub fn listener_count(&self, idx: usize) -> usize {
            self.resource(idx).lock().unwrap().listeners.len()
        }
    }

    pub struct FakeResource {
        state: Arc<Mutex<FakeState>>,
        log: FakeLog,
    }

    impl FakeResource {
        fn record(&self, call: Call) {
            self.log.calls.lock().unwrap().push(call);
        }
    }

    impl MediaResource for FakeResource {
        fn play(&mut self) {
            self.record(Call::Play);
            self.state.lock().unwrap().paused = false;
        }

        fn pause(&mut self) {
            self.record(Call::Pause);
            self.state.lock().unwrap().paused = true;
        }

        fn seek(&mut self, secs: f64) {
            self.record(Call::Seek(secs));
            self.state.lock().unwrap().current_time = secs;
        }

        fn set_volume(&mut self, volume: f32) {
            self.record(Call::SetVolume(volume));
            self.state.lock().unwrap().volume = volume;
        }

        fn duration(&self) -> Option<f64> {
            self.state.lock().unwrap().duration
        }

        fn paused(&self) -> bool {
            self.state.lock().unwrap().paused
        }

        fn current_time(&self) -> f64 {
            self.state.lock().unwrap().current_time
        }

        fn volume(&self) -> f32 {
            self.state.lock().unwrap().volume
        }

        fn buffered(&self) -> Vec<BufferedSegment> {
            self.state.lock().unwrap().buffered.clone()
        }

        fn add_listener(&mut self, kind: MediaEventKind, listener: Listener) -> ListenerId {
            let mut state = self.state.lock().unwrap();
            state.next_listener += 1;
            let id = state.next_listener;
            state.listeners.insert(id, (kind, Arc::from(listener)));
            id
        }

        fn remove_listener(&mut self, id: ListenerId) {
            self.state.lock().unwrap().listeners.remove(&id);
        }

        fn release(&mut self) {
            self.record(Call::Release);
            self.state.lock().unwrap().released = true;
        }
    }

    #[derive(Clone, Default)]
    pub struct FakeFactory {
        pub log: FakeLog,
        /// URLs whose construction fails.
        pub broken: Vec<String>,
    }

    impl MediaFactory for FakeFactory {
        type Resource = FakeResource;

        fn construct(&mut self, url: &str) -> anyhow::Result<FakeResource> {
            if self.broken.iter().any(|b| b == url) {
                anyhow::bail!("unsupported media: {}", url);
            }
            self.log.calls.lock().unwrap().push(Call::Construct(url.to_string()));
            let state = Arc::new(Mutex::new(FakeState {
                paused: true,
                volume: 1.0,
                ..FakeState::default()
            }));
            self.log.resources.lock().unwrap().push(Arc::clone(&state));
            Ok(FakeResource {
                state,
                log: self.log.clone(),
            })
        }
    }

    /// Sink that collects stamped events for the test to feed back by hand.
    pub fn collecting_sink() -> (EventSink, Arc<Mutex<Vec<EngineEvent>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let captured = Arc::clone(&events);
        let sink: EventSink = Arc::new(move |evt| captured.lock().unwrap().push(evt));
        (sink, events)
    }
}
