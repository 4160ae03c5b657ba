/// mpv-backed playback resources over JSON IPC.
///
/// ```text
///   MpvFactory::connect()
///         │
///         ├── writer_task      ← MpvRequest via mpsc, serialised → socket
///         ├── reader_task      ← JSON lines from socket
///         │                         ├── response (has request_id) → matched oneshot::Sender
///         │                         └── event / property-change   → dispatch_task
///         ├── forward_task     ← resource commands, sent one at a time in order
///         └── dispatch_task    → updates the property cache, fires resource listeners
/// ```
///
/// One mpv process backs every resource the factory builds.  Only the most
/// recently constructed resource owns it; a released resource stops playback
/// and its listeners are gone before the next `loadfile` goes out.  Events
/// are withheld from a new resource until mpv reports `start-file` for the
/// playlist entry its `loadfile` created, so the old file's tail is never
/// attributed to it.
///
/// Platform notes:
/// - Unix:   Unix domain sockets
/// - Windows: Named pipes  \\.\pipe\<name>
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, oneshot, Mutex, Notify};
use tracing::{debug, info, warn};

use cast_proto::config::MpvConfig;
use cast_proto::protocol::BufferedSegment;

use crate::engine::{Listener, ListenerId, MediaEventKind, MediaFactory, MediaResource};

#[cfg(unix)]
use tokio::net::UnixStream;

#[cfg(windows)]
use tokio::net::windows::named_pipe::ClientOptions;

// ── global request-id counter ─────────────────────────────────────────────────

static NEXT_REQ_ID: AtomicU64 = AtomicU64::new(1);

// ── observation property IDs ──────────────────────────────────────────────────

pub const OBS_CORE_IDLE: u64 = 1;
pub const OBS_PAUSE: u64 = 2;
pub const OBS_TIME_POS: u64 = 3;
pub const OBS_DURATION: u64 = 4;
pub const OBS_VOLUME: u64 = 5;
pub const OBS_CACHE_STATE: u64 = 6;

const OBSERVED: [(u64, &str); 6] = [
    (OBS_CORE_IDLE, "core-idle"),
    (OBS_PAUSE, "pause"),
    (OBS_TIME_POS, "time-pos"),
    (OBS_DURATION, "duration"),
    (OBS_VOLUME, "volume"),
    (OBS_CACHE_STATE, "demuxer-cache-state"),
];

type PendingMap = Arc<Mutex<HashMap<u64, oneshot::Sender<anyhow::Result<Value>>>>>;

// ── internal channel types ────────────────────────────────────────────────────

struct PendingRequest {
    req_id: u64,
    payload: String, // serialised JSON line, '\n' included
    reply: oneshot::Sender<anyhow::Result<Value>>,
}

/// An mpv event / property-change that arrived unsolicited (no request_id).
#[derive(Debug, Clone)]
pub struct MpvEvent {
    pub raw: Value,
}

impl MpvEvent {
    /// Returns `Some((obs_id, data))` if this is a property-change event.
    pub fn as_property_change(&self) -> Option<(u64, &Value)> {
        if self.raw.get("event")?.as_str()? == "property-change" {
            let id = self.raw.get("id")?.as_u64()?;
            let data = self.raw.get("data").unwrap_or(&Value::Null);
            Some((id, data))
        } else {
            None
        }
    }

    /// Returns the event name, e.g. "seek", "playback-restart", "file-loaded".
    pub fn event_name(&self) -> Option<&str> {
        self.raw.get("event")?.as_str()
    }

    /// Playlist entry id of a `start-file` event (0 when mpv omits it).
    pub fn started_entry(&self) -> Option<u64> {
        if self.event_name()? != "start-file" {
            return None;
        }
        Some(
            self.raw
                .get("playlist_entry_id")
                .and_then(Value::as_u64)
                .unwrap_or(0),
        )
    }
}

// ── public handle ─────────────────────────────────────────────────────────────

/// Cloneable handle to the mpv writer task.
#[derive(Clone)]
pub struct MpvHandle {
    tx: mpsc::Sender<PendingRequest>,
}

impl MpvHandle {
    pub async fn send(&self, command: Value) -> anyhow::Result<Value> {
        let req_id = NEXT_REQ_ID.fetch_add(1, Ordering::Relaxed);
        let msg = json!({ "command": command, "request_id": req_id });
        let mut raw = serde_json::to_string(&msg)?;
        raw.push('\n');

        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(PendingRequest {
                req_id,
                payload: raw,
                reply: reply_tx,
            })
            .await
            .map_err(|_| anyhow::anyhow!("mpv writer task gone"))?;

        tokio::time::timeout(tokio::time::Duration::from_secs(5), reply_rx)
            .await
            .map_err(|_| anyhow::anyhow!("mpv IPC timeout for req={}", req_id))?
            .map_err(|_| anyhow::anyhow!("mpv reply channel dropped req={}", req_id))?
    }

    /// Register observe_property for everything the resources report.
    pub async fn observe_all_properties(&self) {
        for (id, name) in &OBSERVED {
            match self.send(json!(["observe_property", id, name])).await {
                Ok(_) => debug!("mpv: observe_property id={} name={}", id, name),
                Err(e) => warn!("mpv: observe_property {} failed: {}", name, e),
            }
        }
    }
}

// ── process ───────────────────────────────────────────────────────────────────

/// Owns the mpv child process.  The process is killed when the driver drops.
pub struct MpvDriver {
    pub socket_name: String,
    process: Option<tokio::process::Child>,
}

impl MpvDriver {
    pub fn new() -> Self {
        Self {
            socket_name: cast_proto::platform::mpv_socket_name(),
            process: None,
        }
    }

    fn command(&self, config: &MpvConfig, volume: f32) -> anyhow::Result<tokio::process::Command> {
        let mpv_binary = cast_proto::platform::find_mpv_binary()
            .ok_or_else(|| anyhow::anyhow!("mpv binary not found"))?;

        let mut cmd = tokio::process::Command::new(&mpv_binary);
        cmd.arg("--no-video")
            .arg("--idle=yes")
            .arg("--cache=yes")
            .arg(cast_proto::platform::mpv_socket_arg())
            .arg("--quiet")
            .arg(format!(
                "--volume={}",
                (volume * 100.0).clamp(0.0, 100.0).round() as i64
            ))
            .args(&config.extra_args)
            .stdout(std::process::Stdio::null())
            .kill_on_drop(true);
        Ok(cmd)
    }

    #[cfg(unix)]
    pub async fn spawn_and_connect(
        &mut self,
        config: &MpvConfig,
        event_tx: mpsc::Sender<MpvEvent>,
        volume: f32,
    ) -> anyhow::Result<MpvHandle> {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }

        let socket_path = std::path::PathBuf::from(&self.socket_name);
        let _ = tokio::fs::remove_file(&socket_path).await;

        info!("mpv: spawning new process");
        let data_dir = cast_proto::platform::data_dir();
        std::fs::create_dir_all(&data_dir)?;
        let stderr_path = data_dir.join("mpv-stderr.log");
        let stderr_file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&stderr_path)?;
        info!("mpv: logging stderr to {:?}", stderr_path);

        let child = self.command(config, volume)?.stderr(stderr_file).spawn()?;
        info!("mpv: spawned process with pid {:?}", child.id());
        self.process = Some(child);

        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if socket_path.exists() {
                break;
            }
        }
        if !socket_path.exists() {
            anyhow::bail!("mpv IPC socket did not appear");
        }
        tokio::time::sleep(tokio::time::Duration::from_millis(200)).await;

        let stream = UnixStream::connect(&socket_path).await?;
        info!("mpv: connected to IPC socket");
        let (read_half, write_half) = stream.into_split();
        Ok(start_io_tasks(read_half, write_half, event_tx))
    }

    #[cfg(windows)]
    pub async fn spawn_and_connect(
        &mut self,
        config: &MpvConfig,
        event_tx: mpsc::Sender<MpvEvent>,
        volume: f32,
    ) -> anyhow::Result<MpvHandle> {
        if let Some(mut p) = self.process.take() {
            let _ = p.kill().await;
        }

        info!("mpv: spawning new process");
        let child = self
            .command(config, volume)?
            .stderr(std::process::Stdio::null())
            .spawn()?;
        self.process = Some(child);

        let pipe_path = format!(r"\\.\pipe\{}", self.socket_name);
        for _ in 0..50 {
            tokio::time::sleep(tokio::time::Duration::from_millis(100)).await;
            if let Ok(client) = ClientOptions::new().open(&pipe_path) {
                info!("mpv: connected to named pipe");
                let (read_half, write_half) = tokio::io::split(client);
                return Ok(start_io_tasks(read_half, write_half, event_tx));
            }
        }
        anyhow::bail!("mpv named pipe did not appear")
    }
}

impl Default for MpvDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn start_io_tasks<R, W>(read_half: R, write_half: W, event_tx: mpsc::Sender<MpvEvent>) -> MpvHandle
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
    W: tokio::io::AsyncWrite + Unpin + Send + 'static,
{
    // req_id → reply channel.  The writer inserts, the reader resolves.
    let pending: PendingMap = Arc::new(Mutex::new(HashMap::new()));
    let (cmd_tx, cmd_rx) = mpsc::channel::<PendingRequest>(64);

    tokio::spawn(writer_task(write_half, cmd_rx, pending.clone()));
    tokio::spawn(reader_task(BufReader::new(read_half), pending, event_tx));

    MpvHandle { tx: cmd_tx }
}

// ── reader task ───────────────────────────────────────────────────────────────

async fn reader_task<R>(mut reader: BufReader<R>, pending: PendingMap, event_tx: mpsc::Sender<MpvEvent>)
where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                debug!("mpv reader: connection closed");
                let mut map = pending.lock().await;
                for (_, tx) in map.drain() {
                    let _ = tx.send(Err(anyhow::anyhow!("mpv IPC connection closed")));
                }
                break;
            }
            Ok(_) => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                let val: Value = match serde_json::from_str(trimmed) {
                    Ok(v) => v,
                    Err(e) => {
                        debug!("mpv reader: invalid json '{}': {}", trimmed, e);
                        continue;
                    }
                };

                if let Some(req_id) = val.get("request_id").and_then(|v| v.as_u64()) {
                    let mut map = pending.lock().await;
                    if let Some(tx) = map.remove(&req_id) {
                        let result = if val["error"].as_str() == Some("success") {
                            Ok(val)
                        } else {
                            let err = val["error"].as_str().unwrap_or("unknown error").to_string();
                            debug!("mpv reader: response req={} err={}", req_id, err);
                            Err(anyhow::anyhow!("mpv error: {}", err))
                        };
                        let _ = tx.send(result);
                    } else {
                        debug!("mpv reader: response for unknown req={}", req_id);
                    }
                } else if event_tx.send(MpvEvent { raw: val }).await.is_err() {
                    debug!("mpv reader: event receiver gone");
                }
            }
            Err(e) => {
                warn!("mpv reader: read error: {}", e);
                let mut map = pending.lock().await;
                for (_, tx) in map.drain() {
                    let _ = tx.send(Err(anyhow::anyhow!("mpv IPC read error: {}", e)));
                }
                break;
            }
        }
    }
}

// ── writer task ───────────────────────────────────────────────────────────────

async fn writer_task<W>(mut writer: W, mut rx: mpsc::Receiver<PendingRequest>, pending: PendingMap)
where
    W: tokio::io::AsyncWrite + Unpin,
{
    while let Some(req) = rx.recv().await {
        // Registered before writing so the reader can always match the reply
        pending.lock().await.insert(req.req_id, req.reply);
        debug!("mpv writer: send req={} payload={}", req.req_id, req.payload.trim());
        if let Err(e) = writer.write_all(req.payload.as_bytes()).await {
            warn!("mpv writer: write error: {}", e);
            if let Some(tx) = pending.lock().await.remove(&req.req_id) {
                let _ = tx.send(Err(anyhow::anyhow!("mpv write error: {}", e)));
            }
            break;
        }
    }
    debug!("mpv writer: task exiting");
}

// ── property cache ────────────────────────────────────────────────────────────

/// Last values mpv pushed for the observed properties.
#[derive(Debug, Clone, PartialEq)]
pub struct MpvProps {
    pub paused: bool,
    pub duration: Option<f64>,
    pub time_pos: f64,
    pub volume: f32,
    pub buffered: Vec<BufferedSegment>,
    /// The demuxer cache has reached the end of the file.
    pub cache_eof: bool,
}

impl MpvProps {
    fn fresh(volume: f32) -> Self {
        Self {
            paused: true,
            duration: None,
            time_pos: 0.0,
            volume,
            buffered: Vec::new(),
            cache_eof: false,
        }
    }
}

/// Fold one mpv event into `props` and name the resource events it amounts to.
pub fn translate(props: &mut MpvProps, event: &MpvEvent) -> Vec<MediaEventKind> {
    if let Some((id, data)) = event.as_property_change() {
        return match id {
            OBS_PAUSE => {
                props.paused = data.as_bool().unwrap_or(props.paused);
                vec![if props.paused {
                    MediaEventKind::Pause
                } else {
                    MediaEventKind::Play
                }]
            }
            OBS_CORE_IDLE => match data.as_bool() {
                Some(false) if !props.paused => vec![MediaEventKind::Playing],
                _ => Vec::new(),
            },
            OBS_TIME_POS => {
                props.time_pos = data.as_f64().unwrap_or(0.0);
                Vec::new()
            }
            OBS_DURATION => {
                props.duration = data.as_f64();
                vec![MediaEventKind::Progress]
            }
            OBS_VOLUME => match data.as_f64() {
                Some(pct) => {
                    props.volume = (pct / 100.0).clamp(0.0, 1.0) as f32;
                    vec![MediaEventKind::VolumeChange]
                }
                None => Vec::new(),
            },
            OBS_CACHE_STATE => {
                props.buffered = seekable_ranges(data);
                let mut kinds = vec![MediaEventKind::Progress];
                if data.get("eof").and_then(Value::as_bool) == Some(true) && !props.cache_eof {
                    props.cache_eof = true;
                    kinds.push(MediaEventKind::CanPlayThrough);
                }
                kinds
            }
            _ => Vec::new(),
        };
    }

    match event.event_name() {
        Some("seek") => vec![MediaEventKind::Seeking],
        Some("playback-restart") => vec![MediaEventKind::Seeked],
        Some("file-loaded") => vec![MediaEventKind::CanPlay],
        _ => Vec::new(),
    }
}

/// `demuxer-cache-state.seekable-ranges`, sorted and with overlaps merged.
pub fn seekable_ranges(cache_state: &Value) -> Vec<BufferedSegment> {
    let mut ranges: Vec<BufferedSegment> = cache_state
        .get("seekable-ranges")
        .and_then(Value::as_array)
        .map(|arr| {
            arr.iter()
                .filter_map(|r| {
                    let start = r.get("start")?.as_f64()?;
                    let end = r.get("end")?.as_f64()?;
                    (end > start).then(|| BufferedSegment::new(start, end))
                })
                .collect()
        })
        .unwrap_or_default();

    ranges.sort_by(|a, b| a.start.total_cmp(&b.start));
    let mut merged: Vec<BufferedSegment> = Vec::with_capacity(ranges.len());
    for range in ranges {
        match merged.last_mut() {
            Some(last) if range.start <= last.end => last.end = last.end.max(range.end),
            _ => merged.push(range),
        }
    }
    merged
}

// ── resources ─────────────────────────────────────────────────────────────────

type SharedListener = Arc<dyn Fn(MediaEventKind) + Send + Sync>;

/// Entry id mpv assigned to the active resource's `loadfile`.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Expected {
    /// The reply has not come back yet.
    Unknown,
    Entry(u64),
    /// mpv did not report an entry id; the next file to start is ours.
    AnyEntry,
}

/// Whether the event stream belongs to the active resource yet.
///
/// Until mpv starts the entry our `loadfile` created, the stream still
/// carries the previous file's tail.  Events after the newest `start-file`
/// are held so they can be released in order once the entry id is known.
#[derive(Debug)]
enum Gate {
    Live,
    Loading {
        expected: Expected,
        started: Option<u64>,
        held: Vec<MpvEvent>,
    },
}

impl Gate {
    fn loading() -> Self {
        Gate::Loading {
            expected: Expected::Unknown,
            started: None,
            held: Vec::new(),
        }
    }
}

struct Shared {
    props: MpvProps,
    /// Resource that currently owns the player.
    active: Option<u64>,
    gate: Gate,
    listeners: HashMap<ListenerId, (u64, MediaEventKind, SharedListener)>,
    next_listener: ListenerId,
}

fn lock(shared: &StdMutex<Shared>) -> MutexGuard<'_, Shared> {
    shared.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Player-wide properties survive a file switch, so they are tracked even
/// while the new file is loading.
fn is_player_wide(event: &MpvEvent) -> bool {
    matches!(event.as_property_change(), Some((OBS_VOLUME | OBS_PAUSE, _)))
}

/// Pass `event` through the gate, returning what the active resource may see.
/// `None` only re-checks the gate after the expected entry id changed.
fn admit(shared: &mut Shared, event: Option<MpvEvent>) -> Vec<MpvEvent> {
    let mut passed = release_if_started(shared);
    let Some(event) = event else {
        return passed;
    };

    match &mut shared.gate {
        Gate::Live => passed.push(event),
        Gate::Loading { started, held, .. } => {
            if let Some(entry) = event.started_entry() {
                *started = Some(entry);
                held.clear();
            } else if started.is_some() {
                held.push(event);
            } else if is_player_wide(&event) {
                let kinds = translate(&mut shared.props, &event);
                if kinds.contains(&MediaEventKind::VolumeChange) {
                    passed.push(event);
                }
            } else {
                debug!("mpv gate: dropping {:?} from the previous file", event.event_name());
            }
            passed.extend(release_if_started(shared));
        }
    }
    passed
}

fn release_if_started(shared: &mut Shared) -> Vec<MpvEvent> {
    let Gate::Loading {
        expected,
        started,
        held,
    } = &mut shared.gate
    else {
        return Vec::new();
    };
    let ready = match *expected {
        Expected::Unknown => false,
        Expected::Entry(id) => *started == Some(id),
        Expected::AnyEntry => true,
    };
    if !ready {
        return Vec::new();
    }
    let held = std::mem::take(held);
    shared.gate = Gate::Live;
    debug!("mpv gate: new file started, {} held event(s) released", held.len());
    held
}

async fn dispatch_task(
    mut events: mpsc::Receiver<MpvEvent>,
    shared: Arc<StdMutex<Shared>>,
    wake: Arc<Notify>,
) {
    loop {
        let event = tokio::select! {
            event = events.recv() => match event {
                Some(event) => Some(event),
                None => break,
            },
            _ = wake.notified() => None,
        };

        let fire: Vec<(MediaEventKind, SharedListener)> = {
            let mut guard = lock(&shared);
            let state = &mut *guard;
            let Some(active) = state.active else {
                continue;
            };
            let mut fire = Vec::new();
            for event in admit(state, event) {
                // Player-wide changes seen while loading were folded already
                let kinds = if matches!(state.gate, Gate::Loading { .. }) {
                    vec![MediaEventKind::VolumeChange]
                } else {
                    translate(&mut state.props, &event)
                };
                for kind in kinds {
                    for (owner, k, listener) in state.listeners.values() {
                        if *owner == active && *k == kind {
                            fire.push((kind, Arc::clone(listener)));
                        }
                    }
                }
            }
            fire
        };
        // Listeners run outside the lock
        for (kind, listener) in fire {
            listener(kind);
        }
    }
    debug!("mpv dispatch: event stream ended");
}

/// A command on behalf of one resource.
struct Outbound {
    owner: u64,
    command: Value,
}

async fn forward_task(
    handle: MpvHandle,
    mut commands: mpsc::UnboundedReceiver<Outbound>,
    shared: Arc<StdMutex<Shared>>,
    wake: Arc<Notify>,
) {
    while let Some(Outbound { owner, command }) = commands.recv().await {
        let is_load = command.get(0).and_then(Value::as_str) == Some("loadfile");
        match handle.send(command.clone()).await {
            Ok(reply) if is_load => {
                let expected = match reply
                    .get("data")
                    .and_then(|d| d.get("playlist_entry_id"))
                    .and_then(Value::as_u64)
                {
                    Some(id) => Expected::Entry(id),
                    None => Expected::AnyEntry,
                };
                let mut state = lock(&shared);
                if state.active == Some(owner) {
                    if let Gate::Loading { expected: slot, .. } = &mut state.gate {
                        *slot = expected;
                    }
                }
                drop(state);
                wake.notify_one();
            }
            Ok(_) => {}
            Err(e) => warn!("mpv: command {} failed: {:#}", command, e),
        }
    }
    debug!("mpv forward: task exiting");
}

/// Builds [`MpvResource`]s on top of one running mpv process.
pub struct MpvFactory {
    _driver: MpvDriver,
    shared: Arc<StdMutex<Shared>>,
    commands: mpsc::UnboundedSender<Outbound>,
    next_id: u64,
}

impl MpvFactory {
    /// Spawn mpv and wire up the IPC tasks.
    pub async fn connect(config: &MpvConfig, volume: f32) -> anyhow::Result<Self> {
        let mut driver = MpvDriver::new();
        let (event_tx, event_rx) = mpsc::channel::<MpvEvent>(256);
        let handle = driver.spawn_and_connect(config, event_tx, volume).await?;
        handle.observe_all_properties().await;
        Ok(Self::from_handle(driver, handle, event_rx, volume))
    }

    fn from_handle(
        driver: MpvDriver,
        handle: MpvHandle,
        event_rx: mpsc::Receiver<MpvEvent>,
        volume: f32,
    ) -> Self {
        let shared = Arc::new(StdMutex::new(Shared {
            props: MpvProps::fresh(volume),
            active: None,
            gate: Gate::Live,
            listeners: HashMap::new(),
            next_listener: 0,
        }));
        let wake = Arc::new(Notify::new());
        let (commands, command_rx) = mpsc::unbounded_channel();
        tokio::spawn(dispatch_task(event_rx, Arc::clone(&shared), Arc::clone(&wake)));
        tokio::spawn(forward_task(handle, command_rx, Arc::clone(&shared), wake));

        Self {
            _driver: driver,
            shared,
            commands,
            next_id: 1,
        }
    }
}

impl MediaFactory for MpvFactory {
    type Resource = MpvResource;

    fn construct(&mut self, url: &str) -> anyhow::Result<MpvResource> {
        if self.commands.is_closed() {
            anyhow::bail!("mpv is not running");
        }
        let id = self.next_id;
        self.next_id += 1;
        {
            let mut state = lock(&self.shared);
            state.active = Some(id);
            state.gate = Gate::loading();
            state.props = MpvProps::fresh(state.props.volume);
        }

        let resource = MpvResource {
            id,
            shared: Arc::clone(&self.shared),
            commands: self.commands.clone(),
        };
        // Loaded paused; the store decides when to play
        resource.command(json!(["set_property", "pause", true]));
        resource.command(json!(["loadfile", url, "replace"]));
        info!("mpv: resource {} loading {}", id, url);
        Ok(resource)
    }
}

pub struct MpvResource {
    id: u64,
    shared: Arc<StdMutex<Shared>>,
    commands: mpsc::UnboundedSender<Outbound>,
}

impl MpvResource {
    fn command(&self, command: Value) {
        let outbound = Outbound {
            owner: self.id,
            command,
        };
        if self.commands.send(outbound).is_err() {
            warn!("mpv: command channel closed, resource {} is inert", self.id);
        }
    }

    fn owns_player(&self) -> bool {
        lock(&self.shared).active == Some(self.id)
    }

    fn props(&self) -> MpvProps {
        lock(&self.shared).props.clone()
    }
}

impl MediaResource for MpvResource {
    fn play(&mut self) {
        if self.owns_player() {
            self.command(json!(["set_property", "pause", false]));
        }
    }

    fn pause(&mut self) {
        if self.owns_player() {
            self.command(json!(["set_property", "pause", true]));
        }
    }

    fn seek(&mut self, secs: f64) {
        if self.owns_player() {
            self.command(json!(["seek", secs, "absolute"]));
        }
    }

    fn set_volume(&mut self, volume: f32) {
        if self.owns_player() {
            self.command(json!(["set_property", "volume", (volume * 100.0).clamp(0.0, 100.0)]));
        }
    }

    fn duration(&self) -> Option<f64> {
        self.props().duration
    }

    fn paused(&self) -> bool {
        self.props().paused
    }

    fn current_time(&self) -> f64 {
        self.props().time_pos
    }

    fn volume(&self) -> f32 {
        self.props().volume
    }

    fn buffered(&self) -> Vec<BufferedSegment> {
        self.props().buffered
    }

    fn add_listener(&mut self, kind: MediaEventKind, listener: Listener) -> ListenerId {
        let mut state = lock(&self.shared);
        state.next_listener += 1;
        let id = state.next_listener;
        state.listeners.insert(id, (self.id, kind, Arc::from(listener)));
        id
    }

    fn remove_listener(&mut self, id: ListenerId) {
        lock(&self.shared).listeners.remove(&id);
    }

    fn release(&mut self) {
        let owned = {
            let mut state = lock(&self.shared);
            let me = self.id;
            state.listeners.retain(|_, (owner, _, _)| *owner != me);
            if state.active == Some(me) {
                state.active = None;
                true
            } else {
                false
            }
        };
        if owned {
            self.command(json!(["stop"]));
            debug!("mpv: resource {} released", self.id);
        }
    }
}
