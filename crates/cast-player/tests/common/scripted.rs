#![allow(dead_code)]

//! Media double driven from the test body: records every command and lets
//! the test fire resource events and set the values the resource reports.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use cast_player::engine::{
    EngineEvent, EventSink, Listener, ListenerId, MediaEventKind, MediaFactory, MediaResource,
};
use cast_proto::protocol::BufferedSegment;

#[derive(Debug, Clone, PartialEq)]
pub enum Cmd {
    Load(String),
    Play,
    Pause,
    Seek(f64),
    Volume(f32),
    Release,
}

pub struct Media {
    pub paused: bool,
    pub duration: Option<f64>,
    pub current_time: f64,
    pub volume: f32,
    pub buffered: Vec<BufferedSegment>,
    listeners: HashMap<ListenerId, (MediaEventKind, Arc<dyn Fn(MediaEventKind) + Send + Sync>)>,
}

#[derive(Clone, Default)]
pub struct Script {
    pub cmds: Arc<Mutex<Vec<Cmd>>>,
    pub media: Arc<Mutex<Vec<Arc<Mutex<Media>>>>>,
    next_listener: Arc<Mutex<ListenerId>>,
}

impl Script {
    pub fn cmds(&self) -> Vec<Cmd> {
        self.cmds.lock().unwrap().clone()
    }

    pub fn count(&self, cmd: &Cmd) -> usize {
        self.cmds().iter().filter(|c| *c == cmd).count()
    }

    pub fn media(&self, idx: usize) -> Arc<Mutex<Media>> {
        Arc::clone(&self.media.lock().unwrap()[idx])
    }

    pub fn fire(&self, idx: usize, kind: MediaEventKind) {
        let media = self.media(idx);
        let listeners: Vec<_> = {
            let guard = media.lock().unwrap();
            let matching = guard
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
}

pub struct ScriptedResource {
    media: Arc<Mutex<Media>>,
    script: Script,
}

impl ScriptedResource {
    fn log(&self, cmd: Cmd) {
        self.script.cmds.lock().unwrap().push(cmd);
    }
}

impl MediaResource for ScriptedResource {
    fn play(&mut self) {
        self.log(Cmd::Play);
        self.media.lock().unwrap().paused = false;
    }

    fn pause(&mut self) {
        self.log(Cmd::Pause);
        self.media.lock().unwrap().paused = true;
    }

    fn seek(&mut self, secs: f64) {
        self.log(Cmd::Seek(secs));
        self.media.lock().unwrap().current_time = secs;
    }

    fn set_volume(&mut self, volume: f32) {
        self.log(Cmd::Volume(volume));
        self.media.lock().unwrap().volume = volume;
    }

    fn duration(&self) -> Option<f64> {
        self.media.lock().unwrap().duration
    }

    fn paused(&self) -> bool {
        self.media.lock().unwrap().paused
    }

    fn current_time(&self) -> f64 {
        self.media.lock().unwrap().current_time
    }

    fn volume(&self) -> f32 {
        self.media.lock().unwrap().volume
    }

    fn buffered(&self) -> Vec<BufferedSegment> {
        self.media.lock().unwrap().buffered.clone()
    }

    fn add_listener(&mut self, kind: MediaEventKind, listener: Listener) -> ListenerId {
        let id = {
            let mut next = self.script.next_listener.lock().unwrap();
            *next += 1;
            *next
        };
        self.media
            .lock()
            .unwrap()
            .listeners
            .insert(id, (kind, Arc::from(listener)));
        id
    }

    fn remove_listener(&mut self, id: ListenerId) {
        self.media.lock().unwrap().listeners.remove(&id);
    }

    fn release(&mut self) {
        self.log(Cmd::Release);
    }
}

#[derive(Clone, Default)]
pub struct ScriptedFactory {
    pub script: Script,
}

impl MediaFactory for ScriptedFactory {
    type Resource = ScriptedResource;

    fn construct(&mut self, url: &str) -> anyhow::Result<ScriptedResource> {
        self.script.cmds.lock().unwrap().push(Cmd::Load(url.to_string()));
        let media = Arc::new(Mutex::new(Media {
            paused: true,
            duration: None,
            current_time: 0.0,
            volume: 1.0,
            buffered: Vec::new(),
            listeners: HashMap::new(),
        }));
        self.script.media.lock().unwrap().push(Arc::clone(&media));
        Ok(ScriptedResource {
            media,
            script: self.script.clone(),
        })
    }
}

/// Sink that queues stamped events until the test delivers them.
pub fn queue_sink() -> (EventSink, Arc<Mutex<Vec<EngineEvent>>>) {
    let queue = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&queue);
    let sink: EventSink = Arc::new(move |evt| captured.lock().unwrap().push(evt));
    (sink, queue)
}
