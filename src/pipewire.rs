//! `PipeWire` session backend
//!
//! Implements [`Session`] with `PipeWire` native tools:
//! - `pw-metadata --monitor`: the `default` metadata object, which names the
//!   current default sink and source (default-nodes component)
//! - `pw-dump --monitor`: node objects with their `Props` (volume, mute) and
//!   properties (names, media class) (mixer component)
//!
//! Monitor output is read on helper threads and forwarded as [`PwMessage`]s
//! over an unbounded channel. The event loop hands each message back to
//! [`PwSession::absorb`], which updates the object cache and translates it into
//! [`SessionEvent`]s. All cache access happens on the event loop thread.

use std::collections::{HashMap, HashSet};
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::OnceLock;

use regex::Regex;
use serde::Deserialize;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::session::{
    Component, DeviceId, DeviceQuery, DeviceRole, DeviceState, NO_DEVICE, Session, SessionError,
    SessionEvent, VolumeScale,
};

// ============================================================================
// Constants
// ============================================================================

const NODE_TYPE: &str = "PipeWire:Interface:Node";

/// Socket name used when `PIPEWIRE_REMOTE` is not set
const DEFAULT_REMOTE: &str = "pipewire-0";

/// Metadata subject for global (not per-object) keys
const GLOBAL_SUBJECT: u32 = 0;

// ============================================================================
// PipeWire JSON Structures (from pw-dump)
// ============================================================================

/// Object from `pw-dump` output
///
/// In monitor mode a removed object is reported as `{"id": N, "info": null}`.
#[derive(Debug, Deserialize)]
pub struct PwObject {
    pub id: u32,
    #[serde(rename = "type", default)]
    pub obj_type: Option<String>,
    #[serde(default)]
    pub info: Option<PwInfo>,
}

impl PwObject {
    #[must_use]
    pub fn is_removal(&self) -> bool {
        self.obj_type.is_none() && self.info.is_none()
    }
}

#[derive(Debug, Deserialize)]
pub struct PwInfo {
    #[serde(default)]
    pub props: Option<PwProps>,
    #[serde(default)]
    pub params: Option<PwParams>,
}

/// Node properties - uses permissive deserialization
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PwProps {
    #[serde(rename = "node.name")]
    pub node_name: Option<String>,
    #[serde(rename = "node.description")]
    pub node_description: Option<String>,
    #[serde(rename = "node.nick")]
    pub node_nick: Option<String>,
    #[serde(rename = "media.class")]
    pub media_class: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PwParams {
    #[serde(rename = "Props")]
    pub props: Option<Vec<PwPropsParam>>,
}

/// One entry of a node's `Props` param
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct PwPropsParam {
    pub volume: Option<f64>,
    pub mute: Option<bool>,
    #[serde(rename = "channelVolumes")]
    pub channel_volumes: Option<Vec<f64>>,
}

/// Linear volume and mute flag from a node's `Props`
///
/// Uses the mean of the channel volumes, falling back to the node volume.
#[allow(clippy::cast_precision_loss)]
fn mixer_state(params: &[PwPropsParam]) -> Option<(f64, bool)> {
    params.iter().find_map(|param| {
        let linear = match &param.channel_volumes {
            Some(channels) if !channels.is_empty() => {
                channels.iter().sum::<f64>() / channels.len() as f64
            }
            _ => param.volume?,
        };
        Some((linear, param.mute.unwrap_or(false)))
    })
}

// ============================================================================
// Default Metadata (from pw-metadata --monitor)
// ============================================================================

/// One `update:` line from `pw-metadata --monitor`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataUpdate {
    pub subject: u32,
    /// `None` when the whole subject was cleared
    pub key: Option<String>,
    /// `None` when the key was removed
    pub value: Option<String>,
}

fn metadata_line_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^update: id:(\d+) key:'(.*?)' value:'(.*)' type:'(.*?)'$")
            .expect("metadata line regex is valid")
    })
}

fn non_null(s: &str) -> Option<String> {
    (s != "(null)" && !s.is_empty()).then(|| s.to_string())
}

/// Parse a `pw-metadata` monitor line, ignoring anything that is not an update
#[must_use]
pub fn parse_metadata_line(line: &str) -> Option<MetadataUpdate> {
    let caps = metadata_line_regex().captures(line.trim_end())?;
    Some(MetadataUpdate {
        subject: caps[1].parse().ok()?,
        key: non_null(&caps[2]),
        value: non_null(&caps[3]),
    })
}

/// Extract the node name from a default metadata value (handles multiple formats)
#[must_use]
pub fn parse_default_name(value: &str) -> Option<String> {
    let Ok(json) = serde_json::from_str::<serde_json::Value>(value) else {
        return Some(value.to_string());
    };
    // Try object with "name" field first
    if let Some(obj) = json.as_object() {
        return obj.get("name").and_then(|n| n.as_str()).map(String::from);
    }
    // Fall back to plain string
    json.as_str().map(String::from)
}

// ============================================================================
// Socket Discovery
// ============================================================================

/// Locate the `PipeWire` socket the way libpipewire does
///
/// An absolute `PIPEWIRE_REMOTE` is used as is; otherwise the remote name
/// (default `pipewire-0`) is looked up in `PIPEWIRE_RUNTIME_DIR`, falling back
/// to the XDG runtime directory.
#[must_use]
pub fn resolve_socket(
    remote: Option<&str>,
    pipewire_runtime_dir: Option<&Path>,
    xdg_runtime_dir: Option<&Path>,
) -> Option<PathBuf> {
    let remote = remote.filter(|r| !r.is_empty()).unwrap_or(DEFAULT_REMOTE);
    if Path::new(remote).is_absolute() {
        return Some(PathBuf::from(remote));
    }
    pipewire_runtime_dir
        .or(xdg_runtime_dir)
        .map(|dir| dir.join(remote))
}

fn socket_path() -> Option<PathBuf> {
    let remote = std::env::var("PIPEWIRE_REMOTE").ok();
    let runtime = std::env::var_os("PIPEWIRE_RUNTIME_DIR").map(PathBuf::from);
    resolve_socket(remote.as_deref(), runtime.as_deref(), dirs::runtime_dir().as_deref())
}

// ============================================================================
// Backend Messages
// ============================================================================

/// Raw output of the backend's helper threads
#[derive(Debug)]
pub enum PwMessage {
    Loaded {
        component: Component,
        result: Result<(), SessionError>,
    },
    Activated {
        component: Component,
        result: Result<(), SessionError>,
    },
    Watch(Result<(), SessionError>),
    /// One `pw-dump` batch
    Objects(Vec<PwObject>),
    Metadata(MetadataUpdate),
    MonitorExited {
        component: Component,
        reason: String,
    },
}

/// Tool backing each component
const fn component_tool(component: Component) -> &'static str {
    match component {
        Component::DefaultNodes => "pw-metadata",
        Component::Mixer => "pw-dump",
    }
}

/// Check that a `PipeWire` tool is installed and runs
fn probe_tool(tool: &str) -> Result<(), String> {
    match Command::new(tool)
        .arg("--version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
    {
        Ok(status) if status.success() => Ok(()),
        Ok(status) => Err(format!("'{tool} --version' failed with {status}")),
        Err(e) => Err(format!(
            "PipeWire tool '{tool}' not found or failed ({e}). Is PipeWire installed?"
        )),
    }
}

/// Forward `pw-dump --monitor` batches until the stream ends
fn read_dump_stream(stdout: impl Read, tx: &mpsc::UnboundedSender<PwMessage>) -> String {
    let batches = serde_json::Deserializer::from_reader(BufReader::new(stdout))
        .into_iter::<Vec<serde_json::Value>>();

    for batch in batches {
        let values = match batch {
            Ok(values) => values,
            Err(e) => return format!("invalid pw-dump output: {e}"),
        };

        let objects: Vec<PwObject> = values
            .into_iter()
            .filter_map(|value| {
                serde_json::from_value(value)
                    .map_err(|e| trace!("Skipping unparsable pw-dump object: {}", e))
                    .ok()
            })
            .collect();
        trace!("pw-dump returned {} objects", objects.len());

        if tx.send(PwMessage::Objects(objects)).is_err() {
            return "session dropped".to_string();
        }
    }

    "pw-dump exited".to_string()
}

/// Forward `pw-metadata --monitor` updates until the stream ends
fn read_metadata_stream(stdout: impl Read, tx: &mpsc::UnboundedSender<PwMessage>) -> String {
    for line in BufReader::new(stdout).lines() {
        let line = match line {
            Ok(line) => line,
            Err(e) => return format!("failed to read pw-metadata output: {e}"),
        };
        let Some(update) = parse_metadata_line(&line) else {
            trace!("pw-metadata: {}", line);
            continue;
        };
        if tx.send(PwMessage::Metadata(update)).is_err() {
            return "session dropped".to_string();
        }
    }

    "pw-metadata exited".to_string()
}

// ============================================================================
// Session
// ============================================================================

/// Cached state of an interesting node
#[derive(Debug, Clone, PartialEq)]
struct NodeEntry {
    role: DeviceRole,
    node_name: Option<String>,
    /// `node.nick`, falling back to `node.description`
    display_name: Option<String>,
    linear_volume: Option<f64>,
    mute: bool,
}

impl NodeEntry {
    fn new(role: DeviceRole) -> Self {
        Self {
            role,
            node_name: None,
            display_name: None,
            linear_volume: None,
            mute: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum WatchState {
    Idle,
    Pending,
    Installed,
}

/// `PipeWire` session driven through `pw-dump` and `pw-metadata`
pub struct PwSession {
    tx: mpsc::UnboundedSender<PwMessage>,
    interests: HashSet<DeviceRole>,
    connected: bool,
    scale: VolumeScale,
    loaded: HashSet<Component>,
    active: HashSet<Component>,
    monitors: Vec<Child>,
    nodes: HashMap<DeviceId, NodeEntry>,
    default_names: HashMap<DeviceRole, String>,
    /// Last default ids reported through `DefaultChanged`
    reported_defaults: HashMap<DeviceRole, DeviceId>,
    dump_seen: bool,
    watch: WatchState,
    subscribed: bool,
    disconnected: bool,
}

impl PwSession {
    /// Create a session and the receiver its helper threads report to
    #[must_use]
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PwMessage>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let session = Self {
            tx,
            interests: HashSet::new(),
            connected: false,
            scale: VolumeScale::default(),
            loaded: HashSet::new(),
            active: HashSet::new(),
            monitors: Vec::new(),
            nodes: HashMap::new(),
            default_names: HashMap::new(),
            reported_defaults: HashMap::new(),
            dump_seen: false,
            watch: WatchState::Idle,
            subscribed: false,
            disconnected: false,
        };
        (session, rx)
    }

    /// Fold a backend message into the cache and translate it to session events
    pub fn absorb(&mut self, message: PwMessage) -> Vec<SessionEvent> {
        if self.disconnected {
            return Vec::new();
        }

        match message {
            PwMessage::Loaded { component, result } => {
                if result.is_ok() {
                    self.loaded.insert(component);
                }
                vec![SessionEvent::ComponentLoaded { component, result }]
            }
            PwMessage::Activated { component, result } => {
                if result.is_ok() {
                    self.active.insert(component);
                }
                vec![SessionEvent::ComponentActivated { component, result }]
            }
            PwMessage::Watch(result) => {
                if result.is_ok() {
                    self.watch = WatchState::Installed;
                }
                vec![SessionEvent::WatchInstalled { result }]
            }
            PwMessage::Objects(objects) => self.absorb_objects(objects),
            PwMessage::Metadata(update) => self.absorb_metadata(update),
            PwMessage::MonitorExited { component, reason } => {
                warn!("{} monitor stopped: {}", component, reason);
                vec![SessionEvent::Disconnected {
                    reason: format!("{} ({}): {}", component, component_tool(component), reason),
                }]
            }
        }
    }

    fn absorb_objects(&mut self, objects: Vec<PwObject>) -> Vec<SessionEvent> {
        let mut changed: Vec<DeviceId> = objects
            .into_iter()
            .filter_map(|obj| self.apply_object(obj))
            .collect();
        changed.dedup();

        let mut events = Vec::new();
        self.dump_seen = true;
        if self.watch == WatchState::Pending {
            debug!("Initial object dump absorbed ({} nodes)", self.nodes.len());
            self.watch = WatchState::Installed;
            events.push(SessionEvent::WatchInstalled { result: Ok(()) });
        }

        if self.subscribed {
            events.extend(self.default_changes());
            events.extend(changed.into_iter().map(|id| SessionEvent::PropertyChanged { id }));
        }
        events
    }

    /// Update the node cache, returning the id if its visible state changed
    fn apply_object(&mut self, obj: PwObject) -> Option<DeviceId> {
        if obj.is_removal() {
            if self.nodes.remove(&obj.id).is_some() {
                debug!("Node {} removed", obj.id);
            }
            return None;
        }
        if obj.obj_type.as_deref() != Some(NODE_TYPE) {
            return None;
        }
        let info = obj.info?;
        let props = info.props.as_ref();
        let existing = self.nodes.get(&obj.id);

        let role = props
            .and_then(|p| p.media_class.as_deref())
            .map_or(existing.map(|e| e.role), DeviceRole::from_media_class);
        let Some(role) = role.filter(|r| self.interests.contains(r)) else {
            self.nodes.remove(&obj.id);
            return None;
        };

        let mut entry = existing
            .filter(|e| e.role == role)
            .cloned()
            .unwrap_or_else(|| NodeEntry::new(role));

        if let Some(props) = props {
            if props.node_name.is_some() {
                entry.node_name.clone_from(&props.node_name);
            }
            if let Some(name) = props.node_nick.as_ref().or(props.node_description.as_ref()) {
                entry.display_name = Some(name.clone());
            }
        }
        if let Some((linear, mute)) = info
            .params
            .as_ref()
            .and_then(|p| p.props.as_deref())
            .and_then(mixer_state)
        {
            entry.linear_volume = Some(linear);
            entry.mute = mute;
        }

        let changed = existing != Some(&entry);
        if changed {
            trace!("Node {} ({}) updated: {:?}", obj.id, role, entry);
        }
        self.nodes.insert(obj.id, entry);
        changed.then_some(obj.id)
    }

    fn absorb_metadata(&mut self, update: MetadataUpdate) -> Vec<SessionEvent> {
        if update.subject != GLOBAL_SUBJECT {
            return Vec::new();
        }

        match update.key.as_deref() {
            None => {
                debug!("Default metadata cleared");
                self.default_names.clear();
            }
            Some(key) => {
                let Some(role) = DeviceRole::ALL.into_iter().find(|r| r.metadata_key() == key)
                else {
                    return Vec::new();
                };
                match update.value.as_deref().and_then(parse_default_name) {
                    Some(name) => {
                        debug!("Default {} node name: {}", role, name);
                        self.default_names.insert(role, name);
                    }
                    None => {
                        debug!("Default {} node unset", role);
                        self.default_names.remove(&role);
                    }
                }
            }
        }

        if self.subscribed {
            self.default_changes()
        } else {
            Vec::new()
        }
    }

    fn default_changes(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        for role in DeviceRole::ALL {
            let id = self.default_device_id(role);
            if self.reported_defaults.insert(role, id) != Some(id) {
                events.push(SessionEvent::DefaultChanged { role, id });
            }
        }
        events
    }

    fn spawn_monitor(&mut self, component: Component) -> Result<(), SessionError> {
        let tool = component_tool(component);
        let mut command = Command::new(tool);
        match component {
            Component::DefaultNodes => command.args(["--monitor", "--name", "default"]),
            Component::Mixer => command.args(["--monitor", "--no-colors"]),
        };

        let mut child = command
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .spawn()
            .map_err(|e| SessionError::Component {
                component,
                message: format!("failed to start {tool}: {e}"),
            })?;
        let stdout = child.stdout.take().ok_or_else(|| SessionError::Component {
            component,
            message: format!("{tool} has no stdout"),
        })?;

        let tx = self.tx.clone();
        std::thread::spawn(move || {
            let reason = match component {
                Component::DefaultNodes => read_metadata_stream(stdout, &tx),
                Component::Mixer => read_dump_stream(stdout, &tx),
            };
            let _ = tx.send(PwMessage::MonitorExited { component, reason });
        });

        debug!("Started {} (pid {})", tool, child.id());
        self.monitors.push(child);
        Ok(())
    }

    fn send(&self, message: PwMessage) {
        if self.tx.send(message).is_err() {
            warn!("Session message dropped: event loop is gone");
        }
    }
}

impl DeviceQuery for PwSession {
    fn query_device(&self, id: DeviceId) -> Result<DeviceState, SessionError> {
        if !self.active.contains(&Component::Mixer) {
            return Err(SessionError::Transport(format!(
                "{} is not active",
                Component::Mixer
            )));
        }
        let entry = self.nodes.get(&id).ok_or(SessionError::NotFound(id))?;
        // A node the mixer has no volume for yet is not a mixer device
        let linear = entry.linear_volume.ok_or(SessionError::NotFound(id))?;

        Ok(DeviceState {
            name: entry.display_name.clone(),
            volume: self.scale.from_linear(linear),
            mute: entry.mute,
        })
    }

    fn default_device_id(&self, role: DeviceRole) -> DeviceId {
        if !self.active.contains(&Component::DefaultNodes) {
            return NO_DEVICE;
        }
        let Some(name) = self.default_names.get(&role) else {
            return NO_DEVICE;
        };
        self.nodes
            .iter()
            .find(|(_, node)| node.role == role && node.node_name.as_ref() == Some(name))
            .map_or(NO_DEVICE, |(id, _)| *id)
    }
}

impl Session for PwSession {
    fn declare_interest(&mut self, role: DeviceRole) {
        debug!("Interested in {} nodes", role.media_class());
        self.interests.insert(role);
    }

    fn connect(&mut self) -> Result<(), SessionError> {
        let socket = socket_path().ok_or_else(|| {
            SessionError::Connect("no runtime directory (XDG_RUNTIME_DIR is not set)".to_string())
        })?;
        if !socket.exists() {
            return Err(SessionError::Connect(format!(
                "socket {} does not exist. Is PipeWire running?",
                socket.display()
            )));
        }

        debug!("PipeWire socket: {}", socket.display());
        self.connected = true;
        Ok(())
    }

    fn load_component(&mut self, component: Component) {
        if !self.connected {
            self.send(PwMessage::Loaded {
                component,
                result: Err(SessionError::Transport("not connected".to_string())),
            });
            return;
        }

        let tx = self.tx.clone();
        tokio::task::spawn_blocking(move || {
            let result = probe_tool(component_tool(component))
                .map_err(|message| SessionError::Component { component, message });
            let _ = tx.send(PwMessage::Loaded { component, result });
        });
    }

    fn set_mixer_scale(&mut self, scale: VolumeScale) {
        self.scale = scale;
    }

    fn activate(&mut self, component: Component) {
        let result = if self.loaded.contains(&component) {
            self.spawn_monitor(component)
        } else {
            Err(SessionError::Component {
                component,
                message: "activated before it was loaded".to_string(),
            })
        };
        self.send(PwMessage::Activated { component, result });
    }

    fn install_watch(&mut self) {
        if !self.active.contains(&Component::Mixer) {
            self.send(PwMessage::Watch(Err(SessionError::Watch(format!(
                "{} is not active",
                Component::Mixer
            )))));
        } else if self.dump_seen {
            self.send(PwMessage::Watch(Ok(())));
        } else {
            // Completes when the first pw-dump batch arrives
            self.watch = WatchState::Pending;
        }
    }

    fn subscribe(&mut self) {
        self.subscribed = true;
        for role in DeviceRole::ALL {
            let id = self.default_device_id(role);
            self.reported_defaults.insert(role, id);
        }
    }

    fn disconnect(&mut self) {
        if self.disconnected {
            return;
        }
        self.disconnected = true;
        self.subscribed = false;

        for mut child in self.monitors.drain(..) {
            let _ = child.kill();
            let _ = child.wait();
        }
        debug!("Disconnected from PipeWire");
    }
}

impl Drop for PwSession {
    fn drop(&mut self) {
        self.disconnect();
    }
}
