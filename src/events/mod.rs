//! Push-based event bus
//!
//! Subscribers come and go; emitting with nobody listening is normal.

use serde::Serialize;
use tokio::sync::broadcast;

use crate::platform::ContentType;

/// Buffered events per subscriber before the slowest one starts lagging
const CHANNEL_CAPACITY: usize = 256;

/// Install phase, strictly ordered
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum InstallPhase {
    Preparing,
    Resolving,
    Downloading,
}

/// Progress payload of `modpack-download-progress`
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DownloadProgress {
    pub phase: InstallPhase,
    pub downloaded: usize,
    pub total: usize,
    pub bytes_downloaded: u64,
    pub speed_bps: u64,
    pub current_file: Option<String>,
}

/// Events emitted towards the front-end
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", content = "payload", rename_all = "kebab-case")]
pub enum LauncherEvent {
    ModpackDownloadProgress(DownloadProgress),
    ModsChanged {
        #[serde(rename = "instanceId")]
        instance_id: String,
    },
    ResourcepacksChanged {
        #[serde(rename = "instanceId")]
        instance_id: String,
    },
    ShaderpacksChanged {
        #[serde(rename = "instanceId")]
        instance_id: String,
    },
    InstancesChanged {},
}

impl LauncherEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            LauncherEvent::ModpackDownloadProgress(_) => "modpack-download-progress",
            LauncherEvent::ModsChanged { .. } => "mods-changed",
            LauncherEvent::ResourcepacksChanged { .. } => "resourcepacks-changed",
            LauncherEvent::ShaderpacksChanged { .. } => "shaderpacks-changed",
            LauncherEvent::InstancesChanged {} => "instances-changed",
        }
    }

    /// The change notification for content of one kind
    pub fn content_changed(kind: ContentType, instance_id: &str) -> Self {
        let instance_id = instance_id.to_string();
        match kind {
            ContentType::Mod | ContentType::Modpack => LauncherEvent::ModsChanged { instance_id },
            ContentType::ResourcePack => LauncherEvent::ResourcepacksChanged { instance_id },
            ContentType::ShaderPack => LauncherEvent::ShaderpacksChanged { instance_id },
        }
    }
}

/// Broadcast channel shared by every service
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<LauncherEvent>,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Start receiving events emitted from now on
    pub fn subscribe(&self) -> broadcast::Receiver<LauncherEvent> {
        self.sender.subscribe()
    }

    /// Emit an event. Returns whether any subscriber received it.
    pub fn emit(&self, event: LauncherEvent) -> bool {
        let name = event.name();
        match self.sender.send(event) {
            Ok(receivers) => {
                tracing::trace!("Emitted {} to {} subscribers", name, receivers);
                true
            }
            Err(_) => false,
        }
    }
}
