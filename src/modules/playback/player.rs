use std::sync::Arc;

use tokio::task::JoinHandle;
use tracing::debug;

use super::error::PlaybackError;
use crate::infrastructure::storage::ObjectStore;

/// One attach/load lifecycle of the player. Events from an older session are
/// stale once a new one is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SessionId(pub u64);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEventKind {
    ManifestParsed { variants: usize },
    LevelSwitching { level: usize },
    Error { kind: String, details: String, fatal: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayerEvent {
    pub session: SessionId,
    pub kind: PlayerEventKind,
}

/// Playback engine driven by the poller. Progress is reported through
/// [`PlayerEvent`]s on a channel the poller listens to.
pub trait Player: Send {
    /// Destroys the current session, if any, and attaches a fresh one.
    fn reset(&mut self) -> Result<SessionId, PlaybackError>;

    /// Starts loading `manifest_key` in `session`.
    fn load(&mut self, session: SessionId, manifest_key: &str);
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Variant {
    pub bandwidth: Option<u64>,
    pub uri: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub variants: Vec<Variant>,
    pub segments: usize,
}

/// Reads an HLS playlist: either a master playlist listing variant streams or
/// a media playlist listing segments.
pub fn parse_manifest(body: &[u8]) -> Result<Manifest, String> {
    let text = std::str::from_utf8(body).map_err(|e| format!("manifest is not UTF-8: {e}"))?;
    let mut lines = text.lines().map(str::trim).filter(|l| !l.is_empty());

    if lines.next() != Some("#EXTM3U") {
        return Err("manifest does not start with #EXTM3U".to_string());
    }

    let mut manifest = Manifest::default();
    let mut pending_bandwidth: Option<Option<u64>> = None;

    for line in lines {
        if let Some(attrs) = line.strip_prefix("#EXT-X-STREAM-INF:") {
            pending_bandwidth = Some(attribute(attrs, "BANDWIDTH").and_then(|v| v.parse().ok()));
        } else if line.starts_with("#EXTINF:") {
            manifest.segments += 1;
        } else if !line.starts_with('#') {
            if let Some(bandwidth) = pending_bandwidth.take() {
                manifest.variants.push(Variant {
                    bandwidth,
                    uri: line.to_string(),
                });
            }
        }
    }

    if manifest.variants.is_empty() && manifest.segments == 0 {
        return Err("manifest lists no variants or segments".to_string());
    }
    Ok(manifest)
}

fn attribute<'a>(attrs: &'a str, name: &str) -> Option<&'a str> {
    attrs
        .split(',')
        .filter_map(|pair| pair.split_once('='))
        .find(|(k, _)| k.trim() == name)
        .map(|(_, v)| v.trim().trim_matches('"'))
}

/// Player that fetches and validates the manifest from the hosting bucket.
pub struct ManifestPlayer<S> {
    store: Arc<S>,
    bucket: String,
    events: async_channel::Sender<PlayerEvent>,
    generation: u64,
    task: Option<JoinHandle<()>>,
}

impl<S: ObjectStore + 'static> ManifestPlayer<S> {
    pub fn new(store: Arc<S>, bucket: &str, events: async_channel::Sender<PlayerEvent>) -> Self {
        Self {
            store,
            bucket: bucket.to_string(),
            events,
            generation: 0,
            task: None,
        }
    }
}

impl<S> Drop for ManifestPlayer<S> {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

impl<S: ObjectStore + 'static> Player for ManifestPlayer<S> {
    fn reset(&mut self) -> Result<SessionId, PlaybackError> {
        if let Some(task) = self.task.take() {
            // aborting the in-flight fetch is the only way to cancel a load
            task.abort();
            debug!(session = self.generation, "player session destroyed");
        }
        self.generation += 1;
        Ok(SessionId(self.generation))
    }

    fn load(&mut self, session: SessionId, manifest_key: &str) {
        let store = Arc::clone(&self.store);
        let bucket = self.bucket.clone();
        let key = manifest_key.to_string();
        let events = self.events.clone();

        self.task = Some(tokio::spawn(async move {
            let mut outgoing = Vec::with_capacity(2);
            match store.get(&bucket, &key).await {
                Ok(object) => match parse_manifest(&object.body) {
                    Ok(manifest) => {
                        let top = manifest.variants.iter().max_by_key(|v| v.bandwidth);
                        debug!(
                            key = %key,
                            variants = manifest.variants.len(),
                            segments = manifest.segments,
                            top_bandwidth = ?top.and_then(|v| v.bandwidth),
                            top_uri = top.map(|v| v.uri.as_str()),
                            "manifest parsed"
                        );
                        outgoing.push(PlayerEventKind::ManifestParsed {
                            variants: manifest.variants.len(),
                        });
                        if !manifest.variants.is_empty() {
                            outgoing.push(PlayerEventKind::LevelSwitching { level: 0 });
                        }
                    }
                    Err(details) => outgoing.push(PlayerEventKind::Error {
                        kind: "mediaError".to_string(),
                        details: format!("manifestParsingError: {details}"),
                        fatal: true,
                    }),
                },
                Err(e) => outgoing.push(PlayerEventKind::Error {
                    kind: "networkError".to_string(),
                    details: format!("manifestLoadError: {e}"),
                    fatal: true,
                }),
            }

            for kind in outgoing {
                if events.send(PlayerEvent { session, kind }).await.is_err() {
                    break;
                }
            }
        }));
    }
}
