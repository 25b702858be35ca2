//! Polling-driven playback.
//!
//! Each tick re-reads the content index, and when a newer id than the one on
//! screen shows up (and auto-play is on) checks that its manifest exists and
//! hands it to the player. Ticks, player events and user commands are all
//! handled by one task, one at a time, so the state never sees two of them
//! interleave.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::MissedTickBehavior;
use tracing::{debug, error, info, warn};

use super::error::PlaybackError;
use super::player::{Player, PlayerEvent, PlayerEventKind, SessionId};
use super::state::{Advisory, PlaybackSnapshot, PlaybackState};
use crate::infrastructure::storage::{ObjectStore, StorageError};
use crate::modules::content::index::{ContentId, ContentIndex, INDEX_KEY};

const COMMAND_BUFFER: usize = 16;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickOutcome {
    EmptyIndex,
    AutoPlayDisabled,
    UpToDate,
    Loading(String),
}

pub struct Poller<S, P> {
    store: Arc<S>,
    bucket: String,
    player: P,
    state: PlaybackState,
    advisory: Advisory,
    contents: Vec<String>,
    session: Option<SessionId>,
}

impl<S: ObjectStore, P: Player> Poller<S, P> {
    pub fn new(store: Arc<S>, bucket: &str, player: P) -> Self {
        Self {
            store,
            bucket: bucket.to_string(),
            player,
            state: PlaybackState::default(),
            advisory: Advisory::default(),
            contents: Vec::new(),
            session: None,
        }
    }

    #[cfg(test)]
    pub fn state(&self) -> &PlaybackState {
        &self.state
    }

    #[cfg(test)]
    pub fn advisory(&self) -> &Advisory {
        &self.advisory
    }

    #[cfg(test)]
    pub fn player(&self) -> &P {
        &self.player
    }

    #[cfg(test)]
    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    pub fn snapshot(&self) -> PlaybackSnapshot {
        PlaybackSnapshot::new(&self.state, &self.contents, &self.advisory)
    }

    /// One polling iteration. Errors are already reflected in the advisory
    /// when this returns.
    pub async fn tick(&mut self) -> Result<TickOutcome, PlaybackError> {
        let result = self.advance_to_latest().await;
        self.surface(&result);
        result
    }

    /// Manual pick: turns auto-play off and plays `id` if its manifest is
    /// there.
    pub async fn select(&mut self, id: &ContentId) -> Result<TickOutcome, PlaybackError> {
        info!(content_id = %id, "manual selection; auto-play disabled");
        self.state.auto_play = false;
        let result = self.verify_and_load(id).await;
        self.surface(&result);
        result
    }

    pub fn resume(&mut self) {
        info!("auto-play resumed");
        self.state.auto_play = true;
    }

    pub fn on_player_event(&mut self, event: PlayerEvent) {
        if self.session != Some(event.session) {
            debug!(session = event.session.0, "ignoring event from destroyed session");
            return;
        }

        match event.kind {
            PlayerEventKind::ManifestParsed { variants } => {
                let Some(id) = self.state.loading_id.take() else {
                    return;
                };
                info!(content_id = %id, variants, "manifest parsed; playing");
                self.advisory.error = None;
                self.advisory.coming_soon = None;
                self.advisory.now_playing = Some(format!("Now Playing : {id}"));
                self.state.playing_id = Some(id);
            }
            PlayerEventKind::LevelSwitching { level } => {
                debug!(level, "level switching");
            }
            PlayerEventKind::Error { kind, details, fatal: true } => {
                let err = PlaybackError::PlaybackFatal { kind, details };
                error!(error = %err, "fatal player error");
                self.advisory.error = Some(err.to_string());
            }
            PlayerEventKind::Error { kind, details, fatal: false } => {
                debug!(kind = %kind, details = %details, "recoverable player error");
            }
        }
    }

    async fn advance_to_latest(&mut self) -> Result<TickOutcome, PlaybackError> {
        let index = self.fetch_index().await?;
        self.contents = index.newest_first().cloned().collect();
        self.advisory.error = None;

        let Some(latest) = index.latest().map(str::to_string) else {
            return Ok(TickOutcome::EmptyIndex);
        };
        self.state.latest_known_id = Some(latest.clone());

        debug!(
            latest = %latest,
            loading = ?self.state.loading_id,
            playing = ?self.state.playing_id,
            "content index refreshed"
        );

        if !self.state.auto_play {
            return Ok(TickOutcome::AutoPlayDisabled);
        }
        if self.state.playing_id.as_deref() == Some(latest.as_str()) {
            return Ok(TickOutcome::UpToDate);
        }

        let id = ContentId::new(latest.as_str())
            .map_err(|e| PlaybackError::IndexParse(e.to_string()))?;
        self.verify_and_load(&id).await
    }

    async fn fetch_index(&self) -> Result<ContentIndex, PlaybackError> {
        let object = self
            .store
            .get(&self.bucket, INDEX_KEY)
            .await
            .map_err(|e| match e {
                StorageError::NotFound(_) => PlaybackError::ContentIndexUnavailable,
                other => PlaybackError::Storage(other.to_string()),
            })?;

        ContentIndex::from_json(&object.body).map_err(|e| PlaybackError::IndexParse(e.to_string()))
    }

    async fn verify_and_load(&mut self, id: &ContentId) -> Result<TickOutcome, PlaybackError> {
        let manifest_key = id.manifest_key();
        let present = self
            .store
            .exists(&self.bucket, &manifest_key)
            .await
            .map_err(|e| PlaybackError::Storage(e.to_string()))?;

        if !present {
            return Err(PlaybackError::AssetNotYetAvailable(id.to_string()));
        }

        let session = self.player.reset()?;
        self.session = Some(session);

        let id = id.to_string();
        if self.state.playing_id.as_deref() == Some(id.as_str()) {
            // the old session showing it is gone
            self.state.playing_id = None;
        }
        info!(content_id = %id, session = session.0, "loading");
        self.state.loading_id = Some(id.clone());
        self.player.load(session, &manifest_key);

        Ok(TickOutcome::Loading(id))
    }

    fn surface(&mut self, result: &Result<TickOutcome, PlaybackError>) {
        match result {
            Ok(_) => {}
            Err(PlaybackError::AssetNotYetAvailable(id)) => {
                info!(content_id = %id, "content not transcoded yet");
                self.advisory.coming_soon = Some(format!("Next : {id}"));
            }
            Err(e) => {
                warn!(error = %e, "poll iteration failed");
                self.advisory.error = Some(e.to_string());
            }
        }
    }
}

pub enum PollerCommand {
    Select {
        id: ContentId,
        reply: oneshot::Sender<Result<TickOutcome, PlaybackError>>,
    },
    Resume {
        reply: oneshot::Sender<()>,
    },
}

/// Cheap, cloneable access to a running poller.
#[derive(Clone)]
pub struct PlaybackHandle {
    commands: mpsc::Sender<PollerCommand>,
    snapshot: watch::Receiver<PlaybackSnapshot>,
}

impl PlaybackHandle {
    pub fn snapshot(&self) -> PlaybackSnapshot {
        self.snapshot.borrow().clone()
    }

    #[cfg(test)]
    pub fn subscribe(&self) -> watch::Receiver<PlaybackSnapshot> {
        self.snapshot.clone()
    }

    pub async fn select(&self, id: ContentId) -> Result<TickOutcome, PlaybackError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(PollerCommand::Select { id, reply })
            .await
            .map_err(|_| PlaybackError::SessionStopped)?;
        response.await.map_err(|_| PlaybackError::SessionStopped)?
    }

    pub async fn resume(&self) -> Result<(), PlaybackError> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(PollerCommand::Resume { reply })
            .await
            .map_err(|_| PlaybackError::SessionStopped)?;
        response.await.map_err(|_| PlaybackError::SessionStopped)
    }
}

/// Runs `poller` on its own task. The first tick fires immediately; ticks
/// missed while an iteration overran are skipped rather than bunched up.
pub fn spawn<S, P>(
    poller: Poller<S, P>,
    events: async_channel::Receiver<PlayerEvent>,
    period: Duration,
) -> PlaybackHandle
where
    S: ObjectStore + 'static,
    P: Player + Sync + 'static,
{
    let (commands_tx, commands_rx) = mpsc::channel(COMMAND_BUFFER);
    let (snapshot_tx, snapshot_rx) = watch::channel(poller.snapshot());

    tokio::spawn(run(poller, commands_rx, events, snapshot_tx, period));

    PlaybackHandle {
        commands: commands_tx,
        snapshot: snapshot_rx,
    }
}

async fn run<S: ObjectStore, P: Player>(
    mut poller: Poller<S, P>,
    mut commands: mpsc::Receiver<PollerCommand>,
    events: async_channel::Receiver<PlayerEvent>,
    snapshot: watch::Sender<PlaybackSnapshot>,
    period: Duration,
) {
    let mut ticker = tokio::time::interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!(bucket = %poller.bucket, every = ?period, "playback poller started");

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                // already surfaced in the advisory
                let _ = poller.tick().await;
            }
            Ok(event) = events.recv() => poller.on_player_event(event),
            Some(command) = commands.recv() => match command {
                PollerCommand::Select { id, reply } => {
                    let result = poller.select(&id).await;
                    snapshot.send_replace(poller.snapshot());
                    let _ = reply.send(result);
                }
                PollerCommand::Resume { reply } => {
                    poller.resume();
                    snapshot.send_replace(poller.snapshot());
                    let _ = reply.send(());
                }
            },
        }

        snapshot.send_replace(poller.snapshot());
    }
}
