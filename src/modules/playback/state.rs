use serde::Serialize;
use utoipa::ToSchema;

/// Client-side bookkeeping of what is known, loading and on screen.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlaybackState {
    pub latest_known_id: Option<String>,
    /// Set when a load starts, cleared when that session's manifest parses.
    pub loading_id: Option<String>,
    pub playing_id: Option<String>,
    /// Off once the user picks something by hand.
    pub auto_play: bool,
}

impl Default for PlaybackState {
    fn default() -> Self {
        Self {
            latest_known_id: None,
            loading_id: None,
            playing_id: None,
            auto_play: true,
        }
    }
}

/// Text shown to the viewer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, ToSchema)]
pub struct Advisory {
    pub now_playing: Option<String>,
    pub coming_soon: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlaybackSnapshot {
    pub latest_known_id: Option<String>,
    pub loading_id: Option<String>,
    pub playing_id: Option<String>,
    pub auto_play: bool,
    /// Index as last fetched, newest first.
    pub contents: Vec<String>,
    pub advisory: Advisory,
}

impl PlaybackSnapshot {
    pub fn new(state: &PlaybackState, contents: &[String], advisory: &Advisory) -> Self {
        Self {
            latest_known_id: state.latest_known_id.clone(),
            loading_id: state.loading_id.clone(),
            playing_id: state.playing_id.clone(),
            auto_play: state.auto_play,
            contents: contents.to_vec(),
            advisory: advisory.clone(),
        }
    }
}

impl Default for PlaybackSnapshot {
    fn default() -> Self {
        Self::new(&PlaybackState::default(), &[], &Advisory::default())
    }
}
