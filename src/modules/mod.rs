pub mod content;
pub mod ingest;
pub mod playback;
pub mod upload;
