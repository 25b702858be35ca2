pub mod upload_events;
