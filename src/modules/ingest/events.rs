use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};

/// S3-style bucket notification, as sent by S3 event notifications and by
/// MinIO webhook/AMQP targets. Only the fields the pipeline reads are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UploadNotification {
    #[serde(rename = "Records", default)]
    pub records: Vec<UploadRecord>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    #[serde(default)]
    pub event_name: Option<String>,
    pub s3: S3Entity,
    #[serde(default)]
    pub request_parameters: RequestParameters,
    #[serde(default)]
    pub user_identity: UserIdentity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3Entity {
    pub bucket: BucketEntity,
    pub object: ObjectEntity,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BucketEntity {
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObjectEntity {
    /// URL-encoded, with `+` standing for a space.
    pub key: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RequestParameters {
    #[serde(rename = "sourceIPAddress", default)]
    pub source_ip_address: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdentity {
    #[serde(default)]
    pub principal_id: String,
}

impl UploadRecord {
    pub fn bucket(&self) -> &str {
        &self.s3.bucket.name
    }

    pub fn object_key(&self) -> String {
        decode_object_key(&self.s3.object.key)
    }

    /// Records without an event name are treated as uploads.
    pub fn is_object_created(&self) -> bool {
        self.event_name
            .as_deref()
            .is_none_or(|name| name.contains("ObjectCreated"))
    }
}

pub fn decode_object_key(raw: &str) -> String {
    let spaced = raw.replace('+', " ");
    percent_decode_str(&spaced).decode_utf8_lossy().into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIO_EVENT: &str = r#"{
        "EventName": "s3:ObjectCreated:Put",
        "Key": "video-userfiles-dev/private/alice/1490000000000.mp4",
        "Records": [{
            "eventVersion": "2.0",
            "eventSource": "minio:s3",
            "eventName": "s3:ObjectCreated:Put",
            "userIdentity": {"principalId": "minioadmin"},
            "requestParameters": {"sourceIPAddress": "10.0.0.7", "region": ""},
            "s3": {
                "bucket": {"name": "video-userfiles-dev", "arn": "arn:aws:s3:::video-userfiles-dev"},
                "object": {"key": "private%2Falice%2Fmy+clip%2B1.mp4", "size": 1024}
            }
        }]
    }"#;

    #[test]
    fn parses_minio_webhook_body() {
        let event: UploadNotification = serde_json::from_str(MINIO_EVENT).unwrap();
        let record = &event.records[0];

        assert_eq!(record.bucket(), "video-userfiles-dev");
        assert_eq!(record.object_key(), "private/alice/my clip+1.mp4");
        assert_eq!(record.request_parameters.source_ip_address, "10.0.0.7");
        assert_eq!(record.user_identity.principal_id, "minioadmin");
        assert!(record.is_object_created());
    }

    #[test]
    fn removal_events_are_not_uploads() {
        let json = r#"{"Records":[{"eventName":"ObjectRemoved:Delete",
            "s3":{"bucket":{"name":"b"},"object":{"key":"k"}}}]}"#;
        let event: UploadNotification = serde_json::from_str(json).unwrap();

        assert!(!event.records[0].is_object_created());
        assert_eq!(event.records[0].user_identity.principal_id, "");
    }

    #[test]
    fn decodes_plus_before_percent_escapes() {
        assert_eq!(decode_object_key("a+b%2Bc"), "a b+c");
        assert_eq!(decode_object_key("plain/key.mp4"), "plain/key.mp4");
    }
}
