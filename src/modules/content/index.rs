use std::collections::BTreeSet;
use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use time::OffsetDateTime;

pub const CONTENT_PREFIX: &str = "content/";
pub const INDEX_KEY: &str = "content/index.json";
pub const PLAYLIST_NAME: &str = "default";

const NONCE_LEN: usize = 6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidContentId {
    #[error("content id is empty")]
    Empty,

    #[error("content id {0:?} must be a single path segment")]
    NotASegment(String),
}

/// Names one transcoded video and its output folder under `content/`.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ContentId(String);

impl ContentId {
    pub fn new(value: impl Into<String>) -> Result<Self, InvalidContentId> {
        let value = value.into();
        if value.is_empty() {
            return Err(InvalidContentId::Empty);
        }
        if value.contains('/') || value.chars().all(|c| c == '.') {
            return Err(InvalidContentId::NotASegment(value));
        }
        Ok(Self(value))
    }

    /// `<epoch-millis>-<principal-suffix>-<nonce>`.
    ///
    /// The suffix is whatever follows the last `:` of the principal id
    /// (role-session style principals look like `AROAXXX:session-name`). The
    /// nonce keeps two uploads by the same principal in the same millisecond
    /// apart.
    pub fn mint<R: Rng + ?Sized>(principal_id: &str, now: OffsetDateTime, rng: &mut R) -> Self {
        let millis = now.unix_timestamp_nanos() / 1_000_000;
        let suffix = principal_suffix(principal_id);
        let nonce: String = (0..NONCE_LEN)
            .map(|_| char::from_digit(rng.random_range(0..16), 16).unwrap_or('0'))
            .collect();

        Self(format!("{millis}-{suffix}-{nonce}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Folder every asset of this content is written under.
    pub fn output_prefix(&self) -> String {
        format!("{CONTENT_PREFIX}{}/", self.0)
    }

    pub fn manifest_key(&self) -> String {
        format!("{CONTENT_PREFIX}{}/{PLAYLIST_NAME}.m3u8", self.0)
    }
}

impl fmt::Display for ContentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for ContentId {
    type Error = InvalidContentId;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<ContentId> for String {
    fn from(id: ContentId) -> Self {
        id.0
    }
}

fn principal_suffix(principal_id: &str) -> String {
    let tail = principal_id
        .rsplit_once(':')
        .map_or(principal_id, |(_, tail)| tail);
    let cleaned = tail.replace('/', "_");
    if cleaned.is_empty() {
        "anonymous".to_string()
    } else {
        cleaned
    }
}

/// Folder segment directly after `content/`, e.g. `content/42-a/160k.ts`
/// belongs to `42-a`. The index object itself is not a folder.
pub fn content_folder(key: &str) -> Option<&str> {
    let rest = key.strip_prefix(CONTENT_PREFIX)?;
    let (folder, _) = rest.split_once('/')?;
    (!folder.is_empty()).then_some(folder)
}

/// Set of known content ids. Serializes newest-first, which for
/// timestamp-prefixed ids is descending lexicographic order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentIndex {
    ids: BTreeSet<String>,
}

impl ContentIndex {
    pub fn from_json(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        let ids: Vec<String> = serde_json::from_slice(bytes)?;
        Ok(ids.into_iter().collect())
    }

    pub fn to_json(&self) -> Vec<u8> {
        // a Vec<&String> always serializes
        serde_json::to_vec(&self.newest_first().collect::<Vec<_>>()).unwrap_or_default()
    }

    /// Returns `false` if the id was already present.
    pub fn insert(&mut self, id: impl Into<String>) -> bool {
        self.ids.insert(id.into())
    }

    pub fn extend_from_keys<'a>(&mut self, keys: impl IntoIterator<Item = &'a str>) {
        self.ids
            .extend(keys.into_iter().filter_map(content_folder).map(str::to_string));
    }

    pub fn merge(&mut self, other: ContentIndex) {
        self.ids.extend(other.ids);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    pub fn latest(&self) -> Option<&str> {
        self.ids.last().map(String::as_str)
    }

    pub fn newest_first(&self) -> impl Iterator<Item = &String> {
        self.ids.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for ContentIndex {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            ids: iter.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use time::macros::datetime;

    #[test]
    fn folder_is_first_segment_after_prefix() {
        assert_eq!(content_folder("content/20-b/default.m3u8"), Some("20-b"));
        assert_eq!(content_folder("content/20-b/160k/00001.ts"), Some("20-b"));
        assert_eq!(content_folder("content/20-b/"), Some("20-b"));
        assert_eq!(content_folder("content/index.json"), None);
        assert_eq!(content_folder("content//x.ts"), None);
        assert_eq!(content_folder("private/u/1.mp4"), None);
    }

    #[test]
    fn serializes_descending_without_duplicates() {
        let mut index: ContentIndex = ["10-a", "30-c", "20-b"].into_iter().collect();
        assert!(!index.insert("20-b"));
        assert_eq!(index.to_json(), br#"["30-c","20-b","10-a"]"#.to_vec());
        assert_eq!(index.latest(), Some("30-c"));
    }

    #[test]
    fn parses_stored_index() {
        let index = ContentIndex::from_json(br#"["2-x","1-y"]"#).unwrap();
        assert_eq!(index.len(), 2);
        assert!(index.contains("1-y"));
        assert!(ContentIndex::from_json(b"{\"not\":\"a list\"}").is_err());
    }

    #[test]
    fn minted_id_has_timestamp_suffix_and_nonce() {
        let mut rng = StdRng::seed_from_u64(7);
        let now = datetime!(2017-03-01 12:00:00 UTC);
        let id = ContentId::mint("AROAEXAMPLE:CognitoIdentityCredentials", now, &mut rng);

        let parts: Vec<&str> = id.as_str().split('-').collect();
        assert_eq!(parts[0], "1488369600000");
        assert_eq!(parts[1], "CognitoIdentityCredentials");
        assert_eq!(parts[2].len(), NONCE_LEN);
        assert!(parts[2].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn minted_ids_differ_within_one_millisecond() {
        let mut rng = StdRng::seed_from_u64(1);
        let now = datetime!(2017-03-01 12:00:00 UTC);
        let a = ContentId::mint("minioadmin", now, &mut rng);
        let b = ContentId::mint("minioadmin", now, &mut rng);
        assert_ne!(a, b);
        assert!(a.as_str().starts_with("1488369600000-minioadmin-"));
    }

    #[test]
    fn principal_slashes_do_not_leak_into_paths() {
        let mut rng = StdRng::seed_from_u64(3);
        let id = ContentId::mint("arn:aws:sts::1:assumed-role/r/s", OffsetDateTime::UNIX_EPOCH, &mut rng);
        assert!(!id.as_str().contains('/'));
        assert!(id.as_str().starts_with("0-assumed-role_r_s-"));
    }

    #[test]
    fn rejects_ids_that_are_not_one_segment() {
        assert_eq!(ContentId::new(""), Err(InvalidContentId::Empty));
        assert!(matches!(ContentId::new("a/b"), Err(InvalidContentId::NotASegment(_))));
        assert!(matches!(ContentId::new("."), Err(InvalidContentId::NotASegment(_))));
        assert!(matches!(ContentId::new(".."), Err(InvalidContentId::NotASegment(_))));
        assert!(ContentId::new("1.5-a").is_ok());
        let id = ContentId::new("20-b").unwrap();
        assert_eq!(id.output_prefix(), "content/20-b/");
        assert_eq!(id.manifest_key(), "content/20-b/default.m3u8");
    }
}
