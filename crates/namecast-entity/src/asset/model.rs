//! Published asset value object.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::recording::MediaKind;

/// File name of the manifest object inside an asset prefix.
pub const MANIFEST_FILE_NAME: &str = "manifest.m3u8";

/// Content type of HLS manifests.
pub const MANIFEST_CONTENT_TYPE: &str = "application/vnd.apple.mpegurl";

/// Content type of MPEG-TS segments.
pub const SEGMENT_CONTENT_TYPE: &str = "video/mp2t";

/// A durably published streaming asset.
///
/// Only built once the backend has acknowledged the manifest and every
/// segment; a partial set is never represented by this type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishedAsset {
    /// Object key of the manifest.
    pub manifest_object_key: String,
    /// Object keys of the segments, in playback order.
    pub segment_object_keys: Vec<String>,
    /// Kind of media.
    pub media_kind: MediaKind,
}

impl PublishedAsset {
    /// Key prefix for the asset one job publishes, e.g. `video/42/{job_id}`.
    ///
    /// Every job writes under its own prefix, so a failed or losing attempt
    /// never overwrites the objects a committed record points at.
    pub fn key_prefix(kind: MediaKind, record_id: i64, job_id: Uuid) -> String {
        format!("{}/{}/{}", kind.as_str(), record_id, job_id)
    }

    /// Manifest key for the asset one job publishes.
    pub fn manifest_key(kind: MediaKind, record_id: i64, job_id: Uuid) -> String {
        format!("{}/{MANIFEST_FILE_NAME}", Self::key_prefix(kind, record_id, job_id))
    }

    /// Every key belonging to the asset, manifest first.
    pub fn all_keys(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.manifest_object_key.as_str())
            .chain(self.segment_object_keys.iter().map(String::as_str))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manifest_key_layout() {
        let job_id = Uuid::nil();
        assert_eq!(
            PublishedAsset::manifest_key(MediaKind::Video, 42, job_id),
            "video/42/00000000-0000-0000-0000-000000000000/manifest.m3u8"
        );
        assert_eq!(
            PublishedAsset::key_prefix(MediaKind::Audio, 7, job_id),
            "audio/7/00000000-0000-0000-0000-000000000000"
        );
    }

    #[test]
    fn test_all_keys_manifest_first() {
        let asset = PublishedAsset {
            manifest_object_key: "video/1/manifest.m3u8".into(),
            segment_object_keys: vec!["video/1/segment_000.ts".into()],
            media_kind: MediaKind::Video,
        };
        let keys: Vec<_> = asset.all_keys().collect();
        assert_eq!(keys, vec!["video/1/manifest.m3u8", "video/1/segment_000.ts"]);
    }
}
