//! Bundle manifest (`config.json`)
//!
//! ```json
//! {
//!   "paths": { "3": ["pic/hetu", 1] },
//!   "uuids": ["a8Pd5mZ0tJ3LXlV0/Mk2nB", ...],
//!   "types": ["cc.Asset", "cc.SpriteAtlas", ...],
//!   "packs": { "0faa447ee": [...] }
//! }
//! ```
//!
//! `paths` is keyed by the decimal index into `uuids`; the second entry of
//! each value indexes `types`.

use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use crate::uuid::{decompress, shard};
use crate::{Error, Result};

pub const MANIFEST_FILE: &str = "config.json";

/// Type of opaque blobs that are never copied out
pub const BASE_ASSET_TYPE: &str = "cc.Asset";

/// Type whose serialized JSON wraps the real skeleton document
pub const SKELETON_TYPE: &str = "sp.SkeletonData";

/// Extension of pack descriptors; always copied regardless of type
pub const PACK_EXTENSION: &str = ".atlas";

/// Compressed texture extension, and what it becomes once decoded upstream
pub const COMPRESSED_TEXTURE_EXTENSION: &str = ".astc";
pub const DECODED_TEXTURE_EXTENSION: &str = ".webp";

#[derive(Debug, Default, Deserialize)]
struct RawManifest {
    #[serde(default)]
    paths: BTreeMap<String, Vec<Value>>,
    #[serde(default)]
    uuids: Vec<String>,
    #[serde(default)]
    types: Vec<String>,
    #[serde(default)]
    packs: BTreeMap<String, Value>,
}

/// A loaded manifest with its inverse lookups.
///
/// Built fresh for every bundle; nothing is cached across loads.
#[derive(Debug, Default)]
pub struct Manifest {
    paths: BTreeMap<usize, (String, Option<usize>)>,
    uuids: Vec<String>,
    types: Vec<String>,
    packs: Vec<String>,
    index_by_uuid: HashMap<String, usize>,
}

/// One path-table entry resolved against `uuids` and `types`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetRecord {
    pub index: usize,
    pub logical_path: String,
    pub type_name: String,
    pub compressed_id: String,
    pub canonical_id: String,
    /// Extension found in a store, with its leading dot
    pub extension: Option<String>,
}

impl AssetRecord {
    /// Store shard directory name
    pub fn shard(&self) -> &str {
        shard(&self.canonical_id)
    }

    /// Copy policy: pack descriptors always, everything else unless it is an
    /// opaque base asset
    pub fn should_copy(&self) -> bool {
        match self.extension.as_deref() {
            None | Some("") => false,
            Some(ext) => ext == PACK_EXTENSION || self.type_name != BASE_ASSET_TYPE,
        }
    }

    /// Extension used for the copied file. Compressed textures, in any
    /// letter case, map to their decoded form.
    pub fn output_extension(&self) -> Option<String> {
        self.extension.as_deref().map(|ext| {
            if ext.eq_ignore_ascii_case(COMPRESSED_TEXTURE_EXTENSION) {
                DECODED_TEXTURE_EXTENSION.to_string()
            } else {
                ext.to_string()
            }
        })
    }

    /// `<logical path><extension>` relative to the output root
    pub fn output_path(&self) -> Option<PathBuf> {
        self.output_extension()
            .map(|ext| PathBuf::from(format!("{}{}", self.logical_path, ext)))
    }

    pub fn is_skeleton(&self) -> bool {
        self.type_name == SKELETON_TYPE
    }
}

impl Manifest {
    /// Load `<bundle>/config.json`
    pub fn load(bundle: &Path) -> Result<Self> {
        let path = bundle.join(MANIFEST_FILE);
        if !path.is_file() {
            return Err(Error::ConfigMissing(bundle.to_path_buf()));
        }
        let content = std::fs::read_to_string(&path)?;
        Self::parse(&content)
    }

    pub fn parse(json: &str) -> Result<Self> {
        let raw: RawManifest = serde_json::from_str(json)?;
        Ok(Self::from_raw(raw))
    }

    fn from_raw(raw: RawManifest) -> Self {
        let mut paths = BTreeMap::new();
        for (key, entry) in raw.paths {
            let Ok(index) = key.parse::<usize>() else {
                tracing::debug!("Ignoring non-numeric path key {:?}", key);
                continue;
            };
            let Some(logical) = entry.first().and_then(Value::as_str) else {
                tracing::debug!("Ignoring path entry {} without a logical path", index);
                continue;
            };
            let type_index = entry.get(1).and_then(Value::as_u64).map(|t| t as usize);
            paths.insert(index, (logical.to_string(), type_index));
        }

        // First occurrence wins for duplicated uuids
        let mut index_by_uuid = HashMap::with_capacity(raw.uuids.len());
        for (i, id) in raw.uuids.iter().enumerate() {
            index_by_uuid.entry(id.clone()).or_insert(i);
        }

        Self {
            paths,
            uuids: raw.uuids,
            types: raw.types,
            packs: raw.packs.into_keys().collect(),
            index_by_uuid,
        }
    }

    /// Path-table records in ascending index order
    pub fn records(&self) -> impl Iterator<Item = AssetRecord> + '_ {
        self.paths.iter().map(|(&index, (logical, type_index))| {
            let compressed_id = self.uuids.get(index).cloned().unwrap_or_default();
            let canonical_id = decompress(&compressed_id);
            AssetRecord {
                index,
                logical_path: logical.clone(),
                type_name: type_index
                    .and_then(|t| self.types.get(t))
                    .cloned()
                    .unwrap_or_default(),
                compressed_id,
                canonical_id,
                extension: None,
            }
        })
    }

    pub fn record_count(&self) -> usize {
        self.paths.len()
    }

    /// Full ids of every pack, sorted
    pub fn packs(&self) -> &[String] {
        &self.packs
    }

    pub fn index_of(&self, compressed_id: &str) -> Option<usize> {
        self.index_by_uuid.get(compressed_id).copied()
    }

    pub fn logical_path(&self, index: usize) -> Option<&str> {
        self.paths.get(&index).map(|(p, _)| p.as_str())
    }

    /// Logical path of the asset a compressed uuid refers to
    pub fn resolve_reference(&self, compressed_id: &str) -> Option<&str> {
        self.index_of(compressed_id).and_then(|i| self.logical_path(i))
    }
}

/// Compressed uuid of the atlas a serialized pack belongs to, found in the
/// pack's dependency list
pub fn pack_reference(document: &Value) -> Option<&str> {
    document.get(1)?.get(0)?.as_str()
}

/// The skeleton document nested in serialized skeleton data
pub fn skeleton_payload(document: &Value) -> Option<&Value> {
    document
        .get(5)?
        .get(0)?
        .get(4)
        .filter(|payload| !payload.is_null())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Manifest {
        Manifest::parse(
            &json!({
                "paths": {
                    "10": ["audio/click", 0],
                    "2": ["spine/hero", 2],
                    "3": ["pic/hetu", 1],
                    "meta": ["ignored", 0],
                    "4": [7]
                },
                "uuids": [
                    "fcmR3XADNLgJ1ByKhqcC5Z",
                    "a8Pd5mZ0tJ3LXlV0/Mk2nB",
                    "01234////////////////////",
                    "a8Pd5mZ0tJ3LXlV0/Mk2nB"
                ],
                "types": ["cc.Asset", "cc.SpriteAtlas", "sp.SkeletonData"],
                "packs": { "0faa447ee": [3] }
            })
            .to_string(),
        )
        .unwrap()
    }

    #[test]
    fn test_records_in_index_order() {
        let manifest = sample();
        let indices: Vec<usize> = manifest.records().map(|r| r.index).collect();
        assert_eq!(indices, vec![2, 3, 10]);
        assert_eq!(manifest.record_count(), 3);
    }

    #[test]
    fn test_record_fields() {
        let manifest = sample();
        let hetu = manifest.records().find(|r| r.index == 3).unwrap();
        assert_eq!(hetu.logical_path, "pic/hetu");
        assert_eq!(hetu.type_name, "cc.SpriteAtlas");
        assert_eq!(hetu.compressed_id, "a8Pd5mZ0tJ3LXlV0/Mk2nB");
        assert_eq!(hetu.canonical_id.len(), 36);
        assert_eq!(hetu.shard(), "a8");

        // Index past the end of `uuids`
        let click = manifest.records().find(|r| r.index == 10).unwrap();
        assert_eq!(click.compressed_id, "");
        assert_eq!(click.type_name, "cc.Asset");
    }

    #[test]
    fn test_inverse_lookup_first_occurrence() {
        let manifest = sample();
        assert_eq!(manifest.index_of("a8Pd5mZ0tJ3LXlV0/Mk2nB"), Some(1));
        assert_eq!(manifest.index_of("unknown"), None);
        assert_eq!(manifest.resolve_reference("fcmR3XADNLgJ1ByKhqcC5Z"), None);
        assert_eq!(manifest.logical_path(3), Some("pic/hetu"));
        assert_eq!(manifest.packs(), ["0faa447ee".to_string()]);
    }

    #[test]
    fn test_missing_sections_default() {
        let manifest = Manifest::parse("{}").unwrap();
        assert_eq!(manifest.record_count(), 0);
        assert!(manifest.packs().is_empty());
    }

    #[test]
    fn test_load_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = Manifest::load(dir.path()).unwrap_err();
        assert!(matches!(err, Error::ConfigMissing(_)));
    }

    fn record(type_name: &str, extension: Option<&str>) -> AssetRecord {
        AssetRecord {
            index: 0,
            logical_path: "pic/bg".to_string(),
            type_name: type_name.to_string(),
            compressed_id: String::new(),
            canonical_id: String::new(),
            extension: extension.map(str::to_string),
        }
    }

    #[test]
    fn test_copy_policy() {
        assert!(record("cc.Texture2D", Some(".png")).should_copy());
        assert!(record("cc.Asset", Some(".atlas")).should_copy());
        assert!(!record("cc.Asset", Some(".bin")).should_copy());
        assert!(!record("cc.Texture2D", None).should_copy());
    }

    #[test]
    fn test_compressed_texture_extension() {
        let r = record("cc.Texture2D", Some(".astc"));
        assert_eq!(r.output_extension().as_deref(), Some(".webp"));
        assert_eq!(r.output_path(), Some(PathBuf::from("pic/bg.webp")));

        let upper = record("cc.Texture2D", Some(".ASTC"));
        assert_eq!(upper.output_extension().as_deref(), Some(".webp"));

        let png = record("cc.Texture2D", Some(".PNG"));
        assert_eq!(png.output_extension().as_deref(), Some(".PNG"));
    }

    #[test]
    fn test_pack_reference() {
        let doc = json!([1, ["a8Pd5mZ0tJ3LXlV0/Mk2nB"], [], [], [], []]);
        assert_eq!(pack_reference(&doc), Some("a8Pd5mZ0tJ3LXlV0/Mk2nB"));
        assert_eq!(pack_reference(&json!([1, []])), None);
        assert_eq!(pack_reference(&json!({})), None);
    }

    #[test]
    fn test_skeleton_payload() {
        let doc = json!([1, [], [], [], [], [[0, "hero", "", [], {"bones": []}]]]);
        assert_eq!(skeleton_payload(&doc), Some(&json!({"bones": []})));

        let empty = json!([1, [], [], [], [], [[0, "hero", "", [], null]]]);
        assert_eq!(skeleton_payload(&empty), None);
        assert_eq!(skeleton_payload(&json!([1])), None);
    }
}
