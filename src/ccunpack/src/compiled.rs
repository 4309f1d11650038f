//! Compiled SpriteAtlas JSON -> atlas descriptor
//!
//! Cocos Creator serializes a SpriteAtlas pack as a positional array:
//!
//! ```text
//! [0] version
//! [1] dependency uuids (compressed)
//! [2] names
//! [3] type definitions
//! [4] data references
//! [5] data: one element per serialized object
//! ```
//!
//! Elements of `[5]` carry no type tag. Each one is classified by shape:
//!
//! - `[[[_, "hetu.plist", ...], ...], ...]` is the atlas marker
//! - `[[{"name": ..}], ...]` or `[{"name": ..}, ...]` is a sprite frame
//! - anything else is ignored

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};

use crate::frame::{AtlasDescriptor, AtlasFrame};
use crate::plist::render_plist;
use crate::slicer::{slice_atlas, SliceReport};
use crate::{CancelToken, Error, Result};

/// Position of the data array in the compiled document
pub const DATA_INDEX: usize = 5;

/// Substring that identifies the atlas marker's plist name
const PLIST_MARKER: &str = ".plist";

/// Classification of one element of the data array
#[derive(Debug, Clone, PartialEq)]
pub enum Element<'a> {
    /// Atlas definition carrying the plist name
    AtlasMarker(&'a str),
    /// Sprite frame record
    FrameRecord(&'a Map<String, Value>),
    Unknown,
}

/// Classify a data element in a single pass
pub fn classify(item: &Value) -> Element<'_> {
    let Some(first) = item.as_array().and_then(|a| a.first()) else {
        return Element::Unknown;
    };

    match first {
        Value::Array(outer) => match outer.first() {
            Some(Value::Array(inner)) if inner.len() >= 2 => match inner[1].as_str() {
                Some(name) if name.contains(PLIST_MARKER) => Element::AtlasMarker(name),
                _ => Element::Unknown,
            },
            Some(Value::Object(record)) if has_name(record) => Element::FrameRecord(record),
            _ => Element::Unknown,
        },
        Value::Object(record) if has_name(record) => Element::FrameRecord(record),
        _ => Element::Unknown,
    }
}

fn has_name(record: &Map<String, Value>) -> bool {
    record
        .get("name")
        .and_then(Value::as_str)
        .is_some_and(|s| !s.is_empty())
}

fn int_at(values: Option<&Vec<Value>>, i: usize) -> i64 {
    values
        .and_then(|v| v.get(i))
        .and_then(|n| n.as_i64().or_else(|| n.as_f64().map(|f| f as i64)))
        .unwrap_or(0)
}

fn float_at(values: Option<&Vec<Value>>, i: usize) -> f64 {
    values
        .and_then(|v| v.get(i))
        .and_then(Value::as_f64)
        .unwrap_or(0.0)
}

fn frame_from_record(record: &Map<String, Value>) -> AtlasFrame {
    let rect = record.get("rect").and_then(Value::as_array);
    let offset = record.get("offset").and_then(Value::as_array);
    let original = record.get("originalSize").and_then(Value::as_array);

    AtlasFrame {
        name: record
            .get("name")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string(),
        rect: [
            int_at(rect, 0),
            int_at(rect, 1),
            int_at(rect, 2),
            int_at(rect, 3),
        ],
        offset: [float_at(offset, 0), float_at(offset, 1)],
        original_size: [int_at(original, 0), int_at(original, 1)],
        rotated: record
            .get("rotated")
            .and_then(Value::as_bool)
            .unwrap_or(false),
    }
}

/// Build a descriptor from a parsed compiled document
pub fn parse_compiled(document: &Value) -> Result<AtlasDescriptor> {
    let data = document
        .get(DATA_INDEX)
        .and_then(Value::as_array)
        .ok_or_else(|| {
            Error::InvalidDescriptor(format!("element [{}] is not a data array", DATA_INDEX))
        })?;

    let mut descriptor = AtlasDescriptor::default();
    for item in data {
        match classify(item) {
            Element::AtlasMarker(name) => descriptor.set_atlas_name(name),
            Element::FrameRecord(record) => descriptor.insert(frame_from_record(record)),
            Element::Unknown => {}
        }
    }

    Ok(descriptor)
}

/// Convert a compiled JSON file into a plist.
///
/// `output` defaults to `json_path` with its extension replaced by `.plist`.
/// Returns the path written.
pub fn convert_file(json_path: &Path, output: Option<&Path>) -> Result<PathBuf> {
    let content = std::fs::read_to_string(json_path)?;
    let document: Value = serde_json::from_str(&content)?;
    let descriptor = parse_compiled(&document)?;

    let output = match output {
        Some(p) => p.to_path_buf(),
        None => json_path.with_extension("plist"),
    };
    std::fs::write(&output, render_plist(&descriptor))?;

    let empty = descriptor.frames.values().filter(|f| !f.is_valid()).count();
    if empty > 0 {
        tracing::debug!("{:?}: {} frames have an empty region", json_path, empty);
    }

    let (width, height) = descriptor.size();
    tracing::debug!(
        "Converted {:?} -> {:?}: {} frames, texture {}, size {}x{}",
        json_path,
        output,
        descriptor.frames.len(),
        descriptor.texture_file_name,
        width,
        height
    );

    Ok(output)
}

/// Outcome of converting one file in a directory batch
#[derive(Debug)]
pub struct ConversionResult {
    pub file: String,
    pub output: Option<PathBuf>,
    pub error: Option<String>,
}

impl ConversionResult {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

/// Convert every `*.json` directly inside `dir`.
///
/// Plists go next to their source unless `output_dir` is given. A file that
/// fails to convert is recorded and the batch continues.
pub fn convert_directory(dir: &Path, output_dir: Option<&Path>) -> Result<Vec<ConversionResult>> {
    if !dir.is_dir() {
        return Err(Error::NotFound(dir.to_path_buf()));
    }
    if let Some(out) = output_dir {
        std::fs::create_dir_all(out)?;
    }

    let mut json_files: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "json"))
        .collect();
    json_files.sort();

    tracing::info!("Found {} JSON files in {:?}", json_files.len(), dir);

    let results: Vec<ConversionResult> = json_files
        .iter()
        .map(|path| {
            let file = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let target = output_dir.map(|out| out.join(Path::new(&file).with_extension("plist")));

            match convert_file(path, target.as_deref()) {
                Ok(output) => ConversionResult {
                    file,
                    output: Some(output),
                    error: None,
                },
                Err(e) => {
                    tracing::warn!("Failed to convert {}: {}", file, e);
                    ConversionResult {
                        file,
                        output: None,
                        error: Some(e.to_string()),
                    }
                }
            }
        })
        .collect();

    let ok = results.iter().filter(|r| r.is_success()).count();
    tracing::info!("Converted {}/{} files", ok, results.len());

    Ok(results)
}

/// Convert `json_path` to a plist beside it, then slice `image_path` with it
pub fn full(
    json_path: &Path,
    image_path: &Path,
    output_dir: Option<&Path>,
    cancel: &CancelToken,
) -> Result<SliceReport> {
    let plist = convert_file(json_path, None)?;
    tracing::info!("Generated {:?}", plist);
    slice_atlas(image_path, &plist, output_dir, cancel)
}
