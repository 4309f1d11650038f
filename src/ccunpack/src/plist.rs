//! TexturePacker-style plist (format 3) writing and reading
//!
//! The written layout is fixed: downstream engines and tools match on the
//! exact key names and nesting, so [`render_plist`] emits the document with a
//! hand-written template rather than a generic serializer.
//!
//! Reading goes the other way. A frame dict holds its values in document
//! order, but only some of them are `<string>`s: `aliases` is an `<array/>` and
//! `textureRotated` is a bare `<true/>`/`<false/>`. The reader collects each
//! dict's keys and strings as parallel lists and re-pairs them, skipping the
//! non-string keys.

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;

use crate::coords::parse_coordinates;
use crate::frame::AtlasDescriptor;
use crate::{Error, Result, FRAME_EXTENSION};

/// Plist `metadata.format` value
pub const FORMAT_VERSION: u32 = 3;

/// Plist `metadata.pixelFormat` value
pub const PIXEL_FORMAT: &str = "RGBA8888";

/// Frame keys whose values are not `<string>` elements
const NON_STRING_KEYS: &[&str] = &["aliases", "textureRotated", "rotated"];

/// Format numbers the way the descriptors have always been written:
/// integers without a fraction, negative zero as `0`.
fn number(v: f64) -> String {
    if v == 0.0 {
        "0".to_string()
    } else if v.fract() == 0.0 && v.abs() < 1e15 {
        format!("{}", v as i64)
    } else {
        format!("{}", v)
    }
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

fn unescape(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&apos;", "'")
        .replace("&amp;", "&")
}

/// Render a descriptor as plist XML
pub fn render_plist(descriptor: &AtlasDescriptor) -> String {
    let mut xml = String::new();
    xml.push_str("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n");
    xml.push_str("<!DOCTYPE plist PUBLIC \"-//Apple Computer//DTD PLIST 1.0//EN\" \"http://www.apple.com/DTDs/PropertyList-1.0.dtd\">\n");
    xml.push_str("<plist version=\"1.0\">\n");
    xml.push_str("    <dict>\n");
    xml.push_str("        <key>frames</key>\n");
    xml.push_str("        <dict>\n");

    for (name, frame) in &descriptor.frames {
        let [x, y, w, h] = frame.rect;
        let [ox, oy] = frame.offset;
        let [ow, oh] = frame.original_size;

        xml.push_str(&format!(
            "            <key>{}.{}</key>\n",
            escape(name),
            FRAME_EXTENSION
        ));
        xml.push_str("            <dict>\n");
        xml.push_str("                <key>aliases</key>\n");
        xml.push_str("                <array/>\n");
        xml.push_str("                <key>spriteOffset</key>\n");
        xml.push_str(&format!(
            "                <string>{{{},{}}}</string>\n",
            number(ox),
            number(oy)
        ));
        xml.push_str("                <key>spriteSize</key>\n");
        xml.push_str(&format!(
            "                <string>{{{},{}}}</string>\n",
            ow, oh
        ));
        xml.push_str("                <key>spriteSourceSize</key>\n");
        xml.push_str(&format!(
            "                <string>{{{},{}}}</string>\n",
            ow, oh
        ));
        xml.push_str("                <key>textureRect</key>\n");
        xml.push_str(&format!(
            "                <string>{{{{{},{}}},{{{},{}}}}}</string>\n",
            x, y, w, h
        ));
        xml.push_str("                <key>textureRotated</key>\n");
        xml.push_str(&format!("                <{}/>\n", frame.rotated));
        xml.push_str("            </dict>\n");
    }

    let (width, height) = descriptor.size();
    let texture = escape(&descriptor.texture_file_name);

    xml.push_str("        </dict>\n");
    xml.push_str("        <key>metadata</key>\n");
    xml.push_str("        <dict>\n");
    xml.push_str("            <key>format</key>\n");
    xml.push_str(&format!(
        "            <integer>{}</integer>\n",
        FORMAT_VERSION
    ));
    xml.push_str("            <key>pixelFormat</key>\n");
    xml.push_str(&format!("            <string>{}</string>\n", PIXEL_FORMAT));
    xml.push_str("            <key>premultiplyAlpha</key>\n");
    xml.push_str("            <false/>\n");
    xml.push_str("            <key>realTextureFileName</key>\n");
    xml.push_str(&format!("            <string>{}</string>\n", texture));
    xml.push_str("            <key>size</key>\n");
    xml.push_str(&format!(
        "            <string>{{{},{}}}</string>\n",
        width, height
    ));
    xml.push_str("            <key>smartupdate</key>\n");
    xml.push_str("            <string>$TexturePacker:SmartUpdate:generated$</string>\n");
    xml.push_str("            <key>textureFileName</key>\n");
    xml.push_str(&format!("            <string>{}</string>\n", texture));
    xml.push_str("        </dict>\n");
    xml.push_str("    </dict>\n");
    xml.push_str("</plist>\n");

    xml
}

/// A frame as read back from a plist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlistFrame {
    /// Frame key without its image extension
    pub name: String,
    pub x: i64,
    pub y: i64,
    pub width: i64,
    pub height: i64,
    pub offset_x: i64,
    pub offset_y: i64,
    pub original_width: i64,
    pub original_height: i64,
    pub rotated: bool,
}

/// A `<dict>` with its children grouped by element kind
#[derive(Debug, Default)]
struct Dict {
    keys: Vec<String>,
    strings: Vec<String>,
    dicts: Vec<Dict>,
    trues: usize,
    /// `<array>` nesting depth at which this dict was opened
    depth: usize,
}

fn tag_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"<(/?)([A-Za-z][A-Za-z0-9]*)\b[^>]*?(/?)>").expect("valid tag pattern")
    })
}

/// The innermost dict, unless the current element sits inside one of its arrays
fn owner(stack: &mut [Dict], array_depth: usize) -> Option<&mut Dict> {
    stack.last_mut().filter(|d| d.depth == array_depth)
}

/// Group the document's dicts. Returns the outermost dict.
fn read_dicts(xml: &str) -> Result<Dict> {
    let mut stack: Vec<Dict> = Vec::new();
    let mut root: Option<Dict> = None;
    let mut array_depth = 0usize;
    let mut last_end = 0;

    for caps in tag_pattern().captures_iter(xml) {
        let Some(whole) = caps.get(0) else {
            continue;
        };
        let text = &xml[last_end..whole.start()];
        last_end = whole.end();

        let closing = !caps[1].is_empty();
        let self_closing = !caps[3].is_empty();
        let tag = &caps[2];

        match (tag, closing) {
            ("dict", false) if self_closing => {
                let stack_empty = stack.is_empty();
                match owner(&mut stack, array_depth) {
                    Some(d) => d.dicts.push(Dict::default()),
                    None if stack_empty => {
                        root.get_or_insert_with(Dict::default);
                    }
                    None => {}
                }
            }
            ("dict", false) => stack.push(Dict {
                depth: array_depth,
                ..Dict::default()
            }),
            ("dict", true) => {
                let Some(done) = stack.pop() else {
                    return Err(Error::InvalidPlist("unbalanced </dict>".to_string()));
                };
                match stack.last_mut() {
                    Some(parent) if parent.depth == done.depth => parent.dicts.push(done),
                    Some(_) => {}
                    None => {
                        root.get_or_insert(done);
                    }
                }
            }
            ("array", false) if !self_closing => array_depth += 1,
            ("array", true) => array_depth = array_depth.saturating_sub(1),
            ("key", false) if self_closing => {
                if let Some(d) = owner(&mut stack, array_depth) {
                    d.keys.push(String::new());
                }
            }
            ("string", false) if self_closing => {
                if let Some(d) = owner(&mut stack, array_depth) {
                    d.strings.push(String::new());
                }
            }
            ("key", true) => {
                if let Some(d) = owner(&mut stack, array_depth) {
                    d.keys.push(unescape(text));
                }
            }
            ("string", true) => {
                if let Some(d) = owner(&mut stack, array_depth) {
                    d.strings.push(unescape(text));
                }
            }
            ("true", false) => {
                if let Some(d) = owner(&mut stack, array_depth) {
                    d.trues += 1;
                }
            }
            _ => {}
        }
    }

    root.ok_or_else(|| Error::InvalidPlist("no <dict> element".to_string()))
}

fn frame_from_dict(key: &str, dict: &Dict) -> Option<PlistFrame> {
    let mut values: Vec<(&str, &str)> = Vec::new();
    let mut strings = dict.strings.iter();
    for k in &dict.keys {
        if NON_STRING_KEYS.contains(&k.as_str()) {
            continue;
        }
        match strings.next() {
            Some(s) => values.push((k.as_str(), s.as_str())),
            None => break,
        }
    }
    let value = |names: &[&str]| {
        values
            .iter()
            .find(|(k, _)| names.contains(k))
            .map(|(_, v)| *v)
            .unwrap_or("")
    };

    let rect = parse_coordinates(value(&["textureRect", "frame"]));
    let offset = parse_coordinates(value(&["spriteOffset", "offset"]));
    let size = parse_coordinates(value(&["spriteSourceSize", "sourceSize"]));

    if rect.len() < 4 || rect[2] <= 0 || rect[3] <= 0 {
        return None;
    }

    let nonzero_or = |v: Option<&i64>, fallback: i64| match v {
        Some(&n) if n != 0 => n,
        _ => fallback,
    };

    let extension = format!(".{}", FRAME_EXTENSION);
    Some(PlistFrame {
        name: key.strip_suffix(&extension).unwrap_or(key).to_string(),
        x: rect[0],
        y: rect[1],
        width: rect[2],
        height: rect[3],
        offset_x: offset.first().copied().unwrap_or(0),
        offset_y: offset.get(1).copied().unwrap_or(0),
        original_width: nonzero_or(size.first(), rect[2]),
        original_height: nonzero_or(size.get(1), rect[3]),
        rotated: dict.trues > 0,
    })
}

/// Parse the frames of a plist document.
///
/// Frames whose width or height is not positive are dropped here and never
/// reach the slicer.
pub fn parse_plist(xml: &str) -> Result<Vec<PlistFrame>> {
    let root = read_dicts(xml)?;
    let frames = root
        .dicts
        .first()
        .ok_or_else(|| Error::InvalidPlist("missing frames dict".to_string()))?;

    Ok(frames
        .keys
        .iter()
        .zip(&frames.dicts)
        .filter_map(|(key, dict)| frame_from_dict(key, dict))
        .collect())
}

/// Read and parse a plist file
pub fn parse_plist_file(path: &Path) -> Result<Vec<PlistFrame>> {
    let xml = std::fs::read_to_string(path)?;
    parse_plist(&xml)
}
