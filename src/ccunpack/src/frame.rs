//! Atlas frame table

use std::collections::BTreeMap;

/// One sprite frame inside a packed atlas
#[derive(Debug, Clone, PartialEq)]
pub struct AtlasFrame {
    pub name: String,
    /// Packed region as declared (x, y, width, height). For rotated frames
    /// width and height are the unrotated sprite size.
    pub rect: [i64; 4],
    /// Trim offset; fractional values occur in the wild
    pub offset: [f64; 2],
    /// Untrimmed sprite size (width, height)
    pub original_size: [i64; 2],
    /// Packed rotated 90 degrees clockwise
    pub rotated: bool,
}

impl AtlasFrame {
    pub fn x(&self) -> i64 {
        self.rect[0]
    }

    pub fn y(&self) -> i64 {
        self.rect[1]
    }

    pub fn width(&self) -> i64 {
        self.rect[2]
    }

    pub fn height(&self) -> i64 {
        self.rect[3]
    }

    /// Frames with an empty region are never sliced
    pub fn is_valid(&self) -> bool {
        self.width() > 0 && self.height() > 0
    }
}

/// A rebuilt atlas descriptor.
///
/// Frames are keyed by name; the map keeps them in the lexicographic order
/// the plist writer needs.
#[derive(Debug, Clone, PartialEq)]
pub struct AtlasDescriptor {
    /// Plist name taken from the atlas marker, e.g. `hetu.plist`
    pub atlas_name: String,
    /// Texture file name derived from `atlas_name`
    pub texture_file_name: String,
    pub frames: BTreeMap<String, AtlasFrame>,
    /// Furthest right and bottom edge over every frame ever inserted
    extent: (i64, i64),
}

impl Default for AtlasDescriptor {
    fn default() -> Self {
        Self {
            atlas_name: "atlas.plist".to_string(),
            texture_file_name: "atlas.png".to_string(),
            frames: BTreeMap::new(),
            extent: (0, 0),
        }
    }
}

impl AtlasDescriptor {
    /// Set the atlas name and derive the texture name from it
    pub fn set_atlas_name(&mut self, name: &str) {
        self.atlas_name = name.to_string();
        self.texture_file_name = name.replacen(".plist", ".png", 1);
    }

    /// Insert a frame, replacing any earlier frame with the same name.
    ///
    /// A replaced frame still counts towards [`AtlasDescriptor::size`].
    pub fn insert(&mut self, frame: AtlasFrame) {
        let (w, h) = self.extent;
        self.extent = (
            w.max(frame.x().saturating_add(frame.width())),
            h.max(frame.y().saturating_add(frame.height())),
        );
        self.frames.insert(frame.name.clone(), frame);
    }

    /// Canvas size: furthest right and bottom edge over all inserted frames.
    ///
    /// Never read from the source document; a descriptor without frames is
    /// 0x0.
    pub fn size(&self) -> (i64, i64) {
        self.extent
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame(name: &str, rect: [i64; 4]) -> AtlasFrame {
        AtlasFrame {
            name: name.to_string(),
            rect,
            offset: [0.0, 0.0],
            original_size: [rect[2], rect[3]],
            rotated: false,
        }
    }

    #[test]
    fn test_size_is_max_extent() {
        let mut desc = AtlasDescriptor::default();
        desc.insert(frame("a", [0, 0, 10, 40]));
        desc.insert(frame("b", [10, 0, 30, 5]));
        desc.insert(frame("c", [0, 40, 2, 2]));
        assert_eq!(desc.size(), (40, 42));
    }

    #[test]
    fn test_empty_descriptor() {
        let desc = AtlasDescriptor::default();
        assert_eq!(desc.size(), (0, 0));
        assert_eq!(desc.texture_file_name, "atlas.png");
    }

    #[test]
    fn test_set_atlas_name() {
        let mut desc = AtlasDescriptor::default();
        desc.set_atlas_name("hetu.plist");
        assert_eq!(desc.atlas_name, "hetu.plist");
        assert_eq!(desc.texture_file_name, "hetu.png");
    }

    #[test]
    fn test_duplicate_name_replaces() {
        let mut desc = AtlasDescriptor::default();
        desc.insert(frame("a", [0, 0, 100, 100]));
        desc.insert(frame("a", [0, 0, 4, 4]));
        assert_eq!(desc.frames.len(), 1);
        assert_eq!(desc.frames["a"].rect, [0, 0, 4, 4]);
        // The replaced frame's extent is kept
        assert_eq!(desc.size(), (100, 100));
    }

    #[test]
    fn test_size_saturates() {
        let mut desc = AtlasDescriptor::default();
        desc.insert(frame("far", [i64::MAX, i64::MAX - 1, 4, 4]));
        assert_eq!(desc.size(), (i64::MAX, i64::MAX));
    }

    #[test]
    fn test_is_valid() {
        assert!(frame("a", [0, 0, 1, 1]).is_valid());
        assert!(!frame("a", [0, 0, 0, 1]).is_valid());
        assert!(!frame("a", [0, 0, 3, -1]).is_valid());
    }
}
