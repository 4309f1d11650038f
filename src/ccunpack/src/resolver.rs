//! Bundle resolution
//!
//! Walks the manifest, copies every resolvable asset out of the sharded
//! stores under its logical path, rebuilds atlas plists from packs and slices
//! every atlas that has an image beside it.

use serde_json::Value;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::compiled::convert_file;
use crate::manifest::{pack_reference, skeleton_payload, AssetRecord, Manifest};
use crate::slicer::{find_sibling_image, slice_atlas};
use crate::uuid::shard;
use crate::{join_within, CancelToken, Error, Result, StagingFile};

pub const IMPORT_DIR: &str = "import";
pub const NATIVE_DIR: &str = "native";

/// Progress reported once copying and pack conversion are done
const COPY_PHASE_PROGRESS: f32 = 10.0;

#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Output directory; defaults to `out/<bundle name>` under the working
    /// directory
    pub output: Option<PathBuf>,
    /// Fail the bundle when any manifest record resolves to no file
    pub strict: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BundleReport {
    pub output_dir: PathBuf,
    pub records_copied: usize,
    pub records_skipped: usize,
    pub records_missing: usize,
    pub skeletons_extracted: usize,
    pub packs_converted: usize,
    pub packs_failed: usize,
    pub atlases_sliced: usize,
    pub atlases_failed: usize,
    pub frames_written: usize,
    pub frame_errors: usize,
}

/// Default output directory for a bundle
pub fn default_output_dir(bundle: &Path) -> PathBuf {
    PathBuf::from("out").join(bundle.file_name().unwrap_or_default())
}

/// Unpack one bundle.
///
/// `progress` receives non-decreasing percentages: 10 after copying, then
/// up to 100 across slicing. If cancelled, an output directory created by
/// this call is removed again.
pub fn process_bundle(
    bundle: &Path,
    options: &ResolveOptions,
    cancel: &CancelToken,
    progress: &mut dyn FnMut(f32),
) -> Result<BundleReport> {
    let manifest = Manifest::load(bundle)?;

    let import = bundle.join(IMPORT_DIR);
    let native = bundle.join(NATIVE_DIR);
    for store in [&import, &native] {
        if !store.is_dir() {
            return Err(Error::StoreMissing(store.clone()));
        }
    }

    let output_dir = options
        .output
        .clone()
        .unwrap_or_else(|| default_output_dir(bundle));
    let created = !output_dir.exists();
    std::fs::create_dir_all(&output_dir)?;

    tracing::info!(
        "Unpacking {:?} -> {:?} ({} records, {} packs)",
        bundle,
        output_dir,
        manifest.record_count(),
        manifest.packs().len()
    );

    let resolver = Resolver {
        manifest: &manifest,
        stores: [import, native],
        output_dir: &output_dir,
        cancel,
    };
    let result = resolver.run(options.strict, progress);

    if matches!(result, Err(Error::Cancelled)) && created {
        if let Err(e) = std::fs::remove_dir_all(&output_dir) {
            tracing::warn!("Failed to remove {:?}: {}", output_dir, e);
        }
    }

    result
}

struct Resolver<'a> {
    manifest: &'a Manifest,
    stores: [PathBuf; 2],
    output_dir: &'a Path,
    cancel: &'a CancelToken,
}

/// Outcome of looking one record up in one store
enum Lookup {
    Copied,
    Skipped,
    Missing,
}

impl Resolver<'_> {
    fn run(&self, strict: bool, progress: &mut dyn FnMut(f32)) -> Result<BundleReport> {
        let mut report = BundleReport {
            output_dir: self.output_dir.to_path_buf(),
            ..Default::default()
        };

        for record in self.manifest.records() {
            self.cancel.check()?;
            self.resolve_record(record, &mut report)?;
        }

        if report.records_missing > 0 {
            tracing::debug!("{} records resolved to no file", report.records_missing);
            if strict {
                return Err(Error::UnresolvedRecords {
                    count: report.records_missing,
                });
            }
        }

        for pack in self.manifest.packs() {
            self.cancel.check()?;
            match self.convert_pack(pack) {
                Ok(plist) => {
                    tracing::debug!("Pack {} -> {:?}", pack, plist);
                    report.packs_converted += 1;
                }
                Err(Error::Cancelled) => return Err(Error::Cancelled),
                Err(e) => {
                    tracing::warn!("Pack {} not converted: {}", pack, e);
                    report.packs_failed += 1;
                }
            }
        }

        progress(COPY_PHASE_PROGRESS);

        self.slice_all(&mut report, progress)?;

        tracing::info!(
            "Copied {} files, converted {} packs, sliced {} atlases ({} frames, {} errors)",
            report.records_copied,
            report.packs_converted,
            report.atlases_sliced,
            report.frames_written,
            report.frame_errors
        );

        Ok(report)
    }

    fn resolve_record(&self, record: AssetRecord, report: &mut BundleReport) -> Result<()> {
        if record.canonical_id.is_empty() {
            report.records_missing += 1;
            return Ok(());
        }

        let mut outcome = Lookup::Missing;
        for store in &self.stores {
            match self.copy_from_store(store, &record, report)? {
                Lookup::Copied => outcome = Lookup::Copied,
                Lookup::Skipped if matches!(outcome, Lookup::Missing) => outcome = Lookup::Skipped,
                _ => {}
            }
        }

        match outcome {
            Lookup::Copied => {}
            Lookup::Skipped => report.records_skipped += 1,
            Lookup::Missing => {
                tracing::debug!(
                    "Record {} ({}) not found in any store",
                    record.index,
                    record.logical_path
                );
                report.records_missing += 1;
            }
        }
        Ok(())
    }

    fn copy_from_store(
        &self,
        store: &Path,
        record: &AssetRecord,
        report: &mut BundleReport,
    ) -> Result<Lookup> {
        let shard_dir = store.join(record.shard());
        let Some(extension) = find_extension(&shard_dir, &record.canonical_id)? else {
            return Ok(Lookup::Missing);
        };

        let record = AssetRecord {
            extension: Some(extension),
            ..record.clone()
        };
        if !record.should_copy() {
            return Ok(Lookup::Skipped);
        }

        let (Some(output_ext), Some(relative)) = (record.output_extension(), record.output_path())
        else {
            return Ok(Lookup::Missing);
        };

        // Compressed textures are read from their decoded sibling
        let source = shard_dir.join(format!("{}{}", record.canonical_id, output_ext));
        if !source.is_file() {
            return Ok(Lookup::Missing);
        }

        let target = match join_within(self.output_dir, &relative) {
            Ok(target) => target,
            Err(e) => {
                tracing::warn!("Record {} not copied: {}", record.index, e);
                return Ok(Lookup::Missing);
            }
        };
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&source, &target)?;
        report.records_copied += 1;
        tracing::debug!("{:?} -> {:?}", source, target);

        if record.is_skeleton() && output_ext == ".json" && extract_skeleton(&source, &target)? {
            report.skeletons_extracted += 1;
        }

        Ok(Lookup::Copied)
    }

    /// Rebuild the plist of one pack at `<logical path>.plist`
    fn convert_pack(&self, pack: &str) -> Result<PathBuf> {
        let source = self.stores[0]
            .join(shard(pack))
            .join(format!("{}.json", pack));
        if !source.is_file() {
            return Err(Error::NotFound(source));
        }

        let document: Value = serde_json::from_str(&std::fs::read_to_string(&source)?)?;
        let reference = pack_reference(&document).ok_or_else(|| {
            Error::InvalidDescriptor("pack has no atlas reference".to_string())
        })?;
        let logical = self.manifest.resolve_reference(reference).ok_or_else(|| {
            Error::InvalidDescriptor(format!("atlas reference {} is not in the manifest", reference))
        })?;

        let staging = StagingFile::new(join_within(
            self.output_dir,
            format!("{}.tmp.json", logical),
        )?);
        let plist = join_within(self.output_dir, format!("{}.plist", logical))?;
        if let Some(parent) = plist.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::copy(&source, staging.path())?;
        convert_file(staging.path(), Some(&plist))
    }

    fn slice_all(&self, report: &mut BundleReport, progress: &mut dyn FnMut(f32)) -> Result<()> {
        let plists = find_plists(self.output_dir)?;
        let total = plists.len();

        for (i, plist) in plists.iter().enumerate() {
            self.cancel.check()?;

            if let Some(image) = find_sibling_image(plist) {
                match slice_atlas(&image, plist, None, self.cancel) {
                    Ok(r) => {
                        report.atlases_sliced += 1;
                        report.frames_written += r.succeeded;
                        report.frame_errors += r.failed;
                    }
                    Err(Error::Cancelled) => return Err(Error::Cancelled),
                    Err(e) => {
                        tracing::warn!("Failed to slice {:?}: {}", plist, e);
                        report.atlases_failed += 1;
                    }
                }
            } else {
                tracing::debug!("No image beside {:?}", plist);
            }

            let done = (i + 1) as f32 / total as f32;
            progress(COPY_PHASE_PROGRESS + done * (100.0 - COPY_PHASE_PROGRESS));
        }

        if total == 0 {
            progress(100.0);
        }
        Ok(())
    }
}

/// Extension (with leading dot) of the first file in `shard_dir`, by name,
/// whose stem is `canonical_id`
pub fn find_extension(shard_dir: &Path, canonical_id: &str) -> Result<Option<String>> {
    if !shard_dir.is_dir() {
        return Ok(None);
    }

    let mut names: Vec<PathBuf> = std::fs::read_dir(shard_dir)?
        .filter_map(|e| e.ok())
        .map(|e| PathBuf::from(e.file_name()))
        .collect();
    names.sort();

    Ok(names.iter().find_map(|name| {
        let stem = name.file_stem()?;
        let ext = name.extension()?;
        (stem == canonical_id && !ext.is_empty()).then(|| format!(".{}", ext.to_string_lossy()))
    }))
}

/// Replace a copied skeleton file with the skeleton document it wraps.
///
/// Returns false, leaving the copy untouched, if the payload is absent.
fn extract_skeleton(source: &Path, target: &Path) -> Result<bool> {
    let content = std::fs::read_to_string(source)?;
    let document: Value = match serde_json::from_str(&content) {
        Ok(v) => v,
        Err(e) => {
            tracing::warn!("Skeleton data {:?} is not valid JSON: {}", source, e);
            return Ok(false);
        }
    };

    match skeleton_payload(&document) {
        Some(payload) => {
            std::fs::write(target, serde_json::to_string(payload)?)?;
            Ok(true)
        }
        None => {
            tracing::warn!("Skeleton data {:?} has no payload, kept as copied", source);
            Ok(false)
        }
    }
}

/// Every `*.plist` under `root`, sorted by path
fn find_plists(root: &Path) -> Result<Vec<PathBuf>> {
    let mut plists = Vec::new();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && entry.path().extension().is_some_and(|e| e == "plist") {
            plists.push(entry.into_path());
        }
    }
    Ok(plists)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::uuid::decompress;
    use image::{GenericImageView, ImageFormat, Rgba, RgbaImage};
    use serde_json::json;

    const ATLAS_ID: &str = "a8Pd5mZ0tJ3LXlV0/Mk2nB";
    const TEXTURE_ID: &str = "fcmR3XADNLgJ1ByKhqcC5Z";
    const BLOB_ID: &str = "abBABABABABABABABABABA";
    const SKELETON_ID: &str = "01234//////////////////";
    const LOST_ID: &str = "zz********************";
    const BG_ID: &str = "0e1f2a3b-0000-4000-8000-000000000001";
    const PACK_ID: &str = "0faa447ee";

    fn store_file(bundle: &Path, store: &str, compressed: &str, ext: &str) -> PathBuf {
        let canonical = decompress(compressed);
        let dir = bundle.join(store).join(shard(&canonical));
        std::fs::create_dir_all(&dir).unwrap();
        dir.join(format!("{}{}", canonical, ext))
    }

    /// A bundle whose single pack resolves to index 3, `pic/hetu`, with the
    /// atlas texture stored as a compressed texture and its decoded sibling
    fn write_bundle(root: &Path) -> PathBuf {
        let bundle = root.join("resources");
        std::fs::create_dir_all(bundle.join(IMPORT_DIR)).unwrap();
        std::fs::create_dir_all(bundle.join(NATIVE_DIR)).unwrap();

        let config = json!({
            "paths": {
                "0": ["raw/blob", 0],
                "1": ["pic/bg", 2],
                "2": ["spine/hero", 3],
                "3": ["pic/hetu", 1],
                "4": ["lost/thing", 2],
                "5": ["pic/hetu", 2]
            },
            "uuids": [BLOB_ID, BG_ID, SKELETON_ID, ATLAS_ID, LOST_ID, TEXTURE_ID],
            "types": ["cc.Asset", "cc.SpriteAtlas", "cc.Texture2D", "sp.SkeletonData"],
            "packs": { PACK_ID: [3] }
        });
        std::fs::write(bundle.join("config.json"), config.to_string()).unwrap();

        std::fs::write(store_file(&bundle, IMPORT_DIR, BLOB_ID, ".bin"), b"\0\0").unwrap();
        std::fs::write(store_file(&bundle, IMPORT_DIR, BG_ID, ".png"), b"bg").unwrap();

        let skeleton = json!([1, [], [], [], [], [[0, "hero", "", [], {"skeleton": {"spine": "3.8"}}]]]);
        std::fs::write(
            store_file(&bundle, IMPORT_DIR, SKELETON_ID, ".json"),
            skeleton.to_string(),
        )
        .unwrap();

        std::fs::write(store_file(&bundle, NATIVE_DIR, TEXTURE_ID, ".astc"), b"ASTC").unwrap();
        let mut atlas = RgbaImage::from_pixel(16, 8, Rgba([0, 0, 255, 255]));
        atlas.put_pixel(4, 0, Rgba([255, 0, 0, 255]));
        atlas
            .save_with_format(store_file(&bundle, NATIVE_DIR, TEXTURE_ID, ".webp"), ImageFormat::Png)
            .unwrap();

        let pack = json!([
            1,
            [ATLAS_ID],
            [],
            [],
            [],
            [
                [[[0, "hetu.plist", []]]],
                [[{"name": "plain", "rect": [0, 0, 4, 4], "offset": [0, 0], "originalSize": [4, 4]}]],
                [[{"name": "turned", "rect": [4, 0, 6, 2], "offset": [0, 0], "originalSize": [6, 2], "rotated": true}]]
            ]
        ]);
        let pack_dir = bundle.join(IMPORT_DIR).join("0f");
        std::fs::create_dir_all(&pack_dir).unwrap();
        std::fs::write(pack_dir.join("0faa447ee.json"), pack.to_string()).unwrap();

        bundle
    }

    fn options(out: &Path) -> ResolveOptions {
        ResolveOptions {
            output: Some(out.to_path_buf()),
            strict: false,
        }
    }

    #[test]
    fn test_process_bundle_end_to_end() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = write_bundle(dir.path());
        let out = dir.path().join("out");

        let mut seen = Vec::new();
        let report =
            process_bundle(&bundle, &options(&out), &CancelToken::new(), &mut |p| seen.push(p))
                .unwrap();

        assert_eq!(report.records_copied, 3);
        assert_eq!(report.records_skipped, 1);
        // The atlas record lives inside its pack, the other was never built
        assert_eq!(report.records_missing, 2);
        assert_eq!(report.skeletons_extracted, 1);
        assert_eq!(report.packs_converted, 1);
        assert_eq!(report.packs_failed, 0);
        assert_eq!(report.atlases_sliced, 1);
        assert_eq!(report.frames_written, 2);
        assert_eq!(report.frame_errors, 0);
        assert_eq!(seen, vec![10.0, 100.0]);

        assert!(out.join("pic/hetu.plist").is_file());
        assert!(!out.join("pic/hetu.tmp.json").exists());
        assert!(out.join("pic/hetu.webp").is_file());
        assert!(out.join("pic/bg.png").is_file());
        assert!(!out.join("raw/blob.bin").exists());

        let plain = crate::slicer::load_image(&out.join("pic/hetu/plain.png")).unwrap();
        assert_eq!(plain.dimensions(), (4, 4));
        let turned = crate::slicer::load_image(&out.join("pic/hetu/turned.png")).unwrap();
        assert_eq!(turned.dimensions(), (6, 2));
        assert_eq!(turned.get_pixel(0, 1), Rgba([255, 0, 0, 255]));

        let hero = std::fs::read_to_string(out.join("spine/hero.json")).unwrap();
        assert_eq!(hero, r#"{"skeleton":{"spine":"3.8"}}"#);
    }

    #[test]
    fn test_strict_mode_rejects_missing_records() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = write_bundle(dir.path());
        let opts = ResolveOptions {
            strict: true,
            ..options(&dir.path().join("out"))
        };

        let err = process_bundle(&bundle, &opts, &CancelToken::new(), &mut |_| {}).unwrap_err();
        assert!(matches!(err, Error::UnresolvedRecords { count: 2 }));
    }

    #[test]
    fn test_cancel_removes_created_output() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = write_bundle(dir.path());
        let out = dir.path().join("out");
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = process_bundle(&bundle, &options(&out), &cancel, &mut |_| {}).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(!out.exists());
    }

    #[test]
    fn test_cancel_keeps_existing_output() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = write_bundle(dir.path());
        let out = dir.path().join("out");
        std::fs::create_dir_all(&out).unwrap();
        let cancel = CancelToken::new();
        cancel.cancel();

        let err = process_bundle(&bundle, &options(&out), &cancel, &mut |_| {}).unwrap_err();
        assert!(matches!(err, Error::Cancelled));
        assert!(out.is_dir());
    }

    #[test]
    fn test_missing_manifest_and_stores() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out");

        let err =
            process_bundle(dir.path(), &options(&out), &CancelToken::new(), &mut |_| {}).unwrap_err();
        assert!(matches!(err, Error::ConfigMissing(_)));

        std::fs::write(dir.path().join("config.json"), "{}").unwrap();
        std::fs::create_dir_all(dir.path().join(IMPORT_DIR)).unwrap();
        let err =
            process_bundle(dir.path(), &options(&out), &CancelToken::new(), &mut |_| {}).unwrap_err();
        assert!(matches!(err, Error::StoreMissing(p) if p.ends_with(NATIVE_DIR)));
        assert!(!out.exists());
    }

    #[test]
    fn test_unresolvable_pack_is_counted() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = write_bundle(dir.path());
        let pack = bundle.join(IMPORT_DIR).join("0f/0faa447ee.json");
        std::fs::write(&pack, json!([1, ["unknownUuidNotInConfig"], [], [], [], []]).to_string())
            .unwrap();

        let report = process_bundle(
            &bundle,
            &options(&dir.path().join("out")),
            &CancelToken::new(),
            &mut |_| {},
        )
        .unwrap();
        assert_eq!(report.packs_converted, 0);
        assert_eq!(report.packs_failed, 1);
        assert_eq!(report.atlases_sliced, 0);
    }

    #[test]
    fn test_escaping_logical_paths_are_refused() {
        let dir = tempfile::tempdir().unwrap();
        let bundle = dir.path().join("hostile");
        std::fs::create_dir_all(bundle.join(IMPORT_DIR)).unwrap();
        std::fs::create_dir_all(bundle.join(NATIVE_DIR)).unwrap();

        let absolute = dir.path().join("escaped/abs");
        let config = json!({
            "paths": {
                "0": [absolute.to_string_lossy(), 0],
                "1": ["../dotdot", 0],
                "2": ["pic/ok", 0],
                "3": ["../atlas", 0]
            },
            "uuids": [BG_ID, TEXTURE_ID, BLOB_ID, ATLAS_ID],
            "types": ["cc.Texture2D"],
            "packs": { PACK_ID: [3] }
        });
        std::fs::write(bundle.join("config.json"), config.to_string()).unwrap();
        for id in [BG_ID, TEXTURE_ID, BLOB_ID] {
            std::fs::write(store_file(&bundle, IMPORT_DIR, id, ".png"), b"png").unwrap();
        }
        let pack_dir = bundle.join(IMPORT_DIR).join("0f");
        std::fs::create_dir_all(&pack_dir).unwrap();
        std::fs::write(
            pack_dir.join("0faa447ee.json"),
            json!([1, [ATLAS_ID], [], [], [], [[[[0, "atlas.plist", []]]]]]).to_string(),
        )
        .unwrap();

        let out = dir.path().join("out/hostile");
        let report =
            process_bundle(&bundle, &options(&out), &CancelToken::new(), &mut |_| {}).unwrap();

        assert_eq!(report.records_copied, 1);
        assert_eq!(report.records_missing, 3);
        assert_eq!(report.packs_converted, 0);
        assert_eq!(report.packs_failed, 1);
        assert!(out.join("pic/ok.png").is_file());
        assert!(!dir.path().join("escaped").exists());
        assert!(!dir.path().join("out/dotdot.png").exists());
        assert!(!dir.path().join("out/atlas.plist").exists());
        assert!(!dir.path().join("out/atlas.tmp.json").exists());
    }

    #[test]
    fn test_find_extension() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(find_extension(&dir.path().join("nope"), "abc").unwrap(), None);

        std::fs::write(dir.path().join("abc.webp"), b"").unwrap();
        std::fs::write(dir.path().join("abc.astc"), b"").unwrap();
        std::fs::write(dir.path().join("abcd.png"), b"").unwrap();
        std::fs::write(dir.path().join("abc"), b"").unwrap();

        assert_eq!(
            find_extension(dir.path(), "abc").unwrap().as_deref(),
            Some(".astc")
        );
        assert_eq!(
            find_extension(dir.path(), "abcd").unwrap().as_deref(),
            Some(".png")
        );
        assert_eq!(find_extension(dir.path(), "ab").unwrap(), None);
    }
}
