//! File pattern integration tests.
//!
//! Patterns are inferred from real directory listings and the expanded
//! paths are opened through the normal reader pipeline.

use std::fs;
use std::path::Path;

use scifmt::{
    find_image_patterns, find_pattern_for_path, AxisType, Compression, Context, FilePattern,
    Location, ParserConfig, PatternError, WriterConfig,
};

use super::test_utils::{full_plane, single_image, uint8_gray};

fn touch(dir: &Path, names: &[&str]) {
    for name in names {
        fs::write(dir.join(name), b"").unwrap();
    }
}

#[test]
fn test_pattern_from_directory_listing() {
    let dir = tempfile::tempdir().unwrap();
    let mut names = Vec::new();
    for z in 1..=2 {
        for t in 1..=3 {
            names.push(format!("embryo_z{}_t{:02}.tif", z, t));
        }
    }
    let refs: Vec<&str> = names.iter().map(String::as_str).collect();
    touch(dir.path(), &refs);
    touch(dir.path(), &["notes.txt", "embryo_z1_t01.tif.bak"]);
    // Directories never take part
    fs::create_dir(dir.path().join("embryo_z9_t01.tif")).unwrap();

    let pattern = find_pattern_for_path(&dir.path().join("embryo_z1_t01.tif"), &[]).unwrap();
    assert_eq!(pattern.to_string(), "embryo_z<1-2>_t0<1-3>.tif");
    assert_eq!(pattern.directory(), Some(dir.path()));
    assert_eq!(
        pattern.axis_types(),
        vec![Some(AxisType::Z), Some(AxisType::Time)]
    );

    let paths = pattern.paths();
    assert_eq!(paths.len(), 6);
    assert!(paths.iter().all(|p| p.is_file()));
    assert_eq!(paths[1], dir.path().join("embryo_z1_t02.tif"));
}

#[test]
fn test_excluded_axis_stays_literal() {
    let dir = tempfile::tempdir().unwrap();
    touch(
        dir.path(),
        &["run_t1_ch1.pgm", "run_t1_ch2.pgm", "run_t2_ch1.pgm", "run_t2_ch2.pgm"],
    );

    let path = dir.path().join("run_t2_ch1.pgm");
    let pattern = find_pattern_for_path(&path, &[AxisType::Time]).unwrap();
    assert_eq!(pattern.to_string(), "run_t2_ch<1-2>.pgm");
    assert_eq!(pattern.axis_types(), vec![Some(AxisType::Channel)]);
}

#[test]
fn test_single_file_directory() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), &["only.tif"]);
    let pattern = find_pattern_for_path(&dir.path().join("only.tif"), &[]).unwrap();
    assert!(pattern.is_literal());
    assert_eq!(pattern.paths(), vec![dir.path().join("only.tif")]);
}

#[test]
fn test_missing_directory() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("absent").join("img_1.tif");
    assert!(matches!(
        find_pattern_for_path(&path, &[]),
        Err(PatternError::Listing { .. })
    ));
}

#[test]
fn test_image_patterns_group_a_listing() {
    let names = ["b_2.pgm", "a1.tif", "a3.tif", "a2.tif", "b_1.pgm", "readme.md"];
    let patterns = find_image_patterns(&names).unwrap();
    let texts: Vec<String> = patterns.iter().map(FilePattern::pattern).collect();
    assert_eq!(texts, vec!["a<1-3>.tif", "b_<1-2>.pgm", "readme.md"]);

    // Every name is covered by exactly one pattern
    for name in names {
        assert_eq!(patterns.iter().filter(|p| p.matches(name)).count(), 1, "{}", name);
    }
}

#[test]
fn test_parsed_pattern_round_trips_through_text() {
    let pattern: FilePattern = "plate_<A-C>_<001-010:3>.tif".parse().unwrap();
    assert_eq!(
        pattern.files()[..4],
        [
            "plate_A_001.tif",
            "plate_A_004.tif",
            "plate_A_007.tif",
            "plate_A_010.tif"
        ]
    );
    assert_eq!(pattern.files().len(), 12);
    assert_eq!(FilePattern::parse(&pattern.to_string()).unwrap(), pattern);
}

#[test]
fn test_expanded_files_open_as_a_series() {
    let dir = tempfile::tempdir().unwrap();
    let ctx = Context::new();
    let image = uint8_gray(3, 2, 1);
    for t in 1..=3u8 {
        let location = Location::file(dir.path().join(format!("series_t{}.tif", t)));
        let mut writer = ctx.writer_for(&location).unwrap();
        writer.set_metadata(single_image("TIFF", image.clone())).unwrap();
        writer
            .set_dest(&location, 0, &WriterConfig::default().with_compression(Compression::Deflate))
            .unwrap();
        writer
            .save_plane(0, 0, &full_plane(&image, vec![t; 6]), None)
            .unwrap();
        writer.close().unwrap();
    }

    let pattern = find_pattern_for_path(&dir.path().join("series_t2.tif"), &[]).unwrap();
    assert_eq!(pattern.to_string(), "series_t<1-3>.tif");

    for (t, path) in pattern.paths().into_iter().enumerate() {
        let mut reader = ctx
            .open_reader(&Location::file(path), &ParserConfig::default())
            .unwrap();
        let plane = reader.open_plane(0, 0).unwrap();
        assert_eq!(&plane.data()[..], &[t as u8 + 1; 6]);
        reader.close().unwrap();
    }
}
