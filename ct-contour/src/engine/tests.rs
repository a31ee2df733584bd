use std::path::Path;
use std::time::Duration;

use image::{GrayImage, Luma};
use ndarray::Array2;

use super::*;
use crate::loader::RawSlice;

const WAIT: Duration = Duration::from_secs(30);

fn init_log() {
    let _ = simple_logger::SimpleLogger::new()
        .with_level(log::LevelFilter::Warn)
        .init();
}

fn square_image(w: u32, h: u32) -> GrayImage {
    GrayImage::from_fn(w, h, |x, y| {
        let inside = (w / 4..w * 3 / 4).contains(&x) && (h / 4..h * 3 / 4).contains(&y);
        Luma([if inside { 200 } else { 10 }])
    })
}

fn flat_folder(dir: &Path, n: usize) {
    for i in 0..n {
        square_image(40, 40)
            .save(dir.join(format!("img{i:02}.bmp")))
            .unwrap();
    }
}

fn raw_slices(n: usize) -> Vec<RawSlice> {
    (0..n)
        .map(|i| RawSlice {
            path: format!("{i}.dcm").into(),
            instance_number: i as i32,
            position_z: Some(i as f64),
            slice_location: None,
            spacing: Some(1.0),
            pixels: Array2::from_shape_fn((12, 12), |(r, c)| {
                if (3..9).contains(&r) && (3..9).contains(&c) {
                    200
                } else {
                    10
                }
            }),
        })
        .collect()
}

fn opened_flat(n: usize) -> (tempfile::TempDir, Engine) {
    init_log();
    let dir = tempfile::tempdir().unwrap();
    flat_folder(dir.path(), n);
    let mut engine = Engine::default();
    engine.open_folder(dir.path()).unwrap();
    (dir, engine)
}

#[test]
fn test_commands_without_folder() {
    let mut engine = Engine::default();
    assert!(matches!(engine.next_slice(), Err(EngineError::NoFolder)));
    assert!(matches!(engine.next_contour(), Err(EngineError::NoFolder)));
    assert!(matches!(
        engine.export_current_contour(),
        Err(EngineError::NoFolder)
    ));
    assert_eq!(engine.slice_count(), 0);
    assert!(!engine.is_ready());
}

#[test]
fn test_open_flat_folder() {
    init_log();
    let dir = tempfile::tempdir().unwrap();
    flat_folder(dir.path(), 3);
    std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

    let mut engine = Engine::default();
    let events = engine.subscribe();
    engine.open_folder(dir.path()).unwrap();

    assert_eq!(engine.slice_count(), 3);
    assert_eq!(engine.slice_index(), Some(0));
    assert_eq!(engine.threshold(), 70);
    assert_eq!(engine.scaling_factor(), Some(1));
    assert_eq!(engine.origin(), None);
    assert_eq!(
        engine.output_dir(),
        Some(dir.path().join(FLAT_EXPORT_DIR_NAME))
    );

    let got: Vec<EngineEvent> = events.try_iter().collect();
    assert!(got.contains(&EngineEvent::FolderOpened {
        folder: dir.path().to_owned(),
        slice_count: 3,
    }));
    assert!(got.contains(&EngineEvent::SliceChanged(0)));

    engine.wait_ready(WAIT).unwrap();
    assert!(engine.is_ready());
    assert!(!engine.contours().unwrap().is_empty());
    let ready = events
        .try_iter()
        .any(|e| matches!(e, EngineEvent::ContoursReady { slice_index: 0, .. }));
    assert!(ready);
}

#[test]
fn test_failed_open_keeps_session() {
    let (dir, mut engine) = opened_flat(2);
    let empty = tempfile::tempdir().unwrap();
    assert!(matches!(
        engine.open_folder(empty.path()),
        Err(EngineError::NoInputData(_))
    ));
    assert_eq!(engine.folder(), Some(dir.path()));
    assert_eq!(engine.slice_count(), 2);
}

#[test]
fn test_undecodable_first_image_is_skipped() {
    init_log();
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("a.bmp"), b"garbage").unwrap();
    square_image(40, 40).save(dir.path().join("b.bmp")).unwrap();

    let mut engine = Engine::default();
    engine.open_folder(dir.path()).unwrap();
    assert_eq!(engine.slice_count(), 1);
    assert_eq!(engine.current_image().unwrap().shape(), (40, 40));
}

#[test]
fn test_undecodable_middle_image_is_skipped() {
    init_log();
    let dir = tempfile::tempdir().unwrap();
    square_image(40, 40).save(dir.path().join("a.bmp")).unwrap();
    std::fs::write(dir.path().join("b.bmp"), b"garbage").unwrap();
    square_image(20, 20).save(dir.path().join("c.bmp")).unwrap();

    let mut engine = Engine::default();
    engine.open_folder(dir.path()).unwrap();
    assert_eq!(engine.slice_count(), 2);
    engine.next_slice().unwrap();
    assert_eq!(engine.slice_index(), Some(1));
    assert_eq!(engine.current_image().unwrap().shape(), (20, 20));
    engine.next_slice().unwrap();
    assert_eq!(engine.slice_index(), Some(0));
}

#[test]
fn test_slice_navigation_wraps() {
    let (_dir, mut engine) = opened_flat(3);
    engine.previous_slice().unwrap();
    assert_eq!(engine.slice_index(), Some(2));
    engine.next_slice().unwrap();
    assert_eq!(engine.slice_index(), Some(0));
    engine.next_slice().unwrap();
    engine.next_slice().unwrap();
    engine.next_slice().unwrap();
    assert_eq!(engine.slice_index(), Some(0));
}

#[test]
fn test_not_ready_until_polled() {
    let (_dir, mut engine) = opened_flat(1);
    // 结果只有在 poll / wait_ready 之后才会被采纳.
    assert!(matches!(engine.next_contour(), Err(EngineError::NotReady)));
    assert!(matches!(
        engine.apply_correction(),
        Err(EngineError::NotReady)
    ));
    assert!(matches!(
        engine.export_current_contour(),
        Err(EngineError::NotReady)
    ));
    engine.wait_ready(WAIT).unwrap();
    assert!(engine.next_contour().is_ok());
}

#[test]
fn test_last_contour_is_unreachable() {
    let (_dir, mut engine) = opened_flat(1);
    engine.wait_ready(WAIT).unwrap();
    let len = engine.contours().unwrap().len();
    for _ in 0..len + 5 {
        engine.next_contour().unwrap();
    }
    assert_eq!(engine.current_contour_index(), len.saturating_sub(2));
    for _ in 0..len + 5 {
        engine.previous_contour().unwrap();
    }
    assert_eq!(engine.current_contour_index(), 0);
}

#[test]
fn test_threshold_saturates() {
    let (_dir, mut engine) = opened_flat(1);
    engine.set_threshold_delta(1);
    assert_eq!(engine.threshold(), 71);
    assert!(!engine.is_ready());
    for _ in 0..300 {
        engine.set_threshold_delta(1);
    }
    assert_eq!(engine.threshold(), 255);
    for _ in 0..300 {
        engine.set_threshold_delta(-1);
    }
    assert_eq!(engine.threshold(), 0);
    engine.wait_ready(WAIT).unwrap();
}

#[test]
fn test_stale_results_are_discarded() {
    let (_dir, mut engine) = opened_flat(2);
    engine.next_slice().unwrap();
    engine.previous_slice().unwrap();
    engine.wait_ready(WAIT).unwrap();
    // 最终采纳的结果属于当前切片.
    assert_eq!(engine.slice_index(), Some(0));
    assert!(engine.is_ready());
    std::thread::sleep(Duration::from_millis(50));
    engine.poll();
    assert!(engine.is_ready());
}

#[test]
fn test_roi_is_sticky() {
    let (_dir, mut engine) = opened_flat(2);
    let mut empty = |_: &OwnedSlice, _: usize| Roi::default();
    engine.activate_roi(&mut empty).unwrap();
    assert_eq!(engine.roi(), None);

    let mut select = |_: &OwnedSlice, _: usize| Roi::new(5, 5, 20, 10);
    engine.activate_roi(&mut select).unwrap();
    assert_eq!(engine.roi(), Some(Roi::new(5, 5, 20, 10)));
    assert_eq!(engine.current_image().unwrap().shape(), (10, 20));

    engine.next_slice().unwrap();
    assert_eq!(engine.current_image().unwrap().shape(), (10, 20));

    engine.clear_roi();
    assert_eq!(engine.roi(), None);
    assert_eq!(engine.current_image().unwrap().shape(), (40, 40));
}

#[test]
fn test_roi_outside_smaller_slice_is_cleared() {
    init_log();
    let dir = tempfile::tempdir().unwrap();
    square_image(40, 40).save(dir.path().join("a.bmp")).unwrap();
    square_image(10, 10).save(dir.path().join("b.bmp")).unwrap();
    let mut engine = Engine::default();
    engine.open_folder(dir.path()).unwrap();

    let mut select = |_: &OwnedSlice, _: usize| Roi::new(20, 20, 10, 10);
    engine.activate_roi(&mut select).unwrap();
    engine.next_slice().unwrap();
    assert_eq!(engine.roi(), None);
    assert_eq!(engine.current_image().unwrap().shape(), (10, 10));
}

#[test]
fn test_correction_paints_working_raster() {
    let (_dir, mut engine) = opened_flat(1);
    engine.wait_ready(WAIT).unwrap();
    engine.record_point(0, 1).unwrap();
    engine.record_point(39, 1).unwrap();
    assert_eq!(engine.annotation().points().len(), 2);
    assert!(engine.toggle_stroke_smoothing());

    engine.apply_correction().unwrap();
    assert!(engine.annotation().is_empty());
    assert!(!engine.is_ready());
    let img = engine.current_image().unwrap();
    assert_eq!(img[(1, 20)], u16::MAX);
    assert_eq!(img[(38, 20)], 10);

    // 修正在阈值变化后保留.
    engine.wait_ready(WAIT).unwrap();
    engine.set_threshold_delta(-1);
    assert_eq!(engine.current_image().unwrap()[(1, 20)], u16::MAX);

    // 导航会丢弃修正.
    engine.next_slice().unwrap();
    assert_eq!(engine.current_image().unwrap()[(1, 20)], 10);
}

#[test]
fn test_flat_export() {
    let (dir, mut engine) = opened_flat(1);
    engine.wait_ready(WAIT).unwrap();
    let a = engine.export_current_contour().unwrap();
    let b = engine.export_current_contour().unwrap();
    assert_ne!(a.export_id, b.export_id);
    assert_eq!(a.provenance.scale_factor, 1);

    let mut records = Vec::new();
    while records.len() < 2 {
        let outcome = engine.wait_export(WAIT).unwrap();
        records.push(outcome.result.unwrap());
    }
    for rec in &records {
        assert!(rec.contour_path.starts_with(dir.path().join(FLAT_EXPORT_DIR_NAME)));
        assert!(rec.contour_path.is_file());
        assert!(rec.background_path.is_file());
        assert!(rec.points_path.is_file());
    }
}

#[test]
fn test_volume_export_stem() {
    init_log();
    let dir = tempfile::tempdir().unwrap();
    let config = Config::default();
    let manager = VolumeManager::from_raw_slices(dir.path(), &raw_slices(5), &config);
    assert_eq!(manager.origin(), VolumeOrigin::Pipeline);

    let mut engine = Engine::new(config);
    let events = engine.subscribe();
    engine.open_volume(manager).unwrap();
    assert_eq!(engine.slice_count(), 5);
    assert_eq!(engine.current_image().unwrap().shape(), (48, 48));
    for _ in 0..3 {
        engine.next_slice().unwrap();
    }
    engine.wait_ready(WAIT).unwrap();
    assert!(engine.current_contour().is_some());

    let stem = engine.export_current_contour().unwrap();
    let encoded = stem.encode();
    let (id, tail) = encoded.split_at(10);
    assert!(id
        .chars()
        .all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c)));
    assert_eq!(tail, "-4-3-0-70");

    let outcome = engine.wait_export(WAIT).unwrap();
    let rec = outcome.result.unwrap();
    assert_eq!(rec.stem, stem);
    assert!(rec
        .points_path
        .starts_with(dir.path().join(crate::consts::CACHE_DIR_NAME)));
    assert!(events
        .try_iter()
        .any(|e| e == EngineEvent::ExportFinished(rec.clone())));
}
