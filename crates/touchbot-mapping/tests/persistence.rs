use approx::assert_relative_eq;
use nalgebra::Point2;
use touchbot_core::{Homography, RasterSize};
use touchbot_mapping::{CalibrationPair, CalibrationRecord, CoordinateMapper};

#[test]
fn record_round_trip_restores_mapping_without_refit() {
    let mut mapper = CoordinateMapper::new();
    let pairs = [
        CalibrationPair::new(Point2::new(81.5, 612.0), Point2::new(-48.2, -61.7)),
        CalibrationPair::new(Point2::new(702.25, 44.0), Point2::new(51.9, 70.3)),
        CalibrationPair::new(Point2::new(400.0, 300.0), Point2::new(1.0, 2.0)),
    ];
    mapper.fit_pairs(&pairs, 680.0).unwrap();

    let h = Homography::from_array([[1.02, 0.01, -15.0], [0.0, 0.98, 7.5], [1e-5, -2e-5, 1.0]]);
    let record = CalibrationRecord::new(mapper.calibration().unwrap(), -318.4)
        .with_rectification(h, RasterSize::new(800, 680));

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("calibration.json");
    record.write_json(&path).unwrap();

    let loaded = CalibrationRecord::load_json(&path).unwrap();
    assert_eq!(loaded, record);
    assert_eq!(loaded.calibration_pairs.len(), 3);
    assert_eq!(loaded.homography, Some(h));
    assert_eq!(loaded.phone_z, -318.4);

    let restored = CoordinateMapper::from_record(&loaded).unwrap();
    for q in [
        Point2::new(0.0, 0.0),
        Point2::new(333.3, 123.4),
        Point2::new(800.0, 680.0),
    ] {
        let a = mapper.apply(q).unwrap();
        let b = restored.apply(q).unwrap();
        assert_relative_eq!(a.x, b.x);
        assert_relative_eq!(a.y, b.y);
    }
}

#[test]
fn missing_file_surfaces_io_error() {
    let dir = tempfile::tempdir().unwrap();
    let err = CalibrationRecord::load_json(dir.path().join("nope.json")).unwrap_err();
    assert!(matches!(err, touchbot_mapping::CalibrationIoError::Io(_)));
}
