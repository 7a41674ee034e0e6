use tempfile::tempdir;

use ppe_sentinel::{LogView, LogViewer, TriggerRule, ViolationLog};

#[test]
fn records_round_trip_through_the_viewer() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("violations.csv");
    let mut log = ViolationLog::new(&path, TriggerRule::default());

    let written = [
        ("NO-Hardhat", 0.87),
        ("NO-Mask", 0.61),
        ("NO-Safety Vest", 0.73),
    ];
    for (label, confidence) in written {
        log.record(label, confidence).unwrap().unwrap();
    }

    let viewer = LogViewer::new(&path);
    match viewer.read_all().unwrap() {
        LogView::Records(records) => {
            assert_eq!(records.len(), written.len());
            for (record, (label, confidence)) in records.iter().zip(written) {
                assert_eq!(record.label, label);
                assert!((record.confidence - confidence).abs() < 0.005);
                // Timestamp format is fixed: date, space, time.
                assert_eq!(record.timestamp.len(), 19);
                assert_eq!(&record.timestamp[4..5], "-");
                assert_eq!(&record.timestamp[10..11], " ");
            }
        }
        LogView::Empty => panic!("expected records"),
    }
}

#[test]
fn only_trigger_matching_labels_are_counted() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("violations.csv");
    let mut log = ViolationLog::new(&path, TriggerRule::default());

    let mut logged = 0;
    for label in ["Person", "NO-Hardhat", "Hardhat", "NO-Mask", "vehicle"] {
        if log.record(label, 0.8).unwrap().is_some() {
            logged += 1;
        }
    }
    assert_eq!(logged, 2);

    match LogViewer::new(&path).read_all().unwrap() {
        LogView::Records(records) => assert_eq!(records.len(), 2),
        LogView::Empty => panic!("expected records"),
    }
}

#[test]
fn appending_across_handles_keeps_one_header() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("violations.csv");

    // First sessions writes, a later session appends.
    ViolationLog::new(&path, TriggerRule::default())
        .record("NO-Hardhat", 0.87)
        .unwrap();
    ViolationLog::new(&path, TriggerRule::default())
        .record("NO-Mask", 0.61)
        .unwrap();

    let content = std::fs::read_to_string(&path).unwrap();
    let headers = content
        .lines()
        .filter(|line| *line == "Timestamp,Violation,Confidence")
        .count();
    assert_eq!(headers, 1);
    assert_eq!(content.lines().count(), 3);
}

#[test]
fn export_matches_the_raw_file() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("violations.csv");
    ViolationLog::new(&path, TriggerRule::default())
        .record("NO-Hardhat", 0.87)
        .unwrap();

    let exported = LogViewer::new(&path).export_all().unwrap().unwrap();
    assert_eq!(exported, std::fs::read_to_string(&path).unwrap());
}

#[test]
fn malformed_and_empty_logs_are_distinguished() {
    let dir = tempdir().unwrap();

    let absent = LogViewer::new(dir.path().join("absent.csv"));
    assert_eq!(absent.read_all().unwrap(), LogView::Empty);

    let corrupt_path = dir.path().join("corrupt.csv");
    std::fs::write(&corrupt_path, "Timestamp,Violation,Confidence\ngarbage\n").unwrap();
    assert!(LogViewer::new(&corrupt_path).read_all().is_err());
}
