use tempfile::TempDir;

use uavsim::export::{self, ExportFormat, SUMMARY_CSV, SUMMARY_JSON, TIMELINE_CSV, TIMELINE_JSON};
use uavsim::{ScenarioConfig, SimError, SimulationHandle};

const SCENARIO: &str = r#"
meta:
  name: export_check
sim:
  dt_s: 2.0
  t_max_s: 600.0
environment:
  temperature_c: 5.0
  gust_mps: 4.0
threat_zones:
  - { id: Z1, lat: 35.005, lon: 139.0, radius_m: 400.0 }
uavs:
  - id: Q1
    preset: generic_quad
    payload_kg: 0.2
    waypoints:
      - { lat: 35.0, lon: 139.0 }
      - { lat: 35.01, lon: 139.0, alt_m: 150.0 }
  - id: W1
    preset: rq11_raven
    waypoints:
      - { lat: 35.0, lon: 139.01 }
      - { lat: 35.02, lon: 139.02 }
"#;

fn run() -> SimulationHandle {
    let config = ScenarioConfig::from_yaml_str(SCENARIO).unwrap();
    let mut handle = SimulationHandle::construct(config).unwrap();
    handle.run_to_completion().unwrap();
    handle
}

#[test]
fn export_all_reads_back_within_tolerance() {
    let handle = run();
    let log = handle.log();
    let summary = handle.summary();
    assert!(!log.is_empty());

    let dir = TempDir::new().unwrap();
    let written = export::export_all(dir.path(), log, &summary, ExportFormat::Both).unwrap();
    assert_eq!(written.len(), 4);
    for name in [TIMELINE_CSV, SUMMARY_CSV, TIMELINE_JSON, SUMMARY_JSON] {
        assert!(dir.path().join(name).exists(), "{} missing", name);
    }

    let csv_records = export::read_timeline_csv_file(&dir.path().join(TIMELINE_CSV)).unwrap();
    assert_eq!(csv_records.len(), log.records.len());
    for (read, original) in csv_records.iter().zip(&log.records) {
        assert_eq!(read.uav_id, original.uav_id);
        assert_eq!(read.status, original.status);
        assert_eq!(read.risk, original.risk);
        assert!((read.time_s - original.time_s).abs() < 1e-6);
        assert!((read.latitude - original.latitude).abs() < 1e-6);
        assert!((read.longitude - original.longitude).abs() < 1e-6);
        assert!((read.power_w - original.power_w).abs() < 1e-6);
        assert!((read.energy_remaining_fraction - original.energy_remaining_fraction).abs() < 1e-6);
        assert!((read.ir_score - original.ir_score).abs() < 1e-6);
        assert!((read.visual_score - original.visual_score).abs() < 1e-6);
    }

    let json_log = export::read_timeline_json_file(&dir.path().join(TIMELINE_JSON)).unwrap();
    assert_eq!(json_log.records.len(), log.records.len());
    assert_eq!(json_log.advisories.len(), log.advisories.len());

    let json_summary = export::read_summary_json_file(&dir.path().join(SUMMARY_JSON)).unwrap();
    assert_eq!(json_summary.stop_reason, summary.stop_reason);
    assert_eq!(json_summary.uavs.len(), 2);
    for (read, original) in json_summary.uavs.iter().zip(&summary.uavs) {
        assert_eq!(read.uav_id, original.uav_id);
        assert_eq!(read.outcome, original.outcome);
        assert!((read.total_distance_m - original.total_distance_m).abs() < 1e-6);
        assert!((read.final_energy_fraction - original.final_energy_fraction).abs() < 1e-6);
    }
}

#[test]
fn csv_only_export_skips_json() {
    let handle = run();
    let dir = TempDir::new().unwrap();
    let out = dir.path().join("nested").join("out");

    let written = export::export_all(&out, handle.log(), &handle.summary(), ExportFormat::Csv).unwrap();
    assert_eq!(written.len(), 2);
    assert!(out.join(TIMELINE_CSV).exists());
    assert!(!out.join(TIMELINE_JSON).exists());
}

#[test]
fn missing_file_is_reported() {
    let dir = TempDir::new().unwrap();
    let result = export::read_timeline_csv_file(&dir.path().join(TIMELINE_CSV));
    assert!(matches!(result, Err(SimError::FileNotFound(_))));
}
