use assert_cmd::Command;
use serde_json::Value;
use std::fs;
use std::path::PathBuf;
use tempfile::tempdir;

const INTAKE: &str = r#"{
    "demographics": {"edad": 28, "sexo": "femenino"},
    "responses": {"q1": 2, "q2": 1, "q3": 3, "q4": 0, "q5": 4, "q6": 2, "q7": 1}
}"#;

#[test]
fn record_runs_the_whole_protocol() {
    let dir = tempdir().unwrap();
    let intake = dir.path().join("intake.json");
    fs::write(&intake, INTAKE).unwrap();
    let sessions = dir.path().join("sessions");

    let output = Command::cargo_bin("biofeed")
        .unwrap()
        .args([
            "record",
            "--intake",
            intake.to_str().unwrap(),
            "--baseline-secs",
            "0.3",
            "--duration-secs",
            "1",
            "--tick-ms",
            "10",
            "--seed",
            "7",
            "--sessions-dir",
            sessions.to_str().unwrap(),
        ])
        .output()
        .unwrap();
    assert!(
        output.status.success(),
        "{}",
        String::from_utf8_lossy(&output.stderr)
    );

    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    let samples = json["summary"]["puntos_datos"].as_u64().unwrap();
    assert!(samples > 0);
    assert!(json["summary"]["baseline"]["ecg_voltaje"].is_number());
    assert_eq!(json["assessment"]["total"], 13);
    assert_eq!(json["anxiety_level"], "mild_moderate");

    let folder = PathBuf::from(json["folder"].as_str().unwrap());
    assert!(folder
        .file_name()
        .unwrap()
        .to_string_lossy()
        .ends_with("_28anos_femenino"));
    for file in ["hamilton_pre.json", "datos_sensores.csv", "resumen_sesion.json"] {
        assert!(folder.join(file).exists(), "missing {file}");
    }

    let intake_json: Value =
        serde_json::from_str(&fs::read_to_string(folder.join("hamilton_pre.json")).unwrap())
            .unwrap();
    assert_eq!(intake_json["puntuaciones"]["total"], 13);

    let ledger = fs::read_to_string(sessions.join("todas_las_sesiones.csv")).unwrap();
    let lines: Vec<&str> = ledger.lines().collect();
    assert_eq!(lines.len(), 2);
    assert!(lines[0].trim_start_matches('\u{feff}').starts_with("fecha_hora,"));
    assert!(lines[1].contains(",28,femenino,2,1,3,0,4,2,1,6,7,13,"));
}

#[test]
fn record_rejects_out_of_range_assessment() {
    let dir = tempdir().unwrap();
    let intake = dir.path().join("intake.json");
    fs::write(
        &intake,
        r#"{"responses": {"q1": 9, "q2": 0, "q3": 0, "q4": 0, "q5": 0, "q6": 0, "q7": 0}}"#,
    )
    .unwrap();
    Command::cargo_bin("biofeed")
        .unwrap()
        .args([
            "record",
            "--intake",
            intake.to_str().unwrap(),
            "--sessions-dir",
            dir.path().join("sessions").to_str().unwrap(),
        ])
        .assert()
        .failure();
    assert!(!dir.path().join("sessions").exists());
}
