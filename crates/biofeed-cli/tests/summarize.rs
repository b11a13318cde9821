use assert_cmd::Command;
use serde_json::Value;
use std::fs;
use tempfile::tempdir;

#[test]
fn summarize_recomputes_session_statistics() {
    let dir = tempdir().unwrap();
    fs::write(
        dir.path().join("datos_sensores.csv"),
        "timestamp,ecg_raw,ecg_voltage,temperature,ecg_change_percent,temp_change_celsius,bpm\n\
         1700000000.0,307,1.5,36.0,0.0,0.0,70\n\
         1700000000.1,348,1.7,36.0,0.0,0.0,72\n\
         1700000000.2,327,1.6,37.5,0.0,0.0,74\n",
    )
    .unwrap();
    let output = Command::cargo_bin("biofeed")
        .unwrap()
        .args(["summarize", "--session", dir.path().to_str().unwrap()])
        .output()
        .unwrap();
    assert!(output.status.success());
    let json: Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["puntos_datos"], 3);
    assert!((json["ecg"]["promedio"].as_f64().unwrap() - 1.6).abs() < 1e-9);
    assert_eq!(json["temperatura"]["maximo"].as_f64().unwrap(), 37.5);
    assert_eq!(json["bpm"]["minimo"].as_f64().unwrap(), 70.0);
    assert!(json["baseline"]["ecg_voltaje"].is_null());
}

#[test]
fn summarize_fails_without_samples() {
    let dir = tempdir().unwrap();
    Command::cargo_bin("biofeed")
        .unwrap()
        .args(["summarize", "--session", dir.path().to_str().unwrap()])
        .assert()
        .failure();
}
