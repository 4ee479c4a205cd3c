use std::process::Command;

use serde_json::Value;

fn cli() -> Command {
    Command::new(env!("CARGO_BIN_EXE_shutter_tester"))
}

fn stdout_of(output: &std::process::Output) -> String {
    String::from_utf8(output.stdout.clone()).expect("stdout utf8")
}

#[test]
fn calibrate_simulated_outputs_json() {
    let output = cli()
        .args(["calibrate", "--backend", "simulated", "--json"])
        .output()
        .expect("calibrate command");

    assert!(
        output.status.success(),
        "calibrate exited with {:?}",
        output.status.code()
    );
    let json: Value = serde_json::from_str(&stdout_of(&output)).expect("calibration JSON");
    let closed = json["closed_reference"].as_f64().unwrap();
    let open = json["open_reference"].as_f64().unwrap();
    let threshold = json["threshold"].as_f64().unwrap();
    assert!(open < threshold && threshold < closed);
}

#[test]
fn calibrate_with_bias_moves_threshold_toward_closed() {
    let output = cli()
        .args(["calibrate", "--backend", "simulated", "--bias", "0.1", "--json"])
        .output()
        .expect("calibrate command");

    assert!(output.status.success());
    let json: Value = serde_json::from_str(&stdout_of(&output)).expect("calibration JSON");
    let closed = json["closed_reference"].as_f64().unwrap();
    let open = json["open_reference"].as_f64().unwrap();
    let threshold = json["threshold"].as_f64().unwrap();
    let expected = closed - (closed - open) * 0.1;
    assert!((threshold - expected).abs() < 1e-6);
}

#[test]
fn measure_simulated_reports_requested_count() {
    let output = cli()
        .args(["measure", "--backend", "simulated", "--count", "2", "--json"])
        .output()
        .expect("measure command");

    assert!(
        output.status.success(),
        "measure exited with {:?}",
        output.status.code()
    );
    let stdout = stdout_of(&output);
    let readings: Vec<Value> = stdout
        .lines()
        .map(|line| serde_json::from_str(line).expect("reading JSON line"))
        .collect();

    assert_eq!(readings.len(), 2, "got {stdout}");
    for reading in readings {
        let seconds = reading["duration_seconds"].as_f64().unwrap();
        assert!(seconds > 0.004 && seconds < 0.02, "duration {seconds}");
        let label = reading["nominal"]["label"].as_str().unwrap();
        assert!(label.starts_with("1/"), "label {label}");
    }
}

#[test]
fn profile_simulated_outputs_trace() {
    let output = cli()
        .args(["profile", "--backend", "simulated", "--json"])
        .output()
        .expect("profile command");

    assert!(
        output.status.success(),
        "profile exited with {:?}",
        output.status.code()
    );
    let json: Value = serde_json::from_str(&stdout_of(&output)).expect("profile JSON");
    let trace = json["trace"].as_array().expect("trace array");
    assert!(!trace.is_empty());
    assert_eq!(
        json["summary"]["sample_count"].as_u64(),
        Some(trace.len() as u64)
    );
    assert!(json["calibration"]["threshold"].is_number());
}

#[test]
fn speeds_lists_standard_table() {
    let output = cli()
        .args(["speeds", "--json"])
        .output()
        .expect("speeds command");

    assert!(output.status.success());
    let json: Value = serde_json::from_str(&stdout_of(&output)).expect("speeds JSON");
    let labels: Vec<&str> = json
        .as_array()
        .unwrap()
        .iter()
        .map(|speed| speed["label"].as_str().unwrap())
        .collect();
    assert_eq!(labels.first(), Some(&"1/1000"));
    assert_eq!(labels.last(), Some(&"1s"));
    assert_eq!(labels.len(), 11);
}

#[test]
fn missing_bus_reports_driver_unavailable() {
    let config_path =
        std::env::temp_dir().join(format!("shutter-tester-nobus-{}.json", std::process::id()));
    std::fs::write(
        &config_path,
        r#"{"sensor": {"backend": "ads1115", "i2c_bus": 250}}"#,
    )
    .expect("write config");

    let output = cli()
        .args(["calibrate", "--config", config_path.to_str().unwrap()])
        .output()
        .expect("calibrate command");
    let _ = std::fs::remove_file(&config_path);

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).expect("stderr utf8");
    assert!(stderr.contains("DriverUnavailable"), "stderr: {stderr}");
}

#[test]
fn invalid_bias_is_rejected() {
    let output = cli()
        .args(["calibrate", "--backend", "simulated", "--bias", "1.5"])
        .output()
        .expect("calibrate command");

    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).expect("stderr utf8");
    assert!(stderr.contains("invalid configuration"), "stderr: {stderr}");
}
