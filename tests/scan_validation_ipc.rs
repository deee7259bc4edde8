use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

const SECURE_KEY: &str = "ROLLCALL_ATTENDANCE_V1";

fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_rollcalld");
    let mut child = Command::new(exe)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn rollcalld");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({ "id": id, "method": method, "params": params });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

fn error_code(value: &serde_json::Value) -> &str {
    assert_eq!(value.get("ok").and_then(|v| v.as_bool()), Some(false));
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|c| c.as_str())
        .expect("error code")
}

fn good_payload() -> String {
    json!({
        "type": "attendance",
        "secureKey": SECURE_KEY,
        "version": "1.0",
        "classId": "C1",
        "subjectCode": "MATH8",
        "className": "Math 8D",
        "yearSection": "8-D"
    })
    .to_string()
}

#[test]
fn scan_flow_accepts_valid_payload_once() {
    let workspace = temp_dir("rollcall-scan-flow");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let started = request_ok(&mut stdin, &mut reader, "2", "scan.start", json!({}));
    assert_eq!(started["state"], "scanning");

    let decoded = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "scan.frame",
        json!({ "text": good_payload() }),
    );
    assert_eq!(decoded["decoded"], true);
    assert_eq!(decoded["intent"]["classId"], "C1");
    assert_eq!(decoded["intent"]["subjectCode"], "MATH8");
    assert_eq!(decoded["intent"]["yearSection"], "8-D");

    // The decode closed the session; a second frame must not yield another
    // intent (duplicate-submission guard).
    let second = request(
        &mut stdin,
        &mut reader,
        "4",
        "scan.frame",
        json!({ "text": good_payload() }),
    );
    assert_eq!(error_code(&second), "scan_not_active");

    let _ = child.kill();
}

#[test]
fn security_rejections_resume_scanning() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(&mut stdin, &mut reader, "1", "scan.start", json!({}));

    let wrong_key = request(
        &mut stdin,
        &mut reader,
        "2",
        "scan.frame",
        json!({ "text": json!({
            "type": "attendance",
            "secureKey": "WRONG",
            "version": "1.0",
            "classId": "C1"
        }).to_string() }),
    );
    assert_eq!(error_code(&wrong_key), "security_validation_failed");

    let no_version = request(
        &mut stdin,
        &mut reader,
        "3",
        "scan.frame",
        json!({ "text": json!({
            "type": "attendance",
            "secureKey": SECURE_KEY,
            "classId": "C1"
        }).to_string() }),
    );
    assert_eq!(error_code(&no_version), "security_validation_failed");

    let wrong_type = request(
        &mut stdin,
        &mut reader,
        "4",
        "scan.frame",
        json!({ "text": json!({
            "type": "library-card",
            "secureKey": SECURE_KEY,
            "version": "1.0"
        }).to_string() }),
    );
    assert_eq!(error_code(&wrong_type), "wrong_payload_type");

    // Still scanning: a good payload decodes after all those rejections.
    let decoded = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "scan.frame",
        json!({ "text": good_payload() }),
    );
    assert_eq!(decoded["decoded"], true);

    let _ = child.kill();
}

#[test]
fn non_json_text_takes_the_manual_entry_path() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(&mut stdin, &mut reader, "1", "scan.start", json!({}));
    let decoded = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "scan.frame",
        json!({ "text": "  LEGACY-CODE-42 " }),
    );
    assert_eq!(decoded["decoded"], true);
    assert_eq!(decoded["manualEntry"], true);
    assert_eq!(decoded["token"], "LEGACY-CODE-42");

    let _ = child.kill();
}

#[test]
fn frames_after_stop_are_refused() {
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    request_ok(&mut stdin, &mut reader, "1", "scan.start", json!({}));
    let stopped = request_ok(&mut stdin, &mut reader, "2", "scan.stop", json!({}));
    assert_eq!(stopped["state"], "stopped");

    let refused = request(
        &mut stdin,
        &mut reader,
        "3",
        "scan.frame",
        json!({ "text": good_payload() }),
    );
    assert_eq!(error_code(&refused), "scan_not_active");

    // Restart re-arms the scanner.
    request_ok(&mut stdin, &mut reader, "4", "scan.start", json!({}));
    let decoded = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "scan.frame",
        json!({ "text": good_payload() }),
    );
    assert_eq!(decoded["decoded"], true);

    let _ = child.kill();
}
