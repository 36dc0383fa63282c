#![cfg(feature = "cli")]

use std::path::PathBuf;
use std::process::Command;

use amqpmux_frame::{CloseReason, Frame, FrameWriter, Method, MethodId};
use bytes::Bytes;

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "amqpmux-cli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn write_capture(dir: &PathBuf, with_protocol_header: bool) -> PathBuf {
    let mut bytes = Vec::new();
    if with_protocol_header {
        bytes.extend_from_slice(b"AMQP\x00\x00\x09\x01");
    }
    let mut writer = FrameWriter::new(bytes);
    for frame in [
        Frame::method(1, Method::channel_open()),
        Frame::method(1, Method::empty(MethodId::CHANNEL_OPEN_OK)),
        Frame::method(2, Method::empty(MethodId::BASIC_DELIVER)),
        Frame::header(2, 60, 3, Bytes::from_static(&[0, 0])),
        Frame::body(2, Bytes::from_static(b"abc")),
        Frame::method(0, Method::connection_close(&CloseReason::normal())),
    ] {
        writer.write_frame(&frame).expect("frame should encode");
    }
    writer.flush().expect("flush should succeed");

    let path = dir.join("session.bin");
    std::fs::write(&path, writer.into_inner()).expect("capture should be writable");
    path
}

fn amqpmux() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_amqpmux"));
    cmd.arg("--log-level").arg("error");
    cmd
}

#[test]
fn inspect_lists_every_frame_as_json() {
    let dir = unique_temp_dir("frames");
    let capture = write_capture(&dir, true);

    let output = amqpmux()
        .args(["--format", "json", "inspect"])
        .arg(&capture)
        .output()
        .expect("inspect should run");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    let lines: Vec<&str> = stdout.lines().collect();
    assert_eq!(lines.len(), 6);

    let first: serde_json::Value = serde_json::from_str(lines[0]).expect("line should be json");
    assert_eq!(first["channel"], 1);
    assert_eq!(first["kind"], "method");
    assert_eq!(first["method"], "channel.open");

    let last: serde_json::Value = serde_json::from_str(lines[5]).expect("line should be json");
    assert_eq!(last["channel_name"], "CONNECTION");
    assert_eq!(last["detail"], "connection.close 200 OK");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn inspect_summary_groups_by_channel() {
    let dir = unique_temp_dir("summary");
    let capture = write_capture(&dir, false);

    let output = amqpmux()
        .args(["--format", "json", "inspect", "--summary"])
        .arg(&capture)
        .output()
        .expect("inspect should run");

    assert!(output.status.success());
    let summary: serde_json::Value =
        serde_json::from_slice(&output.stdout).expect("summary should be json");
    assert_eq!(summary["frames"], 6);

    let channels = summary["channels"].as_array().expect("channels array");
    assert_eq!(channels.len(), 3);
    assert_eq!(channels[2]["channel"], 2);
    assert_eq!(channels[2]["body_bytes"], 3);
    assert_eq!(channels[2]["last_method"], "basic.deliver");

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn inspect_truncated_capture_exits_data_invalid() {
    let dir = unique_temp_dir("truncated");
    let capture = write_capture(&dir, false);
    let mut bytes = std::fs::read(&capture).expect("capture should be readable");
    bytes.truncate(bytes.len() - 2);
    std::fs::write(&capture, bytes).expect("capture should be writable");

    let output = amqpmux()
        .arg("inspect")
        .arg(&capture)
        .output()
        .expect("inspect should run");

    assert_eq!(output.status.code(), Some(60));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("truncated frame"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn inspect_missing_capture_exits_not_found() {
    let output = amqpmux()
        .arg("inspect")
        .arg("/nonexistent/amqpmux/capture.bin")
        .output()
        .expect("inspect should run");

    assert_eq!(output.status.code(), Some(66));
}

#[test]
fn version_prints_package_version() {
    let output = amqpmux().arg("version").output().expect("version should run");
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.trim(), format!("amqpmux {}", env!("CARGO_PKG_VERSION")));
}
