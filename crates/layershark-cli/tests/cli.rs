use std::path::{Path, PathBuf};

use assert_cmd::Command;
use etherparse::PacketBuilder;
use predicates::prelude::PredicateBooleanExt;
use predicates::str::contains;
use serde_json::Value;
use tempfile::TempDir;

fn cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("layershark"))
}

const LINK_LOCAL_A: [u8; 16] = [0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 1];
const LINK_LOCAL_B: [u8; 16] = [0xfe, 0x80, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 2];

fn tcp_packet(seq: u32, payload: &[u8]) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [6, 5, 4, 3, 2, 1])
        .ipv6(LINK_LOCAL_A, LINK_LOCAL_B, 64)
        .tcp(40000, 443, seq, 1024)
        .ack(1);
    let mut packet = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut packet, payload).expect("build packet");
    packet
}

fn udp_packet(payload: &[u8]) -> Vec<u8> {
    let builder = PacketBuilder::ethernet2([1, 2, 3, 4, 5, 6], [6, 5, 4, 3, 2, 1])
        .ipv4([10, 0, 0, 1], [10, 0, 0, 2], 64)
        .udp(5353, 53);
    let mut packet = Vec::with_capacity(builder.size(payload.len()));
    builder.write(&mut packet, payload).expect("build packet");
    packet
}

/// Minimal big-endian pcapng: one Ethernet interface, one EPB per packet.
fn write_capture(path: &Path, packets: &[Vec<u8>]) {
    fn block(kind: u32, body: &[u8]) -> Vec<u8> {
        let total = (12 + body.len()) as u32;
        let mut out = Vec::new();
        out.extend_from_slice(&kind.to_be_bytes());
        out.extend_from_slice(&total.to_be_bytes());
        out.extend_from_slice(body);
        out.extend_from_slice(&total.to_be_bytes());
        out
    }

    let mut shb = Vec::new();
    shb.extend_from_slice(&0x1A2B3C4Du32.to_be_bytes());
    shb.extend_from_slice(&[0, 1, 0, 0]);
    shb.extend_from_slice(&(-1i64).to_be_bytes());
    let mut idb = Vec::new();
    idb.extend_from_slice(&[0, 1, 0, 0]);
    idb.extend_from_slice(&65535u32.to_be_bytes());

    let mut output = block(0x0A0D0D0A, &shb);
    output.extend(block(1, &idb));
    for (idx, data) in packets.iter().enumerate() {
        let ts_us = (idx as u64 + 1) * 1_000_000;
        let mut epb = Vec::new();
        epb.extend_from_slice(&0u32.to_be_bytes());
        epb.extend_from_slice(&((ts_us >> 32) as u32).to_be_bytes());
        epb.extend_from_slice(&(ts_us as u32).to_be_bytes());
        epb.extend_from_slice(&(data.len() as u32).to_be_bytes());
        epb.extend_from_slice(&(data.len() as u32).to_be_bytes());
        epb.extend_from_slice(data);
        epb.resize(epb.len().next_multiple_of(4), 0);
        output.extend(block(6, &epb));
    }
    std::fs::write(path, output).expect("write capture");
}

fn sample_capture(temp: &TempDir) -> PathBuf {
    let path = temp.path().join("input.pcapng");
    write_capture(
        &path,
        &[udp_packet(b"query"), tcp_packet(10, b"hello"), tcp_packet(15, b"world")],
    );
    path
}

#[test]
fn help_lists_dissect() {
    cmd()
        .arg("pcap")
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("dissect"));
    cmd()
        .arg("pcap")
        .arg("dissect")
        .arg("--help")
        .assert()
        .success()
        .stdout(contains("--query"));
}

#[test]
fn missing_input_shows_error_and_hint() {
    let temp = TempDir::new().expect("tempdir");
    let missing = temp.path().join("missing.pcapng");
    let report = temp.path().join("report.json");

    cmd()
        .arg("pcap")
        .arg("dissect")
        .arg(missing)
        .arg("-o")
        .arg(report)
        .assert()
        .code(2)
        .stderr(contains("error:").and(contains("hint:")));
}

#[test]
fn stdout_outputs_layered_json() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);
    let assert = cmd()
        .arg("pcap")
        .arg("dissect")
        .arg(input)
        .arg("--stdout")
        .assert()
        .success();
    let stdout = String::from_utf8(assert.get_output().stdout.clone()).expect("utf8 stdout");
    let report: Value = serde_json::from_str(&stdout).expect("valid json");

    assert_eq!(report["tool"]["name"], "layershark");
    assert_eq!(report["capture_summary"]["packets_total"], 3);
    assert_eq!(report["frames"][0]["primary"], "udp");
    assert_eq!(report["frames"][1]["layers"][2]["namespace"], "ipv6");
    assert_eq!(report["frames"][1]["layers"][2]["dispatch"], "ipv6.tcp");
}

#[test]
fn report_file_written_with_ok_message() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);
    let report = temp.path().join("out").join("report.json");

    cmd()
        .arg("pcap")
        .arg("dissect")
        .arg(&input)
        .arg("-o")
        .arg(&report)
        .arg("--threads")
        .arg("2")
        .assert()
        .success()
        .stderr(contains("OK: 3 frames dissected"));

    let text = std::fs::read_to_string(&report).expect("report");
    let value: Value = serde_json::from_str(&text).expect("valid json");
    assert_eq!(value["frames"].as_array().map(Vec::len), Some(3));
}

#[test]
fn quiet_suppresses_ok_message() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);
    let report = temp.path().join("report.json");

    cmd()
        .arg("pcap")
        .arg("dissect")
        .arg(input)
        .arg("-o")
        .arg(report)
        .arg("--quiet")
        .assert()
        .success()
        .stderr(contains("OK:").not());
}

#[test]
fn stdout_and_report_conflict() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);
    let report = temp.path().join("report.json");

    cmd()
        .arg("pcap")
        .arg("dissect")
        .arg(input)
        .arg("--stdout")
        .arg("-o")
        .arg(report)
        .assert()
        .failure()
        .stderr(contains("error:"));
}

#[test]
fn pretty_and_compact_conflict() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);

    cmd()
        .arg("pcap")
        .arg("dissect")
        .arg(input)
        .arg("--stdout")
        .arg("--pretty")
        .arg("--compact")
        .assert()
        .failure()
        .stderr(contains("error:"));
}

#[test]
fn report_cannot_overwrite_input() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);

    cmd()
        .arg("pcap")
        .arg("dissect")
        .arg(&input)
        .arg("-o")
        .arg(&input)
        .assert()
        .code(2)
        .stderr(contains("report path must differ from input"));
}

#[test]
fn glob_with_several_matches_is_rejected() {
    let temp = TempDir::new().expect("tempdir");
    write_capture(&temp.path().join("a.pcapng"), &[udp_packet(b"a")]);
    write_capture(&temp.path().join("b.pcapng"), &[udp_packet(b"b")]);
    let pattern = temp.path().join("*.pcapng");

    cmd()
        .arg("pcap")
        .arg("dissect")
        .arg(pattern)
        .arg("--stdout")
        .assert()
        .code(2)
        .stderr(contains("multiple files match pattern"));
}

#[test]
fn glob_with_one_match_is_resolved() {
    let temp = TempDir::new().expect("tempdir");
    sample_capture(&temp);
    let pattern = temp.path().join("in*.pcapng");

    cmd()
        .arg("pcap")
        .arg("dissect")
        .arg(pattern)
        .arg("--stdout")
        .assert()
        .success()
        .stdout(contains("\"report_version\":1"));
}

#[test]
fn query_prints_tab_separated_hits() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);

    cmd()
        .arg("pcap")
        .arg("dissect")
        .arg(input)
        .arg("--query")
        .arg("tcp.dst")
        .assert()
        .success()
        .stdout(contains("1\ttcp\t443\n").and(contains("2\ttcp\t443\n")));
}

#[test]
fn max_depth_flag_limits_layers() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);
    let assert = cmd()
        .arg("pcap")
        .arg("dissect")
        .arg(input)
        .arg("--stdout")
        .arg("--max-depth")
        .arg("1")
        .assert()
        .success();
    let report: Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("valid json");
    assert_eq!(report["frames"][0]["layers"].as_array().map(Vec::len), Some(2));
}

#[test]
fn zero_max_depth_is_rejected() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);

    cmd()
        .arg("pcap")
        .arg("dissect")
        .arg(input)
        .arg("--stdout")
        .arg("--max-depth")
        .arg("0")
        .assert()
        .code(2)
        .stderr(contains("invalid session settings"));
}

#[test]
fn config_file_enables_subset() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);
    let config = temp.path().join("session.toml");
    std::fs::write(&config, "enabled = [\"eth\", \"ipv4\", \"ipv6\"]\n").expect("config");

    let assert = cmd()
        .arg("pcap")
        .arg("dissect")
        .arg(input)
        .arg("--stdout")
        .arg("--config")
        .arg(&config)
        .assert()
        .success();
    let report: Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("valid json");
    let layers = &report["capture_summary"]["layers"];
    assert_eq!(layers["ipv4"], 1);
    assert!(layers.get("udp").is_none());
    assert!(layers.get("tcp").is_none());
}

#[test]
fn invalid_config_reports_hint() {
    let temp = TempDir::new().expect("tempdir");
    let input = sample_capture(&temp);
    let config = temp.path().join("session.toml");
    std::fs::write(&config, "unknown_key = 1\n").expect("config");

    cmd()
        .arg("pcap")
        .arg("dissect")
        .arg(input)
        .arg("--stdout")
        .arg("--config")
        .arg(&config)
        .assert()
        .code(2)
        .stderr(contains("invalid config").and(contains("hint:")));
}
