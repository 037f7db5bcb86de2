// SPDX-License-Identifier: GPL-3.0-or-later

use assert_cmd::Command;
use predicates::prelude::*;
use std::error::Error;
use std::fs;
use std::io::{BufRead, BufReader, Read, Write};
use std::net::TcpListener;
use std::path::Path;
use std::thread;
use tempfile::{TempDir, tempdir};

const BIN: &str = "ubuntu-report";

/// A system root with the files the collector reads.
fn system_root() -> Result<TempDir, Box<dyn Error>> {
    let root = tempdir()?;
    fs::create_dir_all(root.path().join("etc"))?;
    fs::create_dir_all(root.path().join("proc"))?;
    fs::write(root.path().join("etc/os-release"), "ID=ubuntu\nVERSION_ID=\"18.04\"\n")?;
    fs::write(root.path().join("proc/meminfo"), "MemTotal: 8000000 kB\n")?;
    Ok(root)
}

fn command(root: &Path, cache: &Path) -> Result<Command, Box<dyn Error>> {
    let mut cmd = Command::cargo_bin(BIN)?;
    cmd.arg("--root").arg(root).arg("--cache-dir").arg(cache);
    cmd.env_remove("RUST_LOG");
    Ok(cmd)
}

/// Address of a local port where nothing listens.
fn closed_port() -> Result<String, Box<dyn Error>> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    Ok(format!("http://{}", listener.local_addr()?))
}

/// Serve one request with `200 OK`, returns the base URL and the received request line.
fn accepting_server() -> Result<(String, thread::JoinHandle<String>), Box<dyn Error>> {
    let listener = TcpListener::bind("127.0.0.1:0")?;
    let url = format!("http://{}", listener.local_addr()?);
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().unwrap();
        let mut reader = BufReader::new(stream.try_clone().unwrap());
        let mut request_line = String::new();
        reader.read_line(&mut request_line).unwrap();
        let mut content_length = 0;
        loop {
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            if line == "\r\n" || line.is_empty() {
                break;
            }
            if let Some(value) = line.to_lowercase().strip_prefix("content-length:") {
                content_length = value.trim().parse().unwrap();
            }
        }
        let mut body = vec![0; content_length];
        reader.read_exact(&mut body).unwrap();
        let mut writer = stream;
        writer
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
            .unwrap();
        request_line
    });
    Ok((url, handle))
}

#[test]
fn test_help() -> Result<(), Box<dyn Error>> {
    Command::cargo_bin(BIN)?
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Usage: ubuntu-report"));
    Ok(())
}

#[test]
fn test_unknown_subcommand_is_usage_error() -> Result<(), Box<dyn Error>> {
    Command::cargo_bin(BIN)?.arg("unknown").assert().code(2);
    Command::cargo_bin(BIN)?.args(["send", "maybe"]).assert().code(2);
    Ok(())
}

#[test]
fn test_show_prints_metrics() -> Result<(), Box<dyn Error>> {
    let root = system_root()?;
    let cache = tempdir()?;

    command(root.path(), cache.path())?
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("\"Version\": \"18.04\""))
        .stdout(predicate::str::contains("\"RAM\": 8.0"));

    assert!(!cache.path().join("ubuntu-report").exists());
    Ok(())
}

#[test]
fn test_send_refuses_when_already_reported() -> Result<(), Box<dyn Error>> {
    let root = system_root()?;
    let cache = tempdir()?;
    fs::create_dir_all(cache.path().join("ubuntu-report"))?;
    fs::write(cache.path().join("ubuntu-report/ubuntu.18.04"), "")?;

    command(root.path(), cache.path())?
        .args(["send", "yes", "--url"])
        .arg(closed_port()?)
        .assert()
        .code(1)
        .stderr(predicate::str::starts_with("ubuntu-report: "))
        .stderr(predicate::str::contains("already been reported"));

    assert!(!cache.path().join("ubuntu-report/pending").exists());
    Ok(())
}

#[test]
fn test_send_failure_stages_pending() -> Result<(), Box<dyn Error>> {
    let root = system_root()?;
    let cache = tempdir()?;

    command(root.path(), cache.path())?
        .args(["send", "no", "--timeout", "5", "--url"])
        .arg(closed_port()?)
        .assert()
        .code(1)
        .stderr(predicate::str::contains("saving for a later automated report"));

    let pending = fs::read_to_string(cache.path().join("ubuntu-report/pending"))?;
    assert_eq!(pending, r#"{"OptOut": true}"#);
    assert!(!cache.path().join("ubuntu-report/ubuntu.18.04").exists());
    Ok(())
}

#[test]
fn test_send_records_report() -> Result<(), Box<dyn Error>> {
    let root = system_root()?;
    let cache = tempdir()?;
    let (url, server) = accepting_server()?;

    command(root.path(), cache.path())?.args(["send", "yes", "--url", &url]).assert().success();

    let request_line = server.join().map_err(|_| "server thread failed")?;
    assert!(request_line.starts_with("POST /ubuntu/desktop/18.04 "));
    let report = fs::read_to_string(cache.path().join("ubuntu-report/ubuntu.18.04"))?;
    assert!(report.contains("\"Version\": \"18.04\""));
    Ok(())
}

#[test]
fn test_interactive_quit_writes_nothing() -> Result<(), Box<dyn Error>> {
    let root = system_root()?;
    let cache = tempdir()?;

    command(root.path(), cache.path())?
        .args(["interactive", "--url"])
        .arg(closed_port()?)
        .write_stdin("garbage\nq\n")
        .assert()
        .success()
        .stdout(predicate::str::contains("Do you agree to report this?"));

    assert!(!cache.path().join("ubuntu-report").exists());
    Ok(())
}

#[test]
fn test_service_without_pending_report() -> Result<(), Box<dyn Error>> {
    let root = system_root()?;
    let cache = tempdir()?;

    command(root.path(), cache.path())?.arg("service").assert().success();
    Ok(())
}

#[test]
fn test_service_delivers_pending_report() -> Result<(), Box<dyn Error>> {
    let root = system_root()?;
    let cache = tempdir()?;
    fs::create_dir_all(cache.path().join("ubuntu-report"))?;
    fs::write(cache.path().join("ubuntu-report/pending"), r#"{"OptOut": true}"#)?;
    let (url, server) = accepting_server()?;

    command(root.path(), cache.path())?.args(["service", "--url", &url]).assert().success();

    server.join().map_err(|_| "server thread failed")?;
    assert!(!cache.path().join("ubuntu-report/pending").exists());
    let report = fs::read_to_string(cache.path().join("ubuntu-report/ubuntu.18.04"))?;
    assert_eq!(report, r#"{"OptOut": true}"#);
    Ok(())
}
