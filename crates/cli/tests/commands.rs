//! Command-line behavior that needs no live broker

#![cfg(unix)]

mod common;

use anyhow::Result;
use broker::Version;
use chrono::Utc;
use grain::{Grain, Scope};
use journal::JsonFormat;
use std::path::Path;
use tempfile::TempDir;
use tracking::{ResultCode, Snapshot, SnapshotDirectory, VcsFlavor};
use uuid::Uuid;

/// Disconnected snapshot anchored at a fresh id, with two cached grains
fn offline_snapshot(path: &Path) -> (Uuid, Grain, Grain) {
    let anchor = Uuid::new_v4();
    let mut snapshot = Snapshot::new(Scope::RECURSIVE, Some(Version::new(0, 1, 3)));
    snapshot.anchor = vec![anchor];

    let mut dir = SnapshotDirectory::new(path, JsonFormat::default());
    dir.initialize(Uuid::new_v4(), snapshot, VcsFlavor::None, None)
        .unwrap();
    dir.disconnect().unwrap();

    let first = Grain::new(Uuid::new_v4(), "landing", Utc::now());
    let mut second = first.clone();
    second.id = Uuid::new_v4();
    second.name = "landing page".to_string();
    dir.store_grain(&first, false, false).unwrap();
    dir.store_grain(&second, false, false).unwrap();
    (anchor, first, second)
}

#[test]
fn test_help_lists_commands() -> Result<()> {
    let temp = TempDir::new()?;
    let result = granary!(temp.path(), "--help").assert_success()?;
    for command in ["track", "connect", "logout", "push", "pull", "sync", "status", "info", "diff"] {
        assert!(result.contains_stdout(command), "missing {command}");
    }
    Ok(())
}

#[test]
fn test_invalid_anchor_is_parameter_error() -> Result<()> {
    let temp = TempDir::new()?;
    granary!(temp.path(), "track", "http://localhost:5000/", "not-an-anchor")
        .assert_code(ResultCode::ParameterError.as_i32())?;
    Ok(())
}

#[test]
fn test_invalid_url_is_parameter_error() -> Result<()> {
    let temp = TempDir::new()?;
    let result = granary!(temp.path(), "track", "ftp://broker", "/root")
        .assert_code(ResultCode::ParameterError.as_i32())?;
    assert!(result.contains_stderr("invalid broker URL"));
    assert!(!temp.path().join(".granary-snapshot.json").exists());
    Ok(())
}

#[test]
fn test_invalid_adopt_checkpoint() -> Result<()> {
    let temp = TempDir::new()?;
    granary!(
        temp.path(),
        "connect",
        "http://localhost:5000/",
        "--adopt-checkpoint",
        "-5"
    )
    .assert_code(ResultCode::ParameterError.as_i32())?;
    Ok(())
}

#[test]
fn test_unreachable_broker() -> Result<()> {
    let temp = TempDir::new()?;
    granary!(temp.path(), "track", "http://127.0.0.1:9/", "/root")
        .assert_code(ResultCode::BrokerConnectionError.as_i32())?;
    assert!(!temp.path().join(".granary-snapshot.json").exists());
    Ok(())
}

#[test]
fn test_status_without_snapshot() -> Result<()> {
    let temp = TempDir::new()?;
    granary!(temp.path(), "status").assert_code(ResultCode::SnapshotStateError.as_i32())?;
    Ok(())
}

#[test]
fn test_info_on_disconnected_snapshot() -> Result<()> {
    let temp = TempDir::new()?;
    let snapshot_dir = temp.path().join("snapshot");
    let (anchor, _, _) = offline_snapshot(&snapshot_dir);

    let dir_arg = snapshot_dir.display().to_string();
    let result = granary!(temp.path(), "-d", &dir_arg, "info").assert_success()?;
    assert!(result.contains_stdout("Not connected"));
    assert!(result.contains_stdout(&anchor.to_string()));
    assert!(result.contains_stdout("Descendants"));
    Ok(())
}

#[test]
fn test_diff_cached_grains() -> Result<()> {
    let temp = TempDir::new()?;
    let (_, first, second) = offline_snapshot(temp.path());

    let first_id = first.id.to_string();
    let second_id = second.id.to_string();
    let result = granary!(temp.path(), "diff", &first_id, &second_id).assert_success()?;
    assert!(result.contains_stdout("landing page"));
    assert!(result.contains_stdout(&format!("snapshot:{first_id}")));

    let same = granary!(temp.path(), "diff", &first_id, &first_id).assert_success()?;
    assert!(same.contains_stdout("identical"));
    Ok(())
}

#[test]
fn test_diff_against_itself_needs_two_ids() -> Result<()> {
    let temp = TempDir::new()?;
    let (_, first, _) = offline_snapshot(temp.path());

    let first_id = first.id.to_string();
    granary!(temp.path(), "diff", &first_id, "--mode", "snapshot")
        .assert_code(ResultCode::ParameterError.as_i32())?;
    Ok(())
}
