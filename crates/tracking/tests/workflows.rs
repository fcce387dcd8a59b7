//! End-to-end workflows against an in-memory broker

mod common;

use broker::{Feedback, Severity, Version};
use common::{connection, later, new_grain, track, MemoryBroker, ScriptedResolver};
use grain::{GrainId, IgnoreFilter, Scope, TrackingStatus};
use journal::JsonFormat;
use tempfile::TempDir;
use tokio_util::sync::CancellationToken;
use tracking::directory::{LOCAL_STATE_FILE, SNAPSHOT_FILE};
use tracking::ops::{
    self, AnchorRef, PullOptions, PushOptions, PushStatus, StatusOptions, TrackOptions,
};
use tracking::{Adopt, Resolution, ResultCode, SnapshotDirectory, VcsFlavor};

fn cancel() -> CancellationToken {
    CancellationToken::new()
}

/// Snapshot of `/root` on `first`, reconnected to `second` with a fresh working copy
async fn moved_to(
    first: &MemoryBroker,
    second: &MemoryBroker,
    root: GrainId,
    temp: &TempDir,
) -> SnapshotDirectory {
    let mut dir = track(first, temp.path(), root, Scope::FAMILY).await;
    dir.disconnect().unwrap();
    ops::connect(&mut dir, second, connection(), Adopt::Keep, &cancel())
        .await
        .unwrap();
    dir
}

#[tokio::test]
async fn test_track_stores_tree() {
    let temp = TempDir::new().unwrap();
    let (broker, tree) = MemoryBroker::with_tree();
    let dir = track(&broker, temp.path(), tree.root, Scope::FAMILY).await;

    assert!(temp.path().join(SNAPSHOT_FILE).exists());
    assert!(temp.path().join(LOCAL_STATE_FILE).exists());
    let gitignore = std::fs::read_to_string(temp.path().join(".gitignore")).unwrap();
    assert!(gitignore.contains(LOCAL_STATE_FILE));

    for id in [tree.root, tree.a, tree.b] {
        assert!(dir.contains_grain(id));
    }
    let checkpoint = dir.load_checkpoint(1).unwrap();
    assert_eq!(checkpoint.modifications.len(), 3);
    assert_eq!(checkpoint.latest, common::base_time());
    assert!(dir.local_checkpoint().unwrap().same_as(dir.shared_checkpoint().unwrap()));

    let snapshot = dir.snapshot().unwrap();
    assert_eq!(snapshot.anchor, vec![tree.root]);
    assert_eq!(snapshot.schema_version, Some(common::SCHEMA));

    let reopened = SnapshotDirectory::open(temp.path(), JsonFormat::default()).unwrap();
    assert!(reopened.is_ready());
    assert_eq!(reopened.broker_instance_id(), Some(broker.instance_id()));
}

#[tokio::test]
async fn test_track_applies_ignore_filter() {
    let temp = TempDir::new().unwrap();
    let (broker, tree) = MemoryBroker::with_tree();
    let mut dir = SnapshotDirectory::new(temp.path(), JsonFormat::default());
    let mut ignores = IgnoreFilter::default();
    ignores.ids.insert(tree.a);

    let outcome = ops::track(
        &mut dir,
        &broker,
        connection(),
        TrackOptions {
            anchor: AnchorRef::Path("/root".to_string()),
            scope: Scope::FAMILY,
            vcs: VcsFlavor::None,
            ignores,
        },
        &cancel(),
    )
    .await
    .unwrap();

    assert_eq!(outcome.anchor.id, tree.root);
    assert_eq!(outcome.stored, 2);
    assert_eq!(outcome.ignored, vec![tree.a]);
    assert!(!dir.contains_grain(tree.a));
    assert!(dir.has_ignores());
    assert!(!temp.path().join(".gitignore").exists());
}

#[tokio::test]
async fn test_track_unknown_anchor_leaves_nothing_behind() {
    let temp = TempDir::new().unwrap();
    let (broker, _) = MemoryBroker::with_tree();
    let mut dir = SnapshotDirectory::new(temp.path(), JsonFormat::default());

    let err = ops::track(
        &mut dir,
        &broker,
        connection(),
        TrackOptions {
            anchor: AnchorRef::Path("/nowhere".to_string()),
            scope: Scope::FAMILY,
            vcs: VcsFlavor::Git,
            ignores: IgnoreFilter::default(),
        },
        &cancel(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.code(), ResultCode::AnchorGrainError);
    assert!(!dir.has_snapshot());
}

#[tokio::test]
async fn test_push_right_after_track_is_up_to_date() {
    let temp = TempDir::new().unwrap();
    let (broker, tree) = MemoryBroker::with_tree();
    let mut dir = track(&broker, temp.path(), tree.root, Scope::FAMILY).await;

    let outcome = ops::push(&mut dir, &broker, PushOptions::default(), &cancel())
        .await
        .unwrap();
    assert_eq!(outcome.status, PushStatus::UpToDate);
    assert_eq!(broker.calls().push, 0);
}

#[tokio::test]
async fn test_push_with_empty_range_skips_broker() {
    let temp = TempDir::new().unwrap();
    let broker = MemoryBroker::new();
    let root = new_grain(None, "root", common::base_time());
    let root_id = root.id;
    broker.insert(root);
    // Children only, and there are none
    let mut dir = track(&broker, temp.path(), root_id, Scope::CHILDREN).await;

    let options = PushOptions {
        starting_checkpoint: Some(0),
        ..Default::default()
    };
    let outcome = ops::push(&mut dir, &broker, options, &cancel()).await.unwrap();
    assert_eq!(outcome.status, PushStatus::NothingToPush);
    assert_eq!(broker.calls().push, 0);
    assert_eq!(dir.last_push_checkpoint(), 1);
}

#[tokio::test]
async fn test_push_to_new_broker_then_noop() {
    let temp = TempDir::new().unwrap();
    let (first, tree) = MemoryBroker::with_tree();
    let second = MemoryBroker::new();
    let mut dir = moved_to(&first, &second, tree.root, &temp).await;
    assert_eq!(dir.local_checkpoint().unwrap().ordinal, 0);

    let outcome = ops::push(&mut dir, &second, PushOptions::default(), &cancel())
        .await
        .unwrap();
    assert_eq!(outcome.status, PushStatus::Pushed);
    assert_eq!(outcome.stored.len(), 3);
    assert_eq!(second.len(), 3);
    assert_eq!(second.get(tree.a).unwrap().path.as_deref(), Some("/root/a"));
    assert!(dir.local_checkpoint().unwrap().same_as(dir.shared_checkpoint().unwrap()));

    let again = ops::push(&mut dir, &second, PushOptions::default(), &cancel())
        .await
        .unwrap();
    assert!(again.is_noop());
    assert_eq!(second.calls().push, 1);
}

#[tokio::test]
async fn test_push_errors_resend_last_batch() {
    let temp = TempDir::new().unwrap();
    let (first, tree) = MemoryBroker::with_tree();
    let second = MemoryBroker::new();
    let mut dir = moved_to(&first, &second, tree.root, &temp).await;
    second.set_push_feedback(vec![Feedback {
        feedback_type: Severity::Error,
        message: "rejected".to_string(),
        object_id: None,
        code: Some(17),
    }]);

    let outcome = ops::push(&mut dir, &second, PushOptions::default(), &cancel())
        .await
        .unwrap();
    assert!(outcome.has_warnings());
    assert!(dir.local_state().unwrap().last_push_has_errors);

    let retry = ops::push(&mut dir, &second, PushOptions::default(), &cancel())
        .await
        .unwrap();
    assert_eq!(retry.status, PushStatus::Pushed);
    assert_eq!(second.calls().push, 2);
    assert!(!dir.local_state().unwrap().last_push_has_errors);

    let done = ops::push(&mut dir, &second, PushOptions::default(), &cancel())
        .await
        .unwrap();
    assert_eq!(done.status, PushStatus::UpToDate);
    assert_eq!(second.calls().push, 2);
}

#[tokio::test]
async fn test_pull_twice_second_is_noop() {
    let temp = TempDir::new().unwrap();
    let (broker, tree) = MemoryBroker::with_tree();
    let mut dir = track(&broker, temp.path(), tree.root, Scope::FAMILY).await;
    broker.touch(tree.a, later(10));

    let mut resolver = ScriptedResolver::default();
    let first = ops::pull(&mut dir, &broker, &mut resolver, PullOptions::default(), &cancel())
        .await
        .unwrap();
    assert_eq!(first.changes, 1);
    assert_eq!(first.ordinal, Some(1));
    assert_eq!(dir.load_grain(tree.a).unwrap().unwrap().m_time, later(10));

    let second = ops::pull(&mut dir, &broker, &mut resolver, PullOptions::default(), &cancel())
        .await
        .unwrap();
    assert!(second.is_noop());
    assert!(resolver.prompts.is_empty());

    let report = ops::status(&dir, &broker, StatusOptions::default(), &cancel())
        .await
        .unwrap();
    assert!(!report.is_outdated());
}

#[tokio::test]
async fn test_pull_purges_grains_deleted_on_broker() {
    let temp = TempDir::new().unwrap();
    let (broker, tree) = MemoryBroker::with_tree();
    let mut dir = track(&broker, temp.path(), tree.root, Scope::FAMILY).await;
    broker.touch(tree.a, later(10));
    broker.remove(tree.b);

    let mut resolver = ScriptedResolver::default();
    let outcome = ops::pull(&mut dir, &broker, &mut resolver, PullOptions::default(), &cancel())
        .await
        .unwrap();
    assert_eq!(outcome.purged.len(), 1);
    assert_eq!(outcome.purged[0].id, tree.b);
    assert!(!dir.contains_grain(tree.b));

    let checkpoint = dir.load_checkpoint(1).unwrap();
    assert!(checkpoint.deletions.contains(&tree.b));
    assert!(!checkpoint.modifications.contains(&tree.b));
}

#[tokio::test]
async fn test_reconnected_pull_opens_next_checkpoint() {
    let temp = TempDir::new().unwrap();
    let (broker, tree) = MemoryBroker::with_tree();
    let mut dir = track(&broker, temp.path(), tree.root, Scope::FAMILY).await;
    dir.disconnect().unwrap();
    ops::connect(&mut dir, &broker, connection(), Adopt::Keep, &cancel())
        .await
        .unwrap();

    broker.touch(tree.a, later(10));
    broker.remove(tree.b);
    let mut resolver = ScriptedResolver::default();
    let outcome = ops::pull(&mut dir, &broker, &mut resolver, PullOptions::default(), &cancel())
        .await
        .unwrap();

    assert_eq!(outcome.stored.len(), 1);
    assert_eq!(outcome.stored[0].id, tree.a);
    assert_eq!(outcome.purged.len(), 1);
    assert_eq!(outcome.ordinal, Some(2));
    assert_eq!(dir.snapshot().unwrap().checkpoint, 2);

    let checkpoint = dir.load_checkpoint(2).unwrap();
    assert!(checkpoint.modifications.contains(&tree.a));
    assert!(checkpoint.deletions.contains(&tree.b));
    assert!(dir.local_checkpoint().unwrap().same_as(dir.shared_checkpoint().unwrap()));
}

/// Edit the cached copy of a grain directly on disk
fn edit_locally(dir: &mut SnapshotDirectory, id: GrainId) {
    let mut cached = dir.load_grain(id).unwrap().unwrap();
    cached.name = "edited locally".to_string();
    cached.m_time = later(5);
    dir.store_grain(&cached, false, false).unwrap();
}

#[tokio::test]
async fn test_conflict_keep_local_after_diff() {
    let temp = TempDir::new().unwrap();
    let (broker, tree) = MemoryBroker::with_tree();
    let mut dir = track(&broker, temp.path(), tree.root, Scope::FAMILY).await;
    edit_locally(&mut dir, tree.a);
    broker.touch(tree.a, later(10));

    let mut resolver = ScriptedResolver::new([Resolution::ShowDiff, Resolution::KeepLocal]);
    let outcome = ops::pull(&mut dir, &broker, &mut resolver, PullOptions::default(), &cancel())
        .await
        .unwrap();

    assert_eq!(resolver.prompts, vec![tree.a, tree.a]);
    assert_eq!(resolver.diffs, 1);
    assert_eq!(outcome.changes, 1);
    let kept = dir.load_grain(tree.a).unwrap().unwrap();
    assert_eq!(kept.name, "edited locally");
    assert_eq!(kept.m_time, later(10));
}

#[tokio::test]
async fn test_conflict_saved_to_side_file() {
    let temp = TempDir::new().unwrap();
    let (broker, tree) = MemoryBroker::with_tree();
    let mut dir = track(&broker, temp.path(), tree.root, Scope::FAMILY).await;
    edit_locally(&mut dir, tree.a);
    broker.touch(tree.a, later(10));

    let mut resolver = ScriptedResolver::new([Resolution::SaveSideFile]);
    let outcome = ops::pull(&mut dir, &broker, &mut resolver, PullOptions::default(), &cancel())
        .await
        .unwrap();

    assert_eq!(outcome.side_files.len(), 1);
    assert!(outcome.side_files[0].exists());
    assert!(outcome.stored.is_empty());
    assert_eq!(dir.load_grain(tree.a).unwrap().unwrap().name, "edited locally");
}

#[tokio::test]
async fn test_overwrite_skips_resolver() {
    let temp = TempDir::new().unwrap();
    let (broker, tree) = MemoryBroker::with_tree();
    let mut dir = track(&broker, temp.path(), tree.root, Scope::FAMILY).await;
    edit_locally(&mut dir, tree.a);
    broker.touch(tree.a, later(10));

    let mut resolver = ScriptedResolver::default();
    let options = PullOptions {
        overwrite: true,
        ..Default::default()
    };
    ops::pull(&mut dir, &broker, &mut resolver, options, &cancel())
        .await
        .unwrap();
    assert_eq!(dir.load_grain(tree.a).unwrap().unwrap().name, "a");
}

#[tokio::test]
async fn test_connect_adopting_shared_checkpoint() {
    let temp = TempDir::new().unwrap();
    let (broker, tree) = MemoryBroker::with_tree();
    let mut dir = track(&broker, temp.path(), tree.root, Scope::FAMILY).await;
    dir.disconnect().unwrap();
    assert!(!dir.is_connected());

    ops::connect(&mut dir, &broker, connection(), Adopt::Shared, &cancel())
        .await
        .unwrap();
    assert!(dir.local_checkpoint().unwrap().same_as(dir.shared_checkpoint().unwrap()));

    let reopened = SnapshotDirectory::open(temp.path(), JsonFormat::default()).unwrap();
    assert_eq!(reopened.local_checkpoint().unwrap().ordinal, 1);
}

#[tokio::test]
async fn test_connect_requires_anchor_ancestors() {
    let temp = TempDir::new().unwrap();
    let (first, tree) = MemoryBroker::with_tree();
    let mut dir = track(&first, temp.path(), tree.a, Scope::ANCHOR).await;
    assert_eq!(dir.snapshot().unwrap().anchor, vec![tree.root, tree.a]);
    dir.disconnect().unwrap();

    let empty = MemoryBroker::new();
    let err = ops::connect(&mut dir, &empty, connection(), Adopt::Keep, &cancel())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ResultCode::AnchorGrainError);
    assert!(!dir.is_connected());
}

#[tokio::test]
async fn test_track_pulls_in_pages() {
    let temp = TempDir::new().unwrap();
    let broker = MemoryBroker::new();
    let root = new_grain(None, "root", common::base_time());
    let root_id = root.id;
    for i in 0..250 {
        broker.insert(new_grain(Some(&root), &format!("child-{i:03}"), common::base_time()));
    }
    broker.insert(root);

    let dir = track(&broker, temp.path(), root_id, Scope::FAMILY).await;
    assert_eq!(broker.calls().pull, 3);
    assert_eq!(dir.list_grains(None).unwrap().len(), 251);
}

#[tokio::test]
async fn test_status_reports_broker_changes() {
    let temp = TempDir::new().unwrap();
    let (broker, tree) = MemoryBroker::with_tree();
    let dir = track(&broker, temp.path(), tree.root, Scope::FAMILY).await;

    let clean = ops::status(&dir, &broker, StatusOptions::default(), &cancel())
        .await
        .unwrap();
    assert!(clean.in_sync);
    assert!(!clean.is_outdated());
    assert_eq!(clean.result_code(), ResultCode::Success);

    let root = broker.get(tree.root).unwrap();
    let added = new_grain(Some(&root), "c", later(20));
    let added_id = added.id;
    broker.insert(added);
    broker.touch(tree.a, later(10));

    let report = ops::status(&dir, &broker, StatusOptions::default(), &cancel())
        .await
        .unwrap();
    assert_eq!(report.result_code(), ResultCode::StatusOutOfDate);
    let a = report.entries.iter().find(|e| e.id == tree.a).unwrap();
    assert_eq!((a.local, a.broker), (TrackingStatus::Uptodate, TrackingStatus::Modified));
    let c = report.entries.iter().find(|e| e.id == added_id).unwrap();
    assert_eq!(c.broker, TrackingStatus::New);
}

#[tokio::test]
async fn test_cancelled_pull_reports_cancellation() {
    let temp = TempDir::new().unwrap();
    let (broker, tree) = MemoryBroker::with_tree();
    let mut dir = track(&broker, temp.path(), tree.root, Scope::FAMILY).await;

    let token = cancel();
    token.cancel();
    let mut resolver = ScriptedResolver::default();
    let err = ops::pull(&mut dir, &broker, &mut resolver, PullOptions::default(), &token)
        .await
        .unwrap_err();
    assert!(err.is_cancelled());
}

#[tokio::test]
async fn test_foreign_broker_is_rejected() {
    let temp = TempDir::new().unwrap();
    let (broker, tree) = MemoryBroker::with_tree();
    let mut dir = track(&broker, temp.path(), tree.root, Scope::FAMILY).await;
    let (foreign, _) = MemoryBroker::with_tree();
    assert_ne!(foreign.instance_id(), broker.instance_id());

    let options = PushOptions {
        starting_checkpoint: Some(0),
        ..Default::default()
    };
    let err = ops::push(&mut dir, &foreign, options, &cancel())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ResultCode::InstanceIdError);
    assert_eq!(foreign.calls().push, 0);
    assert_eq!(foreign.len(), 3);

    let mut resolver = ScriptedResolver::default();
    let err = ops::pull(&mut dir, &foreign, &mut resolver, PullOptions::default(), &cancel())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ResultCode::InstanceIdError);
    assert_eq!(foreign.calls().list, 0);

    let err = ops::status(&dir, &foreign, StatusOptions::default(), &cancel())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ResultCode::InstanceIdError);

    let err = ops::sync(
        &mut dir,
        &foreign,
        &mut resolver,
        PushOptions::default(),
        PullOptions::default(),
        &cancel(),
    )
    .await
    .unwrap_err();
    assert_eq!(err.code(), ResultCode::InstanceIdError);
}

#[tokio::test]
async fn test_schema_change_is_rejected() {
    let temp = TempDir::new().unwrap();
    let (broker, tree) = MemoryBroker::with_tree();
    let dir = track(&broker, temp.path(), tree.root, Scope::FAMILY).await;
    let upgraded = MemoryBroker::with_identity(broker.instance_id(), Version::new(0, 2, 0));

    let err = ops::status(&dir, &upgraded, StatusOptions::default(), &cancel())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ResultCode::SchemaVersionError);
}

#[tokio::test]
async fn test_status_reports_unrecorded_grain_as_obscure() {
    let temp = TempDir::new().unwrap();
    let (broker, tree) = MemoryBroker::with_tree();
    let mut dir = track(&broker, temp.path(), tree.root, Scope::FAMILY).await;
    let root = broker.get(tree.root).unwrap();
    let stray = new_grain(Some(&root), "stray", common::base_time());
    let stray_id = stray.id;
    dir.store_grain(&stray, false, false).unwrap();

    let report = ops::status(&dir, &broker, StatusOptions::default(), &cancel())
        .await
        .unwrap();
    let entry = report.entries.iter().find(|e| e.id == stray_id).unwrap();
    assert_eq!(entry.path.as_deref(), Some("/root/stray"));
    assert_eq!(
        (entry.local, entry.broker),
        (TrackingStatus::Obscure, TrackingStatus::Uptodate)
    );
    assert_eq!(report.result_code(), ResultCode::StatusOutOfDate);
}

#[tokio::test]
async fn test_status_assume_reset_marks_everything_modified() {
    let temp = TempDir::new().unwrap();
    let (broker, tree) = MemoryBroker::with_tree();
    let dir = track(&broker, temp.path(), tree.root, Scope::FAMILY).await;

    let options = StatusOptions { assume_reset: true };
    let report = ops::status(&dir, &broker, options, &cancel()).await.unwrap();
    for id in [tree.root, tree.a, tree.b] {
        let entry = report.entries.iter().find(|e| e.id == id).unwrap();
        assert_eq!(
            (entry.local, entry.broker),
            (TrackingStatus::Modified, TrackingStatus::Uptodate)
        );
    }
}

#[tokio::test]
async fn test_sync_pushes_then_pulls() {
    let temp = TempDir::new().unwrap();
    let (broker, tree) = MemoryBroker::with_tree();
    let mut dir = track(&broker, temp.path(), tree.root, Scope::FAMILY).await;
    broker.touch(tree.a, later(10));

    let mut resolver = ScriptedResolver::default();
    let outcome = ops::sync(
        &mut dir,
        &broker,
        &mut resolver,
        PushOptions::default(),
        PullOptions::default(),
        &cancel(),
    )
    .await
    .unwrap();
    assert_eq!(outcome.push.status, PushStatus::UpToDate);
    assert_eq!(outcome.pull.changes, 1);
    assert_eq!(dir.load_grain(tree.a).unwrap().unwrap().m_time, later(10));
}

#[tokio::test]
async fn test_sync_stops_when_push_fails() {
    let temp = TempDir::new().unwrap();
    let (broker, tree) = MemoryBroker::with_tree();
    let mut dir = track(&broker, temp.path(), tree.root, Scope::FAMILY).await;
    broker.touch(tree.a, later(10));
    broker.reject_pushes();
    let lists = broker.calls().list;

    let mut resolver = ScriptedResolver::default();
    let push_options = PushOptions {
        starting_checkpoint: Some(0),
        ..Default::default()
    };
    let err = ops::sync(
        &mut dir,
        &broker,
        &mut resolver,
        push_options,
        PullOptions::default(),
        &cancel(),
    )
    .await
    .unwrap_err();

    assert_eq!(err.code(), ResultCode::BrokerPushError);
    assert_eq!(broker.calls().push, 1);
    assert_eq!(broker.calls().list, lists);
    assert_eq!(dir.load_grain(tree.a).unwrap().unwrap().m_time, common::base_time());
}

#[tokio::test]
async fn test_push_sends_deletions() {
    let temp = TempDir::new().unwrap();
    let (first, tree) = MemoryBroker::with_tree();
    let mut dir = track(&first, temp.path(), tree.root, Scope::FAMILY).await;
    let b = first.get(tree.b).unwrap();
    first.touch(tree.a, later(10));
    first.remove(tree.b);
    let mut resolver = ScriptedResolver::default();
    ops::pull(&mut dir, &first, &mut resolver, PullOptions::default(), &cancel())
        .await
        .unwrap();
    assert!(!dir.contains_grain(tree.b));

    let second = MemoryBroker::new();
    second.insert(b);
    dir.disconnect().unwrap();
    ops::connect(&mut dir, &second, connection(), Adopt::Keep, &cancel())
        .await
        .unwrap();

    let outcome = ops::push(&mut dir, &second, PushOptions::default(), &cancel())
        .await
        .unwrap();
    assert_eq!(outcome.status, PushStatus::Pushed);
    assert_eq!(outcome.deleted, vec![tree.b]);
    assert!(outcome.stored.iter().all(|g| g.id != tree.b));
    assert!(second.get(tree.b).is_none());
    assert!(second.get(tree.a).is_some());
}

#[tokio::test]
async fn test_connect_adopting_older_ordinal() {
    let temp = TempDir::new().unwrap();
    let (broker, tree) = MemoryBroker::with_tree();
    let mut dir = track(&broker, temp.path(), tree.root, Scope::FAMILY).await;
    broker.touch(tree.a, later(10));
    let mut resolver = ScriptedResolver::default();
    let options = PullOptions {
        force_checkpoint: true,
        ..Default::default()
    };
    let outcome = ops::pull(&mut dir, &broker, &mut resolver, options, &cancel())
        .await
        .unwrap();
    assert_eq!(outcome.ordinal, Some(2));
    dir.disconnect().unwrap();

    let err = ops::connect(&mut dir, &broker, connection(), Adopt::Ordinal(9), &cancel())
        .await
        .unwrap_err();
    assert_eq!(err.code(), ResultCode::SnapshotInitError);
    assert!(!dir.is_connected());

    ops::connect(&mut dir, &broker, connection(), Adopt::Ordinal(1), &cancel())
        .await
        .unwrap();
    assert_eq!(dir.local_checkpoint().unwrap().ordinal, 1);
    assert_eq!(dir.shared_checkpoint().unwrap().ordinal, 2);
    assert!(!dir.local_checkpoint().unwrap().same_as(dir.shared_checkpoint().unwrap()));

    let reopened = SnapshotDirectory::open(temp.path(), JsonFormat::default()).unwrap();
    assert_eq!(reopened.local_checkpoint().unwrap().ordinal, 1);
}
