#![allow(clippy::disallowed_methods)]

mod common;

use std::error::Error;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use actors::{EngineConfig, SelectorExtractor};
use common::{
    CrashOnceExtractor, FakeFetcher, GatedFetcher, URL, eventually, page, summary_analyzer,
};
use tokio::sync::Semaphore;
use watch_core::{
    ChangeType, FetchError, MAX_CHANGE_HISTORY, NewTarget, NotificationSettings, TargetId,
    TargetPatch, WatchError, WatchEvent,
};

const FIVE_MINUTES: Duration = Duration::from_secs(5 * 60);
const MARGIN: Duration = Duration::from_secs(1);

fn selectors() -> Vec<String> {
    vec!["title".to_string(), "h1".to_string()]
}

fn watched(owner: &str) -> NewTarget {
    NewTarget::new(URL, "Shop", owner, selectors())
        .with_interval(5)
        .with_notifications(NotificationSettings::webhook("https://hooks.example.com/x"))
}

#[tokio::test(start_paused = true)]
async fn test_create_runs_initial_check() -> Result<(), Box<dyn Error>> {
    let h = common::start(EngineConfig::default(), summary_analyzer()).await?;
    h.site.set_page(URL, page("Widgets", "Sale"));

    let id = h.engine.create_target(watched("alice")).await?;
    assert_eq!(h.site.fetches(), 1);

    let target = h.engine.get_target(id).await?;
    assert!(target.is_active);
    assert!(target.last_checked_at.is_some());
    assert_eq!(target.snapshot["title"], "Widgets");
    assert_eq!(target.snapshot["h1"], "Sale");

    // First check against an empty snapshot reports every selector as added.
    assert_eq!(target.change_history.len(), 2);
    assert!(target
        .change_history
        .iter()
        .all(|r| r.change_type == ChangeType::Added));
    assert!(eventually(|| async { h.notifier.count() == 1 }).await);

    h.engine.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_timer_detects_modifications() -> Result<(), Box<dyn Error>> {
    let h = common::start(EngineConfig::default(), summary_analyzer()).await?;
    h.site.set_page(URL, page("Widgets", "Sale"));
    let id = h.engine.create_target(watched("alice")).await?;
    assert!(eventually(|| async { h.notifier.count() == 1 }).await);

    // Unchanged page: a check happens but nothing is recorded.
    tokio::time::sleep(FIVE_MINUTES + MARGIN).await;
    assert_eq!(h.site.fetches(), 2);
    let target = h.engine.get_target(id).await?;
    assert_eq!(target.change_history.len(), 2);
    assert_eq!(h.notifier.count(), 1);

    h.site.set_page(URL, page("Widgets", "Clearance"));
    tokio::time::sleep(FIVE_MINUTES).await;
    assert_eq!(h.site.fetches(), 3);

    let target = h.engine.get_target(id).await?;
    assert_eq!(target.snapshot["h1"], "Clearance");
    assert_eq!(target.change_history.len(), 3);
    let last = target.change_history.last().ok_or("no history")?;
    assert_eq!(last.selector, "h1");
    assert_eq!(last.change_type, ChangeType::Modified);
    assert_eq!(last.old_content.as_deref(), Some("Sale"));
    assert_eq!(last.new_content.as_deref(), Some("Clearance"));
    assert_eq!(target.last_change_at, target.last_checked_at);

    assert!(eventually(|| async { h.notifier.count() == 2 }).await);
    let (notified, changes) = h.notifier.last().ok_or("no notification")?;
    assert_eq!(notified, id);
    assert_eq!(changes.len(), 1);
    assert_eq!(changes[0].change_type, ChangeType::Modified);

    h.engine.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_inactive_target_is_never_checked_until_activated() -> Result<(), Box<dyn Error>> {
    let h = common::start(EngineConfig::default(), summary_analyzer()).await?;
    h.site.set_page(URL, page("Widgets", "Sale"));

    let id = h.engine.create_target(watched("alice").inactive()).await?;
    tokio::time::sleep(FIVE_MINUTES * 3).await;
    assert_eq!(h.site.fetches(), 0);
    assert!(h.engine.get_target(id).await?.last_checked_at.is_none());

    let updated = h.engine.update_target(id, TargetPatch::active(true)).await?;
    assert!(updated.is_active);
    tokio::time::sleep(FIVE_MINUTES + MARGIN).await;
    assert_eq!(h.site.fetches(), 1);

    h.engine.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_deactivation_cancels_timer() -> Result<(), Box<dyn Error>> {
    let h = common::start(EngineConfig::default(), summary_analyzer()).await?;
    h.site.set_page(URL, page("Widgets", "Sale"));
    let id = h.engine.create_target(watched("alice")).await?;

    let updated = h.engine.update_target(id, TargetPatch::active(false)).await?;
    assert!(!updated.is_active);

    tokio::time::sleep(FIVE_MINUTES * 4).await;
    assert_eq!(h.site.fetches(), 1);

    // Manual checks still work on paused targets.
    let result = h.engine.check_now(id).await?;
    assert!(!result.has_changes);
    assert_eq!(h.site.fetches(), 2);

    h.engine.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_interval_change_reschedules() -> Result<(), Box<dyn Error>> {
    let h = common::start(EngineConfig::default(), summary_analyzer()).await?;
    h.site.set_page(URL, page("Widgets", "Sale"));
    let id = h
        .engine
        .create_target(watched("alice").with_interval(60))
        .await?;

    tokio::time::sleep(FIVE_MINUTES + MARGIN).await;
    assert_eq!(h.site.fetches(), 1);

    h.engine.update_target(id, TargetPatch::interval(5)).await?;
    tokio::time::sleep(FIVE_MINUTES + MARGIN).await;
    assert_eq!(h.site.fetches(), 2);
    assert_eq!(h.engine.get_target(id).await?.check_interval_minutes, 5);

    // A patch that does not touch the schedule leaves the timer alone.
    let renamed = h
        .engine
        .update_target(
            id,
            TargetPatch {
                name: Some("Renamed".into()),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(renamed.name, "Renamed");
    tokio::time::sleep(FIVE_MINUTES).await;
    assert_eq!(h.site.fetches(), 3);

    h.engine.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_delete_cancels_timer() -> Result<(), Box<dyn Error>> {
    let h = common::start(EngineConfig::default(), summary_analyzer()).await?;
    h.site.set_page(URL, page("Widgets", "Sale"));
    let mut events = h.engine.subscribe();
    let id = h.engine.create_target(watched("alice")).await?;

    h.engine.delete_target(id).await?;
    tokio::time::sleep(FIVE_MINUTES * 3).await;
    assert_eq!(h.site.fetches(), 1);

    assert!(h.engine.get_target(id).await.is_err_and(|e| e.is_not_found()));
    assert!(h.engine.delete_target(id).await.is_err_and(|e| e.is_not_found()));
    assert!(h.engine.list_targets(None).await?.is_empty());

    let mut deleted = false;
    while let Ok(event) = events.try_recv() {
        if let WatchEvent::TargetDeleted { target_id, .. } = event {
            deleted = target_id == id;
        }
    }
    assert!(deleted);

    h.engine.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_delete_during_slow_check_hides_target_at_once() -> Result<(), Box<dyn Error>> {
    let gate = Arc::new(Semaphore::new(0));
    let entered = Arc::new(AtomicUsize::new(0));
    let fetcher = {
        let (gate, entered) = (gate.clone(), entered.clone());
        move |site| GatedFetcher {
            inner: FakeFetcher(site),
            gate,
            entered,
        }
    };
    let h = common::start_with(
        EngineConfig::default(),
        fetcher,
        SelectorExtractor,
        summary_analyzer(),
    )
    .await?;
    h.site.set_page(URL, page("Widgets", "Sale"));
    let engine = Arc::new(h.engine);

    let id = engine.create_target(watched("alice").inactive()).await?;
    let check = tokio::spawn({
        let engine = engine.clone();
        async move { engine.check_now(id).await }
    });
    assert!(eventually(|| async { entered.load(Ordering::SeqCst) == 1 }).await);

    // The check is stuck in its fetch; deletion must not wait for it.
    engine.delete_target(id).await?;
    assert!(engine.get_target(id).await.is_err_and(|e| e.is_not_found()));
    assert!(engine.list_targets(None).await?.is_empty());
    assert!(engine
        .update_target(id, TargetPatch::active(true))
        .await
        .is_err_and(|e| e.is_not_found()));
    assert!(engine.check_now(id).await.is_err_and(|e| e.is_not_found()));

    // Letting the stuck check finish does not bring the target back.
    gate.add_permits(1);
    assert!(check.await?.is_err());
    assert!(engine.get_target(id).await.is_err_and(|e| e.is_not_found()));
    assert!(engine.list_targets(None).await?.is_empty());

    if let Ok(engine) = Arc::try_unwrap(engine) {
        engine.shutdown().await;
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_crash_during_initial_check_still_creates_target() -> Result<(), Box<dyn Error>> {
    let h = common::start_with(
        EngineConfig::default(),
        FakeFetcher,
        CrashOnceExtractor::default(),
        summary_analyzer(),
    )
    .await?;
    h.site.set_page(URL, page("Widgets", "Sale"));
    let mut events = h.engine.subscribe();

    let id = h.engine.create_target(watched("alice")).await?;
    let target = h.engine.get_target(id).await?;
    assert!(target.is_active);
    assert!(target.last_checked_at.is_none());
    assert_eq!(h.engine.list_targets(None).await?.len(), 1);

    let mut aborted = false;
    let mut restarted = false;
    assert!(
        eventually(|| {
            while let Ok(event) = events.try_recv() {
                match event {
                    WatchEvent::TargetCheckFailed { target_id, .. } if target_id == id => {
                        aborted = true
                    }
                    WatchEvent::TargetRestarted { target_id, .. } if target_id == id => {
                        restarted = true
                    }
                    _ => {}
                }
            }
            let done = aborted && restarted;
            async move { done }
        })
        .await
    );

    // The restarted actor picks the schedule back up.
    tokio::time::sleep(FIVE_MINUTES + MARGIN).await;
    let target = h.engine.get_target(id).await?;
    assert!(target.last_checked_at.is_some());
    assert_eq!(target.snapshot["h1"], "Sale");

    h.engine.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_failed_check_keeps_previous_state() -> Result<(), Box<dyn Error>> {
    let h = common::start(EngineConfig::default(), summary_analyzer()).await?;
    h.site.set_page(URL, page("Widgets", "Sale"));
    let id = h.engine.create_target(watched("alice")).await?;
    let before = h.engine.get_target(id).await?;
    let mut events = h.engine.subscribe();

    h.site.set_error(URL, FetchError::Blocked("HTTP 403".into()));
    let err = h.engine.check_now(id).await.err().ok_or("check should fail")?;
    assert!(matches!(
        err,
        WatchError::UpstreamFetch(FetchError::Blocked(_))
    ));

    let after = h.engine.get_target(id).await?;
    assert_eq!(after.snapshot, before.snapshot);
    assert_eq!(after.last_checked_at, before.last_checked_at);
    assert_eq!(after.change_history, before.change_history);

    let failed = std::iter::from_fn(|| events.try_recv().ok())
        .any(|e| matches!(e, WatchEvent::TargetCheckFailed { target_id, .. } if target_id == id));
    assert!(failed);

    // Scheduled failures are swallowed and the timer keeps going.
    tokio::time::sleep(FIVE_MINUTES + MARGIN).await;
    assert_eq!(h.site.fetches(), 3);
    h.site.set_page(URL, page("Widgets", "Back"));
    tokio::time::sleep(FIVE_MINUTES).await;
    assert_eq!(h.engine.get_target(id).await?.snapshot["h1"], "Back");

    h.engine.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_initial_check_failure_does_not_fail_creation() -> Result<(), Box<dyn Error>> {
    let h = common::start(EngineConfig::default(), summary_analyzer()).await?;
    h.site.set_error(URL, FetchError::Timeout { after_ms: 30_000 });

    let id = h.engine.create_target(watched("alice")).await?;
    let target = h.engine.get_target(id).await?;
    assert!(target.last_checked_at.is_none());
    assert!(target.snapshot.is_empty());

    h.engine.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_check_now_reports_changes_quietly() -> Result<(), Box<dyn Error>> {
    let h = common::start(EngineConfig::default(), summary_analyzer()).await?;
    h.site.set_page(URL, page("Widgets", "Sale"));
    let quiet = NewTarget::new(URL, "Quiet", "bob", selectors()).with_interval(5);
    let id = h.engine.create_target(quiet).await?;

    h.site.set_page(URL, page("Gadgets", "Sale"));
    let result = h.engine.check_now(id).await?;
    assert!(result.has_changes);
    assert_eq!(result.changes.len(), 1);
    assert_eq!(result.changes[0].selector, "title");
    assert_eq!(result.changes[0].old_content.as_deref(), Some("Widgets"));

    // Removing a selector reports it as removed.
    h.engine
        .update_target(id, TargetPatch::selectors(vec!["h1".into()]))
        .await?;
    let result = h.engine.check_now(id).await?;
    assert_eq!(result.changes.len(), 1);
    assert_eq!(result.changes[0].change_type, ChangeType::Removed);
    assert_eq!(result.changes[0].selector, "title");

    tokio::task::yield_now().await;
    assert_eq!(h.notifier.count(), 0);

    h.engine.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_history_is_bounded() -> Result<(), Box<dyn Error>> {
    let h = common::start(EngineConfig::default(), summary_analyzer()).await?;
    h.site.set_page(URL, page("Widgets", "v0"));
    let id = h.engine.create_target(watched("alice")).await?;

    for i in 1..=MAX_CHANGE_HISTORY + 5 {
        h.site.set_page(URL, page("Widgets", &format!("v{}", i)));
        h.engine.check_now(id).await?;
    }

    let target = h.engine.get_target(id).await?;
    assert_eq!(target.change_history.len(), MAX_CHANGE_HISTORY);
    let newest = target.change_history.last().ok_or("no history")?;
    assert_eq!(
        newest.new_content.as_deref(),
        Some(format!("v{}", MAX_CHANGE_HISTORY + 5).as_str())
    );

    h.engine.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_targets_listed_by_owner_and_unknown_ids_rejected() -> Result<(), Box<dyn Error>> {
    let h = common::start(EngineConfig::default(), summary_analyzer()).await?;
    h.site.set_page(URL, page("Widgets", "Sale"));

    let a = h.engine.create_target(watched("alice")).await?;
    let b = h.engine.create_target(watched("bob").inactive()).await?;

    let alice = h.engine.list_targets(Some("alice")).await?;
    assert_eq!(alice.len(), 1);
    assert_eq!(alice[0].id, a);
    assert_eq!(h.engine.list_targets(None).await?.len(), 2);
    assert!(h.engine.list_targets(Some("carol")).await?.is_empty());
    assert!(!h.engine.get_target(b).await?.is_active);

    let unknown = TargetId::new();
    assert!(h.engine.check_now(unknown).await.is_err_and(|e| e.is_not_found()));
    assert!(
        h.engine
            .update_target(unknown, TargetPatch::active(false))
            .await
            .is_err_and(|e| e.is_not_found())
    );

    h.engine.shutdown().await;
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn test_check_limit_still_checks_every_target() -> Result<(), Box<dyn Error>> {
    let config = EngineConfig::default().with_max_concurrent_checks(Some(1));
    let h = common::start(config, summary_analyzer()).await?;
    h.site.set_page(URL, page("Widgets", "Sale"));

    for owner in ["a", "b", "c"] {
        h.engine.create_target(watched(owner)).await?;
    }
    assert_eq!(h.site.fetches(), 3);

    tokio::time::sleep(FIVE_MINUTES + MARGIN).await;
    assert_eq!(h.site.fetches(), 6);

    h.engine.shutdown().await;
    Ok(())
}
