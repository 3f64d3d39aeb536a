//! Auto-gen scheduler driven by its real tick, with a manual clock for wall time.

use crate::integration::test_utils::{data, wait_for, Site};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tinypage::clock::ManualClock;
use tinypage::error::PageError;
use tinypage::{GenerationRequest, Page};

#[tokio::test]
async fn test_task_fires_once_per_interval() {
    let site = Site::new(&[]);
    let clock = Arc::new(ManualClock::new(1_000));
    let page = Page::with_clock(site.config(), clock.clone()).unwrap();

    let count = Arc::new(AtomicUsize::new(0));
    let hits = Arc::clone(&count);
    page.register_auto_task("digest", 10, move || {
        hits.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    // Several ticks pass, but the clock has not moved.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(count.load(Ordering::SeqCst), 0);

    clock.advance(10);
    assert!(wait_for(Duration::from_secs(2), || count.load(Ordering::SeqCst) == 1).await);
    assert_eq!(page.scheduler().last_fired("digest"), Some(1_010));

    // Same wall time across many more ticks: no second fire.
    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(count.load(Ordering::SeqCst), 1);

    clock.advance(10);
    assert!(wait_for(Duration::from_secs(2), || count.load(Ordering::SeqCst) == 2).await);

    page.shutdown().await;
}

#[tokio::test]
async fn test_auto_task_enqueues_generation() {
    let site = Site::new(&[("digest.tpl", "{{ count }} posts")]);
    let clock = Arc::new(ManualClock::new(50));
    let page = Page::with_clock(site.config(), clock.clone()).unwrap();

    let submitter = page.submitter();
    page.register_auto_task("digest", 30, move || {
        let request = GenerationRequest::new("digest.tpl", "", "digest", data(json!({"count": 3})));
        // Callbacks run on the blocking pool, so the blocking path is allowed here.
        let _ = submitter.blocking_submit(request);
    })
    .unwrap();

    clock.advance(30);
    let output = page.output_path("", "digest");
    assert!(wait_for(Duration::from_secs(2), || output.is_file()).await);

    page.shutdown().await;
    assert_eq!(site.read("digest.html"), "3 posts");
}

#[tokio::test]
async fn test_faulting_task_keeps_its_schedule() {
    let site = Site::new(&[]);
    let clock = Arc::new(ManualClock::new(0));
    let page = Page::with_clock(site.config(), clock.clone()).unwrap();

    let calls = Arc::new(AtomicUsize::new(0));
    let attempts = Arc::clone(&calls);
    page.register_auto_task("flaky", 5, move || {
        attempts.fetch_add(1, Ordering::SeqCst);
        panic!("feed unavailable");
    })
    .unwrap();

    let healthy = Arc::new(AtomicUsize::new(0));
    let hits = Arc::clone(&healthy);
    page.register_auto_task("sitemap", 5, move || {
        hits.fetch_add(1, Ordering::SeqCst);
    })
    .unwrap();

    clock.set(5);
    assert!(wait_for(Duration::from_secs(2), || healthy.load(Ordering::SeqCst) == 1).await);
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(page.scheduler().last_fired("flaky"), Some(5));

    tokio::time::sleep(Duration::from_millis(100)).await;
    assert_eq!(calls.load(Ordering::SeqCst), 1);

    page.shutdown().await;
}

#[tokio::test]
async fn test_interval_floor_and_update() {
    let site = Site::new(&[]);
    let mut config = site.config();
    config.scheduler.min_interval_secs = 60;
    let page = Page::with_clock(config, Arc::new(ManualClock::new(0))).unwrap();

    page.register_auto_task("fast", 1, || {}).unwrap();
    assert_eq!(page.scheduler().interval("fast"), Some(60));

    page.update_auto_task("fast", 120, || {}).unwrap();
    assert_eq!(page.scheduler().interval("fast"), Some(120));

    assert!(matches!(
        page.update_auto_task("unknown", 120, || {}),
        Err(PageError::TaskNotFound(tag)) if tag == "unknown"
    ));
    assert!(matches!(
        page.register_auto_task("fast", 300, || {}),
        Err(PageError::DuplicateTask(_))
    ));

    page.shutdown().await;
}
