//! End-to-end tests for the generation worker: render, write, read back, notify.

use crate::integration::test_utils::{data, Site};
use parking_lot::Mutex;
use serde_json::json;
use std::sync::Arc;
use tinypage::error::PageError;
use tinypage::render::FuncArg;
use tinypage::Page;

fn recorder(page: &Page) -> Arc<Mutex<Vec<(String, String)>>> {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    page.set_completion_callback(move |name, bytes| {
        sink.lock()
            .push((name.to_string(), String::from_utf8_lossy(bytes).into_owned()));
        true
    })
    .unwrap();
    seen
}

#[tokio::test]
async fn test_pages_are_generated_in_submission_order() {
    let site = Site::new(&[
        ("a.tpl", "A: {{ title }}"),
        ("b.tpl", "B: {{ title }}"),
    ]);
    let page = Page::new(site.config()).unwrap();
    let seen = recorder(&page);

    page.submit_generation("a.tpl", "", "a", data(json!({"title": "first"})))
        .await
        .unwrap();
    page.submit_generation("b.tpl", "sub", "b", data(json!({"title": "second"})))
        .await
        .unwrap();
    page.shutdown().await;

    assert_eq!(site.read("a.html"), "A: first");
    assert_eq!(site.read("sub/b.html"), "B: second");
    assert_eq!(
        *seen.lock(),
        vec![
            ("a".to_string(), "A: first".to_string()),
            ("b".to_string(), "B: second".to_string()),
        ]
    );

    let stats = page.stats();
    assert_eq!(stats.submitted, 2);
    assert_eq!(stats.completed, 2);
    assert_eq!(stats.pending(), 0);
}

#[tokio::test]
async fn test_broken_template_does_not_stop_the_worker() {
    let site = Site::new(&[
        ("broken.tpl", "{% if %}"),
        ("ok.tpl", "ok {{ n }}"),
    ]);
    let page = Page::new(site.config()).unwrap();
    let seen = recorder(&page);

    page.submit_generation("broken.tpl", "", "broken", data(json!({"n": 1})))
        .await
        .unwrap();
    page.submit_generation("missing.tpl", "", "missing", data(json!({"n": 2})))
        .await
        .unwrap();
    page.submit_generation("ok.tpl", "", "ok", data(json!({"n": 3})))
        .await
        .unwrap();
    page.shutdown().await;

    assert!(!site.exists("broken.html"));
    assert!(!site.exists("missing.html"));
    assert_eq!(site.read("ok.html"), "ok 3");
    assert_eq!(seen.lock().len(), 1);

    let stats = page.stats();
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.completed, 1);
}

#[tokio::test]
async fn test_output_is_escaped_unless_marked_safe() {
    let site = Site::new(&[(
        "post.tpl",
        "{{ body }}|{{ body | html }}|{{ published | date }}|{{ dayTime(value=published) }}",
    )]);
    let page = Page::new(site.config()).unwrap();

    let payload = data(json!({"body": "<b>hi</b>", "published": 1_601_906_580}));
    page.submit_generation("post.tpl", "news", "post", payload)
        .await
        .unwrap();
    page.shutdown().await;

    assert_eq!(
        site.read("news/post.html"),
        "&lt;b&gt;hi&lt;&#x2F;b&gt;|<b>hi</b>|2020-10-05|October 05, 2020"
    );
}

#[tokio::test]
async fn test_shared_templates_and_custom_functions() {
    let site = Site::new(&[
        ("layout.tpl", "<main>{% block content %}{% endblock %}</main>"),
        (
            "post.tpl",
            r#"{% extends "layout.tpl" %}{% block content %}{{ title | shout }}{% endblock %}"#,
        ),
    ]);
    let mut config = site.config();
    config.render.shared_templates = vec!["layout.tpl".to_string()];
    let page = Page::new(config).unwrap();

    page.add_ext_func("shout", |arg: FuncArg| -> Result<String, String> {
        Ok(arg.into_text().to_uppercase())
    })
    .unwrap();
    assert!(matches!(
        page.add_ext_func("date", |arg: FuncArg| -> Result<String, String> {
            Ok(arg.into_text())
        }),
        Err(PageError::DuplicateFunction(_))
    ));

    page.submit_generation("post.tpl", "", "post", data(json!({"title": "hello"})))
        .await
        .unwrap();
    page.shutdown().await;

    assert_eq!(site.read("post.html"), "<main>HELLO</main>");
}

#[tokio::test]
async fn test_invalid_requests_are_rejected_before_queueing() {
    let site = Site::new(&[("a.tpl", "a")]);
    let page = Page::new(site.config()).unwrap();

    let result = page
        .submit_generation("a.tpl", "../escape", "a", data(json!({"x": 1})))
        .await;
    assert!(matches!(result, Err(PageError::Validation(_))));

    let result = page.try_submit_generation("a.tpl", "", "a", serde_json::Map::new());
    assert!(matches!(result, Err(PageError::Validation(_))));

    page.shutdown().await;
    assert_eq!(page.stats().submitted, 0);
}

#[tokio::test]
async fn test_shutdown_rejects_new_work() {
    let site = Site::new(&[("a.tpl", "a")]);
    let page = Page::new(site.config()).unwrap();
    page.shutdown().await;

    let result = page
        .submit_generation("a.tpl", "", "a", data(json!({"x": 1})))
        .await;
    assert!(matches!(result, Err(PageError::ShutDown)));
    assert!(matches!(
        page.register_auto_task("digest", 10, || {}),
        Err(PageError::ShutDown)
    ));

    // A second shutdown is a no-op.
    page.shutdown().await;
    assert!(!site.exists("a.html"));
}

#[tokio::test]
async fn test_completion_callback_can_only_be_set_once() {
    let site = Site::new(&[("a.tpl", "a")]);
    let page = Page::new(site.config()).unwrap();

    page.set_completion_callback(|_, _| true).unwrap();
    assert!(matches!(
        page.set_completion_callback(|_, _| false),
        Err(PageError::CallbackAlreadySet)
    ));
    page.shutdown().await;
}

#[tokio::test]
async fn test_output_path_matches_written_file() {
    let site = Site::new(&[("a.tpl", "a")]);
    let page = Page::new(site.config()).unwrap();
    let expected = page.output_path("deep/er", "leaf");

    page.submit_generation("a.tpl", "deep/er", "leaf", data(json!({"x": 1})))
        .await
        .unwrap();
    page.shutdown().await;

    assert_eq!(expected, site.output.path().join("deep/er/leaf.html"));
    assert!(crate::integration::test_utils::file_exists(&expected));
}
