mod common;

use common::{CounterHost, Toast};
use orbit::testing::{Item, TestContainerHost, TestError, TestOptions};
use orbit::{ContainerHost, Settings};
use std::time::Duration;

/// Items are captured in emission order, states and side effects interleaved.
#[tokio::test]
async fn test_session_captures_ordered_items() {
    let host = CounterHost::new(Settings::default());
    let mut session = host.test(TestOptions::new()).expect("test mode");

    host.intent(|ctx| async move {
        ctx.reduce(|n| n + 1).await?;
        ctx.post_side_effect(Toast::Number(1)).await?;
        ctx.reduce(|n| n + 1).await?;
        anyhow::Ok(())
    })
    .expect("dispatch");

    session.expect_initial_state().await.expect("initial");
    session.expect_state(|n| n + 1).await.expect("first reduce");
    session
        .expect_side_effect(Toast::Number(1))
        .await
        .expect("side effect");
    session.expect_state_eq(2).await.expect("second reduce");
    session.finish().await.expect("nothing left");
}

/// Asking for a state when a side effect comes next names both kinds.
#[tokio::test]
async fn test_wrong_item_kind_is_reported() {
    let host = CounterHost::new(Settings::default());
    let mut session = host.test(TestOptions::new()).expect("test mode");
    host.toast("hello");

    session.expect_initial_state().await.expect("initial");
    let err = session.expect_state_eq(1).await.expect_err("got a side effect");
    assert!(matches!(err, TestError::UnexpectedItem { .. }));
    assert_eq!(
        err.to_string(),
        "Expected State but got SideEffect(Show(\"hello\"))"
    );
    session.cancel_and_ignore_remaining_items();
}

/// A different value is a mismatch with both sides printed.
#[tokio::test]
async fn test_state_mismatch_is_reported() {
    let host = CounterHost::new(Settings::default());
    let mut session = host.test(TestOptions::new()).expect("test mode");
    host.increment(3);

    session.expect_initial_state().await.expect("initial");
    let err = session.expect_state_eq(4).await.expect_err("mismatch");
    assert_eq!(err.to_string(), "Expected State(4) but got State(3)");
    session.cancel_and_ignore_remaining_items();
}

/// finish fails when items were left unconsumed.
#[tokio::test]
async fn test_finish_reports_unconsumed_items() {
    let host = CounterHost::new(Settings::default());
    let mut session = host.test(TestOptions::new()).expect("test mode");
    host.increment(1);
    host.toast("bye");

    session.expect_initial_state().await.expect("initial");
    match session.finish().await {
        Err(TestError::UnconsumedItems(items)) => {
            assert_eq!(items, vec!["State(1)", "SideEffect(Show(\"bye\"))"]);
        }
        other => panic!("Expected UnconsumedItems, got {other:?}"),
    }
}

/// finish fails when an intent failed without an exception handler.
#[tokio::test]
async fn test_finish_reports_unhandled_failures() {
    let host = CounterHost::new(Settings::default());
    let mut session = host.test(TestOptions::new()).expect("test mode");
    host.intent(|_ctx| async move { Err(anyhow::anyhow!("lost connection")) })
        .expect("dispatch");

    session.expect_initial_state().await.expect("initial");
    match session.finish().await {
        Err(TestError::UnhandledFailures(failures)) => {
            assert_eq!(failures.len(), 1);
            assert!(failures[0].to_string().contains("lost connection"));
        }
        other => panic!("Expected UnhandledFailures, got {other:?}"),
    }
}

/// A custom initial state replaces the container's.
#[tokio::test]
async fn test_initial_state_override() {
    let host = CounterHost::new(Settings::default());
    let mut session = host
        .test(TestOptions::new().initial_state(40))
        .expect("test mode");
    host.increment(2);

    session.expect_initial_state().await.expect("initial");
    session.expect_state_eq(42).await.expect("reduced from override");
    session.finish().await.expect("clean");
}

/// skip_items and await_item step over whatever comes next.
#[tokio::test]
async fn test_skip_and_await_items() {
    let host = CounterHost::new(Settings::default());
    let mut session = host.test(TestOptions::new()).expect("test mode");
    host.increment(1);
    host.increment(1);
    host.toast("done");

    session.skip_items(3).await.expect("initial plus two states");
    let item = session.await_item().await.expect("side effect");
    assert_eq!(item, Item::SideEffect(Toast::Show("done".into())));
    session.expect_no_items().await.expect("drained");
    session.finish().await.expect("clean");
}

/// Waiting for an item that never comes times out on the wall clock.
#[tokio::test(start_paused = true)]
async fn test_wait_times_out_with_paused_clock() {
    let host = CounterHost::new(Settings::default());
    let mut session = host
        .test(TestOptions::new().timeout(Duration::from_millis(50)))
        .expect("test mode");

    session.expect_initial_state().await.expect("initial");
    let err = session.await_item().await.expect_err("nothing emitted");
    assert!(matches!(err, TestError::Timeout { .. }));
    session.finish().await.expect("clean");
}

/// Delays inside intents are skipped by the paused clock.
#[tokio::test(start_paused = true)]
async fn test_virtual_time_inside_intents() {
    let host = CounterHost::new(Settings::default());
    let mut session = host.test(TestOptions::new()).expect("test mode");
    host.intent(|ctx| async move {
        tokio::time::sleep(Duration::from_secs(60)).await;
        ctx.reduce(|n| n + 1).await?;
        anyhow::Ok(())
    })
    .expect("dispatch");

    session.expect_initial_state().await.expect("initial");
    session.expect_state_eq(1).await.expect("after virtual delay");
    session.finish().await.expect("clean");
}

/// An open session counts as a subscriber, so repeated blocks run under test.
#[tokio::test]
async fn test_session_drives_repeat_on_subscription() {
    let host = CounterHost::new(Settings::default());
    let mut session = host.test(TestOptions::new()).expect("test mode");
    assert_eq!(host.container().subscriber_count(), 1);

    let job = host
        .intent(|ctx| async move {
            let inner = ctx.clone();
            ctx.repeat_on_subscription(move || {
                let ctx = inner.clone();
                async move {
                    let _ = ctx.reduce(|n| n + 1).await;
                    std::future::pending::<()>().await;
                }
            })
            .await?;
            anyhow::Ok(())
        })
        .expect("dispatch");

    session.expect_initial_state().await.expect("initial");
    session.expect_state_eq(1).await.expect("block ran");
    session.cancel_and_ignore_remaining_items();

    assert_eq!(host.container().subscriber_count(), 0);
    let outcome = common::within(job.join()).await;
    assert!(outcome.expect_err("cancelled with the session").is_cancelled());
}
