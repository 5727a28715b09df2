mod common;

use common::{within, CounterHost};
use orbit::{Container, ContainerHost, Reducer, Settings};
use std::sync::Arc;

/// Reductions dispatched from one thread commit in dispatch order.
#[tokio::test]
async fn test_round_robin_reductions_commit_in_dispatch_order() {
    let container: Container<Vec<u8>, ()> =
        Container::new(Vec::new(), Settings::default()).expect("runtime");

    for i in 0..1119u32 {
        let step = (i % 3) as u8 + 1;
        container
            .orbit(move |ctx| async move {
                ctx.reduce(move |list| {
                    let mut next = list.clone();
                    next.push(step);
                    next
                })
                .await?;
                anyhow::Ok(())
            })
            .expect("dispatch");
    }
    within(container.join_intents()).await;

    let list = container.state();
    assert_eq!(list.len(), 1119);
    let expected: Vec<u8> = (0..1119u32).map(|i| (i % 3) as u8 + 1).collect();
    assert_eq!(list, expected);
}

/// Concurrent dispatchers never lose or duplicate a reduction.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reductions_are_serialized() {
    let host = Arc::new(CounterHost::new(Settings::default()));

    let mut dispatchers = Vec::new();
    for _ in 0..8 {
        let host = host.clone();
        dispatchers.push(tokio::spawn(async move {
            for _ in 0..100 {
                host.increment(1);
            }
        }));
    }
    for dispatcher in dispatchers {
        dispatcher.await.expect("dispatcher");
    }
    within(host.container().join_intents()).await;

    assert_eq!(host.container().state(), 800);
}

/// A reducer always sees the state committed by the previous one.
#[tokio::test]
async fn test_reducers_see_latest_committed_state() {
    let host = CounterHost::new(Settings::default());
    let job = host
        .intent(|ctx| async move {
            ctx.reduce(|n| n + 10).await?;
            assert_eq!(ctx.state(), 10);
            ctx.reduce(|n| n * 3).await?;
            anyhow::Ok(())
        })
        .expect("dispatch");
    within(job.join()).await.expect("intent completes");
    assert_eq!(host.container().state(), 30);
}

/// An intent suspended in a transform does not hold up later intents.
#[tokio::test]
async fn test_suspended_transform_does_not_block_other_intents() {
    let host = CounterHost::new(Settings::default());
    let (release_tx, release_rx) = tokio::sync::oneshot::channel::<i64>();

    let slow = host
        .intent(|ctx| async move {
            let value = ctx
                .transform(async move { release_rx.await.unwrap_or_default() })
                .await?;
            ctx.reduce(move |n| n * value).await?;
            anyhow::Ok(())
        })
        .expect("dispatch");
    let fast = host.increment(5);

    within(fast.join()).await.expect("fast intent completes");
    assert_eq!(host.container().state(), 5);
    assert!(!slow.is_finished());

    release_tx.send(3).expect("transform waiting");
    within(slow.join()).await.expect("slow intent completes");
    assert_eq!(host.container().state(), 15);
}

/// Committing a value equal to the current one is not an emission.
#[tokio::test]
async fn test_equal_reduction_is_not_emitted() {
    let host = CounterHost::new(Settings::default());
    let mut states = host.container().state_stream();
    assert_eq!(within(states.next()).await, Some(0));

    let job = host
        .intent(|ctx| async move {
            let changed = ctx.reduce(|n| *n).await?;
            assert!(!changed);
            ctx.reduce(|n| n + 1).await?;
            anyhow::Ok(())
        })
        .expect("dispatch");
    within(job.join()).await.expect("intent completes");

    assert_eq!(within(states.next()).await, Some(1));
    assert_eq!(states.try_next(), None);
}

/// A late subscriber starts from the latest committed state.
#[tokio::test]
async fn test_state_stream_replays_latest_then_follows() {
    let host = CounterHost::new(Settings::default());
    for _ in 0..3 {
        host.increment(1);
    }
    within(host.container().join_intents()).await;

    let mut states = host.container().state_stream();
    assert_eq!(within(states.next()).await, Some(3));

    host.increment(1);
    assert_eq!(within(states.next()).await, Some(4));
}

enum CartAction {
    Add(&'static str),
    Clear,
}

struct CartReducer;

impl Reducer for CartReducer {
    type State = Vec<&'static str>;
    type Action = CartAction;

    fn reduce(state: &Vec<&'static str>, action: CartAction) -> Vec<&'static str> {
        match action {
            CartAction::Add(item) => {
                let mut next = state.clone();
                next.push(item);
                next
            }
            CartAction::Clear => Vec::new(),
        }
    }
}

/// Typed reducers commit through the same path as closures.
#[tokio::test]
async fn test_reduce_with_applies_typed_actions() {
    let container: Container<Vec<&'static str>, ()> =
        Container::new(Vec::new(), Settings::default()).expect("runtime");
    let mut states = container.state_stream();

    let job = container
        .orbit(|ctx| async move {
            assert!(ctx.reduce_with::<CartReducer>(CartAction::Add("apple")).await?);
            assert!(ctx.reduce_with::<CartReducer>(CartAction::Add("pear")).await?);
            assert!(ctx.reduce_with::<CartReducer>(CartAction::Clear).await?);
            assert!(!ctx.reduce_with::<CartReducer>(CartAction::Clear).await?);
            anyhow::Ok(())
        })
        .expect("dispatch");
    within(job.join()).await.expect("intent completes");

    let expected: Vec<Vec<&'static str>> =
        vec![vec![], vec!["apple"], vec!["apple", "pear"], vec![]];
    for state in expected {
        assert_eq!(within(states.next()).await, Some(state));
    }
    assert_eq!(container.state(), Vec::<&str>::new());
}
