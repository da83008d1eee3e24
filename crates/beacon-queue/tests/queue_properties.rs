#![allow(clippy::unwrap_used, clippy::expect_used)]

use beacon_core::{AgentId, BeaconError};
use beacon_queue::DispatchQueue;
use futures_util::future::join_all;
use std::collections::HashSet;
use std::sync::Arc;

/// Helper: a queue with `n` registered agents.
async fn queue_with_agents(n: usize) -> (Arc<DispatchQueue>, Vec<AgentId>) {
    let queue = Arc::new(DispatchQueue::new());
    let mut ids = Vec::with_capacity(n);
    for _ in 0..n {
        let id = AgentId::new();
        queue.register(id);
        ids.push(id);
    }
    (queue, ids)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_enqueue_same_agent() {
    let (queue, ids) = queue_with_agents(1).await;
    let id = ids[0];

    let tasks = (0..100).map(|i| {
        let queue = queue.clone();
        tokio::spawn(async move { queue.enqueue(id, "test", vec![i.to_string()]).await })
    });
    let minted: Vec<_> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap().unwrap())
        .collect();

    assert_eq!(queue.pending(id).await.unwrap(), 100);

    let mut seen_ids = HashSet::new();
    let mut seen_args = HashSet::new();
    while let Some(cmd) = queue.dequeue(id).await.unwrap() {
        assert!(seen_ids.insert(cmd.id), "command delivered twice");
        seen_args.insert(cmd.args[0].clone());
    }
    assert_eq!(seen_ids.len(), 100);
    assert_eq!(seen_args.len(), 100);
    assert_eq!(seen_ids, minted.into_iter().collect::<HashSet<_>>());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_enqueue_and_dequeue() {
    let (queue, ids) = queue_with_agents(1).await;
    let id = ids[0];

    let tasks = (0..100).map(|i| {
        let queue = queue.clone();
        tokio::spawn(async move {
            queue.enqueue(id, "test", vec![]).await.unwrap();
            // Consume half the time; something is always pending because
            // this task just queued one.
            if i % 2 == 0 {
                let cmd = queue.dequeue(id).await.unwrap();
                assert_eq!(cmd.unwrap().command, "test");
            }
        })
    });
    for joined in join_all(tasks).await {
        joined.unwrap();
    }

    assert_eq!(queue.pending(id).await.unwrap(), 50);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_agents_are_isolated() {
    let (queue, ids) = queue_with_agents(2).await;
    let (a, b) = (ids[0], ids[1]);

    let qa = queue.clone();
    let task_a = tokio::spawn(async move {
        for i in 0..50 {
            qa.enqueue(a, format!("a-{i}"), vec![]).await.unwrap();
            if i % 3 == 0 {
                qa.retract_last(a).await.unwrap();
            }
        }
    });
    let qb = queue.clone();
    let task_b = tokio::spawn(async move {
        for i in 0..50 {
            qb.enqueue(b, format!("b-{i}"), vec![]).await.unwrap();
        }
    });
    task_a.await.unwrap();
    task_b.await.unwrap();

    let mut from_a = Vec::new();
    while let Some(cmd) = queue.dequeue(a).await.unwrap() {
        assert!(cmd.command.starts_with("a-"));
        from_a.push(cmd.command);
    }
    let mut from_b = Vec::new();
    while let Some(cmd) = queue.dequeue(b).await.unwrap() {
        assert!(cmd.command.starts_with("b-"));
        from_b.push(cmd.command);
    }

    // Every third command to A was retracted right after being queued
    let expected_a: Vec<String> = (0..50)
        .filter(|i| i % 3 != 0)
        .map(|i| format!("a-{i}"))
        .collect();
    let expected_b: Vec<String> = (0..50).map(|i| format!("b-{i}")).collect();
    assert_eq!(from_a, expected_a);
    assert_eq!(from_b, expected_b);
}

#[tokio::test]
async fn test_enqueue_all_reaches_every_agent() {
    let (queue, ids) = queue_with_agents(3).await;

    let report = queue.enqueue_all("uptime", vec!["-p".into()]).await;
    assert!(report.is_complete());
    assert_eq!(report.delivered.len(), 3);

    let command_ids: HashSet<_> = report.delivered.iter().map(|d| d.command_id).collect();
    assert_eq!(command_ids.len(), 3, "each agent gets its own command id");

    for id in ids {
        let cmd = queue.dequeue(id).await.unwrap().unwrap();
        assert_eq!(cmd.command, "uptime");
        assert_eq!(cmd.args, vec!["-p".to_string()]);
        let delivery = report.delivered.iter().find(|d| d.agent_id == id).unwrap();
        assert_eq!(delivery.command_id, cmd.id);
    }
}

#[tokio::test]
async fn test_enqueue_all_with_no_agents() {
    let queue = DispatchQueue::new();
    let report = queue.enqueue_all("uptime", vec![]).await;
    assert_eq!(report.total(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_enqueue_all_concurrent_with_dequeue() {
    let (queue, ids) = queue_with_agents(2).await;
    let id = ids[0];

    let tasks = (0..100).map(|i| {
        let queue = queue.clone();
        tokio::spawn(async move {
            let report = queue.enqueue_all("test", vec![]).await;
            assert!(report.is_complete());
            if i % 2 == 0 {
                let cmd = queue.dequeue(id).await.unwrap();
                assert_eq!(cmd.unwrap().command, "test");
            }
        })
    });
    for joined in join_all(tasks).await {
        joined.unwrap();
    }

    assert_eq!(queue.pending(ids[0]).await.unwrap(), 50);
    assert_eq!(queue.pending(ids[1]).await.unwrap(), 100);
}

#[tokio::test]
async fn test_retract_last_all_skips_empty_queues() {
    let (queue, ids) = queue_with_agents(3).await;
    let (full, single, empty) = (ids[0], ids[1], ids[2]);

    let first = queue.enqueue(full, "test1", vec![]).await.unwrap();
    let second = queue.enqueue(full, "test2", vec![]).await.unwrap();
    let only = queue.enqueue(single, "test1", vec![]).await.unwrap();

    let report = queue.retract_last_all().await;
    assert!(report.is_complete());
    assert_eq!(report.skipped, vec![empty]);
    assert_eq!(report.delivered.len(), 2);
    let retracted: HashSet<_> = report.delivered.iter().map(|d| d.command_id).collect();
    assert_eq!(retracted, HashSet::from([second, only]));

    assert_eq!(queue.dequeue(full).await.unwrap().unwrap().id, first);
    assert!(queue.dequeue(full).await.unwrap().is_none());
    assert!(queue.dequeue(single).await.unwrap().is_none());

    // Running it again over all-empty queues is still fine
    let report = queue.retract_last_all().await;
    assert!(report.delivered.is_empty());
    assert_eq!(report.skipped.len(), 3);

    // The single-agent form keeps treating empty as an error
    assert!(matches!(
        queue.retract_last(empty).await,
        Err(BeaconError::EmptyQueue(_))
    ));
}

#[tokio::test]
async fn test_broadcast_ignores_evicted_agents() {
    let (queue, ids) = queue_with_agents(2).await;
    assert!(queue.evict(ids[0]));

    let report = queue.enqueue_all("test", vec![]).await;
    assert_eq!(report.delivered.len(), 1);
    assert_eq!(report.delivered[0].agent_id, ids[1]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_registration() {
    let queue = Arc::new(DispatchQueue::new());
    let tasks = (0..64).map(|_| {
        let queue = queue.clone();
        tokio::spawn(async move {
            let id = AgentId::new();
            queue.register(id);
            queue.enqueue(id, "hostname", vec![]).await.unwrap();
            id
        })
    });
    let ids: Vec<AgentId> = join_all(tasks)
        .await
        .into_iter()
        .map(|joined| joined.unwrap())
        .collect();

    assert_eq!(queue.len(), 64);
    for id in ids {
        assert_eq!(queue.pending(id).await.unwrap(), 1);
    }
}
