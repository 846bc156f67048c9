//! Integration tests for the runtime facade.
//!
//! These cover the primitives the sync engine is built from: blocking walks,
//! a shared work queue drained by several tasks, join sets and atomic renames.

use core_async::{fs, io, sync, task, time};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

#[tokio::test]
async fn test_task_spawn() {
    let handle = task::spawn(async { 42 });
    let result = handle.await.unwrap();
    assert_eq!(result, 42);
}

#[tokio::test]
async fn test_task_spawn_blocking() {
    let handle = task::spawn_blocking(|| {
        std::thread::sleep(std::time::Duration::from_millis(10));
        100
    });
    let result = handle.await.unwrap();
    assert_eq!(result, 100);
}

#[tokio::test]
async fn test_timeout_success() {
    let result = time::timeout(time::Duration::from_millis(100), async {
        time::sleep(time::Duration::from_millis(10)).await;
        42
    })
    .await;

    assert_eq!(result.unwrap(), 42);
}

#[tokio::test]
async fn test_timeout_failure() {
    let result = time::timeout(time::Duration::from_millis(10), async {
        time::sleep(time::Duration::from_millis(200)).await;
        42
    })
    .await;

    assert!(result.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shared_unbounded_queue_drained_by_many_tasks() {
    let (tx, rx) = sync::mpsc::unbounded_channel::<usize>();
    let rx = Arc::new(sync::Mutex::new(rx));
    let seen = Arc::new(AtomicUsize::new(0));

    // The producer never waits on consumers.
    for i in 0..1_000 {
        tx.send(i).unwrap();
    }
    drop(tx);

    let mut set = task::JoinSet::new();
    for _ in 0..4 {
        let rx = Arc::clone(&rx);
        let seen = Arc::clone(&seen);
        set.spawn(async move {
            loop {
                let next = rx.lock().await.recv().await;
                match next {
                    Some(_) => {
                        seen.fetch_add(1, Ordering::SeqCst);
                    }
                    None => break,
                }
            }
        });
    }

    while let Some(joined) = set.join_next().await {
        joined.unwrap();
    }

    assert_eq!(seen.load(Ordering::SeqCst), 1_000);
}

#[tokio::test]
async fn test_join_set_collects_all_results() {
    let mut set = task::JoinSet::new();
    for i in 0..5u32 {
        set.spawn(async move { i });
    }

    let mut results = Vec::new();
    while let Some(joined) = set.join_next().await {
        results.push(joined.unwrap());
    }
    results.sort_unstable();

    assert_eq!(results, vec![0, 1, 2, 3, 4]);
}

#[tokio::test]
async fn test_copy_then_rename() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("source.bin");
    let tmp = dir.path().join("dest.bin.tmp");
    let dest = dir.path().join("dest.bin");

    fs::write(&src, b"payload").await.unwrap();

    let mut reader = fs::File::open(&src).await.unwrap();
    let mut writer = fs::File::create(&tmp).await.unwrap();
    let copied = io::copy(&mut reader, &mut writer).await.unwrap();
    drop(writer);

    fs::rename(&tmp, &dest).await.unwrap();

    assert_eq!(copied, 7);
    assert!(!fs::try_exists(&tmp).await.unwrap());
    assert_eq!(fs::read(&dest).await.unwrap(), b"payload");
}

#[tokio::test]
async fn test_create_dir_all_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let nested = dir.path().join("a").join("b").join("c");

    fs::create_dir_all(&nested).await.unwrap();
    fs::create_dir_all(&nested).await.unwrap();

    assert!(fs::metadata(&nested).await.unwrap().is_dir());
}

#[tokio::test]
async fn test_broadcast_channel() {
    let (tx, mut rx1) = sync::broadcast::channel(10);
    let mut rx2 = tx.subscribe();

    task::spawn(async move {
        for i in 0..5 {
            tx.send(i).unwrap();
        }
    });

    let mut values1 = vec![];
    let mut values2 = vec![];

    for _ in 0..5 {
        values1.push(rx1.recv().await.unwrap());
        values2.push(rx2.recv().await.unwrap());
    }

    assert_eq!(values1, vec![0, 1, 2, 3, 4]);
    assert_eq!(values2, vec![0, 1, 2, 3, 4]);
}

#[test]
fn test_block_on() {
    let value = core_async::runtime::block_on(async { 5 + 5 });
    assert_eq!(value, 10);
}
