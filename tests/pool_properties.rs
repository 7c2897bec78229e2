use esox_resourcepool::{BoxError, PoolConfiguration, PoolError, PooledResource, ResourcePool};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;
use std::time::Duration;

/// Create/destroy callbacks that hand out sequential ids and record every destroy
#[derive(Clone, Default)]
struct Tracker {
    created: Arc<AtomicUsize>,
    destroyed: Arc<Mutex<Vec<usize>>>,
}

impl Tracker {
    fn pool(&self, config: PoolConfiguration) -> Result<ResourcePool<usize>, PoolError> {
        let created = Arc::clone(&self.created);
        let destroyed = Arc::clone(&self.destroyed);
        ResourcePool::new(
            config,
            move || Ok(created.fetch_add(1, Ordering::SeqCst)),
            move |id| {
                destroyed.lock().unwrap().push(id);
                Ok(())
            },
        )
    }

    fn created(&self) -> usize {
        self.created.load(Ordering::SeqCst)
    }

    fn destroyed(&self) -> Vec<usize> {
        self.destroyed.lock().unwrap().clone()
    }
}

#[test]
fn construction_prefills_min_capacity() {
    let tracker = Tracker::default();
    let pool = tracker
        .pool(PoolConfiguration::new().with_min_capacity(3).with_max_capacity(5))
        .unwrap();

    assert_eq!(pool.idle_count(), 3);
    assert_eq!(tracker.created(), 3);
}

#[test]
fn inverted_bounds_fail_without_creating() {
    let tracker = Tracker::default();
    let result = tracker.pool(PoolConfiguration::new().with_min_capacity(5).with_max_capacity(3));

    assert!(matches!(result, Err(PoolError::InvalidConfiguration(_))));
    assert_eq!(tracker.created(), 0);
}

#[test]
fn failed_prefill_destroys_partial_resources() {
    let destroyed = Arc::new(AtomicUsize::new(0));
    let attempts = Arc::new(AtomicUsize::new(0));
    let gone = Arc::clone(&destroyed);
    let tries = Arc::clone(&attempts);

    let result: Result<ResourcePool<usize>, _> = ResourcePool::new(
        PoolConfiguration::new().with_min_capacity(4).with_max_capacity(4),
        move || {
            let n = tries.fetch_add(1, Ordering::SeqCst);
            if n == 2 {
                Err(BoxError::from("dial tcp 127.0.0.1:8888: connection refused"))
            } else {
                Ok(n)
            }
        },
        move |_| {
            gone.fetch_add(1, Ordering::SeqCst);
            Ok(())
        },
    );

    match result {
        Err(PoolError::PoolInitializationFailed(cause)) => {
            assert!(cause.to_string().contains("connection refused"));
        }
        other => panic!("expected initialization failure, got {other:?}"),
    }
    assert_eq!(destroyed.load(Ordering::SeqCst), 2);
}

#[test]
fn acquire_release_round_trip_keeps_idle_count() {
    let tracker = Tracker::default();
    let pool = tracker
        .pool(PoolConfiguration::new().with_min_capacity(2).with_max_capacity(4))
        .unwrap();

    let before = pool.idle_count();
    let resource = pool.acquire().unwrap();
    pool.release(resource).unwrap();

    assert_eq!(pool.idle_count(), before);
    assert_eq!(pool.live_count(), before);
    assert_eq!(tracker.created(), 2);
    assert!(tracker.destroyed().is_empty());
}

#[test]
fn stale_idle_resource_is_replaced() {
    let tracker = Tracker::default();
    let pool = tracker
        .pool(
            PoolConfiguration::new()
                .with_max_capacity(2)
                .with_idle_timeout(Duration::from_millis(10)),
        )
        .unwrap();

    let first = pool.acquire().unwrap();
    let first_id = *first;
    first.release().unwrap();

    thread::sleep(Duration::from_millis(50));
    let second = pool.acquire().unwrap();

    assert_ne!(*second, first_id);
    assert_eq!(tracker.destroyed(), vec![first_id]);
    assert_eq!(pool.get_metrics().stale_evictions, 1);
    assert_eq!(pool.live_count(), 1);
}

#[test]
fn release_never_grows_idle_beyond_capacity() {
    let tracker = Tracker::default();
    let pool = tracker
        .pool(PoolConfiguration::new().with_min_capacity(2).with_max_capacity(2))
        .unwrap();

    let a = pool.acquire().unwrap();
    let b = pool.acquire().unwrap();
    assert_eq!(pool.warmup(3).unwrap(), 0);
    a.release().unwrap();
    b.release().unwrap();

    assert_eq!(pool.idle_count(), 2);
    assert_eq!(pool.live_count(), 2);
    assert!(tracker.destroyed().is_empty());
}

#[test]
fn release_into_drained_pool_destroys_surplus() {
    let tracker = Tracker::default();
    let pool = tracker
        .pool(PoolConfiguration::new().with_min_capacity(1).with_max_capacity(2))
        .unwrap();

    let lent = pool.acquire().unwrap();
    let lent_id = *lent;
    pool.drain_all().unwrap();
    pool.release(lent).unwrap();

    assert_eq!(pool.idle_count(), 0);
    assert_eq!(tracker.destroyed(), vec![lent_id]);
    assert_eq!(pool.get_metrics().surplus_destroyed, 1);
    assert_eq!(pool.live_count(), 0);
}

#[test]
fn drain_destroys_every_idle_resource_once() {
    let tracker = Tracker::default();
    let pool = tracker
        .pool(PoolConfiguration::new().with_min_capacity(3).with_max_capacity(3))
        .unwrap();

    pool.drain_all().unwrap();
    pool.drain_all().unwrap();

    let mut destroyed = tracker.destroyed();
    destroyed.sort_unstable();
    assert_eq!(destroyed, vec![0, 1, 2]);
    assert_eq!(pool.idle_count(), 0);
    assert!(pool.is_closed());
    assert!(matches!(pool.acquire(), Err(PoolError::PoolClosed)));
    assert!(matches!(pool.try_acquire(), Err(PoolError::PoolClosed)));
    assert!(matches!(pool.warmup(1), Err(PoolError::PoolClosed)));
}

#[test]
fn drain_wakes_blocked_acquirers() {
    let tracker = Tracker::default();
    let pool = tracker
        .pool(
            PoolConfiguration::new()
                .with_max_capacity(1)
                .with_backoff_interval(Duration::from_secs(10)),
        )
        .unwrap();

    let held = pool.acquire().unwrap();
    let waiter = {
        let pool = pool.clone();
        thread::spawn(move || pool.acquire().map(|r| *r))
    };

    thread::sleep(Duration::from_millis(20));
    pool.drain_all().unwrap();

    assert!(matches!(waiter.join().unwrap(), Err(PoolError::PoolClosed)));
    held.close().unwrap();
    assert_eq!(pool.live_count(), 0);
}

#[test]
fn concurrent_acquirers_never_exceed_capacity() {
    const CAPACITY: usize = 4;

    let tracker = Tracker::default();
    let pool = tracker
        .pool(
            PoolConfiguration::new()
                .with_max_capacity(CAPACITY)
                .with_backoff_interval(Duration::from_millis(5)),
        )
        .unwrap();

    let barrier = Arc::new(Barrier::new(CAPACITY * 2));
    let handles: Vec<_> = (0..CAPACITY * 2)
        .map(|_| {
            let pool = pool.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                barrier.wait();
                pool.try_acquire()
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let held: Vec<PooledResource<usize>> = results.into_iter().filter_map(Result::ok).collect();

    assert_eq!(held.len(), CAPACITY);
    let distinct: HashSet<usize> = held.iter().map(|r| **r).collect();
    assert_eq!(distinct.len(), CAPACITY);
    assert_eq!(tracker.created(), CAPACITY);
    assert_eq!(pool.outstanding_count(), CAPACITY);
}

#[test]
fn contended_acquire_hands_out_each_resource_to_one_holder() {
    const CAPACITY: usize = 3;
    const WORKERS: usize = 12;

    let tracker = Tracker::default();
    let pool = tracker
        .pool(
            PoolConfiguration::new()
                .with_max_capacity(CAPACITY)
                .with_backoff_interval(Duration::from_millis(2)),
        )
        .unwrap();

    let in_use = Arc::new(Mutex::new(HashSet::new()));
    let peak = Arc::new(AtomicUsize::new(0));

    let handles: Vec<_> = (0..WORKERS)
        .map(|_| {
            let pool = pool.clone();
            let in_use = Arc::clone(&in_use);
            let peak = Arc::clone(&peak);
            thread::spawn(move || {
                for _ in 0..20 {
                    let resource = pool.acquire().unwrap();
                    {
                        let mut set = in_use.lock().unwrap();
                        assert!(set.insert(*resource), "resource lent twice");
                        peak.fetch_max(set.len(), Ordering::SeqCst);
                    }
                    thread::sleep(Duration::from_micros(200));
                    in_use.lock().unwrap().remove(&*resource);
                    resource.release().unwrap();
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    assert!(peak.load(Ordering::SeqCst) <= CAPACITY);
    assert!(tracker.created() <= CAPACITY);
    assert!(pool.idle_count() <= CAPACITY);
    assert_eq!(pool.outstanding_count(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn async_waiter_gets_released_resource() {
    let tracker = Tracker::default();
    let pool = tracker
        .pool(
            PoolConfiguration::new()
                .with_max_capacity(1)
                .with_backoff_interval(Duration::from_millis(5)),
        )
        .unwrap();

    let held = pool.acquire_async().await.unwrap();
    let held_id = *held;

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire_async().await.map(|r| *r) })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    drop(held);

    assert_eq!(waiter.await.unwrap().unwrap(), held_id);
    assert_eq!(tracker.created(), 1);
}
