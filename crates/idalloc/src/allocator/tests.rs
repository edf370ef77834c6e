use crate::{
    AllocationAuthority, CancellationToken, Error, LocalAllocator, MemoryAuthority, NoAuthority,
    RemoteAllocator,
    mock::{HangingAuthority, ScriptedAuthority},
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread::scope;

fn run_local_sequence_from(allocator: &LocalAllocator, start: i64, count: i64) {
    for expected in start..start + count {
        assert_eq!(allocator.allocate().get(), expected);
    }
    assert_eq!(allocator.peek(), start + count);
}

#[test]
fn local_allocator_starts_at_one() {
    let allocator = LocalAllocator::new();
    assert_eq!(allocator.peek(), 1);
    run_local_sequence_from(&allocator, 1, 3);
}

#[test]
fn local_allocator_reset_rewinds_to_one() {
    let allocator = LocalAllocator::default();
    run_local_sequence_from(&allocator, 1, 10);

    allocator.reset();
    run_local_sequence_from(&allocator, 1, 5);
}

#[test]
fn local_allocator_peek_does_not_consume() {
    let allocator = LocalAllocator::new();
    assert_eq!(allocator.peek(), 1);
    assert_eq!(allocator.peek(), 1);
    assert_eq!(allocator.allocate().get(), 1);
    assert_eq!(allocator.peek(), 2);
}

#[test]
fn local_allocator_concurrent_ids_have_no_gaps_or_duplicates() {
    let threads = num_cpus::get().max(2) * 2;
    const IDS_PER_THREAD: usize = 2048;
    let total = threads * IDS_PER_THREAD;

    let allocator = Arc::new(LocalAllocator::new());
    let seen_ids = Arc::new(Mutex::new(HashSet::with_capacity(total)));

    scope(|s| {
        for _ in 0..threads {
            let allocator = Arc::clone(&allocator);
            let seen_ids = Arc::clone(&seen_ids);

            s.spawn(move || {
                let mut local = Vec::with_capacity(IDS_PER_THREAD);
                for _ in 0..IDS_PER_THREAD {
                    local.push(allocator.allocate().get());
                }
                let mut set = seen_ids.lock().unwrap();
                for id in local {
                    assert!(set.insert(id), "duplicate id {id}");
                }
            });
        }
    });

    let seen_ids = seen_ids.lock().unwrap();
    let expected: HashSet<i64> = (1..=total as i64).collect();
    assert_eq!(*seen_ids, expected);
    assert_eq!(allocator.peek(), total as i64 + 1);
}

#[test]
fn local_allocator_ids_increase_within_a_thread_under_contention() {
    let allocator = LocalAllocator::new();

    scope(|s| {
        for _ in 0..4 {
            s.spawn(|| {
                let mut last = 0;
                for _ in 0..1000 {
                    let id = allocator.allocate().get();
                    assert!(id > last, "{id} did not increase past {last}");
                    last = id;
                }
            });
        }
    });
}

#[tokio::test]
async fn remote_allocator_requests_one_id_of_the_given_kind() {
    let authority = ScriptedAuthority::returning(Ok(vec![42]));
    let remote = RemoteAllocator::new(&authority);

    let id = remote.allocate("common").await.unwrap();

    assert_eq!(id.get(), 42);
    assert_eq!(authority.calls(), vec![("common".to_owned(), 1)]);
}

#[tokio::test]
async fn remote_allocator_empty_response_is_unavailable() {
    let authority = ScriptedAuthority::returning(Ok(Vec::new()));
    let remote = RemoteAllocator::new(authority);

    let err = remote.allocate("common").await.unwrap_err();

    assert!(
        matches!(&err, Error::AllocationUnavailable { reason } if reason.contains("no identifiers")),
        "{err:?}"
    );
}

#[tokio::test]
async fn remote_allocator_zero_is_unavailable() {
    let remote = RemoteAllocator::new(ScriptedAuthority::returning(Ok(vec![0])));

    let err = remote.allocate("common").await.unwrap_err();

    assert!(
        matches!(&err, Error::AllocationUnavailable { reason } if reason.contains("zero")),
        "{err:?}"
    );
}

#[tokio::test]
async fn remote_allocator_takes_the_first_of_an_oversized_answer() {
    let remote = RemoteAllocator::new(ScriptedAuthority::returning(Ok(vec![7, 8, 9])));
    assert_eq!(remote.allocate("common").await.unwrap().get(), 7);
}

#[tokio::test]
async fn remote_allocator_surfaces_authority_errors_without_retrying() {
    let authority = ScriptedAuthority::returning(Err(Error::unavailable("connection refused")));
    let remote = RemoteAllocator::new(&authority);

    let err = remote.allocate("common").await.unwrap_err();

    assert_eq!(err, Error::unavailable("connection refused"));
    assert_eq!(authority.calls().len(), 1);
}

#[tokio::test]
async fn remote_allocator_honours_cancellation() {
    let authority = HangingAuthority::default();
    let remote = RemoteAllocator::new(&authority);
    let cancel = CancellationToken::new();

    let canceller = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(std::time::Duration::from_millis(20)).await;
            cancel.cancel();
        })
    };

    let res = remote.allocate_with_cancel("common", &cancel).await;
    canceller.await.unwrap();

    assert_eq!(res, Err(Error::Cancelled));
    assert_eq!(authority.calls(), 1);
}

#[tokio::test]
async fn remote_allocator_skips_the_authority_when_already_cancelled() {
    let authority = HangingAuthority::default();
    let remote = RemoteAllocator::new(&authority);
    let cancel = CancellationToken::new();
    cancel.cancel();

    let res = remote.allocate_with_cancel("common", &cancel).await;

    assert_eq!(res, Err(Error::Cancelled));
    assert_eq!(authority.calls(), 0);
}

#[tokio::test]
async fn no_authority_is_always_unavailable() {
    let remote = RemoteAllocator::new(NoAuthority);
    assert!(matches!(
        remote.allocate("common").await,
        Err(Error::AllocationUnavailable { .. })
    ));
}

#[tokio::test]
async fn memory_authority_hands_out_contiguous_ranges_per_kind() {
    let authority = MemoryAuthority::new();

    assert_eq!(authority.allocate_ids("common", 3).await.unwrap(), vec![1, 2, 3]);
    assert_eq!(authority.allocate_ids("common", 2).await.unwrap(), vec![4, 5]);
    assert_eq!(authority.allocate_ids("other", 1).await.unwrap(), vec![1]);
    assert_eq!(authority.next_id("common"), 6);
    assert_eq!(authority.next_id("unused"), 1);
}

#[tokio::test]
async fn memory_authority_zero_count_is_empty() {
    let authority = MemoryAuthority::new();
    assert!(authority.allocate_ids("common", 0).await.unwrap().is_empty());

    let remote = RemoteAllocator::new(&authority);
    assert_eq!(remote.allocate("common").await.unwrap().get(), 1);
}

#[tokio::test]
async fn memory_authority_rejects_oversized_requests() {
    let authority = MemoryAuthority::new();

    let err = authority
        .allocate_ids("common", u32::MAX)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::AllocationUnavailable { .. }), "{err:?}");
    assert_eq!(authority.next_id("common"), 1);

    let max = MemoryAuthority::MAX_IDS_PER_REQUEST;
    assert_eq!(authority.reserve("common", max).unwrap().len(), max as usize);
    assert!(authority.reserve("common", max + 1).is_err());
    assert_eq!(authority.next_id("common"), i64::from(max) + 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn memory_authority_is_unique_under_concurrency() {
    let remote = Arc::new(RemoteAllocator::new(MemoryAuthority::new()));

    let tasks = (0..64)
        .map(|_| {
            let remote = Arc::clone(&remote);
            tokio::spawn(async move {
                let mut ids = Vec::with_capacity(32);
                for _ in 0..32 {
                    ids.push(remote.allocate("common").await.unwrap().get());
                }
                ids
            })
        })
        .collect::<Vec<_>>();

    let mut seen = HashSet::new();
    for ids in futures::future::join_all(tasks).await {
        for id in ids.unwrap() {
            assert!(seen.insert(id), "duplicate id {id}");
        }
    }
    assert_eq!(seen.len(), 64 * 32);
}
