use idalloc_tonic_core::{
    GrpcAuthority, GrpcAuthorityConfig,
    idalloc::{
        APP_WIDE_ALLOCATION_KIND, AllocationAuthority, Environment, Error, FixedEnvironment,
        IdService,
    },
    proto::{
        AllocateIdsRequest, AllocateIdsResponse,
        id_allocator_server::{IdAllocator, IdAllocatorServer},
    },
};
use std::{
    net::SocketAddr,
    sync::{Arc, Mutex},
    time::Duration,
};
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::{Request, Response, Status, transport::Server};

/// Answers with a fixed id list, optionally after a delay, and records the
/// requests it saw.
#[derive(Clone, Default)]
struct FakeAuthority {
    ids: Vec<i64>,
    delay: Option<Duration>,
    seen: Arc<Mutex<Vec<(String, u32)>>>,
}

#[tonic::async_trait]
impl IdAllocator for FakeAuthority {
    async fn allocate_ids(
        &self,
        req: Request<AllocateIdsRequest>,
    ) -> Result<Response<AllocateIdsResponse>, Status> {
        let req = req.into_inner();
        self.seen.lock().unwrap().push((req.kind, req.count));
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(Response::new(AllocateIdsResponse {
            ids: self.ids.clone(),
        }))
    }
}

async fn spawn_server(authority: FakeAuthority) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        Server::builder()
            .add_service(IdAllocatorServer::new(authority))
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
            .unwrap();
    });
    addr
}

fn config_for(addr: SocketAddr) -> GrpcAuthorityConfig {
    GrpcAuthorityConfig::new(format!("http://{addr}"))
}

#[tokio::test]
async fn production_allocation_returns_the_authority_id() {
    let fake = FakeAuthority {
        ids: vec![42],
        ..Default::default()
    };
    let seen = Arc::clone(&fake.seen);
    let addr = spawn_server(fake).await;

    let authority = GrpcAuthority::connect(&config_for(addr)).await.unwrap();
    let service = IdService::new(FixedEnvironment::new(Environment::Production), authority);

    assert_eq!(service.allocate_id().await.unwrap().get(), 42);
    assert_eq!(
        *seen.lock().unwrap(),
        vec![(APP_WIDE_ALLOCATION_KIND.to_owned(), 1)]
    );
}

#[tokio::test]
async fn empty_answer_is_unavailable() {
    let addr = spawn_server(FakeAuthority::default()).await;
    let authority = GrpcAuthority::connect(&config_for(addr)).await.unwrap();
    let service = IdService::new(FixedEnvironment::new(Environment::Production), authority);

    let err = service.allocate_id().await.unwrap_err();

    assert!(matches!(err, Error::AllocationUnavailable { .. }), "{err:?}");
    assert_eq!(service.local().peek(), 1);
}

#[tokio::test]
async fn raw_authority_passes_kind_and_count_through() {
    let fake = FakeAuthority {
        ids: vec![5, 6, 7],
        ..Default::default()
    };
    let seen = Arc::clone(&fake.seen);
    let addr = spawn_server(fake).await;
    let authority = GrpcAuthority::connect_lazy(&config_for(addr)).unwrap();

    let ids = authority.allocate_ids("orders", 3).await.unwrap();

    assert_eq!(ids, vec![5, 6, 7]);
    assert_eq!(*seen.lock().unwrap(), vec![("orders".to_owned(), 3)]);
}

#[tokio::test]
async fn slow_authority_hits_the_request_timeout() {
    let addr = spawn_server(FakeAuthority {
        ids: vec![1],
        delay: Some(Duration::from_secs(5)),
        ..Default::default()
    })
    .await;
    let config = config_for(addr).with_request_timeout(Some(Duration::from_millis(100)));
    let authority = GrpcAuthority::connect(&config).await.unwrap();
    let service = IdService::new(FixedEnvironment::new(Environment::Production), authority);

    let err = service.allocate_id().await.unwrap_err();

    assert!(matches!(err, Error::AllocationUnavailable { .. }), "{err:?}");
}

#[tokio::test]
async fn unreachable_authority_is_unavailable() {
    // Bind then drop to get a port nothing listens on.
    let addr = {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        listener.local_addr().unwrap()
    };
    let config = config_for(addr).with_connect_timeout(Some(Duration::from_millis(200)));

    let err = GrpcAuthority::connect(&config).await.unwrap_err();
    assert!(matches!(err, Error::AllocationUnavailable { .. }), "{err:?}");

    let lazy = GrpcAuthority::connect_lazy(&config).unwrap();
    let err = lazy.allocate_ids("common", 1).await.unwrap_err();
    assert!(matches!(err, Error::AllocationUnavailable { .. }), "{err:?}");
}

#[tokio::test]
async fn unit_tests_never_touch_the_authority() {
    let fake = FakeAuthority {
        ids: vec![42],
        ..Default::default()
    };
    let seen = Arc::clone(&fake.seen);
    let addr = spawn_server(fake).await;
    let authority = GrpcAuthority::connect_lazy(&config_for(addr)).unwrap();
    let service = IdService::new(FixedEnvironment::new(Environment::UnitTest), authority);

    service.reset_self_allocated_id().unwrap();
    assert_eq!(service.allocate_id().await.unwrap().get(), 1);
    assert!(seen.lock().unwrap().is_empty());
}
