use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use dht_engine::{
    messages::PutValueArguments, Blockstore, Bytes, Config, DhtClient, DhtServer, Error,
    MemoryAddressBook, Message, NameRecord, PeerAddresses, PeerId, RecordValidator,
    ReprovideScheduler, Result,
};
use futures::{
    executor::block_on,
    future::{self, BoxFuture, FutureExt},
};

#[derive(Debug)]
struct NoBlocks;

impl Blockstore for NoBlocks {
    fn has_any<'a>(&'a self, _key: &'a [u8]) -> BoxFuture<'a, bool> {
        future::ready(false).boxed()
    }
}

#[derive(Debug)]
struct RejectAll;

impl RecordValidator for RejectAll {
    fn parse_and_validate(&self, _request: &PutValueArguments) -> Option<(PeerId, NameRecord)> {
        None
    }
}

/// Delivers provide RPCs straight to the handler of a remote server.
#[derive(Debug)]
struct Loopback {
    remote: Arc<DhtServer>,
    local_peer: PeerId,
}

impl DhtClient for Loopback {
    fn provide<'a>(
        &'a self,
        key: Bytes,
        provider: &'a PeerAddresses,
    ) -> BoxFuture<'a, Result<()>> {
        async move {
            if key.starts_with(b"offline") {
                return Err(Error::Provide("no peers".to_string()));
            }

            let mut replies: Vec<Message> = Vec::new();
            self.remote
                .handle(
                    Message::add_provider(key, vec![provider.to_entry()]),
                    &self.local_peer,
                    &mut replies,
                )
                .await
        }
        .boxed()
    }
}

fn remote() -> Arc<DhtServer> {
    Arc::new(
        DhtServer::builder(
            PeerId::random(),
            Arc::new(MemoryAddressBook::new()),
            Arc::new(NoBlocks),
            Arc::new(RejectAll),
        )
        .build(),
    )
}

fn scheduler(
    remote: &Arc<DhtServer>,
    blocks: Vec<&'static [u8]>,
    interval: Duration,
) -> (PeerId, ReprovideScheduler) {
    let local_peer = PeerId::random();

    let address_book = Arc::new(MemoryAddressBook::new());
    address_book.set_addresses(
        local_peer.clone(),
        vec!["/ip4/8.8.8.8/tcp/4001".parse().unwrap()],
    );

    let client = Arc::new(Loopback {
        remote: remote.clone(),
        local_peer: local_peer.clone(),
    });

    let config = Config {
        reprovide_interval: interval,
        ..Default::default()
    };

    let scheduler = ReprovideScheduler::new(
        local_peer.clone(),
        address_book,
        client,
        move || blocks.clone().into_iter().map(Bytes::from_static),
        &config,
    );

    (local_peer, scheduler)
}

fn eventually(condition: impl Fn() -> bool) -> bool {
    let deadline = Instant::now() + Duration::from_secs(5);
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    false
}

#[test]
fn publish_reaches_remote_provider_store() {
    let remote = remote();
    let (local_peer, scheduler) = scheduler(&remote, vec![], Duration::from_secs(3600));

    let report = block_on(scheduler.publish(vec![
        Bytes::from_static(b"block-a"),
        Bytes::from_static(b"offline-block"),
        Bytes::from_static(b"block-b"),
    ]));

    assert_eq!(report.attempted, 3);
    assert_eq!(report.failed, 1);

    for key in [&b"block-a"[..], &b"block-b"[..]] {
        let providers = remote.get_providers(key);
        assert_eq!(providers.len(), 1);
        assert_eq!(providers[0].peer, local_peer);
        assert_eq!(providers[0].addresses.len(), 1);
    }
    assert!(remote.get_providers(b"offline-block").is_empty());
}

#[test]
fn sweep_and_new_blocks() {
    let remote = remote();
    let (local_peer, scheduler) =
        scheduler(&remote, vec![&b"old-block"[..]], Duration::from_secs(3600));

    scheduler.start().unwrap();

    assert!(eventually(|| !remote.get_providers(b"old-block").is_empty()));

    scheduler.announce(Bytes::from_static(b"new-block"));

    assert!(eventually(|| remote
        .get_providers(b"new-block")
        .iter()
        .any(|provider| provider.peer == local_peer)));

    scheduler.stop();
}

#[test]
fn stop_wakes_an_idle_scheduler() {
    let remote = remote();
    let (_, scheduler) = scheduler(&remote, vec![], Duration::from_secs(24 * 3600));

    scheduler.start().unwrap();
    thread::sleep(Duration::from_millis(20));

    let start = Instant::now();
    scheduler.stop();

    assert!(start.elapsed() < Duration::from_secs(1));
    assert!(!scheduler.is_running());
}
