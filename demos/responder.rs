use std::{
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use clap::Parser;
use dht_engine::{
    messages::PutValueArguments, Blockstore, Bytes, Config, DhtClient, DhtServer,
    MemoryAddressBook, Message, MessageType, NameRecord, PeerAddresses, PeerEntry, PeerId,
    RecordValidator, ReprovideScheduler, Result,
};
use futures::{
    executor::block_on,
    future::{self, BoxFuture, FutureExt},
};
use tracing::{info, Level};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
/// Run a responder against simulated peers and reprovide a few local blocks.
struct Cli {
    /// Number of simulated remote peers
    #[arg(long, default_value_t = 50)]
    peers: usize,
    /// Number of locally held blocks
    #[arg(long, default_value_t = 10)]
    blocks: usize,
    /// Seconds between two reprovide sweeps
    #[arg(long, default_value_t = 2)]
    interval: u64,
    /// Seconds to keep the reprovider running
    #[arg(long, default_value_t = 5)]
    run: u64,
    /// Log every request
    #[arg(short, long)]
    verbose: bool,
}

#[derive(Debug)]
struct HeldBlocks(Vec<Bytes>);

impl Blockstore for HeldBlocks {
    fn has_any<'a>(&'a self, key: &'a [u8]) -> BoxFuture<'a, bool> {
        future::ready(self.0.iter().any(|block| block == key)).boxed()
    }
}

/// Accepts anything, using the value length as the sequence number.
#[derive(Debug)]
struct TrustingValidator;

impl RecordValidator for TrustingValidator {
    fn parse_and_validate(&self, request: &PutValueArguments) -> Option<(PeerId, NameRecord)> {
        let publisher = PeerId::from_ipns_key(&request.key)?;
        let value = request.record.value.clone();
        let sequence = value.len() as u64;

        Some((publisher, NameRecord::new(value, sequence, std::time::SystemTime::now())))
    }
}

/// Pretends every provide RPC reached the network.
#[derive(Debug)]
struct PrintingClient;

impl DhtClient for PrintingClient {
    fn provide<'a>(
        &'a self,
        key: Bytes,
        provider: &'a PeerAddresses,
    ) -> BoxFuture<'a, Result<()>> {
        info!(?key, addresses = provider.addresses.len(), "Provide");
        future::ready(Ok(())).boxed()
    }
}

fn main() {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(if cli.verbose {
            Level::TRACE
        } else {
            Level::INFO
        })
        .with_thread_names(true)
        .init();

    let local_peer = PeerId::random();
    let address_book = Arc::new(MemoryAddressBook::new());
    address_book.set_addresses(
        local_peer.clone(),
        vec![
            "/ip4/127.0.0.1/tcp/4001".parse().expect("valid multiaddr"),
            "/ip4/203.0.113.7/tcp/4001".parse().expect("valid multiaddr"),
        ],
    );

    let blocks: Vec<Bytes> = (0..cli.blocks)
        .map(|i| Bytes::from(format!("block-{i}")))
        .collect();

    let config = Config {
        reprovide_interval: Duration::from_secs(cli.interval),
        ..Default::default()
    };

    let server = DhtServer::builder(
        local_peer.clone(),
        address_book.clone(),
        Arc::new(HeldBlocks(blocks.clone())),
        Arc::new(TrustingValidator),
    )
    .config(config.clone())
    .build();

    println!("Local peer: {:?}", local_peer);

    let remotes: Vec<PeerId> = (0..cli.peers).map(|_| PeerId::random()).collect();
    for (i, peer) in remotes.iter().enumerate() {
        address_book.set_addresses(
            peer.clone(),
            vec![format!("/ip4/198.51.100.{}/tcp/4001", i % 250 + 1)
                .parse()
                .expect("valid multiaddr")],
        );
        server.add_outgoing_connection(peer.clone());
    }

    println!("Routing table size: {}", server.routing_table_size());

    let start = Instant::now();
    for (i, source) in remotes.iter().enumerate() {
        let key = Bytes::from(format!("block-{}", i % (cli.blocks.max(1) * 2)));

        let requests = [
            Message::find_node(source.to_bytes()),
            Message::get_providers(key.clone()),
            Message::add_provider(key, vec![PeerEntry::without_addresses(source.clone())]),
            Message::get_value(source.to_ipns_key()),
            Message::Ping,
        ];

        for request in requests {
            let mut replies: Vec<Message> = Vec::new();
            if let Err(error) = block_on(server.handle(request, source, &mut replies)) {
                println!("Request failed: {error}");
            }
        }
    }

    let info = server.info();
    println!(
        "\nHandled {} requests ({} bytes) in {:?}, sent {} replies ({} bytes)",
        MessageType::ALL
            .iter()
            .map(|kind| info.requests(*kind))
            .sum::<u64>(),
        info.bytes_received(),
        start.elapsed(),
        info.replies(),
        info.bytes_sent()
    );
    for kind in MessageType::ALL {
        println!(
            "  {:>13}: {} requests, {} bytes sent",
            kind.name(),
            info.requests(kind),
            info.bytes_sent_for(kind)
        );
    }

    let scheduler = ReprovideScheduler::new(
        local_peer,
        address_book,
        Arc::new(PrintingClient),
        move || blocks.clone(),
        &config,
    );

    if let Err(error) = scheduler.start() {
        println!("Couldn't start reprovider: {error}");
        return;
    }

    scheduler.announce(Bytes::from_static(b"freshly-added"));

    thread::sleep(Duration::from_secs(cli.run));
    scheduler.stop();
}
