//! Keep the blocks we hold discoverable by periodically announcing them.
//!
//! Two threads share one work queue and one shutdown channel:
//! - the sweep thread announces every local block, then waits
//!   [Config::reprovide_interval] (or until shutdown),
//! - the new-blocks thread waits on the queue (or shutdown) and announces
//!   each block as soon as it is queued.
//!
//! A panic in a [LocalBlocks] supplier or a [DhtClient] is logged and the
//! thread carries on with the next sweep or block.

use std::{
    fmt::{self, Debug, Formatter},
    panic::{self, AssertUnwindSafe},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex, PoisonError,
    },
    thread::{self, JoinHandle},
    time::Duration,
};

use bytes::Bytes;
use flume::{Receiver, RecvTimeoutError, Selector, Sender};
use futures::{executor::block_on, future::BoxFuture, stream, FutureExt, StreamExt};
use tracing::{debug, info, warn};

use crate::common::{PeerAddresses, PeerId};
use crate::config::Config;
use crate::server::backends::AddressBook;
use crate::{Error, Result};

/// Outbound side of the DHT: announce a provider record to the closest peers of a key.
pub trait DhtClient: Debug + Send + Sync {
    /// Announce that `provider` holds the block with content key `key`.
    ///
    /// Expected to apply its own timeout. Failures resolve to `Err`.
    fn provide<'a>(&'a self, key: Bytes, provider: &'a PeerAddresses) -> BoxFuture<'a, Result<()>>;
}

/// Enumerates the content keys of every locally held block.
///
/// Called again on every sweep, so the sequence may be lazy.
pub trait LocalBlocks: Send + Sync {
    fn blocks(&self) -> Box<dyn Iterator<Item = Bytes> + '_>;
}

impl<F, I> LocalBlocks for F
where
    F: Fn() -> I + Send + Sync,
    I: IntoIterator<Item = Bytes>,
    I::IntoIter: 'static,
{
    fn blocks(&self) -> Box<dyn Iterator<Item = Bytes> + '_> {
        Box::new(self().into_iter())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
/// Outcome of one [ReprovideScheduler::publish] batch.
pub struct PublishReport {
    /// Provide RPCs issued.
    pub attempted: usize,
    /// Provide RPCs that failed, each already logged.
    pub failed: usize,
}

/// Periodic and reactive provider of local blocks.
pub struct ReprovideScheduler {
    inner: Arc<Inner>,
    queue: Sender<Bytes>,
    running: Mutex<Option<Running>>,
}

struct Inner {
    local_peer: PeerId,
    address_book: Arc<dyn AddressBook>,
    client: Arc<dyn DhtClient>,
    blocks: Box<dyn LocalBlocks>,
    new_blocks: Receiver<Bytes>,
    interval: Duration,
    concurrency: usize,
}

struct Running {
    /// Never sent on, dropping it is the shutdown signal.
    _shutdown: Sender<()>,
    handles: Vec<JoinHandle<()>>,
}

impl ReprovideScheduler {
    pub fn new(
        local_peer: PeerId,
        address_book: Arc<dyn AddressBook>,
        client: Arc<dyn DhtClient>,
        blocks: impl LocalBlocks + 'static,
        config: &Config,
    ) -> Self {
        let (queue, new_blocks) = flume::unbounded();

        Self {
            inner: Arc::new(Inner {
                local_peer,
                address_book,
                client,
                blocks: Box::new(blocks),
                new_blocks,
                interval: config.reprovide_interval,
                concurrency: config.provide_concurrency.max(1),
            }),
            queue,
            running: Mutex::new(None),
        }
    }

    // === Getters ===

    pub fn is_running(&self) -> bool {
        self.running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// A handle to queue newly added blocks from any thread.
    pub fn new_blocks(&self) -> Sender<Bytes> {
        self.queue.clone()
    }

    // === Public Methods ===

    /// Queue a newly added block to be announced right away.
    pub fn announce(&self, key: Bytes) {
        // The receiver lives in `inner`, so this can't be disconnected.
        let _ = self.queue.send(key);
    }

    /// Spawn the sweep and new-blocks threads.
    pub fn start(&self) -> Result<()> {
        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);

        if running.is_some() {
            return Err(Error::AlreadyRunning);
        }

        let (shutdown, done) = flume::bounded::<()>(0);

        let sweep = {
            let inner = self.inner.clone();
            let done = done.clone();

            thread::Builder::new()
                .name("reprovider".to_string())
                .spawn(move || inner.run_sweeps(done))?
        };

        let reactive = {
            let inner = self.inner.clone();

            thread::Builder::new()
                .name("new-block-provider".to_string())
                .spawn(move || inner.run_new_blocks(done))?
        };

        info!(interval = ?self.inner.interval, "Reprovider started");

        *running = Some(Running {
            _shutdown: shutdown,
            handles: vec![sweep, reactive],
        });

        Ok(())
    }

    /// Signal both threads to exit and wait for them.
    ///
    /// Returns once any batch in flight has settled.
    pub fn stop(&self) {
        let running = self
            .running
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();

        let Some(Running { _shutdown, handles }) = running else {
            return;
        };

        drop(_shutdown);

        for handle in handles {
            if handle.join().is_err() {
                warn!("Reprovider thread panicked");
            }
        }

        info!("Reprovider stopped");
    }

    /// Announce every block in `blocks`, returning once every attempt has settled.
    pub async fn publish<I: IntoIterator<Item = Bytes>>(&self, blocks: I) -> PublishReport {
        self.inner.publish(blocks).await
    }
}

impl Debug for ReprovideScheduler {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.debug_struct("ReprovideScheduler")
            .field("local_peer", &self.inner.local_peer)
            .field("interval", &self.inner.interval)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Inner {
    fn run_sweeps(&self, done: Receiver<()>) {
        while !done.is_disconnected() {
            let sweep = panic::catch_unwind(AssertUnwindSafe(|| {
                block_on(self.publish(self.blocks.blocks()))
            }));

            match sweep {
                Ok(report) => info!(
                    attempted = report.attempted,
                    failed = report.failed,
                    "Reprovide sweep done"
                ),
                Err(_) => warn!("Reprovide sweep panicked"),
            }

            match done.recv_timeout(self.interval) {
                Err(RecvTimeoutError::Timeout) => continue,
                _ => break,
            }
        }
    }

    fn run_new_blocks(&self, done: Receiver<()>) {
        loop {
            let next = Selector::new()
                .recv(&self.new_blocks, |key| key.ok())
                .recv(&done, |_| None)
                .wait();

            match next {
                Some(key) => {
                    let publish = panic::catch_unwind(AssertUnwindSafe(|| {
                        block_on(self.publish(std::iter::once(key.clone())))
                    }));

                    if publish.is_err() {
                        warn!(?key, "Providing new block panicked");
                    }
                }
                None => break,
            }
        }
    }

    async fn publish<I: IntoIterator<Item = Bytes>>(&self, blocks: I) -> PublishReport {
        let addresses = self.address_book.addresses_of(&self.local_peer).await;
        let provider = PeerAddresses::new(self.local_peer.clone(), addresses);

        let attempted = AtomicUsize::new(0);
        let failed = AtomicUsize::new(0);

        stream::iter(blocks)
            .for_each_concurrent(self.concurrency, |key| {
                let provider = &provider;
                let attempted = &attempted;
                let failed = &failed;

                async move {
                    attempted.fetch_add(1, Ordering::Relaxed);

                    // The call itself runs inside the guarded future.
                    let outcome = AssertUnwindSafe(async {
                        self.client.provide(key.clone(), provider).await
                    })
                    .catch_unwind()
                    .await;

                    match outcome {
                        Ok(Ok(())) => {}
                        Ok(Err(error)) => {
                            debug!(?key, %error, "Couldn't provide block");
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                        Err(_) => {
                            warn!(?key, "Provide panicked");
                            failed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                }
            })
            .await;

        PublishReport {
            attempted: attempted.into_inner(),
            failed: failed.into_inner(),
        }
    }
}
