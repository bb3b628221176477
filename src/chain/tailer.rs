//! Chain-event tailer: drives a [`BlockRange`] against a [`ChainRpcClient`],
//! deduplicates by transaction hash, and fans decoded events out to
//! subscribers.

use std::collections::{HashMap, HashSet};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::chain::block_range::BlockRange;
use crate::chain::events::{ChainEvent, NewPeer, Publication, RawLog};
use crate::error::{ChainRpcError, TailerError};

/// Narrow RPC surface the tailer needs from a chain node. Kept as a trait so
/// the core never links against a concrete transport.
#[async_trait]
pub trait ChainRpcClient: Send + Sync {
    async fn block_number(&self) -> Result<u64, ChainRpcError>;
    async fn get_logs(
        &self,
        address: &str,
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>, ChainRpcError>;
}

/// The two event families a tailer can be configured to recognise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    Publication,
    NewPeer,
}

fn decode_by_kind(kind: EventKind, log: &RawLog) -> Result<ChainEvent, ChainRpcError> {
    match kind {
        EventKind::Publication => Publication::decode(log).map(ChainEvent::Publication),
        EventKind::NewPeer => NewPeer::decode(log).map(ChainEvent::NewPeer),
    }
}

/// Tails one contract's logs, adapting window size and fanning decoded
/// events out to per-kind subscriber sinks.
pub struct ChainTailer<C: ChainRpcClient> {
    client: C,
    contract_address: String,
    /// Maps `topics[0]` (the event signature hash, lowercase hex with `0x`
    /// prefix) to the event family it identifies.
    event_signatures: HashMap<String, EventKind>,
    block_sleep_interval: Duration,

    from: u64,
    to: Option<u64>,
    reverse: bool,
    watermark: u64,
    step_size: u64,
    min_size: u64,
    max_size: u64,
    target_time: f64,

    seen: HashSet<String>,
    sinks: HashMap<EventKind, Vec<mpsc::Sender<ChainEvent>>>,
}

impl<C: ChainRpcClient> ChainTailer<C> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        client: C,
        contract_address: impl Into<String>,
        event_signatures: HashMap<String, EventKind>,
        from: u64,
        to: Option<u64>,
        start_size: u64,
        min_size: u64,
        max_size: u64,
        target_time: f64,
        reverse: bool,
        block_sleep_interval: Duration,
    ) -> Self {
        let watermark = if reverse { to.unwrap_or(from) } else { from };
        Self {
            client,
            contract_address: contract_address.into(),
            event_signatures,
            block_sleep_interval,
            from,
            to,
            reverse,
            watermark,
            step_size: start_size,
            min_size,
            max_size,
            target_time,
            seen: HashSet::new(),
            sinks: HashMap::new(),
        }
    }

    /// Register `sink` to receive events of `kind`. Idempotent: registering
    /// the same sink for the same kind twice has no further effect.
    pub fn subscribe(&mut self, kind: EventKind, sink: mpsc::Sender<ChainEvent>) {
        let sinks = self.sinks.entry(kind).or_default();
        if !sinks.iter().any(|existing| existing.same_channel(&sink)) {
            sinks.push(sink);
        }
    }

    fn build_range(&self) -> BlockRange {
        if self.reverse {
            BlockRange::new(
                self.from,
                Some(self.watermark),
                self.step_size,
                self.min_size,
                self.max_size,
                true,
                self.target_time,
            )
        } else {
            BlockRange::new(
                self.watermark,
                self.to,
                self.step_size,
                self.min_size,
                self.max_size,
                false,
                self.target_time,
            )
        }
    }

    /// Drive the tailer to completion: bounded ranges (and reverse ranges,
    /// which always terminate at their origin) run one pass and return.
    /// Open-ended forward ranges repeat forever, sleeping
    /// `block_sleep_interval` between passes.
    pub async fn run(&mut self) -> Result<(), TailerError> {
        loop {
            self.run_one_pass().await?;

            let done = if self.reverse {
                self.watermark <= self.from
            } else {
                self.to.is_some_and(|bound| self.watermark > bound)
            };
            if done {
                return Ok(());
            }

            sleep(self.block_sleep_interval).await;
        }
    }

    async fn run_one_pass(&mut self) -> Result<(), TailerError> {
        let head = self.client.block_number().await?;
        let mut range = self.build_range();
        range.clip_to_head(head);

        while let Some((from, to)) = range.next_window() {
            debug!(from, to, step_size = range.step_size(), "fetching log window");
            let started = std::time::Instant::now();

            let logs = match self.client.get_logs(&self.contract_address, from, to).await {
                Ok(logs) => logs,
                Err(ChainRpcError::FilterNotFound) => {
                    warn!(from, to, "filter not found, retrying with smaller window");
                    range.retry();
                    continue;
                }
                Err(e) => return Err(TailerError::Rpc(e)),
            };

            let mut ordered = logs;
            if self.reverse {
                ordered.reverse();
            }

            for log in &ordered {
                if !self.seen.insert(log.transaction_hash.clone()) {
                    continue;
                }

                let Some(&kind) = log.topics.first().and_then(|sig| self.event_signatures.get(sig))
                else {
                    continue;
                };

                let event = decode_by_kind(kind, log).map_err(|source| TailerError::FatalDecode {
                    tx_hash: log.transaction_hash.clone(),
                    source,
                })?;

                if let Some(sinks) = self.sinks.get(&kind) {
                    for sink in sinks {
                        let _ = sink.send(event.clone()).await;
                    }
                }
            }

            self.advance_watermark(from, to);
            self.step_size = range.record_time(started.elapsed().as_secs_f64().max(0.001));
        }

        Ok(())
    }

    fn advance_watermark(&mut self, from: u64, to: u64) {
        if self.reverse {
            self.watermark = from.saturating_sub(1);
        } else {
            self.watermark = to.saturating_add(1);
        }
    }
}
