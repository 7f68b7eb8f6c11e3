use std::io::{Cursor, Read};
use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use stellar_xdr::curr::{LedgerCloseMetaBatch, Limited, Limits, ReadXdr};

use super::close::{close_ledger, network_id, ClosedLedger};
use crate::Error;

/// How often to re-check for a ledger that has not been published yet.
const POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Upstream stream of finalized ledgers, consumed one sequence at a
/// time by the ingestion loop.
#[async_trait]
pub trait LedgerSource: Send + Sync + 'static {
    /// Wait until the ledger with `sequence` is available and return it
    /// decoded. Implementations handle their own polling and transient
    /// retries; an error from this method is not recoverable by asking
    /// again.
    async fn next_ledger(&self, sequence: u32) -> Result<ClosedLedger, Error>;

    /// Best-effort discovery of a reasonable starting sequence when
    /// none was configured.
    async fn discover_start(&self) -> Option<u32> {
        None
    }
}

/// Configuration published by a SEP-54 ledger-meta store as
/// `.config.json`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetaStoreConfig {
    pub network_passphrase: String,
    pub ledgers_per_batch: u32,
    pub batches_per_partition: u32,
    pub compression: String,
    pub version: String,
}

impl MetaStoreConfig {
    /// Object path of the batch holding `ledger_sequence`.
    ///
    /// Partition and batch file names lead with the bitwise complement
    /// of their starting sequence in hex so that newest objects list
    /// first.
    pub fn path_for_ledger(&self, ledger_sequence: u32) -> String {
        let batch_start = ledger_sequence - (ledger_sequence % self.ledgers_per_batch);
        let batch_end = batch_start + self.ledgers_per_batch - 1;

        let partition_size = self.ledgers_per_batch * self.batches_per_partition;
        let partition_start = ledger_sequence - (ledger_sequence % partition_size);
        let partition_end = partition_start + partition_size - 1;

        let partition_prefix = 0xFFFF_FFFFu32.wrapping_sub(partition_start);
        let batch_prefix = 0xFFFF_FFFFu32.wrapping_sub(batch_start);

        let batch_file = if self.ledgers_per_batch == 1 {
            format!("{:08X}--{}.xdr.zst", batch_prefix, batch_start)
        } else {
            format!("{:08X}--{}-{}.xdr.zst", batch_prefix, batch_start, batch_end)
        };

        if self.batches_per_partition == 1 && self.ledgers_per_batch == 1 {
            batch_file
        } else {
            format!(
                "{:08X}--{}-{}/{}",
                partition_prefix, partition_start, partition_end, batch_file
            )
        }
    }
}

/// Defaults matching the public pubnet bucket layout.
impl Default for MetaStoreConfig {
    fn default() -> Self {
        Self {
            network_passphrase: "Public Global Stellar Network ; September 2015".to_string(),
            ledgers_per_batch: 1,
            batches_per_partition: 64000,
            compression: "zstd".to_string(),
            version: "0.1.0".to_string(),
        }
    }
}

/// Polling [`LedgerSource`] over a SEP-54 ledger-meta object store.
pub struct MetaStoreSource {
    client: reqwest::Client,
    meta_url: String,
    config: MetaStoreConfig,
    network_id: [u8; 32],
}

impl MetaStoreSource {
    /// Connect to the store, loading its `.config.json`. A missing or
    /// unreadable config falls back to the pubnet defaults.
    pub async fn connect(
        client: reqwest::Client,
        meta_url: String,
        network_passphrase: &str,
    ) -> Self {
        let config = match fetch_config(&client, &meta_url).await {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "failed to fetch store config, using defaults");
                MetaStoreConfig::default()
            }
        };
        Self {
            client,
            meta_url,
            config,
            network_id: network_id(network_passphrase),
        }
    }

    #[cfg(test)]
    fn with_config(
        client: reqwest::Client,
        meta_url: String,
        config: MetaStoreConfig,
        network_passphrase: &str,
    ) -> Self {
        Self {
            client,
            meta_url,
            config,
            network_id: network_id(network_passphrase),
        }
    }

    /// Fetch, decompress, and decode the batch containing `sequence`.
    async fn fetch_batch(&self, sequence: u32) -> Result<LedgerCloseMetaBatch, Error> {
        let path = self.config.path_for_ledger(sequence);
        let url = format!("{}/{}", self.meta_url, path);
        tracing::debug!(url = %url, ledger = sequence, "fetching ledger meta");

        let resp = self.client.get(&url).send().await?;
        if !resp.status().is_success() {
            return Err(Error::LedgerNotFound(sequence));
        }

        let compressed = resp.bytes().await?;
        let mut decoder = zstd::stream::Decoder::new(Cursor::new(compressed))?;
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed)?;

        let mut limited = Limited::new(Cursor::new(decompressed), Limits::none());
        Ok(LedgerCloseMetaBatch::read_xdr(&mut limited)?)
    }
}

#[async_trait]
impl LedgerSource for MetaStoreSource {
    async fn next_ledger(&self, sequence: u32) -> Result<ClosedLedger, Error> {
        let mut consecutive_failures = 0u32;
        loop {
            match self.fetch_batch(sequence).await {
                Ok(batch) => {
                    for meta in batch.ledger_close_metas.iter() {
                        let ledger = close_ledger(meta, &self.network_id)?;
                        if ledger.head.sequence == sequence {
                            return Ok(ledger);
                        }
                    }
                    return Err(Error::Internal(format!(
                        "ledger {sequence} missing from its batch"
                    )));
                }
                Err(Error::LedgerNotFound(_)) => {
                    consecutive_failures = 0;
                    tracing::trace!(ledger = sequence, "ledger not yet published, waiting");
                    tokio::time::sleep(POLL_INTERVAL).await;
                }
                Err(e) => {
                    consecutive_failures += 1;
                    tracing::warn!(
                        ledger = sequence,
                        error = %e,
                        consecutive_failures,
                        "failed to fetch ledger meta"
                    );
                    let backoff =
                        Duration::from_secs((2u64.pow(consecutive_failures.min(6))).min(60));
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    async fn discover_start(&self) -> Option<u32> {
        let resp = self
            .client
            .get("https://horizon.stellar.org/")
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        let body: serde_json::Value = serde_json::from_slice(&resp.bytes().await.ok()?).ok()?;
        body.get("history_latest_ledger")
            .and_then(|v| v.as_u64())
            .map(|v| v as u32)
    }
}

/// Fetch the store's `.config.json`.
async fn fetch_config(client: &reqwest::Client, meta_url: &str) -> Result<MetaStoreConfig, Error> {
    let url = format!("{}/.config.json", meta_url);
    tracing::info!(url = %url, "fetching store config");
    let resp = client.get(&url).send().await?;
    if !resp.status().is_success() {
        return Err(Error::Internal(format!("config not found at {url}")));
    }
    let bytes = resp.bytes().await?;
    let config: MetaStoreConfig = serde_json::from_slice(&bytes)?;
    tracing::info!(
        ledgers_per_batch = config.ledgers_per_batch,
        batches_per_partition = config.batches_per_partition,
        "store config loaded"
    );
    Ok(config)
}
