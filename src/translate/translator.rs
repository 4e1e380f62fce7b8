//! Translation orchestration: cache-aware single translation, bulk
//! chunking, and delimiter batching with per-item fallback.
//! Public methods never surface transport errors; callers always get
//! text back, and bulk output arity always equals input arity.

use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use super::{BackoffPolicy, TranslateClient, TranslateError, TranslationBank, BATCH_DELIMITER};
use crate::endpoints::{limits_for, Endpoint, EndpointKind, EndpointRegistry};
use crate::settings::TranslateSettings;

/// Probe string used by the availability check.
const PROBE_TEXT: &str = "test";

pub struct Translator {
    settings: Arc<TranslateSettings>,
    bank: Arc<TranslationBank>,
    registry: Arc<EndpointRegistry>,
    client: TranslateClient,
    backoff: BackoffPolicy,
}

impl Translator {
    pub fn new(
        settings: Arc<TranslateSettings>,
        bank: Arc<TranslationBank>,
        registry: Arc<EndpointRegistry>,
        backoff: BackoffPolicy,
    ) -> Self {
        Self {
            settings,
            bank,
            registry,
            client: TranslateClient::new(),
            backoff,
        }
    }

    pub fn bank(&self) -> &Arc<TranslationBank> {
        &self.bank
    }

    pub fn settings(&self) -> &Arc<TranslateSettings> {
        &self.settings
    }

    pub fn backoff(&self) -> BackoffPolicy {
        self.backoff
    }

    /// The endpoint the current settings resolve to.
    pub fn endpoint(&self) -> Endpoint {
        self.settings.endpoint_data(&self.registry)
    }

    /// Probe the configured endpoint with a fixed test string. Reports
    /// failure only on a transport/HTTP error; a response that merely
    /// echoes the input still counts as available.
    pub async fn is_available(&self) -> bool {
        let endpoint = self.endpoint();
        match self.client.request(&endpoint, PROBE_TEXT).await {
            Ok(_) => true,
            Err(e) => {
                debug!(endpoint = %endpoint.id, error = %e, "availability probe failed");
                false
            }
        }
    }

    /// Translate one text. Cache hit short-circuits the network; a
    /// transport failure hands back the input unchanged.
    pub async fn translate_one(&self, text: &str) -> String {
        let endpoint = self.endpoint();
        match self.translate_cached(text, &endpoint).await {
            Ok(translated) => translated,
            Err(e) => {
                warn!(error = %e, "translation request failed");
                text.to_string()
            }
        }
    }

    /// Cache-aware fallible translation of a single text.
    async fn translate_cached(
        &self,
        text: &str,
        endpoint: &Endpoint,
    ) -> Result<String, TranslateError> {
        if let Some(entry) = self.bank.get(text) {
            debug!(text, translated = %entry.translated, "cache hit");
            return Ok(entry.translated);
        }
        let translated = self.client.request(endpoint, text).await?;
        if !translated.is_empty() && translated != text {
            self.bank.set(text, &translated, &endpoint.id);
        }
        Ok(translated)
    }

    /// Clamp a requested chunk size to the endpoint's safe limit.
    pub fn adaptive_chunk_size(&self, requested: usize, endpoint_id: &str) -> usize {
        let max_safe = limits_for(endpoint_id).max_chunk_size;
        if requested <= max_safe {
            requested
        } else {
            warn!(requested, max_safe, endpoint_id, "chunk size too large, clamping");
            max_safe
        }
    }

    /// Translate a list of texts, preserving order and arity. Failed or
    /// missing positions fall back to the original text.
    pub async fn translate_bulk(&self, texts: &[String]) -> Vec<String> {
        if texts.is_empty() {
            warn!("translate_bulk called with empty input");
            return Vec::new();
        }

        // Strips at most one newline occurrence per text.
        let cleaned: Vec<String> = texts.iter().map(|t| t.replacen('\n', "", 1)).collect();

        let endpoint = self.endpoint();
        let requested = self.settings.bulk_translate_chunk_size();
        let chunk_size = self.adaptive_chunk_size(requested, &endpoint.id).max(1);

        let cached = cleaned.iter().filter(|t| self.bank.get(t).is_some()).count();
        info!(
            total = cleaned.len(),
            cached,
            new = cleaned.len() - cached,
            chunk_size,
            endpoint = %endpoint.id,
            "bulk translation started"
        );

        let mut results = Vec::with_capacity(cleaned.len());
        for chunk in cleaned.chunks(chunk_size) {
            match endpoint.kind {
                EndpointKind::AutoDetect { .. } => {
                    results.extend(self.translate_chunk_batched(chunk, &endpoint).await);
                }
                EndpointKind::Template { .. } => {
                    results.extend(self.translate_chunk_joined(chunk, &endpoint).await);
                }
            }
        }

        info!(input = texts.len(), output = results.len(), "bulk translation completed");
        results
    }

    /// Legacy combined path for template endpoints: the chunk travels as
    /// one newline-joined request and is split back on newlines. Kept
    /// distinct from the batch path for endpoints that predate it.
    async fn translate_chunk_joined(&self, chunk: &[String], endpoint: &Endpoint) -> Vec<String> {
        let combined = chunk.join("\n");
        let translated = match self.translate_cached(&combined, endpoint).await {
            Ok(translated) => translated,
            Err(e) => {
                warn!(error = %e, "joined chunk translation failed");
                combined.clone()
            }
        };

        let mut parts: Vec<String> = translated.split('\n').map(str::to_string).collect();
        if parts.len() != chunk.len() {
            warn!(
                expected = chunk.len(),
                got = parts.len(),
                "joined response arity mismatch, padding with originals"
            );
        }
        parts.truncate(chunk.len());
        while parts.len() < chunk.len() {
            parts.push(chunk[parts.len()].clone());
        }
        parts
    }

    /// Batch path for the auto-detect endpoint: delimiter-combined
    /// requests, sequential with an inter-batch pause.
    async fn translate_chunk_batched(&self, chunk: &[String], endpoint: &Endpoint) -> Vec<String> {
        let batches = self.create_batches(chunk, &endpoint.id);
        debug!(items = chunk.len(), batches = batches.len(), "chunk packed into batches");

        let mut results = Vec::with_capacity(chunk.len());
        for (i, batch) in batches.iter().enumerate() {
            results.extend(self.translate_batch_with(batch, endpoint).await);
            if i + 1 < batches.len() {
                sleep(self.backoff.inter_batch).await;
            }
        }
        results
    }

    /// Greedily pack texts into batches under the endpoint's combined
    /// length and item count caps. An empty batch always accepts the next
    /// item regardless of its size; empty texts ride along as
    /// placeholders without triggering a new batch.
    pub fn create_batches(&self, texts: &[String], endpoint_id: &str) -> Vec<Vec<String>> {
        let limits = limits_for(endpoint_id);
        pack_batches(texts, limits.max_batch_length, limits.max_batch_items)
    }

    /// Translate one batch via a single delimiter-combined request,
    /// mapping response parts back positionally. A transport failure on
    /// the combined call falls back to paced individual requests.
    pub async fn translate_batch(&self, batch: &[String]) -> Vec<String> {
        let endpoint = self.endpoint();
        self.translate_batch_with(batch, &endpoint).await
    }

    async fn translate_batch_with(&self, batch: &[String], endpoint: &Endpoint) -> Vec<String> {
        let mut results: Vec<Option<String>> = vec![None; batch.len()];
        let mut pending: Vec<(usize, &str)> = Vec::new();

        for (i, text) in batch.iter().enumerate() {
            if text.trim().is_empty() {
                results[i] = Some(String::new());
            } else if let Some(entry) = self.bank.get(text) {
                results[i] = Some(entry.translated);
            } else {
                pending.push((i, text));
            }
        }

        if pending.is_empty() {
            return results.into_iter().map(Option::unwrap_or_default).collect();
        }

        let combined: String = pending
            .iter()
            .map(|(_, text)| *text)
            .collect::<Vec<_>>()
            .join(BATCH_DELIMITER);
        debug!(
            items = pending.len(),
            chars = combined.chars().count(),
            "batch request"
        );

        match self.client.request(endpoint, &combined).await {
            Ok(translated) => {
                let parts: Vec<&str> = translated.split(BATCH_DELIMITER).collect();
                if parts.len() != pending.len() {
                    warn!(
                        expected = pending.len(),
                        got = parts.len(),
                        "batch response arity mismatch, unmapped items keep originals"
                    );
                }
                for (slot, (i, original)) in pending.iter().enumerate() {
                    match parts.get(slot) {
                        Some(part) => {
                            let part = part.trim().to_string();
                            self.bank.set(original, &part, &endpoint.id);
                            results[*i] = Some(part);
                        }
                        None => results[*i] = Some((*original).to_string()),
                    }
                }
            }
            Err(e) => {
                warn!(error = %e, "batch translation failed, falling back to individual requests");
                for (n, (i, original)) in pending.iter().enumerate() {
                    let translated = match self.translate_cached(original, endpoint).await {
                        Ok(translated) => translated,
                        Err(e) => {
                            warn!(error = %e, "individual fallback failed");
                            (*original).to_string()
                        }
                    };
                    results[*i] = Some(translated);
                    if n + 1 < pending.len() {
                        sleep(self.backoff.inter_item).await;
                    }
                }
            }
        }

        results.into_iter().map(Option::unwrap_or_default).collect()
    }
}

/// Greedy packing under two simultaneous caps. `max_length` counts a
/// delimiter overhead per item; a batch in progress is closed the moment
/// the next item would exceed either cap.
fn pack_batches(texts: &[String], max_length: usize, max_items: usize) -> Vec<Vec<String>> {
    let delimiter_len = BATCH_DELIMITER.chars().count();
    let mut batches: Vec<Vec<String>> = Vec::new();
    let mut current: Vec<String> = Vec::new();
    let mut current_len = 0usize;

    for text in texts {
        if text.trim().is_empty() {
            current.push(String::new());
            continue;
        }

        let text_len = text.chars().count() + delimiter_len;
        if !current.is_empty()
            && (current_len + text_len > max_length || current.len() >= max_items)
        {
            batches.push(std::mem::take(&mut current));
            current.push(text.clone());
            current_len = text.chars().count();
        } else {
            current.push(text.clone());
            current_len += text_len;
        }
    }

    if !current.is_empty() {
        batches.push(current);
    }
    batches
}
