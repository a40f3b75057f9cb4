//! Generation gateway: cached, deadline-bounded calls to the generative model.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use serde::de::DeserializeOwned;
use tokio::sync::broadcast;
use tokio::time::{Instant, timeout};
use tracing::{debug, info, warn};

use crate::cache::ResultCache;
use crate::client::{ContentRequest, ContentResponse, GenerativeModel, InlineData};
use crate::error::{GenerationError, GenerationResult};
use crate::fingerprint::fingerprint;
use crate::metrics::{
    CACHE_HITS, CACHE_MISSES, CACHE_SIZE, DEDUPLICATED, GENERATION_ERRORS, REQUEST_LATENCY,
    REQUEST_TOTAL,
};
use crate::models::{
    BatchAnalysis, BatchImage, ImageInsight, ImageSize, NarrationAnalysis, ProjectInputs, Quote,
};
use crate::prompts;
use crate::stats::{StatsRecorder, UsageStats};

/// Deadlines and cache policy for a [`Gateway`].
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Deadline for the cached quote analysis
    pub analysis_timeout: Duration,
    /// Deadline for walkthrough audio analysis
    pub narration_timeout: Duration,
    /// Deadline for images, edits, descriptions and batch analysis
    pub generation_timeout: Duration,
    pub cache_ttl: Duration,
    /// `None` leaves the cache bounded only by TTL
    pub cache_max_entries: Option<usize>,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            analysis_timeout: Duration::from_secs(30),
            narration_timeout: Duration::from_secs(45),
            generation_timeout: Duration::from_secs(60),
            cache_ttl: Duration::from_secs(300),
            cache_max_entries: None,
        }
    }
}

type SharedOutcome = GenerationResult<Arc<Quote>>;

enum Role {
    Leader(broadcast::Sender<SharedOutcome>),
    Follower(broadcast::Receiver<SharedOutcome>),
}

/// Front door to the generative model.
///
/// Quote analysis is memoized by fingerprint and identical concurrent misses
/// share a single model call. Every call is raced against a deadline and
/// failures come back as a tagged [`GenerationError`]; nothing is retried
/// here.
pub struct Gateway {
    model: Arc<dyn GenerativeModel>,
    cache: ResultCache<Quote>,
    stats: StatsRecorder,
    inflight: DashMap<String, broadcast::Sender<SharedOutcome>>,
    config: GatewayConfig,
}

// Removes the in-flight marker however the leading call ends
struct InflightGuard<'a> {
    inflight: &'a DashMap<String, broadcast::Sender<SharedOutcome>>,
    key: &'a str,
}

impl Drop for InflightGuard<'_> {
    fn drop(&mut self) {
        self.inflight.remove(self.key);
    }
}

impl Gateway {
    pub fn new(model: Arc<dyn GenerativeModel>, config: GatewayConfig) -> Self {
        let mut cache = ResultCache::new(config.cache_ttl);
        if let Some(max) = config.cache_max_entries {
            cache = cache.with_max_entries(max);
        }
        Self {
            model,
            cache,
            stats: StatsRecorder::new(),
            inflight: DashMap::new(),
            config,
        }
    }

    pub fn config(&self) -> &GatewayConfig {
        &self.config
    }

    pub fn stats(&self) -> UsageStats {
        self.stats.snapshot(self.cache.len())
    }

    pub fn cache_len(&self) -> usize {
        self.cache.len()
    }

    /// Distinct analyses currently waiting on the model.
    pub fn inflight_len(&self) -> usize {
        self.inflight.len()
    }

    pub fn clear_cache(&self) {
        self.cache.clear();
        CACHE_SIZE.set(0.0);
        info!("Analysis cache cleared");
    }

    /// Cost estimate for an uploaded photo or video.
    pub async fn analyze(
        &self,
        media: &[u8],
        mime_type: &str,
        inputs: &ProjectInputs,
    ) -> GenerationResult<Arc<Quote>> {
        let started = Instant::now();
        self.stats.record_call();
        REQUEST_TOTAL.inc();

        let key = fingerprint(media, &inputs.prompt, &inputs.style);
        if let Some(quote) = self.cached(&key) {
            return Ok(quote);
        }
        let mut joined = false;
        let sender = loop {
            let role = match self.inflight.entry(key.clone()) {
                Entry::Occupied(entry) => Role::Follower(entry.get().subscribe()),
                Entry::Vacant(entry) => {
                    // a leader may have stored the result between our miss and here
                    if let Some(quote) = self.cached(&key) {
                        return Ok(quote);
                    }
                    let (sender, _) = broadcast::channel(1);
                    entry.insert(sender.clone());
                    Role::Leader(sender)
                }
            };
            match role {
                Role::Leader(sender) => break sender,
                Role::Follower(receiver) => {
                    if !joined {
                        joined = true;
                        self.stats.record_deduplicated();
                        DEDUPLICATED.inc();
                    }
                    match self.join_inflight(receiver).await {
                        Some(outcome) => return outcome,
                        // leader dropped without an answer: retry, possibly as leader
                        None => debug!(key = %key, "In-flight analysis abandoned, taking over"),
                    }
                }
            }
        };
        CACHE_MISSES.inc();
        let guard = InflightGuard {
            inflight: &self.inflight,
            key: &key,
        };

        let outcome = self.call_analysis(media, mime_type, inputs).await;
        match &outcome {
            Ok(quote) => {
                self.cache.put_shared(key.clone(), Arc::clone(quote));
                CACHE_SIZE.set(self.cache.len() as f64);

                let elapsed = started.elapsed();
                self.stats.record_latency(elapsed);
                REQUEST_LATENCY.observe(elapsed.as_secs_f64());
                info!(
                    cache_size = self.cache.len(),
                    "Quote analysis completed in {:?}: {} ({:.0} - {:.0} {})",
                    elapsed,
                    quote.project_name,
                    quote.total_estimated_cost_min,
                    quote.total_estimated_cost_max,
                    quote.currency
                );
            }
            Err(err) => record_failure("analysis", err),
        }

        // unregister first: anyone who subscribed before this gets the send
        drop(guard);
        let _ = sender.send(outcome.clone());
        outcome
    }

    /// One combined estimate over several photos of the same space.
    pub async fn analyze_batch(
        &self,
        images: &[BatchImage],
        inputs: &ProjectInputs,
    ) -> GenerationResult<BatchAnalysis> {
        info!("Analyzing {} project images", images.len());
        let request = prompts::batch_request(images, inputs);
        let result = self
            .race_json::<Quote>(self.config.generation_timeout, &request, "batch analysis")
            .await
            .map(|combined_analysis| {
                let image_insights = images
                    .iter()
                    .enumerate()
                    .map(|(index, image)| ImageInsight {
                        label: image
                            .label
                            .clone()
                            .unwrap_or_else(|| format!("Image {}", index + 1)),
                        insights: format!(
                            "Analyzed as part of comprehensive {} assessment",
                            combined_analysis.project_name
                        ),
                    })
                    .collect();
                BatchAnalysis {
                    combined_analysis,
                    image_insights,
                }
            });
        observe("batch", result)
    }

    pub async fn analyze_narration(
        &self,
        audio: &[u8],
        mime_type: &str,
    ) -> GenerationResult<NarrationAnalysis> {
        info!("Analyzing project walkthrough audio");
        let request = prompts::narration_request(Bytes::copy_from_slice(audio), mime_type);
        let result = self
            .race_json(self.config.narration_timeout, &request, "narration")
            .await;
        observe("narration", result)
    }

    pub async fn describe_quote(
        &self,
        quote: &Quote,
        prompt: &str,
        style: &str,
    ) -> GenerationResult<String> {
        let request = prompts::description_request(quote, prompt, style);
        let result = self
            .race(self.config.generation_timeout, &request)
            .await
            .and_then(|response| require_text(response.text, "description"));
        observe("description", result)
    }

    pub async fn visualize(
        &self,
        prompt: &str,
        style: &str,
        size: ImageSize,
    ) -> GenerationResult<InlineData> {
        info!("Generating {} visualization", size.as_str());
        let request = prompts::visualization_request(prompt, style, size);
        let result = self.generate_image(&request).await;
        observe("visualization", result)
    }

    pub async fn edit_visualization(
        &self,
        image: &[u8],
        edit_prompt: &str,
    ) -> GenerationResult<InlineData> {
        let request = prompts::edit_request(Bytes::copy_from_slice(image), edit_prompt);
        let result = self.generate_image(&request).await;
        observe("edit", result)
    }

    fn cached(&self, key: &str) -> Option<Arc<Quote>> {
        let quote = self.cache.get(key)?;
        self.stats.record_cache_hit();
        CACHE_HITS.inc();
        debug!(key, "Cache HIT - returning cached analysis");
        Some(quote)
    }

    async fn join_inflight(
        &self,
        mut receiver: broadcast::Receiver<SharedOutcome>,
    ) -> Option<SharedOutcome> {
        debug!("Joining identical in-flight analysis");
        receiver.recv().await.ok()
    }

    async fn call_analysis(
        &self,
        media: &[u8],
        mime_type: &str,
        inputs: &ProjectInputs,
    ) -> SharedOutcome {
        info!(
            style = %inputs.style,
            media_kb = media.len() / 1024,
            "Cache MISS - starting quote analysis"
        );
        let request = prompts::analysis_request(Bytes::copy_from_slice(media), mime_type, inputs);
        let quote: Quote = self
            .race_json(self.config.analysis_timeout, &request, "quote")
            .await?;
        Ok(Arc::new(quote))
    }

    async fn generate_image(&self, request: &ContentRequest) -> GenerationResult<InlineData> {
        let response = self.race(self.config.generation_timeout, request).await?;
        response
            .inline_data
            .ok_or_else(|| GenerationError::empty_response("no image data in model response"))
    }

    async fn race_json<T: DeserializeOwned>(
        &self,
        deadline: Duration,
        request: &ContentRequest,
        what: &str,
    ) -> GenerationResult<T> {
        let response = self.race(deadline, request).await?;
        parse_json(response.text, what)
    }

    // Whichever settles first wins; on timeout the model future is dropped,
    // so a late answer cannot reach the cache or the caller.
    async fn race(
        &self,
        deadline: Duration,
        request: &ContentRequest,
    ) -> GenerationResult<ContentResponse> {
        match timeout(deadline, self.model.generate_content(request)).await {
            Ok(result) => result.map_err(GenerationError::from),
            Err(_) => Err(GenerationError::timeout(deadline)),
        }
    }
}

fn require_text(text: Option<String>, what: &str) -> GenerationResult<String> {
    text.filter(|t| !t.trim().is_empty())
        .ok_or_else(|| GenerationError::empty_response(format!("no {} text in model response", what)))
}

fn parse_json<T: DeserializeOwned>(text: Option<String>, what: &str) -> GenerationResult<T> {
    let text = require_text(text, what)?;
    serde_json::from_str(&text).map_err(|e| {
        GenerationError::invalid_response(format!("failed to parse {} data: {}", what, e))
    })
}

fn record_failure(operation: &str, err: &GenerationError) {
    GENERATION_ERRORS.with_label_values(&[err.kind.as_str()]).inc();
    warn!(operation, kind = %err.kind, "Generation failed: {}", err.detail);
}

fn observe<T>(operation: &str, result: GenerationResult<T>) -> GenerationResult<T> {
    if let Err(err) = &result {
        record_failure(operation, err);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_text_is_empty_response() {
        let err = require_text(Some("  ".to_string()), "quote").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::EmptyResponse);
        let err = require_text(None, "quote").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::EmptyResponse);
    }

    #[test]
    fn bad_json_is_invalid_response() {
        let err = parse_json::<Quote>(Some("{not json".to_string()), "quote").unwrap_err();
        assert_eq!(err.kind, crate::error::ErrorKind::InvalidResponse);
        assert!(err.detail.starts_with("failed to parse quote data"));
    }

    #[test]
    fn default_deadlines() {
        let config = GatewayConfig::default();
        assert_eq!(config.analysis_timeout, Duration::from_secs(30));
        assert_eq!(config.cache_ttl, Duration::from_secs(300));
        assert!(config.cache_max_entries.is_none());
    }
}
