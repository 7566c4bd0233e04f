//! Scripted collaborator fakes and configuration presets

use async_trait::async_trait;
use chrono::NaiveDate;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::time::Duration;

use sceneforge::core::types::JobState;
use sceneforge::storage::MemoryStore;
use sceneforge::{
    BatchItem, BatchRequest, Config, CostRecord, ForgeError, GeneratedImage, GenerationError,
    ImageGenerator, ObjectStore, Orchestrator, ReferenceResolver, Result, StatusSink,
    SubmissionMode,
};

/// How the scripted generator reacts to a given prompt
#[derive(Debug, Clone)]
pub enum GenBehavior {
    /// Always succeed
    Succeed,
    /// Always fail with a fatal (non-retryable) error
    FailFatal,
    /// Always fail with a retryable upstream error
    FailRetryable,
    /// Fail with retryable errors `failures` times, then succeed
    Flaky {
        /// Failures before the first success
        failures: u32,
    },
}

/// Generator fake with per-prompt scripted behavior and call accounting
pub struct ScriptedGenerator {
    behaviors: HashMap<String, GenBehavior>,
    calls: Mutex<HashMap<String, u32>>,
    seen_references: Mutex<Vec<Vec<String>>>,
    total_calls: AtomicU32,
    delay: Duration,
}

impl ScriptedGenerator {
    /// A generator where every prompt succeeds immediately
    pub fn succeeding() -> Self {
        Self {
            behaviors: HashMap::new(),
            calls: Mutex::new(HashMap::new()),
            seen_references: Mutex::new(Vec::new()),
            total_calls: AtomicU32::new(0),
            delay: Duration::ZERO,
        }
    }

    /// Script the behavior for one prompt
    pub fn behavior(mut self, prompt: &str, behavior: GenBehavior) -> Self {
        self.behaviors.insert(prompt.to_string(), behavior);
        self
    }

    /// Sleep this long inside every call, to widen observation windows
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Total generate calls across all prompts
    pub fn total_calls(&self) -> u32 {
        self.total_calls.load(Ordering::SeqCst)
    }

    /// Generate calls for one prompt
    pub fn calls_for(&self, prompt: &str) -> u32 {
        *self.calls.lock().get(prompt).unwrap_or(&0)
    }

    /// Reference URL sets observed by each call, in call order
    pub fn seen_references(&self) -> Vec<Vec<String>> {
        self.seen_references.lock().clone()
    }
}

#[async_trait]
impl ImageGenerator for ScriptedGenerator {
    async fn generate(
        &self,
        prompt: &str,
        reference_urls: &[String],
        variant_index: u32,
    ) -> std::result::Result<GeneratedImage, GenerationError> {
        self.total_calls.fetch_add(1, Ordering::SeqCst);
        let call_number = {
            let mut calls = self.calls.lock();
            let counter = calls.entry(prompt.to_string()).or_insert(0);
            *counter += 1;
            *counter
        };
        self.seen_references.lock().push(reference_urls.to_vec());

        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        match self.behaviors.get(prompt) {
            None | Some(GenBehavior::Succeed) => Ok(success_image(prompt, variant_index)),
            Some(GenBehavior::FailFatal) => Err(GenerationError::InvalidPrompt(
                "scripted fatal failure".to_string(),
            )),
            Some(GenBehavior::FailRetryable) => Err(GenerationError::Upstream {
                status: 503,
                message: "scripted upstream failure".to_string(),
            }),
            Some(GenBehavior::Flaky { failures }) => {
                if call_number <= *failures {
                    Err(GenerationError::Upstream {
                        status: 503,
                        message: "scripted transient failure".to_string(),
                    })
                } else {
                    Ok(success_image(prompt, variant_index))
                }
            }
        }
    }
}

fn success_image(prompt: &str, variant_index: u32) -> GeneratedImage {
    let tag: String = prompt.chars().take(12).collect();
    GeneratedImage {
        image_location: format!("generated/{}/{}.png", tag, variant_index),
        thumbnail_location: format!("generated/{}/{}.thumb.png", tag, variant_index),
    }
}

/// Resolver that always re-derives a fresh URL
pub struct FreshResolver;

#[async_trait]
impl ReferenceResolver for FreshResolver {
    async fn resolve(&self, locator: &str) -> Result<String> {
        Ok(format!("https://signed.example/{}?sig=fresh", locator))
    }
}

/// Resolver that fails for one locator and refreshes the rest
pub struct PickyResolver {
    /// Locator that can no longer be resolved
    pub broken: String,
}

#[async_trait]
impl ReferenceResolver for PickyResolver {
    async fn resolve(&self, locator: &str) -> Result<String> {
        if locator == self.broken {
            Err(ForgeError::not_found("reference object deleted"))
        } else {
            Ok(format!("https://signed.example/{}?sig=fresh", locator))
        }
    }
}

/// Sink that records every update it receives
#[derive(Default)]
pub struct RecordingSink {
    updates: Mutex<Vec<(String, String, HashMap<String, String>)>>,
}

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn updates(&self) -> Vec<(String, String, HashMap<String, String>)> {
        self.updates.lock().clone()
    }
}

#[async_trait]
impl StatusSink for RecordingSink {
    async fn update_row_status(
        &self,
        sheet_id: &str,
        scene_id: &str,
        fields: &HashMap<String, String>,
    ) -> Result<()> {
        self.updates.lock().push((
            sheet_id.to_string(),
            scene_id.to_string(),
            fields.clone(),
        ));
        Ok(())
    }
}

/// Sink whose every update fails
pub struct FailingSink;

#[async_trait]
impl StatusSink for FailingSink {
    async fn update_row_status(
        &self,
        _sheet_id: &str,
        _scene_id: &str,
        _fields: &HashMap<String, String>,
    ) -> Result<()> {
        Err(ForgeError::internal("sheet API is down"))
    }
}

/// Object store wrapper with switchable write failures
pub struct FailingStore {
    inner: MemoryStore,
    fail_puts: AtomicBool,
}

impl FailingStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            fail_puts: AtomicBool::new(false),
        }
    }

    /// Make job-state writes fail (or heal them again)
    pub fn set_fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }
}

impl Default for FailingStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ObjectStore for FailingStore {
    async fn put_job_state(&self, batch_id: &str, state: &JobState) -> Result<()> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(ForgeError::storage("injected put failure"));
        }
        self.inner.put_job_state(batch_id, state).await
    }

    async fn get_job_state(&self, batch_id: &str) -> Result<Option<JobState>> {
        self.inner.get_job_state(batch_id).await
    }

    async fn append_ledger_line(&self, bucket: NaiveDate, record: &CostRecord) -> Result<()> {
        self.inner.append_ledger_line(bucket, record).await
    }
}

/// Config preset: admission wide open, retries fast, refresh disabled
///
/// Individual tests override the knobs they exercise.
pub fn test_config() -> Config {
    let yaml = r#"
rate_limit:
  enabled: false
idempotency:
  ttl_secs: 3600
budget:
  daily_limit: 100.0
  cost_per_image: 0.1
retry:
  max_attempts: 3
  base_delay_ms: 1
  max_delay_ms: 4
  jitter_ms: 0
references:
  staleness_secs: 86400
streaming:
  poll_interval_ms: 10
  heartbeat_interval_ms: 1000
"#;
    Config::from_yaml(yaml).expect("test config must be valid")
}

/// Build an orchestrator over a shared in-memory store
pub fn orchestrator_with(
    config: Config,
    store: Arc<dyn ObjectStore>,
    generator: Arc<ScriptedGenerator>,
) -> Orchestrator {
    Orchestrator::new(
        config,
        store,
        generator,
        Arc::new(FreshResolver),
        Arc::new(sceneforge::NoopSink),
    )
}

/// Build an orchestrator plus the memory store backing it
pub fn orchestrator(
    config: Config,
    generator: Arc<ScriptedGenerator>,
) -> (Orchestrator, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let orchestrator = orchestrator_with(config, store.clone(), generator);
    (orchestrator, store)
}

/// One batch item
pub fn item(scene: &str, prompt: &str, variants: u32) -> BatchItem {
    BatchItem {
        scene_id: scene.to_string(),
        prompt: prompt.to_string(),
        variant_count: variants,
    }
}

/// A live-mode request with no references or sheet
pub fn live_request(user_id: &str, items: Vec<BatchItem>) -> BatchRequest {
    BatchRequest {
        user_id: user_id.to_string(),
        items,
        references: Vec::new(),
        sheet_id: None,
        mode: SubmissionMode::Live,
    }
}
