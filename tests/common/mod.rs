//! Common test utilities and helpers

#![allow(dead_code)]

use async_trait::async_trait;
use datagrowth::organism::{Collective, Individual, OrganismPool};
use datagrowth::processor::{ProcessorContext, TaskFuture, TokioTaskBackend};
use datagrowth::resource::{Fetcher, RawResponse, ResourceKind};
use datagrowth::{
    Arguments, ContributeType, EntityKind, EntityRef, Error, ErrorRecord, ErrorStore, Growth,
    GrowthConfig, GrowthEngine, GrowthId, GrowthState, GrowthStore, Kwargs, MemoryStore,
    Operation, Organism, Outcome, ProcessId, Processor, ProcessorRegistry, ReferenceTable,
    RequestDescriptor, ResourceClient, ResourceRegistry, Result, TaskBackend, TaskHandle,
};
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Answers JSON bodies for URLs containing a fragment and counts calls
#[derive(Default)]
pub struct StubFetcher {
    routes: Vec<(String, u16, String)>,
    calls: AtomicUsize,
    seen: Mutex<Vec<String>>,
}

impl StubFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, fragment: &str, status: u16, body: &str) -> Self {
        self.routes
            .push((fragment.to_string(), status, body.to_string()));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn seen(&self) -> Vec<String> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, request: &RequestDescriptor) -> Result<RawResponse> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(request.url.clone());
        let (status, body) = self
            .routes
            .iter()
            .find(|(fragment, _, _)| request.url.contains(fragment.as_str()))
            .map(|(_, status, body)| (*status, body.clone()))
            .unwrap_or((404, r#"{"error": "not found"}"#.to_string()));
        let mut head = BTreeMap::new();
        head.insert("content-type".to_string(), "application/json".to_string());
        Ok(RawResponse { status, head, body })
    }
}

/// Collective that counts how often it is updated
pub struct CountingCollective {
    inner: Collective,
    updates: AtomicUsize,
}

impl CountingCollective {
    pub fn new(id: u64, members: Vec<Value>) -> Self {
        Self {
            inner: Collective::new(id, members),
            updates: AtomicUsize::new(0),
        }
    }

    pub fn updates(&self) -> usize {
        self.updates.load(Ordering::SeqCst)
    }

    pub async fn members(&self) -> Vec<Value> {
        self.inner.members().await
    }
}

#[async_trait]
impl Organism for CountingCollective {
    fn entity(&self) -> EntityRef {
        self.inner.entity()
    }

    async fn output(&self, args: &[Value], kwargs: &Kwargs) -> Result<Arguments> {
        self.inner.output(args, kwargs).await
    }

    async fn update(&self, records: Vec<Value>) -> Result<()> {
        self.updates.fetch_add(1, Ordering::SeqCst);
        self.inner.update(records).await
    }
}

/// Processor whose tasks always fail
pub struct FailingProcessor {
    tasks: Arc<dyn TaskBackend>,
}

impl FailingProcessor {
    pub const NAME: &'static str = "FailingProcessor";

    pub fn construct(context: ProcessorContext) -> Result<Arc<dyn Processor>> {
        Ok(Arc::new(Self {
            tasks: context.tasks,
        }))
    }
}

#[async_trait]
impl Processor for FailingProcessor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn supports(&self, operation: Operation) -> bool {
        operation == Operation::FetchMany
    }

    async fn submit(&self, _operation: Operation, _arguments: Arguments) -> Result<TaskHandle> {
        let task: TaskFuture =
            Box::pin(async { Err::<Outcome, _>(Error::network("upstream went away")) });
        self.tasks.submit(task).await
    }

    async fn collect(&self, handle: &TaskHandle) -> Result<Outcome> {
        self.tasks.collect(handle).await
    }
}

/// Error store whose first `failures` retain calls fail
pub struct FlakyErrors {
    inner: Arc<MemoryStore>,
    failures: AtomicUsize,
}

impl FlakyErrors {
    pub fn new(inner: Arc<MemoryStore>, failures: usize) -> Self {
        Self {
            inner,
            failures: AtomicUsize::new(failures),
        }
    }
}

#[async_trait]
impl ErrorStore for FlakyErrors {
    async fn retain(&self, record: ErrorRecord, growth: GrowthId) -> Result<()> {
        if self
            .failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(Error::storage("db hiccup"));
        }
        self.inner.retain(record, growth).await
    }

    async fn retained(&self, growth: GrowthId) -> Result<Vec<ErrorRecord>> {
        self.inner.retained(growth).await
    }
}

/// Growth store failing exactly its n-th save, counting from 1
pub struct FlakyGrowths {
    inner: Arc<MemoryStore>,
    saves: AtomicUsize,
    fail_at: usize,
}

impl FlakyGrowths {
    pub fn new(inner: Arc<MemoryStore>, fail_at: usize) -> Self {
        Self {
            inner,
            saves: AtomicUsize::new(0),
            fail_at,
        }
    }
}

#[async_trait]
impl GrowthStore for FlakyGrowths {
    async fn save(&self, growth: &Growth) -> Result<()> {
        if self.saves.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_at {
            return Err(Error::storage("db hiccup"));
        }
        self.inner.save(growth).await
    }

    async fn load(&self, id: GrowthId) -> Result<Option<Growth>> {
        self.inner.load(id).await
    }

    async fn list_by_state(&self, state: GrowthState) -> Result<Vec<Growth>> {
        self.inner.list_by_state(state).await
    }
}

pub const INPUT: u64 = 1;
pub const OUTPUT: u64 = 2;
pub const SOURCE: u64 = 3;
pub const TARGET: u64 = 4;

/// Engine wired to in-memory stores, organisms and a stub fetcher
pub struct Fixture {
    pub store: Arc<MemoryStore>,
    pub fetcher: Arc<StubFetcher>,
    pub tasks: Arc<TokioTaskBackend>,
    pub input: Arc<CountingCollective>,
    pub output: Arc<CountingCollective>,
    pub source: Arc<Individual>,
    pub target: Arc<Individual>,
    pub engine: Arc<GrowthEngine>,
}

impl Fixture {
    /// Input members `{"id": <id>}` for each id, an empty output collective.
    ///
    /// The source individual holds the first id, the target individual is empty.
    pub async fn new(ids: &[&str], fetcher: StubFetcher) -> Self {
        let store = Arc::new(MemoryStore::new());
        Self::with_stores(ids, fetcher, store.clone(), store.clone(), store).await
    }

    pub async fn with_stores(
        ids: &[&str],
        fetcher: StubFetcher,
        growths: Arc<dyn GrowthStore>,
        errors: Arc<dyn ErrorStore>,
        store: Arc<MemoryStore>,
    ) -> Self {
        let fetcher = Arc::new(fetcher);
        let tasks = Arc::new(TokioTaskBackend::new());

        let input = Arc::new(CountingCollective::new(
            INPUT,
            ids.iter().map(|id| json!({ "id": id })).collect(),
        ));
        let output = Arc::new(CountingCollective::new(OUTPUT, vec![]));
        let collectives = Arc::new(OrganismPool::new());
        collectives.insert(input.clone()).await;
        collectives.insert(output.clone()).await;

        let first = ids.first().copied().unwrap_or_default();
        let source = Arc::new(Individual::new(SOURCE, json!({ "id": first })));
        let target = Arc::new(Individual::new(TARGET, json!({})));
        let individuals = Arc::new(OrganismPool::new());
        individuals.insert(source.clone()).await;
        individuals.insert(target.clone()).await;

        let references = ReferenceTable::new()
            .register(EntityKind::Collective, collectives)
            .register(EntityKind::Individual, individuals);

        let kind = ResourceKind::builder("items", "https://api.example.org/items/{}").build();
        let client = ResourceClient::new(Arc::new(kind), store.clone(), fetcher.clone());

        let engine = GrowthEngine::new(growths, errors, references)
            .with_processors(
                ProcessorRegistry::with_builtins()
                    .register(FailingProcessor::NAME, FailingProcessor::construct),
            )
            .with_resources(ResourceRegistry::new().register(client))
            .with_tasks(tasks.clone());

        Self {
            store,
            fetcher,
            tasks,
            input,
            output,
            source,
            target,
            engine: Arc::new(engine),
        }
    }

    /// Fetch every input member and extract its `name` into the output
    pub fn growth(&self, id: u64) -> Growth {
        Growth::new(
            id,
            EntityRef::community(1),
            Some(EntityRef::collective(INPUT)),
            EntityRef::collective(OUTPUT),
            ProcessId::new("HttpResourceProcessor", Operation::FetchMany),
            ProcessId::new("ExtractProcessor", Operation::ExtractFromResource),
            ContributeType::Append,
        )
        .with_phase("items")
        .with_config(
            GrowthConfig::new()
                .with_args(vec![json!("$.id")])
                .with_resource("items")
                .with_option("objective", json!({"@": "$", "name": "$.name"})),
        )
    }

    /// Fetch the source individual and merge its `name` into the target
    pub fn individual_growth(&self, id: u64) -> Growth {
        let growth = self.growth(id);
        let config = growth.config.clone();
        Growth::new(
            id,
            EntityRef::community(1),
            Some(EntityRef::individual(SOURCE)),
            EntityRef::individual(TARGET),
            ProcessId::new("HttpResourceProcessor", Operation::FetchOne),
            growth.contribute,
            ContributeType::Append,
        )
        .with_config(config)
    }

    /// Fetch the item named in the configuration, without an input organism
    pub fn configured_growth(&self, id: u64, item: &str) -> Growth {
        let growth = self.growth(id);
        let config = growth.config.clone().with_args(vec![json!(item)]);
        Growth::new(
            id,
            EntityRef::community(1),
            None,
            EntityRef::collective(OUTPUT),
            ProcessId::new("HttpResourceProcessor", Operation::FetchOne),
            growth.contribute,
            ContributeType::Append,
        )
        .with_config(config)
    }

    pub fn failing_growth(&self, id: u64) -> Growth {
        let mut growth = self.growth(id);
        growth.process = ProcessId::new(FailingProcessor::NAME, Operation::FetchMany);
        growth
    }
}

/// Stub answering `{"name": <id>}` for each id
pub fn named_items(ids: &[&str]) -> StubFetcher {
    ids.iter().fold(StubFetcher::new(), |fetcher, id| {
        fetcher.route(&format!("/items/{}", id), 200, &json!({ "name": id }).to_string())
    })
}
