//! Fetch processor running resource requests as background tasks

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use futures::FutureExt;
use std::sync::Arc;
use tracing::{debug, info};

use super::registry::ProcessorContext;
use super::task::{TaskBackend, TaskHandle};
use super::{unsupported, ErrorRecord, Operation, Outcome, Processor};
use crate::error::{Error, Result};
use crate::organism::Arguments;
use crate::resource::{HttpMethod, RequestDescriptor, ResourceClient};

/// Fetches one request or a batch of requests through a resource client.
///
/// Each fetched page is one success item, serialized as the stored resource.
/// Transport failures of single requests become error records.
pub struct HttpFetchProcessor {
    client: Arc<ResourceClient>,
    tasks: Arc<dyn TaskBackend>,
    method: HttpMethod,
    continuation_limit: usize,
    concurrency: usize,
}

impl HttpFetchProcessor {
    pub const NAME: &'static str = "HttpResourceProcessor";

    pub fn new(context: ProcessorContext) -> Result<Self> {
        let client = context.resources.get(context.config.resource_name()?)?;
        let method = match context.config.get_str("method") {
            Some(method) => method.parse()?,
            None => HttpMethod::Get,
        };
        let continuation_limit = context.config.get_u64("continuation_limit").unwrap_or(1).max(1);
        let concurrency = context
            .config
            .get_u64("concurrency")
            .map_or(context.concurrency, |c| c as usize)
            .max(1);

        Ok(Self {
            client,
            tasks: context.tasks,
            method,
            continuation_limit: continuation_limit as usize,
            concurrency,
        })
    }

    pub fn construct(context: ProcessorContext) -> Result<Arc<dyn Processor>> {
        Ok(Arc::new(Self::new(context)?))
    }

    fn requests(&self, operation: Operation, arguments: Arguments) -> Result<Vec<RequestDescriptor>> {
        if operation == Operation::FetchOne && !matches!(arguments, Arguments::Single { .. }) {
            return Err(Error::validation(format!(
                "'{}' expects the arguments of a single entity",
                operation
            )));
        }
        arguments
            .into_pairs()
            .into_iter()
            .map(|(args, kwargs)| self.client.kind().create_request(self.method, &args, &kwargs))
            .collect()
    }
}

/// Run a request and its continuation pages.
///
/// A failing page ends the sequence and is recorded.
async fn fetch_pages(
    client: Arc<ResourceClient>,
    operation: Operation,
    request: RequestDescriptor,
    limit: usize,
) -> Outcome {
    let mut outcome = Outcome::default();
    let mut next = Some(request);

    while let Some(request) = next.take() {
        if outcome.successes.len() >= limit {
            break;
        }
        let page = async {
            let resource = client.run(request.clone()).await?;
            let following = client.create_next_request(&resource)?;
            Ok::<_, Error>((serde_json::to_value(&resource)?, following))
        };
        match page.await {
            Ok((resource, following)) => {
                outcome.successes.push(resource);
                next = following;
            }
            Err(e) => {
                debug!(url = %request.url, "Recording fetch failure: {}", e);
                let mut record = ErrorRecord::from_error(operation, &e);
                if record.payload.is_null() {
                    record.payload = serde_json::to_value(&request).unwrap_or_default();
                }
                outcome.errors.push(record);
            }
        }
    }
    outcome
}

#[async_trait]
impl Processor for HttpFetchProcessor {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn supports(&self, operation: Operation) -> bool {
        matches!(operation, Operation::FetchOne | Operation::FetchMany)
    }

    async fn submit(&self, operation: Operation, arguments: Arguments) -> Result<TaskHandle> {
        if !self.supports(operation) {
            return Err(unsupported(Self::NAME, operation));
        }
        let requests = self.requests(operation, arguments)?;
        info!(
            resource = self.client.name(),
            requests = requests.len(),
            "Submitting {}",
            operation
        );

        let client = Arc::clone(&self.client);
        let limit = self.continuation_limit;
        let concurrency = self.concurrency;
        let task = async move {
            let pages: Vec<Outcome> = stream::iter(requests)
                .map(|request| fetch_pages(Arc::clone(&client), operation, request, limit))
                .buffered(concurrency)
                .collect()
                .await;

            let mut outcome = Outcome::default();
            for page in pages {
                outcome.extend(page);
            }
            Ok::<_, Error>(outcome)
        };

        self.tasks.submit(task.boxed()).await
    }

    async fn collect(&self, handle: &TaskHandle) -> Result<Outcome> {
        self.tasks.collect(handle).await
    }
}

impl std::fmt::Debug for HttpFetchProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpFetchProcessor")
            .field("resource", &self.client.name())
            .field("method", &self.method)
            .field("continuation_limit", &self.continuation_limit)
            .field("concurrency", &self.concurrency)
            .finish()
    }
}
