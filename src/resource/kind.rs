//! Resource kinds: request building composed from strategies

use serde_json::Value;
use std::fmt;
use std::sync::Arc;

use super::canonical::{hash_from_data, uri_from_url, CacheKey};
use super::request::{fill_template, set_query_params, HttpMethod, Params, RequestDescriptor};
use super::schema::InputSchema;
use super::strategy::{
    AuthStrategy, ErrorInterpreter, NoAuth, NoPagination, PaginationStrategy, StatusErrors,
};
use super::Resource;
use crate::error::Result;
use crate::organism::Kwargs;

/// Immutable description of one external source
pub struct ResourceKind {
    name: String,
    uri_template: String,
    parameters: Params,
    headers: Params,
    get_schema: InputSchema,
    post_schema: InputSchema,
    auth: Arc<dyn AuthStrategy>,
    pagination: Arc<dyn PaginationStrategy>,
    errors: Arc<dyn ErrorInterpreter>,
}

impl fmt::Debug for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ResourceKind")
            .field("name", &self.name)
            .field("uri_template", &self.uri_template)
            .field("parameters", &self.parameters)
            .finish_non_exhaustive()
    }
}

impl ResourceKind {
    pub fn builder(name: impl Into<String>, uri_template: impl Into<String>) -> ResourceKindBuilder {
        ResourceKindBuilder {
            kind: ResourceKind {
                name: name.into(),
                uri_template: uri_template.into(),
                parameters: Params::new(),
                headers: Params::new(),
                get_schema: InputSchema::default(),
                post_schema: InputSchema::default(),
                auth: Arc::new(NoAuth),
                pagination: Arc::new(NoPagination),
                errors: Arc::new(StatusErrors),
            },
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn schema(&self, method: HttpMethod) -> &InputSchema {
        match method {
            HttpMethod::Get => &self.get_schema,
            HttpMethod::Post => &self.post_schema,
        }
    }

    /// Validate caller arguments against the schema of a method
    pub fn validate_input(&self, method: HttpMethod, args: &[Value], kwargs: &Kwargs) -> Result<()> {
        self.schema(method).validate(args, kwargs)
    }

    /// Build a request from caller arguments.
    ///
    /// Positional arguments fill the URI template, keyword arguments become the
    /// request data.
    pub fn create_request(
        &self,
        method: HttpMethod,
        args: &[Value],
        kwargs: &Kwargs,
    ) -> Result<RequestDescriptor> {
        self.validate_input(method, args, kwargs)?;
        let url = fill_template(&self.uri_template, args)?;
        let url = set_query_params(&url, &self.parameters)?;

        let request = RequestDescriptor {
            method,
            url,
            headers: self.headers.clone(),
            args: args.to_vec(),
            kwargs: kwargs.clone(),
            data: (!kwargs.is_empty()).then(|| Value::Object(kwargs.clone())),
        };
        self.validate_request(&request, false)?;
        Ok(request)
    }

    /// Check a request built elsewhere, optionally re-validating its arguments
    pub fn validate_request(&self, request: &RequestDescriptor, validate_input: bool) -> Result<()> {
        uri_from_url(&request.url)?;
        if validate_input {
            self.validate_input(request.method, &request.args, &request.kwargs)?;
        }
        Ok(())
    }

    /// The request used for the network call
    pub fn request_with_auth(&self, request: &RequestDescriptor) -> Result<RequestDescriptor> {
        request.with_query_params(&self.auth.auth_parameters())
    }

    /// The request used for cache keys and storage
    pub fn request_without_auth(&self, request: &RequestDescriptor) -> Result<RequestDescriptor> {
        let auth = self.auth.auth_parameters();
        request.without_query_params(auth.keys().map(String::as_str))
    }

    pub fn cache_key(&self, request: &RequestDescriptor) -> Result<CacheKey> {
        let request = self.request_without_auth(request)?;
        Ok(CacheKey::new(
            uri_from_url(&request.url)?,
            hash_from_data(request.data.as_ref()),
        ))
    }

    /// Request for the page after `resource`, or `None` when pagination ends
    pub fn create_next_request(&self, resource: &Resource) -> Result<Option<RequestDescriptor>> {
        match self.pagination.next_parameters(resource)? {
            Some(params) if !params.is_empty() => {
                Ok(Some(resource.request.with_query_params(&params)?))
            }
            _ => Ok(None),
        }
    }

    /// Raise a typed failure for unsuccessful responses
    pub fn interpret(&self, resource: &Resource) -> Result<()> {
        self.errors.interpret(resource)
    }
}

/// Assembles a [`ResourceKind`] from strategies
pub struct ResourceKindBuilder {
    kind: ResourceKind,
}

impl ResourceKindBuilder {
    pub fn parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.kind.parameters.insert(key.into(), value.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.kind.headers.insert(key.into(), value.into());
        self
    }

    pub fn get_schema(mut self, schema: InputSchema) -> Self {
        self.kind.get_schema = schema;
        self
    }

    pub fn post_schema(mut self, schema: InputSchema) -> Self {
        self.kind.post_schema = schema;
        self
    }

    pub fn auth(mut self, auth: impl AuthStrategy + 'static) -> Self {
        self.kind.auth = Arc::new(auth);
        self
    }

    pub fn pagination(mut self, pagination: impl PaginationStrategy + 'static) -> Self {
        self.kind.pagination = Arc::new(pagination);
        self
    }

    pub fn errors(mut self, errors: impl ErrorInterpreter + 'static) -> Self {
        self.kind.errors = Arc::new(errors);
        self
    }

    pub fn build(self) -> ResourceKind {
        self.kind
    }
}
