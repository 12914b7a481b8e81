//! Remote entity store client
//!
//! Pagination, cached fetch and search, create and relation linking against
//! one AWX / Tower instance. Every call is awaited in sequence; nothing here
//! retries.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, Stream, TryStreamExt};
use serde_json::{Map, Value};

use super::cache::{CacheKey, RunCache, StoreId};
use super::query::{append_query, build_filter_query, join_url, normalize_root};
use super::transport::{HttpResponse, HttpTransport, Transport};
use crate::config::{Config, StoreConfig};
use crate::error::PortError;
use crate::transfer::{EntityType, RawEntity};

/// Status a list, get or search must answer with
const GET_SUCCESS: u16 = 200;
const CREATE_SUCCESS: u16 = 201;
const LINK_SUCCESS: u16 = 204;

/// Result of a create request
#[derive(Debug, Clone, PartialEq)]
pub enum CreateOutcome {
    Created(RawEntity),
    /// Dry-run mode: the payload was logged, nothing was sent
    DryRun,
    /// The store answered with something other than 201
    Rejected(HttpResponse),
}

pub struct StoreClient {
    id: StoreId,
    root: String,
    endpoints: BTreeMap<EntityType, String>,
    page_size: usize,
    dry_run: bool,
    transport: Arc<dyn Transport>,
    cache: Arc<RunCache>,
}

impl StoreClient {
    pub fn new(
        root: &str,
        endpoints: BTreeMap<EntityType, String>,
        page_size: usize,
        transport: Arc<dyn Transport>,
        cache: Arc<RunCache>,
    ) -> Self {
        let root = normalize_root(root);
        Self {
            id: StoreId::new(root.clone()),
            root,
            endpoints,
            page_size: page_size.max(1),
            dry_run: false,
            transport,
            cache,
        }
    }

    /// Build a client talking HTTP to the configured store
    pub fn connect(
        store: &StoreConfig,
        config: &Config,
        cache: Arc<RunCache>,
    ) -> Result<Self, PortError> {
        let transport = HttpTransport::new(
            store,
            &config.headers,
            config.timeout_secs.map(Duration::from_secs),
        )?;
        Ok(Self::new(
            &store.url,
            config.endpoints()?,
            config.page_size,
            Arc::new(transport),
            cache,
        ))
    }

    pub fn with_dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    pub fn id(&self) -> &StoreId {
        &self.id
    }

    /// Absolute URL of a type's collection endpoint
    pub fn collection_url(&self, kind: EntityType) -> String {
        let path = self
            .endpoints
            .get(&kind)
            .map(String::as_str)
            .unwrap_or_else(|| kind.default_base_url());
        join_url(&self.root, path)
    }

    /// Absolute URL for a store-relative locator
    pub fn url(&self, locator: &str) -> String {
        join_url(&self.root, locator)
    }

    fn list_url(&self, kind: EntityType, query: Option<&str>) -> String {
        let base = format!("{}?page_size={}", self.collection_url(kind), self.page_size);
        append_query(&base, query.unwrap_or_default())
    }

    /// GET a URL that must answer 200
    async fn fetch(&self, url: &str) -> Result<Value, PortError> {
        let response = self.transport.get_json(url).await?;
        if response.status != GET_SUCCESS {
            return Err(PortError::transport(url, Some(response.status), response.summary()));
        }
        Ok(response.body)
    }

    /// Lazily page through a type's listing endpoint
    ///
    /// Entities come out in server order. The next page is only requested
    /// once the consumer has drained the current one, so a consumer that
    /// stops early never fetches pages it does not need.
    pub fn list(
        &self,
        kind: EntityType,
        query: Option<&str>,
    ) -> impl Stream<Item = Result<RawEntity, PortError>> + '_ {
        let first = self.list_url(kind, query);

        stream::try_unfold(Some(first), move |next| async move {
            let Some(url) = next else {
                return Ok(None);
            };
            log::info!("Listing {} entities from {}", kind, url);

            let page = self.fetch(&url).await?;
            let (entities, next) = parse_page(&url, page)?;
            Ok(Some((entities, next.map(|n| self.url(&n)))))
        })
        .map_ok(|entities| stream::iter(entities.into_iter().map(Ok::<_, PortError>)))
        .try_flatten()
    }

    /// Fetch one entity or relation page by locator, following `next`
    /// cursors and concatenating `results`
    pub async fn get(&self, locator: &str) -> Result<Value, PortError> {
        let url = self.url(locator);
        let key = CacheKey::get(&self.id, &url);

        if let Some(cached) = self.cache.get(&key) {
            log::debug!("Getting cached {}", url);
            return Ok(cached);
        }

        log::info!("Getting {}", url);
        let mut value = self.fetch(&url).await?;
        let mut next = next_cursor(&value);

        while let Some(cursor) = next {
            let page_url = self.url(&cursor);
            log::info!("Getting next page {}", page_url);
            let mut page = self.fetch(&page_url).await?;
            next = next_cursor(&page);

            let more = match page.get_mut("results") {
                Some(Value::Array(items)) => std::mem::take(items),
                _ => Vec::new(),
            };
            if let Some(Value::Array(all)) = value.get_mut("results") {
                all.extend(more);
            }
        }

        if let Some(obj) = value.as_object_mut() {
            if obj.contains_key("next") {
                obj.insert("next".to_string(), Value::Null);
            }
        }

        self.cache.insert(key, value.clone());
        Ok(value)
    }

    /// Fetch a paginated relation and return its entities
    pub async fn get_results(&self, locator: &str) -> Result<Vec<RawEntity>, PortError> {
        let url = self.url(locator);
        let value = self.get(locator).await?;
        let (entities, _) = parse_page(&url, value)?;
        Ok(entities)
    }

    /// Equality search over a type, first page only
    pub async fn search(
        &self,
        kind: EntityType,
        filters: &Map<String, Value>,
    ) -> Result<Vec<RawEntity>, PortError> {
        let query = build_filter_query(filters);
        let key = CacheKey::search(&self.id, kind, query.clone());
        let url = append_query(&self.collection_url(kind), &query);

        let value = match self.cache.get(&key) {
            Some(cached) => {
                log::debug!("Searching cached {} with {}", kind, url);
                cached
            }
            None => {
                log::info!("Searching {} with {}", kind, url);
                let value = self.fetch(&url).await?;
                self.cache.insert(key, value.clone());
                value
            }
        };

        let (entities, _) = parse_page(&url, value)?;
        Ok(entities)
    }

    /// Search by name alone (optionally narrowed by extra filters)
    pub async fn find_by_name(
        &self,
        kind: EntityType,
        name: &str,
        scope: &[(&str, Value)],
    ) -> Result<Option<RawEntity>, PortError> {
        let mut filters = Map::new();
        filters.insert("name".to_string(), Value::String(name.to_string()));
        for (field, value) in scope {
            filters.insert(field.to_string(), value.clone());
        }
        Ok(self.search(kind, &filters).await?.into_iter().next())
    }

    pub async fn create(
        &self,
        kind: EntityType,
        payload: &Map<String, Value>,
    ) -> Result<CreateOutcome, PortError> {
        let url = self.collection_url(kind);
        let body = Value::Object(payload.clone());
        let name = payload.get("name").and_then(Value::as_str).unwrap_or("<unnamed>");

        log::info!("Creating {} '{}' at {}", kind, name, url);
        if self.dry_run {
            log::info!("Dry-run: POST {} -- {}", url, body);
            return Ok(CreateOutcome::DryRun);
        }

        let response = self.transport.post_json(&url, &body).await?;
        if response.status != CREATE_SUCCESS {
            log::error!(
                "Creating {} '{}' was rejected with HTTP {}: {}",
                kind,
                name,
                response.status,
                response.summary()
            );
            return Ok(CreateOutcome::Rejected(response));
        }

        self.cache.invalidate_searches(&self.id, kind);
        RawEntity::from_value(response.body)
            .map(CreateOutcome::Created)
            .ok_or_else(|| PortError::transport(&url, Some(CREATE_SUCCESS), "create returned a non-object body"))
    }

    /// Associate an existing child with a parent's relation endpoint
    pub async fn link(&self, relation_locator: &str, child_id: i64) -> Result<(), PortError> {
        let url = self.url(relation_locator);
        let body = serde_json::json!({ "id": child_id });

        log::info!("Linking #{} to {}", child_id, url);
        if self.dry_run {
            log::info!("Dry-run: POST {} -- {}", url, body);
            return Ok(());
        }

        let response = self.transport.post_json(&url, &body).await?;
        if response.status != LINK_SUCCESS {
            return Err(PortError::transport(&url, Some(response.status), response.summary()));
        }
        // the relation listing changed
        self.cache.invalidate(&CacheKey::get(&self.id, &url));
        Ok(())
    }

    /// POST a document to a relation endpoint (survey specs, approval templates)
    pub async fn attach(
        &self,
        relation_locator: &str,
        body: &Value,
    ) -> Result<Option<Value>, PortError> {
        let url = self.url(relation_locator);

        log::info!("Posting to {}", url);
        if self.dry_run {
            log::info!("Dry-run: POST {} -- {}", url, body);
            return Ok(None);
        }

        let response = self.transport.post_json(&url, body).await?;
        if !response.is_success() {
            return Err(PortError::transport(&url, Some(response.status), response.summary()));
        }
        Ok(Some(response.body))
    }
}

fn next_cursor(page: &Value) -> Option<String> {
    page.get("next").and_then(Value::as_str).map(str::to_string)
}

/// Split a list page into entities and the next-page cursor
fn parse_page(url: &str, page: Value) -> Result<(Vec<RawEntity>, Option<String>), PortError> {
    let next = next_cursor(&page);
    let Value::Object(mut obj) = page else {
        return Err(PortError::transport(url, Some(GET_SUCCESS), "expected a JSON object page"));
    };
    let Some(Value::Array(results)) = obj.remove("results") else {
        return Err(PortError::transport(url, Some(GET_SUCCESS), "page has no 'results' list"));
    };

    let entities = results
        .into_iter()
        .map(|item| {
            RawEntity::from_value(item)
                .ok_or_else(|| PortError::transport(url, Some(GET_SUCCESS), "result is not an object"))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok((entities, next))
}
