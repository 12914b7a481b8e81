//! In-memory store double used by unit tests
//!
//! Answers exact-URL GETs from registered pages, equality searches over
//! seeded collections, and creates/links the way the AWX API does: linking
//! a child that is already associated is refused with 400.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use super::cache::RunCache;
use super::client::StoreClient;
use super::transport::{HttpResponse, Transport};
use crate::error::PortError;
use crate::transfer::EntityType;

/// Relation endpoints every created entity advertises
const RELATIONS: &[&str] = &[
    "credentials",
    "survey_spec",
    "workflow_nodes",
    "groups",
    "hosts",
    "always_nodes",
    "success_nodes",
    "failure_nodes",
    "create_approval_template",
];

/// Relations that list what was associated through `{id}` posts
const LINKED: &[&str] = &[
    "credentials",
    "groups",
    "hosts",
    "always_nodes",
    "success_nodes",
    "failure_nodes",
];

#[derive(Default)]
struct FakeState {
    pages: HashMap<String, Value>,
    collections: BTreeMap<EntityType, Vec<Value>>,
    forced: HashMap<(&'static str, String), u16>,
    gets: Vec<String>,
    posts: Vec<(String, Value)>,
    links: HashMap<String, Vec<i64>>,
    next_id: i64,
}

pub struct FakeStore {
    root: String,
    state: Mutex<FakeState>,
}

impl FakeStore {
    pub fn new(root: &str) -> Arc<Self> {
        Arc::new(FakeStore {
            root: root.to_string(),
            state: Mutex::new(FakeState {
                next_id: 100,
                ..Default::default()
            }),
        })
    }

    fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn absolute(&self, locator: &str) -> String {
        format!("{}{}", self.root, locator)
    }

    /// Client with a page size of 2 and default endpoints
    pub fn client(self: &Arc<Self>, cache: Arc<RunCache>) -> StoreClient {
        let endpoints = EntityType::all_variants()
            .iter()
            .map(|k| (*k, k.default_base_url().to_string()))
            .collect();
        StoreClient::new(&self.root, endpoints, 2, self.clone(), cache)
    }

    /// Serve `body` for GETs of exactly this locator
    pub fn page(&self, locator: &str, body: Value) {
        let url = self.absolute(locator);
        self.state().pages.insert(url, body);
    }

    /// Add a searchable entity, assigning an id and relation URLs when absent
    pub fn seed(&self, kind: EntityType, entity: Value) -> Value {
        let mut state = self.state();
        let entity = Self::with_identity(&mut state, kind, entity);
        state.collections.entry(kind).or_default().push(entity.clone());
        entity
    }

    pub fn fail_get(&self, locator: &str, status: u16) {
        let url = self.absolute(locator);
        self.state().forced.insert(("GET", url), status);
    }

    pub fn fail_post(&self, locator: &str, status: u16) {
        let url = self.absolute(locator);
        self.state().forced.insert(("POST", url), status);
    }

    pub fn get_count(&self, locator: &str) -> usize {
        let url = self.absolute(locator);
        self.state().gets.iter().filter(|u| **u == url).count()
    }

    pub fn posts(&self) -> Vec<(String, Value)> {
        self.state().posts.clone()
    }

    pub fn posts_to(&self, locator: &str) -> Vec<Value> {
        let url = self.absolute(locator);
        self.state()
            .posts
            .iter()
            .filter(|(u, _)| *u == url)
            .map(|(_, body)| body.clone())
            .collect()
    }

    pub fn entities(&self, kind: EntityType) -> Vec<Value> {
        self.state().collections.get(&kind).cloned().unwrap_or_default()
    }

    fn with_identity(state: &mut FakeState, kind: EntityType, entity: Value) -> Value {
        let mut obj = match entity {
            Value::Object(obj) => obj,
            _ => Map::new(),
        };
        let id = match obj.get("id").and_then(Value::as_i64) {
            Some(id) => id,
            None => {
                state.next_id += 1;
                obj.insert("id".to_string(), json!(state.next_id));
                state.next_id
            }
        };
        if !obj.contains_key("related") {
            let related: Map<String, Value> = RELATIONS
                .iter()
                .map(|rel| {
                    (
                        rel.to_string(),
                        json!(format!("{}{}/{}/", kind.default_base_url(), id, rel)),
                    )
                })
                .collect();
            obj.insert("related".to_string(), Value::Object(related));
        }
        Value::Object(obj)
    }

    fn collection_kind(path: &str) -> Option<EntityType> {
        EntityType::all_variants()
            .iter()
            .copied()
            .find(|k| k.default_base_url() == path)
    }

    fn is_linked_relation(path: &str) -> bool {
        LINKED
            .iter()
            .any(|rel| path.ends_with(&format!("/{}/", rel)))
    }

    fn matches(entity: &Value, key: &str, expected: &str) -> bool {
        if let Some(field) = key.strip_suffix("__isnull") {
            let is_null = entity.get(field).map_or(true, Value::is_null);
            return is_null == (expected == "true");
        }
        match entity.get(key) {
            Some(Value::String(s)) => s == expected,
            Some(Value::Number(n)) => n.to_string() == expected,
            Some(Value::Bool(b)) => b.to_string() == expected,
            _ => false,
        }
    }

    fn search(state: &FakeState, kind: EntityType, query: &str) -> Value {
        let filters: Vec<(String, String)> = query
            .split('&')
            .filter(|p| !p.is_empty())
            .filter_map(|p| p.split_once('='))
            .filter(|(k, _)| *k != "page_size" && *k != "page")
            .map(|(k, v)| {
                let v = urlencoding::decode(v).map(|c| c.into_owned()).unwrap_or_default();
                (k.to_string(), v)
            })
            .collect();

        let results: Vec<Value> = state
            .collections
            .get(&kind)
            .map(|items| {
                items
                    .iter()
                    .filter(|e| filters.iter().all(|(k, v)| Self::matches(e, k, v)))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        json!({"count": results.len(), "next": null, "previous": null, "results": results})
    }
}

#[async_trait]
impl Transport for FakeStore {
    async fn get_json(&self, url: &str) -> Result<HttpResponse, PortError> {
        let mut state = self.state();
        state.gets.push(url.to_string());

        if let Some(status) = state.forced.get(&("GET", url.to_string())) {
            return Ok(HttpResponse::new(*status, json!({"detail": "forced failure"})));
        }
        if let Some(body) = state.pages.get(url) {
            return Ok(HttpResponse::new(200, body.clone()));
        }

        let relative = url.strip_prefix(&self.root).unwrap_or(url);
        let (path, query) = relative.split_once('?').unwrap_or((relative, ""));
        if let Some(kind) = Self::collection_kind(path) {
            return Ok(HttpResponse::new(200, Self::search(&state, kind, query)));
        }
        if Self::is_linked_relation(path) {
            let results: Vec<Value> = state
                .links
                .get(url)
                .map(|ids| ids.iter().map(|id| json!({"id": id})).collect())
                .unwrap_or_default();
            return Ok(HttpResponse::new(
                200,
                json!({"count": results.len(), "next": null, "results": results}),
            ));
        }
        Ok(HttpResponse::new(404, json!({"detail": "Not found."})))
    }

    async fn post_json(&self, url: &str, body: &Value) -> Result<HttpResponse, PortError> {
        let mut state = self.state();
        state.posts.push((url.to_string(), body.clone()));

        if let Some(status) = state.forced.get(&("POST", url.to_string())) {
            return Ok(HttpResponse::new(*status, json!({"detail": "forced failure"})));
        }

        let relative = url.strip_prefix(&self.root).unwrap_or(url);
        if let Some(kind) = Self::collection_kind(relative) {
            let created = Self::with_identity(&mut state, kind, body.clone());
            state.collections.entry(kind).or_default().push(created.clone());
            return Ok(HttpResponse::new(201, created));
        }
        if relative.ends_with("/survey_spec/") {
            return Ok(HttpResponse::new(200, Value::Null));
        }
        if relative.ends_with("/create_approval_template/") {
            state.next_id += 1;
            return Ok(HttpResponse::new(201, json!({"id": state.next_id})));
        }
        if let Some(id) = body.get("id").and_then(Value::as_i64) {
            let linked = state.links.entry(url.to_string()).or_default();
            if linked.contains(&id) {
                return Ok(HttpResponse::new(400, json!({"detail": "already associated"})));
            }
            linked.push(id);
        }
        Ok(HttpResponse::new(204, Value::Null))
    }
}
