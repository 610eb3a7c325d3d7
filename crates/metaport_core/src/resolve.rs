//! Bulk resolution of symbolic references against a destination store
//!
//! References are grouped by kind so each group costs as few remote calls as
//! the admin API allows:
//!
//! - products, collections and pages: one OR-filtered search per chunk of
//!   handles
//! - metaobjects: one aliased lookup per type (and chunk of handles)
//! - product variants: one lookup per parent product, matched on SKU
//! - media images: one find-or-create call per URL
//!
//! A failing group only marks its own members unresolved. Every outcome,
//! including "not found", is cached for the lifetime of the resolver, so a
//! reference is looked up at most once per run.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};

use futures::StreamExt;
use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::Result;
use crate::config::LimitsConfig;
use crate::progress::{NoProgress, ProgressEvent, ProgressObserver, ResolveCounters, ResolveStage};
use crate::reference::{ReferenceKind, SymbolicRef};
use crate::store::Store;
use crate::utils::error_chain;

/// Outcome per reference: `Some(id)` or `None` for not found
pub type Resolution = HashMap<SymbolicRef, Option<String>>;

/// One batch of references answered by a single kind of remote lookup
#[derive(Debug, Clone)]
enum Group {
    Handles {
        kind: ReferenceKind,
        handles: Vec<String>,
    },
    Metaobjects {
        type_name: String,
        handles: Vec<String>,
    },
    Variants {
        product_handle: String,
        skus: Vec<String>,
    },
    Media {
        url: String,
    },
}

impl Group {
    fn kind(&self) -> ReferenceKind {
        match self {
            Group::Handles { kind, .. } => *kind,
            Group::Metaobjects { .. } => ReferenceKind::Metaobject,
            Group::Variants { .. } => ReferenceKind::ProductVariant,
            Group::Media { .. } => ReferenceKind::MediaImage,
        }
    }

    fn label(&self) -> Option<String> {
        match self {
            Group::Handles { .. } => None,
            Group::Metaobjects { type_name, .. } => Some(type_name.clone()),
            Group::Variants { product_handle, .. } => Some(product_handle.clone()),
            Group::Media { url } => Some(url.clone()),
        }
    }

    fn members(&self) -> Vec<SymbolicRef> {
        match self {
            Group::Handles { kind, handles } => handles
                .iter()
                .map(|handle| {
                    let handle = handle.clone();
                    match kind {
                        ReferenceKind::Product => SymbolicRef::Product { handle },
                        ReferenceKind::Page => SymbolicRef::Page { handle },
                        _ => SymbolicRef::Collection { handle },
                    }
                })
                .collect(),
            Group::Metaobjects { type_name, handles } => handles
                .iter()
                .map(|handle| SymbolicRef::Metaobject {
                    type_name: type_name.clone(),
                    handle: handle.clone(),
                })
                .collect(),
            Group::Variants {
                product_handle,
                skus,
            } => skus
                .iter()
                .map(|sku| SymbolicRef::ProductVariant {
                    product_handle: product_handle.clone(),
                    sku: sku.clone(),
                })
                .collect(),
            Group::Media { url } => vec![SymbolicRef::MediaImage { url: url.clone() }],
        }
    }
}

/// Split cache misses into remote lookup groups
fn plan_groups(misses: &BTreeSet<SymbolicRef>, chunk_size: usize) -> Vec<Group> {
    let chunk_size = chunk_size.max(1);
    let mut by_handle: BTreeMap<ReferenceKind, Vec<String>> = BTreeMap::new();
    let mut by_type: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut by_product: BTreeMap<String, Vec<String>> = BTreeMap::new();
    let mut media = Vec::new();

    for reference in misses {
        match reference {
            SymbolicRef::Product { handle } => by_handle
                .entry(ReferenceKind::Product)
                .or_default()
                .push(handle.clone()),
            SymbolicRef::Page { handle } => by_handle
                .entry(ReferenceKind::Page)
                .or_default()
                .push(handle.clone()),
            SymbolicRef::Collection { handle } => by_handle
                .entry(ReferenceKind::Collection)
                .or_default()
                .push(handle.clone()),
            SymbolicRef::Metaobject { type_name, handle } => by_type
                .entry(type_name.clone())
                .or_default()
                .push(handle.clone()),
            SymbolicRef::ProductVariant {
                product_handle,
                sku,
            } => by_product
                .entry(product_handle.clone())
                .or_default()
                .push(sku.clone()),
            SymbolicRef::MediaImage { url } => media.push(Group::Media { url: url.clone() }),
        }
    }

    let mut groups = Vec::new();
    for (kind, handles) in by_handle {
        for chunk in handles.chunks(chunk_size) {
            groups.push(Group::Handles {
                kind,
                handles: chunk.to_vec(),
            });
        }
    }
    for (type_name, handles) in by_type {
        for chunk in handles.chunks(chunk_size) {
            groups.push(Group::Metaobjects {
                type_name: type_name.clone(),
                handles: chunk.to_vec(),
            });
        }
    }
    for (product_handle, skus) in by_product {
        groups.push(Group::Variants {
            product_handle,
            skus,
        });
    }
    groups.extend(media);
    groups
}

/// Resolves symbolic references to destination ids with a per-run cache
pub struct HandleResolver<'a> {
    store: &'a dyn Store,
    observer: &'a dyn ProgressObserver,
    cache: Mutex<HashMap<SymbolicRef, Option<String>>>,
    /// Store requests spent by finished batches
    remote_calls: AtomicUsize,
    /// Store request count when the running batch began
    batch_start: Mutex<Option<usize>>,
    resolved: AtomicUsize,
    failed: AtomicUsize,
    chunk_size: usize,
    concurrency: usize,
}

impl<'a> HandleResolver<'a> {
    pub fn new(store: &'a dyn Store, limits: &LimitsConfig) -> Self {
        Self {
            store,
            observer: &NoProgress,
            cache: Mutex::new(HashMap::new()),
            remote_calls: AtomicUsize::new(0),
            batch_start: Mutex::new(None),
            resolved: AtomicUsize::new(0),
            failed: AtomicUsize::new(0),
            chunk_size: limits.resolve_chunk_size.max(1),
            concurrency: limits.resolve_concurrency.max(1),
        }
    }

    pub fn with_observer(mut self, observer: &'a dyn ProgressObserver) -> Self {
        self.observer = observer;
        self
    }

    /// Cumulative counters. Remote calls are measured on the store while a
    /// batch runs, so every page or create request a lookup needs is counted.
    pub fn counters(&self) -> ResolveCounters {
        let in_flight = (*self.batch_start.lock())
            .map(|start| self.store.requests_sent().saturating_sub(start))
            .unwrap_or(0);
        ResolveCounters {
            remote_calls: self.remote_calls.load(Ordering::SeqCst) + in_flight,
            resolved: self.resolved.load(Ordering::SeqCst),
            failed: self.failed.load(Ordering::SeqCst),
        }
    }

    /// The cached outcome, `None` if the reference was never resolved
    pub fn cached(&self, reference: &SymbolicRef) -> Option<Option<String>> {
        self.cache.lock().get(reference).cloned()
    }

    /// Record an id learned outside of resolution, such as a record this run
    /// just created
    pub fn insert(&self, reference: SymbolicRef, id: String) {
        self.cache.lock().insert(reference, Some(id));
    }

    pub async fn resolve(&self, reference: &SymbolicRef) -> Option<String> {
        self.resolve_all([reference]).await.remove(reference).flatten()
    }

    /// Resolve every reference, issuing remote calls only for cache misses.
    ///
    /// The store must not serve other requests while this runs, or they are
    /// counted as lookups.
    pub async fn resolve_all<'r, I>(&self, references: I) -> Resolution
    where
        I: IntoIterator<Item = &'r SymbolicRef>,
    {
        let wanted: BTreeSet<SymbolicRef> = references.into_iter().cloned().collect();
        let misses: BTreeSet<SymbolicRef> = {
            let cache = self.cache.lock();
            wanted
                .iter()
                .filter(|r| !cache.contains_key(*r))
                .cloned()
                .collect()
        };

        if !misses.is_empty() {
            let groups = plan_groups(&misses, self.chunk_size);
            debug!(
                "Resolving {} reference(s) in {} group(s) ({} cached)",
                misses.len(),
                groups.len(),
                wanted.len() - misses.len()
            );
            let start = self.store.requests_sent();
            *self.batch_start.lock() = Some(start);
            futures::stream::iter(groups)
                .map(|group| self.resolve_group(group))
                .buffer_unordered(self.concurrency)
                .collect::<Vec<()>>()
                .await;
            let spent = self.store.requests_sent().saturating_sub(start);
            *self.batch_start.lock() = None;
            self.remote_calls.fetch_add(spent, Ordering::SeqCst);
        }

        let cache = self.cache.lock();
        wanted
            .into_iter()
            .map(|r| {
                let id = cache.get(&r).cloned().flatten();
                (r, id)
            })
            .collect()
    }

    fn emit(&self, stage: ResolveStage, group: &Group, size: usize, error: Option<String>) {
        self.observer.notify(ProgressEvent::Resolve {
            stage,
            kind: group.kind(),
            label: group.label(),
            size,
            counters: self.counters(),
            error,
        });
    }

    async fn resolve_group(&self, group: Group) {
        let members = group.members();
        self.emit(ResolveStage::GroupStarted, &group, members.len(), None);

        match self.lookup_group(&group).await {
            Ok(found) => {
                let mut cache = self.cache.lock();
                let mut hits = 0;
                for member in &members {
                    let id = found.get(member).cloned();
                    hits += usize::from(id.is_some());
                    cache.insert(member.clone(), id);
                }
                drop(cache);
                self.resolved.fetch_add(hits, Ordering::SeqCst);
                self.failed.fetch_add(members.len() - hits, Ordering::SeqCst);
                debug!(
                    kind = %group.kind(),
                    "Resolved {}/{} reference(s)",
                    hits,
                    members.len()
                );
                self.emit(ResolveStage::GroupCompleted, &group, members.len(), None);
            }
            Err(e) => {
                warn!(
                    kind = %group.kind(),
                    label = ?group.label(),
                    "Resolution group failed, marking {} reference(s) unresolved: {}",
                    members.len(),
                    e
                );
                let mut cache = self.cache.lock();
                for member in &members {
                    cache.insert(member.clone(), None);
                }
                drop(cache);
                self.failed.fetch_add(members.len(), Ordering::SeqCst);
                self.emit(
                    ResolveStage::GroupFailed,
                    &group,
                    members.len(),
                    Some(error_chain(&e)),
                );
            }
        }
    }

    async fn lookup_group(&self, group: &Group) -> Result<HashMap<SymbolicRef, String>> {
        let found = match group {
            Group::Handles { kind, handles } => {
                let ids = self.store.find_by_handles(*kind, handles).await?;
                group
                    .members()
                    .into_iter()
                    .zip(handles)
                    .filter_map(|(member, handle)| ids.get(handle).map(|id| (member, id.clone())))
                    .collect()
            }
            Group::Metaobjects { type_name, handles } => {
                let ids = self.store.find_metaobjects(type_name, handles).await?;
                group
                    .members()
                    .into_iter()
                    .zip(handles)
                    .filter_map(|(member, handle)| ids.get(handle).map(|id| (member, id.clone())))
                    .collect()
            }
            Group::Variants {
                product_handle,
                skus,
            } => {
                // A missing product leaves every variant under it unresolved
                let Some(variants) = self.store.product_variants(product_handle).await? else {
                    return Ok(HashMap::new());
                };
                group
                    .members()
                    .into_iter()
                    .zip(skus)
                    .filter_map(|(member, sku)| {
                        variants
                            .iter()
                            .find(|(_, variant_sku)| variant_sku.as_deref() == Some(sku.as_str()))
                            .map(|(id, _)| (member, id.clone()))
                    })
                    .collect()
            }
            Group::Media { url } => match self.store.ensure_media_image(url).await? {
                Some(id) => HashMap::from([(SymbolicRef::MediaImage { url: url.clone() }, id)]),
                None => HashMap::new(),
            },
        };
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::MemoryStore;
    use pretty_assertions::assert_eq;

    fn product(handle: &str) -> SymbolicRef {
        SymbolicRef::Product {
            handle: handle.to_string(),
        }
    }

    fn variant(product_handle: &str, sku: &str) -> SymbolicRef {
        SymbolicRef::ProductVariant {
            product_handle: product_handle.to_string(),
            sku: sku.to_string(),
        }
    }

    #[tokio::test]
    async fn test_second_resolution_is_served_from_cache() {
        let store = MemoryStore::new();
        store.add_product("tee", "gid://shopify/Product/1");
        let resolver = HandleResolver::new(&store, &LimitsConfig::default());

        let first = resolver.resolve(&product("tee")).await;
        let calls = store.call_count();
        let second = resolver.resolve(&product("tee")).await;

        assert_eq!(first.as_deref(), Some("gid://shopify/Product/1"));
        assert_eq!(second, first);
        assert_eq!(store.call_count(), calls);
        assert_eq!(resolver.counters().remote_calls, 1);
    }

    #[tokio::test]
    async fn test_not_found_is_final_and_cached() {
        let store = MemoryStore::new();
        let resolver = HandleResolver::new(&store, &LimitsConfig::default());

        assert_eq!(resolver.resolve(&product("missing")).await, None);
        assert_eq!(resolver.cached(&product("missing")), Some(None));

        store.add_product("missing", "gid://shopify/Product/2");
        assert_eq!(resolver.resolve(&product("missing")).await, None);
        assert_eq!(store.calls_of("find_by_handles"), 1);
    }

    #[tokio::test]
    async fn test_one_query_per_kind_and_type() {
        let store = MemoryStore::new();
        store.add_product("a", "gid://shopify/Product/1");
        store.add_product("b", "gid://shopify/Product/2");
        store.add_page("about", "gid://shopify/Page/1");
        store.add_metaobject("$app:Card", "x", "gid://shopify/Metaobject/1");
        store.add_metaobject("$app:Card", "y", "gid://shopify/Metaobject/2");
        store.add_metaobject("faq", "q1", "gid://shopify/Metaobject/3");

        let refs = vec![
            product("a"),
            product("b"),
            product("a"),
            SymbolicRef::Page {
                handle: "about".to_string(),
            },
            SymbolicRef::metaobject("$app:Card", "x"),
            SymbolicRef::metaobject("$app:Card", "y"),
            SymbolicRef::metaobject("faq", "q1"),
        ];
        let resolver = HandleResolver::new(&store, &LimitsConfig::default());
        let resolved = resolver.resolve_all(&refs).await;

        assert_eq!(resolved.len(), 6);
        assert!(resolved.values().all(Option::is_some));
        assert_eq!(store.calls_of("find_by_handles"), 2);
        assert_eq!(store.calls_of("find_metaobjects"), 2);
        assert_eq!(
            resolver.counters(),
            ResolveCounters {
                remote_calls: 4,
                resolved: 6,
                failed: 0
            }
        );
    }

    #[tokio::test]
    async fn test_remote_calls_count_every_store_request() {
        use crate::store::AdminStore;
        use crate::transport::{GraphQlResponse, MockTransport};
        use serde_json::json;

        let mut transport = MockTransport::new();
        transport
            .expect_endpoint()
            .returning(|| "test.myshopify.com".to_string());
        transport.expect_request().returning(|query, vars| {
            let data = if query.contains("ProductVariantsByHandle") {
                if vars["after"].is_null() {
                    json!({ "productByIdentifier": { "variants": {
                        "nodes": [{ "id": "gid://shopify/ProductVariant/1", "sku": "TEE-S" }],
                        "pageInfo": { "hasNextPage": true, "endCursor": "v1" }
                    }}})
                } else {
                    json!({ "productByIdentifier": { "variants": {
                        "nodes": [{ "id": "gid://shopify/ProductVariant/2", "sku": "TEE-M" }],
                        "pageInfo": { "hasNextPage": false, "endCursor": "v2" }
                    }}})
                }
            } else if query.contains("FilesByName") {
                json!({ "files": { "nodes": [] } })
            } else {
                json!({ "fileCreate": {
                    "files": [{ "id": "gid://shopify/MediaImage/9" }],
                    "userErrors": []
                }})
            };
            Ok(GraphQlResponse::ok(data))
        });
        let store = AdminStore::new(transport);

        let image = SymbolicRef::MediaImage {
            url: "https://cdn.example.com/hero.png".to_string(),
        };
        let refs = vec![variant("tee", "TEE-M"), image.clone()];
        let resolver = HandleResolver::new(&store, &LimitsConfig::default());
        let resolved = resolver.resolve_all(&refs).await;

        assert_eq!(
            resolved[&variant("tee", "TEE-M")].as_deref(),
            Some("gid://shopify/ProductVariant/2")
        );
        assert_eq!(
            resolved[&image].as_deref(),
            Some("gid://shopify/MediaImage/9")
        );
        // two variant pages, then a file search and a create
        assert_eq!(resolver.counters().remote_calls, 4);
    }

    #[tokio::test]
    async fn test_handles_are_chunked() {
        let store = MemoryStore::new();
        let refs: Vec<_> = (0..5).map(|i| product(&format!("p{i}"))).collect();
        let limits = LimitsConfig {
            resolve_chunk_size: 2,
            ..LimitsConfig::default()
        };
        let resolver = HandleResolver::new(&store, &limits);
        resolver.resolve_all(&refs).await;
        assert_eq!(store.calls_of("find_by_handles"), 3);
    }

    #[tokio::test]
    async fn test_variants_resolve_through_parent_product() {
        let store = MemoryStore::new();
        store.add_variants(
            "tee",
            &[
                ("gid://shopify/ProductVariant/1", "TEE-S"),
                ("gid://shopify/ProductVariant/2", "TEE-M"),
            ],
        );
        let refs = vec![
            variant("tee", "TEE-M"),
            variant("tee", "TEE-XL"),
            variant("ghost", "G-1"),
            variant("ghost", "G-2"),
        ];
        let resolver = HandleResolver::new(&store, &LimitsConfig::default());
        let resolved = resolver.resolve_all(&refs).await;

        assert_eq!(
            resolved[&variant("tee", "TEE-M")].as_deref(),
            Some("gid://shopify/ProductVariant/2")
        );
        assert_eq!(resolved[&variant("tee", "TEE-XL")], None);
        assert_eq!(resolved[&variant("ghost", "G-1")], None);
        assert_eq!(resolved[&variant("ghost", "G-2")], None);
        assert_eq!(store.calls_of("product_variants"), 2);
        assert_eq!(resolver.counters().failed, 3);
    }

    #[tokio::test]
    async fn test_failing_kind_does_not_block_others() {
        let store = MemoryStore::new();
        store.add_product("tee", "gid://shopify/Product/1");
        store.add_collection("sale", "gid://shopify/Collection/1");
        store.fail_kind(ReferenceKind::Product);

        let events = Mutex::new(Vec::new());
        let observer = |event: ProgressEvent| events.lock().push(event);
        let resolver =
            HandleResolver::new(&store, &LimitsConfig::default()).with_observer(&observer);
        let refs = vec![
            product("tee"),
            SymbolicRef::Collection {
                handle: "sale".to_string(),
            },
        ];
        let resolved = resolver.resolve_all(&refs).await;

        assert_eq!(resolved[&product("tee")], None);
        assert_eq!(
            resolved[&refs[1]].as_deref(),
            Some("gid://shopify/Collection/1")
        );

        let events = events.lock();
        let failed: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Resolve {
                    stage: ResolveStage::GroupFailed,
                    kind,
                    error,
                    ..
                } => Some((*kind, error.clone())),
                _ => None,
            })
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0].0, ReferenceKind::Product);
        assert!(failed[0].1.as_deref().unwrap().contains("simulated outage"));

        let last = events.last().unwrap();
        match last {
            ProgressEvent::Resolve { counters, .. } => {
                assert_eq!(counters.remote_calls, 2);
                assert_eq!(counters.resolved + counters.failed, 2);
            }
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_media_images_are_one_call_each() {
        let store = MemoryStore::new();
        let refs = vec![
            SymbolicRef::MediaImage {
                url: "https://cdn.example.com/a.png".to_string(),
            },
            SymbolicRef::MediaImage {
                url: "https://cdn.example.com/b.png".to_string(),
            },
        ];
        let resolver = HandleResolver::new(&store, &LimitsConfig::default());
        let resolved = resolver.resolve_all(&refs).await;

        assert!(resolved.values().all(Option::is_some));
        assert_eq!(store.calls_of("ensure_media_image"), 2);
    }

    #[tokio::test]
    async fn test_inserted_ids_override_misses() {
        let store = MemoryStore::new();
        let resolver = HandleResolver::new(&store, &LimitsConfig::default());
        let card = SymbolicRef::metaobject("card", "new");

        assert_eq!(resolver.resolve(&card).await, None);
        resolver.insert(card.clone(), "gid://shopify/Metaobject/77".to_string());
        assert_eq!(
            resolver.resolve(&card).await.as_deref(),
            Some("gid://shopify/Metaobject/77")
        );
        assert_eq!(store.calls_of("find_metaobjects"), 1);
    }
}
