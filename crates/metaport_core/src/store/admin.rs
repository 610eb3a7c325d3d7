use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};
use tracing::debug;

use super::{
    MetafieldWrite, Page, RawBackReference, RawField, RawMetaobject, Store, UpsertOutcome,
    UserError, queries,
};
use crate::reference::{ReferenceKind, ResourceRef};
use crate::transport::{GraphQlResponse, Transport};
use crate::{CoreError, Result};

const DEFINITIONS_PAGE_SIZE: usize = 250;
const VARIANTS_PAGE_SIZE: usize = 250;
/// Largest page the admin API returns; near-matches of the handle search
/// share it with the exact matches
const HANDLE_SEARCH_PAGE_SIZE: usize = 250;

/// [`Store`] backed by admin API GraphQL requests
pub struct AdminStore<T: Transport> {
    transport: T,
    label: Option<String>,
    requests: AtomicUsize,
}

impl<T: Transport> AdminStore<T> {
    pub fn new(transport: T) -> Self {
        Self {
            transport,
            label: None,
            requests: AtomicUsize::new(0),
        }
    }

    /// Name the store by its environment label instead of its shop host
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    async fn query<R: DeserializeOwned>(
        &self,
        operation: &str,
        query: &str,
        variables: Value,
    ) -> Result<R> {
        debug!(operation, shop = %self.transport.endpoint(), "Admin API request");
        self.requests.fetch_add(1, Ordering::SeqCst);
        let response = self.transport.request(query, variables).await?;
        decode(operation, response)
    }
}

/// Pull typed data out of an envelope; any reported error fails the call
fn decode<R: DeserializeOwned>(operation: &str, response: GraphQlResponse) -> Result<R> {
    if !response.errors.is_empty() {
        return Err(CoreError::remote(operation, response.error_messages()));
    }
    let data = response
        .data
        .ok_or_else(|| CoreError::malformed(operation, "response has no data"))?;
    serde_json::from_value(data).map_err(|e| CoreError::malformed(operation, e.to_string()))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageInfo {
    has_next_page: bool,
    end_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Connection<N> {
    #[serde(default = "Vec::new")]
    nodes: Vec<N>,
    page_info: Option<PageInfo>,
}

impl<N> Connection<N> {
    fn into_page<T>(self, convert: impl FnMut(N) -> Option<T>) -> Page<T> {
        let (has_next_page, end_cursor) = match self.page_info {
            Some(info) => (info.has_next_page, info.end_cursor),
            None => (false, None),
        };
        Page {
            items: self.nodes.into_iter().filter_map(convert).collect(),
            has_next_page,
            end_cursor,
        }
    }
}

#[derive(Debug, Deserialize)]
struct HandleNode {
    handle: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ImageNode {
    url: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ResourceNode {
    #[serde(rename = "__typename")]
    typename: String,
    id: String,
    #[serde(rename = "type")]
    type_name: Option<String>,
    handle: Option<String>,
    sku: Option<String>,
    product: Option<HandleNode>,
    image: Option<ImageNode>,
}

impl From<ResourceNode> for ResourceRef {
    fn from(node: ResourceNode) -> Self {
        let id = node.id;
        match node.typename.as_str() {
            "Metaobject" => ResourceRef::Metaobject {
                id,
                type_name: node.type_name.unwrap_or_default(),
                handle: node.handle,
            },
            "Product" => ResourceRef::Product {
                id,
                handle: node.handle,
            },
            "Collection" => ResourceRef::Collection {
                id,
                handle: node.handle,
            },
            "Page" => ResourceRef::Page {
                id,
                handle: node.handle,
            },
            "ProductVariant" => ResourceRef::ProductVariant {
                id,
                sku: node.sku,
                product_handle: node.product.and_then(|p| p.handle),
            },
            "MediaImage" => ResourceRef::MediaImage {
                id,
                url: node.image.and_then(|i| i.url),
            },
            _ => ResourceRef::Other {
                id,
                typename: node.typename,
            },
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FieldNode {
    key: String,
    #[serde(rename = "type")]
    field_type: String,
    value: Option<String>,
    reference: Option<ResourceNode>,
    references: Option<Connection<ResourceNode>>,
}

#[derive(Debug, Deserialize)]
struct BackReferenceNode {
    key: String,
    namespace: String,
    referencer: Option<ResourceNode>,
}

fn back_reference(node: BackReferenceNode) -> Option<RawBackReference> {
    Some(RawBackReference {
        namespace: node.namespace,
        key: node.key,
        owner: node.referencer?.into(),
    })
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MetaobjectNode {
    id: String,
    handle: String,
    #[serde(rename = "type")]
    type_name: String,
    #[serde(default)]
    fields: Vec<FieldNode>,
    referenced_by: Option<Connection<BackReferenceNode>>,
}

impl From<MetaobjectNode> for RawMetaobject {
    fn from(node: MetaobjectNode) -> Self {
        RawMetaobject {
            id: node.id,
            handle: node.handle,
            type_name: node.type_name,
            fields: node
                .fields
                .into_iter()
                .map(|f| RawField {
                    key: f.key,
                    field_type: f.field_type,
                    value: f.value,
                    reference: f.reference.map(ResourceRef::from),
                    references: f
                        .references
                        .map(|c| c.nodes.into_iter().map(ResourceRef::from).collect()),
                })
                .collect(),
            back_references: node
                .referenced_by
                .map(|c| c.into_page(back_reference)),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IdNode {
    id: String,
}

#[derive(Debug, Deserialize)]
struct IdHandleNode {
    id: String,
    handle: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MutationPayload {
    #[serde(default)]
    user_errors: Vec<UserError>,
}

fn file_name(url: &str) -> &str {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path)
}

#[async_trait]
impl<T: Transport> Store for AdminStore<T> {
    fn label(&self) -> String {
        self.label
            .clone()
            .unwrap_or_else(|| self.transport.endpoint())
    }

    fn requests_sent(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }

    async fn metaobject_types(&self) -> Result<Vec<String>> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            metaobject_definitions: Connection<TypeNode>,
        }
        #[derive(Deserialize)]
        struct TypeNode {
            #[serde(rename = "type")]
            type_name: String,
        }

        let mut types = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let data: Data = self
                .query(
                    "metaobjectDefinitions",
                    queries::METAOBJECT_DEFINITIONS,
                    json!({ "first": DEFINITIONS_PAGE_SIZE, "after": after }),
                )
                .await?;
            let page = data
                .metaobject_definitions
                .into_page(|n| Some(n.type_name));
            types.extend(page.items);
            match page.end_cursor.filter(|_| page.has_next_page) {
                Some(cursor) => after = Some(cursor),
                None => break,
            }
        }
        Ok(types)
    }

    async fn metaobjects_page(
        &self,
        type_name: &str,
        first: usize,
        after: Option<&str>,
        inline_back_references: usize,
    ) -> Result<Page<RawMetaobject>> {
        #[derive(Deserialize)]
        struct Data {
            metaobjects: Connection<MetaobjectNode>,
        }

        let data: Data = self
            .query(
                &format!("metaobjects({type_name})"),
                &queries::metaobjects_page(),
                json!({
                    "type": type_name,
                    "first": first,
                    "after": after,
                    "withBackReferences": inline_back_references > 0,
                    "backReferences": inline_back_references.max(1),
                }),
            )
            .await?;
        Ok(data.metaobjects.into_page(|n| Some(RawMetaobject::from(n))))
    }

    async fn back_references_page(
        &self,
        metaobject_id: &str,
        first: usize,
        after: Option<&str>,
    ) -> Result<Page<RawBackReference>> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            metaobject: Option<Referenced>,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Referenced {
            referenced_by: Connection<BackReferenceNode>,
        }

        let operation = format!("referencedBy({metaobject_id})");
        let data: Data = self
            .query(
                &operation,
                &queries::back_references_page(),
                json!({ "id": metaobject_id, "first": first, "after": after }),
            )
            .await?;
        let metaobject = data
            .metaobject
            .ok_or_else(|| CoreError::malformed(&operation, "metaobject not found"))?;
        Ok(metaobject.referenced_by.into_page(back_reference))
    }

    async fn find_by_handles(
        &self,
        kind: ReferenceKind,
        handles: &[String],
    ) -> Result<HashMap<String, String>> {
        let (connection, operation) = queries::handle_connection(kind).ok_or_else(|| {
            CoreError::malformed(kind.as_str(), "no handle lookup for this kind")
        })?;
        if handles.is_empty() {
            return Ok(HashMap::new());
        }

        let mut data: Map<String, Value> = self
            .query(
                operation,
                &queries::by_handles(connection, operation),
                json!({ "first": HANDLE_SEARCH_PAGE_SIZE, "query": queries::handle_filter(handles) }),
            )
            .await?;
        let nodes = data
            .remove(connection)
            .ok_or_else(|| CoreError::malformed(operation, format!("missing {connection}")))?;
        let nodes: Connection<IdHandleNode> = serde_json::from_value(nodes)
            .map_err(|e| CoreError::malformed(operation, e.to_string()))?;

        // The search filter is fuzzy, keep exact matches only
        Ok(nodes
            .nodes
            .into_iter()
            .filter(|n| handles.contains(&n.handle))
            .map(|n| (n.handle, n.id))
            .collect())
    }

    async fn find_metaobjects(
        &self,
        type_name: &str,
        handles: &[String],
    ) -> Result<HashMap<String, String>> {
        if handles.is_empty() {
            return Ok(HashMap::new());
        }

        let mut variables = Map::new();
        variables.insert("type".to_string(), Value::from(type_name));
        for (i, handle) in handles.iter().enumerate() {
            variables.insert(format!("h{i}"), Value::from(handle.as_str()));
        }

        let data: HashMap<String, Option<IdHandleNode>> = self
            .query(
                &format!("metaobjectByHandle({type_name})"),
                &queries::metaobjects_by_handle(handles.len()),
                Value::Object(variables),
            )
            .await?;
        Ok(data
            .into_values()
            .flatten()
            .map(|n| (n.handle, n.id))
            .collect())
    }

    async fn product_variants(
        &self,
        product_handle: &str,
    ) -> Result<Option<Vec<(String, Option<String>)>>> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            product_by_identifier: Option<ProductNode>,
        }
        #[derive(Deserialize)]
        struct ProductNode {
            variants: Connection<VariantNode>,
        }
        #[derive(Deserialize)]
        struct VariantNode {
            id: String,
            sku: Option<String>,
        }

        let mut variants = Vec::new();
        let mut after: Option<String> = None;
        loop {
            let data: Data = self
                .query(
                    &format!("productByIdentifier({product_handle})"),
                    queries::PRODUCT_VARIANTS,
                    json!({ "handle": product_handle, "first": VARIANTS_PAGE_SIZE, "after": after }),
                )
                .await?;
            let Some(product) = data.product_by_identifier else {
                return Ok(None);
            };
            let page = product.variants.into_page(|v| Some((v.id, v.sku)));
            variants.extend(page.items);
            match page.end_cursor.filter(|_| page.has_next_page) {
                Some(cursor) => after = Some(cursor),
                None => break,
            }
        }
        Ok(Some(variants))
    }

    async fn ensure_media_image(&self, url: &str) -> Result<Option<String>> {
        #[derive(Deserialize)]
        struct Found {
            files: Connection<ResourceNode>,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Created {
            file_create: CreatedPayload,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct CreatedPayload {
            #[serde(default)]
            files: Vec<IdNode>,
            #[serde(default)]
            user_errors: Vec<UserError>,
        }

        let name = file_name(url);
        let found: Found = self
            .query(
                "files",
                queries::FILES_BY_NAME,
                json!({ "query": format!("filename:\"{name}\" media_type:IMAGE") }),
            )
            .await?;
        let existing = found.files.nodes.into_iter().map(ResourceRef::from).find(
            |r| matches!(r, ResourceRef::MediaImage { url: Some(u), .. } if file_name(u) == name),
        );
        if let Some(image) = existing {
            return Ok(Some(image.id().to_string()));
        }

        let created: Created = self
            .query(
                "fileCreate",
                queries::FILE_CREATE,
                json!({ "files": [{ "originalSource": url, "contentType": "IMAGE" }] }),
            )
            .await?;
        if !created.file_create.user_errors.is_empty() {
            return Err(CoreError::remote(
                format!("fileCreate({url})"),
                created
                    .file_create
                    .user_errors
                    .iter()
                    .map(UserError::describe)
                    .collect(),
            ));
        }
        Ok(created.file_create.files.into_iter().next().map(|f| f.id))
    }

    async fn upsert_metaobject(
        &self,
        type_name: &str,
        handle: &str,
        fields: &[(String, String)],
    ) -> Result<UpsertOutcome> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            metaobject_upsert: UpsertPayload,
        }
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct UpsertPayload {
            metaobject: Option<IdNode>,
            #[serde(default)]
            user_errors: Vec<UserError>,
        }

        let fields: Vec<Value> = fields
            .iter()
            .map(|(key, value)| json!({ "key": key, "value": value }))
            .collect();
        let data: Data = self
            .query(
                &format!("metaobjectUpsert({type_name}/{handle})"),
                queries::METAOBJECT_UPSERT,
                json!({
                    "handle": { "type": type_name, "handle": handle },
                    "metaobject": { "fields": fields },
                }),
            )
            .await?;
        Ok(UpsertOutcome {
            id: data.metaobject_upsert.metaobject.map(|m| m.id),
            user_errors: data.metaobject_upsert.user_errors,
        })
    }

    async fn set_metafields(&self, writes: &[MetafieldWrite]) -> Result<Vec<UserError>> {
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Data {
            metafields_set: MutationPayload,
        }

        let metafields: Vec<Value> = writes
            .iter()
            .map(|w| {
                json!({
                    "ownerId": w.owner_id,
                    "namespace": w.namespace,
                    "key": w.key,
                    "type": w.value.field_type(),
                    "value": w.value.to_wire(),
                })
            })
            .collect();
        let data: Data = self
            .query(
                "metafieldsSet",
                queries::METAFIELDS_SET,
                json!({ "metafields": metafields }),
            )
            .await?;
        Ok(data.metafields_set.user_errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MetafieldValue;
    use crate::transport::{GraphQlError, MockTransport};
    use pretty_assertions::assert_eq;

    fn store_with(mut transport: MockTransport) -> AdminStore<MockTransport> {
        transport
            .expect_endpoint()
            .returning(|| "test.myshopify.com".to_string());
        AdminStore::new(transport)
    }

    #[tokio::test]
    async fn test_products_by_handle_keeps_exact_matches() {
        let mut transport = MockTransport::new();
        transport
            .expect_request()
            .withf(|query, vars| {
                query.contains("ProductsByHandle")
                    && vars["query"] == r#"handle:"tee" OR handle:"hat""#
            })
            .times(1)
            .returning(|_, _| {
                Ok(GraphQlResponse::ok(json!({
                    "products": { "nodes": [
                        { "id": "gid://shopify/Product/1", "handle": "tee" },
                        { "id": "gid://shopify/Product/9", "handle": "tee-2" }
                    ]}
                })))
            });

        let store = store_with(transport);
        let found = store
            .find_by_handles(
                ReferenceKind::Product,
                &["tee".to_string(), "hat".to_string()],
            )
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["tee"], "gid://shopify/Product/1");
    }

    #[tokio::test]
    async fn test_exact_match_survives_near_matches_ranked_first() {
        let mut transport = MockTransport::new();
        transport.expect_request().times(1).returning(|_, vars| {
            let first = vars["first"].as_u64().unwrap_or(0) as usize;
            let nodes: Vec<Value> = [
                ("gid://shopify/Product/2", "tee-shirt"),
                ("gid://shopify/Product/1", "tee"),
            ]
            .into_iter()
            .take(first)
            .map(|(id, handle)| json!({ "id": id, "handle": handle }))
            .collect();
            Ok(GraphQlResponse::ok(json!({ "products": { "nodes": nodes } })))
        });

        let store = store_with(transport);
        let found = store
            .find_by_handles(ReferenceKind::Product, &["tee".to_string()])
            .await
            .unwrap();
        assert_eq!(
            found.get("tee").map(String::as_str),
            Some("gid://shopify/Product/1")
        );
        assert!(!found.contains_key("tee-shirt"));
    }

    #[tokio::test]
    async fn test_metaobject_lookup_skips_missing_aliases() {
        let mut transport = MockTransport::new();
        transport
            .expect_request()
            .withf(|query, vars| {
                query.contains("MetaobjectsByHandle") && vars["type"] == "$app:Card"
            })
            .returning(|_, _| {
                Ok(GraphQlResponse::ok(json!({
                    "m0": { "id": "gid://shopify/Metaobject/5", "handle": "summer" },
                    "m1": null
                })))
            });

        let store = store_with(transport);
        let found = store
            .find_metaobjects("$app:Card", &["summer".to_string(), "winter".to_string()])
            .await
            .unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found["summer"], "gid://shopify/Metaobject/5");
    }

    #[tokio::test]
    async fn test_metaobjects_page_decodes_references() {
        let mut transport = MockTransport::new();
        transport.expect_request().returning(|_, vars| {
            assert_eq!(vars["withBackReferences"], true);
            Ok(GraphQlResponse::ok(json!({
                "metaobjects": {
                    "nodes": [{
                        "id": "gid://shopify/Metaobject/1",
                        "handle": "summer",
                        "type": "app--42--Card",
                        "fields": [
                            {
                                "key": "product",
                                "type": "product_reference",
                                "value": "gid://shopify/Product/7",
                                "reference": {
                                    "__typename": "Product",
                                    "id": "gid://shopify/Product/7",
                                    "handle": "tee"
                                },
                                "references": null
                            },
                            {
                                "key": "variants",
                                "type": "list.variant_reference",
                                "value": "[\"gid://shopify/ProductVariant/8\"]",
                                "reference": null,
                                "references": { "nodes": [{
                                    "__typename": "ProductVariant",
                                    "id": "gid://shopify/ProductVariant/8",
                                    "sku": "TEE-M",
                                    "product": { "handle": "tee" }
                                }]}
                            }
                        ],
                        "referencedBy": {
                            "nodes": [{
                                "key": "card",
                                "namespace": "app--42--cards",
                                "referencer": {
                                    "__typename": "Collection",
                                    "id": "gid://shopify/Collection/3",
                                    "handle": "summer-sale"
                                }
                            }],
                            "pageInfo": { "hasNextPage": true, "endCursor": "c1" }
                        }
                    }],
                    "pageInfo": { "hasNextPage": false, "endCursor": "p1" }
                }
            })))
        });

        let store = store_with(transport);
        let page = store
            .metaobjects_page("app--42--Card", 250, None, 10)
            .await
            .unwrap();
        assert!(!page.has_next_page);
        let record = &page.items[0];
        assert_eq!(
            record.fields[0].reference,
            Some(ResourceRef::Product {
                id: "gid://shopify/Product/7".to_string(),
                handle: Some("tee".to_string()),
            })
        );
        assert_eq!(
            record.fields[1].references,
            Some(vec![ResourceRef::ProductVariant {
                id: "gid://shopify/ProductVariant/8".to_string(),
                sku: Some("TEE-M".to_string()),
                product_handle: Some("tee".to_string()),
            }])
        );
        let back_refs = record.back_references.as_ref().unwrap();
        assert_eq!(back_refs.next_cursor(), Some("c1"));
        assert_eq!(back_refs.items[0].namespace, "app--42--cards");
    }

    #[tokio::test]
    async fn test_remote_errors_are_reported_verbatim() {
        let mut transport = MockTransport::new();
        transport.expect_request().returning(|_, _| {
            Ok(GraphQlResponse {
                data: None,
                errors: vec![GraphQlError::new("Access denied for metaobjects field.")],
            })
        });

        let store = store_with(transport);
        let err = store
            .metaobjects_page("card", 250, None, 0)
            .await
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "metaobjects(card): Access denied for metaobjects field."
        );
    }

    #[tokio::test]
    async fn test_missing_data_is_malformed() {
        let mut transport = MockTransport::new();
        transport
            .expect_request()
            .returning(|_, _| Ok(GraphQlResponse::default()));

        let store = store_with(transport);
        let err = store.metaobject_types().await.unwrap_err();
        assert!(matches!(err, CoreError::MalformedResponse { .. }));
    }

    #[tokio::test]
    async fn test_upsert_reports_user_errors() {
        let mut transport = MockTransport::new();
        transport
            .expect_request()
            .withf(|query, vars| {
                query.contains("metaobjectUpsert")
                    && vars["handle"]["type"] == "$app:Card"
                    && vars["metaobject"]["fields"][0]["key"] == "title"
            })
            .returning(|_, _| {
                Ok(GraphQlResponse::ok(json!({
                    "metaobjectUpsert": {
                        "metaobject": null,
                        "userErrors": [{
                            "field": ["metaobject", "fields", "0"],
                            "message": "Value is too long",
                            "code": "INVALID"
                        }]
                    }
                })))
            });

        let store = store_with(transport);
        let outcome = store
            .upsert_metaobject(
                "$app:Card",
                "summer",
                &[("title".to_string(), "Summer".to_string())],
            )
            .await
            .unwrap();
        assert_eq!(outcome.id, None);
        assert_eq!(outcome.user_errors[0].message, "Value is too long");
    }

    #[tokio::test]
    async fn test_metafields_set_uses_value_shape_type() {
        let mut transport = MockTransport::new();
        transport
            .expect_request()
            .withf(|_, vars| {
                vars["metafields"][0]["type"] == "metaobject_reference"
                    && vars["metafields"][1]["type"] == "list.metaobject_reference"
            })
            .returning(|_, _| {
                Ok(GraphQlResponse::ok(json!({
                    "metafieldsSet": { "metafields": [], "userErrors": [] }
                })))
            });

        let store = store_with(transport);
        let writes = vec![
            MetafieldWrite {
                owner_id: "gid://shopify/Product/1".to_string(),
                namespace: "$app:cards".to_string(),
                key: "card".to_string(),
                value: MetafieldValue::Single("gid://shopify/Metaobject/1".to_string()),
            },
            MetafieldWrite {
                owner_id: "gid://shopify/Product/2".to_string(),
                namespace: "$app:cards".to_string(),
                key: "cards".to_string(),
                value: MetafieldValue::List(vec![
                    "gid://shopify/Metaobject/1".to_string(),
                    "gid://shopify/Metaobject/2".to_string(),
                ]),
            },
        ];
        assert!(store.set_metafields(&writes).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_existing_image_is_reused() {
        let mut transport = MockTransport::new();
        transport
            .expect_request()
            .withf(|query, _| query.contains("FilesByName"))
            .times(1)
            .returning(|_, _| {
                Ok(GraphQlResponse::ok(json!({
                    "files": { "nodes": [{
                        "__typename": "MediaImage",
                        "id": "gid://shopify/MediaImage/4",
                        "image": { "url": "https://cdn.shopify.com/s/files/1/2/hero.png?v=3" }
                    }]}
                })))
            });

        let store = store_with(transport);
        let id = store
            .ensure_media_image("https://cdn.shopify.com/s/files/9/9/hero.png?v=1")
            .await
            .unwrap();
        assert_eq!(id.as_deref(), Some("gid://shopify/MediaImage/4"));
    }

    #[test]
    fn test_file_name() {
        assert_eq!(file_name("https://cdn.x.com/a/b/hero.png?v=1"), "hero.png");
        assert_eq!(file_name("hero.png"), "hero.png");
    }
}
