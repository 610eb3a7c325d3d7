//! Admin API GraphQL documents

use crate::reference::ReferenceKind;

/// Natural keys of any referenced resource
pub const RESOURCE_KEY_FRAGMENT: &str = r#"
fragment ResourceKey on Node {
  __typename
  id
  ... on Metaobject { type handle }
  ... on Product { handle }
  ... on Collection { handle }
  ... on Page { handle }
  ... on ProductVariant { sku product { handle } }
  ... on MediaImage { image { url } }
}
"#;

pub const METAOBJECT_DEFINITIONS: &str = r#"
query MetaobjectDefinitions($first: Int!, $after: String) {
  metaobjectDefinitions(first: $first, after: $after) {
    nodes { type }
    pageInfo { hasNextPage endCursor }
  }
}
"#;

const METAOBJECTS_PAGE_BODY: &str = r#"
query MetaobjectsPage($type: String!, $first: Int!, $after: String, $withBackReferences: Boolean!, $backReferences: Int!) {
  metaobjects(type: $type, first: $first, after: $after) {
    nodes {
      id
      handle
      type
      fields {
        key
        type
        value
        reference { ...ResourceKey }
        references(first: 250) { nodes { ...ResourceKey } }
      }
      referencedBy(first: $backReferences) @include(if: $withBackReferences) {
        nodes { key namespace referencer { ...ResourceKey } }
        pageInfo { hasNextPage endCursor }
      }
    }
    pageInfo { hasNextPage endCursor }
  }
}
"#;

const BACK_REFERENCES_PAGE_BODY: &str = r#"
query MetaobjectBackReferences($id: ID!, $first: Int!, $after: String) {
  metaobject(id: $id) {
    referencedBy(first: $first, after: $after) {
      nodes { key namespace referencer { ...ResourceKey } }
      pageInfo { hasNextPage endCursor }
    }
  }
}
"#;

pub fn metaobjects_page() -> String {
    format!("{METAOBJECTS_PAGE_BODY}{RESOURCE_KEY_FRAGMENT}")
}

pub fn back_references_page() -> String {
    format!("{BACK_REFERENCES_PAGE_BODY}{RESOURCE_KEY_FRAGMENT}")
}

/// Root connection field and operation name for handle lookups
pub fn handle_connection(kind: ReferenceKind) -> Option<(&'static str, &'static str)> {
    match kind {
        ReferenceKind::Product => Some(("products", "ProductsByHandle")),
        ReferenceKind::Collection => Some(("collections", "CollectionsByHandle")),
        ReferenceKind::Page => Some(("pages", "PagesByHandle")),
        _ => None,
    }
}

pub fn by_handles(connection: &str, operation: &str) -> String {
    format!(
        "query {operation}($first: Int!, $query: String!) {{\n  \
         {connection}(first: $first, query: $query) {{ nodes {{ id handle }} }}\n}}\n"
    )
}

/// Search filter matching any of the handles
pub fn handle_filter(handles: &[String]) -> String {
    handles
        .iter()
        .map(|h| format!("handle:\"{}\"", h.replace('"', "\\\"")))
        .collect::<Vec<_>>()
        .join(" OR ")
}

/// One aliased `metaobjectByHandle` lookup per handle, `$h<i>` variables
pub fn metaobjects_by_handle(count: usize) -> String {
    let params: Vec<String> = (0..count).map(|i| format!(", $h{i}: String!")).collect();
    let lookups: Vec<String> = (0..count)
        .map(|i| format!("  m{i}: metaobjectByHandle(handle: {{type: $type, handle: $h{i}}}) {{ id handle }}\n"))
        .collect();
    format!(
        "query MetaobjectsByHandle($type: String!{}) {{\n{}}}\n",
        params.concat(),
        lookups.concat()
    )
}

pub const PRODUCT_VARIANTS: &str = r#"
query ProductVariantsByHandle($handle: String!, $first: Int!, $after: String) {
  productByIdentifier(identifier: {handle: $handle}) {
    id
    variants(first: $first, after: $after) {
      nodes { id sku }
      pageInfo { hasNextPage endCursor }
    }
  }
}
"#;

pub const FILES_BY_NAME: &str = r#"
query FilesByName($query: String!) {
  files(first: 10, query: $query) {
    nodes {
      __typename
      id
      ... on MediaImage { image { url } }
    }
  }
}
"#;

pub const FILE_CREATE: &str = r#"
mutation FileCreate($files: [FileCreateInput!]!) {
  fileCreate(files: $files) {
    files { id }
    userErrors { field message code }
  }
}
"#;

pub const METAOBJECT_UPSERT: &str = r#"
mutation MetaobjectUpsert($handle: MetaobjectHandleInput!, $metaobject: MetaobjectUpsertInput!) {
  metaobjectUpsert(handle: $handle, metaobject: $metaobject) {
    metaobject { id handle }
    userErrors { field message code }
  }
}
"#;

pub const METAFIELDS_SET: &str = r#"
mutation MetafieldsSet($metafields: [MetafieldsSetInput!]!) {
  metafieldsSet(metafields: $metafields) {
    metafields { id }
    userErrors { field message code }
  }
}
"#;
