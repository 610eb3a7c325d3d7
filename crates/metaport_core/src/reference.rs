//! Portable references between stores
//!
//! Records on a store point at each other through opaque `gid://` ids that
//! mean nothing on another store. This module turns a referenced resource into
//! a [`SymbolicRef`] built from natural keys (handles, SKUs, URLs) and parses
//! those strings back so they can be resolved against a destination store.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

/// Prefix shared by every symbolic reference string
pub const SYMBOLIC_PREFIX: &str = "handle://shopify/";

/// Prefix of opaque ids issued by the admin API
pub const OPAQUE_PREFIX: &str = "gid://shopify/";

static APP_NAMESPACED: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^([A-Za-z0-9_]+)--\d+--(.+)$").expect("app namespace pattern is valid")
});

/// Strip the numeric application id out of an app-namespaced type or
/// namespace: `app--258161311745--ComponentGroup` becomes `$app:ComponentGroup`.
///
/// Anything else, including an already normalized name, is returned as is.
pub fn normalize_type(raw: &str) -> String {
    match APP_NAMESPACED.captures(raw) {
        Some(caps) => format!("${}:{}", &caps[1], &caps[2]),
        None => raw.to_string(),
    }
}

/// Kinds of entity a symbolic reference can point at
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ReferenceKind {
    Metaobject,
    Product,
    Page,
    Collection,
    ProductVariant,
    MediaImage,
}

impl ReferenceKind {
    pub const ALL: [ReferenceKind; 6] = [
        ReferenceKind::Metaobject,
        ReferenceKind::Product,
        ReferenceKind::Page,
        ReferenceKind::Collection,
        ReferenceKind::ProductVariant,
        ReferenceKind::MediaImage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ReferenceKind::Metaobject => "Metaobject",
            ReferenceKind::Product => "Product",
            ReferenceKind::Page => "Page",
            ReferenceKind::Collection => "Collection",
            ReferenceKind::ProductVariant => "ProductVariant",
            ReferenceKind::MediaImage => "MediaImage",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == name)
    }

    /// Owners whose metafields may carry back-references to a metaobject
    pub fn is_back_reference_owner(&self) -> bool {
        matches!(
            self,
            ReferenceKind::Product
                | ReferenceKind::ProductVariant
                | ReferenceKind::Collection
                | ReferenceKind::Page
        )
    }
}

impl fmt::Display for ReferenceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A store-independent reference built from natural keys
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SymbolicRef {
    Metaobject { type_name: String, handle: String },
    Product { handle: String },
    Page { handle: String },
    Collection { handle: String },
    ProductVariant { product_handle: String, sku: String },
    MediaImage { url: String },
}

impl SymbolicRef {
    pub fn metaobject(type_name: &str, handle: impl Into<String>) -> Self {
        SymbolicRef::Metaobject {
            type_name: normalize_type(type_name),
            handle: handle.into(),
        }
    }

    pub fn kind(&self) -> ReferenceKind {
        match self {
            SymbolicRef::Metaobject { .. } => ReferenceKind::Metaobject,
            SymbolicRef::Product { .. } => ReferenceKind::Product,
            SymbolicRef::Page { .. } => ReferenceKind::Page,
            SymbolicRef::Collection { .. } => ReferenceKind::Collection,
            SymbolicRef::ProductVariant { .. } => ReferenceKind::ProductVariant,
            SymbolicRef::MediaImage { .. } => ReferenceKind::MediaImage,
        }
    }

    /// Parse a symbolic reference string.
    ///
    /// Returns `None` for anything that is not a well-formed reference; such
    /// strings are ordinary field values.
    pub fn parse(value: &str) -> Option<Self> {
        let rest = value.strip_prefix(SYMBOLIC_PREFIX)?;
        let (kind, segments) = rest.split_once('/')?;
        if segments.is_empty() {
            return None;
        }

        match ReferenceKind::from_name(kind)? {
            ReferenceKind::Metaobject => {
                let (type_name, handle) = segments.split_once('/')?;
                if type_name.is_empty() || handle.is_empty() || handle.contains('/') {
                    return None;
                }
                Some(SymbolicRef::Metaobject {
                    type_name: type_name.to_string(),
                    handle: handle.to_string(),
                })
            }
            ReferenceKind::ProductVariant => {
                let (product_handle, sku) = segments.split_once('/')?;
                if product_handle.is_empty() || sku.is_empty() {
                    return None;
                }
                Some(SymbolicRef::ProductVariant {
                    product_handle: product_handle.to_string(),
                    sku: sku.to_string(),
                })
            }
            ReferenceKind::MediaImage => Some(SymbolicRef::MediaImage {
                url: segments.to_string(),
            }),
            kind => {
                if segments.contains('/') {
                    return None;
                }
                let handle = segments.to_string();
                Some(match kind {
                    ReferenceKind::Product => SymbolicRef::Product { handle },
                    ReferenceKind::Page => SymbolicRef::Page { handle },
                    _ => SymbolicRef::Collection { handle },
                })
            }
        }
    }
}

impl fmt::Display for SymbolicRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}/", SYMBOLIC_PREFIX, self.kind())?;
        match self {
            SymbolicRef::Metaobject { type_name, handle } => write!(f, "{type_name}/{handle}"),
            SymbolicRef::Product { handle }
            | SymbolicRef::Page { handle }
            | SymbolicRef::Collection { handle } => f.write_str(handle),
            SymbolicRef::ProductVariant {
                product_handle,
                sku,
            } => write!(f, "{product_handle}/{sku}"),
            SymbolicRef::MediaImage { url } => f.write_str(url),
        }
    }
}

impl Serialize for SymbolicRef {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for SymbolicRef {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        SymbolicRef::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("not a symbolic reference: {raw}")))
    }
}

/// A resource referenced from a source store, as decoded from the admin API
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceRef {
    Metaobject {
        id: String,
        type_name: String,
        handle: Option<String>,
    },
    Product {
        id: String,
        handle: Option<String>,
    },
    Page {
        id: String,
        handle: Option<String>,
    },
    Collection {
        id: String,
        handle: Option<String>,
    },
    ProductVariant {
        id: String,
        sku: Option<String>,
        product_handle: Option<String>,
    },
    MediaImage {
        id: String,
        url: Option<String>,
    },
    Other {
        id: String,
        typename: String,
    },
}

impl ResourceRef {
    pub fn id(&self) -> &str {
        match self {
            ResourceRef::Metaobject { id, .. }
            | ResourceRef::Product { id, .. }
            | ResourceRef::Page { id, .. }
            | ResourceRef::Collection { id, .. }
            | ResourceRef::ProductVariant { id, .. }
            | ResourceRef::MediaImage { id, .. }
            | ResourceRef::Other { id, .. } => id,
        }
    }

    pub fn kind(&self) -> Option<ReferenceKind> {
        match self {
            ResourceRef::Metaobject { .. } => Some(ReferenceKind::Metaobject),
            ResourceRef::Product { .. } => Some(ReferenceKind::Product),
            ResourceRef::Page { .. } => Some(ReferenceKind::Page),
            ResourceRef::Collection { .. } => Some(ReferenceKind::Collection),
            ResourceRef::ProductVariant { .. } => Some(ReferenceKind::ProductVariant),
            ResourceRef::MediaImage { .. } => Some(ReferenceKind::MediaImage),
            ResourceRef::Other { .. } => None,
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Build the symbolic reference for a resource, or `None` when a natural key
/// it needs is missing.
pub fn to_symbolic_ref(resource: &ResourceRef) -> Option<SymbolicRef> {
    match resource {
        ResourceRef::Metaobject {
            type_name, handle, ..
        } => Some(SymbolicRef::metaobject(type_name, non_empty(handle)?)),
        ResourceRef::Product { handle, .. } => Some(SymbolicRef::Product {
            handle: non_empty(handle)?.to_string(),
        }),
        ResourceRef::Page { handle, .. } => Some(SymbolicRef::Page {
            handle: non_empty(handle)?.to_string(),
        }),
        ResourceRef::Collection { handle, .. } => Some(SymbolicRef::Collection {
            handle: non_empty(handle)?.to_string(),
        }),
        // A SKU alone is not unique across products, so both keys are needed
        ResourceRef::ProductVariant {
            sku,
            product_handle,
            ..
        } => Some(SymbolicRef::ProductVariant {
            product_handle: non_empty(product_handle)?.to_string(),
            sku: non_empty(sku)?.to_string(),
        }),
        ResourceRef::MediaImage { url, .. } => Some(SymbolicRef::MediaImage {
            url: non_empty(url)?.to_string(),
        }),
        ResourceRef::Other { .. } => None,
    }
}

/// Whether a string is an opaque admin API id
pub fn is_opaque_id(value: &str) -> bool {
    value.starts_with(OPAQUE_PREFIX)
}

/// Whether an opaque id belongs to a metaobject
pub fn is_metaobject_id(value: &str) -> bool {
    value
        .strip_prefix(OPAQUE_PREFIX)
        .is_some_and(|rest| rest.starts_with("Metaobject/"))
}
