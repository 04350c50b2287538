//! In-memory endpoint catalog with filtered, grouped listing

use std::collections::{BTreeMap, BTreeSet, HashSet};

use catalog_core::{HttpMethod, OperationDescriptor};
use serde::Serialize;
use tracing::warn;

use super::ToolDefinitionStore;
use super::category::category_for;
use crate::{Error, Result};

/// Minimum length of a free-text search term
pub const MIN_SEARCH_LEN: usize = 2;

/// Optional discovery filters
#[derive(Debug, Clone, Default)]
pub struct ListFilters {
    /// Exact method filter (case-insensitive)
    pub method: Option<String>,
    /// Case-insensitive substring matched against tags
    pub category: Option<String>,
    /// Case-insensitive substring matched against name, description or path
    pub search: Option<String>,
    /// Include the extended projection
    pub include_details: bool,
}

/// Compact projection of a descriptor
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointEntry {
    /// Operation name
    pub name: String,
    /// HTTP method
    pub method: HttpMethod,
    /// Path template
    pub path: String,
    /// Description
    pub description: String,
    /// Extended projection, present when details were requested
    #[serde(flatten)]
    pub details: Option<EndpointDetails>,
}

/// Extended projection of a descriptor
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointDetails {
    /// Category labels
    pub tags: Vec<String>,
    /// Whether the path template has `{...}` placeholders
    pub has_path_params: bool,
    /// Whether the method conventionally carries a body
    pub accepts_body: bool,
    /// Number of input schema properties
    pub input_property_count: usize,
}

/// Result of a catalog listing
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogListing {
    /// Number of matching endpoints
    pub total: usize,
    /// Categories present in the result, alphabetical
    pub categories: Vec<String>,
    /// Matching endpoints grouped by category
    pub endpoints: BTreeMap<String, Vec<EndpointEntry>>,
}

/// Read-only index over the stored descriptors
#[derive(Debug, Clone, Default)]
pub struct EndpointCatalog {
    /// Sorted by method precedence, then path, then name
    descriptors: Vec<OperationDescriptor>,
}

impl EndpointCatalog {
    /// Build a catalog, dropping later duplicates of a name or `(method, path)`
    #[must_use]
    pub fn new(descriptors: Vec<OperationDescriptor>) -> Self {
        let mut names = HashSet::new();
        let mut operations = HashSet::new();
        let mut unique = Vec::with_capacity(descriptors.len());

        for descriptor in descriptors {
            if !names.insert(descriptor.name.clone()) {
                warn!(name = %descriptor.name, "Duplicate operation name in catalog, keeping first");
                continue;
            }
            if !operations.insert((descriptor.method, descriptor.path.clone())) {
                warn!(
                    name = %descriptor.name,
                    method = %descriptor.method,
                    path = %descriptor.path,
                    "Duplicate operation in catalog, keeping first"
                );
                continue;
            }
            unique.push(descriptor);
        }

        unique.sort_by(|a, b| {
            a.method
                .cmp(&b.method)
                .then_with(|| a.path.cmp(&b.path))
                .then_with(|| a.name.cmp(&b.name))
        });

        Self {
            descriptors: unique,
        }
    }

    /// Load every chunk of the store into a catalog
    pub async fn load(store: &ToolDefinitionStore) -> Result<Self> {
        let descriptors = store
            .load_all()
            .await?
            .into_iter()
            .flat_map(|(_, chunk)| chunk)
            .collect();
        Ok(Self::new(descriptors))
    }

    /// Number of descriptors
    #[must_use]
    pub fn len(&self) -> usize {
        self.descriptors.len()
    }

    /// Whether the catalog is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.descriptors.is_empty()
    }

    /// Exact lookup by method and path template
    #[must_use]
    pub fn find(&self, method: HttpMethod, path: &str) -> Option<&OperationDescriptor> {
        self.descriptors.iter().find(|d| d.matches(method, path))
    }

    /// Every category currently known, alphabetical
    #[must_use]
    pub fn categories(&self) -> Vec<String> {
        self.descriptors
            .iter()
            .map(category_for)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// List descriptors matching all active filters, grouped by category
    pub fn list(&self, filters: &ListFilters) -> Result<CatalogListing> {
        let method = match non_empty(filters.method.as_deref()) {
            Some(raw) => Some(raw.parse::<HttpMethod>().map_err(|_| {
                Error::InvalidFilter(format!(
                    "Unsupported method filter '{raw}'. Use one of: {}",
                    HttpMethod::names().join(", ")
                ))
            })?),
            None => None,
        };

        let search = match non_empty(filters.search.as_deref()) {
            Some(term) if term.chars().count() < MIN_SEARCH_LEN => {
                return Err(Error::InvalidFilter(format!(
                    "Search term '{term}' is too short (minimum {MIN_SEARCH_LEN} characters)"
                )));
            }
            Some(term) => Some(term.to_lowercase()),
            None => None,
        };

        let category = non_empty(filters.category.as_deref()).map(str::to_lowercase);

        let mut endpoints: BTreeMap<String, Vec<EndpointEntry>> = BTreeMap::new();
        let mut total = 0;

        for descriptor in &self.descriptors {
            if method.is_some_and(|m| descriptor.method != m) {
                continue;
            }
            if let Some(ref wanted) = category {
                if !matches_category(descriptor, wanted) {
                    continue;
                }
            }
            if let Some(ref term) = search {
                if !matches_search(descriptor, term) {
                    continue;
                }
            }

            total += 1;
            endpoints
                .entry(category_for(descriptor))
                .or_default()
                .push(project(descriptor, filters.include_details));
        }

        Ok(CatalogListing {
            total,
            categories: endpoints.keys().cloned().collect(),
            endpoints,
        })
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

/// Substring match against tags; untagged descriptors match their derived category
fn matches_category(descriptor: &OperationDescriptor, wanted: &str) -> bool {
    if descriptor.tags.is_empty() {
        return category_for(descriptor).to_lowercase().contains(wanted);
    }
    descriptor
        .tags
        .iter()
        .any(|tag| tag.to_lowercase().contains(wanted))
}

fn matches_search(descriptor: &OperationDescriptor, term: &str) -> bool {
    descriptor.name.to_lowercase().contains(term)
        || descriptor.description.to_lowercase().contains(term)
        || descriptor.path.to_lowercase().contains(term)
}

fn project(descriptor: &OperationDescriptor, include_details: bool) -> EndpointEntry {
    EndpointEntry {
        name: descriptor.name.clone(),
        method: descriptor.method,
        path: descriptor.path.clone(),
        description: descriptor.description.clone(),
        details: include_details.then(|| EndpointDetails {
            tags: descriptor.tags.clone(),
            has_path_params: descriptor.has_path_params(),
            accepts_body: descriptor.method.carries_body(),
            input_property_count: descriptor.input_property_count(),
        }),
    }
}
