//! Catalog synchronization against the live API description
//!
//! A sync run is a single exclusive maintenance pass:
//!
//! 1. fetch and parse the live description (failure aborts the run)
//! 2. walk every existing chunk in slot order (a corrupt chunk aborts the run)
//! 3. match each descriptor by exact path and method; unmatched descriptors
//!    are left untouched, never deleted
//! 4. recompute the flattened `(inputSchema, outputSchema)` pair and
//!    overwrite it when it differs, marking the chunk dirty
//! 5. validate every descriptor's schemas (reported, never fatal)
//! 6. rewrite dirty chunks only, then split any of them past the limit
//!
//! Concurrent runs against the same store must be serialized by the caller.

mod openapi;
mod source;

pub use openapi::{ApiDescription, Parameter, RawOperation, format_name, resolve_refs};
pub use source::{
    DescriptionSource, FileDescriptionSource, HttpDescriptionSource, StaticDescriptionSource,
};

use std::collections::HashSet;
use std::sync::Arc;

use catalog_core::{HttpMethod, OperationDescriptor};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::Result;
use crate::catalog::ToolDefinitionStore;

/// Options for a sync run
#[derive(Debug, Clone, Copy, Default)]
pub struct SyncOptions {
    /// Append descriptors for live operations that have none yet
    pub add_missing: bool,
}

/// A descriptor schema that is not a well-formed object schema
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaIssue {
    /// Descriptor name
    pub name: String,
    /// `inputSchema` or `outputSchema`
    pub field: String,
    /// What is wrong
    pub reason: String,
}

/// Outcome of one sync run
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    /// Where the live description came from
    pub source: String,
    /// Chunk files read
    pub shards_scanned: usize,
    /// Descriptors compared against the live description
    pub descriptors_checked: usize,
    /// Descriptors whose schemas were overwritten
    pub updated: Vec<String>,
    /// Descriptors with no live counterpart (left untouched)
    pub unmatched: Vec<String>,
    /// Descriptors created for live operations missing from the catalog
    pub added: Vec<String>,
    /// Schema validation problems
    pub validation_issues: Vec<SchemaIssue>,
    /// Chunks rewritten
    pub rewritten_shards: Vec<u32>,
    /// Chunks that received overflow from a split
    pub split_into: Vec<u32>,
    /// Chunk write or split failures (the run continued)
    pub write_failures: Vec<String>,
    /// Set when the run was aborted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aborted: Option<String>,
}

impl SyncReport {
    /// Whether the run completed without aborting or failing a write
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.aborted.is_none() && self.write_failures.is_empty()
    }
}

struct Chunk {
    slot: u32,
    descriptors: Vec<OperationDescriptor>,
    dirty: bool,
}

/// Keeps the stored catalog in line with the live description
pub struct SyncEngine {
    store: ToolDefinitionStore,
    source: Arc<dyn DescriptionSource>,
    options: SyncOptions,
}

impl SyncEngine {
    /// Create an engine writing to `store` and reading from `source`
    pub fn new(store: ToolDefinitionStore, source: Arc<dyn DescriptionSource>) -> Self {
        Self {
            store,
            source,
            options: SyncOptions::default(),
        }
    }

    /// Set run options
    #[must_use]
    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Run a sync pass, reporting an abort instead of returning an error
    pub async fn run(&self) -> SyncReport {
        match self.sync().await {
            Ok(report) => report,
            Err(e) => {
                error!(source = %self.source.location(), error = %e, "Sync aborted");
                SyncReport {
                    source: self.source.location(),
                    aborted: Some(e.to_string()),
                    ..Default::default()
                }
            }
        }
    }

    /// Run a sync pass.
    ///
    /// # Errors
    ///
    /// Fetch, parse and chunk load failures abort the run. Per-descriptor
    /// validation problems and chunk write failures are reported instead.
    pub async fn sync(&self) -> Result<SyncReport> {
        let mut report = SyncReport {
            source: self.source.location(),
            ..Default::default()
        };

        info!(source = %report.source, "Starting sync");
        let document = self.source.fetch().await?;
        let description = ApiDescription::parse(&document)?;

        let mut chunks: Vec<Chunk> = self
            .store
            .load_all()
            .await?
            .into_iter()
            .map(|(slot, descriptors)| Chunk {
                slot,
                descriptors,
                dirty: false,
            })
            .collect();

        let mut known: HashSet<(HttpMethod, String)> = HashSet::new();
        let mut names: HashSet<String> = HashSet::new();

        for chunk in &mut chunks {
            report.shards_scanned += 1;

            for descriptor in &mut chunk.descriptors {
                report.descriptors_checked += 1;
                known.insert((descriptor.method, descriptor.path.clone()));
                names.insert(descriptor.name.clone());

                match description.find(descriptor.method, &descriptor.path) {
                    Some(operation) => {
                        if refresh_schemas(descriptor, operation) {
                            info!(
                                name = %descriptor.name,
                                slot = chunk.slot,
                                "Updated descriptor schemas"
                            );
                            report.updated.push(descriptor.name.clone());
                            chunk.dirty = true;
                        }
                    }
                    None => {
                        debug!(
                            name = %descriptor.name,
                            method = %descriptor.method,
                            path = %descriptor.path,
                            "No live operation for descriptor, leaving it untouched"
                        );
                        report.unmatched.push(descriptor.name.clone());
                    }
                }

                for issue in validate_descriptor(descriptor) {
                    warn!(name = %issue.name, field = %issue.field, reason = %issue.reason, "Invalid descriptor schema");
                    report.validation_issues.push(issue);
                }
            }
        }

        if self.options.add_missing {
            self.add_missing(&description, &known, &mut names, &mut chunks, &mut report);
        }

        // All dirty chunks are on disk before any split reads them back
        for chunk in chunks.iter().filter(|c| c.dirty) {
            if let Err(e) = self.store.write(chunk.slot, &chunk.descriptors).await {
                error!(slot = chunk.slot, error = %e, "Failed to write chunk");
                report.write_failures.push(e.to_string());
                continue;
            }
            report.rewritten_shards.push(chunk.slot);
        }

        for &slot in &report.rewritten_shards {
            match self.store.enforce_size(slot).await {
                Ok(targets) => {
                    for target in targets {
                        if !report.split_into.contains(&target) {
                            report.split_into.push(target);
                        }
                    }
                }
                Err(e) => {
                    error!(slot, error = %e, "Failed to split chunk");
                    report.write_failures.push(e.to_string());
                }
            }
        }

        info!(
            shards = report.shards_scanned,
            checked = report.descriptors_checked,
            updated = report.updated.len(),
            added = report.added.len(),
            unmatched = report.unmatched.len(),
            issues = report.validation_issues.len(),
            rewritten = ?report.rewritten_shards,
            "Sync complete"
        );

        Ok(report)
    }

    /// Append descriptors for live operations with no catalog entry to the
    /// last chunk (or a new first chunk)
    fn add_missing(
        &self,
        description: &ApiDescription,
        known: &HashSet<(HttpMethod, String)>,
        names: &mut HashSet<String>,
        chunks: &mut Vec<Chunk>,
        report: &mut SyncReport,
    ) {
        let missing: Vec<OperationDescriptor> = description
            .operations()
            .iter()
            .filter(|op| !known.contains(&(op.method, op.path.clone())))
            .map(|op| {
                let mut descriptor = op.to_descriptor();
                descriptor.name = unique_name(&descriptor.name, names);
                names.insert(descriptor.name.clone());
                descriptor
            })
            .collect();

        if missing.is_empty() {
            return;
        }

        if chunks.is_empty() {
            let Some(first) = self.store.slots().next() else {
                return;
            };
            chunks.push(Chunk {
                slot: first,
                descriptors: Vec::new(),
                dirty: false,
            });
        }

        let Some(target) = chunks.last_mut() else {
            return;
        };
        for descriptor in missing {
            info!(name = %descriptor.name, slot = target.slot, "Added descriptor");
            report.added.push(descriptor.name.clone());
            for issue in validate_descriptor(&descriptor) {
                report.validation_issues.push(issue);
            }
            target.descriptors.push(descriptor);
        }
        target.dirty = true;
    }
}

/// Overwrite a descriptor's schemas when they differ from the live ones.
/// Returns whether anything changed.
fn refresh_schemas(descriptor: &mut OperationDescriptor, operation: &RawOperation) -> bool {
    let (input, output) = operation.flattened_schemas();
    if descriptor.input_schema == input && descriptor.output_schema == output {
        return false;
    }
    descriptor.input_schema = input;
    descriptor.output_schema = output;
    true
}

/// Check both schemas are object schemas with an optional `properties` map
#[must_use]
pub fn validate_descriptor(descriptor: &OperationDescriptor) -> Vec<SchemaIssue> {
    [
        ("inputSchema", &descriptor.input_schema),
        ("outputSchema", &descriptor.output_schema),
    ]
    .into_iter()
    .filter_map(|(field, schema)| {
        schema_problem(schema).map(|reason| SchemaIssue {
            name: descriptor.name.clone(),
            field: field.to_string(),
            reason,
        })
    })
    .collect()
}

fn schema_problem(schema: &Value) -> Option<String> {
    let Some(map) = schema.as_object() else {
        return Some("schema is not an object".to_string());
    };
    match map.get("type").and_then(Value::as_str) {
        Some("object") => {}
        Some(other) => return Some(format!("expected type 'object', found '{other}'")),
        None => return Some("missing type 'object'".to_string()),
    }
    match map.get("properties") {
        None | Some(Value::Object(_)) => None,
        Some(_) => Some("'properties' is not a map".to_string()),
    }
}

fn unique_name(base: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(base) {
        return base.to_string();
    }
    (2..)
        .map(|n| format!("{base}_{n}"))
        .find(|candidate| !taken.contains(candidate))
        .unwrap_or_else(|| base.to_string())
}
