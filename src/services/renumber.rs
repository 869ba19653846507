use std::collections::HashMap;
use std::sync::Arc;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::RenumberKindSettings;
use crate::error::{AppError, Result};
use crate::store::{Document, DocumentStore, FieldUpdate};

/// Outcome of one renumbering run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RenumberSummary {
    pub kind: String,
    pub renumbered: usize,
    /// Documents whose id already followed the required format.
    pub untouched: usize,
    /// Reference fields rewritten across other collections.
    pub references_updated: usize,
    pub dry_run: bool,
    /// Old id to new id, in assignment order.
    pub mapping: Vec<(String, String)>,
}

/// Rewrites legacy document ids into the sequential `{PREFIX}-{NNNN}` scheme
/// and cascades the change through every collection that references them.
///
/// The full old-to-new mapping is computed before any write. Writes then run
/// in three phases: new documents first, reference rewrites second, old
/// document deletion last, so an interrupted run leaves duplicates rather
/// than dangling references.
pub struct RenumberService {
    store: Arc<dyn DocumentStore>,
}

impl RenumberService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub async fn run(
        &self,
        spec: &RenumberKindSettings,
        dry_run: bool,
    ) -> Result<RenumberSummary> {
        let pattern = Regex::new(&spec.id_pattern).map_err(|e| {
            AppError::Validation(format!(
                "invalid id pattern for '{}': {}",
                spec.kind, e
            ))
        })?;

        let docs = self.store.get_all(&spec.collection).await?;
        let (mapping, untouched) = build_mapping(&docs, &pattern, spec);

        let mut summary = RenumberSummary {
            kind: spec.kind.clone(),
            renumbered: mapping.len(),
            untouched,
            references_updated: 0,
            dry_run,
            mapping: mapping
                .iter()
                .map(|(old, new)| (old.clone(), new.clone()))
                .collect(),
        };
        if dry_run || mapping.is_empty() {
            return Ok(summary);
        }
        let by_old: HashMap<&str, &str> = mapping
            .iter()
            .map(|(old, new)| (old.as_str(), new.as_str()))
            .collect();

        // Phase 1: write the renamed documents.
        let mut new_docs = Vec::new();
        for doc in &docs {
            let Some(new_id) = by_old.get(doc.id.as_str()) else {
                continue;
            };
            let mut data = doc.data.clone();
            if let Value::Object(body) = &mut data {
                body.insert("id".to_string(), Value::String((*new_id).to_string()));
                body.insert(
                    "updated_at".to_string(),
                    Value::String(chrono::Utc::now().to_rfc3339()),
                );
            }
            new_docs.push(Document {
                id: (*new_id).to_string(),
                data,
            });
        }
        let ceiling = self.store.max_batch_ops();
        for chunk in new_docs.chunks(ceiling) {
            self.store
                .append_batch(&spec.collection, chunk.to_vec())
                .await?;
        }

        // Phase 2: rewrite every reference field pointing at an old id.
        for reference in &spec.references {
            let referencing = self.store.get_all(&reference.collection).await?;
            let updates: Vec<FieldUpdate> = referencing
                .iter()
                .filter_map(|doc| {
                    let old = doc.field(&reference.field)?.as_str()?;
                    let new = by_old.get(old)?;
                    Some(FieldUpdate::set(
                        doc.id.clone(),
                        &reference.field,
                        Value::String((*new).to_string()),
                    ))
                })
                .collect();
            summary.references_updated += updates.len();
            for chunk in updates.chunks(ceiling) {
                self.store
                    .update_batch(&reference.collection, chunk.to_vec())
                    .await?;
            }
        }

        // Phase 3: drop the old documents.
        let old_ids: Vec<String> = mapping.iter().map(|(old, _)| old.clone()).collect();
        for chunk in old_ids.chunks(ceiling) {
            self.store
                .delete_batch(&spec.collection, chunk.to_vec())
                .await?;
        }

        tracing::info!(
            kind = %spec.kind,
            renumbered = summary.renumbered,
            references = summary.references_updated,
            "renumbering finished"
        );
        Ok(summary)
    }
}

/// Assigns new sequential ids to every document whose id does not yet follow
/// the required format. Candidates are ordered by their `name` field (falling
/// back to the id) so the new numbering reads alphabetically; numbering
/// continues after the highest number already assigned in the format, or
/// starts at the seed.
fn build_mapping(
    docs: &[Document],
    pattern: &Regex,
    spec: &RenumberKindSettings,
) -> (Vec<(String, String)>, usize) {
    let numbered = Regex::new(&format!(r"^{}-(\d+)$", regex::escape(&spec.prefix)))
        .expect("prefix regex is built from an escaped literal");

    let mut next = spec.seed;
    let mut candidates = Vec::new();
    let mut untouched = 0;
    for doc in docs {
        if pattern.is_match(&doc.id) {
            // Already in the required format; only advances the counter.
            if let Some(caps) = numbered.captures(&doc.id) {
                if let Ok(n) = caps[1].parse::<u32>() {
                    next = next.max(n + 1);
                }
            }
            untouched += 1;
        } else {
            let sort_key = doc
                .field("name")
                .and_then(Value::as_str)
                .unwrap_or(&doc.id)
                .to_string();
            candidates.push((sort_key, doc.id.clone()));
        }
    }

    candidates.sort();
    let mapping = candidates
        .into_iter()
        .map(|(_, old)| {
            let new = format!("{}-{:04}", spec.prefix, next);
            next += 1;
            (old, new)
        })
        .collect();
    (mapping, untouched)
}
