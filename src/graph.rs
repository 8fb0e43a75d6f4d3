use chrono::NaiveDateTime;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

use crate::errors::{ReportError, ReportResult};
use crate::settings::{normalize_ordered_ids, CycleProfile};

/// Operation sign an invoice type applies to stock/balance totals.
#[derive(Serialize, Deserialize, Clone, Copy, Debug, PartialEq, Eq)]
pub enum StageOperation {
    #[serde(rename = "+")]
    Add,
    #[serde(rename = "-")]
    Subtract,
    #[serde(rename = "=")]
    Neutral,
}

impl StageOperation {
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "+" => Some(StageOperation::Add),
            "-" => Some(StageOperation::Subtract),
            "=" => Some(StageOperation::Neutral),
            _ => None,
        }
    }
}

/// An invoice type as it comes out of the stage catalog.
#[derive(Clone, Debug)]
pub struct StageType {
    pub id: i32,
    pub name: String,
    pub hex_color: Option<String>,
    pub operation: Option<StageOperation>,
    pub sort_number: Option<i32>,
}

/// One resolved column of the report. Position in the stage sequence is the
/// stage index used throughout the reconstruction.
#[derive(Serialize, Clone, Debug)]
pub struct Stage {
    pub type_id: i32,
    pub type_name: String,
    pub column_label: String,
    pub type_hex_color: Option<String>,
    pub type_operation: Option<StageOperation>,
    pub type_sort_number: Option<i32>,
}

/// Resolve the ordered stage sequence for a request.
///
/// `available` holds the active (non-deleted, non-disabled) invoice types
/// ordered by sort number then id. An explicit id list (query override or
/// profile) is honored order-preserving; ids that do not resolve to an
/// active type are dropped silently. Without explicit ids the first
/// `max_auto_stage_count` types carrying a sort number are used. An empty
/// result is terminal for the whole request.
pub fn resolve_stages(
    available: &[StageType],
    profile: &CycleProfile,
    explicit_ids: Option<&[i32]>,
) -> ReportResult<Vec<Stage>> {
    let requested: Vec<i32> = match explicit_ids {
        Some(ids) => normalize_ordered_ids(ids),
        None => profile.stage_type_ids.clone(),
    };

    let picked: Vec<&StageType> = if requested.is_empty() {
        available
            .iter()
            .filter(|t| t.sort_number.is_some())
            .take(profile.max_auto_stage_count)
            .collect()
    } else {
        requested
            .iter()
            .filter_map(|id| available.iter().find(|t| t.id == *id))
            .collect()
    };

    if picked.is_empty() {
        return Err(ReportError::NoActiveStages);
    }

    Ok(picked
        .into_iter()
        .map(|t| Stage {
            type_id: t.id,
            type_name: t.name.clone(),
            column_label: profile
                .stage_labels
                .get(&t.id)
                .cloned()
                .unwrap_or_else(|| t.name.clone()),
            type_hex_color: t.hex_color.clone(),
            type_operation: t.operation,
            type_sort_number: t.sort_number,
        })
        .collect())
}

/// One invoice record as the report sees it. `is_primary` marks whether the
/// invoice matched the request filters directly, as opposed to being pulled
/// in only because a relation references it.
#[derive(Clone, Debug)]
pub struct DocumentRecord {
    pub id: i32,
    pub number: Option<String>,
    pub stage_type_id: i32,
    pub customer_id: Option<i32>,
    pub customer_name: Option<String>,
    pub supplier_id: Option<i32>,
    pub supplier_name: Option<String>,
    pub created_at: Option<NaiveDateTime>,
    pub is_primary: bool,
}

/// A directed conversion between two invoices.
#[derive(Clone, Debug)]
pub struct DocumentRelation {
    pub source_id: i32,
    pub target_id: i32,
    pub relation_type_id: Option<i32>,
}

/// The request-scoped document graph: the stage sequence, the invoice
/// index, and adjacency restricted to immediately-next-stage conversions.
#[derive(Debug, Default)]
pub struct DocumentGraph {
    stages: Vec<Stage>,
    stage_index_by_type: HashMap<i32, usize>,
    documents: IndexMap<i32, DocumentRecord>,
    forward: HashMap<i32, Vec<i32>>,
    backward: HashMap<i32, Vec<i32>>,
}

impl DocumentGraph {
    pub fn new(stages: Vec<Stage>) -> Self {
        let mut stage_index_by_type = HashMap::new();
        for (index, stage) in stages.iter().enumerate() {
            stage_index_by_type.entry(stage.type_id).or_insert(index);
        }
        Self {
            stages,
            stage_index_by_type,
            documents: IndexMap::new(),
            forward: HashMap::new(),
            backward: HashMap::new(),
        }
    }

    /// Build a complete graph in one go. Convenience for tests and the
    /// one-shot pipeline; the service inserts documents in two passes.
    pub fn from_parts(
        stages: Vec<Stage>,
        documents: Vec<DocumentRecord>,
        relations: &[DocumentRelation],
    ) -> Self {
        let mut graph = Self::new(stages);
        for document in documents {
            graph.insert_document(document);
        }
        graph.link_documents(relations);
        graph
    }

    pub fn stages(&self) -> &[Stage] {
        &self.stages
    }

    pub fn stage_count(&self) -> usize {
        self.stages.len()
    }

    pub fn document(&self, id: i32) -> Option<&DocumentRecord> {
        self.documents.get(&id)
    }

    pub fn documents(&self) -> impl Iterator<Item = &DocumentRecord> {
        self.documents.values()
    }

    pub fn document_count(&self) -> usize {
        self.documents.len()
    }

    pub fn primary_document_count(&self) -> usize {
        self.documents.values().filter(|d| d.is_primary).count()
    }

    /// Insert an invoice. A document already present is never overwritten,
    /// so primary entries survive the secondary fetch.
    pub fn insert_document(&mut self, document: DocumentRecord) {
        if !self.stage_index_by_type.contains_key(&document.stage_type_id) {
            debug!(
                "Dropping document {}: type {} is outside the stage set",
                document.id, document.stage_type_id
            );
            return;
        }
        self.documents.entry(document.id).or_insert(document);
    }

    pub fn stage_index_of(&self, document_id: i32) -> Option<usize> {
        let document = self.documents.get(&document_id)?;
        self.stage_index_by_type.get(&document.stage_type_id).copied()
    }

    /// Ids referenced by relations but absent from the index. These are
    /// fetched in a second pass so a cycle can display linked documents
    /// falling outside the filtered window.
    pub fn missing_relation_endpoints(&self, relations: &[DocumentRelation]) -> Vec<i32> {
        let mut missing = Vec::new();
        for relation in relations {
            for id in [relation.source_id, relation.target_id] {
                if !self.documents.contains_key(&id) && !missing.contains(&id) {
                    missing.push(id);
                }
            }
        }
        missing
    }

    /// Build the adjacency maps. An edge survives only when both endpoints
    /// resolve to stage indices and the target sits exactly one stage after
    /// the source; everything else is tolerated dirty data and dropped.
    pub fn link_documents(&mut self, relations: &[DocumentRelation]) {
        let mut kept = 0usize;
        for relation in relations {
            let source_index = self.stage_index_of(relation.source_id);
            let target_index = self.stage_index_of(relation.target_id);
            match (source_index, target_index) {
                (Some(source_index), Some(target_index))
                    if target_index == source_index + 1 =>
                {
                    let targets = self.forward.entry(relation.source_id).or_default();
                    if !targets.contains(&relation.target_id) {
                        targets.push(relation.target_id);
                    }
                    let sources = self.backward.entry(relation.target_id).or_default();
                    if !sources.contains(&relation.source_id) {
                        sources.push(relation.source_id);
                    }
                    kept += 1;
                }
                _ => {
                    debug!(
                        "Dropping relation {} -> {}: not an adjacent-stage conversion",
                        relation.source_id, relation.target_id
                    );
                }
            }
        }
        debug!("Linked {} of {} relations", kept, relations.len());
    }

    pub fn forward_links(&self, id: i32) -> &[i32] {
        self.forward.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn backward_links(&self, id: i32) -> &[i32] {
        self.backward.get(&id).map(Vec::as_slice).unwrap_or(&[])
    }

    fn is_root(&self, id: i32, stage_index: usize) -> bool {
        if stage_index == 0 {
            return true;
        }
        !self
            .backward_links(id)
            .iter()
            .any(|p| self.stage_index_of(*p) == Some(stage_index - 1))
    }

    /// Reconstruct every distinct document path through the stages.
    ///
    /// Roots are documents with no valid predecessor; each root is expanded
    /// depth-first along surviving forward edges, one cloned path buffer
    /// per branch. A path ends at the last stage or at the first document
    /// with no forward candidate, in which case it is emitted with holes
    /// for the remaining stages. Identical slot tuples collapse to the
    /// first-built path. Worst case is exponential in per-document fan-out;
    /// real conversion data keeps the branching small and no cap is
    /// imposed here.
    pub fn reconstruct_paths(&self) -> Vec<DocumentPath> {
        let stage_count = self.stage_count();
        if stage_count == 0 || self.documents.is_empty() {
            return Vec::new();
        }

        let mut roots: Vec<i32> = self
            .documents
            .values()
            .filter(|d| {
                self.stage_index_of(d.id)
                    .map(|index| self.is_root(d.id, index))
                    .unwrap_or(false)
            })
            .map(|d| d.id)
            .collect();

        if roots.is_empty() {
            warn!("No root documents found, treating every document as a root");
            roots = self.documents.keys().copied().collect();
        }

        let mut paths: IndexMap<String, DocumentPath> = IndexMap::new();
        for root in roots {
            if let Some(stage_index) = self.stage_index_of(root) {
                self.expand(
                    root,
                    stage_index,
                    DocumentPath::empty(stage_count),
                    HashSet::new(),
                    &mut paths,
                );
            }
        }

        if paths.is_empty() {
            warn!("Path expansion produced nothing, falling back to singleton paths");
            for document in self.documents.values() {
                if let Some(stage_index) = self.stage_index_of(document.id) {
                    let mut path = DocumentPath::empty(stage_count);
                    path.slots[stage_index] = Some(document.id);
                    paths.entry(path.key()).or_insert(path);
                }
            }
        }

        paths.into_values().collect()
    }

    fn expand(
        &self,
        id: i32,
        stage_index: usize,
        mut path: DocumentPath,
        mut visited: HashSet<i32>,
        paths: &mut IndexMap<String, DocumentPath>,
    ) {
        if !visited.insert(id) {
            // A repeated id means the underlying relation data loops;
            // abandon the branch without emitting anything.
            return;
        }
        path.slots[stage_index] = Some(id);

        if stage_index + 1 == self.stage_count() {
            paths.entry(path.key()).or_insert(path);
            return;
        }

        let candidates: Vec<i32> = self
            .forward_links(id)
            .iter()
            .copied()
            .filter(|target| self.stage_index_of(*target) == Some(stage_index + 1))
            .collect();

        if candidates.is_empty() {
            paths.entry(path.key()).or_insert(path);
            return;
        }

        for candidate in candidates {
            self.expand(candidate, stage_index + 1, path.clone(), visited.clone(), paths);
        }
    }
}

/// A reconstructed path: one slot per stage, holding an invoice id or a
/// hole. Adjacent non-hole slots are always connected by a surviving edge.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DocumentPath {
    slots: Vec<Option<i32>>,
}

impl DocumentPath {
    fn empty(stage_count: usize) -> Self {
        Self {
            slots: vec![None; stage_count],
        }
    }

    pub fn slots(&self) -> &[Option<i32>] {
        &self.slots
    }

    /// Identity of the path: slot values joined with `-`, holes encoded
    /// as `0`.
    pub fn key(&self) -> String {
        self.slots
            .iter()
            .map(|slot| slot.unwrap_or(0).to_string())
            .collect::<Vec<_>>()
            .join("-")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(type_id: i32, name: &str) -> Stage {
        Stage {
            type_id,
            type_name: name.to_string(),
            column_label: name.to_string(),
            type_hex_color: None,
            type_operation: None,
            type_sort_number: Some(type_id),
        }
    }

    fn doc(id: i32, stage_type_id: i32, customer_id: Option<i32>) -> DocumentRecord {
        DocumentRecord {
            id,
            number: Some(format!("DOC-{}", id)),
            stage_type_id,
            customer_id,
            customer_name: customer_id.map(|c| format!("Customer {}", c)),
            supplier_id: None,
            supplier_name: None,
            created_at: None,
            is_primary: true,
        }
    }

    fn rel(source_id: i32, target_id: i32) -> DocumentRelation {
        DocumentRelation {
            source_id,
            target_id,
            relation_type_id: None,
        }
    }

    fn three_stages() -> Vec<Stage> {
        vec![stage(1, "Quote"), stage(2, "Order"), stage(3, "Invoice")]
    }

    fn keys(paths: &[DocumentPath]) -> Vec<String> {
        paths.iter().map(|p| p.key()).collect()
    }

    #[test]
    fn test_resolve_stages_fallback_uses_sort_order() {
        let available = vec![
            StageType {
                id: 7,
                name: "Quote".to_string(),
                hex_color: None,
                operation: None,
                sort_number: Some(1),
            },
            StageType {
                id: 9,
                name: "Order".to_string(),
                hex_color: None,
                operation: None,
                sort_number: Some(2),
            },
            StageType {
                id: 4,
                name: "Draft".to_string(),
                hex_color: None,
                operation: None,
                sort_number: None,
            },
        ];
        let profile = CycleProfile {
            max_auto_stage_count: 2,
            ..Default::default()
        };

        let stages = resolve_stages(&available, &profile, None).unwrap();
        let ids: Vec<i32> = stages.iter().map(|s| s.type_id).collect();
        assert_eq!(ids, vec![7, 9]);
    }

    #[test]
    fn test_resolve_stages_explicit_ids_drop_unknown() {
        let available = vec![StageType {
            id: 2,
            name: "Order".to_string(),
            hex_color: None,
            operation: None,
            sort_number: Some(1),
        }];
        let profile = CycleProfile::default();

        let stages = resolve_stages(&available, &profile, Some(&[5, 2, 5])).unwrap();
        assert_eq!(stages.len(), 1);
        assert_eq!(stages[0].type_id, 2);

        let err = resolve_stages(&available, &profile, Some(&[5, 6])).unwrap_err();
        assert!(matches!(err, ReportError::NoActiveStages));
    }

    #[test]
    fn test_resolve_stages_applies_label_overrides() {
        let available = vec![StageType {
            id: 1,
            name: "Quote".to_string(),
            hex_color: None,
            operation: None,
            sort_number: Some(1),
        }];
        let profile = CycleProfile {
            stage_type_ids: vec![1],
            stage_labels: std::collections::HashMap::from([(1, "Offers".to_string())]),
            ..Default::default()
        };

        let stages = resolve_stages(&available, &profile, None).unwrap();
        assert_eq!(stages[0].column_label, "Offers");
        assert_eq!(stages[0].type_name, "Quote");
    }

    #[test]
    fn test_link_documents_discards_non_adjacent_edges() {
        let graph = DocumentGraph::from_parts(
            three_stages(),
            vec![doc(100, 1, Some(5)), doc(200, 2, Some(5)), doc(300, 3, Some(5))],
            &[rel(100, 300), rel(300, 200), rel(100, 200)],
        );

        assert_eq!(graph.forward_links(100), &[200]);
        assert!(graph.forward_links(300).is_empty());
        assert_eq!(graph.backward_links(200), &[100]);
        assert!(graph.backward_links(300).is_empty());
    }

    #[test]
    fn test_full_chain_single_path() {
        let graph = DocumentGraph::from_parts(
            three_stages(),
            vec![doc(100, 1, Some(5)), doc(200, 2, Some(5)), doc(300, 3, Some(5))],
            &[rel(100, 200), rel(200, 300)],
        );

        let paths = graph.reconstruct_paths();
        assert_eq!(keys(&paths), vec!["100-200-300"]);
    }

    #[test]
    fn test_branching_produces_distinct_paths() {
        let graph = DocumentGraph::from_parts(
            three_stages(),
            vec![doc(100, 1, Some(5)), doc(200, 2, Some(5)), doc(201, 2, Some(5))],
            &[rel(100, 200), rel(100, 201)],
        );

        let mut path_keys = keys(&graph.reconstruct_paths());
        path_keys.sort();
        assert_eq!(path_keys, vec!["100-200-0", "100-201-0"]);
    }

    #[test]
    fn test_no_edges_yields_singletons() {
        let graph = DocumentGraph::from_parts(
            three_stages(),
            vec![doc(100, 1, Some(5)), doc(200, 2, Some(6)), doc(300, 3, Some(7))],
            &[],
        );

        let mut path_keys = keys(&graph.reconstruct_paths());
        path_keys.sort();
        assert_eq!(path_keys, vec!["0-0-300", "0-200-0", "100-0-0"]);
    }

    #[test]
    fn test_skip_stage_edge_never_fills_middle_slot() {
        let graph = DocumentGraph::from_parts(
            three_stages(),
            vec![doc(100, 1, Some(5)), doc(300, 3, Some(5))],
            &[rel(100, 300)],
        );

        let mut path_keys = keys(&graph.reconstruct_paths());
        path_keys.sort();
        // The invoice at the last stage roots independently, never gets
        // inferred into the middle slot.
        assert_eq!(path_keys, vec!["0-0-300", "100-0-0"]);
    }

    #[test]
    fn test_duplicate_relations_collapse() {
        let graph = DocumentGraph::from_parts(
            three_stages(),
            vec![doc(100, 1, Some(5)), doc(200, 2, Some(5))],
            &[rel(100, 200), rel(100, 200), rel(100, 200)],
        );

        assert_eq!(graph.forward_links(100), &[200]);
        let paths = graph.reconstruct_paths();
        assert_eq!(keys(&paths), vec!["100-200-0"]);
    }

    #[test]
    fn test_mid_stage_root_keeps_leading_hole() {
        let graph = DocumentGraph::from_parts(
            three_stages(),
            vec![doc(200, 2, Some(5)), doc(300, 3, Some(5))],
            &[rel(200, 300)],
        );

        let paths = graph.reconstruct_paths();
        assert_eq!(keys(&paths), vec!["0-200-300"]);
    }

    #[test]
    fn test_primary_entries_survive_secondary_insert() {
        let mut graph = DocumentGraph::new(three_stages());
        graph.insert_document(doc(100, 1, Some(5)));

        let mut shadow = doc(100, 1, Some(9));
        shadow.is_primary = false;
        graph.insert_document(shadow);

        assert!(graph.document(100).unwrap().is_primary);
        assert_eq!(graph.document(100).unwrap().customer_id, Some(5));
    }

    #[test]
    fn test_missing_relation_endpoints() {
        let mut graph = DocumentGraph::new(three_stages());
        graph.insert_document(doc(100, 1, Some(5)));

        let relations = vec![rel(100, 200), rel(300, 400)];
        assert_eq!(graph.missing_relation_endpoints(&relations), vec![200, 300, 400]);
    }

    #[test]
    fn test_document_outside_stage_set_is_dropped() {
        let mut graph = DocumentGraph::new(three_stages());
        graph.insert_document(doc(100, 99, Some(5)));
        assert_eq!(graph.document_count(), 0);
    }

    #[test]
    fn test_reconstruct_is_stable_under_relation_permutation() {
        let documents = || {
            vec![
                doc(100, 1, Some(5)),
                doc(200, 2, Some(5)),
                doc(201, 2, Some(5)),
                doc(300, 3, Some(5)),
            ]
        };
        let forward = [rel(100, 200), rel(100, 201), rel(200, 300)];
        let reversed = [rel(200, 300), rel(100, 201), rel(100, 200)];

        let mut a = keys(&DocumentGraph::from_parts(three_stages(), documents(), &forward)
            .reconstruct_paths());
        let mut b = keys(&DocumentGraph::from_parts(three_stages(), documents(), &reversed)
            .reconstruct_paths());
        a.sort();
        b.sort();
        assert_eq!(a, b);
    }

    #[test]
    fn test_path_key_encodes_holes_as_zero() {
        let mut path = DocumentPath::empty(3);
        path.slots[1] = Some(42);
        assert_eq!(path.key(), "0-42-0");
    }

    #[test]
    fn test_stage_operation_parse() {
        assert_eq!(StageOperation::parse("+"), Some(StageOperation::Add));
        assert_eq!(StageOperation::parse(" - "), Some(StageOperation::Subtract));
        assert_eq!(StageOperation::parse("="), Some(StageOperation::Neutral));
        assert_eq!(StageOperation::parse("x"), None);
    }
}
