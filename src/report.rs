use chrono::{NaiveDate, NaiveDateTime};
use indexmap::IndexMap;
use serde::Serialize;

use crate::graph::{DocumentGraph, DocumentPath, Stage};

/// One table cell of a cycle: the document occupying a stage slot, or a
/// hole. The converted-from/-to fields describe the immediate neighbors in
/// this path, not the full relation set.
#[derive(Serialize, Clone, Debug)]
pub struct DocumentCell {
    pub stage_index: usize,
    pub stage_type_id: i32,
    pub invoice_id: Option<i32>,
    pub invoice_number: Option<String>,
    pub invoice_date: Option<NaiveDateTime>,
    pub converted_from_invoice_id: Option<i32>,
    pub converted_from_invoice_number: Option<String>,
    pub converted_to_invoice_id: Option<i32>,
    pub converted_to_invoice_number: Option<String>,
    pub is_within_filters: bool,
}

/// One reconstructed cycle rendered as a table row.
#[derive(Serialize, Clone, Debug)]
pub struct CycleRow {
    pub cycle_id: String,
    pub documents: Vec<DocumentCell>,
    pub documents_count: usize,
    pub latest_activity_at: Option<NaiveDateTime>,
}

/// All cycles belonging to one customer (or the synthetic unattributed
/// bucket with a null id).
#[derive(Serialize, Clone, Debug)]
pub struct CustomerGroup {
    pub customer_id: Option<i32>,
    pub customer_name: String,
    pub cycles: Vec<CycleRow>,
    pub total_documents: usize,
    pub row_count: usize,
}

#[derive(Serialize, Clone, Debug)]
pub struct Summary {
    pub total_customers: usize,
    pub total_cycles: usize,
    pub primary_documents: usize,
}

#[derive(Serialize, Clone, Copy, Debug, Default)]
pub struct LifecycleFilters {
    pub customer_id: Option<i32>,
    pub supplier_id: Option<i32>,
}

#[derive(Serialize, Clone, Debug)]
pub struct CustomerLookup {
    pub customer_id: i32,
    pub customer_name: String,
}

#[derive(Serialize, Clone, Debug)]
pub struct SupplierLookup {
    pub supplier_id: i32,
    pub supplier_name: String,
}

#[derive(Serialize, Clone, Debug, Default)]
pub struct Lookups {
    pub customers: Vec<CustomerLookup>,
    pub suppliers: Vec<SupplierLookup>,
}

/// The payload returned to the presentation layer.
#[derive(Serialize, Clone, Debug)]
pub struct LifecycleResponse {
    pub date_from: String,
    pub date_to: String,
    pub filters: LifecycleFilters,
    pub stages: Vec<Stage>,
    pub customers: Vec<CustomerGroup>,
    pub summary: Summary,
    pub lookups: Lookups,
}

pub const UNKNOWN_CUSTOMER_NAME: &str = "Unknown customer";

/// Group reconstructed paths into per-customer cycles.
///
/// The owning customer of a path is the first non-null customer id found
/// scanning stage slots ascending; paths with no attributed document land
/// in the unknown-customer bucket. Cycles are ordered by latest activity
/// descending with the cycle key as tie break; groups by case-insensitive
/// name with the customer id as tie break.
pub fn aggregate_customers(graph: &DocumentGraph, paths: &[DocumentPath]) -> Vec<CustomerGroup> {
    let mut groups: IndexMap<Option<i32>, CustomerGroup> = IndexMap::new();

    for path in paths {
        let cycle = build_cycle(graph, path);
        let (customer_id, customer_name) = path_owner(graph, path);

        let group = groups.entry(customer_id).or_insert_with(|| CustomerGroup {
            customer_id,
            customer_name,
            cycles: Vec::new(),
            total_documents: 0,
            row_count: 0,
        });
        group.total_documents += cycle.documents_count;
        group.cycles.push(cycle);
    }

    for group in groups.values_mut() {
        group
            .cycles
            .sort_by(|a, b| activity_key(b).cmp(&activity_key(a)).then_with(|| a.cycle_id.cmp(&b.cycle_id)));
        group.row_count = group.cycles.len();
    }

    let mut sorted: Vec<CustomerGroup> = groups.into_values().collect();
    sorted.sort_by(|a, b| {
        a.customer_name
            .to_lowercase()
            .cmp(&b.customer_name.to_lowercase())
            .then_with(|| a.customer_id.cmp(&b.customer_id))
    });
    sorted
}

/// Compose the final payload.
pub fn assemble_response(
    date_from: NaiveDate,
    date_to: NaiveDate,
    filters: LifecycleFilters,
    graph: &DocumentGraph,
    customers: Vec<CustomerGroup>,
    lookups: Lookups,
) -> LifecycleResponse {
    let total_cycles = customers.iter().map(|g| g.cycles.len()).sum();
    let summary = Summary {
        total_customers: customers.len(),
        total_cycles,
        primary_documents: graph.primary_document_count(),
    };

    LifecycleResponse {
        date_from: date_from.format("%Y-%m-%d").to_string(),
        date_to: date_to.format("%Y-%m-%d").to_string(),
        filters,
        stages: graph.stages().to_vec(),
        customers,
        summary,
        lookups,
    }
}

fn path_owner(graph: &DocumentGraph, path: &DocumentPath) -> (Option<i32>, String) {
    for slot in path.slots() {
        if let Some(record) = slot.and_then(|id| graph.document(id)) {
            if let Some(customer_id) = record.customer_id {
                let name = record
                    .customer_name
                    .clone()
                    .unwrap_or_else(|| format!("Customer #{}", customer_id));
                return (Some(customer_id), name);
            }
        }
    }
    (None, UNKNOWN_CUSTOMER_NAME.to_string())
}

fn build_cycle(graph: &DocumentGraph, path: &DocumentPath) -> CycleRow {
    let slots = path.slots();
    let mut documents = Vec::with_capacity(slots.len());
    let mut documents_count = 0;
    let mut latest_activity_at: Option<NaiveDateTime> = None;

    for (stage_index, slot) in slots.iter().enumerate() {
        let stage = &graph.stages()[stage_index];
        let record = slot.and_then(|id| graph.document(id));

        let mut cell = DocumentCell {
            stage_index,
            stage_type_id: stage.type_id,
            invoice_id: None,
            invoice_number: None,
            invoice_date: None,
            converted_from_invoice_id: None,
            converted_from_invoice_number: None,
            converted_to_invoice_id: None,
            converted_to_invoice_number: None,
            is_within_filters: false,
        };

        if let Some(record) = record {
            documents_count += 1;
            cell.invoice_id = Some(record.id);
            cell.invoice_number = record.number.clone();
            cell.invoice_date = record.created_at;
            cell.is_within_filters = record.is_primary;

            if let Some(created_at) = record.created_at {
                if latest_activity_at.map_or(true, |latest| created_at > latest) {
                    latest_activity_at = Some(created_at);
                }
            }

            let previous = stage_index
                .checked_sub(1)
                .and_then(|i| slots[i])
                .and_then(|id| graph.document(id));
            if let Some(previous) = previous {
                cell.converted_from_invoice_id = Some(previous.id);
                cell.converted_from_invoice_number = previous.number.clone();
            }

            let next = slots
                .get(stage_index + 1)
                .copied()
                .flatten()
                .and_then(|id| graph.document(id));
            if let Some(next) = next {
                cell.converted_to_invoice_id = Some(next.id);
                cell.converted_to_invoice_number = next.number.clone();
            }
        }

        documents.push(cell);
    }

    CycleRow {
        cycle_id: path.key(),
        documents,
        documents_count,
        latest_activity_at,
    }
}

/// Sort key for cycle ordering: formatted datetime strings compare
/// lexicographically, with missing dates sorting as the empty (lowest)
/// string.
fn activity_key(cycle: &CycleRow) -> String {
    cycle
        .latest_activity_at
        .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_default()
}
