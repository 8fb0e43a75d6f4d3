use chrono::{Datelike, Local, NaiveDate};
use sea_orm::DatabaseConnection;
use tracing::{debug, info};

use crate::common::day_bounds;
use crate::errors::{ReportError, ReportResult};
use crate::graph::{resolve_stages, DocumentGraph};
use crate::report::{aggregate_customers, assemble_response, LifecycleFilters, LifecycleResponse};
use crate::services::{DocumentService, LookupService};
use crate::settings::CycleProfile;

/// The effective filters of one report request.
#[derive(Clone, Debug)]
pub struct ReportQuery {
    pub date_from: NaiveDate,
    pub date_to: NaiveDate,
    pub customer_id: Option<i32>,
    pub supplier_id: Option<i32>,
    /// Explicit stage override; `None` uses the profile's stage list.
    pub stage_type_ids: Option<Vec<i32>>,
    pub relation_type_ids: Option<Vec<i32>>,
}

/// Request-scoped report pipeline. All state lives in locals; nothing is
/// shared across requests.
pub struct LifecycleService {
    documents: DocumentService,
    lookups: LookupService,
}

impl LifecycleService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self {
            documents: DocumentService::new(db.clone()),
            lookups: LookupService::new(db),
        }
    }

    /// Fetch, index, link, reconstruct, aggregate and assemble — the whole
    /// pipeline for one request. Any error aborts the remaining steps; a
    /// partial payload is never produced.
    pub async fn build_report(
        &self,
        query: &ReportQuery,
        profile: &CycleProfile,
    ) -> ReportResult<LifecycleResponse> {
        if query.date_from > query.date_to {
            return Err(ReportError::Validation(
                "date_from must not be after date_to".to_string(),
            ));
        }

        let available = self.documents.fetch_stage_types().await?;
        let stages = resolve_stages(&available, profile, query.stage_type_ids.as_deref())?;
        let stage_type_ids: Vec<i32> = stages.iter().map(|s| s.type_id).collect();
        info!(
            "Resolved {} stages for profile '{}'",
            stages.len(),
            profile.id
        );

        let (from, to) = day_bounds(query.date_from, query.date_to);
        let mut graph = DocumentGraph::new(stages);

        let primary = self
            .documents
            .fetch_primary_documents(
                &stage_type_ids,
                from,
                to,
                query.customer_id,
                query.supplier_id,
            )
            .await?;
        info!("Indexed {} primary documents", primary.len());
        for document in primary {
            graph.insert_document(document);
        }

        let indexed_ids: Vec<i32> = graph.documents().map(|d| d.id).collect();
        let relations = self
            .documents
            .fetch_relations(&indexed_ids, query.relation_type_ids.as_deref())
            .await?;

        let missing = graph.missing_relation_endpoints(&relations);
        if !missing.is_empty() {
            let linked = self
                .documents
                .fetch_documents_by_ids(&missing, &stage_type_ids)
                .await?;
            debug!(
                "Indexed {} linked documents outside the request filters",
                linked.len()
            );
            for document in linked {
                graph.insert_document(document);
            }
        }

        graph.link_documents(&relations);

        let paths = graph.reconstruct_paths();
        debug!("Reconstructed {} distinct paths", paths.len());

        let customers = aggregate_customers(&graph, &paths);
        let lookups = self.lookups.fetch_lookups().await?;

        Ok(assemble_response(
            query.date_from,
            query.date_to,
            LifecycleFilters {
                customer_id: query.customer_id,
                supplier_id: query.supplier_id,
            },
            &graph,
            customers,
            lookups,
        ))
    }
}

/// Resolve the requested day range. Missing or blank dates default to the
/// first day of the current month and today; malformed dates are rejected.
pub fn resolve_date_range(
    date_from: Option<&str>,
    date_to: Option<&str>,
) -> ReportResult<(NaiveDate, NaiveDate)> {
    let today = Local::now().date_naive();
    let start_of_month = today
        .with_day(1)
        .expect("the first of the month is always valid");

    let from = parse_date(date_from, start_of_month)?;
    let to = parse_date(date_to, today)?;
    Ok((from, to))
}

fn parse_date(raw: Option<&str>, default: NaiveDate) -> ReportResult<NaiveDate> {
    match raw.map(str::trim) {
        None | Some("") => Ok(default),
        Some(raw) => NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| ReportError::Validation(format!("invalid date: {}", raw))),
    }
}
