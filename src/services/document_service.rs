use chrono::NaiveDateTime;
use sea_orm::{ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};
use std::collections::HashMap;

use crate::db::entities::{customer, invoice, invoice_relation, invoice_type, supplier};
use crate::errors::ReportResult;
use crate::graph::{DocumentRecord, DocumentRelation, StageOperation, StageType};

/// The record/relation/catalog store: runs the queries and converts rows
/// into the core structs the reconstruction works on.
pub struct DocumentService {
    db: DatabaseConnection,
}

impl DocumentService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Active invoice types ordered by sort number then id.
    pub async fn fetch_stage_types(&self) -> ReportResult<Vec<StageType>> {
        let models = invoice_type::Entity::find()
            .filter(invoice_type::Column::TypeIsDeleted.eq(false))
            .filter(invoice_type::Column::TypeIsDisabled.eq(false))
            .order_by_asc(invoice_type::Column::TypeSortNumber)
            .order_by_asc(invoice_type::Column::TypeId)
            .all(&self.db)
            .await?;

        Ok(models
            .into_iter()
            .map(|m| StageType {
                id: m.type_id,
                name: m.type_name,
                hex_color: m.type_hex_color,
                operation: m.type_operation.as_deref().and_then(StageOperation::parse),
                sort_number: m.type_sort_number,
            })
            .collect())
    }

    /// Every invoice type by id, for the settings lookup.
    pub async fn fetch_type_lookup(&self) -> ReportResult<Vec<invoice_type::Model>> {
        Ok(invoice_type::Entity::find()
            .order_by_asc(invoice_type::Column::TypeId)
            .all(&self.db)
            .await?)
    }

    /// Non-canceled invoices matching the request filters directly.
    pub async fn fetch_primary_documents(
        &self,
        stage_type_ids: &[i32],
        from: NaiveDateTime,
        to: NaiveDateTime,
        customer_id: Option<i32>,
        supplier_id: Option<i32>,
    ) -> ReportResult<Vec<DocumentRecord>> {
        let mut query = invoice::Entity::find()
            .filter(invoice::Column::InvoiceIsCanceled.eq(false))
            .filter(invoice::Column::InvoiceTypeId.is_in(stage_type_ids.to_vec()))
            .filter(invoice::Column::InvoiceCreateDate.between(from, to));

        if let Some(customer_id) = customer_id {
            query = query.filter(invoice::Column::InvoiceCustomerId.eq(customer_id));
        }
        if let Some(supplier_id) = supplier_id {
            query = query.filter(invoice::Column::InvoiceSupplierId.eq(supplier_id));
        }

        let models = query.all(&self.db).await?;
        self.to_records(models, true).await
    }

    /// Invoices referenced only through relations, fetched by id and
    /// restricted to the stage set but not to the request filters.
    pub async fn fetch_documents_by_ids(
        &self,
        ids: &[i32],
        stage_type_ids: &[i32],
    ) -> ReportResult<Vec<DocumentRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let models = invoice::Entity::find()
            .filter(invoice::Column::InvoiceIsCanceled.eq(false))
            .filter(invoice::Column::InvoiceId.is_in(ids.to_vec()))
            .filter(invoice::Column::InvoiceTypeId.is_in(stage_type_ids.to_vec()))
            .all(&self.db)
            .await?;
        self.to_records(models, false).await
    }

    /// Directed conversion edges touching at least one indexed invoice,
    /// optionally restricted to specific relation types. Edges whose other
    /// endpoint falls outside the stage set resolve to nothing downstream
    /// and are dropped there.
    pub async fn fetch_relations(
        &self,
        invoice_ids: &[i32],
        relation_type_ids: Option<&[i32]>,
    ) -> ReportResult<Vec<DocumentRelation>> {
        if invoice_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = invoice_relation::Entity::find().filter(
            Condition::any()
                .add(invoice_relation::Column::SourceInvoiceId.is_in(invoice_ids.to_vec()))
                .add(invoice_relation::Column::TargetInvoiceId.is_in(invoice_ids.to_vec())),
        );
        if let Some(ids) = relation_type_ids {
            if !ids.is_empty() {
                query = query.filter(invoice_relation::Column::RelationTypeId.is_in(ids.to_vec()));
            }
        }

        let models = query.all(&self.db).await?;
        Ok(models
            .into_iter()
            .map(|m| DocumentRelation {
                source_id: m.source_invoice_id,
                target_id: m.target_invoice_id,
                relation_type_id: m.relation_type_id,
            })
            .collect())
    }

    async fn to_records(
        &self,
        models: Vec<invoice::Model>,
        is_primary: bool,
    ) -> ReportResult<Vec<DocumentRecord>> {
        let customer_ids: Vec<i32> = collect_ids(models.iter().map(|m| m.invoice_customer_id));
        let supplier_ids: Vec<i32> = collect_ids(models.iter().map(|m| m.invoice_supplier_id));

        let customer_names = self.fetch_customer_names(&customer_ids).await?;
        let supplier_names = self.fetch_supplier_names(&supplier_ids).await?;

        Ok(models
            .into_iter()
            .map(|m| DocumentRecord {
                id: m.invoice_id,
                number: m.invoice_number,
                stage_type_id: m.invoice_type_id,
                customer_id: m.invoice_customer_id,
                customer_name: m
                    .invoice_customer_id
                    .and_then(|id| customer_names.get(&id).cloned()),
                supplier_id: m.invoice_supplier_id,
                supplier_name: m
                    .invoice_supplier_id
                    .and_then(|id| supplier_names.get(&id).cloned()),
                created_at: m.invoice_create_date,
                is_primary,
            })
            .collect())
    }

    async fn fetch_customer_names(&self, ids: &[i32]) -> ReportResult<HashMap<i32, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let models = customer::Entity::find()
            .filter(customer::Column::CustomerId.is_in(ids.to_vec()))
            .all(&self.db)
            .await?;
        Ok(models
            .into_iter()
            .filter_map(|m| m.customer_name.map(|name| (m.customer_id, name)))
            .collect())
    }

    async fn fetch_supplier_names(&self, ids: &[i32]) -> ReportResult<HashMap<i32, String>> {
        if ids.is_empty() {
            return Ok(HashMap::new());
        }
        let models = supplier::Entity::find()
            .filter(supplier::Column::SupplierId.is_in(ids.to_vec()))
            .all(&self.db)
            .await?;
        Ok(models
            .into_iter()
            .filter_map(|m| m.supplier_name.map(|name| (m.supplier_id, name)))
            .collect())
    }
}

fn collect_ids(ids: impl Iterator<Item = Option<i32>>) -> Vec<i32> {
    let mut result = Vec::new();
    for id in ids.flatten() {
        if !result.contains(&id) {
            result.push(id);
        }
    }
    result
}
