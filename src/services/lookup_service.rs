use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

use crate::db::entities::{customer, supplier};
use crate::errors::ReportResult;
use crate::report::{CustomerLookup, Lookups, SupplierLookup};

/// Name lists for the filter dropdowns. Unrelated to the reconstruction.
pub struct LookupService {
    db: DatabaseConnection,
}

impl LookupService {
    pub fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    pub async fn fetch_lookups(&self) -> ReportResult<Lookups> {
        let customers = customer::Entity::find()
            .filter(customer::Column::CustomerIsDeleted.eq(false))
            .order_by_asc(customer::Column::CustomerName)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|m| CustomerLookup {
                customer_id: m.customer_id,
                customer_name: m
                    .customer_name
                    .unwrap_or_else(|| format!("Customer #{}", m.customer_id)),
            })
            .collect();

        let suppliers = supplier::Entity::find()
            .filter(supplier::Column::SupplierIsDeleted.eq(false))
            .order_by_asc(supplier::Column::SupplierName)
            .all(&self.db)
            .await?
            .into_iter()
            .map(|m| SupplierLookup {
                supplier_id: m.supplier_id,
                supplier_name: m
                    .supplier_name
                    .unwrap_or_else(|| format!("Supplier #{}", m.supplier_id)),
            })
            .collect();

        Ok(Lookups {
            customers,
            suppliers,
        })
    }
}
