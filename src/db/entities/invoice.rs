use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoice")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub invoice_id: i32,
    pub invoice_number: Option<String>,
    pub invoice_type_id: i32,
    pub invoice_customer_id: Option<i32>,
    pub invoice_supplier_id: Option<i32>,
    pub invoice_create_date: Option<chrono::NaiveDateTime>,
    pub invoice_is_canceled: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::invoice_type::Entity",
        from = "Column::InvoiceTypeId",
        to = "super::invoice_type::Column::TypeId"
    )]
    InvoiceType,
    #[sea_orm(
        belongs_to = "super::customer::Entity",
        from = "Column::InvoiceCustomerId",
        to = "super::customer::Column::CustomerId"
    )]
    Customer,
    #[sea_orm(
        belongs_to = "super::supplier::Entity",
        from = "Column::InvoiceSupplierId",
        to = "super::supplier::Column::SupplierId"
    )]
    Supplier,
}

impl Related<super::invoice_type::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::InvoiceType.def()
    }
}

impl Related<super::customer::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Customer.def()
    }
}

impl Related<super::supplier::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Supplier.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
