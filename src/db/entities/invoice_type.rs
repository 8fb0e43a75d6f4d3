use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "invoice_type")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub type_id: i32,
    pub type_name: String,
    pub type_hex_color: Option<String>,
    pub type_operation: Option<String>,
    pub type_sort_number: Option<i32>,
    pub type_is_deleted: bool,
    pub type_is_disabled: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::invoice::Entity")]
    Invoice,
}

impl Related<super::invoice::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoice.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
