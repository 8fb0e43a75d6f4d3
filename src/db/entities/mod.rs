pub mod customer;
pub mod invoice;
pub mod invoice_relation;
pub mod invoice_type;
pub mod supplier;
