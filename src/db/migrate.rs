use anyhow::Result;
use sea_orm::DatabaseConnection;
use sea_orm_migration::prelude::*;

pub struct Migrator;

#[async_trait::async_trait]
impl MigratorTrait for Migrator {
    fn migrations() -> Vec<Box<dyn MigrationTrait>> {
        vec![Box::new(m20240601_000001_create_tables::Migration)]
    }
}

mod m20240601_000001_create_tables {
    use sea_orm::Statement;
    use sea_orm_migration::prelude::*;

    pub struct Migration;

    impl MigrationName for Migration {
        fn name(&self) -> &str {
            "m20240601_000001_create_tables"
        }
    }

    #[async_trait::async_trait]
    impl MigrationTrait for Migration {
        async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let stmts = vec![
                Statement::from_string(
                    manager.get_database_backend(),
                    r#"
                    CREATE TABLE IF NOT EXISTS invoice_type (
                        type_id INTEGER PRIMARY KEY AUTOINCREMENT,
                        type_name TEXT NOT NULL,
                        type_hex_color TEXT,
                        type_operation TEXT,
                        type_sort_number INTEGER,
                        type_is_deleted BOOLEAN NOT NULL DEFAULT 0,
                        type_is_disabled BOOLEAN NOT NULL DEFAULT 0
                    )
                    "#
                    .to_string(),
                ),
                Statement::from_string(
                    manager.get_database_backend(),
                    r#"
                    CREATE TABLE IF NOT EXISTS customer (
                        customer_id INTEGER PRIMARY KEY AUTOINCREMENT,
                        customer_name TEXT,
                        customer_is_deleted BOOLEAN NOT NULL DEFAULT 0
                    )
                    "#
                    .to_string(),
                ),
                Statement::from_string(
                    manager.get_database_backend(),
                    r#"
                    CREATE TABLE IF NOT EXISTS supplier (
                        supplier_id INTEGER PRIMARY KEY AUTOINCREMENT,
                        supplier_name TEXT,
                        supplier_is_deleted BOOLEAN NOT NULL DEFAULT 0
                    )
                    "#
                    .to_string(),
                ),
                Statement::from_string(
                    manager.get_database_backend(),
                    r#"
                    CREATE TABLE IF NOT EXISTS invoice (
                        invoice_id INTEGER PRIMARY KEY AUTOINCREMENT,
                        invoice_number TEXT,
                        invoice_type_id INTEGER NOT NULL,
                        invoice_customer_id INTEGER,
                        invoice_supplier_id INTEGER,
                        invoice_create_date DATETIME,
                        invoice_is_canceled BOOLEAN NOT NULL DEFAULT 0,
                        FOREIGN KEY (invoice_type_id) REFERENCES invoice_type(type_id),
                        FOREIGN KEY (invoice_customer_id) REFERENCES customer(customer_id),
                        FOREIGN KEY (invoice_supplier_id) REFERENCES supplier(supplier_id)
                    )
                    "#
                    .to_string(),
                ),
                Statement::from_string(
                    manager.get_database_backend(),
                    r#"
                    CREATE TABLE IF NOT EXISTS invoice_relation (
                        relation_id INTEGER PRIMARY KEY AUTOINCREMENT,
                        source_invoice_id INTEGER NOT NULL,
                        target_invoice_id INTEGER NOT NULL,
                        relation_type_id INTEGER,
                        FOREIGN KEY (source_invoice_id) REFERENCES invoice(invoice_id),
                        FOREIGN KEY (target_invoice_id) REFERENCES invoice(invoice_id)
                    )
                    "#
                    .to_string(),
                ),
                Statement::from_string(
                    manager.get_database_backend(),
                    "CREATE INDEX IF NOT EXISTS idx_invoice_type_date ON invoice(invoice_type_id, invoice_create_date)".to_string(),
                ),
                Statement::from_string(
                    manager.get_database_backend(),
                    "CREATE INDEX IF NOT EXISTS idx_relation_source ON invoice_relation(source_invoice_id)".to_string(),
                ),
                Statement::from_string(
                    manager.get_database_backend(),
                    "CREATE INDEX IF NOT EXISTS idx_relation_target ON invoice_relation(target_invoice_id)".to_string(),
                ),
            ];

            for stmt in stmts {
                manager.get_connection().execute(stmt).await?;
            }

            Ok(())
        }

        async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
            let stmts = vec![
                Statement::from_string(
                    manager.get_database_backend(),
                    "DROP TABLE IF EXISTS invoice_relation".to_string(),
                ),
                Statement::from_string(
                    manager.get_database_backend(),
                    "DROP TABLE IF EXISTS invoice".to_string(),
                ),
                Statement::from_string(
                    manager.get_database_backend(),
                    "DROP TABLE IF EXISTS supplier".to_string(),
                ),
                Statement::from_string(
                    manager.get_database_backend(),
                    "DROP TABLE IF EXISTS customer".to_string(),
                ),
                Statement::from_string(
                    manager.get_database_backend(),
                    "DROP TABLE IF EXISTS invoice_type".to_string(),
                ),
            ];

            for stmt in stmts {
                manager.get_connection().execute(stmt).await?;
            }

            Ok(())
        }
    }
}

pub async fn run_migrations(db: &DatabaseConnection) -> Result<()> {
    Migrator::up(db, None).await?;
    Ok(())
}
