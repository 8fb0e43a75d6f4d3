use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::info;
use tracing::Level;
use tracing_subscriber::EnvFilter;

use lifecycle::common::{parse_optional_id_list, write_string_to_file};
use lifecycle::db::connection::establish_connection;
use lifecycle::db::migrate::Migrator;
use lifecycle::server;
use lifecycle::services::{resolve_date_range, LifecycleService, ReportQuery};
use lifecycle::settings::LifecycleSettings;
use sea_orm_migration::MigratorTrait;

#[derive(Parser)]
#[clap(author, version, about)]
struct Cli {
    #[clap(short, long, global = true)]
    log_level: Option<String>,
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build a life-cycle report once and print it as JSON
    Report {
        #[clap(short, long, default_value = "lifecycle.db")]
        database: String,
        #[clap(short, long, default_value = "lifecycle.yaml")]
        settings: String,
        #[clap(long)]
        date_from: Option<String>,
        #[clap(long)]
        date_to: Option<String>,
        #[clap(long)]
        customer_id: Option<i32>,
        #[clap(long)]
        supplier_id: Option<i32>,
        /// Explicit stage type ids, comma separated
        #[clap(long)]
        stages: Option<String>,
        /// Relation type ids to follow, comma separated
        #[clap(long)]
        relation_types: Option<String>,
        /// Cycle profile id from the settings file
        #[clap(long)]
        cycle: Option<String>,
        /// Write the payload to a file instead of stdout
        #[clap(short, long)]
        output: Option<String>,
    },
    /// Serve the report API
    Serve {
        #[clap(short, long, default_value = "3000")]
        port: u16,
        #[clap(short, long, default_value = "lifecycle.db")]
        database: String,
        #[clap(short, long, default_value = "lifecycle.yaml")]
        settings: String,
        #[clap(long)]
        cors_origin: Option<String>,
    },
    /// Write a default settings file
    Init {
        #[clap(short, long, default_value = "lifecycle.yaml")]
        settings: String,
    },
    Db {
        #[clap(subcommand)]
        command: DbCommands,
    },
}

#[derive(Subcommand, Debug)]
enum DbCommands {
    Init {
        #[clap(short, long, default_value = "lifecycle.db")]
        database: String,
    },
    Fresh {
        #[clap(short, long, default_value = "lifecycle.db")]
        database: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();
    setup_logging(&args.log_level);

    match args.command {
        Commands::Report {
            database,
            settings,
            date_from,
            date_to,
            customer_id,
            supplier_id,
            stages,
            relation_types,
            cycle,
            output,
        } => {
            let db = establish_connection(&database).await?;
            let settings = LifecycleSettings::load(&settings)?;
            let profile = settings
                .select_profile(cycle.as_deref())
                .ok_or_else(|| anyhow::anyhow!("No cycle profile available"))?;

            let (date_from, date_to) =
                resolve_date_range(date_from.as_deref(), date_to.as_deref())?;
            let query = ReportQuery {
                date_from,
                date_to,
                customer_id,
                supplier_id,
                stage_type_ids: parse_optional_id_list(stages.as_deref()),
                relation_type_ids: parse_optional_id_list(relation_types.as_deref()),
            };

            let payload = LifecycleService::new(db)
                .build_report(&query, profile)
                .await?;
            let rendered = serde_json::to_string_pretty(&payload)?;

            match output {
                Some(path) => {
                    write_string_to_file(&path, &rendered)?;
                    info!("Report written to {}", path);
                }
                None => println!("{}", rendered),
            }
        }
        Commands::Serve {
            port,
            database,
            settings,
            cors_origin,
        } => {
            info!("Starting server on port {}", port);
            server::start_server(port, &database, &settings, cors_origin.as_deref()).await?;
        }
        Commands::Init { settings } => {
            info!("Writing default settings to {}", settings);
            LifecycleSettings::default().save(&settings)?;
        }
        Commands::Db { command } => match command {
            DbCommands::Init { database } => {
                info!("Initializing database: {}", database);
                establish_connection(&database).await?;
            }
            DbCommands::Fresh { database } => {
                info!("Recreating database schema: {}", database);
                let db = establish_connection(&database).await?;
                Migrator::down(&db, None).await?;
                Migrator::up(&db, None).await?;
            }
        },
    }

    Ok(())
}

fn setup_logging(log_level: &Option<String>) {
    let log_level = match log_level
        .as_ref()
        .unwrap_or(&"info".to_string())
        .to_lowercase()
        .as_str()
    {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(format!("sqlx=warn,{}", log_level)))
        .without_time()
        .init();
}
