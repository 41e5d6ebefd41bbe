use std::process;
use std::sync::Arc;

use axum::Router;
use sqlx::{postgres::PgPoolOptions, PgPool};
use tokio::net::TcpListener;
use tracing_subscriber::{fmt::{writer::BoxMakeWriter, Layer}, layer::SubscriberExt, EnvFilter, Registry};

use backoffice_ledger::{
    banking::{ChargeCalculator, LedgerServices},
    config::AppConfig,
    db::PgStore,
    routes::{self, auth::AuthService},
};

#[tokio::main]
async fn main() {
    let config = match AppConfig::from_env() {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration: {err}");
            process::exit(1);
        }
    };

    // add tracing layer
    let file_appender = tracing_appender::rolling::never(".", &config.log_file);
    let (file_writer, _file_guard) = tracing_appender::non_blocking(file_appender);
    let (stdout_writer, _stdout_guard) = tracing_appender::non_blocking(std::io::stdout());

    // json into the log file, plain text on stdout
    let file_layer = Layer::new().json().with_writer(BoxMakeWriter::new(move || file_writer.clone()));
    let stdout_layer = Layer::new().with_writer(BoxMakeWriter::new(move || stdout_writer.clone()));

    let subscriber = Registry::default()
        .with(EnvFilter::from_default_env())
        .with(file_layer)
        .with(stdout_layer);

    if let Err(err) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Unable to set global subscriber: {err}");
        process::exit(1);
    }

    let database_pool = match process_database(&config.database_url, config.max_connection_pooling).await {
        Ok(db) => {
            tracing::info!("Connected to database");
            db
        }
        Err(err) => {
            tracing::error!("Failed to connect to database: {}", err);
            process::exit(1);
        }
    };

    let listener = match TcpListener::bind(("0.0.0.0", config.port)).await {
        Ok(listener) => {
            let port = listener.local_addr().map(|addr| addr.port()).unwrap_or(config.port);
            tracing::info!("Listening on port: {}", port);
            listener
        }
        Err(err) => {
            tracing::error!("Failed to bind to port: {}", err);
            process::exit(1);
        }
    };

    let router = process_begin(database_pool, &config);
    tracing::info!(
        withdrawal_charge = %config.withdrawal_charge,
        "Routes constructed successfully"
    );

    //start the http service
    let http_service = axum::serve(listener, router);
    if let Err(err) = http_service.await {
        tracing::error!("Failed to start server: {}", err);
        process::exit(1);
    }
}

fn process_begin(db_pool: PgPool, config: &AppConfig) -> Router {
    let store = Arc::new(PgStore::new(db_pool));

    let services = LedgerServices::new(
        store.clone(),
        store.clone(),
        ChargeCalculator::new(config.withdrawal_charge),
    );
    let service = Arc::new(AuthService::new(store, config.jwt_secret.clone()));

    routes::app_router(service, services)
}

async fn process_database(url: &str, max_conn_pool: u32) -> Result<PgPool, String> {
    // create a connection pool
    let db_pool = PgPoolOptions::new()
        .max_connections(max_conn_pool)
        .connect(url)
        .await
        .map_err(|err| format!("Failed to connect to database: {}", err))?;

    match sqlx::migrate!("./migrations").run(&db_pool).await {
        Ok(_) => {
            tracing::info!("Migrations run successfully");
        }
        Err(err) => {
            // assume the schema is already in place and keep going
            tracing::warn!("Failed to run migrations: {err}");
        }
    }

    Ok(db_pool)
}
