//! Split ledger server
//!
//! Serves the JSON API over an in-memory store.
//!
//! # Environment Variables
//!
//! - `SPLIT_LEDGER_HOST`: bind address, defaults to `0.0.0.0`
//! - `SPLIT_LEDGER_PORT`: bind port, defaults to `8080`
//! - `SPLIT_LEDGER_MQTT_HOST`: MQTT broker; balances are only logged while unset
//! - `SPLIT_LEDGER_MQTT_PORT`, `SPLIT_LEDGER_MQTT_CLIENT_ID`,
//!   `SPLIT_LEDGER_MQTT_TOPIC_PREFIX`: broker port (1883), client id and
//!   state topic prefix (both `split-ledger`)
//! - `RUST_LOG`: Set to `debug` or `warn` to control logging verbosity

use actix_web::{web, App, HttpServer};
use log::{error, info};
use std::process;

use split_ledger::config::Config;
use split_ledger::http::{self, AppState};
use split_ledger::{MemoryStorage, MqttPublisher, SplitLedger};

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    env_logger::init();

    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Invalid configuration: {}", e);
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let mut ledger = SplitLedger::new(MemoryStorage::new());
    if let Some(mqtt) = &config.mqtt {
        ledger = ledger.with_publisher(Box::new(MqttPublisher::connect(mqtt)));
        if let Err(e) = ledger.publish_all().await {
            error!("Failed to publish existing groups: {}", e);
        }
    }

    let state = web::Data::new(AppState::new(ledger));
    info!("Listening on {}:{}", config.host, config.port);

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .configure(http::configure::<MemoryStorage>)
            .default_service(web::to(http::not_found))
    })
    .bind(config.bind_address())?
    .run()
    .await
}
