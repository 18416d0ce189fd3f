pub mod bot;
pub mod config;
pub mod hardware;
pub mod mqtt;
pub mod outputs;
pub mod sync;

use crate::bot::{telegram, ChatHandler, Menu};
use crate::config::AppConfig;
use crate::hardware::SerialDriver;
use crate::mqtt::{create_session, BusListener, MqttHandler, MqttStatusSink, TopicScheme};
use crate::outputs::OutputRegistry;
use crate::sync::{StatusSink, SyncHandle, Synchronizer};
use color_eyre::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    info!("Starting lightbridge");
    let config = AppConfig::load()?;
    let shutdown = CancellationToken::new();

    let driver = SerialDriver::open(&config.serial).await;
    let scheme = TopicScheme::from_filter(&config.mqtt.command_topic);

    let session = match config.mqtt.broker.as_deref() {
        Some(broker) => {
            info!("Using MQTT broker {}:{}", broker, config.mqtt.port);
            Some(create_session(&config.mqtt, broker))
        }
        None => {
            warn!("MQTT_BROKER not set, bus listener disabled");
            None
        }
    };

    // Shared session for status updates caused by chat commands
    let default_sink = session.as_ref().map(|(client, _)| {
        Arc::new(MqttStatusSink::new(client.clone(), scheme.clone())) as Arc<dyn StatusSink>
    });

    let synchronizer = Synchronizer::create(
        OutputRegistry::new(config.pins()),
        Box::new(driver),
        default_sink,
        Duration::from_millis(config.serial.reset_gap_ms),
    );
    let (sync, sync_task) = SyncHandle::spawn(synchronizer, shutdown.clone());

    let mqtt_task = session.map(|(client, eventloop)| {
        let reply_sink: Arc<dyn StatusSink> =
            Arc::new(MqttStatusSink::new(client.clone(), scheme.clone()));
        let listener = BusListener::new(config.pins(), sync.clone(), reply_sink);
        let handler = MqttHandler::new(&config.mqtt, client, eventloop, listener);
        tokio::spawn(handler.run(shutdown.clone()))
    });

    let bot_task = spawn_bot(&config, sync.clone(), shutdown.clone());
    drop(sync);

    tokio::signal::ctrl_c().await?;
    info!("Interrupt received, shutting down");
    shutdown.cancel();

    for (name, task) in [("MQTT", mqtt_task), ("Telegram", bot_task)] {
        if let Some(task) = task {
            if let Err(e) = task.await {
                error!("{} task ended abnormally: {}", name, e);
            }
        }
    }
    if let Err(e) = sync_task.await {
        error!("Synchronizer task ended abnormally: {}", e);
    }

    info!("Shutdown complete");
    Ok(())
}

fn spawn_bot(
    config: &AppConfig,
    sync: SyncHandle,
    shutdown: CancellationToken,
) -> Option<JoinHandle<()>> {
    let Some(token) = config.telegram.token.as_deref() else {
        warn!("BOT_TOKEN not set, Telegram bot disabled");
        return None;
    };

    let bot = match telegram::build_bot(token) {
        Ok(bot) => bot,
        Err(e) => {
            error!("{}", e);
            return None;
        }
    };

    let menu = Menu::from_outputs(&config.outputs);
    let handler = Arc::new(ChatHandler::new(
        config.telegram.allowed_users.iter().copied(),
        menu,
        sync,
    ));

    Some(tokio::spawn(async move {
        if let Err(e) = telegram::run_bot(bot, handler, shutdown).await {
            error!("Telegram bot unavailable: {}", e);
        }
    }))
}

fn setup() -> Result<()> {
    let dotenv = dotenvy::dotenv();

    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();

    match dotenv {
        Ok(path) => info!("Loaded environment from {}", path.display()),
        Err(e) => debug!("No .env file loaded: {}", e),
    }
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}
