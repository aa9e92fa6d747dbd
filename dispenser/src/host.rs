use std::time::Duration;

use anyhow::Context;
use rumqttc::{AsyncClient, Event, Incoming, MqttOptions, QoS};
use tracing::{info, warn};

use medbox_common::{
    DispensePlan, DispenserEngine, EngineAction, RuntimeConfig, ACK_PAYLOAD, ONLINE_PAYLOAD,
    TOPIC_DISPENSE, TOPIC_DISPENSED, TOPIC_EVENTS,
};

pub async fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let runtime = RuntimeConfig::default();

    let mqtt_host = std::env::var("MQTT_HOST").unwrap_or(runtime.network.mqtt_host.clone());
    let mqtt_port = std::env::var("MQTT_PORT")
        .ok()
        .and_then(|value| value.parse::<u16>().ok())
        .unwrap_or(runtime.network.mqtt_port);
    let client_id =
        std::env::var("MQTT_CLIENT_ID").unwrap_or_else(|_| "medbox-dispenser-host".to_string());

    let mut mqtt_options = MqttOptions::new(client_id, mqtt_host, mqtt_port);
    let mqtt_user = std::env::var("MQTT_USER").unwrap_or(runtime.network.mqtt_user.clone());
    let mqtt_pass = std::env::var("MQTT_PASS").unwrap_or(runtime.network.mqtt_pass.clone());
    if !mqtt_user.is_empty() {
        mqtt_options.set_credentials(mqtt_user, mqtt_pass);
    }

    let (mqtt, mut eventloop) = AsyncClient::new(mqtt_options, 32);
    let engine = DispenserEngine::new(runtime.dispenser.clone());
    let mqtt_retry = Duration::from_millis(engine.config().mqtt_retry_delay_ms);

    info!("dispenser started; awaiting commands on {}", TOPIC_DISPENSE);

    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Incoming::ConnAck(_))) => {
                info!("mqtt connected");
                mqtt.subscribe(TOPIC_DISPENSE, QoS::AtMostOnce)
                    .await
                    .context("failed to subscribe to dispense topic")?;
                if let Err(err) = mqtt
                    .publish(TOPIC_EVENTS, QoS::AtLeastOnce, true, ONLINE_PAYLOAD)
                    .await
                {
                    warn!("online event publish failed: {err}");
                }
            }
            Ok(Event::Incoming(Incoming::Publish(message))) => {
                let actions = engine.handle_message(&message.topic, &message.payload);
                if actions.is_empty() {
                    continue;
                }

                log_command(&message.topic, &message.payload);

                // The ack delay runs off the poll path so keep-alive stays
                // serviced during the dispense window.
                let mqtt = mqtt.clone();
                tokio::spawn(async move {
                    execute_engine_actions(&mqtt, actions).await;
                });
            }
            Ok(_) => {}
            Err(err) => {
                warn!("mqtt poll error: {err}");
                tokio::time::sleep(mqtt_retry).await;
            }
        }
    }
}

fn log_command(topic: &str, payload: &[u8]) {
    match DispensePlan::from_payload(payload) {
        Ok(plan) => info!("dispense command on {topic}: {}", plan.summary()),
        Err(_) => info!(
            "dispense command on {topic} ({} byte payload, not a plan)",
            payload.len()
        ),
    }
}

async fn execute_engine_actions(mqtt: &AsyncClient, actions: Vec<EngineAction>) {
    for action in actions {
        match action {
            EngineAction::Delay(ms) => tokio::time::sleep(Duration::from_millis(ms)).await,
            EngineAction::BeginDispense => {
                // Hardware integration point: the ESP32 target drives the
                // release motor here; the host build only logs the cycle.
                info!("dispense cycle started");
            }
            EngineAction::PublishAck => {
                match mqtt
                    .publish(TOPIC_DISPENSED, QoS::AtLeastOnce, false, ACK_PAYLOAD)
                    .await
                {
                    Ok(()) => info!("dispense ack sent on {}", TOPIC_DISPENSED),
                    Err(err) => warn!("dispense ack publish failed: {err}"),
                }
            }
        }
    }
}
