use std::{
    sync::{Arc, Mutex},
    thread,
    time::Duration,
};

use anyhow::{anyhow, Context};
use embedded_svc::{
    mqtt::client::QoS,
    wifi::{AuthMethod, ClientConfiguration, Configuration},
};
use esp_idf_svc::{
    eventloop::EspSystemEventLoop,
    hal::{modem::Modem, prelude::Peripherals},
    log::EspLogger,
    mqtt::client::{
        Details, EspMqttClient, EspMqttConnection, EventPayload, MqttClientConfiguration,
    },
    nvs::EspDefaultNvsPartition,
    wifi::{BlockingWifi, EspWifi},
};
use log::{info, warn};

use medbox_common::{
    client_id_from_mac, DispensePlan, DispenserConfig, DispenserEngine, EngineAction,
    NetworkConfig, RuntimeConfig, ACK_PAYLOAD, ONLINE_PAYLOAD, TOPIC_DISPENSE, TOPIC_DISPENSED,
    TOPIC_EVENTS,
};

pub fn run() -> anyhow::Result<()> {
    esp_idf_svc::sys::link_patches();
    EspLogger::initialize_default();

    let sys_loop = EspSystemEventLoop::take()?;
    let nvs_partition = EspDefaultNvsPartition::take()?;

    let mut runtime = RuntimeConfig::default();
    ensure_network_defaults(&mut runtime);

    let Peripherals { modem, .. } = Peripherals::take()?;

    let wifi =
        connect_wifi(modem, sys_loop, nvs_partition, &runtime).context("wifi startup failed")?;
    disable_wifi_power_save();

    let client_id = client_id_from_mac(sta_mac()?);
    info!("broker client id: {client_id}");

    let (mqtt_client, mqtt_conn) =
        create_mqtt_client(&runtime.network, &runtime.dispenser, &client_id)?;
    let mqtt_client = Arc::new(Mutex::new(mqtt_client));

    let engine = DispenserEngine::new(runtime.dispenser.clone());
    spawn_mqtt_receiver(engine, mqtt_conn, mqtt_client);

    // Keep the radio alive for the program lifetime.
    let _wifi = wifi;
    loop {
        thread::sleep(Duration::from_secs(60));
    }
}

fn ensure_network_defaults(runtime: &mut RuntimeConfig) {
    if runtime.network.wifi_ssid.is_empty() {
        runtime.network.wifi_ssid = option_env!("WIFI_SSID").unwrap_or("CHANGE_ME").to_string();
    }

    if runtime.network.wifi_pass.is_empty() {
        runtime.network.wifi_pass = option_env!("WIFI_PASS").unwrap_or("CHANGE_ME").to_string();
    }

    if runtime.network.mqtt_user.is_empty() {
        runtime.network.mqtt_user = option_env!("MQTT_USER").unwrap_or_default().to_string();
    }

    if runtime.network.mqtt_pass.is_empty() {
        runtime.network.mqtt_pass = option_env!("MQTT_PASS").unwrap_or_default().to_string();
    }
}

fn connect_wifi(
    modem: Modem,
    sys_loop: EspSystemEventLoop,
    nvs_partition: EspDefaultNvsPartition,
    runtime: &RuntimeConfig,
) -> anyhow::Result<EspWifi<'static>> {
    let mut esp_wifi = EspWifi::new(modem, sys_loop.clone(), Some(nvs_partition))?;
    let mut wifi = BlockingWifi::wrap(&mut esp_wifi, sys_loop)?;

    let auth_method = if runtime.network.wifi_pass.is_empty() {
        AuthMethod::None
    } else {
        AuthMethod::WPAWPA2Personal
    };

    wifi.set_configuration(&Configuration::Client(ClientConfiguration {
        ssid: runtime
            .network
            .wifi_ssid
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi ssid too long"))?,
        password: runtime
            .network
            .wifi_pass
            .as_str()
            .try_into()
            .map_err(|_| anyhow!("wifi password too long"))?,
        auth_method,
        ..Default::default()
    }))?;

    wifi.start()?;
    info!("wifi started, connecting to `{}`", runtime.network.wifi_ssid);

    // Association has no failure path: retry at a fixed interval until the
    // network accepts us.
    let mut attempt = 0_u32;
    loop {
        attempt = attempt.saturating_add(1);

        let connected = match wifi.connect() {
            Ok(()) => match wifi.wait_netif_up() {
                Ok(()) => true,
                Err(err) => {
                    warn!("wifi netif up failed on attempt {attempt}: {err:#}");
                    false
                }
            },
            Err(err) => {
                warn!("wifi connect failed on attempt {attempt}: {err:#}");
                false
            }
        };

        if connected {
            info!("wifi connected after {attempt} attempt(s)");
            break;
        }

        let _ = wifi.disconnect();
        thread::sleep(Duration::from_millis(runtime.dispenser.wifi_retry_delay_ms));
    }

    Ok(esp_wifi)
}

fn sta_mac() -> anyhow::Result<[u8; 6]> {
    let mut mac = [0_u8; 6];
    let rc = unsafe {
        esp_idf_svc::sys::esp_wifi_get_mac(
            esp_idf_svc::sys::wifi_interface_t_WIFI_IF_STA,
            mac.as_mut_ptr(),
        )
    };
    if rc == esp_idf_svc::sys::ESP_OK {
        Ok(mac)
    } else {
        Err(anyhow!("esp_wifi_get_mac failed with code {}", rc))
    }
}

fn disable_wifi_power_save() {
    let rc = unsafe { esp_idf_svc::sys::esp_wifi_set_ps(0) };
    if rc == esp_idf_svc::sys::ESP_OK {
        info!("wifi power save disabled");
    } else {
        warn!("failed to disable wifi power save: esp_err_t={rc}");
    }
}

fn create_mqtt_client(
    network: &NetworkConfig,
    dispenser: &DispenserConfig,
    client_id: &str,
) -> anyhow::Result<(EspMqttClient<'static>, EspMqttConnection)> {
    let url = format!("mqtt://{}:{}", network.mqtt_host, network.mqtt_port);

    let conf = MqttClientConfiguration {
        client_id: Some(client_id),
        username: if network.mqtt_user.is_empty() {
            None
        } else {
            Some(network.mqtt_user.as_str())
        },
        password: if network.mqtt_pass.is_empty() {
            None
        } else {
            Some(network.mqtt_pass.as_str())
        },
        reconnect_timeout: Some(Duration::from_millis(dispenser.mqtt_retry_delay_ms)),
        ..Default::default()
    };

    Ok(EspMqttClient::new(url.as_str(), &conf)?)
}

fn spawn_mqtt_receiver(
    engine: DispenserEngine,
    mut conn: EspMqttConnection,
    mqtt: Arc<Mutex<EspMqttClient<'static>>>,
) {
    thread::Builder::new()
        .name("mqtt-rx".into())
        .stack_size(12 * 1024)
        .spawn(move || {
            let retry_delay = Duration::from_millis(engine.config().mqtt_retry_delay_ms);

            loop {
                match conn.next() {
                    Ok(event) => match event.payload() {
                        EventPayload::Connected(_) => {
                            info!("mqtt connected");
                            if let Err(err) = announce_session(&mqtt) {
                                warn!("session announcement failed: {err:#}");
                            }
                        }
                        EventPayload::Received {
                            topic: Some(topic),
                            data,
                            details,
                            ..
                        } => {
                            // We only process full MQTT payloads.
                            if !matches!(details, Details::Complete) {
                                continue;
                            }

                            let actions = engine.handle_message(topic, data);
                            if actions.is_empty() {
                                continue;
                            }

                            log_command(topic, data);
                            execute_engine_actions(&mqtt, actions);
                        }
                        EventPayload::Disconnected => {
                            warn!("mqtt disconnected; session retry pending");
                        }
                        _ => {}
                    },
                    Err(err) => {
                        warn!("mqtt receive loop error: {err:?}");
                        thread::sleep(retry_delay);
                    }
                }
            }
        })
        .expect("failed to spawn mqtt receiver thread");
}

/// Re-subscribes the command topic and announces the device. Runs on every
/// (re)connection so a fresh broker session always has the subscription
/// before any command is processed.
fn announce_session(mqtt: &Arc<Mutex<EspMqttClient<'static>>>) -> anyhow::Result<()> {
    let mut client = mqtt.lock().unwrap();
    client.subscribe(TOPIC_DISPENSE, QoS::AtMostOnce)?;
    client.publish(TOPIC_EVENTS, QoS::AtLeastOnce, true, ONLINE_PAYLOAD.as_bytes())?;
    Ok(())
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

fn execute_engine_actions(mqtt: &Arc<Mutex<EspMqttClient<'static>>>, actions: Vec<EngineAction>) {
    for action in actions {
        match action {
            EngineAction::Delay(ms) => thread::sleep(Duration::from_millis(ms)),
            EngineAction::BeginDispense => {
                // Release motor actuation hooks in here.
                info!("dispense cycle started");
            }
            EngineAction::PublishAck => {
                let result = {
                    let mut client = mqtt.lock().unwrap();
                    client.publish(TOPIC_DISPENSED, QoS::AtLeastOnce, false, ACK_PAYLOAD.as_bytes())
                };
                match result {
                    Ok(_) => info!("dispense ack sent on {}", TOPIC_DISPENSED),
                    Err(err) => warn!("dispense ack publish failed: {err:?}"),
                }
            }
        }
    }
}
