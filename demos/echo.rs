//! Echo example: connect to the first RFduino found and send it a greeting
//!
//! Prints every notification the device sends back. Press Ctrl+C to run the
//! disconnect handshake and exit.
//!
//! Run with: cargo run --example echo

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rfduino_ble::{BtleplugCentral, ManagerConfig, Result, ScanManager};

/// Actions requested by observer hooks, applied after each dispatch.
enum Action {
    Connect(btleplug::platform::PeripheralId),
    DiscoverServices(btleplug::platform::PeripheralId),
    Greet(btleplug::platform::PeripheralId),
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter("warn,rfduino_ble=debug")
        .init();

    println!("RFduino echo");
    println!("============\n");

    let config = ManagerConfig::new().with_timeout_threshold(Duration::from_secs(5));
    let (mut manager, mut events) = ScanManager::with_btleplug(config).await?;

    let actions: Arc<Mutex<Vec<Action>>> = Arc::new(Mutex::new(Vec::new()));
    let target: Arc<Mutex<Option<btleplug::platform::PeripheralId>>> = Arc::new(Mutex::new(None));

    {
        let observer = manager.observer_mut();

        let (discovered_actions, discovered_target) = (actions.clone(), target.clone());
        observer.on_discovered(move |session| {
            let mut target = discovered_target.lock();
            if target.is_none() {
                println!("Found {} ({:?} dBm)", session.display_name(), session.rssi());
                *target = Some(session.id());
                discovered_actions.lock().push(Action::Connect(session.id()));
            }
        });

        let connected_actions = actions.clone();
        observer.on_connected(move |session| {
            println!("Connected to {}", session.display_name());
            connected_actions
                .lock()
                .push(Action::DiscoverServices(session.id()));
        });

        let ready_actions = actions.clone();
        observer.on_characteristics_discovered(move |session| {
            println!("{} is ready", session.display_name());
            ready_actions.lock().push(Action::Greet(session.id()));
        });

        observer
            .on_disconnect(|session| println!("{} disconnected", session.display_name()))
            .on_timeout(|session| println!("{} timed out", session.display_name()))
            .on_data_sent(|session, _, error| match error {
                Some(e) => println!("Send to {} failed: {}", session.display_name(), e),
                None => println!("Sent to {}", session.display_name()),
            })
            .on_data_received(|session, data| {
                if let Some(data) = data {
                    println!(
                        "{} says: {}",
                        session.display_name(),
                        String::from_utf8_lossy(data)
                    );
                }
            });
    }

    println!("Scanning... (Ctrl+C to quit)\n");

    loop {
        tokio::select! {
            event = events.recv() => {
                let Some(event) = event else { break };
                manager.dispatch(event);
                apply(&mut manager, &actions);
            }
            _ = tokio::signal::ctrl_c() => {
                println!("\nShutting down...");
                if let Some(id) = target.lock().take() {
                    if manager.session(&id).is_some_and(|s| s.is_connected()) {
                        manager.disconnect(&id)?;
                        // Let the handshake complete.
                        let deadline = tokio::time::sleep(Duration::from_secs(2));
                        tokio::pin!(deadline);
                        loop {
                            tokio::select! {
                                Some(event) = events.recv() => manager.dispatch(event),
                                _ = &mut deadline => break,
                            }
                        }
                    }
                }
                manager.shutdown();
                break;
            }
        }
    }

    Ok(())
}

fn apply(
    manager: &mut ScanManager<BtleplugCentral>,
    actions: &Mutex<Vec<Action>>,
) {
    let pending: Vec<Action> = std::mem::take(&mut *actions.lock());
    for action in pending {
        let result = match action {
            Action::Connect(id) => manager.connect(&id),
            Action::DiscoverServices(id) => manager.discover_services(&id),
            Action::Greet(id) => manager.send(&id, b"hello"),
        };
        if let Err(e) = result {
            println!("Error: {}", e);
        }
    }
}
