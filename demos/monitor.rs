use std::env;
use std::time::Duration;

use mhi_sl4::{LocalApi, SystemController, VirtualGroupSpec};

#[tokio::main]
async fn main() -> mhi_sl4::Result<()> {
    tracing_subscriber::fmt::init();

    let args: Vec<String> = env::args().collect();
    let usage = "usage: monitor <host> <username> <password>";
    let host = args.get(1).expect(usage);
    let username = args.get(2).expect(usage);
    let password = args.get(3).expect(usage);

    let api = LocalApi::builder(host, username, password).build();
    let mut controller = SystemController::builder(api)
        .group(VirtualGroupSpec {
            key: "all".to_string(),
            display_name: "All units".to_string(),
            members: None,
        })
        .on_event(|event| println!("{event:?}"))
        .build();

    println!("Polling {host}...");
    loop {
        if let Err(e) = controller.refresh().await {
            eprintln!("Refresh error: {e}");
            tokio::time::sleep(Duration::from_secs(5)).await;
            continue;
        }

        for device in controller.device_states() {
            let temp = device
                .current_temperature
                .map(|t| t.to_string())
                .unwrap_or_else(|| "--".to_string());
            println!(
                "[{}] {} | {} | mode: {:?} | fan: {:?}{}{}",
                device.key,
                device.name,
                temp,
                device.hvac_mode,
                device.fan_mode,
                if device.is_virtual { " | virtual" } else { "" },
                if device.is_consistent { "" } else { " | DESYNC" },
            );
        }

        tokio::time::sleep(Duration::from_secs(30)).await;
    }
}
