//! List locations, print the first one's details, then stream its events.
//!
//! ```sh
//! cargo run -p homely --example stream -- -u <USERNAME> -p <PASSWORD>
//! ```
//!
//! Credentials can also come from `HOMELY_USERNAME` / `HOMELY_PASSWORD`.
//! Set `RUST_LOG=debug` to see protocol traffic. Ctrl-C stops the stream.

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "stream", about = "Stream Homely device events")]
struct Args {
    /// Username of your Homely account
    #[arg(short, long, env = "HOMELY_USERNAME")]
    username: String,
    /// Password of your Homely account
    #[arg(short, long, env = "HOMELY_PASSWORD", hide_env_values = true)]
    password: String,
    /// Override the API base URL
    #[arg(long)]
    base_url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let args = Args::parse();
    let client = homely::Client::new(homely::Config {
        username: args.username,
        password: args.password,
        base_url: args.base_url,
        stream_base_url: None,
    })?;

    let locations = client.locations().await?;
    let location = locations.first().ok_or("failed to find locations")?;
    eprintln!("location: {} ({})", location.name, location.location_id);

    let details = client.location_details(location.location_id).await?;
    eprintln!(
        "alarm state: {}, {} devices",
        details.alarm_state,
        details.devices.len()
    );
    for device in &details.devices {
        eprintln!(
            "  {} [{}] online={}",
            device.name, device.model_name, device.online
        );
    }

    let cancel = CancellationToken::new();
    let ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            ctrl_c.cancel();
        }
    });

    let result = client
        .stream(location.location_id, &cancel, |event| {
            for change in &event.data.changes {
                println!(
                    "{} {} {}.{} = {}",
                    event.kind, event.data.device_id, change.feature, change.state_name, change.value
                );
            }
        })
        .await;

    match result {
        Err(homely::Error::Stream(e)) if e.is_cancelled() => Ok(()),
        other => Ok(other?),
    }
}
