//! Discover command implementation.

use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::time::Duration;

use colored::*;
use indicatif::{ProgressBar, ProgressStyle};
use mndp_core::{Device, DiscoveryEvents, DiscoveryService, Options};

use crate::cli::DiscoverArgs;
use crate::error::{CliError, Result};
use crate::output::{get_formatter, OutputFormatter};

/// Run the discover command
pub async fn run_discover(args: DiscoverArgs, json: bool) -> Result<()> {
    let options = Options {
        port: Some(args.port),
        host: args.bind.clone(),
        family: args.family.into(),
    };

    let (service, events) = DiscoveryService::new(options)?;

    if args.watch {
        run_watch_mode(service, events, json).await
    } else {
        let duration = Duration::from_secs(args.duration);
        run_oneshot_mode(service, events, duration, get_formatter(json).as_ref()).await
    }
}

/// Wait for the service to come up, surfacing a bind failure as an error.
async fn wait_for_start(
    service: &DiscoveryService,
    events: &mut DiscoveryEvents,
) -> Result<SocketAddr> {
    service.start().await;

    tokio::select! {
        Some(addr) = events.started.recv() => Ok(addr),
        Some(err) = events.errors.recv() => Err(err.into()),
        else => Err(CliError::Other(
            "discovery service closed before starting".to_string(),
        )),
    }
}

async fn run_oneshot_mode(
    service: DiscoveryService,
    mut events: DiscoveryEvents,
    duration: Duration,
    formatter: &dyn OutputFormatter,
) -> Result<()> {
    let local = wait_for_start(&service, &mut events).await?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::with_template("{spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    spinner.set_message(format!(
        "Listening on {} for {} seconds...",
        local,
        duration.as_secs()
    ));
    spinner.enable_steady_tick(Duration::from_millis(120));

    // Keyed by source IP so a device announcing every few seconds shows up
    // once; the core itself does not de-duplicate.
    let mut devices: BTreeMap<String, Device> = BTreeMap::new();
    let mut errors_open = true;

    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);

    loop {
        tokio::select! {
            _ = &mut deadline => break,
            maybe = events.devices.recv() => match maybe {
                Some(device) => {
                    devices.insert(device.ip.clone(), device);
                }
                None => break,
            },
            maybe = events.errors.recv(), if errors_open => match maybe {
                Some(err) => {
                    spinner.suspend(|| eprintln!("{}", format!("warning: {}", err).yellow()));
                }
                None => errors_open = false,
            },
        }
    }

    spinner.finish_and_clear();
    service.stop().await;

    let devices: Vec<Device> = devices.into_values().collect();
    println!("{}", formatter.format_devices(&devices));

    if devices.is_empty() {
        return Err(CliError::NoDevicesFound);
    }

    Ok(())
}

async fn run_watch_mode(
    service: DiscoveryService,
    mut events: DiscoveryEvents,
    json: bool,
) -> Result<()> {
    let local = wait_for_start(&service, &mut events).await?;
    let formatter = get_formatter(json);

    if !json {
        println!(
            "Watching for announcements on {} (press Ctrl+C to stop)\n",
            local.to_string().bold()
        );
    }

    let mut errors_open = true;

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                service.stop().await;
                break;
            }
            maybe = events.devices.recv() => match maybe {
                Some(device) => println!("{}", formatter.format_device(&device)),
                None => break,
            },
            maybe = events.errors.recv(), if errors_open => match maybe {
                Some(err) => eprintln!("{}", format!("error: {}", err).red()),
                None => errors_open = false,
            },
        }
    }

    // Wait for the shutdown notification so streams are fully closed.
    let _ = events.stopped.recv().await;

    if !json {
        println!("\nStopped.");
    }

    Ok(())
}
