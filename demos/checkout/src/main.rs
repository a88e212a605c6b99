//! Checkout - epicstore example
//!
//! Demonstrates the full epicstore flow:
//! 1. Cart events dispatched through the app api
//! 2. `submit` selected by an epic, which starts the `pay` effect
//! 3. Effect events (start, success or fail, complete) update the payment reducer
//! 4. A consumer renders the summary once per batching tick
//!
//! # Usage
//!
//! ```sh
//! cargo run -p checkout-demo -- --items 3 --price 250
//! cargo run -p checkout-demo -- --decline --log-dispatch
//! RUST_LOG=epicstore_core=trace cargo run -p checkout-demo
//! ```

mod checkout;
mod view;

use std::time::Duration;

use clap::Parser;
use epicstore::prelude::*;
use epicstore::{EventFilter, EventLogConfig};
use tracing_subscriber::EnvFilter;

use crate::checkout::{checkout, Gateway};
use crate::view::{summary, SummaryLine};

/// Checkout flow driven by events, effects and epics
#[derive(Parser, Debug)]
#[command(name = "checkout")]
#[command(about = "A checkout flow demonstrating epicstore patterns")]
struct Args {
    /// Items to add to the cart
    #[arg(long, short, default_value = "2")]
    items: u32,

    /// Unit price
    #[arg(long, short, default_value = "100")]
    price: u64,

    /// Simulated gateway latency in milliseconds
    #[arg(long, default_value = "200")]
    latency_ms: u64,

    /// Make the gateway decline the card
    #[arg(long)]
    decline: bool,

    /// Log every dispatched event at debug level
    #[arg(long)]
    log_dispatch: bool,

    /// Print the event log on exit, optionally filtered (glob patterns, comma separated)
    #[arg(long)]
    show_log: Option<Option<String>>,
}

#[tokio::main]
async fn main() -> Result<(), StoreError> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .init();

    let gateway = Gateway {
        latency: Duration::from_millis(args.latency_ms),
        decline: args.decline,
    };
    let flow = checkout(args.price, gateway);

    let filter = match &args.show_log {
        Some(Some(patterns)) => EventFilter::new(Some(patterns.as_str()), None),
        _ => EventFilter::default(),
    };
    let config = AppConfig::new()
        .log_dispatch(args.log_dispatch)
        .event_log(EventLogConfig {
            filter,
            ..EventLogConfig::with_capacity(256)
        });

    let app = App::builder("checkout")
        .module(flow.module)
        .config(config)
        .build()?;

    let mut mounted = Consumer::builder(&app)
        .map_state(summary)
        .component(SummaryLine::default())
        .mount();

    let api = app.api();
    for _ in 0..args.items {
        api.trigger("add")?;
    }
    tokio::time::sleep(Duration::from_millis(50)).await;

    api.trigger("submit")?;
    tokio::time::sleep(gateway.latency + Duration::from_millis(50)).await;

    if args.show_log.is_some() {
        for entry in app.event_log() {
            println!(
                "#{:<3} {:<40} changed={:?}",
                entry.sequence,
                entry.event.event_type().to_string(),
                entry.state_changed
            );
        }
    }

    tracing::info!(
        submitted = %flow.submit.get_type(),
        effect = flow.pay.description(),
        "checkout finished"
    );
    mounted.unmount();
    app.stop()
}
