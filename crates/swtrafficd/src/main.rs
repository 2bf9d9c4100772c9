//! swtrafficd - switch traffic collector daemon.
//!
//! Polls interface counters from a network device over SNMP and posts
//! per-period rates and deltas to Mackerel. Collection and delivery run on
//! separate threads joined by an in-memory queue, so an API outage only grows
//! the backlog.

use tikv_jemallocator::Jemalloc;
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::{Level, error, info, warn};
use tracing_subscriber::EnvFilter;

use swtraffic_core::collector::{Collector, SnmpSource};
use swtraffic_core::config::{self, Config};
use swtraffic_core::custom::CustomConverter;
use swtraffic_core::mackerel::{HostRegistration, MackerelApi, MackerelClient};
use swtraffic_core::pipeline::{CollectionLoop, DeliveryLoop, Shutdown};
use swtraffic_core::queue::{DeliveryQueue, NoopSender, QueueOptions};

/// Switch traffic to Mackerel daemon.
#[derive(Parser, Debug)]
#[command(name = "swtrafficd", about = "Switch traffic to Mackerel daemon", version)]
struct Args {
    /// Path to the YAML configuration file.
    #[arg(short, long, default_value = "config.yaml")]
    config: PathBuf,

    /// Print collected snapshots and outgoing metrics to stdout.
    #[arg(long)]
    debug: bool,

    /// Collect and print, but never contact Mackerel. Host registration and
    /// graph definitions are skipped as well.
    #[arg(long)]
    dry_run: bool,

    /// Collection interval in seconds.
    #[arg(short, long, default_value = "60")]
    interval: u64,

    /// Delivery attempt interval in milliseconds.
    #[arg(long, default_value = "500")]
    send_interval_ms: u64,

    /// Drop the oldest undelivered batch once this many are queued.
    #[arg(long)]
    max_queued_batches: Option<usize>,

    /// Increase logging verbosity (-v for debug, -vv for trace). Default is info level.
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Quiet mode - only show errors.
    #[arg(short, long)]
    quiet: bool,
}

/// Initializes the tracing subscriber with the appropriate log level.
/// Default level is INFO. Use -q for quiet mode (errors only).
fn init_logging(verbose: u8, quiet: bool) {
    let level = if quiet {
        Level::ERROR
    } else {
        match verbose {
            0 => Level::INFO,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    let filter = EnvFilter::from_default_env()
        .add_directive(format!("swtrafficd={}", level).parse().unwrap())
        .add_directive(format!("swtraffic_core={}", level).parse().unwrap());

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Merges command-line switches into the file settings.
fn apply_args(config: &mut Config, args: &Args) {
    config.debug |= args.debug;
    config.dry_run |= args.dry_run;
    if config.mackerel.is_none() && !config.dry_run {
        warn!("No mackerel section in {}, force dry-run", args.config.display());
        config.dry_run = true;
    }
}

fn queue_options(config: &Config, args: &Args, identity: String) -> QueueOptions {
    QueueOptions {
        identity,
        dry_run: config.dry_run,
        debug: config.debug,
        max_batches: args.max_queued_batches,
    }
}

/// Registers the host and graphs; returns the queue that posts to Mackerel.
fn connect_mackerel(
    config: &Config,
    args: &Args,
    collector: &mut Collector<SnmpSource>,
) -> Result<DeliveryQueue, String> {
    let Some(mackerel) = &config.mackerel else {
        return Ok(DeliveryQueue::new(
            Box::new(NoopSender),
            queue_options(config, args, String::new()),
        ));
    };

    info!("Init for mackerel");
    let client = MackerelClient::new(&mackerel.api_key).map_err(|e| e.to_string())?;

    let interfaces = if mackerel.ignore_network_info {
        Vec::new()
    } else {
        collector.interface_inventory().map_err(|e| {
            print_inventory_hint();
            format!("failed to read interface inventory: {}", e)
        })?
    };

    let registration = HostRegistration {
        name: mackerel.name.clone(),
        target_addr: config.target.clone(),
        host_id: mackerel.host_id.clone(),
    };
    let host_id = match registration
        .register(&client, interfaces)
        .map_err(|e| format!("host registration failed: {}", e))?
    {
        Some(created) => {
            config::save_host_id(config.path(), &created).map_err(|e| e.to_string())?;
            info!("Host id {} saved to {}", created, config.path().display());
            created
        }
        None => mackerel.host_id.clone().unwrap_or_default(),
    };

    if !config.custom_graph_defs.is_empty() {
        client
            .create_graph_defs(&config.custom_graph_defs)
            .map_err(|e| format!("custom graph definitions failed: {}", e))?;
    }

    Ok(DeliveryQueue::new(
        Box::new(client),
        queue_options(config, args, host_id),
    ))
}

fn main() {
    let args = Args::parse();

    init_logging(args.verbose, args.quiet);

    info!("swtrafficd {} starting", swtraffic_core::VERSION);

    let mut config = match Config::load(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("{}", e);
            std::process::exit(1);
        }
    };
    apply_args(&mut config, &args);

    info!(
        "Config: target={}, interval={}s, send_interval={}ms, dry_run={}",
        config.target, args.interval, args.send_interval_ms, config.dry_run
    );
    info!(
        "Counters: {}",
        config
            .kinds
            .iter()
            .map(|k| k.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    );

    let source = match SnmpSource::connect(&config.target, &config.community) {
        Ok(source) => source,
        Err(e) => {
            error!("Failed to open SNMP session to {}: {}", config.target, e);
            std::process::exit(1);
        }
    };
    let custom = CustomConverter::new(config.custom_metrics.clone());
    let mut collector = Collector::new(source, config.kinds.clone())
        .with_filter(config.filter.clone())
        .skip_linkdown(config.skip_linkdown)
        .with_custom_oids(custom.oids())
        .debug(config.debug);

    let queue = if config.dry_run {
        DeliveryQueue::new(
            Box::new(NoopSender),
            queue_options(&config, &args, String::new()),
        )
    } else {
        match connect_mackerel(&config, &args, &mut collector) {
            Ok(queue) => queue,
            Err(e) => {
                error!("{}", e);
                std::process::exit(1);
            }
        }
    };
    let queue = Arc::new(queue);

    let mut collection = CollectionLoop::new(
        collector,
        queue.clone(),
        Duration::from_secs(args.interval.max(1)),
    )
    .with_custom(custom);
    let delivery = DeliveryLoop::new(queue.clone(), Duration::from_millis(args.send_interval_ms));

    // Setup graceful shutdown
    let shutdown = Shutdown::new();
    let s = shutdown.clone();
    if let Err(e) = ctrlc::set_handler(move || {
        info!("Received shutdown signal");
        s.trigger();
    }) {
        warn!("Failed to set Ctrl-C handler: {}", e);
    }

    let collector_thread = {
        let shutdown = shutdown.clone();
        std::thread::Builder::new()
            .name("collector".to_string())
            .spawn(move || collection.run(&shutdown))
    };
    let sender_thread = {
        let shutdown = shutdown.clone();
        std::thread::Builder::new()
            .name("sender".to_string())
            .spawn(move || delivery.run(&shutdown))
    };

    for (name, handle) in [("collector", collector_thread), ("sender", sender_thread)] {
        match handle {
            Ok(handle) => {
                if handle.join().is_err() {
                    error!("{} thread panicked", name);
                }
            }
            Err(e) => {
                error!("Failed to spawn {} thread: {}", name, e);
                shutdown.trigger();
            }
        }
    }

    info!("Shutdown complete");
}

/// Prints a hint for devices that refuse the IP address table.
fn print_inventory_hint() {
    const YELLOW: &str = "\x1b[33m";
    const RESET: &str = "\x1b[0m";

    eprintln!("{YELLOW}  The device did not return its interface addresses.");
    eprintln!("  To register the host with its target address only, set:");
    eprintln!("    mackerel:");
    eprintln!("      ignore-network-info: true{RESET}");
}
