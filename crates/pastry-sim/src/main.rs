//! pastry-sim binary
//!
//! Usage:
//!   pastry-sim [node_count] [seed]
//!
//! Routing parameters come from the `PASTRY_*` environment variables.

use pastry_routing::RoutingConfig;
use pastry_sim::{Simulation, SimulationConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

fn print_usage() {
    eprintln!("pastry-sim - Build a seeded cluster and report routing state");
    eprintln!();
    eprintln!("Usage:");
    eprintln!("  pastry-sim [node_count] [seed]   (defaults: 100 nodes, seed 42)");
    eprintln!();
    eprintln!("Environment:");
    eprintln!("  PASTRY_ID_BASE, PASTRY_ID_LENGTH          Identifier space");
    eprintln!("  PASTRY_LEAF_HALF_CAPACITY                 Leaf set half size");
    eprintln!("  PASTRY_NEIGHBORHOOD_CAPACITY              Neighborhood size");
    eprintln!("  PASTRY_REGION_PENALTY                     Cross-region latency multiplier");
    eprintln!("  PASTRY_LOOKUP_TIMEOUT_MS                  Worker answer deadline");
    eprintln!("  PASTRY_INBOX_CAPACITY                     Worker inbox bound");
    eprintln!("  RUST_LOG                                  Log filter (default: pastry=info)");
}

fn parse_arg<T: std::str::FromStr>(arg: Option<String>, name: &str, default: T) -> Result<T, String> {
    match arg {
        None => Ok(default),
        Some(raw) => raw
            .parse()
            .map_err(|_| format!("invalid {}: {:?}", name, raw)),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pastry=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut args = std::env::args().skip(1);
    if std::env::args().any(|a| a == "-h" || a == "--help") {
        print_usage();
        return Ok(());
    }

    let defaults = SimulationConfig::default();
    let node_count = parse_arg(args.next(), "node_count", defaults.node_count);
    let seed = parse_arg(args.next(), "seed", defaults.seed);
    let (node_count, seed) = match (node_count, seed) {
        (Ok(n), Ok(s)) => (n, s),
        (Err(e), _) | (_, Err(e)) => {
            eprintln!("Error: {}", e);
            print_usage();
            std::process::exit(2);
        }
    };

    let routing = RoutingConfig::from_env()?;
    tracing::info!(
        node_count,
        seed,
        space = %routing.space,
        leaf_half_capacity = routing.leaf_half_capacity,
        "starting simulation"
    );

    let config = defaults
        .with_node_count(node_count)
        .with_seed(seed)
        .with_routing(routing);

    let report = Simulation::new(config)?.run().await?;
    println!("{}", report);

    if report.unowned > 0 {
        tracing::warn!(unowned = report.unowned, "some keys have no responsible node");
    }

    Ok(())
}
