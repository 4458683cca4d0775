//! Simulated jibri queue session.
//!
//! # Usage
//!
//! ```bash
//! # Wait behind three other rooms
//! jibri-queue-sim --position 3
//!
//! # Reproducible run with membership reset on leave
//! jibri-queue-sim --seed 42 --reset-on-leave --log-level debug
//! ```

use clap::Parser;
use jibri_queue_client::ClientIdAllocator;
use jibri_queue_core::{Jid, LeavePolicy};
use jibri_queue_sim::{ScenarioConfig, scenario};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Jibri queue simulator
#[derive(Parser, Debug)]
#[command(name = "jibri-queue-sim")]
#[command(about = "Run a queue client against a simulated jibri queue service")]
#[command(version)]
struct Args {
    /// Queue service address
    #[arg(long, default_value = "jibriqueue@jibri.sim")]
    queue: Jid,

    /// Conference room to queue for
    #[arg(long, default_value = "room@conference.sim")]
    room: Jid,

    /// Local client address
    #[arg(long, default_value = "focus@auth.sim/focus")]
    local: Jid,

    /// Rooms already waiting ahead of this one
    #[arg(short, long, default_value = "3")]
    position: usize,

    /// Seed for wait estimates and tokens
    #[arg(long, default_value = "0")]
    seed: u64,

    /// Reset membership when leave is acknowledged
    #[arg(long)]
    reset_on_leave: bool,

    /// Give up after this many queue advances
    #[arg(long, default_value = "1000")]
    max_rounds: usize,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer()).with(filter).init();

    let leave_policy =
        if args.reset_on_leave { LeavePolicy::ResetMembership } else { LeavePolicy::KeepMembership };

    tracing::info!(seed = args.seed, ahead = args.position, "starting queue simulation");

    let config = ScenarioConfig {
        queue: args.queue,
        room: args.room,
        local: args.local,
        ahead: args.position,
        seed: args.seed,
        leave_policy,
        max_rounds: args.max_rounds,
    };

    let report = scenario::run(config, ClientIdAllocator::process()).await?;

    tracing::info!(
        client = %report.client,
        rounds = report.rounds,
        updates = report.metrics.len(),
        acks = report.acks,
        token = %report.token,
        "served"
    );

    Ok(())
}
