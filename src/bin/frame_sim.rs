//! frame_sim - headless guard simulation
//!
//! Spawns a squad of guards, runs the scheduler for a number of frames and
//! prints what the router did. Useful for eyeballing slice budgets and message
//! volume with `RUST_LOG=statecraft=debug`.

use std::cell::RefCell;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::Rc;

use clap::Parser;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use serde::Serialize;

use statecraft::behavior::Behavior;
use statecraft::behaviors::guard::{LOOKOUT_LANE, MOVEMENT_LANE};
use statecraft::behaviors::{Lookout, Patrol, GUARD};
use statecraft::core::{Result, SchedulerConfig};
use statecraft::router::{DispatchObserver, DispatchRecord, RouterStats};
use statecraft::simulation::Simulation;

/// Headless guard simulation driven by the behavior scheduler
#[derive(Parser, Debug)]
#[command(name = "frame_sim")]
#[command(about = "Run guards through the frame scheduler and report router activity")]
struct Args {
    /// Scheduler config (TOML); defaults are used when omitted
    #[arg(long)]
    config: Option<PathBuf>,

    /// Number of guards to spawn
    #[arg(long, default_value_t = 16)]
    guards: usize,

    /// Frames to run
    #[arg(long, default_value_t = 600)]
    frames: usize,

    /// Seconds per frame
    #[arg(long, default_value_t = 1.0 / 60.0)]
    dt: f64,

    /// Random seed for deterministic runs
    #[arg(long)]
    seed: Option<u64>,

    /// Output format: json or text
    #[arg(long, default_value = "text")]
    format: String,
}

/// Counts handled events per behavior
#[derive(Clone, Default)]
struct EventCounter {
    counts: Rc<RefCell<BTreeMap<String, u64>>>,
}

impl DispatchObserver for EventCounter {
    fn on_dispatch(&mut self, record: &DispatchRecord) {
        if record.handled {
            let key = format!("{}.{}", record.behavior, record.event.name());
            *self.counts.borrow_mut().entry(key).or_default() += 1;
        }
    }
}

#[derive(Serialize)]
struct RunSummary {
    seed: u64,
    guards: usize,
    frames: usize,
    simulated_seconds: f64,
    messages_routed: usize,
    slices_delivered: usize,
    pending_at_end: usize,
    stats: RouterStats,
    handled_events: BTreeMap<String, u64>,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => SchedulerConfig::load(path)?,
        None => SchedulerConfig::default(),
    };
    let seed = args.seed.unwrap_or_else(rand::random);
    let mut rng = ChaCha8Rng::seed_from_u64(seed);

    tracing::info!(
        "Starting statecraft with {} guards, {} frames, slice policy {:?}",
        args.guards,
        args.frames,
        config.slices
    );

    let mut sim = Simulation::new(config);
    let counter = EventCounter::default();
    sim.router.set_observer(counter.clone());

    for i in 0..args.guards {
        let id = sim.spawn(GUARD, format!("Guard_{}", i));
        let walk_time = rng.gen_range(1.5..4.0);
        let glance_time = rng.gen_range(0.3..0.8);
        let slice_delay = rng.gen_range(0.5..1.5);
        let Some(manager) = sim.world.manager_mut(id) else {
            continue;
        };
        manager.request_push(
            MOVEMENT_LANE,
            Behavior::new(Patrol::new(walk_time, glance_time)),
            true,
        );
        if manager.lane_count() > LOOKOUT_LANE {
            manager.request_push(
                LOOKOUT_LANE,
                Behavior::new(Lookout::new(rng.gen(), 0.02, slice_delay)),
                true,
            );
        }
    }

    let mut messages_routed = 0;
    let mut slices_delivered = 0;
    for report in sim.run_frames(args.frames, args.dt) {
        messages_routed += report.messages_routed;
        slices_delivered += report.slices_delivered;
    }

    let summary = RunSummary {
        seed,
        guards: args.guards,
        frames: args.frames,
        simulated_seconds: sim.now(),
        messages_routed,
        slices_delivered,
        pending_at_end: sim.router.pending().len(),
        stats: sim.router.stats(),
        handled_events: counter.counts.borrow().clone(),
    };

    if args.format == "json" {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_text(&summary);
    }

    Ok(())
}

fn print_text(summary: &RunSummary) {
    println!("=== STATECRAFT RUN (seed {}) ===", summary.seed);
    println!(
        "{} guards, {} frames, {:.2}s simulated",
        summary.guards, summary.frames, summary.simulated_seconds
    );
    println!();
    println!("Delayed messages routed | {:>8}", summary.messages_routed);
    println!("Slices delivered        | {:>8}", summary.slices_delivered);
    println!("Still pending           | {:>8}", summary.pending_at_end);
    println!("Sent                    | {:>8}", summary.stats.sent);
    println!("Delivered               | {:>8}", summary.stats.delivered);
    println!("Duplicates suppressed   | {:>8}", summary.stats.duplicates_suppressed);
    println!("Dropped (scope)         | {:>8}", summary.stats.scope_dropped);
    println!("Dropped (unresolved)    | {:>8}", summary.stats.unresolved);
    println!("Deferred                | {:>8}", summary.stats.deferred);
    println!("Removed/purged          | {:>8}", summary.stats.removed);
    println!();
    println!("Handled events:");
    for (event, count) in &summary.handled_events {
        println!("  {:<28} {:>8}", event, count);
    }
}
