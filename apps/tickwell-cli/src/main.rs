use std::path::PathBuf;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use glam::Vec3;
use serde::Serialize;
use tickwell_common::Pose;
use tickwell_input::{Binding, Key, ScriptedDevice};
use tickwell_kernel::{SimConfig, SimEvent, Simulation, TICK_DURATION, TICK_DURATION_F32, TICK_RATE_HZ};
use tickwell_physics::{BodyDesc, LayerTable, PhysicsWorld, Shape};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tickwell-cli", about = "Headless driver for the tickwell simulation core")]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// YAML simulation config; defaults are used when absent
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print version, tick rate and the effective config
    Info {
        /// Dump the full config as YAML
        #[arg(long)]
        yaml: bool,
    },
    /// Run the simulation headless with scripted input
    Run {
        /// Wall-clock seconds to simulate
        #[arg(short, long, default_value = "5.0")]
        seconds: f64,
        /// Render frames per second driving the clock
        #[arg(short, long, default_value = "60.0")]
        fps: f64,
        /// Hold forward for the whole run
        #[arg(long)]
        walk: bool,
        /// Press the spawn key once per second
        #[arg(long)]
        spawn_cubes: bool,
        /// Print the summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Drop a body onto static ground and check it comes to rest
    Drop {
        #[arg(long, default_value = "10.0")]
        height: f32,
        #[arg(short, long, default_value = "120")]
        ticks: u32,
        /// Drop a unit box instead of a sphere
        #[arg(long)]
        cube: bool,
        #[arg(long)]
        json: bool,
    },
    /// Run identical input at several frame rates and compare state hashes
    Determinism {
        #[arg(short, long, default_value = "240")]
        ticks: u64,
        /// Comma-separated frame rates
        #[arg(long, value_delimiter = ',', default_value = "30,60,144")]
        rates: Vec<f64>,
    },
}

#[derive(Serialize)]
struct RunSummary {
    frames: u64,
    ticks: u64,
    cubes: usize,
    player: Pose,
    grounded: bool,
    state_hash: String,
    events: Vec<SimEvent>,
}

#[derive(Serialize)]
struct DropSummary {
    ticks: u32,
    start_height: f32,
    final_height: f32,
    rest_height: f32,
    monotonic: bool,
    settled: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .init();

    let config = match &cli.config {
        Some(path) => SimConfig::load(path)
            .with_context(|| format!("loading {}", path.display()))?,
        None => SimConfig::default(),
    };

    match cli.command {
        Commands::Info { yaml } => {
            println!("tickwell-cli v{}", env!("CARGO_PKG_VERSION"));
            println!("common: {}", tickwell_common::crate_info());
            println!("physics: {}", tickwell_physics::crate_info());
            println!("ecs: {}", tickwell_ecs::crate_info());
            println!("input: {}", tickwell_input::crate_info());
            println!("kernel: {}", tickwell_kernel::crate_info());
            println!("tick: {TICK_RATE_HZ} Hz ({TICK_DURATION:.6} s)");
            println!(
                "clock: max_frame_delta={} s, max_ticks_per_frame={}",
                config.max_frame_delta,
                (config.max_frame_delta * f64::from(TICK_RATE_HZ)).ceil()
            );
            println!(
                "physics: gravity={:?}, iterations={}, max_bodies={}",
                config.physics.gravity, config.physics.solver_iterations, config.physics.max_bodies
            );
            println!(
                "character: speed={} m/s, jump={} m/s, probe={} m",
                config.character.move_speed,
                config.character.jump_speed,
                config.character.ground_probe_distance
            );
            if yaml {
                print!("{}", config.to_yaml_string()?);
            }
        }
        Commands::Run {
            seconds,
            fps,
            walk,
            spawn_cubes,
            json,
        } => {
            if !(fps.is_finite() && fps > 0.0) {
                bail!("--fps must be positive, got {fps}");
            }
            let summary = run(config, seconds, fps, walk, spawn_cubes)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "Run: frames={}, ticks={}, cubes={}, player={:?}, grounded={}, hash={}",
                    summary.frames,
                    summary.ticks,
                    summary.cubes,
                    summary.player.position,
                    summary.grounded,
                    summary.state_hash
                );
            }
        }
        Commands::Drop {
            height,
            ticks,
            cube,
            json,
        } => {
            let summary = drop_test(&config, height, ticks, cube)?;
            if json {
                println!("{}", serde_json::to_string_pretty(&summary)?);
            } else {
                println!(
                    "Drop: {} ticks, height {:.3} -> {:.3} (rest {:.3}), monotonic={}, settled={}",
                    summary.ticks,
                    summary.start_height,
                    summary.final_height,
                    summary.rest_height,
                    summary.monotonic,
                    summary.settled
                );
            }
            if !summary.monotonic || !summary.settled {
                bail!("drop scenario failed");
            }
        }
        Commands::Determinism { ticks, rates } => {
            if rates.is_empty() {
                bail!("no frame rates given");
            }
            let mut hashes = Vec::with_capacity(rates.len());
            for &fps in &rates {
                if !(fps.is_finite() && fps > 0.0) {
                    bail!("frame rate must be positive, got {fps}");
                }
                let hash = determinism_run(config.clone(), ticks, fps)?;
                println!("{fps:>8.2} fps: hash={hash:#018x}");
                hashes.push(hash);
            }
            let reference = hashes[0];
            if hashes.iter().all(|&h| h == reference) {
                println!("Match: OK ({} rates, {ticks} ticks)", rates.len());
            } else {
                bail!("state hashes diverged across frame rates");
            }
        }
    }

    Ok(())
}

fn run(config: SimConfig, seconds: f64, fps: f64, walk: bool, spawn_cubes: bool) -> anyhow::Result<RunSummary> {
    let mut sim = Simulation::new(config)?;
    let mut device = ScriptedDevice::new();
    if walk {
        device.press(Binding::Key(Key::W));
    }

    let delta = 1.0 / fps;
    let frames = (seconds * fps).round().max(0.0) as u64;
    let mut events = Vec::new();
    let mut next_spawn = 0.0;
    for frame in 0..frames {
        let elapsed = frame as f64 * delta;
        if spawn_cubes && elapsed >= next_spawn {
            device.tap(Binding::Key(Key::E));
            next_spawn += 1.0;
        }
        let report = sim.frame(delta, &device);
        device.end_poll();
        events.extend(report.events);
        if report.frame % fps.round().max(1.0) as u64 == 0 {
            tracing::info!(
                frame = report.frame,
                tick = report.tick,
                player = ?sim.player_pose().position,
                "progress"
            );
        }
    }

    let player = sim.player_pose();
    let grounded = sim
        .characters()
        .data(sim.player())
        .is_some_and(|d| d.grounded);
    Ok(RunSummary {
        frames,
        ticks: sim.tick(),
        cubes: sim.cubes().len(),
        player,
        grounded,
        state_hash: format!("{:#018x}", sim.state_hash()),
        events,
    })
}

fn drop_test(config: &SimConfig, height: f32, ticks: u32, cube: bool) -> anyhow::Result<DropSummary> {
    let mut world = PhysicsWorld::new(config.physics.clone(), LayerTable::default());
    world.create_body(BodyDesc::fixed(
        Shape::cuboid(Vec3::new(10.0, 0.5, 10.0)),
        Pose::from_position(Vec3::new(0.0, -0.5, 0.0)),
    ))?;
    let shape = if cube {
        Shape::cuboid(Vec3::splat(0.5))
    } else {
        Shape::sphere(0.5)
    };
    let body = world.create_body(BodyDesc::dynamic(
        shape,
        Pose::from_position(Vec3::new(0.0, height, 0.0)),
    ))?;

    let rest_height = 0.5;
    let mut last = height;
    let mut monotonic = true;
    for tick in 1..=ticks {
        let stats = world.step(TICK_DURATION_F32);
        let y = world.position(body).y;
        if y > last + 1e-4 {
            monotonic = false;
        }
        if tick % 10 == 0 {
            tracing::debug!(tick, y, contacts = stats.contacts, "drop");
        }
        last = y;
    }
    let settled = (last - rest_height).abs() < 0.05 && world.linear_velocity(body).length() < 0.1;
    Ok(DropSummary {
        ticks,
        start_height: height,
        final_height: last,
        rest_height,
        monotonic,
        settled,
    })
}

fn determinism_run(config: SimConfig, ticks: u64, fps: f64) -> anyhow::Result<u64> {
    let mut sim = Simulation::new(config)?;
    sim.spawn_cube(Vec3::new(1.0, 6.0, 3.0))?;
    sim.spawn_cube(Vec3::new(1.2, 8.0, 3.1))?;
    sim.spawn_npc(Vec3::new(-6.0, 1.0, 4.0))?;

    let mut device = ScriptedDevice::new();
    device.press(Binding::Key(Key::W));
    device.press(Binding::Key(Key::A));

    let frame_delta = 1.0 / fps;
    while sim.tick() < ticks {
        // Shorten the final frame so every rate stops on the same tick.
        let owed = (ticks - sim.tick()) as f64 * TICK_DURATION - sim.clock().accumulator();
        sim.frame(frame_delta.min(owed.max(0.0)), &device);
        device.end_poll();
    }
    if sim.tick() != ticks {
        bail!("overshot to tick {} at {fps} fps", sim.tick());
    }
    Ok(sim.state_hash())
}
