//! Headless Skyflag server: runs a room at the configured tick rate with a few
//! scripted bots so the simulation can be watched through the logs.
//!
//! Usage: `skyflag-server [seconds]`. Runs until interrupted when no duration is given.

use anyhow::{Context, Result};
use engine_core::{Team, Time, VehicleKind};
use game::{GameEvent, JoinOptions, Room, SimConfig};
use input::ControlInput;

struct Bot {
    id: &'static str,
    team: Team,
    vehicle: VehicleKind,
}

const BOTS: [Bot; 4] = [
    Bot {
        id: "red-drone",
        team: Team::Red,
        vehicle: VehicleKind::Drone,
    },
    Bot {
        id: "blue-drone",
        team: Team::Blue,
        vehicle: VehicleKind::Drone,
    },
    Bot {
        id: "red-plane",
        team: Team::Red,
        vehicle: VehicleKind::Plane,
    },
    Bot {
        id: "blue-plane",
        team: Team::Blue,
        vehicle: VehicleKind::Plane,
    },
];

/// Scripted controls: drones push toward the enemy base firing in bursts,
/// planes circle at full throttle.
fn bot_input(bot: &Bot, tick: u64) -> ControlInput {
    let mut input = ControlInput::at_tick(tick);
    match bot.vehicle {
        VehicleKind::Drone => {
            input.forward = true;
            input.fire = (tick / 60) % 3 == 0;
            input.up = tick % 240 < 20;
        }
        VehicleKind::Plane => {
            input.forward = true;
            input.yaw_left = bot.team == Team::Red;
            input.yaw_right = bot.team == Team::Blue;
            input.fire = tick % 90 < 30;
        }
    }
    input
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let duration: Option<f32> = std::env::args()
        .nth(1)
        .map(|arg| arg.parse::<f32>())
        .transpose()
        .context("duration must be a number of seconds")?;

    let config = SimConfig::load();
    let mut room = Room::new(config.clone()).context("failed to create room")?;
    for bot in &BOTS {
        room.join(
            bot.id,
            JoinOptions {
                team: Some(bot.team),
                vehicle: bot.vehicle,
            },
        )
        .with_context(|| format!("failed to join {}", bot.id))?;
    }

    let mut time = Time::new(config.tick_rate);
    let last_tick = duration.map(|seconds| time.seconds_to_ticks(seconds));
    log::info!(
        "skyflag server running at {} Hz{}",
        config.tick_rate,
        last_tick.map_or(String::new(), |t| format!(" for {t} ticks"))
    );

    loop {
        time.update();
        while time.should_fixed_update() {
            let next = room.tick_count() + 1;
            for bot in &BOTS {
                room.add_input(bot.id, bot_input(bot, next));
            }
            let snapshot = room.tick();
            for event in &snapshot.events {
                match event {
                    GameEvent::Hit { .. } | GameEvent::Crash { .. } => log::debug!("{event:?}"),
                    GameEvent::ProjectileFired { .. } => {}
                    _ => log::info!("{event:?}"),
                }
            }
            if snapshot.tick % u64::from(config.tick_rate) == 0 {
                log::info!(
                    "tick {}: {} entities, score red {} / blue {}",
                    snapshot.tick,
                    snapshot.entities.len(),
                    snapshot.scores.red,
                    snapshot.scores.blue
                );
            }
        }

        if last_tick.is_some_and(|last| room.tick_count() >= last) {
            break;
        }
        std::thread::sleep(time.until_next_tick());
    }

    log::info!("final score red {} / blue {}", room.scores().red, room.scores().blue);
    Ok(())
}
