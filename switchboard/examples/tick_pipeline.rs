//! Tick Pipeline Example: a small sensor pipeline on the switchboard bus.
//!
//! Three workers cooperate without ever calling each other:
//!
//! - `range-sensor` answers `ReadRange` requests with a (fake) distance,
//! - `mapper` consumes `Tick` notifications, asks the sensor for a reading
//!   each tick, and accumulates a map,
//! - the main thread acts as the timer driver: it broadcasts ticks, then
//!   shuts the pipeline down and prints the mapper's summary.
//!
//! ```bash
//! cargo run --example tick_pipeline
//! ```

use std::sync::Arc;
use std::time::Duration;

use switchboard::prelude::*;

// ============================================================================
// Message Types
// ============================================================================

/// Request one distance reading for the given tick.
#[derive(Debug, Clone, PartialEq)]
struct ReadRange {
    tick: u64,
}

impl Request for ReadRange {
    type Reply = f64;
}

/// One step of simulated time, broadcast to every interested worker.
#[derive(Debug, Clone, PartialEq)]
struct Tick {
    now: u64,
}

impl Notification for Tick {}

/// Cooperative shutdown signal.
#[derive(Debug, Clone)]
struct Shutdown;

impl Notification for Shutdown {}

/// Ask the mapper for everything it has mapped so far.
#[derive(Debug, Clone)]
struct MapSummary;

impl Request for MapSummary {
    type Reply = Vec<(u64, f64)>;
}

// ============================================================================
// Workers
// ============================================================================

/// Pretends to be a range finder: replies to `ReadRange` with a deterministic
/// pseudo-distance.
struct RangeSensor;

impl Worker for RangeSensor {
    fn name(&self) -> &str {
        "range-sensor"
    }

    fn init(&mut self, ctx: &mut SetupContext<'_, Self>) -> Result<(), BusError> {
        ctx.subscribe_request::<ReadRange, _>(|_me, _ctx, request, responder| {
            let distance = 10.0 + (request.tick % 5) as f64 * 0.5;
            responder.reply(distance);
            Ok(())
        })?;
        ctx.subscribe_notification::<Shutdown, _>(|_me, ctx, _msg| {
            ctx.terminate();
            Ok(())
        })
    }
}

/// Builds a tick → distance map by querying the sensor on every tick.
///
/// Blocking on the sensor's reply inside the tick handler stalls this
/// worker's own mailbox until the reading arrives; the sensor runs on its
/// own thread, so the reply always comes. The timeout bounds the wait in
/// case the sensor is gone.
struct Mapper {
    map: Vec<(u64, f64)>,
}

impl Worker for Mapper {
    fn name(&self) -> &str {
        "mapper"
    }

    fn init(&mut self, ctx: &mut SetupContext<'_, Self>) -> Result<(), BusError> {
        ctx.subscribe_notification::<Tick, _>(|me, ctx, tick| {
            let Some(promise) = ctx.send_request(ReadRange { tick: tick.now }) else {
                tracing::warn!(tick = tick.now, "no sensor available");
                return Ok(());
            };
            match promise.get_timeout(Duration::from_secs(1)) {
                Some(distance) => me.map.push((tick.now, distance)),
                None => tracing::warn!(tick = tick.now, "sensor reading timed out"),
            }
            Ok(())
        })?;
        ctx.subscribe_request::<MapSummary, _>(|me, _ctx, _request, responder| {
            responder.reply(me.map.clone());
            Ok(())
        })?;
        ctx.subscribe_notification::<Shutdown, _>(|_me, ctx, _msg| {
            ctx.terminate();
            Ok(())
        })
    }
}

// ============================================================================
// Driver
// ============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let bus = Arc::new(MessageBus::new());
    let sensor = worker::spawn(Arc::clone(&bus), RangeSensor)?;
    let mapper = worker::spawn(Arc::clone(&bus), Mapper { map: Vec::new() })?;

    // Give the workers a moment to finish their subscriptions.
    while bus.send_request(ReadRange { tick: 0 }).is_none()
        || bus.send_request(MapSummary).is_none()
    {
        std::thread::sleep(Duration::from_millis(1));
    }

    println!("=== Tick Pipeline ===\n");
    for now in 1..=10 {
        bus.send_notification(Tick { now });
        std::thread::sleep(Duration::from_millis(20));
    }

    let summary = bus
        .send_request(MapSummary)
        .expect("mapper is subscribed")
        .get_timeout(Duration::from_secs(2))
        .unwrap_or_default();

    bus.send_notification(Shutdown);
    sensor.join()?;
    mapper.join()?;

    println!("mapped {} readings:", summary.len());
    for (tick, distance) in summary {
        println!("  tick {tick:>2}: {distance:.1} m");
    }

    Ok(())
}
