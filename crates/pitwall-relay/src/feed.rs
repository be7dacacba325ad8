//! Synthetic telemetry feed, so a freshly opened dashboard has something to
//! render before real producer traffic arrives. Diagnostic aid only.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use serde_json::json;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::registry::ViewerRegistry;

/// Synthetic feed settings.
#[derive(Clone, Debug)]
pub struct FeedConfig {
    /// Time between synthetic frames.
    pub interval: Duration,
    /// How many simulated vehicles to cycle through.
    pub vehicles: usize,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(3),
            vehicles: 3,
        }
    }
}

/// Spawn the synthetic feed.
///
/// While at least one viewer is connected, emits one plausible frame per
/// tick, cycling through the simulated vehicle ids. Idles while the registry
/// is empty and resumes when a viewer registers.
pub fn run_synthetic_feed(registry: Arc<ViewerRegistry>, config: FeedConfig) -> JoinHandle<()> {
    let mut occupancy = registry.watch_occupancy();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(config.interval);
        let mut vehicle = 0usize;
        loop {
            if !wait_for_viewers(&mut occupancy, &mut ticker).await {
                return;
            }
            ticker.tick().await;
            if *occupancy.borrow() == 0 {
                continue;
            }

            let frame = synthetic_frame(vehicle % config.vehicles.max(1));
            let delivered = registry.broadcast(&frame.to_string());
            tracing::debug!(vehicle, delivered, "synthetic frame sent");
            vehicle = vehicle.wrapping_add(1);
        }
    })
}

/// Park until at least one viewer is connected. Returns false once the
/// registry side of the watch is gone. Resets the ticker so a long idle
/// period does not burst-fire missed ticks on reconnect.
pub(crate) async fn wait_for_viewers(
    occupancy: &mut watch::Receiver<usize>,
    ticker: &mut tokio::time::Interval,
) -> bool {
    if *occupancy.borrow_and_update() > 0 {
        return true;
    }
    while *occupancy.borrow_and_update() == 0 {
        if occupancy.changed().await.is_err() {
            return false;
        }
    }
    ticker.reset();
    true
}

/// One plausible frame. Ranges are loose but bounded: speed 0-130 km/h, fuel
/// consumption 2-18 l/100km, emissions 90-260 g/km, alignment 0-100.
fn synthetic_frame(vehicle: usize) -> serde_json::Value {
    let mut rng = rand::thread_rng();
    json!({
        "vehicle_id": format!("sim-{:02}", vehicle + 1),
        "timestamp": Utc::now().to_rfc3339(),
        "speed": round2(rng.gen_range(0.0..130.0)),
        "fuel_consumption": round2(rng.gen_range(2.0..18.0)),
        "emissions": round2(rng.gen_range(90.0..260.0)),
        "platooning_status": if rng.gen_bool(0.5) { "on" } else { "off" },
        "role": if rng.gen_bool(0.3) { "leader" } else { "follower" },
        "alignment_score": round2(rng.gen_range(0.0..100.0)),
    })
}

fn round2(v: f64) -> f64 {
    (v * 100.0).round() / 100.0
}
