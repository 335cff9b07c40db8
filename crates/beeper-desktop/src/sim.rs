//! Board simulation: one engine, its tick and housekeeping threads, and the
//! predicates the conditions watch.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use beeper_core::{
    Backend, BeeperEngine, Binding, PwmBackend, Registry, SquareWaveBackend, service,
};

use crate::buzzer::{DesktopBuzzer, SimPin, StdClock};

/// Toggle steps per 1 ms tick for the square-wave backend.
pub const PULSES_PER_TICK: u32 = 40;
pub const TICK: Duration = Duration::from_millis(1);
pub const HOUSEKEEPING: Duration = Duration::from_millis(100);

pub type DesktopBackend = Backend<SimPin, DesktopBuzzer, DesktopBuzzer>;
pub type DesktopEngine = BeeperEngine<DesktopBackend, StdClock>;

/// Levels of the simulated board predicates, keyed by condition name.
#[derive(Default)]
pub struct MockPredicates {
    levels: Mutex<HashMap<&'static str, bool>>,
}

impl MockPredicates {
    pub fn get(&self, name: &str) -> bool {
        self.levels
            .lock()
            .map(|levels| levels.get(name).copied().unwrap_or(false))
            .unwrap_or(false)
    }

    pub fn set(&self, name: &'static str, level: bool) {
        if let Ok(mut levels) = self.levels.lock() {
            levels.insert(name, level);
        }
    }

    /// Flip a predicate and return its new level.
    pub fn toggle(&self, name: &'static str) -> bool {
        let level = !self.get(name);
        self.set(name, level);
        level
    }
}

pub struct Simulator {
    pub engine: DesktopEngine,
    pub pin: SimPin,
    pub predicates: MockPredicates,
    stop: AtomicBool,
}

impl Simulator {
    pub fn new(use_pwm: bool, volume: u8) -> Self {
        let buzzer = DesktopBuzzer::new();
        let pin = SimPin::default();
        let backend = if use_pwm {
            DesktopBackend::from(PwmBackend::new(buzzer.clone(), buzzer).with_volume(volume))
        } else {
            let base_rate_hz = PULSES_PER_TICK * 1000;
            DesktopBackend::from(SquareWaveBackend::new(pin.clone(), buzzer, base_rate_hz))
        };

        Self {
            engine: BeeperEngine::new(backend, StdClock::new()),
            pin,
            predicates: MockPredicates::default(),
            stop: AtomicBool::new(false),
        }
    }

    pub fn stop(&self) {
        self.stop.store(true, Ordering::Release);
    }

    fn running(&self) -> bool {
        !self.stop.load(Ordering::Acquire)
    }
}

/// Install the registry's conditions for `engine_name` on the simulator.
pub fn bind(
    sim: &Simulator,
    registry: &mut Registry,
    engine_name: &'static str,
) -> anyhow::Result<Vec<Binding>> {
    let bindings = registry.bind(engine_name, &sim.engine)?;
    Ok(bindings.into_iter().collect())
}

/// Start the tick and housekeeping threads. Both exit after [`Simulator::stop`].
pub fn spawn(sim: &Arc<Simulator>, bindings: Vec<Binding>) -> anyhow::Result<[JoinHandle<()>; 2]> {
    let ticker = Arc::clone(sim);
    let tick = thread::Builder::new()
        .name("tick".to_string())
        .spawn(move || {
            while ticker.running() {
                ticker.engine.process();
                for _ in 0..PULSES_PER_TICK {
                    ticker.engine.pulse();
                }
                thread::sleep(TICK);
            }
        })?;

    let keeper = Arc::clone(sim);
    let housekeeping = thread::Builder::new()
        .name("housekeeping".to_string())
        .spawn(move || {
            while keeper.running() {
                service(&keeper.engine, &bindings, |b| keeper.predicates.get(b.name));
                thread::sleep(HOUSEKEEPING);
            }
        })?;

    Ok([tick, housekeeping])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates_toggle() {
        let predicates = MockPredicates::default();
        assert!(!predicates.get("print-done"));
        assert!(predicates.toggle("print-done"));
        assert!(predicates.get("print-done"));
        assert!(!predicates.toggle("print-done"));
        predicates.set("hotend-fault", true);
        assert!(predicates.get("hotend-fault"));
        assert!(!predicates.get("print-done"));
    }
}
