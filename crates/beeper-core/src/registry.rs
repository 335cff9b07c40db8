//! Startup tables: named engines, themes and condition bindings.
//!
//! Boards describe their buzzers in data and validate it once at startup. A
//! condition that names a missing engine or theme, or a theme that can never
//! fit the tone buffer, is rejected here with a descriptive error instead of
//! failing later at playback time.

use heapless::Vec;

use crate::buzzer::ToneOutput;
use crate::clock::Clock;
use crate::condition::ConditionId;
use crate::engine::{BeeperEngine, MAX_CONDITIONS, TONE_BUFFER_SIZE};
use crate::error::RegistryError;
use crate::tone::ToneTheme;

pub const MAX_ENGINES: usize = 4;
pub const MAX_THEMES: usize = 32;

#[derive(Debug, Clone, Copy)]
struct ThemeEntry {
    name: &'static str,
    theme: &'static ToneTheme,
}

#[derive(Debug, Clone, Copy)]
struct ConditionEntry {
    name: &'static str,
    engine: &'static str,
    theme: &'static ToneTheme,
    play_count: u8,
}

/// A condition installed on an engine. The host samples the predicate named
/// by `name` and feeds it to [`BeeperEngine::set_condition`] with `id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Binding {
    pub name: &'static str,
    pub id: ConditionId,
}

/// Validated configuration for every buzzer on the board.
///
/// `C` is the tone buffer size of the engines, themes must fit in `C - 1`.
pub struct Registry<const C: usize = TONE_BUFFER_SIZE> {
    engines: Vec<&'static str, MAX_ENGINES>,
    themes: Vec<ThemeEntry, MAX_THEMES>,
    conditions: Vec<ConditionEntry, MAX_CONDITIONS>,
    bound: Vec<&'static str, MAX_ENGINES>,
}

impl<const C: usize> Registry<C> {
    pub const fn new() -> Self {
        Self {
            engines: Vec::new(),
            themes: Vec::new(),
            conditions: Vec::new(),
            bound: Vec::new(),
        }
    }

    pub fn engine(&mut self, name: &'static str) -> Result<&mut Self, RegistryError> {
        if self.engines.contains(&name) {
            return Err(reject(RegistryError::DuplicateName(name)));
        }
        self.engines
            .push(name)
            .map_err(|_| reject(RegistryError::TableFull(name)))?;
        Ok(self)
    }

    pub fn theme(
        &mut self,
        name: &'static str,
        theme: &'static ToneTheme,
    ) -> Result<&mut Self, RegistryError> {
        let max = C.saturating_sub(1);
        if theme.len() > max {
            return Err(reject(RegistryError::ThemeTooLong {
                name,
                len: theme.len(),
                max,
            }));
        }
        if self.find_theme(name).is_some() {
            return Err(reject(RegistryError::DuplicateName(name)));
        }
        self.themes
            .push(ThemeEntry { name, theme })
            .map_err(|_| reject(RegistryError::TableFull(name)))?;
        Ok(self)
    }

    /// Bind a theme on an engine to a predicate. `play_count == 0` loops.
    pub fn condition(
        &mut self,
        name: &'static str,
        engine: &'static str,
        theme: &'static str,
        play_count: u8,
    ) -> Result<&mut Self, RegistryError> {
        if !self.engines.contains(&engine) {
            return Err(reject(RegistryError::UnknownEngine {
                condition: name,
                engine,
            }));
        }
        let Some(theme) = self.find_theme(theme) else {
            return Err(reject(RegistryError::UnknownTheme {
                condition: name,
                theme,
            }));
        };
        if self.conditions.iter().any(|c| c.name == name) {
            return Err(reject(RegistryError::DuplicateName(name)));
        }
        self.conditions
            .push(ConditionEntry {
                name,
                engine,
                theme,
                play_count,
            })
            .map_err(|_| reject(RegistryError::TableFull(name)))?;
        Ok(self)
    }

    pub fn find_theme(&self, name: &str) -> Option<&'static ToneTheme> {
        self.themes
            .iter()
            .find(|entry| entry.name == name)
            .map(|entry| entry.theme)
    }

    pub fn engine_names(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.engines.iter().copied()
    }

    /// Install every condition that targets `engine_name` on `engine`.
    ///
    /// Each engine name binds once.
    pub fn bind<B: ToneOutput, K: Clock>(
        &mut self,
        engine_name: &'static str,
        engine: &BeeperEngine<B, K, C>,
    ) -> Result<Vec<Binding, MAX_CONDITIONS>, RegistryError> {
        if !self.engines.contains(&engine_name) {
            return Err(reject(RegistryError::UnknownEngine {
                condition: "<bind>",
                engine: engine_name,
            }));
        }
        if self.bound.contains(&engine_name) {
            return Err(reject(RegistryError::AlreadyBound(engine_name)));
        }
        let mut bindings = Vec::new();
        for entry in self.conditions.iter().filter(|c| c.engine == engine_name) {
            let id = engine
                .add_condition(entry.theme, entry.play_count)
                .map_err(|e| reject(e.into()))?;
            bindings
                .push(Binding { name: entry.name, id })
                .map_err(|_| reject(RegistryError::TableFull(entry.name)))?;
        }
        // engines are unique, so this always fits
        self.bound.push(engine_name).ok();
        log::info!(
            "engine `{}`: {} condition(s) bound",
            engine_name,
            bindings.len()
        );
        Ok(bindings)
    }
}

impl<const C: usize> Default for Registry<C> {
    fn default() -> Self {
        Self::new()
    }
}

/// One housekeeping pass: sample every bound predicate, then scan conditions.
///
/// Predicates are not sampled while the engine is muted.
pub fn service<B: ToneOutput, K: Clock, const C: usize>(
    engine: &BeeperEngine<B, K, C>,
    bindings: &[Binding],
    mut sample: impl FnMut(&Binding) -> bool,
) {
    if !engine.is_muted() {
        for binding in bindings {
            // ids come from bind() on this engine
            engine.set_condition(sample(binding), binding.id).ok();
        }
    }
    engine.run_conditions();
}

fn reject(err: RegistryError) -> RegistryError {
    log::error!("beeper registry: {}", err);
    err
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{TestClock, TestEngine, engine, run_for};
    use crate::tone::{TonePacket, themes};

    static LONG: ToneTheme = ToneTheme::new(&[TonePacket::new(100, 1); 6]);
    static OK: ToneTheme = themes::BUTTON_OK;
    static WARNING: ToneTheme = themes::NOTIFY_WARNING;

    fn board() -> Registry<50> {
        let mut registry = Registry::new();
        registry
            .engine("main")
            .unwrap()
            .theme("ok", &OK)
            .unwrap()
            .theme("warning", &WARNING)
            .unwrap()
            .condition("door-open", "main", "warning", 0)
            .unwrap()
            .condition("job-done", "main", "ok", 1)
            .unwrap();
        registry
    }

    #[test]
    fn test_unbound_conditions_are_rejected() {
        let mut registry = board();
        let err = registry
            .condition("fan", "aux", "ok", 1)
            .err()
            .unwrap();
        assert!(err.is_unbound());
        assert_eq!(
            err,
            RegistryError::UnknownEngine {
                condition: "fan",
                engine: "aux"
            }
        );

        let err = registry
            .condition("fan", "main", "chime", 1)
            .err()
            .unwrap();
        assert_eq!(
            err,
            RegistryError::UnknownTheme {
                condition: "fan",
                theme: "chime"
            }
        );
    }

    #[test]
    fn test_theme_too_long_for_buffer() {
        let mut registry = Registry::<6>::new();
        let err = registry.theme("long", &LONG).err().unwrap();
        assert_eq!(
            err,
            RegistryError::ThemeTooLong {
                name: "long",
                len: 6,
                max: 5
            }
        );
        assert!(!err.is_unbound());
    }

    #[test]
    fn test_duplicate_names() {
        let mut registry = board();
        assert_eq!(
            registry.engine("main").err(),
            Some(RegistryError::DuplicateName("main"))
        );
        assert_eq!(
            registry.theme("ok", &OK).err(),
            Some(RegistryError::DuplicateName("ok"))
        );
        assert_eq!(
            registry.condition("job-done", "main", "ok", 2).err(),
            Some(RegistryError::DuplicateName("job-done"))
        );
    }

    #[test]
    fn test_bind_installs_conditions() {
        let mut registry = board();
        let clock = TestClock::default();
        let beeper: TestEngine = engine(&clock);

        let bindings = registry.bind("main", &beeper).unwrap();
        assert_eq!(bindings.len(), 2);
        assert_eq!(bindings[0].name, "door-open");
        assert_eq!(beeper.condition_count(), 2);
        assert!(beeper.condition(bindings[0].id).unwrap().looping);
        assert!(registry.bind("aux", &beeper).is_err());
    }

    #[test]
    fn test_engine_binds_once() {
        let mut registry = board();
        let clock = TestClock::default();
        let beeper: TestEngine = engine(&clock);

        registry.bind("main", &beeper).unwrap();
        assert_eq!(
            registry.bind("main", &beeper).err(),
            Some(RegistryError::AlreadyBound("main"))
        );
        assert_eq!(beeper.condition_count(), 2);
    }

    #[test]
    fn test_service_samples_and_scans() {
        let mut registry = board();
        let clock = TestClock::default();
        let beeper: TestEngine = engine(&clock);
        let bindings = registry.bind("main", &beeper).unwrap();

        let job_done = |b: &Binding| b.name == "job-done";
        // first pass visits door-open, which is inactive
        service(&beeper, &bindings, job_done);
        assert!(!beeper.is_playing());
        service(&beeper, &bindings, job_done);
        assert_eq!(beeper.current_frequency(), 3000);

        run_for(&beeper, &clock, 10);
        for _ in 0..4 {
            service(&beeper, &bindings, job_done);
        }
        assert!(!beeper.is_playing());
    }

    #[test]
    fn test_service_ignores_predicates_while_muted() {
        let mut registry = board();
        let clock = TestClock::default();
        let beeper: TestEngine = engine(&clock);
        let bindings = registry.bind("main", &beeper).unwrap();

        beeper.mute(true);
        service(&beeper, &bindings, |_| true);
        assert!(!beeper.condition(bindings[0].id).unwrap().started);
    }
}
