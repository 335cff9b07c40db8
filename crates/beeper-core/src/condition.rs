//! Condition records: predicate edge tracking plus a play budget.
//!
//! A condition does nothing by itself. The engine feeds it sampled predicate
//! levels through [`set_condition`](crate::engine::BeeperEngine::set_condition) and
//! decides in [`run_conditions`](crate::engine::BeeperEngine::run_conditions) whether
//! its theme should be enqueued.

use crate::tone::ToneTheme;

/// Handle returned when a condition is registered with an engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConditionId(pub(crate) usize);

impl ConditionId {
    pub fn index(&self) -> usize {
        self.0
    }
}

/// Predicate transition seen by [`ToneCondition::update`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Edge {
    Rising,
    Falling,
    None,
}

#[derive(Debug, Clone)]
pub struct ToneCondition {
    theme: &'static ToneTheme,
    looping: bool,
    play_count: u8,
    started: bool,
    heard: bool,
    plays: u8,
}

impl ToneCondition {
    /// `play_count == 0` loops for as long as the predicate holds.
    pub fn new(theme: &'static ToneTheme, play_count: u8) -> Self {
        Self {
            theme,
            looping: play_count == 0,
            play_count,
            started: false,
            heard: false,
            plays: 0,
        }
    }

    pub fn theme(&self) -> &'static ToneTheme {
        self.theme
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    /// Record a new predicate level and report the transition.
    ///
    /// A rising edge opens a fresh active interval with an empty play count.
    pub fn update(&mut self, level: bool) -> Edge {
        match (self.started, level) {
            (false, true) => {
                self.started = true;
                self.heard = false;
                self.plays = 0;
                Edge::Rising
            }
            (true, false) => {
                self.started = false;
                Edge::Falling
            }
            _ => Edge::None,
        }
    }

    /// Whether another enqueue is allowed in the current active interval.
    pub fn budget_left(&self) -> bool {
        self.looping || self.plays < self.play_count
    }

    /// Active and not yet exhausted.
    pub fn wants_play(&self) -> bool {
        self.started && (!self.heard || self.budget_left())
    }

    pub(crate) fn mark_played(&mut self) {
        self.heard = true;
        self.plays = self.plays.saturating_add(1);
    }

    pub fn state(&self) -> ConditionState {
        ConditionState {
            started: self.started,
            heard: self.heard,
            plays: self.plays,
            play_count: self.play_count,
            looping: self.looping,
        }
    }
}

/// Copy of a condition's state for diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ConditionState {
    pub started: bool,
    pub heard: bool,
    pub plays: u8,
    pub play_count: u8,
    pub looping: bool,
}
