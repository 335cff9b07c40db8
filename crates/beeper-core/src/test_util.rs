use core::cell::Cell;
use core::convert::Infallible;
use std::rc::Rc;

use embedded_hal::digital::{self, OutputPin};
use embedded_hal::pwm::{ErrorType, SetDutyCycle};

use crate::buzzer::{OutputKind, ToneOutput, ToneTimer};
use crate::clock::Clock;
use crate::engine::BeeperEngine;

#[derive(Default)]
pub struct TestClock {
    now: Cell<u32>,
}

impl TestClock {
    pub fn at(ms: u32) -> Self {
        Self { now: Cell::new(ms) }
    }

    pub fn advance(&self, ms: u32) {
        self.now.set(self.now.get().wrapping_add(ms));
    }
}

impl Clock for TestClock {
    fn now_ms(&self) -> u32 {
        self.now.get()
    }
}

#[derive(Default)]
pub struct RecordingTimer {
    pub starts: Vec<u16>,
    pub stops: usize,
}

impl ToneTimer for RecordingTimer {
    fn start(&mut self, frequency_hz: u16) {
        self.starts.push(frequency_hz);
    }

    fn stop(&mut self) {
        self.stops += 1;
    }
}

/// Duty channel with a 0..=100 range so percentages read back unchanged.
#[derive(Default)]
pub struct RecordingDuty {
    pub history: Vec<u16>,
}

impl ErrorType for RecordingDuty {
    type Error = Infallible;
}

impl SetDutyCycle for RecordingDuty {
    fn max_duty_cycle(&self) -> u16 {
        100
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.history.push(duty);
        Ok(())
    }
}

/// Output pin sharing its level changes with the test through a clone.
#[derive(Clone, Default)]
pub struct CountingPin {
    high: Rc<Cell<bool>>,
    flips: Rc<Cell<usize>>,
}

impl CountingPin {
    pub fn flips(&self) -> usize {
        self.flips.get()
    }

    fn drive(&self, high: bool) {
        if self.high.replace(high) != high {
            self.flips.set(self.flips.get() + 1);
        }
    }
}

impl digital::ErrorType for CountingPin {
    type Error = Infallible;
}

impl OutputPin for CountingPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.drive(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.drive(true);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputEvent {
    Refresh(u16),
    Finish,
}

#[derive(Default)]
pub struct RecordingOutput {
    pub events: Vec<OutputEvent>,
    pub pulses: usize,
    pub divisor: u8,
}

impl RecordingOutput {
    /// Frequencies of the audible start requests, in order.
    pub fn starts(&self) -> Vec<u16> {
        self.events
            .iter()
            .filter_map(|e| match e {
                OutputEvent::Refresh(f) if *f > 0 => Some(*f),
                _ => None,
            })
            .collect()
    }
}

impl ToneOutput for RecordingOutput {
    fn refresh_frequency(&mut self, frequency_hz: u16) {
        self.events.push(OutputEvent::Refresh(frequency_hz));
    }

    fn finish_playing(&mut self) {
        self.events.push(OutputEvent::Finish);
    }

    fn pulse(&mut self) {
        self.pulses += 1;
    }

    fn freq_divisor(&self) -> u8 {
        self.divisor
    }

    fn set_freq_divisor(&mut self, divisor: u8) {
        self.divisor = divisor;
    }

    fn kind(&self) -> OutputKind {
        OutputKind::SquareWave
    }
}

pub type TestEngine<'a, const C: usize = 50> = BeeperEngine<RecordingOutput, &'a TestClock, C>;

pub fn engine<const C: usize>(clock: &TestClock) -> TestEngine<'_, C> {
    BeeperEngine::new(RecordingOutput::default(), clock)
}

/// Advance one millisecond at a time, ticking the engine after each step.
pub fn run_for<const C: usize>(engine: &TestEngine<'_, C>, clock: &TestClock, ms: u32) {
    for _ in 0..ms {
        clock.advance(1);
        engine.process();
    }
}
