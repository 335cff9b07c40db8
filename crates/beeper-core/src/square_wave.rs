//! Pin-toggle backend.
//!
//! A plain GPIO drives the buzzer. The board calls
//! [`BeeperEngine::pulse`](crate::engine::BeeperEngine::pulse) at a fixed base rate;
//! the pin flips every `divisor + 1` pulses, which approximates
//! `base_rate_hz / (2 * (divisor + 1))` Hz.

use embedded_hal::digital::OutputPin;

use crate::buzzer::{OutputKind, ToneOutput, ToneTimer};

pub struct SquareWaveBackend<P, T> {
    pin: P,
    timer: T,
    base_rate_hz: u32,
    freq_cnt: u8,
    freq_div: u8,
    pin_state: bool,
    /// Set while an audible tone is loaded.
    active: bool,
}

impl<P: OutputPin, T: ToneTimer> SquareWaveBackend<P, T> {
    /// `base_rate_hz` is the rate at which the pulse step runs.
    pub fn new(mut pin: P, timer: T, base_rate_hz: u32) -> Self {
        pin.set_low().ok();
        Self {
            pin,
            timer,
            base_rate_hz: base_rate_hz.max(1),
            freq_cnt: 0,
            freq_div: 0,
            pin_state: false,
            active: false,
        }
    }

    /// Divisor that makes the pulse step approximate `frequency_hz`.
    pub fn divisor_for(&self, frequency_hz: u16) -> u8 {
        if frequency_hz == 0 {
            return 0;
        }
        let half_period = self.base_rate_hz / (2 * frequency_hz as u32);
        half_period.saturating_sub(1).min(u8::MAX as u32) as u8
    }

    pub fn base_rate_hz(&self) -> u32 {
        self.base_rate_hz
    }

    pub fn pin_state(&self) -> bool {
        self.pin_state
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Give the hardware back.
    pub fn release(self) -> (P, T) {
        (self.pin, self.timer)
    }

    fn toggle(&mut self) {
        self.freq_cnt = 0;
        self.pin_state = !self.pin_state;
        if self.pin_state {
            self.pin.set_high().ok();
        } else {
            self.pin.set_low().ok();
        }
    }

    fn force_low(&mut self) {
        self.pin_state = false;
        self.freq_cnt = 0;
        self.pin.set_low().ok();
    }
}

impl<P: OutputPin, T: ToneTimer> ToneOutput for SquareWaveBackend<P, T> {
    fn refresh_frequency(&mut self, frequency_hz: u16) {
        if frequency_hz > 0 {
            self.freq_cnt = 0;
            self.freq_div = self.divisor_for(frequency_hz);
            self.active = true;
            self.timer.start(frequency_hz);
        } else {
            self.active = false;
            self.timer.stop();
            self.force_low();
        }
    }

    fn finish_playing(&mut self) {
        self.active = false;
        self.timer.stop();
        self.force_low();
        self.freq_div = 0;
    }

    fn pulse(&mut self) {
        // silent until the next refresh
        if !self.active {
            return;
        }
        let count = self.freq_cnt;
        self.freq_cnt = self.freq_cnt.wrapping_add(1);
        if count >= self.freq_div {
            self.toggle();
        }
    }

    fn freq_divisor(&self) -> u8 {
        self.freq_div
    }

    fn set_freq_divisor(&mut self, divisor: u8) {
        self.freq_div = divisor;
    }

    fn kind(&self) -> OutputKind {
        OutputKind::SquareWave
    }
}

#[cfg(test)]
mod tests {
    use embedded_hal_mock::eh1::digital::{Mock as PinMock, State, Transaction as PinTransaction};

    use super::*;
    use crate::test_util::RecordingTimer;

    #[test]
    fn test_divisor_approximates_frequency() {
        let backend = SquareWaveBackend::new(PinMock::new(&[PinTransaction::set(State::Low)]), (), 8_000);
        assert_eq!(backend.divisor_for(2_000), 1);
        assert_eq!(backend.divisor_for(4_000), 0);
        // faster than half the base rate saturates to toggling every pulse
        assert_eq!(backend.divisor_for(10_000), 0);
        assert_eq!(backend.divisor_for(10), u8::MAX);
        let (mut pin, ()) = backend.release();
        pin.done();
    }

    #[test]
    fn test_pulse_toggles_every_divisor_plus_one() {
        let expectations = [
            PinTransaction::set(State::Low),
            PinTransaction::set(State::High),
            PinTransaction::set(State::Low),
            PinTransaction::set(State::High),
            PinTransaction::set(State::Low),
        ];
        let pin = PinMock::new(&expectations);
        let mut backend = SquareWaveBackend::new(pin, RecordingTimer::default(), 8_000);

        backend.refresh_frequency(2_000);
        assert_eq!(backend.freq_divisor(), 1);
        for _ in 0..6 {
            backend.pulse();
        }
        assert!(backend.pin_state());

        backend.finish_playing();
        assert!(!backend.pin_state());
        assert_eq!(backend.freq_divisor(), 0);

        let (mut pin, timer) = backend.release();
        pin.done();
        assert_eq!(timer.starts, [2_000]);
        assert_eq!(timer.stops, 1);
    }

    #[test]
    fn test_pulse_is_ignored_until_refresh() {
        let mut backend = SquareWaveBackend::new(
            PinMock::new(&[PinTransaction::set(State::Low)]),
            RecordingTimer::default(),
            8_000,
        );
        for _ in 0..10 {
            backend.pulse();
        }
        assert!(!backend.is_active());
        assert!(!backend.pin_state());

        let (mut pin, timer) = backend.release();
        pin.done();
        assert!(timer.starts.is_empty());
    }

    #[test]
    fn test_rest_stops_timer_and_forces_low() {
        let expectations = [
            PinTransaction::set(State::Low),
            PinTransaction::set(State::High),
            PinTransaction::set(State::Low),
        ];
        let mut backend = SquareWaveBackend::new(
            PinMock::new(&expectations),
            RecordingTimer::default(),
            8_000,
        );

        backend.refresh_frequency(4_000);
        backend.pulse();
        assert!(backend.pin_state());

        backend.refresh_frequency(0);
        assert!(!backend.pin_state());

        let (mut pin, timer) = backend.release();
        pin.done();
        assert_eq!(timer.starts, [4_000]);
        assert_eq!(timer.stops, 1);
    }
}
