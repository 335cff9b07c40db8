//! Duty-cycle backend.
//!
//! The buzzer sits on a PWM channel: a tone is the carrier at the requested
//! frequency with the duty set to the configured volume, silence is zero duty.

use embedded_hal::pwm::SetDutyCycle;

use crate::buzzer::{OutputKind, ToneOutput, ToneTimer};

/// Duty used when none is configured, a 50% square wave.
pub const DEFAULT_VOLUME_PERCENT: u8 = 50;

pub struct PwmBackend<D, T> {
    channel: D,
    carrier: T,
    volume_percent: u8,
}

impl<D: SetDutyCycle, T: ToneTimer> PwmBackend<D, T> {
    pub fn new(mut channel: D, carrier: T) -> Self {
        channel.set_duty_cycle_fully_off().ok();
        Self {
            channel,
            carrier,
            volume_percent: DEFAULT_VOLUME_PERCENT,
        }
    }

    pub fn with_volume(mut self, percent: u8) -> Self {
        self.volume_percent = percent.min(100);
        self
    }

    /// Takes effect on the next tone.
    pub fn set_volume(&mut self, percent: u8) {
        self.volume_percent = percent.min(100);
    }

    pub fn volume(&self) -> u8 {
        self.volume_percent
    }

    pub fn release(self) -> (D, T) {
        (self.channel, self.carrier)
    }
}

impl<D: SetDutyCycle, T: ToneTimer> ToneOutput for PwmBackend<D, T> {
    fn refresh_frequency(&mut self, frequency_hz: u16) {
        if frequency_hz > 0 {
            self.carrier.start(frequency_hz);
            self.channel.set_duty_cycle_percent(self.volume_percent).ok();
        } else {
            self.channel.set_duty_cycle_fully_off().ok();
        }
    }

    fn finish_playing(&mut self) {
        self.channel.set_duty_cycle_fully_off().ok();
        self.carrier.stop();
    }

    fn kind(&self) -> OutputKind {
        OutputKind::Pwm
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_util::{RecordingDuty, RecordingTimer};

    #[test]
    fn test_tone_programs_volume_duty() {
        let mut backend =
            PwmBackend::new(RecordingDuty::default(), RecordingTimer::default()).with_volume(25);
        backend.refresh_frequency(3_000);

        let (duty, carrier) = backend.release();
        // construction zeroes the output first
        assert_eq!(duty.history, [0, 25]);
        assert_eq!(carrier.starts, [3_000]);
    }

    #[test]
    fn test_rest_and_finish_zero_duty() {
        let mut backend = PwmBackend::new(RecordingDuty::default(), RecordingTimer::default());
        backend.refresh_frequency(1_000);
        backend.refresh_frequency(0);
        backend.finish_playing();

        let (duty, carrier) = backend.release();
        assert_eq!(duty.history, [0, 50, 0, 0]);
        assert_eq!(carrier.starts, [1_000]);
        assert_eq!(carrier.stops, 1);
    }

    #[test]
    fn test_volume_is_clamped() {
        let backend = PwmBackend::new(RecordingDuty::default(), ()).with_volume(180);
        assert_eq!(backend.volume(), 100);
        assert_eq!(backend.freq_divisor(), 0);
    }
}
