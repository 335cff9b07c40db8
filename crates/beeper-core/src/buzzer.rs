//! Hardware seam between the engine and the buzzer.
//!
//! The engine owns all playback state and talks to the hardware only through
//! [`ToneOutput`]. The two concrete strategies live in
//! [`square_wave`](crate::square_wave) and [`pwm`](crate::pwm); [`Backend`] lets a board
//! pick one at runtime.

use embedded_hal::{digital::OutputPin, pwm::SetDutyCycle};
use enum_dispatch::enum_dispatch;

use crate::{pwm::PwmBackend, square_wave::SquareWaveBackend};

/// Platform timer that produces (or paces) a tone.
///
/// For a pin-toggled buzzer this is the timer that runs the toggle step; for a
/// PWM buzzer it retunes the carrier.
pub trait ToneTimer {
    fn start(&mut self, frequency_hz: u16);
    fn stop(&mut self);
}

/// Fixed-carrier PWM channels have nothing to retune.
impl ToneTimer for () {
    fn start(&mut self, _frequency_hz: u16) {}
    fn stop(&mut self) {}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OutputKind {
    SquareWave,
    Pwm,
}

/// Output strategy plugged into [`BeeperEngine`](crate::engine::BeeperEngine).
///
/// Every method is called from inside the engine's critical section, so an
/// implementation never races with its own toggle step.
#[enum_dispatch]
pub trait ToneOutput {
    /// Switch output to `frequency_hz`. A frequency of 0 means silence for a rest.
    fn refresh_frequency(&mut self, frequency_hz: u16);

    /// Silence the hardware completely.
    fn finish_playing(&mut self);

    /// Very-high-rate toggle step. Only called while an audible tone is active.
    fn pulse(&mut self) {}

    fn freq_divisor(&self) -> u8 {
        0
    }

    fn set_freq_divisor(&mut self, _divisor: u8) {}

    fn kind(&self) -> OutputKind;
}

/// Runtime-selected backend.
#[enum_dispatch(ToneOutput)]
pub enum Backend<P: OutputPin, D: SetDutyCycle, T: ToneTimer> {
    SquareWave(SquareWaveBackend<P, T>),
    Pwm(PwmBackend<D, T>),
}
