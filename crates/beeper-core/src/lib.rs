#![cfg_attr(not(test), no_std)]

pub mod buzzer;
pub mod clock;
pub mod condition;
pub mod engine;
pub mod error;
pub mod pwm;
pub mod registry;
pub mod square_wave;
pub mod tone;

#[cfg(test)]
mod test_util;

pub use buzzer::{Backend, OutputKind, ToneOutput, ToneTimer};
pub use clock::Clock;
pub use condition::{ConditionId, ConditionState};
pub use engine::{BeeperEngine, MAX_CONDITIONS, TONE_BUFFER_SIZE};
pub use error::{BeepError, RegistryError};
pub use pwm::PwmBackend;
pub use registry::{Binding, Registry, service};
pub use square_wave::SquareWaveBackend;
pub use tone::{TonePacket, ToneTheme, themes};
