use thiserror::Error;

use crate::condition::ConditionId;

/// Errors returned by engine operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BeepError {
    /// The tone buffer has no room for the packet(s).
    #[error("tone buffer is full")]
    BufferFull,
    #[error("theme has {len} tones, buffer holds at most {max}")]
    ThemeTooLong { len: usize, max: usize },
    #[error("condition table is full")]
    TooManyConditions,
    #[error("no condition registered as {0:?}")]
    UnknownCondition(ConditionId),
}

/// Errors reported while validating the startup tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RegistryError {
    #[error("condition `{condition}` refers to unknown engine `{engine}`")]
    UnknownEngine {
        condition: &'static str,
        engine: &'static str,
    },
    #[error("condition `{condition}` refers to unknown theme `{theme}`")]
    UnknownTheme {
        condition: &'static str,
        theme: &'static str,
    },
    #[error("theme `{name}` has {len} tones, buffer holds at most {max}")]
    ThemeTooLong {
        name: &'static str,
        len: usize,
        max: usize,
    },
    #[error("`{0}` is registered twice")]
    DuplicateName(&'static str),
    #[error("engine `{0}` is already bound")]
    AlreadyBound(&'static str),
    #[error("registry table is full, cannot add `{0}`")]
    TableFull(&'static str),
    #[error("engine rejected binding: {0}")]
    Engine(#[from] BeepError),
}

impl RegistryError {
    /// True for the errors where a condition names something that does not exist.
    pub fn is_unbound(&self) -> bool {
        matches!(
            self,
            RegistryError::UnknownEngine { .. } | RegistryError::UnknownTheme { .. }
        )
    }
}
