//! Playback engine.
//!
//! One [`BeeperEngine`] exists per buzzer. It is shared between two contexts:
//!
//! - the high-rate tick, which calls [`BeeperEngine::process`] (and
//!   [`BeeperEngine::pulse`] for pin-toggled buzzers), and
//! - the housekeeping context, which enqueues tones and themes and calls
//!   [`BeeperEngine::run_conditions`] at a coarse rate.
//!
//! The queue and the backend sit behind a critical-section mutex. Every access
//! is one short `critical_section::with` block; no block is ever held across a
//! wait. The state flags are atomics so they can be read from anywhere without
//! taking the lock.

use core::cell::RefCell;
use core::sync::atomic::{AtomicBool, Ordering};

use critical_section::Mutex;
use heapless::{Deque, Vec};

use crate::buzzer::{OutputKind, ToneOutput};
use crate::clock::Clock;
use crate::condition::{ConditionId, ConditionState, ToneCondition};
use crate::error::BeepError;
use crate::tone::{TonePacket, ToneTheme};

/// Default tone buffer size. One slot stays free, so 49 packets fit.
pub const TONE_BUFFER_SIZE: usize = 50;

/// Conditions one engine can scan.
pub const MAX_CONDITIONS: usize = 16;

struct Playback<B, const C: usize> {
    backend: B,
    /// Front packet is the one currently sounding (or resting).
    queue: Deque<TonePacket, C>,
    prev_tone_time: u32,
    playing_freq: u16,
}

struct ConditionScan {
    conditions: Vec<ToneCondition, MAX_CONDITIONS>,
    cursor: usize,
    /// Condition whose theme is on the queue right now.
    owner: Option<usize>,
}

pub struct BeeperEngine<B, K, const C: usize = TONE_BUFFER_SIZE> {
    playing: AtomicBool,
    halted: AtomicBool,
    muted: AtomicBool,
    blocking: AtomicBool,
    clock: K,
    playback: Mutex<RefCell<Playback<B, C>>>,
    scan: Mutex<RefCell<ConditionScan>>,
}

impl<B: ToneOutput, K: Clock, const C: usize> BeeperEngine<B, K, C> {
    pub fn new(backend: B, clock: K) -> Self {
        const { assert!(C >= 2, "tone buffer needs at least two slots") };
        Self {
            playing: AtomicBool::new(false),
            halted: AtomicBool::new(false),
            muted: AtomicBool::new(false),
            blocking: AtomicBool::new(false),
            clock,
            playback: Mutex::new(RefCell::new(Playback {
                backend,
                queue: Deque::new(),
                prev_tone_time: 0,
                playing_freq: 0,
            })),
            scan: Mutex::new(RefCell::new(ConditionScan {
                conditions: Vec::new(),
                cursor: 0,
                owner: None,
            })),
        }
    }

    /// Number of packets the buffer accepts.
    pub const fn capacity(&self) -> usize {
        C - 1
    }

    pub fn is_playing(&self) -> bool {
        self.playing.load(Ordering::Acquire)
    }

    /// True while a rest packet is counting down.
    pub fn is_halted(&self) -> bool {
        self.halted.load(Ordering::Acquire)
    }

    pub fn is_muted(&self) -> bool {
        self.muted.load(Ordering::Acquire)
    }

    /// True while a caller is parked in [`play_theme_blocking`](Self::play_theme_blocking).
    pub fn is_blocking(&self) -> bool {
        self.blocking.load(Ordering::Acquire)
    }

    /// Frequency of the packet at the front of the queue, 0 when idle or resting.
    pub fn current_frequency(&self) -> u16 {
        critical_section::with(|cs| self.playback.borrow_ref(cs).playing_freq)
    }

    pub fn output_kind(&self) -> OutputKind {
        critical_section::with(|cs| self.playback.borrow_ref(cs).backend.kind())
    }

    /// Packets not yet finished, including the one sounding now.
    pub fn head_dist(&self) -> usize {
        if !self.is_playing() {
            return 0;
        }
        critical_section::with(|cs| self.playback.borrow_ref(cs).queue.len())
    }

    /// Mute or unmute, returning the new state.
    ///
    /// Muting while playing silences the hardware at once. The queue is kept
    /// and keeps counting down silently. Unmuting does not restart the current
    /// packet; sound comes back with the next packet.
    pub fn mute(&self, set: bool) -> bool {
        critical_section::with(|cs| {
            self.muted.store(set, Ordering::Release);
            if set && self.is_playing() {
                self.playback.borrow_ref_mut(cs).backend.finish_playing();
            }
        });
        set
    }

    /// Enqueue one packet.
    ///
    /// Callers must serialize their own pushes: there is a single producer.
    pub fn push_tone(&self, packet: TonePacket) -> Result<(), BeepError> {
        critical_section::with(|cs| {
            let mut playback = self.playback.borrow_ref_mut(cs);
            self.enqueue(&mut playback, packet)
        })
    }

    /// Enqueue a whole theme and return immediately.
    ///
    /// Either every packet is queued or none is.
    pub fn play_theme(&self, theme: &ToneTheme) -> Result<(), BeepError> {
        if theme.len() > self.capacity() {
            return Err(BeepError::ThemeTooLong {
                len: theme.len(),
                max: self.capacity(),
            });
        }
        critical_section::with(|cs| {
            let mut playback = self.playback.borrow_ref_mut(cs);
            if playback.queue.len() + theme.len() > self.capacity() {
                return Err(BeepError::BufferFull);
            }
            for packet in theme.iter() {
                self.enqueue(&mut playback, packet)?;
            }
            Ok(())
        })
    }

    /// Enqueue a theme and wait until playback has fully drained.
    ///
    /// `idle` is called in a loop while waiting. It should yield to the rest of
    /// the housekeeping work (or sleep) so the tick context keeps draining.
    pub fn play_theme_blocking(
        &self,
        theme: &ToneTheme,
        mut idle: impl FnMut(),
    ) -> Result<(), BeepError> {
        self.play_theme(theme)?;
        self.blocking.store(true, Ordering::Release);
        while self.is_playing() {
            idle();
        }
        self.blocking.store(false, Ordering::Release);
        Ok(())
    }

    /// Advance playback. Called from the high-rate tick.
    pub fn process(&self) {
        if !self.is_playing() {
            return;
        }
        critical_section::with(|cs| {
            let mut playback = self.playback.borrow_ref_mut(cs);
            let Some(current) = playback.queue.front().copied() else {
                self.stop(&mut playback);
                return;
            };
            let now = self.clock.now_ms();
            if now.wrapping_sub(playback.prev_tone_time) < current.duration as u32 {
                return;
            }
            playback.queue.pop_front();
            playback.prev_tone_time = now;
            match playback.queue.front().copied() {
                Some(next) => self.load(&mut playback, next.frequency),
                None => self.stop(&mut playback),
            }
        });
    }

    /// Toggle step for pin-driven backends. Skipped during rests and while muted.
    pub fn pulse(&self) {
        if !self.is_playing() || self.is_halted() || self.is_muted() {
            return;
        }
        critical_section::with(|cs| self.playback.borrow_ref_mut(cs).backend.pulse());
    }

    pub fn freq_divisor(&self) -> u8 {
        critical_section::with(|cs| self.playback.borrow_ref(cs).backend.freq_divisor())
    }

    pub fn set_freq_divisor(&self, divisor: u8) {
        critical_section::with(|cs| {
            self.playback
                .borrow_ref_mut(cs)
                .backend
                .set_freq_divisor(divisor)
        });
    }

    /// Run `f` on the backend inside the critical section. Keep it short.
    pub fn with_backend<R>(&self, f: impl FnOnce(&mut B) -> R) -> R {
        critical_section::with(|cs| f(&mut self.playback.borrow_ref_mut(cs).backend))
    }

    /// Register a condition. `play_count == 0` loops while the predicate holds.
    pub fn add_condition(
        &self,
        theme: &'static ToneTheme,
        play_count: u8,
    ) -> Result<ConditionId, BeepError> {
        if theme.len() > self.capacity() {
            return Err(BeepError::ThemeTooLong {
                len: theme.len(),
                max: self.capacity(),
            });
        }
        critical_section::with(|cs| {
            let mut scan = self.scan.borrow_ref_mut(cs);
            let id = ConditionId(scan.conditions.len());
            scan.conditions
                .push(ToneCondition::new(theme, play_count))
                .map_err(|_| BeepError::TooManyConditions)?;
            Ok(id)
        })
    }

    /// Record a freshly sampled predicate level. Never starts playback.
    pub fn set_condition(&self, set: bool, id: ConditionId) -> Result<(), BeepError> {
        critical_section::with(|cs| {
            let mut scan = self.scan.borrow_ref_mut(cs);
            let condition = scan
                .conditions
                .get_mut(id.0)
                .ok_or(BeepError::UnknownCondition(id))?;
            condition.update(set);
            Ok(())
        })
    }

    pub fn condition(&self, id: ConditionId) -> Option<ConditionState> {
        critical_section::with(|cs| {
            self.scan
                .borrow_ref(cs)
                .conditions
                .get(id.0)
                .map(ToneCondition::state)
        })
    }

    pub fn condition_count(&self) -> usize {
        critical_section::with(|cs| self.scan.borrow_ref(cs).conditions.len())
    }

    /// Visit the next condition in round-robin order and enqueue its theme if due.
    ///
    /// Nothing is visited while the theme of the previously triggered
    /// condition is still playing.
    pub fn run_conditions(&self) {
        let due = critical_section::with(|cs| {
            let mut scan = self.scan.borrow_ref_mut(cs);
            let count = scan.conditions.len();
            if count == 0 {
                return None;
            }
            if scan.owner.is_some() {
                if self.is_playing() {
                    return None;
                }
                scan.owner = None;
            }
            let index = scan.cursor;
            scan.cursor = (index + 1) % count;
            let condition = &scan.conditions[index];
            (!self.is_muted() && condition.wants_play()).then(|| (index, condition.theme()))
        });
        let Some((index, theme)) = due else {
            return;
        };

        match self.play_theme(theme) {
            Ok(()) => {
                critical_section::with(|cs| {
                    let mut scan = self.scan.borrow_ref_mut(cs);
                    scan.conditions[index].mark_played();
                    scan.owner = Some(index);
                });
                log::debug!("condition {} enqueued {} tones", index, theme.len());
            }
            Err(e) => log::warn!("condition {} not played: {}", index, e),
        }
    }

    fn enqueue(&self, playback: &mut Playback<B, C>, packet: TonePacket) -> Result<(), BeepError> {
        if playback.queue.len() >= self.capacity() {
            return Err(BeepError::BufferFull);
        }
        playback
            .queue
            .push_back(packet)
            .map_err(|_| BeepError::BufferFull)?;
        if !self.is_playing() {
            playback.prev_tone_time = self.clock.now_ms();
            self.playing.store(true, Ordering::Release);
            self.load(playback, packet.frequency);
        }
        Ok(())
    }

    fn load(&self, playback: &mut Playback<B, C>, frequency: u16) {
        playback.playing_freq = frequency;
        self.halted.store(frequency == 0, Ordering::Release);
        if !self.is_muted() {
            playback.backend.refresh_frequency(frequency);
        }
    }

    fn stop(&self, playback: &mut Playback<B, C>) {
        self.playing.store(false, Ordering::Release);
        self.halted.store(false, Ordering::Release);
        playback.playing_freq = 0;
        playback.backend.finish_playing();
    }
}
