//! Simulated buzzer hardware.
//!
//! `DesktopBuzzer` stands in for the tone timer and the PWM channel, `SimPin`
//! for the GPIO. Commands go over a channel to a worker thread; with the
//! `audio` feature the worker plays a square wave through rodio, otherwise it
//! only logs the commands.

use std::convert::Infallible;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::mpsc::{Receiver, Sender, channel};
use std::thread;
use std::time::Instant;

use beeper_core::{Clock, ToneTimer};
use embedded_hal::digital::{self, OutputPin};
use embedded_hal::pwm::{self, SetDutyCycle};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuzzerCommand {
    Start(u16),
    Stop,
    /// Duty in percent, 0 mutes the carrier.
    Volume(u8),
}

#[derive(Clone)]
pub struct DesktopBuzzer {
    command_tx: Sender<BuzzerCommand>,
}

impl DesktopBuzzer {
    pub fn new() -> Self {
        let (tx, rx) = channel::<BuzzerCommand>();

        thread::Builder::new()
            .name("buzzer".to_string())
            .spawn(move || buzzer_thread(rx))
            .ok();

        Self { command_tx: tx }
    }

    fn send(&self, cmd: BuzzerCommand) {
        // worker gone means audio init failed, nothing else to do
        let _ = self.command_tx.send(cmd);
    }
}

impl ToneTimer for DesktopBuzzer {
    fn start(&mut self, frequency_hz: u16) {
        self.send(BuzzerCommand::Start(frequency_hz));
    }

    fn stop(&mut self) {
        self.send(BuzzerCommand::Stop);
    }
}

impl pwm::ErrorType for DesktopBuzzer {
    type Error = Infallible;
}

impl SetDutyCycle for DesktopBuzzer {
    fn max_duty_cycle(&self) -> u16 {
        100
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.send(BuzzerCommand::Volume(duty.min(100) as u8));
        Ok(())
    }
}

/// GPIO that remembers its level and counts edges.
#[derive(Clone, Default)]
pub struct SimPin {
    level: Arc<AtomicBool>,
    edges: Arc<AtomicU32>,
}

impl SimPin {
    pub fn is_high(&self) -> bool {
        self.level.load(Ordering::Relaxed)
    }

    pub fn edges(&self) -> u32 {
        self.edges.load(Ordering::Relaxed)
    }

    fn drive(&self, high: bool) {
        if self.level.swap(high, Ordering::Relaxed) != high {
            self.edges.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl digital::ErrorType for SimPin {
    type Error = Infallible;
}

impl OutputPin for SimPin {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.drive(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.drive(true);
        Ok(())
    }
}

/// Milliseconds since the simulator started.
pub struct StdClock {
    start: Instant,
}

impl StdClock {
    pub fn new() -> Self {
        Self {
            start: Instant::now(),
        }
    }
}

impl Clock for StdClock {
    fn now_ms(&self) -> u32 {
        self.start.elapsed().as_millis() as u32
    }
}

#[cfg(not(feature = "audio"))]
fn buzzer_thread(rx: Receiver<BuzzerCommand>) {
    while let Ok(cmd) = rx.recv() {
        log::debug!("buzzer: {:?}", cmd);
    }
}

#[cfg(feature = "audio")]
fn buzzer_thread(rx: Receiver<BuzzerCommand>) {
    audio::run(rx);
}

#[cfg(feature = "audio")]
mod audio {
    use std::sync::mpsc::Receiver;
    use std::time::Duration;

    use rodio::{OutputStream, Sink, Source};

    use super::BuzzerCommand;

    const SAMPLE_RATE: u32 = 48_000;
    const AMPLITUDE: f32 = 0.15;

    /// Endless square wave, high for the first half of each cycle.
    struct SquareWave {
        frequency: f32,
        sample_rate: u32,
        current_sample: u64,
    }

    impl SquareWave {
        fn new(frequency: f32, sample_rate: u32) -> Self {
            Self {
                frequency,
                sample_rate,
                current_sample: 0,
            }
        }
    }

    impl Iterator for SquareWave {
        type Item = f32;

        fn next(&mut self) -> Option<Self::Item> {
            let position = self.current_sample as f32 / self.sample_rate as f32;
            let cycle = (position * self.frequency) % 1.0;
            self.current_sample = self.current_sample.wrapping_add(1);
            Some(if cycle < 0.5 { AMPLITUDE } else { -AMPLITUDE })
        }
    }

    impl Source for SquareWave {
        fn current_frame_len(&self) -> Option<usize> {
            None
        }

        fn channels(&self) -> u16 {
            1
        }

        fn sample_rate(&self) -> u32 {
            self.sample_rate
        }

        fn total_duration(&self) -> Option<Duration> {
            None
        }
    }

    pub(super) fn run(rx: Receiver<BuzzerCommand>) {
        // the stream must stay alive on this thread
        let Ok((_stream, stream_handle)) = OutputStream::try_default() else {
            log::error!("failed to initialize audio output for buzzer");
            return;
        };

        let mut sink: Option<Sink> = None;
        let mut volume = 0.5_f32;

        while let Ok(cmd) = rx.recv() {
            match cmd {
                BuzzerCommand::Start(hz) => {
                    if let Some(old) = sink.take() {
                        old.stop();
                    }
                    match Sink::try_new(&stream_handle) {
                        Ok(new) => {
                            new.set_volume(volume);
                            new.append(SquareWave::new(hz as f32, SAMPLE_RATE));
                            sink = Some(new);
                        }
                        Err(e) => log::warn!("failed to play {}Hz: {}", hz, e),
                    }
                }
                BuzzerCommand::Stop => {
                    if let Some(old) = sink.take() {
                        old.stop();
                    }
                }
                BuzzerCommand::Volume(percent) => {
                    volume = percent as f32 / 100.0;
                    if let Some(current) = &sink {
                        current.set_volume(volume);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sim_pin_counts_edges() {
        let mut pin = SimPin::default();
        let probe = pin.clone();
        pin.set_low().unwrap();
        pin.set_high().unwrap();
        pin.set_high().unwrap();
        pin.set_low().unwrap();
        assert_eq!(probe.edges(), 2);
        assert!(!probe.is_high());
    }
}
