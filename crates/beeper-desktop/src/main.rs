use std::sync::Arc;

use anyhow::{Context, bail};
use beeper_core::pwm::DEFAULT_VOLUME_PERCENT;
use beeper_core::registry::Registry;
use beeper_core::themes;

mod buzzer;
mod mock_hw_tui;
mod sim;

use sim::Simulator;

const USAGE: &str = "usage: beeper-desktop [--pwm] [--volume <percent>] [--mute]";

struct Options {
    pwm: bool,
    volume: u8,
    mute: bool,
}

fn parse_args() -> anyhow::Result<Option<Options>> {
    let mut options = Options {
        pwm: false,
        volume: DEFAULT_VOLUME_PERCENT,
        mute: false,
    };
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--pwm" => options.pwm = true,
            "--mute" => options.mute = true,
            "--volume" => {
                let value = args.next().context("--volume needs a value")?;
                options.volume = value
                    .parse()
                    .with_context(|| format!("bad volume `{}`", value))?;
            }
            "-h" | "--help" => {
                println!("{}", USAGE);
                return Ok(None);
            }
            other => bail!("unknown argument `{}`\n{}", other, USAGE),
        }
    }
    Ok(Some(options))
}

fn board() -> anyhow::Result<Registry> {
    let mut registry = Registry::new();
    registry
        .engine("main")?
        .theme("error", &themes::NOTIFY_ERROR)?
        .theme("confirm", &themes::NOTIFY_CONFIRM)?
        .theme("warning", &themes::NOTIFY_WARNING)?
        .condition("hotend-fault", "main", "error", 0)?
        .condition("print-done", "main", "confirm", 2)?
        .condition("filament-low", "main", "warning", 1)?;
    Ok(registry)
}

fn main() -> anyhow::Result<()> {
    let Some(options) = parse_args()? else {
        return Ok(());
    };
    let rx = mock_hw_tui::init_logger();

    let mut registry = board()?;
    let sim = Arc::new(Simulator::new(options.pwm, options.volume));
    let bindings = sim::bind(&sim, &mut registry, "main")?;
    sim.engine.mute(options.mute);

    let workers = sim::spawn(&sim, bindings.clone())?;
    let result = mock_hw_tui::run(Arc::clone(&sim), bindings, rx);

    sim.stop();
    for worker in workers {
        worker.join().ok();
    }
    sim.engine.with_backend(|backend| {
        use beeper_core::ToneOutput;
        backend.finish_playing();
    });

    result.context("terminal ui failed")
}
