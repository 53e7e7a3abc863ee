use std::{
    io::Write,
    path::{Path, PathBuf},
    thread,
};

use clap::{Parser, Subcommand};
use serde::Serialize;
use stimulation_player_core::{
    load_script, AppConfig, CueSink, ManualClock, OverlaySink, PlaybackClock, PlaybackSession,
    PlayerError, Selection, SelectionState, SyncEngine, SyncEvent, Timeline,
};
use tracing_subscriber::EnvFilter;

fn main() -> stimulation_player_core::Result<()> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => AppConfig::from_path(path)?,
        None => AppConfig::default(),
    };

    init_tracing(&config.log.default_filter);

    match cli.command {
        Commands::Validate { script } => run_validate(&script),
        Commands::Timeline { script, json } => run_timeline(&script, json),
        Commands::Simulate {
            script,
            from_ms,
            until_ms,
            seeks,
        } => run_simulate(&config, &script, from_ms, until_ms, &seeks),
        Commands::Play {
            script,
            video,
            rate,
            state,
        } => run_play(&config, script, video, rate, state.as_deref()),
    }
}

fn run_validate(path: &Path) -> stimulation_player_core::Result<()> {
    let script = load_script(path)?;
    println!("{}", script.summary());
    Ok(())
}

fn run_timeline(path: &Path, json: bool) -> stimulation_player_core::Result<()> {
    let script = load_script(path)?;
    let timeline = Timeline::build(&script);

    if json {
        let text = serde_json::to_string_pretty(&timeline)
            .map_err(|err| PlayerError::msg(err.to_string()))?;
        println!("{text}");
        return Ok(());
    }

    for timed in &timeline {
        let metronome = timed
            .step
            .metronome
            .active_bpm()
            .map(|bpm| format!("{bpm} bpm"))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:>8} {:>8}  seq {:<3} step {:<3} {}{:<12} {:<8} {}",
            timed.start_ms,
            timed.end_ms,
            timed.sequence_id,
            timed.step.id,
            if timed.is_first_in_sequence { "*" } else { " " },
            timed.step.touch.mode,
            metronome,
            timed.step.touch.notes
        );
    }
    println!("total {} ms", timeline.total_duration_ms());
    Ok(())
}

/// One line of `simulate` output.
#[derive(Serialize)]
struct SimulatedEvent<'a> {
    position_ms: u64,
    event: &'a SyncEvent,
}

fn run_simulate(
    config: &AppConfig,
    path: &Path,
    from_ms: u64,
    until_ms: Option<u64>,
    seeks: &[Seek],
) -> stimulation_player_core::Result<()> {
    let script = load_script(path)?;
    let timeline = Timeline::build(&script);
    let until_ms = until_ms.unwrap_or_else(|| {
        timeline
            .total_duration_ms()
            .saturating_add(config.sync.poll_interval_ms)
    });
    tracing::info!(from_ms, until_ms, seeks = seeks.len(), "simulating playback");

    let clock = ManualClock::at(from_ms);
    let mut source = clock.clone();
    let mut engine = SyncEngine::new(timeline);
    let mut pending: Vec<Seek> = seeks.to_vec();
    let mut stdout = std::io::stdout().lock();

    engine.start();
    while clock.get() <= until_ms {
        if let Some(index) = pending.iter().position(|seek| clock.get() >= seek.at_ms) {
            let seek = pending.remove(index);
            tracing::debug!(from = clock.get(), to = seek.to_ms, "seek");
            clock.set(seek.to_ms);
        }

        let position_ms = clock.get();
        for event in engine.poll_source(&mut source) {
            print_event(&mut stdout, position_ms, &event)?;
        }
        clock.advance(config.sync.poll_interval_ms);
    }

    let position_ms = clock.get();
    for event in engine.stop() {
        print_event(&mut stdout, position_ms, &event)?;
    }
    Ok(())
}

fn print_event(
    out: &mut impl Write,
    position_ms: u64,
    event: &SyncEvent,
) -> stimulation_player_core::Result<()> {
    let line = serde_json::to_string(&SimulatedEvent { position_ms, event })
        .map_err(|err| PlayerError::msg(err.to_string()))?;
    writeln!(out, "{line}")?;
    Ok(())
}

fn run_play(
    config: &AppConfig,
    script: Option<PathBuf>,
    video: Option<PathBuf>,
    rate: f64,
    state_path: Option<&Path>,
) -> stimulation_player_core::Result<()> {
    let mut selection = match (&script, state_path) {
        (None, Some(state_path)) => Selection::from_state(SelectionState::load(state_path)?),
        _ => Selection::new(),
    };
    if let Some(video) = video {
        selection.select_video(video)?;
    }
    match script {
        Some(script) => selection.select_script(script)?,
        None => selection.reload()?,
    }

    let loaded = selection
        .take_loaded()
        .ok_or_else(|| PlayerError::msg("no script selected"))?;
    if let Some(state_path) = state_path {
        selection.state().save(state_path)?;
    }
    match selection.video() {
        Some(video) => tracing::info!(video = %video.display(), "video attached"),
        None => tracing::info!("no video selected, playing the script on its own clock"),
    }

    println!("{}", loaded.script.summary());
    let total_ms = loaded.timeline.total_duration_ms();

    let clock = PlaybackClock::new();
    clock.set_rate(rate)?;
    let mut session = PlaybackSession::new(
        loaded.timeline,
        clock.clone(),
        TerminalOverlay,
        TerminalCues {
            audible: config.cues.audible,
        },
        &config.sync,
    );

    clock.play()?;
    session.start()?;
    while clock.position_ms()? < total_ms {
        thread::sleep(config.sync.poll_interval());
    }
    // Let the last poll notice the end of the timeline before stopping.
    thread::sleep(config.sync.poll_interval() * 2);
    session.stop();
    clock.stop()?;
    Ok(())
}

struct TerminalOverlay;

impl OverlaySink for TerminalOverlay {
    fn set_overlay_text(&mut self, text: &str) {
        if text.is_empty() {
            println!("[overlay hidden]");
        } else {
            println!("[overlay] {text}");
        }
    }
}

struct TerminalCues {
    audible: bool,
}

impl TerminalCues {
    fn emit(&self, label: &str) {
        let bell = if self.audible { "\x07" } else { "" };
        println!("{bell}[cue] {label}");
    }
}

impl CueSink for TerminalCues {
    fn play_step_cue(&mut self) {
        self.emit("step");
    }

    fn play_sequence_start_cue(&mut self) {
        self.emit("sequence start");
    }

    fn play_metronome_cue(&mut self) {
        self.emit("tick");
    }
}

fn init_tracing(default_filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter)),
        )
        .try_init();
}

/// A jump of the simulated playback position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Seek {
    at_ms: u64,
    to_ms: u64,
}

fn parse_seek(value: &str) -> Result<Seek, String> {
    let (at, to) = value
        .split_once(':')
        .ok_or_else(|| format!("expected AT:TO, got `{value}`"))?;
    let parse = |part: &str| {
        part.trim()
            .parse::<u64>()
            .map_err(|err| format!("invalid position `{part}`: {err}"))
    };
    Ok(Seek {
        at_ms: parse(at)?,
        to_ms: parse(to)?,
    })
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Script-driven cue player for video sessions", long_about = None)]
struct Cli {
    /// JSON configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a script and print its summary.
    Validate {
        /// Path to the script file.
        script: PathBuf,
    },
    /// Print the timed steps of a script.
    Timeline {
        script: PathBuf,
        /// Emit the timeline as JSON.
        #[arg(long)]
        json: bool,
    },
    /// Run the sync engine against a simulated clock and print its events.
    Simulate {
        script: PathBuf,
        /// Position the simulated playback starts at.
        #[arg(long, default_value_t = 0)]
        from_ms: u64,
        /// Last position to poll; defaults to just past the end.
        #[arg(long)]
        until_ms: Option<u64>,
        /// Jump from AT to TO milliseconds, e.g. `--seek 1000:2600`.
        #[arg(long = "seek", value_name = "AT:TO", value_parser = parse_seek)]
        seeks: Vec<Seek>,
    },
    /// Play a script in real time with terminal cues.
    Play {
        /// Script to play; if omitted, the one remembered in `--state` is used.
        script: Option<PathBuf>,
        /// Video file paired with the script.
        #[arg(long)]
        video: Option<PathBuf>,
        /// Playback speed.
        #[arg(long, default_value_t = 1.0)]
        rate: f64,
        /// File that remembers the last video/script selection.
        #[arg(long)]
        state: Option<PathBuf>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_seek_arguments() {
        assert_eq!(
            parse_seek("100:2600"),
            Ok(Seek {
                at_ms: 100,
                to_ms: 2600
            })
        );
        assert!(parse_seek("100").is_err());
        assert!(parse_seek("a:1").is_err());
    }

    #[test]
    fn cli_accepts_repeated_seeks() {
        let cli = Cli::try_parse_from([
            "stimulation-player",
            "simulate",
            "script.json",
            "--seek",
            "100:2600",
            "--seek",
            "3000:0",
        ])
        .unwrap();

        match cli.command {
            Commands::Simulate { seeks, from_ms, .. } => {
                assert_eq!(from_ms, 0);
                assert_eq!(seeks.len(), 2);
                assert_eq!(seeks[1], Seek { at_ms: 3000, to_ms: 0 });
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
