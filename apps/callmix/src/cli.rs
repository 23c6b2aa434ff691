// SPDX-FileCopyrightText: © 2025 StreamKit Contributors
//
// SPDX-License-Identifier: MPL-2.0

use std::path::PathBuf;

use anyhow::{bail, Context};
use callmix_core::SampleFormat;
use callmix_mixer::sinks::WavFileSink;
use callmix_mixer::{spawn_session_driver, FormatConverterFactory, MixerSession, SummingEngineFactory};
use clap::{Parser, Subcommand};
use schemars::schema_for;
use tracing::{info, warn};

use crate::config;
use crate::input::{decode_wav, next_due, LegFeed, LegSpec};

type LogInitFn = fn(
    &config::LogConfig,
) -> Result<Option<tracing_appender::non_blocking::WorkerGuard>, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "callmix.toml")]
    pub config: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Mix call legs into one recording
    Mix(MixArgs),
    /// Manage configuration
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(clap::Args, Debug)]
pub struct MixArgs {
    /// Output WAV file
    #[arg(short, long)]
    pub output: PathBuf,

    /// Print session statistics as JSON to stdout when done
    #[arg(long)]
    pub stats: bool,

    /// Call legs as PATH[@JOIN_MS]; JOIN_MS delays the leg's first frame
    #[arg(required = true)]
    pub legs: Vec<LegSpec>,
}

#[derive(Subcommand, Debug)]
pub enum ConfigCommands {
    /// Generate a default config file and print it to stdout
    Default,
    /// Generate a JSON schema for the config and print it to stdout
    Schema,
}

/// Decodes every leg, feeds them through a session driver in arrival order and writes
/// the combined recording.
#[allow(clippy::disallowed_macros)]
async fn run_mix(config: &config::Config, args: &MixArgs) -> anyhow::Result<()> {
    if config.mixer.sample_format != SampleFormat::S16 {
        bail!(
            "WAV output is 16-bit; set mixer.sample_format = \"s16\" (got \"{}\")",
            config.mixer.sample_format
        );
    }
    if args.legs.len() > config.mixer.input_capacity {
        bail!(
            "{} legs given but mixer.input_capacity is {}",
            args.legs.len(),
            config.mixer.input_capacity
        );
    }

    let mut feeds = Vec::with_capacity(args.legs.len());
    for spec in &args.legs {
        let leg = decode_wav(&spec.path)?;
        feeds.push(LegFeed::new(leg, spec.join_ms, config.input.frame_ms));
    }
    let Some((sample_rate, channels)) = feeds.first().map(LegFeed::format) else {
        bail!("no legs given");
    };
    for (spec, feed) in args.legs.iter().zip(&feeds).skip(1) {
        let (rate, count) = feed.format();
        if (rate, count) != (sample_rate, channels) {
            bail!(
                "{} is {} Hz/{}ch, expected {} Hz/{}ch",
                spec.path.display(),
                rate,
                count,
                sample_rate,
                channels
            );
        }
    }

    let session = MixerSession::new(
        config.mixer.clone(),
        SummingEngineFactory::new(config.engine.clone()),
        FormatConverterFactory,
    )?;
    let handle = spawn_session_driver(
        session,
        WavFileSink::new(&args.output),
        config.input.command_capacity,
    );
    handle.configure(sample_rate, channels).await?;

    while let Some(i) = next_due(&feeds) {
        let feed = &mut feeds[i];
        let Some(frame) = feed.next_frame() else {
            continue;
        };
        let index = match feed.index {
            Some(index) => index,
            None => {
                let index = handle.allocate_input().await?;
                info!(leg = %args.legs[i].path.display(), input = index, "Leg joined");
                feed.index = Some(index);
                index
            },
        };
        handle.submit(index, frame).await.with_context(|| {
            format!("mixing failed on {}", args.legs[i].path.display())
        })?;
    }

    let flushed = handle.flush().await.context("failed to drain the end of the call")?;
    let stats = handle.stats().await?;
    let (session, sink) = handle.shutdown().await?;
    let written = sink.finish()?;
    if written == 0 {
        bail!("no audio was mixed; {} was not written", args.output.display());
    }
    info!(
        output = %args.output.display(),
        samples = written,
        duration_samples = session.output_timestamp(),
        silence_chunks = stats.silence_chunks_injected,
        flushed_frames = flushed,
        "Recording written"
    );

    if args.stats {
        println!("{}", serde_json::to_string_pretty(&stats)?);
    }
    Ok(())
}

/// Handle the "mix" command
/// Exits the process on error with status code 1
// Allow eprintln before logging is initialized (CLI output)
#[allow(clippy::disallowed_macros)]
async fn handle_mix_command(config_path: &str, args: &MixArgs, init_logging: LogInitFn) {
    let config_result = match config::load(config_path) {
        Ok(result) => result,
        Err(e) => {
            eprintln!("Failed to load configuration: {e}");
            std::process::exit(1);
        },
    };

    let _log_guard = match init_logging(&config_result.config.log) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e}");
            std::process::exit(1);
        },
    };

    if let Some(missing_file) = &config_result.file_missing {
        warn!(config_path = %missing_file, "Config file not found, using defaults");
    }

    info!(
        legs = args.legs.len(),
        output = %args.output.display(),
        capacity = config_result.config.mixer.input_capacity,
        frame_ms = config_result.config.input.frame_ms,
        "Starting mix"
    );

    if let Err(e) = run_mix(&config_result.config, args).await {
        tracing::error!(error = %format!("{e:#}"), "Mix failed");
        std::process::exit(1);
    }
}

/// Handle the "config default" command - print default config to stdout
// Allow println for CLI output to stdout (intentional)
#[allow(clippy::disallowed_macros)]
fn handle_config_default_command() {
    match config::generate_default() {
        Ok(toml_string) => {
            println!("# Default callmix configuration file");
            println!("{toml_string}");
        },
        Err(e) => {
            eprintln!("Failed to generate default config: {e}");
            std::process::exit(1);
        },
    }
}

/// Handle the "config schema" command - print JSON schema to stdout
// Allow println for CLI output to stdout (intentional)
#[allow(clippy::disallowed_macros)]
fn handle_config_schema_command() {
    let schema = schema_for!(config::Config);
    match serde_json::to_string_pretty(&schema) {
        Ok(json) => {
            println!("{json}");
        },
        Err(e) => {
            eprintln!("Failed to generate config schema: {e}");
            std::process::exit(1);
        },
    }
}

/// Handle CLI commands
pub async fn handle_command(cli: &Cli, init_logging: LogInitFn) {
    match &cli.command {
        Commands::Mix(args) => {
            handle_mix_command(&cli.config, args, init_logging).await;
        },
        Commands::Config(ConfigCommands::Default) => {
            handle_config_default_command();
        },
        Commands::Config(ConfigCommands::Schema) => {
            handle_config_schema_command();
        },
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use callmix_core::{AudioFrame, OutputSink};

    fn write_leg(path: &std::path::Path, samples: usize, value: i16) {
        let mut sink = WavFileSink::new(path);
        sink.accept(&AudioFrame::from_interleaved_s16(8000, 1, 0, vec![value; samples]))
            .unwrap();
        sink.finish().unwrap();
    }

    fn mix_args(output: PathBuf, legs: Vec<LegSpec>) -> MixArgs {
        MixArgs { output, stats: false, legs }
    }

    #[tokio::test]
    async fn short_call_is_written_in_full() {
        let dir = tempfile::tempdir().unwrap();
        let leg = dir.path().join("leg.wav");
        write_leg(&leg, 4000, 500);
        let output = dir.path().join("out.wav");

        let args = mix_args(output.clone(), vec![LegSpec { path: leg, join_ms: 0 }]);
        run_mix(&config::Config::default(), &args).await.unwrap();

        let mixed = decode_wav(&output).unwrap();
        assert_eq!(mixed.samples.len(), 4000);
        assert!(mixed.samples.iter().all(|s| *s == 500));
    }

    #[tokio::test]
    async fn late_joiner_keeps_the_whole_tail() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.wav");
        let second = dir.path().join("b.wav");
        write_leg(&first, 24_000, 100);
        write_leg(&second, 8000, 200);
        let output = dir.path().join("out.wav");

        let args = mix_args(
            output.clone(),
            vec![
                LegSpec { path: first, join_ms: 0 },
                LegSpec { path: second, join_ms: 2500 },
            ],
        );
        run_mix(&config::Config::default(), &args).await.unwrap();

        // Leg b lands where leg a stands when it arrives: after a's frame due at the same
        // instant, 126 frames in. It then runs one second past the end of leg a.
        let mixed = decode_wav(&output).unwrap();
        assert_eq!(mixed.samples.len(), 28_160);
        assert_eq!(mixed.samples[0], 100);
        assert_eq!(mixed.samples[20_159], 100);
        assert_eq!(mixed.samples[21_000], 300);
        assert_eq!(mixed.samples[28_159], 200);
    }

    #[tokio::test]
    async fn empty_leg_fails_instead_of_writing_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let leg = dir.path().join("empty.wav");
        write_leg(&leg, 0, 0);
        let output = dir.path().join("out.wav");

        let args = mix_args(output.clone(), vec![LegSpec { path: leg, join_ms: 0 }]);
        assert!(run_mix(&config::Config::default(), &args).await.is_err());
        assert!(!output.exists());
    }
}
