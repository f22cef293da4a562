//! fridai-voice CLI
//!
//! Thin JSON surface over the voice service for scripts and the chat bot.
//! Results go to stdout; logs go to stderr.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use env_logger::Env;
use fridai_voice::{AppConfig, AppPaths, AudioInput, VoiceError, VoiceService};
use serde::Serialize;
use serde_json::json;
use std::io::{self, BufRead};
use std::path::PathBuf;

/// FRIDAI voice recognition
#[derive(Parser, Debug)]
#[command(name = "fridai-voice", author, version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to the OS config directory)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Keep config, profiles and temp audio under this directory
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check whether an audio file was spoken by the Boss
    Verify {
        /// Audio file in any format ffmpeg understands
        file: PathBuf,
    },

    /// Enroll the Boss from several recordings at once
    Enroll {
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Run a live enrollment session, one audio path per stdin line
    Session,

    /// Show the enrollment state and settings
    Status,

    /// Set the similarity threshold (0.5 to 0.95)
    SetThreshold { threshold: f32 },

    /// Enable or disable guest mode
    GuestMode {
        #[arg(action = ArgAction::Set)]
        enabled: bool,
    },

    /// Delete the Boss profile
    Clear,
}

#[derive(Serialize)]
struct Reply<T: Serialize> {
    success: bool,
    #[serde(flatten)]
    body: T,
}

fn emit<T: Serialize>(body: T) -> Result<()> {
    let reply = Reply {
        success: true,
        body,
    };
    println!("{}", serde_json::to_string_pretty(&reply)?);
    Ok(())
}

fn emit_failure(err: &anyhow::Error) {
    let code = err
        .downcast_ref::<VoiceError>()
        .map(VoiceError::code)
        .unwrap_or("internal_error");
    let reply = json!({
        "success": false,
        "code": code,
        "error": format!("{:#}", err),
    });
    match serde_json::to_string_pretty(&reply) {
        Ok(text) => println!("{}", text),
        Err(_) => println!("{}", reply),
    }
}

fn build_service(cli: &Cli) -> Result<VoiceService> {
    let paths = match &cli.data_dir {
        Some(root) => AppPaths::from_root(root),
        None => AppPaths::new()?,
    };
    paths.ensure_directories()?;

    let config_path = cli.config.clone().unwrap_or_else(|| paths.config_file());
    let config = AppConfig::load_or_create(&config_path).context("Failed to load configuration")?;

    Ok(VoiceService::from_app(&paths, &config))
}

fn run_session(service: &VoiceService) -> Result<()> {
    emit(service.start_enrollment_session())?;

    let stdin = io::stdin();
    for line in stdin.lock().lines() {
        let line = line.context("Failed to read stdin")?;
        let path = line.trim();
        if path.is_empty() {
            continue;
        }

        match service.add_enrollment_sample(&AudioInput::Path(PathBuf::from(path))) {
            Ok(progress) => emit(progress)?,
            // A bad sample does not end the session
            Err(e) => emit_failure(&e.into()),
        }
    }

    let result = service.complete_enrollment().map_err(|e| {
        service.cancel_enrollment();
        e
    })?;
    emit(result)
}

fn run(cli: Cli) -> Result<()> {
    let service = build_service(&cli)?;

    match cli.command {
        Commands::Verify { file } => emit(service.verify_speaker(&AudioInput::Path(file))),
        Commands::Enroll { files } => {
            let inputs: Vec<AudioInput> = files.into_iter().map(AudioInput::Path).collect();
            emit(service.enroll_boss_voice(&inputs)?)
        }
        Commands::Session => run_session(&service),
        Commands::Status => emit(service.get_voice_status()),
        Commands::SetThreshold { threshold } => {
            let threshold = service.set_similarity_threshold(threshold)?;
            emit(json!({ "threshold": threshold }))
        }
        Commands::GuestMode { enabled } => {
            let enabled = service.set_guest_mode(enabled)?;
            emit(json!({ "guest_mode_enabled": enabled }))
        }
        Commands::Clear => {
            service.clear_boss_profile()?;
            emit(json!({ "message": "Voice profile cleared" }))
        }
    }
}

fn main() {
    // Initialize logging
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        log::error!("{:#}", e);
        emit_failure(&e);
        std::process::exit(1);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_global_overrides() {
        let cli = Cli::try_parse_from([
            "fridai-voice",
            "verify",
            "clip.webm",
            "--data-dir",
            "/tmp/fridai",
        ])
        .unwrap();
        assert_eq!(cli.data_dir, Some(PathBuf::from("/tmp/fridai")));
        assert!(matches!(cli.command, Commands::Verify { .. }));
    }

    #[test]
    fn test_enroll_requires_files() {
        assert!(Cli::try_parse_from(["fridai-voice", "enroll"]).is_err());
    }

    #[test]
    fn test_guest_mode_takes_a_bool() {
        let cli = Cli::try_parse_from(["fridai-voice", "guest-mode", "false"]).unwrap();
        assert!(matches!(cli.command, Commands::GuestMode { enabled: false }));
    }

    #[test]
    fn test_voice_error_code_survives_anyhow() {
        let err: anyhow::Error = VoiceError::NoActiveSession.into();
        assert_eq!(
            err.downcast_ref::<VoiceError>().map(VoiceError::code),
            Some("no_active_session")
        );
    }
}
