use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

/// Run camera frames through the cloud vision platform
#[derive(Parser, Debug)]
#[command(name = "cloud-vision", version, about)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.toml", global = true, env = "CLOUD_VISION_CONFIG")]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Detect faces and draw them on the live view
    Face {
        #[command(flatten)]
        detect: DetectArgs,

        /// Ask the platform for its faster, less accurate detector
        #[arg(long)]
        fast: bool,
    },

    /// Detect people
    Human {
        #[command(flatten)]
        detect: DetectArgs,
    },

    /// Recognize the most prominent object
    Object {
        #[command(flatten)]
        detect: DetectArgs,
    },

    /// List the services the platform offers
    Services {
        /// Speak each service name
        #[arg(long)]
        speak: bool,
    },
}

/// Frame source and run mode shared by the detection commands.
#[derive(Args, Debug, Clone)]
pub struct DetectArgs {
    /// Camera address (host[:port]) replacing the configured camera host
    pub device: Option<String>,

    /// Use a still image instead of a camera
    #[arg(long, conflicts_with = "device")]
    pub image: Option<PathBuf>,

    /// Capture and send a single frame, then exit
    #[arg(long)]
    pub once: bool,
}
