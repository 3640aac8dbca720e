//! Showpiece - interactive 3D product viewer.
//!
//! Loads a glTF model, centers and scales it to the window, and keeps it
//! slowly spinning. In interactive mode the model can be picked up and
//! dragged; it eases back to rest on release. Dragging elsewhere orbits
//! the camera and the wheel zooms. Drop a model file on the window to
//! switch to it.

mod app;
mod assets;
mod config;
mod render;
mod scene;
mod viewer;

use clap::Parser;
use config::{ConfigError, PresentationMode, ViewerConfig};
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Parser, Debug)]
#[command(name = "showpiece")]
#[command(about = "Auto-rotating glTF product viewer with pick-and-drag")]
struct Cli {
    /// Model file path or http(s) URL (.glb / .gltf)
    source: Option<String>,

    /// JSON configuration file
    #[arg(long)]
    config: Option<PathBuf>,

    /// Presentation mode: static or interactive
    #[arg(long)]
    mode: Option<PresentationMode>,

    /// Equirectangular image used for reflections
    #[arg(long)]
    environment: Option<PathBuf>,

    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    width: Option<u32>,

    #[arg(long, value_parser = clap::value_parser!(u32).range(1..))]
    height: Option<u32>,
}

impl Cli {
    /// File values first, then command-line overrides.
    fn into_config(self) -> Result<ViewerConfig, ConfigError> {
        let mut config = match &self.config {
            Some(path) => ViewerConfig::load(path)?,
            None => ViewerConfig::default(),
        };
        if let Some(source) = self.source {
            config.source = Some(source);
        }
        if let Some(mode) = self.mode {
            config.mode = mode;
        }
        if let Some(environment) = self.environment {
            config.environment_map = Some(environment);
        }
        if let Some(width) = self.width {
            config.window.width = width;
        }
        if let Some(height) = self.height {
            config.window.height = height;
        }
        config.validate()?;
        Ok(config)
    }
}

fn main() -> ExitCode {
    app::init_logging();
    let cli = Cli::parse();

    let config = match cli.into_config() {
        Ok(config) => config,
        Err(err) => {
            log::error!("Invalid configuration: {err}");
            return ExitCode::FAILURE;
        }
    };

    match app::run(config) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("Event loop error: {err}");
            ExitCode::FAILURE
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn command_line_overrides_defaults() {
        let cli = Cli::try_parse_from([
            "showpiece",
            "ring.glb",
            "--mode",
            "STATIC",
            "--width",
            "800",
        ])
        .unwrap();
        let config = cli.into_config().unwrap();
        assert_eq!(config.source.as_deref(), Some("ring.glb"));
        assert_eq!(config.mode, PresentationMode::Static);
        assert_eq!(config.window.width, 800);
        assert_eq!(config.window.height, 400);
    }

    #[test]
    fn zero_window_size_is_rejected() {
        assert!(Cli::try_parse_from(["showpiece", "--height", "0"]).is_err());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let cli = Cli::try_parse_from(["showpiece", "--config", "/nonexistent/showpiece.json"])
            .unwrap();
        assert!(matches!(cli.into_config(), Err(ConfigError::Read { .. })));
    }
}
