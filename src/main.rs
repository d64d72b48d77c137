//! `scene-rotate`: rotate a scene file and its images on disk by a quarter turn.

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, ValueEnum};
use scene_rotation::config::RotationConfig;
use scene_rotation::error::{ErrorCode, StoreError};
use scene_rotation::local::{LocalStorage, SceneFile};
use scene_rotation::{Direction, RotationContext, RotationError, rotate_scene};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("scene file could not be loaded: {0}")]
    Load(#[from] StoreError),
    #[error("rotation failed [{code}]: {source}")]
    Rotation { code: &'static str, source: RotationError },
}

#[derive(Parser, Debug)]
#[command(name = "scene-rotate", about = "Rotate a scene file and its images by a quarter turn")]
struct Cli {
    /// Scene document (JSON) to rotate in place.
    #[arg(long, env = "ROTATION_SCENE")]
    scene: PathBuf,

    /// Root that the scene's image paths are relative to.
    #[arg(long, env = "ROTATION_DATA_DIR", default_value = ".")]
    data_dir: PathBuf,

    #[arg(value_enum)]
    direction: TurnArg,
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum TurnArg {
    Clockwise,
    CounterClockwise,
}

impl From<TurnArg> for Direction {
    fn from(arg: TurnArg) -> Self {
        match arg {
            TurnArg::Clockwise => Self::Clockwise,
            TurnArg::CounterClockwise => Self::CounterClockwise,
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "scene-rotate failed");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    let config = RotationConfig::from_env();
    let scene = SceneFile::load(&cli.scene).await?;
    let storage = LocalStorage::new(&cli.data_dir);

    // A scene file has no live fog layer to reset.
    let ctx = RotationContext { store: Arc::new(scene), storage: Arc::new(storage), fog: None, config };

    let degrees = Direction::from(cli.direction).step().degrees();
    let report = rotate_scene(&ctx, degrees)
        .await
        .map_err(|e| CliError::Rotation { code: e.error_code(), source: e })?;

    for warning in &report.warnings {
        tracing::warn!(code = warning.error_code(), %warning, "completed with warning");
    }
    tracing::info!(
        scene = %cli.scene.display(),
        width = report.width,
        height = report.height,
        background = report.background.as_deref().unwrap_or("-"),
        foreground = report.foreground.as_deref().unwrap_or("-"),
        "scene rotated"
    );
    Ok(())
}
