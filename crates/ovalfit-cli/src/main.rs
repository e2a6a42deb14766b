//! ovalfit CLI — fit ellipses to point files and replay edit scripts.

use clap::{Parser, Subcommand};
use ovalfit::{
    fit_ellipse_report, EllipseId, EllipseParams, GestureDelta, GestureKind, Point, Scene,
    SceneConfig,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "ovalfit")]
#[command(about = "Fit ellipses to 2D strokes and replay ellipse edit scripts")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fit one ellipse to a point file (JSON array of [x, y]).
    Fit {
        /// Path to the input points.
        #[arg(long)]
        points: PathBuf,

        /// Scene configuration (JSON). Only its `fit` section is used.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Path to write the fit report (JSON). Printed to stdout if omitted.
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Run a script of scene operations and report the final ellipses.
    Replay {
        /// Path to the script (JSON array of operations).
        #[arg(long)]
        script: PathBuf,

        /// Scene configuration (JSON).
        #[arg(long)]
        config: Option<PathBuf>,

        /// Path to write the replay report (JSON). Printed to stdout if omitted.
        #[arg(long)]
        out: Option<PathBuf>,

        /// Stop at the first failing operation.
        #[arg(long)]
        strict: bool,
    },

    /// Print the default scene configuration.
    DefaultConfig,
}

/// One scripted scene operation.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "snake_case", tag = "op")]
enum ReplayOp {
    Fit {
        points: Vec<[f64; 2]>,
    },
    /// Add an ellipse at `at`; configured default axes unless both are given.
    Add {
        at: [f64; 2],
        #[serde(default)]
        semi_major: Option<f64>,
        #[serde(default)]
        semi_minor: Option<f64>,
        #[serde(default)]
        rotation: f64,
    },
    Remove {
        id: EllipseId,
    },
    Toggle {
        id: EllipseId,
    },
    DeselectAll,
    Begin {
        id: EllipseId,
        gesture: GestureKind,
    },
    Update {
        id: EllipseId,
        delta: GestureDelta,
    },
    Commit {
        id: EllipseId,
        gesture: GestureKind,
    },
    Cancel {
        id: EllipseId,
        gesture: GestureKind,
    },
    Undo,
    Redo,
    Hit {
        at: [f64; 2],
    },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
enum StepOutcome {
    Ok,
    Created { id: EllipseId },
    History { applied: bool },
    Hit { id: Option<EllipseId> },
    Failed { error: String },
}

#[derive(Debug, Clone, Serialize)]
struct StepRecord {
    step: usize,
    #[serde(flatten)]
    outcome: StepOutcome,
}

#[derive(Debug, Clone, Serialize)]
struct EllipseRecord {
    id: EllipseId,
    #[serde(flatten)]
    params: EllipseParams,
}

#[derive(Debug, Clone, Serialize)]
struct ReplayReport {
    steps: Vec<StepRecord>,
    ellipses: Vec<EllipseRecord>,
    can_undo: bool,
    can_redo: bool,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Fit {
            points,
            config,
            out,
        } => run_fit(&points, config.as_deref(), out.as_deref()),
        Commands::Replay {
            script,
            config,
            out,
            strict,
        } => run_replay(&script, config.as_deref(), out.as_deref(), strict),
        Commands::DefaultConfig => {
            println!("{}", serde_json::to_string_pretty(&SceneConfig::default())?);
            Ok(())
        }
    }
}

fn run_fit(points_path: &Path, config_path: Option<&Path>, out: Option<&Path>) -> CliResult<()> {
    let config = load_config(config_path)?;
    let raw: Vec<[f64; 2]> = read_json(points_path)?;
    let points = to_points(&raw);
    tracing::info!("Loaded {} points from {}", points.len(), points_path.display());

    let report = fit_ellipse_report(&points, &config.fit)?;
    tracing::info!(
        "Fitted ellipse: axes=({:.3}, {:.3}) rms={:.4}",
        report.ellipse.semi_major,
        report.ellipse.semi_minor,
        report.rms_residual
    );
    write_output(out, &report)
}

fn run_replay(
    script_path: &Path,
    config_path: Option<&Path>,
    out: Option<&Path>,
    strict: bool,
) -> CliResult<()> {
    let config = load_config(config_path)?;
    let ops: Vec<ReplayOp> = read_json(script_path)?;
    tracing::info!("Replaying {} operations from {}", ops.len(), script_path.display());

    let mut scene = Scene::new(config);
    let report = replay(&mut scene, &ops, strict)?;
    let failed = report
        .steps
        .iter()
        .filter(|s| matches!(s.outcome, StepOutcome::Failed { .. }))
        .count();
    tracing::info!(
        "Replay finished: {} ellipses, {} failed operations",
        report.ellipses.len(),
        failed
    );
    write_output(out, &report)
}

fn replay(scene: &mut Scene, ops: &[ReplayOp], strict: bool) -> CliResult<ReplayReport> {
    let mut steps = Vec::with_capacity(ops.len());
    for (step, op) in ops.iter().enumerate() {
        let outcome = match apply_op(scene, op) {
            Ok(outcome) => outcome,
            Err(e) if strict => {
                return Err(format!("step {} ({:?}) failed: {}", step, op, e).into());
            }
            Err(e) => {
                tracing::warn!("step {} failed: {}", step, e);
                StepOutcome::Failed {
                    error: e.to_string(),
                }
            }
        };
        steps.push(StepRecord { step, outcome });
    }

    Ok(ReplayReport {
        steps,
        ellipses: scene
            .ellipses()
            .into_iter()
            .map(|(id, params)| EllipseRecord { id, params })
            .collect(),
        can_undo: scene.can_undo(),
        can_redo: scene.can_redo(),
    })
}

fn apply_op(scene: &mut Scene, op: &ReplayOp) -> Result<StepOutcome, ovalfit::SceneError> {
    let outcome = match *op {
        ReplayOp::Fit { ref points } => StepOutcome::Created {
            id: scene.fit_stroke(&to_points(points))?,
        },
        ReplayOp::Add {
            at,
            semi_major,
            semi_minor,
            rotation,
        } => {
            let center = Point::new(at[0], at[1]);
            let id = match (semi_major, semi_minor) {
                (Some(a), Some(b)) => {
                    scene.add_ellipse(EllipseParams::new(center, a, b, rotation))?
                }
                _ => scene.add_default_ellipse(center)?,
            };
            StepOutcome::Created { id }
        }
        ReplayOp::Remove { id } => {
            scene.remove_ellipse(id)?;
            StepOutcome::Ok
        }
        ReplayOp::Toggle { id } => {
            let policy = scene.toggle_policy(id)?;
            tracing::debug!("ellipse {} policy is now {:?}", id, policy);
            StepOutcome::Ok
        }
        ReplayOp::DeselectAll => {
            scene.reset_policies();
            StepOutcome::Ok
        }
        ReplayOp::Begin { id, gesture } => {
            scene.begin(id, gesture)?;
            StepOutcome::Ok
        }
        ReplayOp::Update { id, delta } => {
            scene.update(id, delta)?;
            StepOutcome::Ok
        }
        ReplayOp::Commit { id, gesture } => {
            scene.commit(id, gesture)?;
            StepOutcome::Ok
        }
        ReplayOp::Cancel { id, gesture } => {
            scene.cancel(id, gesture)?;
            StepOutcome::Ok
        }
        ReplayOp::Undo => StepOutcome::History {
            applied: scene.undo()?,
        },
        ReplayOp::Redo => StepOutcome::History {
            applied: scene.redo()?,
        },
        ReplayOp::Hit { at } => StepOutcome::Hit {
            id: scene.hit_test(&Point::new(at[0], at[1])),
        },
    };
    Ok(outcome)
}

fn to_points(raw: &[[f64; 2]]) -> Vec<Point> {
    raw.iter().map(|&[x, y]| Point::new(x, y)).collect()
}

fn load_config(path: Option<&Path>) -> CliResult<SceneConfig> {
    match path {
        Some(path) => {
            tracing::info!("Loading config: {}", path.display());
            read_json(path)
        }
        None => Ok(SceneConfig::default()),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> CliResult<T> {
    let text = std::fs::read_to_string(path).map_err(|e| -> CliError {
        format!("Failed to read {}: {}", path.display(), e).into()
    })?;
    serde_json::from_str(&text).map_err(|e| -> CliError {
        format!("Failed to parse {}: {}", path.display(), e).into()
    })
}

fn write_output<T: Serialize>(out: Option<&Path>, value: &T) -> CliResult<()> {
    let json = serde_json::to_string_pretty(value)?;
    match out {
        Some(path) => {
            std::fs::write(path, &json)?;
            tracing::info!("Results written to {}", path.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
