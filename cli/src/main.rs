use std::fs;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use floorplan::camera::Point;
use floorplan::collision::{PlacementRejection, Rect, overlaps, within_bounds};
use floorplan::config::{ConfigError, EditorConfig};
use floorplan::doc::{EntityId, EntityStore, LayoutError, LayoutPayload, TableShape};
use floorplan::engine::{Action, EngineCore};
use floorplan::template::{LayoutTemplate, UnknownTemplate};
use floorplan::view::{Bounds, ViewFit, compute_bounds, fit_bounds, working_area};
use serde::Serialize;

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error("failed to read {path}: {source}")]
    Read { path: PathBuf, source: std::io::Error },
    #[error("layout error: {0}")]
    Layout(#[from] LayoutError),
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Template(#[from] UnknownTemplate),
    #[error("invalid JSON output: {0}")]
    Json(#[from] serde_json::Error),
    #[error("layout has {0} problem(s)")]
    Problems(usize),
}

#[derive(Parser, Debug)]
#[command(name = "floorplan", about = "Inspect and transform floor-plan layout files")]
struct Cli {
    /// Editor config JSON; defaults apply when absent.
    #[arg(long, env = "FLOORPLAN_CONFIG", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Report overlapping and out-of-bounds tables.
    Check { layout: PathBuf },
    /// Print content bounds and the padded working area.
    Bounds { layout: PathBuf },
    /// Compute the zoom and pan that fit every table into a viewport.
    Fit {
        layout: PathBuf,
        #[arg(long, default_value_t = 1280.0)]
        width: f64,
        #[arg(long, default_value_t = 800.0)]
        height: f64,
    },
    /// Test whether a new table fits at a canvas point.
    #[command(allow_negative_numbers = true)]
    Place {
        layout: PathBuf,
        x: f64,
        y: f64,
        #[arg(long, value_enum, default_value_t = ShapeArg::Rectangle)]
        shape: ShapeArg,
    },
    /// Rearrange every table with a named template and print the new layout.
    Template { layout: PathBuf, name: String },
    /// List the available templates.
    Templates,
}

#[derive(ValueEnum, Debug, Clone, Copy)]
enum ShapeArg {
    Rectangle,
    Square,
    Circle,
    Oval,
}

impl From<ShapeArg> for TableShape {
    fn from(shape: ShapeArg) -> Self {
        match shape {
            ShapeArg::Rectangle => Self::Rectangle,
            ShapeArg::Square => Self::Square,
            ShapeArg::Circle => Self::Circle,
            ShapeArg::Oval => Self::Oval,
        }
    }
}

#[derive(Serialize)]
struct CheckReport {
    tables: usize,
    overlaps: Vec<(EntityId, EntityId)>,
    out_of_bounds: Vec<EntityId>,
}

#[derive(Serialize)]
struct BoundsReport {
    content: Option<Bounds>,
    working_area: Bounds,
}

#[derive(Serialize)]
struct PlaceReport {
    rect: Rect,
    rejection: Option<PlacementRejection>,
}

#[derive(Serialize)]
struct TemplateInfo {
    id: &'static str,
    name: &'static str,
    description: &'static str,
    recommended_for: &'static str,
}

fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();
    let cli = Cli::parse();
    let config = load_config(cli.config.as_deref())?;

    match cli.command {
        Command::Check { layout } => run_check(&load_layout(&layout)?, &config),
        Command::Bounds { layout } => run_bounds(&load_layout(&layout)?, &config),
        Command::Fit { layout, width, height } => run_fit(&load_layout(&layout)?, &config, width, height),
        Command::Place { layout, x, y, shape } => run_place(&load_layout(&layout)?, config, Point::new(x, y), shape),
        Command::Template { layout, name } => run_template(&load_layout(&layout)?, config, &name),
        Command::Templates => run_templates(),
    }
}

fn read(path: &Path) -> Result<String, CliError> {
    fs::read_to_string(path).map_err(|source| CliError::Read { path: path.to_path_buf(), source })
}

fn load_config(path: Option<&Path>) -> Result<EditorConfig, CliError> {
    match path {
        Some(path) => Ok(EditorConfig::from_json(&read(path)?)?),
        None => Ok(EditorConfig::default()),
    }
}

fn load_layout(path: &Path) -> Result<LayoutPayload, CliError> {
    let payload = LayoutPayload::from_json(&read(path)?)?;
    tracing::debug!(path = %path.display(), tables = payload.tables.len(), "layout loaded");
    Ok(payload)
}

fn emit(value: &impl Serialize) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn run_check(payload: &LayoutPayload, config: &EditorConfig) -> Result<(), CliError> {
    let store = payload.to_store()?;
    let entities = store.as_slice();

    let mut pairs = Vec::new();
    for (i, a) in entities.iter().enumerate() {
        for b in &entities[i + 1..] {
            if overlaps(&a.rect(), &b.rect()) {
                pairs.push((a.id, b.id));
            }
        }
    }
    let out_of_bounds: Vec<EntityId> = entities
        .iter()
        .filter(|e| !within_bounds(&e.rect(), config.canvas_width, config.canvas_height))
        .map(|e| e.id)
        .collect();

    let problems = pairs.len() + out_of_bounds.len();
    emit(&CheckReport { tables: entities.len(), overlaps: pairs, out_of_bounds })?;
    if problems > 0 {
        return Err(CliError::Problems(problems));
    }
    Ok(())
}

fn run_bounds(payload: &LayoutPayload, config: &EditorConfig) -> Result<(), CliError> {
    let store = payload.to_store()?;
    emit(&BoundsReport {
        content: compute_bounds(&store),
        working_area: working_area(&store, config.canvas_width, config.canvas_height, config.working_area_padding),
    })
}

fn run_fit(payload: &LayoutPayload, config: &EditorConfig, width: f64, height: f64) -> Result<(), CliError> {
    let store = payload.to_store()?;
    let fit: ViewFit = fit_bounds(compute_bounds(&store), width, height, config.fit_padding);
    emit(&fit)
}

fn run_place(payload: &LayoutPayload, config: EditorConfig, at: Point, shape: ShapeArg) -> Result<(), CliError> {
    let store = payload.to_store()?;
    let mut core = EngineCore::with_config(config);
    core.load_layout(payload);
    core.set_placement_shape(shape.into());

    let report = match core.try_place(&store, at) {
        Ok(rect) => PlaceReport { rect, rejection: None },
        Err(reason) => PlaceReport { rect: core.placement_rect(at), rejection: Some(reason) },
    };
    emit(&report)
}

fn run_template(payload: &LayoutPayload, config: EditorConfig, name: &str) -> Result<(), CliError> {
    let template: LayoutTemplate = name.parse()?;
    let mut store: EntityStore = payload.to_store()?;
    let mut core = EngineCore::with_config(config);
    core.load_layout(payload);

    for action in core.apply_template(&store, template) {
        if let Action::EntityUpdated { id, fields } = action {
            store.apply_partial(id, &fields);
        }
    }
    emit(&LayoutPayload::capture(&store, &core.view))
}

fn run_templates() -> Result<(), CliError> {
    let infos: Vec<TemplateInfo> = LayoutTemplate::ALL
        .iter()
        .map(|t| TemplateInfo {
            id: t.id(),
            name: t.name(),
            description: t.description(),
            recommended_for: t.recommended_for(),
        })
        .collect();
    emit(&infos)
}
