//! A thin runner: load a YAML pipeline spec, assemble a `wingline::Pipeline`
//! from it, and run it to completion. No pipeline semantics live here —
//! this binary is a mechanical adapter from declarative YAML to the
//! `wingline` builder API.

use std::path::PathBuf;

use clap::Parser;
use serde::Deserialize;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use wingline::Pipeline;

#[derive(Parser, Debug)]
#[command(name = "wingline", about = "Run a Wingline pipeline from a YAML spec")]
struct Args {
    /// Path to the pipeline spec YAML file.
    pipeline: PathBuf,
}

/// The on-disk declarative shape of a pipeline: one source, zero or more
/// built-in stages applied in order, one sink.
#[derive(Debug, Deserialize)]
struct PipelineSpec {
    name: String,
    source: SourceSpec,
    #[serde(default)]
    cache_dir: Option<PathBuf>,
    #[serde(default)]
    stages: Vec<StageSpec>,
    sink: SinkSpec,
}

#[derive(Debug, Deserialize)]
struct SourceSpec {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
struct SinkSpec {
    path: PathBuf,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum StageSpec {
    Head { n: usize },
    Tail { n: usize },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let raw = std::fs::read_to_string(&args.pipeline)?;
    let spec: PipelineSpec = serde_yaml::from_str(&raw)?;

    tracing::info!(name = %spec.name, stages = spec.stages.len(), "assembling pipeline");

    let mut pipeline = Pipeline::new(spec.source.path, spec.cache_dir)?;
    for stage in spec.stages {
        pipeline = match stage {
            StageSpec::Head { n } => pipeline.head(n)?,
            StageSpec::Tail { n } => pipeline.tail(n)?,
        };
    }
    pipeline = pipeline.write(spec.sink.path)?;
    pipeline.run()?;

    tracing::info!(name = %spec.name, "pipeline finished");
    Ok(())
}
