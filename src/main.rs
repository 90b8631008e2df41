//! Caretaker - CLI entry point.
//!
//! Manifest tooling for library authors: validate a deprecation manifest and
//! preview the notices each declared warning class produces.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use caretaker::{
    CaptureSink, ClassDecl, ClassRegistry, DeprecationManifest, DeprecationNotifier,
    FunctionGuard, NoticeMetrics, NoticeOptions, RootTag,
};
use clap::Parser;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

#[derive(Parser, Debug)]
#[command(
    name = "caretaker",
    about = "Deprecation manifest tooling for library authors",
    version
)]
struct Args {
    /// Path to the deprecation manifest
    #[arg(short, long, default_value = "deprecations.yaml")]
    manifest: PathBuf,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short = 'L', long, default_value = "info")]
    log_level: Level,

    /// Print a sample manifest and exit
    #[arg(long)]
    print_manifest: bool,

    /// Validate the manifest and exit
    #[arg(long)]
    validate: bool,

    /// Render sample notices for every declared class, as JSON
    #[arg(long)]
    preview: bool,

    /// Print Prometheus metrics after the preview
    #[arg(long)]
    metrics: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    // Initialize logging
    let subscriber = FmtSubscriber::builder()
        .with_max_level(args.log_level)
        .with_target(false)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    // Print sample manifest if requested
    if args.print_manifest {
        let sample = include_str!("../demos/deprecations.yaml");
        println!("{}", sample);
        return Ok(());
    }

    // Load the manifest
    let manifest = if args.manifest.exists() {
        info!(path = ?args.manifest, "Loading manifest");
        DeprecationManifest::from_file(&args.manifest)?
    } else if args.validate {
        anyhow::bail!("Manifest file not found: {:?}", args.manifest);
    } else {
        info!("Using empty manifest");
        DeprecationManifest::default()
    };

    // Validate and exit if requested
    if args.validate {
        manifest.validate()?;
        println!("Manifest is valid");
        return Ok(());
    }

    if args.preview {
        return preview(&manifest, args.metrics);
    }

    // Default: a short summary of the declared classes
    manifest.validate()?;
    for entry in &manifest.classes {
        let class = manifest.class(&entry.id)?;
        println!(
            "{:<28} {:<9} {} {}",
            entry.id,
            class.kind,
            class.product,
            class.version.as_deref().unwrap_or("")
        );
    }
    info!(classes = manifest.classes.len(), "Manifest summary printed");

    Ok(())
}

/// Emit one notice per surface for every declared class, then print the
/// captured stream as JSON.
fn preview(manifest: &DeprecationManifest, with_metrics: bool) -> Result<()> {
    let sink = Arc::new(CaptureSink::default());
    let metrics = Arc::new(NoticeMetrics::default());
    let notifier = DeprecationNotifier::with_sink(sink.clone()).with_metrics(metrics.clone());

    for entry in &manifest.classes {
        let class = manifest.class(&entry.id)?;

        // A deprecated function call.
        let guard = FunctionGuard::deprecated(
            notifier.clone(),
            class.clone().into(),
            "legacy_func()",
            NoticeOptions::default(),
            |_: ()| (),
        );
        guard.call(())?;

        // A deprecated module import.
        notifier.module_deprecated(
            &class.clone().into(),
            "myproject.legacy",
            NoticeOptions::default(),
        )?;

        // A deprecated class being constructed.
        let registry = ClassRegistry::new(notifier.clone());
        registry.declare(ClassDecl::new("LegacyClass").rooted(RootTag::deprecated(class.into())))?;
        registry.instantiated("LegacyClass")?;
    }

    println!("{}", serde_json::to_string_pretty(&sink.drain())?);

    if with_metrics {
        println!("{}", metrics.encode());
    }

    Ok(())
}
