//! StudentSeg CLI: cluster a student cohort from a JSON record dump.
//!
//! This entrypoint stands in for the surrounding application: it loads
//! pre-parsed records, runs the clustering pipeline, prints cluster
//! statistics, and writes the dashboard plots.

use std::fs::File;
use std::io::BufReader;
use std::time::Instant;

use anyhow::{Context, Result};
use clap::Parser;
use studentseg::engine::EngineConfig;
use studentseg::record::{RawStudentRecord, StudentRecord};
use studentseg::{viz, Args, ClusterEngine, MemoryStore};

fn main() -> Result<()> {
    let args = Args::parse();

    if args.verbose {
        println!("StudentSeg - Student Segmentation using K-Means");
        println!("===============================================\n");
    }

    let start_time = Instant::now();

    // Step 1: Load records
    if args.verbose {
        println!("Step 1: Loading student records");
        println!("  Input file: {}", args.input);
    }
    let records = load_records(&args.input)?;
    println!("✓ Records loaded: {}", records.len());

    let engine = ClusterEngine::new(
        MemoryStore::new(),
        EngineConfig {
            params: args.kmeans_params(),
        },
    );

    // Elbow-only mode: report the sweep and exit.
    if args.elbow {
        let report = engine
            .elbow_preview(&records)
            .context("elbow preview failed")?;
        println!("\n=== Elbow Sweep ===");
        for (i, wcss) in report.wcss.iter().enumerate() {
            println!("  k={:2}  WCSS={:.2}", report.k_min + i, wcss);
        }
        println!("\nRecommended k: {}", report.recommended_k);
        return Ok(());
    }

    // Step 2: Cluster
    if args.verbose {
        println!("\nStep 2: Clustering");
        match args.clusters {
            Some(k) => println!("  k: {k} (caller-supplied)"),
            None => println!("  k: auto (elbow selection)"),
        }
        println!("  Seed: {}  Restarts: {}", args.seed, args.restarts);
    }
    let fit_start = Instant::now();
    let outcome = engine
        .upload(&args.input, records, args.clusters)
        .context("clustering failed")?;
    println!(
        "✓ Clustered {} of {} records into k={} clusters",
        outcome.clustered_records, outcome.total_records, outcome.k
    );
    if args.verbose {
        println!("  Fitting time: {:.2}s", fit_start.elapsed().as_secs_f64());
    }

    // Step 3: Report
    if args.verbose {
        println!("\nStep 3: Summarizing clusters");
    }
    let view = engine.cluster_view().context("no cluster view available")?;
    println!("\n=== Cluster Statistics ===");
    for (cluster, members) in &view.clusters {
        let share = (members.len() as f64 / outcome.total_records as f64) * 100.0;
        println!("Cluster {}: {} students ({:.1}%)", cluster, members.len(), share);
        if let Some(label) = view.labels.get(cluster) {
            println!("  {label}");
        }
    }
    if !view.unclustered.is_empty() {
        println!("Unclustered: {} students (incomplete records)", view.unclustered.len());
    }

    println!("\nCentroids (GWA, Income):");
    for (cluster, (gwa, income)) in view.centroids.iter().enumerate() {
        println!("  Cluster {cluster}: GWA {gwa:.2}, Income {income:.0}");
    }

    // Step 4: Plots and optional export
    if args.verbose {
        println!("\nStep 4: Generating visualizations");
        println!("  Output file: {}", args.output);
    }
    viz::render_report(&view, &args.output).context("failed to render plots")?;
    println!("\n✓ Plot saved to: {}", args.output);
    println!(
        "✓ Cluster sizes saved to: {}",
        args.output.replace(".png", "_sizes.png")
    );

    if let Some(export_path) = &args.export {
        let file = File::create(export_path)
            .with_context(|| format!("cannot create export file {export_path}"))?;
        serde_json::to_writer_pretty(file, &view)
            .context("failed to serialize cluster view")?;
        println!("✓ Cluster view exported to: {export_path}");
    }

    println!("\n=== Pipeline Complete ===");
    println!(
        "Total processing time: {:.2}s",
        start_time.elapsed().as_secs_f64()
    );

    Ok(())
}

/// Load and normalize records from a JSON array of raw student mappings.
fn load_records(path: &str) -> Result<Vec<StudentRecord>> {
    let file = File::open(path).with_context(|| format!("cannot open input file {path}"))?;
    let raw: Vec<RawStudentRecord> =
        serde_json::from_reader(BufReader::new(file)).context("invalid student record JSON")?;
    Ok(raw
        .iter()
        .enumerate()
        .map(|(i, r)| r.normalize(i as u64 + 1))
        .collect())
}
