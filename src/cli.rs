//! Command-line interface definitions and argument parsing

use clap::Parser;

/// Student segmentation CLI: cluster a cohort by academic performance,
/// household income, and categorical attributes
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Path to the input JSON file (array of student records)
    #[arg(short, long, default_value = "students.json")]
    pub input: String,

    /// Number of clusters; omitted means elbow-based auto-selection
    #[arg(short = 'k', long)]
    pub clusters: Option<usize>,

    /// Only compute the WCSS sweep and recommended k, then exit
    #[arg(long)]
    pub elbow: bool,

    /// Output path for the cluster scatter plot
    #[arg(short, long, default_value = "clusters.png")]
    pub output: String,

    /// Optional path for a JSON export of the full cluster view
    #[arg(short = 'e', long)]
    pub export: Option<String>,

    /// Random seed for reproducible clustering
    #[arg(long, default_value = "42")]
    pub seed: u64,

    /// Number of k-means restarts
    #[arg(long, default_value = "10")]
    pub restarts: usize,

    /// Maximum iterations per k-means run
    #[arg(long, default_value = "300")]
    pub max_iters: usize,

    /// Convergence tolerance for centroid movement
    #[arg(long, default_value = "1e-4")]
    pub tolerance: f64,

    /// Enable verbose output
    #[arg(short, long)]
    pub verbose: bool,
}

impl Args {
    /// Build k-means parameters from the CLI flags.
    pub fn kmeans_params(&self) -> crate::KMeansParams {
        crate::KMeansParams {
            seed: self.seed,
            n_restarts: self.restarts,
            max_iters: self.max_iters,
            tolerance: self.tolerance,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_reproducibility_contract() {
        let args = Args::parse_from(["studentseg"]);
        assert_eq!(args.seed, 42);
        assert_eq!(args.restarts, 10);
        assert_eq!(args.max_iters, 300);
        assert_eq!(args.clusters, None);
        let params = args.kmeans_params();
        assert_eq!(params.seed, 42);
        assert_eq!(params.n_restarts, 10);
    }

    #[test]
    fn explicit_flags_override_defaults() {
        let args = Args::parse_from([
            "studentseg",
            "--input",
            "cohort.json",
            "-k",
            "4",
            "--seed",
            "7",
            "--elbow",
        ]);
        assert_eq!(args.input, "cohort.json");
        assert_eq!(args.clusters, Some(4));
        assert_eq!(args.seed, 7);
        assert!(args.elbow);
    }
}
