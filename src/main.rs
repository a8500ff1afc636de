use clap::{Parser, ValueEnum};
use log::error;
use phylotree::tree::Tree;
use std::path::{Path, PathBuf};
use std::process;
use std::time::Instant;
use tree_matching_distance::WeightingMode;
use tree_matching_distance::distances::{
    build_snapshots, distance_matrix, distances_to_reference, pairwise_from_snapshots,
};
use tree_matching_distance::io::{read_trees, write_column_tsv, write_matrix_tsv};

/// Compute matching distances between trees from a BEAST/NEXUS or Newick
/// file and write a labeled distance table (TSV).
#[derive(Parser, Debug)]
#[command(
    name = "tree-matching-distance",
    version,
    about = "Pairwise matching split distance for phylogenetic trees"
)]
struct Args {
    /// Path to a BEAST .trees (NEXUS) or Newick file
    #[arg(short = 'i', long = "input")]
    input: PathBuf,

    /// Output path for the TSV table (gzip if it ends in .gz)
    #[arg(short = 'o', long = "output")]
    output: PathBuf,

    /// Split cost: unit counts leaf moves, length-weighted also uses branch lengths
    #[arg(long = "mode", value_enum, default_value_t = ModeArg::Unit)]
    mode: ModeArg,

    /// Burn-in by number of trees (drop first N trees)
    #[arg(short = 't', long = "burnin-trees", default_value_t = 0)]
    burnin_trees: usize,

    /// Burn-in by state (keep trees with STATE_ > value)
    #[arg(short = 's', long = "burnin-states", default_value_t = 0)]
    burnin_states: usize,

    /// Use TRANSLATE block to map taxon IDs to labels when available
    #[arg(long = "use-real-taxa", default_value_t = false)]
    use_real_taxa: bool,

    /// Compare every input tree against the first tree of this file instead
    /// of computing the pairwise matrix
    #[arg(long = "reference")]
    reference: Option<PathBuf>,

    /// Quiet mode: suppresses progress messages on stdout
    #[arg(short = 'q', long = "quiet", default_value_t = false)]
    quiet: bool,
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ModeArg {
    Unit,
    LengthWeighted,
}

impl From<ModeArg> for WeightingMode {
    fn from(arg: ModeArg) -> Self {
        match arg {
            ModeArg::Unit => WeightingMode::Unit,
            ModeArg::LengthWeighted => WeightingMode::LengthWeighted,
        }
    }
}

/// First tree of `path`; read errors are logged.
fn first_tree(path: &Path, use_real_taxa: bool) -> Option<Tree> {
    let trees = read_trees(path, 0, 0, use_real_taxa).unwrap_or_else(|e| {
        error!("Failed to read {path:?}: {e}");
        Vec::new()
    });
    trees.into_iter().next().map(|(_, tree)| tree)
}

fn main() {
    env_logger::init();
    let args = Args::parse();
    let mode = WeightingMode::from(args.mode);
    let show = !args.quiet;

    let t0 = Instant::now();
    let named_trees = read_trees(
        &args.input,
        args.burnin_trees,
        args.burnin_states,
        args.use_real_taxa,
    )
    .unwrap_or_else(|e| {
        error!("Failed to read {:?}: {e}", args.input);
        Vec::new()
    });
    if named_trees.is_empty() {
        eprintln!("No trees parsed from {:?}.", args.input);
        process::exit(2);
    }
    log_if(show, format!("Reading trees {:.3}s", t0.elapsed().as_secs_f64()));
    log_if(show, format!("Read in {} trees", named_trees.len()));
    let (names, trees): (Vec<String>, Vec<_>) = named_trees.into_iter().unzip();

    match &args.reference {
        Some(reference) => {
            let Some(reference_tree) = first_tree(reference, args.use_real_taxa) else {
                eprintln!("No reference tree parsed from {reference:?}.");
                process::exit(2);
            };

            let t1 = Instant::now();
            log_if(show, format!("Determining {mode} distances to the reference for {} trees", names.len()));
            let dists = distances_to_reference(&reference_tree, &trees, mode).unwrap_or_else(|e| {
                eprintln!("Failed to compute distances: {e}");
                process::exit(3);
            });
            log_if(show, format!("Determining distances {:.3}s", t1.elapsed().as_secs_f64()));

            let t2 = Instant::now();
            if let Err(e) = write_column_tsv(&args.output, &names, &dists) {
                eprintln!("Failed to write output {:?}: {e}", args.output);
                process::exit(4);
            }
            log_if(show, format!("Writing to output {:.3}s", t2.elapsed().as_secs_f64()));
        }
        None => {
            let t1 = Instant::now();
            let (leaves, snaps) = build_snapshots(&trees).unwrap_or_else(|e| {
                eprintln!("Failed to build snapshots: {e}");
                process::exit(3);
            });
            log_if(show, format!("Creating split snapshots over {} taxa {:.3}s", leaves.len(), t1.elapsed().as_secs_f64()));

            let t2 = Instant::now();
            let n = names.len();
            log_if(show, format!("Determining {mode} distances for {} combinations", n * (n - 1) / 2));
            let pairs = pairwise_from_snapshots(&snaps, &leaves, mode).unwrap_or_else(|e| {
                eprintln!("Failed to compute distances: {e}");
                process::exit(3);
            });
            log_if(show, format!("Determining distances {:.3}s", t2.elapsed().as_secs_f64()));

            let t3 = Instant::now();
            let mat = distance_matrix(n, &pairs);
            if let Err(e) = write_matrix_tsv(&args.output, &names, &mat) {
                eprintln!("Failed to write output {:?}: {e}", args.output);
                process::exit(4);
            }
            log_if(show, format!("Writing to output {:.3}s", t3.elapsed().as_secs_f64()));
        }
    }
}

fn log_if(show: bool, msg: String) {
    if show {
        println!("{msg}");
    }
}
