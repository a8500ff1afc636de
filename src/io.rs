//! Reading tree files and writing distance tables.
//!
//! Two input formats are understood:
//! - BEAST/NEXUS `.trees` files, optionally with a `TRANSLATE` block and
//!   `STATE_` numbers in the tree headers
//! - plain Newick, one `;`-terminated tree after another
//!
//! [`read_trees`] picks the reader from a `#NEXUS` header. Trees that fail
//! to parse are skipped with a warning; an unreadable file is an error.

use flate2::Compression;
use flate2::write::GzEncoder;
use log::{debug, warn};
use phylotree::tree::Tree;
use std::collections::HashMap;
use std::fmt::Display;
use std::fs::{self, File};
use std::io::{self, BufWriter, Write};
use std::path::Path;

/// Trees with their display names.
pub type NamedTrees = Vec<(String, Tree)>;

/// Strip BEAST annotations from Newick strings.
///
/// BEAST writes annotations like `:[&rate=0.123]2.45` where 2.45 is the
/// branch length. The `[&...]` part is dropped, the length kept.
fn strip_beast_annotations(newick: &str) -> String {
    let mut result = String::with_capacity(newick.len());
    let mut in_annotation = false;
    let mut chars = newick.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '[' && chars.peek() == Some(&'&') {
            in_annotation = true;
        } else if ch == ']' && in_annotation {
            in_annotation = false;
        } else if !in_annotation {
            result.push(ch);
        }
    }

    result
}

fn base_name(path: &Path) -> String {
    path.file_name()
        .and_then(|s| s.to_str())
        .map(|s| {
            s.trim_end_matches(".gz")
                .trim_end_matches(".trees")
                .trim_end_matches(".nwk")
                .trim_end_matches(".tre")
        })
        .unwrap_or("unknown")
        .to_string()
}

fn parse_newick(newick: &str, origin: &str, idx: usize) -> Option<Tree> {
    if !newick.contains('(') {
        warn!("skipping tree {idx} of {origin}: no subtree in {newick:?}");
        return None;
    }
    match Tree::from_newick(&strip_beast_annotations(newick)) {
        Ok(t) => Some(t),
        Err(e) => {
            warn!("skipping tree {idx} of {origin}: {e}");
            None
        }
    }
}

/// Read a BEAST/NEXUS `.trees` file.
///
/// Trees are named `<file>_tree_STATE<n>`. Burn-in drops the first
/// `burnin_trees` trees and every tree with `STATE_ <= burnin_states`;
/// a value of 0 disables that filter. With `use_real_taxa`, leaf ids are
/// replaced by their `TRANSLATE` labels.
///
/// Returns the translate table and the kept trees.
pub fn read_beast_trees<P: AsRef<Path>>(
    path: P,
    burnin_trees: usize,
    burnin_states: usize,
    use_real_taxa: bool,
) -> io::Result<(HashMap<String, String>, NamedTrees)> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    Ok(parse_beast(
        &content,
        &base_name(path),
        burnin_trees,
        burnin_states,
        use_real_taxa,
    ))
}

fn parse_beast(
    content: &str,
    base_name: &str,
    burnin_trees: usize,
    burnin_states: usize,
    use_real_taxa: bool,
) -> (HashMap<String, String>, NamedTrees) {
    let taxons = parse_taxon_block(content);

    let trees = collect_tree_blocks(content)
        .into_iter()
        .enumerate()
        .map(|(idx, block)| (idx, extract_state(block.header), block))
        .filter(|&(idx, state, _)| {
            (burnin_trees == 0 || idx >= burnin_trees)
                && (burnin_states == 0 || state > burnin_states)
        })
        .filter_map(|(idx, state, block)| {
            let mut tree = parse_newick(&block.body, base_name, idx)?;
            if use_real_taxa {
                rename_leaf_nodes(&mut tree, &taxons);
            }
            Some((format!("{base_name}_tree_STATE{state}"), tree))
        })
        .collect::<Vec<_>>();

    debug!(
        "{base_name}: {} taxa in TRANSLATE, {} trees kept",
        taxons.len(),
        trees.len()
    );
    (taxons, trees)
}

fn extract_state(header: &str) -> usize {
    header
        .to_ascii_uppercase()
        .find("STATE_")
        .and_then(|start| {
            header[start + "STATE_".len()..]
                .chars()
                .take_while(|c| c.is_ascii_digit())
                .collect::<String>()
                .parse()
                .ok()
        })
        .unwrap_or(0)
}

struct TreeBlock<'a> {
    header: &'a str,
    body: &'a str,
}

fn collect_tree_blocks(content: &str) -> Vec<TreeBlock<'_>> {
    content
        .lines()
        .map(str::trim)
        .skip_while(|line| !line.to_ascii_uppercase().starts_with("TREE "))
        .take_while(|line| !line.to_ascii_uppercase().starts_with("END;"))
        .filter_map(|line| {
            let (header, body) = line.split_once(" = ")?;
            Some(TreeBlock {
                header: header.trim(),
                body: body.trim(),
            })
        })
        .collect()
}

fn parse_taxon_block(content: &str) -> HashMap<String, String> {
    content
        .lines()
        .skip_while(|line| !line.trim().to_ascii_uppercase().starts_with("TRANSLATE"))
        .skip(1)
        .take_while(|line| !line.trim().starts_with(';'))
        // 1 '1959.M.CD.59.ZR59',
        // 2 '1960.DRC60A'
        .filter_map(|line| {
            let line = line.trim().trim_end_matches([',', ';']);
            let mut parts = line.split_whitespace();
            let id = parts.next()?.to_string();
            let label = parts.next()?.trim_matches('\'').to_string();
            Some((id, label))
        })
        .collect()
}

/// Replace leaf names by their `translate` entry; names with no entry stay.
pub fn rename_leaf_nodes(tree: &mut Tree, translate: &HashMap<String, String>) {
    for leaf_id in tree.get_leaves() {
        if let Ok(node) = tree.get_mut(&leaf_id) {
            if let Some(label) = node.name.as_ref().and_then(|n| translate.get(n)) {
                node.name = Some(label.clone());
            }
        }
    }
}

/// Read a plain Newick file: every `;`-terminated statement is one tree.
///
/// Trees are named `<file>_tree<n>`.
pub fn read_newick_trees<P: AsRef<Path>>(path: P) -> io::Result<NamedTrees> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    Ok(parse_newick_file(&content, &base_name(path)))
}

fn parse_newick_file(content: &str, base_name: &str) -> NamedTrees {
    content
        .split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .enumerate()
        .filter_map(|(idx, body)| {
            let tree = parse_newick(&format!("{body};"), base_name, idx)?;
            Some((format!("{base_name}_tree{idx}"), tree))
        })
        .collect()
}

/// Read trees from NEXUS or Newick, whichever the file holds.
///
/// For Newick input only `burnin_trees` applies; there are no states and
/// no translate table.
pub fn read_trees<P: AsRef<Path>>(
    path: P,
    burnin_trees: usize,
    burnin_states: usize,
    use_real_taxa: bool,
) -> io::Result<NamedTrees> {
    let path = path.as_ref();
    let content = fs::read_to_string(path)?;
    let name = base_name(path);

    let is_nexus = content
        .trim_start()
        .get(..6)
        .is_some_and(|head| head.eq_ignore_ascii_case("#NEXUS"));

    if is_nexus {
        let (_, trees) = parse_beast(&content, &name, burnin_trees, burnin_states, use_real_taxa);
        Ok(trees)
    } else {
        Ok(parse_newick_file(&content, &name)
            .into_iter()
            .skip(burnin_trees)
            .collect())
    }
}

/// Output table file, plain or gzip-compressed.
enum Output {
    Plain(BufWriter<File>),
    Gzip(BufWriter<GzEncoder<File>>),
}

impl Output {
    /// Plain file, or gzip when the path ends in `.gz`.
    fn create(path: &Path) -> io::Result<Output> {
        if path.as_os_str() == "-" {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "writing to stdout is not supported",
            ));
        }

        let file = File::create(path)?;
        if path.to_string_lossy().ends_with(".gz") {
            Ok(Output::Gzip(BufWriter::new(GzEncoder::new(
                file,
                Compression::default(),
            ))))
        } else {
            Ok(Output::Plain(BufWriter::new(file)))
        }
    }

    /// Flush everything, writing the gzip trailer for compressed output.
    fn finish(self) -> io::Result<()> {
        match self {
            Output::Plain(mut w) => w.flush(),
            Output::Gzip(w) => {
                let encoder = w.into_inner().map_err(|e| e.into_error())?;
                encoder.finish()?.flush()
            }
        }
    }
}

impl Write for Output {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Output::Plain(w) => w.write(buf),
            Output::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Output::Plain(w) => w.flush(),
            Output::Gzip(w) => w.flush(),
        }
    }
}

/// Write a labelled square matrix as TSV.
/// If `path` ends with `.gz`, the output is gzip-compressed.
pub fn write_matrix_tsv<P: AsRef<Path>, T: Display>(
    path: P,
    names: &[String],
    mat: &[Vec<T>],
) -> io::Result<()> {
    if mat.len() != names.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} names for a matrix of {} rows", names.len(), mat.len()),
        ));
    }
    let mut out = Output::create(path.as_ref())?;

    // Header row
    writeln!(out, "\t{}", names.join("\t"))?;

    for (name, row) in names.iter().zip(mat) {
        write!(out, "{name}")?;
        for val in row {
            write!(out, "\t{val}")?;
        }
        writeln!(out)?;
    }

    out.finish()
}

/// Write one `name<TAB>value` row per tree under a `tree	distance` header.
pub fn write_column_tsv<P: AsRef<Path>, T: Display>(
    path: P,
    names: &[String],
    values: &[T],
) -> io::Result<()> {
    if values.len() != names.len() {
        return Err(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("{} names for {} values", names.len(), values.len()),
        ));
    }
    let mut out = Output::create(path.as_ref())?;

    writeln!(out, "tree\tdistance")?;
    for (name, val) in names.iter().zip(values) {
        writeln!(out, "{name}\t{val}")?;
    }

    out.finish()
}
