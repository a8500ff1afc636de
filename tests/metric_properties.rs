use itertools::Itertools;
use phylotree::tree::Tree;
use tree_matching_distance::distances::distance_matrix;
use tree_matching_distance::{
    DistanceError, WeightingMode, distances_to_reference, matching_distance,
    pairwise_matching_distances, read_trees,
};

const SIX_TAXA: [&str; 8] = [
    "((a,b),(c,d),(e,f));",
    "((a,c),(b,d),(e,f));",
    "(((a,b),c),(d,e),f);",
    "((a,(b,(c,(d,e)))),f);",
    "((a,f),(b,e),(c,d));",
    "(a,b,(c,d,e,f));",
    "(a,b,c,d,e,f);",
    "(((e,d),c),b,(f,a));",
];

const WEIGHTED: [&str; 5] = [
    "((a:1,b:1):1,(c:1,d:1):1,(e:1,f:1):1);",
    "((a:2,b:1):0.5,(c:1,d:1):1,(e:1,f:3):1);",
    "((a:1,c:1):1,(b:1,d:1):1,(e:1,f:1):1);",
    "((a:0.1,f:0.1):0.1,(b:0.1,e:0.1):0.1,(c:0.1,d:0.1):0.1);",
    "(((a:1,b:1):1,c:1):2,(d:1,e:1):1,f:1);",
];

fn parse(newicks: &[&str]) -> Vec<Tree> {
    newicks
        .iter()
        .map(|s| Tree::from_newick(s).unwrap())
        .collect()
}

fn all_distances(trees: &[Tree], mode: WeightingMode) -> Vec<Vec<f64>> {
    let n = trees.len();
    (0..n)
        .map(|i| {
            (0..n)
                .map(|j| matching_distance(&trees[i], &trees[j], mode).unwrap())
                .collect()
        })
        .collect()
}

fn assert_metric(d: &[Vec<f64>]) {
    let n = d.len();
    for i in 0..n {
        assert_eq!(d[i][i], 0.0, "identity at {i}");
        for j in 0..n {
            assert!(d[i][j] >= 0.0, "negative at [{i}, {j}]");
            assert_eq!(d[i][j], d[j][i], "[{i}, {j}]");
        }
    }
    for p in (0..n).permutations(3) {
        let (a, b, c) = (p[0], p[1], p[2]);
        assert!(
            d[a][c] <= d[a][b] + d[b][c] + 1e-9,
            "triangle violated for ({a}, {b}, {c}): {} > {} + {}",
            d[a][c],
            d[a][b],
            d[b][c]
        );
    }
}

#[test]
fn unit_mode_is_a_metric() {
    let d = all_distances(&parse(&SIX_TAXA), WeightingMode::Unit);
    assert_metric(&d);

    // same topology written differently
    assert_eq!(d[3][7], 0.0);
    // different topologies are apart
    for (i, j) in (0..SIX_TAXA.len()).tuple_combinations() {
        if (i, j) != (3, 7) {
            assert!(d[i][j] > 0.0, "[{i}, {j}]");
        }
    }
    // unit distances count leaf moves
    for row in &d {
        for v in row {
            assert_eq!(v.fract(), 0.0);
        }
    }
}

#[test]
fn length_weighted_mode_is_symmetric_and_nonnegative() {
    let trees = parse(&WEIGHTED);
    let d = all_distances(&trees, WeightingMode::LengthWeighted);
    let n = trees.len();
    for (i, j) in (0..n).cartesian_product(0..n) {
        assert!(d[i][j] >= 0.0);
        assert_eq!(d[i][j], d[j][i], "[{i}, {j}]");
        assert_eq!(d[i][j] == 0.0, i == j, "[{i}, {j}]");
    }
}

#[test]
fn batch_agrees_with_single_comparisons() {
    let trees = parse(&SIX_TAXA);
    let single = all_distances(&trees, WeightingMode::Unit);

    let pairs = pairwise_matching_distances(&trees, WeightingMode::Unit).unwrap();
    assert_eq!(pairs.len(), trees.len() * (trees.len() - 1) / 2);
    assert_eq!(distance_matrix(trees.len(), &pairs), single);

    let to_first = distances_to_reference(&trees[0], &trees, WeightingMode::Unit).unwrap();
    assert_eq!(to_first, single[0]);
}

#[test]
fn rooting_does_not_change_the_distance() {
    let unrooted = Tree::from_newick("((a:1,b:1):2,c:1,(d:1,e:1):1);").unwrap();
    // same tree rooted on the (a,b) edge, the 2.0 split across the root
    let rooted = Tree::from_newick("((a:1,b:1):1.5,(c:1,(d:1,e:1):1):0.5);").unwrap();

    for mode in [WeightingMode::Unit, WeightingMode::LengthWeighted] {
        assert_eq!(matching_distance(&unrooted, &rooted, mode).unwrap(), 0.0);
    }
}

#[test]
fn mixed_leaf_sets_never_give_a_number() {
    let a = Tree::from_newick("((a,b),(c,d),(e,f));").unwrap();
    let b = Tree::from_newick("((a,b),(c,d),(e,g));").unwrap();
    for mode in [WeightingMode::Unit, WeightingMode::LengthWeighted] {
        assert!(matches!(
            matching_distance(&a, &b, mode),
            Err(DistanceError::IncompatibleLeafSets { .. })
        ));
    }
}

#[test]
fn distances_from_a_newick_file() {
    let path = std::env::temp_dir().join(format!("tmd_it_{}.nwk", std::process::id()));
    std::fs::write(&path, SIX_TAXA.join("\n")).unwrap();

    let named = read_trees(&path, 0, 0, false).unwrap();
    std::fs::remove_file(&path).unwrap();
    assert_eq!(named.len(), SIX_TAXA.len());

    let (names, trees): (Vec<String>, Vec<Tree>) = named.into_iter().unzip();
    assert!(names.iter().all_unique());

    let pairs = pairwise_matching_distances(&trees, WeightingMode::Unit).unwrap();
    assert_eq!(
        distance_matrix(trees.len(), &pairs),
        all_distances(&parse(&SIX_TAXA), WeightingMode::Unit)
    );
}
