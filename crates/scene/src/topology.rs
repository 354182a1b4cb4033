//! Link topology over the currently plottable nodes.
//!
//! The mesh does not report which nodes actually hear each other, so links are
//! inferred from geometry: a minimum spanning tree guarantees one connected
//! picture, and a k-nearest-neighbour pass adds the short redundant links a
//! real mesh is likely to have. Everything is recomputed from scratch each
//! frame because the plottable set changes membership between frames.
//!
//! Point indices are only meaningful for the slice passed to a single call.
//! All ties are broken by lowest index so identical input always yields
//! identical output.

use std::collections::BTreeSet;

use foundation::math::{Vec2, stable_total_cmp_f64};
use serde::{Deserialize, Serialize};

/// Default neighbour count for the KNN pass.
pub const DEFAULT_K_NEIGHBORS: usize = 2;

/// Default cutoff for KNN links, in metres.
pub const DEFAULT_LINK_MAX_M: f64 = 60_000.0;

/// Undirected link between two point indices, stored with `a <= b`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct Edge {
    pub a: usize,
    pub b: usize,
}

impl Edge {
    pub fn new(i: usize, j: usize) -> Self {
        Self {
            a: i.min(j),
            b: i.max(j),
        }
    }
}

/// Which edge set to draw.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkMode {
    #[default]
    MstKnn,
    Mst,
    Knn,
}

impl LinkMode {
    /// Cycle order: `mst_knn -> mst -> knn -> mst_knn`.
    pub fn next(self) -> Self {
        match self {
            LinkMode::MstKnn => LinkMode::Mst,
            LinkMode::Mst => LinkMode::Knn,
            LinkMode::Knn => LinkMode::MstKnn,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LinkMode::MstKnn => "mst_knn",
            LinkMode::Mst => "mst",
            LinkMode::Knn => "knn",
        }
    }
}

impl std::fmt::Display for LinkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when parsing an unknown link mode name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLinkMode(pub String);

impl std::fmt::Display for UnknownLinkMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "unknown link mode '{}' (expected mst_knn, mst or knn)",
            self.0
        )
    }
}

impl std::error::Error for UnknownLinkMode {}

impl std::str::FromStr for LinkMode {
    type Err = UnknownLinkMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mst_knn" | "mst-knn" | "hybrid" => Ok(LinkMode::MstKnn),
            "mst" => Ok(LinkMode::Mst),
            "knn" => Ok(LinkMode::Knn),
            _ => Err(UnknownLinkMode(s.to_string())),
        }
    }
}

/// Prim's algorithm over the complete graph, O(n²).
///
/// Grows from index 0. When several points are equally close to the tree the
/// lowest index joins first, and a point keeps the first tree vertex that
/// reached its best distance. Returns exactly `n - 1` edges for `n >= 1`, in
/// the order they joined the tree.
pub fn mst_edges(points: &[Vec2]) -> Vec<Edge> {
    let n = points.len();
    if n <= 1 {
        return Vec::new();
    }

    let mut in_tree = vec![false; n];
    let mut best_d2 = vec![f64::INFINITY; n];
    let mut parent = vec![0usize; n];

    in_tree[0] = true;
    for j in 1..n {
        best_d2[j] = points[0].distance_squared(points[j]);
    }

    let mut edges = Vec::with_capacity(n - 1);
    for _ in 1..n {
        let mut next: Option<usize> = None;
        for j in 0..n {
            if in_tree[j] {
                continue;
            }
            let closer = match next {
                None => true,
                Some(k) => stable_total_cmp_f64(best_d2[j], best_d2[k]).is_lt(),
            };
            if closer {
                next = Some(j);
            }
        }
        // Every remaining vertex is a candidate, so this only ends early on n == 0.
        let Some(k) = next else { break };

        in_tree[k] = true;
        edges.push(Edge::new(parent[k], k));

        for j in 0..n {
            if in_tree[j] {
                continue;
            }
            let d2 = points[k].distance_squared(points[j]);
            if d2 < best_d2[j] {
                best_d2[j] = d2;
                parent[j] = k;
            }
        }
    }
    edges
}

/// Links each point to up to `k` nearest others within `max_distance_m`.
///
/// Candidates are ranked by squared distance, then by index. A point may end
/// up with more than `k` links when others pick it. `k == 0` or a non-positive
/// cutoff selects nothing. The result is sorted and free of duplicates.
pub fn knn_edges(points: &[Vec2], k: usize, max_distance_m: f64) -> Vec<Edge> {
    let n = points.len();
    if n <= 1 || k == 0 || !(max_distance_m > 0.0) {
        return Vec::new();
    }
    let max_d2 = max_distance_m * max_distance_m;

    let mut out = BTreeSet::new();
    let mut candidates: Vec<(f64, usize)> = Vec::with_capacity(n - 1);
    for i in 0..n {
        candidates.clear();
        candidates.extend(
            (0..n)
                .filter(|&j| j != i)
                .map(|j| (points[i].distance_squared(points[j]), j)),
        );
        candidates
            .sort_by(|(da, ja), (db, jb)| stable_total_cmp_f64(*da, *db).then(ja.cmp(jb)));

        for &(_, j) in candidates
            .iter()
            .take_while(|(d2, _)| *d2 <= max_d2)
            .take(k)
        {
            out.insert(Edge::new(i, j));
        }
    }
    out.into_iter().collect()
}

/// Union of the spanning tree and the KNN links. Always contains every MST edge.
pub fn hybrid_edges(points: &[Vec2], k: usize, max_distance_m: f64) -> Vec<Edge> {
    let mut out: BTreeSet<Edge> = mst_edges(points).into_iter().collect();
    out.extend(knn_edges(points, k, max_distance_m));
    out.into_iter().collect()
}

/// Stateless per-frame link builder.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct TopologyBuilder {
    pub k: usize,
    pub max_distance_m: f64,
}

impl Default for TopologyBuilder {
    fn default() -> Self {
        Self {
            k: DEFAULT_K_NEIGHBORS,
            max_distance_m: DEFAULT_LINK_MAX_M,
        }
    }
}

impl TopologyBuilder {
    pub fn new(k: usize, max_distance_m: f64) -> Self {
        Self { k, max_distance_m }
    }

    pub fn mst(&self, points: &[Vec2]) -> Vec<Edge> {
        mst_edges(points)
    }

    pub fn knn(&self, points: &[Vec2]) -> Vec<Edge> {
        knn_edges(points, self.k, self.max_distance_m)
    }

    pub fn hybrid(&self, points: &[Vec2]) -> Vec<Edge> {
        hybrid_edges(points, self.k, self.max_distance_m)
    }

    pub fn build(&self, points: &[Vec2], mode: LinkMode) -> Vec<Edge> {
        if points.len() <= 1 {
            return Vec::new();
        }
        match mode {
            LinkMode::Mst => self.mst(points),
            LinkMode::Knn => self.knn(points),
            LinkMode::MstKnn => self.hybrid(points),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeSet;

    use super::{Edge, LinkMode, TopologyBuilder, hybrid_edges, knn_edges, mst_edges};
    use foundation::math::Vec2;
    use pretty_assertions::assert_eq;

    /// Deterministic scatter so the property tests need no RNG crate.
    fn scatter(n: usize, seed: u64) -> Vec<Vec2> {
        let mut state = seed.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        let mut next = move || {
            state = state
                .wrapping_mul(6364136223846793005)
                .wrapping_add(1442695040888963407);
            ((state >> 33) as f64 / (1u64 << 31) as f64) * 20_000.0 - 10_000.0
        };
        (0..n).map(|_| Vec2::new(next(), next())).collect()
    }

    fn is_spanning_tree(n: usize, edges: &[Edge]) -> bool {
        if n == 0 {
            return edges.is_empty();
        }
        if edges.len() != n - 1 {
            return false;
        }
        // Union-find: n - 1 edges without a cycle over n vertices is a tree.
        let mut parent: Vec<usize> = (0..n).collect();
        fn find(parent: &mut [usize], mut x: usize) -> usize {
            while parent[x] != x {
                parent[x] = parent[parent[x]];
                x = parent[x];
            }
            x
        }
        for e in edges {
            let (ra, rb) = (find(&mut parent, e.a), find(&mut parent, e.b));
            if ra == rb {
                return false;
            }
            parent[ra] = rb;
        }
        true
    }

    #[test]
    fn mst_is_spanning_tree_for_many_sizes() {
        for n in 0..40 {
            let pts = scatter(n, n as u64 + 7);
            let edges = mst_edges(&pts);
            assert!(is_spanning_tree(n, &edges), "n = {n}: {edges:?}");
        }
    }

    #[test]
    fn mst_trivial_inputs() {
        assert!(mst_edges(&[]).is_empty());
        assert!(mst_edges(&[Vec2::new(3.0, 4.0)]).is_empty());
        assert_eq!(
            mst_edges(&[Vec2::ZERO, Vec2::new(1.0, 0.0)]),
            vec![Edge::new(0, 1)]
        );
    }

    #[test]
    fn mst_three_node_fan() {
        // Origin, ~1113 m north, ~850 m east (at 40 degrees latitude).
        let pts = [
            Vec2::ZERO,
            Vec2::new(0.0, 1113.2),
            Vec2::new(1113.2 * 40f64.to_radians().cos(), 0.0),
        ];
        let edges = mst_edges(&pts);
        assert_eq!(edges, vec![Edge::new(0, 2), Edge::new(0, 1)]);
    }

    #[test]
    fn mst_handles_duplicate_points() {
        let p = Vec2::new(5.0, 5.0);
        let pts = [p, p, p, Vec2::new(6.0, 5.0)];
        let edges = mst_edges(&pts);
        assert!(is_spanning_tree(pts.len(), &edges));
        // Lowest index wins every tie.
        assert_eq!(
            edges,
            vec![Edge::new(0, 1), Edge::new(0, 2), Edge::new(0, 3)]
        );
    }

    #[test]
    fn mst_is_deterministic() {
        let pts = scatter(25, 99);
        assert_eq!(mst_edges(&pts), mst_edges(&pts));
    }

    #[test]
    fn mst_picks_shortest_links_on_a_line() {
        let pts: Vec<_> = [0.0, 10.0, 30.0, 31.0]
            .into_iter()
            .map(|x| Vec2::new(x, 0.0))
            .collect();
        let set: BTreeSet<_> = mst_edges(&pts).into_iter().collect();
        let expected: BTreeSet<_> = [Edge::new(0, 1), Edge::new(1, 2), Edge::new(2, 3)]
            .into_iter()
            .collect();
        assert_eq!(set, expected);
    }

    #[test]
    fn knn_respects_distance_bound() {
        let pts = scatter(30, 3);
        for max in [500.0, 2_000.0, 8_000.0] {
            for e in knn_edges(&pts, 3, max) {
                assert!(pts[e.a].distance(pts[e.b]) <= max);
                assert!(e.a < e.b);
            }
        }
    }

    #[test]
    fn knn_selects_nearest_and_dedups() {
        let pts = [
            Vec2::new(0.0, 0.0),
            Vec2::new(1.0, 0.0),
            Vec2::new(3.0, 0.0),
            Vec2::new(100.0, 0.0),
        ];
        let edges = knn_edges(&pts, 1, 50.0);
        // 0->1, 1->0 (dup), 2->1; 3 has nothing within 50 m.
        assert_eq!(edges, vec![Edge::new(0, 1), Edge::new(1, 2)]);
    }

    #[test]
    fn knn_point_can_exceed_k_links() {
        let pts = [
            Vec2::ZERO,
            Vec2::new(1.0, 0.0),
            Vec2::new(-1.0, 0.0),
            Vec2::new(0.0, 1.0),
        ];
        let edges = knn_edges(&pts, 1, 10.0);
        let hub = edges.iter().filter(|e| e.a == 0 || e.b == 0).count();
        assert_eq!(hub, 3);
    }

    #[test]
    fn knn_ties_break_by_index() {
        // 1 and 2 are equidistant from 0; each has a closer partner of its own.
        let pts = [
            Vec2::ZERO,
            Vec2::new(0.0, 2.0),
            Vec2::new(0.0, -2.0),
            Vec2::new(0.0, 2.5),
            Vec2::new(0.0, -2.5),
        ];
        let edges = knn_edges(&pts, 1, 10.0);
        assert_eq!(
            edges,
            vec![Edge::new(0, 1), Edge::new(1, 3), Edge::new(2, 4)]
        );
    }

    #[test]
    fn knn_invalid_configuration_selects_nothing() {
        let pts = scatter(10, 1);
        assert!(knn_edges(&pts, 0, 1e9).is_empty());
        assert!(knn_edges(&pts, 2, 0.0).is_empty());
        assert!(knn_edges(&pts, 2, -5.0).is_empty());
        assert!(knn_edges(&pts, 2, f64::NAN).is_empty());
    }

    #[test]
    fn knn_zero_distance_duplicates_link() {
        let p = Vec2::new(7.0, 7.0);
        assert_eq!(knn_edges(&[p, p], 2, 1.0), vec![Edge::new(0, 1)]);
    }

    #[test]
    fn hybrid_contains_mst() {
        for seed in 0..10 {
            let pts = scatter(20, seed);
            let hybrid: BTreeSet<_> = hybrid_edges(&pts, 2, 1_500.0).into_iter().collect();
            for e in mst_edges(&pts) {
                assert!(hybrid.contains(&e), "seed {seed}: missing {e:?}");
            }
        }
    }

    #[test]
    fn build_dispatches_on_mode() {
        let builder = TopologyBuilder::default();
        let pts = scatter(12, 42);
        assert_eq!(builder.build(&pts, LinkMode::Mst), mst_edges(&pts));
        assert_eq!(builder.build(&pts, LinkMode::Knn), knn_edges(&pts, 2, 60_000.0));
        assert_eq!(
            builder.build(&pts, LinkMode::MstKnn),
            hybrid_edges(&pts, 2, 60_000.0)
        );
        for mode in [LinkMode::Mst, LinkMode::Knn, LinkMode::MstKnn] {
            assert!(builder.build(&pts[..1], mode).is_empty());
            assert!(builder.build(&[], mode).is_empty());
        }
    }

    #[test]
    fn link_mode_cycles_and_parses() {
        let mut m = LinkMode::default();
        assert_eq!(m, LinkMode::MstKnn);
        let mut seen = Vec::new();
        for _ in 0..3 {
            seen.push(m.as_str());
            m = m.next();
        }
        assert_eq!(seen, vec!["mst_knn", "mst", "knn"]);
        assert_eq!(m, LinkMode::MstKnn);

        assert_eq!("MST".parse::<LinkMode>(), Ok(LinkMode::Mst));
        assert_eq!("mst_knn".parse::<LinkMode>(), Ok(LinkMode::MstKnn));
        assert!("ring".parse::<LinkMode>().is_err());
    }
}
