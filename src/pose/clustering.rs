use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::pose::{CocoPart, CombinatorialIter, Connection, Human, NormPadding, Peak};

#[cfg(test)]
use crate::pose::Point;

/// Identity of a connection endpoint: pixel plus part type.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct EndpointKey {
    pub x: usize,
    pub y: usize,
    pub part: CocoPart,
}

impl EndpointKey {
    #[inline(always)]
    pub fn new(peak: Peak, part: CocoPart) -> Self {
        Self {
            x: peak.col,
            y: peak.row,
            part,
        }
    }
}

/// How connections sharing endpoints are grouped into clusters.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClusterStrategy {
    /// Pairwise scan over live clusters, restarted after every merge.
    RestartScan,
    /// Disjoint set keyed by endpoint identity, then a restart scan per component.
    UnionFind,
}

impl Default for ClusterStrategy {
    fn default() -> Self {
        ClusterStrategy::RestartScan
    }
}

/// Thresholds applied when turning clusters into humans.
#[derive(Debug, Copy, Clone)]
pub struct ClusterFilter {
    /// Minimal number of connections in a cluster.
    pub min_subset_count: usize,
    /// Minimal best connection score in a cluster.
    pub min_subset_score: f32,
    /// Minimal aggregate score of the assembled human.
    pub threshold_human_score: f32,
}

struct Cluster {
    connections: Vec<Connection>,
    endpoints: HashSet<EndpointKey>,
}

impl Cluster {
    fn new(connection: Connection) -> Self {
        Self {
            endpoints: connection.endpoints().iter().copied().collect(),
            connections: vec![connection],
        }
    }

    #[inline]
    fn could_merge(&self, other: &Cluster) -> bool {
        !self.endpoints.is_disjoint(&other.endpoints)
    }

    fn absorb(&mut self, other: Cluster) {
        self.connections.extend(other.connections);
        self.endpoints.extend(other.endpoints);
    }
}

///
/// Partition connections into clusters of transitively shared endpoints.
///
/// Clusters come out ordered by their smallest connection index, and the
/// connections of a cluster keep restart-scan merge order (absorbed clusters
/// are appended). Both strategies give identical output; `UnionFind` only
/// narrows each scan to one connected component.
///
pub fn join_connections(connections: &[Connection], strategy: ClusterStrategy) -> Vec<Vec<Connection>> {
    match strategy {
        ClusterStrategy::RestartScan => restart_scan(connections),
        ClusterStrategy::UnionFind => union_find(connections),
    }
}

fn restart_scan(connections: &[Connection]) -> Vec<Vec<Connection>> {
    let mut clusters: Vec<Option<Cluster>> = connections
        .iter()
        .cloned()
        .map(|c| Some(Cluster::new(c)))
        .collect();

    let labels: Vec<usize> = (0..clusters.len()).collect();

    // fewer than two clusters: nothing to merge
    if let Ok(mut pairs) = CombinatorialIter::combinations(labels, 2) {
        let mut merges = 0;

        while let Some(pair) = pairs.next_indices() {
            let (a, b) = (pair[0], pair[1]);

            let mergeable = match (&clusters[a], &clusters[b]) {
                (Some(ca), Some(cb)) => ca.could_merge(cb),
                _ => false,
            };

            if !mergeable {
                continue;
            }

            if let Some(absorbed) = clusters[b].take() {
                if let Some(target) = clusters[a].as_mut() {
                    target.absorb(absorbed);
                }
            }

            merges += 1;
            pairs.reset();
        }

        log::trace!("restart scan: {} merges over {} connections", merges, connections.len());
    }

    clusters
        .into_iter()
        .flatten()
        .map(|c| c.connections)
        .collect()
}

struct DisjointSet {
    parent: Vec<usize>,
}

impl DisjointSet {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
        }
    }

    fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }

        x
    }

    fn union(&mut self, a: usize, b: usize) {
        let (ra, rb) = (self.find(a), self.find(b));

        // smaller index stays the root
        if ra < rb {
            self.parent[rb] = ra;
        } else if rb < ra {
            self.parent[ra] = rb;
        }
    }
}

fn union_find(connections: &[Connection]) -> Vec<Vec<Connection>> {
    let mut set = DisjointSet::new(connections.len());
    let mut owners: HashMap<EndpointKey, usize> = HashMap::with_capacity(connections.len() * 2);

    for (idx, conn) in connections.iter().enumerate() {
        for key in conn.endpoints().iter() {
            match owners.get(key) {
                Some(&owner) => set.union(owner, idx),
                None => {
                    owners.insert(*key, idx);
                }
            }
        }
    }

    let mut groups: Vec<Vec<Connection>> = Vec::new();
    let mut slot_of_root: HashMap<usize, usize> = HashMap::new();

    for (idx, conn) in connections.iter().enumerate() {
        let root = set.find(idx);
        let slot = *slot_of_root.entry(root).or_insert_with(|| {
            groups.push(Vec::new());
            groups.len() - 1
        });

        groups[slot].push(conn.clone());
    }

    // a component never merges with another one, so scanning it alone
    // reproduces the merge order of the full scan
    groups
        .iter()
        .flat_map(|group| restart_scan(group))
        .collect()
}

///
/// Turn clusters into humans.
///
/// A cluster is dropped when it has fewer than `min_subset_count`
/// connections or its best connection scores below `min_subset_score`; the
/// assembled human is dropped when its score is below `threshold_human_score`.
///
pub fn connections_to_humans(
    clusters: Vec<Vec<Connection>>,
    rows: usize,
    cols: usize,
    norm_padding: NormPadding,
    filter: &ClusterFilter,
) -> Vec<Human> {
    let total = clusters.len();

    let humans: Vec<Human> = clusters
        .into_iter()
        .filter(|conns| conns.len() >= filter.min_subset_count)
        .filter(|conns| {
            let max_score = conns.iter().fold(0.0f32, |acc, c| acc.max(c.score));

            max_score >= filter.min_subset_score
        })
        .map(|conns| Human::from_connections(&conns, rows, cols, norm_padding))
        .filter(|human| human.score() >= filter.threshold_human_score)
        .collect();

    log::debug!("{} clusters, {} humans", total, humans.len());

    humans
}

#[cfg(test)]
fn conn(a: (CocoPart, usize, usize), b: (CocoPart, usize, usize), score: f32) -> Connection {
    Connection {
        parts: [a.0, b.0],
        coords: [Peak::new(a.1, a.2), Peak::new(b.1, b.2)],
        idx: [0, 0],
        part_scores: [0.5, 0.5],
        score,
        samples: 10,
    }
}

#[cfg(test)]
fn membership(clusters: &[Vec<Connection>], all: &[Connection]) -> Vec<Vec<usize>> {
    clusters
        .iter()
        .map(|cluster| {
            let mut ids: Vec<usize> = cluster
                .iter()
                .map(|c| all.iter().position(|x| x == c).unwrap())
                .collect();
            ids.sort();
            ids
        })
        .collect()
}

#[cfg(test)]
fn two_people() -> Vec<Connection> {
    use CocoPart::*;

    vec![
        conn((Neck, 10, 10), (RShoulder, 10, 5), 9.0),
        conn((Neck, 10, 40), (RShoulder, 10, 35), 9.0),
        conn((RShoulder, 10, 5), (RElbow, 16, 4), 8.0),
        conn((Neck, 10, 40), (LShoulder, 10, 45), 8.5),
        conn((RElbow, 16, 4), (RWrist, 22, 4), 7.0),
        conn((Neck, 10, 10), (Nose, 4, 10), 9.5),
        // only joined to the first person through the elbow chain
        conn((RWrist, 22, 4), (RHip, 30, 8), 2.0),
    ]
}

#[test]
fn shared_endpoint_merges_test() {
    use CocoPart::*;

    let conns = vec![
        conn((Neck, 10, 10), (RShoulder, 10, 5), 9.0),
        conn((RShoulder, 10, 5), (RElbow, 16, 4), 8.0),
    ];

    for &strategy in &[ClusterStrategy::RestartScan, ClusterStrategy::UnionFind] {
        let clusters = join_connections(&conns, strategy);
        assert_eq!(clusters.len(), 1);
        assert_eq!(clusters[0].len(), 2);
    }
}

#[test]
fn disjoint_connections_stay_apart_test() {
    use CocoPart::*;

    let conns = vec![
        conn((Neck, 10, 10), (RShoulder, 10, 5), 9.0),
        conn((Neck, 10, 40), (RShoulder, 10, 35), 9.0),
        // same pixel as the first neck but another part type
        conn((Nose, 10, 10), (REye, 8, 8), 9.0),
    ];

    for &strategy in &[ClusterStrategy::RestartScan, ClusterStrategy::UnionFind] {
        let clusters = join_connections(&conns, strategy);
        assert_eq!(membership(&clusters, &conns), vec![vec![0], vec![1], vec![2]]);
    }
}

#[test]
fn transitive_merge_test() {
    let conns = two_people();
    let clusters = join_connections(&conns, ClusterStrategy::RestartScan);

    assert_eq!(membership(&clusters, &conns), vec![vec![0, 2, 4, 5, 6], vec![1, 3]]);
}

#[test]
fn strategies_agree_test() {
    let conns = two_people();

    let scan = join_connections(&conns, ClusterStrategy::RestartScan);
    let uf = join_connections(&conns, ClusterStrategy::UnionFind);

    assert_eq!(membership(&scan, &conns), membership(&uf, &conns));

    // merging in reverse input order must not change membership either
    let reversed: Vec<_> = conns.iter().rev().cloned().collect();
    let mut a = membership(&join_connections(&reversed, ClusterStrategy::RestartScan), &conns);
    let mut b = membership(&join_connections(&reversed, ClusterStrategy::UnionFind), &conns);
    a.sort();
    b.sort();
    assert_eq!(a, b);
    assert_eq!(a, vec![vec![0, 2, 4, 5, 6], vec![1, 3]]);
}

#[test]
fn strategies_build_same_humans_test() {
    use CocoPart::*;

    // the neck appears at two pixels; the last written one depends on merge order
    let conns = vec![
        conn((Neck, 5, 5), (RShoulder, 6, 6), 9.0),
        conn((Neck, 1, 1), (Nose, 0, 1), 9.0),
        conn((Neck, 5, 5), (Nose, 9, 9), 9.0),
        conn((Nose, 0, 1), (REye, 2, 2), 9.0),
        conn((REye, 2, 2), (REar, 3, 3), 9.0),
        conn((RShoulder, 6, 6), (REar, 3, 3), 9.0),
    ];

    let scan = join_connections(&conns, ClusterStrategy::RestartScan);
    let uf = join_connections(&conns, ClusterStrategy::UnionFind);

    assert_eq!(scan, uf);
    assert_eq!(membership(&scan, &conns), vec![vec![0, 1, 2, 3, 4, 5]]);

    let filter = ClusterFilter {
        min_subset_count: 4,
        min_subset_score: 0.8,
        threshold_human_score: 0.4,
    };

    let from_scan = connections_to_humans(scan, 16, 16, NormPadding::identity(), &filter);
    let from_uf = connections_to_humans(uf, 16, 16, NormPadding::identity(), &filter);

    assert_eq!(from_scan, from_uf);
    assert_eq!(from_scan.len(), 1);

    // merge order 0, 2, 5, 4, 3, 1 leaves the neck of the last connection
    let neck = from_scan[0].part(Neck).unwrap();
    assert_eq!(neck.point, Point::new(0.0625, 0.0625));
}

#[test]
fn empty_and_single_input_test() {
    for &strategy in &[ClusterStrategy::RestartScan, ClusterStrategy::UnionFind] {
        assert!(join_connections(&[], strategy).is_empty());

        let one = vec![conn((CocoPart::Neck, 1, 1), (CocoPart::Nose, 0, 1), 1.0)];
        assert_eq!(join_connections(&one, strategy).len(), 1);
    }
}

#[test]
fn cluster_rejection_test() {
    let conns = two_people();
    let clusters = join_connections(&conns, ClusterStrategy::RestartScan);

    let filter = ClusterFilter {
        min_subset_count: 4,
        min_subset_score: 0.8,
        threshold_human_score: 0.4,
    };

    let humans = connections_to_humans(clusters.clone(), 64, 64, NormPadding::identity(), &filter);

    // the two-connection cluster is too small
    assert_eq!(humans.len(), 1);
    assert!(humans[0].has_part(CocoPart::RWrist));
    assert!(!humans[0].has_part(CocoPart::LShoulder));

    let strict = ClusterFilter {
        min_subset_score: 9.6,
        ..filter
    };
    assert!(connections_to_humans(clusters.clone(), 64, 64, NormPadding::identity(), &strict).is_empty());

    let picky = ClusterFilter {
        threshold_human_score: 100.0,
        ..filter
    };
    assert!(connections_to_humans(clusters, 64, 64, NormPadding::identity(), &picky).is_empty());
}
