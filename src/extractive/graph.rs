//! Sentence similarity graphs and PageRank power iteration

/// Weighted sentence graph in compressed sparse row form
///
/// Node `i`'s edges live at `row_ptr[i]..row_ptr[i + 1]` of `col_idx` and
/// `weights`. Only positive finite similarities become edges.
#[derive(Debug, Clone)]
pub struct SentenceGraph {
    row_ptr: Vec<usize>,
    col_idx: Vec<u32>,
    weights: Vec<f64>,
    total_weight: Vec<f64>,
}

impl SentenceGraph {
    /// Build a symmetric graph from a pairwise similarity function
    pub fn build(n: usize, similarity: impl Fn(usize, usize) -> f64) -> Self {
        let mut adjacency: Vec<Vec<(u32, f64)>> = vec![Vec::new(); n];
        for i in 0..n {
            for j in (i + 1)..n {
                let w = similarity(i, j);
                if w > 0.0 && w.is_finite() {
                    adjacency[i].push((j as u32, w));
                    adjacency[j].push((i as u32, w));
                }
            }
        }

        let edges: usize = adjacency.iter().map(Vec::len).sum();
        let mut row_ptr = Vec::with_capacity(n + 1);
        let mut col_idx = Vec::with_capacity(edges);
        let mut weights = Vec::with_capacity(edges);
        let mut total_weight = Vec::with_capacity(n);

        row_ptr.push(0);
        for mut row in adjacency {
            row.sort_unstable_by_key(|&(target, _)| target);
            total_weight.push(row.iter().map(|&(_, w)| w).sum());
            for (target, w) in row {
                col_idx.push(target);
                weights.push(w);
            }
            row_ptr.push(col_idx.len());
        }

        Self {
            row_ptr,
            col_idx,
            weights,
            total_weight,
        }
    }

    pub fn num_nodes(&self) -> usize {
        self.total_weight.len()
    }

    pub fn num_edges(&self) -> usize {
        self.col_idx.len()
    }

    /// Neighbors of `node` with their edge weights
    fn neighbors(&self, node: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.row_ptr[node]..self.row_ptr[node + 1];
        self.col_idx[range.clone()]
            .iter()
            .zip(&self.weights[range])
            .map(|(&target, &w)| (target as usize, w))
    }

    /// Whether at least one edge exists
    pub fn has_edges(&self) -> bool {
        !self.col_idx.is_empty()
    }
}

/// PageRank with dangling-node redistribution
#[derive(Debug, Clone)]
pub struct PageRank {
    /// Damping factor (typically 0.85)
    pub damping: f64,
    /// Maximum number of iterations
    pub max_iterations: usize,
    /// Convergence threshold on the L1 delta
    pub threshold: f64,
}

impl Default for PageRank {
    fn default() -> Self {
        Self {
            damping: 0.85,
            max_iterations: 100,
            threshold: 1e-6,
        }
    }
}

impl PageRank {
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    /// Run power iteration, returning scores that sum to one
    pub fn run(&self, graph: &SentenceGraph) -> Vec<f64> {
        let n = graph.num_nodes();
        if n == 0 {
            return Vec::new();
        }

        let teleport = (1.0 - self.damping) / n as f64;
        let mut scores = vec![1.0 / n as f64; n];
        let mut next = vec![0.0; n];
        let mut iterations = 0;
        let mut delta = f64::MAX;

        while iterations < self.max_iterations && delta > self.threshold {
            iterations += 1;

            let dangling_mass: f64 = (0..n)
                .filter(|&i| graph.total_weight[i] <= 0.0)
                .map(|i| scores[i])
                .sum();
            next.fill(teleport + self.damping * dangling_mass / n as f64);

            for (node, &score) in scores.iter().enumerate() {
                let total = graph.total_weight[node];
                if total <= 0.0 {
                    continue;
                }
                for (neighbor, w) in graph.neighbors(node) {
                    next[neighbor] += self.damping * score * w / total;
                }
            }

            delta = scores.iter().zip(&next).map(|(a, b)| (a - b).abs()).sum();
            std::mem::swap(&mut scores, &mut next);
        }

        let sum: f64 = scores.iter().sum();
        if sum > 0.0 {
            scores.iter_mut().for_each(|s| *s /= sum);
        }
        scores
    }
}
