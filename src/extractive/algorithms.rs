//! Sentence scoring algorithms
//!
//! Each scorer returns one score per sentence, or a reason the document
//! cannot be ranked by that algorithm.

use super::graph::{PageRank, SentenceGraph};
use super::sentences::Sentence;
use super::ExtractiveAlgorithm;
use rustc_hash::{FxHashMap, FxHashSet};

/// Cosine threshold for a LexRank edge
const LEXRANK_THRESHOLD: f64 = 0.1;

/// Upper bound on LSA topic dimensions
const LSA_MAX_DIMENSIONS: usize = 10;

/// Largest gap between significant words inside one Luhn cluster
const LUHN_MAX_GAP: usize = 4;

pub(crate) type ScoreResult = Result<Vec<f64>, &'static str>;

pub(crate) fn score(algorithm: ExtractiveAlgorithm, sentences: &[Sentence]) -> ScoreResult {
    match sentences.len() {
        0 => return Ok(Vec::new()),
        1 => return Ok(vec![1.0]),
        _ => {}
    }
    if sentences.iter().all(|s| s.terms.is_empty()) {
        return Err("no content words");
    }

    let scores = match algorithm {
        ExtractiveAlgorithm::TextRank => textrank(sentences)?,
        ExtractiveAlgorithm::LexRank => lexrank(sentences)?,
        ExtractiveAlgorithm::Lsa => lsa(sentences)?,
        ExtractiveAlgorithm::Luhn => luhn(sentences)?,
    };

    if scores.iter().any(|s| !s.is_finite()) {
        return Err("non-finite sentence score");
    }
    Ok(scores)
}

/// Word-overlap similarity graph ranked with PageRank
fn textrank(sentences: &[Sentence]) -> ScoreResult {
    let sets: Vec<FxHashSet<&str>> = sentences
        .iter()
        .map(|s| s.terms.iter().map(String::as_str).collect())
        .collect();

    let graph = SentenceGraph::build(sets.len(), |i, j| {
        let (a, b) = (&sets[i], &sets[j]);
        if a.is_empty() || b.is_empty() {
            return 0.0;
        }
        let common = a.intersection(b).count() as f64;
        let norm = (a.len() as f64).ln() + (b.len() as f64).ln();
        if common == 0.0 || norm <= 0.0 {
            0.0
        } else {
            common / norm
        }
    });

    if !graph.has_edges() {
        return Err("no shared vocabulary between sentences");
    }
    Ok(PageRank::default().run(&graph))
}

/// Thresholded tf-idf cosine graph ranked with PageRank
fn lexrank(sentences: &[Sentence]) -> ScoreResult {
    let n = sentences.len() as f64;
    let mut document_frequency: FxHashMap<&str, usize> = FxHashMap::default();
    for sentence in sentences {
        let unique: FxHashSet<&str> = sentence.terms.iter().map(String::as_str).collect();
        for term in unique {
            *document_frequency.entry(term).or_default() += 1;
        }
    }

    let vectors: Vec<FxHashMap<&str, f64>> = sentences
        .iter()
        .map(|s| {
            let counts = term_counts(&s.terms);
            let max_tf = counts.values().copied().max().unwrap_or(1) as f64;
            counts
                .into_iter()
                .map(|(term, tf)| {
                    let idf = (n / document_frequency[term] as f64).ln();
                    (term, tf as f64 / max_tf * idf)
                })
                .collect()
        })
        .collect();
    let norms: Vec<f64> = vectors
        .iter()
        .map(|v| v.values().map(|x| x * x).sum::<f64>().sqrt())
        .collect();

    let graph = SentenceGraph::build(vectors.len(), |i, j| {
        if norms[i] == 0.0 || norms[j] == 0.0 {
            return 0.0;
        }
        let cosine = dot(&vectors[i], &vectors[j]) / (norms[i] * norms[j]);
        if cosine >= LEXRANK_THRESHOLD {
            1.0
        } else {
            0.0
        }
    });

    if !graph.has_edges() {
        return Err("no sentence pair above the similarity threshold");
    }
    Ok(PageRank::default().with_max_iterations(200).run(&graph))
}

/// Topic strength from the leading singular directions of the term/sentence matrix
///
/// Eigenpairs of the sentence Gram matrix give the squared singular values and
/// right singular vectors; a sentence scores `sqrt(sum(sigma^2 * v^2))`.
fn lsa(sentences: &[Sentence]) -> ScoreResult {
    let n = sentences.len();
    let counts: Vec<FxHashMap<&str, usize>> =
        sentences.iter().map(|s| term_counts(&s.terms)).collect();

    let mut gram = vec![0.0; n * n];
    for i in 0..n {
        for j in i..n {
            let g: f64 = counts[i]
                .iter()
                .filter_map(|(term, &a)| counts[j].get(term).map(|&b| (a * b) as f64))
                .sum();
            gram[i * n + j] = g;
            gram[j * n + i] = g;
        }
    }

    let mut scores = vec![0.0; n];
    let mut found = 0;
    for _ in 0..n.min(LSA_MAX_DIMENSIONS) {
        let Some((lambda, v)) = dominant_eigenpair(&gram, n) else {
            break;
        };
        for (score, component) in scores.iter_mut().zip(&v) {
            *score += lambda * component * component;
        }
        for i in 0..n {
            for j in 0..n {
                gram[i * n + j] -= lambda * v[i] * v[j];
            }
        }
        found += 1;
    }

    if found == 0 {
        return Err("term matrix has no rank");
    }
    Ok(scores.into_iter().map(f64::sqrt).collect())
}

fn dominant_eigenpair(matrix: &[f64], n: usize) -> Option<(f64, Vec<f64>)> {
    let mut v: Vec<f64> = (0..n).map(|j| 1.0 + j as f64 * 1e-3).collect();
    normalize(&mut v);
    let mut lambda = 0.0;

    for _ in 0..100 {
        let mut w: Vec<f64> = (0..n)
            .map(|i| (0..n).map(|j| matrix[i * n + j] * v[j]).sum())
            .collect();
        let norm = normalize(&mut w);
        if norm < 1e-10 {
            return None;
        }
        let converged = (norm - lambda).abs() < 1e-9 * norm.max(1.0);
        lambda = norm;
        v = w;
        if converged {
            break;
        }
    }
    (lambda > 1e-10).then_some((lambda, v))
}

/// Densest cluster of recurring significant words per sentence
fn luhn(sentences: &[Sentence]) -> ScoreResult {
    let mut frequency: FxHashMap<&str, usize> = FxHashMap::default();
    for sentence in sentences {
        for term in &sentence.terms {
            *frequency.entry(term.as_str()).or_default() += 1;
        }
    }
    let significant: FxHashSet<&str> = frequency
        .into_iter()
        .filter(|&(_, count)| count > 1)
        .map(|(term, _)| term)
        .collect();
    if significant.is_empty() {
        return Err("no recurring significant words");
    }

    Ok(sentences
        .iter()
        .map(|sentence| {
            let hits: Vec<usize> = sentence
                .terms
                .iter()
                .enumerate()
                .filter(|(_, t)| significant.contains(t.as_str()))
                .map(|(i, _)| i)
                .collect();
            best_cluster(&hits)
        })
        .collect())
}

fn best_cluster(hits: &[usize]) -> f64 {
    let Some(&first) = hits.first() else {
        return 0.0;
    };
    let mut best = 0.0f64;
    let (mut start, mut last, mut count) = (first, first, 1usize);
    for &pos in &hits[1..] {
        if pos - last > LUHN_MAX_GAP {
            best = best.max((count * count) as f64 / (last - start + 1) as f64);
            start = pos;
            count = 0;
        }
        last = pos;
        count += 1;
    }
    best.max((count * count) as f64 / (last - start + 1) as f64)
}

fn term_counts(terms: &[String]) -> FxHashMap<&str, usize> {
    let mut counts = FxHashMap::default();
    for term in terms {
        *counts.entry(term.as_str()).or_default() += 1;
    }
    counts
}

fn dot(a: &FxHashMap<&str, f64>, b: &FxHashMap<&str, f64>) -> f64 {
    let (small, large) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    small
        .iter()
        .filter_map(|(term, x)| large.get(term).map(|y| x * y))
        .sum()
}

fn normalize(v: &mut [f64]) -> f64 {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm > 0.0 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    norm
}
