use std::collections::{BTreeSet, HashMap};
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

const EMBEDDING_DIM: usize = 64;
const COSINE_WEIGHT: f32 = 0.6;
const LEXICAL_WEIGHT: f32 = 0.4;
const STOPWORDS: &[&str] = &[
    "a", "an", "and", "the", "of", "for", "to", "with", "in", "on", "me", "please", "some",
];

#[derive(Debug, Clone, PartialEq)]
pub struct WorkflowCandidate {
    pub name: String,
    pub phrases: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScorerError {
    #[error("similarity scorer timed out after {0:?}")]
    Timeout(Duration),
    #[error("similarity scorer failed: {0}")]
    Failed(String),
}

/// Seam for the external embedding collaborator. Scores should fall in
/// `[0, 1]`; candidates missing from the ranking count as zero.
pub trait SimilarityScorer: Send + Sync {
    fn rank(
        &self,
        goal: &str,
        candidates: &[WorkflowCandidate],
    ) -> Result<Vec<(String, f32)>, ScorerError>;
}

/// Deterministic stand-in used when no embedder is attached: hashed
/// bag-of-words cosine blended with BM25 term coverage.
#[derive(Debug, Clone, Copy, Default)]
pub struct LexicalScorer;

impl LexicalScorer {
    pub fn score_phrase(&self, goal: &str, phrase: &str) -> f32 {
        let query = tokenize(goal);
        let doc = tokenize(phrase);
        if query.is_empty() || doc.is_empty() {
            return 0.0;
        }
        let cosine = match (embed(&query), embed(&doc)) {
            (Some(left), Some(right)) => left
                .iter()
                .zip(&right)
                .map(|(a, b)| a * b)
                .sum::<f32>()
                .max(0.0),
            _ => 0.0,
        };
        let unique_doc = doc.iter().cloned().collect::<BTreeSet<_>>();
        let unique_doc = unique_doc.into_iter().collect::<Vec<_>>();
        let ceiling = bm25_score(&unique_doc, &doc);
        let coverage = if ceiling > 0.0 {
            (bm25_score(&query, &doc) / ceiling).min(1.0)
        } else {
            0.0
        };
        (COSINE_WEIGHT * cosine + LEXICAL_WEIGHT * coverage).clamp(0.0, 1.0)
    }
}

impl SimilarityScorer for LexicalScorer {
    fn rank(
        &self,
        goal: &str,
        candidates: &[WorkflowCandidate],
    ) -> Result<Vec<(String, f32)>, ScorerError> {
        Ok(candidates
            .iter()
            .map(|candidate| {
                let best = candidate
                    .phrases
                    .iter()
                    .map(|phrase| self.score_phrase(goal, phrase))
                    .fold(0.0_f32, f32::max);
                (candidate.name.clone(), best)
            })
            .collect())
    }
}

/// Runs a scorer on a worker thread and gives up after `timeout`. A scorer
/// that overruns keeps its thread until it returns; its answer is dropped.
#[derive(Clone)]
pub struct BoundedScorer {
    inner: Arc<dyn SimilarityScorer>,
    timeout: Duration,
}

impl std::fmt::Debug for BoundedScorer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoundedScorer")
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl BoundedScorer {
    pub fn new(inner: Arc<dyn SimilarityScorer>, timeout: Duration) -> Self {
        Self { inner, timeout }
    }
}

impl SimilarityScorer for BoundedScorer {
    fn rank(
        &self,
        goal: &str,
        candidates: &[WorkflowCandidate],
    ) -> Result<Vec<(String, f32)>, ScorerError> {
        let (sender, receiver) = mpsc::channel();
        let inner = Arc::clone(&self.inner);
        let goal = goal.to_string();
        let candidates = candidates.to_vec();
        thread::Builder::new()
            .name("similarity-scorer".to_string())
            .spawn(move || {
                let _ = sender.send(inner.rank(&goal, &candidates));
            })
            .map_err(|err| ScorerError::Failed(format!("failed to spawn scorer thread: {err}")))?;

        match receiver.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(mpsc::RecvTimeoutError::Timeout) => Err(ScorerError::Timeout(self.timeout)),
            Err(mpsc::RecvTimeoutError::Disconnected) => Err(ScorerError::Failed(
                "scorer thread exited without a result".to_string(),
            )),
        }
    }
}

fn tokenize(input: &str) -> Vec<String> {
    input
        .to_ascii_lowercase()
        .replace('\'', "")
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|token| !token.is_empty() && !STOPWORDS.contains(token))
        .map(str::to_string)
        .collect()
}

fn bm25_score(query: &[String], doc: &[String]) -> f32 {
    if query.is_empty() || doc.is_empty() {
        return 0.0;
    }
    let mut term_counts = HashMap::<&str, usize>::new();
    for token in doc {
        *term_counts.entry(token.as_str()).or_default() += 1;
    }
    let doc_len = doc.len() as f32;
    let avg_doc_len = 8.0_f32;
    let k1 = 1.2_f32;
    let b = 0.75_f32;

    query
        .iter()
        .map(|term| {
            let tf = term_counts.get(term.as_str()).copied().unwrap_or(0) as f32;
            if tf == 0.0 {
                return 0.0;
            }
            (tf * (k1 + 1.0)) / (tf + k1 * (1.0 - b + b * (doc_len / avg_doc_len)))
        })
        .sum()
}

fn embed(tokens: &[String]) -> Option<Vec<f32>> {
    let mut out = vec![0.0_f32; EMBEDDING_DIM];
    for token in tokens {
        let hash = stable_hash(token.as_bytes());
        let idx = (hash as usize) % EMBEDDING_DIM;
        let sign = if hash & 1 == 0 { 1.0_f32 } else { -1.0_f32 };
        let mag = 1.0_f32 + (token.len() as f32 / 32.0_f32);
        out[idx] += sign * mag;
    }
    let norm = out.iter().map(|value| value * value).sum::<f32>().sqrt();
    if norm <= f32::EPSILON {
        return None;
    }
    for value in &mut out {
        *value /= norm;
    }
    Some(out)
}

fn stable_hash(bytes: &[u8]) -> u64 {
    let mut hash = 0xcbf29ce484222325_u64;
    for byte in bytes {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(0x100000001b3_u64);
    }
    hash
}
