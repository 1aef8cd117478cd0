use std::collections::{HashMap, HashSet};

use crate::skill_normalizer::{expand_skills, normalize_skill};

/// Filler words stripped before vectorizing skill phrases. Job boards pad
/// requirement lists with these and they carry no signal.
const STOP_WORDS: &[&str] = &[
    "and", "or", "the", "a", "an", "of", "in", "with", "for", "to", "on", "at", "by",
    "experience", "knowledge", "skills", "proficiency",
];

fn is_stop_word(token: &str) -> bool {
    STOP_WORDS.contains(&token)
}

/// Term-frequency vector over the whitespace tokens of a skill list.
fn term_frequencies(skills: &[String]) -> HashMap<String, f64> {
    let mut counts: HashMap<String, f64> = HashMap::new();
    for raw in skills {
        let normalized = normalize_skill(raw);
        for token in normalized.split_whitespace() {
            if is_stop_word(token) {
                continue;
            }
            *counts.entry(token.to_string()).or_insert(0.0) += 1.0;
        }
    }
    counts
}

fn cosine(a: &HashMap<String, f64>, b: &HashMap<String, f64>) -> f64 {
    let dot: f64 = a
        .iter()
        .filter_map(|(token, weight)| b.get(token).map(|other| weight * other))
        .sum();
    let norm_a: f64 = a.values().map(|w| w * w).sum::<f64>().sqrt();
    let norm_b: f64 = b.values().map(|w| w * w).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

/// Plain coverage ratio used when one side degenerates to an empty vector
/// (all tokens were stop words).
fn overlap_ratio(candidate: &[String], job: &[String]) -> f64 {
    let cand: HashSet<String> = candidate.iter().map(|s| normalize_skill(s)).collect();
    let job_set: HashSet<String> = job.iter().map(|s| normalize_skill(s)).collect();
    if job_set.is_empty() {
        return 0.0;
    }
    cand.intersection(&job_set).count() as f64 / job_set.len() as f64
}

/// Text similarity of the raw skill lists plus a synonym-aware coverage
/// bonus of up to 0.2, clamped to [0, 1]. Either list being empty scores 0.
pub fn score_skills(candidate: &[String], job_required: &[String]) -> f64 {
    if candidate.is_empty() || job_required.is_empty() {
        return 0.0;
    }

    let cand_tf = term_frequencies(candidate);
    let job_tf = term_frequencies(job_required);

    let base = if cand_tf.is_empty() || job_tf.is_empty() {
        overlap_ratio(candidate, job_required)
    } else {
        cosine(&cand_tf, &job_tf)
    };

    let expanded_cand = expand_skills(candidate);
    let expanded_job = expand_skills(job_required);
    let bonus = if expanded_job.is_empty() {
        0.0
    } else {
        let covered = expanded_cand.intersection(&expanded_job).count() as f64;
        0.2 * (covered / expanded_job.len() as f64)
    };

    (base + bonus).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn skills(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn identical_skill_sets_score_one() {
        let list = skills(&["python", "docker", "sql"]);
        assert!((score_skills(&list, &list) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn empty_input_scores_zero() {
        assert_eq!(score_skills(&[], &skills(&["python"])), 0.0);
        assert_eq!(score_skills(&skills(&["python"]), &[]), 0.0);
        assert_eq!(score_skills(&[], &[]), 0.0);
    }

    #[test]
    fn disjoint_unknown_skills_score_zero() {
        let cand = skills(&["basket weaving"]);
        let job = skills(&["quantum accounting"]);
        assert_eq!(score_skills(&cand, &job), 0.0);
    }

    #[test]
    fn partial_overlap_with_synonyms_lands_midrange() {
        let cand = skills(&["python", "react"]);
        let job = skills(&["python", "javascript", "aws"]);
        let score = score_skills(&cand, &job);
        assert!(score > 0.2, "score {score} too low");
        assert!(score < 0.6, "score {score} too high");
    }

    #[test]
    fn synonym_coverage_raises_the_score() {
        let job = skills(&["javascript", "docker"]);
        let without = score_skills(&skills(&["rust"]), &job);
        let with = score_skills(&skills(&["react", "kubernetes"]), &job);
        assert!(with > without);
    }

    #[test]
    fn score_is_symmetric_in_casing() {
        let cand = skills(&["Python", "DOCKER"]);
        let job = skills(&["python", "docker"]);
        assert!((score_skills(&cand, &job) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn score_stays_within_bounds() {
        let cand = skills(&["python", "django", "flask", "pandas", "numpy"]);
        let job = skills(&["python"]);
        let score = score_skills(&cand, &job);
        assert!((0.0..=1.0).contains(&score));
    }
}
