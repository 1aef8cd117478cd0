use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use tracing::instrument;

use crate::matching::scoring::{MatchResult, MatchScorer};
use crate::{CandidateProfile, JobPosting};

/// Fixed-template explanation of a single match. No free text generation,
/// just score-band lookups per factor.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchExplanation {
    pub job_id: String,
    pub overall_assessment: String,
    pub skills: String,
    pub experience: String,
    pub location: String,
}

/// Ranks job postings for a candidate using a configured scorer.
#[derive(Debug, Clone)]
pub struct RankingService {
    scorer: MatchScorer,
}

impl RankingService {
    pub fn new(scorer: MatchScorer) -> Self {
        Self { scorer }
    }

    /// Score every job and return the top `limit` results, best first.
    /// Ties keep the input order of the job list.
    #[instrument(skip_all, fields(jobs = jobs.len(), limit))]
    pub fn rank(
        &self,
        candidate: &CandidateProfile,
        jobs: &[JobPosting],
        limit: usize,
    ) -> Vec<MatchResult> {
        let mut results: Vec<MatchResult> = jobs
            .iter()
            .map(|job| self.scorer.score(candidate, job))
            .collect();

        // Vec::sort_by is stable, so equal scores preserve input order.
        results.sort_by(|a, b| {
            b.overall_score
                .partial_cmp(&a.overall_score)
                .unwrap_or(Ordering::Equal)
        });
        results.truncate(limit);
        results
    }

    pub fn explain(&self, candidate: &CandidateProfile, job: &JobPosting) -> MatchExplanation {
        let result = self.scorer.score(candidate, job);

        let skills = if result.breakdown.skills >= 0.8 {
            "Your skills are an excellent match for this role's requirements."
        } else if result.breakdown.skills >= 0.6 {
            "Your skills align well with most of the job requirements."
        } else if result.breakdown.skills >= 0.4 {
            "You have some relevant skills, but may need to develop additional ones."
        } else {
            "This role requires skills that don't closely match your current skillset."
        };

        let experience = if result.breakdown.experience >= 0.8 {
            "Your experience level is perfectly suited for this position."
        } else if result.breakdown.experience >= 0.6 {
            "Your experience is a good fit for this role."
        } else if result.breakdown.experience >= 0.4 {
            "You may be slightly under or over-qualified for this position."
        } else {
            "There's a significant mismatch between your experience and the role requirements."
        };

        let location = if result.breakdown.location >= 0.9 {
            "The job location is ideal for your preferences."
        } else if result.breakdown.location >= 0.7 {
            "The location works well with your preferences."
        } else if result.breakdown.location >= 0.5 {
            "The location is acceptable but may require some commuting."
        } else {
            "The location may not be convenient for your situation."
        };

        MatchExplanation {
            job_id: result.job_id,
            overall_assessment: format!(
                "This job is a {} match with a score of {:.1}%",
                result.quality.as_str(),
                result.overall_score * 100.0
            ),
            skills: skills.to_string(),
            experience: experience.to_string(),
            location: location.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        CandidateExperience, CandidateLocation, Company, CompanyPreference, ExperienceLevel,
        ExperienceRequirement, JobLocation,
    };

    fn candidate() -> CandidateProfile {
        CandidateProfile {
            skills: vec!["python".into(), "docker".into()],
            experience: CandidateExperience {
                years: 5.0,
                level: ExperienceLevel::Senior,
                titles: vec!["Software Engineer".into()],
            },
            location: CandidateLocation::default(),
            salary_preference: None,
            company_preference: CompanyPreference::default(),
        }
    }

    fn job(id: &str, skills: &[&str], remote: bool) -> JobPosting {
        JobPosting {
            id: id.into(),
            required_skills: skills.iter().map(|s| s.to_string()).collect(),
            experience_requirement: ExperienceRequirement::default(),
            location: JobLocation {
                coordinates: None,
                zip_code: None,
                remote,
                hybrid: false,
            },
            salary_range: None,
            company: Company {
                name: "Acme".into(),
                size: None,
                industry: None,
                rating: None,
            },
        }
    }

    fn service() -> RankingService {
        RankingService::new(MatchScorer::with_default_weights())
    }

    #[test]
    fn rank_sorts_descending_and_truncates() {
        let jobs = vec![
            job("weak", &["cobol", "fortran"], false),
            job("strong", &["python", "docker"], true),
            job("medium", &["python", "erlang"], true),
        ];
        let ranked = service().rank(&candidate(), &jobs, 2);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].job_id, "strong");
        assert_eq!(ranked[1].job_id, "medium");
        assert!(ranked[0].overall_score >= ranked[1].overall_score);
    }

    #[test]
    fn ties_preserve_input_order() {
        let jobs = vec![
            job("first", &["python", "docker"], true),
            job("second", &["python", "docker"], true),
            job("third", &["python", "docker"], true),
        ];
        let ranked = service().rank(&candidate(), &jobs, 10);
        let ids: Vec<&str> = ranked.iter().map(|r| r.job_id.as_str()).collect();
        assert_eq!(ids, vec!["first", "second", "third"]);
    }

    #[test]
    fn rank_with_empty_job_list_is_empty() {
        assert!(service().rank(&candidate(), &[], 5).is_empty());
    }

    #[test]
    fn explanation_uses_the_quality_label() {
        let explanation = service().explain(&candidate(), &job("j", &["python", "docker"], true));
        assert!(explanation.overall_assessment.starts_with("This job is a"));
        assert!(explanation.overall_assessment.contains("match with a score of"));
        assert_eq!(explanation.job_id, "j");
    }
}
