use serde::{Deserialize, Serialize};

use crate::matching::location::score_location;
use crate::matching::skills::score_skills;
use crate::matching::weights::{Weights, WeightsError};
use crate::{CandidateProfile, Company, ExperienceRequirement, JobPosting, SalaryRange};

/// Title ladders used for the related-title credit in experience scoring.
/// Titles from the same ladder count as adjacent even when neither string
/// contains the other.
const JOB_FAMILIES: &[&[&str]] = &[
    &[
        "junior software engineer",
        "software engineer",
        "senior software engineer",
        "lead software engineer",
        "principal engineer",
    ],
    &[
        "junior data scientist",
        "data scientist",
        "senior data scientist",
        "lead data scientist",
        "principal data scientist",
    ],
    &[
        "associate product manager",
        "product manager",
        "senior product manager",
        "director of product",
        "vp of product",
    ],
    &[
        "junior designer",
        "designer",
        "senior designer",
        "lead designer",
        "design director",
    ],
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum QualityLabel {
    Excellent,
    VeryGood,
    Good,
    Fair,
    Poor,
    VeryPoor,
}

impl QualityLabel {
    pub fn from_score(score: f64) -> Self {
        if score >= 0.9 {
            Self::Excellent
        } else if score >= 0.8 {
            Self::VeryGood
        } else if score >= 0.7 {
            Self::Good
        } else if score >= 0.6 {
            Self::Fair
        } else if score >= 0.5 {
            Self::Poor
        } else {
            Self::VeryPoor
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Excellent => "excellent",
            Self::VeryGood => "very good",
            Self::Good => "good",
            Self::Fair => "fair",
            Self::Poor => "poor",
            Self::VeryPoor => "very poor",
        }
    }
}

/// Per-factor sub-scores, each in [0, 1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub skills: f64,
    pub experience: f64,
    pub location: f64,
    pub salary: f64,
    pub company: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResult {
    pub job_id: String,
    pub overall_score: f64,
    pub breakdown: ScoreBreakdown,
    pub quality: QualityLabel,
}

/// Scores a (candidate, job) pair as a weighted sum of five factor scores.
/// Weights are taken as given; no normalization is applied, so weights
/// summing past 1.0 can push the overall score past 1.0.
#[derive(Debug, Clone)]
pub struct MatchScorer {
    weights: Weights,
}

impl MatchScorer {
    pub fn new(weights: Weights) -> Result<Self, WeightsError> {
        weights.validate()?;
        Ok(Self { weights })
    }

    pub fn with_default_weights() -> Self {
        Self {
            weights: Weights::default(),
        }
    }

    pub fn weights(&self) -> &Weights {
        &self.weights
    }

    pub fn score(&self, candidate: &CandidateProfile, job: &JobPosting) -> MatchResult {
        let breakdown = ScoreBreakdown {
            skills: score_skills(&candidate.skills, &job.required_skills),
            experience: score_experience(candidate, &job.experience_requirement),
            location: score_location(&candidate.location, &job.location),
            salary: score_salary(candidate.salary_preference.as_ref(), job.salary_range.as_ref()),
            company: score_company(candidate, &job.company),
        };

        let overall_score = breakdown.skills * self.weights.skills
            + breakdown.experience * self.weights.experience
            + breakdown.location * self.weights.location
            + breakdown.salary * self.weights.salary
            + breakdown.company * self.weights.company;

        MatchResult {
            job_id: job.id.clone(),
            overall_score,
            breakdown,
            quality: QualityLabel::from_score(overall_score),
        }
    }
}

fn years_credit(candidate_years: f64, requirement: &ExperienceRequirement) -> f64 {
    if candidate_years >= requirement.min_years && candidate_years <= requirement.max_years {
        0.4
    } else if candidate_years >= requirement.min_years {
        let excess = candidate_years - requirement.max_years;
        let penalty = (excess * 0.05).min(0.2);
        (0.4 - penalty).max(0.2)
    } else {
        let shortfall = requirement.min_years - candidate_years;
        let penalty = (shortfall * 0.1).min(0.4);
        (0.4 - penalty).max(0.0)
    }
}

fn same_family(a: &str, b: &str) -> bool {
    JOB_FAMILIES.iter().any(|family| {
        family.iter().any(|title| a.contains(title)) && family.iter().any(|title| b.contains(title))
    })
}

fn title_credit(candidate_titles: &[String], title_hint: Option<&str>) -> f64 {
    let hint = match title_hint {
        Some(hint) if !hint.trim().is_empty() => hint.to_lowercase(),
        _ => return 0.0,
    };

    let mut credit: f64 = 0.0;
    for raw in candidate_titles {
        let title = raw.to_lowercase();
        if title.contains(&hint) || hint.contains(&title) {
            return 0.3;
        }
        if same_family(&title, &hint) {
            credit = credit.max(0.2);
        }
    }
    credit
}

fn score_experience(candidate: &CandidateProfile, requirement: &ExperienceRequirement) -> f64 {
    let mut score = years_credit(candidate.experience.years, requirement);

    let level_gap = candidate
        .experience
        .level
        .rank()
        .abs_diff(requirement.level.rank());
    score += match level_gap {
        0 => 0.3,
        1 => 0.2,
        2 => 0.1,
        _ => 0.0,
    };

    score += title_credit(
        &candidate.experience.titles,
        requirement.title_hint.as_deref(),
    );

    score.min(1.0)
}

fn score_salary(preference: Option<&SalaryRange>, job: Option<&SalaryRange>) -> f64 {
    let job = match job {
        Some(range) => range,
        None => return 0.5,
    };
    let pref = match preference {
        Some(range) => range,
        None => return 0.5,
    };

    let overlap_start = pref.min.max(job.min);
    let overlap_end = pref.max.min(job.max);

    if overlap_start <= overlap_end {
        let pref_width = pref.max - pref.min;
        if pref_width == 0 {
            return if job.min >= pref.min { 1.0 } else { 0.0 };
        }
        let ratio = (overlap_end - overlap_start) as f64 / pref_width as f64;
        ratio.min(1.0)
    } else if job.max < pref.min {
        // Job pays below the candidate's floor.
        let gap = (pref.min - job.max) as f64;
        let penalty = (gap / pref.min as f64).min(0.5);
        (0.5 - penalty).max(0.0)
    } else {
        // Entirely above the candidate's range.
        0.8
    }
}

fn score_company(candidate: &CandidateProfile, company: &Company) -> f64 {
    let mut score: f64 = 0.5;

    let company_name = company.name.to_lowercase();
    let preferred = candidate
        .company_preference
        .preferred_names
        .iter()
        .any(|name| {
            let name = name.to_lowercase();
            !name.is_empty() && company_name.contains(&name)
        });
    if preferred {
        score += 0.3;
    }

    if let (Some(wanted), Some(actual)) = (
        candidate.company_preference.size.as_deref(),
        company.size.as_deref(),
    ) {
        if !wanted.is_empty() && wanted.eq_ignore_ascii_case(actual) {
            score += 0.1;
        }
    }

    if let (Some(wanted), Some(actual)) = (
        candidate.company_preference.industry.as_deref(),
        company.industry.as_deref(),
    ) {
        if !wanted.is_empty() && actual.to_lowercase().contains(&wanted.to_lowercase()) {
            score += 0.1;
        }
    }

    if let Some(rating) = company.rating {
        if rating >= 4.5 {
            score += 0.1;
        } else if rating >= 4.0 {
            score += 0.05;
        }
    }

    score.min(1.0)
}
