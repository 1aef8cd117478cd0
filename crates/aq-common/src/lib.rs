pub mod api;
pub mod config;
pub mod db;
pub mod logging;
pub mod matching;
pub mod queue;
pub mod service;
pub mod skill_normalizer;

use serde::{Deserialize, Serialize};

/// Experience ladder shared by candidate profiles and job requirements.
/// Unknown levels default to `Mid`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    #[serde(alias = "junior")]
    Entry,
    #[default]
    Mid,
    Senior,
    Lead,
    Principal,
}

impl ExperienceLevel {
    pub fn rank(self) -> i32 {
        match self {
            ExperienceLevel::Entry => 1,
            ExperienceLevel::Mid => 2,
            ExperienceLevel::Senior => 3,
            ExperienceLevel::Lead => 4,
            ExperienceLevel::Principal => 5,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ExperienceLevel::Entry => "entry",
            ExperienceLevel::Mid => "mid",
            ExperienceLevel::Senior => "senior",
            ExperienceLevel::Lead => "lead",
            ExperienceLevel::Principal => "principal",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SalaryRange {
    pub min: i64,
    pub max: i64,
}

// Commonly used data models for matching functions. Built fresh per scoring
// call by the caller; the matching code never mutates them.

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateProfile {
    pub skills: Vec<String>,
    pub experience: CandidateExperience,
    pub location: CandidateLocation,
    pub salary_preference: Option<SalaryRange>,
    pub company_preference: CompanyPreference,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateExperience {
    pub years: f64,
    pub level: ExperienceLevel,
    pub titles: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CandidateLocation {
    pub coordinates: Option<(f64, f64)>,
    pub zip_code: Option<String>,
    pub remote_ok: bool,
    pub hybrid_ok: bool,
    pub max_commute_miles: f64,
}

impl Default for CandidateLocation {
    fn default() -> Self {
        Self {
            coordinates: None,
            zip_code: None,
            remote_ok: true,
            hybrid_ok: true,
            max_commute_miles: 30.0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompanyPreference {
    pub preferred_names: Vec<String>,
    pub size: Option<String>,
    pub industry: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobPosting {
    pub id: String,
    pub required_skills: Vec<String>,
    pub experience_requirement: ExperienceRequirement,
    pub location: JobLocation,
    pub salary_range: Option<SalaryRange>,
    pub company: Company,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExperienceRequirement {
    pub min_years: f64,
    pub max_years: f64,
    pub level: ExperienceLevel,
    pub title_hint: Option<String>,
}

impl Default for ExperienceRequirement {
    fn default() -> Self {
        Self {
            min_years: 0.0,
            max_years: 100.0,
            level: ExperienceLevel::Mid,
            title_hint: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobLocation {
    pub coordinates: Option<(f64, f64)>,
    pub zip_code: Option<String>,
    pub remote: bool,
    pub hybrid: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub name: String,
    pub size: Option<String>,
    pub industry: Option<String>,
    pub rating: Option<f64>,
}
