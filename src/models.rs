use chrono::{DateTime, Datelike, NaiveDate, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::risk::RiskLevel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Gender {
    Male,
    Female,
    Unknown,
}

impl Gender {
    /// Categorizes a free-form gender value. Unrecognized values map to
    /// `Unknown`.
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_lowercase().as_str() {
            "m" | "masculin" | "male" => Gender::Male,
            "f" | "féminin" | "female" => Gender::Female,
            _ => Gender::Unknown,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatientRecord {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub gender: String,
}

impl PatientRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Calendar-year age: `today`'s year minus the birth year, so it can run
    /// up to a year ahead of the exact elapsed age.
    pub fn age_on(&self, today: NaiveDate) -> i32 {
        match self.birth_date {
            Some(birth_date) => today.year() - birth_date.year(),
            None => 0,
        }
    }

    pub fn snapshot_on(&self, today: NaiveDate) -> PatientSnapshot {
        PatientSnapshot {
            age: self.age_on(today),
            gender: Gender::parse(&self.gender),
        }
    }
}

/// Demographics the classifier consumes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatientSnapshot {
    pub age: i32,
    pub gender: Gender,
}

#[derive(Debug, Clone)]
pub struct Note {
    pub id: Uuid,
    pub patient_id: i64,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AssessmentResult {
    pub patient_id: i64,
    pub patient_name: String,
    pub patient_age: i32,
    pub patient_gender: String,
    pub risk_level: RiskLevel,
    pub risk_description: &'static str,
    pub trigger_term_count: usize,
    pub matched_terms: Vec<String>,
    pub assessed_at: DateTime<Utc>,
}
