use std::fmt;

use serde::Serialize;

use crate::models::Gender;

/// Patients at or under this age use the young-patient rows.
pub const YOUNG_AGE_LIMIT: i32 = 30;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum RiskLevel {
    #[serde(rename = "None")]
    None,
    #[serde(rename = "Borderline")]
    Borderline,
    #[serde(rename = "In Danger")]
    InDanger,
    #[serde(rename = "Early onset")]
    EarlyOnset,
}

impl RiskLevel {
    pub const ALL: [RiskLevel; 4] = [
        RiskLevel::None,
        RiskLevel::Borderline,
        RiskLevel::InDanger,
        RiskLevel::EarlyOnset,
    ];

    pub fn code(self) -> &'static str {
        match self {
            RiskLevel::None => "None",
            RiskLevel::Borderline => "Borderline",
            RiskLevel::InDanger => "In Danger",
            RiskLevel::EarlyOnset => "Early onset",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            RiskLevel::None => "No risk",
            RiskLevel::Borderline => "Limited risk",
            RiskLevel::InDanger => "In danger",
            RiskLevel::EarlyOnset => "Early onset expected",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgeBand {
    Any,
    UpTo30,
    Over30,
}

impl AgeBand {
    pub fn contains(self, age: i32) -> bool {
        match self {
            AgeBand::Any => true,
            AgeBand::UpTo30 => age <= YOUNG_AGE_LIMIT,
            AgeBand::Over30 => age > YOUNG_AGE_LIMIT,
        }
    }
}

/// One row of the decision table. Count bounds are inclusive; `max_terms`
/// of `None` means unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RiskRule {
    pub band: AgeBand,
    pub gender: Option<Gender>,
    pub min_terms: usize,
    pub max_terms: Option<usize>,
    pub level: RiskLevel,
}

impl RiskRule {
    const fn new(
        band: AgeBand,
        gender: Option<Gender>,
        min_terms: usize,
        max_terms: Option<usize>,
        level: RiskLevel,
    ) -> Self {
        Self {
            band,
            gender,
            min_terms,
            max_terms,
            level,
        }
    }

    pub fn matches(&self, age: i32, gender: Gender, term_count: usize) -> bool {
        self.band.contains(age)
            && self.gender.map_or(true, |required| required == gender)
            && term_count >= self.min_terms
            && self.max_terms.map_or(true, |max| term_count <= max)
    }
}

/// Evaluated top to bottom; the first matching row wins.
pub const RULES: [RiskRule; 9] = [
    RiskRule::new(AgeBand::Any, None, 0, Some(0), RiskLevel::None),
    RiskRule::new(AgeBand::Over30, None, 2, Some(5), RiskLevel::Borderline),
    RiskRule::new(AgeBand::Over30, None, 6, Some(7), RiskLevel::InDanger),
    RiskRule::new(AgeBand::Over30, None, 8, None, RiskLevel::EarlyOnset),
    RiskRule::new(AgeBand::UpTo30, Some(Gender::Male), 3, Some(4), RiskLevel::InDanger),
    RiskRule::new(AgeBand::UpTo30, Some(Gender::Male), 5, None, RiskLevel::EarlyOnset),
    RiskRule::new(AgeBand::UpTo30, Some(Gender::Female), 4, Some(6), RiskLevel::InDanger),
    RiskRule::new(AgeBand::UpTo30, Some(Gender::Female), 7, None, RiskLevel::EarlyOnset),
    // Unknown gender under 31 never reaches a risk row and falls through.
    RiskRule::new(AgeBand::Any, None, 0, None, RiskLevel::None),
];

/// Maps demographics and a distinct trigger-term count to a risk level.
///
/// A negative age breaks the caller's precondition and yields
/// [`RiskLevel::None`].
pub fn classify(age: i32, gender: Gender, term_count: usize) -> RiskLevel {
    if age < 0 {
        return RiskLevel::None;
    }

    RULES
        .iter()
        .find(|rule| rule.matches(age, gender, term_count))
        .map(|rule| rule.level)
        .unwrap_or(RiskLevel::None)
}
