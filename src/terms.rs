//! Trigger-term detection over free-text clinical notes.
//!
//! Detection is a presence check: each vocabulary entry contributes at most
//! one to the count no matter how often it occurs. Matching is case-insensitive
//! plain substring search with no word boundaries and no accent folding.

use std::fmt;

/// How a vocabulary entry is looked up in lower-cased note text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchRule {
    /// The lower-cased label itself must appear.
    Exact,
    /// Any of several shorter stems, covering plurals and verb forms.
    Stems(&'static [&'static str]),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TriggerTerm {
    pub label: &'static str,
    pub rule: MatchRule,
}

impl TriggerTerm {
    pub const fn exact(label: &'static str) -> Self {
        Self {
            label,
            rule: MatchRule::Exact,
        }
    }

    pub const fn stems(label: &'static str, stems: &'static [&'static str]) -> Self {
        Self {
            label,
            rule: MatchRule::Stems(stems),
        }
    }

    /// The lower-case substrings searched for; any one of them is a match.
    pub fn needles(&self) -> Vec<String> {
        match self.rule {
            MatchRule::Exact => vec![self.label.to_lowercase()],
            MatchRule::Stems(stems) => stems.iter().map(|stem| stem.to_lowercase()).collect(),
        }
    }
}

impl fmt::Display for TriggerTerm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.rule {
            MatchRule::Exact => write!(f, "{}", self.label),
            MatchRule::Stems(stems) => {
                write!(f, "{} (stems \"{}\")", self.label, stems.join("\", \""))
            }
        }
    }
}

/// The fixed diabetes trigger vocabulary.
pub const VOCABULARY: [TriggerTerm; 11] = [
    TriggerTerm::exact("Hémoglobine A1C"),
    TriggerTerm::exact("Microalbumine"),
    TriggerTerm::exact("Taille"),
    TriggerTerm::exact("Poids"),
    // fume, fumer, fumeur, fumeuse
    TriggerTerm::stems("Fumeur", &["fum"]),
    // anormale, anormales; the masculine plural drops the final "l"
    TriggerTerm::stems("Anormal", &["anormal", "anormaux"]),
    TriggerTerm::exact("Cholestérol"),
    TriggerTerm::stems("Vertige", &["vertige"]),
    TriggerTerm::exact("Rechute"),
    TriggerTerm::exact("Réaction"),
    TriggerTerm::exact("Anticorps"),
];

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum VocabularyError {
    #[error("trigger term {0:?} has an empty match pattern")]
    EmptyNeedle(&'static str),
    #[error("pattern for {outer:?} contains the pattern for {inner:?}; one occurrence would count twice")]
    OverlappingNeedles {
        outer: &'static str,
        inner: &'static str,
    },
}

/// Vocabulary with its needles lower-cased once up front.
#[derive(Debug, Clone)]
pub struct TermDetector {
    entries: Vec<(TriggerTerm, Vec<String>)>,
}

impl TermDetector {
    /// Builds a detector, rejecting vocabularies where any pattern of one
    /// term contains any pattern of another.
    pub fn new(terms: &[TriggerTerm]) -> Result<Self, VocabularyError> {
        let entries: Vec<(TriggerTerm, Vec<String>)> =
            terms.iter().map(|term| (*term, term.needles())).collect();

        for (term, needles) in &entries {
            if needles.is_empty() || needles.iter().any(|needle| needle.is_empty()) {
                return Err(VocabularyError::EmptyNeedle(term.label));
            }
        }

        for (i, (outer, outer_needles)) in entries.iter().enumerate() {
            for (j, (inner, inner_needles)) in entries.iter().enumerate() {
                if i == j {
                    continue;
                }
                let overlaps = outer_needles.iter().any(|outer_needle| {
                    inner_needles
                        .iter()
                        .any(|inner_needle| outer_needle.contains(inner_needle.as_str()))
                });
                if overlaps {
                    return Err(VocabularyError::OverlappingNeedles {
                        outer: outer.label,
                        inner: inner.label,
                    });
                }
            }
        }

        Ok(Self { entries })
    }

    /// Detector over [`VOCABULARY`].
    pub fn standard() -> Self {
        Self {
            entries: VOCABULARY
                .iter()
                .map(|term| (*term, term.needles()))
                .collect(),
        }
    }

    pub fn terms(&self) -> impl Iterator<Item = &TriggerTerm> {
        self.entries.iter().map(|(term, _)| term)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Terms present at least once in `text`, in vocabulary order.
    pub fn detect(&self, text: &str) -> Vec<&TriggerTerm> {
        if text.is_empty() {
            return Vec::new();
        }

        let lowered = text.to_lowercase();
        self.entries
            .iter()
            .filter(|(_, needles)| {
                needles
                    .iter()
                    .any(|needle| lowered.contains(needle.as_str()))
            })
            .map(|(term, _)| term)
            .collect()
    }

    pub fn count_distinct(&self, text: &str) -> usize {
        self.detect(text).len()
    }
}

impl Default for TermDetector {
    fn default() -> Self {
        Self::standard()
    }
}

/// Number of distinct [`VOCABULARY`] terms present in `text`.
pub fn count_distinct_trigger_terms(text: &str) -> usize {
    TermDetector::standard().count_distinct(text)
}
