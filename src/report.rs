use std::collections::HashMap;
use std::fmt::Write;

use chrono::{DateTime, Utc};

use crate::models::AssessmentResult;
use crate::risk::RiskLevel;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RiskSummary {
    pub level: RiskLevel,
    pub patient_count: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TermPrevalence {
    pub term: String,
    pub patient_count: usize,
}

/// Patient counts for every risk level, lowest level first.
pub fn summarize_by_level(results: &[AssessmentResult]) -> Vec<RiskSummary> {
    RiskLevel::ALL
        .iter()
        .map(|level| RiskSummary {
            level: *level,
            patient_count: results.iter().filter(|r| r.risk_level == *level).count(),
        })
        .collect()
}

/// How many patients had each matched term, most common first.
pub fn term_prevalence(results: &[AssessmentResult]) -> Vec<TermPrevalence> {
    let mut map: HashMap<&str, usize> = HashMap::new();

    for result in results {
        for term in &result.matched_terms {
            *map.entry(term.as_str()).or_insert(0) += 1;
        }
    }

    let mut prevalence: Vec<TermPrevalence> = map
        .into_iter()
        .map(|(term, patient_count)| TermPrevalence {
            term: term.to_string(),
            patient_count,
        })
        .collect();

    prevalence.sort_by(|a, b| {
        b.patient_count
            .cmp(&a.patient_count)
            .then_with(|| a.term.cmp(&b.term))
    });
    prevalence
}

fn patient_count_label(count: usize) -> String {
    if count == 1 {
        "1 patient".to_string()
    } else {
        format!("{count} patients")
    }
}

pub fn build_report(generated_at: DateTime<Utc>, results: &[AssessmentResult]) -> String {
    let summaries = summarize_by_level(results);
    let prevalence = term_prevalence(results);

    let mut output = String::new();

    let _ = writeln!(output, "# Diabetes Risk Report");
    let _ = writeln!(
        output,
        "Generated {} for {}",
        generated_at.format("%Y-%m-%d %H:%M UTC"),
        patient_count_label(results.len())
    );
    let _ = writeln!(output);
    let _ = writeln!(output, "## Risk Distribution");

    for summary in &summaries {
        let _ = writeln!(
            output,
            "- {}: {}",
            summary.level,
            patient_count_label(summary.patient_count)
        );
    }

    let mut ranked = results.to_vec();
    ranked.sort_by(|a, b| {
        b.risk_level
            .cmp(&a.risk_level)
            .then_with(|| a.patient_name.cmp(&b.patient_name))
    });
    let _ = writeln!(output);
    let _ = writeln!(output, "## Patients by Risk");

    if ranked.is_empty() {
        let _ = writeln!(output, "No patients assessed.");
    } else {
        for result in &ranked {
            let _ = writeln!(
                output,
                "- {} (#{}, {} y, {}): {} with {} trigger terms",
                result.patient_name,
                result.patient_id,
                result.patient_age,
                result.patient_gender,
                result.risk_level,
                result.trigger_term_count
            );
        }
    }

    let _ = writeln!(output);
    let _ = writeln!(output, "## Trigger Term Prevalence");

    if prevalence.is_empty() {
        let _ = writeln!(output, "No trigger terms found in any notes.");
    } else {
        for entry in &prevalence {
            let _ = writeln!(
                output,
                "- {}: {}",
                entry.term,
                patient_count_label(entry.patient_count)
            );
        }
    }

    output
}
