//! Per-patient diabetes risk assessment.
//!
//! [`Assessor`] reads demographics and notes from its collaborators once each,
//! then runs the pure [`evaluate`] step: combined note text goes through the
//! term detector and the resulting count through the risk classifier.

use std::future::Future;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use crate::error::{AssessmentError, AssessmentOutcome};
use crate::models::{AssessmentResult, Note, PatientRecord, PatientSnapshot};
use crate::risk::{self, RiskLevel};
use crate::terms::TermDetector;

/// Resolves a patient identifier to demographics. `Ok(None)` means the
/// patient does not exist.
pub trait PatientDirectory {
    fn find_patient(
        &self,
        patient_id: i64,
    ) -> impl Future<Output = anyhow::Result<Option<PatientRecord>>> + Send;
}

/// Ordered notes for a patient. An unknown patient has no notes.
pub trait NotesSource {
    fn notes_for_patient(
        &self,
        patient_id: i64,
    ) -> impl Future<Output = anyhow::Result<Vec<Note>>> + Send;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Evaluation {
    pub risk_level: RiskLevel,
    pub trigger_term_count: usize,
    pub matched_terms: Vec<String>,
}

/// Joins note bodies with a single space, in collection order.
pub fn combine_notes<'a, I>(bodies: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    bodies.into_iter().collect::<Vec<_>>().join(" ")
}

pub fn evaluate<'a, I>(detector: &TermDetector, snapshot: PatientSnapshot, bodies: I) -> Evaluation
where
    I: IntoIterator<Item = &'a str>,
{
    let combined = combine_notes(bodies);
    let matched = detector.detect(&combined);
    let trigger_term_count = matched.len();
    let risk_level = risk::classify(snapshot.age, snapshot.gender, trigger_term_count);

    Evaluation {
        risk_level,
        trigger_term_count,
        matched_terms: matched.iter().map(|term| term.label.to_string()).collect(),
    }
}

pub struct Assessor<P, N> {
    patients: P,
    notes: N,
    detector: TermDetector,
}

impl<P, N> Assessor<P, N>
where
    P: PatientDirectory,
    N: NotesSource,
{
    pub fn new(patients: P, notes: N) -> Self {
        Self::with_detector(patients, notes, TermDetector::standard())
    }

    pub fn with_detector(patients: P, notes: N, detector: TermDetector) -> Self {
        Self {
            patients,
            notes,
            detector,
        }
    }

    pub async fn assess(&self, patient_id: i64) -> AssessmentOutcome<AssessmentResult> {
        self.assess_at(patient_id, Utc::now()).await
    }

    /// Assessment evaluated as of `now`, which drives both the age
    /// computation and the result timestamp.
    pub async fn assess_at(
        &self,
        patient_id: i64,
        now: DateTime<Utc>,
    ) -> AssessmentOutcome<AssessmentResult> {
        info!(patient_id, "assessing diabetes risk");

        let (patient, notes) = tokio::join!(
            self.patients.find_patient(patient_id),
            self.notes.notes_for_patient(patient_id),
        );

        let patient = patient
            .map_err(|source| AssessmentError::PatientLookup { patient_id, source })?
            .ok_or(AssessmentError::PatientNotFound(patient_id))?;
        let notes =
            notes.map_err(|source| AssessmentError::NotesLookup { patient_id, source })?;

        let snapshot = patient.snapshot_on(now.date_naive());
        debug!(
            patient_id,
            age = snapshot.age,
            gender = ?snapshot.gender,
            note_count = notes.len(),
            "loaded patient data"
        );

        let evaluation = evaluate(
            &self.detector,
            snapshot,
            notes.iter().map(|note| note.body.as_str()),
        );
        debug!(
            patient_id,
            trigger_terms = evaluation.trigger_term_count,
            matched = ?evaluation.matched_terms,
            "detected trigger terms"
        );
        info!(patient_id, risk = %evaluation.risk_level, "assessment complete");

        Ok(AssessmentResult {
            patient_id: patient.id,
            patient_name: patient.full_name(),
            patient_age: snapshot.age,
            patient_gender: patient.gender.clone(),
            risk_level: evaluation.risk_level,
            risk_description: evaluation.risk_level.description(),
            trigger_term_count: evaluation.trigger_term_count,
            matched_terms: evaluation.matched_terms,
            assessed_at: now,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use chrono::{NaiveDate, TimeZone};
    use uuid::Uuid;

    use super::*;
    use crate::models::Gender;

    #[derive(Default)]
    struct FakeDirectory {
        patients: HashMap<i64, PatientRecord>,
        calls: AtomicUsize,
        fail: bool,
    }

    impl PatientDirectory for FakeDirectory {
        async fn find_patient(&self, patient_id: i64) -> anyhow::Result<Option<PatientRecord>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                anyhow::bail!("directory offline");
            }
            Ok(self.patients.get(&patient_id).cloned())
        }
    }

    #[derive(Default)]
    struct FakeNotes {
        notes: HashMap<i64, Vec<Note>>,
        calls: AtomicUsize,
    }

    impl NotesSource for FakeNotes {
        async fn notes_for_patient(&self, patient_id: i64) -> anyhow::Result<Vec<Note>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.notes.get(&patient_id).cloned().unwrap_or_default())
        }
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 9, 1, 10, 0, 0).unwrap()
    }

    fn patient(id: i64, last_name: &str, birth: (i32, u32, u32), gender: &str) -> PatientRecord {
        PatientRecord {
            id,
            first_name: "Test".to_string(),
            last_name: last_name.to_string(),
            birth_date: NaiveDate::from_ymd_opt(birth.0, birth.1, birth.2),
            gender: gender.to_string(),
        }
    }

    fn note(patient_id: i64, body: &str) -> Note {
        Note {
            id: Uuid::new_v4(),
            patient_id,
            body: body.to_string(),
            created_at: now(),
        }
    }

    fn reference_assessor() -> Assessor<FakeDirectory, FakeNotes> {
        let mut directory = FakeDirectory::default();
        let mut notes = FakeNotes::default();

        directory
            .patients
            .insert(1, patient(1, "TestNone", (1966, 12, 31), "F"));
        notes.notes.insert(
            1,
            vec![note(
                1,
                "Le patient déclare qu'il 'se sent très bien' Poids égal ou inférieur au poids recommandé",
            )],
        );

        directory
            .patients
            .insert(2, patient(2, "TestBorderline", (1945, 6, 24), "M"));
        notes.notes.insert(
            2,
            vec![
                note(2, "Le patient déclare qu'il ressent beaucoup de stress au travail Il se plaint également que son audition est anormale dernièrement"),
                note(2, "Le patient déclare avoir fait une réaction aux médicaments au cours des 3 derniers mois Il remarque également que son audition continue d'être anormale"),
            ],
        );

        directory
            .patients
            .insert(3, patient(3, "TestInDanger", (2004, 6, 18), "M"));
        notes.notes.insert(
            3,
            vec![
                note(3, "Le patient déclare qu'il fume depuis peu"),
                note(3, "Le patient déclare qu'il est fumeur et qu'il a cessé de fumer l'année dernière Il se plaint également de crises d'apnée respiratoire anormales Tests de laboratoire indiquant un taux de cholestérol LDL élevé"),
            ],
        );

        directory
            .patients
            .insert(4, patient(4, "TestEarlyOnset", (2002, 6, 28), "F"));
        notes.notes.insert(
            4,
            vec![
                note(4, "Le patient déclare qu'il lui est devenu difficile de monter les escaliers Il se plaint également d'être essoufflé Tests de laboratoire indiquant que les anticorps sont élevés Réaction aux médicaments"),
                note(4, "Le patient déclare qu'il a mal au dos lorsqu'il reste assis pendant longtemps"),
                note(4, "Le patient déclare avoir commencé à fumer depuis peu Hémoglobine A1C supérieure au niveau recommandé"),
                note(4, "Taille, Poids, Cholestérol, Vertige et Réaction"),
            ],
        );

        directory
            .patients
            .insert(5, patient(5, "TestEmpty", (1990, 1, 1), "M"));

        Assessor::new(directory, notes)
    }

    #[tokio::test]
    async fn reference_patient_none() {
        let result = reference_assessor().assess_at(1, now()).await.unwrap();
        assert_eq!(result.patient_age, 58);
        assert_eq!(result.trigger_term_count, 1);
        assert_eq!(result.matched_terms, vec!["Poids".to_string()]);
        assert_eq!(result.risk_level, RiskLevel::None);
        assert_eq!(result.patient_name, "Test TestNone");
    }

    #[tokio::test]
    async fn reference_patient_borderline() {
        let result = reference_assessor().assess_at(2, now()).await.unwrap();
        assert_eq!(result.patient_age, 79);
        assert_eq!(result.trigger_term_count, 2);
        assert_eq!(result.risk_level, RiskLevel::Borderline);
    }

    #[tokio::test]
    async fn reference_patient_in_danger() {
        let result = reference_assessor().assess_at(3, now()).await.unwrap();
        assert_eq!(result.patient_age, 20);
        assert_eq!(result.patient_gender, "M");
        assert_eq!(
            result.matched_terms,
            vec!["Fumeur".to_string(), "Anormal".to_string(), "Cholestérol".to_string()]
        );
        assert_eq!(result.risk_level, RiskLevel::InDanger);
    }

    #[tokio::test]
    async fn reference_patient_early_onset() {
        let result = reference_assessor().assess_at(4, now()).await.unwrap();
        assert_eq!(result.patient_age, 22);
        assert_eq!(result.patient_gender, "F");
        assert_eq!(result.trigger_term_count, 8);
        assert_eq!(result.risk_level, RiskLevel::EarlyOnset);
        assert_eq!(result.risk_description, "Early onset expected");
        assert_eq!(result.assessed_at, now());
    }

    #[tokio::test]
    async fn patient_without_notes_is_none() {
        let result = reference_assessor().assess_at(5, now()).await.unwrap();
        assert_eq!(result.trigger_term_count, 0);
        assert_eq!(result.risk_level, RiskLevel::None);
    }

    #[tokio::test]
    async fn fetches_each_collaborator_once() {
        let assessor = reference_assessor();
        assessor.assess_at(4, now()).await.unwrap();
        assert_eq!(assessor.patients.calls.load(Ordering::SeqCst), 1);
        assert_eq!(assessor.notes.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn unknown_patient_is_not_found() {
        let err = reference_assessor().assess_at(99, now()).await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "patient 99 not found");
    }

    #[tokio::test]
    async fn directory_failure_is_not_reported_as_not_found() {
        let assessor = Assessor::new(
            FakeDirectory {
                fail: true,
                ..FakeDirectory::default()
            },
            FakeNotes::default(),
        );
        let err = assessor.assess_at(1, now()).await.unwrap_err();
        assert!(matches!(err, AssessmentError::PatientLookup { patient_id: 1, .. }));
    }

    #[tokio::test]
    async fn repeated_assessments_are_identical() {
        let assessor = reference_assessor();
        let first = assessor.assess_at(3, now()).await.unwrap();
        let second = assessor.assess_at(3, now()).await.unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn note_order_does_not_change_the_outcome() {
        let detector = TermDetector::standard();
        let snapshot = PatientSnapshot {
            age: 22,
            gender: Gender::Female,
        };
        let bodies = ["anticorps et réaction", "fumer", "Taille, Poids, Cholestérol, Vertige"];
        let forward = evaluate(&detector, snapshot, bodies.iter().copied());
        let backward = evaluate(&detector, snapshot, bodies.iter().rev().copied());
        assert_eq!(forward.trigger_term_count, 7);
        assert_eq!(forward.risk_level, backward.risk_level);
        assert_eq!(forward.trigger_term_count, backward.trigger_term_count);
    }

    #[test]
    fn empty_note_collection_is_none() {
        let detector = TermDetector::standard();
        for gender in [Gender::Male, Gender::Female, Gender::Unknown] {
            let evaluation = evaluate(&detector, PatientSnapshot { age: 20, gender }, std::iter::empty());
            assert_eq!(evaluation.trigger_term_count, 0);
            assert_eq!(evaluation.risk_level, RiskLevel::None);
        }
    }

    #[test]
    fn combines_with_single_spaces() {
        assert_eq!(combine_notes(["a", "b", "c"]), "a b c");
        assert_eq!(combine_notes(Vec::<&str>::new()), "");
    }
}
