#[derive(Debug, thiserror::Error)]
pub enum AssessmentError {
    #[error("patient {0} not found")]
    PatientNotFound(i64),
    #[error("failed to load patient {patient_id}")]
    PatientLookup {
        patient_id: i64,
        #[source]
        source: anyhow::Error,
    },
    #[error("failed to load notes for patient {patient_id}")]
    NotesLookup {
        patient_id: i64,
        #[source]
        source: anyhow::Error,
    },
}

impl AssessmentError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AssessmentError::PatientNotFound(_))
    }
}

pub type AssessmentOutcome<T> = std::result::Result<T, AssessmentError>;
