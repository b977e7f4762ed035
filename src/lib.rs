//! Rule-based diabetes risk screening from clinical notes.
//!
//! Notes are scanned for a fixed vocabulary of trigger terms; the number of
//! distinct terms found is combined with the patient's age and gender in a
//! fixed decision table to give one of four risk levels.

pub mod assessment;
pub mod db;
pub mod error;
pub mod models;
pub mod report;
pub mod risk;
pub mod terms;

pub use assessment::{evaluate, Assessor, Evaluation, NotesSource, PatientDirectory};
pub use error::AssessmentError;
pub use models::{AssessmentResult, Gender, Note, PatientRecord, PatientSnapshot};
pub use risk::{classify, RiskLevel};
pub use terms::{count_distinct_trigger_terms, TermDetector, TriggerTerm, VOCABULARY};
