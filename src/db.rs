use anyhow::Context;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{PgPool, Row};
use tracing::info;
use uuid::Uuid;

use crate::assessment::{NotesSource, PatientDirectory};
use crate::models::{Note, PatientRecord};

pub async fn init_db(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

async fn upsert_patient(
    pool: &PgPool,
    first_name: &str,
    last_name: &str,
    birth_date: Option<NaiveDate>,
    gender: &str,
) -> anyhow::Result<i64> {
    let id: i64 = sqlx::query(
        r#"
        INSERT INTO diabetes_assessment.patients (first_name, last_name, birth_date, gender)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT ON CONSTRAINT patients_identity_key DO UPDATE
        SET gender = EXCLUDED.gender
        RETURNING id
        "#,
    )
    .bind(first_name)
    .bind(last_name)
    .bind(birth_date)
    .bind(gender)
    .fetch_one(pool)
    .await?
    .get("id");

    Ok(id)
}

async fn insert_note(
    pool: &PgPool,
    patient_id: i64,
    body: &str,
    source_key: &str,
) -> anyhow::Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO diabetes_assessment.notes (id, patient_id, body, source_key)
        VALUES ($1, $2, $3, $4)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(Uuid::new_v4())
    .bind(patient_id)
    .bind(body)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

/// One reference patient and the notes that put them in their risk level.
#[derive(Debug, Clone)]
pub struct SeedPatient {
    pub last_name: &'static str,
    pub birth_date: NaiveDate,
    pub gender: &'static str,
    pub notes: Vec<&'static str>,
}

pub fn seed_patients() -> anyhow::Result<Vec<SeedPatient>> {
    Ok(vec![
        SeedPatient {
            last_name: "TestNone",
            birth_date: NaiveDate::from_ymd_opt(1966, 12, 31).context("invalid date")?,
            gender: "F",
            notes: vec![
                "Le patient déclare qu'il 'se sent très bien' Poids égal ou inférieur au poids recommandé",
            ],
        },
        SeedPatient {
            last_name: "TestBorderline",
            birth_date: NaiveDate::from_ymd_opt(1945, 6, 24).context("invalid date")?,
            gender: "M",
            notes: vec![
                "Le patient déclare qu'il ressent beaucoup de stress au travail Il se plaint également que son audition est anormale dernièrement",
                "Le patient déclare avoir fait une réaction aux médicaments au cours des 3 derniers mois Il remarque également que son audition continue d'être anormale",
            ],
        },
        SeedPatient {
            last_name: "TestInDanger",
            birth_date: NaiveDate::from_ymd_opt(2004, 6, 18).context("invalid date")?,
            gender: "M",
            notes: vec![
                "Le patient déclare qu'il fume depuis peu",
                "Le patient déclare qu'il est fumeur et qu'il a cessé de fumer l'année dernière Il se plaint également de crises d'apnée respiratoire anormales Tests de laboratoire indiquant un taux de cholestérol LDL élevé",
            ],
        },
        SeedPatient {
            last_name: "TestEarlyOnset",
            birth_date: NaiveDate::from_ymd_opt(2002, 6, 28).context("invalid date")?,
            gender: "F",
            notes: vec![
                "Le patient déclare qu'il lui est devenu difficile de monter les escaliers Il se plaint également d'être essoufflé Tests de laboratoire indiquant que les anticorps sont élevés Réaction aux médicaments",
                "Le patient déclare qu'il a mal au dos lorsqu'il reste assis pendant longtemps",
                "Le patient déclare avoir commencé à fumer depuis peu Hémoglobine A1C supérieure au niveau recommandé",
                "Taille, Poids, Cholestérol, Vertige et Réaction",
            ],
        },
    ])
}

/// Stable key for the `index`-th seeded note of a patient, so re-seeding
/// hits `ON CONFLICT (source_key) DO NOTHING`.
pub fn seed_source_key(last_name: &str, index: usize) -> String {
    format!("seed-{}-{}", last_name.to_lowercase(), index + 1)
}

/// Loads the four reference patients, one per risk level.
pub async fn seed(pool: &PgPool) -> anyhow::Result<()> {
    let mut inserted = 0usize;
    for patient in seed_patients()? {
        let patient_id = upsert_patient(
            pool,
            "Test",
            patient.last_name,
            Some(patient.birth_date),
            patient.gender,
        )
        .await?;

        for (index, body) in patient.notes.into_iter().enumerate() {
            let source_key = seed_source_key(patient.last_name, index);
            if insert_note(pool, patient_id, body, &source_key).await? {
                inserted += 1;
            }
        }
    }

    info!(inserted, "seeded reference patients");
    Ok(())
}

#[derive(Debug, Clone, PartialEq, Eq, serde::Deserialize)]
pub struct ImportRow {
    pub first_name: String,
    pub last_name: String,
    pub birth_date: Option<NaiveDate>,
    pub gender: String,
    pub note: String,
    pub source_key: Option<String>,
}

impl ImportRow {
    /// The row's own key, or a fresh `import-<uuid>` key when it is blank.
    pub fn resolved_source_key(&self) -> String {
        self.source_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| format!("import-{}", Uuid::new_v4()))
    }
}

/// Decodes every import record up front so a bad line rejects the whole file.
pub fn read_import_rows<R: std::io::Read>(input: R) -> anyhow::Result<Vec<ImportRow>> {
    let mut reader = csv::Reader::from_reader(input);
    let mut rows = Vec::new();

    for (line, result) in reader.deserialize::<ImportRow>().enumerate() {
        let row = result.with_context(|| format!("invalid CSV record {}", line + 1))?;
        rows.push(row);
    }

    Ok(rows)
}

/// Imports one note per CSV row, creating or updating its patient. Rows
/// whose `source_key` was already imported are skipped.
pub async fn import_csv(pool: &PgPool, csv_path: &std::path::Path) -> anyhow::Result<usize> {
    let file = std::fs::File::open(csv_path)
        .with_context(|| format!("failed to open {}", csv_path.display()))?;
    let rows = read_import_rows(file)?;
    let mut inserted = 0usize;

    for row in rows {
        let patient_id = upsert_patient(
            pool,
            &row.first_name,
            &row.last_name,
            row.birth_date,
            &row.gender,
        )
        .await?;

        if insert_note(pool, patient_id, &row.note, &row.resolved_source_key()).await? {
            inserted += 1;
        }
    }

    info!(inserted, path = %csv_path.display(), "imported notes");
    Ok(inserted)
}

/// Postgres-backed patient directory and notes source.
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn patient_ids(&self) -> anyhow::Result<Vec<i64>> {
        let rows = sqlx::query("SELECT id FROM diabetes_assessment.patients ORDER BY id")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows.into_iter().map(|row| row.get("id")).collect())
    }
}

impl PatientDirectory for PgStore {
    async fn find_patient(&self, patient_id: i64) -> anyhow::Result<Option<PatientRecord>> {
        let row = sqlx::query(
            r#"
            SELECT id, first_name, last_name, birth_date, gender
            FROM diabetes_assessment.patients
            WHERE id = $1
            "#,
        )
        .bind(patient_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|row| PatientRecord {
            id: row.get("id"),
            first_name: row.get("first_name"),
            last_name: row.get("last_name"),
            birth_date: row.get("birth_date"),
            gender: row.get("gender"),
        }))
    }
}

impl NotesSource for PgStore {
    async fn notes_for_patient(&self, patient_id: i64) -> anyhow::Result<Vec<Note>> {
        let records = sqlx::query(
            r#"
            SELECT id, patient_id, body, created_at
            FROM diabetes_assessment.notes
            WHERE patient_id = $1
            ORDER BY created_at, id
            "#,
        )
        .bind(patient_id)
        .fetch_all(&self.pool)
        .await?;

        let mut notes = Vec::with_capacity(records.len());
        for row in records {
            let created_at: DateTime<Utc> = row.get("created_at");
            notes.push(Note {
                id: row.get("id"),
                patient_id: row.get("patient_id"),
                body: row.get("body"),
                created_at,
            });
        }

        Ok(notes)
    }
}
