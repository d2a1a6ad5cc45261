use log::debug;
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use crate::store::{Database, StoreError};
use crate::types::UserId;
const HISTORY_LIMIT: i64 = 200;
/// Discriminator stored with every signal record.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SignalKind {
    MatrixContainer,
    TabularText,
}
impl SignalKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            SignalKind::MatrixContainer => "MAT",
            SignalKind::TabularText => "CSV",
        }
    }
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "MAT" => Some(SignalKind::MatrixContainer),
            "CSV" => Some(SignalKind::TabularText),
            _ => None,
        }
    }
}
/// Fields of a new study row. Absent metadata stays `None`.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct StudyEntry {
    pub patient_id: Option<String>,
    pub patient_name: Option<String>,
    pub study_date: Option<String>,
    pub modality: Option<String>,
    pub source_path: String,
    pub derived_path: Option<String>,
}
#[derive(Clone, Debug, PartialEq)]
pub struct ImageStudyRecord {
    pub id: i64,
    pub entry: StudyEntry,
    pub user_id: UserId,
    pub created_at: String,
}
#[derive(Clone, Debug, PartialEq)]
pub struct ImageAnalysisRecord {
    pub id: i64,
    pub file_path: String,
    pub operation_kind: String,
    pub parameters: String,
    pub result: String,
    pub user_id: UserId,
    pub created_at: String,
}
#[derive(Clone, Debug, PartialEq)]
pub struct SignalAnalysisRecord {
    pub id: i64,
    pub file_path: String,
    pub signal_kind: SignalKind,
    pub operation_kind: String,
    pub parameters: String,
    pub result: String,
    pub user_id: UserId,
    pub created_at: String,
}
/// One user's records, newest first.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct History {
    pub studies: Vec<ImageStudyRecord>,
    pub image_analyses: Vec<ImageAnalysisRecord>,
    pub signal_analyses: Vec<SignalAnalysisRecord>,
}
impl History {
    pub fn len(&self) -> usize {
        self.studies.len() + self.image_analyses.len() + self.signal_analyses.len()
    }
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
/// Outcome of a workflow operation plus the outcome of its audit write.
///
/// A failed write does not undo the operation; callers surface it as a warning.
#[derive(Debug)]
pub struct Audited<T> {
    pub value: T,
    pub audit: Result<i64, StoreError>,
}
impl<T> Audited<T> {
    pub fn new(value: T, audit: Result<i64, StoreError>) -> Self {
        Self { value, audit }
    }
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Audited<U> {
        Audited {
            value: f(self.value),
            audit: self.audit,
        }
    }
}
/// Append-only audit trail. There is no update or delete path.
///
/// Parameters are stored as JSON text and results as plain text; neither is
/// interpreted here.
#[derive(Clone)]
pub struct AnalysisLog {
    db: Database,
}
impl AnalysisLog {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
    pub fn record_image_study(&self, entry: &StudyEntry, user: UserId) -> Result<i64, StoreError> {
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT INTO image_study
             (patient_id, patient_name, study_date, modality, source_path, derived_path, user_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                entry.patient_id,
                entry.patient_name,
                entry.study_date,
                entry.modality,
                entry.source_path,
                entry.derived_path,
                user.0
            ],
        )?;
        let id = conn.last_insert_rowid();
        debug!("image study #{id} recorded for user {user}");
        Ok(id)
    }
    pub fn record_image_analysis(
        &self,
        path: &str,
        operation_kind: &str,
        parameters: &Value,
        result: &str,
        user: UserId,
    ) -> Result<i64, StoreError> {
        let parameters = serde_json::to_string(parameters)?;
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT INTO image_analysis (file_path, operation_kind, parameters, result, user_id)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![path, operation_kind, parameters, result, user.0],
        )?;
        let id = conn.last_insert_rowid();
        debug!("image analysis #{id} ({operation_kind}) recorded for user {user}");
        Ok(id)
    }
    pub fn record_signal_analysis(
        &self,
        path: &str,
        kind: SignalKind,
        operation_kind: &str,
        parameters: &Value,
        result: &str,
        user: UserId,
    ) -> Result<i64, StoreError> {
        let parameters = serde_json::to_string(parameters)?;
        let conn = self.db.lock()?;
        conn.execute(
            "INSERT INTO signal_analysis
             (file_path, signal_kind, operation_kind, parameters, result, user_id)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![path, kind.as_str(), operation_kind, parameters, result, user.0],
        )?;
        let id = conn.last_insert_rowid();
        debug!("signal analysis #{id} ({operation_kind}) recorded for user {user}");
        Ok(id)
    }
    pub fn history(&self, user: UserId) -> Result<History, StoreError> {
        let conn = self.db.lock()?;
        Ok(History {
            studies: query_user_rows(
                &conn,
                "SELECT id, patient_id, patient_name, study_date, modality, source_path,
                        derived_path, user_id, created_at
                 FROM image_study WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
                user,
                study_from_row,
            )?,
            image_analyses: query_user_rows(
                &conn,
                "SELECT id, file_path, operation_kind, parameters, result, user_id, created_at
                 FROM image_analysis WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
                user,
                image_analysis_from_row,
            )?,
            signal_analyses: query_user_rows(
                &conn,
                "SELECT id, file_path, signal_kind, operation_kind, parameters, result,
                        user_id, created_at
                 FROM signal_analysis WHERE user_id = ?1 ORDER BY id DESC LIMIT ?2",
                user,
                signal_analysis_from_row,
            )?,
        })
    }
}
fn query_user_rows<T>(
    conn: &Connection,
    sql: &str,
    user: UserId,
    map: fn(&Row<'_>) -> rusqlite::Result<T>,
) -> Result<Vec<T>, StoreError> {
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt
        .query_map(params![user.0, HISTORY_LIMIT], map)?
        .collect::<rusqlite::Result<Vec<T>>>()?;
    Ok(rows)
}
fn study_from_row(row: &Row<'_>) -> rusqlite::Result<ImageStudyRecord> {
    Ok(ImageStudyRecord {
        id: row.get(0)?,
        entry: StudyEntry {
            patient_id: row.get(1)?,
            patient_name: row.get(2)?,
            study_date: row.get(3)?,
            modality: row.get(4)?,
            source_path: row.get(5)?,
            derived_path: row.get(6)?,
        },
        user_id: UserId(row.get(7)?),
        created_at: row.get(8)?,
    })
}
fn image_analysis_from_row(row: &Row<'_>) -> rusqlite::Result<ImageAnalysisRecord> {
    Ok(ImageAnalysisRecord {
        id: row.get(0)?,
        file_path: row.get(1)?,
        operation_kind: row.get(2)?,
        parameters: row.get(3)?,
        result: row.get(4)?,
        user_id: UserId(row.get(5)?),
        created_at: row.get(6)?,
    })
}
fn signal_analysis_from_row(row: &Row<'_>) -> rusqlite::Result<SignalAnalysisRecord> {
    let raw_kind: String = row.get(2)?;
    let signal_kind = SignalKind::parse(&raw_kind).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            2,
            rusqlite::types::Type::Text,
            format!("unknown signal kind `{raw_kind}`").into(),
        )
    })?;
    Ok(SignalAnalysisRecord {
        id: row.get(0)?,
        file_path: row.get(1)?,
        signal_kind,
        operation_kind: row.get(3)?,
        parameters: row.get(4)?,
        result: row.get(5)?,
        user_id: UserId(row.get(6)?),
        created_at: row.get(7)?,
    })
}
#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::CredentialStore;
    use crate::types::Role;
    use serde_json::json;
    fn setup() -> (AnalysisLog, UserId, UserId) {
        let db = Database::open_in_memory().unwrap();
        let creds = CredentialStore::new(db.clone());
        let img = creds.register("img", "pw", Role::ImageExpert).unwrap();
        let sig = creds.register("sig", "pw", Role::SignalExpert).unwrap();
        (AnalysisLog::new(db), img, sig)
    }
    #[test]
    fn records_are_scoped_to_their_user() {
        let (log, img, sig) = setup();
        log.record_image_study(
            &StudyEntry {
                patient_id: Some("P-01".into()),
                patient_name: None,
                source_path: "/data/ct".into(),
                ..Default::default()
            },
            img,
        )
        .unwrap();
        log.record_image_analysis(
            "/data/cells.png",
            "cell_count",
            &json!({"method": "connected_components"}),
            "12",
            img,
        )
        .unwrap();
        log.record_signal_analysis(
            "/data/ecg.mat",
            SignalKind::MatrixContainer,
            "load",
            &json!({}),
            "success",
            sig,
        )
        .unwrap();
        let mine = log.history(img).unwrap();
        assert_eq!(mine.studies.len(), 1);
        assert_eq!(mine.studies[0].entry.patient_id.as_deref(), Some("P-01"));
        assert_eq!(mine.studies[0].entry.patient_name, None);
        assert_eq!(mine.image_analyses[0].result, "12");
        assert_eq!(
            mine.image_analyses[0].parameters,
            r#"{"method":"connected_components"}"#
        );
        assert!(mine.signal_analyses.is_empty());
        let theirs = log.history(sig).unwrap();
        assert_eq!(theirs.len(), 1);
        assert_eq!(
            theirs.signal_analyses[0].signal_kind,
            SignalKind::MatrixContainer
        );
    }
    #[test]
    fn history_is_newest_first() {
        let (log, img, _) = setup();
        for op in ["load", "morphological", "save"] {
            log.record_image_analysis("a.png", op, &json!({}), "success", img)
                .unwrap();
        }
        let ops: Vec<_> = log
            .history(img)
            .unwrap()
            .image_analyses
            .into_iter()
            .map(|r| r.operation_kind)
            .collect();
        assert_eq!(ops, ["save", "morphological", "load"]);
    }
    #[test]
    fn unknown_owner_is_rejected() {
        let (log, _, _) = setup();
        let err = log
            .record_image_analysis("a.png", "load", &json!({}), "success", UserId(999))
            .unwrap_err();
        assert!(matches!(err, StoreError::Db(_)));
        assert!(log.history(UserId(999)).unwrap().is_empty());
    }
}
