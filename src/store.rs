//! In-memory SQLite store holding the five clinic tables.

use anyhow::{Context, bail};
use rusqlite::{Connection, params};

use crate::schema::{Dataset, RowCounts};

const SCHEMA: &str = "
CREATE TABLE patients (
    id          INTEGER PRIMARY KEY,
    age         INTEGER NOT NULL,
    sex         TEXT    NOT NULL,
    smoker      INTEGER NOT NULL,
    diabetic    INTEGER NOT NULL,
    insurance   TEXT    NOT NULL
);

CREATE TABLE visits (
    id          INTEGER PRIMARY KEY,
    patient_id  INTEGER NOT NULL REFERENCES patients(id),
    date        TEXT    NOT NULL,
    reason      TEXT    NOT NULL,
    provider_id INTEGER NOT NULL
);

CREATE TABLE diagnoses (
    id          INTEGER PRIMARY KEY,
    visit_id    INTEGER NOT NULL REFERENCES visits(id),
    code        TEXT    NOT NULL,
    description TEXT    NOT NULL,
    severity    INTEGER NOT NULL
);

CREATE TABLE treatments (
    id          INTEGER PRIMARY KEY,
    visit_id    INTEGER NOT NULL REFERENCES visits(id),
    type        TEXT    NOT NULL,
    cost        REAL    NOT NULL,
    tooth       INTEGER NOT NULL
);

CREATE TABLE perio_exams (
    id             INTEGER PRIMARY KEY,
    patient_id     INTEGER NOT NULL REFERENCES patients(id),
    date           TEXT    NOT NULL,
    probing_depth  REAL    NOT NULL,
    bleeding_pct   REAL    NOT NULL,
    calculus_score INTEGER NOT NULL
);
";

/// Text rendering of the table relationships, shown in the HTML report.
pub const SCHEMA_DIAGRAM: &str = "\
patients(id, age, sex, smoker, diabetic, insurance)
    │
    ├── visits(id, patient_id, date, reason, provider_id)
    │       ├── diagnoses(id, visit_id, code, description, severity)
    │       └── treatments(id, visit_id, type, cost, tooth)
    │
    └── perio_exams(id, patient_id, date, probing_depth, bleeding_pct, calculus_score)";

const ORPHANS: &str = "
SELECT (SELECT COUNT(*) FROM visits v
          LEFT JOIN patients p ON p.id = v.patient_id WHERE p.id IS NULL)
     + (SELECT COUNT(*) FROM diagnoses d
          LEFT JOIN visits v ON v.id = d.visit_id WHERE v.id IS NULL)
     + (SELECT COUNT(*) FROM treatments t
          LEFT JOIN visits v ON v.id = t.visit_id WHERE v.id IS NULL)
     + (SELECT COUNT(*) FROM perio_exams e
          LEFT JOIN patients p ON p.id = e.patient_id WHERE p.id IS NULL)
";

/// Append-only relational store, written once by [`Store::populate`].
pub struct Store {
    conn: Connection,
    populated: bool,
}

impl Store {
    /// Open an empty in-memory database with foreign keys enforced
    pub fn open() -> anyhow::Result<Self> {
        let conn = Connection::open_in_memory().context("failed to open in-memory database")?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        conn.execute_batch(SCHEMA).context("failed to create schema")?;
        Ok(Self {
            conn,
            populated: false,
        })
    }

    /// Insert every row of `dataset` in a single transaction
    ///
    /// Parents are inserted before children so the foreign key checks see
    /// them. A second call is an error: the store is immutable once loaded.
    pub fn populate(&mut self, dataset: &Dataset) -> anyhow::Result<()> {
        if self.populated {
            bail!("store is already populated");
        }
        let tx = self.conn.transaction()?;
        {
            let mut stmt = tx.prepare(
                "INSERT INTO patients (id, age, sex, smoker, diabetic, insurance)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for p in &dataset.patients {
                stmt.execute(params![p.id, p.age, p.sex, p.smoker, p.diabetic, p.insurance])
                    .with_context(|| format!("failed to insert patient {}", p.id))?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO visits (id, patient_id, date, reason, provider_id)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for v in &dataset.visits {
                stmt.execute(params![v.id, v.patient_id, v.date, v.reason, v.provider_id])
                    .with_context(|| format!("failed to insert visit {}", v.id))?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO diagnoses (id, visit_id, code, description, severity)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for d in &dataset.diagnoses {
                stmt.execute(params![d.id, d.visit_id, d.code, d.condition, d.severity])
                    .with_context(|| format!("failed to insert diagnosis {}", d.id))?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO treatments (id, visit_id, type, cost, tooth)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
            )?;
            for t in &dataset.treatments {
                stmt.execute(params![t.id, t.visit_id, t.kind, t.cost, t.tooth])
                    .with_context(|| format!("failed to insert treatment {}", t.id))?;
            }

            let mut stmt = tx.prepare(
                "INSERT INTO perio_exams
                 (id, patient_id, date, probing_depth, bleeding_pct, calculus_score)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            )?;
            for e in &dataset.perio_exams {
                stmt.execute(params![
                    e.id,
                    e.patient_id,
                    e.date,
                    e.probing_depth,
                    e.bleeding_pct,
                    e.calculus_score,
                ])
                .with_context(|| format!("failed to insert perio exam {}", e.id))?;
            }
        }
        tx.commit()?;
        self.populated = true;
        Ok(())
    }

    pub fn row_counts(&self) -> anyhow::Result<RowCounts> {
        let count = |table: &str| -> anyhow::Result<usize> {
            let n: i64 = self
                .conn
                .query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| row.get(0))?;
            Ok(n as usize)
        };
        Ok(RowCounts {
            patients: count("patients")?,
            visits: count("visits")?,
            diagnoses: count("diagnoses")?,
            treatments: count("treatments")?,
            perio_exams: count("perio_exams")?,
        })
    }

    /// Rows whose foreign key does not resolve; zero for any loaded dataset.
    pub fn orphan_count(&self) -> anyhow::Result<usize> {
        let n: i64 = self.conn.query_row(ORPHANS, [], |row| row.get(0))?;
        Ok(n as usize)
    }

    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }
}
