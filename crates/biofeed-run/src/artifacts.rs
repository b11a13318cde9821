//! On-disk layout of a session and of the consolidated ledger.
//!
//! ```text
//! <sessions_dir>/
//!   todas_las_sesiones.csv          one row per finalized session
//!   20250301_101500_24anos_femenino/
//!     hamilton_pre.json             intake, written at start
//!     datos_sensores.csv            one row per recorded sample
//!     resumen_sesion.json           summary, written at stop
//! ```

use crate::intake::{Demographics, IntakeRecord};
use crate::summary::SessionSummary;
use anyhow::{Context, Result};
use biofeed_lib::signal::Sample;
use chrono::NaiveDateTime;
use csv::{ReaderBuilder, Trim, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

pub const INTAKE_FILE: &str = "hamilton_pre.json";
pub const SAMPLES_FILE: &str = "datos_sensores.csv";
pub const SUMMARY_FILE: &str = "resumen_sesion.json";
pub const LEDGER_FILE: &str = "todas_las_sesiones.csv";

/// Timestamp format shared by folder names and ledger rows.
pub const STAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// `{stamp}_{age}anos_{sex}`, with `XX` / `no_especifica` for missing fields.
pub fn session_folder_name(started: NaiveDateTime, demographics: &Demographics) -> String {
    let age = demographics
        .age
        .map(|a| a.to_string())
        .unwrap_or_else(|| "XX".into());
    let sex = demographics
        .sex
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .unwrap_or("no_especifica")
        .replace([' ', '/', '\\'], "_");
    format!("{}_{}anos_{}", started.format(STAMP_FORMAT), age, sex)
}

/// Create a fresh folder for `name` under `root`. A name that is already taken gets a
/// `-2`, `-3`, ... suffix so no two sessions share a folder.
pub fn allocate_session_dir(root: &Path, name: &str) -> Result<PathBuf> {
    fs::create_dir_all(root)
        .with_context(|| format!("creating sessions root {}", root.display()))?;
    let mut attempt = 1usize;
    loop {
        let candidate = if attempt == 1 {
            root.join(name)
        } else {
            root.join(format!("{name}-{attempt}"))
        };
        match fs::create_dir(&candidate) {
            Ok(()) => return Ok(candidate),
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => attempt += 1,
            Err(err) => {
                return Err(err).with_context(|| format!("creating {}", candidate.display()))
            }
        }
    }
}

pub fn write_samples_csv(path: &Path, samples: &[Sample]) -> Result<()> {
    let file = fs::File::create(path)
        .with_context(|| format!("creating samples {}", path.display()))?;
    let mut writer = WriterBuilder::new().has_headers(true).from_writer(file);
    for sample in samples {
        writer.serialize(sample)?;
    }
    writer.flush()?;
    Ok(())
}

pub fn write_summary(path: &Path, summary: &SessionSummary) -> Result<()> {
    let file = fs::File::create(path)
        .with_context(|| format!("creating summary {}", path.display()))?;
    serde_json::to_writer_pretty(file, summary)?;
    Ok(())
}

pub fn read_summary(path: &Path) -> Result<SessionSummary> {
    let file =
        fs::File::open(path).with_context(|| format!("opening summary {}", path.display()))?;
    let summary = serde_json::from_reader::<_, SessionSummary>(file)
        .with_context(|| format!("parsing summary {}", path.display()))?;
    Ok(summary)
}

/// One consolidated row per finalized session. Field order is the column order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LedgerRow {
    pub fecha_hora: String,
    pub carpeta_sesion: String,
    pub edad: Option<u32>,
    pub sexo: Option<String>,
    pub hamilton_q1: u8,
    pub hamilton_q2: u8,
    pub hamilton_q3: u8,
    pub hamilton_q4: u8,
    pub hamilton_q5: u8,
    pub hamilton_q6: u8,
    pub hamilton_q7: u8,
    pub hamilton_psiquica: u32,
    pub hamilton_somatica: u32,
    pub hamilton_total: u32,
    pub baseline_ecg_voltaje: Option<f64>,
    pub baseline_temperatura_celsius: Option<f64>,
    pub ecg_promedio: f64,
    pub ecg_minimo: f64,
    pub ecg_maximo: f64,
    pub ecg_desviacion: f64,
    pub temp_promedio: f64,
    pub temp_minimo: f64,
    pub temp_maximo: f64,
    pub temp_desviacion: f64,
    pub bpm_promedio: f64,
    pub bpm_minimo: f64,
    pub bpm_maximo: f64,
    pub bpm_desviacion: f64,
    pub duracion_segundos: f64,
    pub puntos_datos: usize,
}

impl LedgerRow {
    pub fn new(
        recorded_at: NaiveDateTime,
        folder: &Path,
        intake: &IntakeRecord,
        summary: &SessionSummary,
    ) -> Self {
        let r = &intake.responses;
        Self {
            fecha_hora: recorded_at.format(STAMP_FORMAT).to_string(),
            carpeta_sesion: folder
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            edad: intake.demographics.age,
            sexo: intake.demographics.sex.clone(),
            hamilton_q1: r.q1,
            hamilton_q2: r.q2,
            hamilton_q3: r.q3,
            hamilton_q4: r.q4,
            hamilton_q5: r.q5,
            hamilton_q6: r.q6,
            hamilton_q7: r.q7,
            hamilton_psiquica: intake.scores.psychic,
            hamilton_somatica: intake.scores.somatic,
            hamilton_total: intake.scores.total,
            baseline_ecg_voltaje: summary.baseline.ecg_voltage,
            baseline_temperatura_celsius: summary.baseline.temperature,
            ecg_promedio: summary.ecg.mean,
            ecg_minimo: summary.ecg.min,
            ecg_maximo: summary.ecg.max,
            ecg_desviacion: summary.ecg.std,
            temp_promedio: summary.temperature.mean,
            temp_minimo: summary.temperature.min,
            temp_maximo: summary.temperature.max,
            temp_desviacion: summary.temperature.std,
            bpm_promedio: summary.bpm.mean,
            bpm_minimo: summary.bpm.min,
            bpm_maximo: summary.bpm.max,
            bpm_desviacion: summary.bpm.std,
            duracion_segundos: summary.duration_s,
            puntos_datos: summary.samples,
        }
    }
}

/// Append `row` to the ledger, writing the BOM and header only when the file is new
/// or empty.
pub fn append_ledger(path: &Path, row: &LedgerRow) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("opening ledger {}", path.display()))?;
    let fresh = file
        .metadata()
        .with_context(|| format!("inspecting ledger {}", path.display()))?
        .len()
        == 0;
    if fresh {
        file.write_all(UTF8_BOM)?;
    }
    let mut writer = WriterBuilder::new().has_headers(fresh).from_writer(file);
    writer.serialize(row)?;
    writer.flush()?;
    Ok(())
}

pub fn read_ledger(path: &Path) -> Result<Vec<LedgerRow>> {
    let bytes = fs::read(path).with_context(|| format!("reading ledger {}", path.display()))?;
    let body = bytes.strip_prefix(UTF8_BOM).unwrap_or(&bytes);
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .has_headers(true)
        .from_reader(body);
    let mut rows = Vec::new();
    for row in reader.deserialize::<LedgerRow>() {
        rows.push(row.with_context(|| format!("parsing ledger {}", path.display()))?);
    }
    Ok(rows)
}
