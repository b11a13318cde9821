//! Participant intake: demographics plus the seven-item anxiety assessment captured
//! before a session starts.

use crate::error::SessionError;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Highest score a single assessment item can take.
pub const MAX_ITEM_SCORE: u8 = 4;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Demographics {
    #[serde(rename = "edad")]
    pub age: Option<u32>,
    #[serde(rename = "sexo")]
    pub sex: Option<String>,
}

/// Raw item scores, keyed `q1`..`q7` on disk.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Responses {
    pub q1: u8,
    pub q2: u8,
    pub q3: u8,
    pub q4: u8,
    pub q5: u8,
    pub q6: u8,
    pub q7: u8,
}

impl Responses {
    pub fn items(&self) -> [u8; 7] {
        [self.q1, self.q2, self.q3, self.q4, self.q5, self.q6, self.q7]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scores {
    #[serde(rename = "psiquica")]
    pub psychic: u32,
    #[serde(rename = "somatica")]
    pub somatic: u32,
    pub total: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnxietyLevel {
    Minimal,
    MildModerate,
    ModerateHigh,
    Severe,
}

impl AnxietyLevel {
    pub fn from_total(total: u32) -> Self {
        match total {
            0..=7 => AnxietyLevel::Minimal,
            8..=14 => AnxietyLevel::MildModerate,
            15..=21 => AnxietyLevel::ModerateHigh,
            _ => AnxietyLevel::Severe,
        }
    }
}

/// Scored assessment. Psychic items are 1, 3, 4 and 7; somatic items 2, 5 and 6.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Assessment {
    responses: Responses,
    scores: Scores,
}

impl Assessment {
    pub fn score(responses: Responses) -> Result<Self, SessionError> {
        for (idx, value) in responses.items().into_iter().enumerate() {
            if value > MAX_ITEM_SCORE {
                return Err(SessionError::InvalidAssessment {
                    item: idx + 1,
                    value,
                });
            }
        }
        let r = &responses;
        let psychic = [r.q1, r.q3, r.q4, r.q7].iter().map(|&v| v as u32).sum();
        let somatic = [r.q2, r.q5, r.q6].iter().map(|&v| v as u32).sum();
        Ok(Self {
            responses,
            scores: Scores {
                psychic,
                somatic,
                total: psychic + somatic,
            },
        })
    }

    pub fn responses(&self) -> &Responses {
        &self.responses
    }

    pub fn scores(&self) -> &Scores {
        &self.scores
    }

    pub fn level(&self) -> AnxietyLevel {
        AnxietyLevel::from_total(self.scores.total)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Intake {
    pub demographics: Demographics,
    pub assessment: Assessment,
}

impl Intake {
    pub fn record(&self) -> IntakeRecord {
        IntakeRecord {
            demographics: self.demographics.clone(),
            responses: *self.assessment.responses(),
            scores: *self.assessment.scores(),
        }
    }
}

/// Host-supplied intake form; scores are always derived, never trusted from input.
#[derive(Debug, Clone, Deserialize)]
pub struct IntakeForm {
    #[serde(default)]
    pub demographics: Demographics,
    pub responses: Responses,
}

impl IntakeForm {
    pub fn score(self) -> Result<Intake, SessionError> {
        Ok(Intake {
            demographics: self.demographics,
            assessment: Assessment::score(self.responses)?,
        })
    }
}

/// On-disk intake (`hamilton_pre.json`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IntakeRecord {
    pub demographics: Demographics,
    pub responses: Responses,
    #[serde(rename = "puntuaciones")]
    pub scores: Scores,
}

pub fn read_intake_form(path: &Path) -> Result<IntakeForm> {
    let file = fs::File::open(path).with_context(|| format!("opening intake {}", path.display()))?;
    let form = serde_json::from_reader::<_, IntakeForm>(file)
        .with_context(|| format!("parsing intake {}", path.display()))?;
    Ok(form)
}

pub fn write_intake(path: &Path, record: &IntakeRecord) -> Result<()> {
    let file =
        fs::File::create(path).with_context(|| format!("creating intake {}", path.display()))?;
    serde_json::to_writer_pretty(&file, record)?;
    file.sync_all()
        .with_context(|| format!("syncing intake {}", path.display()))?;
    Ok(())
}

pub fn read_intake(path: &Path) -> Result<IntakeRecord> {
    let file = fs::File::open(path).with_context(|| format!("opening intake {}", path.display()))?;
    let record = serde_json::from_reader::<_, IntakeRecord>(file)
        .with_context(|| format!("parsing intake {}", path.display()))?;
    Ok(record)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn responses() -> Responses {
        Responses {
            q1: 2,
            q2: 1,
            q3: 3,
            q4: 0,
            q5: 4,
            q6: 2,
            q7: 1,
        }
    }

    #[test]
    fn scores_psychic_and_somatic_items() {
        let assessment = Assessment::score(responses()).unwrap();
        assert_eq!(assessment.scores().psychic, 6);
        assert_eq!(assessment.scores().somatic, 7);
        assert_eq!(assessment.scores().total, 13);
        assert_eq!(assessment.level(), AnxietyLevel::MildModerate);
    }

    #[test]
    fn rejects_out_of_range_items() {
        let mut bad = responses();
        bad.q6 = 5;
        match Assessment::score(bad) {
            Err(SessionError::InvalidAssessment { item, value }) => {
                assert_eq!(item, 6);
                assert_eq!(value, 5);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn anxiety_bands() {
        assert_eq!(AnxietyLevel::from_total(0), AnxietyLevel::Minimal);
        assert_eq!(AnxietyLevel::from_total(7), AnxietyLevel::Minimal);
        assert_eq!(AnxietyLevel::from_total(14), AnxietyLevel::MildModerate);
        assert_eq!(AnxietyLevel::from_total(21), AnxietyLevel::ModerateHigh);
        assert_eq!(AnxietyLevel::from_total(22), AnxietyLevel::Severe);
    }

    #[test]
    fn intake_record_uses_on_disk_keys() {
        let intake = Intake {
            demographics: Demographics {
                age: Some(24),
                sex: Some("femenino".into()),
            },
            assessment: Assessment::score(responses()).unwrap(),
        };
        let json = serde_json::to_value(intake.record()).unwrap();
        assert_eq!(json["demographics"]["edad"], 24);
        assert_eq!(json["demographics"]["sexo"], "femenino");
        assert_eq!(json["responses"]["q5"], 4);
        assert_eq!(json["puntuaciones"]["psiquica"], 6);
        assert_eq!(json["puntuaciones"]["somatica"], 7);
        assert_eq!(json["puntuaciones"]["total"], 13);
    }

    #[test]
    fn intake_round_trips_through_disk() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("hamilton_pre.json");
        let record = Intake {
            demographics: Demographics::default(),
            assessment: Assessment::score(responses()).unwrap(),
        }
        .record();
        write_intake(&path, &record).unwrap();
        assert_eq!(read_intake(&path).unwrap(), record);
    }

    #[test]
    fn form_ignores_client_scores() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("form.json");
        fs::write(
            &path,
            r#"{"demographics":{"edad":30,"sexo":"masculino"},
                "responses":{"q1":1,"q2":1,"q3":1,"q4":1,"q5":1,"q6":1,"q7":1},
                "total":99}"#,
        )
        .unwrap();
        let intake = read_intake_form(&path).unwrap().score().unwrap();
        assert_eq!(intake.assessment.scores().total, 7);
        assert_eq!(intake.demographics.age, Some(30));
    }
}
