pub mod artifacts;
pub mod controller;
pub mod error;
pub mod intake;
pub mod recorder;
pub mod summary;

pub use controller::{
    ControlError, Controller, ControllerSettings, MonitorEvent, MonitorStatus, Phase,
};
pub use error::SessionError;
pub use intake::{
    read_intake_form, Assessment, AnxietyLevel, Demographics, Intake, IntakeForm, IntakeRecord,
    Responses,
};
pub use recorder::{SessionRecorder, SessionState};
pub use summary::{SessionReport, SessionSummary};
