pub mod baseline;
pub mod config;
pub mod detectors;
pub mod estimator;
pub mod io;
pub mod pipeline;
pub mod signal;
pub mod source;
pub mod window;

pub use baseline::{calibrate, BaselineReport, Calibration, CalibrationError};
pub use config::{read_config, MonitorConfig, SourceConfig, SourceKind};
pub use detectors::*;
pub use estimator::{EstimatorConfig, HeartRateEstimator};
pub use pipeline::Pipeline;
pub use signal::*;
pub use source::SampleSource;
pub use window::RollingWindow;
