//! Sample sources. Hardware, synthetic and replayed streams all sit behind the same
//! [`SampleSource`] trait, so the estimator and the recorder never know which one
//! is feeding them.

pub mod demo;
pub mod replay;
pub mod serial;

pub use demo::DemoSource;
pub use replay::ReplaySource;
pub use serial::{parse_line, LineSource};

use crate::signal::Reading;

/// One reading per tick, or `None` when the tick produced no usable data
/// (malformed line, disconnect hiccup, exhausted recording). A missing tick is never
/// a zero reading.
pub trait SampleSource {
    fn name(&self) -> &str;
    fn next_reading(&mut self) -> Option<Reading>;
}

impl<S: SampleSource + ?Sized> SampleSource for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn next_reading(&mut self) -> Option<Reading> {
        (**self).next_reading()
    }
}
