use std::fmt;

/// Pipeline step a progress message belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    /// Pulling audio out of the input container
    Extract,
    /// Running speaker separation
    Separate,
    /// Classifying segments or speakers
    Analyze,
    /// Pitch estimation and shifting
    Pitch,
    /// Writing the processed audio
    Merge,
    /// Remuxing audio with the original video
    Combine,
    /// A terminal failure
    Error,
}

impl Step {
    /// Step name as reported to progress consumers
    pub fn as_str(&self) -> &'static str {
        match self {
            Step::Extract => "extract",
            Step::Separate => "separate",
            Step::Analyze => "analyze",
            Step::Pitch => "pitch",
            Step::Merge => "merge",
            Step::Combine => "combine",
            Step::Error => "error",
        }
    }
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Receiver for human-readable progress messages.
///
/// Implementations must return quickly and must not influence processing:
/// a run with [`NoopSink`] produces the same audio as a run with any other sink.
pub trait ProgressSink {
    /// Report a message for a step
    fn report(&self, step: Step, message: &str);
}

/// Sink that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSink;

impl ProgressSink for NoopSink {
    fn report(&self, _step: Step, _message: &str) {}
}

/// Sink that forwards to the `log` facade
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl ProgressSink for LogSink {
    fn report(&self, step: Step, message: &str) {
        if step == Step::Error {
            log::error!("[{}] {}", step, message);
        } else {
            log::info!("[{}] {}", step, message);
        }
    }
}

impl<F> ProgressSink for F
where
    F: Fn(Step, &str),
{
    fn report(&self, step: Step, message: &str) {
        self(step, message)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;

    #[test]
    fn test_step_names() {
        assert_eq!(Step::Separate.as_str(), "separate");
        assert_eq!(Step::Combine.to_string(), "combine");
    }

    #[test]
    fn test_closure_sink() {
        let seen = RefCell::new(Vec::new());
        let sink = |step: Step, msg: &str| seen.borrow_mut().push(format!("{}:{}", step, msg));
        sink.report(Step::Pitch, "halfway");
        NoopSink.report(Step::Pitch, "ignored");
        assert_eq!(seen.borrow().as_slice(), ["pitch:halfway"]);
    }
}
