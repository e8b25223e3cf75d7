use std::borrow::Cow;

#[derive(Debug, Clone)]
pub enum Progress {
    PhaseStart { name: Cow<'static, str> },
    PhaseFinish,

    TaskStart { total_steps: u64 },
    TaskIncrement { amount: u64 },
    TaskFinish,

    StatusUpdate { text: String },
    Message(String),
}

impl Progress {
    pub fn phase(name: impl Into<Cow<'static, str>>) -> Self {
        Progress::PhaseStart { name: name.into() }
    }
}

pub type ProgressCallback<'a> = Box<dyn Fn(Progress) + Send + Sync + 'a>;

#[derive(Default)]
pub struct ProgressReporter<'a> {
    callback: Option<ProgressCallback<'a>>,
}

impl<'a> ProgressReporter<'a> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_callback(callback: ProgressCallback<'a>) -> Self {
        Self {
            callback: Some(callback),
        }
    }

    #[inline]
    pub fn report(&self, event: Progress) {
        if let Some(cb) = &self.callback {
            cb(event);
        }
    }

    /// Runs `f` between a `PhaseStart`/`PhaseFinish` pair.
    ///
    /// `PhaseFinish` is reported even when `f` fails so that listeners can
    /// close whatever they opened for the phase.
    pub fn in_phase<T>(&self, name: impl Into<Cow<'static, str>>, f: impl FnOnce() -> T) -> T {
        self.report(Progress::phase(name));
        let result = f();
        self.report(Progress::PhaseFinish);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    fn recording_reporter() -> (ProgressReporter<'static>, Arc<Mutex<Vec<String>>>) {
        let events = Arc::new(Mutex::new(Vec::new()));
        let sink = events.clone();
        let reporter = ProgressReporter::with_callback(Box::new(move |p| {
            sink.lock().unwrap().push(format!("{:?}", p));
        }));
        (reporter, events)
    }

    #[test]
    fn reporter_without_callback_ignores_events() {
        let reporter = ProgressReporter::new();
        reporter.report(Progress::TaskIncrement { amount: 1 });
    }

    #[test]
    fn in_phase_brackets_closure_with_start_and_finish() {
        let (reporter, events) = recording_reporter();
        let value = reporter.in_phase("Parsing", || {
            reporter.report(Progress::TaskStart { total_steps: 2 });
            42
        });

        assert_eq!(value, 42);
        let events = events.lock().unwrap();
        assert_eq!(events.len(), 3);
        assert!(events[0].contains("Parsing"));
        assert!(events[1].contains("TaskStart"));
        assert_eq!(events[2], "PhaseFinish");
    }
}
