//! A per-thread error sink: every fallible operation in this crate reports
//! its failure here before returning, via a thread-local sink function
//! rather than a process-wide mutable global.

use std::cell::RefCell;

use crate::error::RegError;

/// One reported failure: the operation it occurred in, its source
/// location, and the formatted error.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    /// Name of the operation that failed, e.g. `"DeviceContext::read"`.
    pub operation: &'static str,
    /// Source file of the call site.
    pub file: &'static str,
    /// Source line of the call site.
    pub line: u32,
    /// The error itself.
    pub error: RegError,
}

impl std::fmt::Display for ErrorEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}:{}: {} failed: {}",
            self.file, self.line, self.operation, self.error
        )
    }
}

type SinkFn = Box<dyn FnMut(&ErrorEvent)>;

fn default_sink() -> SinkFn {
    Box::new(|event: &ErrorEvent| log::error!("{event}"))
}

fn silent_sink() -> SinkFn {
    Box::new(|_event: &ErrorEvent| {})
}

struct SinkState {
    current: SinkFn,
    saved_during_silence: Option<SinkFn>,
}

thread_local! {
    static SINK: RefCell<SinkState> = RefCell::new(SinkState {
        current: default_sink(),
        saved_during_silence: None,
    });
}

/// Replaces the error sink for the current thread. Passing a sink while
/// errors are silenced (see [`silence_errors`]) replaces the sink that
/// will be restored when silencing ends.
pub fn set_error_sink(sink: impl FnMut(&ErrorEvent) + 'static) {
    SINK.with(|s| {
        let mut s = s.borrow_mut();
        if s.saved_during_silence.is_some() {
            s.saved_during_silence = Some(Box::new(sink));
        } else {
            s.current = Box::new(sink);
        }
    });
}

/// Globally suppresses error emission for the current thread without
/// affecting the failure return value of any operation — useful for
/// negative tests that deliberately trigger errors.
pub fn silence_errors(silence: bool) {
    SINK.with(|s| {
        let mut s = s.borrow_mut();
        match (silence, s.saved_during_silence.take()) {
            (true, None) => {
                let previous = std::mem::replace(&mut s.current, silent_sink());
                s.saved_during_silence = Some(previous);
            }
            (true, Some(previous)) => {
                // Already silenced; keep the previously saved sink.
                s.saved_during_silence = Some(previous);
            }
            (false, Some(previous)) => {
                s.current = previous;
            }
            (false, None) => {}
        }
    });
}

/// Reports a failure to the current thread's sink. Operations call this
/// on every error path; it never itself fails.
pub fn report(operation: &'static str, file: &'static str, line: u32, error: &RegError) {
    let event = ErrorEvent {
        operation,
        file,
        line,
        error: error.clone(),
    };
    SINK.with(|s| (s.borrow_mut().current)(&event));
}

/// Reports `error` and returns it unchanged, for use at `?`-friendly call
/// sites: `read_fn(reg).map_err(|e| report_and_return(\"read\", e))?`.
macro_rules! report_error {
    ($operation:expr, $error:expr) => {{
        let err = $error;
        $crate::sink::report($operation, file!(), line!(), &err);
        err
    }};
}

pub(crate) use report_error;
