use onac_core::ResponseSpec;

/// The first qualifying key event observed inside a response window.
#[derive(Debug, Clone, PartialEq)]
pub struct CapturedResponse {
    pub key: String,
    /// Seconds from the window's own start, not from trial start.
    pub rt: f64,
}

/// Polls key input inside one trial's response window.
///
/// The window has its own clock zero (set when the response phase is
/// entered) so reaction times are response-locked. The first qualifying key
/// closes the window; polling may continue but later events are never
/// attributed to the trial. Expiry without a key leaves `captured` as
/// `None`, distinct from a zero RT or any stale value.
#[derive(Debug)]
pub struct ResponseCapture {
    spec: ResponseSpec,
    window_start: Option<f64>,
    captured: Option<CapturedResponse>,
    closed: bool,
}

impl ResponseCapture {
    pub fn new(spec: ResponseSpec) -> Self {
        Self {
            spec,
            window_start: None,
            captured: None,
            closed: false,
        }
    }

    pub fn spec(&self) -> &ResponseSpec {
        &self.spec
    }

    /// Opens the window and zeroes its clock. Later calls are ignored so the
    /// start is pinned to the tick that entered the response phase.
    pub fn open(&mut self, at: f64) {
        if self.window_start.is_none() && !self.closed {
            self.window_start = Some(at);
        }
    }

    pub fn is_open(&self) -> bool {
        self.window_start.is_some() && !self.closed
    }

    /// Feeds this tick's key events. Returns the captured response on the
    /// tick that captures it, `None` on every other tick.
    pub fn poll(&mut self, keys: &[String], elapsed: f64) -> Option<&CapturedResponse> {
        let start = self.window_start?;
        if self.closed {
            return None;
        }
        let key = keys.iter().find(|k| self.spec.qualifies(k.as_str()))?;
        self.captured = Some(CapturedResponse {
            key: key.clone(),
            rt: elapsed - start,
        });
        self.closed = true;
        self.captured.as_ref()
    }

    /// Closes the window at phase end. A window that never opened stays
    /// closed so out-of-window keys can never be attributed to the trial.
    pub fn expire(&mut self) {
        self.closed = true;
    }

    pub fn captured(&self) -> Option<&CapturedResponse> {
        self.captured.as_ref()
    }
}
