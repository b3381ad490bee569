use crate::channel::{TriggerError, TriggerSink};

#[derive(Debug, Clone, PartialEq)]
struct PendingTrigger {
    code: u8,
    /// Transition time in seconds from trial start.
    at: f64,
    fired: bool,
}

/// Guarantees exactly-once delivery of each armed trigger code at the first
/// refresh tick that observes `elapsed >= at`.
///
/// `fire_due` must run every tick *before* the frame draw it is bound to,
/// so the code is queued on the wire no later than the visual onset it
/// marks; within one tick that ordering is the whole coincidence guarantee.
/// Codes are dispatched in transition order regardless of arming order.
#[derive(Debug, Default)]
pub struct TriggerDispatcher {
    pending: Vec<PendingTrigger>,
    completion: Option<PendingTrigger>,
    sent: Vec<u8>,
}

impl TriggerDispatcher {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers intent to send `code` at the first tick at or after `at`.
    /// Arming a second unfired trigger for the same transition is rejected.
    pub fn arm(&mut self, code: u8, at: f64) -> Result<(), TriggerError> {
        if self
            .pending
            .iter()
            .any(|p| !p.fired && (p.at - at).abs() < f64::EPSILON)
        {
            return Err(TriggerError::AlreadyArmed { at });
        }
        let idx = self.pending.partition_point(|p| p.at <= at);
        self.pending.insert(
            idx,
            PendingTrigger {
                code,
                at,
                fired: false,
            },
        );
        Ok(())
    }

    /// Binds `code` to trial completion, wherever in time that lands
    /// (deadline expiry or an early response-driven end).
    pub fn arm_completion(&mut self, code: u8) -> Result<(), TriggerError> {
        if self.completion.as_ref().is_some_and(|p| !p.fired) {
            return Err(TriggerError::AlreadyArmed { at: f64::INFINITY });
        }
        self.completion = Some(PendingTrigger {
            code,
            at: f64::INFINITY,
            fired: false,
        });
        Ok(())
    }

    /// Sends every armed-but-unfired trigger whose transition has been
    /// reached. Invoked once per refresh tick; the fired flag makes each
    /// send exactly-once no matter how many ticks observe the transition.
    pub fn fire_due(&mut self, elapsed: f64, sink: &mut impl TriggerSink) -> usize {
        let mut fired = 0;
        for p in &mut self.pending {
            if !p.fired && p.at <= elapsed {
                sink.send(p.code);
                self.sent.push(p.code);
                p.fired = true;
                fired += 1;
            }
        }
        fired
    }

    /// Fires the completion trigger, once, at the trial's single transition
    /// into its terminal state.
    pub fn complete(&mut self, sink: &mut impl TriggerSink) {
        if let Some(p) = self.completion.as_mut() {
            if !p.fired {
                sink.send(p.code);
                self.sent.push(p.code);
                p.fired = true;
            }
        }
    }

    /// Codes dispatched so far, in transmission order. Dispatch is logged
    /// even when the channel is disabled, so records reconstruct the
    /// protocol timeline independent of hardware presence.
    pub fn sent(&self) -> &[u8] {
        &self.sent
    }

    pub fn sent_string(&self) -> String {
        self.sent.iter().map(|&c| c as char).collect()
    }

    pub fn all_fired(&self) -> bool {
        self.pending.iter().all(|p| p.fired)
            && self.completion.as_ref().is_none_or(|p| p.fired)
    }
}
