/// Classification for retry policy.
///
/// Used by the resilience wrapper to decide whether another attempt against
/// the same provider can help.
///
/// | Class | Retried by `ResilientProvider`? | Falls back to next provider? |
/// |-------|--------------------------------|------------------------------|
/// | `Transient` | Yes, with backoff | Yes, once retries are exhausted |
/// | `Permanent` | No | Yes |
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum RetryClass {
    /// Timeouts, 5xx responses, dropped connections and throttling.
    /// Another attempt after a pause may succeed.
    Transient,

    /// Unknown symbols, unsupported markets or intervals, malformed bodies.
    /// Retrying against the same provider won't help.
    Permanent,
}

impl RetryClass {
    pub fn is_transient(self) -> bool {
        matches!(self, Self::Transient)
    }
}
