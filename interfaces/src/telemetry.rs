/// Fire-and-forget metrics/log sink. The default implementation logs through
/// `tracing`, mirroring the teacher's `metrics/counters.rs` pattern of a
/// thin trait in front of whatever backend is wired at boot.
pub trait Telemetry: Send + Sync {
    fn counter(&self, name: &'static str, value: u64);
    fn histogram(&self, name: &'static str, value: f64);
    fn log(&self, level: tracing::Level, message: &str);
}

/// Emits every call through `tracing`, at the counter/histogram's own target
/// so they can be filtered independently of ordinary log lines.
#[derive(Default, Clone, Copy)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn counter(&self, name: &'static str, value: u64) {
        tracing::info!(target: "telemetry.counter", metric = name, value, "counter");
    }

    fn histogram(&self, name: &'static str, value: f64) {
        tracing::info!(target: "telemetry.histogram", metric = name, value, "histogram");
    }

    fn log(&self, level: tracing::Level, message: &str) {
        match level {
            tracing::Level::ERROR => tracing::error!("{message}"),
            tracing::Level::WARN => tracing::warn!("{message}"),
            tracing::Level::INFO => tracing::info!("{message}"),
            tracing::Level::DEBUG => tracing::debug!("{message}"),
            tracing::Level::TRACE => tracing::trace!("{message}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tracing_telemetry_does_not_panic() {
        let t = TracingTelemetry;
        t.counter("test_counter", 1);
        t.histogram("test_histogram", 0.5);
        t.log(tracing::Level::INFO, "hello");
    }
}
