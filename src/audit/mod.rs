use serde_json::Value;

// ============================================================================
// Business Event Logger - Structured Audit Trail
// ============================================================================

/// Best-effort structured audit trail of lifecycle actions. `record` never
/// fails from the caller's point of view; audit loss is acceptable, lifecycle
/// correctness is not.
pub trait BusinessEventLogger: Send + Sync {
    fn record(&self, event: &str, data: Value);
}

/// Emits audit entries as structured tracing events on the dedicated
/// `business` target, so they can be filtered and shipped separately from
/// diagnostic logs.
pub struct TracingBusinessLogger;

impl BusinessEventLogger for TracingBusinessLogger {
    fn record(&self, event: &str, data: Value) {
        tracing::info!(target: "business", event = %event, data = %data, "business event");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn record_is_infallible() {
        let logger = TracingBusinessLogger;
        logger.record("order_created", json!({ "id": "abc" }));
        logger.record("order_search", Value::Null);
    }
}
