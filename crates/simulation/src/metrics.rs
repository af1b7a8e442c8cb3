use metrics::{describe_counter, describe_gauge};

pub fn describe() {
    describe_counter!(
        "chainwatch_ticks_total",
        "Simulation ticks applied successfully."
    );
    describe_counter!(
        "chainwatch_tick_failures_total",
        "Simulation ticks that failed and were skipped."
    );
    describe_counter!(
        "chainwatch_fraud_events_total",
        "Synthetic fraud events appended to the event log, by type."
    );
    describe_gauge!(
        "chainwatch_stream_viewers",
        "Viewers currently connected to the snapshot stream."
    );
    describe_counter!(
        "chainwatch_snapshots_served_total",
        "Snapshots built for viewers, by transport (poll or sse)."
    );
}
