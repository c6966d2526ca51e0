//! 调度指标

pub const CHECKS_CREATED: &str = "netpulse_checks_created_total";
pub const SUBTASKS_ASSIGNED: &str = "netpulse_subtasks_assigned_total";
pub const RESULTS_SUBMITTED: &str = "netpulse_results_submitted_total";
pub const AGENTS_MARKED_OFFLINE: &str = "netpulse_agents_marked_offline_total";
pub const RELAY_FAILURES: &str = "netpulse_relay_failures_total";

pub fn record_check_created(region: &str) {
    ::metrics::counter!(CHECKS_CREATED, "region" => region.to_string()).increment(1);
}

pub fn record_sub_task_assigned(region: &str) {
    ::metrics::counter!(SUBTASKS_ASSIGNED, "region" => region.to_string()).increment(1);
}

pub fn record_result_submitted(success: bool) {
    let outcome = if success { "success" } else { "failure" };
    ::metrics::counter!(RESULTS_SUBMITTED, "outcome" => outcome).increment(1);
}

pub fn record_agents_marked_offline(count: usize) {
    ::metrics::counter!(AGENTS_MARKED_OFFLINE).increment(count as u64);
}

pub fn record_relay_failure(direction: &'static str) {
    ::metrics::counter!(RELAY_FAILURES, "direction" => direction).increment(1);
}
