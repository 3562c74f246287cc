use crate::types::{SessionSummary, Stats, Transaction};

/// Emit a pushed transaction as a single JSON line to stdout.
pub fn report_new_transaction(tx: &Transaction) {
    report_line("new_transaction", tx);
}

/// Emit a transaction status update as a single JSON line to stdout.
pub fn report_transaction_update(tx: &Transaction) {
    report_line("transaction_update", tx);
}

/// Emit a stats snapshot as a single JSON line to stdout.
pub fn report_stats(stats: &Stats) {
    report_line("stats", stats);
}

/// Emit the session summary as pretty-printed JSON to stdout.
pub fn report_session_summary(summary: &SessionSummary) {
    if let Ok(json) = serde_json::to_string_pretty(summary) {
        println!("{json}");
    }
}

fn report_line(event: &str, payload: &impl serde::Serialize) {
    if let Ok(json) = serde_json::to_string(payload) {
        println!("{{\"event\":\"{event}\",\"data\":{json}}}");
    }
}
