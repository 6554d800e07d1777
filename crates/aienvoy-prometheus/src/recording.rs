// SPDX-FileCopyrightText: 2026 Aienvoy Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any installed recorder collects these.
//! Stream and token counters are emitted directly by `aienvoy-stream` and
//! `aienvoy-usage`; they are described here so `/metrics` carries help text.

use metrics::{describe_counter, describe_histogram};

/// Register all aienvoy metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!("aienvoy_http_requests_total", "HTTP requests served");
    describe_histogram!(
        "aienvoy_http_request_duration_seconds",
        "HTTP request latency in seconds"
    );
    describe_counter!(
        "aienvoy_stream_deltas_total",
        "Deltas forwarded by streaming producers"
    );
    describe_counter!(
        "aienvoy_stream_terminals_total",
        "Streams terminated, by outcome"
    );
    describe_counter!("aienvoy_tokens_total", "Tokens recorded per model");
    describe_counter!(
        "aienvoy_telegram_messages_total",
        "Telegram messages handled"
    );
}

/// Record one served HTTP request.
pub fn record_http_request(method: &str, route: &str, status: u16) {
    metrics::counter!(
        "aienvoy_http_requests_total",
        "method" => method.to_string(),
        "route" => route.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record request latency.
pub fn record_latency(route: &str, seconds: f64) {
    metrics::histogram!("aienvoy_http_request_duration_seconds", "route" => route.to_string())
        .record(seconds);
}

/// Record a handled Telegram message.
pub fn record_telegram_message() {
    metrics::counter!("aienvoy_telegram_messages_total").increment(1);
}
