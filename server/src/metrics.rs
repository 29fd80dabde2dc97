//! Server metrics.

use metriken::{Counter, Gauge, metric};

#[metric(
    name = "connections_accepted",
    description = "Total number of connections accepted"
)]
pub static CONNECTIONS_ACCEPTED: Counter = Counter::new();

#[metric(
    name = "connections_active",
    description = "Number of currently active connections"
)]
pub static CONNECTIONS_ACTIVE: Gauge = Gauge::new();

#[metric(
    name = "requests_dispatched",
    description = "Total requests dispatched to a handler"
)]
pub static REQUESTS_DISPATCHED: Counter = Counter::new();

#[metric(
    name = "requests_failed",
    description = "Total requests whose handler returned an error"
)]
pub static REQUESTS_FAILED: Counter = Counter::new();

#[metric(
    name = "protocol_errors",
    description = "Total bad, empty, or oversized requests"
)]
pub static PROTOCOL_ERRORS: Counter = Counter::new();
