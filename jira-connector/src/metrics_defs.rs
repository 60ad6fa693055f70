use shared::metrics_defs::{MetricDef, MetricType};

pub const REQUEST_DURATION: MetricDef = MetricDef {
    name: "request.duration",
    metric_type: MetricType::Histogram,
    description: "Request duration in seconds. Tagged with route, status.",
};

pub const BACKEND_REQUEST: MetricDef = MetricDef {
    name: "backend.request",
    metric_type: MetricType::Counter,
    description: "Calls made to the issue tracker. Tagged with call, outcome.",
};

pub const CARDS_RETURNED: MetricDef = MetricDef {
    name: "cards.returned",
    metric_type: MetricType::Histogram,
    description: "Number of cards in a successful card response",
};

pub const FETCH_INFLIGHT: MetricDef = MetricDef {
    name: "fetch.inflight",
    metric_type: MetricType::Gauge,
    description: "Number of issue fetches currently running",
};

pub const ALL_METRICS: &[MetricDef] = &[
    REQUEST_DURATION,
    BACKEND_REQUEST,
    CARDS_RETURNED,
    FETCH_INFLIGHT,
];
