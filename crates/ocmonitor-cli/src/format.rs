use chrono::Duration;
use ocmonitor_engine::UsageTally;
use ocmonitor_types::{PriceEntry, PriceField, TokenUsage};

/// 1234567 -> "1,234,567"
pub fn count(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

pub fn tokens(usage: &TokenUsage) -> String {
    format!(
        "in={} out={} cache_read={} cache_write={}",
        count(usage.input),
        count(usage.output),
        count(usage.cache_read),
        count(usage.cache_write)
    )
}

pub fn duration(d: Duration) -> String {
    let secs = d.num_seconds().max(0);
    match (secs / 3600, (secs % 3600) / 60, secs % 60) {
        (0, 0, s) => format!("{}s", s),
        (0, m, s) => format!("{}m{:02}s", m, s),
        (h, m, _) => format!("{}h{:02}m", h, m),
    }
}

/// "sessions=2 interactions=5 in=.. out=.. cache_read=.. cache_write=..  $1.2345"
pub fn tally(tally: &UsageTally) -> String {
    format!(
        "sessions={} interactions={} {}  {}",
        tally.session_count(),
        tally.interactions,
        tokens(&tally.tokens),
        tally.cost
    )
}

/// One line describing a resolved price and the tier behind each field
pub fn price(entry: &PriceEntry) -> String {
    let fields = &entry.fields;
    let mut parts = Vec::new();
    let mut push = |label: &str, field: PriceField, value: Option<String>| {
        if let Some(value) = value {
            let tier = entry
                .tier_of(field)
                .map(|t| t.to_string())
                .unwrap_or_default();
            parts.push(format!("{}={} ({})", label, value, tier));
        }
    };
    let per_million = |p: Option<f64>| p.map(|p| format!("${}/M", p));

    push("input", PriceField::Input, per_million(fields.input_price));
    push("output", PriceField::Output, per_million(fields.output_price));
    push("cache_read", PriceField::CacheRead, per_million(fields.cache_read_price));
    push("cache_write", PriceField::CacheWrite, per_million(fields.cache_write_price));
    push(
        "context",
        PriceField::ContextWindow,
        fields.context_window.map(count),
    );
    push(
        "quota",
        PriceField::SessionQuota,
        fields.session_quota.map(|q| format!("${}", q)),
    );
    parts.join(" ")
}
