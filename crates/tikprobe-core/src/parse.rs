// ── Ping reply parsing ──
//
// Pure functions turning the records of one `/ping` reply into a
// `Measurement`. RouterOS streams one record per echo plus running
// totals; the last record carrying `avg-rtt` or `packet-loss` holds
// the summary for the whole burst.

use tikprobe_api::Record;

use crate::model::Measurement;

/// Parse a RouterOS duration such as `"1s200ms"` or `"11ms520us"` into
/// milliseconds.
///
/// The input is scanned for `<number><unit>` pairs with unit `s`, `ms`
/// or `us`; the converted values are summed. Anything else is skipped,
/// so empty or garbage input yields `0.0`.
pub fn parse_duration_ms(input: &str) -> f64 {
    let is_numeric = |c: char| c.is_ascii_digit() || c == '.';

    let mut total = 0.0;
    let mut rest = input;
    while let Some(start) = rest.find(is_numeric) {
        let tail = &rest[start..];
        let number_len = tail.find(|c| !is_numeric(c)).unwrap_or(tail.len());
        let (number, after) = tail.split_at(number_len);

        let (unit_len, to_ms): (usize, fn(f64) -> f64) = if after.starts_with("ms") {
            (2, |v| v)
        } else if after.starts_with("us") {
            (2, |v| v / 1000.0)
        } else if after.starts_with('s') {
            (1, |v| v * 1000.0)
        } else {
            rest = after;
            continue;
        };

        if let Ok(value) = number.parse::<f64>() {
            total += to_ms(value);
        }
        rest = &after[unit_len..];
    }
    total
}

/// Pick the record that summarizes the burst: the last one carrying
/// `avg-rtt` or `packet-loss`, else the last record of all.
pub fn select_summary(records: &[Record]) -> Option<&Record> {
    records
        .iter()
        .rev()
        .find(|r| r.contains_key("avg-rtt") || r.contains_key("packet-loss"))
        .or_else(|| records.last())
}

/// Read a counter field, treating absent or non-numeric values as zero.
fn counter(record: &Record, key: &str) -> u32 {
    record
        .get(key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(0)
}

/// Build a measurement from a ping reply.
///
/// Returns `None` when the reply holds no records at all; the caller
/// records that as a failed target.
pub fn measurement_from_reply(records: &[Record]) -> Option<Measurement> {
    let summary = select_summary(records)?;

    let sent = counter(summary, "sent");
    let received = counter(summary, "received");
    let loss_percent = if sent > 0 {
        100.0 * f64::from(sent.saturating_sub(received)) / f64::from(sent)
    } else {
        100.0
    };

    let average_latency_ms = summary
        .get("avg-rtt")
        .filter(|v| !v.is_empty())
        .or_else(|| summary.get("time").filter(|v| !v.is_empty()))
        .map_or(0.0, parse_duration_ms);

    Some(Measurement {
        average_latency_ms,
        loss_percent,
        reachable: received > 0,
    })
}
