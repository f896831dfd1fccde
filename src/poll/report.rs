use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::poll::*;

/// The report as text, one block per topic.
pub fn render_text(tallies: &[TopicTally]) -> String {
    if tallies.is_empty() {
        return "No votes recorded.".to_string();
    }
    let mut blocks: Vec<String> = Vec::new();
    for t in tallies.iter() {
        let mut lines: Vec<String> = vec![format!("Topic: {}", t.topic)];
        for row in t.rows.iter() {
            lines.push(format!(
                "{}: {} {} ({:.1}%)",
                row.candidate,
                row.count,
                plural(row.count as usize, "vote", "votes"),
                row.percentage
            ));
        }
        blocks.push(lines.join("\n"));
    }
    blocks.join("\n\n")
}

pub fn report_to_json(tallies: &[TopicTally]) -> JSValue {
    let results: Vec<JSValue> = tallies
        .iter()
        .map(|t| {
            let rows: Vec<JSValue> = t
                .rows
                .iter()
                .map(|r| {
                    json!({
                        "candidate": r.candidate,
                        "count": r.count,
                        "percentage": r.percentage,
                    })
                })
                .collect();
            json!({"tematica": t.topic, "total": t.total, "tally": rows})
        })
        .collect();
    json!({ "results": results })
}

fn read_reference(path: &str) -> PollResult<JSValue> {
    let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
    let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
    Ok(js)
}

/// Compares a report with a reference report saved earlier.
///
/// The differences are printed line by line.
pub fn check_reference(report_js: &JSValue, reference_path: &str) -> PollResult<()> {
    let reference = read_reference(reference_path)?;
    debug!("check_reference: reference: {:?}", reference);
    let pretty_reference = serde_json::to_string_pretty(&reference).context(ParsingJsonSnafu {})?;
    let pretty_report = serde_json::to_string_pretty(report_js).context(ParsingJsonSnafu {})?;
    if pretty_reference != pretty_report {
        warn!("Found differences with the reference report {}", reference_path);
        print_diff(pretty_reference.as_str(), pretty_report.as_str(), "\n");
        return ReferenceMismatchSnafu {}.fail();
    }
    info!("The report matches the reference {}", reference_path);
    Ok(())
}
