use std::fmt::Write;

use super::RunSummary;

fn rank_label(rank: u32) -> String {
    if rank == 0 {
        "-".to_string()
    } else {
        format!("#{}", rank)
    }
}

fn ratio(hits: usize, total: usize) -> String {
    if total == 0 {
        return format!("{}/0", hits);
    }
    format!("{}/{} ({:.0}%)", hits, total, hits as f64 * 100.0 / total as f64)
}

/// Human-readable summary. Deterministic, unit-testable.
#[must_use]
pub fn format_summary(s: &RunSummary) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "Run {} [{}] group={} chat={}",
        s.run.id, s.run.status, s.run.group, s.run.chat
    );
    for case in &s.cases {
        let ranks = case
            .ranks
            .iter()
            .map(|m| format!("{} {}", m.diagnosis, rank_label(m.rank)))
            .collect::<Vec<_>>()
            .join(", ");
        let ranks = if ranks.is_empty() { "(no diagnoses)".to_string() } else { ranks };
        let _ = writeln!(out, "  {}: {}", case.case_name, ranks);
    }
    for e in &s.errors {
        let case = e
            .case_id
            .map(|id| format!("case {}", id))
            .unwrap_or_else(|| "run".into());
        let _ = writeln!(out, "  error ({}) {}: {}", case, e.kind, e.message);
    }

    let _ = write!(out, "top-1 {}", ratio(s.top1, s.expected));
    for t in &s.top_k {
        let _ = write!(out, "  top-{} {}", t.k, ratio(t.hits, s.expected));
    }
    let _ = writeln!(out, "  misses {}", s.misses);
    out
}

pub fn print_summary(s: &RunSummary) {
    print!("{}", format_summary(s));
}
