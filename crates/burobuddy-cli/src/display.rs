//! Terminal rendering for analyses, documents and chat.
//!
//! Renders a [`DocumentAnalysis`] as a vertical card grouped by section,
//! skipping sections with nothing in them.

use std::fmt::{self, Write};

use burobuddy_core::{
    ChatMessage, DocDate, DocumentAnalysis, DocumentDetail, DocumentSummary, Entities, Evidence,
    StoredAnalysis, ValidationFailure,
};
use chrono::NaiveDate;

const MAX_LIST_ITEMS: usize = 10;
const MAX_QUOTE_CHARS: usize = 80;

// ── Public API ──

/// Print an analysis card. Relative due dates are computed against `today`.
pub fn print_analysis_card(analysis: &DocumentAnalysis, today: NaiveDate) -> anyhow::Result<()> {
    let mut out = String::new();
    render_analysis(&mut out, analysis, today)?;
    print!("{out}");
    Ok(())
}

/// Print a stored analysis: provenance line, then the card.
pub fn print_stored_analysis(stored: &StoredAnalysis, today: NaiveDate) -> anyhow::Result<()> {
    println!(
        "Document #{}  model: {}  analysed: {}",
        stored.document_id,
        stored.model,
        short_timestamp(&stored.created_at)
    );
    println!();
    print_analysis_card(&stored.analysis, today)
}

pub fn print_failure(failure: &ValidationFailure) -> anyhow::Result<()> {
    let mut out = String::new();
    render_failure(&mut out, failure)?;
    eprint!("{out}");
    Ok(())
}

pub fn print_document_list(docs: &[DocumentSummary]) {
    if docs.is_empty() {
        println!("No documents.");
        return;
    }
    println!("{:>5}  {:<10}  {:<16}  filename", "id", "status", "created");
    for d in docs {
        println!(
            "{:>5}  {:<10}  {:<16}  {}",
            d.id,
            d.status,
            short_timestamp(&d.created_at),
            d.filename
        );
    }
}

pub fn print_document_detail(detail: &DocumentDetail) {
    let s = &detail.summary;
    println!("=== {} ===", s.filename);
    println!("  {:<14} {}", "id", s.id);
    println!("  {:<14} {}", "mimetype", s.mimetype);
    println!("  {:<14} {}", "status", s.status);
    println!("  {:<14} {}", "created", short_timestamp(&s.created_at));
    if let Some(path) = &detail.storage_path {
        println!("  {:<14} {}", "stored at", path);
    }
    println!("  {:<14} {}", "has text", yes_no(detail.has_text));
    println!("  {:<14} {}", "has analysis", yes_no(detail.has_analysis));
}

pub fn print_chat(messages: &[ChatMessage]) {
    if messages.is_empty() {
        println!("No messages yet.");
        return;
    }
    for m in messages {
        println!("[{}] {}", m.role.as_str(), short_timestamp(&m.created_at));
        println!("  {}", m.content);
    }
}

// ── Analysis card ──

fn render_analysis(
    out: &mut impl Write,
    analysis: &DocumentAnalysis,
    today: NaiveDate,
) -> fmt::Result {
    writeln!(out, "=== Analysis ({}) ===", analysis.language)?;
    if !analysis.summary.is_empty() {
        writeln!(out, "{}", analysis.summary)?;
    }
    writeln!(out)?;
    writeln!(
        out,
        "Risk: {}",
        analysis.overall_risk.as_str().to_ascii_uppercase()
    )?;
    writeln!(out)?;

    if !analysis.actions.is_empty() {
        writeln!(out, "Action items ({}):", analysis.actions.len())?;
        for a in analysis.actions.iter().take(MAX_LIST_ITEMS) {
            writeln!(
                out,
                "  [{}] {}  (confidence {:.2})",
                a.category, a.title, a.confidence
            )?;
            if !a.details.is_empty() {
                writeln!(out, "    {}", a.details)?;
            }
            if let Some(due) = &a.due_date {
                writeln!(out, "    Due: {} ({})", due, relative_day(due, today))?;
            }
            render_evidence(out, &a.evidence)?;
        }
        more(out, analysis.actions.len())?;
        writeln!(out)?;
    }

    if !analysis.deadlines.is_empty() {
        writeln!(out, "Deadlines ({}):", analysis.deadlines.len())?;
        for d in analysis.deadlines.iter().take(MAX_LIST_ITEMS) {
            writeln!(
                out,
                "  {} ({})  {}  (confidence {:.2})",
                d.date,
                relative_day(&d.date, today),
                d.meaning,
                d.confidence
            )?;
            render_evidence(out, &d.evidence)?;
        }
        more(out, analysis.deadlines.len())?;
        writeln!(out)?;
    }

    if !analysis.entities.is_empty() {
        writeln!(out, "Entities")?;
        render_entities(out, &analysis.entities)?;
        writeln!(out)?;
    }

    Ok(())
}

fn render_evidence(out: &mut impl Write, evidence: &Evidence) -> fmt::Result {
    if evidence.quote.is_empty() {
        return Ok(());
    }
    write!(out, "    Evidence: \"{}\"", truncate(&evidence.quote, MAX_QUOTE_CHARS))?;
    if let Some(page) = evidence.page {
        write!(out, " (p. {page})")?;
    }
    writeln!(out)
}

fn render_entities(out: &mut impl Write, e: &Entities) -> fmt::Result {
    if let Some(sender) = &e.sender {
        writeln!(out, "  {:<18} {}", "sender", sender)?;
    }
    if let Some(amount) = e.amount_eur {
        writeln!(out, "  {:<18} {:.2} EUR", "amount_eur", amount)?;
    }
    let rest = [
        ("iban", &e.iban),
        ("reference_number", &e.reference_number),
        ("contact_phone", &e.contact_phone),
        ("address", &e.address),
    ];
    for (name, value) in rest {
        if let Some(v) = value {
            writeln!(out, "  {:<18} {}", name, v)?;
        }
    }
    Ok(())
}

fn more(out: &mut impl Write, len: usize) -> fmt::Result {
    if len > MAX_LIST_ITEMS {
        writeln!(out, "  ... and {} more", len - MAX_LIST_ITEMS)?;
    }
    Ok(())
}

// ── Validation failures ──

fn render_failure(out: &mut impl Write, failure: &ValidationFailure) -> fmt::Result {
    match failure {
        ValidationFailure::MalformedJson {
            message,
            line,
            column,
        } => {
            writeln!(out, "Malformed JSON (line {line}, column {column}):")?;
            writeln!(out, "  {message}")
        }
        ValidationFailure::SchemaViolation(violations) => {
            writeln!(out, "Schema violations ({}):", violations.len())?;
            for v in violations {
                writeln!(out, "  {:<32} {}", v.path, v.kind)?;
            }
            Ok(())
        }
    }
}

// ── Helpers ──

/// Human distance from `today`, or a note when the shaped date is not a
/// real calendar day.
fn relative_day(date: &DocDate, today: NaiveDate) -> String {
    let (y, m, d) = date.parts();
    let Some(day) = i32::try_from(y)
        .ok()
        .and_then(|y| NaiveDate::from_ymd_opt(y, m, d))
    else {
        return "not a calendar date".to_string();
    };
    match (day - today).num_days() {
        0 => "today".to_string(),
        1 => "tomorrow".to_string(),
        -1 => "overdue by 1 day".to_string(),
        n if n > 1 => format!("in {n} days"),
        n => format!("overdue by {} days", -n),
    }
}

/// Char-safe truncation with a trailing ellipsis.
fn truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        return s.to_string();
    }
    let cut: String = s.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{cut}...")
}

/// `2024-02-01T09:30:00.123456+00:00` → `2024-02-01 09:30`.
fn short_timestamp(ts: &str) -> String {
    ts.chars()
        .take(16)
        .map(|c| if c == 'T' { ' ' } else { c })
        .collect()
}

fn yes_no(b: bool) -> &'static str {
    if b { "yes" } else { "no" }
}
