// Colored terminal output for identification results and corpus operations.
//
// The main.rs command handlers delegate here for anything beyond one-line
// confirmations.

use colored::Colorize;

use crate::matching::vector::RebuildReport;
use crate::matching::{IdentificationResult, MatchOutcome};
use crate::pipeline::ingest::IngestSummary;
use crate::text::NormalizedVariants;

/// Display the outcome of an identification.
pub fn display_outcome(outcome: &MatchOutcome, threshold: f64) {
    match outcome {
        MatchOutcome::Identified(result) => display_identified(result),
        MatchOutcome::NoMatch(result) => {
            println!("{}", "No match".yellow().bold());
            println!(
                "  No episode reached the {:.2} threshold (best confidence {})",
                threshold,
                colorize_confidence(result.confidence, threshold)
            );
        }
        MatchOutcome::Failed { reason, .. } => {
            println!("{}", "Identification failed".red().bold());
            println!("  {}", reason);
        }
    }
}

fn display_identified(result: &IdentificationResult) {
    let Some(label) = result.label() else {
        return;
    };
    println!("{} {}", "Match:".green().bold(), label.to_string().bold());
    println!("  Series:     {}", label.series);
    println!("  Season:     {}", label.season);
    println!("  Episode:    {}", label.episode);
    println!(
        "  Confidence: {}",
        colorize_confidence(result.confidence, 0.0)
    );
    if let Some(notes) = &result.ambiguity_notes {
        println!("  {} {}", "Ambiguous:".yellow(), notes);
    }
}

/// Display every normalized variant of a subtitle text.
pub fn display_variants(variants: &NormalizedVariants) {
    for (name, text) in variants.iter() {
        println!("{}", format!("=== {name} ({} chars) ===", text.chars().count()).bold());
        println!("{text}");
        println!();
    }
}

/// Display the result of a manifest ingestion.
pub fn display_ingest_summary(summary: &IngestSummary) {
    println!(
        "{} {} fingerprints ingested",
        "Done:".green().bold(),
        summary.inserted
    );
    if summary.failed.is_empty() {
        return;
    }
    println!(
        "  {} {} entries failed:",
        "!".bright_red(),
        summary.failed.len()
    );
    for failure in &summary.failed {
        println!(
            "    {}  {}",
            failure.path.display(),
            super::truncate_chars(&failure.error, 120).dimmed()
        );
    }
}

/// Display the result of an index rebuild.
pub fn display_rebuild(report: &RebuildReport) {
    println!(
        "{} version {} ({} backend, {} vectors)",
        "Index rebuilt:".green().bold(),
        report.version,
        report.backend,
        report.indexed
    );
    if report.skipped > 0 {
        println!(
            "  {} {} stored embeddings skipped (wrong dimension)",
            "~".yellow(),
            report.skipped
        );
    }
}

/// Green at or above the threshold, yellow within 0.2 below it, red otherwise.
fn colorize_confidence(confidence: f64, threshold: f64) -> colored::ColoredString {
    let text = format!("{confidence:.3}");
    if confidence >= threshold {
        text.green()
    } else if confidence >= threshold - 0.2 {
        text.yellow()
    } else {
        text.red()
    }
}
