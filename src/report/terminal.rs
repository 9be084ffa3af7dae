use std::collections::HashMap;
use std::path::Path;

use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use super::PackageListing;
use crate::license::table::LicenseRisk;
use crate::models::{CheckCategory, Outcome, Report};

/// Visible columns inside the summary box.
const BOX_WIDTH: usize = 49;

const BOX_TOP: &str = " ┌────────────────────────────────────────────────────┐";
const BOX_BOTTOM: &str = " └────────────────────────────────────────────────────┘";

/// One row of the summary box. The text is padded before the marker is
/// colored so escape codes never count toward the width.
fn box_line(marker: Option<ColoredString>, text: &str) -> String {
    match marker {
        Some(marker) => format!(" │  {marker}  {text:<width$} │", width = BOX_WIDTH - 3),
        None => format!(" │  {text:<BOX_WIDTH$} │"),
    }
}

/// Render a colored check report.
pub fn render(report: &Report, env: &Path, verbose: bool, quiet: bool) {
    let pass_count = report.count(Outcome::Pass);
    let warn_count = report.count(Outcome::Warn);
    let fail_count = report.count(Outcome::Fail);

    if quiet {
        println!(
            "Checks: {}  Pass: {}  Warn: {}  Fail: {}",
            report.verdicts.len(),
            pass_count.to_string().green(),
            warn_count.to_string().yellow(),
            fail_count.to_string().red(),
        );
        return;
    }

    print_header(env);

    println!("{BOX_TOP}");
    println!(" │  {} │", format!("{:<BOX_WIDTH$}", "SUMMARY").bold());
    println!(
        "{}",
        box_line(
            None,
            &format!("Checks run         : {}", report.verdicts.len())
        )
    );
    for (outcome, count, marker) in [
        (Outcome::Pass, pass_count, "✓".green()),
        (Outcome::Warn, warn_count, "⚠".yellow()),
        (Outcome::Fail, fail_count, "✗".red()),
    ] {
        let label = match outcome {
            Outcome::Pass => "Pass",
            Outcome::Warn => "Warn",
            Outcome::Fail => "Fail",
        };
        let text = format!(
            "{label:<16}: {count:>4}  {}",
            summarize_categories(report, outcome)
        );
        println!("{}", box_line(Some(marker), &text));
    }
    println!("{BOX_BOTTOM}\n");

    if fail_count > 0 {
        println!(" {} Packages violating policy:\n", "[FAIL]".red().bold());
        render_verdicts(report, Outcome::Fail);
        println!();
    }

    if warn_count > 0 {
        println!(" {} Packages needing review:\n", "[WARN]".yellow().bold());
        render_verdicts(report, Outcome::Warn);
        println!();
    }

    if verbose && pass_count > 0 {
        println!(" {} All passing checks:\n", "[PASS]".green().bold());
        render_verdicts(report, Outcome::Pass);
        println!();
    }
}

/// Render the `list` table.
pub fn render_packages(rows: &[PackageListing], env: &Path, show_raw: bool) {
    print_header(env);

    let mut header = vec![
        Cell::new("Package").add_attribute(Attribute::Bold),
        Cell::new("Version").add_attribute(Attribute::Bold),
        Cell::new("License").add_attribute(Attribute::Bold),
        Cell::new("Risk").add_attribute(Attribute::Bold),
        Cell::new("Source").add_attribute(Attribute::Bold),
    ];
    if show_raw {
        header.push(Cell::new("Raw license").add_attribute(Attribute::Bold));
    }

    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header);

    for row in rows {
        let license = if row.clarified {
            format!("{} (clarified)", row.license.display())
        } else {
            row.license.display()
        };
        let license_color = if row.license.is_recognized() {
            Color::Reset
        } else {
            Color::DarkGrey
        };

        let mut cells = vec![
            Cell::new(&row.name),
            Cell::new(&row.version),
            Cell::new(license).fg(license_color),
            Cell::new(row.risk.to_string()).fg(risk_color(row.risk)),
            Cell::new(&row.source),
        ];
        if show_raw {
            cells.push(Cell::new(row.raw_licenses.join("\n")));
        }
        table.add_row(cells);
    }

    println!("{}", table);
    println!("\n {} packages", rows.len());
}

fn print_header(env: &Path) {
    println!(
        "\n {} v{}",
        "licenses-deny".bold(),
        env!("CARGO_PKG_VERSION")
    );
    println!(" Environment: {}\n", env.display());
}

fn render_verdicts(report: &Report, outcome: Outcome) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Package").add_attribute(Attribute::Bold),
            Cell::new("Version").add_attribute(Attribute::Bold),
            Cell::new("Check").add_attribute(Attribute::Bold),
            Cell::new("Detail").add_attribute(Attribute::Bold),
            Cell::new("Verdict").add_attribute(Attribute::Bold),
        ]);

    for verdict in report.with_outcome(outcome) {
        let (label, color) = match verdict.outcome {
            Outcome::Pass => ("✓ pass", Color::Green),
            Outcome::Warn => ("⚠ warn", Color::Yellow),
            Outcome::Fail => ("✗ fail", Color::Red),
        };

        table.add_row(vec![
            Cell::new(&verdict.package),
            Cell::new(&verdict.version),
            Cell::new(verdict.category.to_string()),
            Cell::new(&verdict.detail),
            Cell::new(label).fg(color).set_alignment(CellAlignment::Center),
        ]);
    }

    println!("{}", table);
}

fn risk_color(risk: LicenseRisk) -> Color {
    match risk {
        LicenseRisk::Permissive => Color::Green,
        LicenseRisk::WeakCopyleft => Color::Yellow,
        LicenseRisk::StrongCopyleft => Color::Red,
        LicenseRisk::Unknown => Color::DarkGrey,
    }
}

/// Per-category breakdown of verdicts with `outcome`, e.g. `[license (2), ban (1)]`.
fn summarize_categories(report: &Report, outcome: Outcome) -> String {
    let mut counts: HashMap<CheckCategory, usize> = HashMap::new();
    for verdict in report.with_outcome(outcome) {
        *counts.entry(verdict.category).or_insert(0) += 1;
    }

    let summary: Vec<String> = CheckCategory::ALL
        .iter()
        .filter_map(|category| {
            counts
                .get(category)
                .map(|count| format!("{} ({})", category, count))
        })
        .collect();

    if summary.is_empty() {
        String::new()
    } else {
        format!("[{}]", summary.join(", "))
    }
}
