use std::collections::BTreeMap;

use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use eicu_cli::types::{RevisionResult, RunResult};
use eicu_core::pipeline::TableVocabulary;
use eicu_core::{
    EncodeSummary, FrequencyStats, MergeSummary, MergedDictionary, PatientDictionarySummary,
    RevisionOutcome,
};
use eicu_model::CodeType;

pub fn print_run_summary(result: &RunResult) {
    println!("Output: {}", result.output_dir.display());
    print_vocabulary_summary(&result.vocabularies);
    print_dictionary_summary(&result.dictionary);
    print_encode_summary(&result.encoded);
    print_merge_summary(result.merged.as_ref());
    print_revision_summary(&result.revision);
    print_patients_summary(&result.patients);
}

pub fn print_vocabulary_summary(vocabularies: &[TableVocabulary]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Table"),
        header_cell("Rows"),
        header_cell("Codes"),
        header_cell("Valued"),
        header_cell("<unk>"),
        header_cell("Skipped"),
        header_cell("File"),
    ]);
    apply_summary_table_style(&mut table);
    for index in 1..=5 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    for built in vocabularies {
        let vocabulary = &built.vocabulary;
        table.add_row(vec![
            table_cell(vocabulary.code_type.table_name()),
            Cell::new(vocabulary.rows),
            Cell::new(vocabulary.entries.len()),
            Cell::new(vocabulary.valued_codes()),
            count_cell(Some(vocabulary.unknown_frequency), Color::Yellow),
            count_cell(Some(vocabulary.skipped_rows), Color::Yellow),
            dim_cell(built.path.display()),
        ]);
    }
    println!("{table}");
}

pub fn print_dictionary_summary(merged: &MergedDictionary) {
    println!(
        "Dictionary: {} codes from {} files",
        merged.dictionary.len(),
        merged.sources.len()
    );
    let stats = &merged.stats;
    let mut rows: Vec<(String, Option<&FrequencyStats>)> =
        vec![("all".to_string(), stats.overall.as_ref())];
    rows.extend(by_type_rows(&stats.by_type));
    rows.push(("valued".to_string(), stats.valued.as_ref()));
    print_stats_table(&rows);
    println!("Value occurrences: {}", stats.value_sum);
    if let Some(ratio) = stats.mean_value_ratio {
        println!("Mean value ratio: {ratio:.4}");
    }
}

pub fn print_encode_summary(summaries: &[EncodeSummary]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Table"),
        header_cell("Chunks"),
        header_cell("Rows"),
        header_cell("Encoded"),
        header_cell("Unknown codes"),
        header_cell("Unknown patients"),
        header_cell("Skipped"),
        header_cell("Patients"),
        header_cell("Files"),
    ]);
    apply_summary_table_style(&mut table);
    for index in 1..=8 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    let mut total_rows = 0u64;
    let mut total_encoded = 0u64;
    for summary in summaries {
        total_rows += summary.rows;
        total_encoded += summary.encoded;
        table.add_row(vec![
            table_cell(&summary.table),
            Cell::new(summary.chunks),
            Cell::new(summary.rows),
            Cell::new(summary.encoded),
            count_cell(Some(summary.unknown_codes), Color::Yellow),
            count_cell(Some(summary.unknown_patients), Color::Yellow),
            count_cell(Some(summary.skipped_rows), Color::Yellow),
            Cell::new(summary.patients_written),
            Cell::new(summary.files.len()),
        ]);
    }
    table.add_row(vec![
        total_cell("TOTAL"),
        dim_cell("-"),
        Cell::new(total_rows).add_attribute(Attribute::Bold),
        Cell::new(total_encoded).add_attribute(Attribute::Bold),
        dim_cell("-"),
        dim_cell("-"),
        dim_cell("-"),
        dim_cell("-"),
        dim_cell("-"),
    ]);
    println!("{table}");
}

pub fn print_merge_summary(summary: Option<&MergeSummary>) {
    match summary {
        Some(summary) => {
            println!("Tuples: {}", summary.output.display());
            println!(
                "  {} tuples for {} patients from {} partial files",
                summary.tuples, summary.patients, summary.files
            );
            println!("  sha256 {}", summary.sha256);
        }
        None => println!("Tuples: skipped, no partial files"),
    }
}

pub fn print_revision_summary(result: &RevisionResult) {
    println!("Revised dictionary: {}", result.paths.revised.display());
    let report = match &result.outcome {
        RevisionOutcome::Revised(report) => report,
        RevisionOutcome::FellBack { error } => {
            let kind = if error.is_systemic() {
                "systemic"
            } else {
                "transient"
            };
            println!("  copied unmodified after {kind} failure: {error}");
            return;
        }
    };
    println!("Revision report: {}", result.paths.report.display());
    if report.is_clean() {
        println!("  no frequency change across {} tuples", report.tuples);
        return;
    }
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Index"),
        header_cell("Code"),
        header_cell("Type"),
        header_cell("Field"),
        header_cell("Recorded"),
        header_cell("Recomputed"),
    ]);
    apply_summary_table_style(&mut table);
    align_column(&mut table, 0, CellAlignment::Right);
    align_column(&mut table, 4, CellAlignment::Right);
    align_column(&mut table, 5, CellAlignment::Right);
    for change in &report.changes {
        table.add_row(vec![
            Cell::new(change.index),
            Cell::new(&change.code),
            Cell::new(change.code_type.as_str()),
            Cell::new(change.field.as_str()),
            Cell::new(change.recorded),
            Cell::new(change.recomputed).fg(Color::Yellow),
        ]);
    }
    for (index, count) in &report.unknown_codes {
        table.add_row(vec![
            Cell::new(index),
            dim_cell("-"),
            dim_cell("-"),
            Cell::new("unknown index").fg(Color::Red),
            dim_cell("-"),
            Cell::new(count).fg(Color::Red),
        ]);
    }
    println!("{table}");
}

pub fn print_patients_summary(summary: &PatientDictionarySummary) {
    match summary.recorded {
        Some(recorded) => println!(
            "Patients: {} written ({} recorded in tuples)",
            summary.written, recorded
        ),
        None => println!("Patients: {} written (full roster)", summary.written),
    }
    if summary.duplicates > 0 {
        println!("  {} duplicate roster rows ignored", summary.duplicates);
    }
}

fn by_type_rows(
    by_type: &BTreeMap<CodeType, FrequencyStats>,
) -> impl Iterator<Item = (String, Option<&FrequencyStats>)> {
    by_type
        .iter()
        .map(|(code_type, stats)| (code_type.as_str().to_string(), Some(stats)))
}

fn print_stats_table(rows: &[(String, Option<&FrequencyStats>)]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Scope"),
        header_cell("Codes"),
        header_cell("Sum"),
        header_cell("Mean"),
        header_cell("Median"),
        header_cell("Max"),
        header_cell("Min"),
    ]);
    apply_summary_table_style(&mut table);
    for index in 1..=6 {
        align_column(&mut table, index, CellAlignment::Right);
    }
    for (scope, stats) in rows {
        let Some(stats) = stats else {
            table.add_row(vec![
                Cell::new(scope),
                dim_cell("-"),
                dim_cell("-"),
                dim_cell("-"),
                dim_cell("-"),
                dim_cell("-"),
                dim_cell("-"),
            ]);
            continue;
        };
        table.add_row(vec![
            Cell::new(scope),
            Cell::new(stats.code_num),
            Cell::new(stats.sum),
            Cell::new(format!("{:.2}", stats.mean)),
            Cell::new(format!("{:.1}", stats.median)),
            Cell::new(stats.max),
            Cell::new(stats.min),
        ]);
    }
    println!("{table}");
}

fn apply_summary_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .apply_modifier(UTF8_SOLID_INNER_BORDERS)
        .set_content_arrangement(ContentArrangement::DynamicFullWidth)
        .set_width(140);
}

fn align_column(table: &mut Table, index: usize, alignment: CellAlignment) {
    if let Some(column) = table.column_mut(index) {
        column.set_cell_alignment(alignment);
    }
}

fn header_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn table_cell(name: &str) -> Cell {
    Cell::new(name)
        .fg(Color::Blue)
        .add_attribute(Attribute::Bold)
}

fn total_cell(label: &str) -> Cell {
    Cell::new(label)
        .fg(Color::Cyan)
        .add_attribute(Attribute::Bold)
}

fn count_cell(count: Option<u64>, color: Color) -> Cell {
    match count {
        Some(0) => dim_cell(0),
        Some(value) => Cell::new(value).fg(color),
        None => dim_cell("-"),
    }
}

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
