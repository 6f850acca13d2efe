use std::sync::Arc;

use comfy_table::modifiers::{UTF8_ROUND_CORNERS, UTF8_SOLID_INNER_BORDERS};
use comfy_table::presets::{UTF8_FULL, UTF8_FULL_CONDENSED};
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use fieldmap_model::{
    AliasTable, CandidateMatch, ConfidenceLevel, EntitySchema, MappingResult, MappingRun,
    MatchMethod,
};

pub fn print_run(run: &MappingRun) {
    println!(
        "Schema: {} (version {})",
        run.target_schema_id, run.schema_version
    );
    println!("Auto-accept threshold: {:.2}", run.auto_accept_threshold);

    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Column"),
        header_cell("Field"),
        header_cell("Method"),
        header_cell("Confidence"),
        header_cell("Level"),
        header_cell("Review"),
        header_cell("Alternatives"),
    ]);
    apply_run_table_style(&mut table);
    align_column(&mut table, 3, CellAlignment::Right);
    align_column(&mut table, 5, CellAlignment::Center);
    for result in &run.results {
        table.add_row(result_row(result));
    }
    println!("{table}");
    print_stats(run);
}

fn result_row(result: &MappingResult) -> Vec<Cell> {
    let Some(accepted) = &result.accepted else {
        return vec![
            Cell::new(&result.source_name),
            dim_cell("-"),
            dim_cell("-"),
            dim_cell("-"),
            dim_cell("-"),
            review_cell(true),
            dim_cell("-"),
        ];
    };
    vec![
        Cell::new(&result.source_name),
        Cell::new(&accepted.target_field)
            .fg(Color::Blue)
            .add_attribute(Attribute::Bold),
        method_cell(accepted.method),
        Cell::new(format!("{:.3}", accepted.confidence)),
        level_cell(result.confidence_level),
        review_cell(result.needs_review),
        alternatives_cell(&result.alternatives),
    ]
}

fn print_stats(run: &MappingRun) {
    let stats = &run.stats;
    let mut table = Table::new();
    table.set_header(vec![header_cell("Outcome"), header_cell("Columns")]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    for method in MatchMethod::ALL {
        let count = stats.accepted_by_method.get(&method).copied().unwrap_or(0);
        table.add_row(vec![method_cell(method), count_cell(count, Color::Green)]);
    }
    table.add_row(vec![Cell::new("unmatched"), count_cell(stats.unmatched, Color::Red)]);
    table.add_row(vec![
        Cell::new("needs review").add_attribute(Attribute::Bold),
        count_cell(stats.needs_review, Color::Yellow),
    ]);
    println!();
    println!("{table}");

    if stats.reasoning_columns > 0 {
        println!(
            "Reasoning: {} columns, {} cache hits, {} external calls",
            stats.reasoning_columns, stats.reasoning_cache_hits, stats.external_call_count
        );
        for (credential, calls) in &stats.credential_usage {
            println!("  {credential}: {calls} calls");
        }
    }
    if stats.quota_exhausted {
        eprintln!("warning: every reasoning credential is at quota or on standby");
    }
    for degradation in &stats.degraded {
        eprintln!(
            "warning: {} tier degraded ({}), {} columns affected",
            degradation.tier, degradation.reason, degradation.affected_columns
        );
    }
}

pub fn print_schema_list(schemas: &[(Arc<EntitySchema>, usize)]) {
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Schema"),
        header_cell("Fields"),
        header_cell("Required"),
        header_cell("Aliases"),
        header_cell("Version"),
    ]);
    apply_table_style(&mut table);
    align_column(&mut table, 1, CellAlignment::Right);
    align_column(&mut table, 2, CellAlignment::Right);
    align_column(&mut table, 3, CellAlignment::Right);
    for (schema, aliases) in schemas {
        let required = schema.fields().iter().filter(|f| f.required).count();
        table.add_row(vec![
            Cell::new(schema.id())
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(schema.len()),
            Cell::new(required),
            Cell::new(aliases),
            dim_cell(schema.version()),
        ]);
    }
    println!("{table}");
}

pub fn print_schema_fields(schema: &EntitySchema, aliases: &AliasTable) {
    println!("Schema: {} (version {})", schema.id(), schema.version());
    let mut table = Table::new();
    table.set_header(vec![
        header_cell("Field"),
        header_cell("Label"),
        header_cell("Type"),
        header_cell("Required"),
        header_cell("Aliases"),
        header_cell("Description"),
    ]);
    apply_run_table_style(&mut table);
    align_column(&mut table, 3, CellAlignment::Center);
    for field in schema.fields() {
        let field_aliases: Vec<&str> = aliases.aliases_for(&field.name).collect();
        table.add_row(vec![
            Cell::new(&field.name)
                .fg(Color::Blue)
                .add_attribute(Attribute::Bold),
            Cell::new(field.label()),
            Cell::new(field.data_type),
            if field.required {
                Cell::new("✓").fg(Color::Green)
            } else {
                dim_cell("-")
            },
            text_or_dash(&field_aliases.join(", ")),
            text_or_dash(&field.description),
        ]);
    }
    println!("{table}");
}

fn alternatives_cell(alternatives: &[CandidateMatch]) -> Cell {
    if alternatives.is_empty() {
        return dim_cell("-");
    }
    let text = alternatives
        .iter()
        .map(|c| format!("{} {:.2} ({})", c.target_field, c.confidence, c.method))
        .collect::<Vec<_>>()
        .join("\n");
    Cell::new(text).fg(Color::DarkGrey)
}

fn method_cell(method: MatchMethod) -> Cell {
    let color = match method {
        MatchMethod::Exact | MatchMethod::Alias => Color::Green,
        MatchMethod::Reasoning => Color::Magenta,
        MatchMethod::Semantic => Color::Cyan,
        MatchMethod::Fuzzy => Color::Yellow,
    };
    Cell::new(method).fg(color)
}

fn level_cell(level: Option<ConfidenceLevel>) -> Cell {
    match level {
        Some(ConfidenceLevel::High) => Cell::new("high").fg(Color::Green),
        Some(ConfidenceLevel::Medium) => Cell::new("medium").fg(Color::Yellow),
        Some(ConfidenceLevel::Low) => Cell::new("low").fg(Color::Red),
        None => dim_cell("-"),
    }
}

fn review_cell(needs_review: bool) -> Cell {
    if needs_review {
        Cell::new("!").fg(Color::Yellow).add_attribute(Attribute::Bold)
    } else {
        dim_cell("-")
    }
}

fn count_cell(count: usize, color: Color) -> Cell {
    if count > 0 {
        Cell::new(count).fg(color).add_attribute(Attribute::Bold)
    } else {
        dim_cell(count)
    }
}

fn text_or_dash(text: &str) -> Cell {
    if text.is_empty() {
        dim_cell("-")
    } else {
        Cell::new(text)
    }
}

fn apply_table_style(table: &mut Table) {
    table
        .load_preset(UTF8_FULL_CONDENSED)
        .apply_modifier(UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
}

fn apply_run_table_style(table: &mut Table) {
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

fn dim_cell<T: ToString>(value: T) -> Cell {
    Cell::new(value).fg(Color::DarkGrey)
}
