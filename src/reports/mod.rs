use comfy_table::presets::ASCII_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};
use ratesmooth::api::Optimization;
use ratesmooth::array::Array;
use ratesmooth::optimizer::RelaxationState;
use ratesmooth::tree::Tree;
use ratesmooth::SmoothResult;
use serde::Serialize;

fn fmt_opt(v: Option<f64>) -> String {
    v.map_or_else(|| "-".to_string(), |x| format!("{:.4}", x))
}

fn right_align(table: &mut Table, from: usize, to: usize) {
    for i in from..=to {
        if let Some(col) = table.column_mut(i) {
            col.set_cell_alignment(CellAlignment::Right);
        }
    }
}

pub fn print_node_table(dated: &Tree) {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Node").add_attribute(Attribute::Bold),
        Cell::new("Age").fg(Color::Cyan),
        Cell::new("Rate").fg(Color::Green),
        Cell::new("Subs"),
        Cell::new("Fix"),
        Cell::new("Min"),
        Cell::new("Max"),
    ]);

    for id in dated.preorder() {
        let node = dated.node(id);
        table.add_row(vec![
            Cell::new(dated.display_label(id)),
            Cell::new(fmt_opt(node.age)).fg(Color::Cyan),
            Cell::new(node.rate.map_or_else(|| "-".to_string(), |r| format!("{:.6}", r))),
            Cell::new(format!("{}", node.subs)),
            Cell::new(fmt_opt(node.fix)),
            Cell::new(fmt_opt(node.min)),
            Cell::new(fmt_opt(node.max)),
        ]);
    }
    right_align(&mut table, 1, 6);

    println!("\n=== NODE AGES ===");
    println!("{}", table);
}

pub fn print_diagnostics(opt: &Optimization) {
    let diag = &opt.diagnostics;
    let mut table = Table::new();
    table.load_preset(ASCII_FULL);
    table.set_header(vec![
        Cell::new("Restart").add_attribute(Attribute::Bold),
        Cell::new("Objective"),
        Cell::new("Rounds"),
        Cell::new("State"),
    ]);

    for r in &diag.restarts {
        let is_best = diag.best_restart == Some(r.restart);
        let state_color = match r.state {
            RelaxationState::Converged => Color::Green,
            RelaxationState::LimitReached => Color::Yellow,
            RelaxationState::Iterating => Color::Red,
        };
        let mut label = Cell::new(format!("#{}", r.restart));
        if is_best {
            label = label.add_attribute(Attribute::Bold).fg(Color::Cyan);
        }
        table.add_row(vec![
            label,
            Cell::new(format!("{:.6e}", r.value)),
            Cell::new(r.rounds),
            Cell::new(r.state).fg(state_color),
        ]);
    }
    right_align(&mut table, 1, 2);

    println!("\n=== RESTARTS ===");
    println!("{}", table);
    println!("Best objective: {:.6e}", opt.value);
    if diag.limit_reached {
        println!("WARNING: best restart hit the barrier iteration limit without converging");
    }
    if diag.cancelled {
        println!("NOTE: search was cancelled; results are the best found so far");
    }
}

pub fn print_bounds_table(array: &Array) {
    let mut table = Table::new();
    table
        .load_preset(ASCII_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("#").add_attribute(Attribute::Bold),
        Cell::new("Node").add_attribute(Attribute::Bold),
        Cell::new("Parent"),
        Cell::new("Subs"),
        Cell::new("Low").fg(Color::Cyan),
        Cell::new("Fix"),
        Cell::new("High").fg(Color::Cyan),
        Cell::new("Order"),
        Cell::new("Free"),
    ]);

    for i in 0..array.n {
        let parent = if array.is_root(i) {
            "-".to_string()
        } else {
            array.labels[array.parent[i]].clone()
        };
        let free = if array.is_free(i) {
            Cell::new("yes").fg(Color::Green)
        } else {
            Cell::new("no")
        };
        table.add_row(vec![
            Cell::new(i),
            Cell::new(&array.labels[i]),
            Cell::new(parent),
            Cell::new(array.subs[i]),
            Cell::new(fmt_opt(array.low[i])),
            Cell::new(fmt_opt(array.fix[i])),
            Cell::new(fmt_opt(array.high[i])),
            Cell::new(array.order[i]),
            free,
        ]);
    }
    right_align(&mut table, 3, 7);

    println!("\n=== PROPAGATED BOUNDS ===");
    println!("{}", table);
}

#[derive(Serialize)]
struct AgeRow {
    node: String,
    parent: Option<String>,
    age: Option<f64>,
    rate: Option<f64>,
}

/// One CSV row per node, in preorder.
pub fn write_ages_csv(path: &str, dated: &Tree) -> SmoothResult<()> {
    let mut wtr = csv::Writer::from_path(path)?;
    for id in dated.preorder() {
        let node = dated.node(id);
        wtr.serialize(AgeRow {
            node: dated.display_label(id),
            parent: node.parent.map(|p| dated.display_label(p)),
            age: node.age,
            rate: node.rate,
        })?;
    }
    wtr.flush()?;
    Ok(())
}
