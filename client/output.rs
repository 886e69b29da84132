//! Renders RPC responses as human-readable tables.

use comfy_table::{presets::UTF8_HORIZONTAL_ONLY, Cell, ContentArrangement, Table};

use crate::client::ListTasksResponse;

fn id_cells(label: &str, ids: &[i32]) -> Vec<Cell> {
    let rendered = if ids.is_empty() {
        "-".to_string()
    } else {
        ids.iter()
            .map(|id| id.to_string())
            .collect::<Vec<_>>()
            .join(", ")
    };
    vec![Cell::new(label), Cell::new(rendered)]
}

pub fn render_list(response: &ListTasksResponse) -> Table {
    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .load_preset(UTF8_HORIZONTAL_ONLY)
        .set_header(vec!["state", "task ids"])
        .add_row(id_cells("active", &response.active))
        .add_row(id_cells("queued", &response.queued))
        .add_row(id_cells("paused", &response.paused))
        .add_row(id_cells("runnable (paused)", &response.runnable_paused));

    table
}

pub fn render_command(command: &[String]) -> Table {
    let mut table = Table::new();
    table
        .set_content_arrangement(ContentArrangement::Dynamic)
        .load_preset(UTF8_HORIZONTAL_ONLY)
        .set_header(vec!["command"])
        .add_row(vec![Cell::new(command.join(" "))]);

    table
}
