use colored::Colorize;

use super::config;
use super::subscription::ConnectionStatus;
use super::view_model::{ChainView, ContractRow, StrikeGroup};

const CELL_WIDTH: usize = 9;

/// Plain-text strike grid: calls on the left, puts on the right
pub fn render_chain(symbol: &str, expiry: &str, view: &ChainView, status: ConnectionStatus) -> String {
    let mut out = String::new();

    out.push_str(&format!(
        "{} {}  {}\n",
        symbol.yellow().bold(),
        expiry.cyan(),
        status_label(status)
    ));

    match &view.underlying {
        Some(u) => out.push_str(&format!(
            "Underlying  Bid: {} ({})  |  Ask: {} ({})\n",
            u.bid.green(),
            u.bid_size,
            u.ask.red(),
            u.ask_size
        )),
        None => out.push_str(&format!("Underlying  {}\n", config::NO_VALUE)),
    }

    if view.rows.is_empty() {
        out.push_str(&format!("{}\n", "No data yet".dimmed()));
        return out;
    }

    let side_header = ["Bid", "Ask", "Delta", "Gamma", "Theta", "Vega", "IV"];
    let mut header: Vec<String> = side_header.iter().map(|h| pad(h)).collect();
    header.push(pad("Strike"));
    header.extend(side_header.iter().rev().map(|h| pad(h)));
    out.push_str(&format!("{}\n", header.join(" ").bold()));

    for group in &view.rows {
        out.push_str(&render_row(group));
        out.push('\n');
    }

    out.push_str(&format!("{} contracts\n", view.contract_count));
    out
}

fn render_row(group: &StrikeGroup) -> String {
    let mut cells = side_cells(group.call.as_ref());
    let strike = pad(&group.strike_label);
    cells.push(if group.is_atm {
        strike.yellow().bold().to_string()
    } else {
        strike
    });
    let mut put = side_cells(group.put.as_ref());
    put.reverse();
    cells.extend(put);
    cells.join(" ")
}

fn side_cells(row: Option<&ContractRow>) -> Vec<String> {
    match row {
        Some(r) => {
            let c = &r.cells;
            [&c.bid, &c.ask, &c.delta, &c.gamma, &c.theta, &c.vega, &c.iv]
                .into_iter()
                .map(|s| pad(s))
                .collect()
        }
        None => (0..7).map(|_| pad(config::NO_VALUE)).collect(),
    }
}

fn pad(s: &str) -> String {
    format!("{:>width$}", s, width = CELL_WIDTH)
}

fn status_label(status: ConnectionStatus) -> String {
    match status {
        ConnectionStatus::Connected => "● live".green().to_string(),
        ConnectionStatus::Connecting => "○ connecting".yellow().to_string(),
        ConnectionStatus::Errored => "✗ stream error".red().to_string(),
        ConnectionStatus::Closed => "■ closed".red().to_string(),
        ConnectionStatus::Idle => "○ idle".dimmed().to_string(),
    }
}
