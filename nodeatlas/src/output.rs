//! Output rendering: plain-text tables and JSON.

use clap::ValueEnum;
use std::io::Write;

use crate::error::Result;
use crate::model::{EnrichedNode, NodeRole, ProbeMode};
use crate::pipeline::RunOutcome;

/// How many entries the aggregate tables show.
const TOP_N: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
}

/// Render a run outcome to the given writer.
pub fn render(out: &mut impl Write, outcome: &RunOutcome, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => render_json(out, outcome),
        OutputFormat::Table => render_table(out, outcome),
    }
}

fn render_json(out: &mut impl Write, outcome: &RunOutcome) -> Result<()> {
    serde_json::to_writer_pretty(&mut *out, outcome)?;
    writeln!(out)?;
    Ok(())
}

fn render_table(out: &mut impl Write, outcome: &RunOutcome) -> Result<()> {
    match outcome.mode {
        ProbeMode::Single | ProbeMode::List => render_node_table(out, outcome)?,
        ProbeMode::Aggregate => render_aggregate(out, outcome)?,
    }

    if !outcome.failed_sources.is_empty() {
        writeln!(
            out,
            "\nwarning: sources failed this run: {}",
            outcome.failed_sources.join(", ")
        )?;
    }
    Ok(())
}

fn render_node_table(out: &mut impl Write, outcome: &RunOutcome) -> Result<()> {
    writeln!(out, "{}: {} node(s)\n", outcome.network, outcome.nodes.len())?;
    writeln!(
        out,
        "{:<40} {:<6} {:<10} {:<18} {:<16} {:<14} {:<12}",
        "ENDPOINT", "PORT", "ROLE", "CITY", "COUNTRY", "CLOUD", "REGION"
    )?;

    for node in &outcome.nodes {
        writeln!(
            out,
            "{:<40} {:<6} {:<10} {:<18} {:<16} {:<14} {:<12}",
            field(&node.node.ip.map(|ip| ip.to_string())),
            field(&node.node.port.map(|p| p.to_string())),
            node.node.role.as_str(),
            field(&node.city),
            field(&node.country),
            field(&node.cloud_provider),
            field(&node.cloud_region),
        )?;
    }

    let authorities = outcome
        .nodes
        .iter()
        .filter(|n| n.node.role == NodeRole::Authority)
        .count();
    let unreachable = count_unreachable(&outcome.nodes);
    writeln!(
        out,
        "\n{} authority node(s), {} declared but unreachable",
        authorities, unreachable
    )?;
    Ok(())
}

fn render_aggregate(out: &mut impl Write, outcome: &RunOutcome) -> Result<()> {
    let stats = &outcome.stats;
    writeln!(
        out,
        "{}: {} node(s) crawled\n",
        outcome.network, stats.total
    )?;

    writeln!(out, "Top countries:")?;
    for (country, count) in stats.top_countries(TOP_N) {
        writeln!(out, "  {:<30} {:>8}", country, count)?;
    }

    writeln!(out, "\nTop networks:")?;
    for (asn, count) in stats.top_asns(TOP_N) {
        writeln!(out, "  {:<50} {:>8}", asn, count)?;
    }

    writeln!(
        out,
        "\nCloud: {}  Bare metal: {}  (of {})",
        stats.cloud_nodes, stats.bare_metal_nodes, stats.total
    )?;
    Ok(())
}

fn count_unreachable(nodes: &[EnrichedNode]) -> usize {
    nodes.iter().filter(|n| n.node.ip.is_none()).count()
}

fn field(value: &Option<String>) -> String {
    value.clone().unwrap_or_else(|| "-".to_string())
}
