use super::{rate, ui};
use crate::CloseOptions;
use crate::core::ledger::active_entries;
use crate::core::table::identity_key;
use crate::core::{Aggregates, ClosingCycle, ClosingSession, LedgerEntry, RatePolicy, RateQuote};
use anyhow::{Context, Result};
use comfy_table::Cell;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::info;

/// One row of an amounts file. Codes may be written as numbers.
#[derive(Debug, Deserialize)]
struct AmountRow {
    #[serde(alias = "account_code")]
    code: Value,
    amount: Decimal,
}

/// Reads a YAML or JSON list of `{code, amount}` rows.
pub fn load_entries(path: &Path) -> Result<Vec<LedgerEntry>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read amounts file: {}", path.display()))?;
    let rows: Vec<AmountRow> = serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse amounts file: {}", path.display()))?;

    rows.into_iter()
        .enumerate()
        .map(|(index, row)| {
            let code = match row.code {
                Value::String(code) => code.trim().to_string(),
                Value::Number(code) => code.to_string(),
                other => anyhow::bail!("Row {index}: unsupported account code {other}"),
            };
            Ok(LedgerEntry::new(&code, row.amount))
        })
        .collect()
}

/// Applies `overrides` on top of `entries`, replacing amounts of matching codes.
pub fn merge_entries(mut entries: Vec<LedgerEntry>, overrides: &[LedgerEntry]) -> Vec<LedgerEntry> {
    for entry in overrides {
        let key = identity_key(&entry.account_code);
        match entries
            .iter_mut()
            .find(|e| identity_key(&e.account_code) == key)
        {
            Some(existing) => existing.amount = entry.amount,
            None => entries.push(entry.clone()),
        }
    }
    entries
}

fn subtotals_table(
    label: &str,
    local: &BTreeMap<String, Decimal>,
    converted: Option<&BTreeMap<String, Decimal>>,
    currency: &str,
    base_currency: &str,
) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell(label),
        ui::header_cell(&format!("Amount ({currency})")),
        ui::header_cell(&format!("Amount ({base_currency})")),
    ]);
    for (key, sum) in local {
        table.add_row(vec![
            Cell::new(key),
            ui::amount_cell(*sum),
            ui::format_optional_cell(converted.and_then(|c| c.get(key)), |v| {
                ui::format_amount(*v)
            }),
        ]);
    }
    table.to_string()
}

fn entries_table(session: &ClosingSession, entries: &[LedgerEntry]) -> String {
    let quote = &session.quote;
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Code"),
        ui::header_cell("Description"),
        ui::header_cell("Class"),
        ui::header_cell("Type"),
        ui::header_cell(&format!("Amount ({})", quote.currency)),
    ]);
    for (entry, account) in active_entries(entries, session.accounts()).entries {
        table.add_row(vec![
            Cell::new(&account.code),
            Cell::new(&account.description),
            Cell::new(&account.class_tag),
            Cell::new(&account.type_tag),
            ui::amount_cell(entry.amount),
        ]);
    }
    table.to_string()
}

fn total_line(currency: &str, total: Option<Decimal>) -> String {
    let (value, style_type) = match total {
        Some(total) => (ui::format_amount(total), ui::StyleType::TotalValue),
        None => ("N/A".to_string(), ui::StyleType::Error),
    };
    format!(
        "Total ({}): {}",
        ui::style_text(currency, ui::StyleType::TotalLabel),
        ui::style_text(&value, style_type)
    )
}

/// Renders the closing summary: rate, active entries, subtotals and totals.
pub fn summary(session: &ClosingSession, entries: &[LedgerEntry], base_currency: &str) -> String {
    let quote: &RateQuote = &session.quote;
    let totals: Aggregates = session.summarize(entries);
    let converted = totals.convert(quote).ok();

    let mut output = format!(
        "Closing: {} ({}), {}\n\n",
        ui::style_text(&session.country.identifier, ui::StyleType::Title),
        session.country.currency_label(),
        quote.as_of.format("%Y-%m-%d")
    );
    output.push_str(&rate::quote_table(quote, base_currency));
    output.push_str("\n\n");

    if totals.active_count == 0 {
        output.push_str(&ui::style_text("No non-zero amounts", ui::StyleType::Subtle));
    } else {
        output.push_str(&entries_table(session, entries));
        output.push_str("\n\n");
        output.push_str(&subtotals_table(
            "Class",
            &totals.by_class,
            converted.as_ref().map(|c| &c.by_class),
            &quote.currency,
            base_currency,
        ));
        output.push_str("\n\n");
        output.push_str(&subtotals_table(
            "Type",
            &totals.by_type,
            converted.as_ref().map(|c| &c.by_type),
            &quote.currency,
            base_currency,
        ));
        output.push_str("\n\n");
        output.push_str(&total_line(&quote.currency, Some(totals.total)));
        output.push('\n');
        output.push_str(&total_line(base_currency, converted.map(|c| c.total)));
    }

    for skipped in &totals.skipped {
        output.push_str(&format!(
            "\n{}",
            ui::style_text(
                &format!(
                    "Skipped {} for unknown account {}",
                    ui::format_amount(skipped.amount),
                    skipped.account_code
                ),
                ui::StyleType::Warning
            )
        ));
    }
    output
}

pub async fn run(cycle: &ClosingCycle, options: &CloseOptions) -> Result<()> {
    let from_file = match &options.amounts_file {
        Some(path) => load_entries(path)?,
        None => Vec::new(),
    };
    let entries = merge_entries(from_file, &options.amounts);

    let pb = ui::new_spinner("Opening closing cycle...");
    let session = cycle.open(&options.country, options.date).await;
    pb.finish_and_clear();
    let session = session?;

    println!(
        "{}",
        summary(&session, &entries, cycle.rates().base_currency())
    );

    let Some(output) = &options.output else {
        println!(
            "\n{}",
            ui::style_text(
                "Preview only: pass --output to export the records",
                ui::StyleType::Subtle
            )
        );
        return Ok(());
    };

    let policy = if options.allow_unverified_rate {
        RatePolicy::TagUnverified
    } else {
        RatePolicy::Block
    };
    let batch = session.records(&entries, policy)?;
    let json = serde_json::to_string_pretty(&batch.records)?;
    std::fs::write(output, json)
        .with_context(|| format!("Failed to write records to {}", output.display()))?;

    info!(
        records = batch.records.len(),
        path = %output.display(),
        "Exported closing records"
    );
    println!(
        "\nWrote {} records to {}",
        batch.records.len(),
        output.display()
    );
    Ok(())
}
