use super::ui;
use crate::RateTarget;
use crate::core::schema::CountryRecord;
use crate::core::{ClosingCycle, RateQuote};
use anyhow::Result;
use chrono::NaiveDate;
use comfy_table::Cell;

pub fn quote_table(quote: &RateQuote, base_currency: &str) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Currency"),
        ui::header_cell(&format!("Rate ({base_currency})")),
        ui::header_cell("Date"),
        ui::header_cell("Provenance"),
    ]);
    table.add_row(vec![
        Cell::new(&quote.currency),
        ui::format_optional_cell(quote.usable_rate(), |rate| rate.normalize().to_string()),
        Cell::new(quote.as_of.format("%Y-%m-%d")),
        ui::provenance_cell(quote.provenance),
    ]);

    let mut output = table.to_string();
    if let Some(note) = &quote.note {
        let style_type = if quote.is_available() {
            ui::StyleType::Warning
        } else {
            ui::StyleType::Error
        };
        output.push_str(&format!("\n{}", ui::style_text(note, style_type)));
    }
    output
}

/// Heading naming the country and its currency.
pub fn country_heading(country: &CountryRecord) -> String {
    format!(
        "{}: {}",
        ui::style_text(&country.identifier, ui::StyleType::Title),
        country.currency_label()
    )
}

pub async fn run(cycle: &ClosingCycle, target: &RateTarget, date: NaiveDate) -> Result<()> {
    let pb = ui::new_spinner("Fetching exchange rate...");
    let resolved = match target {
        RateTarget::Currency(currency) => Ok((None, cycle.rates().resolve(currency, date).await)),
        RateTarget::Country(country) => cycle
            .open(country, date)
            .await
            .map(|s| (Some(s.country), s.quote)),
    };
    pb.finish_and_clear();

    let (country, quote) = resolved?;
    if let Some(country) = &country {
        println!("{}\n", country_heading(country));
    }
    println!("{}", quote_table(&quote, cycle.rates().base_currency()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Provenance;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn quote(rate: Decimal, provenance: Provenance, note: Option<&str>) -> RateQuote {
        RateQuote {
            currency: "USD".to_string(),
            rate,
            as_of: NaiveDate::from_ymd_opt(2024, 12, 31).unwrap(),
            provenance,
            note: note.map(str::to_string),
        }
    }

    #[test]
    fn test_quote_table_with_fallback_note() {
        let output = quote_table(
            &quote(
                dec!(0.8500),
                Provenance::LatestFallback,
                Some("stale-rate warning: historical lookup failed"),
            ),
            "EUR",
        );

        assert!(output.contains("Rate (EUR)"));
        assert!(output.contains("0.85"));
        assert!(output.contains("2024-12-31"));
        assert!(output.contains("latest fallback"));
        assert!(output.contains("stale-rate warning"));
    }

    #[test]
    fn test_unavailable_rate_is_not_shown() {
        let output = quote_table(
            &quote(Decimal::ZERO, Provenance::Unavailable, Some("lookup failed")),
            "EUR",
        );

        assert!(output.contains("N/A"));
        assert!(output.contains("unavailable"));
        assert!(!output.contains("0.00"));
    }

    #[test]
    fn test_country_heading_shows_currency_description() {
        let country = CountryRecord {
            identifier: "Stati Uniti".to_string(),
            currency_code: "USD".to_string(),
            currency_description: "Dollaro".to_string(),
        };

        let heading = country_heading(&country);
        assert!(heading.contains("Stati Uniti"));
        assert!(heading.ends_with("USD - Dollaro"));
    }
}
