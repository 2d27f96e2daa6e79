use super::ui;
use crate::core::cache::ConfigCache;
use crate::core::closing::{Configuration, load_configuration};
use crate::core::schema::{
    AccountRecord, ColumnSource, CountryRecord, Role, SchemaResolver, TYPE_PLACEHOLDER,
};
use crate::core::table::identity_key;
use anyhow::Result;
use comfy_table::Cell;

/// Countries in alphabetical order of their identifier.
fn sorted_countries(records: &[CountryRecord]) -> Vec<&CountryRecord> {
    let mut sorted: Vec<&CountryRecord> = records.iter().collect();
    sorted.sort_by_cached_key(|country| identity_key(&country.identifier));
    sorted
}

/// Sort key for account codes: numeric codes first, in numeric order, then
/// the rest alphabetically.
fn code_key(code: &str) -> (bool, i64, String) {
    match code.parse::<i64>() {
        Ok(number) => (false, number, String::new()),
        Err(_) => (true, 0, identity_key(code)),
    }
}

fn sorted_accounts(records: &[AccountRecord]) -> Vec<&AccountRecord> {
    let mut sorted: Vec<&AccountRecord> = records.iter().collect();
    sorted.sort_by_cached_key(|account| code_key(&account.code));
    sorted
}

/// Describes where each role of a table was read from.
fn roles_table(roles: &[(Role, ColumnSource)], columns: &[String]) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Role"), ui::header_cell("Source")]);

    for (role, source) in roles {
        let source = match source {
            ColumnSource::Column(index) => columns
                .get(*index)
                .map_or_else(|| format!("column #{index}"), |name| format!("column '{name}'")),
            ColumnSource::BaseCurrency => ui::style_text("base currency", ui::StyleType::Subtle),
            ColumnSource::CurrencyCode => ui::style_text("currency code", ui::StyleType::Subtle),
            ColumnSource::CodePrefix => {
                ui::style_text("first character of code", ui::StyleType::Subtle)
            }
            ColumnSource::Placeholder => {
                ui::style_text(&format!("'{TYPE_PLACEHOLDER}'"), ui::StyleType::Subtle)
            }
        };
        table.add_row(vec![Cell::new(role.to_string()), Cell::new(source)]);
    }
    table.to_string()
}

pub fn countries_table(configuration: &Configuration) -> String {
    let countries = &configuration.countries;
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Country"), ui::header_cell("Currency")]);
    for country in sorted_countries(&countries.records) {
        table.add_row(vec![
            Cell::new(&country.identifier),
            Cell::new(country.currency_label()),
        ]);
    }

    format!(
        "{}\n\n{}\n\n{}",
        ui::style_text("Countries", ui::StyleType::Title),
        roles_table(
            &countries.schema.roles(),
            &configuration.snapshot.countries.columns
        ),
        table
    )
}

pub fn accounts_table(configuration: &Configuration) -> String {
    let accounts = &configuration.accounts;
    let mut table = ui::new_styled_table();
    table.set_header(vec![
        ui::header_cell("Code"),
        ui::header_cell("Description"),
        ui::header_cell("Class"),
        ui::header_cell("Type"),
    ]);
    for account in sorted_accounts(&accounts.records) {
        table.add_row(vec![
            Cell::new(&account.code),
            Cell::new(&account.description),
            Cell::new(&account.class_tag),
            Cell::new(&account.type_tag),
        ]);
    }

    format!(
        "{}\n\n{}\n\n{}",
        ui::style_text("Chart of accounts", ui::StyleType::Title),
        roles_table(
            &accounts.schema.roles(),
            &configuration.snapshot.accounts.columns
        ),
        table
    )
}

async fn load(cache: &ConfigCache, resolver: &SchemaResolver) -> Result<Configuration> {
    let pb = ui::new_spinner("Loading configuration...");
    let configuration = load_configuration(cache, resolver).await;
    pb.finish_and_clear();
    Ok(configuration?)
}

pub async fn run_countries(cache: &ConfigCache, resolver: &SchemaResolver) -> Result<()> {
    let configuration = load(cache, resolver).await?;
    println!("{}", countries_table(&configuration));
    Ok(())
}

pub async fn run_accounts(cache: &ConfigCache, resolver: &SchemaResolver) -> Result<()> {
    let configuration = load(cache, resolver).await?;
    println!("{}", accounts_table(&configuration));
    Ok(())
}
