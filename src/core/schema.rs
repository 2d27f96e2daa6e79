//! Column role inference for the countries and chart-of-accounts tables.
//!
//! The configuration tables are designed by hand, so the same concept can be
//! called `Paese`, ` COUNTRY `, `valuta` or `Currency Symbol`. Roles are
//! resolved from an explicit rule table: each role has a keyword list and a
//! default that applies when no column matches.
//!
//! The first column, in the table's left-to-right order, whose normalized
//! name contains any keyword of the role is selected. Resolution only looks
//! at column names, never at cell contents, so the same column sequence
//! always yields the same mapping.

use crate::core::error::{LedgerError, Result};
use crate::core::table::{Table, identity_key, normalize_name};
use std::collections::{HashMap, HashSet};
use std::fmt::Display;
use tracing::{debug, warn};

/// Type label used when the chart of accounts has no type column.
pub const TYPE_PLACEHOLDER: &str = "N/D";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Role {
    CountryIdentifier,
    CurrencyCode,
    CurrencyDescription,
    AccountCode,
    AccountDescription,
    AccountClass,
    AccountType,
}

impl Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Role::CountryIdentifier => "country-identifier",
                Role::CurrencyCode => "currency-code",
                Role::CurrencyDescription => "currency-description",
                Role::AccountCode => "account-code",
                Role::AccountDescription => "account-description",
                Role::AccountClass => "account-class",
                Role::AccountType => "account-type",
            }
        )
    }
}

/// One row of the rule table.
#[derive(Debug)]
pub struct RoleRule {
    pub role: Role,
    /// Substrings looked for in normalized column names.
    pub keywords: &'static [&'static str],
}

pub const ROLE_RULES: &[RoleRule] = &[
    RoleRule {
        role: Role::CountryIdentifier,
        keywords: &["paese", "country", "nazione", "nation", "stato"],
    },
    RoleRule {
        role: Role::CurrencyCode,
        keywords: &["curr", "val", "sym"],
    },
    RoleRule {
        role: Role::CurrencyDescription,
        keywords: &["desc", "nome", "name"],
    },
    RoleRule {
        role: Role::AccountCode,
        keywords: &["cod", "conto", "account", "acct", "num"],
    },
    RoleRule {
        role: Role::AccountDescription,
        keywords: &["desc", "nome", "name", "label", "titolo"],
    },
    RoleRule {
        role: Role::AccountClass,
        keywords: &["class", "categ", "gruppo", "group"],
    },
    RoleRule {
        role: Role::AccountType,
        keywords: &["tipo", "type", "natura", "nature"],
    },
];

pub fn rule_for(role: Role) -> &'static RoleRule {
    let index = match role {
        Role::CountryIdentifier => 0,
        Role::CurrencyCode => 1,
        Role::CurrencyDescription => 2,
        Role::AccountCode => 3,
        Role::AccountDescription => 4,
        Role::AccountClass => 5,
        Role::AccountType => 6,
    };
    &ROLE_RULES[index]
}

/// Finds the leftmost column whose name contains any keyword of `rule`,
/// skipping `claimed` columns.
pub fn match_column(columns: &[String], rule: &RoleRule, claimed: &[usize]) -> Option<usize> {
    columns.iter().enumerate().find_map(|(index, column)| {
        let name = normalize_name(column);
        (!claimed.contains(&index) && rule.keywords.iter().any(|k| name.contains(k)))
            .then_some(index)
    })
}

/// Where the value of a role comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnSource {
    Column(usize),
    /// No currency column: every country trades in the base currency.
    BaseCurrency,
    /// No currency description column: the currency code itself.
    CurrencyCode,
    /// No class column: the first character of the account code.
    CodePrefix,
    /// No type column: `TYPE_PLACEHOLDER`.
    Placeholder,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountrySchema {
    pub identifier: usize,
    pub currency: ColumnSource,
    pub currency_description: ColumnSource,
}

impl CountrySchema {
    pub fn resolve(table_name: &str, columns: &[String]) -> Result<Self> {
        let identifier = match_column(columns, rule_for(Role::CountryIdentifier), &[])
            .or_else(|| (!columns.is_empty()).then_some(0))
            .ok_or_else(|| LedgerError::SchemaResolutionAmbiguous {
                table: table_name.to_string(),
            })?;
        let currency = match_column(columns, rule_for(Role::CurrencyCode), &[identifier])
            .map_or(ColumnSource::BaseCurrency, ColumnSource::Column);
        let mut claimed = vec![identifier];
        if let ColumnSource::Column(column) = currency {
            claimed.push(column);
        }
        let currency_description =
            match_column(columns, rule_for(Role::CurrencyDescription), &claimed)
                .map_or(ColumnSource::CurrencyCode, ColumnSource::Column);

        let schema = Self {
            identifier,
            currency,
            currency_description,
        };
        debug!(table = table_name, ?schema, "Resolved country columns");
        Ok(schema)
    }

    pub fn roles(&self) -> Vec<(Role, ColumnSource)> {
        vec![
            (Role::CountryIdentifier, ColumnSource::Column(self.identifier)),
            (Role::CurrencyCode, self.currency),
            (Role::CurrencyDescription, self.currency_description),
        ]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AccountSchema {
    pub code: usize,
    pub description: usize,
    pub class: ColumnSource,
    pub account_type: ColumnSource,
}

impl AccountSchema {
    pub fn resolve(table_name: &str, columns: &[String]) -> Result<Self> {
        let code = match_column(columns, rule_for(Role::AccountCode), &[])
            .or_else(|| (!columns.is_empty()).then_some(0))
            .ok_or_else(|| LedgerError::SchemaResolutionAmbiguous {
                table: table_name.to_string(),
            })?;
        let description = match_column(columns, rule_for(Role::AccountDescription), &[code])
            .or_else(|| (0..columns.len()).find(|index| *index != code))
            .unwrap_or(code);
        let class = match_column(columns, rule_for(Role::AccountClass), &[code])
            .map_or(ColumnSource::CodePrefix, ColumnSource::Column);
        let account_type = match_column(columns, rule_for(Role::AccountType), &[code])
            .map_or(ColumnSource::Placeholder, ColumnSource::Column);

        let schema = Self {
            code,
            description,
            class,
            account_type,
        };
        debug!(table = table_name, ?schema, "Resolved account columns");
        Ok(schema)
    }

    pub fn roles(&self) -> Vec<(Role, ColumnSource)> {
        vec![
            (Role::AccountCode, ColumnSource::Column(self.code)),
            (Role::AccountDescription, ColumnSource::Column(self.description)),
            (Role::AccountClass, self.class),
            (Role::AccountType, self.account_type),
        ]
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryRecord {
    pub identifier: String,
    pub currency_code: String,
    pub currency_description: String,
}

impl CountryRecord {
    /// `"USD - Dollaro"`, or just the code when there is no description.
    pub fn currency_label(&self) -> String {
        if self.currency_description == self.currency_code {
            self.currency_code.clone()
        } else {
            format!("{} - {}", self.currency_code, self.currency_description)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRecord {
    pub code: String,
    pub description: String,
    pub class_tag: String,
    pub type_tag: String,
}

/// Countries of a snapshot, keyed by normalized identifier.
#[derive(Debug, Clone)]
pub struct CountryView {
    pub schema: CountrySchema,
    pub records: Vec<CountryRecord>,
}

impl CountryView {
    /// Looks up a country by name, ignoring case and surrounding whitespace.
    pub fn find(&self, name: &str) -> Option<&CountryRecord> {
        let key = identity_key(name);
        self.records
            .iter()
            .find(|record| identity_key(&record.identifier) == key)
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Chart of accounts of a snapshot, in table order.
#[derive(Debug, Clone)]
pub struct AccountView {
    pub schema: AccountSchema,
    pub records: Vec<AccountRecord>,
    index: HashMap<String, usize>,
}

impl AccountView {
    /// Builds the view from already resolved records. Later duplicates of a
    /// code are ignored.
    pub fn new(schema: AccountSchema, records: Vec<AccountRecord>) -> Self {
        let mut index = HashMap::new();
        let mut kept = Vec::with_capacity(records.len());
        for record in records {
            let key = identity_key(&record.code);
            if index.contains_key(&key) {
                continue;
            }
            index.insert(key, kept.len());
            kept.push(record);
        }
        Self {
            schema,
            records: kept,
            index,
        }
    }

    pub fn get(&self, code: &str) -> Option<&AccountRecord> {
        self.index
            .get(&identity_key(code))
            .map(|position| &self.records[*position])
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Derives canonical records from normalized configuration tables.
#[derive(Debug, Clone)]
pub struct SchemaResolver {
    base_currency: String,
}

impl SchemaResolver {
    pub fn new(base_currency: &str) -> Self {
        Self {
            base_currency: base_currency.trim().to_uppercase(),
        }
    }

    pub fn countries(&self, table: &Table) -> Result<CountryView> {
        let table = table.normalized();
        let schema = CountrySchema::resolve(&table.name, &table.columns)?;

        let mut records = Vec::new();
        let mut seen = HashSet::new();
        for row in 0..table.rows.len() {
            let identifier = table.cell_text(row, schema.identifier);
            if identifier.is_empty() {
                warn!(row, "Skipping country row without identifier");
                continue;
            }
            if !seen.insert(identity_key(&identifier)) {
                warn!(country = %identifier, "Skipping duplicate country row");
                continue;
            }

            let currency_code = match schema.currency {
                ColumnSource::Column(column) => {
                    let code = table.cell_text(row, column).to_uppercase();
                    if code.is_empty() {
                        warn!(country = %identifier, "Empty currency cell, using base currency");
                        self.base_currency.clone()
                    } else {
                        code
                    }
                }
                _ => self.base_currency.clone(),
            };

            let currency_description = match schema.currency_description {
                ColumnSource::Column(column) => Some(table.cell_text(row, column)),
                _ => None,
            }
            .filter(|description| !description.is_empty())
            .unwrap_or_else(|| currency_code.clone());

            records.push(CountryRecord {
                identifier,
                currency_code,
                currency_description,
            });
        }

        Ok(CountryView { schema, records })
    }

    pub fn accounts(&self, table: &Table) -> Result<AccountView> {
        let table = table.normalized();
        let schema = AccountSchema::resolve(&table.name, &table.columns)?;

        let mut records = Vec::new();
        let mut seen = HashSet::new();
        for row in 0..table.rows.len() {
            let code = table.cell_text(row, schema.code);
            if code.is_empty() {
                warn!(row, "Skipping account row without code");
                continue;
            }
            if !seen.insert(identity_key(&code)) {
                warn!(code = %code, "Skipping duplicate account row");
                continue;
            }

            let class_tag = match schema.class {
                ColumnSource::Column(column) => table.cell_text(row, column),
                _ => code.chars().next().map(String::from).unwrap_or_default(),
            };
            let type_tag = match schema.account_type {
                ColumnSource::Column(column) => table.cell_text(row, column),
                _ => TYPE_PLACEHOLDER.to_string(),
            };

            records.push(AccountRecord {
                description: table.cell_text(row, schema.description),
                code,
                class_tag,
                type_tag,
            });
        }

        Ok(AccountView::new(schema, records))
    }
}
