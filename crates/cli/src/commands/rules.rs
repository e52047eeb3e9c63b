//! Display rule commands.
//!
//! # Usage
//!
//! ```bash
//! # Built-in defaults
//! stockline-cli rules show
//!
//! # Defaults with stored overrides, one scenario
//! stockline-cli rules show --scenario ats --stored
//! ```
//!
//! # Environment Variables
//!
//! - `STOCKLINE_DATABASE_URL` - `PostgreSQL` connection string, required with `--stored`

use std::fmt::Write as _;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use thiserror::Error;

use stockline_admin::db::{DisplayRuleRepository, RepositoryError};
use stockline_core::{FieldSource, RuleSet, Scenario};

/// Errors that can occur while reading display rules.
#[derive(Debug, Error)]
pub enum RulesError {
    /// Required environment variable is missing.
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(&'static str),

    /// Database connection error.
    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),

    /// Stored rules could not be read.
    #[error("Failed to load display rules: {0}")]
    Repository(#[from] RepositoryError),
}

/// Print the rule table.
///
/// # Errors
///
/// Returns `RulesError` if `stored` is set and the overrides cannot be loaded.
pub async fn show(scenario: Option<Scenario>, stored: bool) -> Result<(), RulesError> {
    let rules = if stored {
        load_stored().await?
    } else {
        RuleSet::defaults()
    };

    let table = render(&rules, scenario);

    #[allow(clippy::print_stdout)]
    {
        print!("{table}");
    }
    Ok(())
}

async fn load_stored() -> Result<RuleSet, RulesError> {
    dotenvy::dotenv().ok();

    let database_url =
        super::database_url().ok_or(RulesError::MissingEnvVar("STOCKLINE_DATABASE_URL"))?;

    tracing::info!("Connecting to database...");
    let pool = PgPool::connect(database_url.expose_secret()).await?;

    let stored = DisplayRuleRepository::new(&pool).list().await?;
    tracing::info!(count = stored.len(), "Loaded display rule overrides");

    Ok(RuleSet::with_overrides(
        stored.into_iter().map(|rule| rule.into_override()),
    ))
}

fn describe(source: &FieldSource) -> String {
    match source {
        FieldSource::Formula { expression } => format!("formula: {expression}"),
        other => other.kind().to_string(),
    }
}

fn render(rules: &RuleSet, scenario: Option<Scenario>) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{:<16} {:<16} {:<32} LABEL",
        "SCENARIO", "VIEW", "SOURCE"
    );

    for (s, v, rule) in rules.entries() {
        if scenario.is_some_and(|wanted| wanted != s) {
            continue;
        }
        let marker = if rules.is_overridden(s, v) { "*" } else { "" };
        let _ = writeln!(
            out,
            "{:<16} {:<16} {:<32} {:<20} {marker}",
            s.as_str(),
            v.as_str(),
            describe(&rule.field_source),
            rule.label,
        );
    }

    if rules.override_count() > 0 {
        let _ = writeln!(out, "\n* stored override");
    }
    out
}
