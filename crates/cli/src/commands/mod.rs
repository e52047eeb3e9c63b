//! CLI subcommand implementations.

pub mod formula;
pub mod migrate;
pub mod rules;

/// Read the database URL, preferring `STOCKLINE_DATABASE_URL` over `DATABASE_URL`.
fn database_url() -> Option<secrecy::SecretString> {
    std::env::var("STOCKLINE_DATABASE_URL")
        .or_else(|_| std::env::var("DATABASE_URL"))
        .ok()
        .filter(|url| !url.is_empty())
        .map(secrecy::SecretString::from)
}
