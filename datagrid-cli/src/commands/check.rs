use anyhow::Result;
use colored::Colorize;
use datagrid_service::whitelist::{
    ColumnSpec, EndpointId, FigmentWhitelistSource, WhitelistSource,
};
use std::path::PathBuf;

use super::load_sources;

/// Validate one endpoint's whitelist, or every configured one
pub fn execute(endpoint: Option<String>, config_path: Option<PathBuf>) -> Result<()> {
    let (_, figment) = load_sources(config_path.as_deref())?;
    let source = FigmentWhitelistSource::new(figment);

    let endpoints = match endpoint {
        Some(endpoint) => vec![endpoint.parse::<EndpointId>()?],
        None => source.endpoints()?,
    };

    if endpoints.is_empty() {
        println!("{} no DataTables endpoints configured", "warning:".yellow().bold());
        return Ok(());
    }

    let failures = report(&source, &endpoints);
    if failures > 0 {
        anyhow::bail!(
            "{} of {} endpoint(s) failed validation",
            failures,
            endpoints.len()
        );
    }

    println!(
        "\n{} {} endpoint(s) valid",
        "✓".green().bold(),
        endpoints.len()
    );
    Ok(())
}

/// Print each endpoint's outcome, returning the number of failures
fn report(source: &impl WhitelistSource, endpoints: &[EndpointId]) -> usize {
    let mut failures = 0;
    for endpoint in endpoints {
        match source.resolve(endpoint) {
            Ok(whitelist) => {
                println!(
                    "{} {} {} table {}",
                    "✓".green(),
                    endpoint.to_string().bold(),
                    "→".dimmed(),
                    whitelist.table_name().cyan()
                );
                for column in whitelist.columns() {
                    println!("    {:<24} {}", column.name, describe(column).dimmed());
                }
            }
            Err(e) => {
                failures += 1;
                println!("{} {} {}", "✗".red(), endpoint.to_string().bold(), e);
            }
        }
    }
    failures
}

/// Operations a column allows, e.g. `searchable, sortable, global`
fn describe(column: &ColumnSpec) -> String {
    let flags: Vec<&str> = [
        (column.searchable, "searchable"),
        (column.sortable, "sortable"),
        (column.globally_searchable, "global"),
    ]
    .into_iter()
    .filter_map(|(set, name)| set.then_some(name))
    .collect();

    if flags.is_empty() {
        "display only".to_string()
    } else {
        flags.join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::test_support::write_config;

    #[test]
    fn test_describe() {
        assert_eq!(describe(&ColumnSpec::new("id")), "display only");
        assert_eq!(
            describe(&ColumnSpec::new("name").searchable().globally_searchable()),
            "searchable, global"
        );
    }

    #[test]
    fn test_single_valid_endpoint() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir);
        assert!(execute(Some("Customers.Index".to_string()), Some(path)).is_ok());
    }

    #[test]
    fn test_all_endpoints_reports_broken_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir);
        let err = execute(None, Some(path)).unwrap_err();
        assert!(err.to_string().contains("1 of 2"));
    }

    #[test]
    fn test_unknown_endpoint_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_config(&dir);
        assert!(execute(Some("Orders.Index".to_string()), Some(path)).is_err());
    }
}
