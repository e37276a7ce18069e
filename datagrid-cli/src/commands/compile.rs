use anyhow::Result;
use clap::ValueEnum;
use colored::Colorize;
use datagrid_service::compiler::{
    CompiledQuery, CompiledStatements, Postgres, QueryCompiler, Sqlite,
};
use datagrid_service::intent::QueryIntent;
use datagrid_service::whitelist::{EndpointId, FigmentWhitelistSource, WhitelistSource};
use std::path::PathBuf;

use super::load_sources;

/// Placeholder style for printed statements
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum DialectArg {
    /// `?1`, `?2`, ...
    Sqlite,
    /// `$1`, `$2`, ...
    Postgres,
}

pub fn execute(
    endpoint: &str,
    query: &str,
    dialect: DialectArg,
    config_path: Option<PathBuf>,
) -> Result<()> {
    let statements = compile(endpoint, query, dialect, config_path)?;

    print_statement("total", &statements.total);
    print_statement("filtered", &statements.filtered);
    print_statement("page", &statements.page);
    Ok(())
}

fn compile(
    endpoint: &str,
    query: &str,
    dialect: DialectArg,
    config_path: Option<PathBuf>,
) -> Result<CompiledStatements> {
    let (_, figment) = load_sources(config_path.as_deref())?;
    let endpoint: EndpointId = endpoint.parse()?;
    let whitelist = FigmentWhitelistSource::new(figment).resolve(&endpoint)?;

    let params = parse_query(query);
    let intent = QueryIntent::parse(&params, &whitelist);

    Ok(match dialect {
        DialectArg::Sqlite => QueryCompiler::new(Sqlite).compile_all(&intent),
        DialectArg::Postgres => QueryCompiler::new(Postgres).compile_all(&intent),
    })
}

fn print_statement(label: &str, query: &CompiledQuery) {
    println!("{} {}", format!("{}:", label).green().bold(), query.sql);
    for (index, param) in query.params.iter().enumerate() {
        println!("    {} = {}", format!("#{}", index + 1).dimmed(), param);
    }
}

/// Split a raw `a=1&b=2` parameter string into decoded pairs
///
/// Accepts an optional leading `?`. Keys without `=` get an empty value.
fn parse_query(query: &str) -> Vec<(String, String)> {
    query
        .trim_start_matches('?')
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
            (url_decode(key), url_decode(value))
        })
        .collect()
}

/// Decode `%XX` sequences and `+` as space; malformed escapes are kept as-is
fn url_decode(s: &str) -> String {
    let bytes = s.as_bytes();
    let mut decoded = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'+' => decoded.push(b' '),
            b'%' if i + 2 < bytes.len() => {
                match std::str::from_utf8(&bytes[i + 1..i + 3])
                    .ok()
                    .and_then(|hex| u8::from_str_radix(hex, 16).ok())
                {
                    Some(byte) => {
                        decoded.push(byte);
                        i += 2;
                    }
                    None => decoded.push(b'%'),
                }
            }
            other => decoded.push(other),
        }
        i += 1;
    }
    String::from_utf8_lossy(&decoded).into_owned()
}
