//! spfcheck-cli: evaluate an SPF policy from the command line.
//!
//! ```text
//! spfcheck-cli --ip 8.8.8.8 --from steve@example.org
//!
//! Result: softfail
//! Error: none
//! Explanation:
//! ```
//!
//! With `--trace` the evaluation steps are shown as they happen, and
//! `--dns` adds one line per DNS query.

use std::net::IpAddr;

use anyhow::{bail, Context, Result};
use clap::Parser;
use spfcheck::trust_dns_resolver::error::ResolveError;
use spfcheck::trust_dns_resolver::proto::op::Message;
use spfcheck::{Checker, Hook, Mechanism, ResultCode, SpfResult};

#[derive(Parser)]
#[command(name = "spfcheck-cli", about = "Evaluate an SPF policy for a message")]
struct Cli {
    /// IP address the message was received from
    #[arg(long)]
    ip: String,

    /// envelope sender (MAIL FROM)
    #[arg(long)]
    from: String,

    /// HELO/EHLO identity
    #[arg(long, default_value = "")]
    helo: String,

    /// hostname reported in Authentication-Results (defaults to the system hostname)
    #[arg(long)]
    hostname: Option<String>,

    /// show the evaluation of the record
    #[arg(long)]
    trace: bool,

    /// show DNS queries (implies --trace)
    #[arg(long)]
    dns: bool,

    /// output format: human|json (json requires the `with-serde` feature)
    #[arg(long, default_value = "human")]
    format: String,
}

/// Prints evaluation steps as the checker reports them.
struct Tracer {
    show_dns: bool,
}

impl Hook for Tracer {
    fn dns(&self, query: &Message, response: Option<&Message>, error: Option<&ResolveError>) {
        if !self.show_dns {
            return;
        }
        let question = match query.queries().first() {
            Some(q) => format!("{} {}", q.name(), q.query_type()),
            None => "<no question>".to_string(),
        };
        match (response, error) {
            (Some(response), _) => println!(
                "dns: {question} => {} ({} answers)",
                response.response_code(),
                response.answers().len()
            ),
            (None, Some(error)) => println!("dns: {question} => error: {error}"),
            (None, None) => println!("dns: {question} => no response"),
        }
    }

    fn record(&self, record: &str, domain: &str) {
        println!("{domain}: {record}");
    }

    fn record_result(&self, domain: &str, code: ResultCode) {
        println!("{domain} => {code}");
    }

    fn mechanism(&self, _domain: &str, _index: usize, mechanism: &Mechanism, code: ResultCode) {
        println!("  {mechanism} => {code}");
    }

    fn redirect(&self, target: &str) {
        println!("following redirect={target}");
    }
}

#[cfg(feature = "with-serde")]
#[derive(serde::Serialize)]
struct OutputRow {
    result: ResultCode,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    dns_queries: u32,
    void_lookups: u32,
    explanation: String,
    used_helo: bool,
    authentication_results: String,
}

#[cfg(feature = "with-serde")]
impl OutputRow {
    fn from_result(result: &SpfResult) -> Self {
        Self {
            result: result.code,
            error: result.error.as_ref().map(|e| e.to_string()),
            dns_queries: result.dns_queries,
            void_lookups: result.void_lookups,
            explanation: result.explanation.clone(),
            used_helo: result.used_helo,
            authentication_results: result.authentication_results(),
        }
    }
}

fn print_human(result: &SpfResult) {
    println!("Result: {}", result.code);
    match &result.error {
        Some(error) => println!("Error: {error}"),
        None => println!("Error: none"),
    }
    println!("Explanation: {}", result.explanation);
    println!("Authentication-Results: {}", result.authentication_results());
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let addr: IpAddr = cli
        .ip
        .parse()
        .with_context(|| format!("'{}' doesn't look like an IP address", cli.ip))?;

    let mut checker = Checker::new().context("building the system resolver")?;
    if let Some(hostname) = &cli.hostname {
        checker = checker.with_hostname(hostname.clone());
    }
    if cli.trace || cli.dns {
        checker = checker.with_hook(Box::new(Tracer { show_dns: cli.dns }));
    }

    let result = checker.spf(addr, &cli.from, &cli.helo);

    match cli.format.as_str() {
        "human" => print_human(&result),
        "json" => {
            #[cfg(feature = "with-serde")]
            {
                let row = OutputRow::from_result(&result);
                println!("{}", serde_json::to_string_pretty(&row)?);
            }
            #[cfg(not(feature = "with-serde"))]
            {
                bail!("--format json requires the 'with-serde' feature");
            }
        }
        other => bail!("unknown --format '{other}', use: human|json"),
    }

    Ok(())
}
