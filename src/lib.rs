#![forbid(unsafe_code)]
//! spfcheck evaluates whether an email message passes a published SPF
//! (Sender Policy Framework) policy, per RFC 7208.
//!
//! The whole checker protocol is implemented, including macros, `ptr`
//! checks and explanation strings. Evaluation is driven by a [`Checker`],
//! which holds the limits of RFC 7208 § 4.6.4 and an injectable
//! [`Resolver`]; a stub system resolver is provided, and anything that can
//! answer a DNS query message can stand in for it. The [`Hook`] interface
//! exposes the inside of the check_host process for tracing and testing.
//!
//! ```no_run
//! use std::net::IpAddr;
//!
//! let ip: IpAddr = "192.0.2.1".parse().unwrap();
//! let checker = spfcheck::Checker::new().unwrap();
//! let result = checker.spf(ip, "bob@example.com", "mail.example.com");
//! println!("{}", result.authentication_results());
//! ```

mod checker;
mod dns;
mod error;
mod hook;
mod macros;
mod mechanism;
mod ptr;
mod record;
mod resolver;
mod result;

pub use checker::{
    check, Checker, DEFAULT_DNS_LIMIT, DEFAULT_MX_ADDRESS_LIMIT, DEFAULT_PTR_ADDRESS_LIMIT,
    DEFAULT_VOID_QUERY_LIMIT,
};
pub use error::{CheckError, MacroError, ParseError};
pub use hook::Hook;
pub use mechanism::Mechanism;
pub use record::SpfRecord;
pub use resolver::{Resolver, SystemResolver};
pub use result::{Qualifier, ResultCode, SpfResult};

// Implementors of [`Resolver`] and [`Hook`] work with trust-dns message
// types; re-export the crate so they can name the matching version.
pub use trust_dns_resolver;
