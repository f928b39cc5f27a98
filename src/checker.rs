//! The check_host evaluator (RFC 7208 § 4) and its configuration.

use std::net::IpAddr;

use log::debug;
use trust_dns_resolver::proto::op::ResponseCode;
use trust_dns_resolver::proto::rr::{Name, RData, RecordType};

use crate::dns;
use crate::error::CheckError;
use crate::hook::Hook;
use crate::macros;
use crate::record::SpfRecord;
use crate::resolver::{Resolver, SystemResolver};
use crate::result::{Interrupted, ResultCode, SpfResult};

/// Maximum number of DNS-causing terms per evaluation, record fetches
/// included (RFC 7208 § 4.6.4).
pub const DEFAULT_DNS_LIMIT: u32 = 10;
/// Maximum number of MX records examined per `mx` mechanism.
pub const DEFAULT_MX_ADDRESS_LIMIT: usize = 10;
/// Maximum number of NXDOMAIN/empty answers per evaluation.
pub const DEFAULT_VOID_QUERY_LIMIT: u32 = 2;
/// PTR names considered per reverse lookup; the rest are ignored.
pub const DEFAULT_PTR_ADDRESS_LIMIT: usize = 10;

/// Configuration and limits for checking SPF policies.
///
/// A `Checker` is immutable during evaluation and can be reused across
/// checks.
pub struct Checker {
    pub(crate) resolver: Box<dyn Resolver>,
    pub(crate) dns_limit: u32,
    pub(crate) mx_address_limit: usize,
    pub(crate) void_query_limit: u32,
    pub(crate) ptr_address_limit: usize,
    pub(crate) hostname: String,
    pub(crate) hook: Option<Box<dyn Hook>>,
}

/// Mutable state for one top-level check, threaded by `&mut` through the
/// include/redirect recursion so the budgets are global to the evaluation.
pub(crate) struct Evaluation {
    pub ip: IpAddr,
    pub sender: String,
    pub helo: String,
    pub dns_queries: u32,
    pub void_lookups: u32,
    pub explanation: Option<String>,
    pub error: Option<CheckError>,
}

impl Evaluation {
    pub(crate) fn new(ip: IpAddr, sender: &str, helo: &str) -> Self {
        Self {
            ip,
            sender: sender.to_string(),
            helo: helo.to_string(),
            dns_queries: 0,
            void_lookups: 0,
            explanation: None,
            error: None,
        }
    }
}

impl Checker {
    /// A checker with default limits, resolving through the system
    /// configuration.
    pub fn new() -> Result<Self, CheckError> {
        Ok(Self::with_resolver(Box::new(
            SystemResolver::from_system_conf()?,
        )))
    }

    /// A checker with default limits and the given resolver.
    pub fn with_resolver(resolver: Box<dyn Resolver>) -> Self {
        Self {
            resolver,
            dns_limit: DEFAULT_DNS_LIMIT,
            mx_address_limit: DEFAULT_MX_ADDRESS_LIMIT,
            void_query_limit: DEFAULT_VOID_QUERY_LIMIT,
            ptr_address_limit: DEFAULT_PTR_ADDRESS_LIMIT,
            hostname: system_hostname(),
            hook: None,
        }
    }

    pub fn with_dns_limit(mut self, limit: u32) -> Self {
        self.dns_limit = limit;
        self
    }

    pub fn with_mx_address_limit(mut self, limit: usize) -> Self {
        self.mx_address_limit = limit;
        self
    }

    pub fn with_void_query_limit(mut self, limit: u32) -> Self {
        self.void_query_limit = limit;
        self
    }

    pub fn with_ptr_address_limit(mut self, limit: usize) -> Self {
        self.ptr_address_limit = limit;
        self
    }

    /// The hostname reported by the `%{r}` macro and
    /// `Authentication-Results:` rendering. Defaults to the system hostname
    /// when discoverable.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = hostname.into();
        self
    }

    pub fn with_hook(mut self, hook: Box<dyn Hook>) -> Self {
        self.hook = Some(hook);
        self
    }

    /// Checks SPF for a message using both identities: the HELO domain
    /// first, then the MAIL FROM domain when the HELO result is `none` or
    /// `neutral`.
    pub fn spf(&self, ip: IpAddr, mail_from: &str, helo: &str) -> SpfResult {
        let ip = canonical_ip(ip);

        let mut helo_outcome = None;
        if !helo.is_empty() {
            let mut eval = Evaluation::new(ip, mail_from, helo);
            let code = match normalize_lookup_domain(helo) {
                Ok(domain) => {
                    self.check_host_recursive(&mut eval, &dns::to_fqdn(&domain), false, false)
                }
                Err(err) => {
                    eval.error = Some(err);
                    ResultCode::None
                }
            };
            if code != ResultCode::None && code != ResultCode::Neutral {
                return self.into_result(eval, code, true);
            }
            helo_outcome = Some(self.into_result(eval, code, false));
        }

        if !mail_from.is_empty() {
            let domain = mail_from.rsplit_once('@').map_or(mail_from, |(_, d)| d);
            let mut eval = Evaluation::new(ip, mail_from, helo);
            let code = match normalize_lookup_domain(domain) {
                Ok(domain) => {
                    self.check_host_recursive(&mut eval, &dns::to_fqdn(&domain), false, false)
                }
                Err(err) => {
                    eval.error = Some(err);
                    ResultCode::None
                }
            };
            return self.into_result(eval, code, false);
        }

        helo_outcome.unwrap_or_else(|| {
            self.into_result(Evaluation::new(ip, mail_from, helo), ResultCode::None, false)
        })
    }

    /// The RFC 7208 check_host() function against one explicit domain.
    ///
    /// The domain must be fully qualified (trailing dot); anything else
    /// produces `none`, per § 4.3 initial processing.
    pub fn check_host(&self, ip: IpAddr, domain: &str, sender: &str, helo: &str) -> SpfResult {
        let mut eval = Evaluation::new(canonical_ip(ip), sender, helo);
        let code = self.check_host_recursive(&mut eval, domain, false, false);
        self.into_result(eval, code, false)
    }

    pub(crate) fn check_host_recursive(
        &self,
        eval: &mut Evaluation,
        domain: &str,
        include: bool,
        redirect: bool,
    ) -> ResultCode {
        let code = self.check_host_core(eval, domain, include, redirect);
        if let Some(hook) = &self.hook {
            hook.record_result(domain, code);
        }
        code
    }

    fn check_host_core(
        &self,
        eval: &mut Evaluation,
        domain: &str,
        include: bool,
        redirect: bool,
    ) -> ResultCode {
        // § 4.3: a malformed or non-multi-label domain yields "none"
        // immediately.
        if Name::from_ascii(domain).is_err() {
            eval.error = Some(CheckError::InvalidDomain(domain.to_string()));
            return ResultCode::None;
        }
        if !domain.ends_with('.') {
            eval.error = Some(CheckError::NotFullyQualified(domain.to_string()));
            return ResultCode::None;
        }

        // § 4.3: a sender without a local-part gets "postmaster".
        if !eval.sender.contains('@') {
            eval.sender = format!("postmaster@{}", eval.sender);
        }
        if eval.sender.starts_with('@') {
            eval.sender = format!("postmaster{}", eval.sender);
        }

        // The record fetch itself counts against the term budget.
        if let Err(interrupt) = self.bump_dns_budget(eval) {
            eval.error = interrupt.error;
            return interrupt.code;
        }

        let record = match self.get_spf_record(domain) {
            Ok(record) => record,
            Err(interrupt) => {
                eval.error = interrupt.error;
                // A redirect target without a usable record is a permanent
                // error rather than "none" (§ 6.1).
                if interrupt.code == ResultCode::None && redirect {
                    return ResultCode::Permerror;
                }
                return interrupt.code;
            }
        };
        debug!("evaluating record for {domain}: {record}");
        if let Some(hook) = &self.hook {
            hook.record(&record, domain);
        }

        let parsed = match SpfRecord::parse(&record) {
            Ok(parsed) => parsed,
            Err(err) => {
                eval.error = Some(err.into());
                return ResultCode::Permerror;
            }
        };

        for (index, mechanism) in parsed.mechanisms.iter().enumerate() {
            let (code, error) = match mechanism.evaluate(self, eval, domain) {
                Ok(code) => (code, None),
                Err(interrupt) => (interrupt.code, interrupt.error),
            };
            if let Some(hook) = &self.hook {
                hook.mechanism(domain, index, mechanism, code);
            }
            if eval.dns_queries > self.dns_limit {
                eval.error = Some(CheckError::DnsLimitExceeded(self.dns_limit));
                return ResultCode::Permerror;
            }
            if code != ResultCode::None {
                eval.error = error;
                if code == ResultCode::Fail && !include {
                    if let Some(exp) = &parsed.exp {
                        self.fetch_explanation(eval, exp, domain);
                    }
                }
                return code;
            }
        }

        // Fell off the end of the record.
        if let Some(target) = &parsed.redirect {
            if let Some(hook) = &self.hook {
                hook.redirect(target);
            }
            let expanded = match macros::expand_domain_spec(self, eval, domain, target, false) {
                Ok(expanded) => expanded,
                Err(err) => {
                    eval.error = Some(err.into());
                    return ResultCode::Permerror;
                }
            };
            if dns::parse_hostname(&expanded).is_none() {
                eval.error = Some(CheckError::InvalidHostname(expanded));
                return ResultCode::Permerror;
            }
            return self.check_host_recursive(eval, &dns::to_fqdn(&expanded), false, true);
        }

        ResultCode::Neutral
    }

    /// Tries to produce the explanation string for a failing record. Every
    /// failure along the way is swallowed: the check's result stays `fail`.
    fn fetch_explanation(&self, eval: &mut Evaluation, exp: &str, domain: &str) {
        let Ok(target) = macros::expand_domain_spec(self, eval, domain, exp, false) else {
            debug!("exp target failed to expand; no explanation");
            return;
        };
        let Some(name) = dns::parse_hostname(&target) else {
            debug!("exp target '{target}' is not a valid hostname; no explanation");
            return;
        };

        let Ok(records) = self.lookup_explanation_txt(name) else {
            return;
        };
        // Exactly one answer record is required; its character-strings are
        // joined.
        let Some(text) = records else {
            return;
        };
        if let Ok(explanation) = macros::expand_macro(self, eval, domain, &text, true) {
            eval.explanation = Some(explanation);
        }
    }

    /// TXT lookup for the explanation. Deliberately outside the gateway:
    /// explanation fetches count toward neither budget.
    fn lookup_explanation_txt(
        &self,
        name: Name,
    ) -> Result<Option<String>, trust_dns_resolver::error::ResolveError> {
        let mut query = trust_dns_resolver::proto::op::Message::new();
        query.set_recursion_desired(true);
        query.add_query(trust_dns_resolver::proto::op::Query::query(
            name,
            RecordType::TXT,
        ));
        let response = self.resolve(&query)?;
        if response.response_code() != ResponseCode::NoError || response.answers().len() != 1 {
            return Ok(None);
        }
        let Some(RData::TXT(txt)) = response.answers()[0].data() else {
            return Ok(None);
        };
        Ok(Some(
            txt.txt_data()
                .iter()
                .map(|segment| String::from_utf8_lossy(segment))
                .collect(),
        ))
    }

    /// Counts one DNS-causing term and fails permanently once the budget is
    /// exceeded.
    pub(crate) fn bump_dns_budget(&self, eval: &mut Evaluation) -> Result<(), Interrupted> {
        eval.dns_queries += 1;
        if eval.dns_queries > self.dns_limit {
            return Err(Interrupted::perm(CheckError::DnsLimitExceeded(
                self.dns_limit,
            )));
        }
        Ok(())
    }

    fn into_result(&self, eval: Evaluation, code: ResultCode, used_helo: bool) -> SpfResult {
        SpfResult {
            code,
            error: eval.error,
            dns_queries: eval.dns_queries,
            void_lookups: eval.void_lookups,
            explanation: eval.explanation.unwrap_or_default(),
            used_helo,
            sender: eval.sender,
            helo: eval.helo,
            hostname: self.hostname.clone(),
        }
    }
}

/// Checks SPF with a default-configured checker, returning just the result
/// code and explanation.
pub fn check(ip: IpAddr, mail_from: &str, helo: &str) -> Result<(ResultCode, String), CheckError> {
    let checker = Checker::new()?;
    let result = checker.spf(ip, mail_from, helo);
    Ok((result.code, result.explanation))
}

/// IPv4-mapped IPv6 addresses evaluate as IPv4.
fn canonical_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => match v6.to_ipv4_mapped() {
            Some(v4) => IpAddr::V4(v4),
            None => ip,
        },
        IpAddr::V4(_) => ip,
    }
}

/// Normalizes a lookup domain taken from the SMTP envelope: trimmed and
/// IDNA-converted to its ASCII form.
fn normalize_lookup_domain(domain: &str) -> Result<String, CheckError> {
    let trimmed = domain.trim();
    if trimmed.is_empty() {
        return Err(CheckError::InvalidDomain(domain.to_string()));
    }
    let ascii = idna::domain_to_ascii(trimmed).map_err(CheckError::idna)?;
    if ascii.is_empty() {
        return Err(CheckError::InvalidDomain(domain.to_string()));
    }
    Ok(ascii)
}

fn system_hostname() -> String {
    nix::unistd::gethostname()
        .ok()
        .and_then(|hostname| hostname.into_string().ok())
        .unwrap_or_default()
}
