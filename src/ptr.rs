//! Forward-confirmed reverse DNS (RFC 7208 § 5.5), shared by the `ptr`
//! mechanism and the `%{p}` macro.
//!
//! Both start from the same probe: reverse-map the client IP, truncate the
//! returned PTR names to the configured limit, and validate candidates by
//! looking their addresses up in the client's address family. They differ in
//! shape: the mechanism wants "does any validated name sit at or under the
//! target", the macro wants the best validated name to print.

use log::debug;
use trust_dns_resolver::proto::rr::{Name, RData, RecordType};

use crate::checker::{Checker, Evaluation};
use crate::dns;
use crate::macros;
use crate::mechanism::address_qtype;
use crate::result::{Interrupted, Qualifier, ResultCode};

pub(crate) fn evaluate_mechanism(
    checker: &Checker,
    eval: &mut Evaluation,
    domain: &str,
    spec: &str,
    qualifier: Qualifier,
) -> Result<ResultCode, Interrupted> {
    checker.bump_dns_budget(eval)?;

    let target = macros::expand_domain_spec(checker, eval, domain, spec, false)
        .map_err(|err| Interrupted::perm(err.into()))?;
    let Some(target_name) = dns::parse_hostname(&target) else {
        debug!("ptr target '{target}' is not a valid hostname; no match");
        return Ok(ResultCode::None);
    };

    let names = match lookup_ptr_names(checker, eval) {
        Ok(names) => names,
        // A blown void-lookup budget is still a permanent error.
        Err(interrupt) if interrupt.code == ResultCode::Permerror => return Err(interrupt),
        // Any other reverse-lookup problem: the mechanism fails to match.
        Err(_) => return Ok(ResultCode::None),
    };

    let qtype = address_qtype(eval.ip);
    for hostname in &names {
        // A name outside the target can never satisfy the match condition,
        // so skip its address lookups.
        if !target_name.zone_of(hostname) {
            continue;
        }
        if forward_confirms(checker, eval, hostname, qtype)? {
            return Ok(qualifier.code());
        }
    }
    Ok(ResultCode::None)
}

/// Expands the `%{p}` macro: the validated reverse name for the client IP.
///
/// Preference order: a validated name equal to `domain`, then a validated
/// subdomain of it, then any validated name, then the literal `unknown`.
/// All failures along the way degrade silently to `unknown`.
pub(crate) fn ptr_macro_value(checker: &Checker, eval: &mut Evaluation, domain: &str) -> String {
    let Ok(names) = lookup_ptr_names(checker, eval) else {
        return "unknown".to_string();
    };
    let target_name = dns::parse_hostname(domain);
    let qtype = address_qtype(eval.ip);

    let mut validated = Vec::new();
    for hostname in &names {
        let Ok(addresses) = checker.lookup_addresses(eval, &hostname.to_ascii(), qtype) else {
            continue;
        };
        if addresses.contains(&eval.ip) {
            if let Some(target) = &target_name {
                if hostname == target {
                    return strip_root_dot(hostname);
                }
            }
            validated.push(hostname);
        }
    }

    if let Some(target) = &target_name {
        for hostname in &validated {
            if target.zone_of(hostname) {
                return strip_root_dot(hostname);
            }
        }
    }
    validated
        .first()
        .map(|hostname| strip_root_dot(hostname))
        .unwrap_or_else(|| "unknown".to_string())
}

/// Reverse-maps the client IP and truncates the PTR names to the configured
/// limit; names past the limit are ignored, not an error.
fn lookup_ptr_names(checker: &Checker, eval: &mut Evaluation) -> Result<Vec<Name>, Interrupted> {
    let reverse = dns::reverse_lookup_name(eval.ip);
    let records = checker.lookup_dns(eval, &reverse, RecordType::PTR)?;
    let mut names: Vec<Name> = records
        .iter()
        .filter_map(|record| match record.data() {
            Some(RData::PTR(name)) => Some(name.clone()),
            _ => None,
        })
        .collect();
    if names.len() > checker.ptr_address_limit {
        debug!(
            "truncating {} PTR names to the limit of {}",
            names.len(),
            checker.ptr_address_limit
        );
        names.truncate(checker.ptr_address_limit);
    }
    Ok(names)
}

/// Does a forward lookup of `hostname` return the client IP? Lookup errors
/// skip this name and the search continues, except a blown void-lookup
/// budget, which stays permanent.
fn forward_confirms(
    checker: &Checker,
    eval: &mut Evaluation,
    hostname: &Name,
    qtype: RecordType,
) -> Result<bool, Interrupted> {
    match checker.lookup_addresses(eval, &hostname.to_ascii(), qtype) {
        Ok(addresses) => Ok(addresses.contains(&eval.ip)),
        Err(interrupt) if interrupt.code == ResultCode::Permerror => Err(interrupt),
        Err(interrupt) => {
            if let Some(error) = &interrupt.error {
                debug!("skipping PTR candidate {hostname}: {error}");
            }
            Ok(false)
        }
    }
}

fn strip_root_dot(name: &Name) -> String {
    let text = name.to_ascii();
    text.trim_end_matches('.').to_string()
}
