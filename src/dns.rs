//! The DNS gateway: every lookup the evaluator performs funnels through
//! here, so response classification and the void-lookup budget are accounted
//! in exactly one place (RFC 7208 § 4.6.4).

use std::net::IpAddr;

use log::debug;
use trust_dns_resolver::proto::op::{Message, Query, ResponseCode};
use trust_dns_resolver::proto::rr::{Name, RData, Record, RecordType};

use crate::checker::{Checker, Evaluation};
use crate::error::CheckError;
use crate::result::{Interrupted, ResultCode};

impl Checker {
    /// Issues one query through the injected resolver, firing the DNS hook.
    pub(crate) fn resolve(&self, query: &Message) -> Result<Message, trust_dns_resolver::error::ResolveError> {
        let outcome = self.resolver.resolve(query);
        if let Some(hook) = &self.hook {
            hook.dns(query, outcome.as_ref().ok(), outcome.as_ref().err());
        }
        outcome
    }

    /// One classified query: transport failures are `temperror`, NXDOMAIN and
    /// empty answers count against the void-lookup budget, other failure
    /// RCODEs are `temperror`, and successful answers are filtered to
    /// `qtype`.
    pub(crate) fn lookup_dns(
        &self,
        eval: &mut Evaluation,
        name: &str,
        qtype: RecordType,
    ) -> Result<Vec<Record>, Interrupted> {
        let query = question(query_name(name)?, qtype);
        let response = self
            .resolve(&query)
            .map_err(|err| Interrupted::temp(CheckError::dns(name, err)))?;

        let rcode = response.response_code();
        if rcode == ResponseCode::NXDomain
            || (rcode == ResponseCode::NoError && response.answers().is_empty())
        {
            eval.void_lookups += 1;
            debug!("void lookup for {name} {qtype} ({}/{})", eval.void_lookups, self.void_query_limit);
            if eval.void_lookups > self.void_query_limit {
                return Err(Interrupted::perm(CheckError::VoidLookupLimit(
                    self.void_query_limit,
                )));
            }
            return Ok(Vec::new());
        }
        if rcode != ResponseCode::NoError {
            debug!("lookup for {name} {qtype} returned rcode {rcode}");
            return Err(Interrupted::class(ResultCode::Temperror));
        }

        Ok(response
            .answers()
            .iter()
            .filter(|record| record.rr_type() == qtype)
            .cloned()
            .collect())
    }

    /// [`lookup_dns`](Self::lookup_dns) projected to addresses; `qtype` must
    /// be `A` or `AAAA`.
    pub(crate) fn lookup_addresses(
        &self,
        eval: &mut Evaluation,
        name: &str,
        qtype: RecordType,
    ) -> Result<Vec<IpAddr>, Interrupted> {
        let records = self.lookup_dns(eval, name, qtype)?;
        Ok(records
            .iter()
            .filter_map(|record| match record.data() {
                Some(RData::A(addr)) => Some(IpAddr::V4(*addr)),
                Some(RData::AAAA(addr)) => Some(IpAddr::V6(*addr)),
                _ => None,
            })
            .collect())
    }

    /// Fetches the single SPF record for a domain, per RFC 7208 §§ 4.4-4.5.
    ///
    /// TXT character-strings are joined, records not starting with a
    /// `v=spf1` version section are discarded, and the survivor count
    /// classifies the outcome: zero is `none`, more than one `permerror`.
    /// This fetch does not count against the void-lookup budget.
    pub(crate) fn get_spf_record(&self, domain: &str) -> Result<String, Interrupted> {
        let query = question(query_name(domain)?, RecordType::TXT);
        let response = self
            .resolve(&query)
            .map_err(|err| Interrupted::temp(CheckError::dns(domain, err)))?;

        match response.response_code() {
            ResponseCode::NoError | ResponseCode::NXDomain => {}
            _ => return Err(Interrupted::class(ResultCode::Temperror)),
        }

        let mut records = response.answers().iter().filter_map(|record| {
            let Some(RData::TXT(txt)) = record.data() else {
                return None;
            };
            let text: String = txt
                .txt_data()
                .iter()
                .map(|segment| String::from_utf8_lossy(segment))
                .collect();
            has_spf_version(&text).then_some(text)
        });

        match (records.next(), records.next()) {
            (None, _) => Err(Interrupted::class(ResultCode::None)),
            (Some(record), None) => Ok(record),
            (Some(_), Some(_)) => Err(Interrupted::class(ResultCode::Permerror)),
        }
    }
}

/// A record is an SPF record iff its version section is exactly `v=spf1`,
/// terminated by whitespace or the end of the record (`v=spf10` is not).
fn has_spf_version(record: &str) -> bool {
    let bytes = record.as_bytes();
    bytes.len() >= 6
        && bytes[..6].eq_ignore_ascii_case(b"v=spf1")
        && (bytes.len() == 6 || bytes[6].is_ascii_whitespace())
}

fn question(name: Name, qtype: RecordType) -> Message {
    let mut query = Message::new();
    query.set_recursion_desired(true);
    query.add_query(Query::query(name, qtype));
    query
}

fn query_name(name: &str) -> Result<Name, Interrupted> {
    Name::from_ascii(to_fqdn(name))
        .map_err(|_| Interrupted::perm(CheckError::InvalidHostname(name.to_string())))
}

pub(crate) fn to_fqdn(domain: &str) -> String {
    if domain.ends_with('.') {
        domain.to_string()
    } else {
        format!("{domain}.")
    }
}

/// Validates a hostname an SPF term wants to look up. DNS itself permits
/// nearly arbitrary labels, so structural parsing alone is too loose: we also
/// require at least two labels and a plausible top label (letter/digit/hyphen
/// only, not all digits).
pub(crate) fn parse_hostname(host: &str) -> Option<Name> {
    let mut name = Name::from_ascii(host).ok()?;
    if name.num_labels() < 2 {
        return None;
    }
    let stripped = host.strip_suffix('.').unwrap_or(host);
    let (_, top) = stripped.rsplit_once('.')?;
    if !valid_top_label(top) || top.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    name.set_fqdn(true);
    Some(name)
}

/// A domain-spec must end in either a macro expansion or a top-level-domain
/// label (RFC 7208 § 7.1 `domain-end`).
pub(crate) fn valid_domain_spec(spec: &str) -> bool {
    if parse_hostname(spec).is_some() {
        return true;
    }
    if !crate::macros::macro_string_is_valid(spec) {
        return false;
    }
    if spec.ends_with('}') {
        return true;
    }
    let stripped = spec.strip_suffix('.').unwrap_or(spec);
    let Some((_, top)) = stripped.rsplit_once('.') else {
        return false;
    };
    valid_top_label(top) && !top.bytes().all(|b| b.is_ascii_digit())
}

pub(crate) fn valid_optional_domain_spec(spec: &str) -> bool {
    spec.is_empty() || valid_domain_spec(spec)
}

fn valid_top_label(label: &str) -> bool {
    !label.is_empty()
        && label
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-')
        && !label.starts_with('-')
        && !label.ends_with('-')
}

/// Derives the `in-addr.arpa`/`ip6.arpa` name for a reverse lookup.
pub(crate) fn reverse_lookup_name(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, c, d] = v4.octets();
            format!("{d}.{c}.{b}.{a}.in-addr.arpa.")
        }
        IpAddr::V6(v6) => {
            let mut name = String::with_capacity(74);
            for octet in v6.octets().iter().rev() {
                name.push(char::from_digit(u32::from(octet & 0x0f), 16).unwrap_or('0'));
                name.push('.');
                name.push(char::from_digit(u32::from(octet >> 4), 16).unwrap_or('0'));
                name.push('.');
            }
            name.push_str("ip6.arpa.");
            name
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spf_version_section() {
        assert!(has_spf_version("v=spf1"));
        assert!(has_spf_version("v=spf1 -all"));
        assert!(has_spf_version("V=SPF1 -all"));
        assert!(!has_spf_version("v=spf10"));
        assert!(!has_spf_version("v=spf10 -all"));
        assert!(!has_spf_version("spf1 -all"));
        assert!(!has_spf_version(""));
    }

    #[test]
    fn hostname_validation() {
        assert!(parse_hostname("example.com").is_some());
        assert!(parse_hostname("example.com.").is_some());
        assert!(parse_hostname("a.example-host.co.uk").is_some());
        assert!(parse_hostname("3.2.0.192.in-addr.example.com").is_some());
        // single label
        assert!(parse_hostname("localhost").is_none());
        // all-numeric top label
        assert!(parse_hostname("example.123").is_none());
        assert!(parse_hostname("1.2.3.4").is_none());
        // structurally broken
        assert!(parse_hostname("foo..com").is_none());
        assert!(parse_hostname("-bad.example.-com").is_none());
    }

    #[test]
    fn domain_spec_must_end_in_tld_or_macro() {
        assert!(valid_domain_spec("example.com"));
        assert!(valid_domain_spec("example.com."));
        assert!(valid_domain_spec("%{d}"));
        assert!(valid_domain_spec("_spf.%{d2}"));
        assert!(valid_domain_spec("%{ir}.%{v}._spf.example.com"));
        assert!(!valid_domain_spec("foo"));
        assert!(!valid_domain_spec("foo/bar"));
        assert!(!valid_domain_spec("example.123"));
        assert!(!valid_domain_spec("%{x}.example.com"));
        assert!(valid_optional_domain_spec(""));
        assert!(!valid_optional_domain_spec("foo"));
    }

    #[test]
    fn reverse_names() {
        assert_eq!(
            reverse_lookup_name("1.2.3.4".parse().unwrap()),
            "4.3.2.1.in-addr.arpa."
        );
        assert_eq!(
            reverse_lookup_name("2001:db8::cb01".parse().unwrap()),
            "1.0.b.c.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.8.b.d.0.1.0.0.2.ip6.arpa."
        );
    }
}
