//! The eight SPF mechanism kinds: parsing, canonical text form, and
//! evaluation (RFC 7208 § 5).

use std::fmt;
use std::net::IpAddr;

use ipnet::{Ipv4Net, Ipv6Net};
use log::debug;
use trust_dns_resolver::proto::rr::{Name, RData, RecordType};

use crate::checker::{Checker, Evaluation};
use crate::dns;
use crate::error::{CheckError, ParseError};
use crate::macros;
use crate::ptr;
use crate::result::{Interrupted, Qualifier, ResultCode};

/// A single SPF mechanism with its qualifier.
///
/// Mechanisms are immutable once parsed; [`Display`](fmt::Display) gives the
/// canonical text form, and re-parsing that form yields an equal mechanism.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Mechanism {
    /// `all`: always matches.
    All { qualifier: Qualifier },
    /// `include:domain`: matches when a recursive check of `domain` passes.
    Include {
        qualifier: Qualifier,
        domain_spec: String,
    },
    /// `a[:domain][/v4[//v6]]`: matches the target's A/AAAA addresses.
    A {
        qualifier: Qualifier,
        domain_spec: String,
        mask4: u8,
        mask6: u8,
    },
    /// `mx[:domain][/v4[//v6]]`: matches addresses of the target's MX hosts.
    Mx {
        qualifier: Qualifier,
        domain_spec: String,
        mask4: u8,
        mask6: u8,
    },
    /// `ptr[:domain]`: forward-confirmed reverse DNS (discouraged by the
    /// RFC, supported anyway).
    Ptr {
        qualifier: Qualifier,
        domain_spec: String,
    },
    /// `ip4:net`: local containment test, no DNS.
    Ip4 { qualifier: Qualifier, net: Ipv4Net },
    /// `ip6:net`: local containment test, no DNS.
    Ip6 { qualifier: Qualifier, net: Ipv6Net },
    /// `exists:domain`: matches when the expanded name has any A record.
    Exists {
        qualifier: Qualifier,
        domain_spec: String,
    },
}

impl Mechanism {
    /// Parses a single mechanism from its text form, leading qualifier
    /// included.
    pub fn parse(field: &str) -> Result<Self, ParseError> {
        if field.is_empty() {
            return Err(ParseError::EmptyMechanism);
        }

        let mut chars = field.chars();
        let (qualifier, rest) = match chars.next().and_then(Qualifier::from_char) {
            Some(qualifier) => (qualifier, chars.as_str()),
            None => (Qualifier::Pass, field),
        };

        // The name runs up to the first ':' or '/'; a single leading ':' is
        // consumed from the parameter. "a:" (colon with nothing after it) is
        // distinguished from a bare "a".
        let (name, parameter, empty_param) = match rest.find([':', '/']) {
            None => (rest.to_ascii_lowercase(), "", false),
            Some(separator) => {
                let name = rest[..separator].to_ascii_lowercase();
                let mut parameter = &rest[separator..];
                let mut empty_param = false;
                if let Some(stripped) = parameter.strip_prefix(':') {
                    parameter = stripped;
                    empty_param = parameter.is_empty();
                }
                (name, parameter, empty_param)
            }
        };

        match name.as_str() {
            "all" => {
                if !parameter.is_empty() {
                    return Err(ParseError::UnexpectedParameter);
                }
                Ok(Self::All { qualifier })
            }
            "include" => {
                if parameter.is_empty() {
                    return Err(ParseError::MissingDomainSpec("include"));
                }
                if !dns::valid_domain_spec(parameter) {
                    return Err(ParseError::InvalidDomainSpec("include"));
                }
                Ok(Self::Include {
                    qualifier,
                    domain_spec: parameter.to_string(),
                })
            }
            "a" => {
                if empty_param {
                    return Err(ParseError::EmptyDomain("a"));
                }
                let (domain_spec, mask4, mask6) = dual_cidr(parameter)?;
                if !dns::valid_optional_domain_spec(domain_spec) {
                    return Err(ParseError::InvalidDomainSpec("a"));
                }
                Ok(Self::A {
                    qualifier,
                    domain_spec: domain_spec.to_string(),
                    mask4,
                    mask6,
                })
            }
            "mx" => {
                if empty_param {
                    return Err(ParseError::EmptyDomain("mx"));
                }
                let (domain_spec, mask4, mask6) = dual_cidr(parameter)?;
                if !dns::valid_optional_domain_spec(domain_spec) {
                    return Err(ParseError::InvalidDomainSpec("mx"));
                }
                Ok(Self::Mx {
                    qualifier,
                    domain_spec: domain_spec.to_string(),
                    mask4,
                    mask6,
                })
            }
            "ptr" => {
                if empty_param {
                    return Err(ParseError::EmptyDomain("ptr"));
                }
                if !dns::valid_optional_domain_spec(parameter) {
                    return Err(ParseError::InvalidDomainSpec("ptr"));
                }
                Ok(Self::Ptr {
                    qualifier,
                    domain_spec: parameter.to_string(),
                })
            }
            "ip4" => {
                let net = parse_ip4_net(parameter)?;
                Ok(Self::Ip4 { qualifier, net })
            }
            "ip6" => {
                let net = parse_ip6_net(parameter)?;
                Ok(Self::Ip6 { qualifier, net })
            }
            "exists" => {
                if parameter.is_empty() {
                    return Err(ParseError::MissingDomainSpec("exists"));
                }
                if !dns::valid_domain_spec(parameter) {
                    return Err(ParseError::InvalidDomainSpec("exists"));
                }
                Ok(Self::Exists {
                    qualifier,
                    domain_spec: parameter.to_string(),
                })
            }
            other => Err(ParseError::UnknownMechanism(other.to_string())),
        }
    }

    pub fn qualifier(&self) -> Qualifier {
        match self {
            Self::All { qualifier }
            | Self::Include { qualifier, .. }
            | Self::A { qualifier, .. }
            | Self::Mx { qualifier, .. }
            | Self::Ptr { qualifier, .. }
            | Self::Ip4 { qualifier, .. }
            | Self::Ip6 { qualifier, .. }
            | Self::Exists { qualifier, .. } => *qualifier,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::All { .. } => "all",
            Self::Include { .. } => "include",
            Self::A { .. } => "a",
            Self::Mx { .. } => "mx",
            Self::Ptr { .. } => "ptr",
            Self::Ip4 { .. } => "ip4",
            Self::Ip6 { .. } => "ip6",
            Self::Exists { .. } => "exists",
        }
    }

    /// Evaluates this mechanism against the client IP and the current
    /// `<domain>`. `Ok(ResultCode::None)` means no match, walk on; any other
    /// code terminates the record.
    pub(crate) fn evaluate(
        &self,
        checker: &Checker,
        eval: &mut Evaluation,
        domain: &str,
    ) -> Result<ResultCode, Interrupted> {
        match self {
            Self::All { qualifier } => Ok(qualifier.code()),
            Self::Include {
                qualifier,
                domain_spec,
            } => eval_include(checker, eval, domain, domain_spec, *qualifier),
            Self::A {
                qualifier,
                domain_spec,
                mask4,
                mask6,
            } => eval_a(checker, eval, domain, domain_spec, *mask4, *mask6, *qualifier),
            Self::Mx {
                qualifier,
                domain_spec,
                mask4,
                mask6,
            } => eval_mx(checker, eval, domain, domain_spec, *mask4, *mask6, *qualifier),
            Self::Ptr {
                qualifier,
                domain_spec,
            } => ptr::evaluate_mechanism(checker, eval, domain, domain_spec, *qualifier),
            Self::Ip4 { qualifier, net } => Ok(match eval.ip {
                IpAddr::V4(client) if net.contains(&client) => qualifier.code(),
                _ => ResultCode::None,
            }),
            Self::Ip6 { qualifier, net } => Ok(match eval.ip {
                IpAddr::V6(client) if net.contains(&client) => qualifier.code(),
                _ => ResultCode::None,
            }),
            Self::Exists {
                qualifier,
                domain_spec,
            } => eval_exists(checker, eval, domain, domain_spec, *qualifier),
        }
    }
}

/// Strips an optional `/v4[//v6]` dual-CIDR suffix off a mechanism
/// parameter. Absent lengths default to 32 and 128.
fn dual_cidr(parameter: &str) -> Result<(&str, u8, u8), ParseError> {
    let mut rest = parameter;

    let mut mask6 = 128u8;
    if let Some(position) = rest.rfind("//") {
        let digits = &rest[position + 2..];
        if (1..=3).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit()) {
            let value: u32 = digits
                .parse()
                .map_err(|_| ParseError::InvalidCidrLength("ipv6"))?;
            if value > 128 {
                return Err(ParseError::InvalidCidrLength("ipv6"));
            }
            mask6 = value as u8;
            rest = &rest[..position];
        }
    }

    let mut mask4 = 32u8;
    if let Some(position) = rest.rfind('/') {
        let digits = &rest[position + 1..];
        if (1..=2).contains(&digits.len()) && digits.bytes().all(|b| b.is_ascii_digit()) {
            let value: u32 = digits
                .parse()
                .map_err(|_| ParseError::InvalidCidrLength("ipv4"))?;
            if value > 32 {
                return Err(ParseError::InvalidCidrLength("ipv4"));
            }
            mask4 = value as u8;
            rest = &rest[..position];
        }
    }

    Ok((rest, mask4, mask6))
}

/// `ip4`/`ip6` parameters parse strictly: the address must round-trip as
/// written and an explicit prefix length must match its canonical decimal
/// form (no leading zeros, no sign).
fn parse_ip4_net(parameter: &str) -> Result<Ipv4Net, ParseError> {
    let (addr_text, prefix) = match parameter.split_once('/') {
        None => (parameter, 32u8),
        Some((addr_text, prefix_text)) => {
            let prefix: u8 = prefix_text
                .parse()
                .map_err(|_| ParseError::InvalidAddress("ip4"))?;
            if prefix > 32 || prefix.to_string() != prefix_text {
                return Err(ParseError::InvalidAddress("ip4"));
            }
            (addr_text, prefix)
        }
    };
    let addr = addr_text
        .parse()
        .map_err(|_| ParseError::InvalidAddress("ip4"))?;
    Ipv4Net::new(addr, prefix)
        .map(|net| net.trunc())
        .map_err(|_| ParseError::InvalidAddress("ip4"))
}

fn parse_ip6_net(parameter: &str) -> Result<Ipv6Net, ParseError> {
    let (addr_text, prefix) = match parameter.split_once('/') {
        None => (parameter, 128u8),
        Some((addr_text, prefix_text)) => {
            let prefix: u8 = prefix_text
                .parse()
                .map_err(|_| ParseError::InvalidAddress("ip6"))?;
            if prefix > 128 || prefix.to_string() != prefix_text {
                return Err(ParseError::InvalidAddress("ip6"));
            }
            (addr_text, prefix)
        }
    };
    let addr = addr_text
        .parse()
        .map_err(|_| ParseError::InvalidAddress("ip6"))?;
    Ipv6Net::new(addr, prefix)
        .map(|net| net.trunc())
        .map_err(|_| ParseError::InvalidAddress("ip6"))
}

/// Expands and validates a mechanism's target name. `Ok(None)` means the
/// expanded name is not a usable hostname; the mechanism should not match.
fn expand_target(
    checker: &Checker,
    eval: &mut Evaluation,
    domain: &str,
    spec: &str,
) -> Result<Option<Name>, Interrupted> {
    let target = macros::expand_domain_spec(checker, eval, domain, spec, false)
        .map_err(|err| Interrupted::perm(err.into()))?;
    match dns::parse_hostname(&target) {
        Some(name) => Ok(Some(name)),
        None => {
            debug!("mechanism target '{target}' is not a valid hostname; no match");
            Ok(None)
        }
    }
}

fn eval_include(
    checker: &Checker,
    eval: &mut Evaluation,
    domain: &str,
    spec: &str,
    qualifier: Qualifier,
) -> Result<ResultCode, Interrupted> {
    let Some(target) = expand_target(checker, eval, domain, spec)? else {
        return Ok(ResultCode::None);
    };
    // <ip> and <sender> stay the same; only <domain> changes for the
    // recursive evaluation (RFC 7208 § 5.2).
    let code = checker.check_host_recursive(eval, &target.to_ascii(), true, false);
    match code {
        ResultCode::Pass => Ok(qualifier.code()),
        ResultCode::Fail | ResultCode::Softfail | ResultCode::Neutral => Ok(ResultCode::None),
        ResultCode::Temperror => Err(Interrupted::class(ResultCode::Temperror)),
        ResultCode::Permerror | ResultCode::None => Err(Interrupted::class(ResultCode::Permerror)),
    }
}

fn eval_a(
    checker: &Checker,
    eval: &mut Evaluation,
    domain: &str,
    spec: &str,
    mask4: u8,
    mask6: u8,
    qualifier: Qualifier,
) -> Result<ResultCode, Interrupted> {
    checker.bump_dns_budget(eval)?;
    let Some(target) = expand_target(checker, eval, domain, spec)? else {
        return Ok(ResultCode::None);
    };
    let qtype = address_qtype(eval.ip);
    let addresses = checker.lookup_addresses(eval, &target.to_ascii(), qtype)?;
    for address in addresses {
        if masked_contains(address, mask4, mask6, eval.ip) {
            return Ok(qualifier.code());
        }
    }
    Ok(ResultCode::None)
}

fn eval_mx(
    checker: &Checker,
    eval: &mut Evaluation,
    domain: &str,
    spec: &str,
    mask4: u8,
    mask6: u8,
    qualifier: Qualifier,
) -> Result<ResultCode, Interrupted> {
    checker.bump_dns_budget(eval)?;
    let Some(target) = expand_target(checker, eval, domain, spec)? else {
        return Ok(ResultCode::None);
    };
    let qtype = address_qtype(eval.ip);

    let records = checker.lookup_dns(eval, &target.to_ascii(), RecordType::MX)?;
    for (index, record) in records.iter().enumerate() {
        if index + 1 > checker.mx_address_limit {
            return Err(Interrupted::perm(CheckError::MxRecordLimit {
                limit: checker.mx_address_limit,
                domain: target.to_ascii(),
            }));
        }
        let Some(RData::MX(mx)) = record.data() else {
            continue;
        };
        let addresses = checker.lookup_addresses(eval, &mx.exchange().to_ascii(), qtype)?;
        for address in addresses {
            if masked_contains(address, mask4, mask6, eval.ip) {
                return Ok(qualifier.code());
            }
        }
    }
    Ok(ResultCode::None)
}

fn eval_exists(
    checker: &Checker,
    eval: &mut Evaluation,
    domain: &str,
    spec: &str,
    qualifier: Qualifier,
) -> Result<ResultCode, Interrupted> {
    checker.bump_dns_budget(eval)?;
    let Some(target) = expand_target(checker, eval, domain, spec)? else {
        return Ok(ResultCode::None);
    };
    // Always an A lookup, even for an IPv6 connection (RFC 7208 § 5.7).
    let addresses = checker.lookup_addresses(eval, &target.to_ascii(), RecordType::A)?;
    if addresses.is_empty() {
        Ok(ResultCode::None)
    } else {
        Ok(qualifier.code())
    }
}

pub(crate) fn address_qtype(ip: IpAddr) -> RecordType {
    match ip {
        IpAddr::V4(_) => RecordType::A,
        IpAddr::V6(_) => RecordType::AAAA,
    }
}

/// Does `candidate`, masked with the prefix for its family, contain the
/// client IP?
fn masked_contains(candidate: IpAddr, mask4: u8, mask6: u8, client: IpAddr) -> bool {
    match (candidate, client) {
        (IpAddr::V4(candidate), IpAddr::V4(client)) => Ipv4Net::new(candidate, mask4)
            .map(|net| net.contains(&client))
            .unwrap_or(false),
        (IpAddr::V6(candidate), IpAddr::V6(client)) => Ipv6Net::new(candidate, mask6)
            .map(|net| net.contains(&client))
            .unwrap_or(false),
        _ => false,
    }
}

impl fmt::Display for Mechanism {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::All { qualifier } => write_mechanism(f, *qualifier, "all", "", None, None),
            Self::Include {
                qualifier,
                domain_spec,
            } => write_mechanism(f, *qualifier, "include", domain_spec, None, None),
            Self::A {
                qualifier,
                domain_spec,
                mask4,
                mask6,
            } => write_mechanism(f, *qualifier, "a", domain_spec, Some(*mask4), Some(*mask6)),
            Self::Mx {
                qualifier,
                domain_spec,
                mask4,
                mask6,
            } => write_mechanism(f, *qualifier, "mx", domain_spec, Some(*mask4), Some(*mask6)),
            Self::Ptr {
                qualifier,
                domain_spec,
            } => write_mechanism(f, *qualifier, "ptr", domain_spec, None, None),
            Self::Ip4 { qualifier, net } => {
                write_mechanism(f, *qualifier, "ip4", &net.to_string(), None, None)
            }
            Self::Ip6 { qualifier, net } => {
                write_mechanism(f, *qualifier, "ip6", &net.to_string(), None, None)
            }
            Self::Exists {
                qualifier,
                domain_spec,
            } => write_mechanism(f, *qualifier, "exists", domain_spec, None, None),
        }
    }
}

fn write_mechanism(
    f: &mut fmt::Formatter<'_>,
    qualifier: Qualifier,
    name: &str,
    parameter: &str,
    mask4: Option<u8>,
    mask6: Option<u8>,
) -> fmt::Result {
    if let Some(c) = qualifier.as_char() {
        write!(f, "{c}")?;
    }
    f.write_str(name)?;
    if !parameter.is_empty() {
        write!(f, ":{parameter}")?;
    }
    if let Some(mask) = mask4 {
        if mask != 32 {
            write!(f, "/{mask}")?;
        }
    }
    if let Some(mask) = mask6 {
        if mask != 128 {
            write!(f, "//{mask}")?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mech(field: &str) -> Mechanism {
        Mechanism::parse(field).unwrap()
    }

    #[test]
    fn qualifiers() {
        assert_eq!(mech("all").qualifier(), Qualifier::Pass);
        assert_eq!(mech("+all").qualifier(), Qualifier::Pass);
        assert_eq!(mech("-aLl").qualifier(), Qualifier::Fail);
        assert_eq!(mech("~all").qualifier(), Qualifier::SoftFail);
        assert_eq!(mech("?ALL").qualifier(), Qualifier::Neutral);
    }

    #[test]
    fn all_takes_no_parameter() {
        assert_eq!(
            Mechanism::parse("all:foo.bar"),
            Err(ParseError::UnexpectedParameter)
        );
        assert_eq!(
            Mechanism::parse("all/8"),
            Err(ParseError::UnexpectedParameter)
        );
    }

    #[test]
    fn include_and_exists_need_domains() {
        assert_eq!(
            mech("include:_spf.example.com"),
            Mechanism::Include {
                qualifier: Qualifier::Pass,
                domain_spec: "_spf.example.com".to_string(),
            }
        );
        assert_eq!(
            Mechanism::parse("include"),
            Err(ParseError::MissingDomainSpec("include"))
        );
        assert_eq!(
            Mechanism::parse("exists"),
            Err(ParseError::MissingDomainSpec("exists"))
        );
        assert_eq!(
            Mechanism::parse("include:foo"),
            Err(ParseError::InvalidDomainSpec("include"))
        );
        assert_eq!(
            mech("exists:%{ir}.%{v}._spf.%{d2}"),
            Mechanism::Exists {
                qualifier: Qualifier::Pass,
                domain_spec: "%{ir}.%{v}._spf.%{d2}".to_string(),
            }
        );
    }

    #[test]
    fn a_and_mx_dual_cidr() {
        assert_eq!(
            mech("a"),
            Mechanism::A {
                qualifier: Qualifier::Pass,
                domain_spec: String::new(),
                mask4: 32,
                mask6: 128,
            }
        );
        assert_eq!(
            mech("a/24"),
            Mechanism::A {
                qualifier: Qualifier::Pass,
                domain_spec: String::new(),
                mask4: 24,
                mask6: 128,
            }
        );
        assert_eq!(
            mech("a:example.com/24//64"),
            Mechanism::A {
                qualifier: Qualifier::Pass,
                domain_spec: "example.com".to_string(),
                mask4: 24,
                mask6: 64,
            }
        );
        assert_eq!(
            mech("-mx:example.com//64"),
            Mechanism::Mx {
                qualifier: Qualifier::Fail,
                domain_spec: "example.com".to_string(),
                mask4: 32,
                mask6: 64,
            }
        );
        assert_eq!(
            Mechanism::parse("a:example.com/33"),
            Err(ParseError::InvalidCidrLength("ipv4"))
        );
        assert_eq!(
            Mechanism::parse("mx:example.com/32//129"),
            Err(ParseError::InvalidCidrLength("ipv6"))
        );
        assert_eq!(Mechanism::parse("a:"), Err(ParseError::EmptyDomain("a")));
        assert_eq!(Mechanism::parse("mx:"), Err(ParseError::EmptyDomain("mx")));
    }

    #[test]
    fn ip4_strict_parsing() {
        assert_eq!(
            mech("ip4:192.0.2.0/24"),
            Mechanism::Ip4 {
                qualifier: Qualifier::Pass,
                net: "192.0.2.0/24".parse().unwrap(),
            }
        );
        // A bare address gets an implicit /32.
        assert_eq!(
            mech("ip4:192.0.2.7"),
            Mechanism::Ip4 {
                qualifier: Qualifier::Pass,
                net: "192.0.2.7/32".parse().unwrap(),
            }
        );
        // Host bits are dropped, as the canonicaliser does.
        assert_eq!(
            mech("ip4:192.0.2.77/24"),
            Mechanism::Ip4 {
                qualifier: Qualifier::Pass,
                net: "192.0.2.0/24".parse().unwrap(),
            }
        );
        assert_eq!(
            Mechanism::parse("ip4:192.0.2.0/033"),
            Err(ParseError::InvalidAddress("ip4"))
        );
        assert_eq!(
            Mechanism::parse("ip4:192.0.2.999"),
            Err(ParseError::InvalidAddress("ip4"))
        );
        assert_eq!(
            Mechanism::parse("ip4:2001:db8::1"),
            Err(ParseError::InvalidAddress("ip4"))
        );
        assert_eq!(
            Mechanism::parse("ip4"),
            Err(ParseError::InvalidAddress("ip4"))
        );
    }

    #[test]
    fn ip6_strict_parsing() {
        assert_eq!(
            mech("ip6:2001:db8::/32"),
            Mechanism::Ip6 {
                qualifier: Qualifier::Pass,
                net: "2001:db8::/32".parse().unwrap(),
            }
        );
        assert_eq!(
            mech("~ip6:2001:db8::1"),
            Mechanism::Ip6 {
                qualifier: Qualifier::SoftFail,
                net: "2001:db8::1/128".parse().unwrap(),
            }
        );
        assert_eq!(
            Mechanism::parse("ip6:2001:db8::/129"),
            Err(ParseError::InvalidAddress("ip6"))
        );
        assert_eq!(
            Mechanism::parse("ip6:192.0.2.1"),
            Err(ParseError::InvalidAddress("ip6"))
        );
    }

    #[test]
    fn unknown_mechanisms_rejected() {
        assert_eq!(
            Mechanism::parse("foo:bar.example.com"),
            Err(ParseError::UnknownMechanism("foo".to_string()))
        );
        assert_eq!(Mechanism::parse(""), Err(ParseError::EmptyMechanism));
    }

    #[test]
    fn display_round_trips() {
        for field in [
            "all",
            "-all",
            "~all",
            "?all",
            "include:_spf.example.com",
            "-include:%{d2}.example.net",
            "a",
            "a/24",
            "a:example.com",
            "a:example.com/24",
            "a:example.com/24//64",
            "mx",
            "mx:example.com//64",
            "ptr",
            "ptr:example.com",
            "ip4:192.0.2.0/24",
            "ip6:2001:db8::/32",
            "-exists:%{ir}.sbl.example.org",
        ] {
            let parsed = mech(field);
            assert_eq!(parsed.to_string(), field, "canonical form of {field}");
            assert_eq!(mech(&parsed.to_string()), parsed, "round-trip of {field}");
        }

        // Non-canonical inputs settle on a canonical form after one pass.
        assert_eq!(mech("+a:example.com/32//128").to_string(), "a:example.com");
        assert_eq!(mech("ip4:192.0.2.7").to_string(), "ip4:192.0.2.7/32");
        let reparsed = mech(&mech("ip4:192.0.2.7").to_string());
        assert_eq!(reparsed, mech("ip4:192.0.2.7"));
    }

    #[test]
    fn dual_cidr_needs_double_slash_for_ipv6() {
        // "a/32/128" is not valid dual-cidr syntax; the ipv6 length needs
        // its own double slash, so the leftover text must parse as a
        // domain-spec and fails to.
        assert_eq!(
            Mechanism::parse("a/32/128"),
            Err(ParseError::InvalidDomainSpec("a"))
        );
    }
}
