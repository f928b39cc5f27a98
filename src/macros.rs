//! Macro-string validation and expansion, RFC 7208 § 7.
//!
//! Validation happens at parse time against the macro grammar alone;
//! expansion additionally needs per-evaluation state (sender, current
//! domain, client IP) and the `exp` flag that legalises the `c`, `r` and `t`
//! letters inside explanation text.

use std::net::{IpAddr, Ipv6Addr};
use std::time::{SystemTime, UNIX_EPOCH};

use crate::checker::{Checker, Evaluation};
use crate::error::MacroError;
use crate::ptr;

const MACRO_DELIMITERS: &[u8] = b".-+,/_=";

struct MacroTerm<'a> {
    letter: char,
    keep: Option<usize>,
    reverse: bool,
    delimiters: &'a str,
}

/// Parses the interior of a `%{...}` expression (everything after the `{`).
/// Returns the term and the number of bytes consumed including the closing
/// brace.
fn parse_macro_term(s: &str) -> Option<(MacroTerm<'_>, usize)> {
    let letter = s.chars().next()?;
    if !matches!(
        letter.to_ascii_lowercase(),
        's' | 'l' | 'o' | 'd' | 'i' | 'p' | 'v' | 'h' | 'c' | 'r' | 't'
    ) {
        return None;
    }

    let bytes = s.as_bytes();
    let mut idx = 1;
    let digits_start = idx;
    while idx < bytes.len() && bytes[idx].is_ascii_digit() {
        idx += 1;
    }
    let digits = &s[digits_start..idx];
    if digits.len() > 3 {
        return None;
    }
    let keep = if digits.is_empty() {
        None
    } else {
        digits.parse().ok()
    };

    let mut reverse = false;
    if bytes.get(idx) == Some(&b'r') {
        reverse = true;
        idx += 1;
    }

    let delimiters_start = idx;
    while idx < bytes.len() && MACRO_DELIMITERS.contains(&bytes[idx]) {
        idx += 1;
    }
    let delimiters = &s[delimiters_start..idx];

    if bytes.get(idx) != Some(&b'}') {
        return None;
    }

    Some((
        MacroTerm {
            letter,
            keep,
            reverse,
            delimiters,
        },
        idx + 1,
    ))
}

/// Checks a macro-string against the grammar, without expanding it.
pub(crate) fn macro_string_is_valid(s: &str) -> bool {
    let mut rest = s;
    loop {
        let Some(percent) = rest.find('%') else {
            return true;
        };
        rest = &rest[percent + 1..];
        match rest.chars().next() {
            None => return false,
            Some('%' | '-' | '_') => rest = &rest[1..],
            Some('{') => match parse_macro_term(&rest[1..]) {
                Some((_, consumed)) => rest = &rest[1 + consumed..],
                None => return false,
            },
            Some(_) => return false,
        }
    }
}

/// Expands a macro-string against the current evaluation, firing the macro
/// hook with the outcome.
pub(crate) fn expand_macro(
    checker: &Checker,
    eval: &mut Evaluation,
    domain: &str,
    input: &str,
    exp: bool,
) -> Result<String, MacroError> {
    let outcome = expand(checker, eval, domain, input, exp);
    if let Some(hook) = &checker.hook {
        match &outcome {
            Ok(value) => hook.macro_expanded(input, Some(value), None),
            Err(err) => hook.macro_expanded(input, None, Some(err)),
        }
    }
    outcome
}

fn expand(
    checker: &Checker,
    eval: &mut Evaluation,
    domain: &str,
    input: &str,
    exp: bool,
) -> Result<String, MacroError> {
    // Short circuit the common macro-free case.
    let Some(first) = input.find('%') else {
        return Ok(input.to_string());
    };

    let mut out = String::with_capacity(input.len());
    out.push_str(&input[..first]);
    let mut rest = &input[first + 1..];
    loop {
        let Some(next) = rest.chars().next() else {
            return Err(MacroError::TrailingPercent);
        };
        match next {
            '%' => {
                out.push('%');
                rest = &rest[1..];
            }
            '-' => {
                out.push_str("%20");
                rest = &rest[1..];
            }
            '_' => {
                out.push(' ');
                rest = &rest[1..];
            }
            '{' => {
                let Some((term, consumed)) = parse_macro_term(&rest[1..]) else {
                    let mut near = String::from("%");
                    near.extend(rest.chars().take(12));
                    return Err(MacroError::Malformed(near));
                };
                rest = &rest[1 + consumed..];
                let value = substitute(checker, eval, domain, &term, exp)?;
                out.push_str(&value);
            }
            other => return Err(MacroError::InvalidEscape(other)),
        }

        match rest.find('%') {
            Some(percent) => {
                out.push_str(&rest[..percent]);
                rest = &rest[percent + 1..];
            }
            None => {
                out.push_str(rest);
                return Ok(out);
            }
        }
    }
}

fn substitute(
    checker: &Checker,
    eval: &mut Evaluation,
    domain: &str,
    term: &MacroTerm<'_>,
    exp: bool,
) -> Result<String, MacroError> {
    let letter = term.letter.to_ascii_lowercase();
    if matches!(letter, 'c' | 'r' | 't') && !exp {
        return Err(MacroError::ExplanationOnly(letter));
    }

    let mut value = match letter {
        's' => eval.sender.clone(),
        'l' => local_part(&eval.sender).to_string(),
        'o' => sender_domain(&eval.sender).to_string(),
        'd' => domain.trim_end_matches('.').to_string(),
        'i' => match eval.ip {
            IpAddr::V4(v4) => v4.to_string(),
            IpAddr::V6(v6) => dotted_nibbles(v6),
        },
        'p' => ptr::ptr_macro_value(checker, eval, domain),
        'v' => match eval.ip {
            IpAddr::V4(_) => "in-addr".to_string(),
            IpAddr::V6(_) => "ip6".to_string(),
        },
        'h' => eval.helo.clone(),
        'c' => eval.ip.to_string(),
        'r' => checker.hostname.clone(),
        't' => unix_now().to_string(),
        other => return Err(MacroError::Malformed(other.to_string())),
    };

    // Uppercase letters URL-escape their expansion before any transformers
    // run (RFC 7208 § 7.3).
    if term.letter.is_ascii_uppercase() {
        value = rfc3986_escape(&value);
    }

    if term.keep.is_some() || term.reverse || !term.delimiters.is_empty() {
        let delimiters = if term.delimiters.is_empty() {
            "."
        } else {
            term.delimiters
        };
        // Splitting is naive: adjacent or leading/trailing delimiters
        // produce empty parts (RFC 7208 § 7.3).
        let mut parts: Vec<&str> = value
            .split(|c: char| delimiters.contains(c))
            .collect();
        if term.reverse {
            parts.reverse();
        }
        if let Some(keep) = term.keep {
            if keep < parts.len() {
                parts.drain(..parts.len() - keep);
            }
        }
        let joined = parts.join(".");
        value = joined;
    }

    Ok(value)
}

fn local_part(sender: &str) -> &str {
    sender.rfind('@').map_or(sender, |at| &sender[..at])
}

fn sender_domain(sender: &str) -> &str {
    sender
        .rfind('@')
        .map_or(sender, |at| &sender[at + 1..])
        .trim_end_matches('.')
}

/// The obsolete dotted-nibble format: 32 hexadecimal nibbles separated by
/// dots (RFC 7208 § 7.4).
fn dotted_nibbles(v6: Ipv6Addr) -> String {
    let mut out = String::with_capacity(63);
    for (index, octet) in v6.octets().iter().enumerate() {
        if index != 0 {
            out.push('.');
        }
        out.push(char::from_digit(u32::from(octet >> 4), 16).unwrap_or('0'));
        out.push('.');
        out.push(char::from_digit(u32::from(octet & 0x0f), 16).unwrap_or('0'));
    }
    out
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

/// Expands a domain-spec: an empty spec names the current domain, and an
/// over-long expansion drops leading labels until the name fits in 253
/// octets (RFC 7208 § 7.3).
pub(crate) fn expand_domain_spec(
    checker: &Checker,
    eval: &mut Evaluation,
    domain: &str,
    spec: &str,
    exp: bool,
) -> Result<String, MacroError> {
    if spec.is_empty() {
        return Ok(domain.to_string());
    }
    let target = expand_macro(checker, eval, domain, spec, exp)?;
    if target.len() <= 253 {
        return Ok(target);
    }

    let mut length = target.len();
    let mut parts: Vec<&str> = target.split('.').collect();
    loop {
        if parts.is_empty() {
            return Err(MacroError::OverlongDomain);
        }
        length = length.saturating_sub(parts[0].len() + 1);
        parts.remove(0);
        if length <= 253 {
            return Ok(parts.join("."));
        }
    }
}

const UPPERHEX: &[u8; 16] = b"0123456789ABCDEF";

/// Escapes everything outside the RFC 3986 "unreserved" set.
fn rfc3986_escape(s: &str) -> String {
    if s
        .bytes()
        .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~'))
    {
        return s.to_string();
    }
    let mut out = String::with_capacity(s.len() + 8);
    for b in s.bytes() {
        if b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_' | b'~') {
            out.push(b as char);
        } else {
            out.push('%');
            out.push(UPPERHEX[usize::from(b >> 4)] as char);
            out.push(UPPERHEX[usize::from(b & 0x0f)] as char);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolver::Resolver;
    use trust_dns_resolver::error::ResolveError;
    use trust_dns_resolver::proto::op::Message;

    struct NoDns;

    impl Resolver for NoDns {
        fn resolve(&self, _query: &Message) -> Result<Message, ResolveError> {
            Err(ResolveError::from("no DNS in this test"))
        }
    }

    fn checker() -> Checker {
        Checker::with_resolver(Box::new(NoDns)).with_hostname("receiver.example.net")
    }

    // The evaluation state of the worked examples in RFC 7208 § 7.4.
    fn eval() -> Evaluation {
        Evaluation::new(
            "192.0.2.3".parse().unwrap(),
            "strong-bad@email.example.com",
            "mta.example.com",
        )
    }

    fn expand_ok(input: &str) -> String {
        expand_macro(&checker(), &mut eval(), "email.example.com.", input, false).unwrap()
    }

    fn expand_err(input: &str) -> MacroError {
        expand_macro(&checker(), &mut eval(), "email.example.com.", input, false).unwrap_err()
    }

    #[test]
    fn validation() {
        assert!(macro_string_is_valid(""));
        assert!(macro_string_is_valid("plain.example.com"));
        assert!(macro_string_is_valid("%{s}.%{d2}.%%.%_.%-"));
        assert!(macro_string_is_valid("%{l4-}%{or}%{d}%{i}%{p}%{v}%{h}"));
        assert!(macro_string_is_valid("%{c}%{r}%{t}"));
        assert!(!macro_string_is_valid("%"));
        assert!(!macro_string_is_valid("%x"));
        assert!(!macro_string_is_valid("%{x}"));
        assert!(!macro_string_is_valid("%{}"));
        assert!(!macro_string_is_valid("%{s"));
        assert!(!macro_string_is_valid("%{s9999}"));
        assert!(!macro_string_is_valid("%{sR}"));
        assert!(!macro_string_is_valid("%{o!}"));
    }

    #[test]
    fn expansion_without_macros_is_identity() {
        assert_eq!(expand_ok("mail.example.org"), "mail.example.org");
        assert_eq!(expand_ok(""), "");
    }

    #[test]
    fn simple_letters() {
        assert_eq!(expand_ok("%{s}"), "strong-bad@email.example.com");
        assert_eq!(expand_ok("%{l}"), "strong-bad");
        assert_eq!(expand_ok("%{o}"), "email.example.com");
        assert_eq!(expand_ok("%{d}"), "email.example.com");
        assert_eq!(expand_ok("%{i}"), "192.0.2.3");
        assert_eq!(expand_ok("%{v}"), "in-addr");
        assert_eq!(expand_ok("%{h}"), "mta.example.com");
    }

    #[test]
    fn literal_escapes() {
        assert_eq!(expand_ok("a%%b%_c%-d"), "a%b c%20d");
    }

    #[test]
    fn transformers() {
        // RFC 7208 § 7.4 worked examples.
        assert_eq!(expand_ok("%{d4}"), "email.example.com");
        assert_eq!(expand_ok("%{d2}"), "example.com");
        assert_eq!(expand_ok("%{d1}"), "com");
        assert_eq!(expand_ok("%{dr}"), "com.example.email");
        assert_eq!(expand_ok("%{d2r}"), "example.email");
        assert_eq!(expand_ok("%{l-}"), "strong.bad");
        assert_eq!(expand_ok("%{lr}"), "strong-bad");
        assert_eq!(expand_ok("%{lr-}"), "bad.strong");
        assert_eq!(expand_ok("%{l1r-}"), "strong");
        assert_eq!(
            expand_ok("%{ir}.%{v}._spf.%{d2}"),
            "3.2.0.192.in-addr._spf.example.com"
        );
        assert_eq!(
            expand_ok("%{lr-}.lp._spf.%{d2}"),
            "bad.strong.lp._spf.example.com"
        );
        assert_eq!(
            expand_ok("%{ir}.%{v}.%{l1r-}.lp._spf.%{d2}"),
            "3.2.0.192.in-addr.strong.lp._spf.example.com"
        );
    }

    #[test]
    fn ipv6_dotted_nibbles() {
        let mut eval = Evaluation::new(
            "2001:db8::cb01".parse().unwrap(),
            "strong-bad@email.example.com",
            "",
        );
        let expanded =
            expand_macro(&checker(), &mut eval, "email.example.com.", "%{ir}.%{v}", false)
                .unwrap();
        assert_eq!(
            expanded,
            "1.0.b.c.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.0.8.b.d.0.1.0.0.2.ip6"
        );
    }

    #[test]
    fn uppercase_letters_url_escape() {
        let mut eval = Evaluation::new(
            "192.0.2.3".parse().unwrap(),
            "jack+report@example.org",
            "",
        );
        let expanded =
            expand_macro(&checker(), &mut eval, "example.org.", "%{L}", false).unwrap();
        assert_eq!(expanded, "jack%2Breport");
    }

    #[test]
    fn exp_only_letters_gated() {
        assert!(matches!(expand_err("%{c}"), MacroError::ExplanationOnly('c')));
        assert!(matches!(expand_err("%{r}"), MacroError::ExplanationOnly('r')));
        assert!(matches!(expand_err("%{t}"), MacroError::ExplanationOnly('t')));

        let expanded =
            expand_macro(&checker(), &mut eval(), "email.example.com.", "%{c} / %{r}", true)
                .unwrap();
        assert_eq!(expanded, "192.0.2.3 / receiver.example.net");
    }

    #[test]
    fn malformed_macros() {
        assert_eq!(expand_err("foo%"), MacroError::TrailingPercent);
        assert!(matches!(expand_err("foo%bar"), MacroError::InvalidEscape('b')));
        assert!(matches!(expand_err("%{q}"), MacroError::Malformed(_)));
        assert!(matches!(expand_err("%{s"), MacroError::Malformed(_)));
    }

    #[test]
    fn domain_spec_empty_is_current_domain() {
        let expanded =
            expand_domain_spec(&checker(), &mut eval(), "email.example.com.", "", false).unwrap();
        assert_eq!(expanded, "email.example.com.");
    }

    #[test]
    fn overlong_expansion_trims_leading_labels() {
        let mut eval = Evaluation::new(
            "192.0.2.3".parse().unwrap(),
            &format!("{}@example.com", "a".repeat(250)),
            "",
        );
        let expanded = expand_domain_spec(
            &checker(),
            &mut eval,
            "example.com.",
            "%{l}.%{d}",
            false,
        )
        .unwrap();
        assert!(expanded.len() <= 253);
        assert_eq!(expanded, "example.com");
    }
}
