//! Parsing a whole SPF record into mechanisms and modifiers
//! (RFC 7208 § 4.6, § 6).

use std::fmt;

use crate::dns;
use crate::error::ParseError;
use crate::macros;
use crate::mechanism::Mechanism;

/// The parsed form of one SPF policy record.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SpfRecord {
    /// Mechanisms, in record order.
    pub mechanisms: Vec<Mechanism>,
    /// The `redirect=` target, at most one.
    pub redirect: Option<String>,
    /// The `exp=` target, at most one.
    pub exp: Option<String>,
    /// Unknown modifiers, preserved verbatim.
    pub other_modifiers: Vec<String>,
}

impl SpfRecord {
    /// Parses the text of an SPF record.
    pub fn parse(record: &str) -> Result<Self, ParseError> {
        let mut fields = record.split_whitespace();
        let Some(version) = fields.next() else {
            return Err(ParseError::EmptyRecord);
        };
        if !version.eq_ignore_ascii_case("v=spf1") {
            return Err(ParseError::MissingVersion);
        }

        let mut parsed = Self::default();
        for field in fields {
            // Anything outside printable seven-bit ASCII makes the record
            // uninterpretable.
            if let Some(bad) = field.chars().find(|&c| !(' '..='~').contains(&c)) {
                return Err(ParseError::InvalidCharacter(bad));
            }

            if let Some((name, value)) = split_modifier(field) {
                if name.eq_ignore_ascii_case("redirect") {
                    if parsed.redirect.is_some() {
                        return Err(ParseError::DuplicateModifier("redirect"));
                    }
                    if !dns::valid_domain_spec(value) {
                        return Err(ParseError::InvalidDomainSpec("redirect"));
                    }
                    parsed.redirect = Some(value.to_string());
                } else if name.eq_ignore_ascii_case("exp") {
                    if parsed.exp.is_some() {
                        return Err(ParseError::DuplicateModifier("exp"));
                    }
                    if !dns::valid_domain_spec(value) {
                        return Err(ParseError::InvalidDomainSpec("exp"));
                    }
                    parsed.exp = Some(value.to_string());
                } else {
                    if !macros::macro_string_is_valid(value) {
                        return Err(ParseError::InvalidModifierMacro);
                    }
                    parsed.other_modifiers.push(field.to_string());
                }
                continue;
            }

            let mechanism =
                Mechanism::parse(field).map_err(|err| ParseError::in_field(field, err))?;
            parsed.mechanisms.push(mechanism);
        }

        Ok(parsed)
    }
}

/// `name "=" macro-string` where name is `ALPHA *( ALPHA / DIGIT / "-" /
/// "_" / "." )`. Anything else is a mechanism.
fn split_modifier(field: &str) -> Option<(&str, &str)> {
    let (name, value) = field.split_once('=')?;
    let mut chars = name.chars();
    if !chars.next()?.is_ascii_alphabetic() {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')) {
        return None;
    }
    Some((name, value))
}

impl fmt::Display for SpfRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("v=spf1")?;
        for mechanism in &self.mechanisms {
            write!(f, " {mechanism}")?;
        }
        if let Some(redirect) = &self.redirect {
            write!(f, " redirect={redirect}")?;
        }
        if let Some(exp) = &self.exp {
            write!(f, " exp={exp}")?;
        }
        for modifier in &self.other_modifiers {
            write!(f, " {modifier}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::Qualifier;

    #[test]
    fn version_section_required() {
        assert_eq!(SpfRecord::parse(""), Err(ParseError::EmptyRecord));
        assert_eq!(SpfRecord::parse("   "), Err(ParseError::EmptyRecord));
        assert_eq!(
            SpfRecord::parse("spf1 -all"),
            Err(ParseError::MissingVersion)
        );
        assert_eq!(
            SpfRecord::parse("v=spf2 -all"),
            Err(ParseError::MissingVersion)
        );
        assert!(SpfRecord::parse("V=SPF1 -all").is_ok());
    }

    #[test]
    fn basic_record() {
        let record =
            SpfRecord::parse("v=spf1 ip4:192.0.2.0/24 a mx:mail.example.com -all").unwrap();
        assert_eq!(record.mechanisms.len(), 4);
        assert_eq!(record.mechanisms[3].qualifier(), Qualifier::Fail);
        assert!(record.redirect.is_none());
        assert!(record.exp.is_none());
    }

    #[test]
    fn modifiers() {
        let record = SpfRecord::parse(
            "v=spf1 mx redirect=_spf.example.com exp=explain.%{d} unknown-mod=%{s}",
        )
        .unwrap();
        assert_eq!(record.redirect.as_deref(), Some("_spf.example.com"));
        assert_eq!(record.exp.as_deref(), Some("explain.%{d}"));
        assert_eq!(record.other_modifiers, vec!["unknown-mod=%{s}".to_string()]);
    }

    #[test]
    fn duplicate_modifiers_rejected() {
        assert_eq!(
            SpfRecord::parse("v=spf1 redirect=a.example.com redirect=b.example.com"),
            Err(ParseError::DuplicateModifier("redirect"))
        );
        assert_eq!(
            SpfRecord::parse("v=spf1 -all exp=a.example.com exp=b.example.com"),
            Err(ParseError::DuplicateModifier("exp"))
        );
    }

    #[test]
    fn invalid_modifier_values_rejected() {
        assert_eq!(
            SpfRecord::parse("v=spf1 redirect=%{x}.example.com"),
            Err(ParseError::InvalidDomainSpec("redirect"))
        );
        assert_eq!(
            SpfRecord::parse("v=spf1 unknown=%{"),
            Err(ParseError::InvalidModifierMacro)
        );
    }

    #[test]
    fn control_characters_rejected() {
        assert_eq!(
            SpfRecord::parse("v=spf1 a:ex\u{7f}ample.com -all"),
            Err(ParseError::InvalidCharacter('\u{7f}'))
        );
        assert_eq!(
            SpfRecord::parse("v=spf1 a:exämple.com -all"),
            Err(ParseError::InvalidCharacter('ä'))
        );
        // Whitespace separators themselves are fine.
        assert!(SpfRecord::parse("v=spf1\t-all").is_ok());
    }

    #[test]
    fn mechanism_errors_carry_the_field() {
        let err = SpfRecord::parse("v=spf1 ip4:not-an-address -all").unwrap_err();
        match err {
            ParseError::Field { field, source } => {
                assert_eq!(field, "ip4:not-an-address");
                assert_eq!(*source, ParseError::InvalidAddress("ip4"));
            }
            other => panic!("expected field error, got {other:?}"),
        }
    }

    #[test]
    fn display_round_trips() {
        for text in [
            "v=spf1 ip4:192.0.2.0/24 a mx:mail.example.com -all",
            "v=spf1 include:_spf.example.com ~all",
            "v=spf1 a:example.com/24//64 redirect=%{d2}.example.net",
            "v=spf1 -all exp=explain._spf.%{d}",
        ] {
            let parsed = SpfRecord::parse(text).unwrap();
            assert_eq!(parsed.to_string(), text);
            assert_eq!(SpfRecord::parse(&parsed.to_string()).unwrap(), parsed);
        }
    }
}
