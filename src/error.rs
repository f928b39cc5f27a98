use thiserror::Error;
use trust_dns_resolver::error::ResolveError;

/// Errors raised while checking an SPF policy.
///
/// These never cross the evaluator boundary as `Err`: the evaluator folds
/// them into the seven-valued result space and attaches the diagnostic to
/// [`SpfResult::error`](crate::SpfResult). Only operations that run before an
/// evaluation starts (resolver construction, input normalization) surface
/// them directly.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error("invalid domain '{0}'")]
    InvalidDomain(String),
    #[error("domain '{0}' is not fully qualified")]
    NotFullyQualified(String),
    #[error("invalid hostname '{0}'")]
    InvalidHostname(String),
    #[error("limit of {0} DNS queries exceeded")]
    DnsLimitExceeded(u32),
    #[error("void lookups exceeded limit of {0}")]
    VoidLookupLimit(u32),
    #[error("limit of {limit} MX records exceeded for {domain}")]
    MxRecordLimit { limit: usize, domain: String },
    #[error("DNS lookup for {name} failed: {source}")]
    Dns {
        name: String,
        #[source]
        source: ResolveError,
    },
    #[error("resolver initialization failed: {source}")]
    ResolverInit {
        #[source]
        source: std::io::Error,
    },
    #[error("domain IDNA conversion failed")]
    Idna {
        #[source]
        source: idna::Errors,
    },
    #[error(transparent)]
    Syntax(#[from] ParseError),
    #[error(transparent)]
    Macro(#[from] MacroError),
}

impl CheckError {
    pub(crate) fn dns(name: impl Into<String>, source: ResolveError) -> Self {
        Self::Dns {
            name: name.into(),
            source,
        }
    }

    pub(crate) fn resolver_init(source: std::io::Error) -> Self {
        Self::ResolverInit { source }
    }

    pub(crate) fn idna(source: idna::Errors) -> Self {
        Self::Idna { source }
    }
}

/// Syntax errors in an SPF record or a single mechanism.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("empty record")]
    EmptyRecord,
    #[error("record doesn't begin with v=spf1")]
    MissingVersion,
    #[error("invalid character {0:?} in record")]
    InvalidCharacter(char),
    #[error("multiple {0} modifiers")]
    DuplicateModifier(&'static str),
    #[error("invalid domain-spec in {0}")]
    InvalidDomainSpec(&'static str),
    #[error("invalid macro-string in modifier")]
    InvalidModifierMacro,
    #[error("empty mechanism")]
    EmptyMechanism,
    #[error("unrecognized mechanism '{0}'")]
    UnknownMechanism(String),
    #[error("'all' does not take a parameter")]
    UnexpectedParameter,
    #[error("{0} requires a domain-spec")]
    MissingDomainSpec(&'static str),
    #[error("empty domain in {0} mechanism")]
    EmptyDomain(&'static str),
    #[error("invalid {0} prefix length in dual-cidr")]
    InvalidCidrLength(&'static str),
    #[error("invalid address in {0} mechanism")]
    InvalidAddress(&'static str),
    #[error("in field '{field}': {source}")]
    Field {
        field: String,
        #[source]
        source: Box<ParseError>,
    },
}

impl ParseError {
    pub(crate) fn in_field(field: impl Into<String>, source: ParseError) -> Self {
        Self::Field {
            field: field.into(),
            source: Box::new(source),
        }
    }
}

/// Errors in a macro-string, found either while parsing a record or while
/// expanding macros against evaluation state.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MacroError {
    #[error("trailing '%' in macro-string")]
    TrailingPercent,
    #[error("invalid character {0:?} after '%' in macro-string")]
    InvalidEscape(char),
    #[error("malformed macro expression near '{0}'")]
    Malformed(String),
    #[error("'{0}' macro is only allowed in explanation text")]
    ExplanationOnly(char),
    #[error("macro expansion left no usable domain")]
    OverlongDomain,
}
