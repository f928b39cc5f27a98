use std::fmt;

use crate::error::CheckError;

/// Overall SPF result for a checked message, per RFC 7208 § 2.6.
///
/// `None` means no usable domain or no SPF record; `Neutral` that the domain
/// owner asserts nothing; `Pass`/`Fail` that the client is (not) authorized;
/// `Softfail` a weak not-authorized statement; `Temperror` a transient DNS
/// problem worth retrying; `Permerror` a policy that could not be correctly
/// interpreted.
#[cfg_attr(
    feature = "with-serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultCode {
    None,
    Neutral,
    Pass,
    Fail,
    Softfail,
    Temperror,
    Permerror,
}

impl ResultCode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Neutral => "neutral",
            Self::Pass => "pass",
            Self::Fail => "fail",
            Self::Softfail => "softfail",
            Self::Temperror => "temperror",
            Self::Permerror => "permerror",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Mechanism qualifier, RFC 7208 § 4.6.2.
///
/// Restricting qualifiers to their own type keeps non-qualifier result codes
/// out of mechanisms by construction.
#[cfg_attr(
    feature = "with-serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "lowercase")
)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Qualifier {
    #[default]
    Pass,
    Fail,
    SoftFail,
    Neutral,
}

impl Qualifier {
    pub fn code(self) -> ResultCode {
        match self {
            Self::Pass => ResultCode::Pass,
            Self::Fail => ResultCode::Fail,
            Self::SoftFail => ResultCode::Softfail,
            Self::Neutral => ResultCode::Neutral,
        }
    }

    /// The single-character text form. `Pass` is the implicit default and has
    /// no character.
    pub fn as_char(self) -> Option<char> {
        match self {
            Self::Pass => None,
            Self::Fail => Some('-'),
            Self::SoftFail => Some('~'),
            Self::Neutral => Some('?'),
        }
    }

    pub(crate) fn from_char(c: char) -> Option<Self> {
        match c {
            '+' => Some(Self::Pass),
            '-' => Some(Self::Fail),
            '~' => Some(Self::SoftFail),
            '?' => Some(Self::Neutral),
            _ => None,
        }
    }
}

impl fmt::Display for Qualifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.as_char() {
            Some(c) => write!(f, "{c}"),
            None => Ok(()),
        }
    }
}

/// Everything gathered while checking SPF for one message.
#[derive(Debug)]
pub struct SpfResult {
    pub code: ResultCode,
    /// Diagnostic for `temperror`/`permerror`/`none` outcomes. Informational
    /// only; the classification lives in `code`.
    pub error: Option<CheckError>,
    /// DNS-causing terms evaluated, including the initial record fetch.
    pub dns_queries: u32,
    /// Queries that came back NXDOMAIN or empty.
    pub void_lookups: u32,
    /// Expanded `exp=` text, or empty when the policy offers none.
    pub explanation: String,
    /// Whether the returned result came from checking the HELO identity.
    pub used_helo: bool,
    pub sender: String,
    pub helo: String,
    /// The receiving host, as configured on the [`Checker`](crate::Checker).
    pub hostname: String,
}

impl SpfResult {
    /// Renders the result as an RFC 8601 `Authentication-Results:` header
    /// value.
    pub fn authentication_results(&self) -> String {
        if self.used_helo {
            format!("{}; spf={} smtp.helo={}", self.hostname, self.code, self.helo)
        } else {
            format!(
                "{}; spf={} smtp.mailfrom={}",
                self.hostname, self.code, self.sender
            )
        }
    }
}

impl fmt::Display for SpfResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.code.fmt(f)
    }
}

/// An evaluation step that cannot simply continue the mechanism walk: the
/// record's result is already decided (`temperror`/`permerror`, or a mapped
/// include outcome).
#[derive(Debug)]
pub(crate) struct Interrupted {
    pub code: ResultCode,
    pub error: Option<CheckError>,
}

impl Interrupted {
    pub fn perm(error: CheckError) -> Self {
        Self {
            code: ResultCode::Permerror,
            error: Some(error),
        }
    }

    pub fn temp(error: CheckError) -> Self {
        Self {
            code: ResultCode::Temperror,
            error: Some(error),
        }
    }

    pub fn class(code: ResultCode) -> Self {
        Self { code, error: None }
    }
}
