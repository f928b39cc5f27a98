use trust_dns_resolver::error::ResolveError;
use trust_dns_resolver::proto::op::Message;

use crate::error::MacroError;
use crate::mechanism::Mechanism;
use crate::result::ResultCode;

/// Observation points inside the check_host process.
///
/// All methods default to no-ops, so implementors pick the events they care
/// about and a checker without a hook costs nothing. Callbacks fire
/// synchronously on the evaluating thread, at deterministic points.
pub trait Hook {
    /// A DNS query was issued; `response` and `error` reflect the resolver's
    /// answer.
    fn dns(&self, _query: &Message, _response: Option<&Message>, _error: Option<&ResolveError>) {}

    /// An SPF record was fetched for `domain` and is about to be evaluated.
    fn record(&self, _record: &str, _domain: &str) {}

    /// Evaluation of the record at `domain` finished with `code`. Fires for
    /// the top-level domain and for every include/redirect target.
    fn record_result(&self, _domain: &str, _code: ResultCode) {}

    /// A macro-string was expanded (or failed to).
    fn macro_expanded(&self, _input: &str, _output: Option<&str>, _error: Option<&MacroError>) {}

    /// The mechanism at `index` in the record at `domain` yielded `code`.
    fn mechanism(&self, _domain: &str, _index: usize, _mechanism: &Mechanism, _code: ResultCode) {}

    /// A redirect modifier is about to be followed.
    fn redirect(&self, _target: &str) {}
}
