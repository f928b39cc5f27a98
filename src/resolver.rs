use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::proto::op::{Message, MessageType, ResponseCode};

use crate::error::CheckError;

/// Resolves DNS queries during an SPF check.
///
/// Every lookup the evaluator performs goes through this trait, so tests and
/// embedders can substitute their own resolution (a cache, a fake zone, a
/// remote service). The query carries exactly one question; implementations
/// must return a response message whose RCODE reflects the lookup outcome, or
/// an error for transport-level failures (classified `temperror`).
///
/// A `Checker` shared across threads performs its lookups concurrently, so an
/// implementation used that way must tolerate concurrent `resolve` calls.
pub trait Resolver {
    fn resolve(&self, query: &Message) -> Result<Message, ResolveError>;
}

/// The default [`Resolver`], backed by the platform's configured nameservers
/// via `trust-dns-resolver`'s synchronous stub resolver.
pub struct SystemResolver {
    inner: trust_dns_resolver::Resolver,
}

impl SystemResolver {
    /// Builds a resolver from the system configuration
    /// (`/etc/resolv.conf` on unix).
    pub fn from_system_conf() -> Result<Self, CheckError> {
        let inner =
            trust_dns_resolver::Resolver::from_system_conf().map_err(CheckError::resolver_init)?;
        Ok(Self { inner })
    }

    /// Builds a resolver with an explicit configuration.
    pub fn new(config: ResolverConfig, options: ResolverOpts) -> Result<Self, CheckError> {
        let inner =
            trust_dns_resolver::Resolver::new(config, options).map_err(CheckError::resolver_init)?;
        Ok(Self { inner })
    }
}

impl Resolver for SystemResolver {
    fn resolve(&self, query: &Message) -> Result<Message, ResolveError> {
        let question = query
            .queries()
            .first()
            .ok_or_else(|| ResolveError::from("query message has no question section"))?;

        let mut response = Message::new();
        response.set_id(query.id());
        response.set_message_type(MessageType::Response);
        response.add_query(question.clone());

        match self
            .inner
            .lookup(question.name().clone(), question.query_type())
        {
            Ok(lookup) => {
                response.set_response_code(ResponseCode::NoError);
                for record in lookup.records() {
                    response.add_answer(record.clone());
                }
            }
            // Negative answers come back as errors from the high-level
            // lookup API; reconstitute the RCODE so the gateway can classify
            // NXDOMAIN and empty responses itself.
            Err(err) => match err.kind() {
                ResolveErrorKind::NoRecordsFound { response_code, .. } => {
                    response.set_response_code(*response_code);
                }
                _ => return Err(err),
            },
        }

        Ok(response)
    }
}
