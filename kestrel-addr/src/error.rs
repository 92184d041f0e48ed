use std::{io, net::Ipv4Addr};

use thiserror::Error;

use crate::resolve::ResolveMethod;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PatternError {
    #[error("empty address")]
    Empty,
    #[error("can't remap from or to a bare '*'")]
    BareWildcard,
    #[error("'{0}' is ambiguous - address starts with a '.'")]
    LeadingDot(String),
    #[error("'{0}' has a wildcard that is not followed by '.'")]
    MisplacedWildcard(String),
    #[error("'{0}' has an empty label")]
    EmptyLabel(String),
    #[error("'{0}' contains an illegal character")]
    IllegalCharacter(String),
    #[error("'{0}' uses a wildcard target but the pattern has no wildcard")]
    WildcardTarget(String),
    #[error("MapAddress '{0}' has too few arguments")]
    TooFewArguments(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RewriteError {
    #[error("rewriting {0} loops back onto an address already visited")]
    Cycle(String),
    #[error("rewrote {0} {1} times without settling")]
    TooManyRewrites(String, usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupStage {
    ConfiguredHostname,
    LocalHostname,
    Interface,
}

impl std::fmt::Display for LookupStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            LookupStage::ConfiguredHostname => "resolving configured address",
            LookupStage::LocalHostname => "getting local hostname",
            LookupStage::Interface => "getting local interface address",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Error)]
pub enum ResolveError {
    #[error("failed {stage}")]
    LookupFailure {
        stage: LookupStage,
        #[source]
        source: io::Error,
    },
    #[error("address {address} ({method}) is internal and can't be advertised")]
    InternalAddressRejected {
        address: Ipv4Addr,
        method: ResolveMethod,
    },
}

impl ResolveError {
    pub(crate) fn lookup(stage: LookupStage, source: io::Error) -> Self {
        ResolveError::LookupFailure { stage, source }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("line {line}: '{keyword}' has no value")]
    MissingValue { line: usize, keyword: String },
    #[error("'{keyword}' expects 0 or 1, got '{value}'")]
    InvalidBool { keyword: String, value: String },
    #[error(transparent)]
    Family(#[from] FamilyError),
    #[error("invalid bridge line '{line}': {source}")]
    Bridge {
        line: String,
        #[source]
        source: BridgeLineError,
    },
    #[error("invalid transport line '{line}': {source}")]
    Transport {
        line: String,
        #[source]
        source: TransportLineError,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BridgeLineError {
    #[error("empty bridge line")]
    Empty,
    #[error("missing address")]
    MissingAddress,
    #[error("'{0}' is not a valid address")]
    BadAddress(String),
    #[error("'{0}' is not a valid key fingerprint")]
    BadFingerprint(String),
    #[error("'{0}' is not a k=v argument")]
    BadSocksArgument(String),
    #[error("SOCKS arguments are {0} bytes, more than fits in SOCKS5 auth fields")]
    SocksArgumentsTooLong(usize),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportLineError {
    #[error("too few arguments")]
    TooFewArguments,
    #[error("'{0}' is not a valid transport name")]
    BadTransportName(String),
    #[error("strange transport method '{0}'")]
    UnknownMethod(String),
    #[error("a proxy line can only name one transport")]
    MultipleTransports,
    #[error("'{0}' is not a valid addr:port")]
    BadAddress(String),
    #[error("managed proxies are not supported when sandboxing is enabled")]
    SandboxedExec,
    #[error("'{0}' is not a k=v option")]
    BadOption(String),
    #[error("transport registry refused '{0}'")]
    Registry(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FamilyError {
    #[error("'{0}' is neither a nickname nor a hex digest")]
    InvalidEntry(String),
}
