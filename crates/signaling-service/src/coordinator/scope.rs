//! Channel scoping: how a caller-chosen room token becomes a [`ChannelKey`].
//!
//! Two connections only meet if their room tokens scope to the same key.
//! `RoomScope` uses the token as-is. `OriginScope` prefixes it with the
//! client's network origin so identical tokens from different origins land in
//! different channels; peers behind a shared NAT or proxy will share an origin.

use crate::types::{ChannelKey, ConnectionContext};

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Maps (connection context, room token) to a channel key.
pub trait ChannelScope: Send + Sync + fmt::Debug {
    fn scope(&self, context: &ConnectionContext, room: &str) -> ChannelKey;
}

/// Every connection naming the same room token shares one channel.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoomScope;

impl ChannelScope for RoomScope {
    fn scope(&self, _context: &ConnectionContext, room: &str) -> ChannelKey {
        ChannelKey(room.to_string())
    }
}

/// Channels are partitioned by client origin.
#[derive(Debug, Clone, Copy, Default)]
pub struct OriginScope {
    /// Prefer the `X-Forwarded-For` hop over the socket address.
    pub trust_forwarded_for: bool,
}

impl OriginScope {
    fn origin(&self, context: &ConnectionContext) -> String {
        if self.trust_forwarded_for {
            if let Some(forwarded) = context.forwarded_for.as_deref() {
                return forwarded.to_string();
            }
        }
        context
            .remote_addr
            .map_or_else(|| "unknown".to_string(), |addr| addr.ip().to_string())
    }
}

impl ChannelScope for OriginScope {
    fn scope(&self, context: &ConnectionContext, room: &str) -> ChannelKey {
        ChannelKey(format!("{}/{room}", self.origin(context)))
    }
}

/// Configured scoping strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    Room,
    Origin,
}

impl ScopeKind {
    /// Build the scoping function for this kind.
    #[must_use]
    pub fn build(self, trust_forwarded_for: bool) -> Arc<dyn ChannelScope> {
        match self {
            ScopeKind::Room => Arc::new(RoomScope),
            ScopeKind::Origin => Arc::new(OriginScope {
                trust_forwarded_for,
            }),
        }
    }
}

impl FromStr for ScopeKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "room" => Ok(ScopeKind::Room),
            "origin" => Ok(ScopeKind::Origin),
            other => Err(format!("unknown channel scope '{other}'")),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::net::SocketAddr;

    fn context(addr: &str, forwarded_for: Option<&str>) -> ConnectionContext {
        ConnectionContext {
            remote_addr: Some(addr.parse::<SocketAddr>().unwrap()),
            forwarded_for: forwarded_for.map(str::to_string),
        }
    }

    #[test]
    fn test_room_scope_ignores_origin() {
        let a = RoomScope.scope(&context("10.0.0.1:5000", None), "room1");
        let b = RoomScope.scope(&context("10.0.0.2:6000", None), "room1");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "room1");
    }

    #[test]
    fn test_origin_scope_partitions_by_ip() {
        let scope = OriginScope::default();
        let a = scope.scope(&context("10.0.0.1:5000", None), "room1");
        let b = scope.scope(&context("10.0.0.2:5000", None), "room1");
        let c = scope.scope(&context("10.0.0.1:7000", None), "room1");
        assert_ne!(a, b);
        // Port is not part of the origin
        assert_eq!(a, c);
        assert_eq!(a.as_str(), "10.0.0.1/room1");
    }

    #[test]
    fn test_origin_scope_forwarded_for_only_when_trusted() {
        let ctx = context("10.0.0.1:5000", Some("203.0.113.7"));

        let untrusted = OriginScope {
            trust_forwarded_for: false,
        };
        assert_eq!(untrusted.scope(&ctx, "r").as_str(), "10.0.0.1/r");

        let trusted = OriginScope {
            trust_forwarded_for: true,
        };
        assert_eq!(trusted.scope(&ctx, "r").as_str(), "203.0.113.7/r");
    }

    #[test]
    fn test_origin_scope_without_address() {
        let key = OriginScope::default().scope(&ConnectionContext::local(), "r");
        assert_eq!(key.as_str(), "unknown/r");
    }

    #[test]
    fn test_scope_kind_parsing() {
        assert_eq!("room".parse::<ScopeKind>().unwrap(), ScopeKind::Room);
        assert_eq!("ORIGIN".parse::<ScopeKind>().unwrap(), ScopeKind::Origin);
        assert!("subnet".parse::<ScopeKind>().is_err());
    }
}
