use std::net::Ipv4Addr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Rejected simulation setup. Never reaches the scheduler.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("network node `{node_id}` is defined more than once")]
    DuplicateNode { node_id: Arc<str> },
    #[error("network node `{node_id}` was referenced but does not exist")]
    UnknownNode { node_id: Arc<str> },
    #[error("network link `{link_id}` was referenced but does not exist")]
    UnknownLink { link_id: Arc<str> },
    #[error("address `{address}` is assigned to more than one interface")]
    DuplicateAddress { address: Ipv4Addr },
    #[error("network node `{node_id}` has no interface with address `{address}`")]
    UnknownInterface {
        node_id: Arc<str>,
        address: Ipv4Addr,
    },
    #[error("network link `{link_id}` references address `{address}`, which no interface has")]
    UnknownLinkEndpoint {
        link_id: Arc<str>,
        address: Ipv4Addr,
    },
    #[error(
        "interface `{address}` of network node `{node_id}` must be attached to exactly one link, but is attached to {links}"
    )]
    InterfaceLinkCount {
        node_id: Arc<str>,
        address: Ipv4Addr,
        links: usize,
    },
    #[error("network link `{link_id}` connects network node `{node_id}` to itself")]
    SelfLoop {
        link_id: Arc<str>,
        node_id: Arc<str>,
    },
    #[error("network link `{link_id}` is invalid: {reason}")]
    InvalidLink {
        link_id: Arc<str>,
        reason: &'static str,
    },
    #[error("next hop `{next_hop}` is not on any subnet of network node `{node_id}`")]
    UnreachableNextHop {
        node_id: Arc<str>,
        next_hop: Ipv4Addr,
    },
    #[error("traffic source `{source_id}` is invalid: {reason}")]
    InvalidSource { source_id: Arc<str>, reason: String },
    #[error("rate limiter on network node `{node_id}` is invalid: {reason}")]
    InvalidRateLimiter {
        node_id: Arc<str>,
        reason: &'static str,
    },
    #[error("policy route on network node `{node_id}` is invalid: {reason}")]
    InvalidPolicy {
        node_id: Arc<str>,
        reason: &'static str,
    },
    #[error("`{value}` is not a valid duration in seconds")]
    InvalidDuration { value: f64 },
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
}

/// Misuse of the event scheduler
#[derive(Error, Debug, PartialEq)]
pub enum SchedulerError {
    #[error("cannot schedule an event with a negative delay ({delay_secs}s)")]
    NegativeDelay { delay_secs: f64 },
    #[error("cannot schedule an event at {at:?}, the clock already reads {now:?}")]
    InThePast { at: Duration, now: Duration },
    #[error("event handle `{id}` was never issued by this scheduler")]
    UnknownHandle { id: u64 },
    #[error("cannot schedule an event {delay:?} after {now:?}, the clock would overflow")]
    Overflow { delay: Duration, now: Duration },
}

/// The longest time or delay a simulation setup may contain
pub const MAX_SETUP_TIME: Duration = Duration::from_secs(u32::MAX as u64);

/// Converts a user-provided amount of seconds into a [`Duration`]
pub fn duration_from_secs(value: f64) -> Result<Duration, ConfigError> {
    match Duration::try_from_secs_f64(value) {
        Ok(duration) if duration <= MAX_SETUP_TIME => Ok(duration),
        _ => Err(ConfigError::InvalidDuration { value }),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_duration_from_secs() {
        assert_eq!(duration_from_secs(1.5).unwrap(), Duration::from_millis(1500));
        assert_eq!(duration_from_secs(0.0).unwrap(), Duration::ZERO);
        for value in [-1.0, f64::NAN, f64::INFINITY, 1e19] {
            assert!(
                matches!(
                    duration_from_secs(value),
                    Err(ConfigError::InvalidDuration { .. })
                ),
                "{value}"
            );
        }
    }
}
