use std::{io, net::TcpListener};

use thiserror::Error;

use crate::constants::LOCAL_HOST;

#[derive(Debug, Error)]
pub enum TopologyResolveError {
    #[error("failed to allocate a free TCP port for {label}")]
    PortAllocationFailed {
        label: &'static str,
        #[source]
        source: io::Error,
    },
}

/// Allocate `count` distinct ports, holding every listener until all are
/// bound.
pub fn resolve_ports(
    count: usize,
    label: &'static str,
) -> Result<Vec<u16>, TopologyResolveError> {
    let listeners = (0..count)
        .map(|_| TcpListener::bind((LOCAL_HOST, 0)))
        .collect::<io::Result<Vec<_>>>()
        .map_err(|source| TopologyResolveError::PortAllocationFailed { label, source })?;

    listeners
        .iter()
        .map(|listener| listener.local_addr().map(|addr| addr.port()))
        .collect::<io::Result<Vec<_>>>()
        .map_err(|source| TopologyResolveError::PortAllocationFailed { label, source })
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn resolved_ports_are_distinct() {
        let ports = resolve_ports(4, "rpc").expect("allocate ports");
        let unique: HashSet<_> = ports.iter().copied().collect();
        assert_eq!(unique.len(), 4);
        assert!(ports.iter().all(|port| *port != 0));
    }
}
