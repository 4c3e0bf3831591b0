use std::net::IpAddr;

/// Identifier handed out when no usable interface address exists.
const FALLBACK_NODE_ID: u64 = 1;

/// Derives a node/machine/shard identifier from the host's network identity.
///
/// Walks the local interfaces in order, skips loopback, takes the first IPv4
/// address, converts it to a host-order 32-bit integer and masks it down to
/// the caller's field width. Deterministic for a fixed interface list; called
/// once per generator construction.
///
/// Returns [`FALLBACK_NODE_ID`] when no interface qualifies or enumeration
/// fails outright (e.g. permission denied).
pub fn node_id_from_interfaces(mask: u64) -> u64 {
    let Ok(interfaces) = if_addrs::get_if_addrs() else {
        tracing::warn!("interface enumeration failed; using fallback node id");
        return FALLBACK_NODE_ID;
    };

    for interface in interfaces {
        if interface.is_loopback() {
            continue;
        }
        if let IpAddr::V4(addr) = interface.ip() {
            let node_id = u64::from(u32::from(addr)) & mask;
            tracing::info!(
                interface = %interface.name,
                address = %addr,
                node_id,
                "derived node id from interface address"
            );
            return node_id;
        }
    }

    tracing::warn!("no non-loopback IPv4 interface; using fallback node id");
    FALLBACK_NODE_ID
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn node_id_respects_the_mask() {
        let mask = 0x3FF;
        assert!(node_id_from_interfaces(mask) <= mask);
    }

    #[test]
    fn zero_mask_still_yields_a_bounded_id() {
        // With a zero mask every derived address collapses to 0; only the
        // no-interface fallback can exceed it.
        assert!(node_id_from_interfaces(0) <= FALLBACK_NODE_ID);
    }
}
