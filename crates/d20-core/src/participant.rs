//! Participant identity.
//!
//! A participant is minted once when someone joins the table and then only
//! ever travels inside their session token. The server keeps no copy.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Identity of someone seated at the table.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Participant {
    /// Display name of the person.
    pub name: String,
    /// Name of the character they play. May be empty.
    pub character_name: String,
    /// Whether this participant runs the session.
    pub is_facilitator: bool,
    /// Network origin with the host part masked out.
    pub masked_origin: String,
}

impl Participant {
    /// Create a player (non-facilitator) identity.
    pub fn player(
        name: impl Into<String>,
        character_name: impl Into<String>,
        masked_origin: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            character_name: character_name.into(),
            is_facilitator: false,
            masked_origin: masked_origin.into(),
        }
    }

    /// Create a facilitator identity.
    pub fn facilitator(
        name: impl Into<String>,
        character_name: impl Into<String>,
        masked_origin: impl Into<String>,
    ) -> Self {
        Self { is_facilitator: true, ..Self::player(name, character_name, masked_origin) }
    }
}

/// Mask the host portion of an address so it can be shown to other players.
///
/// IPv4 keeps the first three octets (`10.1.2.x`). IPv6 keeps the /64 routing
/// prefix (`2001:db8:0:1:x`). IPv4-mapped IPv6 addresses are treated as IPv4.
pub fn mask_origin(addr: IpAddr) -> String {
    match addr {
        IpAddr::V4(v4) => {
            let [a, b, c, _] = v4.octets();
            format!("{a}.{b}.{c}.x")
        },
        IpAddr::V6(v6) => {
            if let Some(v4) = v6.to_ipv4_mapped() {
                return mask_origin(IpAddr::V4(v4));
            }
            let s = v6.segments();
            format!("{:x}:{:x}:{:x}:{:x}:x", s[0], s[1], s[2], s[3])
        },
    }
}

#[cfg(test)]
mod tests {
    use std::net::{Ipv4Addr, Ipv6Addr};

    use super::*;

    #[test]
    fn ipv4_last_octet_masked() {
        let masked = mask_origin(IpAddr::V4(Ipv4Addr::new(192, 168, 1, 42)));
        assert_eq!(masked, "192.168.1.x");
    }

    #[test]
    fn ipv6_keeps_routing_prefix() {
        let addr: Ipv6Addr = "2001:db8:0:1:dead:beef:0:7".parse().unwrap();
        assert_eq!(mask_origin(IpAddr::V6(addr)), "2001:db8:0:1:x");
    }

    #[test]
    fn ipv4_mapped_ipv6_masked_as_ipv4() {
        let addr = Ipv4Addr::new(10, 0, 0, 9).to_ipv6_mapped();
        assert_eq!(mask_origin(IpAddr::V6(addr)), "10.0.0.x");
    }

    #[test]
    fn facilitator_constructor_sets_role() {
        let gm = Participant::facilitator("Ana", "GM", "10.0.0.x");
        assert!(gm.is_facilitator);
        assert_eq!(gm.character_name, "GM");

        let player = Participant::player("Bo", "Data", "10.0.0.x");
        assert!(!player.is_facilitator);
    }
}
