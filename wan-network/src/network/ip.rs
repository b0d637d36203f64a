use anyhow::{Context, anyhow, bail};
use serde_with::{DeserializeFromStr, SerializeDisplay};
use std::fmt::{Display, Formatter};
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

/// An IPv4 address together with its network prefix length (e.g. `10.1.2.1/24`)
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, SerializeDisplay, DeserializeFromStr)]
pub struct Ipv4Cidr {
    address: Ipv4Addr,
    network_prefix: u8,
}

impl Ipv4Cidr {
    pub fn new(address: Ipv4Addr, network_prefix: u8) -> Self {
        assert!(network_prefix <= 32, "network prefix cannot be higher than 32");
        Self {
            address,
            network_prefix,
        }
    }

    /// A `/32` range containing only `address`
    pub fn host(address: Ipv4Addr) -> Self {
        Self::new(address, 32)
    }

    /// The `0.0.0.0/0` range, matching every address
    pub fn any() -> Self {
        Self::new(Ipv4Addr::UNSPECIFIED, 0)
    }

    pub fn address(&self) -> Ipv4Addr {
        self.address
    }

    pub fn network_prefix(&self) -> u8 {
        self.network_prefix
    }

    fn mask(&self) -> u32 {
        u32::MAX.checked_shl(32 - self.network_prefix as u32).unwrap_or(0)
    }

    /// The range with all host bits cleared (e.g. `10.1.2.1/24` becomes `10.1.2.0/24`)
    pub fn network(&self) -> Ipv4Cidr {
        Ipv4Cidr {
            address: Ipv4Addr::from_bits(self.address.to_bits() & self.mask()),
            network_prefix: self.network_prefix,
        }
    }

    pub fn contains(&self, ip: Ipv4Addr) -> bool {
        let mask = self.mask();
        ip.to_bits() & mask == self.address.to_bits() & mask
    }
}

impl Display for Ipv4Cidr {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.address, self.network_prefix)
    }
}

impl FromStr for Ipv4Cidr {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split('/');
        let base_ip: IpAddr = parts
            .next()
            .ok_or(anyhow!("empty string"))?
            .parse()
            .context("invalid ip address in ip range")?;

        let IpAddr::V4(base_ip) = base_ip else {
            bail!("only IPv4 supported at the moment");
        };

        // A missing network prefix is interpreted as /32 (i.e. singleton ip range)
        let network_prefix: u8 = parts
            .next()
            .unwrap_or("32")
            .parse()
            .context("the provided network prefix is not a valid unsigned integer")?;
        if network_prefix > 32 {
            bail!("network prefix cannot be higher than 32");
        }

        if parts.next().is_some() {
            bail!("ip range contains trailing characters");
        }

        Ok(Self {
            address: base_ip,
            network_prefix,
        })
    }
}

#[test]
fn test_ipv4_cidr() {
    let cases = [
        ("10.0.0.0/24", "10.0.0.0", "10.0.0.255", "10.0.1.0"),
        ("10.0.0.123/24", "10.0.0.0", "10.0.0.255", "9.255.255.255"),
        ("10.0.0.0/8", "10.0.0.0", "10.255.255.255", "11.0.0.0"),
        ("20.0.0.0/12", "20.0.0.0", "20.15.255.255", "20.16.0.0"),
        ("10.1.2.2", "10.1.2.2", "10.1.2.2", "10.1.2.3"),
    ];

    for (range, first, last, outside) in cases {
        let cidr: Ipv4Cidr = range.parse().unwrap();
        let first: Ipv4Addr = first.parse().unwrap();
        let last: Ipv4Addr = last.parse().unwrap();
        let outside: Ipv4Addr = outside.parse().unwrap();

        assert_eq!(cidr.network().address(), first, "{range}");
        assert!(cidr.contains(first), "{range}");
        assert!(cidr.contains(last), "{range}");
        assert!(!cidr.contains(outside), "{range}");
    }
}

#[test]
fn test_default_range_matches_everything() {
    let any: Ipv4Cidr = "0.0.0.0/0".parse().unwrap();
    assert_eq!(any, Ipv4Cidr::any());
    assert!(any.contains(Ipv4Addr::new(1, 2, 3, 4)));
    assert!(any.contains(Ipv4Addr::BROADCAST));
}

#[test]
fn test_invalid_ranges_are_rejected() {
    for invalid in ["", "10.0.0.0/33", "10.0.0.0/24/1", "::1/64", "10.0.0.0/x"] {
        assert!(invalid.parse::<Ipv4Cidr>().is_err(), "{invalid}");
    }
}
