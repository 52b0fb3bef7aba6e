//! SSH hop chains used to reach cluster nodes through bastions.
//!
//! A [`HopChain`] is an ordered list of [`HopDescriptor`] values. The first
//! hop is reached directly and every following hop is tunnelled through the
//! previous one, so order defines nesting rather than alternatives.

use serde::{Deserialize, Deserializer, Serialize};

use crate::credential::Credential;
use crate::error::ValidationError;

/// Default SSH port used when a descriptor is built without one.
pub const DEFAULT_SSH_PORT: u16 = 22;

/// Connection details for a single SSH hop.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct HopDescriptor {
    /// Host name or address of the hop.
    pub host: String,
    /// SSH port. Accepts numbers and numeric strings on input.
    #[serde(deserialize_with = "deserialize_port")]
    pub port: u16,
    /// Login user for the hop.
    pub username: String,
    /// Password used to authenticate against the hop.
    pub password: Credential,
}

impl HopDescriptor {
    /// Builds a descriptor on the default SSH port.
    #[must_use]
    pub fn new(
        host: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<Credential>,
    ) -> Self {
        Self {
            host: host.into(),
            port: DEFAULT_SSH_PORT,
            username: username.into(),
            password: password.into(),
        }
    }

    /// Overrides the SSH port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    fn validate(&self, field: &str, index: usize) -> Result<(), ValidationError> {
        if self.host.trim().is_empty() {
            return Err(ValidationError::new(
                format!("{field}[{index}].host"),
                "must not be empty",
            ));
        }
        if self.username.trim().is_empty() {
            return Err(ValidationError::new(
                format!("{field}[{index}].username"),
                "must not be empty",
            ));
        }
        if self.port == 0 {
            return Err(ValidationError::new(
                format!("{field}[{index}].port"),
                "must be between 1 and 65535",
            ));
        }
        Ok(())
    }
}

/// Ordered list of hops leading to a target machine.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
#[serde(transparent)]
pub struct HopChain(Vec<HopDescriptor>);

impl HopChain {
    /// Builds a chain from ordered hops.
    #[must_use]
    pub const fn new(hops: Vec<HopDescriptor>) -> Self {
        Self(hops)
    }

    /// Builds a chain that reaches the target directly.
    #[must_use]
    pub fn direct(hop: HopDescriptor) -> Self {
        Self(vec![hop])
    }

    /// Appends a hop tunnelled through the current last hop.
    #[must_use]
    pub fn through(mut self, hop: HopDescriptor) -> Self {
        self.0.push(hop);
        self
    }

    /// Returns the hops in tunnel order.
    #[must_use]
    pub fn hops(&self) -> &[HopDescriptor] {
        &self.0
    }

    /// Number of hops in the chain.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` when the chain has no hops.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The machine the chain ends at.
    #[must_use]
    pub fn target(&self) -> Option<&HopDescriptor> {
        self.0.last()
    }

    /// Bastions traversed before the target.
    #[must_use]
    pub fn bastions(&self) -> &[HopDescriptor] {
        match self.0.split_last() {
            Some((_, rest)) => rest,
            None => &[],
        }
    }

    /// Validates the chain for dispatch under the payload name `field`.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the chain is empty or any hop lacks
    /// a host, user, or usable port.
    pub fn require(&self, field: &str) -> Result<(), ValidationError> {
        if self.0.is_empty() {
            return Err(ValidationError::new(
                field,
                "must contain at least one hop",
            ));
        }
        for (index, hop) in self.0.iter().enumerate() {
            hop.validate(field, index)?;
        }
        Ok(())
    }

    /// Validates an optional chain; `None` passes, an empty chain does not.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] when the chain is present but invalid.
    pub fn require_optional(chain: Option<&Self>, field: &str) -> Result<(), ValidationError> {
        chain.map_or(Ok(()), |hops| hops.require(field))
    }
}

impl From<Vec<HopDescriptor>> for HopChain {
    fn from(value: Vec<HopDescriptor>) -> Self {
        Self(value)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum PortRepr {
    Number(u64),
    Text(String),
}

fn deserialize_port<'de, D>(deserializer: D) -> Result<u16, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = match PortRepr::deserialize(deserializer)? {
        PortRepr::Number(value) => value,
        PortRepr::Text(text) => text.trim().parse::<u64>().map_err(|_| {
            serde::de::Error::custom(format!("port '{text}' is not a number"))
        })?,
    };
    u16::try_from(raw)
        .map_err(|_| serde::de::Error::custom(format!("port {raw} is out of range")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn hop(host: &str) -> HopDescriptor {
        HopDescriptor::new(host, "root", "secret")
    }

    #[rstest]
    #[case(r#"{"host":"h","port":2222,"username":"u","password":"p"}"#, 2222)]
    #[case(r#"{"host":"h","port":"2222","username":"u","password":"p"}"#, 2222)]
    #[case(r#"{"host":"h","port":" 22 ","username":"u","password":"p"}"#, 22)]
    fn port_accepts_numbers_and_numeric_strings(#[case] json: &str, #[case] expected: u16) {
        let descriptor: HopDescriptor = serde_json::from_str(json).expect("decode hop");
        assert_eq!(descriptor.port, expected);
    }

    #[rstest]
    #[case(r#"{"host":"h","port":"ssh","username":"u","password":"p"}"#)]
    #[case(r#"{"host":"h","port":70000,"username":"u","password":"p"}"#)]
    fn port_rejects_unusable_values(#[case] json: &str) {
        assert!(serde_json::from_str::<HopDescriptor>(json).is_err());
    }

    #[test]
    fn empty_chain_is_rejected() {
        let err = HopChain::default()
            .require("hops")
            .expect_err("empty chain must fail");
        assert_eq!(err.field, "hops");
    }

    #[test]
    fn blank_host_is_reported_with_its_position() {
        let chain = HopChain::direct(hop("bastion")).through(hop(" "));
        let err = chain.require("lbHops").expect_err("blank host must fail");
        assert_eq!(err.field, "lbHops[1].host");
    }

    #[test]
    fn target_and_bastions_follow_tunnel_order() {
        let chain = HopChain::direct(hop("bastion")).through(hop("node"));
        assert_eq!(chain.target().map(|h| h.host.as_str()), Some("node"));
        assert_eq!(chain.bastions().len(), 1);
        assert_eq!(chain.len(), 2);
    }

    #[test]
    fn serialises_as_a_plain_array() {
        let chain = HopChain::direct(hop("node").with_port(2200));
        let value = serde_json::to_value(&chain).expect("serialise chain");
        assert_eq!(
            value,
            serde_json::json!([{"host":"node","port":2200,"username":"root","password":"secret"}])
        );
    }
}
