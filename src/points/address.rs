use std::fmt;
use std::str::FromStr;

use crate::error::ControllerError;

/// Address of a single point in the registry, written as `component/channel`.
///
/// # Examples
///
/// ```
/// use supply_bus_switch::points::PointAddress;
///
/// let address: PointAddress = "io0/DigitalOutput1".parse().unwrap();
/// assert_eq!(address.component(), "io0");
/// assert_eq!(address.channel(), "DigitalOutput1");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PointAddress {
    component: String,
    channel: String,
}

impl PointAddress {
    /// Creates an address from its two parts.
    ///
    /// # Errors
    ///
    /// Returns a `Configuration` error if either part is empty or contains `/`.
    pub fn new(component: &str, channel: &str) -> Result<Self, ControllerError> {
        let valid = |part: &str| !part.trim().is_empty() && !part.contains('/');
        if !valid(component) || !valid(channel) {
            return Err(ControllerError::configuration(format!(
                "invalid point address \"{component}/{channel}\""
            )));
        }
        Ok(Self {
            component: component.trim().to_string(),
            channel: channel.trim().to_string(),
        })
    }

    pub fn component(&self) -> &str {
        &self.component
    }

    pub fn channel(&self) -> &str {
        &self.channel
    }
}

impl FromStr for PointAddress {
    type Err = ControllerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.split_once('/') {
            Some((component, channel)) => Self::new(component, channel),
            None => Err(ControllerError::configuration(format!(
                "point address \"{s}\" must have the form component/channel"
            ))),
        }
    }
}

impl fmt::Display for PointAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.component, self.channel)
    }
}
