//! Server version parsing and support thresholds.

// self
use crate::_prelude::*;

/// Oldest server release the login flows will talk to.
pub const MINIMUM_SUPPORTED: ServerVersion = ServerVersion::new(16, 0, 0, 0);
/// Releases below this line trigger the outdated-server warning unless the instance
/// bought extended support.
pub const OUTDATED_BELOW: ServerVersion = ServerVersion::new(26, 0, 0, 0);

/// Error returned when a version string cannot be parsed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, ThisError)]
pub enum VersionError {
	/// The string was empty.
	#[error("Version string is empty.")]
	Empty,
	/// More than four dotted components.
	#[error("Version string `{value}` has more than four components.")]
	TooManyComponents {
		/// Offending input.
		value: String,
	},
	/// A component is not a number.
	#[error("Version component `{component}` is not numeric.")]
	NotNumeric {
		/// Offending component.
		component: String,
	},
}

/// Dotted-quad server version (`major.minor.micro.build`); missing trailing
/// components read as zero.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ServerVersion {
	/// Major release number.
	pub major: u32,
	/// Minor release number.
	pub minor: u32,
	/// Micro (patch) release number.
	pub micro: u32,
	/// Build counter.
	pub build: u32,
}
impl ServerVersion {
	/// Builds a version from its four components.
	pub const fn new(major: u32, minor: u32, micro: u32, build: u32) -> Self {
		Self { major, minor, micro, build }
	}

	/// Returns `true` when the version satisfies [`MINIMUM_SUPPORTED`].
	pub fn is_supported(&self) -> bool {
		*self >= MINIMUM_SUPPORTED
	}

	/// Returns `true` when the outdated-server warning should be shown.
	pub fn is_outdated(&self, has_extended_support: bool) -> bool {
		!has_extended_support && *self < OUTDATED_BELOW
	}
}
impl FromStr for ServerVersion {
	type Err = VersionError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		let trimmed = s.trim();

		if trimmed.is_empty() {
			return Err(VersionError::Empty);
		}

		let mut components = [0_u32; 4];
		let mut count = 0;

		for component in trimmed.split('.') {
			if count == components.len() {
				return Err(VersionError::TooManyComponents { value: trimmed.to_owned() });
			}

			components[count] = component
				.parse()
				.map_err(|_| VersionError::NotNumeric { component: component.to_owned() })?;
			count += 1;
		}

		Ok(Self::new(components[0], components[1], components[2], components[3]))
	}
}
impl Display for ServerVersion {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "{}.{}.{}.{}", self.major, self.minor, self.micro, self.build)
	}
}
impl Debug for ServerVersion {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		write!(f, "ServerVersion({self})")
	}
}
impl TryFrom<String> for ServerVersion {
	type Error = VersionError;

	fn try_from(value: String) -> Result<Self, Self::Error> {
		value.parse()
	}
}
impl From<ServerVersion> for String {
	fn from(value: ServerVersion) -> Self {
		value.to_string()
	}
}
