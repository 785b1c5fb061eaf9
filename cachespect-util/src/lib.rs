//! Utilities

// Modules
pub mod logger;

// Imports
use std::{cell::RefCell, fmt};

/// Extension trait for `str` to parse unsigned integer literals
#[extend::ext(name = ParseIntLit)]
pub impl str {
	/// Parses this string as an unsigned integer literal.
	///
	/// Accepts decimal, as well as `0x` / `0o` / `0b` prefixed
	/// hexadecimal, octal and binary literals.
	fn parse_u64_lit(&self) -> Result<u64, std::num::ParseIntError> {
		match self.get(..2) {
			Some("0x" | "0X") => u64::from_str_radix(&self[2..], 16),
			Some("0o" | "0O") => u64::from_str_radix(&self[2..], 8),
			Some("0b" | "0B") => u64::from_str_radix(&self[2..], 2),
			_ => self.parse(),
		}
	}
}

/// [`fmt::Display`] helper to display using a `FnMut(&mut fmt::Formatter)`
pub struct DisplayWrapper<F: FnMut(&mut fmt::Formatter) -> fmt::Result>(RefCell<F>);

impl<F: FnMut(&mut fmt::Formatter) -> fmt::Result> DisplayWrapper<F> {
	/// Creates a new display wrapper
	#[must_use]
	pub const fn new(func: F) -> Self {
		Self(RefCell::new(func))
	}
}

impl<F: FnMut(&mut fmt::Formatter) -> fmt::Result> fmt::Display for DisplayWrapper<F> {
	fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
		// Note: `f` cannot be re-entrant, so this cannot fail
		self.0.borrow_mut()(f)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parse_u64_lit() {
		assert_eq!("42".parse_u64_lit(), Ok(42));
		assert_eq!("0x1000".parse_u64_lit(), Ok(0x1000));
		assert_eq!("0X7f5a".parse_u64_lit(), Ok(0x7f5a));
		assert_eq!("0o17".parse_u64_lit(), Ok(0o17));
		assert_eq!("0b101".parse_u64_lit(), Ok(0b101));
		assert_eq!("0".parse_u64_lit(), Ok(0));

		assert!("".parse_u64_lit().is_err());
		assert!("0x".parse_u64_lit().is_err());
		assert!("x123".parse_u64_lit().is_err());
		assert!("-5".parse_u64_lit().is_err());
	}

	#[test]
	fn display_wrapper() {
		let wrapper = DisplayWrapper::new(|f| write!(f, "{}-{}", 1, 2));
		assert_eq!(wrapper.to_string(), "1-2");
	}
}
