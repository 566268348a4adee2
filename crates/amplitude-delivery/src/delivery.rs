// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use amplitude_core::{EventRecord, IdentityRecord};

/// A record accepted by the router or the dispatcher.
#[derive(Debug, Clone, PartialEq)]
pub enum Delivery {
	Event(EventRecord),
	Identify(IdentityRecord),
}

impl Delivery {
	pub fn kind(&self) -> &'static str {
		match self {
			Delivery::Event(_) => "event",
			Delivery::Identify(_) => "identify",
		}
	}

	/// Short label for log lines. Never includes property values.
	pub fn describe(&self) -> String {
		let (user_id, device_id, name) = match self {
			Delivery::Event(event) => (event.user_id(), event.device_id(), event.event_type()),
			Delivery::Identify(identity) => (identity.user_id(), identity.device_id(), "identify"),
		};
		match (user_id, device_id) {
			(Some(user), _) => format!("{name} (user {user})"),
			(None, Some(device)) => format!("{name} (device {device})"),
			(None, None) => name.to_string(),
		}
	}
}

impl From<EventRecord> for Delivery {
	fn from(event: EventRecord) -> Self {
		Delivery::Event(event)
	}
}

impl From<IdentityRecord> for Delivery {
	fn from(identity: IdentityRecord) -> Self {
		Delivery::Identify(identity)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_kind_names() {
		let event: Delivery = EventRecord::builder("signup")
			.user_id("42")
			.build()
			.unwrap()
			.into();
		let identify: Delivery = IdentityRecord::for_device("d-1").unwrap().into();

		assert_eq!(event.kind(), "event");
		assert_eq!(identify.kind(), "identify");
	}

	#[test]
	fn test_describe_prefers_user_id() {
		let event: Delivery = EventRecord::builder("signup")
			.user_id("42")
			.device_id("d-1")
			.build()
			.unwrap()
			.into();
		assert_eq!(event.describe(), "signup (user 42)");

		let identify: Delivery = IdentityRecord::for_device("d-1").unwrap().into();
		assert_eq!(identify.describe(), "identify (device d-1)");
	}
}
