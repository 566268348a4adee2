// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core records for Amplitude event delivery.
//!
//! This crate holds the value types shared by the delivery drivers:
//!
//! - [`EventRecord`]: one validated analytics event
//! - [`IdentityRecord`]: one user-property update
//! - [`ResponseRecord`]: the classified outcome of a send
//! - [`DeliveryError`]: pre-flight and bulk-chunk failures
//! - [`format_event`] / [`format_identify`]: the pure wire formatter
//!
//! Nothing here performs I/O.

pub mod api_key;
pub mod error;
pub mod event;
pub mod format;
pub mod identify;
pub mod properties;
pub mod response;

pub use api_key::ApiKey;
pub use error::{BatchProgress, ChunkFailure, DeliveryError, Result};
pub use event::{
	generate_insert_id, AdIdentifiers, DeviceInfo, EventRecord, EventRecordBuilder, LocationInfo,
	Revenue, TrackingPlan,
};
pub use format::{format_event, format_identify};
pub use identify::{IdentifyAttributes, IdentityRecord, UserPropertyOp, UNSET_MARKER};
pub use properties::{Properties, PropertyValue};
pub use response::{ResponseRecord, NO_RESPONSE_CODE, RETRYABLE_CODES};

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
	chrono::Utc::now().timestamp_millis()
}
