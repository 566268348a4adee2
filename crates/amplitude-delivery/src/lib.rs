// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Delivery of analytics events and user-property updates to Amplitude.
//!
//! # Example
//!
//! ```ignore
//! use amplitude_delivery::{DeliveryRouter, EventRecord};
//!
//! let config = amplitude_config::load_config()?;
//! let router = DeliveryRouter::from_config(&config)?;
//!
//! let event = EventRecord::builder("signup").user_id("42").build()?;
//! let response = router.send_event(event).await?;
//! if !response.is_success() {
//!     eprintln!("{}", response.error_details());
//! }
//! ```

mod delivery;
mod dispatch;
mod driver;
mod identify;
mod router;

pub use delivery::Delivery;
pub use dispatch::{DeliveryHandler, DispatchConfig, DispatchError, DispatchStats, Dispatcher};
pub use driver::{BatchDriver, DeliveryDriver, RealtimeDriver};
pub use identify::IdentifyDriver;
pub use router::DeliveryRouter;

pub use amplitude_config::DriverKind;
pub use amplitude_core::{
	DeliveryError, EventRecord, IdentityRecord, ResponseRecord, Result, UserPropertyOp,
};
