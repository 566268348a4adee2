// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod batch;
mod driver;
mod identify;
mod logging;
mod realtime;

pub use batch::{BatchConfig, BatchConfigLayer, DEFAULT_BATCH_ENDPOINT};
pub use driver::DriverKind;
pub use identify::{IdentifyConfig, IdentifyConfigLayer, DEFAULT_IDENTIFY_ENDPOINT};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use realtime::{RealtimeConfig, RealtimeConfigLayer, DEFAULT_REALTIME_ENDPOINT};
