// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Value types shared across the library.
//!
//! - [`DeviceId`] - Non-empty, opaque device identifier
//! - [`RelayState`] - On/Off state of a device relay

mod device_id;
mod relay;

pub use device_id::DeviceId;
pub use relay::RelayState;
