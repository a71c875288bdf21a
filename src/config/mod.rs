// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Configuration loading.
//!
//! Configuration never fails: out-of-range values are clamped to the
//! nearest bound and unparseable values fall back to the field's default.
//! Each adjustment is returned as a [`ConfigWarning`] so the host can show
//! it to the user.
//!
//! | Setting | Range | Default |
//! |---|---|---|
//! | polling interval (minutes) | 30-1440 | 60 |
//! | full threshold (%) | 75-99 | 75 |
//! | ok threshold (%) | 40-75 | 50 |
//! | low threshold (%) | 10-25 | 25 |
//! | debug | flag | false |

mod fields;
mod settings;

pub use fields::{ConfigWarning, Loaded, RawValue, load_poll_interval, load_thresholds};
pub use settings::{RawSettings, Settings};
