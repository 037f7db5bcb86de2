// SPDX-License-Identifier: GPL-3.0-or-later

pub mod args;
pub mod collector;
pub mod context;
pub mod environment;
pub mod logging;
pub mod modes;
pub mod store;
pub mod submit;
pub mod transport;
