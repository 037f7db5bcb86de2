// SPDX-License-Identifier: GPL-3.0-or-later

pub mod args;
pub mod config;
pub mod handlers;
pub mod records;
pub mod server;
