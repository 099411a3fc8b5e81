// Copyright 2019-2023 ChainSafe Systems
// SPDX-License-Identifier: Apache-2.0, MIT

mod publisher;
mod store;

pub use self::publisher::*;
pub use self::store::*;
