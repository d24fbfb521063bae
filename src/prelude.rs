// Copyright 2021 Vladimir Melnikov.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// https://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or https://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! Convenience re-export of common members
//!
//! Like the standard library's prelude, this module simplifies importing of
//! common items. Unlike the standard prelude, the contents of this module must
//! be imported manually:
//!
//! ```
//! use zettaevpn::prelude::*;
//! ```

pub use crate::afi::*;
pub use crate::config::*;
pub use crate::error::*;
pub use crate::util::*;
pub use crate::*;

pub use crate::evpn::*;

pub use crate::message::attributes::extcommunity::*;
pub use crate::message::attributes::multiproto::*;
pub use crate::message::attributes::*;
