//! Typed, cached access to individual store keys.
//!
//! A [`Binding`] owns one key. Reads decode the stored bytes at most once per
//! distinct value; writes encode and go through [`Store::set`](crate::Store::set)
//! so subscribers see them like any other local change.

mod codec;
mod typed;

pub use codec::{Codec, JsonCodec, MsgPackCodec};
pub use typed::Binding;
