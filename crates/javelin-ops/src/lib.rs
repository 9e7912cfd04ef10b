//! Build operations layered over the resolver.

pub mod updates;
