//! Helpers shared by the record codecs.

pub mod binary;
