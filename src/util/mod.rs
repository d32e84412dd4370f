//! Small shared helpers.

pub mod qname;
