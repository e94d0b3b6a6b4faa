//! JSON-LD documents stored as quads.
//!
//! [`GraphDb`] turns documents into RDF statements, gives blank nodes
//! store-wide identities and writes them to a [`store::QuadStore`]. Reads
//! walk the stored graph from a root subject and frame the result back into
//! a document.

mod blank;
mod check;
mod error;
mod graph;
pub mod json_ld;
pub mod literal;
mod options;
mod project;
mod read;
mod serial;
mod term;
mod write;

#[cfg(test)]
mod testing;

pub use store;

pub use self::blank::BlankNodeMap;
pub use self::check::{CheckOutcome, Verdict, policy};
pub use self::error::{Error, Result};
pub use self::graph::{GraphDb, Input};
pub use self::options::{Defaults, Options};
pub use self::serial::{GraphMsg, GraphWorker, Policy, SerialGraph};
