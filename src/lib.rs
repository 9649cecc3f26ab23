//! A structural PDF merge engine.
//!
//! Takes any number of well-formed PDF documents and produces a single document containing
//! all of their pages. Page content is carried over byte for byte; only the structure around
//! it (object numbers, the page tree, the cross-reference data) is rebuilt. Output is
//! deterministic: the same inputs and options always produce the same bytes.

mod codecs;
mod error;
mod loader;
mod merge;
mod object;
mod syntax;
mod utils;
mod writer;

pub use error::{Error, ErrorKind, Result};
pub use loader::{Document, Page};
pub use merge::{merge, merge_to, MergeOptions, MergeRequest, PageOrder, Source, XrefFormat};
pub use object::{Dict, Name, Number, ObjGen, ObjNum, ObjRef, Object, Offset, Stream, StreamData};
