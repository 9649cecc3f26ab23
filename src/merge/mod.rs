mod renumber;
mod tree;

use renumber::Renumberer;

use std::io::Write;

use crate::error::{Error, ErrorKind, Result};
use crate::loader::Document;
use crate::writer;

/// One source document: its raw bytes and a label used in error reporting.
pub struct Source {
    pub bytes: Vec<u8>,
    pub label: String,
}

impl Source {
    pub fn new(bytes: Vec<u8>, label: impl Into<String>) -> Source {
        Source { bytes, label: label.into() }
    }
}

/// Order of pages in the output.
#[derive(Debug, Default, Clone, PartialEq)]
pub enum PageOrder {
    /// All pages of the first document, then the second, and so on.
    #[default]
    AsGiven,
    /// Explicit permutation of the concatenated page sequence, zero-based.
    Explicit(Vec<usize>),
}

/// Shape of the output cross-reference data.
#[derive(Debug, Default, Clone, Copy, PartialEq)]
pub enum XrefFormat {
    /// A classic `xref` table, readable by any consumer.
    #[default]
    Classic,
    /// A compressed cross-reference stream (PDF 1.5 and later).
    Stream,
}

#[derive(Debug, Default, Clone)]
pub struct MergeOptions {
    pub page_order: PageOrder,
    pub xref_format: XrefFormat,
}

pub struct MergeRequest {
    pub sources: Vec<Source>,
    pub options: MergeOptions,
}

/// Merges the request into an in-memory buffer.
pub fn merge(request: MergeRequest) -> Result<Vec<u8>> {
    let mut out = Vec::new();
    merge_to(request, &mut out)?;
    Ok(out)
}

/// Merges the request, streaming the result into `sink`.
///
/// Nothing is written until every source has loaded and renumbered cleanly, so a failed
/// request leaves the sink untouched.
pub fn merge_to(request: MergeRequest, sink: impl Write) -> Result<()> {
    if request.sources.len() < 2 {
        return Err(ErrorKind::EmptyInput.into());
    }
    let docs = load_all(request.sources)?;
    let mut ren = Renumberer::new();
    let mut page_nums = Vec::new();
    for doc in &docs {
        let nums = ren.add_document(doc)
            .map_err(|kind| Error::labeled(kind, doc.label()))?;
        page_nums.extend(nums);
    }
    let ordered = apply_order(page_nums, &request.options.page_order)?;
    let mut table = ren.into_table();
    tree::build_page_tree(&mut table, &ordered);
    writer::write_document(&table, request.options.xref_format, sink)?;
    Ok(())
}

/// Sources parse independently, so they load on one thread each. Results come back in
/// input order regardless of which finishes first.
fn load_all(sources: Vec<Source>) -> Result<Vec<Document>> {
    std::thread::scope(|scope| {
        let handles = sources.into_iter()
            .map(|source| scope.spawn(move || Document::load(source.bytes, source.label)))
            .collect::<Vec<_>>();
        handles.into_iter()
            .map(|handle| handle.join()
                .unwrap_or_else(|payload| std::panic::resume_unwind(payload)))
            .collect()
    })
}

fn apply_order(page_nums: Vec<u64>, order: &PageOrder) -> Result<Vec<u64>> {
    match order {
        PageOrder::AsGiven => Ok(page_nums),
        PageOrder::Explicit(indices) => {
            let mut check = indices.clone();
            check.sort_unstable();
            if check.len() != page_nums.len() || check.iter().enumerate().any(|(ix, &val)| ix != val) {
                return Err(ErrorKind::InvalidPageOrder.into());
            }
            Ok(indices.iter().map(|&ix| page_nums[ix]).collect())
        }
    }
}
