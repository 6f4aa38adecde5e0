//! Paged bulk retrieval.
//!
//! Every bulk read in this system follows the same cursor contract: the
//! caller passes a start mark and a requested count, and gets back a batch,
//! the mark to resume from and whether more data follows. The caller loops
//! until `more` is false.

/// One page of a bulk read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkPage<T> {
    /// Entries in this page, in cursor order.
    pub items: Vec<T>,
    /// Mark to pass as the start of the next request.
    pub next_mark: usize,
    /// True if entries remain past `next_mark`.
    pub more: bool,
}

impl<T> BulkPage<T> {
    /// An empty final page.
    pub fn end(mark: usize) -> Self {
        Self {
            items: Vec::new(),
            next_mark: mark,
            more: false,
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

/// Drives a paged source to completion and collects every entry.
///
/// `fetch` is called with `(cur_mark, count)` until it reports no more data.
/// A source that claims more data without advancing its mark is treated as
/// exhausted, so a misbehaving collaborator cannot spin the caller forever.
pub fn fetch_all<T, E, F>(batch_size: usize, mut fetch: F) -> Result<Vec<T>, E>
where
    F: FnMut(usize, usize) -> Result<BulkPage<T>, E>,
{
    let batch_size = batch_size.max(1);
    let mut out = Vec::new();
    let mut cur_mark = 0;

    loop {
        let page = fetch(cur_mark, batch_size)?;
        let advanced = page.next_mark != cur_mark;
        out.extend(page.items);
        if !page.more || !advanced {
            break;
        }
        cur_mark = page.next_mark;
    }

    Ok(out)
}
