//! Lazy index scans.
//!
//! A [`Scan`] pulls one page at a time from its store and remembers the
//! last entry it returned, so it can be dropped at any point and resumed
//! later from [`Scan::position`]. No read transaction outlives a page.

use std::collections::VecDeque;
use std::ops::Bound;

use wallet_relay_core::EventId;

use crate::error::Result;
use crate::traits::{EventStore, IndexKey, ScanEntry, ScanPosition, ScanRange};

/// Entries fetched per page.
pub const DEFAULT_PAGE_SIZE: usize = 64;

/// Newest-first iterator over one index range.
pub struct Scan<'a, S: ?Sized> {
    store: &'a S,
    index: IndexKey,
    range: ScanRange,
    page_size: usize,
    buffer: VecDeque<ScanEntry>,
    exhausted: bool,
    failed: bool,
}

impl<'a, S: EventStore + ?Sized> Scan<'a, S> {
    pub fn new(store: &'a S, index: IndexKey, range: ScanRange) -> Self {
        Self {
            store,
            index,
            range,
            page_size: DEFAULT_PAGE_SIZE,
            buffer: VecDeque::new(),
            exhausted: false,
            failed: false,
        }
    }

    /// Override the page size. Small limits benefit from small pages.
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// The index being scanned.
    pub fn index(&self) -> &IndexKey {
        &self.index
    }

    /// Range that continues this scan from the last returned entry.
    pub fn position(&self) -> ScanRange {
        self.range
    }

    fn fill(&mut self) -> Result<()> {
        let page = self
            .store
            .scan_page(&self.index, &self.range, self.page_size)?;
        if page.len() < self.page_size {
            self.exhausted = true;
        }
        self.buffer.extend(page);
        Ok(())
    }
}

impl<'a, S: EventStore + ?Sized> Iterator for Scan<'a, S> {
    type Item = Result<ScanEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }
        if self.buffer.is_empty() && !self.exhausted {
            if let Err(e) = self.fill() {
                self.failed = true;
                return Some(Err(e));
            }
        }

        let entry = self.buffer.pop_front()?;
        self.range = self.range.resume_after(entry);
        Some(Ok(entry))
    }
}

/// Where an in-order index should start reading for `range`.
pub(crate) fn start_bound(range: &ScanRange) -> Bound<ScanPosition> {
    let from_until = range
        .until
        .map(|until| ScanPosition::new(until, EventId::ZERO));
    match (range.after, from_until) {
        (Some(after), Some(until)) if until > after => Bound::Included(until),
        (Some(after), _) => Bound::Excluded(after),
        (None, Some(until)) => Bound::Included(until),
        (None, None) => Bound::Unbounded,
    }
}

/// Cut one page from an in-order sequence that starts at [`start_bound`].
pub(crate) fn cut_page<'s, I>(ordered: I, range: &ScanRange, limit: usize) -> Vec<ScanEntry>
where
    I: IntoIterator<Item = &'s ScanPosition>,
{
    ordered
        .into_iter()
        .take_while(|p| range.since.map_or(true, |since| p.created_at() >= since))
        .filter(|p| range.contains(p))
        .take(limit)
        .copied()
        .collect()
}
