//! Stored index pages.

use crate::header::IndexHeader;
use crate::item::{read_items, write_items, IndexItem};
use ixcache_codec::{
    check_version, CodecError, CodecResult, PrimitiveReader, PrimitiveWriter, VersionSerializable,
};

/// One index as stored under its page key: the header followed by the
/// entries in sort order.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CachedIndex {
    /// Index-level metadata.
    pub header: IndexHeader,
    /// Entries in sort order.
    pub items: Vec<IndexItem>,
}

impl CachedIndex {
    /// Creates an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns true if there are no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Position of the entry with `item_id`.
    #[must_use]
    pub fn position(&self, item_id: &[u8]) -> Option<usize> {
        self.items.iter().position(|item| item.item_id == item_id)
    }
}

impl VersionSerializable for CachedIndex {
    const TYPE_NAME: &'static str = "CachedIndex";
    const CURRENT_VERSION: u16 = 1;

    fn serialize_as(&self, w: &mut PrimitiveWriter<'_>, _version: u16) -> CodecResult<()> {
        w.write_nested(&self.header)?;
        write_items(w, &self.items)
    }

    fn deserialize(r: &mut PrimitiveReader<'_>, _version: u16) -> CodecResult<Self> {
        Ok(Self {
            header: r.read_nested()?,
            items: read_items(r)?,
        })
    }
}

/// Reads a stored page one entry at a time.
///
/// The header and entry count are decoded up front; entries are decoded
/// only as the scan asks for them, so a scan that stops early never pays
/// for the tail of the page.
#[derive(Debug)]
pub struct PageReader<'a> {
    header: IndexHeader,
    total: usize,
    read: usize,
    body: PrimitiveReader<'a>,
}

impl<'a> PageReader<'a> {
    /// Opens a page encoded with [`ixcache_codec::to_versioned_bytes`].
    pub fn new(page: &'a [u8]) -> CodecResult<Self> {
        let mut outer = PrimitiveReader::new(page);
        let version = outer.read_u16()?;
        check_version::<CachedIndex>(version)?;
        let mut body = outer.enter_region()?;
        outer.expect_end()?;
        let header = body.read_nested()?;
        let total = body.read_count_i32("items")?;
        Ok(Self {
            header,
            total,
            read: 0,
            body,
        })
    }

    /// The page header.
    #[must_use]
    pub fn header(&self) -> &IndexHeader {
        &self.header
    }

    /// Entry count declared by the page.
    #[must_use]
    pub fn total(&self) -> usize {
        self.total
    }

    /// Entries decoded so far.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.read
    }

    /// Decodes the next entry, `None` once the declared count is reached.
    pub fn next_item(&mut self) -> CodecResult<Option<IndexItem>> {
        if self.read >= self.total {
            return Ok(None);
        }
        let item = IndexItem::read(&mut self.body).map_err(|e| match e {
            CodecError::UnexpectedEof => CodecError::RegionOverrun {
                type_name: CachedIndex::TYPE_NAME,
            },
            other => other,
        })?;
        self.read += 1;
        Ok(Some(item))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ixcache_codec::{from_versioned_bytes, to_versioned_bytes};

    fn page(n: i32) -> CachedIndex {
        CachedIndex {
            header: IndexHeader {
                virtual_count: n,
                ..IndexHeader::default()
            },
            items: (0..n)
                .map(|i| IndexItem::new(i.to_le_bytes().to_vec()))
                .collect(),
        }
    }

    #[test]
    fn reader_yields_every_entry() {
        let bytes = to_versioned_bytes(&page(3)).unwrap();
        let mut reader = PageReader::new(&bytes).unwrap();
        assert_eq!(reader.total(), 3);
        assert_eq!(reader.header().virtual_count, 3);
        let mut ids = Vec::new();
        while let Some(item) = reader.next_item().unwrap() {
            ids.push(item.item_id);
        }
        assert_eq!(ids.len(), 3);
        assert_eq!(reader.read_count(), 3);
    }

    #[test]
    fn reader_agrees_with_full_decode() {
        let bytes = to_versioned_bytes(&page(5)).unwrap();
        let full: CachedIndex = from_versioned_bytes(&bytes).unwrap();
        let mut reader = PageReader::new(&bytes).unwrap();
        for expected in &full.items {
            assert_eq!(reader.next_item().unwrap().as_ref(), Some(expected));
        }
        assert!(reader.next_item().unwrap().is_none());
    }

    #[test]
    fn truncated_page_is_an_error() {
        let bytes = to_versioned_bytes(&page(4)).unwrap();
        let mut cut = bytes[..bytes.len() - 3].to_vec();
        let body_len = u32::try_from(cut.len() - 6).unwrap();
        cut[2..6].copy_from_slice(&body_len.to_le_bytes());
        let mut reader = PageReader::new(&cut).unwrap();
        let mut result = Ok(None);
        for _ in 0..4 {
            result = reader.next_item();
            if result.is_err() {
                break;
            }
        }
        assert!(result.is_err());
    }

    #[test]
    fn position_by_id() {
        let index = page(3);
        assert_eq!(index.position(&2i32.to_le_bytes()), Some(2));
        assert_eq!(index.position(b"nope"), None);
    }
}
