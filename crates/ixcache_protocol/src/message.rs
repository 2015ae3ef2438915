//! The message envelope.
//!
//! A message is a `u8` type tag followed by the nested (versioned) body of
//! that type. The tag selects the decoder; an unknown tag rejects the whole
//! message.

use crate::commands::{
    DeleteIndexCommand, FilteredIndexDeleteCommand, MetadataPropertyCommand, SaveIndexCommand,
};
use crate::queries::{
    ContainsIndexQuery, DistinctQuery, FirstLastQuery, IndexScoped, IntersectionQuery,
    MetadataPropertyQuery, MultiIndexContainsQuery, PagedIndexQuery, RandomQuery, RangeQuery,
    StringHashQuery, TagQuery,
};
use crate::results::{
    ContainsIndexQueryResult, DistinctQueryResult, FirstLastQueryResult, IntersectionQueryResult,
    MetadataPropertyQueryResult, MultiIndexContainsQueryResult, MutationResult, NameSetResult,
    PagedIndexQueryResult, RandomQueryResult, RangeQueryResult, Rejected,
};
use bytes::{Bytes, BytesMut};
use ixcache_codec::{CodecError, CodecResult, PrimitiveReader, PrimitiveWriter};
use ixcache_core::IndexId;

/// Stable wire tags.
pub mod tags {
    /// [`crate::RangeQuery`].
    pub const RANGE_QUERY: u8 = 1;
    /// [`crate::FirstLastQuery`].
    pub const FIRST_LAST_QUERY: u8 = 2;
    /// [`crate::RandomQuery`].
    pub const RANDOM_QUERY: u8 = 3;
    /// [`crate::ContainsIndexQuery`].
    pub const CONTAINS_INDEX_QUERY: u8 = 4;
    /// [`crate::DistinctQuery`].
    pub const DISTINCT_QUERY: u8 = 5;
    /// [`crate::TagQuery`].
    pub const TAG_QUERY: u8 = 6;
    /// [`crate::StringHashQuery`].
    pub const STRING_HASH_QUERY: u8 = 7;
    /// [`crate::PagedIndexQuery`].
    pub const PAGED_INDEX_QUERY: u8 = 8;
    /// [`crate::MetadataPropertyQuery`].
    pub const METADATA_PROPERTY_QUERY: u8 = 9;
    /// [`crate::IntersectionQuery`].
    pub const INTERSECTION_QUERY: u8 = 10;
    /// [`crate::MultiIndexContainsQuery`].
    pub const MULTI_INDEX_CONTAINS_QUERY: u8 = 11;
    /// [`crate::SaveIndexCommand`].
    pub const SAVE_INDEX_COMMAND: u8 = 20;
    /// [`crate::MetadataPropertyCommand`].
    pub const METADATA_PROPERTY_COMMAND: u8 = 21;
    /// [`crate::FilteredIndexDeleteCommand`].
    pub const FILTERED_INDEX_DELETE_COMMAND: u8 = 22;
    /// [`crate::DeleteIndexCommand`].
    pub const DELETE_INDEX_COMMAND: u8 = 23;

    /// [`crate::RangeQueryResult`].
    pub const RANGE_QUERY_RESULT: u8 = 101;
    /// [`crate::FirstLastQueryResult`].
    pub const FIRST_LAST_QUERY_RESULT: u8 = 102;
    /// [`crate::RandomQueryResult`].
    pub const RANDOM_QUERY_RESULT: u8 = 103;
    /// [`crate::ContainsIndexQueryResult`].
    pub const CONTAINS_INDEX_QUERY_RESULT: u8 = 104;
    /// [`crate::DistinctQueryResult`].
    pub const DISTINCT_QUERY_RESULT: u8 = 105;
    /// Tag names, a [`crate::NameSetResult`].
    pub const TAG_QUERY_RESULT: u8 = 106;
    /// Interned strings, a [`crate::NameSetResult`].
    pub const STRING_HASH_QUERY_RESULT: u8 = 107;
    /// [`crate::PagedIndexQueryResult`].
    pub const PAGED_INDEX_QUERY_RESULT: u8 = 108;
    /// [`crate::MetadataPropertyQueryResult`].
    pub const METADATA_PROPERTY_QUERY_RESULT: u8 = 109;
    /// [`crate::IntersectionQueryResult`].
    pub const INTERSECTION_QUERY_RESULT: u8 = 110;
    /// [`crate::MultiIndexContainsQueryResult`].
    pub const MULTI_INDEX_CONTAINS_QUERY_RESULT: u8 = 111;
    /// [`crate::MutationResult`].
    pub const MUTATION_RESULT: u8 = 120;
    /// [`crate::Rejected`].
    pub const REJECTED: u8 = 121;
}

/// A request sent to a cache node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Request {
    /// Offset page of one index.
    Range(RangeQuery),
    /// First and last pages of one index.
    FirstLast(FirstLastQuery),
    /// Random sample of one index.
    Random(RandomQuery),
    /// Item lookup in one index.
    Contains(ContainsIndexQuery),
    /// Distinct value counts of one index.
    Distinct(DistinctQuery),
    /// Stored tag names.
    Tag(TagQuery),
    /// Interned string-hash values.
    StringHash(StringHashQuery),
    /// Merged page over many indexes.
    Paged(PagedIndexQuery),
    /// Metadata properties of one index.
    MetadataProperty(MetadataPropertyQuery),
    /// Items common to many indexes.
    Intersection(IntersectionQuery),
    /// Item lookup in many indexes.
    MultiContains(MultiIndexContainsQuery),
    /// Save entries.
    Save(SaveIndexCommand),
    /// Update metadata properties.
    MetadataPropertyUpdate(MetadataPropertyCommand),
    /// Delete matching entries.
    FilteredDelete(FilteredIndexDeleteCommand),
    /// Drop an index.
    DeleteIndex(DeleteIndexCommand),
}

impl Request {
    /// Returns the message type tag.
    #[must_use]
    pub fn type_tag(&self) -> u8 {
        match self {
            Request::Range(_) => tags::RANGE_QUERY,
            Request::FirstLast(_) => tags::FIRST_LAST_QUERY,
            Request::Random(_) => tags::RANDOM_QUERY,
            Request::Contains(_) => tags::CONTAINS_INDEX_QUERY,
            Request::Distinct(_) => tags::DISTINCT_QUERY,
            Request::Tag(_) => tags::TAG_QUERY,
            Request::StringHash(_) => tags::STRING_HASH_QUERY,
            Request::Paged(_) => tags::PAGED_INDEX_QUERY,
            Request::MetadataProperty(_) => tags::METADATA_PROPERTY_QUERY,
            Request::Intersection(_) => tags::INTERSECTION_QUERY,
            Request::MultiContains(_) => tags::MULTI_INDEX_CONTAINS_QUERY,
            Request::Save(_) => tags::SAVE_INDEX_COMMAND,
            Request::MetadataPropertyUpdate(_) => tags::METADATA_PROPERTY_COMMAND,
            Request::FilteredDelete(_) => tags::FILTERED_INDEX_DELETE_COMMAND,
            Request::DeleteIndex(_) => tags::DELETE_INDEX_COMMAND,
        }
    }

    /// Short name for logs.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Request::Range(_) => "range",
            Request::FirstLast(_) => "first_last",
            Request::Random(_) => "random",
            Request::Contains(_) => "contains",
            Request::Distinct(_) => "distinct",
            Request::Tag(_) => "tag",
            Request::StringHash(_) => "string_hash",
            Request::Paged(_) => "paged",
            Request::MetadataProperty(_) => "metadata_property",
            Request::Intersection(_) => "intersection",
            Request::MultiContains(_) => "multi_contains",
            Request::Save(_) => "save",
            Request::MetadataPropertyUpdate(_) => "metadata_property_update",
            Request::FilteredDelete(_) => "filtered_delete",
            Request::DeleteIndex(_) => "delete_index",
        }
    }

    /// The single index this request addresses, if any.
    #[must_use]
    pub fn index_id(&self) -> Option<&IndexId> {
        match self {
            Request::Range(q) => Some(q.index_id()),
            Request::FirstLast(q) => Some(q.index_id()),
            Request::Random(q) => Some(q.index_id()),
            Request::Contains(q) => Some(q.index_id()),
            Request::Distinct(q) => Some(q.index_id()),
            Request::MetadataProperty(q) => Some(q.index_id()),
            Request::Save(c) => Some(c.index_id()),
            Request::MetadataPropertyUpdate(c) => Some(c.index_id()),
            Request::FilteredDelete(c) => Some(c.index_id()),
            Request::DeleteIndex(c) => Some(c.index_id()),
            Request::Tag(_)
            | Request::StringHash(_)
            | Request::Paged(_)
            | Request::Intersection(_)
            | Request::MultiContains(_) => None,
        }
    }

    /// Placement hash of a single-index request.
    #[must_use]
    pub fn primary_id(&self) -> Option<i32> {
        match self {
            Request::Save(c) => Some(c.primary_id()),
            other => other.index_id().map(IndexId::primary_id),
        }
    }

    /// Returns true for write commands.
    #[must_use]
    pub fn is_command(&self) -> bool {
        self.type_tag() >= tags::SAVE_INDEX_COMMAND
    }

    /// Encode as tag plus nested body.
    pub fn encode(&self) -> CodecResult<Bytes> {
        let mut buf = BytesMut::new();
        let mut w = PrimitiveWriter::new(&mut buf);
        w.write_u8(self.type_tag());
        match self {
            Request::Range(q) => w.write_nested(q),
            Request::FirstLast(q) => w.write_nested(q),
            Request::Random(q) => w.write_nested(q),
            Request::Contains(q) => w.write_nested(q),
            Request::Distinct(q) => w.write_nested(q),
            Request::Tag(q) => w.write_nested(q),
            Request::StringHash(q) => w.write_nested(q),
            Request::Paged(q) => w.write_nested(q),
            Request::MetadataProperty(q) => w.write_nested(q),
            Request::Intersection(q) => w.write_nested(q),
            Request::MultiContains(q) => w.write_nested(q),
            Request::Save(c) => w.write_nested(c),
            Request::MetadataPropertyUpdate(c) => w.write_nested(c),
            Request::FilteredDelete(c) => w.write_nested(c),
            Request::DeleteIndex(c) => w.write_nested(c),
        }?;
        Ok(buf.freeze())
    }

    /// Decode a message produced by [`Request::encode`].
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let mut r = PrimitiveReader::new(bytes);
        let tag = r.read_u8()?;
        let request = match tag {
            tags::RANGE_QUERY => Request::Range(r.read_nested()?),
            tags::FIRST_LAST_QUERY => Request::FirstLast(r.read_nested()?),
            tags::RANDOM_QUERY => Request::Random(r.read_nested()?),
            tags::CONTAINS_INDEX_QUERY => Request::Contains(r.read_nested()?),
            tags::DISTINCT_QUERY => Request::Distinct(r.read_nested()?),
            tags::TAG_QUERY => Request::Tag(r.read_nested()?),
            tags::STRING_HASH_QUERY => Request::StringHash(r.read_nested()?),
            tags::PAGED_INDEX_QUERY => Request::Paged(r.read_nested()?),
            tags::METADATA_PROPERTY_QUERY => Request::MetadataProperty(r.read_nested()?),
            tags::INTERSECTION_QUERY => Request::Intersection(r.read_nested()?),
            tags::MULTI_INDEX_CONTAINS_QUERY => Request::MultiContains(r.read_nested()?),
            tags::SAVE_INDEX_COMMAND => Request::Save(r.read_nested()?),
            tags::METADATA_PROPERTY_COMMAND => Request::MetadataPropertyUpdate(r.read_nested()?),
            tags::FILTERED_INDEX_DELETE_COMMAND => Request::FilteredDelete(r.read_nested()?),
            tags::DELETE_INDEX_COMMAND => Request::DeleteIndex(r.read_nested()?),
            tag => return Err(CodecError::UnknownTypeTag { tag }),
        };
        r.expect_end()?;
        Ok(request)
    }
}

/// A reply from a cache node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Response {
    /// Reply to [`Request::Range`].
    Range(RangeQueryResult),
    /// Reply to [`Request::FirstLast`].
    FirstLast(FirstLastQueryResult),
    /// Reply to [`Request::Random`].
    Random(RandomQueryResult),
    /// Reply to [`Request::Contains`].
    Contains(ContainsIndexQueryResult),
    /// Reply to [`Request::Distinct`].
    Distinct(DistinctQueryResult),
    /// Reply to [`Request::Tag`].
    Tag(NameSetResult),
    /// Reply to [`Request::StringHash`].
    StringHash(NameSetResult),
    /// Reply to [`Request::Paged`].
    Paged(PagedIndexQueryResult),
    /// Reply to [`Request::MetadataProperty`].
    MetadataProperty(MetadataPropertyQueryResult),
    /// Reply to [`Request::Intersection`].
    Intersection(IntersectionQueryResult),
    /// Reply to [`Request::MultiContains`].
    MultiContains(MultiIndexContainsQueryResult),
    /// Reply to any command.
    Mutation(MutationResult),
    /// The request could not be decoded.
    Rejected(Rejected),
}

impl Response {
    /// Returns the message type tag.
    #[must_use]
    pub fn type_tag(&self) -> u8 {
        match self {
            Response::Range(_) => tags::RANGE_QUERY_RESULT,
            Response::FirstLast(_) => tags::FIRST_LAST_QUERY_RESULT,
            Response::Random(_) => tags::RANDOM_QUERY_RESULT,
            Response::Contains(_) => tags::CONTAINS_INDEX_QUERY_RESULT,
            Response::Distinct(_) => tags::DISTINCT_QUERY_RESULT,
            Response::Tag(_) => tags::TAG_QUERY_RESULT,
            Response::StringHash(_) => tags::STRING_HASH_QUERY_RESULT,
            Response::Paged(_) => tags::PAGED_INDEX_QUERY_RESULT,
            Response::MetadataProperty(_) => tags::METADATA_PROPERTY_QUERY_RESULT,
            Response::Intersection(_) => tags::INTERSECTION_QUERY_RESULT,
            Response::MultiContains(_) => tags::MULTI_INDEX_CONTAINS_QUERY_RESULT,
            Response::Mutation(_) => tags::MUTATION_RESULT,
            Response::Rejected(_) => tags::REJECTED,
        }
    }

    /// Short name for logs and errors.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Response::Range(_) => "range",
            Response::FirstLast(_) => "first_last",
            Response::Random(_) => "random",
            Response::Contains(_) => "contains",
            Response::Distinct(_) => "distinct",
            Response::Tag(_) => "tag",
            Response::StringHash(_) => "string_hash",
            Response::Paged(_) => "paged",
            Response::MetadataProperty(_) => "metadata_property",
            Response::Intersection(_) => "intersection",
            Response::MultiContains(_) => "multi_contains",
            Response::Mutation(_) => "mutation",
            Response::Rejected(_) => "rejected",
        }
    }

    /// Failure text carried by the reply; empty on success.
    #[must_use]
    pub fn exception_info(&self) -> &str {
        match self {
            Response::Range(r) => &r.summary.exception_info,
            Response::FirstLast(r) => &r.summary.exception_info,
            Response::Random(r) => &r.summary.exception_info,
            Response::Contains(r) => &r.summary.exception_info,
            Response::Distinct(r) => &r.exception_info,
            Response::Tag(r) | Response::StringHash(r) => &r.exception_info,
            Response::Paged(r) => &r.exception_info,
            Response::MetadataProperty(r) => &r.exception_info,
            Response::Intersection(r) => &r.exception_info,
            Response::MultiContains(r) => &r.exception_info,
            Response::Mutation(r) => &r.exception_info,
            Response::Rejected(r) => &r.reason,
        }
    }

    /// Encode as tag plus nested body.
    pub fn encode(&self) -> CodecResult<Bytes> {
        let mut buf = BytesMut::new();
        let mut w = PrimitiveWriter::new(&mut buf);
        w.write_u8(self.type_tag());
        match self {
            Response::Range(r) => w.write_nested(r),
            Response::FirstLast(r) => w.write_nested(r),
            Response::Random(r) => w.write_nested(r),
            Response::Contains(r) => w.write_nested(r),
            Response::Distinct(r) => w.write_nested(r),
            Response::Tag(r) | Response::StringHash(r) => w.write_nested(r),
            Response::Paged(r) => w.write_nested(r),
            Response::MetadataProperty(r) => w.write_nested(r),
            Response::Intersection(r) => w.write_nested(r),
            Response::MultiContains(r) => w.write_nested(r),
            Response::Mutation(r) => w.write_nested(r),
            Response::Rejected(r) => w.write_nested(r),
        }?;
        Ok(buf.freeze())
    }

    /// Decode a message produced by [`Response::encode`].
    pub fn decode(bytes: &[u8]) -> CodecResult<Self> {
        let mut r = PrimitiveReader::new(bytes);
        let tag = r.read_u8()?;
        let response = match tag {
            tags::RANGE_QUERY_RESULT => Response::Range(r.read_nested()?),
            tags::FIRST_LAST_QUERY_RESULT => Response::FirstLast(r.read_nested()?),
            tags::RANDOM_QUERY_RESULT => Response::Random(r.read_nested()?),
            tags::CONTAINS_INDEX_QUERY_RESULT => Response::Contains(r.read_nested()?),
            tags::DISTINCT_QUERY_RESULT => Response::Distinct(r.read_nested()?),
            tags::TAG_QUERY_RESULT => Response::Tag(r.read_nested()?),
            tags::STRING_HASH_QUERY_RESULT => Response::StringHash(r.read_nested()?),
            tags::PAGED_INDEX_QUERY_RESULT => Response::Paged(r.read_nested()?),
            tags::METADATA_PROPERTY_QUERY_RESULT => Response::MetadataProperty(r.read_nested()?),
            tags::INTERSECTION_QUERY_RESULT => Response::Intersection(r.read_nested()?),
            tags::MULTI_INDEX_CONTAINS_QUERY_RESULT => Response::MultiContains(r.read_nested()?),
            tags::MUTATION_RESULT => Response::Mutation(r.read_nested()?),
            tags::REJECTED => Response::Rejected(r.read_nested()?),
            tag => return Err(CodecError::UnknownTypeTag { tag }),
        };
        r.expect_end()?;
        Ok(response)
    }
}

impl From<Rejected> for Response {
    fn from(rejected: Rejected) -> Self {
        Response::Rejected(rejected)
    }
}
