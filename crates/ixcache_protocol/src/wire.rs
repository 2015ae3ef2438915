//! Shared field encodings.

use ixcache_codec::{CodecResult, PrimitiveReader, PrimitiveWriter, VersionSerializable};
use ixcache_core::{DomainSpecificProcessingType, IndexId};
use std::collections::BTreeMap;

pub(crate) fn write_names(
    w: &mut PrimitiveWriter<'_>,
    field: &'static str,
    names: &[String],
) -> CodecResult<()> {
    w.write_count_u16(field, names.len())?;
    names.iter().try_for_each(|name| w.write_string(field, name))
}

pub(crate) fn read_names(r: &mut PrimitiveReader<'_>, field: &'static str) -> CodecResult<Vec<String>> {
    let count = r.read_count_u16()?;
    let mut names = Vec::with_capacity(r.capacity_hint(count, 4));
    for _ in 0..count {
        names.push(r.read_string(field)?);
    }
    Ok(names)
}

pub(crate) fn write_long_names(
    w: &mut PrimitiveWriter<'_>,
    field: &'static str,
    names: &[String],
) -> CodecResult<()> {
    w.write_count_i32(field, names.len())?;
    names.iter().try_for_each(|name| w.write_string(field, name))
}

pub(crate) fn read_long_names(
    r: &mut PrimitiveReader<'_>,
    field: &'static str,
) -> CodecResult<Vec<String>> {
    let count = r.read_count_i32(field)?;
    let mut names = Vec::with_capacity(r.capacity_hint(count, 4));
    for _ in 0..count {
        names.push(r.read_string(field)?);
    }
    Ok(names)
}

pub(crate) fn write_index_ids(w: &mut PrimitiveWriter<'_>, ids: &[IndexId]) -> CodecResult<()> {
    w.write_count_i32("index_id_list", ids.len())?;
    ids.iter().try_for_each(|id| id.write(w))
}

pub(crate) fn read_index_ids(r: &mut PrimitiveReader<'_>) -> CodecResult<Vec<IndexId>> {
    let count = r.read_count_i32("index_id_list")?;
    let mut ids = Vec::with_capacity(r.capacity_hint(count, 2));
    for _ in 0..count {
        ids.push(IndexId::read(r)?);
    }
    Ok(ids)
}

pub(crate) fn write_primary_ids(w: &mut PrimitiveWriter<'_>, ids: &[i32]) -> CodecResult<()> {
    w.write_count_i32("primary_id_list", ids.len())?;
    for id in ids {
        w.write_i32(*id);
    }
    Ok(())
}

pub(crate) fn read_primary_ids(r: &mut PrimitiveReader<'_>) -> CodecResult<Vec<i32>> {
    let count = r.read_count_i32("primary_id_list")?;
    let mut ids = Vec::with_capacity(r.capacity_hint(count, 4));
    for _ in 0..count {
        ids.push(r.read_i32()?);
    }
    Ok(ids)
}

/// Per-index overrides: an i32 count, then each id followed by its nested params.
pub(crate) fn write_params_mapping<P: VersionSerializable>(
    w: &mut PrimitiveWriter<'_>,
    mapping: &BTreeMap<IndexId, P>,
) -> CodecResult<()> {
    w.write_count_i32("index_id_params_mapping", mapping.len())?;
    for (id, params) in mapping {
        id.write(w)?;
        w.write_nested(params)?;
    }
    Ok(())
}

pub(crate) fn read_params_mapping<P: VersionSerializable>(
    r: &mut PrimitiveReader<'_>,
) -> CodecResult<BTreeMap<IndexId, P>> {
    let count = r.read_count_i32("index_id_params_mapping")?;
    let mut mapping = BTreeMap::new();
    for _ in 0..count {
        let id = IndexId::read(r)?;
        mapping.insert(id, r.read_nested()?);
    }
    Ok(mapping)
}

pub(crate) fn write_byte_list(
    w: &mut PrimitiveWriter<'_>,
    field: &'static str,
    values: &[Vec<u8>],
) -> CodecResult<()> {
    w.write_count_i32(field, values.len())?;
    values.iter().try_for_each(|v| w.write_bytes_u16(field, v))
}

pub(crate) fn read_byte_list(r: &mut PrimitiveReader<'_>, field: &'static str) -> CodecResult<Vec<Vec<u8>>> {
    let count = r.read_count_i32(field)?;
    let mut values = Vec::with_capacity(r.capacity_hint(count, 2));
    for _ in 0..count {
        values.push(r.read_bytes_u16()?);
    }
    Ok(values)
}

pub(crate) fn write_opt_i32(w: &mut PrimitiveWriter<'_>, value: Option<i32>) {
    w.write_bool(value.is_some());
    if let Some(v) = value {
        w.write_i32(v);
    }
}

pub(crate) fn read_opt_i32(r: &mut PrimitiveReader<'_>) -> CodecResult<Option<i32>> {
    Ok(if r.read_bool()? { Some(r.read_i32()?) } else { None })
}

pub(crate) fn read_domain_type(r: &mut PrimitiveReader<'_>) -> CodecResult<DomainSpecificProcessingType> {
    Ok(DomainSpecificProcessingType::from_u8(r.read_u8()?))
}
