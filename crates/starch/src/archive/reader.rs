// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Archive reader with schema-evolution support.
//!
//! # Reflected objects
//!
//! ```text
//! stored ObjectHeader == declared ObjectHeader
//!     -> decode members in order, each inside its size-prefixed record
//! stored TypeHeader == declared TypeHeader (layout differs)
//!     -> scan the stored records, then match every declared member by
//!        trial decoding against the remaining candidates
//! otherwise
//!     -> Signature error
//! ```
//!
//! A trial succeeds when decoding returns Ok and stops exactly at the
//! candidate's end. Format errors inside a trial only reject that
//! candidate; I/O errors abort the whole read.
//!
//! # Bounds
//!
//! Every size-prefixed record installs a read limit. Crossing a record
//! limit is corruption (`Signature`); crossing the physical end of the
//! stream is truncation (`Io`).

use super::buffer::ReadWindow;
use crate::config::{ArchiveConfig, FORMAT_VERSION, MAGIC, PRODUCER_TAG_SHIFT, ROOT_NAME, VERSION_MASK};
use crate::error::{ArchiveError, Result, Success, UNSCOPED};
use crate::fingerprint::{ObjectHeader, TypeHeader};
use crate::poly::PolyBase;
use crate::scalar::{ScalarKind, ScalarValue};
use crate::schema::{schema_of, Reflect, Schema};
use crate::traits::{Decode, Fingerprint};
use byteorder::{ByteOrder, NativeEndian};
use std::io::{Read, Seek, SeekFrom};

/// Source accepted by [`ReadableArchive`].
pub trait ReadSeek: Read + Seek {}

impl<T: Read + Seek + ?Sized> ReadSeek for T {}

/// How the elements of a stored POD value or collection are laid out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementEncoding {
    /// Stored with the in-memory type: raw copy.
    Exact,
    /// Stored as another scalar kind: per-element conversion.
    Convert(ScalarKind),
}

#[derive(Debug, Clone, Copy)]
struct Candidate {
    start: u64,
    end: u64,
    /// False for records that carry no member name: an absent optional
    /// (one zero byte), an absent poly slot or an empty collection of
    /// records (one zero u64).
    named: bool,
}

/// Stored member records of one object, consumed while matching.
#[derive(Debug)]
struct ObjectScanTable {
    candidates: Vec<Candidate>,
    end: u64,
}

impl ObjectScanTable {
    fn scan(archive: &mut ReadableArchive<'_>, type_name: &str, count: u32) -> Result<Self> {
        let count = u64::from(count);
        archive.check_span(type_name, count.saturating_mul(8))?;

        let mut candidates = Vec::with_capacity(count as usize);
        for _ in 0..count {
            let size = archive.read_u64()?;
            let start = archive.pos;
            let end = archive.record_end(type_name, size)?;
            let named = match size {
                1 => archive.read_u8()? != 0,
                8 => archive.read_u64()? != 0,
                _ => true,
            };
            candidates.push(Candidate { start, end, named });
            archive.pos = end;
        }
        Ok(Self {
            candidates,
            end: archive.pos,
        })
    }
}

/// Reads structured archives from any `Read + Seek` source.
pub struct ReadableArchive<'a> {
    source: Box<dyn ReadSeek + 'a>,
    config: ArchiveConfig,
    window: ReadWindow,
    pos: u64,
    stream_end: u64,
    limit: Option<u64>,
    producer_tag: Option<u8>,
}

impl<'a> ReadableArchive<'a> {
    pub fn new<R: Read + Seek + 'a>(source: R) -> Self {
        Self::with_config(source, ArchiveConfig::default())
    }

    pub fn with_config<R: Read + Seek + 'a>(source: R, config: ArchiveConfig) -> Self {
        let window = ReadWindow::new(config.buffer_capacity);
        Self {
            source: Box::new(source),
            config,
            window,
            pos: 0,
            stream_end: 0,
            limit: None,
            producer_tag: None,
        }
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// Producer tag of the last stream whose prologue was accepted.
    pub fn producer_tag(&self) -> Option<u8> {
        self.producer_tag
    }

    /// Read one complete stream into `value`, starting at the source's
    /// current position. On success the source is left just past the
    /// stream.
    ///
    /// A bad prologue fails with `Version` before `value` is touched.
    pub fn deserialize<T: Decode + ?Sized>(&mut self, value: &mut T) -> Result<Success> {
        self.pos = self.source.stream_position()?;
        self.stream_end = self.source.seek(SeekFrom::End(0))?;
        self.source.seek(SeekFrom::Start(self.pos))?;
        self.window.clear();
        self.limit = None;

        let magic = self.read_u16()?;
        let version = self.read_u16()?;
        if magic != MAGIC || version & VERSION_MASK != FORMAT_VERSION {
            log::debug!(
                "[ReadableArchive] rejected prologue magic={:#06x} version={:#06x}",
                magic,
                version
            );
            return Err(ArchiveError::Version { magic, version });
        }
        self.producer_tag = Some((version >> PRODUCER_TAG_SHIFT) as u8);

        let status = value
            .decode(ROOT_NAME, self)
            .map_err(|err| err.for_member(ROOT_NAME))?;
        self.source.seek(SeekFrom::Start(self.pos))?;
        Ok(status)
    }

    /// Absolute stream offset of the next byte.
    pub fn position(&self) -> u64 {
        self.pos
    }

    /// Bytes left before the current record (or stream) end.
    pub fn remaining(&self) -> u64 {
        self.limit
            .unwrap_or(self.stream_end)
            .saturating_sub(self.pos)
    }

    fn check_span(&self, name: &str, len: u64) -> Result<()> {
        let end = self.pos.checked_add(len);
        match self.limit {
            Some(limit) if end.map_or(true, |end| end > limit) => Err(ArchiveError::signature(
                name,
                format!(
                    "{} bytes at offset {} overrun record end {}",
                    len, self.pos, limit
                ),
            )),
            None if end.map_or(true, |end| end > self.stream_end) => {
                Err(ArchiveError::truncated(name))
            }
            _ => Ok(()),
        }
    }

    /// End offset of a record of `size` bytes starting here.
    fn record_end(&self, name: &str, size: u64) -> Result<u64> {
        self.check_span(name, size)?;
        Ok(self.pos + size)
    }

    fn with_limit<R>(&mut self, end: u64, f: impl FnOnce(&mut Self) -> Result<R>) -> Result<R> {
        let outer = self.limit.replace(end);
        let result = f(self);
        self.limit = outer;
        result
    }

    pub fn read_exact(&mut self, out: &mut [u8]) -> Result<()> {
        self.check_span(UNSCOPED, out.len() as u64)?;

        let mut filled = 0;
        while filled < out.len() {
            let cached = self.window.available(self.pos);
            if !cached.is_empty() {
                let n = cached.len().min(out.len() - filled);
                out[filled..filled + n].copy_from_slice(&cached[..n]);
                filled += n;
                self.pos += n as u64;
                continue;
            }

            let rest = out.len() - filled;
            if rest >= self.window.capacity() {
                self.source.seek(SeekFrom::Start(self.pos))?;
                self.source.read_exact(&mut out[filled..])?;
                self.pos += rest as u64;
                break;
            }
            if self.window.refill(self.source.as_mut(), self.pos)? == 0 {
                return Err(ArchiveError::truncated("record"));
            }
        }
        Ok(())
    }

    pub fn read_u8(&mut self) -> Result<u8> {
        let mut byte = [0u8; 1];
        self.read_exact(&mut byte)?;
        Ok(byte[0])
    }

    impl_read_ne! {
        read_u16 => u16, 2, read_u16;
        read_u32 => u32, 4, read_u32;
        read_u64 => u64, 8, read_u64;
    }

    pub fn read_type_header(&mut self) -> Result<TypeHeader> {
        let mut bytes = [0u8; TypeHeader::SIZE];
        self.read_exact(&mut bytes)?;
        Ok(TypeHeader::from_bytes(&bytes))
    }

    /// Read a TrivialHeader that must match exactly (tuples).
    pub fn expect_type_header(&mut self, name: &str, type_hash: u32) -> Result<()> {
        let expected = TypeHeader::new(name, type_hash);
        let found = self.read_type_header()?;
        if found != expected {
            return Err(ArchiveError::signature(
                name,
                format!("expected header {}, found {}", expected, found),
            ));
        }
        Ok(())
    }

    /// Decode `value` and require the cursor to land on the current record
    /// end. Used by [`Reflect::read_member`] impls.
    pub fn read_member<T: Decode + ?Sized>(&mut self, name: &str, value: &mut T) -> Result<Success> {
        let status = value
            .decode(name, self)
            .map_err(|err| err.for_member(name))?;
        if let Some(end) = self.limit {
            if self.pos != end {
                return Err(ArchiveError::signature(
                    name,
                    format!("decode stopped {} bytes before record end", end - self.pos),
                ));
            }
        }
        Ok(status)
    }

    /// Decode one size-prefixed record.
    pub fn read_record<T: Decode + ?Sized>(&mut self, name: &str, value: &mut T) -> Result<Success> {
        let size = self.read_u64()?;
        let end = self.record_end(name, size)?;
        self.with_limit(end, |archive| archive.read_member(name, value))
    }

    /// Decode a reflected object, falling back to the positional search
    /// when the stored layout differs from the declared one.
    pub fn read_object<T: Reflect>(&mut self, name: &str, value: &mut T) -> Result<Success> {
        let schema = schema_of::<T>();
        let expected = schema.object_header(name);
        let mut bytes = [0u8; ObjectHeader::SIZE];
        self.read_exact(&mut bytes)?;
        let found = ObjectHeader::from_bytes(&bytes);

        let status = if found == expected && !self.config.force_safe {
            self.read_members_in_order(value, &schema)?
        } else if found.type_header == expected.type_header {
            log::debug!(
                "[ReadableArchive] {} `{}`: {} stored / {} declared members, searching by position",
                schema.type_name,
                name,
                found.members.count,
                schema.len()
            );
            self.read_members_by_search(value, &schema, found.members.count)?
        } else {
            return Err(ArchiveError::signature(
                name,
                format!(
                    "expected {} header {}, found {}",
                    schema.type_name, expected.type_header, found.type_header
                ),
            ));
        };

        value.post_deserialize();
        Ok(status)
    }

    fn read_members_in_order<T: Reflect>(&mut self, value: &mut T, schema: &Schema) -> Result<Success> {
        let mut status = Success::Full;
        for (index, member) in schema.members.iter().enumerate() {
            let size = self.read_u64()?;
            let end = self.record_end(member.name, size)?;
            status |= self.with_limit(end, |archive| value.read_member(index, archive))?;
        }
        Ok(status)
    }

    fn read_members_by_search<T: Reflect>(
        &mut self,
        value: &mut T,
        schema: &Schema,
        stored: u32,
    ) -> Result<Success> {
        let mut table = ObjectScanTable::scan(self, schema.type_name, stored)?;

        // Named records first, so that an unnamed record (absent value,
        // empty collection) is never claimed ahead of the member's own.
        let mut matched: Vec<Option<Success>> = vec![None; schema.len()];
        for named in [true, false] {
            for (index, slot) in matched.iter_mut().enumerate() {
                if slot.is_none() {
                    *slot = self.match_member(value, index, &mut table, named)?;
                }
            }
        }

        let mut status = Success::Full;
        for (member, found) in schema.members.iter().zip(matched) {
            match found {
                Some(found) => status |= found,
                None => {
                    log::debug!(
                        "[ReadableArchive] {}.{}: no stored record, keeping default",
                        schema.type_name,
                        member.name
                    );
                    status = Success::Partial;
                }
            }
        }

        self.pos = table.end;
        Ok(status)
    }

    fn match_member<T: Reflect>(
        &mut self,
        value: &mut T,
        index: usize,
        table: &mut ObjectScanTable,
        named: bool,
    ) -> Result<Option<Success>> {
        for slot in 0..table.candidates.len() {
            let candidate = table.candidates[slot];
            if candidate.named != named {
                continue;
            }
            self.pos = candidate.start;
            match self.with_limit(candidate.end, |archive| value.read_member(index, archive)) {
                Ok(status) => {
                    table.candidates.remove(slot);
                    return Ok(Some(status));
                }
                Err(err) if err.is_recoverable() => {
                    log::trace!("[ReadableArchive] candidate at {} rejected: {}", candidate.start, err);
                }
                Err(err) => return Err(err),
            }
        }
        Ok(None)
    }

    /// Classify the header of a stored POD value (or packed collection
    /// elements) against the in-memory type `T`.
    pub fn read_element_header<T: Fingerprint + ?Sized>(&mut self, name: &str) -> Result<ElementEncoding> {
        let expected = TypeHeader::new(name, T::type_hash());
        let found = self.read_type_header()?;
        if found == expected {
            return Ok(ElementEncoding::Exact);
        }
        if found.name_hash != expected.name_hash {
            return Err(ArchiveError::signature(
                name,
                format!("expected header {}, found {}", expected, found),
            ));
        }

        let stored = if found.is_compatible(&expected) {
            None
        } else {
            ScalarKind::from_type_hash(found.type_hash)
        };
        match (stored, T::scalar_kind()) {
            (Some(stored), Some(_)) => Ok(ElementEncoding::Convert(stored)),
            (stored, target) => Err(ArchiveError::MemberType {
                name: name.to_string(),
                found: stored.map_or_else(|| format!("type {:08x}", found.type_hash), |kind| kind.name().to_string()),
                expected: target.map_or_else(
                    || format!("type {:08x}", expected.type_hash),
                    |kind| kind.name().to_string(),
                ),
            }),
        }
    }

    /// Read one POD image laid out as `encoding` into `value`.
    pub fn read_pod_value<T: Decode + ?Sized>(
        &mut self,
        name: &str,
        encoding: ElementEncoding,
        value: &mut T,
    ) -> Result<()> {
        let stored = match encoding {
            ElementEncoding::Exact => match value.pod_bytes_mut() {
                Some(bytes) => return self.read_exact(bytes),
                None => T::scalar_kind()
                    .ok_or_else(|| ArchiveError::signature(name, "value has no raw image"))?,
            },
            ElementEncoding::Convert(kind) => kind,
        };

        let mut buffer = [0u8; 8];
        let image = &mut buffer[..stored.size()];
        self.read_exact(image)?;
        let converted = ScalarValue::from_bytes(stored, image)
            .map_or(false, |scalar| value.convert_scalar(scalar));
        if !converted {
            return Err(ArchiveError::MemberType {
                name: name.to_string(),
                found: stored.name().to_string(),
                expected: T::scalar_kind().map_or("unknown", ScalarKind::name).to_string(),
            });
        }
        if encoding != ElementEncoding::Exact {
            log::trace!(
                "[ReadableArchive] `{}`: converted stored {} value",
                name,
                stored.name()
            );
        }
        Ok(())
    }

    /// TrivialHeader + raw image, with scalar conversion.
    pub fn read_pod<T: Decode + ?Sized>(&mut self, name: &str, value: &mut T) -> Result<Success> {
        let encoding = self.read_element_header::<T>(name)?;
        self.read_pod_value(name, encoding, value)?;
        Ok(Success::Full)
    }

    /// Validate a stored element count and read the element layout.
    ///
    /// Returns the count as `usize` and, for packed POD elements, their
    /// encoding. Non-POD elements (`None`) follow as size-prefixed records.
    pub fn read_elements_layout<E: Fingerprint>(
        &mut self,
        name: &str,
        count: u64,
    ) -> Result<(usize, Option<ElementEncoding>)> {
        let len = usize::try_from(count)
            .map_err(|_| ArchiveError::signature(name, format!("element count {} too large", count)))?;

        if E::pod_size().is_none() {
            self.check_span(name, count.saturating_mul(8))?;
            return Ok((len, None));
        }

        let encoding = self.read_element_header::<E>(name)?;
        let element_size = match encoding {
            ElementEncoding::Exact => E::pod_size().unwrap_or(1),
            ElementEncoding::Convert(kind) => kind.size(),
        } as u64;
        self.check_span(name, count.saturating_mul(element_size))?;
        Ok((len, Some(encoding)))
    }

    /// Read packed POD elements into `items`; bulk copy when exact.
    pub fn read_pod_elements<E: Decode>(
        &mut self,
        name: &str,
        encoding: ElementEncoding,
        items: &mut [E],
    ) -> Result<()> {
        if encoding == ElementEncoding::Exact {
            if let Some(bytes) = E::pod_slice_mut(items) {
                return self.read_exact(bytes);
            }
        }
        for item in items {
            self.read_pod_value(name, encoding, item)?;
        }
        Ok(())
    }

    /// Cross-check a decoded container size against the stored count.
    pub fn check_size(&self, name: &str, expected: u64, found: usize) -> Result<()> {
        if expected != found as u64 {
            return Err(ArchiveError::Size {
                name: name.to_string(),
                expected,
                found: found as u64,
            });
        }
        Ok(())
    }

    /// Optional presence flag.
    pub fn read_presence(&mut self, name: &str) -> Result<bool> {
        match self.read_u8()? {
            0 => Ok(false),
            1 => Ok(true),
            flag => Err(ArchiveError::signature(
                name,
                format!("invalid presence flag {}", flag),
            )),
        }
    }

    /// Decode a polymorphic slot.
    ///
    /// A stored size of 0 is an absent value; it is accepted only when
    /// `nullable`. Whatever happens inside the payload (short of an I/O
    /// failure) the cursor ends at the slot's declared end.
    pub fn read_poly<B: PolyBase + ?Sized>(
        &mut self,
        name: &str,
        nullable: bool,
    ) -> Result<(Option<Box<B>>, Success)> {
        let size = self.read_u64()?;
        if size == 0 {
            if nullable {
                return Ok((None, Success::Full));
            }
            return Err(ArchiveError::UnknownPoly {
                base: B::BASE_NAME,
                type_id: 0,
            });
        }

        let end = self.record_end(name, size)?;
        let result = self.with_limit(end, |archive| archive.read_poly_payload::<B>(name));
        match result {
            Err(err) if !err.is_recoverable() => Err(err),
            other => {
                self.pos = end;
                other
            }
        }
    }

    fn read_poly_payload<B: PolyBase + ?Sized>(&mut self, name: &str) -> Result<(Option<Box<B>>, Success)> {
        let type_id = self.read_u64()?;
        let Some(entry) = B::registry().find_by_id(type_id) else {
            log::debug!(
                "[ReadableArchive] `{}`: type {:#018x} not registered for {}",
                name,
                type_id,
                B::BASE_NAME
            );
            return Err(ArchiveError::UnknownPoly {
                base: B::BASE_NAME,
                type_id,
            });
        };

        let mut object = entry.create();
        let status = object.poly_deserialize(name, self)?;
        Ok((Some(object), status))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::WritableArchive;
    use crate::traits::Encode;
    use std::io::Cursor;

    fn stream(write: impl FnOnce(&mut WritableArchive<'_>)) -> Vec<u8> {
        let mut sink = Cursor::new(Vec::new());
        {
            let mut archive = WritableArchive::new(&mut sink);
            write(&mut archive);
        }
        sink.into_inner()
    }

    #[test]
    fn test_bad_magic_is_version_error() {
        let mut bytes = crate::to_bytes(&5u32).expect("Serialize should succeed");
        bytes[0] ^= 0xff;
        let mut value = 9u32;
        let err = crate::from_bytes(&bytes, &mut value).expect_err("Deserialize should fail");
        assert!(matches!(err, ArchiveError::Version { .. }));
        assert_eq!(value, 9);
    }

    #[test]
    fn test_producer_tag_is_exposed() {
        let mut sink = Cursor::new(Vec::new());
        WritableArchive::with_config(&mut sink, ArchiveConfig::new().producer_tag(5))
            .serialize(&1u8)
            .expect("Serialize should succeed");
        sink.set_position(0);

        let mut reader = ReadableArchive::new(&mut sink);
        let mut value = 0u8;
        reader.deserialize(&mut value).expect("Deserialize should succeed");
        assert_eq!(reader.producer_tag(), Some(5));
        assert_eq!(value, 1);
    }

    #[test]
    fn test_record_limit_is_signature_error() {
        // A record claiming 2 bytes, holding a u32 read.
        let bytes = stream(|archive| {
            archive.write_u64(2).expect("Write should succeed");
            archive.write_u32(7).expect("Write should succeed");
            archive.finalize().expect("Finalize should succeed");
        });
        let mut reader = ReadableArchive::new(Cursor::new(bytes));
        reader.stream_end = 12;
        let size = reader.read_u64().expect("Read size should succeed");
        let end = reader.record_end("x", size).expect("Record fits stream");
        let err = reader
            .with_limit(end, |archive| archive.read_u32())
            .expect_err("Read should cross the record end");
        assert!(matches!(err, ArchiveError::Signature { .. }));
    }

    #[test]
    fn test_record_overrun_names_member() {
        // A record claiming 4 bytes around a 12-byte u32 value.
        let bytes = stream(|archive| {
            archive.write_u64(4).expect("Write should succeed");
            7u32.encode("level", archive).expect("Write should succeed");
            archive.finalize().expect("Finalize should succeed");
        });
        let mut reader = ReadableArchive::new(Cursor::new(bytes));
        reader.stream_end = 20;
        let mut level = 0u32;
        let err = reader
            .read_record("level", &mut level)
            .expect_err("Header should cross the record end");
        match err {
            ArchiveError::Signature { name, .. } => assert_eq!(name, "level"),
            other => panic!("unexpected error: {}", other),
        }
        assert_eq!(level, 0);
    }

    #[test]
    fn test_scan_marks_unnamed_records() {
        let bytes = stream(|archive| {
            archive.write_member("a", &None::<u32>).expect("Write should succeed");
            archive.write_member("b", &Some(5u32)).expect("Write should succeed");
            archive
                .write_member("c", &Vec::<String>::new())
                .expect("Write should succeed");
            archive.write_member("d", &vec![1u32]).expect("Write should succeed");
            archive.finalize().expect("Finalize should succeed");
        });
        let len = bytes.len() as u64;
        let mut reader = ReadableArchive::new(Cursor::new(bytes));
        reader.stream_end = len;
        let table = ObjectScanTable::scan(&mut reader, "Node", 4).expect("Scan should succeed");
        let named: Vec<bool> = table.candidates.iter().map(|c| c.named).collect();
        assert_eq!(named, vec![false, true, false, true]);
        assert_eq!(table.end, len);
    }

    #[test]
    fn test_stream_end_is_io_error() {
        let mut reader = ReadableArchive::new(Cursor::new(vec![0u8; 3]));
        reader.stream_end = 3;
        let err = reader.read_u32().expect_err("Read should hit end of stream");
        assert!(!err.is_recoverable());
    }

    #[test]
    fn test_small_window_reads_across_refills() {
        let data: Vec<u8> = (0..100u8).collect();
        let config = ArchiveConfig::new().buffer_capacity(16);
        let mut reader = ReadableArchive::with_config(Cursor::new(data), config);
        reader.stream_end = 100;

        let mut head = [0u8; 10];
        reader.read_exact(&mut head).expect("Read should succeed");
        assert_eq!(head[9], 9);

        let mut middle = [0u8; 12];
        reader.read_exact(&mut middle).expect("Read should succeed");
        assert_eq!(middle[0], 10);
        assert_eq!(middle[11], 21);

        let mut tail = [0u8; 40];
        reader.read_exact(&mut tail).expect("Bypass read should succeed");
        assert_eq!(tail[0], 22);
        assert_eq!(tail[39], 61);
        assert_eq!(reader.position(), 62);
    }

    #[test]
    fn test_element_header_conversion() {
        let bytes = stream(|archive| {
            archive
                .write_type_header(TypeHeader::new("x", i32::type_hash()))
                .expect("Write should succeed");
            archive
                .write_type_header(TypeHeader::new("x", f32::type_hash()))
                .expect("Write should succeed");
            archive
                .write_type_header(TypeHeader::new("y", f32::type_hash()))
                .expect("Write should succeed");
            archive.finalize().expect("Finalize should succeed");
        });
        let mut reader = ReadableArchive::new(Cursor::new(bytes));
        reader.stream_end = 24;

        assert_eq!(
            reader.read_element_header::<f64>("x").expect("i32 converts to f64"),
            ElementEncoding::Convert(ScalarKind::I32)
        );
        assert!(matches!(
            reader.read_element_header::<i64>("x"),
            Ok(ElementEncoding::Convert(ScalarKind::F32))
        ));
        assert!(matches!(
            reader.read_element_header::<f32>("x"),
            Err(ArchiveError::Signature { .. })
        ));
    }
}
