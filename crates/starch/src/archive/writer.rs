// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Streaming archive writer.
//!
//! Variable-length regions (reflected members, polymorphic payloads,
//! non-POD collection elements) are prefixed by an 8-byte size that is not
//! known when the region starts. The writer emits a placeholder, encodes the
//! region, and records a [`SizePatch`]. At flush time pending patches are
//! partitioned: targets still in the staging buffer are overwritten in
//! place, targets already on the sink are rewritten by seeking back.

use super::buffer::StagingBuffer;
use crate::config::{ArchiveConfig, MAGIC, ROOT_NAME};
use crate::error::{ArchiveError, Result};
use crate::fingerprint::TypeHeader;
use crate::poly::PolyBase;
use crate::schema::{schema_of, Reflect};
use crate::traits::Encode;
use byteorder::{ByteOrder, NativeEndian};
use std::io::{Seek, SeekFrom, Write};

/// Sink accepted by [`WritableArchive`].
pub trait WriteSeek: Write + Seek {}

impl<T: Write + Seek + ?Sized> WriteSeek for T {}

/// A resolved size prefix waiting to be written at `target_offset`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SizePatch {
    pub target_offset: u64,
    pub resolved_size: u64,
}

impl SizePatch {
    fn image(&self) -> [u8; 8] {
        let mut bytes = [0u8; 8];
        NativeEndian::write_u64(&mut bytes, self.resolved_size);
        bytes
    }
}

/// An open size-prefixed region. Close it with
/// [`WritableArchive::end_size_patch`].
#[must_use = "an open size patch must be resolved"]
#[derive(Debug)]
pub struct OpenPatch {
    target_offset: u64,
}

/// Writes structured archives to any `Write + Seek` sink.
///
/// # Example
///
/// ```
/// use starch::WritableArchive;
/// use std::io::Cursor;
///
/// let mut sink = Cursor::new(Vec::new());
/// WritableArchive::new(&mut sink)
///     .serialize(&vec![1u32, 2, 3])
///     .expect("serialize");
/// assert!(!sink.get_ref().is_empty());
/// ```
pub struct WritableArchive<'a> {
    sink: Box<dyn WriteSeek + 'a>,
    config: ArchiveConfig,
    staging: StagingBuffer,
    patches: Vec<SizePatch>,
}

impl<'a> WritableArchive<'a> {
    pub fn new<W: Write + Seek + 'a>(sink: W) -> Self {
        Self::with_config(sink, ArchiveConfig::default())
    }

    pub fn with_config<W: Write + Seek + 'a>(sink: W, config: ArchiveConfig) -> Self {
        let staging = StagingBuffer::new(config.buffer_capacity);
        Self {
            sink: Box::new(sink),
            config,
            staging,
            patches: Vec::new(),
        }
    }

    pub fn config(&self) -> &ArchiveConfig {
        &self.config
    }

    /// Write one complete stream (prologue + `value`) at the sink's current
    /// position and leave the sink just past it.
    pub fn serialize<T: Encode + ?Sized>(&mut self, value: &T) -> Result<()> {
        let origin = self.sink.stream_position()?;
        self.staging.reset(origin);
        self.patches.clear();

        self.write_u16(MAGIC)?;
        self.write_u16(self.config.version_word())?;
        value.encode(ROOT_NAME, self)?;
        self.finalize()?;

        log::debug!(
            "[WritableArchive] wrote {} bytes at offset {}",
            self.staging.origin() - origin,
            origin
        );
        Ok(())
    }

    /// Absolute stream offset of the next byte.
    pub fn position(&self) -> u64 {
        self.staging.position()
    }

    pub fn write_bytes(&mut self, data: &[u8]) -> Result<()> {
        if self.staging.fits(data.len()) {
            self.staging.push(data);
            return Ok(());
        }
        self.flush()?;
        if data.len() >= self.staging.capacity() {
            self.sink.write_all(data)?;
            self.staging.advance(data.len() as u64);
        } else {
            self.staging.push(data);
        }
        Ok(())
    }

    pub fn write_u8(&mut self, value: u8) -> Result<()> {
        self.write_bytes(&[value])
    }

    impl_write_ne! {
        write_u16 => u16, 2, write_u16;
        write_u32 => u32, 4, write_u32;
        write_u64 => u64, 8, write_u64;
    }

    /// Open a size-prefixed region by writing a placeholder.
    pub fn begin_size_patch(&mut self) -> Result<OpenPatch> {
        let target_offset = self.position();
        self.write_u64(u64::MAX)?;
        Ok(OpenPatch { target_offset })
    }

    /// Close a region; its size is the byte span written since it opened.
    pub fn end_size_patch(&mut self, open: OpenPatch) {
        let resolved_size = self.position() - open.target_offset - 8;
        self.patches.push(SizePatch {
            target_offset: open.target_offset,
            resolved_size,
        });
    }

    fn flush(&mut self) -> Result<()> {
        let mut on_sink = Vec::new();
        for patch in self.patches.drain(..) {
            if self.staging.holds(patch.target_offset) {
                self.staging.patch(patch.target_offset, &patch.image());
            } else {
                on_sink.push(patch);
            }
        }

        if !self.staging.is_empty() {
            self.sink.write_all(self.staging.as_slice())?;
        }
        self.staging.advance(0);

        if !on_sink.is_empty() {
            let end = self.staging.origin();
            for patch in &on_sink {
                self.sink.seek(SeekFrom::Start(patch.target_offset))?;
                self.sink.write_all(&patch.image())?;
            }
            self.sink.seek(SeekFrom::Start(end))?;
            log::trace!(
                "[WritableArchive] resolved {} size patches on sink",
                on_sink.len()
            );
        }
        Ok(())
    }

    pub(crate) fn finalize(&mut self) -> Result<()> {
        self.flush()?;
        self.sink.flush()?;
        Ok(())
    }

    pub fn write_type_header(&mut self, header: TypeHeader) -> Result<()> {
        self.write_bytes(&header.to_bytes())
    }

    /// TrivialHeader followed by a raw image.
    pub fn write_pod(&mut self, name: &str, type_hash: u32, image: &[u8]) -> Result<()> {
        self.write_type_header(TypeHeader::new(name, type_hash))?;
        self.write_bytes(image)
    }

    /// ObjectHeader followed by each member as a size-prefixed record.
    pub fn write_object<T: Reflect>(&mut self, name: &str, value: &T) -> Result<()> {
        let schema = schema_of::<T>();
        self.write_bytes(&schema.object_header(name).to_bytes())?;
        value.write_members(self)
    }

    /// One size-prefixed record.
    pub fn write_member<T: Encode + ?Sized>(&mut self, name: &str, value: &T) -> Result<()> {
        let open = self.begin_size_patch()?;
        value.encode(name, self)?;
        self.end_size_patch(open);
        Ok(())
    }

    pub fn write_optional<T: Encode + ?Sized>(&mut self, name: &str, value: Option<&T>) -> Result<()> {
        match value {
            Some(inner) => {
                self.write_u8(1)?;
                inner.encode(name, self)
            }
            None => self.write_u8(0),
        }
    }

    /// Size-prefixed polymorphic slot; an absent value has size 0.
    pub fn write_poly<B: PolyBase + ?Sized>(&mut self, name: &str, value: Option<&B>) -> Result<()> {
        let open = self.begin_size_patch()?;
        if let Some(object) = value {
            self.write_u64(object.poly_type_id())?;
            object.poly_serialize(name, self)?;
        }
        self.end_size_patch(open);
        Ok(())
    }

    /// Collection over contiguous storage; POD elements are bulk copied.
    pub fn write_slice<E: Encode>(&mut self, name: &str, items: &[E]) -> Result<()> {
        if let Some(image) = E::pod_slice(items) {
            self.write_u64(items.len() as u64)?;
            self.write_type_header(TypeHeader::new(name, E::type_hash()))?;
            return self.write_bytes(image);
        }
        self.write_sequence(name, items.iter())
    }

    /// Collection over any sized iterator. POD elements produce the same
    /// bytes as [`write_slice`](Self::write_slice), one image at a time.
    pub fn write_sequence<E, I>(&mut self, name: &str, items: I) -> Result<()>
    where
        E: Encode,
        I: ExactSizeIterator<Item = E>,
    {
        self.write_u64(items.len() as u64)?;
        if E::pod_size().is_none() {
            for item in items {
                self.write_member(name, &item)?;
            }
            return Ok(());
        }

        self.write_type_header(TypeHeader::new(name, E::type_hash()))?;
        for item in items {
            let image = item
                .pod_bytes()
                .ok_or_else(|| ArchiveError::signature(name, "POD element without raw image"))?;
            self.write_bytes(image)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FORMAT_VERSION;
    use crate::fingerprint::{MembersHeader, ObjectHeader};
    use std::io::Cursor;

    #[test]
    fn test_prologue() {
        let mut sink = Cursor::new(Vec::new());
        WritableArchive::new(&mut sink)
            .serialize(&7u8)
            .expect("Serialize should succeed");
        let bytes = sink.into_inner();
        assert_eq!(&bytes[0..2], &MAGIC.to_ne_bytes());
        assert_eq!(&bytes[2..4], &FORMAT_VERSION.to_ne_bytes());
        // prologue + TrivialHeader + 1 byte
        assert_eq!(bytes.len(), 4 + 8 + 1);
        assert_eq!(bytes[12], 7);
    }

    #[test]
    fn test_in_buffer_patch() {
        let mut sink = Cursor::new(Vec::new());
        {
            let mut archive = WritableArchive::new(&mut sink);
            let open = archive.begin_size_patch().expect("Begin patch should succeed");
            archive.write_u32(0xdead_beef).expect("Write u32 should succeed");
            archive.write_u8(1).expect("Write u8 should succeed");
            archive.end_size_patch(open);
            archive.finalize().expect("Finalize should succeed");
        }
        let bytes = sink.into_inner();
        assert_eq!(&bytes[0..8], &5u64.to_ne_bytes());
    }

    #[test]
    fn test_on_sink_patch_restores_cursor() {
        let mut sink = Cursor::new(Vec::new());
        {
            let config = ArchiveConfig::new().buffer_capacity(16);
            let mut archive = WritableArchive::with_config(&mut sink, config);
            let open = archive.begin_size_patch().expect("Begin patch should succeed");
            for i in 0..10u32 {
                archive.write_u32(i).expect("Write u32 should succeed");
            }
            archive.end_size_patch(open);
            archive.write_u8(0xaa).expect("Write u8 should succeed");
            archive.finalize().expect("Finalize should succeed");
        }
        assert_eq!(sink.position(), 8 + 40 + 1);
        let bytes = sink.into_inner();
        assert_eq!(&bytes[0..8], &40u64.to_ne_bytes());
        assert_eq!(bytes[48], 0xaa);
    }

    #[test]
    fn test_large_write_bypasses_staging() {
        let mut sink = Cursor::new(Vec::new());
        let payload = vec![3u8; 100];
        {
            let config = ArchiveConfig::new().buffer_capacity(32);
            let mut archive = WritableArchive::with_config(&mut sink, config);
            archive.write_u16(1).expect("Write u16 should succeed");
            archive.write_bytes(&payload).expect("Write bytes should succeed");
            assert_eq!(archive.position(), 102);
            archive.write_u16(2).expect("Write u16 should succeed");
            archive.finalize().expect("Finalize should succeed");
        }
        let bytes = sink.into_inner();
        assert_eq!(bytes.len(), 104);
        assert_eq!(&bytes[2..102], payload.as_slice());
        assert_eq!(&bytes[102..], &2u16.to_ne_bytes());
    }

    #[test]
    fn test_object_header_written() {
        let mut sink = Cursor::new(Vec::new());
        let header = ObjectHeader {
            type_header: TypeHeader::new("a", 1),
            members: MembersHeader {
                member_hash: 2,
                count: 0,
            },
        };
        {
            let mut archive = WritableArchive::new(&mut sink);
            archive
                .write_bytes(&header.to_bytes())
                .expect("Write header should succeed");
            archive.finalize().expect("Finalize should succeed");
        }
        assert_eq!(sink.into_inner(), header.to_bytes().to_vec());
    }
}
