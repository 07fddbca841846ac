/*
 * Persisted component state: the four storage representations plus the
 * binary envelope that carries them between designer sessions.
 *
 * The envelope layout is a compatibility contract with previously
 * serialized state: field order, little-endian integers, and the
 * off-by-one storage-kind encoding are all load-bearing. Encode/decode is
 * isolated here so nothing else in the crate touches raw envelope bytes.
 * [ODU-EnvelopeLayoutV1]
 */

use std::collections::BTreeMap;

use crate::error::{AxError, Result as AxResult};
use crate::property_bag::PropertyBag;

/// Envelope format version. Bumped only for layout changes, never content.
pub const STATE_FORMAT_VERSION: i32 = 1;

/*
 * Which persistence interface a component was depersisted with. Once set
 * for a component, the kind is fixed for that component's lifetime.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StorageKind {
    #[default]
    Unknown,
    Stream,
    StreamInit,
    Storage,
    PropertyBag,
}

impl StorageKind {
    // The envelope stores kinds zero-based, offset by -1 from this enum:
    // legacy writers used 0 for Stream. Unknown is never persisted.
    pub(crate) fn to_wire(self) -> AxResult<i32> {
        match self {
            StorageKind::Unknown => Err(AxError::Persistence(
                "cannot persist state with unknown storage kind".into(),
            )),
            StorageKind::Stream => Ok(0),
            StorageKind::StreamInit => Ok(1),
            StorageKind::Storage => Ok(2),
            StorageKind::PropertyBag => Ok(3),
        }
    }

    pub(crate) fn from_wire(raw: i32) -> AxResult<Self> {
        Ok(match raw {
            0 => StorageKind::Stream,
            1 => StorageKind::StreamInit,
            2 => StorageKind::Storage,
            3 => StorageKind::PropertyBag,
            other => {
                return Err(AxError::Persistence(format!(
                    "unknown storage kind {other} in persisted state"
                )));
            }
        })
    }
}

/*
 * Minimal structured storage: named streams with a commit boundary. The
 * committed image is what the envelope flattens; uncommitted writes are
 * the component's scratch space until `commit`.
 */
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StructuredStorage {
    streams: BTreeMap<String, Vec<u8>>,
    committed: BTreeMap<String, Vec<u8>>,
}

impl StructuredStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn write_stream(&mut self, name: &str, data: &[u8]) {
        self.streams.insert(name.to_string(), data.to_vec());
    }

    pub fn read_stream(&self, name: &str) -> Option<&[u8]> {
        self.streams.get(name).map(Vec::as_slice)
    }

    pub fn commit(&mut self) {
        self.committed = self.streams.clone();
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty() && self.committed.is_empty()
    }

    pub(crate) fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::new();
        write_i32(&mut out, self.committed.len() as i32);
        for (name, data) in &self.committed {
            write_i32(&mut out, name.len() as i32);
            out.extend_from_slice(name.as_bytes());
            write_i32(&mut out, data.len() as i32);
            out.extend_from_slice(data);
        }
        out
    }

    pub(crate) fn from_bytes(bytes: &[u8]) -> AxResult<Self> {
        let mut cursor = Cursor::new(bytes);
        let count = cursor.read_i32()?;
        if count < 0 {
            return Err(AxError::Persistence("negative storage stream count".into()));
        }
        let mut committed = BTreeMap::new();
        for _ in 0..count {
            let name_len = cursor.read_len()?;
            let name = std::str::from_utf8(cursor.read_bytes(name_len)?)
                .map_err(|_| AxError::Persistence("storage stream name is not UTF-8".into()))?
                .to_string();
            let data_len = cursor.read_len()?;
            let data = cursor.read_bytes(data_len)?.to_vec();
            committed.insert(name, data);
        }
        Ok(Self {
            streams: committed.clone(),
            committed,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Backing {
    Buffer(Vec<u8>),
    Storage(StructuredStorage),
    Bag(PropertyBag),
}

/*
 * A component's persisted state: exactly one backing representation is
 * authoritative, dictated by the storage kind. Conversions between kinds
 * go through explicit save/reload on the hosting engine, never here.
 */
#[derive(Debug, Clone, PartialEq)]
pub struct OcxState {
    kind: StorageKind,
    manual_update: bool,
    license_key: Option<String>,
    backing: Backing,
}

impl OcxState {
    /// State captured through a (self-initializing or plain) stream save.
    pub fn from_stream_bytes(
        kind: StorageKind,
        bytes: Vec<u8>,
        manual_update: bool,
        license_key: Option<String>,
    ) -> AxResult<Self> {
        if !matches!(kind, StorageKind::Stream | StorageKind::StreamInit) {
            return Err(AxError::InvalidState(format!(
                "stream bytes cannot back storage kind {kind:?}"
            )));
        }
        Ok(Self {
            kind,
            manual_update,
            license_key,
            backing: Backing::Buffer(bytes),
        })
    }

    /// Fresh structured-storage state with an empty backing store.
    pub fn new_storage(manual_update: bool, license_key: Option<String>) -> Self {
        Self {
            kind: StorageKind::Storage,
            manual_update,
            license_key,
            backing: Backing::Storage(StructuredStorage::new()),
        }
    }

    pub fn from_property_bag(
        bag: PropertyBag,
        manual_update: bool,
        license_key: Option<String>,
    ) -> Self {
        Self {
            kind: StorageKind::PropertyBag,
            manual_update,
            license_key,
            backing: Backing::Bag(bag),
        }
    }

    pub fn kind(&self) -> StorageKind {
        self.kind
    }

    /// One legal downgrade: a StreamInit state presented to a component
    /// without StreamInit support is re-dispatched as plain Stream.
    pub(crate) fn downgrade_to_stream(&mut self) -> AxResult<()> {
        if self.kind != StorageKind::StreamInit {
            return Err(AxError::InvalidState(format!(
                "only StreamInit state can downgrade to Stream, not {:?}",
                self.kind
            )));
        }
        self.kind = StorageKind::Stream;
        Ok(())
    }

    pub fn manual_update(&self) -> bool {
        self.manual_update
    }

    pub fn license_key(&self) -> Option<&str> {
        self.license_key.as_deref()
    }

    pub fn stream_bytes(&self) -> Option<&[u8]> {
        match &self.backing {
            Backing::Buffer(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn property_bag(&self) -> Option<&PropertyBag> {
        match &self.backing {
            Backing::Bag(bag) => Some(bag),
            _ => None,
        }
    }

    pub fn storage(&self) -> Option<&StructuredStorage> {
        match &self.backing {
            Backing::Storage(storage) => Some(storage),
            _ => None,
        }
    }

    pub fn storage_mut(&mut self) -> Option<&mut StructuredStorage> {
        match &mut self.backing {
            Backing::Storage(storage) => Some(storage),
            _ => None,
        }
    }

    /*
     * Envelope layout, in order: storage kind (zero-based, offset -1 from
     * the enum), format version, manual-update flag, license-key character
     * count + UTF-8 characters, skip-unit count (always written zero, but
     * honored generically on read), payload length, payload bytes.
     */
    pub fn encode(&self) -> AxResult<Vec<u8>> {
        let mut out = Vec::new();
        write_i32(&mut out, self.kind.to_wire()?);
        write_i32(&mut out, STATE_FORMAT_VERSION);
        out.push(self.manual_update as u8);
        match &self.license_key {
            Some(key) => {
                write_i32(&mut out, key.chars().count() as i32);
                out.extend_from_slice(key.as_bytes());
            }
            None => write_i32(&mut out, 0),
        }
        write_i32(&mut out, 0); // reserved skip units
        let payload = match &self.backing {
            Backing::Buffer(bytes) => bytes.clone(),
            Backing::Storage(storage) => storage.to_bytes(),
            Backing::Bag(bag) => bag.to_wire(),
        };
        write_i32(&mut out, payload.len() as i32);
        out.extend_from_slice(&payload);
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> AxResult<Self> {
        let mut cursor = Cursor::new(bytes);
        let kind = StorageKind::from_wire(cursor.read_i32()?)?;
        let version = cursor.read_i32()?;
        if version > STATE_FORMAT_VERSION {
            return Err(AxError::Persistence(format!(
                "persisted state version {version} is newer than supported {STATE_FORMAT_VERSION}"
            )));
        }
        let manual_update = cursor.read_u8()? != 0;
        let key_chars = cursor.read_len()?;
        let license_key = if key_chars == 0 {
            None
        } else {
            Some(cursor.read_utf8_chars(key_chars)?)
        };
        // Forward compatibility: skip N length-prefixed blocks we don't
        // understand. Current producers always write zero.
        let skip_units = cursor.read_len()?;
        for _ in 0..skip_units {
            let len = cursor.read_len()?;
            cursor.read_bytes(len)?;
        }
        let payload_len = cursor.read_len()?;
        let payload = cursor.read_bytes(payload_len)?;
        let backing = match kind {
            StorageKind::Stream | StorageKind::StreamInit => Backing::Buffer(payload.to_vec()),
            StorageKind::Storage => Backing::Storage(StructuredStorage::from_bytes(payload)?),
            StorageKind::PropertyBag => Backing::Bag(PropertyBag::from_wire(payload)?),
            StorageKind::Unknown => unreachable!("from_wire rejects unknown kinds"),
        };
        Ok(Self {
            kind,
            manual_update,
            license_key,
            backing,
        })
    }
}

fn write_i32(out: &mut Vec<u8>, value: i32) {
    out.extend_from_slice(&value.to_le_bytes());
}

struct Cursor<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Cursor<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn read_bytes(&mut self, len: usize) -> AxResult<&'a [u8]> {
        let end = self.pos.checked_add(len).filter(|&e| e <= self.bytes.len());
        match end {
            Some(end) => {
                let slice = &self.bytes[self.pos..end];
                self.pos = end;
                Ok(slice)
            }
            None => Err(AxError::Persistence("truncated persisted state".into())),
        }
    }

    fn read_i32(&mut self) -> AxResult<i32> {
        let raw = self.read_bytes(4)?;
        Ok(i32::from_le_bytes([raw[0], raw[1], raw[2], raw[3]]))
    }

    fn read_len(&mut self) -> AxResult<usize> {
        let value = self.read_i32()?;
        usize::try_from(value)
            .map_err(|_| AxError::Persistence(format!("negative length {value} in envelope")))
    }

    fn read_u8(&mut self) -> AxResult<u8> {
        Ok(self.read_bytes(1)?[0])
    }

    // Decodes exactly `count` characters; the length prefix counts
    // characters, not bytes, so multi-byte keys parse correctly.
    fn read_utf8_chars(&mut self, count: usize) -> AxResult<String> {
        let mut out = String::new();
        for _ in 0..count {
            let first = self.read_u8()?;
            let width = match first {
                0x00..=0x7F => 1,
                0xC0..=0xDF => 2,
                0xE0..=0xEF => 3,
                0xF0..=0xF7 => 4,
                _ => {
                    return Err(AxError::Persistence(
                        "malformed UTF-8 in license key".into(),
                    ));
                }
            };
            let mut buf = [first, 0, 0, 0];
            for slot in buf.iter_mut().take(width).skip(1) {
                *slot = self.read_u8()?;
            }
            let ch = std::str::from_utf8(&buf[..width])
                .map_err(|_| AxError::Persistence("malformed UTF-8 in license key".into()))?
                .chars()
                .next()
                .ok_or_else(|| AxError::Persistence("empty license key character".into()))?;
            out.push(ch);
        }
        Ok(out)
    }
}
