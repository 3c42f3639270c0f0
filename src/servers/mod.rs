use serde::Serialize;

use crate::error::SyncError;

const TAG_END: u8 = 0;
const TAG_BYTE: u8 = 1;
const TAG_STRING: u8 = 8;
const TAG_LIST: u8 = 9;
const TAG_COMPOUND: u8 = 10;

/// How the client treats a server's resource pack. Only "prompt" is ever written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum AcceptTextures {
    Prompt,
}

impl AcceptTextures {
    fn as_byte(self) -> i8 {
        match self {
            AcceptTextures::Prompt => 0,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ServerEntry {
    pub name: String,
    pub ip: String,
    pub accept_textures: AcceptTextures,
    pub hidden: bool,
}

impl ServerEntry {
    pub fn new(name: impl Into<String>, ip: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ip: ip.into(),
            accept_textures: AcceptTextures::Prompt,
            hidden: false,
        }
    }
}

/// Encode a `servers.dat` document (uncompressed NBT, big-endian).
pub fn encode(entries: &[ServerEntry]) -> Result<Vec<u8>, SyncError> {
    let mut w = NbtWriter::default();
    w.open_compound("")?;
    w.open_list("servers", TAG_COMPOUND, entries.len())?;
    for entry in entries {
        // List elements are bare compound payloads: no tag id, no name.
        w.string("name", &entry.name)?;
        w.string("ip", &entry.ip)?;
        w.string("icon", "")?;
        w.byte("acceptTextures", entry.accept_textures.as_byte())?;
        w.byte("hidden", i8::from(entry.hidden))?;
        w.end();
    }
    w.end();
    Ok(w.into_bytes())
}

/// Minimal writer for the handful of NBT tags `servers.dat` needs.
#[derive(Default)]
struct NbtWriter {
    buf: Vec<u8>,
}

impl NbtWriter {
    fn open_compound(&mut self, name: &str) -> Result<(), SyncError> {
        self.header(TAG_COMPOUND, name)
    }

    fn open_list(&mut self, name: &str, element: u8, len: usize) -> Result<(), SyncError> {
        let len = i32::try_from(len)
            .map_err(|_| SyncError::Encoding(format!("list {name:?} has too many elements")))?;
        self.header(TAG_LIST, name)?;
        self.buf.push(element);
        self.buf.extend_from_slice(&len.to_be_bytes());
        Ok(())
    }

    fn string(&mut self, name: &str, value: &str) -> Result<(), SyncError> {
        self.header(TAG_STRING, name)?;
        self.raw_string(value)
    }

    fn byte(&mut self, name: &str, value: i8) -> Result<(), SyncError> {
        self.header(TAG_BYTE, name)?;
        self.buf.extend_from_slice(&value.to_be_bytes());
        Ok(())
    }

    fn end(&mut self) {
        self.buf.push(TAG_END);
    }

    fn header(&mut self, tag: u8, name: &str) -> Result<(), SyncError> {
        self.buf.push(tag);
        self.raw_string(name)
    }

    fn raw_string(&mut self, value: &str) -> Result<(), SyncError> {
        let len = u16::try_from(value.len()).map_err(|_| {
            SyncError::Encoding(format!("string of {} bytes exceeds NBT limit", value.len()))
        })?;
        self.buf.extend_from_slice(&len.to_be_bytes());
        self.buf.extend_from_slice(value.as_bytes());
        Ok(())
    }

    fn into_bytes(self) -> Vec<u8> {
        self.buf
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    /// Strict reader for the subset of NBT the encoder emits.
    #[derive(Debug, PartialEq)]
    enum Tag {
        Byte(i8),
        Str(String),
        List(u8, Vec<Tag>),
        Compound(Vec<(String, Tag)>),
    }

    struct Reader<'a> {
        bytes: &'a [u8],
        pos: usize,
    }

    impl<'a> Reader<'a> {
        fn take(&mut self, n: usize) -> &'a [u8] {
            let out = &self.bytes[self.pos..self.pos + n];
            self.pos += n;
            out
        }

        fn u8(&mut self) -> u8 {
            self.take(1)[0]
        }

        fn string(&mut self) -> String {
            let len = u16::from_be_bytes(self.take(2).try_into().unwrap()) as usize;
            String::from_utf8(self.take(len).to_vec()).unwrap()
        }

        fn payload(&mut self, tag: u8) -> Tag {
            match tag {
                TAG_BYTE => Tag::Byte(self.u8() as i8),
                TAG_STRING => Tag::Str(self.string()),
                TAG_LIST => {
                    let element = self.u8();
                    let len = i32::from_be_bytes(self.take(4).try_into().unwrap());
                    Tag::List(element, (0..len).map(|_| self.payload(element)).collect())
                }
                TAG_COMPOUND => {
                    let mut fields = Vec::new();
                    loop {
                        let tag = self.u8();
                        if tag == TAG_END {
                            break;
                        }
                        let name = self.string();
                        fields.push((name, self.payload(tag)));
                    }
                    Tag::Compound(fields)
                }
                other => panic!("unexpected tag {other}"),
            }
        }

        fn root(bytes: &'a [u8]) -> (String, Tag) {
            let mut reader = Reader { bytes, pos: 0 };
            assert_eq!(reader.u8(), TAG_COMPOUND);
            let name = reader.string();
            let tag = reader.payload(TAG_COMPOUND);
            assert_eq!(reader.pos, bytes.len(), "trailing bytes after root compound");
            (name, tag)
        }
    }

    #[test]
    fn single_entry_matches_reference_bytes() {
        let bytes = encode(&[ServerEntry::new("A", "b.c")]).unwrap();
        let mut expected = vec![0x0A, 0x00, 0x00];
        expected.extend_from_slice(b"\x09\x00\x07servers\x0A\x00\x00\x00\x01");
        expected.extend_from_slice(b"\x08\x00\x04name\x00\x01A");
        expected.extend_from_slice(b"\x08\x00\x02ip\x00\x03b.c");
        expected.extend_from_slice(b"\x08\x00\x04icon\x00\x00");
        expected.extend_from_slice(b"\x01\x00\x0EacceptTextures\x00");
        expected.extend_from_slice(b"\x01\x00\x06hidden\x00");
        expected.extend_from_slice(&[0x00, 0x00]);
        assert_eq!(bytes, expected);
    }

    #[test]
    fn empty_catalog_still_declares_compound_list() {
        let bytes = encode(&[]).unwrap();
        let (_, root) = Reader::root(&bytes);
        assert_eq!(
            root,
            Tag::Compound(vec![("servers".into(), Tag::List(TAG_COMPOUND, vec![]))])
        );
    }

    #[test]
    fn oversized_string_is_an_encoding_error() {
        let huge = "x".repeat(usize::from(u16::MAX) + 1);
        assert!(matches!(
            encode(&[ServerEntry::new(huge, "ip")]),
            Err(SyncError::Encoding(_))
        ));
    }

    proptest! {
        #[test]
        fn decoder_recovers_every_entry_in_order(
            servers in prop::collection::vec(("\\PC{0,24}", "[a-z0-9.:-]{1,32}"), 0..12)
        ) {
            let entries: Vec<ServerEntry> = servers
                .iter()
                .map(|(name, ip)| ServerEntry::new(name.clone(), ip.clone()))
                .collect();
            let bytes = encode(&entries).unwrap();
            let (root_name, root) = Reader::root(&bytes);
            prop_assert_eq!(root_name, "");

            let Tag::Compound(fields) = root else { panic!("root is not a compound") };
            prop_assert_eq!(fields.len(), 1);
            let (list_name, Tag::List(element, items)) = &fields[0] else {
                panic!("servers is not a list")
            };
            prop_assert_eq!(list_name, "servers");
            prop_assert_eq!(*element, TAG_COMPOUND);
            prop_assert_eq!(items.len(), entries.len());

            for (item, entry) in items.iter().zip(&entries) {
                let expected = Tag::Compound(vec![
                    ("name".into(), Tag::Str(entry.name.clone())),
                    ("ip".into(), Tag::Str(entry.ip.clone())),
                    ("icon".into(), Tag::Str(String::new())),
                    ("acceptTextures".into(), Tag::Byte(0)),
                    ("hidden".into(), Tag::Byte(0)),
                ]);
                prop_assert_eq!(item, &expected);
            }
        }
    }
}
