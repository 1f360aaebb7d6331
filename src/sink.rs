//! Where chunk entries go.
//!
//! [`EntrySink`] is the boundary to the archive encoder. The crate ships an
//! implementation for [`tar::Builder`], which writes GNU headers (with long
//! name records where needed) and pads each body to the tar block size.
//! Owner names too long for the fixed header fields travel as PAX `uname` /
//! `gname` records, next to any extended attributes.

use std::io::{self, Read, Write};

use chrono::{DateTime, Utc};

use crate::header::ChunkHeader;

/// A consumer of `(header, body)` pairs.
pub trait EntrySink {
    /// Writes `header` and then the body read from `body`.
    ///
    /// Returns how many body bytes were written. Anything other than
    /// `header.size` is a short write.
    fn append_entry(&mut self, header: &ChunkHeader, body: &mut dyn Read) -> io::Result<u64>;

    /// Writes the archive trailer and flushes the underlying writer.
    fn finish(&mut self) -> io::Result<()>;
}

impl<W: Write> EntrySink for tar::Builder<W> {
    fn append_entry(&mut self, header: &ChunkHeader, body: &mut dyn Read) -> io::Result<u64> {
        let records = pax_records(header);
        if !records.is_empty() {
            self.append_pax_extensions(records.iter().map(|(key, value)| (key.as_str(), *value)))?;
        }

        let mut tar_header = to_tar_header(header)?;
        let mut counted = CountingReader::new(Read::take(body, header.size));
        self.append_data(&mut tar_header, &header.name, &mut counted)?;
        Ok(counted.count)
    }

    fn finish(&mut self) -> io::Result<()> {
        tar::Builder::finish(self)?;
        self.get_mut().flush()
    }
}

/// Translates a chunk header into a GNU tar header (everything but the path).
pub fn to_tar_header(header: &ChunkHeader) -> io::Result<tar::Header> {
    let mut out = tar::Header::new_gnu();
    out.set_entry_type(header.kind);
    out.set_size(header.size);
    out.set_mode(header.mode);
    out.set_uid(header.owner.uid);
    out.set_gid(header.owner.gid);
    out.set_username(fit_name(&header.owner.user_name))?;
    out.set_groupname(fit_name(&header.owner.group_name))?;
    out.set_mtime(unix_seconds(header.modified));
    if let Some(gnu) = out.as_gnu_mut() {
        gnu.set_atime(unix_seconds(header.accessed));
        gnu.set_ctime(unix_seconds(header.created));
    }
    out.set_device_major(header.device_major)?;
    out.set_device_minor(header.device_minor)?;
    Ok(out)
}

/// Size of the GNU/ustar `uname` and `gname` fields.
const OWNER_NAME_LEN: usize = 32;

/// Extended records for whatever the fixed header cannot hold.
fn pax_records(header: &ChunkHeader) -> Vec<(String, &[u8])> {
    let mut records = Vec::new();
    let owner = &header.owner;
    if owner.user_name.len() > OWNER_NAME_LEN {
        records.push(("uname".to_string(), owner.user_name.as_bytes()));
    }
    if owner.group_name.len() > OWNER_NAME_LEN {
        records.push(("gname".to_string(), owner.group_name.as_bytes()));
    }
    for (name, value) in &header.xattrs {
        records.push((format!("SCHILY.xattr.{name}"), value.as_slice()));
    }
    records
}

/// Longest prefix of `name` that fits an owner field without splitting a character.
fn fit_name(name: &str) -> &str {
    if name.len() <= OWNER_NAME_LEN {
        return name;
    }
    let mut end = OWNER_NAME_LEN;
    while !name.is_char_boundary(end) {
        end -= 1;
    }
    &name[..end]
}

/// Tar has no representation for instants before the epoch.
fn unix_seconds(at: DateTime<Utc>) -> u64 {
    u64::try_from(at.timestamp()).unwrap_or(0)
}

struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R> CountingReader<R> {
    fn new(inner: R) -> Self {
        CountingReader { inner, count: 0 }
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::header::Identity;
    use chrono::TimeZone;

    fn header(name: &str, size: u64) -> ChunkHeader {
        let owner = Identity { uid: 1234, gid: 567, user_name: "chunker".into(), group_name: "staff".into() };
        let at = Utc.with_ymd_and_hms(2023, 11, 2, 12, 0, 0).unwrap();
        let mut header = ChunkHeader::template(owner, at);
        header.prepare(name.to_string(), size);
        header
    }

    fn archive_with(entries: &[(ChunkHeader, &[u8])]) -> Vec<u8> {
        let mut builder = tar::Builder::new(Vec::new());
        for (header, mut body) in entries.iter().cloned() {
            let written = builder.append_entry(&header, &mut body).unwrap();
            assert_eq!(written, header.size);
        }
        EntrySink::finish(&mut builder).unwrap();
        builder.into_inner().unwrap()
    }

    #[test]
    fn writes_gnu_header_fields() {
        let chunk = header("00000000", 5);
        let bytes = archive_with(&[(chunk.clone(), b"hello")]);

        let mut archive = tar::Archive::new(&bytes[..]);
        let mut entries = archive.entries().unwrap();
        let mut entry = entries.next().unwrap().unwrap();

        let h = entry.header();
        assert_eq!(h.entry_type(), tar::EntryType::Regular);
        assert_eq!(h.path().unwrap().to_str(), Some("00000000"));
        assert_eq!(h.size().unwrap(), 5);
        assert_eq!(h.mode().unwrap(), 0o444);
        assert_eq!(h.uid().unwrap(), 1234);
        assert_eq!(h.gid().unwrap(), 567);
        assert_eq!(h.username().unwrap(), Some("chunker"));
        assert_eq!(h.groupname().unwrap(), Some("staff"));
        let stamp = chunk.modified.timestamp() as u64;
        assert_eq!(h.mtime().unwrap(), stamp);
        let gnu = h.as_gnu().unwrap();
        assert_eq!(gnu.atime().unwrap(), stamp);
        assert_eq!(gnu.ctime().unwrap(), stamp);

        let mut body = Vec::new();
        entry.read_to_end(&mut body).unwrap();
        assert_eq!(body, b"hello");
        drop(entry);
        assert!(entries.next().is_none());
    }

    #[test]
    fn long_names_survive() {
        let name = format!("{}.{:02}", "x".repeat(140), 3);
        let bytes = archive_with(&[(header(&name, 3), b"abc")]);

        let mut archive = tar::Archive::new(&bytes[..]);
        let entry = archive.entries().unwrap().next().unwrap().unwrap();
        assert_eq!(entry.path().unwrap().to_str(), Some(name.as_str()));
    }

    #[test]
    fn xattrs_become_pax_records() {
        let mut chunk = header("00000000", 2);
        chunk.xattrs.push(("user.origin".into(), b"backup-7".to_vec()));
        let bytes = archive_with(&[(chunk, b"ok")]);

        let mut archive = tar::Archive::new(&bytes[..]);
        let mut entry = archive.entries().unwrap().next().unwrap().unwrap();
        let records: Vec<(String, Vec<u8>)> = entry
            .pax_extensions()
            .unwrap()
            .unwrap()
            .map(|ext| {
                let ext = ext.unwrap();
                (ext.key().unwrap().to_string(), ext.value_bytes().to_vec())
            })
            .collect();
        assert_eq!(records, vec![("SCHILY.xattr.user.origin".to_string(), b"backup-7".to_vec())]);
    }

    fn pax_records_of(bytes: &[u8]) -> Vec<(String, Vec<u8>)> {
        let mut archive = tar::Archive::new(bytes);
        let mut entry = archive.entries().unwrap().next().unwrap().unwrap();
        entry
            .pax_extensions()
            .unwrap()
            .map(|exts| {
                exts.map(|ext| {
                    let ext = ext.unwrap();
                    (ext.key().unwrap().to_string(), ext.value_bytes().to_vec())
                })
                .collect()
            })
            .unwrap_or_default()
    }

    #[test]
    fn long_owner_names_become_pax_records() {
        let user = "svc-".to_string() + &"u".repeat(36);
        let group = "domain users@corp.example.com".to_string();
        let mut chunk = header("00000000", 3);
        chunk.owner.user_name = user.clone();
        chunk.owner.group_name = group.clone();
        let bytes = archive_with(&[(chunk, b"abc")]);

        assert_eq!(pax_records_of(&bytes), vec![("uname".to_string(), user.clone().into_bytes())]);

        let mut archive = tar::Archive::new(&bytes[..]);
        let mut entry = archive.entries().unwrap().next().unwrap().unwrap();
        assert_eq!(entry.header().username().unwrap(), Some(&user[..32]));
        assert_eq!(entry.header().groupname().unwrap(), Some(group.as_str()));
        let mut body = Vec::new();
        entry.read_to_end(&mut body).unwrap();
        assert_eq!(body, b"abc");
    }

    #[test]
    fn owner_name_is_cut_on_a_char_boundary() {
        let name = format!("{}é", "a".repeat(31));
        assert_eq!(name.len(), 33);
        assert_eq!(fit_name(&name), "a".repeat(31));
        assert_eq!(fit_name("staff"), "staff");
    }

    #[test]
    fn short_owner_names_add_no_records() {
        let bytes = archive_with(&[(header("00000000", 2), b"ok")]);
        assert!(pax_records_of(&bytes).is_empty());
    }

    #[test]
    fn short_body_is_reported() {
        let mut builder = tar::Builder::new(Vec::new());
        let mut body: &[u8] = b"abc";
        let written = builder.append_entry(&header("00000000", 8), &mut body).unwrap();
        assert_eq!(written, 3);
    }

    #[test]
    fn body_is_capped_at_header_size() {
        let mut builder = tar::Builder::new(Vec::new());
        let mut body: &[u8] = b"abcdefgh";
        let written = builder.append_entry(&header("00000000", 4), &mut body).unwrap();
        assert_eq!(written, 4);
    }
}
