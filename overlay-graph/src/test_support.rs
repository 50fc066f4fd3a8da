//! Archive fixtures shared by the extractor and builder tests.

use std::fs::File;
use std::io;
use std::path::Path;

use flate2::Compression;
use flate2::write::GzEncoder;
use tar::{EntryType, Header};

pub(crate) enum TestEntry<'a> {
    Dir(&'a str),
    File(&'a str, &'a str),
    /// Regular file whose name bypasses the builder's path validation.
    RawFile(&'a str, &'a str),
    Symlink(&'a str, &'a str),
    /// `git archive`-style typed global header record.
    GlobalHeader(&'a str),
}

pub(crate) fn write_tar_gz(path: &Path, entries: &[TestEntry<'_>]) {
    let file = File::create(path).unwrap();
    let mut builder = tar::Builder::new(GzEncoder::new(file, Compression::default()));

    for entry in entries {
        let mut header = Header::new_gnu();
        match entry {
            TestEntry::Dir(name) => {
                header.set_entry_type(EntryType::Directory);
                header.set_mode(0o755);
                header.set_size(0);
                builder.append_data(&mut header, name, io::empty()).unwrap();
            }
            TestEntry::File(name, body) => {
                header.set_entry_type(EntryType::Regular);
                header.set_mode(0o644);
                header.set_size(body.len() as u64);
                builder
                    .append_data(&mut header, name, body.as_bytes())
                    .unwrap();
            }
            TestEntry::RawFile(name, body) => {
                raw_header(&mut header, name, EntryType::Regular, body.len());
                builder.append(&header, body.as_bytes()).unwrap();
            }
            TestEntry::Symlink(name, target) => {
                set_raw(&mut header.as_old_mut().linkname, target);
                raw_header(&mut header, name, EntryType::Symlink, 0);
                builder.append(&header, io::empty()).unwrap();
            }
            TestEntry::GlobalHeader(body) => {
                raw_header(&mut header, "pax_global_header", EntryType::XGlobalHeader, body.len());
                builder.append(&header, body.as_bytes()).unwrap();
            }
        }
    }

    builder.into_inner().unwrap().finish().unwrap();
}

fn raw_header(header: &mut Header, name: &str, kind: EntryType, size: usize) {
    set_raw(&mut header.as_old_mut().name, name);
    header.set_entry_type(kind);
    header.set_mode(0o644);
    header.set_size(size as u64);
    header.set_cksum();
}

fn set_raw(field: &mut [u8], value: &str) {
    field.fill(0);
    field[..value.len()].copy_from_slice(value.as_bytes());
}
