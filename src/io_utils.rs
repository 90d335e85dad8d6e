//! I/O helpers shared by the sheet reader, configuration and output writer.
//!
//! - **Encoding**: labels resolve through `encoding_rs` (utf-8 by default, so
//!   Big5 exports work with `input_encoding: big5`).
//! - **Sheet reading**: exported sheets are headerless and ragged, so readers
//!   are built `flexible` with no header row.
//! - **JSON**: pretty-printed writes that create parent directories first.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Read, Write},
    path::Path,
};

use anyhow::{Context, Result, anyhow};
use encoding_rs::{Encoding, UTF_8};
use serde::Serialize;

pub const DEFAULT_SHEET_DELIMITER: u8 = b',';
pub const DEFAULT_TSV_DELIMITER: u8 = b'\t';

pub fn resolve_encoding(label: Option<&str>) -> Result<&'static Encoding> {
    if let Some(value) = label {
        Encoding::for_label(value.trim().as_bytes())
            .ok_or_else(|| anyhow!("Unknown encoding '{value}'"))
    } else {
        Ok(UTF_8)
    }
}

pub fn resolve_sheet_delimiter(path: &Path, provided: Option<u8>) -> u8 {
    provided.unwrap_or_else(|| match path.extension().and_then(|ext| ext.to_str()) {
        Some(ext) if ext.eq_ignore_ascii_case("tsv") => DEFAULT_TSV_DELIMITER,
        _ => DEFAULT_SHEET_DELIMITER,
    })
}

pub fn open_sheet_reader<R>(reader: R, delimiter: u8) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder
        .has_headers(false)
        .delimiter(delimiter)
        .double_quote(true)
        .flexible(true);
    builder.from_reader(reader)
}

pub fn open_sheet_reader_from_path(
    path: &Path,
    delimiter: u8,
) -> std::io::Result<csv::Reader<BufReader<File>>> {
    let file = File::open(path)?;
    Ok(open_sheet_reader(BufReader::new(file), delimiter))
}

/// Decodes `bytes`, returning `None` when the input is not valid in `encoding`.
pub fn decode_bytes(bytes: &[u8], encoding: &'static Encoding) -> Option<String> {
    let (text, _, had_errors) = encoding.decode(bytes);
    if had_errors {
        None
    } else {
        Some(text.into_owned())
    }
}

pub fn decode_record(record: &csv::ByteRecord, encoding: &'static Encoding) -> Option<Vec<String>> {
    record
        .iter()
        .map(|field| decode_bytes(field, encoding))
        .collect()
}

pub fn write_json<T>(path: &Path, value: &T) -> Result<()>
where
    T: Serialize + ?Sized,
{
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).with_context(|| format!("Creating directory {parent:?}"))?;
    }
    let file = File::create(path).with_context(|| format!("Creating output file {path:?}"))?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, value)
        .with_context(|| format!("Writing JSON to {path:?}"))?;
    writer
        .flush()
        .with_context(|| format!("Flushing {path:?}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn resolve_encoding_defaults_to_utf8() {
        assert_eq!(resolve_encoding(None).unwrap(), UTF_8);
        assert_eq!(resolve_encoding(Some(" big5 ")).unwrap().name(), "Big5");
        assert!(resolve_encoding(Some("klingon")).is_err());
    }

    #[test]
    fn sheet_delimiter_follows_extension() {
        assert_eq!(
            resolve_sheet_delimiter(&PathBuf::from("05-api.tsv"), None),
            b'\t'
        );
        assert_eq!(
            resolve_sheet_delimiter(&PathBuf::from("05-api.csv"), None),
            b','
        );
        assert_eq!(
            resolve_sheet_delimiter(&PathBuf::from("05-api.tsv"), Some(b';')),
            b';'
        );
    }

    #[test]
    fn decode_big5_bytes() {
        let big5 = Encoding::for_label(b"big5").unwrap();
        let (encoded, _, _) = big5.encode("欄位");
        assert_eq!(decode_bytes(&encoded, big5).as_deref(), Some("欄位"));
        assert_eq!(decode_bytes(&[0xc3, 0x28], UTF_8), None);
    }
}
