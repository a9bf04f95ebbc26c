use zengin_byteio::ByteReader;

use crate::error::{ArchiveError, ArchiveResult};

/// Which of the three physical encodings an archive's body uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFormat {
    Ascii,
    Binary,
    BinSafe,
}

/// The five-to-seven-line textual preamble shared by all three encodings.
/// `date`/`user` are optional and only present when the archiver emitted
/// them; `save_game` is always present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArchiveHeader {
    pub version: u32,
    pub archiver: String,
    pub format: ArchiveFormat,
    pub save_game: bool,
    pub date: Option<String>,
    pub user: Option<String>,
}

impl ArchiveHeader {
    /// Parses the preamble, leaving `reader`'s cursor at the first body byte
    /// after the terminating `END` line.
    pub fn parse(reader: &mut ByteReader) -> ArchiveResult<ArchiveHeader> {
        let magic = reader.read_line(false)?;
        if magic != "ZenGin Archive" {
            return Err(ArchiveError::NotAnArchive("missing 'ZenGin Archive' magic"));
        }

        let version_line = reader.read_line(false)?;
        let version_str = version_line
            .strip_prefix("ver ")
            .ok_or(ArchiveError::NotAnArchive("missing 'ver ' field"))?;
        let version = version_str
            .trim()
            .parse::<u32>()
            .map_err(|_| ArchiveError::MalformedHeader(format!("bad version: {version_str}")))?;

        let archiver = reader.read_line(false)?;

        let format_line = reader.read_line(false)?;
        let format = match format_line.as_str() {
            "ASCII" => ArchiveFormat::Ascii,
            "BINARY" => ArchiveFormat::Binary,
            "BIN_SAFE" => ArchiveFormat::BinSafe,
            other => return Err(ArchiveError::UnsupportedFormat(other.to_string())),
        };

        let save_line = reader.read_line(false)?;
        let save_str = save_line
            .strip_prefix("saveGame ")
            .ok_or(ArchiveError::NotAnArchive("missing 'saveGame ' field"))?;
        let save_game = save_str
            .trim()
            .parse::<u32>()
            .map_err(|_| ArchiveError::MalformedHeader(format!("bad saveGame flag: {save_str}")))?
            != 0;

        let mut line = reader.read_line(false)?;
        let mut date = None;
        if let Some(value) = line.strip_prefix("date ") {
            date = Some(value.to_string());
            line = reader.read_line(false)?;
        }

        let mut user = None;
        if let Some(value) = line.strip_prefix("user ") {
            user = Some(value.to_string());
            line = reader.read_line(false)?;
        }

        if line != "END" {
            return Err(ArchiveError::NotAnArchive("missing terminating 'END' line"));
        }

        Ok(ArchiveHeader {
            version,
            archiver,
            format,
            save_game,
            date,
            user,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_minimal_ascii_header() {
        let bytes = b"ZenGin Archive\nver 1\nphoenix\nASCII\nsaveGame 0\nEND\n".to_vec();
        let mut reader = ByteReader::new(bytes);
        let header = ArchiveHeader::parse(&mut reader).unwrap();
        assert_eq!(header.format, ArchiveFormat::Ascii);
        assert_eq!(header.version, 1);
        assert!(!header.save_game);
        assert_eq!(header.date, None);
    }

    #[test]
    fn parses_header_with_date_and_user() {
        let bytes =
            b"ZenGin Archive\nver 2\nphoenix\nBIN_SAFE\nsaveGame 1\ndate 1.1.2001\nuser Diego\nEND\n".to_vec();
        let mut reader = ByteReader::new(bytes);
        let header = ArchiveHeader::parse(&mut reader).unwrap();
        assert_eq!(header.format, ArchiveFormat::BinSafe);
        assert!(header.save_game);
        assert_eq!(header.date.as_deref(), Some("1.1.2001"));
        assert_eq!(header.user.as_deref(), Some("Diego"));
    }

    #[test]
    fn missing_magic_fails() {
        let bytes = b"not an archive\n".to_vec();
        let mut reader = ByteReader::new(bytes);
        assert!(matches!(
            ArchiveHeader::parse(&mut reader),
            Err(ArchiveError::NotAnArchive(_))
        ));
    }

    #[test]
    fn missing_end_fails() {
        let bytes = b"ZenGin Archive\nver 1\nphoenix\nASCII\nsaveGame 0\nnotend\n".to_vec();
        let mut reader = ByteReader::new(bytes);
        assert!(matches!(
            ArchiveHeader::parse(&mut reader),
            Err(ArchiveError::NotAnArchive(_))
        ));
    }
}
