//! Compression envelopes for tar streams: gzip (`flate2`) and LZMA (`xz2`,
//! "lzma alone" container).

use std::io::{Read, Write};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use kiln_schema::ArchiveFormat;
use xz2::read::XzDecoder;
use xz2::stream::{LzmaOptions, Stream};
use xz2::write::XzEncoder;

use super::ArchiveError;

const LZMA_PRESET: u32 = 6;

/// Wrap an uncompressed tar stream in the envelope for `format`.
pub fn compress(format: ArchiveFormat, tar_bytes: &[u8]) -> Result<Vec<u8>, ArchiveError> {
    match format {
        ArchiveFormat::TarGzip => {
            let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
            encoder.write_all(tar_bytes)?;
            Ok(encoder.finish()?)
        }
        ArchiveFormat::TarLzma => {
            let options = LzmaOptions::new_preset(LZMA_PRESET)?;
            let stream = Stream::new_lzma_encoder(&options)?;
            let mut encoder = XzEncoder::new_stream(Vec::new(), stream);
            encoder.write_all(tar_bytes)?;
            Ok(encoder.finish()?)
        }
        ArchiveFormat::SourceDirectory => {
            Err(ArchiveError::UnsupportedFormat(format.tag().to_string()))
        }
    }
}

/// Wrap `reader` so that reading yields the uncompressed tar stream.
pub fn decompress_reader<'a, R: Read + 'a>(
    format: ArchiveFormat,
    reader: R,
) -> Result<Box<dyn Read + 'a>, ArchiveError> {
    match format {
        ArchiveFormat::TarGzip => Ok(Box::new(GzDecoder::new(reader))),
        ArchiveFormat::TarLzma => {
            let stream = Stream::new_lzma_decoder(u64::MAX)?;
            Ok(Box::new(XzDecoder::new_stream(reader, stream)))
        }
        ArchiveFormat::SourceDirectory => {
            Err(ArchiveError::UnsupportedFormat(format.tag().to_string()))
        }
    }
}

/// Decompress a whole buffer.
pub fn decompress(format: ArchiveFormat, bytes: &[u8]) -> Result<Vec<u8>, ArchiveError> {
    let mut reader = decompress_reader(format, bytes)?;
    let mut out = Vec::new();
    reader.read_to_end(&mut out)?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn both_envelopes_restore_the_input() {
        let payload: Vec<u8> = (0..4096u32).map(|i| (i % 251) as u8).collect();
        for format in [ArchiveFormat::TarGzip, ArchiveFormat::TarLzma] {
            let packed = compress(format, &payload).unwrap();
            assert_ne!(packed, payload);
            assert_eq!(decompress(format, &packed).unwrap(), payload);
        }
    }

    #[test]
    fn envelopes_are_distinct() {
        let payload = b"tar bytes".repeat(64);
        let gz = compress(ArchiveFormat::TarGzip, &payload).unwrap();
        let lzma = compress(ArchiveFormat::TarLzma, &payload).unwrap();
        // gzip magic
        assert_eq!(&gz[..2], &[0x1f, 0x8b]);
        assert_ne!(&lzma[..2], &[0x1f, 0x8b]);
    }

    #[test]
    fn source_directory_is_not_a_byte_format() {
        assert!(matches!(
            compress(ArchiveFormat::SourceDirectory, b""),
            Err(ArchiveError::UnsupportedFormat(_))
        ));
    }
}
