// webpnorm/src/processors/sniffer.rs
use crate::core::{Result, SniffedFormat, SourceDescriptor};
use image::ImageFormat;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;

/// Bytes inspected from the head of a file.
pub const SNIFF_LEN: usize = 512;

/// Classify by magic bytes only; the file name plays no part. Formats the
/// pipeline does not accept come back as `Unknown`.
pub fn sniff_bytes(head: &[u8]) -> SniffedFormat {
    let head = &head[..head.len().min(SNIFF_LEN)];

    match image::guess_format(head) {
        Ok(ImageFormat::Jpeg) => SniffedFormat::Jpeg,
        Ok(ImageFormat::Png) => SniffedFormat::Png,
        Ok(ImageFormat::Gif) => SniffedFormat::Gif,
        Ok(ImageFormat::WebP) => SniffedFormat::WebP,
        _ => SniffedFormat::Unknown,
    }
}

/// Sniff a seekable stream and leave it rewound to the start.
pub fn sniff_reader<R: Read + Seek>(reader: &mut R) -> std::io::Result<SniffedFormat> {
    reader.seek(SeekFrom::Start(0))?;

    let mut head = Vec::with_capacity(SNIFF_LEN);
    reader.by_ref().take(SNIFF_LEN as u64).read_to_end(&mut head)?;
    reader.seek(SeekFrom::Start(0))?;

    Ok(sniff_bytes(&head))
}

/// Never fails: unreadable files are reported as `Unknown`.
pub fn sniff_path(path: &Path) -> SniffedFormat {
    let format = File::open(path).and_then(|mut file| sniff_reader(&mut file));

    match format {
        Ok(format) => {
            log::debug!("Sniffed {} as {}", path.display(), format);
            format
        }
        Err(e) => {
            log::debug!("Could not sniff {}: {}", path.display(), e);
            SniffedFormat::Unknown
        }
    }
}

impl SourceDescriptor {
    pub fn inspect(path: &Path) -> Result<Self> {
        let path = std::path::absolute(path)?;
        let byte_len = std::fs::metadata(&path)?.len();
        let format = sniff_path(&path);

        Ok(Self {
            path,
            format,
            byte_len,
        })
    }

    /// Lower-cased file extension, if any.
    pub fn extension(&self) -> Option<String> {
        crate::utils::get_file_extension(&self.path)
    }

    /// Either the bytes or the extension say GIF.
    pub fn looks_like_gif(&self) -> bool {
        self.format == SniffedFormat::Gif || self.extension().as_deref() == Some("gif")
    }
}
