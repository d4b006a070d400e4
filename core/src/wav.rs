use crate::error::Result;
use crate::{SAMPLE_RATE, WAV_FILE_NAME};
use hound::{SampleFormat, WavReader, WavSpec, WavWriter};
use std::fs::File;
use std::io::{BufWriter, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

/// 16-bit mono PCM at the synthesis rate
pub fn wav_spec() -> WavSpec {
    WavSpec {
        channels: 1,
        sample_rate: SAMPLE_RATE,
        bits_per_sample: 16,
        sample_format: SampleFormat::Int,
    }
}

/// Write `samples` as a canonical 44-byte-header PCM WAV stream
pub fn write_wav<W: Write + Seek>(sink: W, samples: &[i16]) -> Result<()> {
    let mut writer = WavWriter::new(sink, wav_spec())?;
    for &sample in samples {
        writer.write_sample(sample)?;
    }
    writer.finalize()?;
    Ok(())
}

/// Render `samples` as WAV file bytes
pub fn encode_wav(samples: &[i16]) -> Result<Vec<u8>> {
    let mut cursor = Cursor::new(Vec::new());
    write_wav(&mut cursor, samples)?;
    Ok(cursor.into_inner())
}

/// Parse a WAV stream back into its spec and 16-bit samples
pub fn read_wav<R: Read>(reader: R) -> Result<(WavSpec, Vec<i16>)> {
    let mut reader = WavReader::new(reader)?;
    let spec = reader.spec();
    let samples = reader
        .samples::<i16>()
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok((spec, samples))
}

/// Destination for rendered transmissions
pub trait WavStore: Send + Sync {
    /// Persist `samples` and return where they were written
    fn save(&self, samples: &[i16]) -> Result<PathBuf>;
}

/// Writes `RTTY.wav` (or a chosen name) into a directory, replacing any
/// previous recording there.
#[derive(Debug, Clone)]
pub struct DirectoryStore {
    dir: PathBuf,
    file_name: String,
}

impl DirectoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            file_name: WAV_FILE_NAME.to_string(),
        }
    }

    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = file_name.into();
        self
    }

    pub fn path(&self) -> PathBuf {
        self.dir.join(&self.file_name)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

impl WavStore for DirectoryStore {
    fn save(&self, samples: &[i16]) -> Result<PathBuf> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path();
        let file = BufWriter::new(File::create(&path)?);
        write_wav(file, samples)?;
        log::info!("wrote {} samples to {}", samples.len(), path.display());
        Ok(std::fs::canonicalize(&path).unwrap_or(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::RttyError;

    fn u16_at(bytes: &[u8], offset: usize) -> u16 {
        u16::from_le_bytes([bytes[offset], bytes[offset + 1]])
    }

    fn u32_at(bytes: &[u8], offset: usize) -> u32 {
        u32::from_le_bytes([
            bytes[offset],
            bytes[offset + 1],
            bytes[offset + 2],
            bytes[offset + 3],
        ])
    }

    #[test]
    fn test_header_layout() {
        let samples = [0i16, 1, -1, i16::MAX, i16::MIN];
        let bytes = encode_wav(&samples).unwrap();
        let data_len = samples.len() * 2;

        assert_eq!(bytes.len(), 44 + data_len);
        assert_eq!(&bytes[0..4], b"RIFF");
        assert_eq!(u32_at(&bytes, 4), (data_len + 36) as u32);
        assert_eq!(&bytes[8..12], b"WAVE");
        assert_eq!(&bytes[12..16], b"fmt ");
        assert_eq!(u32_at(&bytes, 16), 16);
        assert_eq!(u16_at(&bytes, 20), 1); // PCM
        assert_eq!(u16_at(&bytes, 22), 1); // mono
        assert_eq!(u32_at(&bytes, 24), 44100);
        assert_eq!(u32_at(&bytes, 28), 88200);
        assert_eq!(u16_at(&bytes, 32), 2);
        assert_eq!(u16_at(&bytes, 34), 16);
        assert_eq!(&bytes[36..40], b"data");
        assert_eq!(u32_at(&bytes, 40), data_len as u32);
    }

    #[test]
    fn test_samples_little_endian() {
        let bytes = encode_wav(&[0x1234, -2]).unwrap();
        assert_eq!(&bytes[44..], &[0x34, 0x12, 0xFE, 0xFF]);
    }

    #[test]
    fn test_read_back() {
        let samples: Vec<i16> = (0..1000).map(|i| ((i * 37) % 2000 - 1000) as i16).collect();
        let bytes = encode_wav(&samples).unwrap();
        let (spec, decoded) = read_wav(Cursor::new(bytes)).unwrap();

        assert_eq!(spec, wav_spec());
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_read_rejects_garbage() {
        let result = read_wav(Cursor::new(b"not a wav file".to_vec()));
        assert!(matches!(result, Err(RttyError::PersistenceFailure(_))));
    }

    #[test]
    fn test_directory_store_creates_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let store = DirectoryStore::new(tmp.path().join("nested").join("out"));
        let path = store.save(&[1, 2, 3]).unwrap();

        assert!(path.ends_with("RTTY.wav"));
        let (_, samples) = read_wav(File::open(&path).unwrap()).unwrap();
        assert_eq!(samples, vec![1, 2, 3]);
    }

    #[test]
    fn test_directory_store_reports_io_failure() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();

        // A regular file where the directory should be
        let store = DirectoryStore::new(&blocker);
        assert!(matches!(
            store.save(&[0]),
            Err(RttyError::PersistenceFailure(_))
        ));
    }
}
