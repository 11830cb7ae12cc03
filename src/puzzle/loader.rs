//! Streaming loader for puzzle CSV dumps.
//!
//! The file is read through a byte counter, an optional decompressor and the
//! CSV parser, so only a chunk of rows and the decoder buffers are held in
//! memory at any time besides the rows already parsed. Progress is the share
//! of the (compressed) file consumed so far.

use std::{
    fs::File,
    io::{BufRead, BufReader, Read},
    path::Path,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use derivative::Derivative;
use log::{debug, info};
use serde::{Deserialize, Serialize};

use super::{Dataset, PuzzleRecord};
use crate::{
    error::{Error, Result},
    progress::{Progress, ProgressSink},
};

/// Rows parsed between two progress updates.
pub const DEFAULT_CHUNK_SIZE: usize = 10_000;

const ID_COLUMN: &str = "PuzzleId";
const FEN_COLUMN: &str = "FEN";
const MOVES_COLUMN: &str = "Moves";
const THEMES_COLUMN: &str = "Themes";

const ZSTD_MAGIC: &[u8] = &[0x28, 0xb5, 0x2f, 0xfd];
const BZIP2_MAGIC: &[u8] = b"BZh";
const GZIP_MAGIC: &[u8] = &[0x1f, 0x8b];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    /// Pick from the file extension, then from the leading magic bytes.
    #[default]
    Auto,
    None,
    Zstd,
    Bzip2,
    Gzip,
}

impl Compression {
    fn from_extension(path: &Path) -> Option<Self> {
        match path.extension()?.to_str()?.to_ascii_lowercase().as_str() {
            "zst" | "zstd" => Some(Compression::Zstd),
            "bz2" => Some(Compression::Bzip2),
            "gz" => Some(Compression::Gzip),
            _ => None,
        }
    }

    fn from_magic(head: &[u8]) -> Self {
        if head.starts_with(ZSTD_MAGIC) {
            Compression::Zstd
        } else if head.starts_with(BZIP2_MAGIC) {
            Compression::Bzip2
        } else if head.starts_with(GZIP_MAGIC) {
            Compression::Gzip
        } else {
            Compression::None
        }
    }
}

#[derive(Debug, Clone, Derivative, Serialize, Deserialize)]
#[derivative(Default)]
#[serde(default)]
pub struct LoaderOptions {
    #[derivative(Default(value = "DEFAULT_CHUNK_SIZE"))]
    pub chunk_size: usize,
    pub compression: Compression,
}

/// Load a puzzle dump with default options.
pub fn load(path: impl AsRef<Path>, on_progress: &mut dyn ProgressSink) -> Result<Dataset> {
    load_with_options(path, &LoaderOptions::default(), on_progress)
}

pub fn load_with_options(
    path: impl AsRef<Path>,
    options: &LoaderOptions,
    on_progress: &mut dyn ProgressSink,
) -> Result<Dataset> {
    let path = path.as_ref();
    let mut progress = Progress::new("load_dataset", on_progress);

    let metadata = match std::fs::metadata(path) {
        Ok(metadata) if metadata.is_file() => metadata,
        _ => return Err(Error::FileNotFound(path.to_path_buf())),
    };
    let total = metadata.len();
    info!("Loading puzzles from {} ({} bytes)", path.display(), total);

    let consumed = Arc::new(AtomicU64::new(0));
    let file = CountingReader {
        inner: File::open(path)?,
        count: consumed.clone(),
    };
    let mut buffered = BufReader::new(file);

    let compression = match options.compression {
        Compression::Auto => match Compression::from_extension(path) {
            Some(compression) => compression,
            None => Compression::from_magic(buffered.fill_buf()?),
        },
        explicit => explicit,
    };
    debug!("Reading {} as {:?}", path.display(), compression);

    let input: Box<dyn Read> = match compression {
        Compression::Zstd => Box::new(
            zstd::stream::read::Decoder::with_buffer(buffered)
                .map_err(|e| Error::Decode(e.to_string()))?,
        ),
        Compression::Bzip2 => Box::new(bzip2::read::MultiBzDecoder::new(buffered)),
        Compression::Gzip => Box::new(flate2::read::MultiGzDecoder::new(buffered)),
        Compression::None | Compression::Auto => Box::new(buffered),
    };
    let compressed = !matches!(compression, Compression::None | Compression::Auto);

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(input);

    let columns = Columns::from_headers(
        reader
            .headers()
            .map_err(|e| csv_error(e, compressed))?,
    )?;

    let chunk_size = options.chunk_size.max(1);
    let mut chunks: Vec<Vec<PuzzleRecord>> = Vec::new();
    let mut chunk = Vec::with_capacity(chunk_size);
    let mut row = csv::StringRecord::new();

    while reader
        .read_record(&mut row)
        .map_err(|e| csv_error(e, compressed))?
    {
        let line = row.position().map(|p| p.line()).unwrap_or(0);
        chunk.push(columns.extract(&row, line)?);

        if chunk.len() == chunk_size {
            chunks.push(std::mem::replace(&mut chunk, Vec::with_capacity(chunk_size)));
            progress.update_ratio(consumed.load(Ordering::Relaxed), total);
        }
    }
    if !chunk.is_empty() {
        chunks.push(chunk);
        progress.update_ratio(consumed.load(Ordering::Relaxed), total);
    }

    let chunk_count = chunks.len();
    let dataset = Dataset::from_chunks(chunks);
    info!(
        "Loaded {} puzzles in {} chunks from {}",
        dataset.len(),
        chunk_count,
        path.display()
    );
    progress.finish();
    Ok(dataset)
}

/// Positions of the required columns in the header row.
struct Columns {
    id: usize,
    fen: usize,
    moves: usize,
    themes: usize,
}

impl Columns {
    fn from_headers(headers: &csv::StringRecord) -> Result<Self> {
        let find = |name: &str| {
            headers
                .iter()
                .position(|h| h.trim_start_matches('\u{feff}').trim() == name)
                .ok_or_else(|| Error::MalformedRow {
                    line: 1,
                    reason: format!("missing required column {}", name),
                })
        };
        Ok(Self {
            id: find(ID_COLUMN)?,
            fen: find(FEN_COLUMN)?,
            moves: find(MOVES_COLUMN)?,
            themes: find(THEMES_COLUMN)?,
        })
    }

    fn extract(&self, row: &csv::StringRecord, line: u64) -> Result<PuzzleRecord> {
        let field = |index: usize, name: &str| {
            row.get(index).ok_or_else(|| Error::MalformedRow {
                line,
                reason: format!("missing {} field", name),
            })
        };
        let moves = field(self.moves, MOVES_COLUMN)?;
        if moves.trim().is_empty() {
            return Err(Error::MalformedRow {
                line,
                reason: "empty move sequence".to_string(),
            });
        }
        Ok(PuzzleRecord {
            id: field(self.id, ID_COLUMN)?.to_string(),
            fen: field(self.fen, FEN_COLUMN)?.to_string(),
            moves: moves.to_string(),
            themes: field(self.themes, THEMES_COLUMN)?.to_string(),
        })
    }
}

fn csv_error(err: csv::Error, compressed: bool) -> Error {
    let message = err.to_string();
    match err.into_kind() {
        csv::ErrorKind::Io(e) if compressed => Error::Decode(e.to_string()),
        csv::ErrorKind::Io(e) => Error::Io(e),
        csv::ErrorKind::UnequalLengths { pos, .. } => Error::MalformedRow {
            line: pos.map(|p| p.line()).unwrap_or(0),
            reason: message,
        },
        _ => Error::Parse(message),
    }
}

/// Counts the bytes pulled from the underlying file.
struct CountingReader<R> {
    inner: R,
    count: Arc<AtomicU64>,
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count.fetch_add(n as u64, Ordering::Relaxed);
        Ok(n)
    }
}
