use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

/// Encode a single event to [len][bincode][crc32] format.
/// Returns the number of bytes written.
fn encode_event(writer: &mut impl Write, event: &Event) -> io::Result<u64> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = payload.len() as u32;
    let crc = crc32fast::hash(&payload);
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc.to_le_bytes())?;
    Ok(8 + u64::from(len))
}

/// Events recovered from disk plus the byte length of the intact prefix.
#[derive(Debug, Default)]
pub struct Replay {
    pub events: Vec<Event>,
    pub valid_len: u64,
}

/// Append-only booking log.
///
/// Format per entry: `[u32: len][bincode: Event][u32: crc32]`
/// - `len` is the byte length of the bincode payload (not including the CRC).
/// - A torn or corrupt tail is dropped on replay and cut off on open, so new
///   appends never land behind unreadable bytes.
/// - A batch that fails to reach disk is discarded from the buffer and cut
///   from the file, so it can never surface in a later flush or on replay.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_compact: u64,
    /// File length through the last successful `flush_sync`.
    committed_len: u64,
    pending_len: u64,
    pending_appends: u64,
    /// Set when a failed batch could not be rolled back; every later write fails.
    poisoned: bool,
}

impl Wal {
    /// Open (or create) the log at `path`, truncating anything past the last intact entry.
    pub fn open(path: &Path) -> io::Result<Self> {
        let valid_len = Self::replay(path)?.valid_len;
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(path)?;
        if file.metadata()?.len() > valid_len {
            tracing::warn!(
                "truncating {} to {valid_len} bytes: trailing entry is incomplete",
                path.display()
            );
            file.set_len(valid_len)?;
            file.sync_all()?;
        }
        drop(file);

        let file = OpenOptions::new().append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appends_since_compact: 0,
            committed_len: valid_len,
            pending_len: 0,
            pending_appends: 0,
            poisoned: false,
        })
    }

    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    /// Buffer an event without flushing. `flush_sync()` commits the batch.
    /// On error the whole uncommitted batch is discarded.
    pub fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        self.check_poisoned()?;
        match encode_event(&mut self.writer, event) {
            Ok(written) => {
                self.pending_len += written;
                self.pending_appends += 1;
                self.appends_since_compact += 1;
                Ok(())
            }
            Err(e) => {
                self.discard_pending();
                Err(e)
            }
        }
    }

    /// Flush the BufWriter and fsync the underlying file. On error the
    /// uncommitted batch is discarded.
    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.check_poisoned()?;
        let result = self
            .writer
            .flush()
            .and_then(|()| self.writer.get_ref().sync_all());
        match result {
            Ok(()) => {
                self.committed_len += self.pending_len;
                self.pending_len = 0;
                self.pending_appends = 0;
                Ok(())
            }
            Err(e) => {
                self.discard_pending();
                Err(e)
            }
        }
    }

    fn check_poisoned(&self) -> io::Result<()> {
        if self.poisoned {
            return Err(io::Error::other("log is unusable after a failed rollback"));
        }
        Ok(())
    }

    /// Drop buffered bytes (without the flush `BufWriter` does on drop) and
    /// cut anything past the last commit from the file.
    fn discard_pending(&mut self) {
        self.appends_since_compact = self.appends_since_compact.saturating_sub(self.pending_appends);
        self.pending_len = 0;
        self.pending_appends = 0;
        if let Err(e) = self.rollback() {
            tracing::error!(
                "could not roll {} back to {} bytes: {e}",
                self.path.display(),
                self.committed_len
            );
            self.poisoned = true;
        }
    }

    fn rollback(&mut self) -> io::Result<()> {
        let file = self.writer.get_ref().try_clone()?;
        let stale = std::mem::replace(&mut self.writer, BufWriter::new(file));
        let (_file, _unwritten) = stale.into_parts();
        let file = self.writer.get_ref();
        file.set_len(self.committed_len)?;
        file.sync_all()
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Write compacted events to a temp file and fsync.
    pub fn write_compact_file(path: &Path, events: &[Event]) -> io::Result<()> {
        let tmp_path = path.with_extension("wal.tmp");
        let file = File::create(&tmp_path)?;
        let mut writer = BufWriter::new(file);
        for event in events {
            encode_event(&mut writer, event)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
        Ok(())
    }

    /// Rename the temp file over the log and reopen it for appends.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        let tmp_path = self.path.with_extension("wal.tmp");
        fs::rename(&tmp_path, &self.path)?;
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        self.committed_len = file.metadata()?.len();
        self.writer = BufWriter::new(file);
        self.appends_since_compact = 0;
        self.pending_len = 0;
        self.pending_appends = 0;
        self.poisoned = false;
        Ok(())
    }

    #[cfg(test)]
    pub fn compact(&mut self, events: &[Event]) -> io::Result<()> {
        Self::write_compact_file(&self.path, events)?;
        self.swap_compact_file()
    }

    /// Flush, then copy the log to `dest`. Returns the bytes copied.
    /// The caller must not interleave appends (the writer task owns the log).
    pub fn snapshot_to(&mut self, dest: &Path) -> io::Result<u64> {
        self.flush_sync()?;
        let tmp = dest.with_extension("partial");
        let copied = fs::copy(&self.path, &tmp)?;
        File::open(&tmp)?.sync_all()?;
        fs::rename(&tmp, dest)?;
        Ok(copied)
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Read every intact event. A missing file is an empty log.
    pub fn replay(path: &Path) -> io::Result<Replay> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Replay::default()),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);
        let mut replay = Replay::default();

        loop {
            let mut len_buf = [0u8; 4];
            match reader.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }
            let len = u32::from_le_bytes(len_buf) as usize;

            let mut payload = vec![0u8; len];
            match reader.read_exact(&mut payload) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }

            let mut crc_buf = [0u8; 4];
            match reader.read_exact(&mut crc_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e),
            }
            if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
                break;
            }

            match bincode::deserialize::<Event>(&payload) {
                Ok(event) => replay.events.push(event),
                Err(_) => break,
            }
            replay.valid_len += 8 + len as u64;
        }

        Ok(replay)
    }
}
