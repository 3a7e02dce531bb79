use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

/// Append-only booking journal.
///
/// Record layout: `[u32 len][bincode Event][u32 crc32]`, little endian.
/// A torn or corrupt tail (crash mid-write) ends replay at the last good record.
pub struct Journal {
    writer: BufWriter<File>,
    path: PathBuf,
    /// File length covered by complete, fsynced records.
    committed_len: u64,
    /// Set while a failed commit still has to be cut back off the file.
    needs_reset: bool,
    appends_since_compact: u64,
    #[cfg(test)]
    fail_next_sync: bool,
}

/// Returns the number of bytes written.
fn write_record(out: &mut impl Write, event: &Event) -> io::Result<u64> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    out.write_all(&(payload.len() as u32).to_le_bytes())?;
    out.write_all(&payload)?;
    out.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
    Ok(payload.len() as u64 + 8)
}

/// `Ok(None)` on clean EOF or a truncated record.
fn read_exact_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<Option<()>> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(Some(())),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e),
    }
}

/// Next intact record and its size on disk.
fn read_record(reader: &mut impl Read) -> io::Result<Option<(Event, u64)>> {
    let mut word = [0u8; 4];
    if read_exact_or_eof(reader, &mut word)?.is_none() {
        return Ok(None);
    }
    let mut payload = vec![0u8; u32::from_le_bytes(word) as usize];
    if read_exact_or_eof(reader, &mut payload)?.is_none() {
        return Ok(None);
    }
    if read_exact_or_eof(reader, &mut word)?.is_none() {
        return Ok(None);
    }
    if u32::from_le_bytes(word) != crc32fast::hash(&payload) {
        return Ok(None);
    }
    let size = payload.len() as u64 + 8;
    Ok(bincode::deserialize::<Event>(&payload).ok().map(|event| (event, size)))
}

/// Intact records and the byte length they cover.
fn scan(path: &Path) -> io::Result<(Vec<Event>, u64)> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
        Err(e) => return Err(e),
    };
    let mut reader = BufReader::new(file);
    let mut events = Vec::new();
    let mut intact = 0;
    while let Some((event, size)) = read_record(&mut reader)? {
        events.push(event);
        intact += size;
    }
    Ok((events, intact))
}

impl Journal {
    /// Replay the journal at `path` and open it for appends. A torn tail is
    /// cut off first: records written behind it would never be replayed.
    pub fn recover(path: &Path) -> io::Result<(Vec<Event>, Self)> {
        let (events, intact) = scan(path)?;
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        if file.metadata()?.len() > intact {
            tracing::warn!(
                "journal {} has a torn tail, truncating to {} bytes",
                path.display(),
                intact
            );
            file.set_len(intact)?;
            file.sync_all()?;
        }
        let journal = Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            committed_len: intact,
            needs_reset: false,
            appends_since_compact: 0,
            #[cfg(test)]
            fail_next_sync: false,
        };
        Ok((events, journal))
    }

    #[cfg(test)]
    pub fn open(path: &Path) -> io::Result<Self> {
        Ok(Self::recover(path)?.1)
    }

    /// Write and fsync `events` as one unit. On failure the file is cut back
    /// to the previous commit and the buffer is discarded, so none of the
    /// batch can reach disk behind a later commit.
    pub fn commit<'a>(&mut self, events: impl IntoIterator<Item = &'a Event>) -> io::Result<()> {
        if self.needs_reset {
            self.reset()?;
        }
        match self.write_and_sync(events) {
            Ok((records, bytes)) => {
                self.committed_len += bytes;
                self.appends_since_compact += records;
                Ok(())
            }
            Err(e) => {
                if let Err(reset) = self.reset() {
                    tracing::error!("journal rollback failed: {}", reset);
                }
                Err(e)
            }
        }
    }

    fn write_and_sync<'a>(
        &mut self,
        events: impl IntoIterator<Item = &'a Event>,
    ) -> io::Result<(u64, u64)> {
        let (mut records, mut bytes) = (0, 0);
        for event in events {
            bytes += write_record(&mut self.writer, event)?;
            records += 1;
        }
        self.writer.flush()?;
        #[cfg(test)]
        if std::mem::take(&mut self.fail_next_sync) {
            return Err(io::Error::other("injected fsync failure"));
        }
        self.writer.get_ref().sync_all()?;
        Ok((records, bytes))
    }

    /// Swap in a fresh writer without flushing the old buffer, then truncate
    /// the file to the last commit.
    fn reset(&mut self) -> io::Result<()> {
        self.needs_reset = true;
        let file = OpenOptions::new().append(true).open(&self.path)?;
        let (_, _discarded) = std::mem::replace(&mut self.writer, BufWriter::new(file)).into_parts();
        let file = self.writer.get_ref();
        file.set_len(self.committed_len)?;
        file.sync_all()?;
        self.needs_reset = false;
        Ok(())
    }

    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.commit(std::iter::once(event))
    }

    #[cfg(test)]
    pub fn fail_next_sync(&mut self) {
        self.fail_next_sync = true;
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    fn snapshot_path(path: &Path) -> PathBuf {
        path.with_extension("journal.tmp")
    }

    /// Write a full snapshot next to the journal and fsync it.
    pub fn write_snapshot(path: &Path, events: &[Event]) -> io::Result<()> {
        let mut out = BufWriter::new(File::create(Self::snapshot_path(path))?);
        for event in events {
            write_record(&mut out, event)?;
        }
        out.flush()?;
        out.get_ref().sync_all()
    }

    /// Rename the snapshot over the journal and reopen for appends.
    pub fn install_snapshot(&mut self) -> io::Result<()> {
        fs::rename(Self::snapshot_path(&self.path), &self.path)?;
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.committed_len = file.metadata()?.len();
        let (_, _discarded) = std::mem::replace(&mut self.writer, BufWriter::new(file)).into_parts();
        self.needs_reset = false;
        self.appends_since_compact = 0;
        Ok(())
    }

    /// Every intact record, oldest first. A missing file is an empty journal.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        scan(path).map(|(events, _)| events)
    }
}
