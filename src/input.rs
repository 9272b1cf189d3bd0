use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use anyhow::{Result, bail};

/// Unified input reader that handles both file and pipe input with buffered reading
pub struct InputReader {
    reader: Box<dyn Read + Send>,
    is_pipe: bool,
    len: Option<u64>,
}

impl InputReader {
    /// Create a new InputReader from a path
    /// Use "-" for stdin pipe input
    pub fn new<P: AsRef<Path>>(input_path: P) -> Result<Self> {
        let path_str = input_path.as_ref().to_string_lossy();
        let is_pipe = path_str == "-";

        let (reader, len): (Box<dyn Read + Send>, _) = if is_pipe {
            (Box::new(io::stdin()), None)
        } else {
            let file = File::open(input_path)?;
            let len = file.metadata().ok().map(|m| m.len());
            (Box::new(BufReader::new(file)), len)
        };

        Ok(Self {
            reader,
            is_pipe,
            len,
        })
    }

    #[cfg(test)]
    pub fn from_reader<R: Read + Send + 'static>(reader: R) -> Self {
        Self {
            reader: Box::new(reader),
            is_pipe: true,
            len: None,
        }
    }

    /// Check if this is pipe input
    pub fn is_pipe(&self) -> bool {
        self.is_pipe
    }

    /// Input size in bytes, when known
    pub fn size(&self) -> Option<u64> {
        self.len
    }

    /// Fill `buffer` completely.
    /// Returns `Ok(false)` at a clean end of input; a partial trailing record is an error.
    pub fn read_record(&mut self, buffer: &mut [u8]) -> Result<bool> {
        let mut filled = 0;
        while filled < buffer.len() {
            match self.reader.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }

        if filled == 0 {
            return Ok(false);
        }
        if filled < buffer.len() {
            bail!(
                "Truncated record at end of input ({filled} of {} bytes)",
                buffer.len()
            );
        }
        Ok(true)
    }

    /// Read all remaining data for non-streaming use cases
    pub fn read_all(&mut self) -> Result<Vec<u8>> {
        let mut data = Vec::new();
        self.reader.read_to_end(&mut data)?;
        Ok(data)
    }

    /// Hand the underlying reader to a parser
    pub fn into_reader(self) -> Box<dyn Read + Send> {
        self.reader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_records() -> Result<()> {
        let mut input = InputReader::from_reader(Cursor::new((0u8..12).collect::<Vec<_>>()));
        let mut buf = [0u8; 6];

        assert!(input.read_record(&mut buf)?);
        assert_eq!(buf, [0, 1, 2, 3, 4, 5]);
        assert!(input.read_record(&mut buf)?);
        assert_eq!(buf, [6, 7, 8, 9, 10, 11]);
        assert!(!input.read_record(&mut buf)?);
        Ok(())
    }

    #[test]
    fn test_truncated_record() {
        let mut input = InputReader::from_reader(Cursor::new(vec![0u8; 8]));
        let mut buf = [0u8; 6];
        assert!(input.read_record(&mut buf).unwrap());
        assert!(input.read_record(&mut buf).is_err());
    }
}
