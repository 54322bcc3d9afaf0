//! An on-disk opening book mapping shallow, fixed-depth positions to exact scores

use byteorder::{LittleEndian, ReadBytesExt};
use std::error::Error;
use std::fmt::{self, Display, Formatter};
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use crate::position::Position;
use crate::{HEIGHT, WIDTH};

/// An error produced while loading an opening book file
#[derive(Debug)]
pub enum BookError {
    /// A header field did not match the expected board dimensions or layout
    CorruptBook(String),
    /// The underlying file could not be read
    Io(std::io::Error),
}

impl Display for BookError {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match self {
            BookError::CorruptBook(reason) => write!(f, "corrupt opening book: {}", reason),
            BookError::Io(err) => write!(f, "failed to read opening book: {}", err),
        }
    }
}

impl Error for BookError {}

impl From<std::io::Error> for BookError {
    fn from(err: std::io::Error) -> Self {
        BookError::Io(err)
    }
}

/// The largest `log2_capacity` header value this loader accepts. The teacher's own
/// 4.2-million-position book needs a `log2_capacity` around 22-23; this leaves ample
/// headroom while rejecting a corrupt or hostile header before it can overflow the
/// `1u64 << log2_capacity` shift or force a multi-gigabyte allocation.
const MAX_LOG2_CAPACITY: u8 = 24;

/// An immutable table mapping the canonical key of every position with exactly
/// [`OpeningBook::depth`] stones played to an exact score
///
/// # On-disk format
/// A 7-byte header (`width, height, depth, key_size_bits, value_size_bits,
/// log2_capacity, partial_key_bytes`), followed by `capacity` little-endian key
/// residues of `partial_key_bytes` bytes each, followed by `capacity` signed 8-bit
/// values. `capacity` is the smallest prime not less than `2^log2_capacity`.
///
/// Lookup mirrors [`TranspositionTable`]: the residue stored at bucket
/// `canonical_key % capacity` is compared against the queried key's own residue, and a
/// match is required to report a hit.
///
/// [`TranspositionTable`]: ../transposition_table/struct.TranspositionTable.html
pub struct OpeningBook {
    depth: usize,
    capacity: u64,
    partial_key_bytes: usize,
    residues: Vec<u64>,
    values: Vec<i8>,
}

impl OpeningBook {
    /// Loads an opening book from a file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, BookError> {
        let file = File::open(path)?;
        Self::from_reader(BufReader::new(file))
    }

    /// Parses an opening book from any `Read` source
    pub fn from_reader<R: Read>(mut reader: R) -> Result<Self, BookError> {
        let mut header = [0u8; 7];
        reader.read_exact(&mut header)?;
        let [width, height, depth, _key_size_bits, _value_size_bits, log2_capacity, partial_key_bytes] =
            header;

        if width as usize != WIDTH || height as usize != HEIGHT {
            return Err(BookError::CorruptBook(format!(
                "file is for a {}x{} board, expected {}x{}",
                width, height, WIDTH, HEIGHT
            )));
        }
        if partial_key_bytes == 0 || partial_key_bytes > 8 {
            return Err(BookError::CorruptBook(format!(
                "unsupported partial key width of {} bytes",
                partial_key_bytes
            )));
        }

        if log2_capacity > MAX_LOG2_CAPACITY {
            return Err(BookError::CorruptBook(format!(
                "log2_capacity of {} exceeds the maximum supported value of {}",
                log2_capacity, MAX_LOG2_CAPACITY
            )));
        }
        let capacity = next_prime(1u64 << log2_capacity);

        let mut residues = Vec::with_capacity(capacity as usize);
        for _ in 0..capacity {
            residues.push(reader.read_uint::<LittleEndian>(partial_key_bytes as usize)?);
        }

        let mut values = Vec::with_capacity(capacity as usize);
        for _ in 0..capacity {
            values.push(reader.read_i8()?);
        }

        Ok(Self {
            depth: depth as usize,
            capacity,
            partial_key_bytes: partial_key_bytes as usize,
            residues,
            values,
        })
    }

    /// The move-depth at which this book's positions are recorded
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Looks up a position's exact score
    ///
    /// Returns `(false, 0)` if `position.moves() != self.depth()` or the position is
    /// not present in the book.
    pub fn lookup(&self, position: &Position) -> (bool, i8) {
        if position.moves() != self.depth {
            return (false, 0);
        }
        let key = position.canonical_key();
        let mask = residue_mask(self.partial_key_bytes);
        let index = (key % self.capacity) as usize;
        if self.residues[index] == key & mask {
            (true, self.values[index])
        } else {
            (false, 0)
        }
    }
}

fn residue_mask(partial_key_bytes: usize) -> u64 {
    if partial_key_bytes >= 8 {
        u64::MAX
    } else {
        (1u64 << (partial_key_bytes * 8)) - 1
    }
}

fn is_prime(n: u64) -> bool {
    if n < 2 {
        return false;
    }
    if n % 2 == 0 {
        return n == 2;
    }
    let mut divisor = 3;
    while divisor * divisor <= n {
        if n % divisor == 0 {
            return false;
        }
        divisor += 2;
    }
    true
}

fn next_prime(mut n: u64) -> u64 {
    if n <= 2 {
        return 2;
    }
    if n % 2 == 0 {
        n += 1;
    }
    while !is_prime(n) {
        n += 2;
    }
    n
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn build_book_bytes(depth: u8, log2_capacity: u8, partial_key_bytes: u8, entries: &[(u64, i8)]) -> Vec<u8> {
        let capacity = next_prime(1u64 << log2_capacity) as usize;
        let mut residues = vec![0u64; capacity];
        let mut values = vec![0i8; capacity];
        for &(key, value) in entries {
            let index = (key % capacity as u64) as usize;
            residues[index] = key & residue_mask(partial_key_bytes as usize);
            values[index] = value;
        }

        let mut bytes = vec![
            WIDTH as u8,
            HEIGHT as u8,
            depth,
            8,
            8,
            log2_capacity,
            partial_key_bytes,
        ];
        for residue in residues {
            bytes.extend_from_slice(&residue.to_le_bytes()[..partial_key_bytes as usize]);
        }
        for value in values {
            bytes.push(value as u8);
        }
        bytes
    }

    #[test]
    fn loads_and_looks_up_a_stored_position() {
        let position = Position::from_sequence("4455326").unwrap();
        let key = position.canonical_key();
        let bytes = build_book_bytes(7, 3, 4, &[(key, 22)]);

        let book = OpeningBook::from_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(book.depth(), 7);
        assert_eq!(book.lookup(&position), (true, 22));
    }

    #[test]
    fn lookup_misses_when_move_count_does_not_match_depth() {
        let position = Position::from_sequence("445532").unwrap();
        let bytes = build_book_bytes(7, 3, 4, &[]);

        let book = OpeningBook::from_reader(Cursor::new(bytes)).unwrap();
        assert_eq!(book.lookup(&position), (false, 0));
    }

    #[test]
    fn rejects_a_header_with_the_wrong_board_dimensions() {
        let mut bytes = build_book_bytes(7, 3, 4, &[]);
        bytes[0] = 8;
        let err = OpeningBook::from_reader(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, BookError::CorruptBook(_)));
    }

    #[test]
    fn rejects_a_log2_capacity_that_would_overflow_or_blow_up_memory() {
        let mut bytes = build_book_bytes(7, 3, 4, &[]);
        bytes[5] = 63;
        let err = OpeningBook::from_reader(Cursor::new(bytes)).unwrap_err();
        assert!(matches!(err, BookError::CorruptBook(_)));
    }

    #[test]
    fn next_prime_rounds_up_to_the_smallest_prime_at_or_above() {
        assert_eq!(next_prime(1), 2);
        assert_eq!(next_prime(8), 11);
        assert_eq!(next_prime(1 << 10), 1031);
    }
}
