//! Text dump and load
//!
//! A dump is a line-oriented text file:
//!
//! ```text
//! <bucket size> <log2 capacity> <hash count> <entry count>
//! <multiplier> <multiplier> ...
//! <key> <value>
//! ...
//! ```
//!
//! with one `key value` line for every slot of every bucket, in bucket order
//! and then slot order, so unused slots show up as `0 0`. Loading a dump
//! writes the same slots straight back into storage without running any
//! insertion logic, which makes `load(dump(t))` probe exactly like `t`.

use crate::bucket_array::{BucketArray, Entry};
use crate::err::{DecodeError, Error};
use crate::hash::{HashFamily, MAX_HASHES};
use crate::{Geometry, SplashTable, SplashTableBuilder, TableSize};
use arrayvec::ArrayVec;
use std::fmt;
use std::io::{self, BufRead};
use std::str::FromStr;

/// Display wrapper that formats a [`SplashTable`] as a text dump
///
/// Returned by [`SplashTable::dump()`].
#[derive(Debug, Clone, Copy)]
pub struct Dump<'a> {
    /// Table being written out
    table: &'a SplashTable,
}

impl fmt::Display for Dump<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let table = self.table;
        writeln!(
            f,
            "{} {} {} {}",
            table.bucket_size(),
            table.log2_capacity(),
            table.num_hashes(),
            table.len()
        )?;
        for (i, multiplier) in table.multipliers().iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{}", multiplier)?;
        }
        writeln!(f)?;
        for entry in table.buckets.slots() {
            writeln!(f, "{} {}", entry.key, entry.value)?;
        }
        Ok(())
    }
}

impl SplashTable {
    /// Format this table as a text dump, via [`fmt::Display`].
    pub fn dump(&self) -> Dump<'_> {
        Dump { table: self }
    }

    /// Write a text dump of this table to `out`.
    pub fn dump_into<W: io::Write>(&self, mut out: W) -> io::Result<()> {
        write!(out, "{}", self.dump())?;
        out.flush()
    }

    /// Load a table from a text dump with default builder options.
    pub fn load_from<R: BufRead>(reader: R) -> Result<Self, Error> {
        SplashTableBuilder::new().load_from(reader)
    }
}

impl SplashTableBuilder {
    /// Load a table from a text dump.
    ///
    /// The table's shape and multipliers come from the dump. Only the
    /// builder's reinsert budget, probe option and seed are used.
    pub fn load_from<R: BufRead>(&self, reader: R) -> Result<SplashTable, Error> {
        let mut lines = Lines::new(reader);

        let (header_line, header) = lines.expect_line()?;
        let [bucket_size, log2_capacity, num_hashes, size] =
            parse_fields::<u32, 4>(header).ok_or(DecodeError::Header { line: header_line })?;
        let geometry = Geometry::new(
            num_hashes as usize,
            bucket_size as usize,
            TableSize::Log2Capacity(log2_capacity),
        )
        .map_err(DecodeError::Geometry)?;
        let size = size as usize;
        let slots = geometry.num_buckets * geometry.bucket_size;
        if size > slots {
            return Err(DecodeError::Size {
                line: header_line,
                size,
                capacity: slots,
            }
            .into());
        }

        let (line, text) = lines.expect_line()?;
        let multipliers = parse_list(text).ok_or(DecodeError::Multipliers { line })?;
        if multipliers.len() != geometry.num_hashes {
            return Err(DecodeError::Multipliers { line }.into());
        }
        let hashes = HashFamily::from_multipliers(&multipliers, geometry.bucket_bits())
            .ok_or(DecodeError::Multipliers { line })?;

        let mut buckets = BucketArray::new(geometry.num_buckets, geometry.bucket_size);
        let live = buckets.fill_from((0..slots).map(|_| {
            let (line, text) = lines.expect_line()?;
            parse_fields::<u32, 2>(text)
                .map(|[key, value]| Entry::new(key, value))
                .ok_or(DecodeError::Slot { line })
        }))?;
        lines.expect_end()?;

        if live != size {
            log::warn!(
                "dump header claims {} entries but {} slots are in use",
                size,
                live
            );
        }

        let table = SplashTable::from_parts(hashes, buckets, size, self, self.rng())?;
        log::debug!(
            "loaded splash table: {} hashes, {} buckets of {}, {} entries, {:?} probe",
            table.num_hashes(),
            table.num_buckets(),
            table.bucket_size(),
            table.len(),
            table.backend()
        );
        Ok(table)
    }
}

/// Line reader that counts lines from 1
struct Lines<R> {
    /// Underlying reader
    reader: R,
    /// Number of lines read so far
    line: usize,
    /// Contents of the most recent line
    buf: String,
}

impl<R: BufRead> Lines<R> {
    /// Wrap a reader.
    fn new(reader: R) -> Self {
        Self {
            reader,
            line: 0,
            buf: String::new(),
        }
    }

    /// Read the next line, returning its number and its text without the
    /// line ending, or `None` at the end of input.
    fn next_line(&mut self) -> Result<Option<(usize, &str)>, DecodeError> {
        self.buf.clear();
        if self.reader.read_line(&mut self.buf)? == 0 {
            return Ok(None);
        }
        self.line += 1;
        Ok(Some((self.line, self.buf.trim_end_matches(['\n', '\r']))))
    }

    /// Read a line that must be there.
    fn expect_line(&mut self) -> Result<(usize, &str), DecodeError> {
        let next = self.line + 1;
        self.next_line()?
            .ok_or(DecodeError::UnexpectedEof { line: next })
    }

    /// Check that nothing but blank lines remain.
    fn expect_end(&mut self) -> Result<(), DecodeError> {
        while let Some((line, text)) = self.next_line()? {
            if !text.trim().is_empty() {
                return Err(DecodeError::TrailingData { line });
            }
        }
        Ok(())
    }
}

/// Parse exactly `N` whitespace separated fields.
fn parse_fields<T: FromStr, const N: usize>(text: &str) -> Option<[T; N]> {
    let mut fields = ArrayVec::<T, N>::new();
    for field in text.split_ascii_whitespace() {
        fields.try_push(field.parse().ok()?).ok()?;
    }
    fields.into_inner().ok()
}

/// Parse a list of at most [`MAX_HASHES`] whitespace separated `u32`s.
fn parse_list(text: &str) -> Option<ArrayVec<u32, MAX_HASHES>> {
    let mut list = ArrayVec::new();
    for field in text.split_ascii_whitespace() {
        list.try_push(field.parse().ok()?).ok()?;
    }
    Some(list)
}
