//! Writers that enforce `[value]` framing of encoded cells.

use thiserror::Error;

use super::row::SerializedValues;

/// Appends encoded cells, one per bind marker, to a buffer.
pub struct RowWriter<'buf> {
    // Buffer that the cells are written to.
    buf: &'buf mut Vec<u8>,

    // Number of cells written so far.
    value_count: usize,
}

impl<'buf> RowWriter<'buf> {
    /// Creates a new row writer based on an existing Vec.
    ///
    /// The newly created row writer will append data to the end of the vec.
    #[inline]
    pub fn new(buf: &'buf mut Vec<u8>) -> Self {
        Self {
            buf,
            value_count: 0,
        }
    }

    /// Returns the number of cells that were written so far.
    ///
    /// The protocol allows at most u16::MAX values in a request, but the
    /// writer itself does not enforce it.
    #[inline]
    pub fn value_count(&self) -> usize {
        self.value_count
    }

    /// Appends a new cell to the row and returns a writer for it.
    #[inline]
    pub fn make_cell_writer(&mut self) -> CellWriter<'_> {
        self.value_count += 1;
        CellWriter::new(self.buf)
    }

    /// Appends the cells of an existing [`SerializedValues`].
    #[inline]
    pub fn append_serialize_row(&mut self, sv: &SerializedValues) {
        self.value_count += sv.element_count() as usize;
        self.buf.extend_from_slice(sv.get_contents())
    }
}

/// A handle to a single cell that has to be written.
///
/// The writer is consumed either right away, by
/// [`set_null`](CellWriter::set_null), [`set_unset`](CellWriter::set_unset)
/// or [`set_value`](CellWriter::set_value), or turned into a
/// [`CellValueBuilder`] when the contents are produced piecewise.
///
/// Either way a [`WrittenCellProof`] is returned. [`Codec::encode`](crate::codec::Codec::encode)
/// must return it, so a codec cannot report success without writing its cell.
///
/// Dropping this type without calling any of its methods writes nothing.
pub struct CellWriter<'buf> {
    buf: &'buf mut Vec<u8>,
}

impl<'buf> CellWriter<'buf> {
    /// Creates a new cell writer based on an existing Vec.
    ///
    /// The cell will be appended to the end of the vec.
    #[inline]
    pub fn new(buf: &'buf mut Vec<u8>) -> Self {
        Self { buf }
    }

    /// Writes a null cell (length -1).
    #[inline]
    pub fn set_null(self) -> WrittenCellProof<'buf> {
        self.buf.extend_from_slice(&(-1i32).to_be_bytes());
        WrittenCellProof::new()
    }

    /// Writes an unset cell (length -2).
    ///
    /// Only protocol v4 and newer understand it.
    #[inline]
    pub fn set_unset(self) -> WrittenCellProof<'buf> {
        self.buf.extend_from_slice(&(-2i32).to_be_bytes());
        WrittenCellProof::new()
    }

    /// Writes a cell with the given contents. Empty `contents` produce the
    /// zero-length "empty" value.
    ///
    /// Fails if the contents size overflows the maximum allowed CQL cell size
    /// (which is i32::MAX).
    #[inline]
    pub fn set_value(self, contents: &[u8]) -> Result<WrittenCellProof<'buf>, CellOverflowError> {
        let value_len: i32 = contents.len().try_into().map_err(|_| CellOverflowError)?;
        self.buf.extend_from_slice(&value_len.to_be_bytes());
        self.buf.extend_from_slice(contents);
        Ok(WrittenCellProof::new())
    }

    /// Turns this writer into a [`CellValueBuilder`], used when the contents
    /// are not available up front (collections, tuples, UDTs).
    #[inline]
    pub fn into_value_builder(self) -> CellValueBuilder<'buf> {
        CellValueBuilder::new(self.buf)
    }
}

/// Appends bytes to a non-null, non-unset cell.
///
/// [`finish`](CellValueBuilder::finish) has to be called to fill in the cell's
/// length. An unfinished cell keeps an invalid length (-3), which the server
/// rejects instead of misreading the payload.
pub struct CellValueBuilder<'buf> {
    // Buffer that this value should be serialized to.
    buf: &'buf mut Vec<u8>,

    // Starting position of the value in the buffer.
    starting_pos: usize,
}

impl<'buf> CellValueBuilder<'buf> {
    #[inline]
    fn new(buf: &'buf mut Vec<u8>) -> Self {
        let starting_pos = buf.len();
        buf.extend_from_slice(&(-3i32).to_be_bytes());
        Self { buf, starting_pos }
    }

    /// Appends raw bytes to this cell.
    #[inline]
    pub fn append_bytes(&mut self, bytes: &[u8]) {
        self.buf.extend_from_slice(bytes);
    }

    /// Appends a `[value]`-framed sub-value to the end of the current
    /// contents of the cell and returns a writer for it.
    #[inline]
    pub fn make_sub_writer(&mut self) -> CellWriter<'_> {
        CellWriter::new(self.buf)
    }

    /// Finishes the cell by writing its length.
    ///
    /// Fails if the constructed cell size overflows the maximum allowed
    /// CQL cell size (which is i32::MAX).
    #[inline]
    pub fn finish(self) -> Result<WrittenCellProof<'buf>, CellOverflowError> {
        let value_len: i32 = (self.buf.len() - self.starting_pos - 4)
            .try_into()
            .map_err(|_| CellOverflowError)?;
        self.buf[self.starting_pos..self.starting_pos + 4]
            .copy_from_slice(&value_len.to_be_bytes());
        Ok(WrittenCellProof::new())
    }
}

/// A type-level proof that a cell was fully written by a [`CellWriter`] or
/// [`CellValueBuilder`] with lifetime parameter `'buf`.
#[derive(Debug)]
pub struct WrittenCellProof<'buf> {
    /// Using *mut &'buf () is deliberate and makes WrittenCellProof invariant
    /// on the 'buf lifetime parameter.
    /// Ref: <https://doc.rust-lang.org/reference/subtyping.html>
    _phantom: std::marker::PhantomData<*mut &'buf ()>,
}

impl WrittenCellProof<'_> {
    // Only the writers in this module may create a proof.
    #[inline]
    fn new() -> Self {
        WrittenCellProof {
            _phantom: std::marker::PhantomData,
        }
    }
}

/// There was an attempt to produce a CQL value over the maximum size limit (i32::MAX)
#[derive(Debug, Clone, Copy, Error)]
#[error("CQL cell overflowed the maximum allowed size of 2^31 - 1")]
pub struct CellOverflowError;
