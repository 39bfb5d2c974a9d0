//! Compressed sparse row files, the bulk-load format for corpora and query
//! sets.
//!
//! Layout, all little-endian: `i64 nrow, i64 ncol, i64 nnz`, then
//! `i64 indptr[nrow + 1]`, `i32 indices[nnz]`, `f32 data[nnz]`.

use crate::error::{Error, Result};
use crate::{DimId, SparseVector};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    ncols: usize,
    indptr: Vec<i64>,
    indices: Vec<i32>,
    data: Vec<f32>,
}

impl CsrMatrix {
    /// Packs rows into CSR form. `ncols` is one past the largest dimension.
    pub fn from_rows(rows: &[SparseVector]) -> Self {
        let mut indptr = Vec::with_capacity(rows.len() + 1);
        let mut indices = Vec::new();
        let mut data = Vec::new();
        let mut ncols = 0usize;
        indptr.push(0i64);
        for row in rows {
            for (dim, weight) in row.iter() {
                ncols = ncols.max(dim as usize + 1);
                indices.push(dim as i32);
                data.push(weight);
            }
            indptr.push(indices.len() as i64);
        }
        Self { ncols, indptr, indices, data }
    }

    pub fn nrows(&self) -> usize {
        self.indptr.len() - 1
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn nnz(&self) -> usize {
        self.indices.len()
    }

    /// Row `i` as a sparse vector, pairs in stored column order.
    pub fn row(&self, i: usize) -> Result<SparseVector> {
        let start = self.indptr[i] as usize;
        let end = self.indptr[i + 1] as usize;
        self.indices[start..end]
            .iter()
            .zip(&self.data[start..end])
            .map(|(&dim, &weight)| {
                if dim < 0 {
                    Err(Error::InvalidDimension { row: i, dim: dim as i64 })
                } else {
                    Ok((dim as DimId, weight))
                }
            })
            .collect::<Result<Vec<_>>>()
            .map(SparseVector::new)
    }

    pub fn rows(&self) -> impl Iterator<Item = Result<SparseVector>> + '_ {
        (0..self.nrows()).map(move |i| self.row(i))
    }

    pub fn into_vectors(self) -> Result<Vec<SparseVector>> {
        self.rows().collect()
    }
}

pub fn read_sparse_matrix<P: AsRef<Path>>(path: P) -> Result<CsrMatrix> {
    let f = File::open(path)?;
    read_from(BufReader::new(f))
}

pub fn write_sparse_matrix<P: AsRef<Path>>(path: P, matrix: &CsrMatrix) -> Result<()> {
    let f = File::create(path)?;
    let mut w = BufWriter::new(f);
    write_to(&mut w, matrix)?;
    w.flush()?;
    Ok(())
}

pub fn read_from<R: Read>(mut r: R) -> Result<CsrMatrix> {
    let nrows = read_len(&mut r, "nrow")?;
    let ncols = read_len(&mut r, "ncol")?;
    let nnz = read_len(&mut r, "nnz")?;
    let nptr = nrows
        .checked_add(1)
        .ok_or_else(|| Error::Format(format!("nrow too large: {nrows}")))?;

    // Header counts are untrusted; buffers grow only as data actually arrives.
    let indptr = read_chunked(&mut r, nptr, "indptr", |r, buf| r.read_i64_into::<LittleEndian>(buf))?;
    let indices = read_chunked(&mut r, nnz, "indices", |r, buf| r.read_i32_into::<LittleEndian>(buf))?;
    let data = read_chunked(&mut r, nnz, "data", |r, buf| r.read_f32_into::<LittleEndian>(buf))?;

    if indptr[0] != 0 {
        return Err(Error::Format(format!("indptr starts at {}, expected 0", indptr[0])));
    }
    if let Some(i) = indptr.windows(2).position(|w| w[1] < w[0]) {
        return Err(Error::Format(format!("indptr decreases at row {i}")));
    }
    if indptr[nrows] != nnz as i64 {
        return Err(Error::Format(format!("indptr ends at {}, expected nnz {nnz}", indptr[nrows])));
    }
    Ok(CsrMatrix { ncols, indptr, indices, data })
}

pub fn write_to<W: Write>(w: &mut W, matrix: &CsrMatrix) -> Result<()> {
    w.write_i64::<LittleEndian>(matrix.nrows() as i64)?;
    w.write_i64::<LittleEndian>(matrix.ncols as i64)?;
    w.write_i64::<LittleEndian>(matrix.nnz() as i64)?;
    for &p in &matrix.indptr {
        w.write_i64::<LittleEndian>(p)?;
    }
    for &i in &matrix.indices {
        w.write_i32::<LittleEndian>(i)?;
    }
    for &v in &matrix.data {
        w.write_f32::<LittleEndian>(v)?;
    }
    Ok(())
}

const READ_CHUNK: usize = 1 << 16;

fn read_chunked<R, T, F>(r: &mut R, len: usize, field: &str, read_into: F) -> Result<Vec<T>>
where
    R: Read,
    T: Copy + Default,
    F: Fn(&mut R, &mut [T]) -> io::Result<()>,
{
    let mut out = Vec::new();
    let mut buf = vec![T::default(); len.min(READ_CHUNK)];
    let mut remaining = len;
    while remaining > 0 {
        let n = remaining.min(READ_CHUNK);
        read_into(r, &mut buf[..n]).map_err(|e| truncated(e, field))?;
        out.extend_from_slice(&buf[..n]);
        remaining -= n;
    }
    Ok(out)
}

fn read_len<R: Read>(r: &mut R, field: &str) -> Result<usize> {
    let v = r.read_i64::<LittleEndian>().map_err(|e| truncated(e, field))?;
    usize::try_from(v).map_err(|_| Error::Format(format!("invalid {field}: {v}")))
}

fn truncated(e: io::Error, field: &str) -> Error {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        Error::Format(format!("file ends inside {field}"))
    } else {
        Error::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn header(nrow: i64, ncol: i64, nnz: i64) -> Vec<u8> {
        let mut buf = Vec::new();
        for v in [nrow, ncol, nnz] {
            buf.write_i64::<LittleEndian>(v).unwrap();
        }
        buf
    }

    #[test]
    fn reads_rows_in_order() {
        let rows = vec![
            SparseVector::new(vec![(1, 2.0), (2, 1.0)]),
            SparseVector::new(vec![]),
            SparseVector::new(vec![(7, 0.5)]),
        ];
        let mut buf = Vec::new();
        write_to(&mut buf, &CsrMatrix::from_rows(&rows)).unwrap();

        let m = read_from(Cursor::new(buf)).unwrap();
        assert_eq!(m.nrows(), 3);
        assert_eq!(m.ncols(), 8);
        assert_eq!(m.nnz(), 3);
        assert_eq!(m.into_vectors().unwrap(), rows);
    }

    #[test]
    fn rejects_inconsistent_indptr() {
        let mut buf = header(1, 4, 1);
        buf.write_i64::<LittleEndian>(0).unwrap();
        buf.write_i64::<LittleEndian>(2).unwrap();
        buf.write_i32::<LittleEndian>(3).unwrap();
        buf.write_f32::<LittleEndian>(1.0).unwrap();
        assert!(matches!(read_from(Cursor::new(buf)), Err(Error::Format(_))));
    }

    #[test]
    fn negative_column_is_invalid_dimension() {
        let mut buf = header(1, 4, 1);
        buf.write_i64::<LittleEndian>(0).unwrap();
        buf.write_i64::<LittleEndian>(1).unwrap();
        buf.write_i32::<LittleEndian>(-3).unwrap();
        buf.write_f32::<LittleEndian>(1.0).unwrap();
        let m = read_from(Cursor::new(buf)).unwrap();
        assert!(matches!(m.row(0), Err(Error::InvalidDimension { row: 0, dim: -3 })));
    }

    #[test]
    fn truncated_file_is_format_error() {
        let buf = header(2, 4, 3);
        assert!(matches!(read_from(Cursor::new(buf)), Err(Error::Format(_))));
        assert!(matches!(read_from(Cursor::new(vec![0u8; 10])), Err(Error::Format(_))));
    }

    #[test]
    fn huge_header_counts_fail_without_allocating() {
        for (nrow, nnz) in [(i64::MAX, 0), (0, i64::MAX), (1 << 40, 1 << 40)] {
            let buf = header(nrow, 4, nnz);
            assert!(matches!(read_from(Cursor::new(buf)), Err(Error::Format(_))));
        }
    }

    #[test]
    fn negative_header_is_format_error() {
        let buf = header(-1, 4, 0);
        assert!(matches!(read_from(Cursor::new(buf)), Err(Error::Format(_))));
    }
}
