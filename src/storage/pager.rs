//! # Pager
//!
//! The pager mediates every byte that moves between the B-Tree layer
//! and the database file. It knows three things: the open file, the
//! page size, and how many pages the file logically contains.
//!
//! ## Page Numbering and Allocation
//!
//! Pages are numbered from 1. `allocate_page` only bumps the logical
//! page count; the new page occupies file space on its first
//! `write_page`, and until then reads back zero-filled. Reads past the
//! current end of file likewise come back as zeroes, so a freshly
//! allocated page always presents a blank buffer.
//!
//! ## Snapshots
//!
//! `read_page` returns an owned [`MemPage`]: a page-size buffer plus
//! the page number it came from. Callers mutate the snapshot freely and
//! persist it with `write_page`; dropping it without writing discards
//! the changes. There is no cache and no pinning; the file is the
//! single source of truth between operations.
//!
//! ## Page Size
//!
//! The pager starts at [`DEFAULT_PAGE_SIZE`] and is retargeted via
//! `set_page_size` once the file header has been read. Changing the
//! page size recomputes the page count from the file length.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use eyre::{ensure, Result, WrapErr};

use super::{DEFAULT_PAGE_SIZE, FILE_HEADER_SIZE};

/// An owned snapshot of one page.
#[derive(Debug)]
pub struct MemPage {
    page_no: u32,
    data: Box<[u8]>,
}

impl MemPage {
    pub(crate) fn zeroed(page_no: u32, page_size: u16) -> Self {
        Self {
            page_no,
            data: vec![0u8; page_size as usize].into_boxed_slice(),
        }
    }

    pub fn page_no(&self) -> u32 {
        self.page_no
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.data
    }
}

#[derive(Debug)]
pub struct Pager {
    file: File,
    path: PathBuf,
    page_size: u16,
    n_pages: u32,
    open_len: u64,
}

impl Pager {
    /// Opens the database file, creating it if absent.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .wrap_err_with(|| format!("failed to open database file {}", path.display()))?;
        let open_len = file
            .metadata()
            .wrap_err_with(|| format!("failed to stat database file {}", path.display()))?
            .len();

        let mut pager = Self {
            file,
            path,
            page_size: DEFAULT_PAGE_SIZE,
            n_pages: 0,
            open_len,
        };
        pager.recount_pages();
        Ok(pager)
    }

    /// Flushes and drops the file handle.
    pub fn close(self) -> Result<()> {
        self.file
            .sync_all()
            .wrap_err_with(|| format!("failed to sync database file {}", self.path.display()))
    }

    /// True when the file held no bytes at open time.
    pub fn is_empty(&self) -> bool {
        self.open_len == 0
    }

    pub fn page_size(&self) -> u16 {
        self.page_size
    }

    pub fn page_count(&self) -> u32 {
        self.n_pages
    }

    pub fn set_page_size(&mut self, page_size: u16) {
        self.page_size = page_size;
        self.recount_pages();
    }

    fn recount_pages(&mut self) {
        self.n_pages = self.open_len.div_ceil(u64::from(self.page_size)) as u32;
    }

    /// Reads the first 100 bytes of the file.
    pub fn read_header(&mut self, buf: &mut [u8; FILE_HEADER_SIZE]) -> Result<()> {
        self.file
            .seek(SeekFrom::Start(0))
            .wrap_err("failed to seek to file header")?;
        self.file
            .read_exact(buf)
            .wrap_err_with(|| format!("failed to read file header of {}", self.path.display()))
    }

    /// Reserves a fresh page number. The page reads as zero-filled
    /// until its first write.
    pub fn allocate_page(&mut self) -> u32 {
        self.n_pages += 1;
        self.n_pages
    }

    pub fn read_page(&mut self, page_no: u32) -> Result<MemPage> {
        ensure!(
            page_no >= 1 && page_no <= self.n_pages,
            "page number {} out of range (page count {})",
            page_no,
            self.n_pages
        );

        let mut page = MemPage::zeroed(page_no, self.page_size);
        let offset = u64::from(page_no - 1) * u64::from(self.page_size);
        self.file
            .seek(SeekFrom::Start(offset))
            .wrap_err_with(|| format!("failed to seek to page {}", page_no))?;

        // Short reads past end of file leave the tail zeroed.
        let buf = page.data_mut();
        let mut filled = 0;
        while filled < buf.len() {
            let n = self
                .file
                .read(&mut buf[filled..])
                .wrap_err_with(|| format!("failed to read page {}", page_no))?;
            if n == 0 {
                break;
            }
            filled += n;
        }
        Ok(page)
    }

    pub fn write_page(&mut self, page: &MemPage) -> Result<()> {
        ensure!(
            page.page_no >= 1 && page.page_no <= self.n_pages,
            "page number {} out of range (page count {})",
            page.page_no,
            self.n_pages
        );
        ensure!(
            page.data.len() == self.page_size as usize,
            "page buffer size {} does not match page size {}",
            page.data.len(),
            self.page_size
        );

        let offset = u64::from(page.page_no - 1) * u64::from(self.page_size);
        self.file
            .seek(SeekFrom::Start(offset))
            .wrap_err_with(|| format!("failed to seek to page {}", page.page_no))?;
        self.file
            .write_all(&page.data)
            .wrap_err_with(|| format!("failed to write page {}", page.page_no))?;

        let end = offset + u64::from(self.page_size);
        if end > self.open_len {
            self.open_len = end;
        }
        Ok(())
    }
}
