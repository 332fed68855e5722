use std::fs::File;
use std::path::Path;

use memmap2::Mmap;

use crate::MapError;

/// read-only memory mapping of a map binary. the database keeps these
/// alive until it is cleared or reloaded; parsed entities copy their
/// strings out, so nothing borrows the region after a load completes.
#[derive(Debug)]
pub struct MappedFile {
    mmap: Mmap,
}

impl MappedFile {
    pub fn open(path: &Path) -> Result<MappedFile, MapError> {
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => MapError::NotFound(path.to_path_buf()),
            _ => MapError::from(e),
        })?;
        // Safety: the map is read-only and private; the backing files are
        // produced once by the converter and never rewritten in place, so
        // the region is stable for the lifetime of the mapping.
        let mmap = unsafe { Mmap::map(&file) }?;
        Ok(MappedFile { mmap })
    }

    pub fn bytes(&self) -> &[u8] {
        &self.mmap
    }

    pub fn len(&self) -> usize {
        self.mmap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mmap.is_empty()
    }
}
