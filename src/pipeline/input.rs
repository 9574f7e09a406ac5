//! Input validation: decide whether a path may enter the pipeline at all.
//!
//! Checks run cheapest first and stop at the first failure. None of them
//! creates, modifies or deletes anything, so a rejected request leaves the
//! file system exactly as it found it.
//!
//! 1. `.pdf` extension (ASCII case-insensitive)
//! 2. the path exists and is a regular file
//! 3. it is readable
//! 4. the `%PDF` header appears within its first KiB, where PDF readers
//!    look for it (a BOM or other leading junk is tolerated)

use crate::error::ConversionError;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::debug;

/// How far into the file the `%PDF` header may start.
const HEADER_SEARCH_BYTES: u64 = 1024;

/// Whether `path` carries a `.pdf` extension, ignoring ASCII case.
pub fn has_pdf_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
}

/// Join a relative `input` onto `base`; absolute inputs are returned as-is.
pub fn resolve_against(base: &Path, input: impl AsRef<Path>) -> PathBuf {
    let input = input.as_ref();
    if input.is_absolute() {
        input.to_path_buf()
    } else {
        base.join(input)
    }
}

/// Validate a local PDF path.
pub fn validate_pdf(path: &Path) -> Result<(), ConversionError> {
    if !has_pdf_extension(path) {
        return Err(ConversionError::DisallowedFileType {
            path: path.to_path_buf(),
        });
    }

    if !path.is_file() {
        return Err(ConversionError::FileNotFound {
            path: path.to_path_buf(),
        });
    }

    match std::fs::File::open(path) {
        Ok(f) => {
            let mut head = Vec::with_capacity(HEADER_SEARCH_BYTES as usize);
            f.take(HEADER_SEARCH_BYTES)
                .read_to_end(&mut head)
                .map_err(|_| ConversionError::PermissionDenied {
                    path: path.to_path_buf(),
                })?;
            if !head.windows(4).any(|w| w == b"%PDF") {
                let mut magic = [0u8; 4];
                let n = head.len().min(4);
                magic[..n].copy_from_slice(&head[..n]);
                return Err(ConversionError::NotAPdf {
                    path: path.to_path_buf(),
                    magic,
                });
            }
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(ConversionError::PermissionDenied {
                path: path.to_path_buf(),
            });
        }
        Err(_) => {
            return Err(ConversionError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
    }

    debug!("Validated PDF input: {}", path.display());
    Ok(())
}
