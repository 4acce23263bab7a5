// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025-2026 natyamatsya contributors
//
// POSIX shared memory provider: shm_open + mmap. The mapping is writable
// by both sides; the protocol layer decides who writes which words.

use std::ffi::CString;
use std::io;
use std::ptr;

/// POSIX shm names need exactly one slash, leading.
fn posix_name(name: &str) -> String {
    let body: String = name
        .chars()
        .map(|c| if c == '/' { '_' } else { c })
        .collect();
    format!("/{body}")
}

pub struct PlatformShm {
    mem: *mut u8,
    size: usize,
    name: String,
}

// SAFETY: the mapping is process-shared by design.
unsafe impl Send for PlatformShm {}
unsafe impl Sync for PlatformShm {}

impl PlatformShm {
    /// Create a fresh named region. Fails if the name already exists; the
    /// kernel zero-fills new shm objects.
    pub fn create(name: &str, size: usize) -> io::Result<PlatformShm> {
        Self::acquire(name, size, true)
    }

    /// Map an existing named region.
    pub fn open(name: &str, size: usize) -> io::Result<PlatformShm> {
        Self::acquire(name, size, false)
    }

    fn acquire(name: &str, size: usize, create: bool) -> io::Result<PlatformShm> {
        if name.is_empty() {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "name is empty"));
        }
        if size == 0 {
            return Err(io::Error::new(io::ErrorKind::InvalidInput, "size is 0"));
        }

        let posix = posix_name(name);
        let c_name = CString::new(posix.as_bytes())
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let perms: libc::mode_t = 0o666;
        let flags = if create {
            libc::O_RDWR | libc::O_CREAT | libc::O_EXCL
        } else {
            libc::O_RDWR
        };
        let fd = unsafe { libc::shm_open(c_name.as_ptr(), flags, perms as libc::c_uint) };
        if fd < 0 {
            return Err(io::Error::last_os_error());
        }

        if create && unsafe { libc::ftruncate(fd, size as libc::off_t) } != 0 {
            let err = io::Error::last_os_error();
            unsafe {
                libc::close(fd);
                libc::shm_unlink(c_name.as_ptr());
            }
            return Err(err);
        }

        let mem = unsafe {
            libc::mmap(
                ptr::null_mut(),
                size,
                libc::PROT_READ | libc::PROT_WRITE,
                libc::MAP_SHARED,
                fd,
                0,
            )
        };
        unsafe { libc::close(fd) };
        if mem == libc::MAP_FAILED {
            return Err(io::Error::last_os_error());
        }

        Ok(PlatformShm {
            mem: mem as *mut u8,
            size,
            name: posix,
        })
    }

    pub fn as_mut_ptr(&self) -> *mut u8 {
        self.mem
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Remove the backing object; existing mappings stay valid.
    pub fn unlink(&self) {
        if let Ok(c_name) = CString::new(self.name.as_bytes()) {
            unsafe { libc::shm_unlink(c_name.as_ptr()) };
        }
    }

    /// Remove a named region without an open handle.
    pub fn unlink_by_name(name: &str) {
        if let Ok(c_name) = CString::new(posix_name(name).as_bytes()) {
            unsafe { libc::shm_unlink(c_name.as_ptr()) };
        }
    }
}

impl Drop for PlatformShm {
    fn drop(&mut self) {
        unsafe { libc::munmap(self.mem as *mut libc::c_void, self.size) };
    }
}
