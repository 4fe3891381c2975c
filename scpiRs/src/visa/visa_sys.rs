//! Thin wrapper around the VISA C library, loaded at run time.
#![allow(non_snake_case)]

use std::{
    ffi::{CStr, CString},
    os::raw::c_char,
};

use dlopen::wrapper::{Container, WrapperApi};
use dlopen_derive::WrapperApi;

use crate::{ScpiError, VI_ERROR_RSRC_NFOUND};

pub(crate) type ViStatus = i32;
pub(crate) type ViSession = u32;
type ViFindList = u32;
type ViAttr = u32;
type ViAttrState = u64;

pub(crate) const VI_ATTR_TMO_VALUE: ViAttr = 0x3FFF_001A;
pub(crate) const VI_ATTR_TERMCHAR: ViAttr = 0x3FFF_0018;
pub(crate) const VI_ATTR_TERMCHAR_EN: ViAttr = 0x3FFF_0038;
/// The number of bytes requested was read, more data might be available.
pub(crate) const VI_SUCCESS_MAX_CNT: ViStatus = 0x3FFF_0006;
const VI_NULL: u32 = 0;
const VI_FIND_BUFLEN: usize = 256;

#[derive(WrapperApi)]
struct Api {
    viOpenDefaultRM: unsafe extern "C" fn(vi: *mut ViSession) -> ViStatus,
    viFindRsrc: unsafe extern "C" fn(
        sesn: ViSession,
        expr: *const c_char,
        vi: *mut ViFindList,
        ret_cnt: *mut u32,
        desc: *mut c_char,
    ) -> ViStatus,
    viFindNext: unsafe extern "C" fn(vi: ViFindList, desc: *mut c_char) -> ViStatus,
    viOpen: unsafe extern "C" fn(
        sesn: ViSession,
        rsrc: *const c_char,
        access_mode: u32,
        timeout: u32,
        vi: *mut ViSession,
    ) -> ViStatus,
    viClose: unsafe extern "C" fn(vi: u32) -> ViStatus,
    viRead: unsafe extern "C" fn(vi: ViSession, buf: *mut u8, cnt: u32, ret_cnt: *mut u32) -> ViStatus,
    viWrite: unsafe extern "C" fn(vi: ViSession, buf: *const u8, cnt: u32, ret_cnt: *mut u32) -> ViStatus,
    viSetAttribute: unsafe extern "C" fn(vi: ViSession, attr: ViAttr, value: ViAttrState) -> ViStatus,
    viStatusDesc: unsafe extern "C" fn(vi: ViSession, status: ViStatus, desc: *mut c_char) -> ViStatus,
}

/// The loaded library together with the default resource manager session.
///
/// The resource manager session is closed when this is dropped, which also closes all sessions
/// that were opened through it.
pub(crate) struct Visa {
    api: Container<Api>,
    rm: ViSession,
}

impl Visa {
    /// The library name VISA installs under on this platform.
    pub(crate) fn default_library() -> &'static str {
        if cfg!(windows) {
            "visa64.dll"
        } else if cfg!(target_os = "macos") {
            "/Library/Frameworks/VISA.framework/VISA"
        } else {
            "libvisa.so"
        }
    }

    /// Load the library and open the default resource manager.
    pub(crate) fn load(library: &str) -> Result<Self, ScpiError> {
        let api: Container<Api> = unsafe { Container::load(library) }
            .map_err(|err| ScpiError::Library(format!("{library}: {err}")))?;
        let mut rm: ViSession = 0;
        let status = unsafe { api.viOpenDefaultRM(&mut rm) };
        if status < 0 {
            return Err(ScpiError::Status {
                code: status,
                description: "Could not open the default resource manager.".to_string(),
            });
        }
        log::debug!("Loaded VISA library {library}");
        Ok(Visa { api, rm })
    }

    /// Turn a negative status into an error, pass through all others.
    pub(crate) fn check(&self, status: ViStatus) -> Result<ViStatus, ScpiError> {
        if status < 0 {
            Err(ScpiError::Status {
                code: status,
                description: self.describe(status),
            })
        } else {
            Ok(status)
        }
    }

    fn describe(&self, status: ViStatus) -> String {
        let mut desc = [0 as c_char; VI_FIND_BUFLEN];
        let ret = unsafe { self.api.viStatusDesc(self.rm, status, desc.as_mut_ptr()) };
        if ret < 0 {
            return format!("Unknown status {status:#010X}");
        }
        unsafe { CStr::from_ptr(desc.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }

    /// Find all resources matching the expression.
    ///
    /// No matching resource is not an error, but an empty list.
    pub(crate) fn find_resources(&self, expr: &str) -> Result<Vec<String>, ScpiError> {
        let expr = CString::new(expr).map_err(|_| ScpiError::InvalidAddress(expr.to_string()))?;
        let mut list: ViFindList = 0;
        let mut count: u32 = 0;
        let mut desc = [0 as c_char; VI_FIND_BUFLEN];

        let status = unsafe {
            self.api.viFindRsrc(
                self.rm,
                expr.as_ptr(),
                &mut list,
                &mut count,
                desc.as_mut_ptr(),
            )
        };
        if status == VI_ERROR_RSRC_NFOUND {
            return Ok(Vec::new());
        }
        self.check(status)?;

        let mut resources = Vec::with_capacity(count as usize);
        resources.push(Self::desc_to_string(&desc));
        for _ in 1..count {
            let status = unsafe { self.api.viFindNext(list, desc.as_mut_ptr()) };
            if let Err(err) = self.check(status) {
                self.close(list);
                return Err(err);
            }
            resources.push(Self::desc_to_string(&desc));
        }
        self.close(list);
        Ok(resources)
    }

    fn desc_to_string(desc: &[c_char]) -> String {
        unsafe { CStr::from_ptr(desc.as_ptr()) }
            .to_string_lossy()
            .into_owned()
    }

    /// Open a session to the given resource.
    pub(crate) fn open(&self, address: &str) -> Result<ViSession, ScpiError> {
        let rsrc =
            CString::new(address).map_err(|_| ScpiError::InvalidAddress(address.to_string()))?;
        let mut vi: ViSession = 0;
        let status = unsafe { self.api.viOpen(self.rm, rsrc.as_ptr(), VI_NULL, VI_NULL, &mut vi) };
        self.check(status)?;
        Ok(vi)
    }

    /// Close a session or find list. Failures are only logged.
    pub(crate) fn close(&self, vi: u32) {
        let status = unsafe { self.api.viClose(vi) };
        if status < 0 {
            log::warn!("Closing VISA object {vi} failed: {}", self.describe(status));
        }
    }

    /// Read up to `buf.len()` bytes. Returns the number of bytes read and the (success) status.
    pub(crate) fn read(&self, vi: ViSession, buf: &mut [u8]) -> Result<(usize, ViStatus), ScpiError> {
        let mut count: u32 = 0;
        let len = u32::try_from(buf.len()).unwrap_or(u32::MAX);
        let status = unsafe { self.api.viRead(vi, buf.as_mut_ptr(), len, &mut count) };
        let status = self.check(status)?;
        Ok((count as usize, status))
    }

    /// Write all of `data`.
    pub(crate) fn write(&self, vi: ViSession, data: &[u8]) -> Result<(), ScpiError> {
        let mut offset = 0;
        while offset < data.len() {
            let chunk = &data[offset..];
            let len = u32::try_from(chunk.len()).unwrap_or(u32::MAX);
            let mut count: u32 = 0;
            let status = unsafe { self.api.viWrite(vi, chunk.as_ptr(), len, &mut count) };
            self.check(status)?;
            if count == 0 {
                return Err(std::io::Error::from(std::io::ErrorKind::WriteZero).into());
            }
            offset += count as usize;
        }
        Ok(())
    }

    pub(crate) fn set_attribute(
        &self,
        vi: ViSession,
        attr: ViAttr,
        value: ViAttrState,
    ) -> Result<(), ScpiError> {
        let status = unsafe { self.api.viSetAttribute(vi, attr, value) };
        self.check(status)?;
        Ok(())
    }
}

impl Drop for Visa {
    fn drop(&mut self) {
        self.close(self.rm);
    }
}
