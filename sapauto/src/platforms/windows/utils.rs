//! Late-bound COM helpers for the SAP GUI scripting object model

use crate::AutomationError;
use std::ptr;
use windows::core::{Interface, BSTR, GUID, HRESULT, IUnknown, PCWSTR, VARIANT};
use windows::Win32::System::Com::{
    CoInitializeEx, IDispatch, COINIT_APARTMENTTHREADED, DISPATCH_FLAGS, DISPATCH_METHOD,
    DISPATCH_PROPERTYGET, DISPATCH_PROPERTYPUT, DISPPARAMS,
};
use windows::Win32::System::Ole::DISPID_PROPERTYPUT;

const LOCALE_USER_DEFAULT: u32 = 0x0400;
// RPC_E_CHANGED_MODE: COM already initialized on this thread in another mode
const RPC_E_CHANGED_MODE: HRESULT = HRESULT(0x80010106u32 as i32);

/// Initialize COM for the calling thread. SAP GUI scripting objects are apartment threaded.
pub(crate) fn init_com() -> Result<(), AutomationError> {
    unsafe {
        let hr = CoInitializeEx(None, COINIT_APARTMENTTHREADED);
        if hr.is_err() && hr != RPC_E_CHANGED_MODE {
            return Err(AutomationError::scripting(
                "CoInitializeEx",
                format!("Failed to initialize COM: {hr}"),
            ));
        }
    }
    Ok(())
}

pub(crate) fn com_error(operation: &str, e: windows::core::Error) -> AutomationError {
    AutomationError::Scripting {
        operation: operation.to_string(),
        message: e.message().to_string(),
        com_error: Some(e.code().0),
    }
}

/// An `IDispatch` driven by member name, the way VBScript drives SAP GUI.
#[derive(Clone)]
pub(crate) struct Dispatch(pub(crate) IDispatch);

impl Dispatch {
    pub(crate) fn from_variant(member: &str, value: &VARIANT) -> Result<Self, AutomationError> {
        let unknown = IUnknown::try_from(value).map_err(|e| com_error(member, e))?;
        unknown
            .cast::<IDispatch>()
            .map(Dispatch)
            .map_err(|e| com_error(member, e))
    }

    fn dispid(&self, member: &str) -> Result<i32, AutomationError> {
        let wide: Vec<u16> = member.encode_utf16().chain(std::iter::once(0)).collect();
        let name = PCWSTR(wide.as_ptr());
        let mut dispid = 0i32;
        unsafe {
            self.0
                .GetIDsOfNames(&GUID::zeroed(), &name, 1, LOCALE_USER_DEFAULT, &mut dispid)
                .map_err(|e| com_error(member, e))?;
        }
        Ok(dispid)
    }

    fn invoke(
        &self,
        member: &str,
        flags: DISPATCH_FLAGS,
        args: &[VARIANT],
    ) -> Result<VARIANT, AutomationError> {
        let dispid = self.dispid(member)?;
        // IDispatch expects arguments right to left.
        let mut reversed: Vec<VARIANT> = args.iter().rev().cloned().collect();
        let mut named_put = DISPID_PROPERTYPUT;
        let is_put = flags == DISPATCH_PROPERTYPUT;

        let params = DISPPARAMS {
            rgvarg: if reversed.is_empty() {
                ptr::null_mut()
            } else {
                reversed.as_mut_ptr()
            },
            rgdispidNamedArgs: if is_put {
                &mut named_put as *mut i32
            } else {
                ptr::null_mut()
            },
            cArgs: reversed.len() as u32,
            cNamedArgs: u32::from(is_put),
        };

        let mut result = VARIANT::default();
        unsafe {
            self.0
                .Invoke(
                    dispid,
                    &GUID::zeroed(),
                    LOCALE_USER_DEFAULT,
                    flags,
                    &params,
                    Some(&mut result as *mut VARIANT),
                    None,
                    None,
                )
                .map_err(|e| com_error(member, e))?;
        }
        Ok(result)
    }

    /// Read a property, or call a parameterless method that returns a value.
    pub(crate) fn get(&self, member: &str) -> Result<VARIANT, AutomationError> {
        self.invoke(member, DISPATCH_PROPERTYGET | DISPATCH_METHOD, &[])
    }

    pub(crate) fn get_object(&self, member: &str) -> Result<Dispatch, AutomationError> {
        let value = self.get(member)?;
        Dispatch::from_variant(member, &value)
    }

    pub(crate) fn get_string(&self, member: &str) -> Result<String, AutomationError> {
        let value = self.get(member)?;
        BSTR::try_from(&value)
            .map(|s| s.to_string())
            .map_err(|e| com_error(member, e))
    }

    pub(crate) fn get_i32(&self, member: &str) -> Result<i32, AutomationError> {
        let value = self.get(member)?;
        i32::try_from(&value).map_err(|e| com_error(member, e))
    }

    pub(crate) fn call(&self, member: &str, args: &[VARIANT]) -> Result<VARIANT, AutomationError> {
        self.invoke(member, DISPATCH_METHOD, args)
    }

    pub(crate) fn call_object(
        &self,
        member: &str,
        args: &[VARIANT],
    ) -> Result<Dispatch, AutomationError> {
        let value = self.call(member, args)?;
        Dispatch::from_variant(member, &value)
    }

    pub(crate) fn put(&self, member: &str, value: VARIANT) -> Result<(), AutomationError> {
        self.invoke(member, DISPATCH_PROPERTYPUT, &[value])
            .map(|_| ())
    }
}

pub(crate) fn bstr(text: &str) -> VARIANT {
    VARIANT::from(BSTR::from(text))
}
