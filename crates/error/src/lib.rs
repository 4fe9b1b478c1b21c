//! Driver error handling infrastructure.
//!
//! Provides the `define_driver_error!` macro used by every OmniBlk crate so that
//! all error enums carry a subsystem-qualified code, a static description and the
//! errno the block layer (or the bring-up caller) reports upward.
//!
//! ## Usage
//!
//! ### Simple errors (no inner data)
//! ```ignore
//! define_driver_error! {
//!     pub enum ResourceError(0x01) {
//!         MissingIrq = 0x02, ENXIO => "No interrupt line assigned",
//!         BufferAllocFailed = 0x03, ENOMEM => "Bounce buffer allocation failed",
//!     }
//! }
//! ```
//!
//! ### Nested errors (with inner error type)
//! ```ignore
//! define_driver_error! {
//!     pub enum BlockError(0x03) {
//!         Io(TransferError) = 0x02, EIO => "Block I/O failed",
//!     }
//! }
//! ```

#![no_std]

/// Positive Linux errno values reported by OmniBlk errors.
pub mod errno {
    pub const EIO: i32 = 5;
    pub const ENXIO: i32 = 6;
    pub const ENOMEM: i32 = 12;
    pub const ENODEV: i32 = 19;
    pub const EINVAL: i32 = 22;
    pub const ENOTTY: i32 = 25;
    pub const ETIMEDOUT: i32 = 110;
}

/// Macro to define a driver error type with consistent handling.
///
/// Every variant names its code within the subsystem and the errno it maps to.
/// Supports both simple variants and nested variants containing inner data.
#[macro_export]
macro_rules! define_driver_error {
    (
        $(#[$meta:meta])*
        $vis:vis enum $name:ident($subsystem:literal) {
            $(
                $(#[$variant_meta:meta])*
                $variant:ident $(($inner:ty))? = $code:literal, $errno:ident => $desc:literal
            ),* $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        $vis enum $name {
            $(
                $(#[$variant_meta])*
                $variant $(($inner))?,
            )*
        }

        impl $name {
            /// Subsystem identifier for this error type.
            pub const SUBSYSTEM: u8 = $subsystem;

            /// Numeric error code: subsystem in the high byte, variant in the low byte.
            pub const fn code(&self) -> u16 {
                match self {
                    $(
                        $crate::define_driver_error!(@pattern $variant $(($inner))? _unused) => {
                            (($subsystem as u16) << 8) | $code
                        }
                    )*
                }
            }

            /// Static description for logging.
            pub const fn name(&self) -> &'static str {
                match self {
                    $(
                        $crate::define_driver_error!(@pattern $variant $(($inner))? _unused) => {
                            $desc
                        }
                    )*
                }
            }

            /// Positive errno reported to the caller of the failed operation.
            pub const fn errno(&self) -> i32 {
                match self {
                    $(
                        $crate::define_driver_error!(@pattern $variant $(($inner))? _unused) => {
                            $crate::errno::$errno
                        }
                    )*
                }
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                match self {
                    $(
                        $crate::define_driver_error!(@pattern $variant $(($inner))? inner) => {
                            $crate::define_driver_error!(@display_body self f $desc $(($inner))? inner)
                        }
                    )*
                }
            }
        }

        impl core::error::Error for $name {}
    };

    (@pattern $variant:ident ($inner:ty) $bind:ident) => { Self::$variant($bind) };
    (@pattern $variant:ident $bind:ident) => { Self::$variant };

    (@display_body $self:ident $f:ident $desc:literal ($inner:ty) $bind:ident) => {
        write!($f, "E{:04X}: {} ({})", $self.code(), $desc, $bind)
    };
    (@display_body $self:ident $f:ident $desc:literal $bind:ident) => {
        write!($f, "E{:04X}: {}", $self.code(), $desc)
    };
}

#[cfg(test)]
mod tests {
    extern crate std;
    use std::format;

    define_driver_error! {
        /// Test error type
        pub enum ProbeError(0x7F) {
            /// Register window missing
            NoRegs = 0x01, ENODEV => "No register window",
            /// Out of memory
            NoMem = 0x02, ENOMEM => "Out of memory",
        }
    }

    define_driver_error! {
        pub enum WrappedError(0x7E) {
            Probe(ProbeError) = 0x01, EIO => "Probe failed",
            Status(u32) = 0x02, ETIMEDOUT => "Bad status",
        }
    }

    #[test]
    fn test_error_codes() {
        assert_eq!(ProbeError::NoRegs.code(), 0x7F01);
        assert_eq!(ProbeError::NoMem.code(), 0x7F02);
        assert_eq!(WrappedError::Probe(ProbeError::NoMem).code(), 0x7E01);
        assert_eq!(WrappedError::Status(7).code(), 0x7E02);
    }

    #[test]
    fn test_errno_mapping() {
        assert_eq!(ProbeError::NoRegs.errno(), crate::errno::ENODEV);
        assert_eq!(ProbeError::NoMem.errno(), crate::errno::ENOMEM);
        assert_eq!(WrappedError::Probe(ProbeError::NoRegs).errno(), crate::errno::EIO);
        assert_eq!(WrappedError::Status(1).errno(), crate::errno::ETIMEDOUT);
    }

    #[test]
    fn test_error_names() {
        assert_eq!(ProbeError::NoRegs.name(), "No register window");
        assert_eq!(WrappedError::Probe(ProbeError::NoRegs).name(), "Probe failed");
    }

    #[test]
    fn test_display_format() {
        assert_eq!(format!("{}", ProbeError::NoMem), "E7F02: Out of memory");
        assert_eq!(
            format!("{}", WrappedError::Probe(ProbeError::NoRegs)),
            "E7E01: Probe failed (E7F01: No register window)"
        );
        assert_eq!(format!("{}", WrappedError::Status(4)), "E7E02: Bad status (4)");
    }

    #[test]
    fn test_subsystem_constant() {
        assert_eq!(ProbeError::SUBSYSTEM, 0x7F);
        assert_eq!(WrappedError::SUBSYSTEM, 0x7E);
    }
}
