//! Status codes carried by responses.
//!
//! Every enum keeps unrecognized values in `Other(u8)` so that firmware
//! revisions with new codes still decode.

use std::fmt;

macro_rules! status_code {
    (
        $(#[$meta:meta])*
        pub enum $name:ident {
            $($(#[$vmeta:meta])* $variant:ident = $value:literal => $text:literal,)+
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum $name {
            $($(#[$vmeta])* $variant,)+
            /// A code this crate does not name.
            Other(u8),
        }

        impl From<u8> for $name {
            fn from(value: u8) -> Self {
                match value {
                    $($value => Self::$variant,)+
                    other => Self::Other(other),
                }
            }
        }

        impl From<$name> for u8 {
            fn from(value: $name) -> u8 {
                match value {
                    $($name::$variant => $value,)+
                    $name::Other(other) => other,
                }
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                match self {
                    $(Self::$variant => f.write_str($text),)+
                    Self::Other(code) => write!(f, "unknown (0x{code:02X})"),
                }
            }
        }
    };
}

status_code! {
    /// Result of a local or remote AT command.
    pub enum AtCommandStatus {
        Ok = 0x00 => "ok",
        Error = 0x01 => "error",
        InvalidCommand = 0x02 => "invalid command",
        InvalidParameter = 0x03 => "invalid parameter",
        /// Remote command could not be delivered.
        TxFailure = 0x04 => "transmission failure",
    }
}

impl AtCommandStatus {
    pub fn is_ok(self) -> bool {
        self == Self::Ok
    }
}

status_code! {
    /// Unsolicited link-level state reported by the module.
    pub enum ModemStatus {
        HardwareReset = 0x00 => "hardware reset",
        WatchdogReset = 0x01 => "watchdog timer reset",
        Associated = 0x02 => "joined network",
        Disassociated = 0x03 => "disassociated",
        SyncLost = 0x04 => "synchronization lost",
        CoordinatorRealignment = 0x05 => "coordinator realignment",
        CoordinatorStarted = 0x06 => "coordinator started",
        NetworkKeyUpdated = 0x07 => "network security key updated",
        VoltageExceeded = 0x0D => "supply voltage limit exceeded",
        ConfigChangedWhileJoining = 0x11 => "configuration changed while join in progress",
    }
}

impl ModemStatus {
    /// Codes from 0x80 upward report internal stack errors.
    pub fn is_stack_error(self) -> bool {
        matches!(self, Self::Other(code) if code >= 0x80)
    }
}

status_code! {
    /// Delivery outcome of a transmit request.
    pub enum DeliveryStatus {
        Success = 0x00 => "success",
        MacAckFailure = 0x01 => "MAC ACK failure",
        CcaFailure = 0x02 => "CCA failure",
        Purged = 0x03 => "purged",
        InvalidEndpoint = 0x15 => "invalid destination endpoint",
        NetworkAckFailure = 0x21 => "network ACK failure",
        NotJoined = 0x22 => "not joined to network",
        SelfAddressed = 0x23 => "self-addressed",
        AddressNotFound = 0x24 => "address not found",
        RouteNotFound = 0x25 => "route not found",
        PayloadTooLarge = 0x74 => "data payload too large",
    }
}

impl DeliveryStatus {
    pub fn is_success(self) -> bool {
        self == Self::Success
    }
}

status_code! {
    /// Role a node reports in its identification indicator.
    pub enum DeviceType {
        Coordinator = 0x00 => "coordinator",
        Router = 0x01 => "router",
        EndDevice = 0x02 => "end device",
    }
}
