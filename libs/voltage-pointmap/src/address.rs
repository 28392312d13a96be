//! Modbus register address resolution
//!
//! Field sheets use the classic 5-digit register notation: the leading digit
//! selects the register class and the remaining four digits are the offset.
//!
//! | class | area                  | read FC | write FC |
//! |-------|-----------------------|---------|----------|
//! | 0     | coil (DO)             | 1       | 5        |
//! | 1     | discrete input (DI)   | 2       | -        |
//! | 3     | input register (AI)   | 4       | -        |
//! | 4     | holding register (AO) | 3       | 6        |
//!
//! The offset is taken as written (`40001` -> offset 1), it is NOT shifted to
//! a zero-based protocol address. Downstream pollers rely on this.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::AddressError;
use crate::row::OperationKind;

/// Number of digits in a register address after zero padding
pub const ADDRESS_WIDTH: usize = 5;

/// Modbus register area, selected by the leading address digit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RegisterClass {
    Coil,
    DiscreteInput,
    InputRegister,
    HoldingRegister,
}

impl RegisterClass {
    pub fn from_digit(digit: char) -> Option<Self> {
        match digit {
            '0' => Some(Self::Coil),
            '1' => Some(Self::DiscreteInput),
            '3' => Some(Self::InputRegister),
            '4' => Some(Self::HoldingRegister),
            _ => None,
        }
    }

    pub fn read_function(self) -> FunctionCode {
        match self {
            Self::Coil => FunctionCode::ReadCoils,
            Self::DiscreteInput => FunctionCode::ReadDiscreteInputs,
            Self::InputRegister => FunctionCode::ReadInputRegisters,
            Self::HoldingRegister => FunctionCode::ReadHoldingRegisters,
        }
    }

    /// `None` for read-only areas
    pub fn write_function(self) -> Option<FunctionCode> {
        match self {
            Self::Coil => Some(FunctionCode::WriteSingleCoil),
            Self::HoldingRegister => Some(FunctionCode::WriteSingleRegister),
            Self::DiscreteInput | Self::InputRegister => None,
        }
    }
}

impl fmt::Display for RegisterClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Coil => "Coil (DO)",
            Self::DiscreteInput => "Discrete input (DI)",
            Self::InputRegister => "Input register (AI)",
            Self::HoldingRegister => "Holding register (AO)",
        };
        f.write_str(name)
    }
}

/// Modbus function codes emitted into device configs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum FunctionCode {
    ReadCoils = 1,
    ReadDiscreteInputs = 2,
    ReadHoldingRegisters = 3,
    ReadInputRegisters = 4,
    WriteSingleCoil = 5,
    WriteSingleRegister = 6,
}

impl FunctionCode {
    pub fn code(self) -> u8 {
        self as u8
    }
}

impl From<FunctionCode> for u8 {
    fn from(fc: FunctionCode) -> Self {
        fc.code()
    }
}

impl TryFrom<u8> for FunctionCode {
    type Error = String;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::ReadCoils),
            2 => Ok(Self::ReadDiscreteInputs),
            3 => Ok(Self::ReadHoldingRegisters),
            4 => Ok(Self::ReadInputRegisters),
            5 => Ok(Self::WriteSingleCoil),
            6 => Ok(Self::WriteSingleRegister),
            other => Err(format!("unsupported function code: {}", other)),
        }
    }
}

impl fmt::Display for FunctionCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "FC{:02}", self.code())
    }
}

/// Result of resolving one register address
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResolvedAddress {
    pub class: RegisterClass,
    pub function_code: FunctionCode,
    pub offset: u16,
}

/// Resolve a register address and operation into a function code and offset.
///
/// The address is zero-padded to 5 digits first, so `"3"` reads as `00003`
/// (coil 3). Pure and deterministic.
pub fn resolve(address: &str, operation: OperationKind) -> Result<ResolvedAddress, AddressError> {
    let digits = normalise(address)?;

    // normalise() guarantees exactly ADDRESS_WIDTH ascii digits
    let class_digit = digits.as_bytes()[0] as char;
    let offset: u16 = digits[1..]
        .parse()
        .map_err(|e| invalid(address, format!("bad offset: {}", e)))?;

    let class =
        RegisterClass::from_digit(class_digit).ok_or_else(|| AddressError::UnsupportedAddressClass {
            address: address.to_string(),
            class: class_digit,
        })?;

    let function_code = match operation {
        OperationKind::Read => class.read_function(),
        OperationKind::Write => {
            class
                .write_function()
                .ok_or_else(|| AddressError::UnsupportedOperation {
                    address: address.to_string(),
                    class,
                    operation,
                })?
        },
    };

    Ok(ResolvedAddress {
        class,
        function_code,
        offset,
    })
}

/// Validate and zero-pad an address to exactly [`ADDRESS_WIDTH`] digits
fn normalise(address: &str) -> Result<String, AddressError> {
    let trimmed = address.trim();

    if trimmed.is_empty() {
        return Err(invalid(address, "address is empty"));
    }
    if !trimmed.bytes().all(|b| b.is_ascii_digit()) {
        return Err(invalid(address, "address must contain digits only"));
    }
    if trimmed.len() > ADDRESS_WIDTH {
        return Err(invalid(
            address,
            format!("address has more than {} digits", ADDRESS_WIDTH),
        ));
    }

    Ok(format!("{:0>width$}", trimmed, width = ADDRESS_WIDTH))
}

fn invalid(address: &str, reason: impl Into<String>) -> AddressError {
    AddressError::InvalidRegisterAddress {
        address: address.to_string(),
        reason: reason.into(),
    }
}
