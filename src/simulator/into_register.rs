//!
//! Conversions between register contents and the integer types instructions and hosts work
//! with. A register always holds 32 raw bits; these traits pick how to view them.
//!

/// Types whose bit representation can be stored in a 32-bit register. Narrow types are
/// extended according to their signedness.
pub trait IntoRegister {
    fn into_register(self) -> u32;
}

macro_rules! impl_into_reg {
    ($type:ident) => {
        impl IntoRegister for $type {
            fn into_register(self) -> u32 {
                self as u32
            }
        }
    };
}

impl_into_reg!(u32);
impl_into_reg!(i32);
impl_into_reg!(u16);
impl_into_reg!(i16);
impl_into_reg!(u8);
impl_into_reg!(i8);

impl IntoRegister for bool {
    fn into_register(self) -> u32 {
        self as u32
    }
}

/// Types that can be read out of a 32-bit register, truncating if narrower
pub trait FromRegister {
    fn from_register(x: u32) -> Self;
}

macro_rules! impl_from_reg {
    ($type:ident) => {
        impl FromRegister for $type {
            fn from_register(x: u32) -> Self {
                x as $type
            }
        }
    };
}

impl_from_reg!(u32);
impl_from_reg!(i32);
impl_from_reg!(u16);
impl_from_reg!(i16);
impl_from_reg!(u8);
impl_from_reg!(i8);
