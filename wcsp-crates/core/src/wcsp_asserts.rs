//! Levelled assertions. The level is fixed at compile time; asserts above the level are compiled
//! away.

#[cfg(all(not(test), not(feature = "debug-checks")))]
pub const WCSP_ASSERT_LEVEL_DEFINITION: u8 = WCSP_ASSERT_SIMPLE;

#[cfg(any(test, feature = "debug-checks"))]
pub const WCSP_ASSERT_LEVEL_DEFINITION: u8 = WCSP_ASSERT_MODERATE;

pub const WCSP_ASSERT_SIMPLE: u8 = 1;
pub const WCSP_ASSERT_MODERATE: u8 = 2;

#[macro_export]
#[doc(hidden)]
macro_rules! wcsp_assert_simple {
    ($($arg:tt)*) => {
        if $crate::wcsp_asserts::WCSP_ASSERT_LEVEL_DEFINITION >= $crate::wcsp_asserts::WCSP_ASSERT_SIMPLE {
            assert!($($arg)*);
        }
    };
}

#[macro_export]
#[doc(hidden)]
macro_rules! wcsp_assert_moderate {
    ($($arg:tt)*) => {
        if $crate::wcsp_asserts::WCSP_ASSERT_LEVEL_DEFINITION >= $crate::wcsp_asserts::WCSP_ASSERT_MODERATE {
            assert!($($arg)*);
        }
    };
}

