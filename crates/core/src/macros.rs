// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Declarative helper for the string-keyed enums of this crate.
//!
//! The store, the audit log, and caller-facing responses all speak in
//! fixed strings: snake_case statuses, dotted event names, verb names.
//! [`str_enum!`] keeps each enum's canonical strings in one table and
//! derives both `as_str` and `Display` from it, so the persisted form and
//! the logged form can never drift apart.

/// Generate `as_str()` and `Display` for a fieldless enum from one
/// variant→string table.
///
/// ```ignore
/// crate::str_enum! {
///     OpStatus {
///         Running => "running",
///         Succeeded => "succeeded",
///         Failed => "failed",
///     }
/// }
/// ```
#[macro_export]
macro_rules! str_enum {
    ($enum:ty { $( $variant:ident => $str:expr ),+ $(,)? }) => {
        impl $enum {
            /// Canonical string form, as persisted and surfaced to callers.
            pub fn as_str(&self) -> &'static str {
                match self {
                    $( Self::$variant => $str, )+
                }
            }
        }

        impl std::fmt::Display for $enum {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}
