//! Credential types and the `define_credential!` macro.

use serde::Serialize;

/// Errors that can occur when accessing credentials.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum CredentialError {
    /// The requested credential was not found.
    #[error("credential '{0}' not found")]
    NotFound(String),

    /// Failed to deserialize the credential.
    #[error("failed to deserialize credential: {0}")]
    DeserializationError(String),
}

/// Schema for a single field within a credential.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct CredentialFieldSchema {
    pub description: &'static str,
    pub required: bool,
}

/// Marks which field types a credential may declare.
///
/// Credential values always arrive as strings, so only `String` and
/// `Option<String>` are accepted.
#[doc(hidden)]
pub trait CredentialField {
    const REQUIRED: bool;
}

impl CredentialField for String {
    const REQUIRED: bool = true;
}

impl CredentialField for Option<String> {
    const REQUIRED: bool = false;
}

/// Defines a typed credential that nodes load from the [`Context`].
///
/// The generated struct deserializes from the string map the host stores
/// under the given name and exposes `NAME`, `DESCRIPTION` and `FIELDS` for
/// introspection. Its `Debug` output never includes field values.
///
/// [`Context`]: crate::Context
#[macro_export]
macro_rules! define_credential {
    (
        $(#[doc = $desc:literal])*
        $name:ident($cred:literal) {
            $(
                $(#[doc = $fdoc:literal])*
                $field:ident : $ty:ty
            ),* $(,)?
        }
    ) => {
        $(#[doc = $desc])*
        #[derive(Clone, ::serde::Deserialize)]
        pub struct $name {
            $(
                $(#[doc = $fdoc])*
                pub $field: $ty,
            )*
        }

        impl $name {
            /// Name the credential is stored under in the context.
            pub const NAME: &'static str = $cred;

            /// Human-readable description of the credential.
            pub const DESCRIPTION: &'static str = concat!($($desc),*);

            /// Field names with their descriptions and whether they are required.
            pub const FIELDS: &'static [(&'static str, $crate::CredentialFieldSchema)] = &[
                $(
                    (
                        stringify!($field),
                        $crate::CredentialFieldSchema {
                            description: concat!($($fdoc),*),
                            required: <$ty as $crate::__private::CredentialField>::REQUIRED,
                        },
                    ),
                )*
            ];

            /// Loads this credential from the context.
            ///
            /// # Errors
            ///
            /// Returns `CredentialError::NotFound` if the host did not
            /// configure it, or `CredentialError::DeserializationError` if a
            /// required field is missing.
            pub fn get(ctx: &$crate::Context) -> ::std::result::Result<Self, $crate::CredentialError> {
                ctx.credential(Self::NAME)
            }
        }

        impl ::std::fmt::Debug for $name {
            fn fmt(&self, f: &mut ::std::fmt::Formatter<'_>) -> ::std::fmt::Result {
                f.debug_struct(stringify!($name)).finish_non_exhaustive()
            }
        }
    };
}
