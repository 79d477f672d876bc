//! Typed IDs for type-safe entity references.
//!
//! Using typed IDs prevents accidentally passing a `RunId` where a `PaymentId` is expected.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Macro to generate typed ID wrappers.
macro_rules! typed_id {
    ($name:ident, $doc:expr) => {
        #[doc = $doc]
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Creates a new random ID using UUID v7 (time-ordered).
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::now_v7())
            }

            /// Creates an ID from an existing UUID.
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Returns the inner UUID.
            #[must_use]
            pub const fn into_inner(self) -> Uuid {
                self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl std::str::FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Ok(Self(Uuid::parse_str(s)?))
            }
        }
    };
}

typed_id!(UserId, "Unique identifier for the user acting on the ledger.");
typed_id!(JournalEntryId, "Unique identifier for a journal entry.");
typed_id!(BankAccountId, "Unique identifier for a bank account.");
typed_id!(
    RunId,
    "Unique identifier for a payroll or partner-compensation run."
);
typed_id!(PaymentId, "Unique identifier for a payroll payment.");
typed_id!(
    ThirdPartyId,
    "Unique identifier for a client, supplier or technician."
);
typed_id!(PersonId, "Unique identifier for an employee or partner.");
typed_id!(ProjectId, "Unique identifier for a project.");
