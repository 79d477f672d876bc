//! Change notifications published after each commit.

use partida_shared::types::{JournalEntryId, RunId};
use serde::{Deserialize, Serialize};

use crate::chart::Account;
use crate::fiscal::Period;
use crate::ledger::{JournalEntry, JournalEntryLine};
use crate::payroll::{PayrollPayment, RunKind, RunStatus};

/// Capacity of the event channel. Slow subscribers lag and must resync.
pub const EVENT_BUFFER_SIZE: usize = 256;

/// Something that changed in the ledger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// An account was created or updated.
    AccountSaved(Account),
    /// An entry and its lines were committed.
    EntryCommitted {
        /// Header.
        entry: JournalEntry,
        /// Lines in order.
        lines: Vec<JournalEntryLine>,
    },
    /// An existing entry was locked.
    EntryLocked {
        /// Locked entry.
        entry_id: JournalEntryId,
    },
    /// A period was closed.
    PeriodClosed {
        /// The closed period.
        period: Period,
        /// Entries locked by the closure.
        locked_entries: usize,
    },
    /// A run changed status.
    RunStatusChanged {
        /// Run.
        run_id: RunId,
        /// Kind of run.
        kind: RunKind,
        /// New status.
        status: RunStatus,
    },
    /// A payment was recorded against a run.
    PaymentRecorded {
        /// Stored payment.
        payment: PayrollPayment,
    },
}
