//! Ledger schema.
//!
//! Creates the chart, the registries, the journal, compensation runs,
//! accounting periods and the number sequences, with the triggers that keep
//! committed entries balanced and immutable.

use sea_orm_migration::prelude::*;

#[derive(DeriveMigrationName)]
pub struct Migration;

#[async_trait::async_trait]
impl MigrationTrait for Migration {
    async fn up(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();

        // ============================================================
        // PART 1: CHART AND REGISTRIES
        // ============================================================
        db.execute_unprepared(ACCOUNTS_SQL).await?;
        db.execute_unprepared(THIRD_PARTIES_SQL).await?;
        db.execute_unprepared(BANK_ACCOUNTS_SQL).await?;

        // ============================================================
        // PART 2: JOURNAL
        // ============================================================
        db.execute_unprepared(ENTRY_SEQUENCES_SQL).await?;
        db.execute_unprepared(JOURNAL_ENTRIES_SQL).await?;
        db.execute_unprepared(JOURNAL_ENTRY_LINES_SQL).await?;

        // ============================================================
        // PART 3: PERIODS
        // ============================================================
        db.execute_unprepared(ACCOUNTING_PERIODS_SQL).await?;

        // ============================================================
        // PART 4: COMPENSATION RUNS
        // ============================================================
        db.execute_unprepared(COMPENSATION_RUNS_SQL).await?;
        db.execute_unprepared(PAYROLL_PAYMENTS_SQL).await?;

        // ============================================================
        // PART 5: TRIGGERS & FUNCTIONS
        // ============================================================
        db.execute_unprepared(TRIGGERS_SQL).await?;

        Ok(())
    }

    async fn down(&self, manager: &SchemaManager) -> Result<(), DbErr> {
        let db = manager.get_connection();
        db.execute_unprepared(DROP_ALL_SQL).await?;
        Ok(())
    }
}

// ============================================================
// SQL CONSTANTS
// ============================================================

const ACCOUNTS_SQL: &str = r"
CREATE TABLE accounts (
    code VARCHAR(20) PRIMARY KEY,
    name VARCHAR(255) NOT NULL,
    account_type VARCHAR(16) NOT NULL,
    is_active BOOLEAN NOT NULL DEFAULT true,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_account_type CHECK (
        account_type IN ('ASSET', 'LIABILITY', 'EQUITY', 'REVENUE', 'EXPENSE', 'TAX')
    ),
    CONSTRAINT chk_account_code CHECK (code ~ '^[0-9]+$')
);

CREATE INDEX idx_accounts_active ON accounts(code) WHERE is_active = true;
";

const THIRD_PARTIES_SQL: &str = r"
CREATE TABLE third_parties (
    id UUID PRIMARY KEY,
    party_type VARCHAR(16) NOT NULL,
    name VARCHAR(255) NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_party_type CHECK (party_type IN ('CLIENT', 'SUPPLIER', 'TECHNICIAN'))
);
";

const BANK_ACCOUNTS_SQL: &str = r"
CREATE TABLE bank_accounts (
    id UUID PRIMARY KEY,
    holder VARCHAR(255) NOT NULL,
    bank VARCHAR(255) NOT NULL,
    iban VARCHAR(34) NOT NULL,
    account_code VARCHAR(20) REFERENCES accounts(code),
    created_at TIMESTAMPTZ NOT NULL DEFAULT now()
);

CREATE INDEX idx_bank_accounts_created ON bank_accounts(created_at, id);
";

const ENTRY_SEQUENCES_SQL: &str = r"
-- One counter row per numbering scope ('entry:2026', 'NOM:2026', 'PAG:2026').
-- Incremented with INSERT ... ON CONFLICT DO UPDATE ... RETURNING inside the
-- committing transaction, so a rollback releases the number.
CREATE TABLE entry_sequences (
    scope VARCHAR(32) PRIMARY KEY,
    last_value BIGINT NOT NULL,
    CONSTRAINT chk_sequence_positive CHECK (last_value > 0)
);
";

const JOURNAL_ENTRIES_SQL: &str = r"
CREATE TABLE journal_entries (
    id UUID PRIMARY KEY,
    entry_number VARCHAR(20) NOT NULL UNIQUE,
    entry_date DATE NOT NULL,
    entry_type VARCHAR(32) NOT NULL,
    description TEXT NOT NULL,
    reference_type VARCHAR(64),
    reference_id VARCHAR(64),
    project_id UUID,
    total_amount NUMERIC(15, 2) NOT NULL,
    is_locked BOOLEAN NOT NULL DEFAULT false,
    created_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_entry_type CHECK (entry_type IN (
        'INVOICE_SALE', 'INVOICE_PURCHASE', 'PAYMENT_RECEIVED', 'PAYMENT_MADE',
        'BANK_TRANSFER', 'TAX_PAYMENT', 'TAX_PROVISION', 'BANK_OPENING', 'ADJUSTMENT',
        'MANUAL_INCOME', 'MANUAL_EXPENSE', 'PAYROLL', 'PARTNER_COMPENSATION'
    )),
    CONSTRAINT chk_total_positive CHECK (total_amount > 0),
    CONSTRAINT chk_reference_pair CHECK ((reference_type IS NULL) = (reference_id IS NULL))
);

CREATE INDEX idx_je_date ON journal_entries(entry_date, entry_number);
CREATE INDEX idx_je_type ON journal_entries(entry_type, entry_date);
CREATE INDEX idx_je_reference ON journal_entries(reference_type, reference_id)
    WHERE reference_type IS NOT NULL;
CREATE INDEX idx_je_unlocked ON journal_entries(entry_date) WHERE is_locked = false;
";

const JOURNAL_ENTRY_LINES_SQL: &str = r"
CREATE TABLE journal_entry_lines (
    entry_id UUID NOT NULL REFERENCES journal_entries(id) ON DELETE RESTRICT,
    line_order INTEGER NOT NULL,
    account_code VARCHAR(20) NOT NULL REFERENCES accounts(code),
    debit_amount NUMERIC(15, 2) NOT NULL DEFAULT 0,
    credit_amount NUMERIC(15, 2) NOT NULL DEFAULT 0,
    description TEXT,
    third_party_id UUID REFERENCES third_parties(id),
    third_party_type VARCHAR(16),
    PRIMARY KEY (entry_id, line_order),
    CONSTRAINT chk_line_order CHECK (line_order > 0),
    CONSTRAINT chk_debit_or_credit CHECK (
        (debit_amount > 0 AND credit_amount = 0) OR (debit_amount = 0 AND credit_amount > 0)
    ),
    CONSTRAINT chk_third_party_pair CHECK ((third_party_id IS NULL) = (third_party_type IS NULL))
);

CREATE INDEX idx_jel_account ON journal_entry_lines(account_code);
CREATE INDEX idx_jel_third_party ON journal_entry_lines(third_party_id)
    WHERE third_party_id IS NOT NULL;
";

const ACCOUNTING_PERIODS_SQL: &str = r"
CREATE TABLE accounting_periods (
    year INTEGER NOT NULL,
    month INTEGER NOT NULL,
    is_closed BOOLEAN NOT NULL DEFAULT false,
    closed_at TIMESTAMPTZ,
    PRIMARY KEY (year, month),
    CONSTRAINT chk_period_month CHECK (month BETWEEN 1 AND 12),
    CONSTRAINT chk_closed_at CHECK (is_closed = (closed_at IS NOT NULL))
);
";

const COMPENSATION_RUNS_SQL: &str = r"
CREATE TABLE compensation_runs (
    id UUID PRIMARY KEY,
    kind VARCHAR(32) NOT NULL,
    run_number VARCHAR(20) NOT NULL UNIQUE,
    period_year INTEGER NOT NULL,
    period_month INTEGER NOT NULL,
    person_id UUID NOT NULL,
    person_name VARCHAR(255) NOT NULL,
    gross_amount NUMERIC(15, 2) NOT NULL,
    irpf_rate NUMERIC(5, 2) NOT NULL,
    irpf_amount NUMERIC(15, 2) NOT NULL,
    net_amount NUMERIC(15, 2) NOT NULL,
    status VARCHAR(16) NOT NULL DEFAULT 'DRAFT',
    journal_entry_id UUID REFERENCES journal_entries(id),
    created_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    updated_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_run_kind CHECK (kind IN ('PAYROLL', 'PARTNER_COMPENSATION')),
    CONSTRAINT chk_run_status CHECK (status IN ('DRAFT', 'POSTED', 'PAID', 'CANCELLED')),
    CONSTRAINT chk_run_month CHECK (period_month BETWEEN 1 AND 12),
    CONSTRAINT chk_run_amounts CHECK (
        gross_amount > 0 AND irpf_amount >= 0 AND net_amount >= 0
        AND irpf_amount + net_amount = gross_amount
    ),
    CONSTRAINT chk_irpf_rate CHECK (irpf_rate BETWEEN 0 AND 100),
    CONSTRAINT chk_posted_has_entry CHECK (
        status NOT IN ('POSTED', 'PAID') OR journal_entry_id IS NOT NULL
    )
);

CREATE INDEX idx_runs_period ON compensation_runs(kind, period_year DESC, period_month DESC);
";

const PAYROLL_PAYMENTS_SQL: &str = r"
CREATE TABLE payroll_payments (
    id UUID PRIMARY KEY,
    payment_number VARCHAR(20) NOT NULL UNIQUE,
    run_id UUID NOT NULL REFERENCES compensation_runs(id) ON DELETE RESTRICT,
    amount NUMERIC(15, 2) NOT NULL,
    payment_date DATE NOT NULL,
    payment_method VARCHAR(16) NOT NULL,
    bank_account_id UUID NOT NULL REFERENCES bank_accounts(id),
    journal_entry_id UUID NOT NULL REFERENCES journal_entries(id),
    created_by UUID NOT NULL,
    created_at TIMESTAMPTZ NOT NULL DEFAULT now(),
    CONSTRAINT chk_payment_positive CHECK (amount > 0),
    CONSTRAINT chk_payment_method CHECK (
        payment_method IN ('TRANSFER', 'DIRECT_DEBIT', 'CHECK', 'CASH')
    )
);

CREATE INDEX idx_payments_run ON payroll_payments(run_id, payment_date, payment_number);
";

const TRIGGERS_SQL: &str = r"
-- ============================================================
-- FUNCTION: check_entry_balance
-- Debits equal credits equal the header total once the transaction commits
-- ============================================================
CREATE OR REPLACE FUNCTION check_entry_balance()
RETURNS TRIGGER AS $$
DECLARE
    total_debit NUMERIC(15, 2);
    total_credit NUMERIC(15, 2);
    header_total NUMERIC(15, 2);
BEGIN
    SELECT COALESCE(SUM(debit_amount), 0), COALESCE(SUM(credit_amount), 0)
    INTO total_debit, total_credit
    FROM journal_entry_lines
    WHERE entry_id = NEW.entry_id;

    SELECT total_amount INTO header_total FROM journal_entries WHERE id = NEW.entry_id;

    IF total_debit <> total_credit OR total_debit <> header_total THEN
        RAISE EXCEPTION 'Entry % is not balanced. Debit: %, Credit: %, Total: %',
            NEW.entry_id, total_debit, total_credit, header_total;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE CONSTRAINT TRIGGER trg_check_entry_balance
AFTER INSERT ON journal_entry_lines
DEFERRABLE INITIALLY DEFERRED
FOR EACH ROW
EXECUTE FUNCTION check_entry_balance();

-- ============================================================
-- FUNCTION: guard_journal_entry
-- Entries are append-only; the only permitted change is unlocked -> locked
-- ============================================================
CREATE OR REPLACE FUNCTION guard_journal_entry()
RETURNS TRIGGER AS $$
BEGIN
    IF TG_OP = 'DELETE' THEN
        RAISE EXCEPTION 'Journal entry % cannot be deleted', OLD.entry_number;
    END IF;

    IF OLD.is_locked THEN
        RAISE EXCEPTION 'Journal entry % is locked', OLD.entry_number;
    END IF;

    IF NEW.is_locked IS NOT TRUE
        OR (NEW.entry_number, NEW.entry_date, NEW.entry_type, NEW.description,
            NEW.reference_type, NEW.reference_id, NEW.project_id, NEW.total_amount,
            NEW.created_by)
        IS DISTINCT FROM
           (OLD.entry_number, OLD.entry_date, OLD.entry_type, OLD.description,
            OLD.reference_type, OLD.reference_id, OLD.project_id, OLD.total_amount,
            OLD.created_by)
    THEN
        RAISE EXCEPTION 'Journal entry % is immutable except for locking', OLD.entry_number;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_guard_journal_entry
BEFORE UPDATE OR DELETE ON journal_entries
FOR EACH ROW
EXECUTE FUNCTION guard_journal_entry();

-- ============================================================
-- FUNCTION: guard_journal_line
-- Lines are written once, together with their unlocked header
-- ============================================================
CREATE OR REPLACE FUNCTION guard_journal_line()
RETURNS TRIGGER AS $$
DECLARE
    entry_locked BOOLEAN;
BEGIN
    IF TG_OP <> 'INSERT' THEN
        RAISE EXCEPTION 'Journal lines are immutable';
    END IF;

    SELECT is_locked INTO entry_locked FROM journal_entries WHERE id = NEW.entry_id;
    IF entry_locked THEN
        RAISE EXCEPTION 'Journal entry % is locked', NEW.entry_id;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_guard_journal_line
BEFORE INSERT OR UPDATE OR DELETE ON journal_entry_lines
FOR EACH ROW
EXECUTE FUNCTION guard_journal_line();

-- ============================================================
-- FUNCTION: check_period_open
-- No entry may be dated inside a closed period
-- ============================================================
CREATE OR REPLACE FUNCTION check_period_open()
RETURNS TRIGGER AS $$
BEGIN
    IF EXISTS (
        SELECT 1 FROM accounting_periods
        WHERE year = EXTRACT(YEAR FROM NEW.entry_date)::INTEGER
          AND month = EXTRACT(MONTH FROM NEW.entry_date)::INTEGER
          AND is_closed
    ) THEN
        RAISE EXCEPTION 'Period of % is closed', NEW.entry_date;
    END IF;

    RETURN NEW;
END;
$$ LANGUAGE plpgsql;

CREATE TRIGGER trg_check_period_open
BEFORE INSERT ON journal_entries
FOR EACH ROW
EXECUTE FUNCTION check_period_open();
";

const DROP_ALL_SQL: &str = r"
DROP TABLE IF EXISTS payroll_payments CASCADE;
DROP TABLE IF EXISTS compensation_runs CASCADE;
DROP TABLE IF EXISTS accounting_periods CASCADE;
DROP TABLE IF EXISTS journal_entry_lines CASCADE;
DROP TABLE IF EXISTS journal_entries CASCADE;
DROP TABLE IF EXISTS entry_sequences CASCADE;
DROP TABLE IF EXISTS bank_accounts CASCADE;
DROP TABLE IF EXISTS third_parties CASCADE;
DROP TABLE IF EXISTS accounts CASCADE;

DROP FUNCTION IF EXISTS check_entry_balance() CASCADE;
DROP FUNCTION IF EXISTS guard_journal_entry() CASCADE;
DROP FUNCTION IF EXISTS guard_journal_line() CASCADE;
DROP FUNCTION IF EXISTS check_period_open() CASCADE;
";
