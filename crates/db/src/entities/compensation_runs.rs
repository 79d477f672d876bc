//! `SeaORM` Entity for compensation_runs table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "compensation_runs")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: Uuid,
    pub kind: String,
    #[sea_orm(unique)]
    pub run_number: String,
    pub period_year: i32,
    pub period_month: i32,
    pub person_id: Uuid,
    pub person_name: String,
    #[sea_orm(column_type = "Decimal(Some((15, 2)))")]
    pub gross_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((5, 2)))")]
    pub irpf_rate: Decimal,
    #[sea_orm(column_type = "Decimal(Some((15, 2)))")]
    pub irpf_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((15, 2)))")]
    pub net_amount: Decimal,
    pub status: String,
    pub journal_entry_id: Option<Uuid>,
    pub created_by: Uuid,
    pub created_at: DateTimeWithTimeZone,
    pub updated_at: DateTimeWithTimeZone,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::journal_entries::Entity",
        from = "Column::JournalEntryId",
        to = "super::journal_entries::Column::Id"
    )]
    JournalEntries,
    #[sea_orm(has_many = "super::payroll_payments::Entity")]
    PayrollPayments,
}

impl Related<super::journal_entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JournalEntries.def()
    }
}

impl Related<super::payroll_payments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::PayrollPayments.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
