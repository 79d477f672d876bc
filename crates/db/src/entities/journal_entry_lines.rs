//! `SeaORM` Entity for journal_entry_lines table.

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Eq, Serialize, Deserialize)]
#[sea_orm(table_name = "journal_entry_lines")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub entry_id: Uuid,
    #[sea_orm(primary_key, auto_increment = false)]
    pub line_order: i32,
    pub account_code: String,
    #[sea_orm(column_type = "Decimal(Some((15, 2)))")]
    pub debit_amount: Decimal,
    #[sea_orm(column_type = "Decimal(Some((15, 2)))")]
    pub credit_amount: Decimal,
    #[sea_orm(column_type = "Text", nullable)]
    pub description: Option<String>,
    pub third_party_id: Option<Uuid>,
    pub third_party_type: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::journal_entries::Entity",
        from = "Column::EntryId",
        to = "super::journal_entries::Column::Id"
    )]
    JournalEntries,
    #[sea_orm(
        belongs_to = "super::accounts::Entity",
        from = "Column::AccountCode",
        to = "super::accounts::Column::Code"
    )]
    Accounts,
    #[sea_orm(
        belongs_to = "super::third_parties::Entity",
        from = "Column::ThirdPartyId",
        to = "super::third_parties::Column::Id"
    )]
    ThirdParties,
}

impl Related<super::journal_entries::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::JournalEntries.def()
    }
}

impl Related<super::accounts::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Accounts.def()
    }
}

impl Related<super::third_parties::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::ThirdParties.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
