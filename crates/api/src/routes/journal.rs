//! Journal entry routes.

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use chrono::NaiveDate;
use partida_core::ledger::{
    EntryFilter, EntryReference, EntryType, JournalEntry, JournalEntryLine, NewEntryLine, NewJournalEntry,
    ThirdPartyType,
};
use partida_shared::types::{JournalEntryId, ProjectId, ThirdPartyId};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::middleware::{ActingUser, ApiPath, ApiQuery, ValidatedJson};
use crate::{ApiError, AppState};

/// Creates the journal routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/journal-entries", get(list_entries).post(create_entry))
        .route("/journal-entries/{id}", get(get_entry))
        .route("/journal-entries/{id}/lines", get(get_entry_lines))
        .route("/journal-entries/{id}/lock", post(lock_entry))
}

/// One line of a new entry. Give either `debit` or `credit`.
#[derive(Debug, Deserialize, Serialize, Validate)]
pub struct EntryLineRequest {
    /// Account code.
    #[validate(length(min = 1, max = 10))]
    pub account_code: String,
    /// Debit amount.
    #[serde(default)]
    pub debit: Decimal,
    /// Credit amount.
    #[serde(default)]
    pub credit: Decimal,
    /// Line memo.
    #[validate(length(max = 500))]
    pub description: Option<String>,
    /// Attributed third party.
    pub third_party_id: Option<ThirdPartyId>,
    /// Type of the attributed third party.
    pub third_party_type: Option<ThirdPartyType>,
}

/// Request body for a manual journal entry.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateEntryRequest {
    /// Accounting date.
    pub entry_date: NaiveDate,
    /// Business event type.
    pub entry_type: EntryType,
    /// Description.
    #[validate(length(min = 1, max = 500))]
    pub description: String,
    /// Originating document.
    pub reference: Option<EntryReference>,
    /// Project.
    pub project_id: Option<ProjectId>,
    /// At least two lines.
    #[validate(length(min = 2), nested)]
    pub lines: Vec<EntryLineRequest>,
}

/// Query parameters for listing entries.
#[derive(Debug, Default, Deserialize)]
pub struct ListEntriesQuery {
    /// First date, inclusive.
    pub from: Option<NaiveDate>,
    /// Last date, inclusive.
    pub to: Option<NaiveDate>,
    /// Entry type.
    pub entry_type: Option<EntryType>,
    /// Entries with at least one line on this account.
    pub account_code: Option<String>,
    /// Entries with at least one line attributed to this third party.
    pub third_party_id: Option<ThirdPartyId>,
    /// Locked or unlocked entries only.
    pub locked: Option<bool>,
}

/// A committed entry with its lines.
#[derive(Debug, Serialize)]
pub struct EntryResponse {
    /// Header.
    #[serde(flatten)]
    pub entry: JournalEntry,
    /// Lines in order.
    pub lines: Vec<JournalEntryLine>,
}

impl CreateEntryRequest {
    fn into_entry(self, user: ActingUser) -> NewJournalEntry {
        NewJournalEntry {
            entry_date: self.entry_date,
            entry_type: self.entry_type,
            description: self.description,
            reference: self.reference,
            project_id: self.project_id,
            created_by: user.user_id(),
            lines: self
                .lines
                .into_iter()
                .map(|l| NewEntryLine {
                    account_code: l.account_code,
                    debit: l.debit,
                    credit: l.credit,
                    description: l.description,
                    third_party_id: l.third_party_id,
                    third_party_type: l.third_party_type,
                })
                .collect(),
        }
    }
}

/// POST `/journal-entries` - Validate and commit an entry.
async fn create_entry(
    State(state): State<AppState>,
    user: ActingUser,
    ValidatedJson(body): ValidatedJson<CreateEntryRequest>,
) -> Result<(StatusCode, Json<EntryResponse>), ApiError> {
    let (entry, lines) = state.ledger.create_entry(body.into_entry(user)).await?;
    Ok((StatusCode::CREATED, Json(EntryResponse { entry, lines })))
}

/// GET `/journal-entries` - Entry headers matching the filters.
async fn list_entries(
    State(state): State<AppState>,
    ApiQuery(query): ApiQuery<ListEntriesQuery>,
) -> Result<Json<Vec<JournalEntry>>, ApiError> {
    let filter = EntryFilter {
        from: query.from,
        to: query.to,
        entry_types: query.entry_type.into_iter().collect(),
        account_code: query.account_code,
        third_party_id: query.third_party_id,
        locked: query.locked,
        ..EntryFilter::default()
    };
    Ok(Json(state.ledger.list_entries(&filter).await?))
}

/// GET `/journal-entries/{id}`
async fn get_entry(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<JournalEntryId>,
) -> Result<Json<JournalEntry>, ApiError> {
    Ok(Json(state.ledger.get_entry(id).await?))
}

/// GET `/journal-entries/{id}/lines`
async fn get_entry_lines(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<JournalEntryId>,
) -> Result<Json<Vec<JournalEntryLine>>, ApiError> {
    Ok(Json(state.ledger.get_entry_lines(id).await?))
}

/// POST `/journal-entries/{id}/lock` - Lock an entry. Locking twice is a no-op.
async fn lock_entry(
    State(state): State<AppState>,
    ApiPath(id): ApiPath<JournalEntryId>,
) -> Result<Json<JournalEntry>, ApiError> {
    Ok(Json(state.ledger.lock_entry(id).await?))
}
